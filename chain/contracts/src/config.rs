//! Vault configuration
//!
//! Construction parameters with their bounds. A config can be built in code
//! with [`VaultConfig::new`] or loaded from JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use vault_types::fee::{DEFAULT_FEE_BPS, MAX_FEE_BPS};
use vault_types::ids::Address;

use crate::errors::VaultError;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Shortest allowed holding period (1 day).
pub const MIN_TIMELOCK: u64 = SECONDS_PER_DAY;

/// Longest allowed holding period (90 days).
pub const MAX_TIMELOCK: u64 = 90 * SECONDS_PER_DAY;

/// Holding period of a freshly configured vault (15 days).
pub const DEFAULT_TIMELOCK: u64 = 15 * SECONDS_PER_DAY;

/// Largest virtual share offset, matching an 18-decimal asset.
pub const MAX_DECIMALS_OFFSET: u8 = 18;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] VaultError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Share token name.
    pub name: String,
    /// Share token symbol.
    pub symbol: String,
    pub owner: Address,
    pub fee_wallet: Address,
    #[serde(default = "default_timelock")]
    pub timelock_seconds: u64,
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u16,
    /// Virtual share offset used by asset/share conversions.
    #[serde(default)]
    pub decimals_offset: u8,
}

fn default_timelock() -> u64 {
    DEFAULT_TIMELOCK
}

fn default_fee_bps() -> u16 {
    DEFAULT_FEE_BPS
}

impl VaultConfig {
    pub fn new(owner: Address, fee_wallet: Address) -> Self {
        Self {
            name: "Staked Vault Share".to_string(),
            symbol: "stVLT".to_string(),
            owner,
            fee_wallet,
            timelock_seconds: DEFAULT_TIMELOCK,
            fee_bps: DEFAULT_FEE_BPS,
            decimals_offset: 0,
        }
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        if self.owner.is_zero() || self.fee_wallet.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        validate_timelock(self.timelock_seconds)?;
        validate_fee_bps(self.fee_bps)?;
        if self.decimals_offset > MAX_DECIMALS_OFFSET {
            return Err(VaultError::OutOfBounds {
                value: self.decimals_offset as u64,
                min: 0,
                max: MAX_DECIMALS_OFFSET as u64,
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

pub fn validate_timelock(seconds: u64) -> Result<(), VaultError> {
    if !(MIN_TIMELOCK..=MAX_TIMELOCK).contains(&seconds) {
        return Err(VaultError::OutOfBounds {
            value: seconds,
            min: MIN_TIMELOCK,
            max: MAX_TIMELOCK,
        });
    }
    Ok(())
}

pub fn validate_fee_bps(fee_bps: u16) -> Result<(), VaultError> {
    if fee_bps > MAX_FEE_BPS {
        return Err(VaultError::FeeTooHigh {
            fee_bps,
            max_bps: MAX_FEE_BPS,
        });
    }
    Ok(())
}
