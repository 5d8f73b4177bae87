//! Withdrawal fee split
//!
//! A withdrawal fee is charged in basis points of the gross amount and then
//! divided three ways: half to the fee wallet, a quarter burned, and whatever
//! remains (nominally the last quarter) re-staked by leaving it in custody.
//! The re-stake share is computed as the remainder so the three parts always
//! sum to the total fee exactly.

use serde::{Deserialize, Serialize};

use crate::errors::MathError;
use crate::numeric::{apply_bps, U256};

/// Highest withdrawal fee the vault accepts (10%).
pub const MAX_FEE_BPS: u16 = 1_000;

/// Fee applied to a freshly configured vault (3%).
pub const DEFAULT_FEE_BPS: u16 = 300;

/// Portion of the total fee sent to the fee wallet (50%).
pub const WALLET_SHARE_BPS: u16 = 5_000;

/// Portion of the total fee burned (25%).
pub const BURN_SHARE_BPS: u16 = 2_500;

/// Result of splitting a gross withdrawal amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    /// Amount before fees.
    pub gross: U256,
    /// `gross * fee_bps / 10000`.
    pub total_fee: U256,
    pub to_wallet: U256,
    pub to_burn: U256,
    pub to_restake: U256,
    /// Amount paid to the receiver: `gross - total_fee`.
    pub net: U256,
}

impl FeeSplit {
    /// Split `gross` under a fee of `fee_bps`.
    pub fn compute(gross: U256, fee_bps: u16) -> Result<Self, MathError> {
        let total_fee = apply_bps(gross, fee_bps)?;
        let to_wallet = apply_bps(total_fee, WALLET_SHARE_BPS)?;
        let to_burn = apply_bps(total_fee, BURN_SHARE_BPS)?;
        let to_restake = total_fee
            .checked_sub(to_wallet)
            .and_then(|rest| rest.checked_sub(to_burn))
            .ok_or(MathError::Overflow)?;
        let net = gross.checked_sub(total_fee).ok_or(MathError::Overflow)?;

        Ok(Self {
            gross,
            total_fee,
            to_wallet,
            to_burn,
            to_restake,
            net,
        })
    }

    pub fn is_fee_free(&self) -> bool {
        self.total_fee.is_zero()
    }
}
