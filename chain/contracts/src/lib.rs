//! Time-Locked Staking Vault
//!
//! A custodial ledger that accepts a fungible asset, issues shares at a
//! floating exchange rate, and releases them through a per-depositor FIFO
//! queue once each deposit's timelock has elapsed. Withdrawals pay a fee
//! split between a fee wallet, a burn, and the remaining share holders.
//!
//! # Modules
//! - `errors`: Vault error taxonomy
//! - `events`: Events emitted by state changes
//! - `security`: Reentrancy guard and single-owner access control
//! - `asset`: Asset custody capability and the in-process fungible asset
//! - `share_token`: Share balances and allowances
//! - `deposit_queue`: Per-depositor FIFO of time-locked deposit entries
//! - `fees`: Fee distributor (wallet / burn / re-stake)
//! - `config`: Construction parameters and bounds
//! - `vault`: Deposits, withdrawals, previews and the read surface
//! - `admin`: Owner-gated parameter setters
//! - `commands`: Serializable ledger commands
//! - `durable`: Journaled vault with snapshot recovery
//! - `clock`: Time sources
//! - `service`: Shared, clock-stamped access to a durable vault

pub mod errors;
pub mod events;
pub mod security;
pub mod asset;
pub mod share_token;
pub mod deposit_queue;
pub mod fees;
pub mod config;
pub mod vault;
pub mod admin;
pub mod commands;
pub mod durable;
pub mod clock;
pub mod service;

pub use asset::{AssetLedger, FungibleAsset};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{CommandOutput, VaultCommand};
pub use config::{ConfigError, VaultConfig};
pub use durable::{DurableConfig, DurableVault, Ledger, LedgerError};
pub use errors::VaultError;
pub use events::VaultEvent;
pub use service::VaultService;
pub use vault::StakingVault;
