//! Vault events
//!
//! Events are immutable notifications for external observers. They are kept
//! in an append-only log on the vault and are not part of persisted state.

use serde::{Deserialize, Serialize};
use vault_types::ids::Address;
use vault_types::numeric::U256;

/// A new deposit entry was appended to a depositor's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecorded {
    pub owner: Address,
    pub shares: U256,
    pub timestamp: u64,
}

/// Assets entered custody and shares were minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub caller: Address,
    pub receiver: Address,
    pub assets: U256,
    pub shares: U256,
}

/// Asset-denominated withdrawal. `assets` is the gross amount before fees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawExecuted {
    pub owner: Address,
    pub receiver: Address,
    pub assets: U256,
    pub shares: U256,
}

/// Share-denominated withdrawal. `assets` is the gross amount before fees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemExecuted {
    pub owner: Address,
    pub receiver: Address,
    pub shares: U256,
    pub assets: U256,
}

/// Three-way breakdown of a withdrawal fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawFeeCollected {
    pub owner: Address,
    pub total_fee: U256,
    pub to_wallet: U256,
    pub to_burn: U256,
    pub to_restake: U256,
}

/// Asset supply destroyed out of custody. `burned < requested` on shortfall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBurned {
    pub requested: U256,
    pub burned: U256,
}

/// Shares consumed from the front of a depositor's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositsRemoved {
    pub owner: Address,
    pub shares: U256,
    pub new_start_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharesTransferred {
    pub from: Address,
    pub to: Address,
    pub shares: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub owner: Address,
    pub spender: Address,
    pub shares: U256,
}

/// Admin parameter change; `old` and `new` carry the parameter's values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterUpdated<T> {
    pub old: T,
    pub new: T,
}

/// Enum wrapper for all vault events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    DepositRecorded(DepositRecorded),
    Deposited(Deposited),
    WithdrawExecuted(WithdrawExecuted),
    RedeemExecuted(RedeemExecuted),
    WithdrawFeeCollected(WithdrawFeeCollected),
    FeeBurned(FeeBurned),
    DepositsRemoved(DepositsRemoved),
    SharesTransferred(SharesTransferred),
    Approval(Approval),
    FeeWalletUpdated(ParameterUpdated<Address>),
    TimelockUpdated(ParameterUpdated<u64>),
    FeeBpsUpdated(ParameterUpdated<u16>),
    OwnershipTransferred(ParameterUpdated<Address>),
}

impl VaultEvent {
    /// Stable event name for logs and filtering.
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::DepositRecorded(_) => "DepositRecorded",
            VaultEvent::Deposited(_) => "Deposited",
            VaultEvent::WithdrawExecuted(_) => "WithdrawExecuted",
            VaultEvent::RedeemExecuted(_) => "RedeemExecuted",
            VaultEvent::WithdrawFeeCollected(_) => "WithdrawFeeCollected",
            VaultEvent::FeeBurned(_) => "FeeBurned",
            VaultEvent::DepositsRemoved(_) => "DepositsRemoved",
            VaultEvent::SharesTransferred(_) => "SharesTransferred",
            VaultEvent::Approval(_) => "Approval",
            VaultEvent::FeeWalletUpdated(_) => "FeeWalletUpdated",
            VaultEvent::TimelockUpdated(_) => "TimelockUpdated",
            VaultEvent::FeeBpsUpdated(_) => "FeeBpsUpdated",
            VaultEvent::OwnershipTransferred(_) => "OwnershipTransferred",
        }
    }
}
