//! Vault error taxonomy
//!
//! Every failing operation returns one of these and leaves the ledger exactly
//! as it was before the call.

use thiserror::Error;
use vault_types::errors::MathError;
use vault_types::ids::Address;
use vault_types::numeric::U256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Zero address is not a valid account")]
    ZeroAddress,

    #[error("Arithmetic overflow in ledger calculation")]
    Overflow,

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("Timelock not expired: requested {requested} shares, {withdrawable} withdrawable")]
    TimelockNotExpired { requested: U256, withdrawable: U256 },

    #[error("Value {value} out of bounds [{min}, {max}]")]
    OutOfBounds { value: u64, min: u64, max: u64 },

    #[error("Fee of {fee_bps} bps exceeds maximum of {max_bps} bps")]
    FeeTooHigh { fee_bps: u16, max_bps: u16 },

    #[error("Unauthorized: {caller} is not the owner")]
    Unauthorized { caller: Address },

    #[error("Insufficient tokens in contract: required {required}, available {available}")]
    InsufficientTokensInContract { required: U256, available: U256 },

    #[error("Insufficient withdrawable shares: requested {requested}, withdrawable {withdrawable}")]
    InsufficientWithdrawable { requested: U256, withdrawable: U256 },

    #[error("Insufficient allowance: required {required}, available {available}")]
    InsufficientAllowance { required: U256, available: U256 },

    #[error("Reentrancy detected")]
    Reentrancy,

    #[error("Operation would issue zero shares")]
    ZeroShares,

    #[error("Ledger invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<MathError> for VaultError {
    fn from(_: MathError) -> Self {
        VaultError::Overflow
    }
}
