//! Fixed-point ledger primitives
//!
//! All amounts are 256-bit unsigned integers in the asset's smallest unit.
//! Every operation is checked: overflow is reported as [`MathError::Overflow`]
//! rather than wrapping, and the rounding direction is always explicit so
//! conversions can be made to favour the vault.
//!
//! Asset/share conversions carry a virtual offset: the pool is treated as if it
//! always held one extra asset unit and `10^decimals_offset` extra shares. With
//! an offset of zero an empty vault converts 1:1, while a donation made before
//! the first deposit cannot dilute that depositor down to zero shares.

pub use primitive_types::U256;

use crate::errors::MathError;
use serde::{Deserialize, Serialize};

/// 100% expressed in basis points.
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Direction in which a division remainder is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rounding {
    /// Toward zero. Used where the vault pays out or issues.
    Floor,
    /// Away from zero. Used where the vault collects or burns.
    Ceil,
}

/// Compute `a * b / denominator` with explicit rounding.
pub fn mul_div(a: U256, b: U256, denominator: U256, rounding: Rounding) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(MathError::Overflow)?;
    let (quotient, remainder) = product.div_mod(denominator);
    match rounding {
        Rounding::Ceil if !remainder.is_zero() => {
            quotient.checked_add(U256::one()).ok_or(MathError::Overflow)
        }
        _ => Ok(quotient),
    }
}

/// `amount * bps / 10000`, floor rounding.
pub fn apply_bps(amount: U256, bps: u16) -> Result<U256, MathError> {
    mul_div(
        amount,
        U256::from(bps),
        U256::from(BPS_DENOMINATOR),
        Rounding::Floor,
    )
}

/// Virtual share supply added to every conversion: `10^decimals_offset`.
pub fn virtual_shares(decimals_offset: u8) -> Result<U256, MathError> {
    U256::from(10u64)
        .checked_pow(U256::from(decimals_offset))
        .ok_or(MathError::Overflow)
}

/// Convert an asset amount into shares at the current pool ratio.
pub fn assets_to_shares(
    assets: U256,
    total_assets: U256,
    total_shares: U256,
    decimals_offset: u8,
    rounding: Rounding,
) -> Result<U256, MathError> {
    let shares_side = total_shares
        .checked_add(virtual_shares(decimals_offset)?)
        .ok_or(MathError::Overflow)?;
    let assets_side = total_assets
        .checked_add(U256::one())
        .ok_or(MathError::Overflow)?;
    mul_div(assets, shares_side, assets_side, rounding)
}

/// Convert a share amount into assets at the current pool ratio.
pub fn shares_to_assets(
    shares: U256,
    total_assets: U256,
    total_shares: U256,
    decimals_offset: u8,
    rounding: Rounding,
) -> Result<U256, MathError> {
    let shares_side = total_shares
        .checked_add(virtual_shares(decimals_offset)?)
        .ok_or(MathError::Overflow)?;
    let assets_side = total_assets
        .checked_add(U256::one())
        .ok_or(MathError::Overflow)?;
    mul_div(shares, assets_side, shares_side, rounding)
}
