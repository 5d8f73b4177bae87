//! Types library for the time-locked staking vault
//!
//! Leaf crate shared by the vault ledger and its persistence layer: account
//! identifiers, checked 256-bit ledger arithmetic, and the withdrawal fee split.
//!
//! # Modules
//! - `ids`: Account addresses (with the reserved zero address)
//! - `numeric`: `U256` amounts, rounding-explicit `mul_div`, asset/share conversion
//! - `fee`: Basis-point fee split (wallet / burn / re-stake)
//! - `errors`: Arithmetic error taxonomy

pub mod ids;
pub mod numeric;
pub mod fee;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::fee::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
}
