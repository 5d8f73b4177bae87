//! Error types for ledger arithmetic

use thiserror::Error;

/// Failure of a checked fixed-point operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Division by zero")]
    DivisionByZero,
}
