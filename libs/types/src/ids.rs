//! Account identifiers
//!
//! Every participant (depositor, receiver, fee wallet, owner, the vault's own
//! custody account) is an `Address`. Addresses are UUID v7 values, so freshly
//! created ones sort by creation time. The nil UUID is reserved as the zero
//! address and is rejected wherever a real account is required.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier for an account holding assets or shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(Uuid);

impl Address {
    /// The reserved zero address (nil UUID).
    pub const ZERO: Address = Address(Uuid::nil());

    /// Create a new, unique address.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// True for the reserved zero address.
    pub fn is_zero(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
