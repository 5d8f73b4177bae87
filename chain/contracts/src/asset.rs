//! Custodied asset capability
//!
//! The vault never owns an asset ledger's rules; it only needs to move the
//! asset between accounts and destroy supply held in custody. `FungibleAsset`
//! is the in-process implementation used by the durable ledger, so asset
//! movements commit in the same journaled step as vault state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vault_types::ids::Address;
use vault_types::numeric::U256;

use crate::errors::VaultError;

/// Transfer and burn capability over a fungible asset.
pub trait AssetLedger {
    fn balance_of(&self, account: &Address) -> U256;

    fn total_supply(&self) -> U256;

    /// Move `amount` from `from` to `to`. Zero amounts are a no-op.
    fn transfer(&mut self, from: &Address, to: &Address, amount: U256) -> Result<(), VaultError>;

    /// Destroy `amount` held by `from`, reducing total supply.
    fn burn(&mut self, from: &Address, amount: U256) -> Result<(), VaultError>;
}

/// Balance-map fungible token with a fixed genesis supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FungibleAsset {
    symbol: String,
    balances: BTreeMap<Address, U256>,
    total_supply: U256,
}

impl FungibleAsset {
    /// Create the asset with `supply` held by `holder`.
    pub fn genesis(
        symbol: impl Into<String>,
        holder: Address,
        supply: U256,
    ) -> Result<Self, VaultError> {
        if holder.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        let mut balances = BTreeMap::new();
        if !supply.is_zero() {
            balances.insert(holder, supply);
        }
        Ok(Self {
            symbol: symbol.into(),
            balances,
            total_supply: supply,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Sum of all balances; equals `total_supply` while the ledger is sound.
    pub fn circulating(&self) -> Result<U256, VaultError> {
        self.balances
            .values()
            .try_fold(U256::zero(), |acc, b| acc.checked_add(*b))
            .ok_or(VaultError::Overflow)
    }

    fn debit(&mut self, account: &Address, amount: U256) -> Result<(), VaultError> {
        let available = self.balance_of(account);
        let remaining = available
            .checked_sub(amount)
            .ok_or(VaultError::InsufficientBalance {
                required: amount,
                available,
            })?;
        if remaining.is_zero() {
            self.balances.remove(account);
        } else {
            self.balances.insert(*account, remaining);
        }
        Ok(())
    }
}

impl AssetLedger for FungibleAsset {
    fn balance_of(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_else(U256::zero)
    }

    fn total_supply(&self) -> U256 {
        self.total_supply
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: U256) -> Result<(), VaultError> {
        if to.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        if amount.is_zero() || from == to {
            return if self.balance_of(from) >= amount {
                Ok(())
            } else {
                Err(VaultError::InsufficientBalance {
                    required: amount,
                    available: self.balance_of(from),
                })
            };
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;
        self.debit(from, amount)?;
        self.balances.insert(*to, credited);
        Ok(())
    }

    fn burn(&mut self, from: &Address, amount: U256) -> Result<(), VaultError> {
        if amount.is_zero() {
            return Ok(());
        }
        let supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(VaultError::Overflow)?;
        self.debit(from, amount)?;
        self.total_supply = supply;
        Ok(())
    }
}
