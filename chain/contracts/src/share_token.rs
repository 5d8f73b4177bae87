//! Vault share token balances and allowances
//!
//! Plain balance bookkeeping. Queue maintenance for transfers lives in the
//! vault, which owns both this token and the deposit records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vault_types::ids::Address;
use vault_types::numeric::U256;

use crate::errors::VaultError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareToken {
    balances: BTreeMap<Address, U256>,
    /// owner -> spender -> remaining allowance
    allowances: BTreeMap<Address, BTreeMap<Address, U256>>,
    total_supply: U256,
}

impl ShareToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_else(U256::zero)
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or_else(U256::zero)
    }

    /// Iterate holders with a non-zero balance.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &U256)> {
        self.balances.iter()
    }

    pub fn mint(&mut self, to: &Address, shares: U256) -> Result<(), VaultError> {
        if to.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        let supply = self
            .total_supply
            .checked_add(shares)
            .ok_or(VaultError::Overflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(shares)
            .ok_or(VaultError::Overflow)?;
        self.set_balance(to, balance);
        self.total_supply = supply;
        Ok(())
    }

    pub fn burn(&mut self, from: &Address, shares: U256) -> Result<(), VaultError> {
        let available = self.balance_of(from);
        let balance = available
            .checked_sub(shares)
            .ok_or(VaultError::InsufficientBalance {
                required: shares,
                available,
            })?;
        let supply = self
            .total_supply
            .checked_sub(shares)
            .ok_or(VaultError::Overflow)?;
        self.set_balance(from, balance);
        self.total_supply = supply;
        Ok(())
    }

    pub fn transfer(&mut self, from: &Address, to: &Address, shares: U256) -> Result<(), VaultError> {
        if to.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        let available = self.balance_of(from);
        let from_balance = available
            .checked_sub(shares)
            .ok_or(VaultError::InsufficientBalance {
                required: shares,
                available,
            })?;
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(shares)
            .ok_or(VaultError::Overflow)?;
        self.set_balance(from, from_balance);
        self.set_balance(to, to_balance);
        Ok(())
    }

    pub fn approve(&mut self, owner: &Address, spender: &Address, shares: U256) -> Result<(), VaultError> {
        if owner.is_zero() || spender.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        let spenders = self.allowances.entry(*owner).or_default();
        if shares.is_zero() {
            spenders.remove(spender);
            if spenders.is_empty() {
                self.allowances.remove(owner);
            }
        } else {
            spenders.insert(*spender, shares);
        }
        Ok(())
    }

    /// Deduct `shares` from `spender`'s allowance over `owner`. An allowance
    /// of `U256::MAX` is unlimited and never decreases.
    pub fn spend_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        shares: U256,
    ) -> Result<(), VaultError> {
        let current = self.allowance(owner, spender);
        if current == U256::MAX {
            return Ok(());
        }
        let remaining = current
            .checked_sub(shares)
            .ok_or(VaultError::InsufficientAllowance {
                required: shares,
                available: current,
            })?;
        self.approve(owner, spender, remaining)
    }

    fn set_balance(&mut self, account: &Address, balance: U256) {
        if balance.is_zero() {
            self.balances.remove(account);
        } else {
            self.balances.insert(*account, balance);
        }
    }
}
