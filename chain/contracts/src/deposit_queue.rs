//! Per-depositor FIFO deposit queue
//!
//! Each depositor owns an append-only list of `(shares, timestamp)` entries and
//! a cursor to the first entry that still holds shares. Entries unlock once
//! `timestamp + timelock <= now` and are consumed strictly from the cursor
//! forward: a later deposit can never be withdrawn ahead of an earlier one that
//! is still locked.
//!
//! Consumed entries stay in the list (with zero shares) so entry indices are
//! stable for the lifetime of the record.

use serde::{Deserialize, Serialize};
use vault_types::numeric::U256;

use crate::errors::VaultError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEntry {
    /// Shares remaining in this entry.
    pub shares: U256,
    /// Unix seconds the entry was recorded at.
    pub timestamp: u64,
}

impl DepositEntry {
    pub fn unlock_time(&self, timelock_seconds: u64) -> u64 {
        self.timestamp.saturating_add(timelock_seconds)
    }

    pub fn is_unlocked(&self, now: u64, timelock_seconds: u64) -> bool {
        self.unlock_time(timelock_seconds) <= now
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    entries: Vec<DepositEntry>,
    start_index: usize,
}

impl DepositRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry ever recorded, including fully consumed ones.
    pub fn entries(&self) -> &[DepositEntry] {
        &self.entries
    }

    /// Entries from the cursor onward.
    pub fn active_entries(&self) -> &[DepositEntry] {
        &self.entries[self.start_index..]
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.entries.last().map(|e| e.timestamp)
    }

    /// Record a new entry. A timestamp older than the newest entry is raised
    /// to it so the list stays non-decreasing. Returns the stored timestamp.
    pub fn append(&mut self, shares: U256, timestamp: u64) -> u64 {
        let timestamp = timestamp.max(self.last_timestamp().unwrap_or(0));
        self.entries.push(DepositEntry { shares, timestamp });
        timestamp
    }

    /// Sum of shares in active entries.
    pub fn balance(&self) -> Result<U256, VaultError> {
        self.active_entries()
            .iter()
            .try_fold(U256::zero(), |acc, e| acc.checked_add(e.shares))
            .ok_or(VaultError::Overflow)
    }

    /// Shares in the unlocked prefix of the queue, stopping at the first entry
    /// that is still locked.
    pub fn withdrawable_shares(&self, now: u64, timelock_seconds: u64) -> Result<U256, VaultError> {
        let mut total = U256::zero();
        for entry in self.active_entries() {
            if !entry.is_unlocked(now, timelock_seconds) {
                break;
            }
            total = total.checked_add(entry.shares).ok_or(VaultError::Overflow)?;
        }
        Ok(total)
    }

    /// Remove `shares` from the unlocked prefix. Nothing is modified on error.
    /// Returns the new cursor.
    pub fn consume(
        &mut self,
        shares: U256,
        now: u64,
        timelock_seconds: u64,
    ) -> Result<usize, VaultError> {
        let withdrawable = self.withdrawable_shares(now, timelock_seconds)?;
        if shares > withdrawable {
            return Err(VaultError::InsufficientWithdrawable {
                requested: shares,
                withdrawable,
            });
        }
        Ok(self.take_front(shares))
    }

    /// Remove `shares` from the front regardless of locks, as a share transfer
    /// does. Nothing is modified on error. Returns the new cursor.
    pub fn drain(&mut self, shares: U256) -> Result<usize, VaultError> {
        let available = self.balance()?;
        if shares > available {
            return Err(VaultError::InsufficientBalance {
                required: shares,
                available,
            });
        }
        Ok(self.take_front(shares))
    }

    /// Caller guarantees the active entries hold at least `shares`.
    fn take_front(&mut self, mut shares: U256) -> usize {
        while !shares.is_zero() && self.start_index < self.entries.len() {
            let entry = &mut self.entries[self.start_index];
            if entry.shares > shares {
                entry.shares -= shares;
                shares = U256::zero();
            } else {
                shares -= entry.shares;
                entry.shares = U256::zero();
                self.start_index += 1;
            }
        }
        // Skip any empty entries left at the cursor
        while self.start_index < self.entries.len() && self.entries[self.start_index].shares.is_zero() {
            self.start_index += 1;
        }
        self.start_index
    }
}
