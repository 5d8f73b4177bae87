//! Vault Service: shared, clock-stamped access to a durable vault
//!
//! All operations on one vault serialize through a single mutex. A call made
//! from inside another call on the same thread (e.g. from a `read` closure)
//! is rejected with `Reentrancy` instead of deadlocking.

use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;
use vault_types::ids::Address;
use vault_types::numeric::U256;

use crate::clock::Clock;
use crate::commands::{CommandOutput, VaultCommand};
use crate::durable::{DurableVault, Ledger, LedgerError};
use crate::errors::VaultError;
use crate::events::VaultEvent;

thread_local! {
    static IN_FLIGHT: Cell<bool> = const { Cell::new(false) };
}

/// Marks this thread as inside a vault call until dropped.
struct InFlight;

impl InFlight {
    fn enter() -> Result<Self, VaultError> {
        if IN_FLIGHT.with(|flag| flag.replace(true)) {
            warn!("Re-entrant vault call rejected");
            return Err(VaultError::Reentrancy);
        }
        Ok(InFlight)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.with(|flag| flag.set(false));
    }
}

pub struct VaultService<C> {
    ledger: Arc<Mutex<DurableVault>>,
    clock: C,
}

impl<C: Clone> Clone for VaultService<C> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            clock: self.clock.clone(),
        }
    }
}

impl<C: Clock> VaultService<C> {
    pub fn new(ledger: DurableVault, clock: C) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            clock,
        }
    }

    /// Execute `command` stamped with the clock's current time.
    pub fn submit(&self, command: VaultCommand) -> Result<CommandOutput, LedgerError> {
        let _in_flight = InFlight::enter()?;
        let mut ledger = self.lock()?;
        let now = self.clock.now();
        ledger.execute(command, now)
    }

    /// Run `f` against a consistent view of the vault.
    pub fn read<T>(&self, f: impl FnOnce(&Ledger) -> T) -> Result<T, LedgerError> {
        let _in_flight = InFlight::enter()?;
        let ledger = self.lock()?;
        Ok(f(ledger.vault()))
    }

    pub fn deposit(&self, caller: Address, assets: U256, receiver: Address) -> Result<U256, LedgerError> {
        self.submit_amount(VaultCommand::Deposit {
            caller,
            assets,
            receiver,
        })
    }

    pub fn mint(&self, caller: Address, shares: U256, receiver: Address) -> Result<U256, LedgerError> {
        self.submit_amount(VaultCommand::Mint {
            caller,
            shares,
            receiver,
        })
    }

    pub fn withdraw(
        &self,
        caller: Address,
        assets: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<U256, LedgerError> {
        self.submit_amount(VaultCommand::Withdraw {
            caller,
            assets,
            receiver,
            owner,
        })
    }

    pub fn redeem(
        &self,
        caller: Address,
        shares: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<U256, LedgerError> {
        self.submit_amount(VaultCommand::Redeem {
            caller,
            shares,
            receiver,
            owner,
        })
    }

    /// Shares of `owner` withdrawable at the clock's current time.
    pub fn withdrawable_shares(&self, owner: Address) -> Result<U256, LedgerError> {
        let now = self.clock.now();
        self.read(|v| v.withdrawable_shares(&owner, now))?
            .map_err(LedgerError::from)
    }

    pub fn withdrawable_assets(&self, owner: Address) -> Result<U256, LedgerError> {
        let now = self.clock.now();
        self.read(|v| v.withdrawable_assets(&owner, now))?
            .map_err(LedgerError::from)
    }

    pub fn drain_events(&self) -> Result<Vec<VaultEvent>, LedgerError> {
        let _in_flight = InFlight::enter()?;
        Ok(self.lock()?.drain_events())
    }

    pub fn snapshot(&self) -> Result<(), LedgerError> {
        let _in_flight = InFlight::enter()?;
        self.lock()?.snapshot().map(|_| ())
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn submit_amount(&self, command: VaultCommand) -> Result<U256, LedgerError> {
        let output = self.submit(command)?;
        Ok(output.amount().unwrap_or_else(U256::zero))
    }

    fn lock(&self) -> Result<MutexGuard<'_, DurableVault>, LedgerError> {
        self.ledger.lock().map_err(|_| LedgerError::LockPoisoned)
    }
}
