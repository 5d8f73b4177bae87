//! Vault: custody, share accounting and FIFO time-locked withdrawals
//!
//! Depositors hand assets to the vault's custody account and receive shares
//! at the current exchange rate. Every deposit is also recorded as an entry in
//! the receiver's deposit queue; shares only become withdrawable once their
//! entry's timelock has elapsed, oldest entry first. Withdrawals pay a fee that
//! is split between the fee wallet, a burn, and the remaining holders.
//!
//! Every state-changing operation:
//! 1. Acquires the reentrancy guard
//! 2. Validates all inputs and balances
//! 3. Mutates shares, deposit queue and custody, in that order
//! 4. Emits events
//!
//! Validation completes before the first mutation, so a failing call leaves
//! the vault untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use vault_types::fee::FeeSplit;
use vault_types::ids::Address;
use vault_types::numeric::{assets_to_shares, shares_to_assets, Rounding, U256};

use crate::asset::AssetLedger;
use crate::config::{validate_fee_bps, validate_timelock, VaultConfig};
use crate::deposit_queue::{DepositEntry, DepositRecord};
use crate::errors::VaultError;
use crate::events::{
    Approval, DepositRecorded, Deposited, DepositsRemoved, FeeBurned, RedeemExecuted,
    SharesTransferred, VaultEvent, WithdrawExecuted, WithdrawFeeCollected,
};
use crate::fees::{FeeDistributor, FeeOutcome};
use crate::security::{Ownable, ReentrancyGuard};
use crate::share_token::ShareToken;

/// Time-locked staking vault over asset ledger `A`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingVault<A> {
    /// Custody account inside the asset ledger.
    pub(crate) address: Address,
    pub(crate) name: String,
    pub(crate) symbol: String,
    pub(crate) ownable: Ownable,
    pub(crate) fee_wallet: Address,
    pub(crate) timelock_seconds: u64,
    pub(crate) fee_bps: u16,
    pub(crate) decimals_offset: u8,
    pub(crate) asset: A,
    pub(crate) shares: ShareToken,
    pub(crate) records: BTreeMap<Address, DepositRecord>,
    #[serde(skip)]
    pub(crate) guard: ReentrancyGuard,
    #[serde(skip)]
    pub(crate) events: Vec<VaultEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Withdraw,
    Redeem,
}

impl<A: AssetLedger> StakingVault<A> {
    /// Create an empty vault. Its custody account is a fresh address.
    pub fn new(config: VaultConfig, asset: A) -> Result<Self, VaultError> {
        config.validate()?;
        let vault = Self {
            address: Address::new(),
            name: config.name,
            symbol: config.symbol,
            ownable: Ownable::new(config.owner)?,
            fee_wallet: config.fee_wallet,
            timelock_seconds: config.timelock_seconds,
            fee_bps: config.fee_bps,
            decimals_offset: config.decimals_offset,
            asset,
            shares: ShareToken::new(),
            records: BTreeMap::new(),
            guard: ReentrancyGuard::new(),
            events: Vec::new(),
        };
        info!(
            vault = %vault.address,
            owner = %vault.ownable.owner(),
            timelock_seconds = vault.timelock_seconds,
            fee_bps = vault.fee_bps,
            "Vault created"
        );
        Ok(vault)
    }

    // ───────────────────────── Deposit / Mint ─────────────────────────

    /// Deposit `assets` from `caller`, minting shares (rounded down) to
    /// `receiver`. Returns the shares minted.
    pub fn deposit(
        &mut self,
        caller: &Address,
        assets: U256,
        receiver: &Address,
        now: u64,
    ) -> Result<U256, VaultError> {
        self.guarded(|v| {
            if assets.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            if receiver.is_zero() {
                return Err(VaultError::ZeroAddress);
            }
            let shares = v.preview_deposit(assets)?;
            if shares.is_zero() {
                return Err(VaultError::ZeroShares);
            }
            v.enter(caller, receiver, assets, shares, now)?;
            Ok(shares)
        })
    }

    /// Mint exactly `shares` to `receiver`, pulling the required assets
    /// (rounded up) from `caller`. Returns the assets pulled.
    pub fn mint(
        &mut self,
        caller: &Address,
        shares: U256,
        receiver: &Address,
        now: u64,
    ) -> Result<U256, VaultError> {
        self.guarded(|v| {
            if shares.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            if receiver.is_zero() {
                return Err(VaultError::ZeroAddress);
            }
            let assets = v.preview_mint(shares)?;
            v.enter(caller, receiver, assets, shares, now)?;
            Ok(assets)
        })
    }

    fn enter(
        &mut self,
        caller: &Address,
        receiver: &Address,
        assets: U256,
        shares: U256,
        now: u64,
    ) -> Result<(), VaultError> {
        // Custody cannot fund its own shares
        if *caller == self.address {
            return Err(VaultError::Unauthorized { caller: *caller });
        }
        let available = self.asset.balance_of(caller);
        if available < assets {
            return Err(VaultError::InsufficientBalance {
                required: assets,
                available,
            });
        }
        self.shares
            .total_supply()
            .checked_add(shares)
            .ok_or(VaultError::Overflow)?;
        self.total_assets()
            .checked_add(assets)
            .ok_or(VaultError::Overflow)?;

        self.asset.transfer(caller, &self.address, assets)?;
        self.shares.mint(receiver, shares)?;
        let timestamp = self
            .records
            .entry(*receiver)
            .or_default()
            .append(shares, now);

        debug!(
            caller = %caller,
            receiver = %receiver,
            assets = %assets,
            shares = %shares,
            timestamp,
            "Deposit recorded"
        );
        self.events.push(VaultEvent::DepositRecorded(DepositRecorded {
            owner: *receiver,
            shares,
            timestamp,
        }));
        self.events.push(VaultEvent::Deposited(Deposited {
            caller: *caller,
            receiver: *receiver,
            assets,
            shares,
        }));
        Ok(())
    }

    // ───────────────────────── Withdraw / Redeem ─────────────────────────

    /// Withdraw `assets` (gross, before fees) on behalf of `owner`, paying the
    /// net amount to `receiver`. Burns shares rounded up. Returns the shares
    /// burned.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        assets: U256,
        receiver: &Address,
        owner: &Address,
        now: u64,
    ) -> Result<U256, VaultError> {
        self.guarded(|v| {
            if assets.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            if receiver.is_zero() || owner.is_zero() {
                return Err(VaultError::ZeroAddress);
            }
            let shares = v.preview_withdraw(assets)?;
            v.exit(caller, receiver, owner, assets, shares, now, Exit::Withdraw)?;
            Ok(shares)
        })
    }

    /// Redeem `shares` of `owner`, paying the net assets (gross rounded down,
    /// minus fees) to `receiver`. Returns the net assets paid.
    pub fn redeem(
        &mut self,
        caller: &Address,
        shares: U256,
        receiver: &Address,
        owner: &Address,
        now: u64,
    ) -> Result<U256, VaultError> {
        self.guarded(|v| {
            if shares.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            if receiver.is_zero() || owner.is_zero() {
                return Err(VaultError::ZeroAddress);
            }
            let assets = v.preview_redeem(shares)?;
            let outcome = v.exit(caller, receiver, owner, assets, shares, now, Exit::Redeem)?;
            Ok(outcome.split.net)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn exit(
        &mut self,
        caller: &Address,
        receiver: &Address,
        owner: &Address,
        assets: U256,
        shares: U256,
        now: u64,
        kind: Exit,
    ) -> Result<FeeOutcome, VaultError> {
        let balance = self.shares.balance_of(owner);
        if shares > balance {
            return Err(VaultError::InsufficientBalance {
                required: shares,
                available: balance,
            });
        }
        let withdrawable = self.withdrawable_shares(owner, now)?;
        if shares > withdrawable {
            return Err(VaultError::TimelockNotExpired {
                requested: shares,
                withdrawable,
            });
        }
        let delegated = caller != owner;
        if delegated {
            let allowed = self.shares.allowance(owner, caller);
            if allowed < shares {
                return Err(VaultError::InsufficientAllowance {
                    required: shares,
                    available: allowed,
                });
            }
        }
        let split = FeeSplit::compute(assets, self.fee_bps)?;
        let required = split
            .net
            .checked_add(split.to_wallet)
            .ok_or(VaultError::Overflow)?;
        let available = self.total_assets();
        if available < required {
            return Err(VaultError::InsufficientTokensInContract {
                required,
                available,
            });
        }

        // Queue and supply first, custody last
        if delegated {
            self.shares.spend_allowance(owner, caller, shares)?;
        }
        let timelock = self.timelock_seconds;
        let new_start_index = self
            .records
            .get_mut(owner)
            .ok_or_else(|| {
                VaultError::InvariantViolation(format!("{owner} holds shares without a deposit record"))
            })?
            .consume(shares, now, timelock)?;
        self.shares.burn(owner, shares)?;
        let outcome = FeeDistributor::apply(
            &mut self.asset,
            &self.address,
            receiver,
            &self.fee_wallet,
            split,
        )?;

        debug!(
            kind = ?kind,
            owner = %owner,
            receiver = %receiver,
            shares = %shares,
            gross = %assets,
            net = %split.net,
            "Withdrawal executed"
        );
        self.events.push(VaultEvent::DepositsRemoved(DepositsRemoved {
            owner: *owner,
            shares,
            new_start_index,
        }));
        self.events.push(match kind {
            Exit::Withdraw => VaultEvent::WithdrawExecuted(WithdrawExecuted {
                owner: *owner,
                receiver: *receiver,
                assets,
                shares,
            }),
            Exit::Redeem => VaultEvent::RedeemExecuted(RedeemExecuted {
                owner: *owner,
                receiver: *receiver,
                shares,
                assets,
            }),
        });
        if !split.is_fee_free() {
            self.events.push(VaultEvent::WithdrawFeeCollected(WithdrawFeeCollected {
                owner: *owner,
                total_fee: split.total_fee,
                to_wallet: split.to_wallet,
                to_burn: split.to_burn,
                to_restake: split.to_restake,
            }));
        }
        if !split.to_burn.is_zero() {
            self.events.push(VaultEvent::FeeBurned(FeeBurned {
                requested: split.to_burn,
                burned: outcome.burned,
            }));
        }
        Ok(outcome)
    }

    // ───────────────────────── Share Token ─────────────────────────

    pub fn approve(
        &mut self,
        owner: &Address,
        spender: &Address,
        shares: U256,
    ) -> Result<(), VaultError> {
        self.guarded(|v| {
            v.shares.approve(owner, spender, shares)?;
            v.events.push(VaultEvent::Approval(Approval {
                owner: *owner,
                spender: *spender,
                shares,
            }));
            Ok(())
        })
    }

    /// Move `shares` from `from` to `to`. The sender's queue is drained from
    /// the front regardless of locks; the recipient gets one new entry stamped
    /// `now`.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        shares: U256,
        now: u64,
    ) -> Result<(), VaultError> {
        self.guarded(|v| v.move_shares(from, to, shares, now))
    }

    /// `transfer` on behalf of `from`, spending `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        shares: U256,
        now: u64,
    ) -> Result<(), VaultError> {
        self.guarded(|v| {
            let allowed = v.shares.allowance(from, spender);
            if allowed < shares {
                return Err(VaultError::InsufficientAllowance {
                    required: shares,
                    available: allowed,
                });
            }
            v.move_shares(from, to, shares, now)?;
            v.shares.spend_allowance(from, spender, shares)
        })
    }

    fn move_shares(
        &mut self,
        from: &Address,
        to: &Address,
        shares: U256,
        now: u64,
    ) -> Result<(), VaultError> {
        if shares.is_zero() {
            return Err(VaultError::ZeroAmount);
        }
        if from.is_zero() || to.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        let balance = self.shares.balance_of(from);
        if shares > balance {
            return Err(VaultError::InsufficientBalance {
                required: shares,
                available: balance,
            });
        }
        if from == to {
            return Ok(());
        }

        self.shares.transfer(from, to, shares)?;
        let new_start_index = match self.records.get_mut(from) {
            Some(record) => record.drain(shares)?,
            None => {
                return Err(VaultError::InvariantViolation(format!(
                    "{from} holds shares without a deposit record"
                )))
            }
        };
        let timestamp = self.records.entry(*to).or_default().append(shares, now);

        debug!(from = %from, to = %to, shares = %shares, "Shares transferred");
        self.events.push(VaultEvent::DepositsRemoved(DepositsRemoved {
            owner: *from,
            shares,
            new_start_index,
        }));
        self.events.push(VaultEvent::DepositRecorded(DepositRecorded {
            owner: *to,
            shares,
            timestamp,
        }));
        self.events.push(VaultEvent::SharesTransferred(SharesTransferred {
            from: *from,
            to: *to,
            shares,
        }));
        Ok(())
    }

    // ───────────────────────── External Asset Movement ─────────────────────────

    /// Move the underlying asset between accounts outside the share
    /// accounting, e.g. funding a wallet or donating into custody. Transfers
    /// out of custody are refused.
    pub fn transfer_asset(
        &mut self,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), VaultError> {
        self.guarded(|v| {
            if *from == v.address {
                return Err(VaultError::Unauthorized { caller: *from });
            }
            v.asset.transfer(from, to, amount)?;
            debug!(from = %from, to = %to, amount = %amount, "Asset transferred");
            Ok(())
        })
    }

    // ───────────────────────── Conversions & Previews ─────────────────────────

    /// Shares for `assets` at the current rate, rounded down. Fee-free.
    pub fn convert_to_shares(&self, assets: U256) -> Result<U256, VaultError> {
        self.to_shares(assets, Rounding::Floor)
    }

    /// Assets for `shares` at the current rate, rounded down. Fee-free.
    pub fn convert_to_assets(&self, shares: U256) -> Result<U256, VaultError> {
        self.to_assets(shares, Rounding::Floor)
    }

    pub fn preview_deposit(&self, assets: U256) -> Result<U256, VaultError> {
        self.to_shares(assets, Rounding::Floor)
    }

    pub fn preview_mint(&self, shares: U256) -> Result<U256, VaultError> {
        self.to_assets(shares, Rounding::Ceil)
    }

    /// Shares burned to withdraw `assets` gross, rounded up.
    pub fn preview_withdraw(&self, assets: U256) -> Result<U256, VaultError> {
        self.to_shares(assets, Rounding::Ceil)
    }

    /// Gross assets for redeeming `shares`, rounded down.
    pub fn preview_redeem(&self, shares: U256) -> Result<U256, VaultError> {
        self.to_assets(shares, Rounding::Floor)
    }

    /// Net assets a receiver would get from withdrawing `assets` gross.
    pub fn preview_withdraw_after_fee(&self, assets: U256) -> Result<U256, VaultError> {
        Ok(FeeDistributor::preview(assets, self.fee_bps)?.net)
    }

    /// Net assets a receiver would get from redeeming `shares`.
    pub fn preview_redeem_after_fee(&self, shares: U256) -> Result<U256, VaultError> {
        let gross = self.preview_redeem(shares)?;
        Ok(FeeDistributor::preview(gross, self.fee_bps)?.net)
    }

    fn to_shares(&self, assets: U256, rounding: Rounding) -> Result<U256, VaultError> {
        Ok(assets_to_shares(
            assets,
            self.total_assets(),
            self.shares.total_supply(),
            self.decimals_offset,
            rounding,
        )?)
    }

    fn to_assets(&self, shares: U256, rounding: Rounding) -> Result<U256, VaultError> {
        Ok(shares_to_assets(
            shares,
            self.total_assets(),
            self.shares.total_supply(),
            self.decimals_offset,
            rounding,
        )?)
    }

    // ───────────────────────── Withdrawable Projections ─────────────────────────

    pub fn withdrawable_shares(&self, owner: &Address, now: u64) -> Result<U256, VaultError> {
        match self.records.get(owner) {
            Some(record) => record.withdrawable_shares(now, self.timelock_seconds),
            None => Ok(U256::zero()),
        }
    }

    pub fn withdrawable_assets(&self, owner: &Address, now: u64) -> Result<U256, VaultError> {
        let shares = self.withdrawable_shares(owner, now)?;
        self.convert_to_assets(shares)
    }

    /// Largest gross `assets` a `withdraw` by `owner` can request at `now`.
    pub fn max_withdraw(&self, owner: &Address, now: u64) -> Result<U256, VaultError> {
        self.withdrawable_assets(owner, now)
    }

    /// Largest `shares` a `redeem` by `owner` can request at `now`.
    pub fn max_redeem(&self, owner: &Address, now: u64) -> Result<U256, VaultError> {
        self.withdrawable_shares(owner, now)
    }

    // ───────────────────────── Read Surface ─────────────────────────

    /// Custody balance, including re-staked fees and donations.
    pub fn total_assets(&self) -> U256 {
        self.asset.balance_of(&self.address)
    }

    pub fn total_supply(&self) -> U256 {
        self.shares.total_supply()
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.shares.balance_of(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.shares.allowance(owner, spender)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn owner(&self) -> Address {
        self.ownable.owner()
    }

    pub fn fee_wallet(&self) -> Address {
        self.fee_wallet
    }

    pub fn timelock_seconds(&self) -> u64 {
        self.timelock_seconds
    }

    pub fn fee_bps(&self) -> u16 {
        self.fee_bps
    }

    pub fn decimals_offset(&self) -> u8 {
        self.decimals_offset
    }

    pub fn asset(&self) -> &A {
        &self.asset
    }

    /// Every entry ever recorded for `owner`, consumed ones included.
    pub fn deposits_of(&self, owner: &Address) -> &[DepositEntry] {
        self.records.get(owner).map(|r| r.entries()).unwrap_or(&[])
    }

    pub fn deposit_start_index(&self, owner: &Address) -> usize {
        self.records.get(owner).map(|r| r.start_index()).unwrap_or(0)
    }

    pub fn active_deposits(&self, owner: &Address) -> &[DepositEntry] {
        self.records.get(owner).map(|r| r.active_entries()).unwrap_or(&[])
    }

    pub fn last_deposit_timestamp(&self, owner: &Address) -> Option<u64> {
        self.records.get(owner).and_then(|r| r.last_timestamp())
    }

    /// When `entry` unlocks under the current timelock.
    pub fn unlock_time(&self, entry: &DepositEntry) -> u64 {
        entry.unlock_time(self.timelock_seconds)
    }

    // ───────────────────────── Invariants ─────────────────────────

    /// Check the ledger's structural invariants.
    pub fn verify_invariants(&self) -> Result<(), VaultError> {
        let violation = |msg: String| Err(VaultError::InvariantViolation(msg));

        validate_fee_bps(self.fee_bps)?;
        validate_timelock(self.timelock_seconds)?;

        let mut held = U256::zero();
        for (holder, balance) in self.shares.holders() {
            held = held.checked_add(*balance).ok_or(VaultError::Overflow)?;
            let queued = self
                .records
                .get(holder)
                .map(|r| r.balance())
                .transpose()?
                .unwrap_or_else(U256::zero);
            if queued != *balance {
                return violation(format!(
                    "{holder}: queue holds {queued} shares, balance is {balance}"
                ));
            }
        }
        if held != self.shares.total_supply() {
            return violation(format!(
                "balances sum to {held}, total supply is {}",
                self.shares.total_supply()
            ));
        }

        for (owner, record) in &self.records {
            let queued = record.balance()?;
            if !queued.is_zero() && self.shares.balance_of(owner).is_zero() {
                return violation(format!("{owner}: {queued} queued shares with no balance"));
            }
            if record.entries().windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
                return violation(format!("{owner}: deposit timestamps out of order"));
            }
        }
        Ok(())
    }

    // ───────────────────────── Events ─────────────────────────

    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    // ───────────────────────── Guard ─────────────────────────

    /// Run `op` holding the reentrancy guard, releasing it on every path.
    pub(crate) fn guarded<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        if !self.guard.acquire() {
            return Err(VaultError::Reentrancy);
        }
        let result = op(self);
        self.guard.release();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::FungibleAsset;
    use crate::config::{DEFAULT_TIMELOCK, SECONDS_PER_DAY};

    const T: u64 = DEFAULT_TIMELOCK;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    struct Fixture {
        vault: StakingVault<FungibleAsset>,
        owner: Address,
        fee_wallet: Address,
        alice: Address,
        bob: Address,
    }

    fn fixture() -> Fixture {
        let owner = Address::new();
        let fee_wallet = Address::new();
        let alice = Address::new();
        let bob = Address::new();

        let mut asset = FungibleAsset::genesis("TKN", owner, u(10_000_000)).unwrap();
        asset.transfer(&owner, &alice, u(100_000)).unwrap();
        asset.transfer(&owner, &bob, u(100_000)).unwrap();

        let vault = StakingVault::new(VaultConfig::new(owner, fee_wallet), asset).unwrap();
        Fixture {
            vault,
            owner,
            fee_wallet,
            alice,
            bob,
        }
    }

    #[test]
    fn test_first_deposit_is_one_to_one() {
        let mut f = fixture();
        let shares = f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();
        assert_eq!(shares, u(1_000));
        assert_eq!(f.vault.total_assets(), u(1_000));
        assert_eq!(f.vault.total_supply(), u(1_000));
        assert_eq!(f.vault.asset().balance_of(&f.alice), u(99_000));
        assert_eq!(
            f.vault.deposits_of(&f.alice),
            &[DepositEntry { shares: u(1_000), timestamp: 0 }]
        );
    }

    #[test]
    fn test_deposit_validation() {
        let mut f = fixture();
        assert_eq!(
            f.vault.deposit(&f.alice, U256::zero(), &f.alice, 0),
            Err(VaultError::ZeroAmount)
        );
        assert_eq!(
            f.vault.deposit(&f.alice, u(10), &Address::ZERO, 0),
            Err(VaultError::ZeroAddress)
        );
        assert!(matches!(
            f.vault.deposit(&f.alice, u(100_001), &f.alice, 0),
            Err(VaultError::InsufficientBalance { .. })
        ));
        assert_eq!(f.vault.total_supply(), U256::zero());
        assert!(f.vault.events().is_empty());
    }

    #[test]
    fn test_deposit_for_another_receiver() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(500), &f.bob, 7).unwrap();
        assert_eq!(f.vault.balance_of(&f.bob), u(500));
        assert_eq!(f.vault.balance_of(&f.alice), U256::zero());
        assert_eq!(f.vault.last_deposit_timestamp(&f.bob), Some(7));
    }

    #[test]
    fn test_mint_pulls_rounded_up_assets() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();
        // Donation moves the rate off 1:1
        let custody = f.vault.address();
        f.vault.transfer_asset(&f.bob, &custody, u(3)).unwrap();

        let preview = f.vault.preview_mint(u(100)).unwrap();
        let assets = f.vault.mint(&f.bob, u(100), &f.bob, 0).unwrap();
        assert_eq!(assets, preview);
        assert_eq!(f.vault.balance_of(&f.bob), u(100));
        // 100 * 1004 / 1001, rounded up
        assert_eq!(assets, u(101));
    }

    #[test]
    fn test_withdraw_before_timelock_rejected() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();

        let err = f
            .vault
            .withdraw(&f.alice, u(100), &f.alice, &f.alice, T - 1)
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::TimelockNotExpired {
                requested: u(100),
                withdrawable: U256::zero(),
            }
        );
    }

    #[test]
    fn test_withdraw_after_timelock_splits_fee() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();

        let shares = f
            .vault
            .withdraw(&f.alice, u(100), &f.alice, &f.alice, T)
            .unwrap();
        assert_eq!(shares, u(100));
        assert_eq!(f.vault.asset().balance_of(&f.alice), u(99_000 + 97));
        assert_eq!(f.vault.asset().balance_of(&f.fee_wallet), u(1));
        // 1000 - 97 - 1 - 0 burned: re-stake of 2 stays in custody
        assert_eq!(f.vault.total_assets(), u(902));
        assert_eq!(f.vault.total_supply(), u(900));
        assert!(f.vault.verify_invariants().is_ok());
    }

    #[test]
    fn test_redeem_returns_net() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(10_000), &f.alice, 0).unwrap();

        let expected = f.vault.preview_redeem_after_fee(u(10_000)).unwrap();
        let net = f
            .vault
            .redeem(&f.alice, u(10_000), &f.alice, &f.alice, T)
            .unwrap();
        assert_eq!(net, u(9_700));
        assert_eq!(net, expected);
        assert_eq!(f.vault.total_supply(), U256::zero());
        // Re-stake left behind with no holders
        assert_eq!(f.vault.total_assets(), u(75));
        assert_eq!(f.vault.asset().total_supply(), u(10_000_000 - 75));
    }

    #[test]
    fn test_withdraw_events() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(10_000), &f.alice, 0).unwrap();
        f.vault.drain_events();

        f.vault
            .withdraw(&f.alice, u(10_000), &f.bob, &f.alice, T)
            .unwrap();
        let names: Vec<_> = f.vault.events().iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["DepositsRemoved", "WithdrawExecuted", "WithdrawFeeCollected", "FeeBurned"]
        );
        assert!(f.vault.events().contains(&VaultEvent::FeeBurned(FeeBurned {
            requested: u(75),
            burned: u(75),
        })));
    }

    #[test]
    fn test_fifo_unlocks_in_order() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(100), &f.alice, 0).unwrap();
        f.vault.deposit(&f.alice, u(50), &f.alice, T / 2).unwrap();

        assert_eq!(f.vault.withdrawable_shares(&f.alice, T / 2 + 1).unwrap(), U256::zero());
        assert_eq!(f.vault.withdrawable_shares(&f.alice, T + 1).unwrap(), u(100));
        assert_eq!(
            f.vault.withdrawable_shares(&f.alice, T + T / 2 + 1).unwrap(),
            u(150)
        );

        // Only the first entry is available at T + 1
        assert!(matches!(
            f.vault.redeem(&f.alice, u(101), &f.alice, &f.alice, T + 1),
            Err(VaultError::TimelockNotExpired { .. })
        ));
        f.vault.redeem(&f.alice, u(100), &f.alice, &f.alice, T + 1).unwrap();
        assert_eq!(f.vault.deposit_start_index(&f.alice), 1);
        assert_eq!(f.vault.active_deposits(&f.alice).len(), 1);
    }

    #[test]
    fn test_delegated_redeem_spends_allowance() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();

        assert!(matches!(
            f.vault.redeem(&f.bob, u(100), &f.bob, &f.alice, T),
            Err(VaultError::InsufficientAllowance { .. })
        ));

        f.vault.approve(&f.alice, &f.bob, u(100)).unwrap();
        f.vault.redeem(&f.bob, u(100), &f.bob, &f.alice, T).unwrap();
        assert_eq!(f.vault.allowance(&f.alice, &f.bob), U256::zero());
        assert_eq!(f.vault.asset().balance_of(&f.bob), u(100_000 + 97));
        assert_eq!(f.vault.balance_of(&f.alice), u(900));
    }

    #[test]
    fn test_share_transfer_moves_queue() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();

        f.vault.transfer(&f.alice, &f.bob, u(400), 100).unwrap();
        assert_eq!(f.vault.balance_of(&f.bob), u(400));
        assert_eq!(
            f.vault.active_deposits(&f.bob),
            &[DepositEntry { shares: u(400), timestamp: 100 }]
        );
        assert_eq!(f.vault.active_deposits(&f.alice)[0].shares, u(600));

        // Recipient's lock runs from the transfer time
        assert_eq!(f.vault.withdrawable_shares(&f.bob, T).unwrap(), U256::zero());
        assert_eq!(f.vault.withdrawable_shares(&f.bob, T + 100).unwrap(), u(400));
        assert!(f.vault.verify_invariants().is_ok());
    }

    #[test]
    fn test_transfer_from_requires_allowance() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();

        assert!(matches!(
            f.vault.transfer_from(&f.bob, &f.alice, &f.bob, u(10), 1),
            Err(VaultError::InsufficientAllowance { .. })
        ));
        f.vault.approve(&f.alice, &f.bob, U256::MAX).unwrap();
        f.vault.transfer_from(&f.bob, &f.alice, &f.bob, u(10), 1).unwrap();
        assert_eq!(f.vault.allowance(&f.alice, &f.bob), U256::MAX);
        assert_eq!(f.vault.balance_of(&f.bob), u(10));
    }

    #[test]
    fn test_transfer_asset_out_of_custody_refused() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();
        let custody = f.vault.address();
        assert!(matches!(
            f.vault.transfer_asset(&custody, &f.bob, u(1)),
            Err(VaultError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_donation_raises_share_price() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();
        let before = f.vault.convert_to_assets(u(1_000)).unwrap();

        let custody = f.vault.address();
        f.vault.transfer_asset(&f.owner, &custody, u(1_000_000)).unwrap();
        let after = f.vault.convert_to_assets(u(1_000)).unwrap();
        assert!(after > before);
    }

    #[test]
    fn test_previews_are_fee_free() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();
        assert_eq!(f.vault.preview_withdraw(u(100)).unwrap(), u(100));
        assert_eq!(f.vault.preview_redeem(u(100)).unwrap(), u(100));
        assert_eq!(f.vault.preview_withdraw_after_fee(u(100)).unwrap(), u(97));
        assert_eq!(f.vault.preview_redeem_after_fee(u(100)).unwrap(), u(97));
    }

    #[test]
    fn test_max_withdraw_is_withdrawable() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();
        assert_eq!(f.vault.max_withdraw(&f.alice, 0).unwrap(), U256::zero());
        assert_eq!(f.vault.max_withdraw(&f.alice, T).unwrap(), u(1_000));
        assert_eq!(f.vault.max_redeem(&f.alice, T).unwrap(), u(1_000));

        let max = f.vault.max_withdraw(&f.alice, T).unwrap();
        f.vault.withdraw(&f.alice, max, &f.alice, &f.alice, T).unwrap();
        assert_eq!(f.vault.balance_of(&f.alice), U256::zero());
    }

    #[test]
    fn test_unlock_time_uses_current_timelock() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 1_000).unwrap();
        let entry = f.vault.deposits_of(&f.alice)[0];
        assert_eq!(f.vault.unlock_time(&entry), 1_000 + T);

        f.vault.set_timelock_seconds(&f.owner, SECONDS_PER_DAY).unwrap();
        assert_eq!(f.vault.unlock_time(&entry), 1_000 + SECONDS_PER_DAY);
    }

    #[test]
    fn test_reentrant_call_rejected() {
        let mut f = fixture();
        assert!(f.vault.guard.acquire());
        assert_eq!(
            f.vault.deposit(&f.alice, u(1), &f.alice, 0),
            Err(VaultError::Reentrancy)
        );
        f.vault.guard.release();
        assert!(f.vault.deposit(&f.alice, u(1), &f.alice, 0).is_ok());
    }

    #[test]
    fn test_guard_released_after_error() {
        let mut f = fixture();
        assert!(f.vault.deposit(&f.alice, U256::zero(), &f.alice, 0).is_err());
        assert!(!f.vault.guard.is_locked());
    }

    #[test]
    fn test_verify_invariants_detects_desync() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();
        f.vault.shares.mint(&f.bob, u(5)).unwrap();
        assert!(matches!(
            f.vault.verify_invariants(),
            Err(VaultError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_snapshot_serialization_skips_events() {
        let mut f = fixture();
        f.vault.deposit(&f.alice, u(1_000), &f.alice, 0).unwrap();
        let bytes = bincode::serialize(&f.vault).unwrap();
        let restored: StakingVault<FungibleAsset> = bincode::deserialize(&bytes).unwrap();
        assert!(restored.events().is_empty());
        assert_eq!(restored.balance_of(&f.alice), u(1_000));
        assert_eq!(restored.address(), f.vault.address());
        assert_eq!(restored.deposits_of(&f.alice), f.vault.deposits_of(&f.alice));
    }
}
