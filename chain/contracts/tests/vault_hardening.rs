//! Vault Hardening Tests
//!
//! End-to-end behavior of the staking vault:
//! - Bootstrap and exchange rate
//! - Timelock and FIFO unlocking
//! - Fee split and custody accounting
//! - Permission checks on admin setters
//! - Delegated withdrawals
//! - Durable ledger recovery
//! - Fuzz testing (proptest): conservation, atomicity, share price

use staking_vault::config::{VaultConfig, DEFAULT_TIMELOCK, SECONDS_PER_DAY};
use staking_vault::events::VaultEvent;
use staking_vault::{
    AssetLedger, DurableConfig, DurableVault, FungibleAsset, StakingVault, VaultCommand, VaultError,
};
use tempfile::TempDir;
use vault_types::ids::Address;
use vault_types::numeric::U256;

const T: u64 = DEFAULT_TIMELOCK;

// ═══════════════════════════════════════════════════════════════════
// Bootstrap & Exchange Rate
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_empty_vault_mints_one_to_one() {
    let mut s = setup();
    let shares = s.vault.deposit(&s.alice, u(1_000), &s.alice, 0).unwrap();
    assert_eq!(shares, u(1_000));
    assert_eq!(s.vault.total_assets(), u(1_000));
    assert_eq!(s.vault.total_supply(), u(1_000));
}

#[test]
fn test_second_depositor_gets_proportional_shares() {
    let mut s = setup();
    s.vault.deposit(&s.alice, u(1_000), &s.alice, 0).unwrap();
    let shares = s.vault.deposit(&s.bob, u(500), &s.bob, 0).unwrap();
    assert_eq!(shares, u(500));
    assert_eq!(s.vault.convert_to_assets(u(500)).unwrap(), u(500));
}

#[test]
fn test_restaked_fees_accrue_to_remaining_holders() {
    let mut s = setup();
    s.vault.deposit(&s.alice, u(10_000), &s.alice, 0).unwrap();
    s.vault.deposit(&s.bob, u(10_000), &s.bob, 0).unwrap();

    s.vault.redeem(&s.alice, u(10_000), &s.alice, &s.alice, T).unwrap();
    // Bob's 10_000 shares now back 10_000 + 75 re-staked
    assert_eq!(s.vault.total_assets(), u(10_075));
    assert!(s.vault.convert_to_assets(u(10_000)).unwrap() > u(10_000));
}

// ═══════════════════════════════════════════════════════════════════
// Timelock & FIFO
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_withdraw_inside_timelock_rejected() {
    let mut s = setup();
    s.vault.deposit(&s.alice, u(1_000), &s.alice, 0).unwrap();
    let before = snapshot(&s.vault);

    assert!(matches!(
        s.vault.withdraw(&s.alice, u(1), &s.alice, &s.alice, T - 1),
        Err(VaultError::TimelockNotExpired { .. })
    ));
    assert_eq!(snapshot(&s.vault), before);
}

#[test]
fn test_staggered_deposits_unlock_in_order() {
    let mut s = setup();
    s.vault.deposit(&s.alice, u(100), &s.alice, 0).unwrap();
    s.vault.deposit(&s.alice, u(50), &s.alice, T / 2).unwrap();

    assert_eq!(s.vault.withdrawable_shares(&s.alice, T / 2 + 1).unwrap(), U256::zero());
    assert_eq!(s.vault.withdrawable_shares(&s.alice, T + 1).unwrap(), u(100));
    assert_eq!(s.vault.withdrawable_shares(&s.alice, T + T / 2 + 1).unwrap(), u(150));
}

#[test]
fn test_partial_redeem_leaves_remainder_at_head() {
    let mut s = setup();
    s.vault.deposit(&s.alice, u(100), &s.alice, 0).unwrap();
    s.vault.deposit(&s.alice, u(50), &s.alice, 10).unwrap();

    s.vault.redeem(&s.alice, u(30), &s.alice, &s.alice, T).unwrap();
    let active = s.vault.active_deposits(&s.alice);
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].shares, u(70));
    assert_eq!(s.vault.deposit_start_index(&s.alice), 0);

    s.vault.redeem(&s.alice, u(70), &s.alice, &s.alice, T).unwrap();
    assert_eq!(s.vault.deposit_start_index(&s.alice), 1);
    assert_eq!(s.vault.deposits_of(&s.alice).len(), 2);
}

#[test]
fn test_shortening_timelock_unlocks_existing_deposits() {
    let mut s = setup();
    s.vault.deposit(&s.alice, u(1_000), &s.alice, 0).unwrap();
    assert_eq!(s.vault.withdrawable_shares(&s.alice, SECONDS_PER_DAY).unwrap(), U256::zero());

    s.vault.set_timelock_seconds(&s.owner, SECONDS_PER_DAY).unwrap();
    assert_eq!(s.vault.withdrawable_shares(&s.alice, SECONDS_PER_DAY).unwrap(), u(1_000));
}

#[test]
fn test_out_of_order_timestamp_clamped() {
    let mut s = setup();
    s.vault.deposit(&s.alice, u(10), &s.alice, 500).unwrap();
    s.vault.deposit(&s.alice, u(10), &s.alice, 100).unwrap();
    let entries = s.vault.deposits_of(&s.alice);
    assert_eq!(entries[1].timestamp, 500);
}

// ═══════════════════════════════════════════════════════════════════
// Fee Split
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_small_withdrawal_fee_split() {
    let mut s = setup();
    s.vault.deposit(&s.alice, u(1_000), &s.alice, 0).unwrap();
    let receiver = Address::new();

    s.vault.withdraw(&s.alice, u(100), &receiver, &s.alice, T).unwrap();
    assert_eq!(s.vault.asset().balance_of(&receiver), u(97));
    assert_eq!(s.vault.asset().balance_of(&s.fee_wallet), u(1));
    assert!(s.vault.events().contains(&VaultEvent::WithdrawFeeCollected(
        staking_vault::events::WithdrawFeeCollected {
            owner: s.alice,
            total_fee: u(3),
            to_wallet: u(1),
            to_burn: U256::zero(),
            to_restake: u(2),
        }
    )));
}

#[test]
fn test_zero_fee_pays_gross() {
    let mut s = setup();
    s.vault.set_fee_bps(&s.owner, 0).unwrap();
    s.vault.deposit(&s.alice, u(1_000), &s.alice, 0).unwrap();

    let net = s.vault.redeem(&s.alice, u(1_000), &s.alice, &s.alice, T).unwrap();
    assert_eq!(net, u(1_000));
    assert_eq!(s.vault.asset().balance_of(&s.fee_wallet), U256::zero());
    assert!(!s.vault.events().iter().any(|e| e.name() == "WithdrawFeeCollected"));
}

#[test]
fn test_fee_above_maximum_rejected() {
    let mut s = setup();
    assert!(matches!(
        s.vault.set_fee_bps(&s.owner, 1_001),
        Err(VaultError::FeeTooHigh { .. })
    ));
    assert_eq!(s.vault.fee_bps(), 300);
}

#[test]
fn test_burn_reduces_asset_supply() {
    let mut s = setup();
    let supply = s.vault.asset().total_supply();
    s.vault.deposit(&s.alice, u(10_000), &s.alice, 0).unwrap();
    s.vault.redeem(&s.alice, u(10_000), &s.alice, &s.alice, T).unwrap();
    assert_eq!(s.vault.asset().total_supply(), supply - u(75));
}

// ═══════════════════════════════════════════════════════════════════
// Validation & Permissions
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_zero_receiver_rejected() {
    let mut s = setup();
    assert_eq!(
        s.vault.deposit(&s.alice, u(10), &Address::ZERO, 0),
        Err(VaultError::ZeroAddress)
    );
    s.vault.deposit(&s.alice, u(10), &s.alice, 0).unwrap();
    assert_eq!(
        s.vault.redeem(&s.alice, u(10), &Address::ZERO, &s.alice, T),
        Err(VaultError::ZeroAddress)
    );
}

#[test]
fn test_zero_amounts_rejected() {
    let mut s = setup();
    assert_eq!(s.vault.deposit(&s.alice, U256::zero(), &s.alice, 0), Err(VaultError::ZeroAmount));
    assert_eq!(s.vault.mint(&s.alice, U256::zero(), &s.alice, 0), Err(VaultError::ZeroAmount));
    assert_eq!(
        s.vault.withdraw(&s.alice, U256::zero(), &s.alice, &s.alice, T),
        Err(VaultError::ZeroAmount)
    );
    assert_eq!(
        s.vault.redeem(&s.alice, U256::zero(), &s.alice, &s.alice, T),
        Err(VaultError::ZeroAmount)
    );
}

#[test]
fn test_redeem_more_than_balance_rejected() {
    let mut s = setup();
    s.vault.deposit(&s.alice, u(10), &s.alice, 0).unwrap();
    assert_eq!(
        s.vault.redeem(&s.alice, u(11), &s.alice, &s.alice, T),
        Err(VaultError::InsufficientBalance {
            required: u(11),
            available: u(10),
        })
    );
}

#[test]
fn test_non_owner_cannot_change_parameters() {
    let mut s = setup();
    let err = VaultError::Unauthorized { caller: s.alice };
    assert_eq!(s.vault.set_fee_bps(&s.alice, 0), Err(err.clone()));
    assert_eq!(s.vault.set_timelock_seconds(&s.alice, SECONDS_PER_DAY), Err(err.clone()));
    assert_eq!(s.vault.set_fee_wallet(&s.alice, s.alice), Err(err.clone()));
    assert_eq!(s.vault.transfer_ownership(&s.alice, s.alice), Err(err));
}

#[test]
fn test_delegated_redeem_with_approval() {
    let mut s = setup();
    s.vault.deposit(&s.alice, u(1_000), &s.alice, 0).unwrap();
    s.vault.approve(&s.alice, &s.bob, u(500)).unwrap();

    let net = s.vault.redeem(&s.bob, u(500), &s.bob, &s.alice, T).unwrap();
    assert_eq!(net, u(485));
    assert_eq!(s.vault.balance_of(&s.alice), u(500));
    assert_eq!(s.vault.allowance(&s.alice, &s.bob), U256::zero());

    assert!(matches!(
        s.vault.redeem(&s.bob, u(1), &s.bob, &s.alice, T),
        Err(VaultError::InsufficientAllowance { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════
// Durable Ledger
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_durable_ledger_survives_restart() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let owner = Address::new();
    let alice = Address::new();
    let asset = FungibleAsset::genesis("TKN", owner, u(1_000_000)).unwrap();

    let mut ledger = DurableVault::create(
        VaultConfig::new(owner, Address::new()),
        asset,
        DurableConfig::new(dir.path()),
    )
    .unwrap();
    let commands = [
        VaultCommand::AssetTransfer { from: owner, to: alice, amount: u(5_000) },
        VaultCommand::Deposit { caller: alice, assets: u(2_000), receiver: alice },
        VaultCommand::SetFeeBps { caller: owner, fee_bps: 500 },
    ];
    for command in commands {
        ledger.execute(command, 0).unwrap();
    }
    ledger
        .execute(
            VaultCommand::Redeem { caller: alice, shares: u(1_000), receiver: alice, owner: alice },
            T,
        )
        .unwrap();
    let hash = ledger.state_hash().unwrap();
    drop(ledger);

    let reopened = DurableVault::open(DurableConfig::new(dir.path())).unwrap();
    assert_eq!(reopened.state_hash().unwrap(), hash);
    assert_eq!(reopened.vault().fee_bps(), 500);
    assert_eq!(reopened.vault().balance_of(&alice), u(1_000));
    assert_eq!(reopened.vault().asset().balance_of(&alice), u(3_000 + 950));
}

// ═══════════════════════════════════════════════════════════════════
// Fuzz Tests (proptest)
// ═══════════════════════════════════════════════════════════════════

mod fuzz {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Deposit { user: usize, assets: u64 },
        Mint { user: usize, shares: u64 },
        Redeem { user: usize, pct: u64 },
        Withdraw { user: usize, assets: u64 },
        Transfer { from: usize, to: usize, pct: u64 },
        Donate { assets: u64 },
        Advance { seconds: u64 },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, 1..50_000u64).prop_map(|(user, assets)| Op::Deposit { user, assets }),
            (0..3usize, 1..50_000u64).prop_map(|(user, shares)| Op::Mint { user, shares }),
            (0..3usize, 1..=100u64).prop_map(|(user, pct)| Op::Redeem { user, pct }),
            (0..3usize, 1..50_000u64).prop_map(|(user, assets)| Op::Withdraw { user, assets }),
            (0..3usize, 0..3usize, 1..=100u64)
                .prop_map(|(from, to, pct)| Op::Transfer { from, to, pct }),
            (1..10_000u64).prop_map(|assets| Op::Donate { assets }),
            (0..2 * DEFAULT_TIMELOCK).prop_map(|seconds| Op::Advance { seconds }),
        ]
    }

    fn percent(value: U256, pct: u64) -> U256 {
        value * U256::from(pct) / U256::from(100u64)
    }

    fn apply(s: &mut Setup, users: &[Address; 3], op: &Op, now: &mut u64) -> Result<(), VaultError> {
        match *op {
            Op::Deposit { user, assets } => {
                let who = users[user];
                s.vault.deposit(&who, u(assets), &who, *now).map(|_| ())
            }
            Op::Mint { user, shares } => {
                let who = users[user];
                s.vault.mint(&who, u(shares), &who, *now).map(|_| ())
            }
            Op::Redeem { user, pct } => {
                let who = users[user];
                let shares = percent(s.vault.balance_of(&who), pct);
                s.vault.redeem(&who, shares, &who, &who, *now).map(|_| ())
            }
            Op::Withdraw { user, assets } => {
                let who = users[user];
                s.vault.withdraw(&who, u(assets), &who, &who, *now).map(|_| ())
            }
            Op::Transfer { from, to, pct } => {
                let shares = percent(s.vault.balance_of(&users[from]), pct);
                s.vault.transfer(&users[from], &users[to], shares, *now)
            }
            Op::Donate { assets } => {
                let custody = s.vault.address();
                s.vault.transfer_asset(&s.owner, &custody, u(assets))
            }
            Op::Advance { seconds } => {
                *now += seconds;
                Ok(())
            }
        }
    }

    proptest! {
        /// Invariant: the asset is conserved, share accounting stays
        /// consistent, and a failing call changes nothing.
        #[test]
        fn fuzz_conservation_and_atomicity(ops in prop::collection::vec(op(), 1..40)) {
            let mut s = setup();
            let users = [s.alice, s.bob, s.carol];
            let mut now = 0u64;

            for op in &ops {
                let before = snapshot(&s.vault);
                let supply_before = s.vault.asset().total_supply();
                let result = apply(&mut s, &users, op, &mut now);

                if result.is_err() {
                    prop_assert_eq!(snapshot(&s.vault), before, "failed {:?} mutated state", op);
                }
                prop_assert!(s.vault.verify_invariants().is_ok());
                prop_assert_eq!(s.vault.asset().circulating().unwrap(), s.vault.asset().total_supply());
                prop_assert!(s.vault.asset().total_supply() <= supply_before);
            }
        }

        /// Invariant: deposits, redemptions and donations never lower the
        /// assets backing a share.
        #[test]
        fn fuzz_share_price_non_decreasing(ops in prop::collection::vec(op(), 1..40)) {
            let mut s = setup();
            let users = [s.alice, s.bob, s.carol];
            let mut now = 0u64;

            for op in &ops {
                let (a0, s0) = (s.vault.total_assets(), s.vault.total_supply());
                let _ = apply(&mut s, &users, op, &mut now);
                let (a1, s1) = (s.vault.total_assets(), s.vault.total_supply());

                // (a1 + 1) / (s1 + 1) >= (a0 + 1) / (s0 + 1)
                prop_assert!(
                    (a1 + u(1)) * (s0 + u(1)) >= (a0 + u(1)) * (s1 + u(1)),
                    "price fell after {:?}: {}/{} -> {}/{}", op, a0, s0, a1, s1
                );
            }
        }

        /// Invariant: a depositor who redeems everything never gets back
        /// more than they put in.
        #[test]
        fn fuzz_deposit_redeem_no_gain(
            seed in 1..1_000_000u64,
            assets in 1..100_000u64,
        ) {
            let mut s = setup();
            s.vault.deposit(&s.bob, u(seed), &s.bob, 0).unwrap();

            let shares = s.vault.deposit(&s.alice, u(assets), &s.alice, 0).unwrap();
            let net = s.vault.redeem(&s.alice, shares, &s.alice, &s.alice, T).unwrap();
            prop_assert!(net <= u(assets));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

struct Setup {
    vault: StakingVault<FungibleAsset>,
    owner: Address,
    fee_wallet: Address,
    alice: Address,
    bob: Address,
    carol: Address,
}

fn u(v: u64) -> U256 {
    U256::from(v)
}

fn setup() -> Setup {
    let owner = Address::new();
    let fee_wallet = Address::new();
    let alice = Address::new();
    let bob = Address::new();
    let carol = Address::new();

    let mut asset = FungibleAsset::genesis("TKN", owner, u(1_000_000_000)).unwrap();
    for user in [alice, bob, carol] {
        asset.transfer(&owner, &user, u(10_000_000)).unwrap();
    }
    let vault = StakingVault::new(VaultConfig::new(owner, fee_wallet), asset).unwrap();
    Setup {
        vault,
        owner,
        fee_wallet,
        alice,
        bob,
        carol,
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Serialized ledger state, for before/after comparison.
fn snapshot(vault: &StakingVault<FungibleAsset>) -> Vec<u8> {
    bincode::serialize(vault).unwrap()
}
