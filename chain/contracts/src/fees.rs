//! Fee Distributor: applies a withdrawal's fee split to custody
//!
//! The split itself is pure arithmetic (`vault_types::fee::FeeSplit`); this
//! module moves the asset: net proceeds to the receiver, the wallet share to
//! the fee wallet, and the burn share out of existence. The re-stake share is
//! simply left in custody.

use tracing::{debug, warn};
use vault_types::fee::FeeSplit;
use vault_types::ids::Address;
use vault_types::numeric::U256;

use crate::asset::AssetLedger;
use crate::errors::VaultError;

/// What actually happened when a split was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeOutcome {
    pub split: FeeSplit,
    /// Amount destroyed; below `split.to_burn` only on custody shortfall.
    pub burned: U256,
}

pub struct FeeDistributor;

impl FeeDistributor {
    /// Compute the split for `gross` without touching any balance.
    pub fn preview(gross: U256, fee_bps: u16) -> Result<FeeSplit, VaultError> {
        Ok(FeeSplit::compute(gross, fee_bps)?)
    }

    /// Pay out a withdrawal from `custody`.
    ///
    /// Fails with `InsufficientTokensInContract`, before moving anything, if
    /// custody cannot cover the net payout plus the wallet share. The burn is
    /// capped at whatever custody still holds afterwards and never fails the
    /// withdrawal.
    pub fn apply<A: AssetLedger>(
        asset: &mut A,
        custody: &Address,
        receiver: &Address,
        fee_wallet: &Address,
        split: FeeSplit,
    ) -> Result<FeeOutcome, VaultError> {
        let required = split
            .net
            .checked_add(split.to_wallet)
            .ok_or(VaultError::Overflow)?;
        let available = asset.balance_of(custody);
        if available < required {
            return Err(VaultError::InsufficientTokensInContract {
                required,
                available,
            });
        }

        asset.transfer(custody, receiver, split.net)?;
        asset.transfer(custody, fee_wallet, split.to_wallet)?;

        let burnable = asset.balance_of(custody).min(split.to_burn);
        if burnable < split.to_burn {
            warn!(
                requested = %split.to_burn,
                burned = %burnable,
                "Fee burn short of custody balance"
            );
        }
        asset.burn(custody, burnable)?;

        debug!(
            gross = %split.gross,
            net = %split.net,
            to_wallet = %split.to_wallet,
            burned = %burnable,
            to_restake = %split.to_restake,
            "Fee split applied"
        );

        Ok(FeeOutcome {
            split,
            burned: burnable,
        })
    }
}
