//! Owner-gated parameter management
//!
//! Authorization is checked before the new value is validated, so a
//! non-owner always sees `Unauthorized`.

use tracing::info;
use vault_types::ids::Address;

use crate::asset::AssetLedger;
use crate::config::{validate_fee_bps, validate_timelock};
use crate::errors::VaultError;
use crate::events::{ParameterUpdated, VaultEvent};
use crate::vault::StakingVault;

impl<A: AssetLedger> StakingVault<A> {
    pub fn set_fee_wallet(&mut self, caller: &Address, wallet: Address) -> Result<(), VaultError> {
        self.guarded(|v| {
            v.ownable.only_owner(caller)?;
            if wallet.is_zero() {
                return Err(VaultError::ZeroAddress);
            }
            let old = std::mem::replace(&mut v.fee_wallet, wallet);
            info!(old = %old, new = %wallet, "Fee wallet updated");
            v.events
                .push(VaultEvent::FeeWalletUpdated(ParameterUpdated { old, new: wallet }));
            Ok(())
        })
    }

    /// Applies to every existing deposit entry, not only new ones.
    pub fn set_timelock_seconds(&mut self, caller: &Address, seconds: u64) -> Result<(), VaultError> {
        self.guarded(|v| {
            v.ownable.only_owner(caller)?;
            validate_timelock(seconds)?;
            let old = std::mem::replace(&mut v.timelock_seconds, seconds);
            info!(old, new = seconds, "Timelock updated");
            v.events
                .push(VaultEvent::TimelockUpdated(ParameterUpdated { old, new: seconds }));
            Ok(())
        })
    }

    pub fn set_fee_bps(&mut self, caller: &Address, fee_bps: u16) -> Result<(), VaultError> {
        self.guarded(|v| {
            v.ownable.only_owner(caller)?;
            validate_fee_bps(fee_bps)?;
            let old = std::mem::replace(&mut v.fee_bps, fee_bps);
            info!(old, new = fee_bps, "Withdrawal fee updated");
            v.events
                .push(VaultEvent::FeeBpsUpdated(ParameterUpdated { old, new: fee_bps }));
            Ok(())
        })
    }

    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<(), VaultError> {
        self.guarded(|v| {
            let old = v.ownable.transfer_ownership(caller, new_owner)?;
            info!(old = %old, new = %new_owner, "Ownership transferred");
            v.events.push(VaultEvent::OwnershipTransferred(ParameterUpdated {
                old,
                new: new_owner,
            }));
            Ok(())
        })
    }
}
