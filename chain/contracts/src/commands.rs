//! Ledger commands
//!
//! Every mutating vault operation as a serializable value. The durable ledger
//! journals these and re-executes them on recovery; execution time is carried
//! by the journal entry, not the command.

use serde::{Deserialize, Serialize};
use vault_types::ids::Address;
use vault_types::numeric::U256;

use crate::asset::AssetLedger;
use crate::errors::VaultError;
use crate::vault::StakingVault;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultCommand {
    Deposit {
        caller: Address,
        assets: U256,
        receiver: Address,
    },
    Mint {
        caller: Address,
        shares: U256,
        receiver: Address,
    },
    Withdraw {
        caller: Address,
        assets: U256,
        receiver: Address,
        owner: Address,
    },
    Redeem {
        caller: Address,
        shares: U256,
        receiver: Address,
        owner: Address,
    },
    Approve {
        owner: Address,
        spender: Address,
        shares: U256,
    },
    Transfer {
        from: Address,
        to: Address,
        shares: U256,
    },
    TransferFrom {
        spender: Address,
        from: Address,
        to: Address,
        shares: U256,
    },
    /// Asset movement outside share accounting (wallet funding, donations).
    AssetTransfer {
        from: Address,
        to: Address,
        amount: U256,
    },
    SetFeeWallet {
        caller: Address,
        wallet: Address,
    },
    SetTimelock {
        caller: Address,
        seconds: u64,
    },
    SetFeeBps {
        caller: Address,
        fee_bps: u16,
    },
    TransferOwnership {
        caller: Address,
        new_owner: Address,
    },
}

impl VaultCommand {
    /// Journal entry kind.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultCommand::Deposit { .. } => "Deposit",
            VaultCommand::Mint { .. } => "Mint",
            VaultCommand::Withdraw { .. } => "Withdraw",
            VaultCommand::Redeem { .. } => "Redeem",
            VaultCommand::Approve { .. } => "Approve",
            VaultCommand::Transfer { .. } => "Transfer",
            VaultCommand::TransferFrom { .. } => "TransferFrom",
            VaultCommand::AssetTransfer { .. } => "AssetTransfer",
            VaultCommand::SetFeeWallet { .. } => "SetFeeWallet",
            VaultCommand::SetTimelock { .. } => "SetTimelock",
            VaultCommand::SetFeeBps { .. } => "SetFeeBps",
            VaultCommand::TransferOwnership { .. } => "TransferOwnership",
        }
    }
}

/// Result of a successfully executed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutput {
    /// Shares minted (deposit) or burned (withdraw).
    Shares(U256),
    /// Assets pulled (mint) or net assets paid (redeem).
    Assets(U256),
    Done,
}

impl CommandOutput {
    pub fn amount(&self) -> Option<U256> {
        match self {
            CommandOutput::Shares(v) | CommandOutput::Assets(v) => Some(*v),
            CommandOutput::Done => None,
        }
    }
}

impl<A: AssetLedger> StakingVault<A> {
    /// Execute `command` as of `now`.
    pub fn execute(&mut self, command: &VaultCommand, now: u64) -> Result<CommandOutput, VaultError> {
        use VaultCommand::*;

        match *command {
            Deposit {
                caller,
                assets,
                receiver,
            } => self
                .deposit(&caller, assets, &receiver, now)
                .map(CommandOutput::Shares),
            Mint {
                caller,
                shares,
                receiver,
            } => self
                .mint(&caller, shares, &receiver, now)
                .map(CommandOutput::Assets),
            Withdraw {
                caller,
                assets,
                receiver,
                owner,
            } => self
                .withdraw(&caller, assets, &receiver, &owner, now)
                .map(CommandOutput::Shares),
            Redeem {
                caller,
                shares,
                receiver,
                owner,
            } => self
                .redeem(&caller, shares, &receiver, &owner, now)
                .map(CommandOutput::Assets),
            Approve {
                owner,
                spender,
                shares,
            } => self.approve(&owner, &spender, shares).map(|_| CommandOutput::Done),
            Transfer { from, to, shares } => self
                .transfer(&from, &to, shares, now)
                .map(|_| CommandOutput::Done),
            TransferFrom {
                spender,
                from,
                to,
                shares,
            } => self
                .transfer_from(&spender, &from, &to, shares, now)
                .map(|_| CommandOutput::Done),
            AssetTransfer { from, to, amount } => self
                .transfer_asset(&from, &to, amount)
                .map(|_| CommandOutput::Done),
            SetFeeWallet { caller, wallet } => self
                .set_fee_wallet(&caller, wallet)
                .map(|_| CommandOutput::Done),
            SetTimelock { caller, seconds } => self
                .set_timelock_seconds(&caller, seconds)
                .map(|_| CommandOutput::Done),
            SetFeeBps { caller, fee_bps } => self
                .set_fee_bps(&caller, fee_bps)
                .map(|_| CommandOutput::Done),
            TransferOwnership { caller, new_owner } => self
                .transfer_ownership(&caller, new_owner)
                .map(|_| CommandOutput::Done),
        }
    }
}
