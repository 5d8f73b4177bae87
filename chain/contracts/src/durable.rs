//! Durable Ledger: journaled vault with snapshot recovery
//!
//! Commit protocol for every command:
//! 1. Execute against a staged clone of the live vault
//! 2. Append the command to the write-ahead journal
//! 3. Swap the staged vault in
//!
//! A failure at any step leaves the live vault untouched, and a failed append
//! leaves the journal as it was. Recovery loads the newest verified snapshot,
//! replays later journal entries with their recorded timestamps, cuts off any
//! torn final frame, and audits the ledger invariants before serving.

use ledger_persistence::snapshot::state_hash;
use ledger_persistence::{
    FsyncPolicy, JournalConfig, JournalEntry, JournalError, JournalWriter, RecoveryEngine,
    RecoveryError, RecoveryReport, Replayable, SnapshotCleanupPolicy, SnapshotError,
    SnapshotIntervalPolicy, SnapshotLoader,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::asset::{AssetLedger, FungibleAsset};
use crate::commands::{CommandOutput, VaultCommand};
use crate::config::VaultConfig;
use crate::errors::VaultError;
use crate::events::VaultEvent;
use crate::vault::StakingVault;

/// The vault as persisted: share accounting over an in-process asset.
pub type Ledger = StakingVault<FungibleAsset>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Command codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Journal kind {recorded} does not match decoded command {decoded}")]
    KindMismatch { recorded: String, decoded: String },

    #[error("Ledger already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Ledger lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone)]
pub struct DurableConfig {
    /// Root directory; journal and snapshots live in subdirectories.
    pub data_dir: PathBuf,
    /// Commands between snapshots (0 = only the genesis snapshot).
    pub snapshot_interval: u64,
    /// Snapshot files retained after pruning.
    pub keep_snapshots: usize,
    pub compress_snapshots: bool,
    pub fsync_policy: FsyncPolicy,
    pub max_journal_file_size: u64,
}

impl DurableConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            snapshot_interval: 1_000,
            keep_snapshots: 3,
            compress_snapshots: true,
            fsync_policy: FsyncPolicy::EveryWrite,
            max_journal_file_size: 64 * 1024 * 1024,
        }
    }

    pub fn journal_dir(&self) -> PathBuf {
        self.data_dir.join("journal")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    fn journal_config(&self) -> JournalConfig {
        JournalConfig {
            max_file_size: self.max_journal_file_size,
            fsync_policy: self.fsync_policy,
            ..JournalConfig::new(self.journal_dir())
        }
    }
}

impl<A> Replayable for StakingVault<A>
where
    A: AssetLedger + Clone,
{
    type Error = LedgerError;

    fn apply_entry(&mut self, entry: &JournalEntry) -> Result<(), LedgerError> {
        let command: VaultCommand = bincode::deserialize(&entry.payload)?;
        if command.kind() != entry.kind {
            return Err(LedgerError::KindMismatch {
                recorded: entry.kind.clone(),
                decoded: command.kind().to_string(),
            });
        }
        self.execute(&command, entry.timestamp)?;
        Ok(())
    }
}

/// Journaled vault. Single writer; wrap in a [`crate::service::VaultService`]
/// to share it.
pub struct DurableVault {
    vault: Ledger,
    journal: JournalWriter,
    engine: RecoveryEngine,
    config: DurableConfig,
    interval: SnapshotIntervalPolicy,
    cleanup: SnapshotCleanupPolicy,
    last_sequence: u64,
    last_timestamp: u64,
    recovery: Option<RecoveryReport>,
}

impl DurableVault {
    /// Initialize a new ledger in `durable.data_dir`, writing the genesis
    /// snapshot at sequence 0.
    pub fn create(
        config: VaultConfig,
        asset: FungibleAsset,
        durable: DurableConfig,
    ) -> Result<Self, LedgerError> {
        let snapshot_dir = durable.snapshot_dir();
        if !SnapshotLoader::new(&snapshot_dir).list_snapshots()?.is_empty() {
            return Err(LedgerError::AlreadyInitialized(durable.data_dir.clone()));
        }

        let vault = StakingVault::new(config, asset)?;
        let engine = RecoveryEngine::new(snapshot_dir, durable.journal_dir());
        engine.take_snapshot(&vault, 0, 0, durable.compress_snapshots)?;

        let mut journal = JournalWriter::open(durable.journal_config())?;
        journal.set_next_sequence(1);

        info!(
            data_dir = %durable.data_dir.display(),
            vault = %vault.address(),
            "Ledger initialized"
        );
        Ok(Self {
            vault,
            journal,
            engine,
            interval: SnapshotIntervalPolicy::with_interval(durable.snapshot_interval),
            cleanup: SnapshotCleanupPolicy::new(durable.keep_snapshots),
            config: durable,
            last_sequence: 0,
            last_timestamp: 0,
            recovery: None,
        })
    }

    /// Recover an existing ledger from `durable.data_dir`.
    pub fn open(durable: DurableConfig) -> Result<Self, LedgerError> {
        let engine = RecoveryEngine::new(durable.snapshot_dir(), durable.journal_dir());
        let (mut vault, report) = engine.recover::<Ledger>()?;

        // Replay re-emits events that were already observed
        vault.drain_events();
        if let Err(e) = vault.verify_invariants() {
            error!(error = %e, sequence = report.final_sequence, "Recovered ledger failed audit");
            return Err(e.into());
        }

        for tail in &report.truncated_tails {
            tail.discard()?;
        }
        let mut journal = JournalWriter::open(durable.journal_config())?;
        journal.set_next_sequence(report.final_sequence + 1);

        let mut interval = SnapshotIntervalPolicy::with_interval(durable.snapshot_interval);
        interval.record_snapshot(report.snapshot_sequence);

        info!(
            data_dir = %durable.data_dir.display(),
            sequence = report.final_sequence,
            replayed = report.replay_count,
            "Ledger opened"
        );
        Ok(Self {
            vault,
            journal,
            engine,
            interval,
            cleanup: SnapshotCleanupPolicy::new(durable.keep_snapshots),
            config: durable,
            last_sequence: report.final_sequence,
            last_timestamp: report.final_timestamp,
            recovery: Some(report),
        })
    }

    /// Execute and journal `command` as of `now`.
    pub fn execute(&mut self, command: VaultCommand, now: u64) -> Result<CommandOutput, LedgerError> {
        let mut staged = self.vault.clone();
        let output = staged.execute(&command, now)?;

        let payload = bincode::serialize(&command)?;
        let entry = self.journal.write_event(now, command.kind(), payload)?;

        self.vault = staged;
        self.last_sequence = entry.sequence;
        self.last_timestamp = now;
        debug!(sequence = entry.sequence, kind = %entry.kind, "Command committed");

        if self.interval.should_snapshot(self.last_sequence) {
            // The command is already durable in the journal
            if let Err(e) = self.snapshot() {
                warn!(error = %e, sequence = self.last_sequence, "Periodic snapshot failed");
            }
        }
        Ok(output)
    }

    /// Snapshot the live vault at the last committed sequence and prune old
    /// snapshots.
    pub fn snapshot(&mut self) -> Result<PathBuf, LedgerError> {
        self.journal.sync()?;
        let path = self.engine.take_snapshot(
            &self.vault,
            self.last_sequence,
            self.last_timestamp,
            self.config.compress_snapshots,
        )?;
        self.interval.record_snapshot(self.last_sequence);
        self.cleanup.cleanup(&self.config.snapshot_dir())?;
        Ok(path)
    }

    pub fn sync(&mut self) -> Result<(), LedgerError> {
        Ok(self.journal.sync()?)
    }

    pub fn vault(&self) -> &Ledger {
        &self.vault
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    /// SHA-256 of the serialized vault.
    pub fn state_hash(&self) -> Result<String, LedgerError> {
        Ok(state_hash(&self.vault)?)
    }

    /// Report from the recovery that opened this ledger, if any.
    pub fn recovery_report(&self) -> Option<&RecoveryReport> {
        self.recovery.as_ref()
    }

    pub fn config(&self) -> &DurableConfig {
        &self.config
    }

    pub fn drain_events(&mut self) -> Vec<VaultEvent> {
        self.vault.drain_events()
    }
}
