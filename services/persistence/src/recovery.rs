//! Recovery Flow: boot from snapshot + journal replay
//!
//! 1. Load the newest snapshot (a genesis snapshot at sequence 0 is written
//!    when a ledger is created, so one always exists)
//! 2. Seek the journal past `snapshot.sequence`
//! 3. Replay every later entry in order through [`Replayable::apply_entry`]
//! 4. Report the resulting state hash and sequence
//!
//! Replay aborts on checksum mismatch, sequence gaps, or an entry the state
//! refuses to apply. A torn final frame is tolerated and reported.

use crate::journal::JournalEntry;
use crate::reader::{JournalReader, ReaderError, TruncatedTail};
use crate::snapshot::{state_hash, Snapshot, SnapshotError, SnapshotLoader, SnapshotWriter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Sequence gap during replay: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    #[error("Replay of sequence {sequence} ({kind}) failed: {reason}")]
    Apply {
        sequence: u64,
        kind: String,
        reason: String,
    },

    #[error("State hash divergence: expected {expected}, got {actual} at sequence {sequence}")]
    HashDivergence {
        expected: String,
        actual: String,
        sequence: u64,
    },
}

/// State that can be rebuilt by re-applying journal entries.
pub trait Replayable {
    type Error: fmt::Display;

    /// Re-execute the command recorded in `entry`.
    fn apply_entry(&mut self, entry: &JournalEntry) -> Result<(), Self::Error>;
}

/// Outcome of a successful recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    pub snapshot_sequence: u64,
    pub replay_count: u64,
    /// Sequence of the last applied command (the snapshot's if none replayed).
    pub final_sequence: u64,
    /// Ledger time of the last applied command.
    pub final_timestamp: u64,
    pub final_state_hash: String,
    /// Torn journal tails skipped during replay. Call
    /// [`TruncatedTail::discard`] on each before appending to the journal.
    pub truncated_tails: Vec<TruncatedTail>,
    pub elapsed_ms: u64,
}

pub struct RecoveryEngine {
    snapshot_dir: PathBuf,
    journal_dir: PathBuf,
}

impl RecoveryEngine {
    pub fn new(snapshot_dir: impl Into<PathBuf>, journal_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            journal_dir: journal_dir.into(),
        }
    }

    /// Rebuild state from the latest snapshot and the journal.
    pub fn recover<S>(&self) -> Result<(S, RecoveryReport), RecoveryError>
    where
        S: Replayable + Serialize + DeserializeOwned,
    {
        self.recover_expecting(None)
    }

    /// Like [`RecoveryEngine::recover`], additionally requiring the final
    /// state hash to equal `expected_hash`.
    pub fn recover_expecting<S>(
        &self,
        expected_hash: Option<&str>,
    ) -> Result<(S, RecoveryReport), RecoveryError>
    where
        S: Replayable + Serialize + DeserializeOwned,
    {
        let start = Instant::now();

        let snapshot: Snapshot<S> = SnapshotLoader::new(&self.snapshot_dir).load_latest()?;
        info!(sequence = snapshot.sequence, "Recovering from snapshot");

        let mut state = snapshot.state;
        let mut last_seq = snapshot.sequence;
        let mut last_ts = snapshot.timestamp;
        let mut replay_count = 0u64;

        let mut reader = JournalReader::open(&self.journal_dir)?;
        reader.seek_to_sequence(snapshot.sequence + 1)?;

        while let Some(entry) = reader.next_entry()? {
            if entry.sequence != last_seq + 1 {
                error!(expected = last_seq + 1, got = entry.sequence, "Journal sequence gap");
                return Err(RecoveryError::SequenceGap {
                    expected: last_seq + 1,
                    got: entry.sequence,
                });
            }
            state
                .apply_entry(&entry)
                .map_err(|e| RecoveryError::Apply {
                    sequence: entry.sequence,
                    kind: entry.kind.clone(),
                    reason: e.to_string(),
                })?;
            last_seq = entry.sequence;
            last_ts = entry.timestamp;
            replay_count += 1;
        }

        let final_hash = state_hash(&state)?;
        if let Some(expected) = expected_hash {
            if final_hash != expected {
                return Err(RecoveryError::HashDivergence {
                    expected: expected.to_string(),
                    actual: final_hash,
                    sequence: last_seq,
                });
            }
        }

        let report = RecoveryReport {
            snapshot_sequence: snapshot.sequence,
            replay_count,
            final_sequence: last_seq,
            final_timestamp: last_ts,
            final_state_hash: final_hash,
            truncated_tails: reader.truncated_tails().to_vec(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            replayed = report.replay_count,
            final_sequence = report.final_sequence,
            elapsed_ms = report.elapsed_ms,
            "Recovery complete"
        );
        Ok((state, report))
    }

    pub fn take_snapshot<S: Serialize + Clone>(
        &self,
        state: &S,
        sequence: u64,
        timestamp: u64,
        compress: bool,
    ) -> Result<PathBuf, RecoveryError> {
        let snapshot = Snapshot::new(sequence, timestamp, state.clone())?;
        Ok(SnapshotWriter::new(&self.snapshot_dir, compress).write(&snapshot)?)
    }
}
