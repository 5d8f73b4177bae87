//! Ledger persistence
//!
//! Append-only command journal, sequential reader with corruption detection,
//! integrity-checked state snapshots, and crash recovery by snapshot load plus
//! journal replay. The ledger state type is generic: anything that serializes
//! deterministically and implements [`recovery::Replayable`] can be persisted.
//!
//! Sequence numbers are gapless and monotonic. Sequence 0 names the genesis
//! snapshot; the first journaled command is sequence 1.

pub mod journal;
pub mod reader;
pub mod snapshot;
pub mod recovery;

pub use journal::{FsyncPolicy, JournalConfig, JournalEntry, JournalError, JournalWriter};
pub use reader::{JournalReader, ReaderError, TruncatedTail};
pub use recovery::{RecoveryEngine, RecoveryError, RecoveryReport, Replayable};
pub use snapshot::{
    Snapshot, SnapshotCleanupPolicy, SnapshotError, SnapshotIntervalPolicy, SnapshotLoader,
    SnapshotWriter,
};
