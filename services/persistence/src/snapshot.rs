//! Snapshot System: ledger state snapshots with integrity and compression
//!
//! A snapshot captures the full ledger state after a given journal sequence.
//! The state type is generic; it must serialize deterministically (ordered maps
//! only) so that the SHA-256 integrity hash is stable across runs.
//!
//! Files are named `snapshot-{sequence:012}.snap` (or `.snap.zst` when zstd
//! compressed) and written atomically via a temp file and rename.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("No snapshots found")]
    NoSnapshots,
}

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// SHA-256 over the bincode encoding of `state`, hex encoded.
pub fn state_hash<S: Serialize>(state: &S) -> Result<String, SnapshotError> {
    let bytes =
        bincode::serialize(state).map_err(|e| SnapshotError::Serialization(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Ledger state as of `sequence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    pub version: u32,
    /// Last journal sequence folded into `state` (0 = genesis).
    pub sequence: u64,
    /// Ledger time of that command.
    pub timestamp: u64,
    pub state: S,
    /// Hex SHA-256 of the serialized state.
    pub checksum: String,
}

impl<S: Serialize> Snapshot<S> {
    pub fn new(sequence: u64, timestamp: u64, state: S) -> Result<Self, SnapshotError> {
        let checksum = state_hash(&state)?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            sequence,
            timestamp,
            state,
            checksum,
        })
    }

    pub fn verify_integrity(&self) -> Result<(), SnapshotError> {
        let actual = state_hash(&self.state)?;
        if actual != self.checksum {
            return Err(SnapshotError::IntegrityFailure {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }
}

// ── Snapshot Writer ─────────────────────────────────────────────────

pub struct SnapshotWriter {
    dir: PathBuf,
    compress: bool,
}

impl SnapshotWriter {
    /// `compress` enables zstd.
    pub fn new(dir: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            dir: dir.into(),
            compress,
        }
    }

    pub fn write<S: Serialize>(&self, snapshot: &Snapshot<S>) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.dir)?;

        let data = bincode::serialize(snapshot)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        let (final_data, ext) = if self.compress {
            let compressed = zstd::encode_all(data.as_slice(), 3)
                .map_err(|e| SnapshotError::Compression(e.to_string()))?;
            (compressed, "snap.zst")
        } else {
            (data, "snap")
        };

        let filename = format!("snapshot-{:012}.{}", snapshot.sequence, ext);
        let path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!("{}.tmp", filename));

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&final_data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        info!(
            sequence = snapshot.sequence,
            bytes = final_data.len(),
            compressed = self.compress,
            "Snapshot written"
        );
        Ok(path)
    }
}

// ── Snapshot Loader ─────────────────────────────────────────────────

/// Loads snapshots from disk, verifying version and integrity.
pub struct SnapshotLoader {
    dir: PathBuf,
}

impl SnapshotLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load<S>(&self, path: &Path) -> Result<Snapshot<S>, SnapshotError>
    where
        S: Serialize + DeserializeOwned,
    {
        let data = fs::read(path)?;

        let is_compressed = path.extension().map(|e| e == "zst").unwrap_or(false);
        let decompressed = if is_compressed {
            zstd::decode_all(data.as_slice())
                .map_err(|e| SnapshotError::Compression(e.to_string()))?
        } else {
            data
        };

        let snapshot: Snapshot<S> = bincode::deserialize(&decompressed)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        snapshot.verify_integrity()?;

        debug!(path = %path.display(), sequence = snapshot.sequence, "Snapshot loaded");
        Ok(snapshot)
    }

    /// Load the snapshot with the highest sequence.
    pub fn load_latest<S>(&self) -> Result<Snapshot<S>, SnapshotError>
    where
        S: Serialize + DeserializeOwned,
    {
        let path = self.find_latest()?;
        self.load(&path)
    }

    pub fn find_latest(&self) -> Result<PathBuf, SnapshotError> {
        self.list_snapshots()?
            .pop()
            .map(|(_, path)| path)
            .ok_or(SnapshotError::NoSnapshots)
    }

    /// All snapshots as `(sequence, path)`, ascending.
    pub fn list_snapshots(&self) -> Result<Vec<(u64, PathBuf)>, SnapshotError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(seq) = parse_sequence(&name) {
                results.push((seq, entry.path()));
            }
        }
        results.sort_by_key(|(seq, _)| *seq);
        Ok(results)
    }
}

fn parse_sequence(filename: &str) -> Option<u64> {
    let rest = filename.strip_prefix("snapshot-")?;
    let digits = rest
        .strip_suffix(".snap.zst")
        .or_else(|| rest.strip_suffix(".snap"))?;
    digits.parse().ok()
}

// ── Policies ────────────────────────────────────────────────────────

/// Take a snapshot every `event_interval` committed commands.
#[derive(Debug, Clone)]
pub struct SnapshotIntervalPolicy {
    pub event_interval: u64,
    pub last_snapshot_seq: u64,
}

impl SnapshotIntervalPolicy {
    pub fn with_interval(interval: u64) -> Self {
        Self {
            event_interval: interval,
            last_snapshot_seq: 0,
        }
    }

    pub fn should_snapshot(&self, current_seq: u64) -> bool {
        self.event_interval > 0 && current_seq >= self.last_snapshot_seq + self.event_interval
    }

    pub fn record_snapshot(&mut self, seq: u64) {
        self.last_snapshot_seq = seq;
    }
}

/// Keep only the newest `max_snapshots` snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotCleanupPolicy {
    pub max_snapshots: usize,
}

impl SnapshotCleanupPolicy {
    pub fn new(max_snapshots: usize) -> Self {
        Self { max_snapshots }
    }

    pub fn cleanup(&self, dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
        let snapshots = SnapshotLoader::new(dir).list_snapshots()?;

        let mut removed = Vec::new();
        let excess = snapshots.len().saturating_sub(self.max_snapshots);
        for (_, path) in snapshots.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed.push(path);
        }
        if !removed.is_empty() {
            debug!(removed = removed.len(), "Old snapshots pruned");
        }
        Ok(removed)
    }
}
