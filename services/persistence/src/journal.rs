//! Journal Writer: append-only write-ahead log of ledger commands
//!
//! Every committed ledger command is appended here before the in-memory state
//! is replaced, so a restart can rebuild the ledger by replaying the journal on
//! top of the latest snapshot.
//!
//! # Binary Format (per entry, little-endian)
//! ```text
//! [body_len:    u32]
//! [sequence:    u64]
//! [timestamp:   u64]
//! [kind_len:    u16][kind: utf-8 bytes]
//! [payload_len: u32][payload: bytes]
//! [checksum:    u32]  // CRC32C over sequence+timestamp+kind+payload
//! ```

use crc32c::crc32c;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Fixed part of an entry body: seq + ts + kind_len + payload_len + crc.
const MIN_BODY_LEN: usize = 8 + 8 + 2 + 4 + 4;

/// Bodies larger than this are treated as corruption rather than allocated.
const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed entry: {0}")]
    Malformed(String),

    #[error("Sequence error: expected {expected}, got {got}")]
    SequenceError { expected: u64, got: u64 },

    #[error("Journal size limit exceeded: {current} >= {limit}")]
    SizeLimitExceeded { current: u64, limit: u64 },

    #[error("Journal writer disabled: a failed append could not be rolled back")]
    Poisoned,
}

// ── Journal Entry ───────────────────────────────────────────────────

/// One persisted ledger command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Gapless, monotonic sequence number (first command is 1).
    pub sequence: u64,
    /// Ledger time (unix seconds) the command executed at.
    pub timestamp: u64,
    /// Command name, for diagnostics and filtering.
    pub kind: String,
    /// Bincode-encoded command.
    pub payload: Vec<u8>,
    /// CRC32C over (sequence ++ timestamp ++ kind ++ payload).
    pub checksum: u32,
}

impl JournalEntry {
    /// Create a new entry, computing the checksum.
    pub fn new(sequence: u64, timestamp: u64, kind: impl Into<String>, payload: Vec<u8>) -> Self {
        let kind = kind.into();
        let checksum = Self::compute_checksum(sequence, timestamp, &kind, &payload);
        Self {
            sequence,
            timestamp,
            kind,
            payload,
            checksum,
        }
    }

    pub fn compute_checksum(sequence: u64, timestamp: u64, kind: &str, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(16 + kind.len() + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(kind.as_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, self.timestamp, &self.kind, &self.payload)
    }

    /// Encode to the wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, JournalError> {
        let kind = self.kind.as_bytes();
        let kind_len = u16::try_from(kind.len())
            .map_err(|_| JournalError::Malformed(format!("kind too long: {} bytes", kind.len())))?;
        let payload_len = u32::try_from(self.payload.len()).map_err(|_| {
            JournalError::Malformed(format!("payload too long: {} bytes", self.payload.len()))
        })?;
        let body_len = MIN_BODY_LEN + kind.len() + self.payload.len();
        if body_len > MAX_BODY_LEN {
            return Err(JournalError::Malformed(format!("entry too large: {body_len} bytes")));
        }

        let mut buf = Vec::with_capacity(4 + body_len);
        buf.extend_from_slice(&(body_len as u32).to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&kind_len.to_le_bytes());
        buf.extend_from_slice(kind);
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        Ok(buf)
    }

    /// Decode one entry from the front of `data`.
    ///
    /// Returns `(entry, bytes_consumed)`. The checksum is not verified here;
    /// readers call [`JournalEntry::verify_checksum`] so they can report where
    /// a mismatch happened.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), JournalError> {
        let mut cursor = Cursor::new(data);
        let body_len = cursor.u32()? as usize;
        if body_len > MAX_BODY_LEN {
            return Err(JournalError::Malformed(format!(
                "implausible body length {body_len}"
            )));
        }
        if body_len < MIN_BODY_LEN {
            return Err(JournalError::Malformed(format!(
                "body too small: {body_len} bytes, minimum is {MIN_BODY_LEN}"
            )));
        }
        let total = 4 + body_len;
        if data.len() < total {
            return Err(JournalError::Malformed(format!(
                "incomplete entry: need {total} bytes, have {}",
                data.len()
            )));
        }

        let mut body = Cursor::new(&data[4..total]);
        let sequence = body.u64()?;
        let timestamp = body.u64()?;
        let kind_len = body.u16()? as usize;
        let kind = String::from_utf8(body.take(kind_len)?.to_vec())
            .map_err(|e| JournalError::Malformed(e.to_string()))?;
        let payload_len = body.u32()? as usize;
        let payload = body.take(payload_len)?.to_vec();
        let checksum = body.u32()?;

        Ok((
            Self {
                sequence,
                timestamp,
                kind,
                payload,
                checksum,
            },
            total,
        ))
    }
}

/// Bounds-checked little-endian reader over a byte slice.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], JournalError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                JournalError::Malformed(format!(
                    "field of {len} bytes exceeds remaining {} bytes",
                    self.data.len() - self.pos
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], JournalError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, JournalError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, JournalError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, JournalError> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}

// ── Fsync Policy ────────────────────────────────────────────────────

/// Controls when `fsync` is called. Entries are always flushed to the OS
/// before `append` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsyncPolicy {
    EveryWrite,
    EveryN(usize),
    OnRotation,
}

// ── Journal Writer Configuration ────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Directory for journal files.
    pub dir: PathBuf,
    /// Rotate to a new file once the current one reaches this size (default 64 MiB).
    pub max_file_size: u64,
    /// Maximum total journal size in bytes (0 = unlimited).
    pub max_total_size: u64,
    pub fsync_policy: FsyncPolicy,
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: 64 * 1024 * 1024,
            max_total_size: 0,
            fsync_policy: FsyncPolicy::EveryWrite,
        }
    }
}

// ── Journal Writer ──────────────────────────────────────────────────

/// Append-only journal writer with checksums, rotation, and fsync control.
pub struct JournalWriter {
    config: JournalConfig,
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_file_size: u64,
    next_sequence: u64,
    writes_since_fsync: usize,
    file_index: u64,
    total_size: u64,
    poisoned: bool,
}

impl JournalWriter {
    /// Open the writer, continuing the newest journal file in `config.dir`.
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;

        let file_index = latest_journal_index(&config.dir)?.unwrap_or(0);
        let current_file = journal_path(&config.dir, file_index);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current_file)?;
        let current_file_size = file.metadata()?.len();
        let total_size = journal_files(&config.dir)?
            .iter()
            .map(|(_, path)| fs::metadata(path).map(|m| m.len()))
            .sum::<Result<u64, io::Error>>()?;

        debug!(file = %current_file.display(), total_size, "Journal opened");

        Ok(Self {
            config,
            writer: BufWriter::new(file),
            current_file,
            current_file_size,
            next_sequence: 1,
            writes_since_fsync: 0,
            file_index,
            total_size,
            poisoned: false,
        })
    }

    /// Set the next expected sequence number (after recovery).
    pub fn set_next_sequence(&mut self, seq: u64) {
        self.next_sequence = seq;
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn current_file_path(&self) -> &Path {
        &self.current_file
    }

    /// Append an entry. Its sequence must be exactly `next_sequence()`.
    ///
    /// Either the whole frame is written (and synced, per the fsync policy)
    /// or the file is cut back to its prior length and `next_sequence()` is
    /// unchanged.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        if self.poisoned {
            return Err(JournalError::Poisoned);
        }
        if entry.sequence != self.next_sequence {
            return Err(JournalError::SequenceError {
                expected: self.next_sequence,
                got: entry.sequence,
            });
        }

        if self.config.max_total_size > 0 && self.total_size >= self.config.max_total_size {
            return Err(JournalError::SizeLimitExceeded {
                current: self.total_size,
                limit: self.config.max_total_size,
            });
        }

        if self.current_file_size >= self.config.max_file_size {
            self.rotate()?;
        }

        let bytes = entry.to_bytes()?;
        let should_fsync = match self.config.fsync_policy {
            FsyncPolicy::EveryWrite => true,
            FsyncPolicy::EveryN(n) => self.writes_since_fsync + 1 >= n,
            FsyncPolicy::OnRotation => false,
        };
        if let Err(e) = self.write_frame(&bytes, should_fsync) {
            warn!(sequence = entry.sequence, error = %e, "Journal append failed, rolling back");
            self.truncate_to(self.current_file_size)?;
            return Err(e);
        }

        let written = bytes.len() as u64;
        self.current_file_size += written;
        self.total_size += written;
        self.next_sequence = entry.sequence + 1;
        self.writes_since_fsync = if should_fsync { 0 } else { self.writes_since_fsync + 1 };

        Ok(())
    }

    /// Build an entry with the next sequence number and append it.
    pub fn write_event(
        &mut self,
        timestamp: u64,
        kind: impl Into<String>,
        payload: Vec<u8>,
    ) -> Result<JournalEntry, JournalError> {
        let entry = JournalEntry::new(self.next_sequence, timestamp, kind, payload);
        self.append(&entry)?;
        Ok(entry)
    }

    /// Force flush + fsync.
    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.writes_since_fsync = 0;
        Ok(())
    }

    fn write_frame(&mut self, bytes: &[u8], fsync: bool) -> Result<(), JournalError> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        if fsync {
            self.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Cut the current file back to `len` bytes, dropping anything written or
    /// buffered past it. If that fails the writer refuses further appends.
    fn truncate_to(&mut self, len: u64) -> Result<(), JournalError> {
        let result = self.reset_writer().and_then(|_| {
            let file = self.writer.get_ref();
            file.set_len(len)?;
            file.sync_all()?;
            Ok(())
        });
        if let Err(e) = &result {
            error!(file = %self.current_file.display(), len, error = %e, "Journal rollback failed");
            self.poisoned = true;
        }
        result
    }

    /// Replace the buffered writer with a fresh one on the same file. Bytes
    /// the old writer still holds may be flushed as it drops.
    fn reset_writer(&mut self) -> Result<(), JournalError> {
        let file = self.writer.get_ref().try_clone()?;
        self.writer = BufWriter::new(file);
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        self.sync()?;

        self.file_index += 1;
        self.current_file = journal_path(&self.config.dir, self.file_index);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_file)?;
        self.writer = BufWriter::new(file);
        self.current_file_size = 0;

        info!(file = %self.current_file.display(), "Journal rotated");
        Ok(())
    }
}

// ── File naming ─────────────────────────────────────────────────────

pub(crate) fn journal_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("journal-{:06}.bin", index))
}

fn parse_journal_index(name: &str) -> Option<u64> {
    name.strip_prefix("journal-")?
        .strip_suffix(".bin")?
        .parse()
        .ok()
}

/// All journal files in `dir`, sorted by index.
pub(crate) fn journal_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>, io::Error> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(index) = parse_journal_index(&name) {
            files.push((index, entry.path()));
        }
    }
    files.sort_by_key(|(index, _)| *index);
    Ok(files)
}

fn latest_journal_index(dir: &Path) -> Result<Option<u64>, io::Error> {
    Ok(journal_files(dir)?.last().map(|(index, _)| *index))
}

// ── Tests ───────────────────────────────────────────────────────────
