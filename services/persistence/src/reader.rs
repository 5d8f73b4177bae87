//! Journal Reader: sequential replay source with corruption detection
//!
//! Reads every journal file in index order and yields entries whose CRC32C
//! verifies. A frame that cannot be parsed at the end of a file is treated as a
//! torn write from a crash: it is logged and the reader moves on, so replay
//! recovers the valid prefix. A checksum mismatch on a complete frame is a hard
//! error because it means committed history was altered.

use crate::journal::{journal_files, JournalEntry, JournalError};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Checksum mismatch at byte offset {offset}: entry seq={sequence}")]
    ChecksumMismatch { offset: u64, sequence: u64 },

    #[error("Sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    #[error("Sequence not monotonic: prev={prev}, current={current}")]
    NotMonotonic { prev: u64, current: u64 },
}

/// A region of a journal file that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatedTail {
    pub file: PathBuf,
    /// Offset of the unparseable frame within `file`.
    pub byte_offset: u64,
    pub remaining_bytes: u64,
}

impl TruncatedTail {
    /// Cut `file` back to the end of its last whole frame, so appends made
    /// after recovery are not read as a continuation of the torn frame.
    pub fn discard(&self) -> Result<(), JournalError> {
        let file = OpenOptions::new().write(true).open(&self.file)?;
        file.set_len(self.byte_offset)?;
        file.sync_all()?;
        warn!(
            file = %self.file.display(),
            offset = self.byte_offset,
            discarded = self.remaining_bytes,
            "Discarded torn journal tail"
        );
        Ok(())
    }
}

pub struct JournalReader {
    files: Vec<PathBuf>,
    current_file_idx: usize,
    data: Vec<u8>,
    pos: usize,
    /// Byte offset across all files.
    global_offset: u64,
    last_sequence: Option<u64>,
    truncated: Vec<TruncatedTail>,
}

impl JournalReader {
    /// Open a reader over all journal files in `dir`. A missing directory
    /// reads as an empty journal.
    pub fn open(dir: &Path) -> Result<Self, ReaderError> {
        let files = journal_files(dir)?.into_iter().map(|(_, p)| p).collect();
        let mut reader = Self {
            files,
            current_file_idx: 0,
            data: Vec::new(),
            pos: 0,
            global_offset: 0,
            last_sequence: None,
            truncated: Vec::new(),
        };
        reader.load_current_file()?;
        Ok(reader)
    }

    /// Read the next entry, or `None` once every file is exhausted.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>, ReaderError> {
        loop {
            if self.pos >= self.data.len() && !self.advance_file()? {
                return Ok(None);
            }

            let offset_before = self.global_offset;
            match JournalEntry::from_bytes(&self.data[self.pos..]) {
                Ok((entry, consumed)) => {
                    self.pos += consumed;
                    self.global_offset += consumed as u64;

                    if !entry.verify_checksum() {
                        return Err(ReaderError::ChecksumMismatch {
                            offset: offset_before,
                            sequence: entry.sequence,
                        });
                    }

                    self.last_sequence = Some(entry.sequence);
                    return Ok(Some(entry));
                }
                Err(e) => {
                    let remaining = (self.data.len() - self.pos) as u64;
                    let tail = TruncatedTail {
                        file: self.files[self.current_file_idx].clone(),
                        byte_offset: self.pos as u64,
                        remaining_bytes: remaining,
                    };
                    warn!(
                        file = %tail.file.display(),
                        offset = tail.byte_offset,
                        remaining,
                        error = %e,
                        "Skipping unreadable journal tail"
                    );
                    self.truncated.push(tail);
                    self.global_offset += remaining;
                    self.pos = self.data.len();
                }
            }
        }
    }

    pub fn read_all(&mut self) -> Result<Vec<JournalEntry>, ReaderError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Read all entries and require gapless sequence numbers.
    pub fn read_all_validated(&mut self) -> Result<Vec<JournalEntry>, ReaderError> {
        let entries = self.read_all()?;
        Self::validate_sequences(&entries)?;
        Ok(entries)
    }

    /// Skip entries with `sequence < target_seq`. Returns the number skipped.
    pub fn seek_to_sequence(&mut self, target_seq: u64) -> Result<u64, ReaderError> {
        let mut skipped = 0u64;
        loop {
            if self.pos >= self.data.len() && !self.advance_file()? {
                break;
            }

            match JournalEntry::from_bytes(&self.data[self.pos..]) {
                Ok((entry, consumed)) => {
                    if entry.sequence >= target_seq {
                        break;
                    }
                    self.pos += consumed;
                    self.global_offset += consumed as u64;
                    self.last_sequence = Some(entry.sequence);
                    skipped += 1;
                }
                // Leave the bad frame for next_entry() to report
                Err(_) => break,
            }
        }
        Ok(skipped)
    }

    pub fn current_offset(&self) -> u64 {
        self.global_offset
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Torn tails skipped so far.
    pub fn truncated_tails(&self) -> &[TruncatedTail] {
        &self.truncated
    }

    /// Check that `entries` have strictly consecutive sequence numbers.
    pub fn validate_sequences(entries: &[JournalEntry]) -> Result<(), ReaderError> {
        for pair in entries.windows(2) {
            let (prev, curr) = (pair[0].sequence, pair[1].sequence);
            if curr <= prev {
                return Err(ReaderError::NotMonotonic { prev, current: curr });
            }
            if curr != prev + 1 {
                return Err(ReaderError::SequenceGap {
                    expected: prev + 1,
                    got: curr,
                });
            }
        }
        Ok(())
    }

    fn load_current_file(&mut self) -> Result<(), ReaderError> {
        self.data = match self.files.get(self.current_file_idx) {
            Some(path) => fs::read(path)?,
            None => Vec::new(),
        };
        self.pos = 0;
        Ok(())
    }

    fn advance_file(&mut self) -> Result<bool, ReaderError> {
        self.current_file_idx += 1;
        if self.current_file_idx < self.files.len() {
            self.load_current_file()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
