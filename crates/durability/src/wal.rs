//! WAL (Write-Ahead Log) entry types and file operations
//!
//! One entry per mutation:
//! - TraceAppend: a trace record entering the store
//! - RegistrationUpsert / ModelUpsert: reference catalog rows
//! - TagAdd / TagRemove: identity ↔ tag relation changes
//! - MetadataSet: a metadata key replaced
//!
//! Entries are written before the mutation is applied in memory, and
//! replayed in file order on open.
//!
//! ## File Operations
//!
//! - `Wal::open()` - Open existing WAL or create new one
//! - `Wal::append()` - Write encoded entry to end of file
//! - `Wal::read_all()` - Decode every entry, separating a torn tail
//! - `Wal::truncate()` - Drop a torn tail before new appends
//! - `Wal::flush()` / `Wal::fsync()` - Push buffered bytes to the OS / disk
//!
//! ## Durability Modes
//!
//! - `Strict` - fsync after every entry
//! - `Batched` - fsync every N entries OR T ms (DEFAULT)

use crate::encoding::{decode_entry, encode_entry, frame_len, Decoded};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use skytrace_core::{
    AircraftModel, AircraftRegistration, Error, IcaoAddress, Result, TraceRecord,
};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, warn};

/// WAL entry types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalEntry {
    /// Trace record appended
    TraceAppend {
        /// The record
        record: TraceRecord,
    },
    /// Registration row inserted or overwritten
    RegistrationUpsert {
        /// New row
        row: AircraftRegistration,
    },
    /// Model row inserted or overwritten
    ModelUpsert {
        /// New row
        model: AircraftModel,
    },
    /// Tag pair created
    TagAdd {
        /// Identity
        icao_address: IcaoAddress,
        /// Tag text
        tag: String,
    },
    /// Tag pair removed
    TagRemove {
        /// Identity
        icao_address: IcaoAddress,
        /// Tag text
        tag: String,
    },
    /// Metadata key replaced
    MetadataSet {
        /// Key
        key: String,
        /// Value as JSON text (bincode cannot carry self-describing values)
        json: String,
    },
}

impl WalEntry {
    /// Build a `MetadataSet` entry from a JSON value
    pub fn metadata_set(key: &str, value: &serde_json::Value) -> Result<Self> {
        Ok(WalEntry::MetadataSet {
            key: key.to_string(),
            json: serde_json::to_string(value)?,
        })
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            WalEntry::TraceAppend { .. } => "trace_append",
            WalEntry::RegistrationUpsert { .. } => "registration_upsert",
            WalEntry::ModelUpsert { .. } => "model_upsert",
            WalEntry::TagAdd { .. } => "tag_add",
            WalEntry::TagRemove { .. } => "tag_remove",
            WalEntry::MetadataSet { .. } => "metadata_set",
        }
    }
}

// ============================================================================
// Durability Mode
// ============================================================================

/// Controls when fsync is called
///
/// The default is `Batched { interval_ms: 100, batch_size: 1000 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// fsync after every entry
    Strict,

    /// fsync every `batch_size` entries OR every `interval_ms`
    ///
    /// May lose up to one batch of entries on crash.
    Batched {
        /// Maximum time between fsyncs in milliseconds
        interval_ms: u64,
        /// Maximum entries between fsyncs
        batch_size: usize,
    },
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::Batched {
            interval_ms: 100,
            batch_size: 1000,
        }
    }
}

// ============================================================================
// Replay
// ============================================================================

/// Everything `read_all` recovered from the file
#[derive(Debug, Default)]
pub struct WalReplay {
    /// Verified entries in file order
    pub entries: Vec<WalEntry>,
    /// Length of the verified prefix
    pub valid_len: u64,
    /// Bytes after the verified prefix belonging to a torn final frame
    pub torn_bytes: u64,
}

// ============================================================================
// WAL File Operations
// ============================================================================

/// Pending bytes written to the file without fsync once they pass this size
const PENDING_FLUSH_BYTES: usize = 64 * 1024;

/// Failure to inject on the next file operation
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
enum Fault {
    /// `write` fails before any byte lands
    Write,
    /// The first `n` pending bytes land, then `write` fails
    PartialWrite(usize),
    /// Bytes land, then `fsync` fails
    Sync,
}

struct WalWriter {
    file: File,
    /// Encoded frames not yet handed to the file
    pending: Vec<u8>,
    /// File length holding whole frames
    written: u64,
    writes_since_fsync: usize,
    last_fsync: Instant,
    /// Set when a failed append could not be cut back out of the file
    poisoned: bool,
    #[cfg(test)]
    fault: Option<Fault>,
}

impl WalWriter {
    /// Offset the next frame will land at
    fn offset(&self) -> u64 {
        self.written + self.pending.len() as u64
    }

    fn write_file(&mut self) -> std::io::Result<()> {
        #[cfg(test)]
        match self.fault {
            Some(Fault::Write) => {
                self.fault = None;
                return Err(injected("write"));
            }
            Some(Fault::PartialWrite(n)) => {
                self.fault = None;
                let n = n.min(self.pending.len());
                self.file.write_all(&self.pending[..n])?;
                return Err(injected("write"));
            }
            _ => {}
        }
        self.file.write_all(&self.pending)
    }

    fn sync_file(&mut self) -> std::io::Result<()> {
        #[cfg(test)]
        if let Some(Fault::Sync) = self.fault {
            self.fault = None;
            return Err(injected("fsync"));
        }
        self.file.sync_all()
    }

    /// Hand pending frames to the file
    ///
    /// On failure the file is cut back to `written` and `pending` is kept,
    /// so no partial frame stays on disk.
    fn write_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.write_file() {
            let written = self.written;
            self.cut_file(written);
            return Err(Error::StorageFailure(format!(
                "failed to write WAL at offset {}: {}",
                written, e
            )));
        }
        self.written += self.pending.len() as u64;
        self.pending.clear();
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.write_pending()?;
        self.sync_file()
            .map_err(|e| Error::StorageFailure(format!("failed to fsync WAL: {}", e)))?;
        self.writes_since_fsync = 0;
        self.last_fsync = Instant::now();
        Ok(())
    }

    /// Remove every byte of the frame that started at `start`
    fn rollback(&mut self, start: u64) {
        if self.written > start {
            self.cut_file(start);
            self.written = start;
        } else {
            self.pending.truncate((start - self.written) as usize);
        }
        self.writes_since_fsync = self.writes_since_fsync.saturating_sub(1);
    }

    fn cut_file(&mut self, len: u64) {
        if let Err(e) = self.file.set_len(len) {
            error!(offset = len, error = %e, "failed to cut WAL back after a failed append");
            self.poisoned = true;
        }
    }
}

#[cfg(test)]
fn injected(op: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("injected {} failure", op))
}

/// Append-only log file
///
/// Appends serialize on an internal mutex, so the file order is the order in
/// which `append` calls completed.
pub struct Wal {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    durability_mode: DurabilityMode,
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wal")
            .field("path", &self.path)
            .field("durability_mode", &self.durability_mode)
            .finish()
    }
}

impl Wal {
    /// Open existing WAL or create new one
    ///
    /// Creates parent directories if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P, durability_mode: DurabilityMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            writer: Mutex::new(WalWriter {
                file,
                pending: Vec::new(),
                written,
                writes_since_fsync: 0,
                last_fsync: Instant::now(),
                poisoned: false,
                #[cfg(test)]
                fault: None,
            }),
            durability_mode,
        })
    }

    /// Append an entry, honoring the durability mode
    ///
    /// Returns the offset the entry was written at. Any failure is reported
    /// as `StorageFailure` and the entry is removed from the buffer and the
    /// file again; the caller must not apply the mutation.
    pub fn append(&self, entry: &WalEntry) -> Result<u64> {
        let encoded = encode_entry(entry)?;
        let mut writer = self.writer.lock();
        if writer.poisoned {
            return Err(Error::StorageFailure(
                "WAL is unusable after a failed append could not be undone".to_string(),
            ));
        }
        let offset = writer.offset();

        writer.pending.extend_from_slice(&encoded);
        writer.writes_since_fsync += 1;

        let result = match self.durability_mode {
            DurabilityMode::Strict => writer.sync(),
            DurabilityMode::Batched {
                interval_ms,
                batch_size,
            } => {
                let elapsed = writer.last_fsync.elapsed().as_millis() as u64;
                if elapsed >= interval_ms || writer.writes_since_fsync >= batch_size {
                    writer.sync()
                } else if writer.pending.len() >= PENDING_FLUSH_BYTES {
                    writer.write_pending()
                } else {
                    Ok(())
                }
            }
        };

        if let Err(e) = result {
            writer.rollback(offset);
            warn!(offset, kind = entry.kind(), error = %e, "WAL append failed");
            return Err(e);
        }
        Ok(offset)
    }

    /// Flush buffered writes to OS buffers
    pub fn flush(&self) -> Result<()> {
        self.writer.lock().write_pending()
    }

    /// Flush and fsync
    pub fn fsync(&self) -> Result<()> {
        self.writer.lock().sync()
    }

    /// Fsync if entries are waiting and the batch interval has passed
    ///
    /// Called periodically so a quiet writer does not leave its last
    /// entries buffered. Returns whether a sync happened.
    pub fn sync_if_overdue(&self) -> Result<bool> {
        let DurabilityMode::Batched { interval_ms, .. } = self.durability_mode else {
            return Ok(false);
        };
        let mut writer = self.writer.lock();
        if writer.writes_since_fsync == 0 {
            return Ok(false);
        }
        if (writer.last_fsync.elapsed().as_millis() as u64) < interval_ms {
            return Ok(false);
        }
        writer.sync()?;
        Ok(true)
    }

    /// Decode every entry from the beginning of the file
    ///
    /// Only the final frame may be torn: one that runs past end of file with
    /// no valid frame after its start, or whose checksum fails while ending
    /// exactly at end of file. It is reported in `torn_bytes` and not
    /// returned. Any other bad frame is `Error::Corruption`.
    pub fn read_all(&self) -> Result<WalReplay> {
        self.flush()?;

        let mut buf = Vec::new();
        File::open(&self.path)?.read_to_end(&mut buf)?;

        let mut replay = WalReplay::default();
        let mut pos = 0usize;
        while pos < buf.len() {
            match decode_entry(&buf[pos..], pos as u64) {
                Ok(Decoded::Entry(entry, consumed)) => {
                    replay.entries.push(entry);
                    pos += consumed;
                }
                Ok(Decoded::Incomplete) => {
                    if let Some(next) = next_valid_frame(&buf, pos + 1) {
                        return Err(Error::Corruption(format!(
                            "offset {}: frame length runs past end of file but a valid frame follows at offset {}",
                            pos, next
                        )));
                    }
                    break;
                }
                Err(e) => {
                    let reaches_eof = frame_len(&buf[pos..]) == Some(buf.len() - pos);
                    if !reaches_eof {
                        return Err(e);
                    }
                    warn!(offset = pos, error = %e, "discarding damaged final WAL frame");
                    break;
                }
            }
        }

        replay.valid_len = pos as u64;
        replay.torn_bytes = (buf.len() - pos) as u64;
        if replay.torn_bytes > 0 {
            warn!(
                path = %self.path.display(),
                offset = replay.valid_len,
                bytes = replay.torn_bytes,
                "torn WAL tail detected"
            );
        }
        Ok(replay)
    }

    /// Cut the file back to `len` bytes, discarding a torn tail
    pub fn truncate(&self, len: u64) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.write_pending()?;
        writer.file.set_len(len)?;
        writer.file.sync_all()?;
        writer.written = len;
        Ok(())
    }

    /// Current file size (offset for next write)
    pub fn size(&self) -> u64 {
        self.writer.lock().offset()
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durability mode
    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }

    #[cfg(test)]
    fn inject_fault(&self, fault: Fault) {
        self.writer.lock().fault = Some(fault);
    }
}

/// First offset at or after `from` where a whole, verified frame decodes
fn next_valid_frame(buf: &[u8], from: usize) -> Option<usize> {
    (from..buf.len()).find(|&pos| {
        matches!(
            decode_entry(&buf[pos..], pos as u64),
            Ok(Decoded::Entry(..))
        )
    })
}

impl Drop for Wal {
    fn drop(&mut self) {
        let _ = self.writer.lock().sync();
    }
}
