//! # Meta Handler
//!
//! Durable storage of a single 64-bit checkpoint LSN: the highest LSN
//! whose effects the downstream catalog has already absorbed. The WAL
//! itself never interprets this value beyond comparing it to record
//! LSNs; persistence semantics (what store backs it, how it is replicated)
//! belong to the catalog, which is out of scope here.
//!
//! [`MetaHandler`] is the seam the WAL Manager drives; [`FileMetaHandler`]
//! is a reference, crash-safe implementation for embedding this crate
//! without a separate metadata database. A missing checkpoint reads as
//! `lsn = 0`.

#[cfg(test)]
mod tests;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher as Crc32;
use thiserror::Error;
use tracing::{debug, info};

/// Errors returned by [`MetaHandler`] operations.
#[derive(Debug, Error)]
pub enum MetaError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The checkpoint file exists but its trailing checksum doesn't match
    /// its payload.
    #[error("checkpoint checksum mismatch")]
    ChecksumMismatch,

    /// The checkpoint file exists but is not the expected 12 bytes
    /// (8-byte LSN + 4-byte CRC32).
    #[error("checkpoint file has unexpected length {0}")]
    BadLength(usize),
}

/// Persists and retrieves a single durable checkpoint LSN.
///
/// Implementations must make `set` atomic (write-then-rename or
/// equivalent): a crash during `set` must never leave `get` observing a
/// torn value.
pub trait MetaHandler: Send + Sync {
    /// Persists `lsn` as the new checkpoint.
    fn set(&self, lsn: u64) -> Result<(), MetaError>;

    /// Returns the last persisted checkpoint, or `0` if none was ever set.
    fn get(&self) -> Result<u64, MetaError>;
}

const CHECKPOINT_FILENAME: &str = "CHECKPOINT";
const CHECKPOINT_TMP_SUFFIX: &str = ".tmp";
const PAYLOAD_SIZE: usize = 8;
const CRC_SIZE: usize = 4;
const FILE_SIZE: usize = PAYLOAD_SIZE + CRC_SIZE;

/// A [`MetaHandler`] backed by a single small file, written atomically via
/// a temp-file-then-rename sequence with a trailing CRC32, the same
/// durability recipe this crate's author uses for manifest snapshots.
#[derive(Debug)]
pub struct FileMetaHandler {
    path: PathBuf,
}

impl FileMetaHandler {
    /// Uses `<dir>/CHECKPOINT` as the backing file. `dir` must already exist.
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CHECKPOINT_FILENAME),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(CHECKPOINT_TMP_SUFFIX);
        self.path.with_file_name(name)
    }

    fn fsync_parent(&self) -> Result<(), MetaError> {
        if let Some(dir) = self.path.parent() {
            File::open(dir)?.sync_all()?;
        }
        Ok(())
    }
}

impl MetaHandler for FileMetaHandler {
    fn set(&self, lsn: u64) -> Result<(), MetaError> {
        let mut bytes = Vec::with_capacity(FILE_SIZE);
        bytes.extend_from_slice(&lsn.to_le_bytes());

        let mut hasher = Crc32::new();
        hasher.update(&bytes);
        let checksum = hasher.finalize();
        bytes.extend_from_slice(&checksum.to_le_bytes());

        let tmp_path = self.tmp_path();
        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        self.fsync_parent()?;

        info!(lsn, "checkpoint persisted");
        Ok(())
    }

    fn get(&self) -> Result<u64, MetaError> {
        let mut f = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no checkpoint on disk, defaulting to lsn=0");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;
        if buf.len() != FILE_SIZE {
            return Err(MetaError::BadLength(buf.len()));
        }

        let payload = &buf[..PAYLOAD_SIZE];
        let stored_crc = u32::from_le_bytes(buf[PAYLOAD_SIZE..].try_into().unwrap());

        let mut hasher = Crc32::new();
        hasher.update(payload);
        if hasher.finalize() != stored_crc {
            return Err(MetaError::ChecksumMismatch);
        }

        let lsn = u64::from_le_bytes(payload.try_into().unwrap());
        debug!(lsn, "checkpoint loaded");
        Ok(lsn)
    }
}

/// An in-memory [`MetaHandler`] for tests and for callers who genuinely
/// manage the checkpoint in an external catalog and only need something
/// to hand the [`crate::manager::WalManager`] during construction in
/// isolation.
#[derive(Debug, Default)]
pub struct InMemoryMetaHandler {
    lsn: std::sync::Mutex<u64>,
}

impl MetaHandler for InMemoryMetaHandler {
    fn set(&self, lsn: u64) -> Result<(), MetaError> {
        *self.lsn.lock().unwrap_or_else(|p| p.into_inner()) = lsn;
        Ok(())
    }

    fn get(&self) -> Result<u64, MetaError> {
        Ok(*self.lsn.lock().unwrap_or_else(|p| p.into_inner()))
    }
}
