//! # WAL Manager
//!
//! Thin façade over [`crate::buffer::LogBuffer`] and a
//! [`crate::meta::MetaHandler`]: the surface the rest of the vector
//! database actually calls. Translates table-level mutation intents into
//! [`crate::record::Record`]s, drives the buffer's append/next, and is
//! where recovery policy (`recovery_error_ignore`) lives — the buffer
//! itself only knows how to succeed or fail at `init`.

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::buffer::{BufferError, LogBuffer};
use crate::meta::{MetaError, MetaHandler};
use crate::record::{Record, RecordType};
use crate::segment::{segment_exists, segment_size, SegmentError};

/// Errors returned by [`WalManager`] operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The log buffer rejected an operation.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// The meta handler rejected an operation.
    #[error("meta handler error: {0}")]
    Meta(#[from] MetaError),

    /// Caller-supplied arguments were inconsistent (e.g. mismatched
    /// `ids`/`floats` lengths) or refer to an unknown table.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Configuration for a [`WalManager`].
#[derive(Debug, Clone)]
pub struct WalManagerConfig {
    /// Directory containing `<n>.wal` segment files.
    pub mxlog_path: PathBuf,
    /// Target slab size in bytes; clamped by [`LogBuffer::new`].
    pub buffer_size: usize,
    /// If true, a recovery failure during [`WalManager::init`] resets the
    /// buffer to empty at `lsn = 0` instead of failing.
    pub recovery_error_ignore: bool,
}

/// Façade coordinating the log buffer, the meta handler, and per-table
/// bookkeeping for one WAL instance.
pub struct WalManager {
    config: WalManagerConfig,
    buffer: LogBuffer,
    meta: Box<dyn MetaHandler>,
    tables: std::sync::Mutex<HashSet<String>>,
}

impl WalManager {
    /// Builds a manager over `meta` without yet establishing cursors; call
    /// [`WalManager::init`] before using it.
    pub fn new(config: WalManagerConfig, meta: Box<dyn MetaHandler>) -> Self {
        let buffer = LogBuffer::new(&config.mxlog_path, config.buffer_size);
        Self {
            config,
            buffer,
            meta,
            tables: std::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Like [`WalManager::new`], but bypasses the buffer's size clamp so
    /// tests can use small, human-scale slab sizes.
    #[cfg(test)]
    pub(crate) fn new_unclamped(config: WalManagerConfig, meta: Box<dyn MetaHandler>) -> Self {
        let buffer = LogBuffer::new_unclamped(&config.mxlog_path, config.buffer_size);
        Self {
            config,
            buffer,
            meta,
            tables: std::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Determines the applied checkpoint from the meta handler and the
    /// highest LSN present on disk, then initializes the buffer.
    /// `tables` seeds the per-table bookkeeping (no records are emitted).
    pub fn init(&self, tables: &[String]) -> Result<(), ManagerError> {
        {
            let mut guard = self.tables.lock().unwrap_or_else(|p| p.into_inner());
            guard.extend(tables.iter().cloned());
        }

        let applied = self.meta.get()?;
        let end = self.highest_on_disk_lsn()?;

        match self.buffer.init(applied, end) {
            Ok(()) => Ok(()),
            Err(e) if self.config.recovery_error_ignore => {
                warn!(error = %e, "recovery failed, ignoring and resetting to empty");
                self.buffer.init(0, 0)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Per-table in-memory bookkeeping; emits no record.
    pub fn create_table(&self, table_id: &str) {
        let mut guard = self.tables.lock().unwrap_or_else(|p| p.into_inner());
        guard.insert(table_id.to_string());
    }

    /// Whether `table_id` has been registered via [`WalManager::init`] or
    /// [`WalManager::create_table`].
    pub fn has_table(&self, table_id: &str) -> bool {
        let guard = self.tables.lock().unwrap_or_else(|p| p.into_inner());
        guard.contains(table_id)
    }

    /// Appends an `InsertVector` record. `ids.len()` must equal
    /// `floats.len() / dim`.
    pub fn insert_vectors(
        &self,
        table_id: &str,
        partition_tag: &str,
        ids: &[i64],
        floats: &[f32],
        dim: usize,
    ) -> Result<u64, ManagerError> {
        if dim == 0 || floats.len() % dim != 0 || floats.len() / dim != ids.len() {
            return Err(ManagerError::InvalidArgument(format!(
                "ids.len()={} does not match floats.len()={} / dim={}",
                ids.len(),
                floats.len(),
                dim
            )));
        }

        let mut data = Vec::with_capacity(floats.len() * 4);
        for f in floats {
            data.extend_from_slice(&f.to_le_bytes());
        }

        self.append_record(table_id, partition_tag, RecordType::InsertVector, ids, data)
    }

    /// Appends an `InsertBinary` record.
    pub fn insert_binary(
        &self,
        table_id: &str,
        partition_tag: &str,
        ids: &[i64],
        bytes: &[u8],
    ) -> Result<u64, ManagerError> {
        if ids.is_empty() {
            return Err(ManagerError::InvalidArgument(
                "insert_binary requires at least one id".to_string(),
            ));
        }
        self.append_record(
            table_id,
            partition_tag,
            RecordType::InsertBinary,
            ids,
            bytes.to_vec(),
        )
    }

    /// Appends a `Delete` record.
    pub fn delete_by_id(&self, table_id: &str, ids: &[i64]) -> Result<u64, ManagerError> {
        if ids.is_empty() {
            return Err(ManagerError::InvalidArgument(
                "delete_by_id requires at least one id".to_string(),
            ));
        }
        self.append_record(table_id, "", RecordType::Delete, ids, Vec::new())
    }

    /// Appends a `Flush` record. `table_id_opt = None` flushes every table;
    /// the apply loop is responsible for interpreting an empty `table_id`
    /// as "all tables".
    pub fn flush(&self, table_id_opt: Option<&str>) -> Result<u64, ManagerError> {
        let table_id = table_id_opt.unwrap_or("");
        self.append_record(table_id, "", RecordType::Flush, &[], Vec::new())
    }

    fn append_record(
        &self,
        table_id: &str,
        partition_tag: &str,
        record_type: RecordType,
        ids: &[i64],
        data: Vec<u8>,
    ) -> Result<u64, ManagerError> {
        let record = Record {
            lsn: 0,
            record_type,
            table_id: table_id.to_string(),
            partition_tag: partition_tag.to_string(),
            ids: ids.to_vec(),
            data,
        };
        Ok(self.buffer.append(&record)?)
    }

    /// Consumes one record from the buffer for the apply loop. Returns
    /// `None` when there is nothing new.
    pub fn next(&self) -> Result<Option<Record>, ManagerError> {
        Ok(self.buffer.next()?)
    }

    /// Records `lsn` as the new checkpoint and asks the buffer to reclaim
    /// segments it no longer needs.
    pub fn apply_done(&self, lsn: u64) -> Result<(), ManagerError> {
        self.meta.set(lsn)?;
        self.buffer.remove_old_files(lsn)?;
        info!(lsn, "checkpoint advanced");
        Ok(())
    }

    /// The highest checkpointed LSN the meta handler has durably recorded.
    pub fn durable_lsn(&self) -> Result<u64, ManagerError> {
        Ok(self.meta.get()?)
    }

    fn highest_on_disk_lsn(&self) -> Result<u64, ManagerError> {
        let dir = &self.config.mxlog_path;
        let mut highest_file_no = 0u32;
        let mut found = false;

        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if let Some(stem) = name.strip_suffix(".wal") {
                    if let Ok(file_no) = stem.parse::<u32>() {
                        if !found || file_no > highest_file_no {
                            highest_file_no = file_no;
                            found = true;
                        }
                    }
                }
            }
        }

        if !found {
            return Ok(0);
        }

        debug_assert!(segment_exists(dir, highest_file_no));
        let size = segment_size(dir, highest_file_no)
            .map_err(|e| SegmentError::Io { file_no: highest_file_no, source: e })
            .map_err(BufferError::from)?
            .unwrap_or(0);

        Ok((u64::from(highest_file_no) << 32) | size)
    }
}
