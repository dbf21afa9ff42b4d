//! # Segment File Handler
//!
//! Append-only / read-only access to a single WAL segment file named
//! `<file_no>.wal` inside a configured directory. A segment is never
//! written to from two handles at once: the [`LogBuffer`](crate::buffer::LogBuffer)
//! writer owns the handle it appends through, and the reader opens a
//! fresh read-only handle whenever it needs to load a segment from disk.
//!
//! There is no header, no magic, no version field, and no per-record
//! checksum here — segments are a raw concatenation of
//! [`crate::record`]-encoded bytes. Format versioning and record
//! checksumming are explicitly out of scope for this crate.

#[cfg(test)]
mod tests;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};

/// Errors returned by segment file operations.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Underlying I/O failure. Fatal for the operation that triggered it.
    #[error("I/O error on segment {file_no}: {source}")]
    Io {
        /// Segment ordinal the failing operation targeted.
        file_no: u32,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl SegmentError {
    fn io(file_no: u32, source: io::Error) -> Self {
        SegmentError::Io { file_no, source }
    }
}

/// How a [`SegmentFile`] was opened: read-only replay, or append-for-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentMode {
    /// Opened for sequential, whole-file loads (the reader's path).
    Read,
    /// Opened for append (the writer's path). Created if absent.
    Write,
}

/// Returns the on-disk file name for segment `file_no` (`<file_no>.wal`).
pub fn segment_file_name(file_no: u32) -> String {
    format!("{file_no}.wal")
}

/// Returns the full path of segment `file_no` inside `dir`.
pub fn segment_path(dir: &Path, file_no: u32) -> PathBuf {
    dir.join(segment_file_name(file_no))
}

/// Returns whether segment `file_no` exists inside `dir`.
pub fn segment_exists(dir: &Path, file_no: u32) -> bool {
    segment_path(dir, file_no).is_file()
}

/// Returns the size in bytes of segment `file_no`, or `None` if it doesn't exist.
pub fn segment_size(dir: &Path, file_no: u32) -> io::Result<Option<u64>> {
    match fs::metadata(segment_path(dir, file_no)) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// A handle to one `<file_no>.wal` segment file.
#[derive(Debug)]
pub struct SegmentFile {
    dir: PathBuf,
    file_no: u32,
    mode: SegmentMode,
    file: File,
}

impl SegmentFile {
    /// Opens (creating if necessary, in [`SegmentMode::Write`]) segment
    /// `file_no` inside `dir`.
    pub fn open(dir: &Path, file_no: u32, mode: SegmentMode) -> Result<Self, SegmentError> {
        let path = segment_path(dir, file_no);
        let file = match mode {
            SegmentMode::Write => OpenOptions::new()
                .create(true)
                .read(true)
                .append(true)
                .open(&path)
                .map_err(|e| SegmentError::io(file_no, e))?,
            SegmentMode::Read => OpenOptions::new()
                .read(true)
                .open(&path)
                .map_err(|e| SegmentError::io(file_no, e))?,
        };

        trace!(file_no, mode = ?mode, "segment opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            file_no,
            mode,
            file,
        })
    }

    /// The segment ordinal this handle addresses.
    pub fn file_no(&self) -> u32 {
        self.file_no
    }

    /// Current on-disk size in bytes.
    pub fn file_size(&self) -> Result<u64, SegmentError> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| SegmentError::io(self.file_no, e))
    }

    /// Appends `buf` to the end of the segment. Only valid in [`SegmentMode::Write`].
    pub fn write(&mut self, buf: &[u8]) -> Result<(), SegmentError> {
        self.file
            .write_all(buf)
            .map_err(|e| SegmentError::io(self.file_no, e))?;
        trace!(file_no = self.file_no, bytes = buf.len(), "segment write");
        Ok(())
    }

    /// Reads the entire segment from offset 0 into a freshly-allocated vector.
    pub fn load(&mut self) -> Result<Vec<u8>, SegmentError> {
        let len = self.file_size()?;
        let mut buf = vec![0u8; len as usize];
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| SegmentError::io(self.file_no, e))?;
        self.file
            .read_exact(&mut buf)
            .map_err(|e| SegmentError::io(self.file_no, e))?;
        debug!(file_no = self.file_no, bytes = buf.len(), "segment loaded");
        Ok(buf)
    }

    /// Reads `len` bytes starting at `offset` into a freshly-allocated vector.
    pub fn load_range(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, SegmentError> {
        let mut buf = vec![0u8; len];
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| SegmentError::io(self.file_no, e))?;
        self.file
            .read_exact(&mut buf)
            .map_err(|e| SegmentError::io(self.file_no, e))?;
        Ok(buf)
    }

    /// Closes the current handle and reopens the same directory at
    /// `new_file_no`, keeping the current [`SegmentMode`]. Used by the
    /// writer to rotate onto the next segment (`reborn`).
    pub fn reborn(&mut self, new_file_no: u32) -> Result<(), SegmentError> {
        let dir = self.dir.clone();
        let mode = self.mode;
        let reopened = Self::open(&dir, new_file_no, mode)?;
        debug!(old = self.file_no, new = new_file_no, "segment reborn");
        *self = reopened;
        Ok(())
    }

    /// Deletes segment `file_no` inside `dir`. Idempotent: missing files are not an error.
    pub fn delete(dir: &Path, file_no: u32) -> Result<(), SegmentError> {
        match fs::remove_file(segment_path(dir, file_no)) {
            Ok(()) => {
                debug!(file_no, "segment deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SegmentError::io(file_no, e)),
        }
    }
}
