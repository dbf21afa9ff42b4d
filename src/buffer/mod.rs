//! # Log Buffer
//!
//! The core of the WAL: a double-buffered in-memory ring of two equal-sized
//! slabs, each backed by one on-disk segment, coordinating one writer and
//! one reader across the segment boundary. Owns segment rotation, append,
//! next, recovery loading, and both cursors.
//!
//! ## Concurrency
//!
//! A single [`std::sync::Mutex`] guards the slabs and both cursors; two
//! [`std::sync::Condvar`]s mediate the handoff:
//!
//! - `writer_cv` — the writer waits here when it needs the slab the reader
//!   hasn't finished draining yet.
//! - `reader_cv` — signalled after every successful [`LogBuffer::append`] so
//!   an external apply loop can block on [`LogBuffer::wait_for_reader`]
//!   instead of busy-polling [`LogBuffer::next`].
//!
//! This crate is single-producer/single-consumer: multiple concurrent
//! writers require an external serializing lock (the
//! [`crate::manager::WalManager`] provides one).

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use crate::record::{CodecError, Record};
use crate::segment::{segment_exists, segment_size, SegmentError, SegmentFile, SegmentMode};

/// Lower bound a configured buffer size is clamped to (64 MiB).
pub const WAL_BUFFER_MIN_SIZE: usize = 64 * 1024 * 1024;
/// Upper bound a configured buffer size is clamped to (4 GiB).
pub const WAL_BUFFER_MAX_SIZE: usize = 4 * 1024 * 1024 * 1024;

/// Errors returned by [`LogBuffer`] operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// An operation was attempted before [`LogBuffer::init`] (or
    /// [`LogBuffer::reset`]) established cursors and slabs.
    #[error("log buffer not initialized")]
    NotInitialized,

    /// A record's encoded size exceeds the slab size; it cannot ever fit.
    #[error("record of {size} bytes exceeds slab size {slab_size}")]
    RecordTooLarge {
        /// The record's encoded size.
        size: usize,
        /// The configured slab size.
        slab_size: usize,
    },

    /// Decoding a record from a slab failed.
    #[error("corrupt record: {0}")]
    Corrupt(#[from] CodecError),

    /// A segment file handle operation failed.
    #[error("segment error: {0}")]
    Segment(#[from] SegmentError),

    /// A segment required by recovery does not exist on disk.
    #[error("recovery: segment {0}.wal is missing")]
    RecoveryMissingSegment(u32),

    /// A segment's on-disk size disagrees with the expected `end_lsn` offset.
    #[error("recovery: end segment size mismatch (expected {expected}, found {actual})")]
    RecoveryLengthMismatch {
        /// The offset `end_lsn` implied.
        expected: u64,
        /// The segment's actual size on disk.
        actual: u64,
    },

    /// The buffer's mutex was poisoned by a panicking holder.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    buf_idx: usize,
    file_no: u32,
    buf_offset: usize,
    max_offset: usize,
    lsn: u64,
}

impl Cursor {
    fn fresh(file_no: u32, lsn: u64) -> Self {
        Cursor {
            buf_idx: 0,
            file_no,
            buf_offset: 0,
            max_offset: 0,
            lsn,
        }
    }
}

struct State {
    slab_size: usize,
    slabs: [Vec<u8>; 2],
    writer: Cursor,
    reader: Cursor,
    file_no_from: u32,
    writer_segment: Option<SegmentFile>,
}

/// The double-buffered segmented WAL core.
pub struct LogBuffer {
    dir: PathBuf,
    requested_slab_size: usize,
    state: Mutex<Option<State>>,
    writer_cv: Condvar,
    reader_cv: Condvar,
}

fn clamp_slab_size(requested: usize) -> usize {
    requested.clamp(WAL_BUFFER_MIN_SIZE, WAL_BUFFER_MAX_SIZE)
}

fn poisoned(what: &str) -> BufferError {
    BufferError::Internal(format!("{what} mutex poisoned"))
}

impl LogBuffer {
    /// Allocates no slabs yet. `buffer_size` is clamped into
    /// `[WAL_BUFFER_MIN_SIZE, WAL_BUFFER_MAX_SIZE]` and used as the slab
    /// size once [`LogBuffer::init`] or [`LogBuffer::reset`] is called.
    pub fn new(dir: &Path, buffer_size: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            requested_slab_size: clamp_slab_size(buffer_size),
            state: Mutex::new(None),
            writer_cv: Condvar::new(),
            reader_cv: Condvar::new(),
        }
    }

    /// Bypasses the `[WAL_BUFFER_MIN_SIZE, WAL_BUFFER_MAX_SIZE]` clamp so
    /// tests can exercise rotation and recovery without allocating
    /// multi-megabyte slabs per case.
    #[cfg(test)]
    pub(crate) fn new_unclamped(dir: &Path, slab_size: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            requested_slab_size: slab_size,
            state: Mutex::new(None),
            writer_cv: Condvar::new(),
            reader_cv: Condvar::new(),
        }
    }

    /// Establishes cursors and slabs from on-disk state, given the last
    /// durably-applied checkpoint (`start_lsn`) and the highest LSN that
    /// exists on disk (`end_lsn`). See the module-level recovery cases.
    pub fn init(&self, start_lsn: u64, end_lsn: u64) -> Result<(), BufferError> {
        let mut guard = self.state.lock().map_err(|_| poisoned("buffer"))?;

        if start_lsn == end_lsn {
            let file_no = if start_lsn == 0 {
                1
            } else {
                (start_lsn >> 32) as u32 + 1
            };
            let slab_size = self.requested_slab_size;
            let cursor = Cursor::fresh(file_no, start_lsn);
            *guard = Some(State {
                slab_size,
                slabs: [vec![0u8; slab_size], vec![0u8; slab_size]],
                writer: cursor,
                reader: cursor,
                file_no_from: file_no,
                writer_segment: None,
            });
            debug!(file_no, "log buffer initialized fresh");
            return Ok(());
        }

        let sf = (start_lsn >> 32) as u32;
        let so = (start_lsn & 0xFFFF_FFFF) as usize;
        let ef = (end_lsn >> 32) as u32;
        let eo = (end_lsn & 0xFFFF_FFFF) as usize;

        let sf_size = segment_size(&self.dir, sf)
            .map_err(|e| SegmentError::Io { file_no: sf, source: e })?
            .ok_or(BufferError::RecoveryMissingSegment(sf))?;
        if (sf_size as usize) < so {
            return Err(BufferError::RecoveryMissingSegment(sf));
        }

        let ef_size = segment_size(&self.dir, ef)
            .map_err(|e| SegmentError::Io { file_no: ef, source: e })?
            .ok_or(BufferError::RecoveryMissingSegment(ef))?;
        if ef_size as usize != eo {
            return Err(BufferError::RecoveryLengthMismatch {
                expected: eo as u64,
                actual: ef_size,
            });
        }

        let need = sf_size.max(ef_size) as usize;
        let slab_size = need.max(self.requested_slab_size);

        if sf == ef {
            let mut seg = SegmentFile::open(&self.dir, sf, SegmentMode::Read)?;
            let bytes = seg.load()?;

            let mut slab0 = vec![0u8; slab_size];
            slab0[..bytes.len()].copy_from_slice(&bytes);
            let slab1 = vec![0u8; slab_size];

            let reader = Cursor {
                buf_idx: 0,
                file_no: sf,
                buf_offset: so,
                max_offset: bytes.len(),
                lsn: start_lsn,
            };
            let writer = Cursor {
                buf_idx: 0,
                file_no: sf,
                buf_offset: eo,
                max_offset: bytes.len(),
                lsn: end_lsn,
            };

            *guard = Some(State {
                slab_size,
                slabs: [slab0, slab1],
                writer,
                reader,
                file_no_from: sf,
                writer_segment: None,
            });
        } else {
            for fno in (sf + 1)..ef {
                if !segment_exists(&self.dir, fno) {
                    return Err(BufferError::RecoveryMissingSegment(fno));
                }
            }

            let mut seg_sf = SegmentFile::open(&self.dir, sf, SegmentMode::Read)?;
            let bytes_sf = seg_sf.load()?;
            let mut seg_ef = SegmentFile::open(&self.dir, ef, SegmentMode::Read)?;
            let bytes_ef = seg_ef.load()?;

            let mut slab0 = vec![0u8; slab_size];
            slab0[..bytes_sf.len()].copy_from_slice(&bytes_sf);
            let mut slab1 = vec![0u8; slab_size];
            slab1[..bytes_ef.len()].copy_from_slice(&bytes_ef);

            let reader = Cursor {
                buf_idx: 0,
                file_no: sf,
                buf_offset: so,
                max_offset: bytes_sf.len(),
                lsn: start_lsn,
            };
            let writer = Cursor {
                buf_idx: 1,
                file_no: ef,
                buf_offset: eo,
                max_offset: bytes_ef.len(),
                lsn: end_lsn,
            };

            *guard = Some(State {
                slab_size,
                slabs: [slab0, slab1],
                writer,
                reader,
                file_no_from: sf,
                writer_segment: None,
            });
        }

        debug!(start_lsn, end_lsn, "log buffer initialized from recovery");
        Ok(())
    }

    /// Runtime reset used after a full flush/apply cycle: empties both
    /// slabs and positions writer and reader together at the segment
    /// after `lsn`.
    pub fn reset(&self, lsn: u64) -> Result<(), BufferError> {
        let mut guard = self.state.lock().map_err(|_| poisoned("buffer"))?;
        let state = guard.as_mut().ok_or(BufferError::NotInitialized)?;

        let file_no = (lsn >> 32) as u32 + 1;
        let cursor = Cursor::fresh(file_no, lsn);
        state.writer = cursor;
        state.reader = cursor;
        state.file_no_from = file_no;
        state.writer_segment = None;

        debug!(file_no, "log buffer reset");
        Ok(())
    }

    /// Opens `<lsn>>32>.wal` and loads it into the reader's slab, for use
    /// when the manager decides to replay from a specific checkpoint
    /// rather than from the position [`LogBuffer::init`] computed.
    pub fn load_for_recovery(&self, lsn: u64) -> Result<(), BufferError> {
        let mut guard = self.state.lock().map_err(|_| poisoned("buffer"))?;
        let state = guard.as_mut().ok_or(BufferError::NotInitialized)?;

        let file_no = (lsn >> 32) as u32;
        let offset = (lsn & 0xFFFF_FFFF) as usize;

        let mut seg = SegmentFile::open(&self.dir, file_no, SegmentMode::Read)
            .map_err(|_| BufferError::RecoveryMissingSegment(file_no))?;
        let bytes = seg.load()?;

        let idx = state.reader.buf_idx;
        state.slabs[idx].iter_mut().for_each(|b| *b = 0);
        state.slabs[idx][..bytes.len()].copy_from_slice(&bytes);

        state.reader.file_no = file_no;
        state.reader.buf_offset = offset;
        state.reader.max_offset = bytes.len();

        Ok(())
    }

    /// Appends `record` under the writer role, assigning and returning its
    /// LSN. Blocks on `writer_cv` if rotation requires a slab the reader
    /// hasn't finished draining.
    pub fn append(&self, record: &Record) -> Result<u64, BufferError> {
        let record_size = record.encoded_size();
        let mut guard = self.state.lock().map_err(|_| poisoned("buffer"))?;

        {
            let state = guard.as_ref().ok_or(BufferError::NotInitialized)?;
            if record_size > state.slab_size {
                return Err(BufferError::RecordTooLarge {
                    size: record_size,
                    slab_size: state.slab_size,
                });
            }
        }

        let surplus = {
            let state = guard.as_ref().ok_or(BufferError::NotInitialized)?;
            state.slab_size - state.writer.buf_offset
        };

        if surplus < record_size {
            guard = self
                .writer_cv
                .wait_while(guard, |opt| {
                    let state = opt.as_ref().expect("buffer initialized");
                    state.reader.buf_idx != state.writer.buf_idx
                })
                .map_err(|_| poisoned("writer_cv"))?;

            let state = guard.as_mut().ok_or(BufferError::NotInitialized)?;
            state.writer.buf_idx ^= 1;
            state.reader.max_offset = state.writer.max_offset;
            state.writer.buf_offset = 0;
            state.writer.max_offset = 0;
            state.writer.file_no += 1;
            trace!(file_no = state.writer.file_no, "writer rotated segment");
        }

        let state = guard.as_mut().ok_or(BufferError::NotInitialized)?;
        ensure_writer_segment(state, &self.dir)?;

        let lsn = (u64::from(state.writer.file_no) << 32) | state.writer.buf_offset as u64;

        let mut encoded = Vec::with_capacity(record_size);
        let mut stamped = record.clone();
        stamped.lsn = lsn;
        stamped.encode_to(&mut encoded)?;
        debug_assert_eq!(encoded.len(), record_size);

        state
            .writer_segment
            .as_mut()
            .expect("writer segment open")
            .write(&encoded)?;

        let slab = &mut state.slabs[state.writer.buf_idx];
        slab[state.writer.buf_offset..state.writer.buf_offset + record_size]
            .copy_from_slice(&encoded);

        state.writer.buf_offset += record_size;
        state.writer.max_offset = state.writer.buf_offset;
        state.writer.lsn = lsn;

        trace!(lsn, record_size, "record appended");
        self.reader_cv.notify_all();

        Ok(lsn)
    }

    /// Consumes one record under the reader role. Returns `None` if the
    /// reader has caught up with the writer; never blocks.
    pub fn next(&self) -> Result<Option<Record>, BufferError> {
        let mut guard = self.state.lock().map_err(|_| poisoned("buffer"))?;
        let state = guard.as_mut().ok_or(BufferError::NotInitialized)?;

        // A sealed (non-live) slab the reader has fully drained needs a
        // transition before anything else can be decoded. This can be left
        // over from the reader's own previous call, or from a rotation the
        // writer performed while the reader was already sitting at the
        // slab's tip — so it's checked fresh on every call, not only right
        // after a decode.
        loop {
            if state.reader.buf_idx == state.writer.buf_idx
                || state.reader.buf_offset != state.reader.max_offset
            {
                break;
            }

            if state.reader.file_no + 1 == state.writer.file_no {
                state.reader.buf_idx ^= 1;
                state.reader.buf_offset = 0;
                state.reader.file_no = state.writer.file_no;
                state.reader.max_offset = state.writer.max_offset;
                trace!(file_no = state.reader.file_no, "reader caught up to writer's slab");
                self.writer_cv.notify_all();
            } else {
                let leaving_idx = state.reader.buf_idx;
                self.writer_cv.notify_all();

                let next_file_no = state.reader.file_no + 1;
                let mut seg = SegmentFile::open(&self.dir, next_file_no, SegmentMode::Read)
                    .map_err(|_| BufferError::RecoveryMissingSegment(next_file_no))?;
                let bytes = seg.load()?;

                state.slabs[leaving_idx].iter_mut().for_each(|b| *b = 0);
                state.slabs[leaving_idx][..bytes.len()].copy_from_slice(&bytes);

                state.reader.file_no = next_file_no;
                state.reader.buf_offset = 0;
                state.reader.max_offset = bytes.len();
                trace!(file_no = next_file_no, "reader loaded next segment from disk");
            }
        }

        if state.reader.buf_idx == state.writer.buf_idx
            && state.reader.buf_offset == state.writer.buf_offset
        {
            return Ok(None);
        }

        let slab = &state.slabs[state.reader.buf_idx];
        let (record, record_size) = Record::decode_from(&slab[state.reader.buf_offset..])?;

        state.reader.buf_offset += record_size;
        state.reader.lsn = record.lsn;

        Ok(Some(record))
    }

    /// Blocks the calling thread until a record is available or `timeout`
    /// elapses. Returns `true` if a record became available. Purely a
    /// convenience for an external apply loop; [`LogBuffer::next`] itself
    /// never blocks.
    pub fn wait_for_reader(&self, timeout: Duration) -> Result<bool, BufferError> {
        let guard = self.state.lock().map_err(|_| poisoned("buffer"))?;
        let (_, result) = self
            .reader_cv
            .wait_timeout_while(guard, timeout, |opt| {
                let state = opt.as_ref().expect("buffer initialized");
                state.reader.buf_idx == state.writer.buf_idx
                    && state.reader.buf_offset == state.writer.buf_offset
            })
            .map_err(|_| poisoned("reader_cv"))?;
        Ok(!result.timed_out())
    }

    /// Deletes segments below `(thru_lsn >> 32)` that neither cursor still
    /// references. Idempotent; safe to call after every checkpoint.
    pub fn remove_old_files(&self, thru_lsn: u64) -> Result<(), BufferError> {
        let mut guard = self.state.lock().map_err(|_| poisoned("buffer"))?;
        let state = guard.as_mut().ok_or(BufferError::NotInitialized)?;

        let thru_file_no = (thru_lsn >> 32) as u32;
        let lowest_held = state.reader.file_no.min(state.writer.file_no);
        let upper = thru_file_no.min(lowest_held);

        for fno in state.file_no_from..upper {
            SegmentFile::delete(&self.dir, fno)?;
        }
        state.file_no_from = state.file_no_from.max(upper);

        Ok(())
    }

    /// The writer's current position, as an LSN. Read-only introspection;
    /// does not affect append/next.
    pub fn writer_position(&self) -> Result<u64, BufferError> {
        let guard = self.state.lock().map_err(|_| poisoned("buffer"))?;
        let state = guard.as_ref().ok_or(BufferError::NotInitialized)?;
        Ok((u64::from(state.writer.file_no) << 32) | state.writer.buf_offset as u64)
    }

    /// The reader's current position, as an LSN. Read-only introspection.
    pub fn reader_position(&self) -> Result<u64, BufferError> {
        let guard = self.state.lock().map_err(|_| poisoned("buffer"))?;
        let state = guard.as_ref().ok_or(BufferError::NotInitialized)?;
        Ok((u64::from(state.reader.file_no) << 32) | state.reader.buf_offset as u64)
    }
}

fn ensure_writer_segment(state: &mut State, dir: &Path) -> Result<(), SegmentError> {
    match &mut state.writer_segment {
        Some(seg) if seg.file_no() == state.writer.file_no => Ok(()),
        Some(seg) => seg.reborn(state.writer.file_no),
        None => {
            let seg = SegmentFile::open(dir, state.writer.file_no, SegmentMode::Write)?;
            state.writer_segment = Some(seg);
            Ok(())
        }
    }
}
