//! # Record Codec
//!
//! Serializes and deserializes a single WAL [`Record`] to and from a
//! contiguous byte region. The on-disk layout is fixed by the protocol —
//! little-endian, 25-byte header, field order exactly as below — and is
//! not negotiable by a format version byte (versioning is out of scope).
//!
//! ```text
//! offset  size              field
//! 0       4                 record_size (includes this field)
//! 4       8                 lsn
//! 12      1                 type (u8)
//! 13      2                 table_id_len (u16)
//! 15      2                 partition_tag_len (u16)
//! 17      4                 length (u32, number of ids)
//! 21      4                 data_size (u32)
//! 25      table_id_len      table_id bytes
//! ..      partition_tag_len partition_tag bytes
//! ..      length * 8        ids (i64 each, little-endian)
//! ..      data_size         data
//! ```

#[cfg(test)]
mod tests;

use thiserror::Error;

/// Size in bytes of the fixed-layout record header (everything before
/// `table_id`).
pub const HEADER_SIZE: usize = 25;

/// Errors returned while decoding a [`Record`] from a byte slice.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The slice ran out of bytes before decoding finished.
    #[error("unexpected end of buffer (need {needed} bytes, have {available})")]
    UnexpectedEof {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// `table_id` or `partition_tag` bytes were not valid UTF-8.
    #[error("invalid UTF-8 in record field")]
    InvalidUtf8,

    /// The `type` byte did not match any known [`RecordType`].
    #[error("unknown record type code {0}")]
    UnknownType(u8),

    /// The encoded `record_size` header field did not match the size
    /// recomputed from the other header fields and the buffer contents.
    #[error("record_size mismatch: header says {header}, recomputed {recomputed}")]
    SizeMismatch {
        /// Value read from the `record_size` header field.
        header: u32,
        /// Value recomputed from the other fields.
        recomputed: u32,
    },

    /// `length * 8` (the byte size of the `ids` array) overflowed `usize`.
    #[error("ids length overflow: {0}")]
    LengthOverflow(u32),
}

/// The kind of mutation a [`Record`] represents. Values are part of the
/// on-disk format; do not renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// No-op placeholder; never produced by the manager, accepted on decode.
    None = 0,
    /// Insert of float-vector payloads.
    InsertVector = 1,
    /// Insert of raw binary payloads.
    InsertBinary = 2,
    /// Deletion by id.
    Delete = 3,
    /// Flush marker; carries no ids or data.
    Flush = 4,
}

impl RecordType {
    fn from_u8(v: u8) -> Result<Self, CodecError> {
        match v {
            0 => Ok(RecordType::None),
            1 => Ok(RecordType::InsertVector),
            2 => Ok(RecordType::InsertBinary),
            3 => Ok(RecordType::Delete),
            4 => Ok(RecordType::Flush),
            other => Err(CodecError::UnknownType(other)),
        }
    }
}

/// A single WAL record: one Insert, Delete, Flush, or CreateTable mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Log sequence number assigned by the buffer at append time.
    pub lsn: u64,
    /// What kind of mutation this record represents.
    pub record_type: RecordType,
    /// Table the mutation targets. May be empty.
    pub table_id: String,
    /// Partition tag within the table. May be empty.
    pub partition_tag: String,
    /// Identifiers affected by this record (insert or delete).
    pub ids: Vec<i64>,
    /// Opaque payload: floats for vector inserts, raw bytes for binary
    /// inserts, empty for deletes and flushes.
    pub data: Vec<u8>,
}

impl Record {
    /// Total encoded size in bytes, including the 25-byte header.
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE
            + self.table_id.len()
            + self.partition_tag.len()
            + self.ids.len() * 8
            + self.data.len()
    }

    /// Encodes this record into `buf`, appending the bytes.
    ///
    /// Returns [`CodecError::UnknownType`] only in theory (all constructed
    /// `RecordType` values are valid); present for symmetry with `decode`.
    pub fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        let record_size = self.encoded_size() as u32;
        let table_id_len = self.table_id.len() as u16;
        let partition_tag_len = self.partition_tag.len() as u16;
        let length = self.ids.len() as u32;
        let data_size = self.data.len() as u32;

        buf.extend_from_slice(&record_size.to_le_bytes());
        buf.extend_from_slice(&self.lsn.to_le_bytes());
        buf.push(self.record_type as u8);
        buf.extend_from_slice(&table_id_len.to_le_bytes());
        buf.extend_from_slice(&partition_tag_len.to_le_bytes());
        buf.extend_from_slice(&length.to_le_bytes());
        buf.extend_from_slice(&data_size.to_le_bytes());
        buf.extend_from_slice(self.table_id.as_bytes());
        buf.extend_from_slice(self.partition_tag.as_bytes());
        for id in &self.ids {
            buf.extend_from_slice(&id.to_le_bytes());
        }
        buf.extend_from_slice(&self.data);
        Ok(())
    }

    /// Decodes one record starting at `buf[0]`.
    ///
    /// Returns the decoded record and the number of bytes consumed
    /// (equal to `record.encoded_size()`).
    pub fn decode_from(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        require(buf, HEADER_SIZE)?;

        let record_size = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let lsn = u64::from_le_bytes(buf[4..12].try_into().unwrap());
        let record_type = RecordType::from_u8(buf[12])?;
        let table_id_len = u16::from_le_bytes(buf[13..15].try_into().unwrap()) as usize;
        let partition_tag_len = u16::from_le_bytes(buf[15..17].try_into().unwrap()) as usize;
        let length = u32::from_le_bytes(buf[17..21].try_into().unwrap()) as usize;
        let data_size = u32::from_le_bytes(buf[21..25].try_into().unwrap()) as usize;

        let ids_bytes = length
            .checked_mul(8)
            .ok_or(CodecError::LengthOverflow(length as u32))?;

        let total = HEADER_SIZE + table_id_len + partition_tag_len + ids_bytes + data_size;
        require(buf, total)?;

        let mut offset = HEADER_SIZE;
        let table_id = String::from_utf8(buf[offset..offset + table_id_len].to_vec())
            .map_err(|_| CodecError::InvalidUtf8)?;
        offset += table_id_len;

        let partition_tag = String::from_utf8(buf[offset..offset + partition_tag_len].to_vec())
            .map_err(|_| CodecError::InvalidUtf8)?;
        offset += partition_tag_len;

        let mut ids = Vec::with_capacity(length);
        for _ in 0..length {
            let id = i64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap());
            ids.push(id);
            offset += 8;
        }

        let data = buf[offset..offset + data_size].to_vec();
        offset += data_size;

        let recomputed = offset as u32;
        if record_size != recomputed {
            return Err(CodecError::SizeMismatch {
                header: record_size,
                recomputed,
            });
        }

        Ok((
            Record {
                lsn,
                record_type,
                table_id,
                partition_tag,
                ids,
                data,
            },
            offset,
        ))
    }
}

fn require(buf: &[u8], needed: usize) -> Result<(), CodecError> {
    if buf.len() < needed {
        Err(CodecError::UnexpectedEof {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}
