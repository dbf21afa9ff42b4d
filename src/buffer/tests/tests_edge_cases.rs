use tempfile::TempDir;

use crate::buffer::{BufferError, LogBuffer};
use crate::record::RecordType;

use super::helpers::record_with;

#[test]
fn oversize_record_is_rejected_without_moving_cursors() {
    let tmp = TempDir::new().unwrap();
    let buf = LogBuffer::new_unclamped(tmp.path(), 1000);
    buf.init(0, 0).unwrap();

    let before = buf.writer_position().unwrap();

    let huge = record_with(RecordType::InsertBinary, 0, 2000 - 27);
    assert_eq!(huge.encoded_size(), 2000);

    let err = buf.append(&huge).unwrap_err();
    assert!(matches!(
        err,
        BufferError::RecordTooLarge {
            size: 2000,
            slab_size: 1000
        }
    ));

    assert_eq!(buf.writer_position().unwrap(), before);
    assert!(!tmp.path().join("1.wal").is_file());
}

#[test]
fn lsns_strictly_increase_across_appends() {
    let tmp = TempDir::new().unwrap();
    let buf = LogBuffer::new_unclamped(tmp.path(), 1000);
    buf.init(0, 0).unwrap();

    let mut last = 0u64;
    for _ in 0..20 {
        let r = record_with(RecordType::Delete, 1, 0);
        let lsn = buf.append(&r).unwrap();
        assert!(lsn > last);
        last = lsn;
    }
}

#[test]
fn operations_before_init_fail_cleanly() {
    let tmp = TempDir::new().unwrap();
    let buf = LogBuffer::new_unclamped(tmp.path(), 1000);

    let r = record_with(RecordType::Delete, 0, 0);
    assert!(matches!(
        buf.append(&r).unwrap_err(),
        BufferError::NotInitialized
    ));
    assert!(matches!(buf.next().unwrap_err(), BufferError::NotInitialized));
}

#[test]
fn buffer_size_below_minimum_is_clamped_up() {
    use crate::buffer::WAL_BUFFER_MIN_SIZE;

    let tmp_small = TempDir::new().unwrap();
    let too_small = LogBuffer::new(tmp_small.path(), 1);
    too_small.init(0, 0).unwrap();
    assert_eq!(too_small.writer_position().unwrap() >> 32, 1);
    // slab_size isn't directly observable; exercise indirectly via an
    // append sized just under the minimum clamp, which must succeed.
    let r = record_with(RecordType::InsertBinary, 0, WAL_BUFFER_MIN_SIZE - 1000);
    assert!(too_small.append(&r).is_ok());
}

#[test]
#[ignore = "allocates two 4 GiB slabs to exercise the real upper clamp; run explicitly with --ignored on a machine with enough memory"]
fn buffer_size_above_maximum_is_clamped_down() {
    use crate::buffer::WAL_BUFFER_MAX_SIZE;

    let tmp_big = TempDir::new().unwrap();
    let too_big = LogBuffer::new(tmp_big.path(), WAL_BUFFER_MAX_SIZE * 2);
    too_big.init(0, 0).unwrap();
    assert!(too_big.writer_position().is_ok());
}
