use crate::segment::{SegmentFile, SegmentMode};
use tempfile::TempDir;

#[test]
fn opening_read_mode_on_missing_file_fails() {
    let tmp = TempDir::new().unwrap();
    let result = SegmentFile::open(tmp.path(), 99, SegmentMode::Read);
    assert!(result.is_err());
}

#[test]
fn write_mode_reopen_appends_rather_than_truncates() {
    let tmp = TempDir::new().unwrap();
    {
        let mut writer = SegmentFile::open(tmp.path(), 1, SegmentMode::Write).unwrap();
        writer.write(b"abc").unwrap();
    }
    {
        let mut writer = SegmentFile::open(tmp.path(), 1, SegmentMode::Write).unwrap();
        writer.write(b"def").unwrap();
    }

    let mut reader = SegmentFile::open(tmp.path(), 1, SegmentMode::Read).unwrap();
    assert_eq!(reader.load().unwrap(), b"abcdef");
}

#[test]
fn empty_segment_loads_as_empty_vec() {
    let tmp = TempDir::new().unwrap();
    let mut writer = SegmentFile::open(tmp.path(), 1, SegmentMode::Write).unwrap();
    assert_eq!(writer.load().unwrap(), Vec::<u8>::new());
}
