use tracing_subscriber::EnvFilter;

use crate::record::{Record, RecordType};

/// Initializes a test-scoped tracing subscriber controlled by `RUST_LOG`.
/// Safe to call multiple times — only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds a record with fixed `table_id = "t"`, `partition_tag = "p"`, so
/// `encoded_size = 27 + ids_len * 8 + data_len`.
pub fn record_with(record_type: RecordType, ids_len: usize, data_len: usize) -> Record {
    Record {
        lsn: 0,
        record_type,
        table_id: "t".to_string(),
        partition_tag: "p".to_string(),
        ids: vec![1; ids_len],
        data: vec![0u8; data_len],
    }
}
