use crate::record::{Record, RecordType};

fn sample(record_type: RecordType, ids: Vec<i64>, data: Vec<u8>) -> Record {
    Record {
        lsn: (1u64 << 32) | 42,
        record_type,
        table_id: "t".to_string(),
        partition_tag: "p".to_string(),
        ids,
        data,
    }
}

#[test]
fn encode_decode_is_identity_for_insert_vector() {
    let dim = 4usize;
    let length = 50usize;
    let data = vec![0u8; dim * length * 4];
    let ids: Vec<i64> = (0..length as i64).collect();
    let record = sample(RecordType::InsertVector, ids, data);

    let mut buf = Vec::new();
    record.encode_to(&mut buf).unwrap();
    assert_eq!(buf.len(), record.encoded_size());

    let (decoded, consumed) = Record::decode_from(&buf).unwrap();
    assert_eq!(consumed, buf.len());
    assert_eq!(decoded, record);
}

#[test]
fn encode_decode_is_identity_for_delete() {
    let record = sample(RecordType::Delete, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10], vec![]);

    let mut buf = Vec::new();
    record.encode_to(&mut buf).unwrap();
    let (decoded, consumed) = Record::decode_from(&buf).unwrap();

    assert_eq!(consumed, buf.len());
    assert_eq!(decoded, record);
}

#[test]
fn empty_table_id_and_partition_tag_round_trip() {
    let record = Record {
        lsn: 0,
        record_type: RecordType::Flush,
        table_id: String::new(),
        partition_tag: String::new(),
        ids: vec![],
        data: vec![],
    };

    let mut buf = Vec::new();
    record.encode_to(&mut buf).unwrap();
    assert_eq!(buf.len(), crate::record::HEADER_SIZE);

    let (decoded, consumed) = Record::decode_from(&buf).unwrap();
    assert_eq!(consumed, buf.len());
    assert_eq!(decoded, record);
}

#[test]
fn encoded_size_matches_spec_formula() {
    // InsertVector, table "t", partition "p", length=50, data_size=200
    // => 25 + 1 + 1 + 400 + 200 = 627.
    let record = sample(RecordType::InsertVector, vec![0i64; 50], vec![0u8; 200]);
    assert_eq!(record.encoded_size(), 627);

    // R1: Delete, table "t", partition "p", length=10, data_size=0 => 107.
    let record = sample(RecordType::Delete, vec![0i64; 10], vec![]);
    assert_eq!(record.encoded_size(), 107);
}

#[test]
fn multiple_records_decode_sequentially_from_one_buffer() {
    let r0 = sample(RecordType::InsertVector, vec![0i64; 50], vec![0u8; 200]);
    let r1 = sample(RecordType::Delete, vec![0i64; 10], vec![]);

    let mut buf = Vec::new();
    r0.encode_to(&mut buf).unwrap();
    r1.encode_to(&mut buf).unwrap();

    let (decoded_r0, n0) = Record::decode_from(&buf).unwrap();
    assert_eq!(decoded_r0, r0);

    let (decoded_r1, n1) = Record::decode_from(&buf[n0..]).unwrap();
    assert_eq!(decoded_r1, r1);
    assert_eq!(n0 + n1, buf.len());
}
