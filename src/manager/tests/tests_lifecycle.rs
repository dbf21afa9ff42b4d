use crate::record::RecordType;

use super::helpers::{manager_in, new_tmp};

#[test]
fn fresh_init_starts_at_file_one() {
    let tmp = new_tmp();
    let mgr = manager_in(&tmp, 1000);
    mgr.init(&[]).unwrap();

    let lsn = mgr
        .insert_binary("t", "p", &[1, 2, 3], b"hello")
        .unwrap();
    assert_eq!(lsn >> 32, 1);
    assert_eq!(lsn & 0xFFFF_FFFF, 0);
}

#[test]
fn create_table_is_tracked() {
    let tmp = new_tmp();
    let mgr = manager_in(&tmp, 1000);
    mgr.init(&[]).unwrap();

    assert!(!mgr.has_table("orders"));
    mgr.create_table("orders");
    assert!(mgr.has_table("orders"));
}

#[test]
fn init_seeds_known_tables() {
    let tmp = new_tmp();
    let mgr = manager_in(&tmp, 1000);
    mgr.init(&["a".to_string(), "b".to_string()]).unwrap();

    assert!(mgr.has_table("a"));
    assert!(mgr.has_table("b"));
    assert!(!mgr.has_table("c"));
}

#[test]
fn insert_vectors_round_trips_through_next() {
    let tmp = new_tmp();
    let mgr = manager_in(&tmp, 1000);
    mgr.init(&[]).unwrap();

    let ids = vec![10, 20, 30];
    let floats = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]; // dim = 2
    let lsn = mgr.insert_vectors("t", "p", &ids, &floats, 2).unwrap();

    let record = mgr.next().unwrap().unwrap();
    assert_eq!(record.lsn, lsn);
    assert_eq!(record.record_type, RecordType::InsertVector);
    assert_eq!(record.ids, ids);
    assert_eq!(record.data.len(), floats.len() * 4);

    assert!(mgr.next().unwrap().is_none());
}

#[test]
fn delete_and_flush_emit_expected_record_types() {
    let tmp = new_tmp();
    let mgr = manager_in(&tmp, 1000);
    mgr.init(&[]).unwrap();

    mgr.delete_by_id("t", &[1, 2]).unwrap();
    mgr.flush(Some("t")).unwrap();

    let r1 = mgr.next().unwrap().unwrap();
    assert_eq!(r1.record_type, RecordType::Delete);
    assert_eq!(r1.ids, vec![1, 2]);

    let r2 = mgr.next().unwrap().unwrap();
    assert_eq!(r2.record_type, RecordType::Flush);
    assert_eq!(r2.table_id, "t");
}

#[test]
fn apply_done_persists_checkpoint_and_reclaims() {
    let tmp = new_tmp();
    let mgr = manager_in(&tmp, 1000);
    mgr.init(&[]).unwrap();

    let lsn = mgr.delete_by_id("t", &[1]).unwrap();
    let record = mgr.next().unwrap().unwrap();
    assert_eq!(record.lsn, lsn);

    assert_eq!(mgr.durable_lsn().unwrap(), 0);
    mgr.apply_done(lsn).unwrap();
    assert_eq!(mgr.durable_lsn().unwrap(), lsn);
}
