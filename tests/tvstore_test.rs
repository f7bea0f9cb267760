//! End-to-end TV-Store scenarios (S1-S3) and boundary behaviors.

use tsdb_core::error::DbError;
use tsdb_core::tvstore::{Cell, ColumnType, TvStore};

fn columns() -> Vec<ColumnType> {
    vec![
        ColumnType::Bool,
        ColumnType::Int32,
        ColumnType::Int64,
        ColumnType::Float,
        ColumnType::Double,
        ColumnType::Text,
    ]
}

fn constant_row() -> Vec<Cell> {
    vec![
        Cell::Bool(false),
        Cell::Int32(100),
        Cell::Int64(1000),
        Cell::Float(0.1),
        Cell::Double(0.2),
        Cell::Text("Test".to_string()),
    ]
}

#[test]
fn s1_aligned_sort_descending_input() {
    let mut store = TvStore::new(columns());
    let order = [0, 1, 2, 3, 4, 5];

    for i in (0..=1000i64).rev() {
        store.put_aligned(i, &constant_row(), &order).unwrap();
    }
    store.sort();

    assert_eq!(store.row_count(), 1001);
    for i in 0..1001 {
        assert_eq!(store.get_time(i).unwrap(), i as i64);
        let row = store.get_aligned(i).unwrap();
        assert_eq!(
            row.values,
            vec![
                Some(Cell::Bool(false)),
                Some(Cell::Int32(100)),
                Some(Cell::Int64(1000)),
                Some(Cell::Float(0.1)),
                Some(Cell::Double(0.2)),
                Some(Cell::Text("Test".to_string())),
            ]
        );
    }
}

#[test]
fn s2_bulk_insert_with_null_bitmaps() {
    let mut store = TvStore::new(columns());
    let order = [0, 1, 2, 3, 4, 5];
    let n = 1001usize;

    let ts: Vec<i64> = (0..n).rev().map(|i| i as i64).collect();
    let values: Vec<Vec<Cell>> = (0..n).map(|_| constant_row()).collect();
    // one shared mask per logical column, true every 100th row
    let per_column_mask: Vec<bool> = (0..n).map(|i| i % 100 == 0).collect();
    let null_bitmaps = vec![per_column_mask; 6];

    store
        .put_aligned_batch(&ts, &values, Some(&null_bitmaps), &order, 0, n)
        .unwrap();

    assert_eq!(store.row_count(), n);
    for i in 0..n {
        assert_eq!(store.get_time(i).unwrap(), (n - 1 - i) as i64);
        if i % 100 == 0 {
            let row = store.get_aligned(i).unwrap();
            assert!(row.values.iter().all(|v| v.is_none()));
        }
    }
}

#[test]
fn s3_clone_independence() {
    let mut store = TvStore::new(columns());
    let order = [0, 1, 2, 3, 4, 5];
    for i in (0..10i64).rev() {
        store.put_aligned(i, &constant_row(), &order).unwrap();
    }

    let snapshot_times: Vec<i64> = (0..store.row_count())
        .map(|i| store.get_time(i).unwrap())
        .collect();
    let clone = store.clone();

    store.sort();

    for (i, &expected) in snapshot_times.iter().enumerate() {
        assert_eq!(clone.get_time(i).unwrap(), expected);
    }
    assert_ne!(store.get_time(0).unwrap(), clone.get_time(0).unwrap());
}

#[test]
fn empty_store_sort_is_noop_and_get_time_errors() {
    let mut store = TvStore::new(columns());
    store.sort();
    assert_eq!(store.row_count(), 0);
    match store.get_time(0) {
        Err(DbError::IndexOutOfRange { index: 0, len: 0 }) => {}
        other => panic!("expected IndexOutOfRange, got {other:?}"),
    }
}

#[test]
fn put_aligned_type_mismatch_is_rejected() {
    let mut store = TvStore::new(columns());
    let order = [0, 1, 2, 3, 4, 5];
    let mut bad_row = constant_row();
    bad_row[0] = Cell::Int32(1); // bool column given an int cell
    assert!(store.put_aligned(0, &bad_row, &order).is_err());
}

#[test]
fn column_order_remaps_logical_to_physical() {
    let mut store = TvStore::new(vec![ColumnType::Int32, ColumnType::Int64]);
    // logical position 0 -> physical column 1, logical position 1 -> physical column 0
    store
        .put_aligned(5, &[Cell::Int64(42), Cell::Int32(7)], &[1, 0])
        .unwrap();
    let row = store.get_aligned(0).unwrap();
    assert_eq!(row.values[0], Some(Cell::Int32(7)));
    assert_eq!(row.values[1], Some(Cell::Int64(42)));
}
