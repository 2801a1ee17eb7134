//! End-to-end behavior of the object column: insert dispatch, bulk views,
//! serialization round trips and merge-time structure selection.

use std::hash::Hasher;

use obelisk_column::{ColumnOps, ObjectColumn, ObjectRow, Scalar, ScalarKind};
use rand::prelude::*;
use xxhash_rust::xxh3::Xxh3;

fn object_row<const N: usize>(entries: [(&str, Scalar); N]) -> ObjectRow {
    entries
        .into_iter()
        .map(|(path, value)| (path.to_string(), value))
        .collect()
}

/// Asserts the structural invariants that must hold after every public
/// operation: coherent lengths, the dynamic-path cap, sorted unique
/// shared-data keys, disjoint key sets, and no nulls in shared data.
fn check_invariants(column: &ObjectColumn) {
    let rows = column.size();
    for (path, typed) in column.typed_paths().iter() {
        assert_eq!(typed.len(), rows, "typed path {path:?} length");
    }
    for (path, dynamic) in column.dynamic_paths().iter() {
        assert_eq!(dynamic.len(), rows, "dynamic path {path:?} length");
    }
    assert_eq!(column.shared_data().len(), rows);
    assert!(column.dynamic_paths().len() <= column.max_dynamic_paths());

    for row in 0..rows {
        let mut previous: Option<&str> = None;
        for (path, value) in column.shared_data().row_entries(row) {
            if let Some(previous) = previous {
                assert!(previous < path, "row {row}: {previous:?} !< {path:?}");
            }
            previous = Some(path);
            assert!(!column.typed_paths().contains(path));
            assert!(!column.dynamic_paths().contains(path));
            assert!(!value.is_empty());
            let mut input = value;
            let decoded = obelisk_column::codec::ValueCodec::decode(&mut input).unwrap();
            assert_ne!(decoded, Scalar::Null, "null stored in shared data");
        }
    }
}

fn id_column(max_dynamic_paths: usize) -> ObjectColumn {
    ObjectColumn::new(
        [("id".to_string(), ScalarKind::Int64)],
        max_dynamic_paths,
        4,
    )
}

/// The S1 scenario: two dynamic paths fill the cap and the third path
/// overflows into shared data.
fn s1_column() -> ObjectColumn {
    let mut column = id_column(2);
    column
        .insert(&object_row([
            ("id", Scalar::Int(1)),
            ("a", Scalar::String("x".to_string())),
        ]))
        .unwrap();
    column
        .insert(&object_row([
            ("id", Scalar::Int(2)),
            ("b", Scalar::Float(1.5)),
        ]))
        .unwrap();
    column
        .insert(&object_row([
            ("id", Scalar::Int(3)),
            ("c", Scalar::Bool(true)),
        ]))
        .unwrap();
    column
}

#[test]
fn insert_dispatches_to_typed_dynamic_and_shared() {
    let column = s1_column();
    check_invariants(&column);

    assert_eq!(column.size(), 3);
    assert_eq!(column.typed_paths().get("id").unwrap().len(), 3);
    let dynamic: Vec<&str> = column.dynamic_paths().paths().collect();
    assert_eq!(dynamic, ["a", "b"]);
    assert!(column.shared_data().is_default_at(0));
    assert!(column.shared_data().is_default_at(1));
    let row2: Vec<&str> = column
        .shared_data()
        .row_entries(2)
        .map(|(path, _)| path)
        .collect();
    assert_eq!(row2, ["c"]);
}

#[test]
fn filter_keeps_selected_rows() {
    let column = s1_column();
    let filtered = column.filter(&[true, false, true]).unwrap();
    check_invariants(&filtered);
    assert_eq!(filtered.size(), 2);
    assert_eq!(
        filtered.read_row(1),
        object_row([("id", Scalar::Int(3)), ("c", Scalar::Bool(true))])
    );
}

#[test]
fn insert_range_from_with_tighter_cap_spills_sorted() {
    let source = s1_column();
    let mut target = id_column(1);
    target.insert_range_from(&source, 0, 3).unwrap();
    check_invariants(&target);

    // One dynamic slot: the first source dynamic path wins it, the rest of
    // the paths reach shared data in sorted order per row.
    let kept: Vec<&str> = target.dynamic_paths().paths().collect();
    assert_eq!(kept, ["a"]);
    let row1: Vec<&str> = target
        .shared_data()
        .row_entries(1)
        .map(|(path, _)| path)
        .collect();
    assert_eq!(row1, ["b"]);
    let row2: Vec<&str> = target
        .shared_data()
        .row_entries(2)
        .map(|(path, _)| path)
        .collect();
    assert_eq!(row2, ["c"]);
    for row in 0..3 {
        assert_eq!(target.read_row(row), source.read_row(row));
    }
}

#[test]
fn arena_round_trip_recovers_row() {
    let column = s1_column();
    let mut arena = Vec::new();
    let range = column.serialize_value_into_arena(0, &mut arena);

    let mut target = column.clone_empty();
    let rest = target
        .deserialize_and_insert_from_arena(&arena[range])
        .unwrap();
    assert!(rest.is_empty());
    check_invariants(&target);
    assert_eq!(
        target.read_row(0),
        object_row([("id", Scalar::Int(1)), ("a", Scalar::String("x".to_string()))])
    );
}

#[test]
fn arena_round_trip_all_rows_equals_copy() {
    let column = s1_column();
    let mut arena = Vec::new();
    let mut target = column.clone_empty();
    for row in 0..column.size() {
        let range = column.serialize_value_into_arena(row, &mut arena);
        target
            .deserialize_and_insert_from_arena(&arena[range])
            .unwrap();
    }
    check_invariants(&target);
    assert_eq!(target.size(), column.size());
    for row in 0..column.size() {
        assert_eq!(target.read_row(row), column.read_row(row));
    }
}

#[test]
fn compress_round_trip_is_lossless() {
    let column = s1_column();
    let compressed = column.compress().unwrap();
    assert_eq!(compressed.row_count(), column.size());
    let restored = compressed.decompress().unwrap();
    check_invariants(&restored);
    assert!(restored.structure_equals(&column));
    for row in 0..column.size() {
        assert_eq!(restored.read_row(row), column.read_row(row));
    }
}

#[test]
fn identity_bulk_views_preserve_rows() {
    let column = s1_column();
    let identity: Vec<usize> = (0..column.size()).collect();
    let views = [
        column.filter(&vec![true; column.size()]).unwrap(),
        column.permute(&identity).unwrap(),
        column.index_values(&identity).unwrap(),
    ];
    for view in views {
        check_invariants(&view);
        assert_eq!(view.size(), column.size());
        for row in 0..column.size() {
            assert_eq!(view.read_row(row), column.read_row(row));
        }
    }
}

#[test]
fn scatter_then_gather_recovers_rows() {
    let mut column = id_column(1);
    for i in 0..8 {
        column
            .insert(&object_row([
                ("id", Scalar::Int(i)),
                ("tag", Scalar::UInt(i as u64 % 3)),
                ("overflow", Scalar::String(format!("s{i}"))),
            ]))
            .unwrap();
    }
    let selector: Vec<usize> = (0..8).map(|i| i % 3).collect();
    let shards = column.scatter(3, &selector).unwrap();
    for shard in &shards {
        check_invariants(shard);
    }

    // Walking the selector and taking the next row of the matching shard
    // in order must reproduce the original rows.
    let mut cursors = vec![0usize; shards.len()];
    for (row, &shard) in selector.iter().enumerate() {
        assert_eq!(shards[shard].read_row(cursors[shard]), column.read_row(row));
        cursors[shard] += 1;
    }
    assert_eq!(
        cursors,
        shards.iter().map(|s| s.size()).collect::<Vec<_>>()
    );
}

#[test]
fn row_inserts_equal_range_insert() {
    let source = s1_column();
    let mut one_by_one = id_column(1);
    let mut ranged = id_column(1);
    for row in 0..source.size() {
        one_by_one.insert_from(&source, row).unwrap();
    }
    ranged.insert_range_from(&source, 0, 3).unwrap();

    check_invariants(&one_by_one);
    check_invariants(&ranged);
    assert_eq!(one_by_one.size(), ranged.size());
    for row in 0..ranged.size() {
        assert_eq!(one_by_one.read_row(row), ranged.read_row(row));
    }
}

#[test]
fn overflow_path_lands_in_shared_data() {
    let mut column = id_column(1);
    column
        .insert(&object_row([("first", Scalar::Int(1))]))
        .unwrap();
    column
        .insert(&object_row([("second", Scalar::Int(2))]))
        .unwrap();
    check_invariants(&column);
    assert_eq!(column.dynamic_paths().len(), 1);
    assert!(column.dynamic_paths().contains("first"));
    assert!(column.shared_data().find_in_row(1, "second").is_some());
}

#[test]
fn null_past_cap_is_a_noop() {
    let mut column = id_column(1);
    column
        .insert(&object_row([("first", Scalar::Int(1))]))
        .unwrap();
    column
        .insert(&object_row([("second", Scalar::Null)]))
        .unwrap();
    check_invariants(&column);
    assert!(column.shared_data().is_default_at(1));
    assert_eq!(column.read_row(1), object_row([("id", Scalar::Null)]));
}

#[test]
fn failing_try_insert_leaves_column_untouched() {
    let mut column = s1_column();
    let before_size = column.size();
    let before_entries = column.shared_data().entry_count();
    let before_paths: Vec<String> = column
        .dynamic_paths()
        .paths()
        .map(str::to_string)
        .collect();

    // Five paths; the typed "id" mismatch is hit third in sorted order.
    let rejected = object_row([
        ("a", Scalar::Int(1)),
        ("b", Scalar::Int(2)),
        ("id", Scalar::String("not-an-int".to_string())),
        ("y", Scalar::Int(4)),
        ("z", Scalar::Int(5)),
    ]);
    assert!(!column.try_insert(&rejected));
    check_invariants(&column);
    assert_eq!(column.size(), before_size);
    assert_eq!(column.shared_data().entry_count(), before_entries);
    let after_paths: Vec<String> = column
        .dynamic_paths()
        .paths()
        .map(str::to_string)
        .collect();
    assert_eq!(after_paths, before_paths);
    for (_, dynamic) in column.dynamic_paths().iter() {
        assert_eq!(dynamic.len(), before_size);
    }
}

#[test]
fn default_rows_report_default() {
    let mut column = s1_column();
    column.insert_default();
    check_invariants(&column);
    assert!(column.is_default_at(3));
    for row in 0..3 {
        assert!(!column.is_default_at(row));
    }
}

#[test]
fn take_dynamic_structure_selects_densest_paths() {
    let mut first = ObjectColumn::new([], 4, 4);
    for i in 0..5 {
        let mut row = object_row([("x", Scalar::Int(i))]);
        if i < 2 {
            row.insert("y".to_string(), Scalar::Int(i * 10));
        }
        first.insert(&row).unwrap();
    }
    let mut second = ObjectColumn::new([], 4, 4);
    for i in 0..4 {
        second.insert(&object_row([("y", Scalar::Int(i))])).unwrap();
    }
    second.insert(&object_row([("z", Scalar::Int(0))])).unwrap();

    let mut merged = ObjectColumn::new([], 2, 4);
    merged
        .take_dynamic_structure_from_source_columns(&[&first, &second])
        .unwrap();

    let kept: Vec<&str> = merged.dynamic_paths().paths().collect();
    assert_eq!(kept, ["y", "x"]);
    assert_eq!(merged.statistics().data.get("y"), Some(&6));
    assert_eq!(merged.statistics().data.get("x"), Some(&5));

    // "z" has no dynamic slot left, so merging the sources spills it.
    merged.insert_range_from(&first, 0, first.size()).unwrap();
    merged
        .insert_range_from(&second, 0, second.size())
        .unwrap();
    check_invariants(&merged);
    assert_eq!(merged.size(), 10);
    assert!(merged.shared_data().find_in_row(9, "z").is_some());
    assert_eq!(merged.read_row(9), object_row([("z", Scalar::Int(0))]));
}

#[test]
fn update_hash_matches_for_equal_rows() {
    let column = s1_column();
    let copy = column.filter(&vec![true; column.size()]).unwrap();
    for row in 0..column.size() {
        let mut left = Xxh3::new();
        let mut right = Xxh3::new();
        column.update_hash(row, &mut left);
        copy.update_hash(row, &mut right);
        assert_eq!(left.finish(), right.finish());
    }
}

#[test]
fn randomized_inserts_read_back() {
    let mut rng = StdRng::seed_from_u64(7);
    let paths = ["p.a", "p.b", "p.c", "q.a", "q.b", "r", "s.t.u"];
    let mut column = id_column(3);
    let mut expected_rows: Vec<ObjectRow> = Vec::new();

    for i in 0..200 {
        let mut row = ObjectRow::new();
        row.insert("id".to_string(), Scalar::Int(i));
        for path in paths {
            if rng.gen_bool(0.4) {
                let value = match rng.gen_range(0..5) {
                    0 => Scalar::Null,
                    1 => Scalar::Bool(rng.gen()),
                    2 => Scalar::Int(rng.gen_range(-1000..1000)),
                    3 => Scalar::Float(rng.gen_range(-10.0..10.0)),
                    _ => Scalar::String(format!("v{}", rng.gen_range(0..100))),
                };
                row.insert(path.to_string(), value);
            }
        }
        column.insert(&row).unwrap();

        // Reading back never distinguishes a null dynamic value from an
        // absent path, and typed paths always read back (null when absent).
        let mut expected: ObjectRow = row
            .into_iter()
            .filter(|(path, value)| path == "id" || !value.is_null())
            .collect();
        expected
            .entry("id".to_string())
            .or_insert(Scalar::Null);
        expected_rows.push(expected);
    }

    check_invariants(&column);
    assert_eq!(column.size(), expected_rows.len());
    for (row, expected) in expected_rows.iter().enumerate() {
        assert_eq!(&column.read_row(row), expected, "row {row}");
    }

    // The whole column survives an arena round trip into a fresh column of
    // the same structure.
    let mut arena = Vec::new();
    let mut target = column.clone_empty();
    for row in 0..column.size() {
        let range = column.serialize_value_into_arena(row, &mut arena);
        target
            .deserialize_and_insert_from_arena(&arena[range])
            .unwrap();
    }
    check_invariants(&target);
    for (row, expected) in expected_rows.iter().enumerate() {
        assert_eq!(&target.read_row(row), expected, "round-tripped row {row}");
    }
}
