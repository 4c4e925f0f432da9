//! IndexProvider contract, checked against every built-in provider

mod common;

use chrono::{TimeZone, Utc};
use common::{sample_metadata, seed_standard, FULL_NAME};
use objstore_index::{
    ErrorKind, FindLogic, FindOperator, FindOptions, InMemoryIndexProvider, IndexProvider, IndexValue,
    IterateOptions, ObjectIndex, ObjectIndexMetadata, ObjectIndexType, ObjectMetadata, OrderOptions,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use std::str::FromStr;

fn providers() -> Vec<(&'static str, Box<dyn IndexProvider>)> {
    let mut providers: Vec<(&'static str, Box<dyn IndexProvider>)> =
        vec![("memory", Box::new(InMemoryIndexProvider::new()))];
    #[cfg(feature = "sqlite")]
    providers.push((
        "sqlite",
        Box::new(objstore_index::SqliteIndexProvider::in_memory().unwrap()),
    ));
    providers
}

fn find_where(provider: &dyn IndexProvider, constraint: &str) -> Vec<i32> {
    provider
        .find_where(FULL_NAME, constraint, 0, None, &sample_metadata().indexes)
        .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// Schema
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_provision_twice_is_noop() {
    for (name, provider) in providers() {
        assert!(!provider.object_exists(FULL_NAME).unwrap(), "{}", name);
        provider.provision_index(&sample_metadata()).unwrap();
        provider
            .upsert_index_values(FULL_NAME, 1, &[ObjectIndex::new("A", 1)])
            .unwrap();
        provider.provision_index(&sample_metadata()).unwrap();

        assert!(provider.object_exists(FULL_NAME).unwrap(), "{}", name);
        assert_eq!(provider.count_objects(FULL_NAME).unwrap(), 1, "{}", name);

        let row = provider
            .iterate(FULL_NAME, &IterateOptions::all(), &sample_metadata().indexes)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["ID", "A", "B", "C", "D", "P"], "{}", name);
    }
}

#[test]
fn test_unprovisioned_operations_fail() {
    for (name, provider) in providers() {
        let err = provider.count_objects(FULL_NAME).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotProvisioned, "{}", name);
        assert_eq!(err.to_string(), "[not_provisioned] Object index not provisioned: ns.Obj");

        let err = provider.truncate(FULL_NAME).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotProvisioned, "{}", name);

        provider.unprovision_index(FULL_NAME).unwrap();
        provider.provision_index(&sample_metadata()).unwrap();
        provider.unprovision_index(FULL_NAME).unwrap();
        assert!(!provider.object_exists(FULL_NAME).unwrap(), "{}", name);
    }
}

#[test]
fn test_invalid_metadata_rejected() {
    let metadata = objstore_index::ObjectMetadata::new(
        "ns",
        "Obj",
        vec![ObjectIndexMetadata::new("X", ObjectIndexType::Unknown)],
    );
    for (name, provider) in providers() {
        let err = provider.provision_index(&metadata).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation, "{}", name);
        assert!(!provider.object_exists(FULL_NAME).unwrap(), "{}", name);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// JSON constraints
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_json_conjunction() {
    for (name, provider) in providers() {
        seed_standard(provider.as_ref());
        assert_eq!(
            find_where(provider.as_ref(), r#"{"A":100,"Op":"=","AND":{"B":"x","Op":"="}}"#),
            vec![1],
            "{}",
            name
        );
    }
}

#[test]
fn test_json_combinators_nest_to_the_right() {
    for (name, provider) in providers() {
        seed_standard(provider.as_ref());
        let p = provider.as_ref();
        assert_eq!(find_where(p, r#"{"A":200,"Op":"=","OR":{"B":"y","Op":"="}}"#), vec![2, 3], "{}", name);
        // A=100 AND (B='x' OR A=300)
        assert_eq!(
            find_where(p, r#"{"A":100,"Op":"=","AND":{"B":"x","Op":"=","OR":{"A":300,"Op":"="}}}"#),
            vec![1],
            "{}",
            name
        );
        // A=300 OR (B='x' AND A=200)
        assert_eq!(
            find_where(p, r#"{"A":300,"Op":"=","OR":{"B":"x","Op":"=","AND":{"A":200,"Op":"="}}}"#),
            vec![3, 5],
            "{}",
            name
        );
    }
}

#[test]
fn test_json_null_and_lists() {
    for (name, provider) in providers() {
        seed_standard(provider.as_ref());
        let p = provider.as_ref();
        assert_eq!(find_where(p, r#"{"B":null,"Op":"="}"#), vec![4], "{}", name);
        assert_eq!(find_where(p, r#"{"B":null,"Op":"<>"}"#), vec![1, 2, 3, 5], "{}", name);
        assert_eq!(find_where(p, r#"{"A":[100,300],"Op":"IN"}"#), vec![1, 2, 4, 5], "{}", name);
        assert_eq!(find_where(p, r#"{"A":[100,300],"Op":"NOT IN"}"#), vec![3], "{}", name);
        assert_eq!(find_where(p, r#"{"ID":[2,4],"Op":"IN"}"#), vec![2, 4], "{}", name);
        // NULL B is neither equal nor unequal to 'x'
        assert_eq!(find_where(p, r#"{"B":"x","Op":"<>"}"#), vec![2, 5], "{}", name);
    }
}

#[test]
fn test_json_like() {
    for (name, provider) in providers() {
        seed_standard(provider.as_ref());
        let p = provider.as_ref();
        assert_eq!(find_where(p, r#"{"B":"x","Op":"LIKE"}"#), vec![1, 3, 5], "{}", name);
        assert_eq!(find_where(p, r#"{"B":"X%","Op":"LIKE"}"#), vec![1, 3, 5], "{}", name);
        assert_eq!(find_where(p, r#"{"B":"x_z","Op":"LIKE"}"#), vec![5], "{}", name);
        assert_eq!(find_where(p, r#"{"B":"y","Op":"NOT LIKE"}"#), vec![1, 3], "{}", name);
    }
}

#[test]
fn test_json_comparison_order_and_limit() {
    for (name, provider) in providers() {
        seed_standard(provider.as_ref());
        let p = provider.as_ref();
        let metadata = sample_metadata().indexes;
        assert_eq!(find_where(p, r#"{"A":100,"Op":">"}"#), vec![3, 5], "{}", name);
        assert_eq!(find_where(p, r#"{"A":200,"Op":"<="}"#), vec![1, 2, 3, 4], "{}", name);

        let desc = OrderOptions::descending(["A"]);
        let ids = p
            .find_where(FULL_NAME, r#"{"A":100,"Op":">="}"#, 2, Some(&desc), &metadata)
            .unwrap();
        assert_eq!(ids, vec![5, 3], "{}", name);

        let by_id_desc = OrderOptions::descending(["ID"]);
        let ids = p
            .find_where(FULL_NAME, r#"{"A":100,"Op":"="}"#, 0, Some(&by_id_desc), &metadata)
            .unwrap();
        assert_eq!(ids, vec![4, 2, 1], "{}", name);
    }
}

#[test]
fn test_json_count_and_exists() {
    for (name, provider) in providers() {
        seed_standard(provider.as_ref());
        let metadata = sample_metadata().indexes;
        assert_eq!(provider.count_where(FULL_NAME, r#"{"A":100,"Op":"="}"#, &metadata).unwrap(), 3, "{}", name);
        assert!(provider.exists_where(FULL_NAME, r#"{"B":"xyz","Op":"="}"#, &metadata).unwrap(), "{}", name);
        assert!(!provider.exists_where(FULL_NAME, r#"{"A":999,"Op":"="}"#, &metadata).unwrap(), "{}", name);
    }
}

#[test]
fn test_json_errors_are_validation() {
    for (name, provider) in providers() {
        seed_standard(provider.as_ref());
        let metadata = sample_metadata().indexes;
        for constraint in [
            r#"{"Nope":1,"Op":"="}"#,
            r#"{"A":1}"#,
            r#"{"A":1,"Op":"~"}"#,
            r#"{"A":[1,2],"Op":"="}"#,
            r#"{"A":"abc","Op":"="}"#,
            r#"not json"#,
        ] {
            let err = provider.find_where(FULL_NAME, constraint, 0, None, &metadata).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation, "{} {}", name, constraint);
        }
        let order = OrderOptions::ascending(["Nope"]);
        let err = provider
            .find_where(FULL_NAME, r#"{"A":1,"Op":"="}"#, 0, Some(&order), &metadata)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation, "{}", name);
    }
}

#[test]
fn test_typed_values() {
    let when = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    for (name, provider) in providers() {
        let p = provider.as_ref();
        seed_standard(p);
        p.upsert_index_values(
            FULL_NAME,
            6,
            &[
                ObjectIndex::new("A", 600),
                ObjectIndex::new("C", vec![0x0Au8, 0x0B]),
                ObjectIndex::new("D", when),
                ObjectIndex::new("P", Decimal::from_str("12.50").unwrap()),
            ],
        )
        .unwrap();

        assert_eq!(find_where(p, r#"{"C":"0a0b","Op":"="}"#), vec![6], "{}", name);
        assert_eq!(find_where(p, r#"{"D":"2024-01-02T03:04:05Z","Op":"="}"#), vec![6], "{}", name);
        assert_eq!(find_where(p, r#"{"D":"2024-01-01","Op":">"}"#), vec![6], "{}", name);
        assert_eq!(find_where(p, r#"{"P":12.5,"Op":"="}"#), vec![6], "{}", name);
        assert_eq!(find_where(p, r#"{"P":"10","Op":">"}"#), vec![6], "{}", name);

        let row = p
            .iterate(
                FULL_NAME,
                &IterateOptions::all().with_constraint(r#"{"ID":6,"Op":"="}"#),
                &sample_metadata().indexes,
            )
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(row.get("C"), Some(&IndexValue::Binary(vec![0x0A, 0x0B])), "{}", name);
        assert_eq!(row.get("D"), Some(&IndexValue::DateTime(when)), "{}", name);
        assert_eq!(row.get("P"), Some(&IndexValue::Decimal(Decimal::from_str("12.5").unwrap())), "{}", name);
        assert_eq!(row.get("B"), Some(&IndexValue::Null), "{}", name);
    }
}

#[test]
fn test_wide_decimals_are_exact() {
    let metadata = ObjectMetadata::new(
        "ns",
        "Ledger",
        vec![ObjectIndexMetadata::new("P", ObjectIndexType::Decimal)
            .with_precision(28)
            .with_scale(2)
            .nullable()],
    );
    let dec = |s: &str| Decimal::from_str(s).unwrap();
    let find = |p: &dyn IndexProvider, json: &str| {
        p.find_where("ns.Ledger", json, 0, Some(&OrderOptions::ascending(["P"])), &metadata.indexes)
            .unwrap()
    };

    for (name, provider) in providers() {
        let p = provider.as_ref();
        p.provision_index(&metadata).unwrap();
        for (id, value) in [
            (1, "12345678901234567.89"),
            (2, "12345678901234567.88"),
            (3, "-12345678901234567.89"),
            (4, "0.005"),
            (5, "-3"),
        ] {
            p.upsert_index_values("ns.Ledger", id, &[ObjectIndex::new("P", dec(value))])
                .unwrap();
        }
        p.upsert_index_values("ns.Ledger", 6, &[ObjectIndex::new("P", 7)]).unwrap();

        assert_eq!(find(p, r#"{"P":"12345678901234567.89","Op":"="}"#), vec![1], "{}", name);
        assert_eq!(find(p, r#"{"P":"12345678901234567.88","Op":"="}"#), vec![2], "{}", name);
        assert_eq!(find(p, r#"{"P":"12345678901234567.885","Op":">"}"#), vec![1], "{}", name);
        assert_eq!(find(p, r#"{"P":"12345678901234567.88","Op":"<"}"#), vec![3, 5, 4, 6], "{}", name);
        // 0.005 rounds half-to-even on write
        assert_eq!(find(p, r#"{"P":0,"Op":"="}"#), vec![4], "{}", name);
        assert_eq!(find(p, r#"{"P":"0.005","Op":"="}"#), Vec::<i32>::new(), "{}", name);
        assert_eq!(find(p, r#"{"P":"4567.8","Op":"LIKE"}"#), vec![3, 2, 1], "{}", name);
        assert_eq!(find(p, r#"{"P":"7.00","Op":"LIKE"}"#), vec![6], "{}", name);

        let eq = FindOptions::new(FindLogic::And, FindOperator::Equals);
        assert_eq!(p.find("ns.Ledger", &eq, &[ObjectIndex::new("P", -3)]).unwrap(), vec![5], "{}", name);

        let rows: Vec<IndexValue> = p
            .iterate("ns.Ledger", &IterateOptions::all().with_fields(["P"]), &metadata.indexes)
            .unwrap()
            .map(|row| row.unwrap().get("P").cloned().unwrap())
            .collect();
        let texts: Vec<String> = rows.iter().map(ToString::to_string).collect();
        assert_eq!(
            texts,
            vec![
                "12345678901234567.89",
                "12345678901234567.88",
                "-12345678901234567.89",
                "0.00",
                "-3.00",
                "7.00",
            ],
            "{}",
            name
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Flat queries
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_flat_queries() {
    for (name, provider) in providers() {
        seed_standard(provider.as_ref());
        let p = provider.as_ref();

        let and = FindOptions::new(FindLogic::And, FindOperator::Equals);
        let or = FindOptions::new(FindLogic::Or, FindOperator::Equals);
        let pair = [ObjectIndex::new("A", 200), ObjectIndex::new("B", "y")];
        assert_eq!(p.find(FULL_NAME, &and, &pair).unwrap(), Vec::<i32>::new(), "{}", name);
        assert_eq!(p.find(FULL_NAME, &or, &pair).unwrap(), vec![2, 3], "{}", name);
        assert_eq!(p.count(FULL_NAME, &or, &pair).unwrap(), 2, "{}", name);
        assert!(p.exists(FULL_NAME, &or, &pair).unwrap(), "{}", name);
        assert!(!p.exists(FULL_NAME, &and, &pair).unwrap(), "{}", name);

        // No constraints: every row, identity order
        assert_eq!(p.find(FULL_NAME, &and, &[]).unwrap(), vec![1, 2, 3, 4, 5], "{}", name);
        let limited = and.clone().with_limit(2).with_order(OrderOptions::descending(["ID"]));
        assert_eq!(p.find(FULL_NAME, &limited, &[]).unwrap(), vec![5, 4], "{}", name);

        let like = FindOptions::new(FindLogic::And, FindOperator::Like);
        assert_eq!(p.find(FULL_NAME, &like, &[ObjectIndex::new("B", "x")]).unwrap(), vec![1, 3, 5], "{}", name);

        let null = [ObjectIndex::new("B", IndexValue::Null)];
        assert_eq!(p.find(FULL_NAME, &and, &null).unwrap(), vec![4], "{}", name);
        let not_equals = FindOptions::new(FindLogic::And, FindOperator::NotEquals);
        assert_eq!(p.find(FULL_NAME, &not_equals, &null).unwrap(), vec![1, 2, 3, 5], "{}", name);

        let greater = FindOptions::new(FindLogic::And, FindOperator::GreaterThan);
        assert_eq!(p.find(FULL_NAME, &greater, &[ObjectIndex::new("A", 100)]).unwrap(), vec![3, 5], "{}", name);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Mutation
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_upsert_merges_by_id() {
    for (name, provider) in providers() {
        seed_standard(provider.as_ref());
        let p = provider.as_ref();
        p.upsert_index_values(FULL_NAME, 1, &[ObjectIndex::new("B", "changed")]).unwrap();
        assert_eq!(p.count_objects(FULL_NAME).unwrap(), 5, "{}", name);
        assert_eq!(find_where(p, r#"{"B":"changed","Op":"="}"#), vec![1], "{}", name);
        // A kept its value
        assert_eq!(find_where(p, r#"{"A":100,"Op":"=","AND":{"ID":1,"Op":"="}}"#), vec![1], "{}", name);
    }
}

#[test]
fn test_bulk_upsert() {
    for (name, provider) in providers() {
        let p = provider.as_ref();
        p.provision_index(&sample_metadata()).unwrap();
        let metadata = vec![
            ObjectIndexMetadata::new("A", ObjectIndexType::Integer),
            ObjectIndexMetadata::new("B", ObjectIndexType::String),
        ];
        let rows: Vec<Vec<IndexValue>> = (1..=20)
            .map(|id| vec![IndexValue::Integer(id), IndexValue::Integer(id % 3), IndexValue::from(format!("b{}", id))])
            .collect();
        p.bulk_upsert_index_values(FULL_NAME, &metadata, &rows).unwrap();
        assert_eq!(p.count_objects(FULL_NAME).unwrap(), 20, "{}", name);
        assert_eq!(find_where(p, r#"{"A":0,"Op":"="}"#), vec![3, 6, 9, 12, 15, 18], "{}", name);

        let err = p
            .bulk_upsert_index_values(FULL_NAME, &metadata, &[vec![IndexValue::Integer(1)]])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation, "{}", name);
        let err = p
            .bulk_upsert_index_values(
                FULL_NAME,
                &metadata,
                &[vec![IndexValue::from("1"), IndexValue::Integer(1), IndexValue::from("b")]],
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation, "{}", name);
    }
}

#[test]
fn test_remove_and_truncate() {
    for (name, provider) in providers() {
        seed_standard(provider.as_ref());
        let p = provider.as_ref();
        p.remove_index_value(FULL_NAME, 2).unwrap();
        p.remove_index_values(FULL_NAME, &[1, 5, 99]).unwrap();
        p.remove_index_values(FULL_NAME, &[]).unwrap();
        assert_eq!(p.find(FULL_NAME, &FindOptions::default(), &[]).unwrap(), vec![3, 4], "{}", name);

        p.truncate(FULL_NAME).unwrap();
        assert_eq!(p.count_objects(FULL_NAME).unwrap(), 0, "{}", name);
        assert!(p.object_exists(FULL_NAME).unwrap(), "{}", name);
        p.upsert_index_values(FULL_NAME, 7, &[ObjectIndex::new("A", 1)]).unwrap();
        assert_eq!(p.count_objects(FULL_NAME).unwrap(), 1, "{}", name);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Iterate
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_iterate_rows() {
    for (name, provider) in providers() {
        seed_standard(provider.as_ref());
        let p = provider.as_ref();
        let metadata = sample_metadata().indexes;

        let options = IterateOptions::all()
            .with_constraint(r#"{"A":100,"Op":"="}"#)
            .with_order(OrderOptions::descending(["ID"]))
            .with_limit(2)
            .with_fields(["ID", "B"]);
        let rows: Vec<_> = p
            .iterate(FULL_NAME, &options, &metadata)
            .unwrap()
            .collect::<objstore_index::Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 2, "{}", name);
        assert_eq!(rows[0].id(), Some(4), "{}", name);
        assert_eq!(rows[0].get("B"), Some(&IndexValue::Null), "{}", name);
        assert_eq!(rows[1].id(), Some(2), "{}", name);
        assert_eq!(rows[1].get("B"), Some(&IndexValue::from("y")), "{}", name);
        assert_eq!(rows[1].len(), 2, "{}", name);

        // Independent sequences
        let mut first = p.iterate(FULL_NAME, &IterateOptions::all(), &metadata).unwrap();
        let second = p.iterate(FULL_NAME, &IterateOptions::all(), &metadata).unwrap();
        assert_eq!(first.next().unwrap().unwrap().id(), Some(1), "{}", name);
        assert_eq!(second.count(), 5, "{}", name);
        assert_eq!(first.count(), 4, "{}", name);

        let err = p
            .iterate(FULL_NAME, &IterateOptions::all().with_fields(["Nope"]), &metadata)
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::Validation, "{}", name);
    }
}
