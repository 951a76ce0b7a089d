//! Integration tests covering the store surface end to end: record operations, index
//! maintenance, range and equality queries, batching and bucket partitioning.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use redb::TableDefinition;
use redbhold::codecs::keys::KeyError;
use redbhold::{
    Error, IndexDef, Indexable, KeyEncode, KeySet, Query, RangeCondition, Store,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// -------------------------------------------------------------------------------------------------
//
// Fixtures

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct FileInfo {
    hash_key: String,
    bind_name: String,
    last_access_time: i64,
    file_size: i64,
    rate: f64,
}

impl Indexable for FileInfo {
    fn type_name() -> &'static str {
        "FileInfo"
    }

    fn indexes() -> &'static [IndexDef] {
        const DEFS: &[IndexDef] = &[
            IndexDef::index("BindName"),
            IndexDef::index("LastAccessTime"),
            IndexDef::index("Rate"),
        ];
        DEFS
    }

    fn primary_key(&self) -> Result<Option<Vec<u8>>, Error> {
        Ok(Some(self.hash_key.encode_key()?))
    }

    fn index_key(&self, index: &str) -> Result<Vec<u8>, Error> {
        match index {
            "BindName" => Ok(self.bind_name.encode_key()?),
            "LastAccessTime" => Ok(self.last_access_time.encode_key()?),
            "Rate" => Ok(self.rate.encode_key()?),
            other => Err(Error::UnknownIndex { index: other.to_owned() }),
        }
    }
}

/// A type without a tagged primary-key field; the operation-supplied key is authoritative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Account {
    name: String,
    no: u64,
}

impl Indexable for Account {
    fn type_name() -> &'static str {
        "Account"
    }

    fn indexes() -> &'static [IndexDef] {
        const DEFS: &[IndexDef] = &[IndexDef::index("Name"), IndexDef::unique("No")];
        DEFS
    }

    fn index_key(&self, index: &str) -> Result<Vec<u8>, Error> {
        match index {
            "Name" => Ok(self.name.encode_key()?),
            "No" => Ok(self.no.encode_key()?),
            other => Err(Error::UnknownIndex { index: other.to_owned() }),
        }
    }
}

fn open_store() -> (Store, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("test.db")).unwrap();
    (store, dir)
}

fn file_info(key: u32, bind_name: &str, last_access_time: i64, rate: f64) -> FileInfo {
    FileInfo {
        hash_key: key.to_string(),
        bind_name: bind_name.to_owned(),
        last_access_time,
        file_size: i64::from(key),
        rate,
    }
}

/// Batch-inserts 100 records with keys `"0"`–`"99"` and seeded-random indexed fields, in one
/// transaction.
fn seed_files(store: &Store) -> Vec<FileInfo> {
    let mut rng = StdRng::seed_from_u64(7);
    let txn = store.begin_write().unwrap();
    let mut records = Vec::with_capacity(100);
    for i in 0..100_u32 {
        let info = FileInfo {
            hash_key: i.to_string(),
            bind_name: format!("bindname-{}", rng.random_range(0..10_u32)),
            last_access_time: rng.random_range(-50..50_i64),
            file_size: rng.random_range(0..100_i64),
            rate: f64::from(rng.random_range(0..1000_u32)) * 0.33 - 150.0,
        };
        store.tx_insert(&txn, &info.hash_key, &info).unwrap();
        records.push(info);
    }
    txn.commit().unwrap();
    records
}

fn raw_table(name: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(name)
}

/// Verifies that every non-unique index of `FileInfo` references every primary record exactly
/// once, under the encoding of that record's own field value, with no dangling entries.
fn audit_file_info_indexes(store: &Store) {
    let extractors: [(&str, fn(&FileInfo) -> Vec<u8>); 3] = [
        ("BindName", |r| r.bind_name.encode_key().unwrap()),
        ("LastAccessTime", |r| r.last_access_time.encode_key().unwrap()),
        ("Rate", |r| r.rate.encode_key().unwrap()),
    ];

    let txn = store.database().begin_read().unwrap();
    let data = txn.open_table(raw_table("data:FileInfo")).unwrap();
    let total = data.range::<&[u8]>(..).unwrap().count();

    for (name, field) in extractors {
        let bucket = format!("_index:FileInfo:{name}");
        let table = txn.open_table(raw_table(&bucket)).unwrap();
        let mut referenced = 0;
        for entry in table.range::<&[u8]>(..).unwrap() {
            let (field_key, posting) = entry.unwrap();
            let set = KeySet::decode(posting.value()).unwrap();
            assert!(!set.is_empty(), "index {name} kept an empty posting list");
            for primary_key in set.iter() {
                let stored = data
                    .get(primary_key)
                    .unwrap()
                    .unwrap_or_else(|| panic!("index {name} references a missing record"));
                let record: FileInfo = redbhold::codecs::decode(stored.value()).unwrap();
                assert_eq!(
                    field(&record),
                    field_key.value(),
                    "index {name} entry disagrees with the record's field value"
                );
                referenced += 1;
            }
        }
        assert_eq!(referenced, total, "index {name} must reference each record exactly once");
    }
}

// -------------------------------------------------------------------------------------------------
//
// Record operations

#[test]
fn insert_then_get_round_trips() {
    let (store, _dir) = open_store();
    let info = file_info(1, "bindname-1", 42, 1.5);
    store.insert(&info.hash_key, &info).unwrap();

    let read: FileInfo = store.get("1").unwrap();
    assert_eq!(read, info);
}

#[test]
fn insert_on_existing_key_is_a_duplicate() {
    let (store, _dir) = open_store();
    let info = file_info(1, "a", 0, 0.0);
    store.insert("1", &info).unwrap();

    let err = store.insert("1", &info).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey { .. }), "got {err:?}");
}

#[test]
fn get_of_missing_key_is_not_found() {
    let (store, _dir) = open_store();
    store.insert("1", &file_info(1, "a", 0, 0.0)).unwrap();

    let err = store.get::<FileInfo, _>("3").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");
}

#[test]
fn upsert_replaces_and_reconciles_indexes() {
    let (store, _dir) = open_store();
    store.upsert("1", &file_info(1, "old-bind", 10, 0.0)).unwrap();
    store.upsert("1", &file_info(1, "new-bind", 20, 0.0)).unwrap();

    let read: FileInfo = store.get("1").unwrap();
    assert_eq!(read.bind_name, "new-bind");

    let stale: Vec<FileInfo> = store
        .find(&Query::index("BindName").equal("old-bind"))
        .unwrap();
    assert!(stale.is_empty());

    let fresh: Vec<FileInfo> = store
        .find(&Query::index("BindName").equal("new-bind"))
        .unwrap();
    assert_eq!(fresh.len(), 1);
    audit_file_info_indexes(&store);
}

#[test]
fn update_requires_an_existing_record() {
    let (store, _dir) = open_store();
    let err = store.update("1", &file_info(1, "a", 0, 0.0)).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");

    store.insert("1", &file_info(1, "a", 5, 0.0)).unwrap();
    store.update("1", &file_info(1, "b", 6, 0.0)).unwrap();
    let read: FileInfo = store.get("1").unwrap();
    assert_eq!((read.bind_name.as_str(), read.last_access_time), ("b", 6));
    audit_file_info_indexes(&store);
}

#[test]
fn delete_removes_record_and_index_references() {
    let (store, _dir) = open_store();
    seed_files(&store);

    store.delete::<FileInfo, _>("2").unwrap();
    store.delete::<FileInfo, _>("5").unwrap();

    let err = store.get::<FileInfo, _>("2").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");

    let err = store.delete::<FileInfo, _>("2").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "deleting twice must fail, got {err:?}");

    let all: Vec<FileInfo> = store.find(&Query::key().range(RangeCondition::ge(""))).unwrap();
    assert_eq!(all.len(), 98);
    audit_file_info_indexes(&store);
}

#[test]
fn tagged_primary_key_overrides_the_supplied_key() {
    let (store, _dir) = open_store();
    let info = file_info(7, "a", 0, 0.0);
    // The record's own key field ("7") wins over the argument.
    store.insert("ignored", &info).unwrap();

    let read: FileInfo = store.get("7").unwrap();
    assert_eq!(read, info);
    let err = store.get::<FileInfo, _>("ignored").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");
}

// -------------------------------------------------------------------------------------------------
//
// Unique indexes

#[test]
fn second_claim_on_a_unique_value_is_rejected() {
    let (store, _dir) = open_store();
    let accounts = [
        Account { name: "aaa".to_owned(), no: 1 },
        Account { name: "bbb".to_owned(), no: 2 },
        Account { name: "ccc".to_owned(), no: 1 },
    ];

    store.insert(0_u64, &accounts[0]).unwrap();
    store.insert(1_u64, &accounts[1]).unwrap();
    let err = store.insert(2_u64, &accounts[2]).unwrap_err();
    assert!(matches!(err, Error::UniqueViolation { index: "No", .. }), "got {err:?}");

    // The failed transaction left no trace; the first two records survive.
    assert_eq!(store.get::<Account, _>(0_u64).unwrap(), accounts[0]);
    assert_eq!(store.get::<Account, _>(1_u64).unwrap(), accounts[1]);
    let err = store.get::<Account, _>(2_u64).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");
}

#[test]
fn reinserting_the_same_unique_pair_is_a_no_op() {
    let (store, _dir) = open_store();
    let account = Account { name: "aaa".to_owned(), no: 1 };
    store.insert(0_u64, &account).unwrap();
    store.upsert(0_u64, &account).unwrap();

    let found: Vec<Account> = store.find(&Query::index("No").equal(1_u64)).unwrap();
    assert_eq!(found, [account]);
}

#[test]
fn unique_index_supports_equality_and_range_queries() {
    let (store, _dir) = open_store();
    for (key, no) in [(0_u64, 10_u64), (1, 20), (2, 30)] {
        store.insert(key, &Account { name: format!("acct-{no}"), no }).unwrap();
    }

    let one: Vec<Account> = store.find(&Query::index("No").equal(20_u64)).unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].no, 20);

    let range: Vec<Account> = store
        .find(&Query::index("No").range(RangeCondition::gt(10_u64)))
        .unwrap();
    assert_eq!(range.iter().map(|a| a.no).collect::<Vec<_>>(), [20, 30]);
}

// -------------------------------------------------------------------------------------------------
//
// Range queries

#[test]
fn index_range_returns_records_sorted_by_field() {
    let (store, _dir) = open_store();
    let records = seed_files(&store);

    let found: Vec<FileInfo> = store
        .find(
            &Query::index("LastAccessTime")
                .range(RangeCondition::ge(-40_i64).and(RangeCondition::le(40_i64))),
        )
        .unwrap();

    let mut expected: Vec<FileInfo> = records
        .iter()
        .filter(|r| (-40..=40).contains(&r.last_access_time))
        .cloned()
        .collect();
    expected.sort_by_key(|r| r.last_access_time);

    assert!(!found.is_empty());
    assert_eq!(found, expected);
}

#[test]
fn key_range_on_a_single_point_matches_one_record() {
    let (store, _dir) = open_store();
    seed_files(&store);

    let found: Vec<FileInfo> = store
        .find(&Query::key().range(RangeCondition::ge("20").and(RangeCondition::le("20"))))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].hash_key, "20");

    let missing: Vec<FileInfo> = store
        .find(&Query::key().range(RangeCondition::ge("xyz").and(RangeCondition::le("xyz"))))
        .unwrap();
    assert!(missing.is_empty());
}

#[test]
fn float_ranges_respect_numeric_order() {
    let (store, _dir) = open_store();
    let rates = [-30.5, -20.0, -10.1, 0.0, 10.5, 20.0, 25.0];
    for (i, rate) in rates.iter().enumerate() {
        let key = u32::try_from(i).unwrap();
        store.insert("", &file_info(key, "b", 0, *rate)).unwrap();
    }

    let found: Vec<FileInfo> = store
        .find(&Query::index("Rate").range(RangeCondition::between(-20.0, true, 20.0, true)))
        .unwrap();

    let found_rates: Vec<f64> = found.iter().map(|r| r.rate).collect();
    assert_eq!(found_rates, [-20.0, -10.1, 0.0, 10.5, 20.0]);
}

#[test]
fn ascending_and_descending_key_scans_are_reverses() {
    let (store, _dir) = open_store();
    seed_files(&store);

    let condition = || RangeCondition::between("2", true, "7", false);
    let ascending: Vec<FileInfo> = store.find(&Query::key().range(condition())).unwrap();
    let descending: Vec<FileInfo> = store.find(&Query::key().range(condition()).desc()).unwrap();

    assert!(!ascending.is_empty());
    let mut reversed = descending;
    reversed.reverse();
    assert_eq!(ascending, reversed);
}

#[test]
fn disjoint_union_concatenates_in_declared_order() {
    let (store, _dir) = open_store();
    seed_files(&store);

    let high = Query::index("LastAccessTime").range(RangeCondition::between(30_i64, true, 40_i64, true));
    let low = Query::index("LastAccessTime").range(RangeCondition::between(-10_i64, true, 10_i64, true));
    let union = Query::index("LastAccessTime").range(
        RangeCondition::between(30_i64, true, 40_i64, true)
            .or(RangeCondition::between(-10_i64, true, 10_i64, true)),
    );

    let high_found: Vec<FileInfo> = store.find(&high).unwrap();
    let low_found: Vec<FileInfo> = store.find(&low).unwrap();
    let union_found: Vec<FileInfo> = store.find(&union).unwrap();

    let mut expected = high_found;
    expected.extend(low_found);
    assert!(!expected.is_empty());
    assert_eq!(union_found, expected);
}

#[test]
fn offset_and_limit_slice_the_full_result() {
    let (store, _dir) = open_store();
    seed_files(&store);

    let query = Query::index("LastAccessTime").range(RangeCondition::ge(-50_i64));
    let full: Vec<FileInfo> = store.find(&query).unwrap();
    assert_eq!(full.len(), 100);

    for (limit, offset) in [(5_usize, 0_usize), (10, 7), (0, 50), (7, 95), (10, 100)] {
        let sliced: Vec<FileInfo> = store
            .find(&query.clone().limit(limit).offset(offset))
            .unwrap();
        let start = offset.min(full.len());
        let end = if limit == 0 { full.len() } else { (offset + limit).min(full.len()) };
        assert_eq!(sliced, &full[start..end], "limit {limit} offset {offset}");
    }
}

#[test]
fn count_matches_unbounded_find() {
    let (store, _dir) = open_store();
    seed_files(&store);

    let query = Query::index("LastAccessTime")
        .range(RangeCondition::ge(-20_i64).and(RangeCondition::lt(20_i64)));
    let found: Vec<FileInfo> = store.find(&query).unwrap();

    // Count ignores limit and offset.
    let count = store.count::<FileInfo>(&query.clone().limit(3).offset(5)).unwrap();
    assert_eq!(count, found.len());
}

#[test]
fn find_one_returns_the_first_match() {
    let (store, _dir) = open_store();
    seed_files(&store);

    let query = Query::key().range(RangeCondition::ge("5"));
    let all: Vec<FileInfo> = store.find(&query).unwrap();
    let one: Option<FileInfo> = store.find_one(&query).unwrap();
    assert_eq!(one.as_ref(), all.first());

    let none: Option<FileInfo> = store
        .find_one(&Query::key().equal("no-such-key"))
        .unwrap();
    assert!(none.is_none());
}

// -------------------------------------------------------------------------------------------------
//
// Excludes

#[test]
fn excluded_keys_are_dropped_before_offset_accounting() {
    let (store, _dir) = open_store();
    for i in 0..10_u32 {
        store.insert("", &file_info(i, "b", i64::from(i), 0.0)).unwrap();
    }

    let found: Vec<FileInfo> = store
        .find(&Query::key().range(RangeCondition::ge("0")).exclude("2").offset(2))
        .unwrap();
    // Candidates 0,1,3,4,... with "2" gone; the offset then skips "0" and "1".
    assert_eq!(found[0].hash_key, "3");
    assert_eq!(found.len(), 7);
}

#[test]
fn equality_queries_honour_excludes() {
    let (store, _dir) = open_store();
    for i in 0..3_u32 {
        store.insert("", &file_info(i, "shared", 0, 0.0)).unwrap();
    }

    let found: Vec<FileInfo> = store
        .find(&Query::index("BindName").equal("shared").exclude("1"))
        .unwrap();
    let keys: Vec<&str> = found.iter().map(|r| r.hash_key.as_str()).collect();
    assert_eq!(keys, ["0", "2"]);
}

// -------------------------------------------------------------------------------------------------
//
// Matching updates and deletes

#[test]
fn update_matching_rewrites_records_and_keeps_indexes_consistent() {
    let (store, _dir) = open_store();
    let records = seed_files(&store);

    let query = Query::index("LastAccessTime")
        .range(RangeCondition::between(10_i64, true, 20_i64, true));
    store
        .update_matching::<FileInfo, _>(&query, |record| {
            record.file_size = 999;
            Ok(())
        })
        .unwrap();

    let all: Vec<FileInfo> = store.find(&Query::key().range(RangeCondition::ge(""))).unwrap();
    assert_eq!(all.len(), 100);
    for record in &all {
        if (10..=20).contains(&record.last_access_time) {
            assert_eq!(record.file_size, 999, "record {} missed the update", record.hash_key);
        }
    }
    let touched = records
        .iter()
        .filter(|r| (10..=20).contains(&r.last_access_time))
        .count();
    assert!(touched > 0);
    audit_file_info_indexes(&store);
}

#[test]
fn update_matching_mutator_error_aborts_the_whole_batch() {
    let (store, _dir) = open_store();
    seed_files(&store);

    let query = Query::key().range(RangeCondition::ge(""));
    let err = store
        .update_matching::<FileInfo, _>(&query, |record| {
            if record.hash_key == "3" {
                return Err(Error::Query { reason: "boom".to_owned() });
            }
            record.file_size = 999;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, Error::Query { .. }), "got {err:?}");

    // Nothing was committed, not even the records mutated before the failure.
    let all: Vec<FileInfo> = store.find(&query).unwrap();
    assert!(all.iter().all(|r| r.file_size != 999));
    audit_file_info_indexes(&store);
}

#[test]
fn delete_matching_leaves_the_complement_and_no_dangling_references() {
    let (store, _dir) = open_store();
    let records = seed_files(&store);

    let query = Query::index("LastAccessTime")
        .range(RangeCondition::between(10_i64, true, 20_i64, true));
    store.delete_matching::<FileInfo>(&query).unwrap();

    let survivors: Vec<FileInfo> = store.find(&Query::key().range(RangeCondition::ge(""))).unwrap();
    let expected: Vec<&FileInfo> = records
        .iter()
        .filter(|r| !(10..=20).contains(&r.last_access_time))
        .collect();
    assert_eq!(survivors.len(), expected.len());
    assert!(survivors.iter().all(|r| !(10..=20).contains(&r.last_access_time)));
    audit_file_info_indexes(&store);
}

// -------------------------------------------------------------------------------------------------
//
// Query and schema failures

#[test]
fn querying_an_undeclared_index_fails() {
    let (store, _dir) = open_store();
    seed_files(&store);

    let err = store
        .find::<FileInfo>(&Query::index("FileSize").equal(1_i64))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownIndex { .. }), "got {err:?}");
}

#[test]
fn index_queries_on_an_empty_store_return_nothing() {
    let (store, _dir) = open_store();
    // No record was ever written, so even the index lookup short-circuits to empty.
    let found: Vec<FileInfo> = store
        .find(&Query::index("LastAccessTime").equal(5_i64))
        .unwrap();
    assert!(found.is_empty());
}

#[test]
fn a_query_without_a_condition_is_invalid() {
    let (store, _dir) = open_store();
    seed_files(&store);

    let err = store.find::<FileInfo>(&Query::key()).unwrap_err();
    assert!(matches!(err, Error::Query { .. }), "got {err:?}");
}

#[test]
fn builder_encoding_failures_surface_when_the_query_runs() {
    struct BadKey;

    impl KeyEncode for BadKey {
        fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
            Err(KeyError::Boolean)
        }
    }

    let (store, _dir) = open_store();
    seed_files(&store);

    let err = store
        .find::<FileInfo>(&Query::key().range(RangeCondition::ge(BadKey)))
        .unwrap_err();
    assert!(matches!(err, Error::Codec(_)), "got {err:?}");
}

#[test]
fn duplicate_index_declarations_are_rejected() {
    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Broken {
        value: i64,
    }

    impl Indexable for Broken {
        fn type_name() -> &'static str {
            "Broken"
        }

        fn indexes() -> &'static [IndexDef] {
            const DEFS: &[IndexDef] = &[IndexDef::index("Value"), IndexDef::unique("Value")];
            DEFS
        }

        fn index_key(&self, index: &str) -> Result<Vec<u8>, Error> {
            match index {
                "Value" => Ok(self.value.encode_key()?),
                other => Err(Error::UnknownIndex { index: other.to_owned() }),
            }
        }
    }

    let (store, _dir) = open_store();
    let err = store.insert(1_u64, &Broken { value: 1 }).unwrap_err();
    assert!(matches!(err, Error::Schema { .. }), "got {err:?}");
}

// -------------------------------------------------------------------------------------------------
//
// Transactions and buckets

#[test]
fn batched_writes_commit_atomically_and_are_visible_in_transaction() {
    let (store, _dir) = open_store();

    let txn = store.begin_write().unwrap();
    for i in 0..10_u32 {
        store.tx_insert(&txn, "", &file_info(i, "batch", i64::from(i), 0.0)).unwrap();
    }

    // The uncommitted records are visible inside the transaction...
    let inside: Vec<FileInfo> = store
        .tx_find(&txn, &Query::key().range(RangeCondition::ge("")))
        .unwrap();
    assert_eq!(inside.len(), 10);
    txn.commit().unwrap();

    let after: Vec<FileInfo> = store.find(&Query::key().range(RangeCondition::ge(""))).unwrap();
    assert_eq!(after.len(), 10);

    // ...and a dropped transaction leaves no trace.
    let txn = store.begin_write().unwrap();
    store.tx_delete::<FileInfo, _>(&txn, "3").unwrap();
    drop(txn);
    assert!(store.get::<FileInfo, _>("3").is_ok());
}

#[test]
fn bucket_variants_partition_records_but_share_indexes() {
    let (store, _dir) = open_store();
    let info = file_info(1, "tenant-bind", 123, 4.5);
    store.upsert_in("tenant-a", "1", &info).unwrap();

    let read: FileInfo = store.get_from("tenant-a", "1").unwrap();
    assert_eq!(read, info);

    // The record lives only in the named bucket.
    let err = store.get::<FileInfo, _>("1").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");

    // Key queries scan the named bucket.
    let found: Vec<FileInfo> = store
        .find_in("tenant-a", &Query::key().range(RangeCondition::gt("0").and(RangeCondition::lt("2"))))
        .unwrap();
    assert_eq!(found, [info.clone()]);

    // Index queries consult the shared index buckets, then read from the named bucket.
    let by_index: Vec<FileInfo> = store
        .find_in("tenant-a", &Query::index("BindName").equal("tenant-bind"))
        .unwrap();
    assert_eq!(by_index, [info.clone()]);

    assert_eq!(store.count_in::<FileInfo>("tenant-a", &Query::key().range(RangeCondition::ge(""))).unwrap(), 1);

    store.delete_in::<FileInfo, _>("tenant-a", "1").unwrap();
    let err = store.get_from::<FileInfo, _>("tenant-a", "1").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");
}

// -------------------------------------------------------------------------------------------------
//
// Index maintenance

#[test]
fn reindex_rebuilds_indexes_and_leaves_records_untouched() {
    let (store, _dir) = open_store();
    seed_files(&store);
    let before: Vec<FileInfo> = store.find(&Query::key().range(RangeCondition::ge(""))).unwrap();

    // Losing an index bucket is recoverable.
    store.remove_index::<FileInfo>("Rate").unwrap();
    let err = store
        .find::<FileInfo>(&Query::index("Rate").range(RangeCondition::ge(-1000.0)))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownIndex { .. }), "got {err:?}");

    store.re_index::<FileInfo>(None).unwrap();

    let after: Vec<FileInfo> = store.find(&Query::key().range(RangeCondition::ge(""))).unwrap();
    assert_eq!(before, after, "reindex must not touch primary records");
    audit_file_info_indexes(&store);
}

#[test]
fn reindex_accepts_a_subset_of_indexes() {
    let (store, _dir) = open_store();
    seed_files(&store);

    store.remove_index::<FileInfo>("Rate").unwrap();
    store.re_index::<FileInfo>(Some(&["Rate"])).unwrap();
    audit_file_info_indexes(&store);

    let err = store.re_index::<FileInfo>(Some(&["FileSize"])).unwrap_err();
    assert!(matches!(err, Error::UnknownIndex { .. }), "got {err:?}");
}

#[test]
fn reindex_unique_violation_aborts_and_preserves_the_old_index_state() {
    let (store, _dir) = open_store();
    store.insert(0_u64, &Account { name: "aaa".to_owned(), no: 1 }).unwrap();
    store.insert(1_u64, &Account { name: "bbb".to_owned(), no: 2 }).unwrap();

    // Sneak a conflicting record in behind the store's back, through the raw engine handle.
    let txn = store.database().begin_write().unwrap();
    {
        let mut table = txn.open_table(raw_table("data:Account")).unwrap();
        let key = 1_u64.encode_key().unwrap();
        let conflicting =
            redbhold::codecs::encode(&Account { name: "bbb".to_owned(), no: 1 }).unwrap();
        table.insert(key.as_slice(), conflicting.as_slice()).unwrap();
    }
    txn.commit().unwrap();

    let err = store.re_index::<Account>(None).unwrap_err();
    assert!(matches!(err, Error::UniqueViolation { .. }), "got {err:?}");

    // The aborted rebuild left the previous unique entries in place.
    let txn = store.database().begin_read().unwrap();
    let table = txn.open_table(raw_table("_unique:Account:No")).unwrap();
    assert_eq!(table.range::<&[u8]>(..).unwrap().count(), 2);
}

#[test]
fn unique_bucket_maps_each_value_to_one_primary() {
    let (store, _dir) = open_store();
    for (key, no) in [(0_u64, 5_u64), (1, 6), (2, 7)] {
        store.insert(key, &Account { name: "n".to_owned(), no }).unwrap();
    }

    let txn = store.database().begin_read().unwrap();
    let table = txn.open_table(raw_table("_unique:Account:No")).unwrap();
    let data = txn.open_table(raw_table("data:Account")).unwrap();
    let mut entries = 0;
    for entry in table.range::<&[u8]>(..).unwrap() {
        let (_, primary_key) = entry.unwrap();
        assert!(data.get(primary_key.value()).unwrap().is_some());
        entries += 1;
    }
    assert_eq!(entries, 3);
}
