//! The store: typed record operations, query operations and index maintenance over one `redb`
//! database file.

use crate::codecs::keys::KeyEncode;
use crate::querying::executor::{self, Plan, ScanMode};
use crate::{Error, Indexable, Query, buckets, codecs, indexing};
use redb::{Database, ReadTransaction, ReadableTable, TableError, TableHandle, WriteTransaction};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

// -------------------------------------------------------------------------------------------------
//
// Type Aliases

/// The raw table shape of a bucket opened inside a read transaction.
type RawReadTable = redb::ReadOnlyTable<&'static [u8], &'static [u8]>;

// -------------------------------------------------------------------------------------------------
//
/// Tunables for [`Store::open_with`].
///
/// File creation, permissions and locking are handled by the underlying engine; the options
/// here are the engine's real knobs.
#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    /// Size of the engine's page cache in bytes. `None` keeps the engine default.
    pub cache_size_bytes: Option<usize>,
}

// -------------------------------------------------------------------------------------------------
//
/// An embedded, typed record store over a single `redb` database file.
///
/// Records are values of types implementing [`Indexable`]. Each operation opens and commits its
/// own serialisable transaction; the `tx_*` variants instead run inside a caller-supplied
/// [`WriteTransaction`] so many operations commit atomically. The `*_in`/`*_from` variants
/// address a caller-named bucket in place of the type's default primary bucket — secondary
/// indexes stay global, so partitioned records share them.
///
/// The store is `Send + Sync`; concurrent readers run against a consistent snapshot while a
/// single writer proceeds. Dropping the store closes the file.
///
/// # Errors
///
/// On any error the enclosing transaction is aborted and the store reverts to its
/// pre-transaction state; partial effects are never observable. For `tx_*` variants that
/// contract is the caller's: drop the transaction uncommitted when a call fails.
pub struct Store {
    database: Database,

    /// Record types whose index declarations have been validated. Read-mostly; first writer
    /// wins on concurrent fill.
    verified_schemas: RwLock<HashSet<&'static str>>,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl Store {
    /// Opens (or creates) a store at the given path with default options.
    ///
    /// # Errors
    ///
    /// * Returns an error if the file cannot be created, opened or locked.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::open_with(path, Options::default())
    }

    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    ///
    /// * Returns an error if the file cannot be created, opened or locked.
    pub fn open_with<P: AsRef<Path>>(path: P, options: Options) -> Result<Self, Error> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening store");
        let mut builder = redb::Builder::new();
        if let Some(bytes) = options.cache_size_bytes {
            builder.set_cache_size(bytes);
        }
        let database = builder.create(path)?;
        Ok(Self {
            database,
            verified_schemas: RwLock::new(HashSet::new()),
        })
    }

    /// Returns the underlying `redb` database handle.
    ///
    /// Use it to keep plain key-value tables beside the typed records, or to batch typed
    /// operations through [`Store::begin_write`] and the `tx_*` variants. Do not write to the
    /// store's own buckets through this handle; that bypasses index maintenance.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.database
    }

    /// Begins a read transaction against a consistent snapshot.
    ///
    /// # Errors
    ///
    /// * Returns an error if the engine cannot start the transaction.
    pub fn begin_read(&self) -> Result<ReadTransaction, Error> {
        Ok(self.database.begin_read().map_err(Box::new)?)
    }

    /// Begins the store's single write transaction. Pass it to the `tx_*` variants and commit
    /// it once the batch is complete; dropping it uncommitted aborts the batch.
    ///
    /// # Errors
    ///
    /// * Returns an error if the engine cannot start the transaction.
    pub fn begin_write(&self) -> Result<WriteTransaction, Error> {
        Ok(self.database.begin_write().map_err(Box::new)?)
    }

    /// Validates a record type's index declarations once, then remembers the type.
    fn check_schema<V: Indexable>(&self) -> Result<(), Error> {
        {
            let verified = self
                .verified_schemas
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if verified.contains(V::type_name()) {
                return Ok(());
            }
        }
        indexing::validate_schema::<V>()?;
        self.verified_schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(V::type_name());
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------
//
// Record Operations

impl Store {
    /// Inserts a new record under the given primary key.
    ///
    /// When the record type declares a primary-key field, its value takes precedence over the
    /// `key` argument. The same applies to `upsert` and `update`.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::DuplicateKey`] if a record already exists under the key.
    /// * Returns [`Error::UniqueViolation`] if a unique field value is already taken.
    pub fn insert<V: Indexable, K: KeyEncode>(&self, key: K, record: &V) -> Result<(), Error> {
        let txn = self.begin_write()?;
        self.tx_insert(&txn, key, record)?;
        txn.commit()?;
        Ok(())
    }

    /// [`Store::insert`] within a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// * As [`Store::insert`]; on error, drop the transaction uncommitted.
    pub fn tx_insert<V: Indexable, K: KeyEncode>(
        &self,
        txn: &WriteTransaction,
        key: K,
        record: &V,
    ) -> Result<(), Error> {
        self.tx_insert_in(txn, &buckets::data(V::type_name()), key, record)
    }

    /// [`Store::insert`] into a caller-named bucket. Indexes stay under the global layout.
    ///
    /// # Errors
    ///
    /// * As [`Store::insert`].
    pub fn insert_in<V: Indexable, K: KeyEncode>(
        &self,
        bucket: &str,
        key: K,
        record: &V,
    ) -> Result<(), Error> {
        let txn = self.begin_write()?;
        self.tx_insert_in(&txn, bucket, key, record)?;
        txn.commit()?;
        Ok(())
    }

    /// [`Store::insert_in`] within a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// * As [`Store::insert`]; on error, drop the transaction uncommitted.
    pub fn tx_insert_in<V: Indexable, K: KeyEncode>(
        &self,
        txn: &WriteTransaction,
        bucket: &str,
        key: K,
        record: &V,
    ) -> Result<(), Error> {
        self.check_schema::<V>()?;
        let key = resolve_key(key, record)?;
        let value = codecs::encode(record)?;
        let mut table = txn.open_table(buckets::table(bucket))?;
        if table.get(key.as_slice())?.is_some() {
            return Err(Error::DuplicateKey { bucket: bucket.to_owned(), key });
        }
        table.insert(key.as_slice(), value.as_slice())?;
        drop(table);
        indexing::add_indexes(txn, &key, record)
    }

    /// Inserts or replaces the record under the given primary key. When a record is replaced,
    /// its pre-image is removed from every index before the new value is registered.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::UniqueViolation`] if a unique field value is taken by another record.
    pub fn upsert<V: Indexable, K: KeyEncode>(&self, key: K, record: &V) -> Result<(), Error> {
        let txn = self.begin_write()?;
        self.tx_upsert(&txn, key, record)?;
        txn.commit()?;
        Ok(())
    }

    /// [`Store::upsert`] within a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// * As [`Store::upsert`]; on error, drop the transaction uncommitted.
    pub fn tx_upsert<V: Indexable, K: KeyEncode>(
        &self,
        txn: &WriteTransaction,
        key: K,
        record: &V,
    ) -> Result<(), Error> {
        self.tx_upsert_in(txn, &buckets::data(V::type_name()), key, record)
    }

    /// [`Store::upsert`] into a caller-named bucket.
    ///
    /// # Errors
    ///
    /// * As [`Store::upsert`].
    pub fn upsert_in<V: Indexable, K: KeyEncode>(
        &self,
        bucket: &str,
        key: K,
        record: &V,
    ) -> Result<(), Error> {
        let txn = self.begin_write()?;
        self.tx_upsert_in(&txn, bucket, key, record)?;
        txn.commit()?;
        Ok(())
    }

    /// [`Store::upsert_in`] within a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// * As [`Store::upsert`]; on error, drop the transaction uncommitted.
    pub fn tx_upsert_in<V: Indexable, K: KeyEncode>(
        &self,
        txn: &WriteTransaction,
        bucket: &str,
        key: K,
        record: &V,
    ) -> Result<(), Error> {
        self.check_schema::<V>()?;
        let key = resolve_key(key, record)?;
        let value = codecs::encode(record)?;
        let mut table = txn.open_table(buckets::table(bucket))?;
        let previous = table.get(key.as_slice())?.map(|guard| guard.value().to_vec());
        if let Some(bytes) = previous {
            let before: V = codecs::decode(&bytes)?;
            indexing::delete_indexes(txn, &key, &before)?;
        }
        table.insert(key.as_slice(), value.as_slice())?;
        drop(table);
        indexing::add_indexes(txn, &key, record)
    }

    /// Replaces an existing record; the pre-image is removed from every index first.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::NotFound`] if no record exists under the key.
    /// * Returns [`Error::UniqueViolation`] if a unique field value is taken by another record.
    pub fn update<V: Indexable, K: KeyEncode>(&self, key: K, record: &V) -> Result<(), Error> {
        let txn = self.begin_write()?;
        self.tx_update(&txn, key, record)?;
        txn.commit()?;
        Ok(())
    }

    /// [`Store::update`] within a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// * As [`Store::update`]; on error, drop the transaction uncommitted.
    pub fn tx_update<V: Indexable, K: KeyEncode>(
        &self,
        txn: &WriteTransaction,
        key: K,
        record: &V,
    ) -> Result<(), Error> {
        self.check_schema::<V>()?;
        let bucket = buckets::data(V::type_name());
        let key = resolve_key(key, record)?;
        let value = codecs::encode(record)?;
        let mut table = txn.open_table(buckets::table(&bucket))?;
        let previous = table
            .get(key.as_slice())?
            .map(|guard| guard.value().to_vec())
            .ok_or_else(|| Error::NotFound { bucket: bucket.clone(), key: key.clone() })?;
        let before: V = codecs::decode(&previous)?;
        indexing::delete_indexes(txn, &key, &before)?;
        table.insert(key.as_slice(), value.as_slice())?;
        drop(table);
        indexing::add_indexes(txn, &key, record)
    }

    /// Reads the record stored under the given primary key.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::NotFound`] if no record exists under the key.
    pub fn get<V: Indexable, K: KeyEncode>(&self, key: K) -> Result<V, Error> {
        self.get_from(&buckets::data(V::type_name()), key)
    }

    /// [`Store::get`] from a caller-named bucket.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::NotFound`] if no record exists under the key.
    pub fn get_from<V: Indexable, K: KeyEncode>(&self, bucket: &str, key: K) -> Result<V, Error> {
        self.check_schema::<V>()?;
        let key = key.encode_key()?;
        let txn = self.begin_read()?;
        let Some(table) = open_read_table(&txn, bucket)? else {
            return Err(Error::NotFound { bucket: bucket.to_owned(), key });
        };
        read_record(&table, bucket, &key)
    }

    /// [`Store::get`] within a caller-supplied write transaction, observing its uncommitted
    /// state.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::NotFound`] if no record exists under the key.
    pub fn tx_get<V: Indexable, K: KeyEncode>(
        &self,
        txn: &WriteTransaction,
        key: K,
    ) -> Result<V, Error> {
        self.tx_get_from(txn, &buckets::data(V::type_name()), key)
    }

    /// [`Store::tx_get`] from a caller-named bucket.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::NotFound`] if no record exists under the key.
    pub fn tx_get_from<V: Indexable, K: KeyEncode>(
        &self,
        txn: &WriteTransaction,
        bucket: &str,
        key: K,
    ) -> Result<V, Error> {
        self.check_schema::<V>()?;
        let key = key.encode_key()?;
        let table = txn.open_table(buckets::table(bucket))?;
        read_record(&table, bucket, &key)
    }

    /// Deletes the record stored under the given primary key, removing it from every index.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::NotFound`] if no record exists under the key.
    pub fn delete<V: Indexable, K: KeyEncode>(&self, key: K) -> Result<(), Error> {
        let txn = self.begin_write()?;
        self.tx_delete::<V, K>(&txn, key)?;
        txn.commit()?;
        Ok(())
    }

    /// [`Store::delete`] within a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// * As [`Store::delete`]; on error, drop the transaction uncommitted.
    pub fn tx_delete<V: Indexable, K: KeyEncode>(
        &self,
        txn: &WriteTransaction,
        key: K,
    ) -> Result<(), Error> {
        self.tx_delete_in::<V, K>(txn, &buckets::data(V::type_name()), key)
    }

    /// [`Store::delete`] from a caller-named bucket.
    ///
    /// # Errors
    ///
    /// * As [`Store::delete`].
    pub fn delete_in<V: Indexable, K: KeyEncode>(&self, bucket: &str, key: K) -> Result<(), Error> {
        let txn = self.begin_write()?;
        self.tx_delete_in::<V, K>(&txn, bucket, key)?;
        txn.commit()?;
        Ok(())
    }

    /// [`Store::delete_in`] within a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// * As [`Store::delete`]; on error, drop the transaction uncommitted.
    pub fn tx_delete_in<V: Indexable, K: KeyEncode>(
        &self,
        txn: &WriteTransaction,
        bucket: &str,
        key: K,
    ) -> Result<(), Error> {
        self.check_schema::<V>()?;
        let key = key.encode_key()?;
        let mut table = txn.open_table(buckets::table(bucket))?;
        let stored = table
            .get(key.as_slice())?
            .map(|guard| guard.value().to_vec())
            .ok_or_else(|| Error::NotFound { bucket: bucket.to_owned(), key: key.clone() })?;
        let record: V = codecs::decode(&stored)?;
        table.remove(key.as_slice())?;
        drop(table);
        indexing::delete_indexes(txn, &key, &record)
    }
}

// -------------------------------------------------------------------------------------------------
//
// Query Operations

impl Store {
    /// Runs a query and returns every matching record, in traversal order.
    ///
    /// An empty result is not an error; a fresh vector is returned either way.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::UnknownIndex`] if the query names an index with no bucket.
    /// * Returns [`Error::Query`] or [`Error::Codec`] for malformed queries.
    pub fn find<V: Indexable>(&self, query: &Query) -> Result<Vec<V>, Error> {
        self.find_in(&buckets::data(V::type_name()), query)
    }

    /// [`Store::find`] against a caller-named bucket. Index-targeted queries consult the global
    /// index buckets and read the matching records from the given bucket.
    ///
    /// # Errors
    ///
    /// * As [`Store::find`].
    pub fn find_in<V: Indexable>(&self, bucket: &str, query: &Query) -> Result<Vec<V>, Error> {
        let plan = Plan::compile(query)?;
        self.read_find(bucket, &plan)
    }

    /// [`Store::find`] within a caller-supplied write transaction, observing its uncommitted
    /// state.
    ///
    /// # Errors
    ///
    /// * As [`Store::find`].
    pub fn tx_find<V: Indexable>(
        &self,
        txn: &WriteTransaction,
        query: &Query,
    ) -> Result<Vec<V>, Error> {
        self.tx_find_in(txn, &buckets::data(V::type_name()), query)
    }

    /// [`Store::find_in`] within a caller-supplied write transaction.
    ///
    /// # Errors
    ///
    /// * As [`Store::find`].
    pub fn tx_find_in<V: Indexable>(
        &self,
        txn: &WriteTransaction,
        bucket: &str,
        query: &Query,
    ) -> Result<Vec<V>, Error> {
        self.check_schema::<V>()?;
        let plan = Plan::compile(query)?;
        let keys = write_scan::<V>(txn, bucket, &plan)?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let table = txn.open_table(buckets::table(bucket))?;
        collect_records(&table, bucket, &keys)
    }

    /// Runs a query capped to one result and returns the first matching record, if any.
    ///
    /// # Errors
    ///
    /// * As [`Store::find`].
    pub fn find_one<V: Indexable>(&self, query: &Query) -> Result<Option<V>, Error> {
        let mut plan = Plan::compile(query)?;
        plan.limit = 1;
        let records = self.read_find::<V>(&buckets::data(V::type_name()), &plan)?;
        Ok(records.into_iter().next())
    }

    /// Counts the records matching a query. Limit and offset do not apply to counting and are
    /// ignored; exclusions still do.
    ///
    /// # Errors
    ///
    /// * As [`Store::find`].
    pub fn count<V: Indexable>(&self, query: &Query) -> Result<usize, Error> {
        self.count_in::<V>(&buckets::data(V::type_name()), query)
    }

    /// [`Store::count`] against a caller-named bucket.
    ///
    /// # Errors
    ///
    /// * As [`Store::find`].
    pub fn count_in<V: Indexable>(&self, bucket: &str, query: &Query) -> Result<usize, Error> {
        self.check_schema::<V>()?;
        let mut plan = Plan::compile(query)?;
        plan.limit = 0;
        plan.offset = 0;
        let txn = self.begin_read()?;
        let Some(primary) = open_read_table(&txn, bucket)? else {
            return Ok(0);
        };
        let keys = read_scan::<V>(&txn, &primary, &plan)?;
        Ok(keys.len())
    }

    /// Rewrites every record matching the query through the caller's mutator, reconciling the
    /// indexes from each record's pre-image.
    ///
    /// The whole operation is one transaction: if the mutator or any write fails, no record is
    /// changed.
    ///
    /// # Errors
    ///
    /// * As [`Store::find`], plus any error returned by the mutator.
    pub fn update_matching<V, F>(&self, query: &Query, mutate: F) -> Result<(), Error>
    where
        V: Indexable,
        F: FnMut(&mut V) -> Result<(), Error>,
    {
        let txn = self.begin_write()?;
        self.tx_update_matching(&txn, query, mutate)?;
        txn.commit()?;
        Ok(())
    }

    /// [`Store::update_matching`] within a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// * As [`Store::update_matching`]; on error, drop the transaction uncommitted.
    pub fn tx_update_matching<V, F>(
        &self,
        txn: &WriteTransaction,
        query: &Query,
        mut mutate: F,
    ) -> Result<(), Error>
    where
        V: Indexable,
        F: FnMut(&mut V) -> Result<(), Error>,
    {
        self.check_schema::<V>()?;
        let bucket = buckets::data(V::type_name());
        let plan = Plan::compile(query)?;
        let keys = write_scan::<V>(txn, &bucket, &plan)?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut table = txn.open_table(buckets::table(&bucket))?;
        for key in keys {
            let stored = table
                .get(key.as_slice())?
                .map(|guard| guard.value().to_vec())
                .ok_or_else(|| Error::NotFound { bucket: bucket.clone(), key: key.clone() })?;
            let mut record: V = codecs::decode(&stored)?;
            indexing::delete_indexes(txn, &key, &record)?;
            mutate(&mut record)?;
            let value = codecs::encode(&record)?;
            table.insert(key.as_slice(), value.as_slice())?;
            indexing::add_indexes(txn, &key, &record)?;
        }
        Ok(())
    }

    /// Deletes every record matching the query, removing each from every index.
    ///
    /// # Errors
    ///
    /// * As [`Store::find`].
    pub fn delete_matching<V: Indexable>(&self, query: &Query) -> Result<(), Error> {
        let txn = self.begin_write()?;
        self.tx_delete_matching::<V>(&txn, query)?;
        txn.commit()?;
        Ok(())
    }

    /// [`Store::delete_matching`] within a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// * As [`Store::find`]; on error, drop the transaction uncommitted.
    pub fn tx_delete_matching<V: Indexable>(
        &self,
        txn: &WriteTransaction,
        query: &Query,
    ) -> Result<(), Error> {
        self.check_schema::<V>()?;
        let bucket = buckets::data(V::type_name());
        let plan = Plan::compile(query)?;
        let keys = write_scan::<V>(txn, &bucket, &plan)?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut table = txn.open_table(buckets::table(&bucket))?;
        for key in keys {
            let stored = table
                .get(key.as_slice())?
                .map(|guard| guard.value().to_vec())
                .ok_or_else(|| Error::NotFound { bucket: bucket.clone(), key: key.clone() })?;
            let record: V = codecs::decode(&stored)?;
            table.remove(key.as_slice())?;
            indexing::delete_indexes(txn, &key, &record)?;
        }
        Ok(())
    }

    /// Runs the query against a read snapshot and decodes the matching records.
    fn read_find<V: Indexable>(&self, bucket: &str, plan: &Plan) -> Result<Vec<V>, Error> {
        self.check_schema::<V>()?;
        let txn = self.begin_read()?;
        let Some(primary) = open_read_table(&txn, bucket)? else {
            return Ok(Vec::new());
        };
        let keys = read_scan::<V>(&txn, &primary, plan)?;
        collect_records(&primary, bucket, &keys)
    }
}

// -------------------------------------------------------------------------------------------------
//
// Index Maintenance

impl Store {
    /// Drops and rebuilds index buckets for a record type from its primary records.
    ///
    /// `None` rebuilds every declared index and also clears stale index buckets left behind by
    /// declarations that no longer exist; `Some(names)` restricts the rebuild to those indexes.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::UnknownIndex`] if a requested name is not declared.
    /// * Returns [`Error::UniqueViolation`] if the records no longer satisfy a unique
    ///   constraint; the previous index state is preserved.
    pub fn re_index<V: Indexable>(&self, names: Option<&[&str]>) -> Result<(), Error> {
        self.check_schema::<V>()?;
        let txn = self.begin_write()?;
        indexing::reindex::<V>(&txn, names)?;
        txn.commit()?;
        Ok(())
    }

    /// Drops the bucket of one declared index. The declaration itself is unaffected; the next
    /// [`Store::re_index`] or record mutation will start repopulating it.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::UnknownIndex`] if the name is not declared for the type.
    pub fn remove_index<V: Indexable>(&self, name: &str) -> Result<(), Error> {
        self.check_schema::<V>()?;
        let txn = self.begin_write()?;
        indexing::remove_index::<V>(&txn, name)?;
        txn.commit()?;
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------
//
// Functions

/// Record types with a tagged primary-key field override the caller-supplied key.
fn resolve_key<V: Indexable, K: KeyEncode>(key: K, record: &V) -> Result<Vec<u8>, Error> {
    if let Some(tagged) = record.primary_key()? {
        return Ok(tagged);
    }
    Ok(key.encode_key()?)
}

/// Opens a bucket in a read transaction; a bucket that was never created reads as `None`.
fn open_read_table(txn: &ReadTransaction, bucket: &str) -> Result<Option<RawReadTable>, Error> {
    match txn.open_table(buckets::table(bucket)) {
        Ok(table) => Ok(Some(table)),
        Err(TableError::TableDoesNotExist(_)) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Returns whether a bucket exists, without creating it the way `open_table` would inside a
/// write transaction.
fn table_exists(txn: &WriteTransaction, bucket: &str) -> Result<bool, Error> {
    Ok(txn.list_tables()?.any(|handle| handle.name() == bucket))
}

/// Collects the primary keys matching a compiled plan, inside a read transaction.
fn read_scan<V: Indexable>(
    txn: &ReadTransaction,
    primary: &RawReadTable,
    plan: &Plan,
) -> Result<Vec<Vec<u8>>, Error> {
    match plan.index {
        None => executor::scan_keys(primary, plan, ScanMode::Primary),
        Some(name) => {
            let def = indexing::index_def::<V>(name)?;
            let index_bucket = buckets::for_index(V::type_name(), def);
            let Some(table) = open_read_table(txn, &index_bucket)? else {
                return Err(Error::UnknownIndex { index: name.to_owned() });
            };
            let mode = if def.unique { ScanMode::Unique } else { ScanMode::Posting };
            executor::scan_keys(&table, plan, mode)
        }
    }
}

/// Collects the primary keys matching a compiled plan, inside a write transaction. The scanned
/// table handle is released before returning so the caller can reopen buckets for mutation.
fn write_scan<V: Indexable>(
    txn: &WriteTransaction,
    bucket: &str,
    plan: &Plan,
) -> Result<Vec<Vec<u8>>, Error> {
    // An absent primary bucket means no record of the type was ever written.
    if !table_exists(txn, bucket)? {
        return Ok(Vec::new());
    }
    match plan.index {
        None => {
            let table = txn.open_table(buckets::table(bucket))?;
            executor::scan_keys(&table, plan, ScanMode::Primary)
        }
        Some(name) => {
            let def = indexing::index_def::<V>(name)?;
            let index_bucket = buckets::for_index(V::type_name(), def);
            if !table_exists(txn, &index_bucket)? {
                return Err(Error::UnknownIndex { index: name.to_owned() });
            }
            let table = txn.open_table(buckets::table(&index_bucket))?;
            let mode = if def.unique { ScanMode::Unique } else { ScanMode::Posting };
            executor::scan_keys(&table, plan, mode)
        }
    }
}

/// Reads and decodes one record from an open bucket.
fn read_record<V, T>(table: &T, bucket: &str, key: &[u8]) -> Result<V, Error>
where
    V: Indexable,
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let guard = table
        .get(key)?
        .ok_or_else(|| Error::NotFound { bucket: bucket.to_owned(), key: key.to_vec() })?;
    Ok(codecs::decode(guard.value())?)
}

/// Decodes the records behind a list of primary keys, in list order.
fn collect_records<V, T>(table: &T, bucket: &str, keys: &[Vec<u8>]) -> Result<Vec<V>, Error>
where
    V: Indexable,
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut records = Vec::with_capacity(keys.len());
    for key in keys {
        records.push(read_record(table, bucket, key)?);
    }
    Ok(records)
}
