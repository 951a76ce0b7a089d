//! Index declarations and the engine that keeps auxiliary buckets in step with primary records.
//!
//! Records declare their schema through the [`Indexable`] trait. Every mutation of a primary
//! record runs [`add_indexes`]/[`delete_indexes`] inside the same transaction, so the auxiliary
//! buckets never drift from the primaries: a failed unique check, a codec failure or a storage
//! failure aborts the whole transaction.

mod key_set;

pub use crate::indexing::key_set::KeySet;

use crate::{Error, buckets};
use redb::{ReadableTable, TableHandle, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;

// -------------------------------------------------------------------------------------------------
//
/// One declared secondary index: a name and whether values must be unique across records.
///
/// The name conventionally matches the field it indexes (`"Rate"`, `"BindName"`); it is the
/// string that queries pass to [`crate::Query::index`] and that forms the index bucket name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexDef {
    /// Index name, unique within the record type.
    pub name: &'static str,

    /// Whether each field value may map to at most one primary record.
    pub unique: bool,
}

impl IndexDef {
    /// Declares a non-unique index: one field value maps to any number of records.
    #[must_use]
    pub const fn index(name: &'static str) -> Self {
        Self { name, unique: false }
    }

    /// Declares a unique index: one field value maps to at most one record.
    #[must_use]
    pub const fn unique(name: &'static str) -> Self {
        Self { name, unique: true }
    }
}

// -------------------------------------------------------------------------------------------------
//
/// A record type the store can hold: serialisable, with a stable name and declared indexes.
///
/// This trait is the schema. Where a reflective implementation would read struct tags at
/// runtime, implementors declare the same facts directly:
///
/// * [`type_name`](Self::type_name) — the stable identifier the buckets are named after.
/// * [`indexes`](Self::indexes) — the secondary indexes, in place of `index`/`unique` tags.
/// * [`primary_key`](Self::primary_key) — the encoded value of the key field, in place of a
///   `key` tag; types without a key field keep the default and take their key from the caller.
/// * [`index_key`](Self::index_key) — the encoded value of one named indexed field.
///
/// # Examples
///
/// ```rust
/// use redbhold::{Error, IndexDef, Indexable, KeyEncode};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Creature {
///     id: u64,
///     species: String,
///     habitat: String,
/// }
///
/// impl Indexable for Creature {
///     fn type_name() -> &'static str {
///         "Creature"
///     }
///
///     fn indexes() -> &'static [IndexDef] {
///         const DEFS: &[IndexDef] = &[IndexDef::index("Habitat"), IndexDef::unique("Species")];
///         DEFS
///     }
///
///     fn primary_key(&self) -> Result<Option<Vec<u8>>, Error> {
///         Ok(Some(self.id.encode_key()?))
///     }
///
///     fn index_key(&self, index: &str) -> Result<Vec<u8>, Error> {
///         match index {
///             "Habitat" => Ok(self.habitat.encode_key()?),
///             "Species" => Ok(self.species.encode_key()?),
///             other => Err(Error::UnknownIndex { index: other.to_owned() }),
///         }
///     }
/// }
/// ```
pub trait Indexable: Serialize + DeserializeOwned {
    /// Returns the stable identifier of this record type.
    ///
    /// The primary bucket and every index bucket derive their names from it, so changing it
    /// orphans previously written data.
    fn type_name() -> &'static str;

    /// Returns the secondary indexes declared for this type. Defaults to none.
    fn indexes() -> &'static [IndexDef] {
        &[]
    }

    /// Returns the encoded value of the tagged primary-key field, or `None` when the type has
    /// no key field and the operation-supplied key is authoritative.
    ///
    /// When this returns `Some`, store operations ignore the key argument the caller passed.
    ///
    /// # Errors
    ///
    /// * Returns an error if the key field fails to encode.
    fn primary_key(&self) -> Result<Option<Vec<u8>>, Error> {
        Ok(None)
    }

    /// Returns the encoded value of the named indexed field.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::UnknownIndex`] for a name not in [`indexes`](Self::indexes), or an
    ///   error if the field fails to encode.
    fn index_key(&self, index: &str) -> Result<Vec<u8>, Error> {
        Err(Error::UnknownIndex { index: index.to_owned() })
    }
}

/// Looks up a declared index by name.
pub(crate) fn index_def<V: Indexable>(name: &str) -> Result<&'static IndexDef, Error> {
    V::indexes()
        .iter()
        .find(|def| def.name == name)
        .ok_or_else(|| Error::UnknownIndex { index: name.to_owned() })
}

/// Rejects index declarations that cannot be maintained: duplicate names on one type (which
/// also covers a field declared both unique and non-unique under the same name).
pub(crate) fn validate_schema<V: Indexable>() -> Result<(), Error> {
    let defs = V::indexes();
    for (position, def) in defs.iter().enumerate() {
        if defs[..position].iter().any(|earlier| earlier.name == def.name) {
            return Err(Error::Schema {
                type_name: V::type_name(),
                reason: format!("duplicate index name `{}`", def.name),
            });
        }
    }
    Ok(())
}

// -------------------------------------------------------------------------------------------------
//
// Engine operations. All run within an active write transaction supplied by the caller; any
// error leaves the transaction to be dropped uncommitted, so partial index states are never
// visible.

/// Registers a record under every declared index.
///
/// # Errors
///
/// * Returns [`Error::UniqueViolation`] if a unique field value is already mapped to a
///   different primary key. Re-adding the same `(value, key)` pair is a no-op.
pub(crate) fn add_indexes<V: Indexable>(
    txn: &WriteTransaction,
    primary_key: &[u8],
    record: &V,
) -> Result<(), Error> {
    for def in V::indexes() {
        let field = record.index_key(def.name)?;
        add_entry::<V>(txn, def, &field, primary_key)?;
    }
    Ok(())
}

/// Registers one `(field value, primary key)` pair under one index.
pub(crate) fn add_entry<V: Indexable>(
    txn: &WriteTransaction,
    def: &IndexDef,
    field: &[u8],
    primary_key: &[u8],
) -> Result<(), Error> {
    let bucket = buckets::for_index(V::type_name(), def);
    let mut table = txn.open_table(buckets::table(&bucket))?;

    if def.unique {
        let existing = table.get(field)?.map(|guard| guard.value().to_vec());
        match existing {
            // Already mapped to this record, nothing to do.
            Some(current) if current == primary_key => {}
            Some(_) => {
                return Err(Error::UniqueViolation {
                    index: def.name,
                    key: field.to_vec(),
                });
            }
            None => {
                table.insert(field, primary_key)?;
            }
        }
    } else {
        let mut set = match table.get(field)? {
            Some(guard) => KeySet::decode(guard.value())?,
            None => KeySet::new(),
        };
        if set.insert(primary_key) {
            let encoded = set.encode()?;
            table.insert(field, encoded.as_slice())?;
        }
    }

    Ok(())
}

/// Removes a record from every declared index, dropping posting-list keys that become empty.
///
/// Unique entries are only removed while they still map to this record's own primary key, so a
/// stale pre-image cannot clobber another record's claim on the value.
pub(crate) fn delete_indexes<V: Indexable>(
    txn: &WriteTransaction,
    primary_key: &[u8],
    record: &V,
) -> Result<(), Error> {
    for def in V::indexes() {
        let field = record.index_key(def.name)?;
        let bucket = buckets::for_index(V::type_name(), def);
        let mut table = txn.open_table(buckets::table(&bucket))?;

        if def.unique {
            let current = table.get(field.as_slice())?.map(|guard| guard.value().to_vec());
            if current.as_deref() == Some(primary_key) {
                table.remove(field.as_slice())?;
            }
        } else {
            let set = match table.get(field.as_slice())? {
                Some(guard) => Some(KeySet::decode(guard.value())?),
                None => None,
            };
            if let Some(mut set) = set {
                if set.remove(primary_key) {
                    if set.is_empty() {
                        table.remove(field.as_slice())?;
                    } else {
                        let encoded = set.encode()?;
                        table.insert(field.as_slice(), encoded.as_slice())?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Drops and rebuilds index buckets from the authoritative primary records.
///
/// With `names = None`, every bucket under the type's index prefixes is dropped — including
/// stale buckets left behind by removed declarations — and every declared index is replayed.
/// With `names = Some(..)`, the drop and the replay are restricted to the named indexes.
///
/// # Errors
///
/// * Returns [`Error::UnknownIndex`] if a requested name is not declared.
/// * Returns [`Error::UniqueViolation`] if the primary records no longer satisfy a unique
///   constraint; the caller must drop the transaction so the previous index state survives.
pub(crate) fn reindex<V: Indexable>(
    txn: &WriteTransaction,
    names: Option<&[&str]>,
) -> Result<(), Error> {
    let selected: Vec<&'static IndexDef> = match names {
        None => V::indexes().iter().collect(),
        Some(names) => names
            .iter()
            .map(|name| index_def::<V>(name))
            .collect::<Result<_, _>>()?,
    };

    let victims: Vec<String> = match names {
        None => {
            let index_prefix = buckets::index_prefix(V::type_name());
            let unique_prefix = buckets::unique_prefix(V::type_name());
            txn.list_tables()?
                .map(|handle| handle.name().to_owned())
                .filter(|name| name.starts_with(&index_prefix) || name.starts_with(&unique_prefix))
                .collect()
        }
        Some(_) => selected
            .iter()
            .map(|def| buckets::for_index(V::type_name(), def))
            .collect(),
    };

    tracing::debug!(
        type_name = V::type_name(),
        buckets = victims.len(),
        indexes = selected.len(),
        "rebuilding indexes"
    );

    for name in &victims {
        txn.delete_table(buckets::table(name))?;
    }

    if selected.is_empty() {
        return Ok(());
    }

    let data_bucket = buckets::data(V::type_name());
    let primary = txn.open_table(buckets::table(&data_bucket))?;
    for entry in primary.range::<&[u8]>(..)? {
        let (key, value) = entry?;
        let record: V = crate::codecs::decode(value.value())?;
        for def in &selected {
            let field = record.index_key(def.name)?;
            add_entry::<V>(txn, def, &field, key.value())?;
        }
    }

    Ok(())
}

/// Drops the bucket of exactly one declared index.
///
/// # Errors
///
/// * Returns [`Error::UnknownIndex`] if the name is not declared for the type.
pub(crate) fn remove_index<V: Indexable>(txn: &WriteTransaction, name: &str) -> Result<(), Error> {
    let def = index_def::<V>(name)?;
    let bucket = buckets::for_index(V::type_name(), def);
    tracing::debug!(type_name = V::type_name(), index = name, "removing index");
    txn.delete_table(buckets::table(&bucket))?;
    Ok(())
}
