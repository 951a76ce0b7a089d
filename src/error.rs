//! Error returned from the `redbhold` crate. This includes record errors, index errors, query
//! errors, and errors propagated from the underlying `redb` storage engine.

// -------------------------------------------------------------------------------------------------
//
/// Error returned from the `redbhold` crate. This includes record errors, index errors, query
/// errors, and errors propagated from the underlying `redb` storage engine.
///
/// Each failure mode surfaces as its own variant. Storage-level failures are passed through
/// transparently so callers can still match on the `redb` error types when they need to.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The requested primary key has no record in the given bucket. Returned by `get`, `update`
    /// and `delete`; an empty query result is not an error.
    #[error("no record found under the given key in bucket `{bucket}`")]
    NotFound {
        bucket: String,
        key: Vec<u8>,
    },

    /// `insert` found an existing record under the primary key. Use `upsert` to replace.
    #[error("a record already exists under the given key in bucket `{bucket}`")]
    DuplicateKey {
        bucket: String,
        key: Vec<u8>,
    },

    /// A unique index already maps this field value to a different primary record.
    #[error("unique index `{index}` already maps this value to a different record")]
    UniqueViolation {
        index: &'static str,
        key: Vec<u8>,
    },

    /// The query named an index that is not declared for the record type, or whose bucket does
    /// not exist in the store.
    #[error("the index `{index}` does not exist")]
    UnknownIndex {
        index: String,
    },

    /// The record type's index declarations are inconsistent.
    #[error("invalid schema for record type `{type_name}`: {reason}")]
    Schema {
        type_name: &'static str,
        reason: String,
    },

    /// Encoding or decoding of a record, key or posting list failed.
    #[error(transparent)]
    Codec(#[from] crate::codecs::Error),

    /// The query is malformed: no equality value or range condition, or a condition that holds
    /// no intervals.
    #[error("invalid query: {reason}")]
    Query {
        reason: String,
    },

    /// [redb](https://www.redb.org/)
    /// [commit error](https://docs.rs/redb/latest/redb/enum.CommitError.html).
    #[error(transparent)]
    RedbCommit(#[from] redb::CommitError),

    /// [redb](https://www.redb.org/)
    /// [database error](https://docs.rs/redb/latest/redb/enum.DatabaseError.html).
    #[error(transparent)]
    RedbDatabase(#[from] redb::DatabaseError),

    /// [redb](https://www.redb.org/)
    /// [storage error](https://docs.rs/redb/latest/redb/enum.StorageError.html).
    #[error(transparent)]
    RedbStorage(#[from] redb::StorageError),

    /// [redb](https://www.redb.org/)
    /// [table error](https://docs.rs/redb/latest/redb/enum.TableError.html).
    #[error(transparent)]
    RedbTable(#[from] redb::TableError),

    /// [redb](https://www.redb.org/)
    /// [transaction error](https://docs.rs/redb/latest/redb/enum.TransactionError.html).
    #[error(transparent)]
    RedbTransaction(#[from] Box<redb::TransactionError>),
}

// -------------------------------------------------------------------------------------------------
//
// Trait Implementations

impl From<crate::codecs::keys::KeyError> for Error {
    /// Lifts a key-codec failure into the crate error through the [`crate::codecs::Error`]
    /// channel, so `?` works directly on `encode_key`/`decode_key` results.
    fn from(error: crate::codecs::keys::KeyError) -> Self {
        Self::Codec(crate::codecs::Error::Key(error))
    }
}
