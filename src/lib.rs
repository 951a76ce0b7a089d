//! Redbhold is an embedded, typed record store layered over the
//! [redb](https://www.redb.org/) B+tree engine.
//!
//! Applications work with plain structs: insert, get, update and delete typed records, and query
//! them with equality, ranges, limit/offset, ordering and exclusion — over either the primary
//! key or a named secondary index. Secondary indexes (non-unique and unique) are maintained
//! automatically, inside the same transaction as every record mutation, so they can never drift
//! from the primary records.
//!
//! # Example
//!
//! ```no_run
//! use redbhold::{Error, IndexDef, Indexable, KeyEncode, Query, RangeCondition, Store};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct FileInfo {
//!     hash_key: String,
//!     bind_name: String,
//!     last_access_time: i64,
//!     file_size: i64,
//! }
//!
//! impl Indexable for FileInfo {
//!     fn type_name() -> &'static str {
//!         "FileInfo"
//!     }
//!
//!     fn indexes() -> &'static [IndexDef] {
//!         const DEFS: &[IndexDef] = &[IndexDef::index("BindName"), IndexDef::index("LastAccessTime")];
//!         DEFS
//!     }
//!
//!     fn primary_key(&self) -> Result<Option<Vec<u8>>, Error> {
//!         Ok(Some(self.hash_key.encode_key()?))
//!     }
//!
//!     fn index_key(&self, index: &str) -> Result<Vec<u8>, Error> {
//!         match index {
//!             "BindName" => Ok(self.bind_name.encode_key()?),
//!             "LastAccessTime" => Ok(self.last_access_time.encode_key()?),
//!             other => Err(Error::UnknownIndex { index: other.to_owned() }),
//!         }
//!     }
//! }
//!
//! fn main() -> Result<(), Error> {
//!     let store = Store::open("files.db")?;
//!
//!     let info = FileInfo {
//!         hash_key: "1".to_owned(),
//!         bind_name: "bindname-1".to_owned(),
//!         last_access_time: 42,
//!         file_size: 1_024,
//!     };
//!     store.insert("1", &info)?;
//!
//!     // Recently accessed files, newest first.
//!     let recent: Vec<FileInfo> = store.find(
//!         &Query::index("LastAccessTime")
//!             .range(RangeCondition::ge(10_i64).and(RangeCondition::le(50_i64)))
//!             .desc()
//!             .limit(10),
//!     )?;
//!     # let _ = recent;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Layout
//!
//! Each record type owns a primary bucket `data:<TypeName>` plus one auxiliary bucket per
//! declared index (`_index:<TypeName>:<IndexName>` with posting lists, or
//! `_unique:<TypeName>:<IndexName>` mapping straight to a primary key). All buckets are plain
//! `redb` tables with byte keys and values, so any implementation of the same layout and codecs
//! can read a store written by another.

#![warn(
   clippy::all,
   clippy::cargo,
   clippy::nursery,
   clippy::pedantic,
   clippy::style,
)]

mod buckets;
mod error;
mod store;

pub mod codecs;
pub mod indexing;
pub mod querying;

pub use crate::codecs::keys::{KeyDecode, KeyEncode};
pub use crate::error::Error;
pub use crate::indexing::{IndexDef, Indexable, KeySet};
pub use crate::querying::{Query, RangeCondition};
pub use crate::store::{Options, Store};
