//! Bucket naming.
//!
//! Every record type owns one primary bucket and one auxiliary bucket per declared index, all
//! realised as named `redb` tables with raw byte keys and values:
//!
//! | Bucket | Name | Contents |
//! |---|---|---|
//! | primary | `data:<TypeName>` | `encoded primary key → encoded record` |
//! | non-unique index | `_index:<TypeName>:<IndexName>` | `encoded field value → posting list` |
//! | unique index | `_unique:<TypeName>:<IndexName>` | `encoded field value → encoded primary key` |
//!
//! Any store written with this layout and codec can be read back by another implementation of
//! the same scheme.

use crate::indexing::IndexDef;
use redb::TableDefinition;

/// The raw table shape every bucket uses.
pub(crate) type BucketDef<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

/// Builds a `redb` table definition for a bucket name.
pub(crate) fn table(name: &str) -> BucketDef<'_> {
    TableDefinition::new(name)
}

/// Name of the primary bucket for a record type.
pub(crate) fn data(type_name: &str) -> String {
    format!("data:{type_name}")
}

/// Name of the bucket backing one declared index.
pub(crate) fn for_index(type_name: &str, index: &IndexDef) -> String {
    if index.unique {
        format!("_unique:{type_name}:{name}", name = index.name)
    } else {
        format!("_index:{type_name}:{name}", name = index.name)
    }
}

/// Prefix shared by every non-unique index bucket of a record type.
pub(crate) fn index_prefix(type_name: &str) -> String {
    format!("_index:{type_name}:")
}

/// Prefix shared by every unique index bucket of a record type.
pub(crate) fn unique_prefix(type_name: &str) -> String {
    format!("_unique:{type_name}:")
}

// -------------------------------------------------------------------------------------------------
//
// Unit Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_the_shared_layout() {
        assert_eq!(data("FileInfo"), "data:FileInfo");
        assert_eq!(
            for_index("FileInfo", &IndexDef::index("Rate")),
            "_index:FileInfo:Rate"
        );
        assert_eq!(
            for_index("Account", &IndexDef::unique("No")),
            "_unique:Account:No"
        );
        assert!(for_index("FileInfo", &IndexDef::index("Rate")).starts_with(&index_prefix("FileInfo")));
        assert!(for_index("Account", &IndexDef::unique("No")).starts_with(&unique_prefix("Account")));
    }
}
