//! The posting list stored under each non-unique index key.

use serde::{Deserialize, Serialize};

// -------------------------------------------------------------------------------------------------
//
/// An insertion-ordered, deduplicated collection of encoded primary keys.
///
/// Each entry in a non-unique index bucket maps one encoded field value to a `KeySet` holding
/// every primary key whose record carries that value. The set is serialised with the value codec
/// and rewritten whole on change; membership is checked on insert so repeated upserts of the
/// same record never inflate it.
///
/// Query execution iterates the set in stored order; that order is insertion order and carries
/// no further meaning.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    keys: Vec<Vec<u8>>,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl KeySet {
    /// Creates an empty `KeySet`.
    #[must_use]
    pub const fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Decodes a `KeySet` from its stored byte representation.
    ///
    /// # Errors
    ///
    /// * Returns an error if the bytes do not decode as a posting list.
    pub fn decode(bytes: &[u8]) -> Result<Self, crate::Error> {
        Ok(crate::codecs::decode(bytes)?)
    }

    /// Encodes the `KeySet` into its stored byte representation.
    ///
    /// # Errors
    ///
    /// * Returns an error if the posting list cannot be serialised.
    pub fn encode(&self) -> Result<Vec<u8>, crate::Error> {
        Ok(crate::codecs::encode(self)?)
    }

    /// Appends a primary key unless it is already present. Returns whether the set changed.
    pub fn insert(&mut self, primary_key: &[u8]) -> bool {
        if self.contains(primary_key) {
            false
        } else {
            self.keys.push(primary_key.to_vec());
            true
        }
    }

    /// Removes a primary key. Returns whether the set changed.
    pub fn remove(&mut self, primary_key: &[u8]) -> bool {
        let before = self.keys.len();
        self.keys.retain(|key| key != primary_key);
        self.keys.len() != before
    }

    /// Returns `true` if the set holds the given primary key.
    #[must_use]
    pub fn contains(&self, primary_key: &[u8]) -> bool {
        self.keys.iter().any(|key| key == primary_key)
    }

    /// Returns the number of primary keys in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the set holds no primary keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates the primary keys in stored order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.keys.iter().map(Vec::as_slice)
    }

    /// Consumes the set, returning the primary keys in stored order.
    #[must_use]
    pub fn into_keys(self) -> Vec<Vec<u8>> {
        self.keys
    }
}

// -------------------------------------------------------------------------------------------------
//
// Unit Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_deduplicates_and_keeps_order() {
        let mut set = KeySet::new();
        assert!(set.insert(b"b"));
        assert!(set.insert(b"a"));
        assert!(!set.insert(b"b"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), [b"b".as_slice(), b"a".as_slice()]);
    }

    #[test]
    fn remove_reports_membership() {
        let mut set = KeySet::new();
        set.insert(b"a");
        assert!(set.remove(b"a"));
        assert!(!set.remove(b"a"));
        assert!(set.is_empty());
    }

    #[test]
    fn round_trips_through_the_value_codec() {
        let mut set = KeySet::new();
        set.insert(b"one");
        set.insert(b"two");
        let bytes = set.encode().unwrap();
        assert_eq!(KeySet::decode(&bytes).unwrap(), set);
    }
}
