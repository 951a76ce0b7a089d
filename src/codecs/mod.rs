//! Byte codecs: the MessagePack value codec used for stored records and posting lists, and the
//! order-preserving key codec used for primary keys and indexed field values.

pub mod keys;

use serde::Serialize;
use serde::de::DeserializeOwned;

// -------------------------------------------------------------------------------------------------
//
/// Error returned from the codec layer.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A value failed to serialize into MessagePack.
    #[error("value did not encode: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Stored bytes failed to deserialize into the requested type.
    #[error("value did not decode: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// A key failed to encode or decode. See [`keys::KeyError`].
    #[error(transparent)]
    Key(#[from] keys::KeyError),
}

// -------------------------------------------------------------------------------------------------
//
// Functions

/// Encodes a value into its stored byte representation.
///
/// The encoding is deterministic MessagePack: the same value always produces the same bytes. It
/// is **not** order-preserving; ordered traversal is a property of the key codec only.
///
/// # Errors
///
/// * Returns [`Error::Encode`] if the value cannot be represented in MessagePack.
pub fn encode<V: Serialize>(value: &V) -> Result<Vec<u8>, Error> {
    Ok(rmp_serde::to_vec(value)?)
}

/// Decodes stored bytes back into a typed value.
///
/// # Errors
///
/// * Returns [`Error::Decode`] if the bytes are malformed or do not match the target type.
pub fn decode<V: DeserializeOwned>(bytes: &[u8]) -> Result<V, Error> {
    Ok(rmp_serde::from_slice(bytes)?)
}
