//! Order-preserving key encodings.
//!
//! Every type that can serve as a primary key or as an indexed field value encodes to a byte
//! string such that lexicographic comparison of the encodings agrees with the natural ordering
//! of the values:
//!
//! ```text
//! a < b  ⇔  encode(a) < encode(b)
//! ```
//!
//! Range queries walk index buckets in raw byte order, so this law is what makes them return
//! values in field order. The encodings are:
//!
//! | Type | Encoding |
//! |---|---|
//! | `u8`–`u128`, `usize` | big-endian, fixed width (`usize` as 8 bytes) |
//! | `i8`–`i128`, `isize` | big-endian with the sign bit flipped (offset binary) |
//! | `f32`, `f64` | IEEE-754 bits; negative values fully complemented, others sign-flipped |
//! | `bool` | one byte, `0`/`1` |
//! | `String`, `str` | raw UTF-8 bytes |
//! | `Vec<u8>`, `[u8]` | raw bytes |
//!
//! Float encoding follows the usual memcomparable trick, which orders all finite values and the
//! infinities correctly and places `-0.0` immediately below `+0.0`. `NaN` encodes at the extremes
//! of the byte order; do not use `NaN` as an index value if you expect to range over it.

// -------------------------------------------------------------------------------------------------
//
/// Error returned when a key fails to encode or decode.
///
/// Kept separate from the value-codec errors (and cheaply cloneable) so query builders can
/// capture a failed encoding and surface it when the query actually runs.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyError {
    /// The byte string has the wrong length for the fixed-width target type.
    #[error("`{type_name}` keys are {expected} bytes, got {actual}")]
    Length {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The byte string is not valid UTF-8.
    #[error("key bytes are not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    /// The byte string is not a boolean encoding (`[0]` or `[1]`).
    #[error("key bytes do not form a boolean")]
    Boolean,
}

// -------------------------------------------------------------------------------------------------
//
/// Encodes a value into an order-preserving byte key.
///
/// Implemented for the primitive key types listed in the [module docs](self), for `str`/`[u8]`,
/// and for references to any implementor. Implement it on your own wrapper types to use them as
/// primary keys or indexed field values; the one law implementations must uphold is that byte
/// order agrees with value order.
pub trait KeyEncode {
    /// Encodes the value into its byte-key form.
    ///
    /// # Errors
    ///
    /// * Returns a [`KeyError`] if the value cannot be represented as an ordered byte key.
    fn encode_key(&self) -> Result<Vec<u8>, KeyError>;
}

/// Decodes an order-preserving byte key back into its typed value.
///
/// The inverse of [`KeyEncode`]. Core store operations never need to decode keys; this exists
/// for tooling and tests that read index buckets directly.
pub trait KeyDecode: Sized {
    /// Decodes a byte key produced by [`KeyEncode::encode_key`].
    ///
    /// # Errors
    ///
    /// * Returns a [`KeyError`] if the bytes are not a valid encoding of `Self`.
    fn decode_key(bytes: &[u8]) -> Result<Self, KeyError>;
}

impl<K: KeyEncode + ?Sized> KeyEncode for &K {
    fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
        (**self).encode_key()
    }
}

// -------------------------------------------------------------------------------------------------
//
// Fixed-width integers

/// Checks the length of a fixed-width key before decoding.
fn fixed_width<const N: usize>(type_name: &'static str, bytes: &[u8]) -> Result<[u8; N], KeyError> {
    bytes.try_into().map_err(|_| KeyError::Length {
        type_name,
        expected: N,
        actual: bytes.len(),
    })
}

macro_rules! unsigned_key {
    ($($t:ty),+) => {$(
        impl KeyEncode for $t {
            fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
                Ok(self.to_be_bytes().to_vec())
            }
        }

        impl KeyDecode for $t {
            fn decode_key(bytes: &[u8]) -> Result<Self, KeyError> {
                Ok(<$t>::from_be_bytes(fixed_width(stringify!($t), bytes)?))
            }
        }
    )+};
}

unsigned_key!(u8, u16, u32, u64, u128);

macro_rules! signed_key {
    ($($t:ty => $u:ty),+) => {$(
        impl KeyEncode for $t {
            fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
                // Flipping the sign bit shifts the value range onto the unsigned range, where
                // big-endian bytes sort correctly.
                let flipped = (*self as $u) ^ (1 << (<$t>::BITS - 1));
                Ok(flipped.to_be_bytes().to_vec())
            }
        }

        impl KeyDecode for $t {
            fn decode_key(bytes: &[u8]) -> Result<Self, KeyError> {
                let flipped = <$u>::from_be_bytes(fixed_width(stringify!($t), bytes)?);
                Ok((flipped ^ (1 << (<$t>::BITS - 1))) as $t)
            }
        }
    )+};
}

signed_key!(i8 => u8, i16 => u16, i32 => u32, i64 => u64, i128 => u128);

impl KeyEncode for usize {
    fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
        // Encoded as u64 so keys written on one platform read back on another.
        (*self as u64).encode_key()
    }
}

impl KeyDecode for usize {
    fn decode_key(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(u64::decode_key(bytes)? as Self)
    }
}

impl KeyEncode for isize {
    fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
        (*self as i64).encode_key()
    }
}

impl KeyDecode for isize {
    fn decode_key(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(i64::decode_key(bytes)? as Self)
    }
}

// -------------------------------------------------------------------------------------------------
//
// Floats

macro_rules! float_key {
    ($($t:ty => $u:ty, $sign:expr),+) => {$(
        impl KeyEncode for $t {
            fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
                let bits = self.to_bits();
                // Negative values (sign bit set) complement entirely so that more-negative
                // sorts lower; non-negative values flip the sign bit to sort above them.
                let ordered = if bits & $sign != 0 { !bits } else { bits ^ $sign };
                Ok(ordered.to_be_bytes().to_vec())
            }
        }

        impl KeyDecode for $t {
            fn decode_key(bytes: &[u8]) -> Result<Self, KeyError> {
                let ordered = <$u>::from_be_bytes(fixed_width(stringify!($t), bytes)?);
                let bits = if ordered & $sign != 0 { ordered ^ $sign } else { !ordered };
                Ok(<$t>::from_bits(bits))
            }
        }
    )+};
}

float_key!(f32 => u32, 1u32 << 31, f64 => u64, 1u64 << 63);

// -------------------------------------------------------------------------------------------------
//
// Booleans, strings, byte strings

impl KeyEncode for bool {
    fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
        Ok(vec![u8::from(*self)])
    }
}

impl KeyDecode for bool {
    fn decode_key(bytes: &[u8]) -> Result<Self, KeyError> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            _ => Err(KeyError::Boolean),
        }
    }
}

impl KeyEncode for str {
    fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
        Ok(self.as_bytes().to_vec())
    }
}

impl KeyEncode for String {
    fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
        self.as_str().encode_key()
    }
}

impl KeyDecode for String {
    fn decode_key(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(std::str::from_utf8(bytes)?.to_owned())
    }
}

impl KeyEncode for [u8] {
    fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
        Ok(self.to_vec())
    }
}

impl KeyEncode for Vec<u8> {
    fn encode_key(&self) -> Result<Vec<u8>, KeyError> {
        Ok(self.clone())
    }
}

impl KeyDecode for Vec<u8> {
    fn decode_key(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(bytes.to_vec())
    }
}

// -------------------------------------------------------------------------------------------------
//
// Unit Tests
