//! # Strata Codec
//!
//! CBOR encoding/decoding for Strata snapshots.
//!
//! Every structure in `strata_core` can describe its full state as a plain
//! snapshot value. Host stores that only move opaque bytes use this crate to
//! turn those snapshots into CBOR and back.
//!
//! Encoding is deterministic: the same snapshot always produces the same
//! bytes, so hosts may compare or hash encoded snapshots directly.
//!
//! ## Usage
//!
//! ```
//! use strata_codec::{from_cbor, to_cbor};
//!
//! let layers: Vec<(u64, Vec<u32>)> = vec![(1, vec![4]), (0, vec![1, 2, 3])];
//! let bytes = to_cbor(&layers).unwrap();
//!
//! let decoded: Vec<(u64, Vec<u32>)> = from_cbor(&bytes).unwrap();
//! assert_eq!(layers, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;

pub use error::{CodecError, CodecResult};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value's `Serialize` implementation fails.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

/// Decode a value from CBOR bytes.
///
/// The input must contain exactly one value.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR, do not match the
/// shape of `T`, or contain trailing data.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    let mut reader = bytes;
    let value = ciborium::from_reader(&mut reader)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: reader.len(),
        });
    }
    Ok(value)
}

/// Trait for types that can be encoded to CBOR.
pub trait Encode {
    /// Encode this value to CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl<T: Serialize> Encode for T {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }
}

impl<T: DeserializeOwned> Decode for T {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct LayerState {
        generation: u64,
        items: Vec<String>,
    }

    #[test]
    fn roundtrip_struct() {
        let state = LayerState {
            generation: 7,
            items: vec!["a".into(), "b".into()],
        };
        let bytes = to_cbor(&state).unwrap();
        let decoded: LayerState = from_cbor(&bytes).unwrap();
        assert_eq!(state, decoded);
    }

    #[test]
    fn trait_roundtrip() {
        let items = vec![1u32, 2, 3];
        let bytes = items.encode().unwrap();
        assert_eq!(Vec::<u32>::decode(&bytes).unwrap(), items);
    }

    #[test]
    fn decode_rejects_wrong_shape() {
        let bytes = to_cbor(&"not a layer").unwrap();
        let err = from_cbor::<LayerState>(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::DecodingFailed { .. }));
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let bytes = to_cbor(&vec![1u64, 2, 3, 4]).unwrap();
        let err = from_cbor::<Vec<u64>>(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, CodecError::DecodingFailed { .. }));
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = to_cbor(&5u8).unwrap();
        bytes.push(0x00);
        assert_eq!(
            from_cbor::<u8>(&bytes),
            Err(CodecError::TrailingBytes { remaining: 1 })
        );
    }

    proptest! {
        #[test]
        fn encoding_is_deterministic(items in prop::collection::vec(any::<i64>(), 0..64)) {
            prop_assert_eq!(to_cbor(&items).unwrap(), to_cbor(&items).unwrap());
        }
    }
}
