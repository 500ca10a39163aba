//! MessagePack codec.
//!
//! Payloads are encoded with field names (maps, not positional arrays) so
//! host servers written against the event names can read them without
//! sharing Rust type layouts. Decoding accepts either form.

use arena_core::Inbound;
use serde::{Deserialize, Serialize};

use crate::error::NetError;

/// Encode a value as named-field MessagePack.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// # Errors
///
/// Returns [`NetError::Decode`] if the bytes are not a valid `T`.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Decode a message received on the stimulus subject.
///
/// # Errors
///
/// Returns [`NetError::Decode`] if the payload is not an [`Inbound`].
pub fn decode_stimulus(bytes: &[u8]) -> Result<Inbound, NetError> {
    decode(bytes)
}
