//! MessagePack payload codec using `rmp-serde`.
//!
//! Frame payloads are self-describing MessagePack documents. Encoding uses
//! `to_vec_named` so enum variants and struct fields are written with their
//! names, keeping the wire format readable to any MessagePack decoder rather
//! than depending on field order.

use crate::error::Result;

/// MessagePack codec for frame payloads.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MessagePack bytes.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MessagePack bytes to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
