//! MsgPack codec using `rmp-serde`, used for serialized-object opaque
//! packages.
//!
//! Always `to_vec_named`: structs travel as maps keyed by field name, so a
//! peer with a newer definition of a type can still read the fields it
//! knows.
//!
//! # Example
//!
//! ```
//! use uda_core::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Probe {
//!     id: u32,
//!     label: String,
//! }
//!
//! let probe = Probe { id: 42, label: "IP".to_string() };
//! let encoded = MsgPackCodec::encode(&probe).unwrap();
//! let decoded: Probe = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, probe);
//! ```

use crate::error::Result;

/// Serializer for object-package payloads.
///
/// The opaque codec frames the result as a length-prefixed byte string, so
/// the MessagePack document itself carries no length or version.
pub struct MsgPackCodec;

impl MsgPackCodec {
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Deserialize a complete document; unknown map keys are skipped.
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
