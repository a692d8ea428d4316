//! Helpers for converting values to and from hex strings, and serde adapters
//! for byte-valued fields

use serde::{Deserialize, Deserializer, Serializer, de::Error as DeError};

/// Convert a byte array to a hex string
pub fn bytes_to_hex_string(bytes: &[u8]) -> String {
    let encoded = hex::encode(bytes);
    format!("0x{encoded}")
}

/// Convert a hex string to a byte array
pub fn bytes_from_hex_string(hex: &str) -> Result<Vec<u8>, String> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    hex::decode(hex).map_err(|e| format!("error deserializing bytes from hex string: {e}"))
}

/// Convert a hex string to a fixed length byte array
pub fn array_from_hex_string<const N: usize>(hex: &str) -> Result<[u8; N], String> {
    let bytes = bytes_from_hex_string(hex)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| format!("expected {N} bytes, got {len}"))
}

/// Serde adapter for fixed length byte arrays, encoded as 0x-prefixed hex
pub mod hex_array {
    use super::*;

    /// Serialize a byte array as a hex string
    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        s: S,
    ) -> Result<S::Ok, S::Error> {
        s.serialize_str(&bytes_to_hex_string(bytes))
    }

    /// Deserialize a byte array from a hex string
    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        d: D,
    ) -> Result<[u8; N], D::Error> {
        let hex = String::deserialize(d)?;
        array_from_hex_string(&hex).map_err(D::Error::custom)
    }
}

/// Serde adapter for variable length byte vectors, encoded as 0x-prefixed hex
pub mod hex_bytes {
    use super::*;

    /// Serialize a byte vector as a hex string
    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&bytes_to_hex_string(bytes))
    }

    /// Deserialize a byte vector from a hex string
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let hex = String::deserialize(d)?;
        bytes_from_hex_string(&hex).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use serde::{Deserialize, Serialize};

    use super::*;

    /// A wrapper used to exercise the serde adapters
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct Wrapper {
        /// A fixed length field
        #[serde(with = "hex_array")]
        fixed: [u8; 4],
        /// A variable length field
        #[serde(with = "hex_bytes")]
        var: Vec<u8>,
    }

    /// Tests that unprefixed hex is accepted
    #[test]
    fn test_unprefixed_hex() {
        let bytes = bytes_from_hex_string("deadbeef").unwrap();
        assert_eq!(bytes, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    /// Tests the serde adapters against a hand-written json value
    #[test]
    fn test_serde_adapters() {
        let json = r#"{"fixed":"0x01020304","var":"0xff"}"#;
        let parsed: Wrapper = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, Wrapper { fixed: [1, 2, 3, 4], var: vec![0xff] });
        assert_eq!(serde_json::to_string(&parsed).unwrap(), json);
    }

    /// Tests that a length mismatch is rejected
    #[test]
    fn test_wrong_length() {
        let res = array_from_hex_string::<4>("0x0102");
        assert!(res.is_err());
    }
}
