//! # Wire Codec
//!
//! Reversible XOR transform applied to every message on the wire, in both
//! directions. Each byte is combined with a byte of a repeating shared key, so
//! encoding and decoding are the same operation.
//!
//! This is obfuscation only. Anyone holding the key (which ships in the
//! default configuration) can read the traffic.

use crate::common::connection::WireError;

/// Key used when the configuration does not override it.
pub const DEFAULT_KEY: &str = "echonull_secure_key_2024";

/// Repeating-key XOR codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorCodec {
    key: Vec<u8>,
}

impl XorCodec {
    /// Build a codec from a key.
    ///
    /// # Errors
    /// Returns [`WireError::EmptyKey`] when `key` is empty, since a zero-length
    /// key has no defined cycle.
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, WireError> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(WireError::EmptyKey);
        }
        Ok(Self { key: key.to_vec() })
    }

    /// Transform `input` into a new buffer.
    ///
    /// Applying this twice returns the original bytes. An empty input yields an
    /// empty output.
    pub fn transform(&self, input: &[u8]) -> Vec<u8> {
        input
            .iter()
            .zip(self.key.iter().cycle())
            .map(|(byte, k)| byte ^ k)
            .collect()
    }

    /// Transform an owned buffer without allocating.
    pub fn apply_in_place(&self, buf: &mut [u8]) {
        for (byte, k) in buf.iter_mut().zip(self.key.iter().cycle()) {
            *byte ^= k;
        }
    }
}

impl Default for XorCodec {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.as_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_input_is_noop() {
        let codec = XorCodec::default();
        assert!(codec.transform(&[]).is_empty());
    }

    #[test]
    fn test_key_cycles_past_its_length() {
        let codec = XorCodec::new([0x01u8, 0x02]).unwrap();
        assert_eq!(codec.transform(&[0, 0, 0, 0, 0]), vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_encoded_text_differs_from_plaintext() {
        let codec = XorCodec::default();
        let encoded = codec.transform(b"GET_CONTACTS");
        assert_ne!(encoded, b"GET_CONTACTS".to_vec());
        assert_eq!(codec.transform(&encoded), b"GET_CONTACTS".to_vec());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(XorCodec::new(""), Err(WireError::EmptyKey)));
    }

    proptest! {
        #[test]
        fn transform_is_its_own_inverse(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            key in proptest::collection::vec(any::<u8>(), 1..64),
        ) {
            let codec = XorCodec::new(&key).unwrap();
            prop_assert_eq!(codec.transform(&codec.transform(&data)), data.clone());

            let mut buf = data.clone();
            codec.apply_in_place(&mut buf);
            prop_assert_eq!(buf, codec.transform(&data));
        }
    }
}
