//! Universal Binary JSON (draft 12) encoder and decoder.
//!
//! ```
//! use ubjson::{decode, encode, Value};
//!
//! let value = Value::object([("a", Value::from(1)), ("b", Value::from("xy"))]);
//! let bytes = encode(&value).unwrap();
//! assert_eq!(bytes, b"{U\x01aU\x01U\x01bSU\x02xy}");
//! assert_eq!(decode(&bytes).unwrap(), value);
//! ```
//!
//! Configured engines are built from [`EncodeOptions`] / [`DecodeOptions`]
//! with [`UbjsonEncoder::with_options`] and [`UbjsonDecoder::with_options`].

use std::io::{Read, Seek, Write};

mod decimal;
mod decoder;
mod encoder;
mod error;
mod options;
mod value;

pub mod markers;
pub mod numeric;

pub use decimal::HighPrecision;
pub use decoder::UbjsonDecoder;
pub use encoder::UbjsonEncoder;
pub use error::{DecodeError, EncodeError, HookError, ParseHighPrecisionError};
pub use options::{
    DecodeOptions, EncodeOptions, Fallback, ObjectHook, ObjectHookFn, PairsHookFn,
    DEFAULT_MAX_DEPTH,
};
pub use value::{Extension, Key, Object, Shared, Value};

/// Encodes `value` with default options.
pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    UbjsonEncoder::new().encode(value)
}

/// Encodes `value` with default options into `sink`.
pub fn encode_to<W: Write>(value: &Value, sink: W) -> Result<(), EncodeError> {
    UbjsonEncoder::new().encode_to(value, sink)
}

/// Decodes the first value in `input` with default options.
pub fn decode(input: &[u8]) -> Result<Value, DecodeError> {
    UbjsonDecoder::new().decode(input)
}

/// Decodes one value from `reader` with default options.
pub fn decode_reader<R: Read>(reader: R) -> Result<Value, DecodeError> {
    UbjsonDecoder::new().decode_reader(reader)
}

/// Decodes one value from a seekable `reader` with default options, leaving
/// it positioned just after the value.
pub fn decode_seekable<R: Read + Seek>(reader: R) -> Result<Value, DecodeError> {
    UbjsonDecoder::new().decode_seekable(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn roundtrip(value: &Value) -> Value {
        decode(&encode(value).expect("encode")).expect("decode")
    }

    #[test]
    fn json_roundtrip_matrix() {
        let cases = vec![
            json!(null),
            json!(true),
            json!(123),
            json!(-70000),
            json!(1.5),
            json!("hello"),
            json!([1, 2, 3]),
            json!({"a": 1, "b": [true, null, "x"], "c": {}}),
        ];
        for case in cases {
            let back = roundtrip(&Value::from(case.clone()));
            assert_eq!(serde_json::Value::try_from(&back).unwrap(), case);
        }
    }

    #[test]
    fn container_count_roundtrip() {
        let encoder =
            UbjsonEncoder::with_options(EncodeOptions::default().with_container_count(true));
        let value = Value::from(json!({"k": [1, "two", [], {}], "z": null}));
        let bytes = encoder.encode(&value).unwrap();
        assert_eq!(bytes[..3], *b"{#U");
        assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn bytes_and_no_bytes() {
        let bytes = encode(&Value::Bytes(vec![1, 2, 255])).unwrap();
        assert_eq!(bytes, b"[$U#U\x03\x01\x02\xff");
        assert_eq!(decode(&bytes).unwrap(), Value::Bytes(vec![1, 2, 255]));

        let decoder = UbjsonDecoder::with_options(DecodeOptions::default().with_no_bytes(true));
        assert_eq!(
            decoder.decode(&bytes).unwrap(),
            Value::Array(vec![1.into(), 2.into(), 255.into()])
        );
    }

    #[test]
    fn object_hooks() {
        let input = b"{U\x01aU\x01U\x01bU\x02U\x01aU\x03}";

        let decoder = UbjsonDecoder::with_options(
            DecodeOptions::default().with_object_hook(|obj| Ok(Value::from(obj.len() as u64))),
        );
        assert_eq!(decoder.decode(input).unwrap(), Value::UInteger(2));

        let decoder =
            UbjsonDecoder::with_options(DecodeOptions::default().with_object_pairs_hook(|pairs| {
                let keys: Vec<Value> = pairs.iter().map(|(k, _)| Value::from(&**k)).collect();
                Ok(Value::Array(keys))
            }));
        assert_eq!(
            decoder.decode(input).unwrap(),
            Value::Array(vec!["a".into(), "b".into(), "a".into()])
        );

        let decoder = UbjsonDecoder::with_options(
            DecodeOptions::default().with_object_hook(|_| Err("rejected".into())),
        );
        let err = decoder.decode(input).unwrap_err();
        assert!(matches!(err, DecodeError::Hook(_)));
        assert_eq!(err.to_string(), "rejected");
    }

    #[test]
    fn interned_keys_share_allocation() {
        let input = b"[{U\x03keyZ}{U\x03keyZ}]";
        let decoder =
            UbjsonDecoder::with_options(DecodeOptions::default().with_intern_object_keys(true));
        let value = decoder.decode(input).unwrap();
        let list = value.as_array().unwrap();
        let first = list[0].as_object().unwrap().keys().next().unwrap();
        let second = list[1].as_object().unwrap().keys().next().unwrap();
        assert!(Arc::ptr_eq(first, second));

        let value = decode(input).unwrap();
        let list = value.as_array().unwrap();
        let first = list[0].as_object().unwrap().keys().next().unwrap();
        let second = list[1].as_object().unwrap().keys().next().unwrap();
        assert!(!Arc::ptr_eq(first, second));
    }

    #[test]
    fn depth_limit_both_directions() {
        let mut value = Value::Null;
        for _ in 0..10 {
            value = Value::Array(vec![value]);
        }
        let encoder = UbjsonEncoder::with_options(EncodeOptions::default().with_max_depth(5));
        assert!(matches!(
            encoder.encode(&value),
            Err(EncodeError::DepthLimitExceeded(5))
        ));

        let bytes = encode(&value).unwrap();
        let decoder = UbjsonDecoder::with_options(DecodeOptions::default().with_max_depth(5));
        assert!(matches!(
            decoder.decode(&bytes),
            Err(DecodeError::DepthLimitExceeded { limit: 5, offset: 6 })
        ));
        assert_eq!(decode(&bytes).unwrap(), value);
    }

    /// Runs `f` on a thread with a 2 MiB stack, the usual default for
    /// spawned threads.
    fn on_small_stack<T, F>(f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(f)
            .expect("spawn")
            .join()
            .expect("decoder thread panicked")
    }

    #[test]
    fn deep_nesting_fails_cleanly_on_small_stack() {
        let result = on_small_stack(|| decode(&vec![b'['; 100_000]));
        assert!(matches!(
            result,
            Err(DecodeError::DepthLimitExceeded { limit: DEFAULT_MAX_DEPTH, offset: 513 })
        ));

        // {"k": {"k": ...}} with one 4 byte prefix per level
        let result = on_small_stack(|| decode(&b"{U\x01k".repeat(600)));
        assert!(matches!(
            result,
            Err(DecodeError::DepthLimitExceeded { limit: DEFAULT_MAX_DEPTH, offset: 2049 })
        ));
    }

    #[test]
    fn default_depth_limit_is_reachable_on_small_stack() {
        let depth = on_small_stack(|| {
            let mut input = vec![b'['; DEFAULT_MAX_DEPTH];
            input.extend(std::iter::repeat(b']').take(DEFAULT_MAX_DEPTH));
            let mut value = decode(&input).expect("decode at the depth limit");
            let mut depth = 0;
            while let Value::Array(mut items) = value {
                depth += 1;
                value = items.pop().unwrap_or(Value::Null);
            }
            depth
        });
        assert_eq!(depth, DEFAULT_MAX_DEPTH);

        let result = on_small_stack(|| {
            let mut input = vec![b'['; DEFAULT_MAX_DEPTH + 1];
            input.extend(std::iter::repeat(b']').take(DEFAULT_MAX_DEPTH + 1));
            decode(&input)
        });
        assert!(matches!(
            result,
            Err(DecodeError::DepthLimitExceeded { limit: DEFAULT_MAX_DEPTH, offset: 513 })
        ));
    }
}
