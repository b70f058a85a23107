use proptest::prelude::*;
use serde_json::json;
use ubjson::numeric::int_marker;
use ubjson::{
    decode, encode, DecodeError, EncodeError, EncodeOptions, Extension, HighPrecision, Shared,
    UbjsonDecoder, UbjsonEncoder, Value,
};

fn enc_with(opts: EncodeOptions, value: &Value) -> Vec<u8> {
    UbjsonEncoder::with_options(opts).encode(value).expect("encode")
}

fn with_marker(marker: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![marker];
    out.extend_from_slice(payload);
    out
}

#[test]
fn integer_width_matrix() {
    let cases: &[(i64, &[u8])] = &[
        (0, b"U\x00"),
        (127, b"U\x7f"),
        (128, b"U\x80"),
        (255, b"U\xff"),
        (256, b"I\x01\x00"),
        (-1, b"i\xff"),
        (-128, b"i\x80"),
        (-129, b"I\xff\x7f"),
        (32767, b"I\x7f\xff"),
        (32768, b"l\x00\x00\x80\x00"),
        (-32769, b"l\xff\xff\x7f\xff"),
        (2147483647, b"l\x7f\xff\xff\xff"),
        (2147483648, b"L\x00\x00\x00\x00\x80\x00\x00\x00"),
        (i64::MIN, b"L\x80\x00\x00\x00\x00\x00\x00\x00"),
    ];
    for &(num, wire) in cases {
        assert_eq!(encode(&Value::from(num)).unwrap(), wire, "{num}");
        assert_eq!(decode(wire).unwrap(), Value::Integer(num), "{num}");
    }
}

#[test]
fn float_selection_matrix() {
    assert_eq!(encode(&Value::from(1.5)).unwrap(), b"d\x3f\xc0\x00\x00");
    assert_eq!(encode(&Value::from(0.0)).unwrap(), b"d\x00\x00\x00\x00");
    assert_eq!(
        encode(&Value::from(1e39)).unwrap(),
        with_marker(b'D', &1e39f64.to_be_bytes())
    );
    assert_eq!(
        encode(&Value::from(1e-39)).unwrap(),
        with_marker(b'D', &1e-39f64.to_be_bytes())
    );
    assert_eq!(
        enc_with(EncodeOptions::default().with_no_float32(true), &Value::from(1.5)),
        b"D\x3f\xf8\x00\x00\x00\x00\x00\x00"
    );
    for special in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert_eq!(encode(&Value::from(special)).unwrap(), b"Z");
    }

    assert_eq!(decode(b"d\x3f\xc0\x00\x00").unwrap(), Value::Float32(1.5));
    assert_eq!(
        decode(b"D\x3f\xf8\x00\x00\x00\x00\x00\x00").unwrap(),
        Value::Float(1.5)
    );
}

#[test]
fn subnormal_goes_through_high_precision() {
    let tiny = f64::from_bits(1);
    let wire = encode(&Value::from(tiny)).unwrap();
    assert_eq!(wire, b"HU\x065E-324");
    let Value::HighPrecision(num) = decode(&wire).unwrap() else {
        panic!("expected a high-precision value");
    };
    assert_eq!(num.to_f64().to_bits(), 1);
}

#[test]
fn high_precision_matrix() {
    let num: HighPrecision = "-1.25e400".parse().unwrap();
    let wire = encode(&Value::HighPrecision(num.clone())).unwrap();
    assert_eq!(wire, b"HU\x0a-1.25E+400");
    assert_eq!(decode(&wire).unwrap(), Value::HighPrecision(num));
    assert_eq!(
        encode(&Value::HighPrecision(HighPrecision::infinity(true))).unwrap(),
        b"Z"
    );
}

#[test]
fn container_shapes() {
    let value = Value::from(json!([1, [], {"a": null}]));
    assert_eq!(encode(&value).unwrap(), b"[U\x01[]{U\x01aZ}]");

    let counted = enc_with(EncodeOptions::default().with_container_count(true), &value);
    assert_eq!(counted, b"[#U\x03U\x01[#U\x00{#U\x01U\x01aZ");
    assert_eq!(decode(&counted).unwrap(), value);

    assert_eq!(
        decode(b"[#U\x03U\x01U\x02U\x03").unwrap(),
        Value::from(json!([1, 2, 3]))
    );
    assert_eq!(
        encode(&Value::Bytes(b"hello".to_vec())).unwrap(),
        b"[$U#U\x05hello"
    );
}

#[test]
fn sort_keys_orders_entries() {
    let value = Value::from(json!({"b": 1, "a": 2, "c": 3}));
    assert_eq!(
        encode(&value).unwrap(),
        b"{U\x01bU\x01U\x01aU\x02U\x01cU\x03}"
    );
    assert_eq!(
        enc_with(EncodeOptions::default().with_sort_keys(true), &value),
        b"{U\x01aU\x02U\x01bU\x01U\x01cU\x03}"
    );
}

#[test]
fn circular_reference_is_detected() {
    let cell = Shared::new(Value::Array(vec![]));
    cell.replace(Value::Array(vec![Value::Shared(cell.clone())]));
    let value = Value::object([("loop", Value::Shared(cell.clone()))]);
    assert!(matches!(encode(&value), Err(EncodeError::CircularReference)));
    assert!(matches!(
        serde_json::Value::try_from(&value),
        Err(EncodeError::CircularReference)
    ));
    // break the cycle so the cell is freed
    cell.replace(Value::Null);
    assert_eq!(encode(&value).unwrap(), b"{U\x04loopZ}");
}

#[test]
fn fallback_converts_extensions() {
    let ext = Value::Array(vec![Extension::new(7, Value::from("x")).into()]);
    assert!(matches!(
        encode(&ext),
        Err(EncodeError::Unencodable("extension"))
    ));

    let opts = EncodeOptions::default().with_fallback(|value| match value {
        Value::Extension(ext) => Ok(Value::Array(vec![Value::from(ext.tag), ext.value.clone()])),
        _ => Err("unexpected".into()),
    });
    assert_eq!(enc_with(opts, &ext), b"[[U\x07Cx]]");

    let failing = EncodeOptions::default().with_fallback(|_| Err("no conversion".into()));
    let err = UbjsonEncoder::with_options(failing).encode(&ext).unwrap_err();
    assert!(matches!(err, EncodeError::Fallback(_)));
    assert_eq!(err.to_string(), "no conversion");
}

#[test]
fn noop_is_skipped_only_between_untyped_elements() {
    assert_eq!(
        decode(b"[NNU\x01N]").unwrap(),
        Value::Array(vec![Value::Integer(1)])
    );
    assert!(matches!(
        decode(b"N"),
        Err(DecodeError::InvalidMarker { marker: b'N', offset: 1 })
    ));
    // inside a uint8-typed container N is just a byte value
    assert_eq!(decode(b"[$U#U\x01N").unwrap(), Value::Bytes(vec![b'N']));
}

#[test]
fn error_messages_carry_offsets() {
    let err = decode(b"[U\x01x").unwrap_err();
    assert_eq!(err.to_string(), "invalid marker 0x78 (at byte 4)");
    assert_eq!(err.offset(), Some(4));

    let err = decode(b"SU\x0a").unwrap_err();
    assert_eq!(err.offset(), Some(3));
    assert!(err.to_string().ends_with("(at byte 3)"));
}

#[test]
fn trailing_input_is_ignored() {
    let decoder = UbjsonDecoder::new();
    assert_eq!(decoder.decode(b"TZZ").unwrap(), Value::Bool(true));
    let (value, used) = decoder.decode_with_consumed(b"SU\x02hiT").unwrap();
    assert_eq!(value, Value::from("hi"));
    assert_eq!(used, 5);
}

#[test]
fn json_interop_matrix() {
    let doc = json!({
        "name": "ubjson",
        "tags": ["a", "bc"],
        "nested": {"n": -129, "f": 0.25, "ok": false, "none": null},
        "big": 18446744073709551615u64
    });
    let value = Value::from(doc.clone());
    let back = decode(&encode(&value).unwrap()).unwrap();
    assert_eq!(serde_json::Value::try_from(&back).unwrap(), doc);
}

proptest! {
    #[test]
    fn integers_roundtrip_with_smallest_marker(num in any::<i64>()) {
        let wire = encode(&Value::from(num)).unwrap();
        prop_assert_eq!(wire[0], int_marker(num));
        prop_assert_eq!(decode(&wire).unwrap(), Value::Integer(num));
    }

    #[test]
    fn strings_roundtrip(text in ".{0,40}") {
        // one-byte strings come back as Char, so compare through JSON
        let back = decode(&encode(&Value::from(text.as_str())).unwrap()).unwrap();
        prop_assert_eq!(
            serde_json::Value::try_from(&back).unwrap(),
            serde_json::Value::String(text)
        );
    }
}
