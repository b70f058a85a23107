//! `UbjsonEncoder` — Universal Binary JSON encoder.
//!
//! Value dispatch:
//! - `Null` → `Z`, `Bool` → `T`/`F`
//! - integers → smallest of `U`/`i`/`I`/`l`/`L`, high-precision `H` beyond
//!   the int64 range
//! - floats → `d` when in single precision range, else `D`; NaN and
//!   infinities → `Z`; subnormals → `H`
//! - strings → `S` + length + UTF-8, or `C` + byte when one byte long
//! - bytes → `[$U#` + count + raw bytes
//! - arrays/objects → `[`…`]` / `{`…`}`, or `#` + count and no end marker
//!   with `container_count`
//! - extensions → the fallback function's result

use std::io::Write;

use log::{debug, trace};
use ubjson_buffers::EncodeBuffer;

use crate::error::EncodeError;
use crate::markers::{
    ARRAY_END, ARRAY_START, BYTES_ARRAY_PREFIX, CHAR, CONTAINER_COUNT, FALSE, FLOAT32, FLOAT64,
    HIGH_PREC, NULL, OBJECT_END, OBJECT_START, STRING, TRUE,
};
use crate::numeric::{classify_float, pack_f32, pack_f64, pack_int, FloatRepr};
use crate::options::EncodeOptions;
use crate::value::{Key, Object, Value};
use crate::HighPrecision;

/// UBJSON encoder. Holds the options, so it can be built once and reused.
#[derive(Debug, Default)]
pub struct UbjsonEncoder {
    options: EncodeOptions,
}

impl UbjsonEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EncodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Encodes `value` into a new byte vector.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        let mut state = EncodeState::new(&self.options, EncodeBuffer::new());
        state.write_any(value)?;
        Ok(state.buffer.finalize()?.unwrap_or_default())
    }

    /// Encodes `value`, writing to `sink` in blocks as they fill up.
    ///
    /// On failure some bytes may already have been written.
    pub fn encode_to<W: Write>(&self, value: &Value, mut sink: W) -> Result<(), EncodeError> {
        let mut state = EncodeState::new(&self.options, EncodeBuffer::with_sink(&mut sink));
        state.write_any(value)?;
        state.buffer.finalize()?;
        Ok(())
    }
}

/// Per-call encoding state.
struct EncodeState<'o, 'w> {
    options: &'o EncodeOptions,
    buffer: EncodeBuffer<'w>,
    depth: usize,
}

impl<'o, 'w> EncodeState<'o, 'w> {
    fn new(options: &'o EncodeOptions, buffer: EncodeBuffer<'w>) -> Self {
        Self {
            options,
            buffer,
            depth: 0,
        }
    }

    fn write_any(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Null => self.write_null(),
            Value::Bool(b) => self.write_boolean(*b),
            Value::Integer(i) => self.write_integer(*i),
            Value::UInteger(u) => match i64::try_from(*u) {
                Ok(i) => self.write_integer(i),
                Err(_) => self.write_high_precision(&HighPrecision::from(*u)),
            },
            Value::BigInt(i) => match i64::try_from(*i) {
                Ok(i) => self.write_integer(i),
                Err(_) => self.write_high_precision(&HighPrecision::from(*i)),
            },
            Value::Float32(f) => self.write_f32(*f),
            Value::Float(f) => self.write_float(*f),
            Value::HighPrecision(num) => self.write_high_precision(num),
            Value::Char(c) => {
                let mut utf8 = [0u8; 4];
                self.write_str(c.encode_utf8(&mut utf8))
            }
            Value::Str(s) => self.write_str(s),
            Value::Bytes(b) => self.write_bin(b),
            Value::Array(arr) => self.nested(|s| s.write_arr(arr)),
            Value::Object(obj) => self.nested(|s| s.write_obj(obj)),
            Value::Shared(cell) => {
                // Inline containers are owned by their parent and cannot
                // contain themselves, so only shared cells are tracked. The
                // identity is claimed before locking so a cycle never
                // re-enters the lock.
                self.with_shared(cell.identity(), |s| s.write_any(&cell.read()))
            }
            Value::Extension(_) => self.write_fallback(value),
        }
    }

    fn write_null(&mut self) -> Result<(), EncodeError> {
        Ok(self.buffer.u8(NULL)?)
    }

    fn write_boolean(&mut self, b: bool) -> Result<(), EncodeError> {
        Ok(self.buffer.u8(if b { TRUE } else { FALSE })?)
    }

    fn write_integer(&mut self, int: i64) -> Result<(), EncodeError> {
        Ok(self.buffer.write(pack_int(int).as_bytes())?)
    }

    /// Lengths and counts use the same integer encoding as values.
    fn write_length(&mut self, len: usize) -> Result<(), EncodeError> {
        // usize lengths of in-memory data never exceed isize::MAX
        self.write_integer(len as i64)
    }

    fn write_f32(&mut self, float: f32) -> Result<(), EncodeError> {
        if !float.is_finite() {
            return self.write_null();
        }
        self.buffer.u8(FLOAT32)?;
        Ok(self.buffer.write(&pack_f32(float))?)
    }

    fn write_float(&mut self, float: f64) -> Result<(), EncodeError> {
        match classify_float(float, self.options.no_float32) {
            FloatRepr::Null => self.write_null(),
            FloatRepr::Float32 => {
                self.buffer.u8(FLOAT32)?;
                Ok(self.buffer.write(&pack_f32(float as f32))?)
            }
            FloatRepr::Float64 => {
                self.buffer.u8(FLOAT64)?;
                Ok(self.buffer.write(&pack_f64(float))?)
            }
            FloatRepr::HighPrecision => self.write_high_precision(&HighPrecision::from_f64(float)),
        }
    }

    /// `H` + length + canonical string; non-finite numbers become null.
    fn write_high_precision(&mut self, num: &HighPrecision) -> Result<(), EncodeError> {
        if !num.is_finite() {
            return self.write_null();
        }
        let repr = num.to_string();
        self.buffer.u8(HIGH_PREC)?;
        self.write_length(repr.len())?;
        Ok(self.buffer.write(repr.as_bytes())?)
    }

    /// `S` + length + UTF-8 bytes, or `C` + byte for one byte strings.
    fn write_str(&mut self, s: &str) -> Result<(), EncodeError> {
        let raw = s.as_bytes();
        if raw.len() == 1 {
            self.buffer.u8(CHAR)?;
        } else {
            self.buffer.u8(STRING)?;
            self.write_length(raw.len())?;
        }
        Ok(self.buffer.write(raw)?)
    }

    /// Object key: length + UTF-8 bytes, no marker.
    fn write_key(&mut self, key: &str) -> Result<(), EncodeError> {
        self.write_length(key.len())?;
        Ok(self.buffer.write(key.as_bytes())?)
    }

    fn write_bin(&mut self, buf: &[u8]) -> Result<(), EncodeError> {
        self.buffer.write(&BYTES_ARRAY_PREFIX)?;
        self.write_length(buf.len())?;
        // no ARRAY_END since the count was given
        Ok(self.buffer.write(buf)?)
    }

    fn write_arr(&mut self, arr: &[Value]) -> Result<(), EncodeError> {
        self.buffer.u8(ARRAY_START)?;
        if self.options.container_count {
            self.buffer.u8(CONTAINER_COUNT)?;
            self.write_length(arr.len())?;
        }
        for item in arr {
            self.write_any(item)?;
        }
        if !self.options.container_count {
            self.buffer.u8(ARRAY_END)?;
        }
        Ok(())
    }

    fn write_obj(&mut self, obj: &Object) -> Result<(), EncodeError> {
        let mut entries: Vec<(&Key, &Value)> = obj.iter().collect();
        if self.options.sort_keys {
            entries.sort_by(|a, b| a.0.cmp(b.0));
        }
        self.buffer.u8(OBJECT_START)?;
        if self.options.container_count {
            self.buffer.u8(CONTAINER_COUNT)?;
            self.write_length(entries.len())?;
        }
        for (key, val) in entries {
            self.write_key(key)?;
            self.write_any(val)?;
        }
        if !self.options.container_count {
            self.buffer.u8(OBJECT_END)?;
        }
        Ok(())
    }

    fn write_fallback(&mut self, value: &Value) -> Result<(), EncodeError> {
        let Some(fallback) = self.options.fallback.as_ref() else {
            return Err(EncodeError::Unencodable(value.kind()));
        };
        debug!("encoding {} value via fallback", value.kind());
        let replacement = fallback(value).map_err(EncodeError::Fallback)?;
        self.nested(|s| s.write_any(&replacement))
    }

    /// Runs `f` for a shared cell, failing if `identity` is already being
    /// encoded further up. The identity is released on every path.
    fn with_shared<F>(&mut self, identity: usize, f: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut Self) -> Result<(), EncodeError>,
    {
        if !self.buffer.enter(identity) {
            trace!("circular reference at {identity:#x}");
            return Err(EncodeError::CircularReference);
        }
        let result = self.nested(f);
        self.buffer.leave(identity);
        result
    }

    fn nested<F>(&mut self, f: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut Self) -> Result<(), EncodeError>,
    {
        if self.depth >= self.options.max_depth {
            debug!("encode depth limit of {} reached", self.options.max_depth);
            return Err(EncodeError::DepthLimitExceeded(self.options.max_depth));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Extension, Shared};

    fn enc(value: &Value) -> Vec<u8> {
        UbjsonEncoder::new().encode(value).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(enc(&Value::Null), b"Z");
        assert_eq!(enc(&Value::Bool(true)), b"T");
        assert_eq!(enc(&Value::Bool(false)), b"F");
        assert_eq!(enc(&Value::from("a")), b"Ca");
        assert_eq!(enc(&Value::from("")), b"SU\x00");
        assert_eq!(enc(&Value::from("ab")), b"SU\x02ab");
        assert_eq!(enc(&Value::Char('é')), b"SU\x02\xc3\xa9");
    }

    #[test]
    fn test_wide_integers_use_high_precision() {
        assert_eq!(enc(&Value::UInteger(u64::MAX)), b"HU\x1418446744073709551615");
        assert_eq!(enc(&Value::UInteger(7)), b"U\x07");
        assert_eq!(enc(&Value::BigInt(-129)), b"I\xff\x7f");
        let min = i128::from(i64::MIN) - 1;
        assert_eq!(enc(&Value::BigInt(min)), b"HU\x14-9223372036854775809");
    }

    #[test]
    fn test_float32_values() {
        assert_eq!(enc(&Value::Float32(1.0)), b"d\x3f\x80\x00\x00");
        assert_eq!(enc(&Value::Float32(f32::NAN)), b"Z");
    }

    #[test]
    fn test_non_finite_high_precision_is_null() {
        assert_eq!(enc(&Value::HighPrecision(HighPrecision::nan())), b"Z");
        assert_eq!(enc(&Value::HighPrecision("1.5".parse().unwrap())), b"HU\x031.5");
    }

    #[test]
    fn test_shared_values_encode_inline() {
        let cell = Shared::new(Value::from(1));
        let value = Value::Array(vec![Value::Shared(cell.clone()), Value::Shared(cell)]);
        assert_eq!(enc(&value), b"[U\x01U\x01]");
    }

    #[test]
    fn test_identity_released_after_error() {
        let cell = Shared::new(Value::from(Extension::new(1, Value::Null)));
        let value = Value::Array(vec![Value::Shared(cell.clone())]);
        let encoder = UbjsonEncoder::new();
        assert!(matches!(
            encoder.encode(&value),
            Err(EncodeError::Unencodable("extension"))
        ));
        cell.replace(Value::Null);
        assert_eq!(encoder.encode(&value).unwrap(), b"[Z]");
    }

    #[test]
    fn test_fallback_counts_towards_depth() {
        let opts = EncodeOptions::default()
            .with_max_depth(1)
            .with_fallback(|_| Ok(Value::Array(vec![])));
        let encoder = UbjsonEncoder::with_options(opts);
        let ext = Value::from(Extension::new(0, Value::Null));
        assert!(matches!(
            encoder.encode(&ext),
            Err(EncodeError::DepthLimitExceeded(1))
        ));
    }
}
