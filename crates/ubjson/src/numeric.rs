//! Fixed-width numeric packing.
//!
//! All multi-byte numbers are big-endian on the wire.

use crate::markers::{INT16, INT32, INT64, INT8, UINT8};

/// Smallest positive magnitude written as float32.
pub const FLOAT32_MIN_MAGNITUDE: f64 = 1.18e-38;
/// Largest magnitude written as float32.
pub const FLOAT32_MAX_MAGNITUDE: f64 = 3.4e38;

/// An integer together with its marker, ready to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedInt {
    bytes: [u8; 9],
    len: usize,
}

impl PackedInt {
    pub fn marker(&self) -> u8 {
        self.bytes[0]
    }

    /// Marker followed by the payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Picks the smallest integer marker able to hold `num`.
///
/// Non-negative values prefer uint8, then the signed widths; negative
/// values use the signed widths only.
pub fn int_marker(num: i64) -> u8 {
    if num >= 0 {
        if num < 1 << 8 {
            UINT8
        } else if num < 1 << 15 {
            INT16
        } else if num < 1 << 31 {
            INT32
        } else {
            INT64
        }
    } else if num >= -(1 << 7) {
        INT8
    } else if num >= -(1 << 15) {
        INT16
    } else if num >= -(1 << 31) {
        INT32
    } else {
        INT64
    }
}

/// Packs `num` using [`int_marker`].
pub fn pack_int(num: i64) -> PackedInt {
    let marker = int_marker(num);
    let mut bytes = [0u8; 9];
    bytes[0] = marker;
    let len = match marker {
        UINT8 => {
            bytes[1] = num as u8;
            2
        }
        INT8 => {
            bytes[1] = num as i8 as u8;
            2
        }
        INT16 => {
            bytes[1..3].copy_from_slice(&(num as i16).to_be_bytes());
            3
        }
        INT32 => {
            bytes[1..5].copy_from_slice(&(num as i32).to_be_bytes());
            5
        }
        _ => {
            bytes[1..9].copy_from_slice(&num.to_be_bytes());
            9
        }
    };
    PackedInt { bytes, len }
}

/// Payload width of an integer marker.
pub fn int_width(marker: u8) -> Option<usize> {
    match marker {
        INT8 | UINT8 => Some(1),
        INT16 => Some(2),
        INT32 => Some(4),
        INT64 => Some(8),
        _ => None,
    }
}

/// Decodes an integer payload. `raw` must be exactly [`int_width`] bytes.
pub fn unpack_int(marker: u8, raw: &[u8]) -> Option<i64> {
    Some(match marker {
        UINT8 => *raw.first()? as i64,
        INT8 => *raw.first()? as i8 as i64,
        INT16 => i16::from_be_bytes(raw.try_into().ok()?) as i64,
        INT32 => i32::from_be_bytes(raw.try_into().ok()?) as i64,
        INT64 => i64::from_be_bytes(raw.try_into().ok()?),
        _ => return None,
    })
}

/// How a float is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatRepr {
    /// NaN and infinities have no float encoding and become null.
    Null,
    Float32,
    Float64,
    /// Subnormals go through the high-precision path.
    HighPrecision,
}

/// Chooses the representation of `num`.
pub fn classify_float(num: f64, no_float32: bool) -> FloatRepr {
    use std::num::FpCategory;

    match num.classify() {
        FpCategory::Nan | FpCategory::Infinite => FloatRepr::Null,
        FpCategory::Zero => FloatRepr::Float32,
        FpCategory::Subnormal => FloatRepr::HighPrecision,
        FpCategory::Normal => {
            let abs = num.abs();
            if !no_float32 && (FLOAT32_MIN_MAGNITUDE..=FLOAT32_MAX_MAGNITUDE).contains(&abs) {
                FloatRepr::Float32
            } else {
                FloatRepr::Float64
            }
        }
    }
}

#[inline]
pub fn pack_f32(num: f32) -> [u8; 4] {
    num.to_be_bytes()
}

#[inline]
pub fn pack_f64(num: f64) -> [u8; 8] {
    num.to_be_bytes()
}

#[inline]
pub fn unpack_f32(raw: [u8; 4]) -> f32 {
    f32::from_be_bytes(raw)
}

#[inline]
pub fn unpack_f64(raw: [u8; 8]) -> f64 {
    f64::from_be_bytes(raw)
}
