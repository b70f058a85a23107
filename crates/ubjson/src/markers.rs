//! UBJSON draft 12 marker bytes.
//!
//! Every value is introduced by one marker byte, except inside a strongly
//! typed container where the `$` parameter supplies it once for all
//! elements.

pub const NULL: u8 = b'Z'; // 0x5a
pub const NOOP: u8 = b'N'; // 0x4e
pub const TRUE: u8 = b'T'; // 0x54
pub const FALSE: u8 = b'F'; // 0x46
pub const INT8: u8 = b'i'; // 0x69
pub const UINT8: u8 = b'U'; // 0x55
pub const INT16: u8 = b'I'; // 0x49
pub const INT32: u8 = b'l'; // 0x6c
pub const INT64: u8 = b'L'; // 0x4c
pub const FLOAT32: u8 = b'd'; // 0x64
pub const FLOAT64: u8 = b'D'; // 0x44
pub const HIGH_PREC: u8 = b'H'; // 0x48
pub const CHAR: u8 = b'C'; // 0x43
pub const STRING: u8 = b'S'; // 0x53

pub const ARRAY_START: u8 = b'['; // 0x5b
pub const ARRAY_END: u8 = b']'; // 0x5d
pub const OBJECT_START: u8 = b'{'; // 0x7b
pub const OBJECT_END: u8 = b'}'; // 0x7d

pub const CONTAINER_TYPE: u8 = b'$'; // 0x24
pub const CONTAINER_COUNT: u8 = b'#'; // 0x23

/// Prefix of a byte blob: a uint8-typed, counted array.
pub const BYTES_ARRAY_PREFIX: [u8; 4] = [ARRAY_START, CONTAINER_TYPE, UINT8, CONTAINER_COUNT];

/// What follows a marker on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Nothing, the marker is the value.
    None,
    /// A fixed number of bytes.
    Fixed(usize),
    /// An integer length followed by that many bytes.
    LengthPrefixed,
    /// Container parameters and elements.
    Container,
}

/// Returns the payload shape for a value marker, or `None` if `marker` does
/// not start a value.
pub fn payload(marker: u8) -> Option<Payload> {
    Some(match marker {
        NULL | NOOP | TRUE | FALSE => Payload::None,
        INT8 | UINT8 | CHAR => Payload::Fixed(1),
        INT16 => Payload::Fixed(2),
        INT32 | FLOAT32 => Payload::Fixed(4),
        INT64 | FLOAT64 => Payload::Fixed(8),
        HIGH_PREC | STRING => Payload::LengthPrefixed,
        ARRAY_START | OBJECT_START => Payload::Container,
        _ => return None,
    })
}

/// Markers whose value is fully described by the marker itself.
#[inline]
pub fn is_no_data_type(marker: u8) -> bool {
    matches!(marker, NULL | TRUE | FALSE)
}

/// Markers accepted after `$` as the fixed type of a container.
#[inline]
pub fn is_container_type(marker: u8) -> bool {
    marker != NOOP && payload(marker).is_some()
}

/// Integer markers, valid for lengths and counts.
#[inline]
pub fn is_integer(marker: u8) -> bool {
    matches!(marker, INT8 | UINT8 | INT16 | INT32 | INT64)
}
