use thiserror::Error;

/// Error returned by caller-supplied hooks and fallback functions.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for UBJSON encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("cannot encode {0} value without a fallback")]
    Unencodable(&'static str),
    #[error("circular reference detected")]
    CircularReference,
    #[error("maximum nesting depth of {0} exceeded while encoding")]
    DepthLimitExceeded(usize),
    #[error(transparent)]
    Fallback(HookError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error type for UBJSON decoding.
///
/// Every variant raised by the decoder itself carries the number of input
/// bytes consumed when the problem was detected.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("insufficient input ({what}) (at byte {offset})")]
    InsufficientInput { what: &'static str, offset: usize },
    #[error("insufficient (partial) input ({what}) (at byte {offset})")]
    PartialInput { what: &'static str, offset: usize },
    #[error("invalid marker 0x{marker:02x} (at byte {offset})")]
    InvalidMarker { marker: u8, offset: usize },
    #[error("invalid container type 0x{marker:02x} (at byte {offset})")]
    InvalidContainerType { marker: u8, offset: usize },
    #[error("container type without count (at byte {offset})")]
    ContainerTypeWithoutCount { offset: usize },
    #[error("integer marker expected, found 0x{marker:02x} (at byte {offset})")]
    IntegerMarkerExpected { marker: u8, offset: usize },
    #[error("negative or oversized count/length {length} (at byte {offset})")]
    InvalidLength { length: i64, offset: usize },
    #[error("failed to decode utf8: {what} (at byte {offset})")]
    InvalidUtf8 { what: &'static str, offset: usize },
    #[error("invalid high-precision number: {source} (at byte {offset})")]
    InvalidHighPrecision {
        source: ParseHighPrecisionError,
        offset: usize,
    },
    #[error("maximum nesting depth of {limit} exceeded (at byte {offset})")]
    DepthLimitExceeded { limit: usize, offset: usize },
    #[error("container of {count} elements cannot be allocated (at byte {offset})")]
    ContainerTooLarge { count: usize, offset: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Hook(HookError),
}

impl DecodeError {
    /// Byte offset at which the error was detected, if known.
    ///
    /// Errors coming from the input stream or a hook have no offset.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::InsufficientInput { offset, .. }
            | Self::PartialInput { offset, .. }
            | Self::InvalidMarker { offset, .. }
            | Self::InvalidContainerType { offset, .. }
            | Self::ContainerTypeWithoutCount { offset }
            | Self::IntegerMarkerExpected { offset, .. }
            | Self::InvalidLength { offset, .. }
            | Self::InvalidUtf8 { offset, .. }
            | Self::InvalidHighPrecision { offset, .. }
            | Self::DepthLimitExceeded { offset, .. }
            | Self::ContainerTooLarge { offset, .. } => Some(*offset),
            Self::Io(_) | Self::Hook(_) => None,
        }
    }
}

/// Error parsing a [`HighPrecision`](crate::HighPrecision) from a string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseHighPrecisionError {
    #[error("empty string")]
    Empty,
    #[error("malformed number")]
    Invalid,
    #[error("exponent out of range")]
    ExponentOutOfRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_offset() {
        let err = DecodeError::InvalidMarker {
            marker: b'x',
            offset: 3,
        };
        assert_eq!(err.to_string(), "invalid marker 0x78 (at byte 3)");
        assert_eq!(err.offset(), Some(3));

        let err = DecodeError::InsufficientInput {
            what: "string",
            offset: 10,
        };
        assert_eq!(err.to_string(), "insufficient input (string) (at byte 10)");
    }

    #[test]
    fn test_transparent_variants() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = DecodeError::from(io);
        assert_eq!(err.to_string(), "pipe closed");
        assert_eq!(err.offset(), None);

        let err = EncodeError::Fallback("no conversion".into());
        assert_eq!(err.to_string(), "no conversion");
    }
}
