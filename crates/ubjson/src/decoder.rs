//! `UbjsonDecoder` — Universal Binary JSON decoder.
//!
//! Input is read through a [`ByteSource`], so the same state machine serves
//! in-memory slices, plain streams and seekable streams.

use std::collections::HashSet;
use std::io::{Read, Seek};

use log::{debug, trace};
use ubjson_buffers::{BufferedReader, ByteSource, FixedReader, PullReader};

use crate::error::DecodeError;
use crate::markers::{
    is_container_type, is_integer, is_no_data_type, ARRAY_END, ARRAY_START, CHAR,
    CONTAINER_COUNT, CONTAINER_TYPE, FALSE, FLOAT32, FLOAT64, HIGH_PREC, INT16, INT32, INT64,
    INT8, NOOP, NULL, OBJECT_END, OBJECT_START, STRING, TRUE, UINT8,
};
use crate::numeric::{int_width, unpack_f32, unpack_f64, unpack_int};
use crate::options::{DecodeOptions, ObjectHook};
use crate::value::{Key, Object, Value};
use crate::HighPrecision;

/// Upper bound on elements reserved up front for a counted container, so a
/// bogus count cannot trigger a huge allocation before any element is read.
const PREALLOC_LIMIT: usize = 4096;

/// UBJSON decoder. Holds the options, so it can be built once and reused.
#[derive(Debug, Default)]
pub struct UbjsonDecoder {
    options: DecodeOptions,
}

impl UbjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decodes the first value in `input`. Trailing bytes are ignored.
    pub fn decode(&self, input: &[u8]) -> Result<Value, DecodeError> {
        self.decode_with_consumed(input).map(|(value, _)| value)
    }

    /// Decodes the first value in `input`, also returning how many bytes it
    /// occupied.
    pub fn decode_with_consumed(&self, input: &[u8]) -> Result<(Value, usize), DecodeError> {
        let mut reader = FixedReader::new(input);
        let value = self.decode_source(&mut reader)?;
        Ok((value, reader.total_read()))
    }

    /// Decodes one value from a stream, reading exactly the bytes it needs.
    pub fn decode_reader<R: Read>(&self, reader: R) -> Result<Value, DecodeError> {
        self.decode_source(PullReader::new(reader))
    }

    /// Decodes one value from a seekable stream.
    ///
    /// The stream is read in chunks and afterwards rewound to the end of
    /// the decoded value, even if decoding failed.
    pub fn decode_seekable<R: Read + Seek>(&self, reader: R) -> Result<Value, DecodeError> {
        self.decode_source(BufferedReader::new(reader))
    }

    /// Decodes one value from any [`ByteSource`], releasing it afterwards.
    ///
    /// A decode error takes precedence over an error raised by the release.
    pub fn decode_source<S: ByteSource>(&self, source: S) -> Result<Value, DecodeError> {
        let mut state = DecodeState::new(&self.options, source);
        let result = state.read_value();
        let released = state.input.src.release();
        let value = result?;
        released?;
        Ok(value)
    }
}

/// Bounds-checked reads with offset tracking.
struct Input<S> {
    src: S,
}

impl<S: ByteSource> Input<S> {
    fn offset(&self) -> usize {
        self.src.total_read()
    }

    /// Reads exactly `len` bytes, `what` naming the item for errors.
    fn read(&mut self, len: usize, what: &'static str) -> Result<&[u8], DecodeError> {
        if len == 0 {
            return Ok(&[]);
        }
        let before = self.src.total_read();
        let chunk = self.src.read(len)?;
        let got = chunk.len();
        if got == len {
            Ok(chunk)
        } else if got == 0 {
            Err(DecodeError::InsufficientInput {
                what,
                offset: before,
            })
        } else {
            Err(DecodeError::PartialInput {
                what,
                offset: before + got,
            })
        }
    }

    fn byte(&mut self, what: &'static str) -> Result<u8, DecodeError> {
        Ok(self.read(1, what)?[0])
    }

    fn fixed<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N, what)?);
        Ok(out)
    }

    fn utf8(&mut self, len: usize, what: &'static str) -> Result<String, DecodeError> {
        let text = std::str::from_utf8(self.read(len, what)?).map(str::to_owned);
        text.map_err(|_| DecodeError::InvalidUtf8 {
            what,
            offset: self.offset(),
        })
    }
}

/// Parameters read after a container start marker.
#[derive(Debug)]
struct ContainerParams {
    /// First marker after the parameters: the first value (or key length)
    /// marker, the end marker, or the fixed type.
    marker: u8,
    /// Whether a `#` count was given.
    counting: bool,
    /// Element count. 1 for unsized containers, which loop until the end
    /// marker instead.
    count: usize,
    /// Fixed element type from `$`.
    kind: Option<u8>,
}

/// Decoded object entries, collected in the shape the hook expects.
enum Entries {
    Map(Object),
    Pairs(Vec<(Key, Value)>),
}

impl Entries {
    fn push(&mut self, key: Key, value: Value) {
        match self {
            // A repeated key keeps its first position and takes the last value.
            Entries::Map(map) => {
                map.insert(key, value);
            }
            Entries::Pairs(pairs) => pairs.push((key, value)),
        }
    }
}

/// An open container on the decode stack.
enum Frame {
    Array(ArrayFrame),
    Object(ObjectFrame),
}

struct ArrayFrame {
    list: Vec<Value>,
    /// Marker of the next element, or the end marker.
    marker: u8,
    counting: bool,
    remaining: usize,
    kind: Option<u8>,
}

struct ObjectFrame {
    entries: Entries,
    /// Length marker of the next key, or the end marker.
    marker: u8,
    counting: bool,
    remaining: usize,
    kind: Option<u8>,
    /// Key of the value being decoded.
    key: Option<Key>,
}

/// Result of reading one marker's payload.
enum Step {
    Done(Value),
    Open(Frame),
}

/// Per-call decoding state.
struct DecodeState<'o, S> {
    input: Input<S>,
    options: &'o DecodeOptions,
    interned: HashSet<Key>,
}

impl<'o, S: ByteSource> DecodeState<'o, S> {
    fn new(options: &'o DecodeOptions, src: S) -> Self {
        Self {
            input: Input { src },
            options,
            interned: HashSet::new(),
        }
    }

    /// Reads one complete value.
    ///
    /// Open containers live on an explicit stack, so nesting depth costs
    /// heap memory rather than call stack.
    fn read_value(&mut self) -> Result<Value, DecodeError> {
        let marker = self.input.byte("type marker")?;
        let mut stack: Vec<Frame> = Vec::new();
        let mut step = self.start(marker, 0)?;
        loop {
            let mut done = match step {
                Step::Open(frame) => {
                    stack.push(frame);
                    None
                }
                Step::Done(value) => Some(value),
            };
            loop {
                let Some(frame) = stack.last_mut() else {
                    // stack is empty only once the outermost value is done
                    return Ok(done.unwrap_or_default());
                };
                if let Some(value) = done.take() {
                    self.accept(frame, value)?;
                }
                match self.next_marker(frame)? {
                    Some(marker) => {
                        step = self.start(marker, stack.len())?;
                        break;
                    }
                    None => {
                        if let Some(frame) = stack.pop() {
                            done = Some(self.close(frame)?);
                        }
                    }
                }
            }
        }
    }

    /// Reads the payload of `marker`, opening a container if it starts one.
    /// `depth` is the number of containers already open.
    fn start(&mut self, marker: u8, depth: usize) -> Result<Step, DecodeError> {
        match marker {
            ARRAY_START | OBJECT_START => {
                let limit = self.options.max_depth;
                if depth >= limit {
                    debug!("decode depth limit of {limit} reached");
                    return Err(DecodeError::DepthLimitExceeded {
                        limit,
                        offset: self.input.offset(),
                    });
                }
                if marker == ARRAY_START {
                    self.open_array()
                } else {
                    self.open_object()
                }
            }
            _ => self.read_scalar(marker).map(Step::Done),
        }
    }

    fn read_scalar(&mut self, marker: u8) -> Result<Value, DecodeError> {
        match marker {
            NULL => Ok(Value::Null),
            TRUE => Ok(Value::Bool(true)),
            FALSE => Ok(Value::Bool(false)),
            CHAR => {
                let byte = self.input.byte("char")?;
                if byte.is_ascii() {
                    Ok(Value::Char(byte as char))
                } else {
                    Err(DecodeError::InvalidUtf8 {
                        what: "char",
                        offset: self.input.offset(),
                    })
                }
            }
            STRING => {
                let len = self.read_length(None)?;
                Ok(Value::Str(self.input.utf8(len, "string")?))
            }
            INT8 | UINT8 | INT16 | INT32 | INT64 => Ok(Value::Integer(self.read_int(marker)?)),
            FLOAT32 => Ok(Value::Float32(unpack_f32(self.input.fixed("float32")?))),
            FLOAT64 => Ok(Value::Float(unpack_f64(self.input.fixed("float64")?))),
            HIGH_PREC => self.read_high_precision(),
            _ => Err(DecodeError::InvalidMarker {
                marker,
                offset: self.input.offset(),
            }),
        }
    }

    fn read_int(&mut self, marker: u8) -> Result<i64, DecodeError> {
        let what = int_name(marker);
        let Some(width) = int_width(marker) else {
            return Err(DecodeError::IntegerMarkerExpected {
                marker,
                offset: self.input.offset(),
            });
        };
        let value = unpack_int(marker, self.input.read(width, what)?);
        value.ok_or(DecodeError::IntegerMarkerExpected {
            marker,
            offset: self.input.offset(),
        })
    }

    /// Reads a non-negative integer used as a length or count.
    fn read_length(&mut self, given: Option<u8>) -> Result<usize, DecodeError> {
        let marker = match given {
            Some(marker) => marker,
            None => self.input.byte("length marker")?,
        };
        if !is_integer(marker) {
            return Err(DecodeError::IntegerMarkerExpected {
                marker,
                offset: self.input.offset(),
            });
        }
        let length = self.read_int(marker)?;
        usize::try_from(length).map_err(|_| DecodeError::InvalidLength {
            length,
            offset: self.input.offset(),
        })
    }

    fn read_high_precision(&mut self) -> Result<Value, DecodeError> {
        let len = self.read_length(None)?;
        let text = self.input.utf8(len, "highprec")?;
        text.parse::<HighPrecision>()
            .map(Value::HighPrecision)
            .map_err(|source| DecodeError::InvalidHighPrecision {
                source,
                offset: self.input.offset(),
            })
    }

    fn read_key(&mut self, marker: u8) -> Result<Key, DecodeError> {
        let len = self.read_length(Some(marker))?;
        let text = self.input.utf8(len, "object key")?;
        if !self.options.intern_object_keys {
            return Ok(Key::from(text));
        }
        if let Some(key) = self.interned.get(text.as_str()) {
            return Ok(key.clone());
        }
        let key = Key::from(text);
        self.interned.insert(key.clone());
        Ok(key)
    }

    /// Parses the optional `$` type and `#` count after a container start.
    ///
    /// A type requires a count. When a count is present the next marker is
    /// read ahead unless the type fixes it; in objects it is always read
    /// since keys carry their own length marker.
    fn container_params(&mut self, in_mapping: bool) -> Result<ContainerParams, DecodeError> {
        let mut marker = self
            .input
            .byte("container type, count or 1st key/value type")?;
        let mut kind = None;
        if marker == CONTAINER_TYPE {
            let fixed = self.input.byte("container type")?;
            if !is_container_type(fixed) {
                return Err(DecodeError::InvalidContainerType {
                    marker: fixed,
                    offset: self.input.offset(),
                });
            }
            kind = Some(fixed);
            marker = self.input.byte("container count or 1st key/value type")?;
        }

        if marker == CONTAINER_COUNT {
            let count = self.read_length(None)?;
            if count > 0 && (in_mapping || kind.is_none()) {
                marker = self.input.byte("1st key/value type")?;
            } else if let Some(fixed) = kind {
                marker = fixed;
            }
            return Ok(ContainerParams {
                marker,
                counting: true,
                count,
                kind,
            });
        }
        if kind.is_some() {
            return Err(DecodeError::ContainerTypeWithoutCount {
                offset: self.input.offset(),
            });
        }
        Ok(ContainerParams {
            marker,
            counting: false,
            count: 1,
            kind: None,
        })
    }

    fn open_array(&mut self) -> Result<Step, DecodeError> {
        let params = self.container_params(false)?;
        match params.kind {
            Some(UINT8) if !self.options.no_bytes => {
                let raw = self.input.read(params.count, "bytes array")?;
                return Ok(Step::Done(Value::Bytes(raw.to_vec())));
            }
            Some(kind) if is_no_data_type(kind) => {
                let mut list = Vec::new();
                self.reserve(&mut list, params.count)?;
                list.resize(params.count, no_data_value(kind));
                return Ok(Step::Done(Value::Array(list)));
            }
            _ => {}
        }
        let reserve = if params.counting { params.count.min(PREALLOC_LIMIT) } else { 0 };
        Ok(Step::Open(Frame::Array(ArrayFrame {
            list: Vec::with_capacity(reserve),
            marker: params.marker,
            counting: params.counting,
            remaining: params.count,
            kind: params.kind,
        })))
    }

    fn open_object(&mut self) -> Result<Step, DecodeError> {
        let params = self.container_params(true)?;
        let reserve = if params.counting { params.count.min(PREALLOC_LIMIT) } else { 0 };
        let mut entries = match self.options.object_hook {
            ObjectHook::Pairs(_) => Entries::Pairs(Vec::with_capacity(reserve)),
            _ => Entries::Map(Object::with_capacity(reserve)),
        };

        if let Some(kind) = params.kind.filter(|&kind| is_no_data_type(kind)) {
            // keys only
            let value = no_data_value(kind);
            let mut marker = params.marker;
            let mut remaining = params.count;
            while remaining > 0 {
                let key = self.read_key(marker)?;
                entries.push(key, value.clone());
                remaining -= 1;
                if remaining > 0 {
                    marker = self.input.byte("object key length")?;
                }
            }
            return self.finish_object(entries).map(Step::Done);
        }

        Ok(Step::Open(Frame::Object(ObjectFrame {
            entries,
            marker: params.marker,
            counting: params.counting,
            remaining: params.count,
            kind: params.kind,
            key: None,
        })))
    }

    /// Finds the marker of the next element of `frame`, skipping no-ops.
    /// For objects the key is read first. `None` once the container is
    /// complete.
    fn next_marker(&mut self, frame: &mut Frame) -> Result<Option<u8>, DecodeError> {
        match frame {
            Frame::Array(arr) => loop {
                let more = if arr.counting {
                    arr.remaining > 0
                } else {
                    arr.marker != ARRAY_END
                };
                if !more {
                    return Ok(None);
                }
                if arr.marker != NOOP {
                    return Ok(Some(arr.marker));
                }
                arr.marker = self.input.byte(if arr.counting {
                    "array value type marker (sized, after no-op)"
                } else {
                    "array value type marker (after no-op)"
                })?;
            },
            Frame::Object(obj) => loop {
                if obj.remaining == 0 || (!obj.counting && obj.marker == OBJECT_END) {
                    return Ok(None);
                }
                if obj.marker == NOOP {
                    obj.marker = self.input.byte("object key length (after no-op)")?;
                    continue;
                }
                obj.key = Some(self.read_key(obj.marker)?);
                let marker = match obj.kind {
                    Some(kind) => kind,
                    None => self.input.byte("type marker")?,
                };
                return Ok(Some(marker));
            },
        }
    }

    /// Stores a finished element in `frame` and reads ahead the marker that
    /// follows it, if the container still expects one.
    fn accept(&mut self, frame: &mut Frame, value: Value) -> Result<(), DecodeError> {
        match frame {
            Frame::Array(arr) => {
                arr.list.push(value);
                if !arr.counting {
                    arr.marker = self.input.byte("array value type marker")?;
                } else {
                    arr.remaining -= 1;
                    if arr.remaining > 0 && arr.kind.is_none() {
                        arr.marker = self.input.byte("array value type marker (sized)")?;
                    }
                }
            }
            Frame::Object(obj) => {
                if let Some(key) = obj.key.take() {
                    obj.entries.push(key, value);
                }
                // unsized objects keep remaining at 1 until the end marker
                if obj.counting {
                    obj.remaining -= 1;
                }
                if obj.remaining > 0 {
                    obj.marker = self.input.byte("object key length")?;
                }
            }
        }
        Ok(())
    }

    fn close(&mut self, frame: Frame) -> Result<Value, DecodeError> {
        match frame {
            Frame::Array(arr) => Ok(Value::Array(arr.list)),
            Frame::Object(obj) => self.finish_object(obj.entries),
        }
    }

    fn finish_object(&mut self, entries: Entries) -> Result<Value, DecodeError> {
        match (entries, &self.options.object_hook) {
            (Entries::Pairs(pairs), ObjectHook::Pairs(hook)) => {
                trace!("calling object pairs hook with {} entries", pairs.len());
                hook(pairs).map_err(DecodeError::Hook)
            }
            (Entries::Map(map), ObjectHook::Object(hook)) => {
                trace!("calling object hook with {} entries", map.len());
                hook(map).map_err(DecodeError::Hook)
            }
            (Entries::Map(map), _) => Ok(Value::Object(map)),
            (Entries::Pairs(pairs), _) => Ok(Value::Object(pairs.into_iter().collect())),
        }
    }

    /// Reserves room for `count` elements, failing cleanly if that is not
    /// possible.
    fn reserve(&self, list: &mut Vec<Value>, count: usize) -> Result<(), DecodeError> {
        list.try_reserve_exact(count)
            .map_err(|_| DecodeError::ContainerTooLarge {
                count,
                offset: self.input.offset(),
            })
    }
}

fn no_data_value(marker: u8) -> Value {
    match marker {
        NULL => Value::Null,
        TRUE => Value::Bool(true),
        _ => Value::Bool(false),
    }
}

fn int_name(marker: u8) -> &'static str {
    match marker {
        INT8 => "int8",
        UINT8 => "uint8",
        INT16 => "int16",
        INT32 => "int32",
        _ => "int64",
    }
}
