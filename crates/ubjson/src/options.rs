//! Encoder and decoder configuration.

use std::fmt;

use crate::error::HookError;
use crate::value::{Key, Object, Value};

/// Nesting limit applied by default in both directions.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Converts a value the encoder has no representation for.
pub type Fallback = Box<dyn Fn(&Value) -> Result<Value, HookError> + Send + Sync>;

/// Post-processes every decoded object.
pub type ObjectHookFn = Box<dyn Fn(Object) -> Result<Value, HookError> + Send + Sync>;

/// Post-processes every decoded object, given as ordered pairs.
pub type PairsHookFn = Box<dyn Fn(Vec<(Key, Value)>) -> Result<Value, HookError> + Send + Sync>;

/// Options controlling UBJSON encoding.
pub struct EncodeOptions {
    /// Write a `#` count after every container start instead of an end
    /// marker.
    pub container_count: bool,
    /// Write object entries ordered by key instead of insertion order.
    pub sort_keys: bool,
    /// Always write floats as float64.
    pub no_float32: bool,
    /// Maximum container nesting (fallback conversions count as a level).
    pub max_depth: usize,
    /// Called for [`Value::Extension`] values; its result is encoded
    /// instead.
    pub fallback: Option<Fallback>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            container_count: false,
            sort_keys: false,
            no_float32: false,
            max_depth: DEFAULT_MAX_DEPTH,
            fallback: None,
        }
    }
}

impl fmt::Debug for EncodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeOptions")
            .field("container_count", &self.container_count)
            .field("sort_keys", &self.sort_keys)
            .field("no_float32", &self.no_float32)
            .field("max_depth", &self.max_depth)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl EncodeOptions {
    pub fn with_container_count(mut self, container_count: bool) -> Self {
        self.container_count = container_count;
        self
    }

    pub fn with_sort_keys(mut self, sort_keys: bool) -> Self {
        self.sort_keys = sort_keys;
        self
    }

    pub fn with_no_float32(mut self, no_float32: bool) -> Self {
        self.no_float32 = no_float32;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(fallback));
        self
    }
}

/// Optional reshaping of decoded objects.
///
/// The two hook flavours are mutually exclusive.
#[derive(Default)]
pub enum ObjectHook {
    #[default]
    None,
    /// Receives the decoded object.
    Object(ObjectHookFn),
    /// Receives the decoded entries in wire order, duplicates included.
    Pairs(PairsHookFn),
}

impl fmt::Debug for ObjectHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectHook::None => "None",
            ObjectHook::Object(_) => "Object(..)",
            ObjectHook::Pairs(_) => "Pairs(..)",
        })
    }
}

/// Options controlling UBJSON decoding.
pub struct DecodeOptions {
    /// Decode uint8-typed arrays as arrays of integers instead of
    /// [`Value::Bytes`].
    pub no_bytes: bool,
    pub object_hook: ObjectHook,
    /// Reuse one allocation for all occurrences of the same object key.
    pub intern_object_keys: bool,
    /// Maximum container nesting.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            no_bytes: false,
            object_hook: ObjectHook::None,
            intern_object_keys: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl fmt::Debug for DecodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("no_bytes", &self.no_bytes)
            .field("object_hook", &self.object_hook)
            .field("intern_object_keys", &self.intern_object_keys)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl DecodeOptions {
    pub fn with_no_bytes(mut self, no_bytes: bool) -> Self {
        self.no_bytes = no_bytes;
        self
    }

    /// Sets an object hook, replacing any pairs hook.
    pub fn with_object_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Object) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        self.object_hook = ObjectHook::Object(Box::new(hook));
        self
    }

    /// Sets a pairs hook, replacing any object hook.
    pub fn with_object_pairs_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Vec<(Key, Value)>) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        self.object_hook = ObjectHook::Pairs(Box::new(hook));
        self
    }

    pub fn with_intern_object_keys(mut self, intern_object_keys: bool) -> Self {
        self.intern_object_keys = intern_object_keys;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let enc = EncodeOptions::default();
        assert!(!enc.container_count && !enc.sort_keys && !enc.no_float32);
        assert_eq!(enc.max_depth, DEFAULT_MAX_DEPTH);
        assert!(enc.fallback.is_none());

        let dec = DecodeOptions::default();
        assert!(!dec.no_bytes && !dec.intern_object_keys);
        assert!(matches!(dec.object_hook, ObjectHook::None));
    }

    #[test]
    fn test_hooks_are_exclusive() {
        let opts = DecodeOptions::default()
            .with_object_hook(|obj| Ok(Value::Object(obj)))
            .with_object_pairs_hook(|pairs| Ok(Value::from(pairs.len() as u64)));
        assert!(matches!(opts.object_hook, ObjectHook::Pairs(_)));
        assert_eq!(
            format!("{opts:?}"),
            "DecodeOptions { no_bytes: false, object_hook: Pairs(..), intern_object_keys: false, max_depth: 512 }"
        );
    }
}
