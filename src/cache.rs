//! Shared cache for one `parse` call.
//!
//! The cache is the only channel between steps: control steps publish derived
//! values into it, and every later step can read them back by key. A fresh
//! cache is built for every call, seeded with the document and the caller's
//! [`ParseContext`].

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;

use crate::step::StepError;

/// Cache key under which the document handle is seeded.
pub const DOCUMENT_KEY: &str = "document";

type CacheValue = Box<dyn Any + Send + Sync>;

/// Key/value store visible to every step of a single `parse` call.
///
/// Values are stored type-erased and read back by type, so steps may share
/// anything from a parsed DOM handle to a plain string.
///
/// # Example
/// ```
/// use gleaner::SharedCache;
///
/// let mut cache = SharedCache::new();
/// cache.put("lang", "en".to_string());
///
/// assert_eq!(cache.get::<String>("lang").map(String::as_str), Some("en"));
/// assert!(cache.get::<u32>("lang").is_none());
/// ```
#[derive(Default)]
pub struct SharedCache {
    entries: HashMap<String, CacheValue>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing whatever was under `key`.
    pub fn put<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Box::new(value));
    }

    pub(crate) fn put_boxed(&mut self, key: String, value: CacheValue) {
        self.entries.insert(key, value);
    }

    /// Get a value by key.
    ///
    /// # Returns
    /// `None` if the key is absent or holds a value of another type
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries
            .get(key)
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.entries
            .get_mut(key)
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Get a value a step cannot do without.
    ///
    /// # Errors
    /// `StepError::MissingCacheEntry` if the key is absent,
    /// `StepError::TypeMismatch` if it holds a different type
    pub fn require<T: Any>(&self, key: &str) -> Result<&T, StepError> {
        let value = self
            .entries
            .get(key)
            .ok_or_else(|| StepError::MissingCacheEntry {
                key: key.to_string(),
            })?;

        value
            .downcast_ref::<T>()
            .ok_or_else(|| StepError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// The document handle seeded by `parse`.
    pub fn document<D: Any>(&self) -> Option<&D> {
        self.get(DOCUMENT_KEY)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove an entry, returning whether it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("SharedCache").field("keys", &keys).finish()
    }
}

/// Named values a caller hands to `parse` alongside the document.
///
/// Entries are seeded into the cache in insertion order, so a repeated key
/// keeps its last value.
///
/// # Example
/// ```
/// use gleaner::ParseContext;
///
/// let context = ParseContext::new()
///     .with("url", "https://example.com/a".to_string())
///     .with("publisher", "World Truth".to_string());
///
/// assert_eq!(context.len(), 2);
/// ```
#[derive(Default)]
pub struct ParseContext {
    values: Vec<(String, CacheValue)>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.push((key.into(), Box::new(value)));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Write every entry into `cache`, in insertion order.
    pub(crate) fn seed(self, cache: &mut SharedCache) {
        for (key, value) in self.values {
            cache.put_boxed(key, value);
        }
    }
}

impl fmt::Debug for ParseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseContext")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}
