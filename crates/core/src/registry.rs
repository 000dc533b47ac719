//! Named registry of pluggable implementations.
//!
//! Schedulers, message transports and cluster backends are looked up by the
//! name a configuration value (or a cluster's transport binding) refers to.
//! A [`Registry`] is built once at process start and handed to consumers
//! behind an `Arc`; it is never stored in a static.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Map of implementation name to shared implementation.
///
/// Names are matched case-insensitively (`"NATS"` and `"nats"` are the same
/// entry) so configuration values are forgiving.
pub struct Registry<T: ?Sized> {
    entries: HashMap<String, Arc<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register `implementation` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl AsRef<str>, implementation: Arc<T>) -> &mut Self {
        self.entries
            .insert(name.as_ref().to_ascii_lowercase(), implementation);
        self
    }

    /// Builder-style variant of [`register`](Registry::register).
    pub fn with(mut self, name: impl AsRef<str>, implementation: Arc<T>) -> Self {
        self.register(name, implementation);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted for stable log output.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
