//! Registry of named step callables.
//!
//! Parsers that are not written as a [`DocumentParser`](crate::DocumentParser)
//! type register their callables here by name, and a
//! [`ParserManifest`](crate::ParserManifest) decides each step's kind and
//! priority.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::SharedCache;
use crate::runtime::ParserError;
use crate::step::{RegisteredStep, StepError, StepFn, StepKind};

/// Registry for storing step callables by name
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn StepFn>>,
}

impl StepRegistry {
    /// Create a new empty step registry
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
        }
    }

    /// Register a step callable, replacing any previous one with that name
    ///
    /// # Example
    ///
    /// ```
    /// use gleaner::{SharedCache, StepError, StepRegistry};
    /// use serde_json::Value;
    ///
    /// let mut registry = StepRegistry::new();
    /// registry.register("lang", |cache: &mut SharedCache| {
    ///     let lang = cache.get::<String>("lang").cloned().unwrap_or_else(|| "en".to_string());
    ///     Ok(Value::String(lang))
    /// });
    ///
    /// assert!(registry.has_step("lang"));
    /// ```
    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&mut SharedCache) -> Result<Value, StepError> + Send + Sync + 'static,
    {
        self.steps.insert(name.into(), Arc::new(func));
    }

    /// Bind the callable registered under `name` to a kind and priority
    pub fn bind(
        &self,
        name: &str,
        kind: StepKind,
        priority: Option<i64>,
    ) -> Result<RegisteredStep, ParserError> {
        let func = self
            .steps
            .get(name)
            .ok_or_else(|| ParserError::StepNotRegistered(name.to_string()))?;

        Ok(RegisteredStep::from_shared(name, kind, priority, Arc::clone(func)))
    }

    /// Check if a step is registered
    pub fn has_step(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Get sorted list of all registered step names
    pub fn list_steps(&self) -> Vec<String> {
        let mut names: Vec<String> = self.steps.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.steps.len()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}
