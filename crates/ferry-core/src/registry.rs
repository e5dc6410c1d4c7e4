//! Rebuild providers from their serialized form

use crate::{Binding, Provider, ProviderError, Result, SerializedProvider};
use std::collections::HashMap;
use std::sync::Arc;

/// Constructor for one backend variant
pub type ProviderFactory = Arc<dyn Fn(Binding) -> Result<Arc<dyn Provider>> + Send + Sync>;

/// Maps backend names to their constructors
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(Binding) -> Result<Arc<dyn Provider>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Construct the backend `name` bound to `binding`
    pub fn build(&self, name: &str, binding: Binding) -> Result<Arc<dyn Provider>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ProviderError::NotFound(format!("provider {name:?}")))?;
        factory(binding)
    }

    /// Reconstruct a provider from [`Provider::serialized`] output
    pub fn from_serialized(&self, record: &SerializedProvider) -> Result<Arc<dyn Provider>> {
        self.build(&record.name, record.binding())
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{same_backend, MemoryProvider};
    use serde_json::json;

    #[test]
    fn test_roundtrip_through_serialized_form() {
        let mut registry = ProviderRegistry::new();
        registry.register(MemoryProvider::NAME, |binding| {
            Ok(Arc::new(MemoryProvider::with_binding(binding)) as Arc<dyn Provider>)
        });

        let original = MemoryProvider::with_binding(Binding::new(
            json!({"user": "u1"}),
            json!({"token": "t"}),
            json!({"folder": "/"}),
        ));
        let record = original.serialized();
        assert_eq!(record.name, "memory");

        let rebuilt = registry.from_serialized(&record).unwrap();
        assert!(same_backend(&original, rebuilt.as_ref()));
        assert_eq!(rebuilt.binding().settings, json!({"folder": "/"}));
    }

    #[test]
    fn test_unknown_backend() {
        let registry = ProviderRegistry::new();
        let err = registry.build("nope", Binding::default()).err().unwrap();
        assert_eq!(err.code(), 404);
    }
}
