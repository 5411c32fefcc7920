//! Schema Registry
//!
//! Holds the ordered candidate list consulted by the decode cascade. The
//! registry is built once at startup and is read-only afterwards, so a single
//! `Arc<SchemaRegistry>` can be shared freely.

use std::collections::HashSet;
use std::sync::Arc;

use crate::candidate::{ProtobufCandidate, SchemaCandidate};
use crate::error::{Result, SchemaLoadError};
use crate::source::SchemaSource;

/// Ordered, immutable set of schema candidates.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    candidates: Vec<Arc<dyn SchemaCandidate>>,
}

impl SchemaRegistry {
    /// A registry with no candidates. The cascade skips straight to the
    /// text and raw fallbacks.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from explicit candidates, keeping their order.
    ///
    /// Fails if two candidates share a name.
    pub fn from_candidates(candidates: Vec<Arc<dyn SchemaCandidate>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for candidate in &candidates {
            if !seen.insert(candidate.name().to_string()) {
                return Err(SchemaLoadError::DuplicateName(candidate.name().to_string()));
            }
        }
        Ok(Self { candidates })
    }

    /// Load the message types named by `source`, in the order given.
    pub fn load(source: &SchemaSource) -> Result<Self> {
        if source.message_types.is_empty() {
            return Err(SchemaLoadError::NoMessageTypes);
        }

        let pool = source.load_pool()?;

        let mut candidates: Vec<Arc<dyn SchemaCandidate>> =
            Vec::with_capacity(source.message_types.len());
        for full_name in &source.message_types {
            let descriptor = pool
                .get_message_by_name(full_name)
                .ok_or_else(|| SchemaLoadError::MessageTypeNotFound(full_name.clone()))?;
            candidates.push(Arc::new(ProtobufCandidate::new(descriptor)));
        }

        let registry = Self::from_candidates(candidates)?;

        tracing::info!(
            path = %source.path.display(),
            types = ?registry.names(),
            "schema registry loaded"
        );

        Ok(registry)
    }

    /// Load `source`, degrading to an empty registry on any failure.
    ///
    /// A missing or malformed schema is not fatal: messages are still
    /// ingested through the structured-text and raw fallbacks.
    pub fn load_or_empty(source: &SchemaSource) -> Self {
        match Self::load(source) {
            Ok(registry) => registry,
            Err(e) => {
                tracing::error!(
                    path = %source.path.display(),
                    error = %e,
                    "failed to load schema, decoding will fall back to text and raw capture"
                );
                Self::empty()
            }
        }
    }

    /// Candidates in the order the cascade must try them.
    pub fn candidates(&self) -> &[Arc<dyn SchemaCandidate>] {
        &self.candidates
    }

    /// True when at least one candidate is available.
    pub fn is_ready(&self) -> bool {
        !self.candidates.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("candidates", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use serde_json::{json, Value};

    struct Named(&'static str);

    impl SchemaCandidate for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn decode(&self, _payload: &[u8]) -> std::result::Result<Value, DecodeError> {
            Ok(json!({ "type": self.0 }))
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = SchemaRegistry::empty();
        assert!(!registry.is_ready());
        assert!(registry.candidates().is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_from_candidates_preserves_order() {
        let registry = SchemaRegistry::from_candidates(vec![
            Arc::new(Named("B")),
            Arc::new(Named("A")),
            Arc::new(Named("C")),
        ])
        .unwrap();
        assert!(registry.is_ready());
        assert_eq!(registry.names(), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result =
            SchemaRegistry::from_candidates(vec![Arc::new(Named("A")), Arc::new(Named("A"))]);
        assert!(matches!(result, Err(SchemaLoadError::DuplicateName(name)) if name == "A"));
    }

    #[test]
    fn test_load_without_message_types() {
        let source = SchemaSource::new("x.proto").with_message_types(Vec::<String>::new());
        assert!(matches!(
            SchemaRegistry::load(&source),
            Err(SchemaLoadError::NoMessageTypes)
        ));
    }

    #[test]
    fn test_load_or_empty_on_missing_source() {
        let source = SchemaSource::new("/definitely/not/here.proto");
        let registry = SchemaRegistry::load_or_empty(&source);
        assert!(!registry.is_ready());
        assert!(registry.candidates().is_empty());
    }

    #[test]
    fn test_debug_lists_names() {
        let registry = SchemaRegistry::from_candidates(vec![Arc::new(Named("Block"))]).unwrap();
        assert!(format!("{:?}", registry).contains("Block"));
    }
}
