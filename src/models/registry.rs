// Model registry - ordered candidate loading
//
// Candidates are tried in configuration order; the first successful load
// wins and no further candidates are attempted. Exhausting the list is
// not an error: the registry simply holds no handle and every request is
// served by the rule-based generators.

use super::generation::ModelHandle;
use super::loaders::{load_candidate, LoaderOptions};

/// Result of one load attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct LoadAttempt {
    pub candidate: String,
    pub outcome: LoadOutcome,
}

/// Holds the active model handle, if any, plus the attempt log.
pub struct ModelRegistry {
    handle: Option<ModelHandle>,
    attempts: Vec<LoadAttempt>,
}

impl ModelRegistry {
    /// Try each candidate in order, stopping at the first success.
    pub fn load(candidates: &[String], options: &LoaderOptions) -> Self {
        let mut attempts = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            tracing::info!("Attempting to load model: {}", candidate);
            match load_candidate(candidate, options) {
                Ok(handle) => {
                    tracing::info!(
                        "Successfully loaded model: {} (pipeline available: {})",
                        candidate,
                        handle.has_pipeline()
                    );
                    attempts.push(LoadAttempt {
                        candidate: candidate.clone(),
                        outcome: LoadOutcome::Loaded,
                    });
                    return Self {
                        handle: Some(handle),
                        attempts,
                    };
                }
                Err(e) => {
                    tracing::warn!("Failed to load model {}: {:#}", candidate, e);
                    attempts.push(LoadAttempt {
                        candidate: candidate.clone(),
                        outcome: LoadOutcome::Failed(format!("{e:#}")),
                    });
                }
            }
        }

        tracing::error!("Failed to load any model - using fallback methods only");
        Self {
            handle: None,
            attempts,
        }
    }

    /// Registry with no model, for fallback-only operation.
    pub fn unavailable() -> Self {
        Self {
            handle: None,
            attempts: Vec::new(),
        }
    }

    /// Registry around an already-built handle. Used by tests.
    pub fn with_handle(handle: ModelHandle) -> Self {
        Self {
            handle: Some(handle),
            attempts: Vec::new(),
        }
    }

    pub fn handle(&self) -> Option<&ModelHandle> {
        self.handle.as_ref()
    }

    pub fn attempts(&self) -> &[LoadAttempt] {
        &self.attempts
    }

    pub fn active_model(&self) -> Option<&str> {
        self.handle.as_ref().map(ModelHandle::model_id)
    }

    /// True when a model is loaded with its high-level pipeline intact.
    /// This is what health reporting exposes as `model_loaded`.
    pub fn pipeline_active(&self) -> bool {
        self.handle.as_ref().is_some_and(ModelHandle::has_pipeline)
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("active_model", &self.active_model())
            .field("attempts", &self.attempts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::generation::TextGeneration;
    use anyhow::Result;

    struct NullBackend;

    impl TextGeneration for NullBackend {
        fn generate(&mut self, input_ids: &[u32], _max_new_tokens: usize) -> Result<Vec<u32>> {
            Ok(input_ids.to_vec())
        }

        fn tokenize(&self, _text: &str, _max_len: usize) -> Result<Vec<u32>> {
            Ok(Vec::new())
        }

        fn decode_tokens(&self, _tokens: &[u32]) -> Result<String> {
            Ok(String::new())
        }

        fn name(&self) -> &str {
            "null"
        }
    }

    #[test]
    fn test_unavailable_registry_has_no_model() {
        let registry = ModelRegistry::unavailable();
        assert!(registry.handle().is_none());
        assert!(registry.active_model().is_none());
        assert!(!registry.pipeline_active());
        assert!(registry.attempts().is_empty());
    }

    #[test]
    fn test_exhausted_candidates_record_failures() {
        let candidates = vec![
            "does-not-exist/bogus-model-a".to_string(),
            "does-not-exist/bogus-model-b".to_string(),
        ];
        let registry = ModelRegistry::load(&candidates, &LoaderOptions::default());
        assert!(registry.handle().is_none());
        assert_eq!(registry.attempts().len(), 2);
        for attempt in registry.attempts() {
            assert!(matches!(attempt.outcome, LoadOutcome::Failed(_)));
        }
    }

    #[test]
    fn test_injected_handle_without_pipeline() {
        let handle = ModelHandle::new("test/injected", Box::new(NullBackend));
        let registry = ModelRegistry::with_handle(handle);
        assert_eq!(registry.active_model(), Some("test/injected"));
        assert!(!registry.pipeline_active());
    }
}
