//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::application::services::{
    DocumentService, ExtractionService, TaxonomyEngine, TaxonomyRules,
};
use crate::application::ApplicationError;
use crate::config::Settings;
use crate::domain::SegmentClassifier;
use crate::infrastructure::completion::MessagesCompletion;
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::prompts::PromptCatalog;
use crate::infrastructure::traits::{FileSystem, RealFileSystem, TextCompletion};

/// Container holding all application services.
///
/// The completion client is only built when a command needs it, so commands
/// that never call the service work without an API key.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Injected completion service; built from settings when absent
    completion: Option<Arc<dyn TextCompletion>>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            fs: Arc::new(RealFileSystem),
            completion: None,
        }
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        completion: Arc<dyn TextCompletion>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            fs,
            completion: Some(completion),
        }
    }

    pub fn prompts(&self) -> InfraResult<PromptCatalog> {
        PromptCatalog::with_overrides(&self.settings.prompts).map_err(|message| {
            ApplicationError::Config {
                message: format!("prompts: {message}"),
            }
            .into()
        })
    }

    /// The completion service, building the HTTP client on first use.
    pub fn completion(&self) -> InfraResult<Arc<dyn TextCompletion>> {
        if let Some(completion) = &self.completion {
            return Ok(Arc::clone(completion));
        }
        debug!(
            "completion: model={}, base_url={}",
            self.settings.completion.model, self.settings.completion.base_url
        );
        let client = MessagesCompletion::new(self.settings.completion.clone(), self.prompts()?)?;
        Ok(Arc::new(client))
    }

    pub fn documents(&self) -> DocumentService {
        DocumentService::new(Arc::clone(&self.fs))
    }

    pub fn extraction(&self) -> InfraResult<ExtractionService> {
        Ok(ExtractionService::new(self.completion()?))
    }

    pub fn classifier(&self) -> SegmentClassifier {
        let segments = &self.settings.segments;
        SegmentClassifier::new(&segments.rules, segments.heading_max_words, &segments.eeo_marker)
    }

    /// Taxonomy from `input`, else the configured default file, else the bundled one.
    pub fn taxonomy(&self, input: Option<&Path>) -> InfraResult<TaxonomyEngine> {
        let source = input.or(self.settings.taxonomy.default_file.as_deref());
        let record = match source {
            Some(path) => {
                debug!("taxonomy: loading {}", path.display());
                Some(self.documents().read_json(path)?)
            }
            None => None,
        };
        let rules = TaxonomyRules::from(&self.settings.taxonomy);
        Ok(TaxonomyEngine::new(record, rules)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::testing::ScriptedCompletion;

    #[test]
    fn given_unknown_prompt_override_when_building_prompts_then_config_error() {
        let mut settings = Settings::default();
        settings.prompts.insert("embedding".into(), "{text}".into());
        let container = ServiceContainer::new(settings);

        let err = container.prompts().err().unwrap();

        assert!(err.to_string().contains("embedding"));
    }

    #[test]
    fn given_injected_completion_when_requested_then_returned_without_api_key() {
        let container = ServiceContainer::with_deps(
            Settings::default(),
            Arc::new(RealFileSystem),
            Arc::new(ScriptedCompletion::default()),
        );
        assert!(container.completion().is_ok());
    }

    #[test]
    fn given_no_input_when_loading_taxonomy_then_bundled_default() {
        let container = ServiceContainer::new(Settings::default());
        let engine = container.taxonomy(None).unwrap();
        assert!(engine.tree().node_count() > 1);
    }
}
