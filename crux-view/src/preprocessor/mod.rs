//! Document-to-document stages applied to a view before it is parsed.

pub mod device;
pub mod template;

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::document::ViewDocument;
use crate::error::{ViewError, ViewResult};

pub use device::DeviceAdaptivePreprocessor;
pub use template::{DirectoryTemplateLoader, InMemoryTemplateLoader, TemplateLoader, TemplatePreprocessor};

/// A pluggable transformation of a view document.
///
/// Stages receive the output of the previous stage and decide on their own
/// whether there is anything to do; a stage with nothing to do returns its
/// input unchanged.
pub trait ViewPreprocessor: Send + Sync + fmt::Debug {
    /// Key used in logs.
    fn name(&self) -> &str;

    fn preprocess(&self, document: ViewDocument, device: &str) -> ViewResult<ViewDocument>;
}

pub type PreprocessorFactory = Box<dyn Fn() -> Box<dyn ViewPreprocessor> + Send + Sync>;

/// Maps configuration keys to preprocessor factories.
pub struct PreprocessorRegistry {
    factories: HashMap<String, PreprocessorFactory>,
}

impl PreprocessorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        PreprocessorRegistry {
            factories: HashMap::new(),
        }
    }

    /// A registry with the stages shipped with this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(DeviceAdaptivePreprocessor::KEY, || {
            Box::new(DeviceAdaptivePreprocessor)
        });
        registry
    }

    pub fn register<F>(&mut self, key: &str, factory: F)
    where
        F: Fn() -> Box<dyn ViewPreprocessor> + Send + Sync + 'static,
    {
        self.factories.insert(key.to_string(), Box::new(factory));
    }

    pub fn create(&self, key: &str) -> Option<Box<dyn ViewPreprocessor>> {
        self.factories.get(key).map(|factory| factory())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }
}

impl Default for PreprocessorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for PreprocessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("PreprocessorRegistry").field("keys", &keys).finish()
    }
}

static COMMA: OnceLock<Regex> = OnceLock::new();

fn comma() -> &'static Regex {
    COMMA.get_or_init(|| Regex::new(r"\s*,\s*").unwrap())
}

/// Ordered preprocessor stages. Stage order never changes once built.
#[derive(Debug, Default)]
pub struct PreprocessorChain {
    stages: Vec<Box<dyn ViewPreprocessor>>,
}

impl PreprocessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain: the template stage first when a loader is given, then
    /// every configured key in listed order.
    ///
    /// Keys without a factory are logged and left out unless `strict` is set,
    /// in which case the first one is returned as an error.
    pub fn build(
        template_loader: Option<Arc<dyn TemplateLoader>>,
        configured: Option<&str>,
        registry: &PreprocessorRegistry,
        strict: bool,
    ) -> ViewResult<Self> {
        let mut chain = Self::new();

        if let Some(loader) = template_loader {
            chain.push(Box::new(TemplatePreprocessor::new(loader)));
        }

        let Some(configured) = configured.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(chain);
        };

        for key in comma().split(configured).filter(|k| !k.is_empty()) {
            match registry.create(key) {
                Some(stage) => chain.push(stage),
                None if strict => {
                    return Err(ViewError::UnknownPreprocessor {
                        key: key.to_string(),
                    })
                }
                None => {
                    tracing::error!(
                        "Error registering preprocessor '{}'. Check the 'preprocessors' setting [{}]",
                        key,
                        configured
                    );
                }
            }
        }

        Ok(chain)
    }

    pub fn push(&mut self, stage: Box<dyn ViewPreprocessor>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Fold the document through every stage in order.
    pub fn preprocess(&self, document: ViewDocument, device: &str) -> ViewResult<ViewDocument> {
        self.stages.iter().try_fold(document, |doc, stage| {
            tracing::debug!("Running preprocessor '{}' for device '{}'", stage.name(), device);
            stage.preprocess(doc, device)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Element;

    #[derive(Debug)]
    struct Rename(&'static str);

    impl ViewPreprocessor for Rename {
        fn name(&self) -> &str {
            self.0
        }

        fn preprocess(&self, mut document: ViewDocument, _device: &str) -> ViewResult<ViewDocument> {
            let root = document.root_mut();
            let name = format!("{}{}", root.name.local, self.0);
            root.name.local = name;
            Ok(document)
        }
    }

    fn doc() -> ViewDocument {
        ViewDocument::new(Element::new(None, "view"))
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = PreprocessorChain::new();
        let input = doc();
        let output = chain.preprocess(input.clone(), "all").unwrap();
        assert_eq!(input, output);
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut chain = PreprocessorChain::new();
        chain.push(Box::new(Rename("A")));
        chain.push(Box::new(Rename("B")));
        let output = chain.preprocess(doc(), "all").unwrap();
        assert_eq!(output.root().local_name(), "viewAB");
    }

    #[test]
    fn test_build_from_configuration_order() {
        let mut registry = PreprocessorRegistry::with_builtins();
        registry.register("first", || Box::new(Rename("1")));
        registry.register("second", || Box::new(Rename("2")));

        let chain =
            PreprocessorChain::build(None, Some(" second ,first, deviceAdaptive"), &registry, false)
                .unwrap();
        assert_eq!(chain.stage_names(), vec!["2", "1", "deviceAdaptive"]);
    }

    #[test]
    fn test_unknown_key_skipped_when_lenient() {
        let registry = PreprocessorRegistry::with_builtins();
        let chain =
            PreprocessorChain::build(None, Some("missing,deviceAdaptive"), &registry, false).unwrap();
        assert_eq!(chain.stage_names(), vec!["deviceAdaptive"]);
    }

    #[test]
    fn test_unknown_key_fails_when_strict() {
        let registry = PreprocessorRegistry::with_builtins();
        let result = PreprocessorChain::build(None, Some("deviceAdaptive,missing"), &registry, true);
        assert!(matches!(result, Err(ViewError::UnknownPreprocessor { key }) if key == "missing"));
    }

    #[test]
    fn test_template_stage_is_first() {
        let registry = PreprocessorRegistry::with_builtins();
        let loader: Arc<dyn TemplateLoader> = Arc::new(InMemoryTemplateLoader::new());
        let chain =
            PreprocessorChain::build(Some(loader), Some("deviceAdaptive"), &registry, false).unwrap();
        assert_eq!(chain.stage_names(), vec!["templates", "deviceAdaptive"]);
    }

    #[test]
    fn test_blank_configuration() {
        let registry = PreprocessorRegistry::with_builtins();
        let chain = PreprocessorChain::build(None, Some("   "), &registry, true).unwrap();
        assert!(chain.is_empty());
    }
}
