use std::io::{Read, Write};
use std::sync::Arc;

use crate::charset::OutputCharset;
use crate::config::{CruxConfig, Environment};
use crate::document::ViewDocument;
use crate::error::{ViewError, ViewResult};
use crate::factory::XmlParserFactory;
use crate::loader::ViewLoader;
use crate::metadata::ViewMetadata;
use crate::preprocessor::{PreprocessorChain, PreprocessorRegistry};
use crate::view_parser::{ParserMode, ViewParser};

/// Compiles view documents into widget metadata and host pages.
///
/// A processor is immutable apart from its output settings and can be shared
/// between threads; the only state shared between processors is the
/// [`XmlParserFactory`].
#[derive(Debug)]
pub struct ViewProcessor {
    chain: PreprocessorChain,
    environment: Environment,
    force_indent: bool,
    output_charset: Option<String>,
    lazy_widget_types: Vec<String>,
}

impl ViewProcessor {
    pub fn new(view_loader: Option<Arc<dyn ViewLoader>>, config: &CruxConfig) -> ViewResult<Self> {
        Self::with_registry(view_loader, config, &PreprocessorRegistry::with_builtins())
    }

    /// Like [`ViewProcessor::new`], resolving configured preprocessor keys in `registry`.
    pub fn with_registry(
        view_loader: Option<Arc<dyn ViewLoader>>,
        config: &CruxConfig,
        registry: &PreprocessorRegistry,
    ) -> ViewResult<Self> {
        // Make sure the shared parser exists before the first view arrives.
        XmlParserFactory::shared();

        let chain = PreprocessorChain::build(
            view_loader.map(|loader| loader.template_loader()),
            config.preprocessors.as_deref(),
            registry,
            config.strict_preprocessors,
        )?;

        tracing::debug!("View processor ready with stages {:?}", chain.stage_names());

        Ok(ViewProcessor {
            chain,
            environment: config.environment,
            force_indent: config.force_indent,
            output_charset: config.output_charset.clone(),
            lazy_widget_types: config.lazy_widget_types.clone(),
        })
    }

    pub fn chain(&self) -> &PreprocessorChain {
        &self.chain
    }

    /// Extract the widget and screen metadata of a view.
    pub fn extract_metadata(
        &self,
        view_id: &str,
        view: &ViewDocument,
        legacy_markup: bool,
    ) -> ViewResult<ViewMetadata> {
        let parser = self.parser(view_id, ParserMode::ExtractMetadata, legacy_markup);

        let result = parser
            .extract_crux_metadata(view)
            .and_then(|json| serde_json::from_str::<ViewMetadata>(&json).map_err(ViewError::from));

        result.map_err(|e| {
            tracing::error!("Error extracting metadata from view '{}': {}", view_id, e);
            ViewError::MetadataExtraction {
                view_id: view_id.to_string(),
                source: Box::new(e),
            }
        })
    }

    /// Write the host page of a view to `out` in the configured charset.
    ///
    /// The sink is flushed but stays open. Nothing is written when the
    /// output charset is missing or unsupported.
    pub fn generate_html<W: Write>(
        &self,
        view_id: &str,
        view: &ViewDocument,
        out: &mut W,
    ) -> ViewResult<()> {
        let charset = match self.output_charset.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => OutputCharset::from_name(name)?,
            _ => {
                tracing::error!("Output charset is undefined; cannot generate view '{}'", view_id);
                return Err(ViewError::MissingOutputCharset);
            }
        };

        // Host pages understand both markups, so legacy widgets get the
        // placeholders their metadata points at.
        let parser = self.parser(view_id, ParserMode::GenerateHtml, true);
        let result = (|| -> ViewResult<()> {
            let mut html = String::new();
            parser.generate_html_host_page(view, &mut html)?;
            out.write_all(&charset.encode(&html))?;
            out.flush()?;
            Ok(())
        })();

        result.map_err(|e| {
            tracing::error!("Error generating host page for view '{}': {}", view_id, e);
            ViewError::HtmlGeneration {
                view_id: view_id.to_string(),
                source: Box::new(e),
            }
        })
    }

    /// Parse a view source and run it through the preprocessor chain.
    ///
    /// `None` input yields `Ok(None)`.
    pub fn load_view<R: Read>(
        &self,
        input: Option<R>,
        filename: &str,
        device: &str,
    ) -> ViewResult<Option<ViewDocument>> {
        let Some(mut input) = input else {
            return Ok(None);
        };

        let result = (|| -> ViewResult<ViewDocument> {
            let mut source = String::new();
            input.read_to_string(&mut source)?;
            let document = XmlParserFactory::shared().parse(&source)?;
            self.chain.preprocess(document, device)
        })();

        match result {
            Ok(document) => Ok(Some(document)),
            Err(e) => {
                tracing::error!(
                    "Error parsing file [{}] for device [{}]: {}",
                    filename,
                    device,
                    e
                );
                Err(ViewError::ViewLoad {
                    filename: filename.to_string(),
                    device: device.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    pub fn set_force_indent(&mut self, force: bool) {
        self.force_indent = force;
    }

    pub fn set_output_charset(&mut self, charset: Option<String>) {
        self.output_charset = charset;
    }

    pub fn output_charset(&self) -> Option<&str> {
        self.output_charset.as_deref()
    }

    pub fn must_indent(&self) -> bool {
        !self.environment.is_production() || self.force_indent
    }

    fn parser(&self, view_id: &str, mode: ParserMode, legacy_markup: bool) -> ViewParser {
        ViewParser::new(view_id, mode, self.must_indent(), legacy_markup)
            .with_lazy_widget_types(&self.lazy_widget_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(environment: Environment) -> CruxConfig {
        CruxConfig {
            environment,
            ..CruxConfig::default()
        }
    }

    #[test]
    fn test_processor_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ViewProcessor>();
    }

    #[test]
    fn test_must_indent() {
        let mut processor = ViewProcessor::new(None, &config(Environment::Production)).unwrap();
        assert!(!processor.must_indent());
        processor.set_force_indent(true);
        assert!(processor.must_indent());

        let processor = ViewProcessor::new(None, &config(Environment::Development)).unwrap();
        assert!(processor.must_indent());
    }

    #[test]
    fn test_output_charset_default_and_override() {
        let mut processor = ViewProcessor::new(None, &config(Environment::Production)).unwrap();
        assert_eq!(processor.output_charset(), Some("UTF-8"));
        processor.set_output_charset(Some("ISO-8859-1".to_string()));
        assert_eq!(processor.output_charset(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_load_view_without_input() {
        let processor = ViewProcessor::new(None, &config(Environment::Production)).unwrap();
        let result = processor.load_view(None::<&[u8]>, "missing.crux.xml", "all");
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_load_view_wraps_parse_errors() {
        let processor = ViewProcessor::new(None, &config(Environment::Production)).unwrap();
        let result = processor.load_view(Some("<broken".as_bytes()), "broken.crux.xml", "phone");
        match result {
            Err(ViewError::ViewLoad { filename, device, .. }) => {
                assert_eq!(filename, "broken.crux.xml");
                assert_eq!(device, "phone");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_charset_writes_nothing() {
        let mut processor = ViewProcessor::new(None, &config(Environment::Production)).unwrap();
        processor.set_output_charset(Some("EBCDIC".to_string()));
        let doc = XmlParserFactory::shared().parse("<html/>").unwrap();
        let mut out = Vec::new();
        let result = processor.generate_html("v", &doc, &mut out);
        assert!(matches!(result, Err(ViewError::UnsupportedCharset { .. })));
        assert!(out.is_empty());
    }
}
