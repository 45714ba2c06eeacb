//! # Crux view compiler
//!
//! Build-time half of Crux: turns declarative XML views into host HTML pages
//! and widget metadata consumed by the screen runtime.
//!
//! ## Pipeline
//! - the shared [`XmlParserFactory`] parses the view, resolving the entities
//!   of `crux-view.dtd` offline
//! - the [`PreprocessorChain`] expands templates, prunes device-specific markup
//!   and runs any user stages
//! - the [`ViewParser`] extracts [`ViewMetadata`] or writes the host page
//!
//! ## Example
//! ```ignore
//! use crux_view::{CruxConfig, ViewProcessor};
//!
//! let processor = ViewProcessor::new(None, &CruxConfig::default())?;
//! let view = processor.load_view(Some(file), "orders.crux.xml", "all")?.unwrap();
//! let metadata = processor.extract_metadata("orders", &view, false)?;
//! processor.generate_html("orders", &view, &mut std::io::stdout())?;
//! ```

pub mod charset;
pub mod config;
pub mod document;
pub mod error;
pub mod factory;
pub mod loader;
pub mod metadata;
pub mod preprocessor;
pub mod processor;
pub mod view_parser;

// --- Core types ---
pub use config::{CruxConfig, Environment};
pub use document::{Element, Node, QName, ViewDocument};
pub use error::{ViewError, ViewResult};
pub use metadata::{ScreenDeclaration, ViewMetadata, WidgetDeclaration};

// --- Pipeline ---
pub use factory::XmlParserFactory;
pub use loader::{DirectoryViewLoader, ViewLoader};
pub use preprocessor::{PreprocessorChain, PreprocessorRegistry, ViewPreprocessor};
pub use processor::ViewProcessor;
pub use view_parser::{ParserMode, ViewParser};
