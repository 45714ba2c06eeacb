use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ViewResult;

/// Environment variable selecting the runtime environment (`production` or `development`).
pub const ENV_VAR: &str = "CRUX_ENV";

/// Widget types whose children are instantiated on demand.
pub const DEFAULT_LAZY_WIDGET_TYPES: &[&str] = &[
    "gwt:tabPanel",
    "gwt:stackPanel",
    "gwt:decoratedStackPanel",
    "gwt:disclosurePanel",
    "gwt:deckPanel",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Reads `CRUX_ENV`; anything other than `production` means development.
    pub fn from_env() -> Self {
        match std::env::var(ENV_VAR) {
            Ok(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::from_env()
    }
}

/// Build-time settings of the view compiler, usually read from `crux.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CruxConfig {
    /// Comma-separated preprocessor keys, applied after the template stage.
    pub preprocessors: Option<String>,
    pub environment: Environment,
    /// Charset of generated host pages. `None` makes HTML generation fail.
    pub output_charset: Option<String>,
    /// Indent output even in production.
    pub force_indent: bool,
    /// Fail instead of skipping preprocessor keys that have no factory.
    pub strict_preprocessors: bool,
    pub lazy_widget_types: Vec<String>,
}

impl Default for CruxConfig {
    fn default() -> Self {
        CruxConfig {
            preprocessors: None,
            environment: Environment::default(),
            output_charset: Some("UTF-8".to_string()),
            force_indent: false,
            strict_preprocessors: false,
            lazy_widget_types: DEFAULT_LAZY_WIDGET_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CruxConfig {
    pub fn from_yaml(yaml: &str) -> ViewResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ViewResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
