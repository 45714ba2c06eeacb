use thiserror::Error;

pub type ViewResult<T> = Result<T, ViewError>;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("XML parse error: {0}")]
    XmlError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid view: {0}")]
    InvalidView(String),

    // --- configuration errors ---

    #[error("Output charset is undefined. Configure 'output_charset' before generating host pages")]
    MissingOutputCharset,

    #[error("Unsupported output charset '{charset}'")]
    UnsupportedCharset { charset: String },

    #[error("Unknown preprocessor '{key}': no factory registered under this name")]
    UnknownPreprocessor { key: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    // --- preprocessing errors ---

    #[error("Template '{name}' not found")]
    TemplateNotFound { name: String },

    #[error("Circular template inclusion detected: '{name}'")]
    CircularTemplate { name: String },

    // --- view model errors ---

    #[error("Duplicate widget id '{id}': widget ids must be unique within the view")]
    DuplicateWidgetId { id: String },

    #[error("Multiple screen declarations found in view '{view_id}'")]
    MultipleScreens { view_id: String },

    #[error("Metadata serialization error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Failed to format host page: {0}")]
    Format(#[from] std::fmt::Error),

    // --- wrapped pipeline failures ---

    #[error("Error parsing file [{filename}] for device [{device}]: {source}")]
    ViewLoad {
        filename: String,
        device: String,
        #[source]
        source: Box<ViewError>,
    },

    #[error("Error extracting metadata from view '{view_id}': {source}")]
    MetadataExtraction {
        view_id: String,
        #[source]
        source: Box<ViewError>,
    },

    #[error("Error generating host page for view '{view_id}': {source}")]
    HtmlGeneration {
        view_id: String,
        #[source]
        source: Box<ViewError>,
    },
}

impl From<roxmltree::Error> for ViewError {
    fn from(err: roxmltree::Error) -> Self {
        ViewError::XmlError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ViewError {
    fn from(err: serde_yaml::Error) -> Self {
        ViewError::Config(err.to_string())
    }
}
