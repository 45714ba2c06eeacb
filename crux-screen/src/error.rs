use thiserror::Error;

pub type ScreenResult<T> = Result<T, ScreenError>;

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- controller errors ---

    #[error("No controller registered for call '{call}'")]
    UnknownController { call: String },

    #[error("Controller call '{call}' failed: {reason}")]
    ControllerFailed { call: String, reason: String },

    // --- cross-window errors ---

    #[error("Window '{window}' has no opener")]
    NoOpener { window: String },

    #[error("Window '{window}' exposes no controller accessor")]
    NoControllerAccessor { window: String },

    #[error("Screen '{id}' is no longer available")]
    ScreenGone { id: String },

    // --- runtime state errors ---

    #[error("No screen has been created for this page")]
    NoScreen,

    #[error("Cannot create widget '{id}' of type '{widget_type}': {reason}")]
    WidgetCreation {
        id: String,
        widget_type: String,
        reason: String,
    },
}
