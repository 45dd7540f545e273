/// Error taxonomy for the notification worker
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("malformed JSON body: {0}")]
    MalformedJson(String),

    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template render error: {0}")]
    TemplateRenderError(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transient error: {0}")]
    Transient(String),
}

impl ProcessingError {
    /// Terminal errors are never retried: the message is dead-lettered
    /// on the first attempt. Everything else is transient.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::MalformedJson(_)
                | Self::SchemaValidation(_)
                | Self::UnknownEventType(_)
                | Self::TemplateNotFound(_)
                | Self::TemplateRenderError(_)
        )
    }

    pub fn is_retriable(&self) -> bool {
        !self.is_terminal() && !matches!(self, Self::Config(_))
    }
}

impl From<serde_json::Error> for ProcessingError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedJson(err.to_string())
    }
}

impl From<std::env::VarError> for ProcessingError {
    fn from(err: std::env::VarError) -> Self {
        Self::Config(err.to_string())
    }
}
