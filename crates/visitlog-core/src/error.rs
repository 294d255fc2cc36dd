use thiserror::Error;

pub type Result<T> = std::result::Result<T, VisitlogError>;

#[derive(Error, Debug)]
pub enum VisitlogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required setting: {name}")]
    MissingSetting { name: String },
}

impl VisitlogError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
