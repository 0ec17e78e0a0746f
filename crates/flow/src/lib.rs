pub mod agent;
pub mod article;
pub mod config;
pub mod metrics;
pub mod sinks;
pub mod template;
pub mod workflow;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<Error>,
    },
    #[error("Collaborator '{collaborator}' failed: {message}")]
    Collaborator { collaborator: String, message: String },
    #[error("Template error: {0}")]
    Template(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an error raised inside a stage body with the stage's name.
    pub fn in_stage(stage: &str, source: Error) -> Self {
        Error::Stage {
            stage: stage.to_string(),
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping any stage wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
