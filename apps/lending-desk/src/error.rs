//! Error types for the lending desk
use thiserror::Error;

/// Result type for desk operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The underlying pool refused the operation
    #[error(transparent)]
    Pool(#[from] nebula_pool::Error),

    /// Configuration could not be loaded
    #[error("Failed to load configuration: {0}")]
    Load(#[source] Box<figment::Error>),

    /// Configuration loaded but is unusable
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}
