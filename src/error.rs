use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Api { message: String },

    #[error("Picture-in-picture is not available right now")]
    PipUnavailable,
}

pub type Result<T> = std::result::Result<T, Error>;
