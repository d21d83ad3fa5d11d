use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{0} must not be empty")]
    EmptyCollection(&'static str),

    #[error("no entry named `{name}` (registered: {})", .registered.join(", "))]
    NotFound {
        name:       String,
        registered: Vec<String>,
    },

    #[error("operation canceled")]
    Canceled,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn disposed() -> io::Error { io::Error::other("spooled stream is disposed") }
