use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewError>;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("not found")]
    NotFound,

    #[error("capacity exhausted: {0}")]
    Capacity(&'static str),

    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("timestamp {ts} is behind the interval barrier {barrier}")]
    OutOfOrder { ts: u32, barrier: u32 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ViewError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ViewError::Capacity(_) | ViewError::Internal(_))
    }
}
