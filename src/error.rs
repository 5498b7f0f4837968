use crate::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum SpcmError {
    #[error("failed to open card {device}: {reason}")]
    Open { device: String, reason: String },

    #[error("invalid {param}: {reason}")]
    InvalidConfiguration { param: &'static str, reason: String },

    #[error("driver error {code} (register {register}, value {value}): {message}")]
    Driver {
        code: ErrorCode,
        register: u32,
        value: i32,
        message: String,
    },

    #[error("FIFO overrun: {available} bytes pending in a {capacity} byte buffer")]
    Overrun { available: usize, capacity: usize },

    #[error("card session is closed")]
    Closed,

    #[error("acquisition worker panicked")]
    WorkerPanicked,

    #[error("failed to spawn acquisition worker: {0}")]
    Spawn(#[from] std::io::Error),
}

impl SpcmError {
    pub(crate) fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            param,
            reason: reason.into(),
        }
    }

    pub fn is_overrun(&self) -> bool {
        matches!(self, Self::Overrun { .. })
    }
}

pub type Result<T, E = SpcmError> = std::result::Result<T, E>;
