use thiserror::Error;

/// Errors returned by bridge operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The handle is the sentinel, was destroyed, or belongs to another kind.
    #[error("opus-bridge: invalid handle {0:#x}")]
    InvalidHandle(i64),

    #[error("opus-bridge: null buffer")]
    NullBuffer,

    #[error("opus-bridge: buffer too small: need {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("opus-bridge: invalid parameter: {0}")]
    InvalidParameter(String),

    /// libopus returned a negative status.
    #[error("opus-bridge: codec rejected ({code}): {message}")]
    CodecRejected { code: i32, message: String },
}

impl BridgeError {
    /// Returns the raw codec status for `CodecRejected`.
    pub fn codec_code(&self) -> Option<i32> {
        match self {
            Self::CodecRejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}
