use thiserror::Error;

/// Errors produced while decoding frames received from the assistant.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}
