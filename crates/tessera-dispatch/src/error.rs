use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Peer answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not decode peer response: {0}")]
    Decode(String),

    #[error("Expected a {expected} completion, got {got}")]
    UnexpectedCompletion {
        expected: &'static str,
        got: &'static str,
    },
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DispatchError::Decode(e.to_string())
        } else {
            DispatchError::Transport(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
