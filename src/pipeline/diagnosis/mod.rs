pub mod types;
pub mod client_types;
pub mod client;
pub mod prompt;
pub mod parser;
pub mod state;
pub mod orchestrator;

pub use types::*;
pub use client_types::*;
pub use client::*;
pub use prompt::*;
pub use parser::*;
pub use state::*;
pub use orchestrator::*;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiagnosisError {
    #[error("Chat API is not reachable at {0}")]
    Connection(String),

    #[error("Chat API returned error (status {status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Chat API returned no choices")]
    EmptyChoices,

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("The model flagged the input as not an emotional release")]
    InvalidInput,
}

/// How the UI should recover from a failed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network, HTTP status or envelope failure. Generic error + manual retry.
    Transport,
    /// The model answered but the payload could not be decoded.
    Decode,
    /// The model rejected the text. "Please revise your input" affordance.
    InvalidInput,
}

impl DiagnosisError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection(_)
            | Self::ApiError { .. }
            | Self::HttpClient(_)
            | Self::ResponseParsing(_) => ErrorCategory::Transport,
            Self::EmptyChoices | Self::MalformedResponse(_) | Self::JsonParsing(_) => {
                ErrorCategory::Decode
            }
            Self::InvalidInput => ErrorCategory::InvalidInput,
        }
    }

    /// Message shown to the user. Decode failures stay generic.
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::Transport => format!("Error: {self}"),
            ErrorCategory::Decode => "Unable to read the response. Please try again.".to_string(),
            ErrorCategory::InvalidInput => {
                "Please revise what you wrote and release again.".to_string()
            }
        }
    }
}
