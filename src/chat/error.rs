use thiserror::Error;

/// Error taxonomy for chat sessions. Construction and one-shot errors
/// propagate to the command layer; failures inside the streaming path
/// are captured into a
/// [`StreamOutcome`](super::models::StreamOutcome) instead.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Missing or empty API credential at session construction. Fatal
    /// and surfaced immediately, no retry.
    #[error("missing GEMINI_API_KEY")]
    MissingApiKey,

    /// An operation that needs an open conversation context ran
    /// before one existed.
    #[error("chat session is not started")]
    SessionNotStarted,

    /// A one-shot generation call returned no usable text.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// A load targeted a title with no stored record.
    #[error("chat \"{0}\" was not found")]
    NotFound(String),
}
