//! The chat session engine: session lifecycle, streaming sends, title
//! derivation, and durable transcript storage.
pub mod core;
pub mod db;
pub mod error;
pub mod manager;
pub mod models;
pub mod prompt;

pub use self::core::{DEFAULT_AI_PROMPT, DEFAULT_HUMAN_PROMPT, DEFAULT_MODEL, Futago, FutagoBuilder};
pub use error::ChatError;
pub use manager::SessionManager;
pub use models::{ChatRecord, StreamOutcome, StreamStatus};
