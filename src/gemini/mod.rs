//! Client for the Google Generative Language (Gemini) API.
pub mod core;

pub use self::core::{
    Content, GenerationConfig, Part, Role, SafetySettings, generate_content, response_text,
    stream_generate_content,
};
