//! Core models for a persisted chat session.
use anyhow::Error;
use serde::{Deserialize, Serialize};

use crate::gemini::{GenerationConfig, SafetySettings};

/// The persisted form of a session minus transient connection state.
/// Field names stay camelCase on disk so records written by older
/// plugin versions remain readable.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_settings: Option<SafetySettings>,
    pub human_prompt: String,
    pub ai_prompt: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    /// The stream ran to completion and history was persisted.
    Completed,
    /// Some fragments were delivered before the failure; the surface
    /// may show partial output and nothing was persisted.
    Partial,
    /// The send failed before any fragment was delivered.
    Failed,
}

/// Structured result of a streaming send. Failures are captured here
/// rather than thrown so a live editing session never crashes
/// mid-stream; the calling layer decides whether to show an
/// indicator.
#[derive(Debug)]
pub struct StreamOutcome {
    pub status: StreamStatus,
    /// Full reply on completion, the partial concatenation otherwise.
    pub text: String,
    pub error: Option<Error>,
}

impl StreamOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == StreamStatus::Completed
    }
}
