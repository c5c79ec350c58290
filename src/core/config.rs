use std::env;

use crate::chat::{DEFAULT_AI_PROMPT, DEFAULT_HUMAN_PROMPT, DEFAULT_MODEL};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_hostname: String,
    pub api_key: String,
    pub model: String,
    pub title_model: String,
    pub chat_dir: String,
    pub db_path: String,
    pub human_prompt: String,
    pub ai_prompt: String,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("FUTAGO_STORAGE_PATH").unwrap_or("./futago".to_string());
        let chat_dir = format!("{}/chat", storage_path);
        let db_path = format!("{}/db", storage_path);
        let api_hostname = env::var("FUTAGO_API_HOSTNAME")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
        // Validated at session build, not here, so commands that never
        // call the API still run without a key
        let api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
        let model = env::var("FUTAGO_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let title_model = env::var("FUTAGO_TITLE_MODEL").unwrap_or_else(|_| model.clone());
        let human_prompt =
            env::var("FUTAGO_HUMAN_PROMPT").unwrap_or_else(|_| DEFAULT_HUMAN_PROMPT.to_string());
        let ai_prompt =
            env::var("FUTAGO_AI_PROMPT").unwrap_or_else(|_| DEFAULT_AI_PROMPT.to_string());
        let debug = matches!(
            env::var("FUTAGO_DEBUG").as_deref(),
            Ok("1") | Ok("true")
        );

        Self {
            api_hostname,
            api_key,
            model,
            title_model,
            chat_dir,
            db_path,
            human_prompt,
            ai_prompt,
            debug,
        }
    }
}
