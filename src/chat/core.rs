use std::path::{Path, PathBuf};

use anyhow::{Error, Result};
use regex::Regex;
use tokio::sync::mpsc;
use tokio_rusqlite::Connection;

use crate::core::util::now_stamp;
use crate::gemini::{self, Content, GenerationConfig, Role, SafetySettings};

use super::db::{get_chat, set_chat};
use super::error::ChatError;
use super::models::{ChatRecord, StreamOutcome, StreamStatus};
use super::prompt::TITLE_PROMPT;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_HUMAN_PROMPT: &str = "You";
pub const DEFAULT_AI_PROMPT: &str = "Gemini";

/// One chat session against the Gemini API: model configuration,
/// in-memory history, and the streaming send/persist pipeline.
///
/// Use `Futago::builder()` to construct a valid session. The session
/// moves through `Uninitialized -> ContextOpen -> {Idle <-> Streaming}`;
/// `start_chat` opens the context and `send_message_stream` runs one
/// streaming turn. Callers that need mutual exclusion across sends
/// put the session behind a `tokio::sync::Mutex` (see
/// `transcript::sync::drive`).
pub struct Futago {
    api_hostname: String,
    api_key: String,
    model: String,
    title_model: String,
    db: Option<Connection>,
    chat_dir: Option<PathBuf>,
    generation_config: Option<GenerationConfig>,
    safety_settings: Option<SafetySettings>,
    human_prompt: String,
    ai_prompt: String,
    debug: bool,
    // None until a conversation context is opened
    history: Option<Vec<Content>>,
    pub chat_title: Option<String>,
    pub chat_path: Option<PathBuf>,
}

/// Merge freshly produced turns onto previously persisted history. A
/// dangling trailing user turn in the persisted history (left behind
/// by an interrupted send) is dropped first so the merged history
/// keeps alternating from a user turn.
pub fn merge_history(mut persisted: Vec<Content>, new_turns: Vec<Content>) -> Vec<Content> {
    if persisted.last().map(|turn| turn.role) == Some(Role::User) {
        persisted.pop();
    }
    persisted.extend(new_turns);
    persisted
}

fn sanitize_title(raw: &str) -> String {
    let slug = Regex::new(r"[^0-9A-Za-z]+")
        .unwrap()
        .replace_all(raw.trim(), "-")
        .trim_matches('-')
        .to_string();
    slug.chars().take(48).collect()
}

impl Futago {
    pub fn builder(api_hostname: &str, api_key: &str, model: &str) -> FutagoBuilder {
        FutagoBuilder::new(api_hostname, api_key, model)
    }

    /// Opens the conversation context, optionally seeded with prior
    /// history. Callable again; the last call wins.
    pub fn start_chat(&mut self, history: Option<Vec<Content>>) {
        self.history = Some(history.unwrap_or_default());
    }

    pub fn history(&self) -> &[Content] {
        self.history.as_deref().unwrap_or_default()
    }

    pub fn human_prompt(&self) -> &str {
        &self.human_prompt
    }

    pub fn ai_prompt(&self) -> &str {
        &self.ai_prompt
    }

    pub fn chat_path(&self) -> Option<&Path> {
        self.chat_path.as_deref()
    }

    /// The persisted form of this session's configuration.
    pub fn record(&self) -> ChatRecord {
        ChatRecord {
            model: self.model.clone(),
            generation_config: self.generation_config.clone(),
            safety_settings: self.safety_settings.clone(),
            human_prompt: self.human_prompt.clone(),
            ai_prompt: self.ai_prompt.clone(),
        }
    }

    /// Fire-and-forget single request/response call, independent of
    /// the conversation context. Used for one-shot tasks like commit
    /// message generation.
    pub async fn generate_content(&self, prompt: &str) -> Result<String, Error> {
        let contents = vec![Content::new(Role::User, prompt)];
        let response = gemini::generate_content(
            &contents,
            &self.generation_config,
            &self.safety_settings,
            &self.api_hostname,
            &self.api_key,
            &self.model,
        )
        .await?;
        gemini::response_text(&response).ok_or_else(|| ChatError::EmptyResponse.into())
    }

    /// Derives a short title for this session from its first message
    /// via the title model, sanitized into a filesystem-safe slug. A
    /// millisecond timestamp prefix keeps titles globally unique even
    /// when two sessions produce the same title text. Sets
    /// `chat_title` and, when a chat directory is configured,
    /// `chat_path`.
    pub async fn derive_title(&mut self, seed: &str) -> Result<String, Error> {
        let prompt = format!("{}\n\n{}", TITLE_PROMPT, seed);
        let contents = vec![Content::new(Role::User, &prompt)];
        let response = gemini::generate_content(
            &contents,
            &self.generation_config,
            &self.safety_settings,
            &self.api_hostname,
            &self.api_key,
            &self.title_model,
        )
        .await?;
        let text = gemini::response_text(&response).ok_or(ChatError::EmptyResponse)?;

        let title = format!("{}_{}", now_stamp(), sanitize_title(&text));
        if let Some(dir) = &self.chat_dir {
            self.chat_path = Some(dir.join(format!("{}.md", title)));
        }
        if self.debug {
            tracing::debug!("Derived chat title {}", title);
        }
        self.chat_title = Some(title.clone());
        Ok(title)
    }

    /// Sends one message on the conversation context and streams the
    /// reply. Fragments are forwarded on `tx` in arrival order; after
    /// the stream ends the new user/model turn pair is merged onto
    /// the persisted history and written back to the store.
    ///
    /// Failures anywhere in the cycle are captured in the returned
    /// [`StreamOutcome`] rather than thrown, so a live surface is
    /// never torn down mid-stream.
    pub async fn send_message_stream(
        &mut self,
        message: &str,
        tx: mpsc::UnboundedSender<String>,
    ) -> StreamOutcome {
        // Forward fragments through an intermediate channel so the
        // outcome can tell a failure before any output apart from a
        // stream that stopped short.
        let (inner_tx, mut inner_rx) = mpsc::unbounded_channel::<String>();
        let forwarded = tokio::spawn(async move {
            let mut buf = String::new();
            while let Some(fragment) = inner_rx.recv().await {
                buf += &fragment;
                let _ = tx.send(fragment);
            }
            buf
        });

        let result = self.send_message_inner(message, inner_tx).await;
        let forwarded = forwarded.await.unwrap_or_default();

        match result {
            Ok(text) => StreamOutcome {
                status: StreamStatus::Completed,
                text,
                error: None,
            },
            Err(e) => {
                tracing::error!("Chat stream for {:?} failed: {:#}", self.chat_title, e);
                let status = if forwarded.is_empty() {
                    StreamStatus::Failed
                } else {
                    StreamStatus::Partial
                };
                StreamOutcome {
                    status,
                    text: forwarded,
                    error: Some(e),
                }
            }
        }
    }

    async fn send_message_inner(
        &mut self,
        message: &str,
        tx: mpsc::UnboundedSender<String>,
    ) -> Result<String, Error> {
        if self.history.is_none() {
            // Self-heal rather than surfacing SessionNotStarted:
            // sending on a fresh session opens a default context
            self.start_chat(None);
        }

        // The title must exist before any persistence can happen
        if self.chat_title.is_none() {
            self.derive_title(message).await?;
        }

        let user_turn = Content::new(Role::User, message);
        let history = self
            .history
            .as_mut()
            .ok_or(ChatError::SessionNotStarted)?;
        history.push(user_turn.clone());
        let contents = history.clone();

        let result = gemini::stream_generate_content(
            tx,
            &contents,
            &self.generation_config,
            &self.safety_settings,
            &self.api_hostname,
            &self.api_key,
            &self.model,
        )
        .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                // Keep the in-memory history alternating when the
                // stream dies before a reply
                if let Some(history) = self.history.as_mut() {
                    history.pop();
                }
                return Err(e);
            }
        };

        let model_turn = Content::new(Role::Model, &response);
        if let Some(history) = self.history.as_mut() {
            history.push(model_turn.clone());
        }

        self.persist(user_turn, model_turn).await?;

        Ok(response)
    }

    async fn persist(&self, user_turn: Content, model_turn: Content) -> Result<(), Error> {
        // A session without a store (one-shot helpers) skips
        // persistence entirely
        let (Some(db), Some(title)) = (&self.db, &self.chat_title) else {
            return Ok(());
        };

        let persisted = get_chat(db, title)
            .await?
            .map(|(_, history)| history)
            .unwrap_or_default();
        let merged = merge_history(persisted, vec![user_turn, model_turn]);
        set_chat(db, title, &self.record(), &merged).await?;

        Ok(())
    }
}

pub struct FutagoBuilder {
    api_hostname: String,
    api_key: String,
    model: String,
    title_model: String,
    db: Option<Connection>,
    chat_dir: Option<PathBuf>,
    generation_config: Option<GenerationConfig>,
    safety_settings: Option<SafetySettings>,
    human_prompt: String,
    ai_prompt: String,
    debug: bool,
    history: Option<Vec<Content>>,
    title: Option<String>,
}

impl FutagoBuilder {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            title_model: model.to_string(),
            db: None,
            chat_dir: None,
            generation_config: None,
            safety_settings: None,
            human_prompt: DEFAULT_HUMAN_PROMPT.to_string(),
            ai_prompt: DEFAULT_AI_PROMPT.to_string(),
            debug: false,
            history: None,
            title: None,
        }
    }

    /// Validates the configuration and constructs the session. Fails
    /// when the API credential is absent.
    pub fn build(self) -> Result<Futago, Error> {
        if self.api_key.is_empty() {
            return Err(ChatError::MissingApiKey.into());
        }

        let chat_path = match (&self.title, &self.chat_dir) {
            (Some(title), Some(dir)) => Some(dir.join(format!("{}.md", title))),
            _ => None,
        };

        Ok(Futago {
            api_hostname: self.api_hostname,
            api_key: self.api_key,
            model: self.model,
            title_model: self.title_model,
            db: self.db,
            chat_dir: self.chat_dir,
            generation_config: self.generation_config,
            safety_settings: self.safety_settings,
            human_prompt: self.human_prompt,
            ai_prompt: self.ai_prompt,
            debug: self.debug,
            history: self.history,
            chat_title: self.title,
            chat_path,
        })
    }

    pub fn database(mut self, db: &Connection) -> Self {
        self.db = Some(db.clone());
        self
    }

    pub fn chat_dir(mut self, dir: &Path) -> Self {
        self.chat_dir = Some(dir.to_path_buf());
        self
    }

    /// Secondary model used for title derivation; defaults to the
    /// chat model.
    pub fn title_model(mut self, model: &str) -> Self {
        self.title_model = model.to_string();
        self
    }

    pub fn generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    pub fn safety_settings(mut self, settings: SafetySettings) -> Self {
        self.safety_settings = Some(settings);
        self
    }

    pub fn labels(mut self, human_prompt: &str, ai_prompt: &str) -> Self {
        self.human_prompt = human_prompt.to_string();
        self.ai_prompt = ai_prompt.to_string();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Seeds the conversation context; the session starts in
    /// `ContextOpen` with this history.
    pub fn history(mut self, history: Vec<Content>) -> Self {
        self.history = Some(history);
        self
    }

    /// An already-derived title (loaded sessions); also fixes the
    /// transcript mirror path when a chat directory is set.
    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
}
