//! Keeps a text surface and a chat session in sync: parses the
//! pending prompt out of the transcript, streams the reply in, and
//! mirrors the finished transcript to disk.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Error, Result};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::chat::{Futago, StreamOutcome};
use crate::core::util::now_stamp;
use crate::gemini::{Content, Role};

use super::surface::{SharedSurface, Surface};

/// Divider between a speaker header and the turn body.
pub const SEPARATOR: &str = "-------------";

/// Period between typing indicator dots while waiting for the first
/// reply fragment.
const TYPING_INTERVAL: Duration = Duration::from_millis(500);

fn header(label: &str) -> String {
    format!("{}: {}", label, now_stamp())
}

/// Block appended after a finished turn: a blank line, the next
/// speaker's header, the separator, and an empty line for the body.
pub fn header_block(label: &str) -> Vec<String> {
    vec![
        String::new(),
        header(label),
        SEPARATOR.to_string(),
        String::new(),
    ]
}

/// Block that opens a fresh transcript. Same as [`header_block`]
/// without the leading blank line.
pub fn opening_block(label: &str) -> Vec<String> {
    vec![header(label), SEPARATOR.to_string(), String::new()]
}

/// Finds the message the user typed under the last human header but
/// has not sent yet. `None` when the transcript has no human header
/// or the trailing text is all whitespace.
pub fn extract_pending_prompt(lines: &[String], human_prompt: &str) -> Option<String> {
    let label = format!("{}:", human_prompt);
    let start = lines
        .iter()
        .enumerate()
        .rev()
        .find(|(index, line)| {
            line.starts_with(&label) && lines.get(index + 1).map(String::as_str) == Some(SEPARATOR)
        })
        .map(|(index, _)| index)?;

    let prompt = lines.get(start + 2..).unwrap_or_default().join("\n");
    if prompt.trim().is_empty() {
        None
    } else {
        Some(prompt)
    }
}

/// Renders persisted history as transcript lines. Used when a loaded
/// session has no mirror file to restore the surface from.
pub fn render_transcript(history: &[Content], human_prompt: &str, ai_prompt: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for turn in history {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        let label = match turn.role {
            Role::User => human_prompt,
            Role::Model => ai_prompt,
        };
        lines.push(header(label));
        lines.push(SEPARATOR.to_string());
        lines.extend(turn.text().split('\n').map(str::to_string));
    }
    lines
}

/// Best-effort inverse of [`render_transcript`]: rebuilds history
/// from transcript lines. Text before the first header and empty
/// blocks (like the dangling input block at the end of a mirror file)
/// are skipped, and headers keep their free-form timestamp suffix.
pub fn parse_transcript(lines: &[String], human_prompt: &str, ai_prompt: &str) -> Vec<Content> {
    let human_label = format!("{}:", human_prompt);
    let ai_label = format!("{}:", ai_prompt);

    let mut history = Vec::new();
    let mut current: Option<(Role, Vec<String>)> = None;

    let flush = |entry: Option<(Role, Vec<String>)>, history: &mut Vec<Content>| {
        if let Some((role, body)) = entry {
            let start = body.iter().position(|line| !line.trim().is_empty());
            let end = body.iter().rposition(|line| !line.trim().is_empty());
            if let (Some(start), Some(end)) = (start, end) {
                history.push(Content::new(role, &body[start..=end].join("\n")));
            }
        }
    };

    let mut index = 0;
    while index < lines.len() {
        let line = &lines[index];
        let next_is_separator = lines.get(index + 1).map(String::as_str) == Some(SEPARATOR);
        let role = if line.starts_with(&human_label) && next_is_separator {
            Some(Role::User)
        } else if line.starts_with(&ai_label) && next_is_separator {
            Some(Role::Model)
        } else {
            None
        };

        if let Some(role) = role {
            flush(current.take(), &mut history);
            current = Some((role, Vec::new()));
            index += 2;
            continue;
        }

        if let Some((_, body)) = current.as_mut() {
            body.push(line.clone());
        }
        index += 1;
    }
    flush(current, &mut history);

    history
}

/// Periodic task that animates a typing indicator by appending a dot
/// to one surface line until cancelled.
pub struct Ticker {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

impl Ticker {
    pub fn start(surface: SharedSurface, line: usize, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the immediate first tick
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut surface = surface.lock().await;
                // Checked under the surface lock so no dot lands once
                // a cancel has been observed
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(current) = surface.get_line(line).await else {
                    break;
                };
                if surface.set_line(line, current + ".").await.is_err() {
                    break;
                }
            }
        });
        Self { handle, stop }
    }

    pub async fn cancel(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.handle.abort();
        let _ = self.handle.await;
    }
}

async fn append_fragment(surface: &SharedSurface, fragment: &str) -> Result<(), Error> {
    let mut surface = surface.lock().await;
    let mut parts = fragment.split('\n');

    if let Some(first) = parts.next() {
        let last = surface.line_count().await? - 1;
        let current = surface.get_line(last).await?;
        surface
            .set_line(last, current + first.trim_end_matches('\r'))
            .await?;
    }

    let rest: Vec<String> = parts
        .map(|part| part.trim_end_matches('\r').to_string())
        .collect();
    if !rest.is_empty() {
        surface.append_lines(rest).await?;
    }

    Ok(())
}

/// Runs one full send cycle against a surface: extract the pending
/// prompt, stream the reply into the transcript with a typing
/// indicator, open the next input block, and mirror the result to the
/// session's transcript file.
///
/// The session lock is held for the whole cycle, so concurrent drives
/// of the same session queue up rather than interleave. Returns
/// `Ok(None)` when there is no pending prompt to send.
pub async fn drive(
    session: &Arc<Mutex<Futago>>,
    surface: &SharedSurface,
) -> Result<Option<StreamOutcome>, Error> {
    let mut session = session.lock().await;

    let lines = surface.lock().await.lines().await?;
    let Some(prompt) = extract_pending_prompt(&lines, session.human_prompt()) else {
        return Ok(None);
    };

    // Open the reply block; its trailing empty line is where the
    // indicator and then the reply go
    let indicator_line = {
        let mut surface = surface.lock().await;
        surface.append_lines(header_block(session.ai_prompt())).await?;
        surface.line_count().await? - 1
    };

    let mut ticker = Some(Ticker::start(
        surface.clone(),
        indicator_line,
        TYPING_INTERVAL,
    ));

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let consumer = async move {
        while let Some(fragment) = rx.recv().await {
            // First fragment replaces the typing indicator
            if let Some(ticker) = ticker.take() {
                ticker.cancel().await;
                surface
                    .lock()
                    .await
                    .set_line(indicator_line, String::new())
                    .await?;
            }
            append_fragment(surface, &fragment).await?;
        }
        Ok::<_, Error>(ticker)
    };

    let (outcome, leftover) = tokio::join!(session.send_message_stream(&prompt, tx), consumer);

    // No fragment ever arrived; clear the indicator ourselves
    if let Some(ticker) = leftover? {
        ticker.cancel().await;
        surface
            .lock()
            .await
            .set_line(indicator_line, String::new())
            .await?;
    }

    surface
        .lock()
        .await
        .append_lines(header_block(session.human_prompt()))
        .await?;

    if let Some(path) = session.chat_path() {
        let lines = surface.lock().await.lines().await?;
        let text = lines.join("\n") + "\n";
        if let Err(e) = tokio::fs::write(path, text).await {
            tracing::error!("Failed to mirror transcript to {}: {}", path.display(), e);
        }
    }

    Ok(Some(outcome))
}
