use std::fs;
use std::path::Path;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_rusqlite::Connection;

use crate::chat::db::get_chat;
use crate::chat::{ChatError, Futago, FutagoBuilder, SessionManager};
use crate::core::AppConfig;
use crate::core::db::{async_db, initialize_db};
use crate::transcript::surface::Surface;
use crate::transcript::sync::{drive, header_block, opening_block, parse_transcript, render_transcript};
use crate::transcript::ConsoleSurface;

fn builder(config: &AppConfig, db: &Connection, model: &str) -> FutagoBuilder {
    FutagoBuilder::new(&config.api_hostname, &config.api_key, model)
        .database(db)
        .chat_dir(Path::new(&config.chat_dir))
        .title_model(&config.title_model)
        .labels(&config.human_prompt, &config.ai_prompt)
        .debug(config.debug)
}

/// Restores a stored chat: configuration and history from the store,
/// transcript lines from the mirror file when one exists.
async fn load_chat(
    config: &AppConfig,
    db: &Connection,
    title: &str,
    model: Option<&str>,
) -> Result<(Futago, Vec<String>)> {
    let (record, history) = get_chat(db, title)
        .await?
        .ok_or_else(|| ChatError::NotFound(title.to_string()))?;

    let mirror_path = Path::new(&config.chat_dir).join(format!("{}.md", title));
    let (history, lines) = match tokio::fs::read_to_string(&mirror_path).await {
        Ok(content) => {
            let lines: Vec<String> = content.lines().map(str::to_string).collect();
            let parsed = parse_transcript(&lines, &record.human_prompt, &record.ai_prompt);
            // A hand-edited mirror that no longer parses falls back to
            // the stored history
            let history = if parsed.is_empty() { history } else { parsed };
            (history, lines)
        }
        Err(_) => {
            let mut lines = render_transcript(&history, &record.human_prompt, &record.ai_prompt);
            lines.extend(header_block(&record.human_prompt));
            (history, lines)
        }
    };

    let mut builder = builder(config, db, model.unwrap_or(&record.model))
        .labels(&record.human_prompt, &record.ai_prompt)
        .title(title)
        .history(history);
    if let Some(generation_config) = record.generation_config.clone() {
        builder = builder.generation_config(generation_config);
    }
    if let Some(safety_settings) = record.safety_settings.clone() {
        builder = builder.safety_settings(safety_settings);
    }

    Ok((builder.build()?, lines))
}

pub async fn run(config: &AppConfig, load: Option<&str>, model: Option<&str>) -> Result<()> {
    fs::create_dir_all(&config.chat_dir)
        .unwrap_or_else(|err| println!("Ignoring chat directory create failed: {}", err));
    fs::create_dir_all(&config.db_path)
        .unwrap_or_else(|err| println!("Ignoring db directory create failed: {}", err));

    let db = async_db(&config.db_path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;

    let (futago, lines) = match load {
        Some(title) => load_chat(config, &db, title, model).await?,
        None => {
            let mut futago = builder(config, &db, model.unwrap_or(&config.model)).build()?;
            futago.start_chat(None);
            (futago, opening_block(&config.human_prompt))
        }
    };

    let mut manager = SessionManager::new();
    let key = load.unwrap_or("current").to_string();
    let session = manager.insert(&key, futago);
    let surface = ConsoleSurface::with_lines(lines).shared();

    let mut rl = DefaultEditor::new()?;
    loop {
        println!();
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line == "exit" || line == "quit" {
                    break;
                }
                if line.trim().is_empty() {
                    continue;
                }
                {
                    let mut surface = surface.lock().await;
                    let last = surface.line_count().await? - 1;
                    surface.set_line(last, line).await?;
                }
                if let Some(outcome) = drive(&session, &surface).await? {
                    if !outcome.is_completed() {
                        if let Some(error) = &outcome.error {
                            eprintln!("\nError: {:#}", error);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    manager.remove(&key);

    Ok(())
}
