//! Durable key-value storage for chat sessions.
//!
//! Each session is stored as one master entry (model, parameters,
//! labels) plus one entry per history turn under an indexed key, so
//! appending a turn pair never rewrites the whole history blob:
//!
//! ```text
//! {title}/master          -> ChatRecord JSON
//! {title}/history/000000  -> Content JSON
//! {title}/history/000001  -> Content JSON
//! ```
use anyhow::{Error, Result};
use rusqlite::OptionalExtension;
use serde_json::json;
use tokio_rusqlite::Connection;

use crate::gemini::Content;

use super::models::ChatRecord;

fn master_key(title: &str) -> String {
    format!("{}/master", title)
}

fn history_key(title: &str, index: usize) -> String {
    format!("{}/history/{:06}", title, index)
}

fn history_prefix(title: &str) -> String {
    format!("{}/history/", title)
}

/// Loads the record and history for a title. Shape-tolerant: entries
/// that don't parse as the expected schema (written by an older
/// format version, or hand-edited) yield `None` rather than an error.
pub async fn get_chat(
    db: &Connection,
    title: &str,
) -> Result<Option<(ChatRecord, Vec<Content>)>, Error> {
    let master = master_key(title);
    let prefix = history_prefix(title);

    let (master_row, history_rows) = db
        .call(move |conn| {
            let master_row: Option<String> = conn
                .query_row("SELECT value FROM chat_kv WHERE key = ?", [&master], |row| {
                    row.get(0)
                })
                .optional()?;

            // Range scan over the title's history key-space, ordered
            // by the zero-padded index embedded in the key
            let mut stmt =
                conn.prepare("SELECT value FROM chat_kv WHERE key GLOB ?1 || '*' ORDER BY key")?;
            let history_rows = stmt
                .query_map([&prefix], |row| row.get::<_, String>(0))?
                .filter_map(Result::ok)
                .collect::<Vec<String>>();

            Ok((master_row, history_rows))
        })
        .await?;

    let Some(master_json) = master_row else {
        return Ok(None);
    };
    let Ok(record) = serde_json::from_str::<ChatRecord>(&master_json) else {
        tracing::warn!("Stored master record for {} has an unexpected shape", title);
        return Ok(None);
    };

    let mut history = Vec::with_capacity(history_rows.len());
    for row in &history_rows {
        match serde_json::from_str::<Content>(row) {
            Ok(turn) => history.push(turn),
            Err(_) => {
                tracing::warn!("Stored history entry for {} has an unexpected shape", title);
                return Ok(None);
            }
        }
    }

    Ok(Some((record, history)))
}

/// Writes the master record and replaces the history entries for a
/// title. All rows are written in one transaction so a reader never
/// sees a half-updated history.
pub async fn set_chat(
    db: &Connection,
    title: &str,
    record: &ChatRecord,
    history: &[Content],
) -> Result<(), Error> {
    let master = master_key(title);
    let prefix = history_prefix(title);
    let master_json = json!(record).to_string();
    let history_rows: Vec<(String, String)> = history
        .iter()
        .enumerate()
        .map(|(index, turn)| (history_key(title, index), json!(turn).to_string()))
        .collect();

    db.call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO chat_kv (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [&master, &master_json],
        )?;
        tx.execute("DELETE FROM chat_kv WHERE key GLOB ?1 || '*'", [&prefix])?;
        for (key, value) in &history_rows {
            tx.execute("INSERT INTO chat_kv (key, value) VALUES (?, ?)", [key, value])?;
        }
        tx.commit()?;
        Ok(())
    })
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::initialize_db;
    use crate::gemini::Role;

    async fn test_db() -> Connection {
        let db = Connection::open_in_memory().await.unwrap();
        db.call(|conn| {
            initialize_db(conn)?;
            Ok(())
        })
        .await
        .unwrap();
        db
    }

    fn test_record() -> ChatRecord {
        ChatRecord {
            model: "gemini-1.5-flash".to_string(),
            generation_config: None,
            safety_settings: None,
            human_prompt: "You".to_string(),
            ai_prompt: "Gemini".to_string(),
        }
    }

    #[tokio::test]
    async fn it_round_trips_a_chat() {
        let db = test_db().await;
        let history = vec![
            Content::new(Role::User, "Hello"),
            Content::new(Role::Model, "Hi there!"),
        ];

        set_chat(&db, "2024-01-28T10-00-00.000_greeting", &test_record(), &history)
            .await
            .unwrap();

        let (record, loaded) = get_chat(&db, "2024-01-28T10-00-00.000_greeting")
            .await
            .unwrap()
            .expect("chat should exist");
        assert_eq!(record, test_record());
        assert_eq!(loaded, history);
    }

    #[tokio::test]
    async fn it_returns_none_for_missing_title() {
        let db = test_db().await;
        let result = get_chat(&db, "no-such-chat").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn it_tolerates_a_malformed_master_record() {
        let db = test_db().await;
        db.call(|conn| {
            conn.execute(
                "INSERT INTO chat_kv (key, value) VALUES (?, ?)",
                ["broken/master", "{\"not\": \"a record\"}"],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        // Not found rather than an error
        let result = get_chat(&db, "broken").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn it_tolerates_a_malformed_history_entry() {
        let db = test_db().await;
        set_chat(&db, "partly-broken", &test_record(), &[Content::new(Role::User, "Hi")])
            .await
            .unwrap();
        db.call(|conn| {
            conn.execute(
                "UPDATE chat_kv SET value = 'garbage' WHERE key = 'partly-broken/history/000000'",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let result = get_chat(&db, "partly-broken").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn it_replaces_history_on_rewrite() {
        let db = test_db().await;
        let long = vec![
            Content::new(Role::User, "a"),
            Content::new(Role::Model, "b"),
            Content::new(Role::User, "c"),
            Content::new(Role::Model, "d"),
        ];
        set_chat(&db, "rewrite", &test_record(), &long).await.unwrap();

        let short = vec![Content::new(Role::User, "only")];
        set_chat(&db, "rewrite", &test_record(), &short).await.unwrap();

        let (_, history) = get_chat(&db, "rewrite").await.unwrap().unwrap();
        assert_eq!(history, short);
    }

    #[tokio::test]
    async fn it_keeps_titles_isolated() {
        let db = test_db().await;
        set_chat(&db, "first", &test_record(), &[Content::new(Role::User, "one")])
            .await
            .unwrap();
        set_chat(&db, "second", &test_record(), &[Content::new(Role::User, "two")])
            .await
            .unwrap();

        let (_, first) = get_chat(&db, "first").await.unwrap().unwrap();
        let (_, second) = get_chat(&db, "second").await.unwrap().unwrap();
        assert_eq!(first[0].text(), "one");
        assert_eq!(second[0].text(), "two");
    }
}
