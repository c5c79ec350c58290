//! Test utilities for integration tests
use std::fs;

use tempfile::TempDir;
use tokio_rusqlite::Connection;

use futago::core::db::{async_db, initialize_db};

/// Creates a temporary storage layout (chat dir plus initialized db)
/// mirroring what the CLI sets up on first run. The `TempDir` must be
/// kept alive for the duration of the test.
pub async fn test_storage() -> (TempDir, Connection) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let chat_dir = dir.path().join("chat");
    let db_path = dir.path().join("db");
    fs::create_dir_all(&chat_dir).expect("Failed to create chat directory");
    fs::create_dir_all(&db_path).expect("Failed to create db directory");

    let db = async_db(db_path.to_str().unwrap())
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        initialize_db(conn).expect("Failed to initialize db");
        Ok(())
    })
    .await
    .unwrap();

    (dir, db)
}

/// SSE body for a reply streamed fragment by fragment, with a STOP
/// finish reason on the last chunk.
pub fn sse_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for (index, fragment) in fragments.iter().enumerate() {
        let finish = if index == fragments.len() - 1 {
            r#","finishReason":"STOP""#
        } else {
            ""
        };
        body.push_str(&format!(
            "data: {{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":{}}}]}}{},\"index\":0}}]}}\n\n",
            serde_json::to_string(fragment).unwrap(),
            finish
        ));
    }
    body
}

/// One-shot generateContent body with the given reply text.
pub fn generate_body(text: &str) -> String {
    format!(
        "{{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":{}}}]}},\"finishReason\":\"STOP\"}}]}}",
        serde_json::to_string(text).unwrap()
    )
}
