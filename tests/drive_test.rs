//! Integration tests for driving a transcript surface through a full
//! send cycle.

mod test_utils;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use futago::chat::{FutagoBuilder, SessionManager, StreamStatus};
    use futago::gemini::Role;
    use futago::transcript::surface::{Surface, TextSurface};
    use futago::transcript::sync::{drive, opening_block, parse_transcript};

    use crate::test_utils::{sse_body, test_storage};

    fn surface_with_prompt(prompt: &str) -> futago::transcript::SharedSurface {
        let mut lines = opening_block("You");
        lines.push(prompt.to_string());
        TextSurface::with_lines(lines).shared()
    }

    /// Tests the full drive cycle: the pending prompt is sent, the
    /// reply streams into the transcript, a fresh input block opens,
    /// and the transcript is mirrored to the chat file.
    #[tokio::test]
    async fn it_drives_a_surface_through_a_send_cycle() {
        let (dir, db) = test_storage().await;
        let chat_dir = dir.path().join("chat");
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "POST",
                "/v1beta/models/gemini-1.5-flash:streamGenerateContent",
            )
            .match_query(mockito::Matcher::UrlEncoded(
                "alt".to_string(),
                "sse".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_body(&["Hello ", "from the model.\nSecond line."]))
            .create();

        let mut futago = FutagoBuilder::new(&server.url(), "test-key", "gemini-1.5-flash")
            .database(&db)
            .chat_dir(&chat_dir)
            .title("2024-01-28T10-00-00.000_mirrored")
            .build()
            .unwrap();
        futago.start_chat(None);

        let mut manager = SessionManager::new();
        let session = manager.insert("2024-01-28T10-00-00.000_mirrored", futago);
        let surface = surface_with_prompt("Say hello");

        let outcome = drive(&session, &surface)
            .await
            .unwrap()
            .expect("prompt should be pending");
        assert_eq!(outcome.status, StreamStatus::Completed);
        assert_eq!(outcome.text, "Hello from the model.\nSecond line.");

        let lines = surface.lock().await.lines().await.unwrap();
        assert!(lines.contains(&"Hello from the model.".to_string()));
        assert!(lines.contains(&"Second line.".to_string()));

        // The transcript parses back into the conversation
        let history = parse_transcript(&lines, "You", "Gemini");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].text(), "Say hello");
        assert_eq!(history[1].role, Role::Model);

        // The mirror file matches the surface
        let mirror = tokio::fs::read_to_string(
            chat_dir.join("2024-01-28T10-00-00.000_mirrored.md"),
        )
        .await
        .expect("mirror file should exist");
        assert_eq!(mirror, lines.join("\n") + "\n");
    }

    /// Tests that a drive without a pending prompt sends nothing and
    /// writes no mirror file.
    #[tokio::test]
    async fn it_skips_the_cycle_without_a_pending_prompt() {
        let (dir, db) = test_storage().await;
        let chat_dir = dir.path().join("chat");
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                "/v1beta/models/gemini-1.5-flash:streamGenerateContent",
            )
            .expect(0)
            .create();

        let mut futago = FutagoBuilder::new(&server.url(), "test-key", "gemini-1.5-flash")
            .database(&db)
            .chat_dir(&chat_dir)
            .title("2024-01-28T10-00-00.000_idle")
            .build()
            .unwrap();
        futago.start_chat(None);
        let session = Arc::new(Mutex::new(futago));
        let surface = TextSurface::with_lines(opening_block("You")).shared();

        let outcome = drive(&session, &surface).await.unwrap();
        assert!(outcome.is_none());
        mock.assert();

        let mirror = chat_dir.join("2024-01-28T10-00-00.000_idle.md");
        assert!(!mirror.exists());
    }

    /// Tests that concurrent drives of the same session serialize:
    /// both cycles complete and the persisted history alternates.
    #[tokio::test]
    async fn it_serializes_concurrent_drives_of_one_session() {
        let (_dir, db) = test_storage().await;
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "POST",
                "/v1beta/models/gemini-1.5-flash:streamGenerateContent",
            )
            .match_query(mockito::Matcher::UrlEncoded(
                "alt".to_string(),
                "sse".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_body(&["ack"]))
            .expect(2)
            .create();

        let mut futago = FutagoBuilder::new(&server.url(), "test-key", "gemini-1.5-flash")
            .database(&db)
            .title("contended")
            .build()
            .unwrap();
        futago.start_chat(None);
        let session = Arc::new(Mutex::new(futago));

        let first_surface = surface_with_prompt("first message");
        let second_surface = surface_with_prompt("second message");

        let first = drive(&session, &first_surface);
        let second = drive(&session, &second_surface);
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().unwrap().status, StreamStatus::Completed);
        assert_eq!(second.unwrap().unwrap().status, StreamStatus::Completed);

        // Four turns, strictly alternating
        let (_, history) = futago::chat::db::get_chat(&db, "contended")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(history.len(), 4);
        for (index, turn) in history.iter().enumerate() {
            let expected = if index % 2 == 0 { Role::User } else { Role::Model };
            assert_eq!(turn.role, expected);
        }
    }
}
