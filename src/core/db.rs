use anyhow::Result;
use tokio_rusqlite::Connection;

pub async fn async_db(db_path: &str) -> Result<Connection> {
    let db = Connection::open(format!("{}/futago.db", db_path)).await?;
    Ok(db)
}

/// Sets up the key-value table backing chat storage. Idempotent.
pub fn initialize_db(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chat_kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    Ok(())
}
