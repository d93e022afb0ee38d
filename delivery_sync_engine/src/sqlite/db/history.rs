use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::HistoryEntry;

/// Appends an entry to the delivery's history. History rows are never updated or deleted.
pub async fn append_entry(
    delivery_id: i64,
    entry: &HistoryEntry,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO delivery_history (delivery_id, status, timestamp, note) VALUES ($1, $2, $3, $4)")
        .bind(delivery_id)
        .bind(entry.status.as_str())
        .bind(entry.timestamp)
        .bind(entry.note.as_str())
        .execute(conn)
        .await?;
    trace!("🗃️ History entry [{}] {} appended to delivery {delivery_id}", entry.status, entry.note);
    Ok(())
}

/// The delivery's history, oldest first.
pub async fn fetch_history(delivery_id: i64, conn: &mut SqliteConnection) -> Result<Vec<HistoryEntry>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT status, timestamp, note FROM delivery_history WHERE delivery_id = $1 ORDER BY id")
        .bind(delivery_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
