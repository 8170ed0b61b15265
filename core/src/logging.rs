//! Structured diagnostics persisted to the `event_log` table.
//!
//! Every record is mirrored to the `log` facade so that a host process with a
//! subscriber installed sees the same stream on stderr.

use log::Level;
use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// One row destined for `event_log`.
#[derive(Debug, Clone)]
pub struct EventRecord<'a> {
    pub level: Level,
    pub code: &'a str,
    pub module: &'a str,
    pub message: &'a str,
    pub explain: Option<&'a str>,
    pub data: Option<Value>,
}

/// A previously persisted event, as returned to diagnostics callers.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedEvent {
    pub id: String,
    pub ts: i64,
    pub level: String,
    pub code: Option<String>,
    pub module: String,
    pub message: String,
    pub explain: Option<String>,
    pub data: Option<Value>,
}

/// Persist an event and return its id.
pub fn log_event(conn: &Connection, record: EventRecord<'_>) -> rusqlite::Result<String> {
    log::log!(
        target: record.module,
        record.level,
        "[{}] {}",
        record.code,
        record.message
    );

    let id = Uuid::new_v4().to_string();
    let ts = OffsetDateTime::now_utc().unix_timestamp();
    let data_str = record.data.map(|v| v.to_string());
    conn.execute(
        "INSERT INTO event_log (id, ts, level, code, module, message, explain, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            ts,
            record.level.as_str().to_lowercase(),
            record.code,
            record.module,
            record.message,
            record.explain,
            data_str
        ],
    )?;
    Ok(id)
}

/// Most recent events first, optionally restricted to one module.
pub fn recent_events(
    conn: &Connection,
    module: Option<&str>,
    limit: usize,
) -> rusqlite::Result<Vec<LoggedEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, ts, level, code, module, message, explain, data FROM event_log
         WHERE ?1 IS NULL OR module = ?1
         ORDER BY ts DESC, rowid DESC LIMIT ?2",
    )?;
    // usize values past i64::MAX would wrap to a negative, unbounded LIMIT.
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![module, limit], |row| {
        let data_str: Option<String> = row.get(7)?;
        Ok(LoggedEvent {
            id: row.get(0)?,
            ts: row.get(1)?,
            level: row.get(2)?,
            code: row.get(3)?,
            module: row.get(4)?,
            message: row.get(5)?,
            explain: row.get(6)?,
            data: data_str.and_then(|raw| serde_json::from_str(&raw).ok()),
        })
    })?;
    rows.collect()
}
