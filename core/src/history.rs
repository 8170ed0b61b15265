//! Last-explanation cache and saved topics.
//!
//! Both live in `app_settings` next to the credentials, under the keys the
//! popup reads.

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use time::OffsetDateTime;

use crate::db::{get_setting, put_setting};
use crate::explanation::Explanation;

const LAST_EXPLANATION_KEY: &str = "lastExplanation";
const LAST_EXPLANATION_TIME_KEY: &str = "lastExplanationTime";
const SAVED_TOPICS_KEY: &str = "savedTopics";

/// How long a cached explanation is worth re-showing, in milliseconds.
pub const FRESHNESS_WINDOW_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredExplanation {
    pub explanation: Explanation,
    pub stored_at_ms: i64,
}

impl StoredExplanation {
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        let age = now_ms - self.stored_at_ms;
        (0..FRESHNESS_WINDOW_MS).contains(&age)
    }
}

pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn store_last(conn: &Connection, explanation: &Explanation, now_ms: i64) -> Result<()> {
    put_setting(conn, LAST_EXPLANATION_KEY, &serde_json::to_string(explanation)?)?;
    put_setting(conn, LAST_EXPLANATION_TIME_KEY, &now_ms.to_string())
}

/// The cached explanation regardless of age; freshness is the caller's call.
pub fn load_last(conn: &Connection) -> Result<Option<StoredExplanation>> {
    let (Some(body), Some(time)) = (
        get_setting(conn, LAST_EXPLANATION_KEY)?,
        get_setting(conn, LAST_EXPLANATION_TIME_KEY)?,
    ) else {
        return Ok(None);
    };
    Ok(Some(StoredExplanation {
        explanation: serde_json::from_str(&body)?,
        stored_at_ms: time.parse()?,
    }))
}

pub fn list_topics(conn: &Connection) -> Result<Vec<String>> {
    match get_setting(conn, SAVED_TOPICS_KEY)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

/// Append `term` unless already saved; returns the updated list.
pub fn save_topic(conn: &Connection, term: &str) -> Result<Vec<String>> {
    let mut topics = list_topics(conn)?;
    let term = term.trim();
    if !term.is_empty() && !topics.iter().any(|t| t == term) {
        topics.push(term.to_string());
        put_setting(conn, SAVED_TOPICS_KEY, &serde_json::to_string(&topics)?)?;
    }
    Ok(topics)
}
