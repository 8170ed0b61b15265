//! Credential store backed by the `app_settings` key-value table.
//!
//! Nothing here is cached: callers re-read on every operation because the
//! host process may be recycled between requests.

use std::fmt;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as B64_ENGINE;
use base64::Engine;
use log::{warn, Level};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

use super::providers::{resolve, Provider};
use crate::db::{delete_setting, get_setting, put_setting};
use crate::logging::{log_event, EventRecord};

pub const SELECTED_API_KEY: &str = "selectedApi";

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub selected_provider: Provider,
    pub openai_key: Option<String>,
    pub groq_key: Option<String>,
}

impl Credentials {
    pub fn key_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAi => self.openai_key.as_deref(),
            Provider::Groq => self.groq_key.as_deref(),
        }
    }

    /// Key of the selected provider only; never borrows the other one.
    pub fn active_key(&self) -> Option<&str> {
        self.key_for(self.selected_provider)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("selected_provider", &self.selected_provider)
            .field("openai_key", &self.openai_key.as_ref().map(|_| "<redacted>"))
            .field("groq_key", &self.groq_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// What the options page may see: which keys exist, never their values.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    pub selected_api: Provider,
    pub display_name: &'static str,
    pub model: String,
    pub configured: Vec<Provider>,
}

/// Provider named by `selectedApi`; unknown or missing values mean OpenAI.
pub fn selected(conn: &Connection) -> Result<Provider> {
    Ok(get_setting(conn, SELECTED_API_KEY)?
        .and_then(|id| Provider::from_id(&id))
        .unwrap_or_default())
}

/// Only the selected provider's secret can fail the load. An unreadable key
/// for any other provider is logged and reads as absent.
pub fn load(conn: &Connection) -> Result<Credentials> {
    let selected_provider = selected(conn)?;
    let mut credentials = Credentials {
        selected_provider,
        ..Credentials::default()
    };
    for provider in Provider::ALL {
        let secret = match load_secret(conn, provider) {
            Ok(secret) => secret,
            Err(err) if provider != selected_provider => {
                warn!("ignoring stored {provider} key: {err:#}");
                None
            }
            Err(err) => return Err(err),
        };
        match provider {
            Provider::OpenAi => credentials.openai_key = secret,
            Provider::Groq => credentials.groq_key = secret,
        }
    }
    Ok(credentials)
}

/// Store `key` for `provider` and make it the active selection. A blank key
/// clears instead.
pub fn save(conn: &Connection, provider: Provider, key: &str) -> Result<()> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        clear(conn, provider)?;
    } else {
        let encoded = B64_ENGINE.encode(trimmed.as_bytes());
        put_setting(conn, provider.key_setting(), &encoded)?;
    }
    select(conn, provider)
}

pub fn clear(conn: &Connection, provider: Provider) -> Result<()> {
    delete_setting(conn, provider.key_setting())
}

pub fn select(conn: &Connection, provider: Provider) -> Result<()> {
    put_setting(conn, SELECTED_API_KEY, provider.id())
}

pub fn snapshot(conn: &Connection) -> Result<SettingsSnapshot> {
    let credentials = load(conn)?;
    let config = resolve(credentials.selected_provider);
    let configured = Provider::ALL
        .into_iter()
        .filter(|p| credentials.key_for(*p).is_some())
        .collect();
    Ok(SettingsSnapshot {
        selected_api: config.provider,
        display_name: config.display_name,
        model: config.model,
        configured,
    })
}

fn load_secret(conn: &Connection, provider: Provider) -> Result<Option<String>> {
    let Some(stored) = get_setting(conn, provider.key_setting())? else {
        return Ok(None);
    };
    let decoded = B64_ENGINE
        .decode(stored.as_bytes())
        .map_err(|_| anyhow!("Failed to decode stored {} credential", provider))?;
    let value = String::from_utf8(decoded)
        .map_err(|_| anyhow!("Stored {} credential was not valid UTF-8", provider))?;
    Ok(Some(value).filter(|v| !v.is_empty()))
}

pub fn audit_settings_change(conn: &Connection, provider: Provider, action: &str) {
    let _ = log_event(
        conn,
        EventRecord {
            level: Level::Info,
            code: "AI-0001",
            module: "ai.settings",
            message: "AI configuration updated",
            explain: Some(action),
            data: Some(json!({ "provider": provider.id() })),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    #[test]
    fn defaults_to_openai_without_keys() {
        let conn = test_connection();
        let credentials = load(&conn).unwrap();
        assert_eq!(credentials, Credentials::default());
        assert_eq!(credentials.selected_provider, Provider::OpenAi);
        assert_eq!(credentials.active_key(), None);
    }

    #[test]
    fn unknown_selection_falls_back_to_openai() {
        let conn = test_connection();
        put_setting(&conn, SELECTED_API_KEY, "mistral").unwrap();
        assert_eq!(load(&conn).unwrap().selected_provider, Provider::OpenAi);
    }

    #[test]
    fn save_trims_encodes_and_selects() {
        let conn = test_connection();
        save(&conn, Provider::Groq, "  gsk_test  ").unwrap();

        let raw = get_setting(&conn, "groqApiKey").unwrap().unwrap();
        assert_ne!(raw, "gsk_test");

        let credentials = load(&conn).unwrap();
        assert_eq!(credentials.selected_provider, Provider::Groq);
        assert_eq!(credentials.active_key(), Some("gsk_test"));
        assert_eq!(credentials.openai_key, None);
    }

    #[test]
    fn active_key_never_borrows_the_other_provider() {
        let conn = test_connection();
        save(&conn, Provider::OpenAi, "sk-openai").unwrap();
        select(&conn, Provider::Groq).unwrap();

        let credentials = load(&conn).unwrap();
        assert_eq!(credentials.selected_provider, Provider::Groq);
        assert_eq!(credentials.active_key(), None);
        assert_eq!(credentials.key_for(Provider::OpenAi), Some("sk-openai"));
    }

    #[test]
    fn clear_removes_only_one_provider() {
        let conn = test_connection();
        save(&conn, Provider::OpenAi, "sk-openai").unwrap();
        save(&conn, Provider::Groq, "gsk").unwrap();
        clear(&conn, Provider::OpenAi).unwrap();

        let credentials = load(&conn).unwrap();
        assert_eq!(credentials.openai_key, None);
        assert_eq!(credentials.groq_key.as_deref(), Some("gsk"));
    }

    #[test]
    fn blank_key_clears() {
        let conn = test_connection();
        save(&conn, Provider::OpenAi, "sk-openai").unwrap();
        save(&conn, Provider::OpenAi, "   ").unwrap();
        assert_eq!(load(&conn).unwrap().openai_key, None);
    }

    #[test]
    fn snapshot_lists_configured_providers_without_secrets() {
        let conn = test_connection();
        save(&conn, Provider::Groq, "gsk-secret").unwrap();

        let snap = snapshot(&conn).unwrap();
        assert_eq!(snap.selected_api, Provider::Groq);
        assert_eq!(snap.model, "llama-3.3-70b-versatile");
        assert_eq!(snap.configured, vec![Provider::Groq]);
        let rendered = serde_json::to_string(&snap).unwrap();
        assert!(!rendered.contains("gsk-secret"));
        assert!(rendered.contains("\"selectedApi\":\"groq\""));
    }

    #[test]
    fn unreadable_key_of_other_provider_reads_as_absent() {
        let conn = test_connection();
        save(&conn, Provider::Groq, "gsk-good").unwrap();
        put_setting(&conn, "openaiApiKey", "sk-plaintext!!").unwrap();

        let credentials = load(&conn).unwrap();
        assert_eq!(credentials.selected_provider, Provider::Groq);
        assert_eq!(credentials.active_key(), Some("gsk-good"));
        assert_eq!(credentials.openai_key, None);
    }

    #[test]
    fn unreadable_key_of_selected_provider_fails_the_load() {
        let conn = test_connection();
        save(&conn, Provider::Groq, "gsk-good").unwrap();
        put_setting(&conn, "groqApiKey", "not base64!!").unwrap();

        let err = load(&conn).unwrap_err();
        assert!(err.to_string().contains("Groq"));
        assert_eq!(selected(&conn).unwrap(), Provider::Groq);
    }

    #[test]
    fn debug_output_redacts_keys() {
        let credentials = Credentials {
            openai_key: Some("sk-live".into()),
            ..Credentials::default()
        };
        assert!(!format!("{credentials:?}").contains("sk-live"));
    }
}
