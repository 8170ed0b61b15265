//! Version 1 of the extension message protocol.
//!
//! Handlers are thin: they validate input, run storage work on the blocking
//! pool, call the orchestrator, and shape `{success, data|answer|error}`
//! payloads for the extension.

use std::sync::Arc;

use log::warn;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::task::spawn_blocking;

use crate::agents::config;
use crate::agents::providers::Provider;
use crate::agents::Orchestrator;
use crate::db::DbPool;
use crate::explanation::Explanation;
use crate::history;
use crate::logging;

const DEFAULT_EVENT_LIMIT: usize = 50;

/// Shared state handed to every message handler.
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub orchestrator: Arc<Orchestrator>,
    pub events: broadcast::Sender<Event>,
}

impl ApiState {
    pub fn new(db: DbPool, orchestrator: Arc<Orchestrator>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            db,
            orchestrator,
            events,
        }
    }
}

/// Messages the extension sends, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    RequestExplanation {
        text: String,
    },
    ChatMessage {
        question: String,
        context: String,
    },
    #[serde(rename_all = "camelCase")]
    SetApiKey {
        api_key: String,
        #[serde(default)]
        provider: Option<Provider>,
    },
    ClearApiKey {
        provider: Provider,
    },
    SelectProvider {
        provider: Provider,
    },
    GetSettings,
    GetLastExplanation,
    SaveTopic {
        term: String,
    },
    ListTopics,
    ListEvents {
        #[serde(default)]
        limit: Option<usize>,
    },
}

/// Unsolicited notifications pushed to every listening surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    ExplanationGenerated { data: Explanation },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Data(Value),
    Answer(String),
    Ack,
    Failure(String),
}

impl Response {
    /// Wire shape, echoing `requestId` when the request carried one.
    pub fn into_json(self, request_id: Option<Value>) -> Value {
        let mut body = match self {
            Self::Data(data) => json!({ "success": true, "data": data }),
            Self::Answer(answer) => json!({ "success": true, "answer": answer }),
            Self::Ack => json!({ "success": true }),
            Self::Failure(error) => json!({ "success": false, "error": error }),
        };
        if let Some(id) = request_id {
            body["requestId"] = id;
        }
        body
    }
}

impl From<Result<Response, String>> for Response {
    fn from(result: Result<Response, String>) -> Self {
        result.unwrap_or_else(Response::Failure)
    }
}

/// Decode one raw message and produce its wire response.
pub async fn handle_message(state: &ApiState, message: Value) -> Value {
    let request_id = message.get("requestId").cloned();
    let response = match serde_json::from_value::<Request>(message) {
        Ok(request) => handle(state, request).await,
        Err(err) => Response::Failure(format!("Unsupported message: {err}")),
    };
    response.into_json(request_id)
}

pub async fn handle(state: &ApiState, request: Request) -> Response {
    let result = match request {
        Request::RequestExplanation { text } => request_explanation(state, text).await,
        Request::ChatMessage { question, context } => {
            chat_message(state, question, context).await
        }
        Request::SetApiKey { api_key, provider } => set_api_key(state, api_key, provider).await,
        Request::ClearApiKey { provider } => clear_api_key(state, provider).await,
        Request::SelectProvider { provider } => select_provider(state, provider).await,
        Request::GetSettings => get_settings(state).await,
        Request::GetLastExplanation => get_last_explanation(state).await,
        Request::SaveTopic { term } => save_topic(state, term).await,
        Request::ListTopics => list_topics(state).await,
        Request::ListEvents { limit } => list_events(state, limit).await,
    };
    result.into()
}

/// Explain highlighted text. Never fails once text is present: provider
/// problems come back as a fallback explanation.
pub async fn request_explanation(state: &ApiState, text: String) -> Result<Response, String> {
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err("No text selected".to_string());
    }

    let explanation = state.orchestrator.explain_term(&text).await;

    let cached = explanation.clone();
    let stored_at = history::now_ms();
    if let Err(err) = with_conn(state, move |conn| history::store_last(conn, &cached, stored_at)).await
    {
        warn!("could not cache last explanation: {err}");
    }

    let data = serde_json::to_value(&explanation).map_err(|e| e.to_string())?;
    // Surfaces that already closed are simply missed.
    let _ = state.events.send(Event::ExplanationGenerated { data: explanation });
    Ok(Response::Data(data))
}

/// Answer a follow-up question; failures surface verbatim.
pub async fn chat_message(
    state: &ApiState,
    question: String,
    context: String,
) -> Result<Response, String> {
    state
        .orchestrator
        .answer_follow_up(&question, &context)
        .await
        .map(Response::Answer)
        .map_err(|e| e.to_string())
}

/// Store a key for `provider`, or for the current selection when omitted.
pub async fn set_api_key(
    state: &ApiState,
    api_key: String,
    provider: Option<Provider>,
) -> Result<Response, String> {
    with_conn(state, move |conn| {
        let provider = match provider {
            Some(provider) => provider,
            None => config::load(conn)?.selected_provider,
        };
        config::save(conn, provider, &api_key)?;
        let action = if api_key.trim().is_empty() {
            "API key cleared"
        } else {
            "API key saved"
        };
        config::audit_settings_change(conn, provider, action);
        Ok(Response::Ack)
    })
    .await
}

pub async fn clear_api_key(state: &ApiState, provider: Provider) -> Result<Response, String> {
    with_conn(state, move |conn| {
        config::clear(conn, provider)?;
        config::audit_settings_change(conn, provider, "API key cleared");
        Ok(Response::Ack)
    })
    .await
}

pub async fn select_provider(state: &ApiState, provider: Provider) -> Result<Response, String> {
    with_conn(state, move |conn| {
        config::select(conn, provider)?;
        config::audit_settings_change(conn, provider, "Provider selected");
        Ok(Response::Ack)
    })
    .await
}

pub async fn get_settings(state: &ApiState) -> Result<Response, String> {
    with_conn(state, |conn| {
        Ok(Response::Data(serde_json::to_value(config::snapshot(conn)?)?))
    })
    .await
}

/// Cached explanation with a `fresh` flag, or `null` when nothing is cached.
pub async fn get_last_explanation(state: &ApiState) -> Result<Response, String> {
    let now = history::now_ms();
    with_conn(state, move |conn| {
        let data = match history::load_last(conn)? {
            Some(stored) => {
                let fresh = stored.is_fresh(now);
                let mut value = serde_json::to_value(stored)?;
                value["fresh"] = Value::Bool(fresh);
                value
            }
            None => Value::Null,
        };
        Ok(Response::Data(data))
    })
    .await
}

pub async fn save_topic(state: &ApiState, term: String) -> Result<Response, String> {
    with_conn(state, move |conn| {
        Ok(Response::Data(json!(history::save_topic(conn, &term)?)))
    })
    .await
}

pub async fn list_topics(state: &ApiState) -> Result<Response, String> {
    with_conn(state, |conn| Ok(Response::Data(json!(history::list_topics(conn)?)))).await
}

/// Recent `ai.runtime` diagnostics for the debug view.
pub async fn list_events(state: &ApiState, limit: Option<usize>) -> Result<Response, String> {
    let limit = limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    with_conn(state, move |conn| {
        let events = logging::recent_events(conn, Some("ai.runtime"), limit)?;
        Ok(Response::Data(serde_json::to_value(events)?))
    })
    .await
}

async fn with_conn<T, F>(state: &ApiState, f: F) -> Result<T, String>
where
    F: FnOnce(&Connection) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = state.db.clone();
    spawn_blocking(move || {
        let conn = pool.get().map_err(|e| e.to_string())?;
        f(&*conn).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())?
}
