//! Sequencing of the explain and follow-up operations.
//!
//! `explain_term` is total: every failure becomes a fallback explanation.
//! `answer_follow_up` hands failures to its caller, which shows them inline.

use std::sync::Arc;

use log::{info, warn, Level};
use serde_json::json;
use tokio::task::spawn_blocking;

use super::completion::CompletionService;
use super::config::{self, Credentials};
use super::prompt::{build_chat_prompt, build_explanation_prompt};
use super::providers::{resolve, Provider, ProviderConfig};
use crate::db::DbPool;
use crate::errors::LearnFlowError;
use crate::explanation::{parse_explanation, Explanation, ParseResult};
use crate::logging::{log_event, EventRecord};

pub const EXPLAIN_MAX_TOKENS: u32 = 800;
pub const CHAT_MAX_TOKENS: u32 = 300;
pub const TEMPERATURE: f32 = 0.7;

pub struct Orchestrator {
    pool: DbPool,
    completions: Arc<dyn CompletionService>,
}

impl Orchestrator {
    pub fn new(pool: DbPool, completions: Arc<dyn CompletionService>) -> Arc<Self> {
        Arc::new(Self { pool, completions })
    }

    pub async fn explain_term(&self, text: &str) -> Explanation {
        let term = text.trim();
        let credentials = match self.read_credentials().await {
            Ok(credentials) => credentials,
            Err(err) => {
                let provider = self.read_selection().await;
                warn!("could not read {provider} credentials: {err}");
                self.record_failure(provider, &err);
                return Explanation::fallback(term, provider, &err);
            }
        };

        let provider = credentials.selected_provider;
        match self.request_explanation(term, &credentials).await {
            Ok(explanation) => explanation,
            Err(err) => {
                warn!("explanation for {term:?} via {provider} fell back: {err}");
                self.record_failure(provider, &err);
                Explanation::fallback(term, provider, &err)
            }
        }
    }

    pub async fn answer_follow_up(
        &self,
        question: &str,
        context: &str,
    ) -> Result<String, LearnFlowError> {
        let credentials = self.read_credentials().await?;
        let (config, api_key) = select_runtime(&credentials)?;
        let turns = build_chat_prompt(question.trim(), context.trim());

        match self
            .completions
            .complete(&config, api_key, &turns, CHAT_MAX_TOKENS, TEMPERATURE)
            .await
        {
            Ok(answer) => {
                self.record_success(&config, &answer);
                Ok(answer)
            }
            Err(err) => {
                self.record_failure(config.provider, &err);
                Err(err)
            }
        }
    }

    async fn request_explanation(
        &self,
        term: &str,
        credentials: &Credentials,
    ) -> Result<Explanation, LearnFlowError> {
        let (config, api_key) = select_runtime(credentials)?;
        let turns = build_explanation_prompt(term);
        let raw = self
            .completions
            .complete(&config, api_key, &turns, EXPLAIN_MAX_TOKENS, TEMPERATURE)
            .await?;

        match parse_explanation(&raw) {
            ParseResult::Ok(explanation) => {
                self.record_success(&config, &raw);
                Ok(explanation)
            }
            ParseResult::Malformed { reason, .. } => {
                Err(LearnFlowError::MalformedResponse(reason))
            }
        }
    }

    async fn read_credentials(&self) -> Result<Credentials, LearnFlowError> {
        let pool = self.pool.clone();
        spawn_blocking(move || {
            let conn = pool.get()?;
            config::load(&conn)
        })
        .await
        .map_err(|err| LearnFlowError::Storage(err.to_string()))?
        .map_err(|err| LearnFlowError::Storage(err.to_string()))
    }

    /// Selected provider for diagnostics when the full credential read failed.
    async fn read_selection(&self) -> Provider {
        let pool = self.pool.clone();
        let selection = spawn_blocking(move || {
            let conn = pool.get()?;
            config::selected(&conn)
        })
        .await;
        match selection {
            Ok(Ok(provider)) => provider,
            Ok(Err(err)) => {
                warn!("could not read provider selection: {err:#}");
                Provider::default()
            }
            Err(err) => {
                warn!("provider selection task failed: {err}");
                Provider::default()
            }
        }
    }

    fn record_success(&self, config: &ProviderConfig, content: &str) {
        let preview = content.chars().take(200).collect::<String>();
        let data = json!({
            "provider": config.provider.id(),
            "model": config.model,
            "preview": preview,
        });
        self.record(EventKind::Success, data);
    }

    fn record_failure(&self, provider: Provider, error: &LearnFlowError) {
        let data = json!({
            "provider": provider.id(),
            "code": error.code(),
            "error": error.to_string(),
        });
        self.record(EventKind::Failure, data);
    }

    fn record(&self, kind: EventKind, data: serde_json::Value) {
        let pool = self.pool.clone();
        spawn_blocking(move || {
            if let Ok(conn) = pool.get() {
                let (level, code, message, explain) = match kind {
                    EventKind::Success => (
                        Level::Info,
                        "AI-0200",
                        "AI completion succeeded",
                        "Provider returned usable content",
                    ),
                    EventKind::Failure => (
                        Level::Warn,
                        "AI-0201",
                        "AI completion failed",
                        "Caller receives a fallback or the error",
                    ),
                };
                let _ = log_event(
                    &conn,
                    EventRecord {
                        level,
                        code,
                        module: "ai.runtime",
                        message,
                        explain: Some(explain),
                        data: Some(data),
                    },
                );
            }
        });
    }
}

#[derive(Clone, Copy)]
enum EventKind {
    Success,
    Failure,
}

/// Provider config plus the matching key, or a configuration error when the
/// selected provider has none.
fn select_runtime(credentials: &Credentials) -> Result<(ProviderConfig, &str), LearnFlowError> {
    let provider = credentials.selected_provider;
    let api_key = credentials
        .active_key()
        .ok_or(LearnFlowError::Configuration { provider })?;
    let config = resolve(provider);
    info!("using {} ({})", config.display_name, config.model);
    Ok((config, api_key))
}
