//! The explanation document the model is asked to return, its parser, and
//! the fallback shown when no real explanation could be obtained.

use serde::{Deserialize, Serialize};

use crate::agents::providers::Provider;
use crate::errors::LearnFlowError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub term: String,
    pub definition: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_options: Option<Vec<String>>,
    /// Index into `quiz_options`. Not validated; see [`Explanation::correct_option`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_answer: Option<i64>,
}

impl Explanation {
    /// Synthetic explanation carrying diagnostics in place of model output.
    pub fn fallback(term: &str, provider: Provider, cause: &LearnFlowError) -> Self {
        let name = provider.display_name();
        Self {
            term: term.to_string(),
            definition: format!(
                "Error: {}. Selected API: {name}. Error: {cause}",
                cause.class()
            ),
            examples: vec![
                format!("Error 1: {name} API call failed"),
                "Error 2: Check the host log for details".to_string(),
                format!("Error 3: Verify your {name} API key is correct"),
            ],
            quiz_question: Some(format!("Is your {name} API key configured correctly?")),
            quiz_options: Some(
                ["Yes", "No", "Not sure", "Need to check"]
                    .map(String::from)
                    .to_vec(),
            ),
            quiz_answer: Some(0),
        }
    }

    /// The option `quiz_answer` points at, or `None` when the index is
    /// missing or out of range.
    pub fn correct_option(&self) -> Option<&str> {
        let index = usize::try_from(self.quiz_answer?).ok()?;
        self.quiz_options.as_ref()?.get(index).map(String::as_str)
    }
}

/// Outcome of reading a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Ok(Explanation),
    Malformed { raw: String, reason: String },
}

pub fn parse_explanation(raw: &str) -> ParseResult {
    match serde_json::from_str::<Explanation>(strip_code_fence(raw)) {
        Ok(explanation) => ParseResult::Ok(explanation),
        Err(err) => ParseResult::Malformed {
            raw: raw.to_string(),
            reason: err.to_string(),
        },
    }
}

/// Models occasionally wrap the document in a ```json fence despite being
/// told not to.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    match body.split_once('\n') {
        Some((lang, rest)) if !lang.trim_start().starts_with('{') => rest.trim(),
        _ => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECURSION: &str = r#"{"term":"recursion","definition":"A function calling itself.","examples":["a","b"],"quizQuestion":"What stops it?","quizOptions":["x","y","z","w"],"quizAnswer":2}"#;

    fn recursion() -> Explanation {
        Explanation {
            term: "recursion".into(),
            definition: "A function calling itself.".into(),
            examples: vec!["a".into(), "b".into()],
            quiz_question: Some("What stops it?".into()),
            quiz_options: Some(vec!["x".into(), "y".into(), "z".into(), "w".into()]),
            quiz_answer: Some(2),
        }
    }

    #[test]
    fn parses_complete_document_unchanged() {
        assert_eq!(parse_explanation(RECURSION), ParseResult::Ok(recursion()));

        let reserialized = serde_json::to_value(recursion()).unwrap();
        let original: serde_json::Value = serde_json::from_str(RECURSION).unwrap();
        assert_eq!(reserialized, original);
    }

    #[test]
    fn quiz_fields_are_optional() {
        let explanation =
            match parse_explanation(r#"{"term":"heap","definition":"A tree.","examples":[]}"#) {
                ParseResult::Ok(explanation) => explanation,
                other => panic!("expected a parsed explanation, got {other:?}"),
            };
        assert_eq!(explanation.quiz_question, None);
        assert_eq!(explanation.correct_option(), None);
    }

    #[test]
    fn strips_markdown_fence() {
        let fenced = format!("```json\n{RECURSION}\n```");
        assert_eq!(parse_explanation(&fenced), ParseResult::Ok(recursion()));

        let bare_fence = format!("```\n{RECURSION}\n```");
        assert_eq!(parse_explanation(&bare_fence), ParseResult::Ok(recursion()));
    }

    #[test]
    fn malformed_text_keeps_raw_and_reason() {
        for raw in ["", "Sure! Here is your explanation", "{\"term\": 5}", "{\"term\":\"x\""] {
            match parse_explanation(raw) {
                ParseResult::Malformed { raw: kept, reason } => {
                    assert_eq!(kept, raw);
                    assert!(!reason.is_empty());
                }
                other => panic!("expected Malformed for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn correct_option_tolerates_bad_indices() {
        let mut explanation = recursion();
        assert_eq!(explanation.correct_option(), Some("z"));

        explanation.quiz_answer = Some(7);
        assert_eq!(explanation.correct_option(), None);

        explanation.quiz_answer = Some(-1);
        assert_eq!(explanation.correct_option(), None);
    }

    #[test]
    fn fallback_names_cause_and_keeps_term() {
        let cause = LearnFlowError::Configuration {
            provider: Provider::Groq,
        };
        let fallback = Explanation::fallback("recursion", Provider::Groq, &cause);

        assert_eq!(fallback.term, "recursion");
        assert!(fallback.definition.contains("ConfigurationError"));
        assert!(fallback.definition.contains("Groq API key not set"));
        assert!(fallback.examples.iter().any(|e| e.contains("Verify your Groq API key")));
        assert_eq!(fallback.quiz_options.as_ref().map(Vec::len), Some(4));
        assert_eq!(fallback.correct_option(), Some("Yes"));
    }
}
