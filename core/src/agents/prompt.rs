use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message of a chat prompt. Serializes to the
/// `{role, content}` shape both providers accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

const TUTOR_SYSTEM_PROMPT: &str =
    "You are a helpful computer science tutor. Always respond with valid JSON.";

const EXPLANATION_TEMPLATE: &str = r#"You are a computer science tutor helping students learn technical concepts.

A student has highlighted the following term: "{term}"

Please provide a comprehensive explanation in the following JSON format:
{
  "term": "the term or concept",
  "definition": "clear, concise definition (2-3 sentences). Use markdown code formatting for any code: inline code with `code` and code blocks with ```language\ncode\n```",
  "examples": ["example 1 with code examples using markdown format", "example 2", "example 3"],
  "quizQuestion": "a multiple choice question to test understanding",
  "quizOptions": ["option 1", "option 2", "option 3", "option 4"],
  "quizAnswer": 0 (index of correct answer, 0-3)
}

IMPORTANT: When including code examples, use markdown code blocks like this:
- Inline code: `variableName`
- Code blocks: ```python\ncode here\n```

Focus on technical interview and computer science concepts. Make explanations clear and beginner-friendly."#;

const CHAT_SYSTEM_TEMPLATE: &str = "You are a helpful computer science tutor. The user is learning about \"{context}\". Answer their follow-up questions clearly and concisely. Use markdown formatting for code: inline code with `code` and code blocks with ```language\\ncode\\n```.";

/// System + user turns asking the model for an explanation document.
pub fn build_explanation_prompt(term: &str) -> Vec<ChatTurn> {
    vec![
        ChatTurn::system(TUTOR_SYSTEM_PROMPT),
        ChatTurn::user(EXPLANATION_TEMPLATE.replace("{term}", term)),
    ]
}

pub fn build_chat_prompt(question: &str, context: &str) -> Vec<ChatTurn> {
    vec![
        ChatTurn::system(CHAT_SYSTEM_TEMPLATE.replace("{context}", context)),
        ChatTurn::user(question),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explanation_prompt_embeds_term_and_schema() {
        let turns = build_explanation_prompt("binary search");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::System);
        assert!(turns[0].content.contains("valid JSON"));

        let user = &turns[1];
        assert_eq!(user.role, Role::User);
        assert!(user.content.contains("\"binary search\""));
        for field in [
            "\"term\"",
            "\"definition\"",
            "\"examples\"",
            "\"quizQuestion\"",
            "\"quizOptions\"",
            "\"quizAnswer\"",
        ] {
            assert!(user.content.contains(field), "missing {field}");
        }
        assert!(user.content.contains("```"));
        assert!(!user.content.contains("{term}"));
    }

    #[test]
    fn chat_prompt_scopes_to_context() {
        let turns = build_chat_prompt("Why is it O(log n)?", "binary search");
        assert_eq!(turns.len(), 2);
        assert!(turns[0]
            .content
            .contains("The user is learning about \"binary search\""));
        assert_eq!(turns[1], ChatTurn::user("Why is it O(log n)?"));
    }

    #[test]
    fn turns_serialize_with_lowercase_roles() {
        let value = serde_json::to_value(ChatTurn::assistant("hi")).unwrap();
        assert_eq!(value, serde_json::json!({ "role": "assistant", "content": "hi" }));
    }
}
