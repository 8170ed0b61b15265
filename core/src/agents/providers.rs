use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote LLM vendor selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Groq,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::OpenAi, Provider::Groq];

    /// Identifier persisted under `selectedApi`.
    pub fn id(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Groq => "groq",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "groq" => Some(Self::Groq),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        seed(self).display
    }

    /// Settings key holding this provider's API key.
    pub fn key_setting(self) -> &'static str {
        match self {
            Self::OpenAi => "openaiApiKey",
            Self::Groq => "groqApiKey",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Concrete endpoint and model for one request.
///
/// Both vendors speak the OpenAI chat-completion shape, so this value is all
/// the completion client needs to know about the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub endpoint: String,
    pub model: String,
    pub display_name: &'static str,
}

struct ProviderSeed {
    provider: Provider,
    endpoint: &'static str,
    model: &'static str,
    display: &'static str,
}

const PROVIDER_SEEDS: &[ProviderSeed] = &[
    ProviderSeed {
        provider: Provider::OpenAi,
        endpoint: "https://api.openai.com/v1/chat/completions",
        model: "gpt-3.5-turbo",
        display: "OpenAI",
    },
    ProviderSeed {
        provider: Provider::Groq,
        endpoint: "https://api.groq.com/openai/v1/chat/completions",
        model: "llama-3.3-70b-versatile",
        display: "Groq",
    },
];

fn seed(provider: Provider) -> &'static ProviderSeed {
    // ALL and PROVIDER_SEEDS cover the same variants, in the same order.
    &PROVIDER_SEEDS[provider as usize]
}

pub fn resolve(provider: Provider) -> ProviderConfig {
    let seed = seed(provider);
    ProviderConfig {
        provider: seed.provider,
        endpoint: seed.endpoint.to_string(),
        model: seed.model.to_string(),
        display_name: seed.display,
    }
}
