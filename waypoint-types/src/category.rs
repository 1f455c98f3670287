use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of request shapes the gateway routes.
///
/// The category is the learning key: Q-values are tracked per
/// (backend, category) pair, so adding a variant widens the Q-table rather
/// than invalidating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskCategory {
    /// Single-shot text generation.
    TextGeneration,
    /// Multi-turn chat completion.
    ChatCompletion,
    /// Structured function/tool calling.
    FunctionCalling,
    /// Vector embeddings.
    Embeddings,
}

impl TaskCategory {
    /// Stable, kebab-case identifier for logs, errors, and snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TextGeneration => "text-generation",
            Self::ChatCompletion => "chat-completion",
            Self::FunctionCalling => "function-calling",
            Self::Embeddings => "embeddings",
        }
    }

    /// All categories, in declaration order.
    pub const ALL: &'static [Self] = &[
        Self::TextGeneration,
        Self::ChatCompletion,
        Self::FunctionCalling,
        Self::Embeddings,
    ];
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text-generation" => Ok(Self::TextGeneration),
            "chat-completion" => Ok(Self::ChatCompletion),
            "function-calling" => Ok(Self::FunctionCalling),
            "embeddings" => Ok(Self::Embeddings),
            other => Err(format!("unknown task category: {other}")),
        }
    }
}
