use core::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// High-level capability labels advertised by backends and required by requests.
///
/// These map one-to-one with the bits of [`CapabilitySet`] and allow consistent
/// Display formatting and match-exhaustive handling when adding new
/// capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Capability {
    /// Plain text generation from a prompt.
    Text,
    /// Multi-turn chat completion.
    Chat,
    /// Structured function/tool calling.
    FunctionCall,
    /// Vector embeddings.
    Embeddings,
    /// Image inputs.
    Vision,
    /// Context windows large enough for long documents.
    LongContext,
    /// A zero-cost usage tier is available.
    FreeTier,
    /// Code generation specialty.
    Code,
    /// Extended reasoning specialty.
    Reasoning,
}

impl Capability {
    /// Stable, kebab-case identifier for logs/errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Chat => "chat",
            Self::FunctionCall => "function-call",
            Self::Embeddings => "embeddings",
            Self::Vision => "vision",
            Self::LongContext => "long-context",
            Self::FreeTier => "free-tier",
            Self::Code => "code",
            Self::Reasoning => "reasoning",
        }
    }

    /// All capability tags, in bit order.
    pub const ALL: &'static [Self] = &[
        Self::Text,
        Self::Chat,
        Self::FunctionCall,
        Self::Embeddings,
        Self::Vision,
        Self::LongContext,
        Self::FreeTier,
        Self::Code,
        Self::Reasoning,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Set of [`Capability`] tags, stored as a compact bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CapabilitySet: u16 {
        /// See [`Capability::Text`].
        const TEXT = 1 << 0;
        /// See [`Capability::Chat`].
        const CHAT = 1 << 1;
        /// See [`Capability::FunctionCall`].
        const FUNCTION_CALL = 1 << 2;
        /// See [`Capability::Embeddings`].
        const EMBEDDINGS = 1 << 3;
        /// See [`Capability::Vision`].
        const VISION = 1 << 4;
        /// See [`Capability::LongContext`].
        const LONG_CONTEXT = 1 << 5;
        /// See [`Capability::FreeTier`].
        const FREE_TIER = 1 << 6;
        /// See [`Capability::Code`].
        const CODE = 1 << 7;
        /// See [`Capability::Reasoning`].
        const REASONING = 1 << 8;
    }
}

impl CapabilitySet {
    /// Build a set from individual capability tags.
    #[must_use]
    pub fn from_caps(caps: &[Capability]) -> Self {
        caps.iter().copied().map(Self::from).fold(Self::empty(), |acc, c| acc | c)
    }

    /// True when every capability in `required` is present.
    #[must_use]
    pub const fn satisfies(self, required: Self) -> bool {
        self.contains(required)
    }

    /// Enumerate the tags present in this set, in bit order.
    #[must_use]
    pub fn tags(self) -> Vec<Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(|c| self.contains(Self::from(*c)))
            .collect()
    }
}

impl From<Capability> for CapabilitySet {
    fn from(cap: Capability) -> Self {
        match cap {
            Capability::Text => Self::TEXT,
            Capability::Chat => Self::CHAT,
            Capability::FunctionCall => Self::FUNCTION_CALL,
            Capability::Embeddings => Self::EMBEDDINGS,
            Capability::Vision => Self::VISION,
            Capability::LongContext => Self::LONG_CONTEXT,
            Capability::FreeTier => Self::FREE_TIER,
            Capability::Code => Self::CODE,
            Capability::Reasoning => Self::REASONING,
        }
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .map(Self::from)
            .fold(Self::empty(), |acc, c| acc | c)
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.tags().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CapabilitySet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tags = Vec::<Capability>::deserialize(deserializer)?;
        Ok(tags.into_iter().collect())
    }
}
