//! Reviewer verdict for a search attempt.
//!
//! Lives in `core` so the conversation state, the reviewer and the CLI
//! output can share one definition of the two allowed decisions.

use serde::{Deserialize, Serialize};

/// Decision returned by the result reviewer after each review step.
///
/// Only two values are legal. Anything else in a model response is a
/// parse failure, not a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// More evidence is needed; search again if the budget allows.
    Retry,
    /// Enough evidence has been gathered; stop searching.
    Finalize,
}

impl Verdict {
    /// Parses a verdict string (case-insensitive, surrounding whitespace ignored).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "retry" => Some(Self::Retry),
            "finalize" => Some(Self::Finalize),
            _ => None,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Finalize => "finalize",
        }
    }

    /// Returns `true` for [`Verdict::Finalize`].
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Finalize)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
