use serde::{Deserialize, Serialize};

/// Unique identifier for a protocol in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(pub String);

impl ProtocolId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a set of selected categories is compared against a protocol's tags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMode {
    /// Protocol carries at least one of the selected categories
    #[default]
    Any,
    /// Protocol carries every selected category
    All,
}

impl std::fmt::Display for CategoryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for CategoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" | "" => Ok(Self::Any),
            "all" => Ok(Self::All),
            other => Err(format!("unknown category mode '{other}' (expected 'any' or 'all')")),
        }
    }
}

/// Coarse relevance bucket used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    Low,
    Medium,
    High,
    Exact,
}

impl Relevance {
    /// Bucket an aggregate dissimilarity (0 = identical, 1 = unrelated)
    #[must_use]
    pub fn from_dissimilarity(aggregate: f64) -> Self {
        if aggregate <= 1e-6 {
            Self::Exact
        } else if aggregate < 0.05 {
            Self::High
        } else if aggregate < 0.2 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Relevance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "EXACT"),
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}
