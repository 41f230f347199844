use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::types::ProtocolId;
use crate::utils::text::{normalize_category, tokenize};

/// A single EMS protocol document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protocol {
    /// Unique identifier (the key in the corpus file)
    pub id: ProtocolId,

    /// Short human-readable label
    #[serde(alias = "title")]
    pub name: String,

    /// Full body text
    pub content: String,

    /// Provenance label, display only
    #[serde(default)]
    pub source_file: String,

    /// Tags used for filtering (e.g., "adult", "pediatric", "trauma")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    // === Pre-computed for fast matching (populated on load) ===
    /// Lower-cased name for substring scoring
    #[serde(skip)]
    pub name_lower: String,

    /// Lower-cased content for substring scoring
    #[serde(skip)]
    pub content_lower: String,

    /// Tokens of the id, for fuzzy matching
    #[serde(skip)]
    pub id_tokens: Vec<String>,

    /// Tokens of the name, for fuzzy matching
    #[serde(skip)]
    pub name_tokens: Vec<String>,

    /// Distinct tokens of the content, for fuzzy matching
    #[serde(skip)]
    pub content_tokens: Vec<String>,
}

impl Protocol {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::from_parts(id, name, content, String::new(), Vec::<String>::new())
    }

    /// Build a protocol with every field at once, indexing a single time.
    ///
    /// Prefer this over the builder chain when loading a corpus.
    pub fn from_parts<I, S>(
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        source_file: impl Into<String>,
        categories: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut protocol = Self {
            id: ProtocolId::new(id),
            name: name.into(),
            content: content.into(),
            source_file: source_file.into(),
            categories: categories
                .into_iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
            name_lower: String::new(),
            content_lower: String::new(),
            id_tokens: Vec::new(),
            name_tokens: Vec::new(),
            content_tokens: Vec::new(),
        };
        protocol.rebuild_indexes();
        protocol
    }

    #[must_use]
    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = source_file.into();
        self
    }

    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.categories = categories
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .collect();
        self.rebuild_indexes();
        self
    }

    /// Rebuild the lower-cased fields and token lists.
    ///
    /// Called once per protocol when the catalog is loaded; the matchers
    /// only ever read these.
    pub fn rebuild_indexes(&mut self) {
        let mut seen = HashSet::new();
        self.categories = self
            .categories
            .iter()
            .map(|c| normalize_category(c))
            .filter(|c| !c.is_empty() && seen.insert(c.clone()))
            .collect();

        self.name_lower = self.name.to_lowercase();
        self.content_lower = self.content.to_lowercase();
        self.id_tokens = tokenize(&self.id.0);
        self.name_tokens = tokenize(&self.name);

        let mut content_tokens = tokenize(&self.content);
        content_tokens.sort_unstable();
        content_tokens.dedup();
        self.content_tokens = content_tokens;
    }

    /// Check whether the protocol carries a category (case-insensitive)
    #[must_use]
    pub fn has_category(&self, category: &str) -> bool {
        let wanted = normalize_category(category);
        self.categories.iter().any(|c| *c == wanted)
    }
}
