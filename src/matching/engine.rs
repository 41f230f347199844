use serde::{Deserialize, Serialize};

use crate::catalog::index::CategoryFilter;
use crate::catalog::store::ProtocolCatalog;
use crate::core::protocol::Protocol;
use crate::core::types::Relevance;
use crate::matching::scoring::FieldScores;
use crate::utils::text::tokenize;

/// Result of matching a query against one protocol
#[derive(Debug, Clone)]
pub struct SearchHit<'a> {
    /// The matched protocol
    pub protocol: &'a Protocol,

    /// Per-field and aggregate dissimilarity
    pub scores: FieldScores,

    /// Display bucket derived from the aggregate
    pub relevance: Relevance,
}

impl SearchHit<'_> {
    /// `1 - aggregate`, for display as a percentage
    pub fn similarity(&self) -> f64 {
        1.0 - self.scores.aggregate
    }
}

/// Default dissimilarity threshold (0 = identical, 1 = unrelated)
pub const DEFAULT_THRESHOLD: f64 = 0.4;

/// Configuration for the matching engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// A protocol is returned only when its aggregate is below this
    pub threshold: f64,
    /// Per-field weights
    pub weights: FieldWeights,
    /// Maximum number of hits, `None` for all
    pub limit: Option<usize>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            weights: FieldWeights::default(),
            limit: None,
        }
    }
}

/// Configurable weights for the searchable fields.
///
/// Weights are independent and need not sum to 1.0. A lower weight makes a
/// field contribute less to elimination and ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldWeights {
    pub name: f64,
    pub id: f64,
    pub content: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            name: 0.6,
            id: 0.5,
            content: 0.2,
        }
    }
}

/// Typo-tolerant weighted multi-field search.
///
/// Construction is free: the token indexes it reads were built once per
/// protocol when the catalog loaded.
#[derive(Debug, Clone, Default)]
pub struct MatchingEngine {
    config: MatchingConfig,
}

impl MatchingEngine {
    /// Create a new matching engine with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new matching engine with custom configuration
    pub fn with_config(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Rank `corpus` against `query`, most relevant first.
    ///
    /// Empty or whitespace-only queries return nothing without scoring. Ties
    /// keep corpus order.
    pub fn search<'a>(&self, query: &str, corpus: &[&'a Protocol]) -> Vec<SearchHit<'a>> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let threshold = self.config.threshold;
        let mut hits: Vec<SearchHit<'a>> = corpus
            .iter()
            .filter_map(|&protocol| {
                let scores =
                    FieldScores::calculate(&query_tokens, protocol, &self.config.weights, threshold);
                (scores.aggregate < threshold).then(|| SearchHit {
                    protocol,
                    scores,
                    relevance: Relevance::from_dissimilarity(scores.aggregate),
                })
            })
            .collect();

        // Stable sort: equal aggregates keep corpus order
        hits.sort_by(|a, b| a.scores.aggregate.total_cmp(&b.scores.aggregate));

        if let Some(limit) = self.config.limit {
            hits.truncate(limit);
        }

        tracing::debug!(query, hits = hits.len(), "fuzzy search");
        hits
    }

    /// Filter the catalog by category, then search what remains
    pub fn search_catalog<'a>(
        &self,
        query: &str,
        catalog: &'a ProtocolCatalog,
        filter: &CategoryFilter,
    ) -> Vec<SearchHit<'a>> {
        let corpus = catalog.filter_by_categories(filter);
        self.search(query, &corpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CategoryMode;

    fn make_test_catalog() -> ProtocolCatalog {
        ProtocolCatalog::load_embedded().unwrap()
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let catalog = make_test_catalog();
        let engine = MatchingEngine::new();
        let corpus = catalog.all();

        assert!(engine.search("", &corpus).is_empty());
        assert!(engine.search("   \t\n", &corpus).is_empty());
        assert!(engine.search(" -- ", &corpus).is_empty());
    }

    #[test]
    fn test_exact_name_ranks_first() {
        let catalog = make_test_catalog();
        let engine = MatchingEngine::new();

        let hits = engine.search("seizure", &catalog.all());
        assert!(!hits.is_empty());
        assert_eq!(hits[0].protocol.id.as_str(), "seizure");
        assert_eq!(hits[0].relevance, Relevance::Exact);
    }

    #[test]
    fn test_misspelled_query() {
        let catalog = make_test_catalog();
        let engine = MatchingEngine::new();

        let hits = engine.search("anaphylaxsis", &catalog.all());
        assert!(!hits.is_empty());
        assert_eq!(hits[0].protocol.id.as_str(), "anaphylaxis");
    }

    #[test]
    fn test_partial_word_query() {
        let catalog = make_test_catalog();
        let engine = MatchingEngine::new();

        let hits = engine.search("hypoglyc", &catalog.all());
        assert!(!hits.is_empty());
        assert_eq!(hits[0].protocol.id.as_str(), "hypoglycemia");
    }

    #[test]
    fn test_all_hits_below_threshold() {
        let catalog = make_test_catalog();
        let engine = MatchingEngine::new();
        let corpus = catalog.all();

        for query in ["cardiac", "arest", "pediatric epi", "burn", "xyzzy", "a"] {
            let hits = engine.search(query, &corpus);
            for hit in &hits {
                assert!(hit.scores.aggregate < DEFAULT_THRESHOLD, "{query}");
            }

            // Nothing left out that is within the bound
            let kept = hits.len();
            let tokens = tokenize(query);
            let within = corpus
                .iter()
                .filter(|p| {
                    FieldScores::calculate(&tokens, p, &FieldWeights::default(), DEFAULT_THRESHOLD)
                        .aggregate
                        < DEFAULT_THRESHOLD
                })
                .count();
            assert_eq!(kept, within, "{query}");
        }
    }

    #[test]
    fn test_nonsense_query_has_no_hits() {
        let catalog = make_test_catalog();
        let engine = MatchingEngine::new();
        assert!(engine.search("xyzzyqq", &catalog.all()).is_empty());
    }

    #[test]
    fn test_search_is_deterministic() {
        let catalog = make_test_catalog();
        let engine = MatchingEngine::new();
        let corpus = catalog.all();

        let order = |hits: Vec<SearchHit<'_>>| {
            hits.iter().map(|h| h.protocol.id.clone()).collect::<Vec<_>>()
        };
        let first = order(engine.search("cardiac arrest", &corpus));
        let second = order(engine.search("cardiac arrest", &corpus));
        assert_eq!(first, second);
        assert!(first.len() >= 2);
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let a = Protocol::new("first", "Burns", "");
        let b = Protocol::new("second", "Burns", "");
        let engine = MatchingEngine::new();

        let hits = engine.search("burns", &[&a, &b]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].protocol.id.as_str(), "first");

        let hits = engine.search("burns", &[&b, &a]);
        assert_eq!(hits[0].protocol.id.as_str(), "second");
    }

    #[test]
    fn test_name_outranks_content() {
        let in_name = Protocol::new("x1", "Stroke", "assessment");
        let in_content = Protocol::new("x2", "Other", "stroke");
        let engine = MatchingEngine::new();

        let hits = engine.search("stroke", &[&in_content, &in_name]);
        assert_eq!(hits[0].protocol.id.as_str(), "x1");
    }

    fn body_only() -> Protocol {
        Protocol::new("ca", "Cardiac Arrest", "Administer epinephrine 1 mg IV")
    }

    #[test]
    fn test_content_typos_and_partial_words() {
        let protocol = body_only();
        let engine = MatchingEngine::new();

        for query in ["epinephrine", "epinephrin", "epinefrine", "epi", "cardiac epinephrin"] {
            let hits = engine.search(query, &[&protocol]);
            assert_eq!(hits.len(), 1, "{query}");
            assert!(hits[0].scores.aggregate < DEFAULT_THRESHOLD, "{query}");
        }
        assert!(engine.search("xyzzyqq", &[&protocol]).is_empty());
    }

    #[test]
    fn test_content_match_ranks_below_name_match() {
        let in_body = body_only();
        let in_name = Protocol::new("epi", "Epinephrine Administration", "Check the label");
        let engine = MatchingEngine::new();

        let hits = engine.search("epinefrine", &[&in_body, &in_name]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].protocol.id.as_str(), "epi");
    }

    #[test]
    fn test_limit_and_filter() {
        let catalog = make_test_catalog();
        let engine = MatchingEngine::with_config(MatchingConfig {
            limit: Some(1),
            ..MatchingConfig::default()
        });

        let filter = CategoryFilter::new(["pediatric"], CategoryMode::Any);
        let hits = engine.search_catalog("cardiac arrest", &catalog, &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].protocol.id.as_str(), "cardiac_arrest_pediatric");
    }
}
