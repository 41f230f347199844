use serde::Serialize;
use strsim::normalized_damerau_levenshtein;

use crate::core::protocol::Protocol;
use crate::matching::engine::FieldWeights;

/// Similarity credit for a query token matching only the start of a word
pub const PREFIX_FACTOR: f64 = 0.9;

/// Safely convert usize to f64 for averaging
#[inline]
fn count_to_f64(count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

/// Per-field and aggregate dissimilarity of one protocol against a query
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldScores {
    /// Name dissimilarity, 0 (identical) to 1 (unrelated)
    pub name: f64,
    /// Id dissimilarity
    pub id: f64,
    /// Content dissimilarity
    pub content: f64,
    /// Weighted aggregate across all fields
    pub aggregate: f64,
}

impl FieldScores {
    /// Score a protocol's pre-tokenized fields against query tokens.
    ///
    /// The per-field values are plain dissimilarities for display; the
    /// aggregate is [`weighted_aggregate`] over all three fields.
    #[must_use]
    pub fn calculate(
        query_tokens: &[String],
        protocol: &Protocol,
        weights: &FieldWeights,
        threshold: f64,
    ) -> Self {
        let name = field_dissimilarity(query_tokens, &protocol.name_tokens);
        let id = field_dissimilarity(query_tokens, &protocol.id_tokens);
        let content = field_dissimilarity(query_tokens, &protocol.content_tokens);

        let aggregate = weighted_aggregate(
            query_tokens,
            &[
                (protocol.name_tokens.as_slice(), weights.name),
                (protocol.id_tokens.as_slice(), weights.id),
                (protocol.content_tokens.as_slice(), weights.content),
            ],
            threshold,
        );

        Self {
            name,
            id,
            content,
            aggregate,
        }
    }
}

/// Value of one query token matched in a field with dissimilarity `d`.
///
/// A match within the threshold is lifted towards the threshold by
/// `1 - relative_weight`: a full-weight field keeps `d`, a zero-weight field
/// lands exactly on the threshold and can never retain a protocol alone.
fn weighted_token_value(d: f64, relative_weight: f64, threshold: f64) -> f64 {
    if d < threshold {
        d + (threshold - d) * (1.0 - relative_weight)
    } else {
        d
    }
}

/// Aggregate weighted dissimilarity of a query against a set of
/// `(field tokens, weight)` pairs, in `[0, 1]`.
///
/// Each query token is credited to the field where it scores lowest, so a
/// query may mix words from the name and the body. The aggregate is the
/// mean over query tokens. Weights are taken relative to the largest one;
/// lower-weight fields rank below higher-weight fields for the same match
/// quality. An empty query scores 1.0.
#[must_use]
pub fn weighted_aggregate(query_tokens: &[String], fields: &[(&[String], f64)], threshold: f64) -> f64 {
    if query_tokens.is_empty() {
        return 1.0;
    }

    let max_weight = fields.iter().map(|&(_, w)| w).fold(0.0_f64, f64::max);
    let relative = |weight: f64| {
        if max_weight > 0.0 {
            (weight / max_weight).clamp(0.0, 1.0)
        } else {
            1.0
        }
    };

    let total: f64 = query_tokens
        .iter()
        .map(|q| {
            fields
                .iter()
                .map(|&(tokens, weight)| {
                    let d = 1.0 - best_token_similarity(q, tokens);
                    weighted_token_value(d, relative(weight), threshold)
                })
                .fold(1.0_f64, f64::min)
        })
        .sum();

    (total / count_to_f64(query_tokens.len())).clamp(0.0, 1.0)
}

/// Dissimilarity of a field against a query: `1 - mean(best token similarity)`.
///
/// Every query token looks for its closest field token. A field that
/// contains every query token as a whole word scores 0.0; an empty query or
/// field scores 1.0.
#[must_use]
pub fn field_dissimilarity(query_tokens: &[String], field_tokens: &[String]) -> f64 {
    if query_tokens.is_empty() || field_tokens.is_empty() {
        return 1.0;
    }

    let total: f64 = query_tokens
        .iter()
        .map(|q| best_token_similarity(q, field_tokens))
        .sum();

    (1.0 - total / count_to_f64(query_tokens.len())).clamp(0.0, 1.0)
}

fn best_token_similarity(query_token: &str, field_tokens: &[String]) -> f64 {
    let mut best = 0.0_f64;
    for token in field_tokens {
        let similarity = token_similarity(query_token, token);
        if similarity > best {
            best = similarity;
            if best >= 1.0 {
                break;
            }
        }
    }
    best
}

/// Typo-tolerant similarity of two tokens in `[0, 1]`.
///
/// Whole-word Damerau-Levenshtein similarity, or, when the field token is
/// longer, the similarity against its prefix of the same length scaled by
/// [`PREFIX_FACTOR`]. The prefix comparison lets partial words ("epi",
/// "cardi") match.
#[must_use]
pub fn token_similarity(query_token: &str, field_token: &str) -> f64 {
    let whole = normalized_damerau_levenshtein(query_token, field_token);

    let query_len = query_token.chars().count();
    if field_token.chars().count() <= query_len {
        return whole;
    }

    let prefix_end = field_token
        .char_indices()
        .nth(query_len)
        .map_or(field_token.len(), |(i, _)| i);
    let prefix = &field_token[..prefix_end];
    let partial = PREFIX_FACTOR * normalized_damerau_levenshtein(query_token, prefix);

    whole.max(partial)
}
