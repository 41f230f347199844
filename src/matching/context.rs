//! Keyword-overlap scoring used to pick grounding context for the assistant.
//!
//! Cruder than the fuzzy engine: plain substring containment,
//! no edit distance. It runs for every chat message.

use std::collections::HashSet;

use serde::Serialize;

use crate::core::protocol::Protocol;
use crate::utils::text::truncate_chars;

/// Maximum number of protocols handed to the assistant
pub const MAX_CONTEXT_PROTOCOLS: usize = 5;

/// Characters of protocol content quoted in the preamble
pub const MAX_CONTEXT_CHARS: usize = 4_000;

const STOP_WORDS: &[&str] = &["is", "the", "for", "and", "a", "of", "to", "in"];

/// A protocol selected as context, with its keyword score
#[derive(Debug, Clone, Serialize)]
pub struct ContextMatch<'a> {
    pub protocol: &'a Protocol,
    pub score: u32,
}

/// Keywords of a conversational query: lower-cased whitespace tokens longer
/// than two characters that are not stop-words. Duplicates are kept.
#[must_use]
pub fn extract_keywords(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() > 2 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Keyword score of one protocol.
///
/// +2 per keyword found in the name, +1 per keyword found in the content,
/// then a bonus of `2n` when more than one distinct keyword hits the name and
/// `c` when more than one distinct keyword hits the content.
#[must_use]
pub fn keyword_score(keywords: &[String], protocol: &Protocol) -> u32 {
    let mut score = 0u32;
    let mut name_hits: HashSet<&str> = HashSet::new();
    let mut content_hits: HashSet<&str> = HashSet::new();

    for keyword in keywords {
        if protocol.name_lower.contains(keyword.as_str()) {
            score += 2;
            name_hits.insert(keyword.as_str());
        }
        if protocol.content_lower.contains(keyword.as_str()) {
            score += 1;
            content_hits.insert(keyword.as_str());
        }
    }

    let name_match_count = u32::try_from(name_hits.len()).unwrap_or(u32::MAX);
    let content_match_count = u32::try_from(content_hits.len()).unwrap_or(u32::MAX);
    if name_match_count > 1 {
        score = score.saturating_add(name_match_count.saturating_mul(2));
    }
    if content_match_count > 1 {
        score = score.saturating_add(content_match_count);
    }
    score
}

/// Pick up to [`MAX_CONTEXT_PROTOCOLS`] protocols relevant to `query`.
///
/// Returns nothing when the query has no keywords. Zero scores are dropped;
/// equal scores keep corpus order.
pub fn select_context<'a>(query: &str, corpus: &[&'a Protocol]) -> Vec<ContextMatch<'a>> {
    let keywords = extract_keywords(query);
    if keywords.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<ContextMatch<'a>> = corpus
        .iter()
        .map(|&protocol| ContextMatch {
            protocol,
            score: keyword_score(&keywords, protocol),
        })
        .filter(|m| m.score > 0)
        .collect();

    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches.truncate(MAX_CONTEXT_PROTOCOLS);

    tracing::debug!(
        keywords = keywords.len(),
        selected = matches.len(),
        "selected chat context"
    );
    matches
}

/// Build the system preamble that grounds the assistant in the selected
/// protocols
#[must_use]
pub fn build_context_preamble(matches: &[ContextMatch<'_>]) -> String {
    let mut preamble = String::from(
        "You are an EMS protocol assistant supporting emergency medical services \
         providers. Answer using the protocols below. Quote doses and steps exactly \
         as written, name the protocol you are citing, and say so plainly when the \
         protocols do not cover the question. Always defer to local medical control.\n",
    );

    if matches.is_empty() {
        preamble.push_str(
            "\nNo specific protocol matched this question. Answer from general EMS \
             knowledge and state that no matching local protocol was found.\n",
        );
        return preamble;
    }

    preamble.push_str("\nRelevant protocols:\n");
    for m in matches {
        let protocol = m.protocol;
        preamble.push_str(&format!("\n### {} [{}]", protocol.name, protocol.id));
        if !protocol.source_file.is_empty() {
            preamble.push_str(&format!(" (source: {})", protocol.source_file));
        }
        preamble.push('\n');
        preamble.push_str(&truncate_chars(&protocol.content, MAX_CONTEXT_CHARS));
        preamble.push('\n');
    }
    preamble
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_keywords() {
        assert_eq!(
            extract_keywords("what is cardiac arrest"),
            vec!["what", "cardiac", "arrest"]
        );
        assert_eq!(extract_keywords("The dose FOR an MI"), vec!["dose"]);
        assert!(extract_keywords("is it a go").is_empty());
        assert!(extract_keywords("   ").is_empty());
    }

    #[test]
    fn test_cardiac_arrest_scoring() {
        let protocol = Protocol::new("ca", "Cardiac Arrest", "epinephrine every 3-5 minutes");
        let keywords = extract_keywords("what is cardiac arrest");

        // 2 + 2 for the name hits, plus the 2 * 2 multi-hit bonus
        assert_eq!(keyword_score(&keywords, &protocol), 8);

        let matches = select_context("what is cardiac arrest", &[&protocol]);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].score >= 8);
    }

    #[test]
    fn test_content_bonus() {
        let protocol = Protocol::new("x", "Other", "give oxygen and monitor glucose");
        let keywords = extract_keywords("oxygen glucose");
        // 1 + 1 content hits, plus 2 for two distinct content hits
        assert_eq!(keyword_score(&keywords, &protocol), 4);
    }

    #[test]
    fn test_duplicate_keywords_bonus_counts_distinct() {
        let protocol = Protocol::new("x", "Burns", "");
        let keywords = extract_keywords("burns burns");
        // Each occurrence scores, but only one distinct name hit: no bonus
        assert_eq!(keyword_score(&keywords, &protocol), 4);
    }

    #[test]
    fn test_no_keywords_no_context() {
        let protocol = Protocol::new("x", "Is", "the a of");
        assert!(select_context("is the a", &[&protocol]).is_empty());
    }

    #[test]
    fn test_zero_scores_dropped_and_top_five() {
        let protocols: Vec<Protocol> = (0..8)
            .map(|i| Protocol::new(format!("p{i}"), format!("Airway {i}"), "airway"))
            .chain(std::iter::once(Protocol::new("none", "Burns", "cool water")))
            .collect();
        let corpus: Vec<&Protocol> = protocols.iter().collect();

        let matches = select_context("airway", &corpus);
        assert_eq!(matches.len(), MAX_CONTEXT_PROTOCOLS);
        // Ties keep corpus order
        let ids: Vec<&str> = matches.iter().map(|m| m.protocol.id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn test_ranked_descending() {
        let weak = Protocol::new("weak", "Other", "stroke scale");
        let strong = Protocol::new("strong", "Stroke Scale", "stroke scale");
        let matches = select_context("stroke scale", &[&weak, &strong]);
        assert_eq!(matches[0].protocol.id.as_str(), "strong");
        assert!(matches[0].score > matches[1].score);
    }

    #[test]
    fn test_preamble() {
        let protocol = Protocol::new("ca", "Cardiac Arrest", "epinephrine every 3-5 minutes")
            .with_source_file("adult.pdf");
        let matches = select_context("cardiac arrest", &[&protocol]);
        let preamble = build_context_preamble(&matches);
        assert!(preamble.contains("### Cardiac Arrest [ca] (source: adult.pdf)"));
        assert!(preamble.contains("epinephrine every 3-5 minutes"));

        let empty = build_context_preamble(&[]);
        assert!(empty.contains("No specific protocol matched"));
    }
}
