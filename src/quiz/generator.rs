use std::time::Duration;

use futures::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assistant::client::{AssistantClient, AssistantError, ChatMessage, FallbackReason};
use crate::catalog::index::CategoryFilter;
use crate::catalog::store::ProtocolCatalog;
use crate::core::protocol::Protocol;
use crate::utils::text::truncate_chars;

pub const MAX_QUIZ_QUESTIONS: usize = 20;
pub const DEFAULT_QUIZ_QUESTIONS: usize = 5;

/// Wall-clock cap for all assistant calls of one quiz
pub const DEFAULT_QUIZ_BUDGET: Duration = Duration::from_secs(45);

/// Options in an assistant-written question
pub const AI_OPTION_COUNT: usize = 4;

/// Protocol content quoted in a prompt or a fallback excerpt
const PROMPT_CONTENT_CHARS: usize = 3_000;
const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub protocol_id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_index).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuizItem {
    Generated { question: Question },
    Fallback { question: Question, reason: FallbackReason },
}

impl QuizItem {
    pub fn question(&self) -> &Question {
        match self {
            Self::Generated { question } | Self::Fallback { question, .. } => question,
        }
    }
}

#[derive(Error, Debug)]
pub enum QuizError {
    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error("assistant reply contained no JSON object")]
    NoJson,

    #[error("assistant reply is not a valid question: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected {AI_OPTION_COUNT} options, got {0}")]
    WrongOptionCount(usize),

    #[error("correct_index {0} is out of range")]
    IndexOutOfRange(usize),

    #[error("question text is empty")]
    EmptyQuestion,
}

impl QuizError {
    /// Classification safe to return to clients
    pub fn reason(&self) -> FallbackReason {
        match self {
            Self::Assistant(e) => e.reason(),
            _ => FallbackReason::InvalidResponse,
        }
    }
}

/// Clamp a requested question count into `1..=MAX_QUIZ_QUESTIONS`
pub fn clamp_count(count: usize) -> usize {
    count.clamp(1, MAX_QUIZ_QUESTIONS)
}

/// Filtered protocols with non-empty content, uniformly shuffled, cut to
/// `count` (clamped).
pub fn select_candidates<'a, R: Rng + ?Sized>(
    catalog: &'a ProtocolCatalog,
    filter: &CategoryFilter,
    count: usize,
    rng: &mut R,
) -> Vec<&'a Protocol> {
    let mut candidates: Vec<&Protocol> = catalog
        .filter_by_categories(filter)
        .into_iter()
        .filter(|p| !p.content.trim().is_empty())
        .collect();
    candidates.shuffle(rng);
    candidates.truncate(clamp_count(count));
    candidates
}

/// Build a question locally: quote an excerpt of `protocol` and ask which
/// protocol it comes from. Distractors are other names from `pool`. With no
/// distractor available the question becomes true/false.
pub fn fallback_question<R: Rng + ?Sized>(
    protocol: &Protocol,
    pool: &[&Protocol],
    rng: &mut R,
) -> Question {
    let excerpt = truncate_chars(protocol.content.trim(), EXCERPT_CHARS);
    let explanation = format!("This excerpt is from the \"{}\" protocol.", protocol.name);

    let mut others: Vec<&str> = pool
        .iter()
        .filter(|p| p.id != protocol.id)
        .map(|p| p.name.as_str())
        .filter(|name| *name != protocol.name)
        .collect();
    others.sort_unstable();
    others.dedup();

    if others.is_empty() {
        return Question {
            protocol_id: protocol.id.to_string(),
            question: format!(
                "True or false: this excerpt is from the \"{}\" protocol.\n\n\"{excerpt}\"",
                protocol.name
            ),
            options: vec!["True".to_string(), "False".to_string()],
            correct_index: 0,
            explanation,
        };
    }

    let mut options: Vec<String> = others
        .choose_multiple(rng, AI_OPTION_COUNT - 1)
        .map(|name| (*name).to_string())
        .collect();
    options.push(protocol.name.clone());
    options.shuffle(rng);
    let correct_index = options
        .iter()
        .position(|o| *o == protocol.name)
        .unwrap_or_default();

    Question {
        protocol_id: protocol.id.to_string(),
        question: format!("Which protocol contains this passage?\n\n\"{excerpt}\""),
        options,
        correct_index,
        explanation,
    }
}

fn question_prompt(protocol: &Protocol) -> Vec<ChatMessage> {
    let system = "You write multiple-choice quiz questions for EMS providers. \
        Reply with a single JSON object and nothing else, shaped as \
        {\"question\": string, \"options\": [4 strings], \"correct_index\": 0-3, \
        \"explanation\": string}. Test a concrete fact from the protocol such as \
        a dose, a threshold or a sequence of steps.";
    let user = format!(
        "Protocol: {}\n\n{}",
        protocol.name,
        truncate_chars(&protocol.content, PROMPT_CONTENT_CHARS)
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

#[derive(Deserialize)]
struct RawQuestion {
    question: String,
    options: Vec<String>,
    correct_index: usize,
    #[serde(default)]
    explanation: String,
}

/// Parse an assistant reply into a question for `protocol_id`.
///
/// Tolerates code fences and prose around the JSON object.
pub fn parse_question(reply: &str, protocol_id: &str) -> Result<Question, QuizError> {
    let start = reply.find('{').ok_or(QuizError::NoJson)?;
    let end = reply.rfind('}').ok_or(QuizError::NoJson)?;
    if end < start {
        return Err(QuizError::NoJson);
    }

    let raw: RawQuestion = serde_json::from_str(&reply[start..=end])?;
    if raw.options.len() != AI_OPTION_COUNT {
        return Err(QuizError::WrongOptionCount(raw.options.len()));
    }
    if raw.correct_index >= AI_OPTION_COUNT {
        return Err(QuizError::IndexOutOfRange(raw.correct_index));
    }
    if raw.question.trim().is_empty() {
        return Err(QuizError::EmptyQuestion);
    }

    Ok(Question {
        protocol_id: protocol_id.to_string(),
        question: raw.question.trim().to_string(),
        options: raw.options.into_iter().map(|o| o.trim().to_string()).collect(),
        correct_index: raw.correct_index,
        explanation: raw.explanation.trim().to_string(),
    })
}

/// Writes one question per candidate protocol.
///
/// Assistant calls run concurrently and share one time budget; any call
/// still pending when it runs out falls back.
pub struct QuizGenerator<'a> {
    assistant: Option<&'a AssistantClient>,
    budget: Duration,
}

impl<'a> QuizGenerator<'a> {
    pub fn new(assistant: Option<&'a AssistantClient>) -> Self {
        Self {
            assistant,
            budget: DEFAULT_QUIZ_BUDGET,
        }
    }

    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    async fn ai_question(&self, protocol: &Protocol) -> Result<Question, QuizError> {
        let client = self.assistant.ok_or(AssistantError::NotConfigured)?;
        let reply = client.complete(&question_prompt(protocol)).await?;
        parse_question(&reply, protocol.id.as_str())
    }

    /// One item per candidate, in candidate order. Distractors for fallback
    /// questions are drawn from `pool`.
    pub async fn generate<R: Rng + Send>(
        &self,
        candidates: &[&Protocol],
        pool: &[&Protocol],
        rng: &mut R,
    ) -> Vec<QuizItem> {
        let deadline = tokio::time::Instant::now() + self.budget;
        let budget = self.budget;
        let answers = join_all(candidates.iter().map(|&protocol| async move {
            tokio::time::timeout_at(deadline, self.ai_question(protocol))
                .await
                .unwrap_or(Err(QuizError::Assistant(AssistantError::Timeout(budget))))
        }))
        .await;

        // Fallbacks draw from the rng in candidate order so seeded quizzes repeat
        candidates
            .iter()
            .zip(answers)
            .map(|(&protocol, answer)| match answer {
                Ok(question) => QuizItem::Generated { question },
                Err(e) => {
                    if !matches!(e, QuizError::Assistant(AssistantError::NotConfigured)) {
                        tracing::warn!(protocol = %protocol.id, error = %e, "quiz question fell back");
                    }
                    QuizItem::Fallback {
                        question: fallback_question(protocol, pool, rng),
                        reason: e.reason(),
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::client::AssistantConfig;
    use crate::core::types::CategoryMode;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog() -> ProtocolCatalog {
        let mut catalog = ProtocolCatalog::new();
        let protocols = [
            Protocol::new("a", "Cardiac Arrest", "CPR and epinephrine").with_categories(["adult"]),
            Protocol::new("b", "Burns", "Cool with water").with_categories(["trauma"]),
            Protocol::new("c", "Seizure", "Midazolam").with_categories(["adult"]),
            Protocol::new("d", "Stroke", "FAST exam").with_categories(["adult"]),
            Protocol::new("e", "Empty", "   ").with_categories(["adult"]),
        ];
        for p in protocols {
            catalog.add_protocol(p).unwrap();
        }
        catalog
    }

    #[test]
    fn test_clamp_count() {
        assert_eq!(clamp_count(0), 1);
        assert_eq!(clamp_count(5), 5);
        assert_eq!(clamp_count(100), MAX_QUIZ_QUESTIONS);
    }

    #[test]
    fn test_select_candidates() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(7);

        let all = select_candidates(&catalog, &CategoryFilter::default(), 20, &mut rng);
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|p| p.id.as_str() != "e"));

        let adult = CategoryFilter::new(["adult"], CategoryMode::Any);
        let picked = select_candidates(&catalog, &adult, 2, &mut rng);
        assert_eq!(picked.len(), 2);
        assert!(picked.iter().all(|p| p.has_category("adult")));
    }

    #[test]
    fn test_select_candidates_is_a_permutation() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(42);
        let mut ids: Vec<&str> = select_candidates(&catalog, &CategoryFilter::default(), 20, &mut rng)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_fallback_question() {
        let catalog = catalog();
        let pool = catalog.all();
        let mut rng = StdRng::seed_from_u64(1);

        let target = &catalog.protocols[0];
        let q = fallback_question(target, &pool, &mut rng);
        assert_eq!(q.protocol_id, "a");
        assert_eq!(q.options.len(), 4);
        assert_eq!(q.correct_option(), Some("Cardiac Arrest"));
        assert!(q.question.contains("CPR and epinephrine"));

        let lonely = fallback_question(target, &[target], &mut rng);
        assert_eq!(lonely.options, vec!["True", "False"]);
        assert_eq!(lonely.correct_index, 0);
    }

    #[test]
    fn test_parse_question() {
        let reply = "```json\n{\"question\": \"Epi dose?\", \"options\": [\"1 mg\", \"2 mg\", \"3 mg\", \"4 mg\"], \"correct_index\": 0, \"explanation\": \"Per protocol\"}\n```";
        let q = parse_question(reply, "a").unwrap();
        assert_eq!(q.question, "Epi dose?");
        assert_eq!(q.correct_option(), Some("1 mg"));

        assert!(matches!(parse_question("no json here", "a"), Err(QuizError::NoJson)));
        assert!(matches!(
            parse_question(r#"{"question": "q", "options": ["x", "y"], "correct_index": 0}"#, "a"),
            Err(QuizError::WrongOptionCount(2))
        ));
        assert!(matches!(
            parse_question(r#"{"question": "q", "options": ["1","2","3","4"], "correct_index": 4}"#, "a"),
            Err(QuizError::IndexOutOfRange(4))
        ));
        assert!(matches!(parse_question("{oops}", "a"), Err(QuizError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn test_generate_without_assistant() {
        let catalog = catalog();
        let pool = catalog.all();
        let mut rng = StdRng::seed_from_u64(3);
        let candidates = select_candidates(&catalog, &CategoryFilter::default(), 3, &mut rng);

        let items = QuizGenerator::new(None).generate(&candidates, &pool, &mut rng).await;
        assert_eq!(items.len(), 3);
        for (item, protocol) in items.iter().zip(&candidates) {
            assert!(matches!(item, QuizItem::Fallback { .. }));
            assert_eq!(item.question().protocol_id, protocol.id.as_str());
        }
    }

    #[tokio::test]
    async fn test_generate_with_assistant() {
        let server = MockServer::start().await;
        let content = r#"{"question": "First drug in arrest?", "options": ["Epinephrine", "Adenosine", "Atropine", "Naloxone"], "correct_index": 0, "explanation": "Epi 1 mg."}"#;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": content}}]
            })))
            .mount(&server)
            .await;
        let client = AssistantClient::new(AssistantConfig::new(server.uri(), "k")).unwrap();

        let catalog = catalog();
        let pool = catalog.all();
        let mut rng = StdRng::seed_from_u64(3);
        let items = QuizGenerator::new(Some(&client))
            .generate(&pool[..1], &pool, &mut rng)
            .await;
        match &items[0] {
            QuizItem::Generated { question } => {
                assert_eq!(question.protocol_id, "a");
                assert_eq!(question.correct_option(), Some("Epinephrine"));
            }
            other => panic!("expected generated question, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_malformed_reply_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "Sorry, I can't help with that."}}]
            })))
            .mount(&server)
            .await;
        let client = AssistantClient::new(AssistantConfig::new(server.uri(), "k")).unwrap();

        let catalog = catalog();
        let pool = catalog.all();
        let mut rng = StdRng::seed_from_u64(3);
        let items = QuizGenerator::new(Some(&client))
            .generate(&pool[..1], &pool, &mut rng)
            .await;
        match &items[0] {
            QuizItem::Fallback { reason, .. } => {
                assert_eq!(*reason, FallbackReason::InvalidResponse)
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_slow_assistant_shares_one_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "choices": [{"message": {"content": "{}"}}]
                    }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
        let client = AssistantClient::new(AssistantConfig::new(server.uri(), "k")).unwrap();

        let catalog = catalog();
        let pool = catalog.all();
        let mut rng = StdRng::seed_from_u64(3);
        let candidates = select_candidates(&catalog, &CategoryFilter::default(), 3, &mut rng);

        let start = std::time::Instant::now();
        let items = QuizGenerator::new(Some(&client))
            .with_budget(Duration::from_millis(200))
            .generate(&candidates, &pool, &mut rng)
            .await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(items.len(), 3);
        for (item, protocol) in items.iter().zip(&candidates) {
            assert_eq!(item.question().protocol_id, protocol.id.as_str());
            match item {
                QuizItem::Fallback { reason, .. } => assert_eq!(*reason, FallbackReason::Timeout),
                other => panic!("expected fallback, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_quiz_error_reason() {
        assert_eq!(QuizError::NoJson.reason(), FallbackReason::InvalidResponse);
        assert_eq!(
            QuizError::Assistant(AssistantError::NotConfigured).reason(),
            FallbackReason::NotConfigured
        );
    }
}
