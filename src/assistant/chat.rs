use std::time::Duration;

use serde::Serialize;

use crate::assistant::client::{AssistantClient, AssistantError, ChatMessage, FallbackReason, Role};
use crate::core::protocol::Protocol;
use crate::matching::context::{build_context_preamble, select_context, ContextMatch};
use crate::utils::text::truncate_chars;

/// Turns of history forwarded to the model after the system preamble
pub const MAX_FORWARDED_TURNS: usize = 10;

/// Characters of protocol content quoted per protocol in a fallback reply
const FALLBACK_EXCERPT_CHARS: usize = 300;

/// Outcome of asking the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssistantReply {
    Generated { text: String },
    Fallback { text: String, reason: FallbackReason },
}

impl AssistantReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Generated { text } | Self::Fallback { text, .. } => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Summary of a protocol handed to the assistant as context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSummary {
    pub id: String,
    pub name: String,
    pub source_file: String,
    pub score: u32,
}

impl From<&ContextMatch<'_>> for ContextSummary {
    fn from(m: &ContextMatch<'_>) -> Self {
        Self {
            id: m.protocol.id.to_string(),
            name: m.protocol.name.clone(),
            source_file: m.protocol.source_file.clone(),
            score: m.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub context: Vec<ContextSummary>,
    pub reply: AssistantReply,
}

/// Context selection and prompt assembly for one chat exchange
pub struct PreparedChat<'a> {
    pub context: Vec<ContextMatch<'a>>,
    pub messages: Vec<ChatMessage>,
}

impl PreparedChat<'_> {
    pub fn context_summary(&self) -> Vec<ContextSummary> {
        self.context.iter().map(ContextSummary::from).collect()
    }
}

/// A chat over a (possibly filtered) protocol corpus.
///
/// The session holds no conversation state; callers send the full history
/// with every request.
pub struct ChatSession<'a> {
    corpus: Vec<&'a Protocol>,
    assistant: Option<&'a AssistantClient>,
    budget: Option<Duration>,
}

impl<'a> ChatSession<'a> {
    pub fn new(corpus: Vec<&'a Protocol>, assistant: Option<&'a AssistantClient>) -> Self {
        Self {
            corpus,
            assistant,
            budget: None,
        }
    }

    /// Cap the time spent waiting for the assistant, on top of the client's
    /// own request timeout
    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Select context for the last user turn and build the message list:
    /// the system preamble followed by the most recent turns of `history`.
    /// System turns supplied by the caller are dropped.
    pub fn prepare(&self, history: &[ChatMessage]) -> PreparedChat<'a> {
        let query = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map_or("", |m| m.content.as_str());
        let context = select_context(query, &self.corpus);

        let turns: Vec<&ChatMessage> = history.iter().filter(|m| m.role != Role::System).collect();
        let start = turns.len().saturating_sub(MAX_FORWARDED_TURNS);

        let mut messages = Vec::with_capacity(MAX_FORWARDED_TURNS + 1);
        messages.push(ChatMessage::system(build_context_preamble(&context)));
        messages.extend(turns[start..].iter().map(|&m| m.clone()));

        PreparedChat { context, messages }
    }

    /// Answer the last user turn of `history`.
    ///
    /// Never fails: when the assistant is disabled or errors, the reply is a
    /// local fallback built from the selected context.
    pub async fn reply(&self, history: &[ChatMessage]) -> ChatReply {
        let prepared = self.prepare(history);
        let reply = match self.assistant {
            None => fallback_reply(&prepared.context, &AssistantError::NotConfigured),
            Some(client) => match self.complete(client, &prepared.messages).await {
                Ok(text) => AssistantReply::Generated { text },
                Err(e) => {
                    tracing::warn!(error = %e, "assistant request failed, using fallback");
                    fallback_reply(&prepared.context, &e)
                }
            },
        };

        ChatReply {
            context: prepared.context_summary(),
            reply,
        }
    }
}

impl ChatSession<'_> {
    async fn complete(
        &self,
        client: &AssistantClient,
        messages: &[ChatMessage],
    ) -> Result<String, AssistantError> {
        match self.budget {
            None => client.complete(messages).await,
            Some(budget) => tokio::time::timeout(budget, client.complete(messages))
                .await
                .unwrap_or(Err(AssistantError::Timeout(budget))),
        }
    }
}

/// Local reply listing the matched protocols.
///
/// Only the classified [`FallbackReason`] is kept; callers log the full error.
pub fn fallback_reply(context: &[ContextMatch<'_>], reason: &AssistantError) -> AssistantReply {
    let mut text = String::from("The AI assistant is unavailable. ");
    if context.is_empty() {
        text.push_str("No protocol matched your question; try different keywords or browse by category.");
    } else {
        text.push_str("These protocols match your question:\n");
        for m in context {
            let p = m.protocol;
            text.push_str(&format!(
                "\n- {} [{}]: {}",
                p.name,
                p.id,
                truncate_chars(p.content.trim(), FALLBACK_EXCERPT_CHARS)
            ));
        }
    }

    AssistantReply::Fallback {
        text,
        reason: reason.reason(),
    }
}
