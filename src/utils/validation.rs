//! Centralized request validation.

use crate::assistant::client::{ChatMessage, Role};
use crate::catalog::index::CategoryFilter;

/// Security-related constants for input validation
pub const MAX_QUERY_LENGTH: usize = 500;
pub const MAX_CATEGORIES: usize = 16;
pub const MAX_CATEGORY_LENGTH: usize = 64;
pub const MAX_PROTOCOL_ID_LENGTH: usize = 128;

/// Chat history limits (DOS protection)
pub const MAX_CHAT_TURNS: usize = 50;
pub const MAX_TURN_CHARS: usize = 8_000;

/// Validation error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Query too long: exceeds {MAX_QUERY_LENGTH} characters")]
    QueryTooLong,
    #[error("Input contains control characters")]
    ControlCharacters,
    #[error("Too many categories: at most {MAX_CATEGORIES} allowed")]
    TooManyCategories,
    #[error("Invalid category name")]
    InvalidCategory,
    #[error("Invalid protocol id")]
    InvalidProtocolId,
    #[error("Chat history is empty")]
    EmptyHistory,
    #[error("Chat history too long: at most {MAX_CHAT_TURNS} turns allowed")]
    HistoryTooLong,
    #[error("Chat message too long: exceeds {MAX_TURN_CHARS} characters")]
    TurnTooLong,
    #[error("The last chat message must come from the user")]
    LastTurnNotUser,
}

/// Characters other than ordinary whitespace below U+0020, and DEL
fn has_control_characters(s: &str) -> bool {
    s.chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

/// Validate a free-text query.
///
/// Empty and whitespace-only queries are valid (they simply match nothing).
///
/// # Errors
///
/// Returns `ValidationError::QueryTooLong` or
/// `ValidationError::ControlCharacters`.
pub fn validate_query(query: &str) -> Result<&str, ValidationError> {
    if query.chars().count() > MAX_QUERY_LENGTH {
        return Err(ValidationError::QueryTooLong);
    }
    if has_control_characters(query) {
        return Err(ValidationError::ControlCharacters);
    }
    Ok(query)
}

/// Category names a request may carry. Catalog loading applies the same rule
/// so every stored category stays selectable.
#[must_use]
pub fn is_valid_category(category: &str) -> bool {
    category.len() <= MAX_CATEGORY_LENGTH
        && category
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

/// Protocol ids addressable through `/api/protocols/{id}` and `show`
#[must_use]
pub fn is_valid_protocol_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_PROTOCOL_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Validate a category selection.
///
/// Category names are limited to ASCII letters, digits, `-` and `_`.
///
/// # Errors
///
/// Returns `ValidationError::TooManyCategories` or
/// `ValidationError::InvalidCategory`.
pub fn validate_categories(filter: &CategoryFilter) -> Result<(), ValidationError> {
    if filter.categories.len() > MAX_CATEGORIES {
        return Err(ValidationError::TooManyCategories);
    }
    if filter.categories.iter().all(|c| is_valid_category(c)) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCategory)
    }
}

/// Validate a protocol id taken from a URL or the command line
///
/// # Errors
///
/// Returns `ValidationError::InvalidProtocolId` if the id is empty, too long
/// or contains characters outside `[A-Za-z0-9_-.]`.
pub fn validate_protocol_id(id: &str) -> Result<&str, ValidationError> {
    if is_valid_protocol_id(id) {
        Ok(id)
    } else {
        Err(ValidationError::InvalidProtocolId)
    }
}

/// Validate a chat history before it is relayed
///
/// # Errors
///
/// Returns a `ValidationError` if the history is empty or too long, a turn is
/// too long or carries control characters, or the last turn is not from the
/// user.
pub fn validate_history(history: &[ChatMessage]) -> Result<(), ValidationError> {
    let Some(last) = history.last() else {
        return Err(ValidationError::EmptyHistory);
    };
    if history.len() > MAX_CHAT_TURNS {
        return Err(ValidationError::HistoryTooLong);
    }
    for turn in history {
        if turn.content.chars().count() > MAX_TURN_CHARS {
            return Err(ValidationError::TurnTooLong);
        }
        if has_control_characters(&turn.content) {
            return Err(ValidationError::ControlCharacters);
        }
    }
    if last.role != Role::User || last.content.trim().is_empty() {
        return Err(ValidationError::LastTurnNotUser);
    }
    Ok(())
}
