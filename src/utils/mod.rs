//! Shared helpers: text tokenization and request validation.

pub mod text;
pub mod validation;
