//! Relay to an OpenAI-compatible chat completions API.
//!
//! The assistant is optional. [`client::AssistantConfig::from_env`] returns
//! `None` without an API key, and every caller then degrades to a locally
//! built reply. Requests are never retried.
//!
//! # Environment
//!
//! | Variable | Default |
//! |----------|---------|
//! | `EMS_AI_API_KEY` (or `OPENAI_API_KEY`) | unset: assistant disabled |
//! | `EMS_AI_BASE_URL` | `https://api.openai.com/v1` |
//! | `EMS_AI_MODEL` | `gpt-4o-mini` |
//! | `EMS_AI_TIMEOUT_SECS` | `30` |
//! | `EMS_AI_MAX_TOKENS` | `1024` |

pub mod chat;
pub mod client;
