//! # ems-protocols
//!
//! A field reference for emergency medical services providers: search a
//! catalog of EMS protocols, ground an AI assistant in them, quiz on them,
//! and run the usual dosing arithmetic.
//!
//! Protocols are short documents (a name, a body, a source file and category
//! tags). Queries typed under pressure are often misspelled or partial, so
//! search is typo-tolerant and scored by a bounded dissimilarity metric.
//!
//! ## Features
//!
//! - **Fuzzy search**: Edit-distance matching over name, id and content with
//!   per-field weights
//! - **Category filter**: Narrow by tags with any/all semantics
//! - **Assistant context**: Keyword scoring picks the protocols quoted to the
//!   language model
//! - **Dosing calculator**: Weight-based dose, drip rate, lbs/kg conversion
//! - **Quiz**: Multiple-choice questions, generated or built locally
//!
//! ## Example
//!
//! ```rust
//! use ems_protocols::{CategoryFilter, CategoryMode, MatchingEngine, ProtocolCatalog};
//!
//! // Load the embedded catalog
//! let catalog = ProtocolCatalog::load_embedded().unwrap();
//!
//! // Typo-tolerant search restricted to adult protocols
//! let engine = MatchingEngine::new();
//! let filter = CategoryFilter::new(["adult"], CategoryMode::Any);
//! let hits = engine.search_catalog("cardiac arest", &catalog, &filter);
//!
//! for hit in &hits {
//!     println!("{}: {:.1}%", hit.protocol.name, hit.similarity() * 100.0);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: Protocol catalog storage and category indexing
//! - [`core`]: Core data types for protocols
//! - [`matching`]: Fuzzy search engine and keyword context scorer
//! - [`dosing`]: Medication dosing calculator
//! - [`quiz`]: Quiz candidate selection and question generation
//! - [`assistant`]: Chat relay to an OpenAI-compatible API
//! - [`cli`]: Command-line interface implementation
//! - [`web`]: Web server for browser-based lookup

pub mod assistant;
pub mod catalog;
pub mod cli;
pub mod core;
pub mod dosing;
pub mod matching;
pub mod quiz;
pub mod utils;
pub mod web;

// Re-export commonly used types for convenience
pub use catalog::index::CategoryFilter;
pub use catalog::store::ProtocolCatalog;
pub use core::protocol::Protocol;
pub use core::types::*;
pub use matching::engine::{MatchingConfig, MatchingEngine, SearchHit};
