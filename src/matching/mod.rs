//! Relevance matching over the protocol catalog.
//!
//! Two matchers share the catalog, neither mutates it:
//!
//! - [`MatchingEngine`](engine::MatchingEngine): typo-tolerant weighted
//!   multi-field search used for direct user queries
//! - [`select_context`](context::select_context): keyword-overlap scorer that
//!   picks up to five protocols to ground an assistant prompt
//!
//! ## Fuzzy scoring
//!
//! Every query token is compared against the tokens of each field (name,
//! id, content) by Damerau-Levenshtein similarity, on the whole word or on
//! the word's prefix for partial input. The token is credited to the field
//! where it scores best; a match in a lighter field is pulled towards the
//! threshold, so it still counts but ranks below the same match in the name.
//! The aggregate is the mean over query tokens, and protocols whose
//! aggregate is below the threshold are returned, best first.
//!
//! | Field   | Weight |
//! |---------|--------|
//! | name    | 0.6    |
//! | id      | 0.5    |
//! | content | 0.2    |
//!
//! ## Example
//!
//! ```rust,no_run
//! use ems_protocols::{MatchingEngine, ProtocolCatalog};
//! use ems_protocols::matching::context::{build_context_preamble, select_context};
//!
//! let catalog = ProtocolCatalog::load_embedded().unwrap();
//! let corpus = catalog.all();
//!
//! let engine = MatchingEngine::new();
//! for hit in engine.search("cardiak arest", &corpus) {
//!     println!("{} ({:.1}%)", hit.protocol.name, hit.similarity() * 100.0);
//! }
//!
//! let context = select_context("what is the epinephrine dose in cardiac arrest", &corpus);
//! let preamble = build_context_preamble(&context);
//! ```

pub mod context;
pub mod engine;
pub mod scoring;
