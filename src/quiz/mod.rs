//! Multiple-choice quizzes over the protocol corpus.
//!
//! Candidates are drawn uniformly at random from the filtered catalog. Each
//! candidate becomes one question, written by the assistant when it is
//! configured and answers with valid JSON, or built locally otherwise:
//!
//! ```
//! use ems_protocols::quiz::generator::{fallback_question, select_candidates};
//! use ems_protocols::{CategoryFilter, ProtocolCatalog};
//! use rand::SeedableRng;
//!
//! let catalog = ProtocolCatalog::load_embedded().unwrap();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(1);
//! let picked = select_candidates(&catalog, &CategoryFilter::default(), 3, &mut rng);
//! assert_eq!(picked.len(), 3);
//!
//! let question = fallback_question(picked[0], &catalog.all(), &mut rng);
//! assert_eq!(question.correct_option(), Some(picked[0].name.as_str()));
//! ```

pub mod generator;
