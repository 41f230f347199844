//! Protocol catalog storage and indexing.
//!
//! The catalog holds every known protocol, in the order they appear in the
//! source file. An embedded catalog is compiled into the binary, but custom
//! catalogs can also be loaded from JSON files. Nothing mutates a catalog
//! after loading; there is no create/update/delete at runtime.
//!
//! ## Corpus format
//!
//! A JSON object keyed by protocol id, optionally wrapped with a version:
//!
//! ```json
//! {
//!   "version": "1.0.0",
//!   "protocols": {
//!     "cardiac_arrest_adult": {
//!       "name": "Cardiac Arrest - Adult",
//!       "content": "Begin high quality CPR ...",
//!       "source_file": "adult_cardiac.pdf",
//!       "categories": ["adult", "cardiac"]
//!     }
//!   }
//! }
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use ems_protocols::{CategoryFilter, CategoryMode, ProtocolCatalog};
//!
//! let catalog = ProtocolCatalog::load_embedded().unwrap();
//!
//! let filter = CategoryFilter::new(["pediatric"], CategoryMode::Any);
//! for protocol in catalog.filter_by_categories(&filter) {
//!     println!("{}", protocol.name);
//! }
//! ```

pub mod index;
pub mod store;
