//! Web server for browser-based protocol lookup.
//!
//! Serves a single-page UI and a JSON API over the same catalog, matchers
//! and calculator the CLI uses. The catalog is loaded once and shared
//! read-only across requests.
//!
//! ## Starting the Server
//!
//! ```text
//! # Start on default port 8080
//! ems-protocols serve
//!
//! # Custom port and auto-open browser
//! ems-protocols serve --port 3000 --open
//!
//! # Bind to all interfaces
//! ems-protocols serve --address 0.0.0.0
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /` - Main page
//! - `GET /api/protocols?categories=a,b&mode=any|all` - List protocols
//! - `GET /api/protocols/{id}` - One protocol with its full content
//! - `GET /api/categories` - Categories with protocol counts
//! - `GET /api/search?q=..&categories=..&mode=..&limit=..` - Fuzzy search
//! - `POST /api/context` - Keyword context selection for a question
//! - `POST /api/chat` - Assistant reply grounded in matching protocols
//! - `POST /api/chat/stream` - Same, as server-sent events
//! - `POST /api/quiz` - Multiple-choice questions
//! - `POST /api/calculate/dose`, `/drip`, `/convert` - Dosing calculator
//!
//! Errors are returned as `{"error", "error_type", "details": null}`.

pub mod server;
