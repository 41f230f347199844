//! Core data types for protocol lookup.
//!
//! - [`Protocol`](protocol::Protocol): a single EMS protocol document with
//!   its pre-computed matching indexes
//! - [`ProtocolId`](types::ProtocolId): unique identifier, the join key
//!   between the catalog and its consumers
//! - [`CategoryMode`](types::CategoryMode): ANY/ALL semantics for category
//!   filtering
//! - [`Relevance`](types::Relevance): display bucket for search results

pub mod protocol;
pub mod types;
