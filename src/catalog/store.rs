use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::catalog::index::{CategoryFilter, CategoryIndex};
use crate::core::protocol::Protocol;
use crate::core::types::ProtocolId;
use crate::utils::validation::{is_valid_category, is_valid_protocol_id};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Catalog root must be an object keyed by protocol id")]
    InvalidLayout,

    #[error("Duplicate protocol id: {0}")]
    DuplicateId(String),

    #[error("Protocol '{0}' has an empty name")]
    EmptyName(String),

    #[error("Invalid protocol id '{0}': use 1-128 of A-Z a-z 0-9 _ - .")]
    InvalidId(String),

    #[error("Protocol '{id}' has invalid category '{category}': use up to 64 of a-z 0-9 _ -")]
    InvalidCategory { id: String, category: String },
}

/// Catalog version for compatibility checking
pub const CATALOG_VERSION: &str = "1.0.0";

/// One protocol as it appears in a corpus file (the id is the map key)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolEntry {
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source_file: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

/// Serializable catalog format
#[derive(Debug, Clone, Serialize)]
pub struct CatalogData {
    pub version: String,
    pub created_at: String,
    pub protocols: serde_json::Map<String, serde_json::Value>,
}

/// A root is the wrapped format when its `protocols` member is a map of
/// objects. A bare map may use `protocols` as an ordinary id, whose entry
/// holds strings instead.
fn is_wrapped(root: &serde_json::Map<String, serde_json::Value>) -> bool {
    root.get("protocols")
        .and_then(serde_json::Value::as_object)
        .is_some_and(|protocols| protocols.values().all(serde_json::Value::is_object))
}

/// The protocol catalog with its indexes.
///
/// Built once at startup and read-only afterwards; share it behind an `Arc`
/// (the web server) or a plain reference (the CLI).
#[derive(Debug, Default)]
pub struct ProtocolCatalog {
    /// All protocols, in source order
    pub protocols: Vec<Protocol>,

    /// Index: protocol ID -> index in protocols vec
    id_to_index: HashMap<ProtocolId, usize>,

    /// Index: category -> indices of protocols carrying it
    category_index: CategoryIndex,
}

impl ProtocolCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the embedded default catalog
    pub fn load_embedded() -> Result<Self, CatalogError> {
        // Validated at compile time via build.rs
        const EMBEDDED_CATALOG: &str = include_str!("../../catalogs/protocols.json");
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Load catalog from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load a custom catalog when a path is given, the embedded one otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_embedded(),
        }
    }

    /// Parse catalog from a JSON string.
    ///
    /// Accepts either `{"version": .., "protocols": {id: protocol}}` or a bare
    /// `{id: protocol}` map. Map order becomes catalog order.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let root: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(mut root) = root else {
            return Err(CatalogError::InvalidLayout);
        };

        let entries = if is_wrapped(&root) {
            // Version check (warn but don't fail)
            if let Some(version) = root.get("version").and_then(|v| v.as_str()) {
                if version != CATALOG_VERSION {
                    tracing::warn!(
                        "Catalog version mismatch (expected {}, found {})",
                        CATALOG_VERSION,
                        version
                    );
                }
            }
            match root.remove("protocols") {
                Some(serde_json::Value::Object(protocols)) => protocols,
                _ => return Err(CatalogError::InvalidLayout),
            }
        } else {
            root
        };

        let mut catalog = Self::new();
        for (id, value) in entries {
            let entry: ProtocolEntry = serde_json::from_value(value)?;
            let protocol = Protocol::from_parts(
                id,
                entry.name,
                entry.content,
                entry.source_file,
                entry.categories,
            );
            catalog.add_protocol(protocol)?;
        }

        tracing::debug!("Loaded catalog with {} protocols", catalog.len());
        Ok(catalog)
    }

    /// Add a protocol to the catalog.
    ///
    /// Ids and categories must pass the same checks the web and CLI apply to
    /// user input, otherwise the protocol could never be looked up or selected.
    pub fn add_protocol(&mut self, protocol: Protocol) -> Result<(), CatalogError> {
        if !is_valid_protocol_id(protocol.id.as_str()) {
            return Err(CatalogError::InvalidId(protocol.id.0));
        }
        if protocol.name.trim().is_empty() {
            return Err(CatalogError::EmptyName(protocol.id.0));
        }
        if let Some(category) = protocol.categories.iter().find(|c| !is_valid_category(c)) {
            return Err(CatalogError::InvalidCategory {
                id: protocol.id.0.clone(),
                category: category.clone(),
            });
        }
        if self.id_to_index.contains_key(&protocol.id) {
            return Err(CatalogError::DuplicateId(protocol.id.0));
        }

        let index = self.protocols.len();
        self.id_to_index.insert(protocol.id.clone(), index);
        self.category_index.insert(index, &protocol.categories);
        self.protocols.push(protocol);
        Ok(())
    }

    /// Get a protocol by ID
    pub fn get(&self, id: &ProtocolId) -> Option<&Protocol> {
        self.id_to_index.get(id).map(|&idx| &self.protocols[idx])
    }

    /// All protocols, in catalog order
    pub fn all(&self) -> Vec<&Protocol> {
        self.protocols.iter().collect()
    }

    /// Protocols passing a category filter, in catalog order.
    ///
    /// An empty selection returns the whole catalog.
    pub fn filter_by_categories(&self, filter: &CategoryFilter) -> Vec<&Protocol> {
        if filter.is_empty() {
            return self.all();
        }
        self.category_index
            .matching_indices(filter)
            .into_iter()
            .map(|idx| &self.protocols[idx])
            .collect()
    }

    /// Distinct categories with the number of protocols carrying each, sorted by name
    pub fn categories(&self) -> BTreeMap<String, usize> {
        self.category_index.counts()
    }

    /// Export catalog to JSON (wrapped format)
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let mut protocols = serde_json::Map::new();
        for protocol in &self.protocols {
            let entry = ProtocolEntry {
                name: protocol.name.clone(),
                content: protocol.content.clone(),
                source_file: protocol.source_file.clone(),
                categories: protocol.categories.clone(),
            };
            protocols.insert(protocol.id.0.clone(), serde_json::to_value(entry)?);
        }

        let data = CatalogData {
            version: CATALOG_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            protocols,
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    /// Number of protocols in catalog
    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    /// Check if catalog is empty
    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}
