//! Command-line interface for ems-protocols.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **search**: Fuzzy search over protocol names, ids and content
//! - **context**: Show which protocols would ground an assistant answer
//! - **show** / **list** / **categories** / **export**: Browse the catalog
//! - **dose** / **drip** / **convert**: Medication dosing calculator
//! - **quiz**: Generate a multiple-choice quiz
//! - **ask**: One-shot question to the assistant, grounded in the protocols
//! - **serve**: Start the web interface
//!
//! ## Usage
//!
//! ```text
//! # Typo-tolerant search
//! ems-protocols search anaphylaxsis
//!
//! # Only pediatric protocols, JSON output
//! ems-protocols -f json search seizure -c pediatric
//!
//! # 0.5 mg/kg for 154 lbs, stock 100 mg in 1 mL
//! ems-protocols dose --weight 154 --weight-unit lbs --dose 0.5 --concentration-mg 100
//!
//! # Start web UI
//! ems-protocols serve --port 8080 --open
//! ```

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::catalog::index::CategoryFilter;
use crate::catalog::store::ProtocolCatalog;
use crate::core::types::CategoryMode;

pub mod ask;
pub mod catalog;
pub mod dosing;
pub mod quiz;
pub mod search;

#[derive(Parser)]
#[command(name = "ems-protocols")]
#[command(version)]
#[command(about = "Search, chat against, and quiz on EMS protocols")]
#[command(
    long_about = "ems-protocols is a field reference for emergency medical services providers.\n\nIt searches a catalog of EMS protocols with typo-tolerant matching and provides:\n- Category filtering (adult, pediatric, trauma, ...)\n- A weight-based dosing and drip-rate calculator\n- Multiple-choice quizzes\n- An optional AI assistant grounded in the matching protocols"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Path to custom catalog file (defaults to the embedded catalog)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fuzzy search for protocols
    Search(search::SearchArgs),

    /// Show the protocols selected as assistant context for a question
    Context(search::ContextArgs),

    /// Show a single protocol
    Show(catalog::ShowArgs),

    /// List protocols
    List(catalog::ListArgs),

    /// List categories with protocol counts
    Categories,

    /// Export the catalog to a file
    Export(catalog::ExportArgs),

    /// Calculate a weight-based dose
    Dose(dosing::DoseArgs),

    /// Calculate an IV drip rate
    Drip(dosing::DripArgs),

    /// Convert a weight between kg and lbs
    Convert(dosing::ConvertArgs),

    /// Generate a multiple-choice quiz
    Quiz(quiz::QuizArgs),

    /// Ask the assistant a question
    Ask(ask::AskArgs),

    /// Start the web server
    Serve(ServeArgs),
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Category selection shared by several commands
#[derive(Args, Debug, Default)]
pub struct CategoryArgs {
    /// Restrict to a category (repeatable, or comma separated)
    #[arg(short = 'c', long = "category", value_delimiter = ',')]
    pub categories: Vec<String>,

    /// Require every selected category instead of any of them
    #[arg(long)]
    pub match_all: bool,
}

impl CategoryArgs {
    pub fn filter(&self) -> CategoryFilter {
        let mode = if self.match_all {
            CategoryMode::All
        } else {
            CategoryMode::Any
        };
        CategoryFilter::new(&self.categories, mode)
    }
}

/// Load the catalog named by `--catalog`, or the embedded one
pub fn load_catalog(path: Option<&Path>, verbose: bool) -> anyhow::Result<ProtocolCatalog> {
    let catalog = ProtocolCatalog::load(path)?;
    if verbose {
        eprintln!("Loaded catalog with {} protocols", catalog.len());
    }
    if catalog.is_empty() {
        eprintln!("Warning: Catalog is empty, no protocols to search.");
    }
    Ok(catalog)
}

/// Escape a field for TSV output
pub(crate) fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}
