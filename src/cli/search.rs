use clap::Args;

use crate::catalog::store::ProtocolCatalog;
use crate::cli::{load_catalog, tsv_field, CategoryArgs, OutputFormat};
use crate::matching::context::{build_context_preamble, select_context};
use crate::matching::engine::{MatchingConfig, MatchingEngine, SearchHit, DEFAULT_THRESHOLD};
use crate::utils::text::truncate_chars;
use crate::utils::validation::validate_query;

/// Characters of content shown per hit in text output
const SNIPPET_CHARS: usize = 160;

#[derive(Args)]
pub struct SearchArgs {
    /// Search text (typos and partial words are tolerated)
    #[arg(required = true)]
    pub query: String,

    #[command(flatten)]
    pub categories: CategoryArgs,

    /// Number of results to show
    #[arg(short = 'n', long, default_value = "10")]
    pub max_results: usize,

    /// Dissimilarity threshold in [0, 1]; lower is stricter
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f64,
}

#[derive(Args)]
pub struct ContextArgs {
    /// Question as it would be asked in chat
    #[arg(required = true)]
    pub query: String,

    #[command(flatten)]
    pub categories: CategoryArgs,

    /// Print the full system preamble sent to the assistant
    #[arg(long)]
    pub preamble: bool,
}

pub fn run(
    args: SearchArgs,
    catalog: &ProtocolCatalog,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    validate_query(&args.query)?;
    if !(0.0..=1.0).contains(&args.threshold) {
        anyhow::bail!("Threshold must be between 0 and 1 (got {})", args.threshold);
    }

    let engine = MatchingEngine::with_config(MatchingConfig {
        threshold: args.threshold,
        limit: Some(args.max_results),
        ..MatchingConfig::default()
    });
    let filter = args.categories.filter();
    let hits = engine.search_catalog(&args.query, catalog, &filter);

    if hits.is_empty() {
        eprintln!("No matching protocols found.");
    }

    match format {
        OutputFormat::Text => print_text_hits(&hits, verbose),
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = hits
                .iter()
                .map(|h| {
                    serde_json::json!({
                        "id": h.protocol.id,
                        "name": h.protocol.name,
                        "source_file": h.protocol.source_file,
                        "categories": h.protocol.categories,
                        "relevance": h.relevance,
                        "similarity": h.similarity(),
                        "scores": h.scores,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("rank\tid\tname\trelevance\tsimilarity\tcategories");
            for (i, h) in hits.iter().enumerate() {
                println!(
                    "{}\t{}\t{}\t{}\t{:.4}\t{}",
                    i + 1,
                    h.protocol.id,
                    tsv_field(&h.protocol.name),
                    h.relevance,
                    h.similarity(),
                    h.protocol.categories.join(",")
                );
            }
        }
    }

    Ok(())
}

fn print_text_hits(hits: &[SearchHit<'_>], verbose: bool) {
    for (i, hit) in hits.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!(
            "#{} {} ({}, {:.1}%)",
            i + 1,
            hit.protocol.name,
            hit.relevance,
            hit.similarity() * 100.0
        );
        println!("   ID: {}", hit.protocol.id);
        if !hit.protocol.categories.is_empty() {
            println!("   Categories: {}", hit.protocol.categories.join(", "));
        }
        if !hit.protocol.source_file.is_empty() {
            println!("   Source: {}", hit.protocol.source_file);
        }
        if verbose {
            println!(
                "   Dissimilarity: name={:.3} id={:.3} content={:.3} aggregate={:.4}",
                hit.scores.name, hit.scores.id, hit.scores.content, hit.scores.aggregate
            );
        }
        let snippet = truncate_chars(&hit.protocol.content.replace('\n', " "), SNIPPET_CHARS);
        if !snippet.is_empty() {
            println!("   {snippet}");
        }
    }
}

pub fn run_context(
    args: ContextArgs,
    catalog: &ProtocolCatalog,
    format: OutputFormat,
) -> anyhow::Result<()> {
    validate_query(&args.query)?;
    let corpus = catalog.filter_by_categories(&args.categories.filter());
    let matches = select_context(&args.query, &corpus);

    if args.preamble {
        println!("{}", build_context_preamble(&matches));
        return Ok(());
    }

    if matches.is_empty() {
        eprintln!("No protocol matched the question's keywords.");
    }

    match format {
        OutputFormat::Text => {
            for m in &matches {
                println!("{:>3}  {} [{}]", m.score, m.protocol.name, m.protocol.id);
            }
        }
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = matches
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "id": m.protocol.id,
                        "name": m.protocol.name,
                        "score": m.score,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("score\tid\tname");
            for m in &matches {
                println!("{}\t{}\t{}", m.score, m.protocol.id, tsv_field(&m.protocol.name));
            }
        }
    }

    Ok(())
}
