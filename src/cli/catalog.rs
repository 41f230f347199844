use std::path::PathBuf;

use clap::Args;

use crate::catalog::store::ProtocolCatalog;
use crate::cli::{tsv_field, CategoryArgs, OutputFormat};
use crate::core::types::ProtocolId;
use crate::utils::validation::validate_protocol_id;

#[derive(Args)]
pub struct ShowArgs {
    /// Protocol ID (e.g. "cardiac_arrest_adult")
    #[arg(required = true)]
    pub id: String,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub categories: CategoryArgs,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output file path
    #[arg(required = true)]
    pub output: PathBuf,
}

pub fn run_list(
    args: ListArgs,
    catalog: &ProtocolCatalog,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let protocols = catalog.filter_by_categories(&args.categories.filter());

    match format {
        OutputFormat::Text => {
            let id_width = protocols
                .iter()
                .map(|p| p.id.as_str().len())
                .max()
                .unwrap_or(2)
                .max(2);
            let name_width = protocols
                .iter()
                .map(|p| p.name.chars().count())
                .max()
                .unwrap_or(4)
                .max(4);

            println!("{:<id_width$}  {:<name_width$}  Categories", "ID", "Name");
            println!("{}", "-".repeat(id_width + name_width + 14));
            for p in &protocols {
                println!(
                    "{:<id_width$}  {:<name_width$}  {}",
                    p.id.as_str(),
                    p.name,
                    p.categories.join(", ")
                );
            }
            println!("\n{} of {} protocols", protocols.len(), catalog.len());
        }
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = protocols
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "id": p.id,
                        "name": p.name,
                        "source_file": p.source_file,
                        "categories": p.categories,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("id\tname\tsource_file\tcategories");
            for p in &protocols {
                println!(
                    "{}\t{}\t{}\t{}",
                    p.id,
                    tsv_field(&p.name),
                    tsv_field(&p.source_file),
                    p.categories.join(",")
                );
            }
        }
    }

    Ok(())
}

pub fn run_show(args: ShowArgs, catalog: &ProtocolCatalog, format: OutputFormat) -> anyhow::Result<()> {
    validate_protocol_id(&args.id)?;
    let protocol = catalog
        .get(&ProtocolId::new(&args.id))
        .ok_or_else(|| anyhow::anyhow!("Protocol '{}' not found", args.id))?;

    match format {
        OutputFormat::Text => {
            println!("Protocol: {}\n", protocol.name);
            println!("ID:         {}", protocol.id);
            if !protocol.source_file.is_empty() {
                println!("Source:     {}", protocol.source_file);
            }
            if !protocol.categories.is_empty() {
                println!("Categories: {}", protocol.categories.join(", "));
            }
            println!("\n{}", protocol.content.trim_end());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(protocol)?);
        }
        OutputFormat::Tsv => {
            println!("id\tname\tsource_file\tcategories\tcontent");
            println!(
                "{}\t{}\t{}\t{}\t{}",
                protocol.id,
                tsv_field(&protocol.name),
                tsv_field(&protocol.source_file),
                protocol.categories.join(","),
                tsv_field(&protocol.content)
            );
        }
    }

    Ok(())
}

pub fn run_categories(catalog: &ProtocolCatalog, format: OutputFormat) -> anyhow::Result<()> {
    let counts = catalog.categories();

    match format {
        OutputFormat::Text => {
            if counts.is_empty() {
                eprintln!("No categories in catalog.");
            }
            let width = counts.keys().map(String::len).max().unwrap_or(8).max(8);
            for (category, count) in &counts {
                println!("{category:<width$}  {count}");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        OutputFormat::Tsv => {
            println!("category\tprotocols");
            for (category, count) in &counts {
                println!("{category}\t{count}");
            }
        }
    }

    Ok(())
}

pub fn run_export(args: ExportArgs, catalog: &ProtocolCatalog) -> anyhow::Result<()> {
    let json = catalog.to_json()?;
    std::fs::write(&args.output, json)?;

    println!(
        "Exported {} protocols to {}",
        catalog.len(),
        args.output.display()
    );

    Ok(())
}
