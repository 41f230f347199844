use clap::Parser;
use tracing_subscriber::EnvFilter;

use ems_protocols::cli::{self, Commands};
use ems_protocols::web;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("ems_protocols=debug,info")
    } else {
        EnvFilter::new("ems_protocols=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let format = cli.format;
    let verbose = cli.verbose;

    // Pure calculator commands don't need the catalog
    match cli.command {
        Commands::Dose(args) => return cli::dosing::run_dose(args, format),
        Commands::Drip(args) => return cli::dosing::run_drip(args, format),
        Commands::Convert(args) => return cli::dosing::run_convert(args, format),
        command => {
            let catalog = cli::load_catalog(cli.catalog.as_deref(), verbose)?;
            match command {
                Commands::Search(args) => cli::search::run(args, &catalog, format, verbose)?,
                Commands::Context(args) => cli::search::run_context(args, &catalog, format)?,
                Commands::Show(args) => cli::catalog::run_show(args, &catalog, format)?,
                Commands::List(args) => cli::catalog::run_list(args, &catalog, format)?,
                Commands::Categories => cli::catalog::run_categories(&catalog, format)?,
                Commands::Export(args) => cli::catalog::run_export(args, &catalog)?,
                Commands::Quiz(args) => cli::quiz::run(args, &catalog, format, verbose)?,
                Commands::Ask(args) => cli::ask::run(args, &catalog, format, verbose)?,
                Commands::Serve(args) => web::server::run(args, catalog)?,
                Commands::Dose(_) | Commands::Drip(_) | Commands::Convert(_) => {}
            }
        }
    }

    Ok(())
}
