use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vmconf::catalog::{load_defaults, resolve_catalog};
use vmconf::field_map::materialize;
use vmconf::report::{render_catalog, render_model, render_summary, summarize};
use vmconf::SectionCatalog;

mod cli;
mod convert;
mod input;
mod output;
mod path_guard;
mod script_cmd;

use cli::{CatalogArgs, Cli, Command, DecodeArgs, DefaultsArgs, OutputFormat};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "VMCONF_LOG";

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (catalog, catalog_source) = resolve_catalog(cli.catalog_file.as_deref());

    match cli.command {
        Command::Convert(args) => convert::run_convert(args, &catalog),
        Command::Script(args) => script_cmd::run_script(args, &catalog),
        Command::Decode(args) => run_decode(args, &catalog),
        Command::Defaults(args) => run_defaults(args, &catalog),
        Command::Catalog(args) => run_catalog(args, &catalog, &catalog_source),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_decode(args: DecodeArgs, catalog: &SectionCatalog) -> Result<()> {
    let model = input::load_model(&args.input, args.from)?;
    let summary = summarize(&model, catalog);
    if args.summary {
        println!("{}", render_summary(summary));
        return Ok(());
    }

    let model = if args.expand {
        materialize(&model)
    } else {
        model
    };
    match args.format {
        OutputFormat::Text => {
            println!("{}", render_summary(summary));
            println!("{}", render_model(&model, catalog));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&model)?),
    }
    Ok(())
}

fn run_defaults(args: DefaultsArgs, catalog: &SectionCatalog) -> Result<()> {
    let defaults = match &args.defaults_file {
        Some(path) => load_defaults(path, catalog),
        None => catalog.defaults(),
    };

    match args.format {
        OutputFormat::Text => println!("{}", render_model(&defaults, catalog)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&defaults)?),
    }
    Ok(())
}

fn run_catalog(args: CatalogArgs, catalog: &SectionCatalog, source: &str) -> Result<()> {
    match args.format {
        OutputFormat::Text => {
            if args.verbose {
                println!("Using catalog: {source}");
            }
            println!("{}", render_catalog(catalog));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(catalog)?),
    }
    Ok(())
}
