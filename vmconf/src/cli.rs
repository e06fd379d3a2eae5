use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "vmconf")]
#[command(about = "Convert virtual machine configurations between Proxmox VE and libvirt")]
pub struct Cli {
    /// Section catalog TOML replacing the embedded catalog.
    #[arg(long, global = true, env = "VMCONF_CATALOG")]
    pub catalog_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Convert a configuration to another format.
    Convert(ConvertArgs),
    /// Generate a deployment script for a configuration.
    Script(ScriptArgs),
    /// Show the fields decoded from a configuration.
    Decode(DecodeArgs),
    /// Show the default configuration.
    Defaults(DefaultsArgs),
    /// Show the section catalog.
    Catalog(CatalogArgs),
}

/// How to read an input file.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum InputFormat {
    /// Detect from the file extension, then the content.
    Auto,
    Flat,
    Markup,
    /// A JSON object of field values (editor state).
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Source configuration file, or `-` for stdin.
    pub input: PathBuf,
    /// Destination format: flat (pve, conf) or markup (libvirt, xml).
    #[arg(long)]
    pub to: String,
    /// Source format.
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub from: InputFormat,
    /// Output file path. Prints to stdout when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Fill fields missing from the input with default values.
    #[arg(long)]
    pub with_defaults: bool,
    /// Flat-format defaults file used by --with-defaults.
    #[arg(long, requires = "with_defaults")]
    pub defaults_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ScriptArgs {
    /// Source configuration file, or `-` for stdin.
    pub input: PathBuf,
    /// Deployment target: flat (pve) or markup (libvirt).
    #[arg(long)]
    pub target: String,
    /// Source format.
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub from: InputFormat,
    /// Output script path. Prints to stdout when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Fill fields missing from the input with default values.
    #[arg(long)]
    pub with_defaults: bool,
    /// Flat-format defaults file used by --with-defaults.
    #[arg(long, requires = "with_defaults")]
    pub defaults_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Configuration file, or `-` for stdin.
    pub input: PathBuf,
    /// Source format.
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub from: InputFormat,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Expand disk and network values into their parts.
    #[arg(long)]
    pub expand: bool,
    /// Print only the summary line.
    #[arg(long)]
    pub summary: bool,
}

#[derive(Parser, Debug)]
pub struct DefaultsArgs {
    /// Flat-format defaults file. Catalog defaults are used when omitted or unreadable.
    #[arg(long)]
    pub defaults_file: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct CatalogArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Show where the catalog was loaded from.
    #[arg(long)]
    pub verbose: bool,
}
