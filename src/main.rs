mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use keepsake::config::KeepsakeConfig;
use keepsake::{Chunk, Note};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keepsake", version, about = "Append-only knowledge store with time-travel reads")]
struct Cli {
    /// Config file to use instead of ~/.keepsake/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply one note of inputs (JSON: {trait: {item: value}}; the item key `new` means the note itself)
    Update {
        /// Inputs file, or `-` for stdin
        #[arg(default_value = "-")]
        inputs: String,
        /// Note to write at; defaults to the next note for the current time
        #[arg(long)]
        note: Option<Note>,
        /// Attach a resource, as name:content-type:path
        #[arg(long = "resource", value_name = "NAME:TYPE:PATH")]
        resources: Vec<String>,
    },
    /// Print every item of a chunk (YYYY-MM-DD) as JSON
    Query {
        chunk: Chunk,
        /// Read as of this note instead of now
        #[arg(long)]
        note: Option<Note>,
    },
    /// Show current values and full history of one item
    Inspect {
        item: Note,
        /// Read values as of this note instead of now
        #[arg(long)]
        note: Option<Note>,
    },
    /// Write a stored resource to stdout or a file
    Resource {
        note: Note,
        name: String,
        /// Destination file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Show storage statistics
    Stats,
    /// Check every archive file for corruption and ordering problems
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KeepsakeConfig::load_from(path)?,
        None => KeepsakeConfig::load()?,
    };

    // Log to stderr so stdout stays clean for JSON output.
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Update {
            inputs,
            note,
            resources,
        } => cli::update::update(&config, &inputs, note, &resources)?,
        Command::Query { chunk, note } => cli::query::query(&config, chunk, note)?,
        Command::Inspect { item, note } => cli::inspect::inspect(&config, item, note)?,
        Command::Resource { note, name, output } => {
            cli::resource::resource(&config, note, &name, output.as_deref())?
        }
        Command::Stats => cli::stats::stats(&config)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
