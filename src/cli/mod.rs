pub mod doctor;
pub mod inspect;
pub mod query;
pub mod resource;
pub mod stats;
pub mod update;

use anyhow::{Context, Result};
use keepsake::config::KeepsakeConfig;
use keepsake::Engine;
use serde::Serialize;

/// Open the engine at the configured root with the default trait set.
pub fn open_engine(config: &KeepsakeConfig) -> Result<Engine> {
    let root = config.resolved_root();
    Engine::load(&root, config.storage.cache_size)
        .with_context(|| format!("failed to load engine at {}", root.display()))
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
