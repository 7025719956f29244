//! CLI `resource` command: write a stored resource out.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use keepsake::config::KeepsakeConfig;
use keepsake::Note;

pub fn resource(config: &KeepsakeConfig, note: Note, name: &str, output: Option<&Path>) -> Result<()> {
    let engine = super::open_engine(config)?;
    let resource = engine.read_resource(note, name)?;

    match output {
        Some(path) => {
            std::fs::write(path, &resource.bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "Wrote {} bytes ({}) to {}",
                resource.bytes.len(),
                resource.content_type,
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&resource.bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
