//! CLI `stats` command: print storage statistics.

use anyhow::Result;

use keepsake::config::KeepsakeConfig;
use keepsake::health::storage_stats;

/// Display storage statistics in the terminal.
pub fn stats(config: &KeepsakeConfig) -> Result<()> {
    let engine = super::open_engine(config)?;
    let stats = storage_stats(&engine)?;

    println!("Keepsake Statistics");
    println!("{}", "=".repeat(40));
    println!("  Root:                {}", engine.root().display());
    println!("  Epoch offset:        {}", engine.context().epoch_offset());
    println!("  Current note:        {}", engine.note());
    println!();

    println!("Traits (update order):");
    for name in engine.trait_names() {
        println!("  {name}");
    }
    println!();

    println!("Chunks:                {}", stats.chunks);
    println!("Archive files:         {}", stats.archive_files);
    println!("Item histories:        {}", stats.histories);
    println!("Archived entries:      {}", stats.entries);
    println!("  of which removals:   {}", stats.tombstones);
    println!("Resources:             {}", stats.resources);
    println!("Size on disk:          {}", format_bytes(stats.bytes));

    if let Some(ref oldest) = stats.oldest_chunk {
        println!("Oldest chunk:          {oldest}");
    }
    if let Some(ref newest) = stats.newest_chunk {
        println!("Newest chunk:          {newest}");
    }

    Ok(())
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanised() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
