//! CLI `doctor` command: check the storage tree and print a health report.

use anyhow::{bail, Context, Result};

use keepsake::config::KeepsakeConfig;
use keepsake::engine::METADATA_FILE;
use keepsake::health::check_storage;

/// Run storage diagnostics and print a health report.
pub fn doctor(config: &KeepsakeConfig) -> Result<()> {
    let root = config.resolved_root();

    if !root.join(METADATA_FILE).exists() {
        println!("Storage: no engine found at {}", root.display());
        println!("Run `keepsake update` to create one.");
        return Ok(());
    }

    let engine = super::open_engine(config).context("failed to open engine (metadata may be corrupt)")?;
    let report = check_storage(&engine).context("failed to scan storage")?;

    println!("Keepsake Health Report");
    println!("======================");
    println!();
    println!("Root:              {}", root.display());
    println!("Current note:      {}", engine.note());
    println!("Archives checked:  {}", report.files_checked);
    println!();

    if report.is_healthy() {
        println!("Consistency check: PASSED");
        return Ok(());
    }

    println!("Consistency check: FAILED ({} problems)", report.problems.len());
    for problem in &report.problems {
        println!("  {}: {}", problem.path.display(), problem.detail);
    }
    println!();
    println!("Recovery steps:");
    println!("  1. Restore the affected files from a backup of {}", root.display());
    println!("  2. Leftover .tmp files can be deleted once no engine is running");

    bail!("storage check found {} problems", report.problems.len())
}
