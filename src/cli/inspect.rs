//! CLI `inspect` command: display values and history for a single item.

use anyhow::Result;
use serde_json::Value;

use keepsake::config::KeepsakeConfig;
use keepsake::Note;

pub fn inspect(config: &KeepsakeConfig, item: Note, note: Option<Note>) -> Result<()> {
    let mut engine = super::open_engine(config)?;
    let values = engine.item(item, note)?;
    let history = engine.history(item)?;

    println!("Item: {item}");
    println!("{}", "=".repeat(50));
    println!("  Chunk:          {}", engine.context().chunk(item)?);
    match note {
        Some(note) => println!("  As of:          {note}"),
        None => println!("  As of:          {} (current)", engine.note()),
    }
    println!();

    println!("Values:");
    if values.is_empty() {
        println!("  (none)");
    }
    for (name, value) in &values {
        println!("  {:<12} {}", name, value);
    }

    if !history.is_empty() {
        println!();
        println!("History:");
        for (name, entries) in &history {
            println!("  {name}:");
            for (at, value) in entries {
                let shown = value.as_ref().map(Value::to_string);
                println!("    {:<14} {}", at.to_string(), shown.as_deref().unwrap_or("(removed)"));
            }
        }
    }

    Ok(())
}
