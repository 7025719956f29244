//! CLI `query` command: print a chunk's items as JSON.

use anyhow::Result;

use keepsake::config::KeepsakeConfig;
use keepsake::{Chunk, Note};

pub fn query(config: &KeepsakeConfig, chunk: Chunk, note: Option<Note>) -> Result<()> {
    let mut engine = super::open_engine(config)?;
    let items = engine.query(chunk, note)?;
    super::print_json(&items)
}
