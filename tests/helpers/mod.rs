#![allow(dead_code)]

use keepsake::{Engine, Inputs, Note, Resources, TraitDefinition, Updates};
use serde_json::Value;
use std::collections::BTreeMap;
use tempfile::TempDir;

/// Note at `offset` seconds with no increment.
pub fn n(offset: u64) -> Note {
    Note::new(offset, 0)
}

/// Fresh engine rooted in a temp dir, epoch at the UNIX epoch, default traits.
pub fn test_engine(cache_size: usize) -> (TempDir, Engine) {
    let dir = TempDir::new().unwrap();
    let engine = reopen(&dir, cache_size);
    (dir, engine)
}

/// Fresh engine with a custom trait set.
pub fn engine_with_traits(traits: Vec<TraitDefinition>, cache_size: usize) -> (TempDir, Engine) {
    let dir = TempDir::new().unwrap();
    let engine = Engine::builder(dir.path())
        .epoch_offset(0)
        .cache_size(cache_size)
        .traits(traits)
        .load()
        .unwrap();
    (dir, engine)
}

/// Load the engine stored in `dir` again.
pub fn reopen(dir: &TempDir, cache_size: usize) -> Engine {
    Engine::builder(dir.path())
        .epoch_offset(0)
        .cache_size(cache_size)
        .load()
        .unwrap()
}

/// Build inputs from `(trait, item, value)` triples.
pub fn inputs(values: &[(&str, Note, Value)]) -> Inputs {
    let mut inputs = Inputs::new();
    for (trait_name, item, value) in values {
        inputs
            .entry(trait_name.to_string())
            .or_insert_with(BTreeMap::new)
            .insert(*item, value.clone());
    }
    inputs
}

/// Apply one note with no resources, panicking on failure.
pub fn apply(engine: &mut Engine, note: Note, values: &[(&str, Note, Value)]) -> Updates {
    engine.update(note, inputs(values), Resources::new()).unwrap()
}
