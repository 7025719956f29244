//! Traits: named derivations compiled from the note log.
//!
//! A [`Trait`] owns two caches. The *archive* store holds the append-only
//! history of every item, one JSON file per (chunk, trait). The *snapshot*
//! cache holds point-in-time projections of those archives, keyed by chunk and
//! an optional bounding note (`None` meaning "current"). Only the current
//! snapshot ever changes: it is updated in place as notes are applied, while
//! bounded snapshots describe the past and stay valid once built.

pub mod kind;
pub mod scheduler;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::chunk::Chunk;
use crate::model::context::Context;
use crate::model::note::Note;
use crate::store::archive::{index_archive, Archive, ArchiveEntry, Snapshot};
use crate::store::cache::{BoundedCache, LoadOnly};
use crate::store::persistent::{PersistentStore, StoreKey};

pub use kind::TraitKind;
pub use scheduler::{topological_order, Schedulable};

/// Raw values submitted for one note: trait name → item → value.
pub type Inputs = BTreeMap<String, BTreeMap<Note, Value>>;

/// One trait's changes for one note: item → change.
pub type Changes = BTreeMap<Note, Change>;

/// Changes made so far in a pass: trait name → item → change.
pub type Updates = BTreeMap<String, Changes>;

/// An item's value before and after a note. `None` means absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Name and kind of a trait, before it is bound to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitDefinition {
    pub name: String,
    pub kind: TraitKind,
}

impl TraitDefinition {
    pub fn new(name: impl Into<String>, kind: TraitKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl Schedulable for TraitDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<&str> {
        self.kind.dependencies()
    }
}

type SnapshotKey = (Chunk, Option<Note>);

/// A trait bound to an engine's storage.
#[derive(Debug)]
pub struct Trait {
    name: String,
    kind: TraitKind,
    context: Context,
    archives: PersistentStore<Archive>,
    snapshots: BoundedCache<SnapshotKey, Snapshot>,
}

impl Trait {
    pub fn new(definition: TraitDefinition, context: Context, cache_size: usize) -> Self {
        Self {
            archives: PersistentStore::new(context.chunks_root(), Archive::new(), cache_size),
            snapshots: BoundedCache::new(cache_size),
            name: definition.name,
            kind: definition.kind,
            context,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TraitKind {
        &self.kind
    }

    /// Folds one note's inputs into this trait and returns `updates` with this
    /// trait's changes added.
    ///
    /// Each change is appended to the archive of the changed item's own chunk,
    /// so an item's whole history stays in one file per trait.
    pub fn update(&mut self, note: Note, inputs: &Inputs, mut updates: Updates) -> Result<Updates> {
        let kind = self.kind.clone();
        let name = self.name.clone();
        let changes = kind.derive(&name, note, inputs.get(&name), &updates, |item| {
            self.get_item(item, None)
        })?;

        for (item, change) in &changes {
            let chunk = self.context.chunk(*item)?;
            let archived = change.new.clone().map(|value| self.kind.serialise(value));
            self.archives
                .get(&archive_key(&chunk, &self.name))?
                .append(*item, note, archived)?;

            let current = self.snapshot(chunk, None)?;
            match &change.new {
                Some(value) => {
                    current.insert(*item, value.clone());
                }
                None => {
                    current.remove(item);
                }
            }
        }

        tracing::debug!(trait_name = %self.name, %note, items = changes.len(), "trait updated");
        if !changes.is_empty() {
            updates.insert(name, changes);
        }
        Ok(updates)
    }

    /// Value of every item created in `chunk`, as of `note` (or now).
    pub fn get_chunk(&mut self, chunk: Chunk, note: Option<Note>) -> Result<&Snapshot> {
        self.snapshot(chunk, note).map(|snapshot| &*snapshot)
    }

    /// Value of one item as of `note` (or now).
    pub fn get_item(&mut self, item: Note, note: Option<Note>) -> Result<Option<Value>> {
        let chunk = self.context.chunk(item)?;
        Ok(self.get_chunk(chunk, note)?.get(&item).cloned())
    }

    /// Raw archived history of one item.
    pub fn history(&mut self, item: Note) -> Result<Vec<ArchiveEntry>> {
        let chunk = self.context.chunk(item)?;
        Ok(self
            .archives
            .get(&archive_key(&chunk, &self.name))?
            .history(&item)
            .to_vec())
    }

    /// Writes every cached archive to disk.
    pub fn save(&mut self) -> Result<()> {
        self.archives.save()
    }

    fn snapshot(&mut self, chunk: Chunk, note: Option<Note>) -> Result<&mut Snapshot> {
        let Self {
            name,
            kind,
            archives,
            snapshots,
            ..
        } = self;

        let mut backing = LoadOnly(|(chunk, note): &SnapshotKey| -> Result<Snapshot> {
            let archive = archives.get(&archive_key(chunk, name.as_str()))?;
            Ok(kind.deserialise(index_archive(archive, *note)))
        });
        snapshots.get_with(&(chunk, note), &mut backing)
    }
}

/// Store key of the archive for one chunk and trait: `YYYY/MM/DD/<trait>`.
pub fn archive_key(chunk: &Chunk, trait_name: &str) -> StoreKey {
    let mut key: StoreKey = chunk.segments().into();
    key.push(trait_name.to_string());
    key
}
