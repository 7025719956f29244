//! The engine root: owns the ordered trait set and the current note.
//!
//! Lifecycle: [`Engine::load`] reads `metadata.json` (or starts a fresh log),
//! [`Engine::update`] applies one note at a time in strictly increasing order,
//! and [`Engine::save`] flushes every trait's archives and writes the metadata
//! back. Nothing is persisted implicitly except through cache eviction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::chunk::Chunk;
use crate::model::context::Context;
use crate::model::note::Note;
use crate::store::archive::ArchiveEntry;
use crate::store::cache::DEFAULT_CAPACITY;
use crate::store::persistent::write_atomic;
use crate::traits::{topological_order, Inputs, Trait, TraitDefinition, TraitKind, Updates};

/// File (under the root) holding the epoch offset and current note.
pub const METADATA_FILE: &str = "metadata.json";

/// Per-item, per-trait values returned by [`Engine::query`].
pub type QueryResult = BTreeMap<Note, BTreeMap<String, Value>>;

/// A binary attachment stored alongside a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Resources submitted with one note, by name.
pub type Resources = BTreeMap<String, Resource>;

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    epoch_offset: i64,
    last_note: Note,
}

/// Builder for [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    root: PathBuf,
    cache_size: usize,
    epoch_offset: Option<i64>,
    traits: Vec<TraitDefinition>,
}

impl EngineBuilder {
    /// Entries each trait cache keeps in memory. Raised to at least one.
    pub fn cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Epoch used when the root holds no metadata yet. Defaults to now.
    pub fn epoch_offset(mut self, epoch_offset: i64) -> Self {
        self.epoch_offset = Some(epoch_offset);
        self
    }

    pub fn traits(mut self, traits: Vec<TraitDefinition>) -> Self {
        self.traits = traits;
        self
    }

    /// Orders the traits and reads the root metadata.
    ///
    /// Fails if the trait graph is inconsistent or the metadata is unreadable.
    pub fn load(self) -> Result<Engine> {
        let ordered = topological_order(self.traits)?;

        let metadata_path = self.root.join(METADATA_FILE);
        let metadata = match std::fs::read_to_string(&metadata_path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| Error::Corrupt {
                path: metadata_path.clone(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Metadata {
                epoch_offset: self
                    .epoch_offset
                    .unwrap_or_else(|| chrono::Utc::now().timestamp()),
                last_note: Note::default(),
            },
            Err(err) => return Err(Error::io(metadata_path, err)),
        };

        let context = Context::new(self.root, metadata.epoch_offset);
        let cache_size = self.cache_size.max(1);
        let traits: Vec<Trait> = ordered
            .into_iter()
            .map(|definition| Trait::new(definition, context.clone(), cache_size))
            .collect();

        info!(
            root = %context.root().display(),
            epoch_offset = metadata.epoch_offset,
            note = %metadata.last_note,
            traits = traits.len(),
            "engine loaded"
        );

        Ok(Engine {
            context,
            note: metadata.last_note,
            has_unsaved_changes: false,
            traits,
        })
    }
}

#[derive(Debug)]
pub struct Engine {
    context: Context,
    note: Note,
    has_unsaved_changes: bool,
    /// Dependency order, fixed at construction.
    traits: Vec<Trait>,
}

impl Engine {
    pub fn builder(root: impl Into<PathBuf>) -> EngineBuilder {
        EngineBuilder {
            root: root.into(),
            cache_size: DEFAULT_CAPACITY,
            epoch_offset: None,
            traits: Self::default_traits(),
        }
    }

    /// Loads the engine at `root` with the default trait set.
    pub fn load(root: impl Into<PathBuf>, cache_size: usize) -> Result<Self> {
        Self::builder(root).cache_size(cache_size).load()
    }

    /// Text, flags, media, and two reference/back-reference pairs.
    pub fn default_traits() -> Vec<TraitDefinition> {
        vec![
            TraitDefinition::new("text", TraitKind::Text),
            TraitDefinition::new("open", TraitKind::Flag),
            TraitDefinition::new("section", TraitKind::Flag),
            TraitDefinition::new("parent", TraitKind::Reference),
            TraitDefinition::new(
                "children",
                TraitKind::BackReference {
                    reference: "parent".into(),
                },
            ),
            TraitDefinition::new("reference", TraitKind::Reference),
            TraitDefinition::new(
                "referees",
                TraitKind::BackReference {
                    reference: "reference".into(),
                },
            ),
            TraitDefinition::new("image", TraitKind::Media),
        ]
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn root(&self) -> &Path {
        self.context.root()
    }

    /// Most recently written note.
    pub fn note(&self) -> Note {
        self.note
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    /// Trait names in update order.
    pub fn trait_names(&self) -> Vec<&str> {
        self.traits.iter().map(Trait::name).collect()
    }

    /// Next note to write for a wall-clock instant.
    ///
    /// Uses the instant's own second when that is after the current note,
    /// otherwise bumps the increment of the current note. Fails with
    /// [`Error::NoteOutOfRange`] when the current second has no increments left.
    pub fn note_at(&self, unix_seconds: i64) -> Result<Note> {
        let candidate = Note::new(self.context.offset_at(unix_seconds), 0);
        if candidate > self.note {
            return Ok(candidate);
        }
        self.note.bump().ok_or(Error::NoteOutOfRange(self.note))
    }

    /// Applies one note.
    ///
    /// Every input and resource is validated before anything changes; a
    /// rejected call leaves the engine untouched. Once validation passes the
    /// note becomes current even if a later step fails, so a failed note is
    /// retried under a new one.
    pub fn update(&mut self, note: Note, inputs: Inputs, resources: Resources) -> Result<Updates> {
        if note <= self.note {
            return Err(Error::NoteNotAfterCurrent {
                current: self.note,
                requested: note,
            });
        }
        self.context.chunk(note)?;
        self.validate_inputs(note, &inputs)?;
        for name in resources.keys() {
            validate_resource_name(name)?;
        }

        self.note = note;
        self.has_unsaved_changes = true;

        let mut updates = Updates::new();
        for trait_ in &mut self.traits {
            updates = trait_.update(note, &inputs, updates)?;
        }

        for (name, resource) in &resources {
            self.write_resource(note, name, resource)?;
        }

        info!(
            %note,
            traits = updates.len(),
            items = updates.values().map(|changes| changes.len()).sum::<usize>(),
            resources = resources.len(),
            "note applied"
        );
        Ok(updates)
    }

    /// Values of every item created in `chunk`, as of `note` (or now).
    pub fn query(&mut self, chunk: Chunk, note: Option<Note>) -> Result<QueryResult> {
        self.check_readable(note)?;

        let mut result = QueryResult::new();
        for trait_ in &mut self.traits {
            let name = trait_.name().to_string();
            for (item, value) in trait_.get_chunk(chunk, note)? {
                result
                    .entry(*item)
                    .or_default()
                    .insert(name.clone(), value.clone());
            }
        }
        Ok(result)
    }

    /// Every trait's value for one item, as of `note` (or now).
    pub fn item(&mut self, item: Note, note: Option<Note>) -> Result<BTreeMap<String, Value>> {
        self.check_readable(note)?;

        let mut values = BTreeMap::new();
        for trait_ in &mut self.traits {
            if let Some(value) = trait_.get_item(item, note)? {
                values.insert(trait_.name().to_string(), value);
            }
        }
        Ok(values)
    }

    /// Archived history of one item, per trait. Traits with no entries are omitted.
    pub fn history(&mut self, item: Note) -> Result<BTreeMap<String, Vec<ArchiveEntry>>> {
        let mut histories = BTreeMap::new();
        for trait_ in &mut self.traits {
            let history = trait_.history(item)?;
            if !history.is_empty() {
                histories.insert(trait_.name().to_string(), history);
            }
        }
        Ok(histories)
    }

    pub fn read_resource(&self, note: Note, name: &str) -> Result<Resource> {
        validate_resource_name(name)?;
        let paths = self.context.resource_paths(note, name)?;

        let read = |path: &Path| {
            std::fs::read(path).map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => Error::ResourceNotFound {
                    note,
                    name: name.to_string(),
                },
                _ => Error::io(path, err),
            })
        };

        let bytes = read(&paths.blob)?;
        let content_type = String::from_utf8_lossy(&read(&paths.content_type)?)
            .trim()
            .to_string();
        Ok(Resource {
            content_type,
            bytes,
        })
    }

    /// Flushes every trait and writes the metadata.
    ///
    /// Returns `false` without touching disk when nothing changed since the
    /// last save.
    pub fn save(&mut self) -> Result<bool> {
        if !self.has_unsaved_changes {
            debug!("nothing to save");
            return Ok(false);
        }

        for trait_ in &mut self.traits {
            trait_.save()?;
        }

        let metadata = Metadata {
            epoch_offset: self.context.epoch_offset(),
            last_note: self.note,
        };
        let path = self.context.root().join(METADATA_FILE);
        let json = serde_json::to_string_pretty(&metadata).map_err(|source| Error::Corrupt {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, json.as_bytes())?;

        self.has_unsaved_changes = false;
        info!(note = %self.note, "engine saved");
        Ok(true)
    }

    fn check_readable(&self, note: Option<Note>) -> Result<()> {
        match note {
            Some(requested) if requested > self.note => Err(Error::NoteInFuture {
                current: self.note,
                requested,
            }),
            _ => Ok(()),
        }
    }

    fn validate_inputs(&self, note: Note, inputs: &Inputs) -> Result<()> {
        for (name, values) in inputs {
            let trait_ = self
                .traits
                .iter()
                .find(|trait_| trait_.name() == name)
                .ok_or_else(|| Error::UnknownTrait(name.clone()))?;

            for (item, value) in values {
                if *item > note {
                    return Err(Error::invalid_value(
                        name,
                        format!("item {item} does not exist yet at {note}"),
                    ));
                }
                trait_.kind().validate(name, note, value)?;
            }
        }
        Ok(())
    }

    fn write_resource(&self, note: Note, name: &str, resource: &Resource) -> Result<()> {
        let paths = self.context.resource_paths(note, name)?;
        write_atomic(&paths.blob, &resource.bytes)?;
        write_atomic(&paths.content_type, resource.content_type.as_bytes())?;
        debug!(%note, name, bytes = resource.bytes.len(), "resource written");
        Ok(())
    }
}

fn validate_resource_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::InvalidResourceName(name.to_string()));
    }
    Ok(())
}
