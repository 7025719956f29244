//! Storage context shared by the engine and its traits.

use chrono::DateTime;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::chunk::Chunk;
use crate::model::note::Note;

/// Folder (under the root) holding one sub-tree per chunk.
pub const CHUNKS_DIR: &str = "chunks";
/// Folder (inside a chunk) holding binary resources.
pub const RESOURCES_DIR: &str = "resources";

/// Where an engine lives on disk and how its notes map onto calendar days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    root: PathBuf,
    epoch_offset: i64,
}

/// Files backing one stored resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    /// Folder containing every resource attached to the note.
    pub folder: PathBuf,
    /// Raw bytes.
    pub blob: PathBuf,
    /// Content type, as plaintext.
    pub content_type: PathBuf,
}

impl Context {
    pub fn new(root: impl Into<PathBuf>, epoch_offset: i64) -> Self {
        Self {
            root: root.into(),
            epoch_offset,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// UNIX seconds at which note offset zero occurs.
    pub fn epoch_offset(&self) -> i64 {
        self.epoch_offset
    }

    pub fn chunks_root(&self) -> PathBuf {
        self.root.join(CHUNKS_DIR)
    }

    /// Calendar day (UTC) on which the given note occurred.
    pub fn chunk(&self, note: Note) -> Result<Chunk> {
        let seconds = i64::try_from(note.offset)
            .ok()
            .and_then(|offset| offset.checked_add(self.epoch_offset))
            .ok_or(Error::NoteOutOfRange(note))?;
        let instant = DateTime::from_timestamp(seconds, 0).ok_or(Error::NoteOutOfRange(note))?;
        Ok(Chunk::from_date(instant.date_naive()))
    }

    /// Note offset corresponding to a UNIX timestamp, clamped at the epoch.
    pub fn offset_at(&self, unix_seconds: i64) -> u64 {
        u64::try_from(unix_seconds.saturating_sub(self.epoch_offset)).unwrap_or(0)
    }

    pub fn resource_paths(&self, note: Note, name: &str) -> Result<ResourcePaths> {
        let mut folder = self.chunks_root();
        for segment in self.chunk(note)?.segments() {
            folder.push(segment);
        }
        folder.push(RESOURCES_DIR);
        folder.push(note.to_string());

        Ok(ResourcePaths {
            blob: folder.join(format!("blob-{name}")),
            content_type: folder.join(format!("type-{name}.txt")),
            folder,
        })
    }
}
