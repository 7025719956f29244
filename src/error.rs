//! Engine error type.
//!
//! Every failure is classified by [`ErrorKind`] so that callers (the CLI, or an
//! HTTP layer) can tell caller mistakes apart from broken storage:
//!
//! | Kind | Meaning | Recovery |
//! |------|---------|----------|
//! | **Validation** | A submitted value or name has the wrong shape | Resubmit corrected input |
//! | **Ordering** | Write at or before the current note, or query of the future | Resubmit with a valid note |
//! | **Consistency** | Broken trait graph or archive ordering | Fix configuration; fatal |
//! | **Storage** | Missing or unreadable files | Surface to the operator |

use std::path::PathBuf;

use crate::model::note::{Note, NoteParseError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Ordering,
    Consistency,
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value for trait `{trait_name}`: {reason}")]
    InvalidValue { trait_name: String, reason: String },

    #[error("unknown trait `{0}`")]
    UnknownTrait(String),

    #[error("invalid resource name `{0}`: names must be non-empty and may not contain path separators")]
    InvalidResourceName(String),

    #[error(transparent)]
    InvalidNote(#[from] NoteParseError),

    #[error("note {0} is outside the representable calendar range")]
    NoteOutOfRange(Note),

    #[error("a note has already been written at {current}, so cannot write at {requested}")]
    NoteNotAfterCurrent { current: Note, requested: Note },

    #[error("cannot read at {requested}: the most recent note is {current}")]
    NoteInFuture { current: Note, requested: Note },

    #[error("could not produce a consistent trait ordering; unresolved traits: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("trait `{trait_name}` depends on unknown trait `{dependency}`")]
    UnknownDependency {
        trait_name: String,
        dependency: String,
    },

    #[error("trait `{0}` is defined more than once")]
    DuplicateTrait(String),

    #[error("invalid trait name `{0}`")]
    InvalidTraitName(String),

    #[error("archive for item {item} already holds a value at {last}, cannot append {note}")]
    ArchiveOutOfOrder { item: Note, last: Note, note: Note },

    #[error("invalid store path {segments:?}: {reason}")]
    InvalidStorePath {
        segments: Vec<String>,
        reason: &'static str,
    },

    #[error("resource `{name}` not found at note {note}")]
    ResourceNotFound { note: Note, name: String },

    #[error("corrupt file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidValue { .. }
            | Self::UnknownTrait(_)
            | Self::InvalidResourceName(_)
            | Self::InvalidNote(_)
            | Self::NoteOutOfRange(_) => ErrorKind::Validation,
            Self::NoteNotAfterCurrent { .. } | Self::NoteInFuture { .. } => ErrorKind::Ordering,
            Self::DependencyCycle(_)
            | Self::UnknownDependency { .. }
            | Self::DuplicateTrait(_)
            | Self::InvalidTraitName(_)
            | Self::ArchiveOutOfOrder { .. }
            | Self::InvalidStorePath { .. } => ErrorKind::Consistency,
            Self::ResourceNotFound { .. } | Self::Corrupt { .. } | Self::Io { .. } => {
                ErrorKind::Storage
            }
        }
    }

    pub(crate) fn invalid_value(trait_name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            trait_name: trait_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
