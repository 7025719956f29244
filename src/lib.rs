//! Keepsake: an append-only knowledge store with time-travel reads.
//!
//! Every fact is asserted at a [`Note`](model::Note), a logical timestamp. Raw
//! per-item inputs are compiled by a dependency-ordered set of *traits* into
//! derived per-item state, and every change is archived so that the state of
//! any chunk can be reconstructed as of any past note.
//!
//! | Trait kind | Holds | Archived as |
//! |------------|-------|-------------|
//! | **Text** | Free text | Itself |
//! | **Flag** | Boolean marker | Itself |
//! | **Media** | `{note, name}` records pointing at stored resources | Itself |
//! | **Reference** | The note of another item | Canonical note string |
//! | **BackReference** | Items whose reference points here | List of note strings |
//!
//! # Architecture
//!
//! - **Storage**: one pretty-printed JSON archive per (calendar day, trait),
//!   written atomically; an absent file means an empty archive
//! - **Caching**: bounded least-recently-used caches for archives and for
//!   point-in-time snapshots, paged to disk on eviction and on save
//! - **Ordering**: notes are written strictly in order and traits run in a
//!   fixed topological order, so back-references see the same note's references
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`engine`]: Engine root: load, update, query, resources, and save
//! - [`error`]: Error type and its classification into recoverable kinds
//! - [`health`]: Storage statistics and on-disk consistency checks
//! - [`model`]: Notes, chunks, and the storage context
//! - [`store`]: Bounded cache, JSON file store, and the archive index
//! - [`traits`]: Trait variants, the dependency scheduler, and the update pipeline

pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod model;
pub mod store;
pub mod traits;

pub use engine::{Engine, EngineBuilder, QueryResult, Resource, Resources};
pub use error::{Error, ErrorKind, Result};
pub use model::{Chunk, Context, Note};
pub use traits::{Change, Inputs, TraitDefinition, TraitKind, Updates};
