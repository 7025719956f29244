//! Ordering primitives and the storage context.
//!
//! [`Note`](note::Note) totally orders every assertion in the log;
//! [`Chunk`](chunk::Chunk) partitions storage by calendar day;
//! [`Context`](context::Context) ties the two together through the engine epoch.

pub mod chunk;
pub mod context;
pub mod note;

pub use chunk::Chunk;
pub use context::Context;
pub use note::{Note, NoteParseError};
