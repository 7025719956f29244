pub mod archive;
pub mod cache;
pub mod persistent;

pub use archive::{index_archive, Archive, ArchiveEntry, Snapshot};
pub use cache::{BoundedCache, CacheBacking, LoadOnly, DEFAULT_CAPACITY};
pub use persistent::{PersistentStore, StoreKey};
