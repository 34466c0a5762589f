//! Storage module for document persistence
//!
//! Provides the `ObjectStore` abstraction with its SQLite implementation,
//! the primary/fallback resolver and the download materialization sink.

mod blob_sink;
mod error;
mod object_store;
mod record;
mod sqlite_store;
mod tiered;

pub use blob_sink::{BlobSink, MaterializedDownload, TempDirBlobSink};
pub use error::{StoreError, StoreResult, ValidationError};
pub use object_store::{ObjectStore, StoreState};
pub use record::{FileMetadata, FileRecord, MetadataPatch};
pub use sqlite_store::SqliteObjectStore;
pub use tiered::{Backend, TieredStore};
