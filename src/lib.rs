// src/lib.rs
//! Named directory bookmarks with a bounded cache of active directory handles.
//!
//! ```no_run
//! use dirmark::{BookmarkManager, ManagerOptionsBuilder};
//!
//! # fn main() -> dirmark::Result<()> {
//! let manager = BookmarkManager::open(ManagerOptionsBuilder::new().capacity(5).build())?;
//! manager.create_bookmark("notes", "/home/me/notes", None)?;
//! manager.save_file("notes", "todo.txt", b"buy milk")?;
//! manager.shutdown();
//! # Ok(())
//! # }
//! ```
pub mod cache;
pub mod constants;
pub mod error;
pub mod files;
pub mod manager;
pub mod options;
pub mod record;
pub mod resolver;
pub mod store;
pub mod time_source;

pub use cache::{ActiveHandleCache, CacheStats, Lease, LiveHandle};
pub use error::{BookmarkError, ResolveError, Result};
pub use manager::BookmarkManager;
pub use options::{ManagerOptions, ManagerOptionsBuilder, PathPolicy};
pub use record::{BookmarkRecord, Metadata, OpaqueReference};
pub use resolver::{Activation, DirectoryResolver, NoActivation, PathResolver, Resolution, ResolverKind};
#[cfg(unix)]
pub use resolver::RelocatableResolver;
pub use store::{JsonFileStore, MemoryStore, RecordStore};
pub use time_source::{RealTimeSource, SharedTimeSource, TestTimeSource, TimeSource};
