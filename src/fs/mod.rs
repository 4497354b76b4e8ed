//! FileSystem abstraction for testable file operations
//!
//! Every detector and fact extractor reads the repository through [`FileSystem`],
//! so tests can run against an in-memory [`MockFileSystem`].

mod mock;
mod real;
mod r#trait;

pub use mock::MockFileSystem;
pub use r#trait::{DirEntry, EntryKind, FileSystem, EXCLUDED_DIRS};
pub use real::RealFileSystem;
