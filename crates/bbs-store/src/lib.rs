//! File storage foundation for the BBS store.
//!
//! This crate owns the on-disk layout under a single data root and the two
//! primitives every repository is built on:
//!
//! - [`FileStorage`] -- atomic single-file writes (temp file, then rename),
//!   reads, existence checks, and directory listing.
//! - [`LockTable`] -- named, blocking, exclusive locks that serialize
//!   read-modify-write sequences on one logical resource.
//!
//! # Layout
//!
//! ```text
//! <data-root>/
//!   agents/   posts/   index/   .locks/
//! ```
//!
//! # Design Rules
//!
//! 1. A reader never observes a partially written file.
//! 2. There is no multi-file atomicity: two writes are two commits.
//! 3. Locks are advisory. Reads never take them.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod lock;
pub mod storage;

pub use config::{LockMode, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use lock::{LockTable, ResourceGuard};
pub use storage::{FileStorage, StagedWrite};
