//! Search and index maintenance for the BBS store.
//!
//! [`SearchService`] answers searches by filtering the post index, then
//! hydrating each surviving entry from the post repository. It also owns
//! the repair path: rebuilding both indexes from the repositories and
//! reporting how far they have drifted.

pub mod drift;
pub mod error;
pub mod query;
pub mod service;

pub use drift::{IndexDrift, KeyDrift};
pub use error::{SearchError, SearchResult};
pub use query::{SearchQuery, DEFAULT_LIMIT};
pub use service::SearchService;
