//! Repository layer: generic contract, engine and unit-of-work handle.
//!
//! # Responsibility
//! - Expose one reusable data-access surface for any [`crate::Entity`].
//! - Own the lazily started transaction of each repository instance.
//!
//! # Invariants
//! - Tracked mutations leave the change tracker empty on success.
//! - A repository dropped with an active transaction rolls it back.

pub mod repository;
pub mod repository_base;
pub mod transaction;

pub use repository::{RepoError, RepoResult, Repository};
pub use repository_base::{RepositoryBase, SqliteRepository};
pub use transaction::{TransactionHandle, TransactionState};
