//! Query and record model shared by repositories and persistence contexts.
//!
//! # Responsibility
//! - Describe entities through a small capability trait.
//! - Represent filters, orderings and raw SQL as plain data.
//!
//! # Invariants
//! - Values are always carried separately from SQL text and bound later.
//! - Nothing here talks to a database; translation belongs to contexts.

pub mod entity;
pub mod predicate;
pub mod raw;
pub mod row;
