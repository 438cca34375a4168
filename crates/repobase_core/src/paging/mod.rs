//! Page-oriented query support.
//!
//! # Responsibility
//! - Compute consistent 1-based page boundaries.
//! - Shape paged results for typed and dynamic consumers.

pub mod page;
pub mod page_math;
