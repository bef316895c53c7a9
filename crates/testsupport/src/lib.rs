//! Test support for the query engine workspace: the seeded HR corpus
//! (50 Jobs, 300 Employees) and assertion helpers.
//!
//! The fixture columns are arithmetic in the row index so tests can
//! derive aggregate ground truth instead of hard-coding it.

pub mod assertions;
pub mod fixtures;

/// Convenient re-exports for common testing patterns.
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::fixtures::*;
}
