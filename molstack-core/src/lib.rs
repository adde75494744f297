//! Shared primitives and traits for the molstack structure-analysis workspace.
//!
//! `molstack-core` provides the foundation the other molstack crates build on:
//!
//! - **Error types**: [`MolError`] and [`Result`] for structured error handling
//! - **Traits**: [`Annotated`] and [`Summarizable`] for named, describable data

pub mod error;
pub mod traits;

pub use error::{MolError, Result};
pub use traits::*;
