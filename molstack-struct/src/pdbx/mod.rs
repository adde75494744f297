//! PDBx/mmCIF text store.
//!
//! [`PdbxFile`] reads a document into lines plus a [`CategoryIndex`],
//! materializes categories on demand and writes them back in place.
//! [`get_structure`] and [`set_structure`] map the `atom_site` category to
//! and from an [`AtomArrayStack`](crate::types::AtomArrayStack).

pub mod convert;
pub mod file;
pub mod index;
pub mod tokenize;

pub use convert::{get_structure, set_structure};
pub use file::{Category, PdbxFile};
pub use index::{BlockInfo, CategoryIndex, CategoryInfo};
pub use indexmap::IndexMap;
