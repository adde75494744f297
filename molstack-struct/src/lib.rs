//! Molecular structure analysis: hydrogen bonds over model ensembles and a
//! line-preserving PDBx/mmCIF store.
//!
//! - **Atom containers**: single models and multi-model stacks in [`types`]
//! - **Coordinate geometry**: distances and angles, single and batched, in [`geometry`]
//! - **Hydrogen bonds**: donor-H...acceptor detection and frequencies in [`hbond`]
//! - **PDBx/mmCIF**: category-level read and write in [`pdbx`]
//! - **PDB parsing**: multi-model reader in [`pdb`]
//!
//! # Quick start
//!
//! ```
//! use molstack_struct::hbond::{hbond_stack, HBondConfig};
//! use molstack_struct::pdb::parse_pdb;
//!
//! let pdb_text = "\
//! ATOM      1  N   GLY A   1      -1.000   0.000   0.000  1.00  0.00           N
//! ATOM      2  H   GLY A   1       0.000   0.000   0.000  1.00  0.00           H
//! HETATM    3  O   HOH A   2       2.000   0.000   0.000  1.00  0.00           O
//! END
//! ";
//!
//! let stack = parse_pdb(pdb_text).unwrap();
//! let table = hbond_stack(&stack, None, None, &HBondConfig::default()).unwrap();
//! assert_eq!(table.len(), 1);
//! assert_eq!(table.frequency(), vec![1.0]);
//! ```

pub mod batch;
pub mod geometry;
pub mod hbond;
pub mod pdb;
pub mod pdbx;
pub mod types;

pub use batch::ModelBatch;
pub use geometry::{angle, distance};
pub use hbond::{
    hbond, hbond_frequency, hbond_stack, HBondConfig, HBondTable, PresenceMask, SelectionType,
    Triplet,
};
pub use pdb::{parse_pdb, parse_pdb_file};
pub use pdbx::{get_structure, set_structure, Category, PdbxFile};
pub use types::{Atom, AtomArray, AtomArrayStack, Point3D};

#[cfg(test)]
mod tests {
    use super::*;
    use molstack_core::Summarizable;

    /// Two N-H...O contacts; the second only forms in model 2.
    fn ensemble_pdb() -> String {
        let model = |ox: f64, oy: f64| {
            format!(
                "ATOM      1  N   GLY A   1      -1.000   0.000   0.000  1.00  0.00           N\n\
                 ATOM      2  H   GLY A   1       0.000   0.000   0.000  1.00  0.00           H\n\
                 HETATM    3  O   HOH A   2       2.000   0.000   0.000  1.00  0.00           O\n\
                 ATOM      4  N   GLY A   3      10.000   0.000   0.000  1.00  0.00           N\n\
                 ATOM      5  H   GLY A   3      11.000   0.000   0.000  1.00  0.00           H\n\
                 HETATM    6  O   HOH A   4    {:>8.3}{:>8.3}   0.000  1.00  0.00           O\n",
                ox, oy
            )
        };
        format!(
            "MODEL        1\n{}ENDMDL\nMODEL        2\n{}ENDMDL\nEND\n",
            model(11.0, 2.0),
            model(13.0, 0.0)
        )
    }

    #[test]
    fn integration_pdb_to_hbonds() {
        let stack = parse_pdb(&ensemble_pdb()).unwrap();
        assert!(stack.summary().contains("2 model"));

        let table = hbond_stack(&stack, None, None, &HBondConfig::default()).unwrap();
        assert_eq!(
            table.triplets,
            vec![Triplet::new(0, 1, 2), Triplet::new(3, 4, 5)]
        );
        assert_eq!(table.counts_per_model(), vec![1, 2]);
        assert_eq!(table.frequency(), vec![1.0, 0.5]);

        let first = stack.model(0).unwrap();
        assert_eq!(
            hbond(&first, None, None, &HBondConfig::default()).unwrap(),
            table.triplets_in_model(0)
        );
    }

    #[test]
    fn integration_pdbx_roundtrip_keeps_hbonds() {
        let stack = parse_pdb(&ensemble_pdb()).unwrap();
        let mut file = PdbxFile::parse("data_ENS\n#\n").unwrap();
        set_structure(&mut file, &stack, "ENS").unwrap();

        let reparsed = PdbxFile::parse(&file.to_text()).unwrap();
        let back = get_structure(&reparsed, None).unwrap();
        let config = HBondConfig::default();
        assert_eq!(
            hbond_stack(&back, None, None, &config).unwrap(),
            hbond_stack(&stack, None, None, &config).unwrap()
        );
    }
}
