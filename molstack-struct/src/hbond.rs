//! Hydrogen-bond detection over single models and model stacks.
//!
//! A hydrogen bond is a donor-hydrogen...acceptor triplet where the angle
//! D-H...A is larger than `cutoff_angle` and the H...A distance is at most
//! `cutoff_dist` (Baker & Hubbard, 1984). Donor-hydrogen pairs are not read
//! from a bond list: a hydrogen belongs to a donor when both share a residue
//! and lie within `hydrogen_cutoff` of each other in the topology model.
//!
//! # Example
//!
//! ```
//! use molstack_struct::hbond::{hbond, HBondConfig, Triplet};
//! use molstack_struct::types::{Atom, AtomArray, Point3D};
//!
//! let atoms = vec![
//!     Atom::new("A", 1, "GLY", "N", "N"),
//!     Atom::new("A", 1, "GLY", "H", "H"),
//!     Atom::new("A", 2, "HOH", "O", "O"),
//! ];
//! let coords = vec![
//!     Point3D::new(-1.0, 0.0, 0.0),
//!     Point3D::new(0.0, 0.0, 0.0),
//!     Point3D::new(2.0, 0.0, 0.0),
//! ];
//! let array = AtomArray::new(atoms, coords).unwrap();
//!
//! let triplets = hbond(&array, None, None, &HBondConfig::default()).unwrap();
//! assert_eq!(triplets, vec![Triplet::new(0, 1, 2)]);
//! ```

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use molstack_core::{MolError, Result, Summarizable};

use crate::batch::ModelBatch;
use crate::geometry::{angle_batch, angle_stacked, distance_batch, distance_stacked};
use crate::types::{element_mask, AtomArray, AtomArrayStack};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Role of an atom selection in the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectionType {
    /// The selection only provides donors.
    Donor,
    /// The selection only provides acceptors.
    Acceptor,
    /// The selection provides donors and acceptors.
    #[default]
    Both,
}

impl SelectionType {
    /// The role the other selection plays.
    pub fn complement(self) -> SelectionType {
        match self {
            SelectionType::Donor => SelectionType::Acceptor,
            SelectionType::Acceptor => SelectionType::Donor,
            SelectionType::Both => SelectionType::Both,
        }
    }

    fn provides_donors(self) -> bool {
        matches!(self, SelectionType::Donor | SelectionType::Both)
    }

    fn provides_acceptors(self) -> bool {
        matches!(self, SelectionType::Acceptor | SelectionType::Both)
    }
}

impl FromStr for SelectionType {
    type Err = MolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "donor" => Ok(SelectionType::Donor),
            "acceptor" => Ok(SelectionType::Acceptor),
            "both" => Ok(SelectionType::Both),
            other => Err(MolError::InvalidInput(format!(
                "unknown selection type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for SelectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionType::Donor => write!(f, "donor"),
            SelectionType::Acceptor => write!(f, "acceptor"),
            SelectionType::Both => write!(f, "both"),
        }
    }
}

/// Configuration for the hydrogen-bond search.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HBondConfig {
    /// Role of `selection1`; `selection2` takes the complement (default: both).
    pub selection1_type: SelectionType,
    /// Maximum H...acceptor distance, inclusive (default: 2.5 Å).
    pub cutoff_dist: f64,
    /// D-H...A angle in degrees that must be exceeded (default: 120).
    pub cutoff_angle: f64,
    /// Elements that may donate (default: O, N, S).
    pub donor_elements: Vec<String>,
    /// Elements that may accept (default: O, N, S).
    pub acceptor_elements: Vec<String>,
    /// Evaluate all models in one batch instead of frame by frame (default: true).
    pub vectorized: bool,
    /// Maximum donor-hydrogen distance for association, inclusive (default: 1.5 Å).
    pub hydrogen_cutoff: f64,
    /// Model whose coordinates define donor-hydrogen association (default: 0).
    ///
    /// Covalent topology is assumed identical in every model.
    pub topology_model: usize,
}

impl Default for HBondConfig {
    fn default() -> Self {
        let heavy = vec!["O".to_string(), "N".to_string(), "S".to_string()];
        Self {
            selection1_type: SelectionType::Both,
            cutoff_dist: 2.5,
            cutoff_angle: 120.0,
            donor_elements: heavy.clone(),
            acceptor_elements: heavy,
            vectorized: true,
            hydrogen_cutoff: 1.5,
            topology_model: 0,
        }
    }
}

impl HBondConfig {
    fn validate(&self, n_models: usize) -> Result<()> {
        for (name, value) in [
            ("cutoff_dist", self.cutoff_dist),
            ("cutoff_angle", self.cutoff_angle),
            ("hydrogen_cutoff", self.hydrogen_cutoff),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MolError::InvalidInput(format!(
                    "{} must be a non-negative finite number, got {}",
                    name, value
                )));
            }
        }
        if self.topology_model >= n_models {
            return Err(MolError::InvalidInput(format!(
                "topology model {} out of range for {} model(s)",
                self.topology_model, n_models
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Atom indices of one donor-hydrogen...acceptor interaction.
///
/// Ordering is lexicographic over (donor, hydrogen, acceptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Triplet {
    pub donor: usize,
    pub hydrogen: usize,
    pub acceptor: usize,
}

impl Triplet {
    pub fn new(donor: usize, hydrogen: usize, acceptor: usize) -> Self {
        Self {
            donor,
            hydrogen,
            acceptor,
        }
    }

    /// `[donor, hydrogen, acceptor]`.
    pub fn as_array(&self) -> [usize; 3] {
        [self.donor, self.hydrogen, self.acceptor]
    }
}

/// Model × triplet boolean matrix, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PresenceMask {
    n_models: usize,
    n_triplets: usize,
    data: Vec<bool>,
}

impl PresenceMask {
    /// Build a mask from row-major data.
    pub fn new(n_models: usize, n_triplets: usize, data: Vec<bool>) -> Result<Self> {
        if data.len() != n_models * n_triplets {
            return Err(MolError::InvalidInput(format!(
                "presence mask data has {} entries, expected {} x {}",
                data.len(),
                n_models,
                n_triplets
            )));
        }
        Ok(Self {
            n_models,
            n_triplets,
            data,
        })
    }

    /// An `n_models × 0` mask.
    pub fn empty(n_models: usize) -> Self {
        Self {
            n_models,
            n_triplets: 0,
            data: Vec::new(),
        }
    }

    pub fn n_models(&self) -> usize {
        self.n_models
    }

    pub fn n_triplets(&self) -> usize {
        self.n_triplets
    }

    /// Whether triplet `t` is present in model `m`.
    pub fn get(&self, m: usize, t: usize) -> bool {
        self.data[m * self.n_triplets + t]
    }

    /// Presence of every triplet in model `m`.
    pub fn row(&self, m: usize) -> &[bool] {
        &self.data[m * self.n_triplets..(m + 1) * self.n_triplets]
    }

    /// Presence of triplet `t` in every model.
    pub fn column(&self, t: usize) -> Vec<bool> {
        (0..self.n_models).map(|m| self.get(m, t)).collect()
    }

    /// Number of models in which triplet `t` is present.
    pub fn column_count(&self, t: usize) -> usize {
        (0..self.n_models).filter(|&m| self.get(m, t)).count()
    }

    /// Number of present triplets per model.
    pub fn counts_per_model(&self) -> Vec<usize> {
        (0..self.n_models)
            .map(|m| self.row(m).iter().filter(|&&b| b).count())
            .collect()
    }

    fn select_columns(&self, columns: &[usize]) -> PresenceMask {
        let mut data = Vec::with_capacity(self.n_models * columns.len());
        for m in 0..self.n_models {
            let row = self.row(m);
            data.extend(columns.iter().map(|&t| row[t]));
        }
        PresenceMask {
            n_models: self.n_models,
            n_triplets: columns.len(),
            data,
        }
    }

    fn hstack(&self, other: &PresenceMask) -> PresenceMask {
        debug_assert_eq!(self.n_models, other.n_models);
        let mut data = Vec::with_capacity(self.data.len() + other.data.len());
        for m in 0..self.n_models {
            data.extend_from_slice(self.row(m));
            data.extend_from_slice(other.row(m));
        }
        PresenceMask {
            n_models: self.n_models,
            n_triplets: self.n_triplets + other.n_triplets,
            data,
        }
    }
}

/// Hydrogen bonds of a model stack.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HBondTable {
    /// Unique triplets, sorted.
    pub triplets: Vec<Triplet>,
    /// `mask.get(m, t)` is true if `triplets[t]` is a bond in model `m`.
    pub mask: PresenceMask,
}

impl HBondTable {
    /// Number of distinct triplets.
    pub fn len(&self) -> usize {
        self.triplets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triplets.is_empty()
    }

    /// Triplets present in model `m`.
    pub fn triplets_in_model(&self, m: usize) -> Vec<Triplet> {
        self.triplets
            .iter()
            .zip(self.mask.row(m))
            .filter(|(_, &present)| present)
            .map(|(t, _)| *t)
            .collect()
    }

    /// Number of hydrogen bonds in each model.
    pub fn counts_per_model(&self) -> Vec<usize> {
        self.mask.counts_per_model()
    }

    /// Fraction of models each triplet is present in.
    pub fn frequency(&self) -> Vec<f64> {
        hbond_frequency(&self.mask)
    }
}

impl Summarizable for HBondTable {
    fn summary(&self) -> String {
        format!(
            "HBondTable: {} triplet(s) over {} model(s)",
            self.len(),
            self.mask.n_models()
        )
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find hydrogen bonds in a single model.
///
/// `selection1` and `selection2` restrict the search to atom subsets (`None`
/// selects every atom). `selection1` plays the role given by
/// `config.selection1_type` and `selection2` the complementary role.
///
/// # Errors
///
/// Returns an error if a selection length differs from the atom count or the
/// configuration is invalid.
pub fn hbond(
    array: &AtomArray,
    selection1: Option<&[bool]>,
    selection2: Option<&[bool]>,
    config: &HBondConfig,
) -> Result<Vec<Triplet>> {
    let table = find_hbonds(&ModelBatch::from(array), selection1, selection2, config)?;
    Ok(table.triplets)
}

/// Find hydrogen bonds in every model of a stack.
///
/// Returns every triplet that is a hydrogen bond in at least one model,
/// together with the per-model presence mask. See [`hbond`] for the meaning
/// of the selections.
pub fn hbond_stack(
    stack: &AtomArrayStack,
    selection1: Option<&[bool]>,
    selection2: Option<&[bool]>,
    config: &HBondConfig,
) -> Result<HBondTable> {
    find_hbonds(&ModelBatch::from(stack), selection1, selection2, config)
}

/// For each triplet, the fraction of models in which it is present.
pub fn hbond_frequency(mask: &PresenceMask) -> Vec<f64> {
    if mask.n_models() == 0 {
        return vec![0.0; mask.n_triplets()];
    }
    let n_models = mask.n_models() as f64;
    (0..mask.n_triplets())
        .map(|t| mask.column_count(t) as f64 / n_models)
        .collect()
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

fn find_hbonds(
    batch: &ModelBatch<'_>,
    selection1: Option<&[bool]>,
    selection2: Option<&[bool]>,
    config: &HBondConfig,
) -> Result<HBondTable> {
    config.validate(batch.n_models())?;
    let n_atoms = batch.n_atoms();

    let type1 = config.selection1_type;
    let type2 = type1.complement();
    let (donor1, acceptor1) = role_masks(selection1, type1, n_atoms)?;
    let (donor2, acceptor2) = role_masks(selection2, type2, n_atoms)?;

    let (mut triplets, mut mask) = search(batch, &donor1, &acceptor2, config)?;

    // Identical selections would only find the same triplets again
    if donor1 != donor2 || acceptor1 != acceptor2 {
        let (triplets2, mask2) = search(batch, &donor2, &acceptor1, config)?;
        triplets.extend(triplets2);
        mask = mask.hstack(&mask2);
    }

    let table = deduplicate(triplets, mask)?;
    log::debug!(
        "found {} hydrogen bond triplet(s) across {} model(s)",
        table.len(),
        batch.n_models()
    );
    Ok(table)
}

/// Donor and acceptor masks of one selection with the given role.
fn role_masks(
    selection: Option<&[bool]>,
    role: SelectionType,
    n_atoms: usize,
) -> Result<(Vec<bool>, Vec<bool>)> {
    let base = match selection {
        Some(mask) if mask.len() != n_atoms => {
            return Err(MolError::InvalidInput(format!(
                "selection has length {}, expected {}",
                mask.len(),
                n_atoms
            )));
        }
        Some(mask) => mask.to_vec(),
        None => vec![true; n_atoms],
    };
    let donors = if role.provides_donors() {
        base.clone()
    } else {
        vec![false; n_atoms]
    };
    let acceptors = if role.provides_acceptors() {
        base
    } else {
        vec![false; n_atoms]
    };
    Ok((donors, acceptors))
}

/// One-directional search from `donor_selection` to `acceptor_selection`.
fn search(
    batch: &ModelBatch<'_>,
    donor_selection: &[bool],
    acceptor_selection: &[bool],
    config: &HBondConfig,
) -> Result<(Vec<Triplet>, PresenceMask)> {
    let atoms = batch.atoms();
    let donor_elements = element_mask(atoms, &config.donor_elements);
    let acceptor_elements = element_mask(atoms, &config.acceptor_elements);

    let donors: Vec<usize> = (0..atoms.len())
        .filter(|&i| donor_selection[i] && donor_elements[i])
        .collect();
    let acceptors: Vec<usize> = (0..atoms.len())
        .filter(|&i| acceptor_selection[i] && acceptor_elements[i])
        .collect();

    let donor_hydrogens = bonded_hydrogens(batch, &donors, config);
    let candidates = candidate_triplets(&donor_hydrogens, &acceptors);
    log::debug!(
        "hbond search: {} donor(s), {} with hydrogens, {} acceptor(s), {} candidate(s)",
        donors.len(),
        donor_hydrogens.len(),
        acceptors.len(),
        candidates.len()
    );

    if candidates.is_empty() {
        return Ok((Vec::new(), PresenceMask::empty(batch.n_models())));
    }

    let mask = if config.vectorized {
        evaluate_vectorized(batch, &candidates, config)?
    } else {
        evaluate_per_frame(batch, &candidates, config)?
    };

    // Keep only triplets that are a bond in at least one model
    let counted: Vec<usize> = (0..candidates.len())
        .filter(|&t| (0..mask.n_models()).any(|m| mask.get(m, t)))
        .collect();
    let triplets = counted.iter().map(|&t| candidates[t]).collect();
    Ok((triplets, mask.select_columns(&counted)))
}

/// Hydrogens associated with each donor, in the topology model.
///
/// Donors without hydrogens are dropped.
fn bonded_hydrogens(
    batch: &ModelBatch<'_>,
    donors: &[usize],
    config: &HBondConfig,
) -> Vec<(usize, Vec<usize>)> {
    let atoms = batch.atoms();
    let reference = batch.frame(config.topology_model);

    let mut by_residue: BTreeMap<(&str, i32), Vec<usize>> = BTreeMap::new();
    for (i, atom) in atoms.iter().enumerate() {
        if atom.is_hydrogen() {
            by_residue.entry(atom.residue_key()).or_default().push(i);
        }
    }

    let mut result = Vec::with_capacity(donors.len());
    for &d in donors {
        let hydrogens: Vec<usize> = by_residue
            .get(&atoms[d].residue_key())
            .map(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .filter(|&h| reference[d].distance_to(&reference[h]) <= config.hydrogen_cutoff)
                    .collect()
            })
            .unwrap_or_default();
        if !hydrogens.is_empty() {
            result.push((d, hydrogens));
        }
    }
    result
}

/// Every donor × hydrogen × acceptor combination except self-pairs.
fn candidate_triplets(donor_hydrogens: &[(usize, Vec<usize>)], acceptors: &[usize]) -> Vec<Triplet> {
    let mut triplets = Vec::new();
    for (donor, hydrogens) in donor_hydrogens {
        for &hydrogen in hydrogens {
            triplets.extend(
                acceptors
                    .iter()
                    .filter(|&&a| a != *donor)
                    .map(|&a| Triplet::new(*donor, hydrogen, a)),
            );
        }
    }
    triplets
}

fn is_hbond(theta: f64, dist: f64, cutoff_angle_rad: f64, cutoff_dist: f64) -> bool {
    theta > cutoff_angle_rad && dist <= cutoff_dist
}

fn split_indices(triplets: &[Triplet]) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
    let donors = triplets.iter().map(|t| t.donor).collect();
    let hydrogens = triplets.iter().map(|t| t.hydrogen).collect();
    let acceptors = triplets.iter().map(|t| t.acceptor).collect();
    (donors, hydrogens, acceptors)
}

/// Evaluate every triplet in every model in one batch.
fn evaluate_vectorized(
    batch: &ModelBatch<'_>,
    triplets: &[Triplet],
    config: &HBondConfig,
) -> Result<PresenceMask> {
    let (d_idx, h_idx, a_idx) = split_indices(triplets);
    let donors = batch.gather(&d_idx);
    let hydrogens = batch.gather(&h_idx);
    let acceptors = batch.gather(&a_idx);

    let theta = angle_stacked(&donors, &hydrogens, &acceptors)?;
    let dist = distance_stacked(&hydrogens, &acceptors)?;

    let cutoff_angle_rad = config.cutoff_angle.to_radians();
    let cutoff_dist = config.cutoff_dist;
    let data = theta
        .iter()
        .zip(&dist)
        .flat_map(|(theta_row, dist_row)| {
            theta_row
                .iter()
                .zip(dist_row)
                .map(move |(&t, &d)| is_hbond(t, d, cutoff_angle_rad, cutoff_dist))
        })
        .collect();
    PresenceMask::new(batch.n_models(), triplets.len(), data)
}

/// Evaluate one model at a time, keeping only one frame of gathered points.
fn evaluate_per_frame(
    batch: &ModelBatch<'_>,
    triplets: &[Triplet],
    config: &HBondConfig,
) -> Result<PresenceMask> {
    let (d_idx, h_idx, a_idx) = split_indices(triplets);
    let cutoff_angle_rad = config.cutoff_angle.to_radians();

    let evaluate_frame = |m: usize| -> Result<Vec<bool>> {
        let donors = batch.gather_frame(m, &d_idx);
        let hydrogens = batch.gather_frame(m, &h_idx);
        let acceptors = batch.gather_frame(m, &a_idx);
        let theta = angle_batch(&donors, &hydrogens, &acceptors)?;
        let dist = distance_batch(&hydrogens, &acceptors)?;
        Ok(theta
            .iter()
            .zip(&dist)
            .map(|(&t, &d)| is_hbond(t, d, cutoff_angle_rad, config.cutoff_dist))
            .collect())
    };

    #[cfg(feature = "parallel")]
    let rows: Vec<Vec<bool>> = {
        use rayon::prelude::*;
        (0..batch.n_models())
            .into_par_iter()
            .map(evaluate_frame)
            .collect::<Result<_>>()?
    };

    #[cfg(not(feature = "parallel"))]
    let rows: Vec<Vec<bool>> = (0..batch.n_models())
        .map(evaluate_frame)
        .collect::<Result<_>>()?;

    PresenceMask::new(batch.n_models(), triplets.len(), rows.concat())
}

/// Sort triplets, collapse duplicates and keep the first mask column of each.
///
/// Both search directions evaluate identical geometry, so duplicates must
/// agree on every model.
fn deduplicate(triplets: Vec<Triplet>, mask: PresenceMask) -> Result<HBondTable> {
    let mut order: Vec<usize> = (0..triplets.len()).collect();
    order.sort_by_key(|&i| triplets[i]);

    let mut kept: Vec<usize> = Vec::with_capacity(order.len());
    for i in order {
        if let Some(&last) = kept.last() {
            if triplets[last] == triplets[i] {
                if mask.column(last) != mask.column(i) {
                    return Err(MolError::Invariant(format!(
                        "triplet {:?} has conflicting presence in the two search directions",
                        triplets[i].as_array()
                    )));
                }
                continue;
            }
        }
        kept.push(i);
    }

    Ok(HBondTable {
        triplets: kept.iter().map(|&i| triplets[i]).collect(),
        mask: mask.select_columns(&kept),
    })
}
