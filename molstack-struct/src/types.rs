//! Core types for atom-level structure representation.
//!
//! Atoms are stored as flat arrays: per-atom annotations ([`Atom`]) in one
//! vector and coordinates in a parallel one. An [`AtomArrayStack`] shares one
//! annotation vector across several coordinate frames (NMR models,
//! trajectory frames), so the atom at index `i` is the same atom in every
//! model.

use molstack_core::{MolError, Result, Summarizable};

/// A point in 3D Cartesian space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    /// Create a new point.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The origin.
    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point3D) -> f64 {
        self.sub(other).norm()
    }

    /// Dot product.
    pub fn dot(&self, other: &Point3D) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Vector magnitude.
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Vector subtraction.
    pub fn sub(&self, other: &Point3D) -> Point3D {
        Point3D {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

/// Per-atom annotation, independent of coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Atom {
    /// Chain identifier (e.g. "A").
    pub chain_id: String,
    /// Residue sequence number.
    pub res_id: i32,
    /// Residue name (e.g. "ALA", "HOH").
    pub res_name: String,
    /// Atom name (e.g. "CA", "N", "H1").
    pub name: String,
    /// Upper-case element symbol (e.g. "N", "O", "H").
    pub element: String,
    /// Whether this atom came from a HETATM record.
    pub hetero: bool,
}

impl Atom {
    /// Create a non-hetero atom. The element symbol is upper-cased.
    pub fn new(
        chain_id: impl Into<String>,
        res_id: i32,
        res_name: impl Into<String>,
        name: impl Into<String>,
        element: &str,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            res_id,
            res_name: res_name.into(),
            name: name.into(),
            element: element.trim().to_uppercase(),
            hetero: false,
        }
    }

    /// Whether this atom is a hydrogen.
    pub fn is_hydrogen(&self) -> bool {
        self.element == "H"
    }

    /// Residue identity: chain id and residue id.
    pub fn residue_key(&self) -> (&str, i32) {
        (self.chain_id.as_str(), self.res_id)
    }
}

/// Boolean mask marking atoms whose element is one of `elements`
/// (case-insensitive).
pub fn element_mask<S: AsRef<str>>(atoms: &[Atom], elements: &[S]) -> Vec<bool> {
    atoms
        .iter()
        .map(|a| {
            elements
                .iter()
                .any(|e| e.as_ref().trim().eq_ignore_ascii_case(&a.element))
        })
        .collect()
}

fn check_mask_len(mask: &[bool], expected: usize, axis: &str) -> Result<()> {
    if mask.len() != expected {
        return Err(MolError::InvalidInput(format!(
            "{} mask has length {}, expected {}",
            axis,
            mask.len(),
            expected
        )));
    }
    Ok(())
}

fn apply_mask<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(mask)
        .filter(|(_, &keep)| keep)
        .map(|(v, _)| v.clone())
        .collect()
}

/// A single model: atom annotations with one coordinate per atom.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomArray {
    atoms: Vec<Atom>,
    coords: Vec<Point3D>,
}

impl AtomArray {
    /// Create an array from parallel annotation and coordinate vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the two vectors differ in length.
    pub fn new(atoms: Vec<Atom>, coords: Vec<Point3D>) -> Result<Self> {
        if atoms.len() != coords.len() {
            return Err(MolError::InvalidInput(format!(
                "{} atoms but {} coordinates",
                atoms.len(),
                coords.len()
            )));
        }
        Ok(Self { atoms, coords })
    }

    /// Number of atoms.
    pub fn array_length(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn coords(&self) -> &[Point3D] {
        &self.coords
    }

    /// Keep only atoms where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Result<AtomArray> {
        check_mask_len(mask, self.array_length(), "atom")?;
        Ok(AtomArray {
            atoms: apply_mask(&self.atoms, mask),
            coords: apply_mask(&self.coords, mask),
        })
    }

    /// Boolean mask of atoms whose element is in `elements`.
    pub fn element_mask<S: AsRef<str>>(&self, elements: &[S]) -> Vec<bool> {
        element_mask(&self.atoms, elements)
    }
}

impl Summarizable for AtomArray {
    fn summary(&self) -> String {
        format!("AtomArray: {} atom(s)", self.array_length())
    }
}

/// Several models sharing one set of atom annotations.
///
/// Invariant: at least one model, and every frame holds exactly one
/// coordinate per annotated atom.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomArrayStack {
    atoms: Vec<Atom>,
    frames: Vec<Vec<Point3D>>,
}

impl AtomArrayStack {
    /// Create a stack from shared annotations and per-model frames.
    ///
    /// # Errors
    ///
    /// Returns an error if `frames` is empty or any frame length differs from
    /// the atom count.
    pub fn new(atoms: Vec<Atom>, frames: Vec<Vec<Point3D>>) -> Result<Self> {
        if frames.is_empty() {
            return Err(MolError::InvalidInput(
                "an atom stack needs at least one model".into(),
            ));
        }
        if let Some((m, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.len() != atoms.len())
        {
            return Err(MolError::InvalidInput(format!(
                "model {} has {} coordinates, expected {}",
                m,
                frame.len(),
                atoms.len()
            )));
        }
        Ok(Self { atoms, frames })
    }

    /// Stack single models; all of them must carry identical annotations.
    pub fn from_models(models: Vec<AtomArray>) -> Result<Self> {
        let mut iter = models.into_iter();
        let first = iter.next().ok_or_else(|| {
            MolError::InvalidInput("an atom stack needs at least one model".into())
        })?;
        let atoms = first.atoms;
        let mut frames = vec![first.coords];
        for (m, model) in iter.enumerate() {
            if model.atoms != atoms {
                return Err(MolError::InvalidInput(format!(
                    "model {} has different atom annotations than model 0",
                    m + 1
                )));
            }
            frames.push(model.coords);
        }
        Ok(Self { atoms, frames })
    }

    /// Number of atoms per model.
    pub fn array_length(&self) -> usize {
        self.atoms.len()
    }

    /// Number of models.
    pub fn stack_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Coordinates of every model, in model order.
    pub fn frames(&self) -> &[Vec<Point3D>] {
        &self.frames
    }

    /// Copy out model `m` as a standalone array.
    pub fn model(&self, m: usize) -> Option<AtomArray> {
        self.frames.get(m).map(|coords| AtomArray {
            atoms: self.atoms.clone(),
            coords: coords.clone(),
        })
    }

    /// Iterate over all models as standalone arrays.
    pub fn models(&self) -> impl Iterator<Item = AtomArray> + '_ {
        (0..self.stack_depth()).filter_map(move |m| self.model(m))
    }

    /// Keep only atoms where `mask` is true, in every model.
    pub fn filter(&self, mask: &[bool]) -> Result<AtomArrayStack> {
        check_mask_len(mask, self.array_length(), "atom")?;
        Ok(AtomArrayStack {
            atoms: apply_mask(&self.atoms, mask),
            frames: self.frames.iter().map(|f| apply_mask(f, mask)).collect(),
        })
    }

    /// Keep only models where `mask` is true.
    pub fn select_models(&self, mask: &[bool]) -> Result<AtomArrayStack> {
        check_mask_len(mask, self.stack_depth(), "model")?;
        AtomArrayStack::new(self.atoms.clone(), apply_mask(&self.frames, mask))
    }

    /// Boolean mask of atoms whose element is in `elements`.
    pub fn element_mask<S: AsRef<str>>(&self, elements: &[S]) -> Vec<bool> {
        element_mask(&self.atoms, elements)
    }
}

impl From<AtomArray> for AtomArrayStack {
    fn from(array: AtomArray) -> Self {
        AtomArrayStack {
            atoms: array.atoms,
            frames: vec![array.coords],
        }
    }
}

impl Summarizable for AtomArrayStack {
    fn summary(&self) -> String {
        format!(
            "AtomArrayStack: {} model(s) x {} atom(s)",
            self.stack_depth(),
            self.array_length()
        )
    }
}
