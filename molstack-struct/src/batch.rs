//! Borrowed view of one or more coordinate frames sharing atom annotations.

use crate::types::{Atom, AtomArray, AtomArrayStack, Point3D};

/// A model batch: `n_models` frames of `n_atoms` points each, plus the shared
/// atom annotations. A single [`AtomArray`] is a batch of one model.
#[derive(Debug, Clone)]
pub struct ModelBatch<'a> {
    atoms: &'a [Atom],
    frames: Vec<&'a [Point3D]>,
}

impl<'a> ModelBatch<'a> {
    pub fn n_models(&self) -> usize {
        self.frames.len()
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &'a [Atom] {
        self.atoms
    }

    /// Coordinates of model `m`.
    ///
    /// # Panics
    ///
    /// Panics if `m >= n_models()`.
    pub fn frame(&self, m: usize) -> &'a [Point3D] {
        self.frames[m]
    }

    /// Coordinates of `indices` in model `m`, in index order.
    ///
    /// # Panics
    ///
    /// Panics if `m` or any index is out of range.
    pub fn gather_frame(&self, m: usize, indices: &[usize]) -> Vec<Point3D> {
        let frame = self.frames[m];
        indices.iter().map(|&i| frame[i]).collect()
    }

    /// Coordinates of `indices` in every model (model-major).
    pub fn gather(&self, indices: &[usize]) -> Vec<Vec<Point3D>> {
        (0..self.n_models())
            .map(|m| self.gather_frame(m, indices))
            .collect()
    }
}

impl<'a> From<&'a AtomArray> for ModelBatch<'a> {
    fn from(array: &'a AtomArray) -> Self {
        ModelBatch {
            atoms: array.atoms(),
            frames: vec![array.coords()],
        }
    }
}

impl<'a> From<&'a AtomArrayStack> for ModelBatch<'a> {
    fn from(stack: &'a AtomArrayStack) -> Self {
        ModelBatch {
            atoms: stack.atoms(),
            frames: stack.frames().iter().map(|f| f.as_slice()).collect(),
        }
    }
}
