//! Field storage for one Yee component
//!
//! Each component is stored with one ghost plane per axis. Electric
//! components keep the ghost on the high side (index `n`), magnetic
//! components keep it on the low side (index `-1`). On periodic axes the
//! ghost holds a copy of the opposite edge; on terminated axes it stays at
//! zero and acts as the conducting wall.

use ndarray::{s, Array3, ArrayView2, ArrayView3, ArrayViewMut2, ArrayViewMut3, Axis as NdAxis};
use num_complex::Complex;

use crate::domain::grid::FieldKind;

/// Type alias for Complex64
pub type Complex64 = Complex<f64>;

/// One real field component on the Yee lattice
#[derive(Debug, Clone, PartialEq)]
pub struct FieldArray {
    /// Padded storage, `n + 1` entries per axis
    pub data: Array3<f64>,
    kind: FieldKind,
    cells: [usize; 3],
}

impl FieldArray {
    /// Create a zeroed component for a grid of `cells`
    pub fn zeros(kind: FieldKind, cells: [usize; 3]) -> Self {
        Self {
            data: Array3::zeros((cells[0] + 1, cells[1] + 1, cells[2] + 1)),
            kind,
            cells,
        }
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn cells(&self) -> [usize; 3] {
        self.cells
    }

    /// Storage index of interior node `idx`
    #[inline]
    pub fn store(&self, idx: [usize; 3]) -> [usize; 3] {
        match self.kind {
            FieldKind::Electric => idx,
            FieldKind::Magnetic => [idx[0] + 1, idx[1] + 1, idx[2] + 1],
        }
    }

    #[inline]
    pub fn get(&self, idx: [usize; 3]) -> f64 {
        self.data[self.store(idx)]
    }

    #[inline]
    pub fn get_mut(&mut self, idx: [usize; 3]) -> &mut f64 {
        let at = self.store(idx);
        &mut self.data[at]
    }

    /// View of the interior nodes, ghosts excluded
    pub fn interior(&self) -> ArrayView3<'_, f64> {
        let [nx, ny, nz] = self.cells;
        match self.kind {
            FieldKind::Electric => self.data.slice(s![..nx, ..ny, ..nz]),
            FieldKind::Magnetic => self.data.slice(s![1.., 1.., 1..]),
        }
    }

    pub fn interior_mut(&mut self) -> ArrayViewMut3<'_, f64> {
        let [nx, ny, nz] = self.cells;
        match self.kind {
            FieldKind::Electric => self.data.slice_mut(s![..nx, ..ny, ..nz]),
            FieldKind::Magnetic => self.data.slice_mut(s![1.., 1.., 1..]),
        }
    }

    /// Storage plane index of the ghost along `axis`
    pub fn ghost_plane(&self, axis: usize) -> usize {
        match self.kind {
            FieldKind::Electric => self.cells[axis],
            FieldKind::Magnetic => 0,
        }
    }

    /// Storage plane index of the interior edge that feeds the ghost on a
    /// periodic axis
    pub fn source_plane(&self, axis: usize) -> usize {
        match self.kind {
            FieldKind::Electric => 0,
            FieldKind::Magnetic => self.cells[axis],
        }
    }

    pub fn plane(&self, axis: usize, index: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(NdAxis(axis), index)
    }

    pub fn plane_mut(&mut self, axis: usize, index: usize) -> ArrayViewMut2<'_, f64> {
        self.data.index_axis_mut(NdAxis(axis), index)
    }

    /// Copy the opposite edge into the ghost plane along `axis`
    pub fn fill_periodic_ghost(&mut self, axis: usize) {
        let source = self.plane(axis, self.source_plane(axis)).to_owned();
        let ghost = self.ghost_plane(axis);
        self.plane_mut(axis, ghost).assign(&source);
    }

    /// Reset every value, ghosts included
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Sum of squares over the interior
    pub fn norm_squared(&self) -> f64 {
        self.interior().iter().map(|v| v * v).sum()
    }

    /// Interior inner product with another component of the same shape
    pub fn dot(&self, other: &Self) -> f64 {
        self.interior()
            .iter()
            .zip(other.interior().iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Largest absolute interior value
    pub fn max_abs(&self) -> f64 {
        self.interior().iter().fold(0.0, |m, v| m.max(v.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_storage_offsets() {
        let mut e = FieldArray::zeros(FieldKind::Electric, [3, 2, 2]);
        let mut h = FieldArray::zeros(FieldKind::Magnetic, [3, 2, 2]);
        *e.get_mut([2, 1, 1]) = 1.5;
        *h.get_mut([0, 0, 0]) = 2.5;

        assert_eq!(e.data[[2, 1, 1]], 1.5);
        assert_eq!(h.data[[1, 1, 1]], 2.5);
        assert_eq!(e.interior().shape(), &[3, 2, 2]);
        assert_eq!(h.interior().shape(), &[3, 2, 2]);
    }

    #[test]
    fn test_periodic_ghost_copy() {
        let mut e = FieldArray::zeros(FieldKind::Electric, [3, 1, 1]);
        let mut h = FieldArray::zeros(FieldKind::Magnetic, [3, 1, 1]);
        *e.get_mut([0, 0, 0]) = 4.0;
        *h.get_mut([2, 0, 0]) = -3.0;

        e.fill_periodic_ghost(0);
        h.fill_periodic_ghost(0);

        assert_eq!(e.data[[3, 0, 0]], 4.0);
        assert_eq!(h.data[[0, 1, 1]], -3.0);
    }

    #[test]
    fn test_norms() {
        let mut a = FieldArray::zeros(FieldKind::Electric, [2, 2, 2]);
        a.interior_mut().fill(2.0);
        // ghosts are not part of the norm
        a.data[[2, 2, 2]] = 100.0;
        assert_abs_diff_eq!(a.norm_squared(), 32.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.dot(&a), 32.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.max_abs(), 2.0, epsilon = 1e-12);
    }
}
