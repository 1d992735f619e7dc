//! Electric and magnetic field state of one grid

use std::sync::Arc;

use crate::domain::grid::{FieldKind, GridGeometry};
use crate::domain::material::{MaterialTable, MaterialVolume};
use crate::engine::array::FieldArray;

/// Six Yee components plus the shared material volume
#[derive(Debug, Clone)]
pub struct FieldState {
    pub e: [FieldArray; 3],
    pub h: [FieldArray; 3],
    pub materials: Arc<MaterialVolume>,
    cells: [usize; 3],
    periodic: [bool; 3],
}

impl FieldState {
    pub fn new(grid: &GridGeometry, materials: Arc<MaterialVolume>) -> Self {
        let cells = grid.cells();
        let e = || FieldArray::zeros(FieldKind::Electric, cells);
        let h = || FieldArray::zeros(FieldKind::Magnetic, cells);
        Self {
            e: [e(), e(), e()],
            h: [h(), h(), h()],
            materials,
            cells,
            periodic: grid.periodic(),
        }
    }

    pub fn cells(&self) -> [usize; 3] {
        self.cells
    }

    pub fn component(&self, kind: FieldKind, c: usize) -> &FieldArray {
        match kind {
            FieldKind::Electric => &self.e[c],
            FieldKind::Magnetic => &self.h[c],
        }
    }

    pub fn component_mut(&mut self, kind: FieldKind, c: usize) -> &mut FieldArray {
        match kind {
            FieldKind::Electric => &mut self.e[c],
            FieldKind::Magnetic => &mut self.h[c],
        }
    }

    /// Copy `H` at index `n - 1` into the low ghost of every periodic axis
    pub fn fill_periodic_ghosts_h(&mut self) {
        for a in (0..3).filter(|&a| self.periodic[a]) {
            for h in self.h.iter_mut() {
                h.fill_periodic_ghost(a);
            }
        }
    }

    /// Copy `E` at index `0` into the high ghost of every periodic axis
    pub fn fill_periodic_ghosts_e(&mut self) {
        for a in (0..3).filter(|&a| self.periodic[a]) {
            for e in self.e.iter_mut() {
                e.fill_periodic_ghost(a);
            }
        }
    }

    /// Force tangential `E` on terminated walls back to zero
    pub fn zero_walls(&mut self) {
        for a in (0..3).filter(|&a| !self.periodic[a]) {
            for (c, e) in self.e.iter_mut().enumerate() {
                if c != a {
                    e.plane_mut(a, 0).fill(0.0);
                }
                let ghost = e.ghost_plane(a);
                e.plane_mut(a, ghost).fill(0.0);
            }
        }
    }

    /// Electromagnetic energy `½ Σ (ε E² + H²) ΔV`
    pub fn energy(&self, grid: &GridGeometry, table: &MaterialTable) -> f64 {
        let mut electric = 0.0;
        for e in &self.e {
            for ((i, j, k), v) in e.interior().indexed_iter() {
                electric += table.eps[self.materials.get([i, j, k]) as usize] * v * v;
            }
        }
        let magnetic: f64 = self.h.iter().map(|h| h.norm_squared()).sum();
        0.5 * (electric + magnetic) * grid.cell_volume()
    }

    pub fn clear(&mut self) {
        for f in self.e.iter_mut().chain(self.h.iter_mut()) {
            f.clear();
        }
    }
}
