//! Convolutional PML (Roden & Gedney, CFS-PML)
//!
//! The absorber adds correction terms after the ordinary field updates. For
//! each absorbed face and each tangential component a memory variable is
//! kept over the slab:
//!
//!   ψ ← b·ψ + c·∂F
//!
//! with `b = exp(−(σ/κ + α)·dt)` and `c = σ/(σκ + κ²α)·(b − 1)`. The `1/κ`
//! part of the stretched derivative is folded into the grid's inverse
//! spacing tables, so only the ψ terms are applied here.

use ndarray::Array3;
use serde::Deserialize;
use tracing::debug;

use crate::domain::fields::FieldState;
use crate::domain::grid::{Axis, Face, GridGeometry, Side};
use crate::domain::material::MaterialTable;
use crate::error::{FdtdError, Result};

/// Grading parameters shared by every absorbing face
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CpmlProfile {
    /// Polynomial grading order `m` of σ and κ
    pub order: f64,
    /// Peak conductivity; derived from `reflection` or the optimum when unset
    pub sigma_max: Option<f64>,
    /// Target normal-incidence reflection used to derive σ_max
    pub reflection: Option<f64>,
    pub kappa_max: f64,
    pub alpha_max: f64,
    pub alpha_order: f64,
}

impl Default for CpmlProfile {
    fn default() -> Self {
        Self {
            order: 3.0,
            sigma_max: None,
            reflection: None,
            kappa_max: 1.0,
            alpha_max: 0.0,
            alpha_order: 1.0,
        }
    }
}

/// Graded values at one depth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grading {
    pub b: f64,
    pub c: f64,
    pub kappa: f64,
}

impl CpmlProfile {
    /// Peak conductivity for a slab of `thickness` cells of size `spacing`
    pub fn sigma_max(&self, thickness: usize, spacing: f64) -> f64 {
        if let Some(sigma) = self.sigma_max {
            return sigma;
        }
        match self.reflection {
            Some(r) if r > 0.0 && r < 1.0 => {
                -(self.order + 1.0) * r.ln() / (2.0 * thickness as f64 * spacing)
            }
            _ => 0.8 * (self.order + 1.0) / spacing,
        }
    }

    /// Coefficients at normalized depth `d` (0 at the interface, 1 at the wall)
    pub fn grade(&self, depth: f64, sigma_max: f64, dt: f64) -> Grading {
        let d = depth.clamp(0.0, 1.0);
        let sigma = sigma_max * d.powf(self.order);
        let kappa = 1.0 + (self.kappa_max - 1.0) * d.powf(self.order);
        let alpha = self.alpha_max * (1.0 - d).powf(self.alpha_order);

        let b = (-(sigma / kappa + alpha) * dt).exp();
        let denom = sigma * kappa + kappa * kappa * alpha;
        let c = if denom > 0.0 {
            sigma / denom * (b - 1.0)
        } else {
            0.0
        };
        Grading { b, c, kappa }
    }
}

/// Per-face slab coefficients, indexed by position inside the slab
#[derive(Debug, Clone)]
struct CpmlFace {
    face: Face,
    /// First grid index of the slab along the face axis
    start: usize,
    int: Vec<Grading>,
    half: Vec<Grading>,
}

impl CpmlFace {
    fn thickness(&self) -> usize {
        self.int.len()
    }

    fn axis(&self) -> usize {
        self.face.axis.index()
    }

    fn slab_shape(&self, cells: [usize; 3]) -> (usize, usize, usize) {
        let mut shape = cells;
        shape[self.axis()] = self.thickness();
        (shape[0], shape[1], shape[2])
    }
}

/// CPML absorber for all terminated faces with nonzero thickness
#[derive(Debug, Clone)]
pub struct Cpml {
    faces: Vec<CpmlFace>,
    inv_spacing: [f64; 3],
}

/// Auxiliary ψ arrays for one field state, two tangential components per face
#[derive(Debug, Clone, Default)]
pub struct CpmlMemory {
    psi_e: Vec<[Array3<f64>; 2]>,
    psi_h: Vec<[Array3<f64>; 2]>,
}

impl CpmlMemory {
    /// Total number of stored memory values
    pub fn len(&self) -> usize {
        self.psi_e
            .iter()
            .chain(self.psi_h.iter())
            .map(|pair| pair[0].len() + pair[1].len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reject absorbers on periodic axes and slabs leaving no interior cell
pub fn validate_thickness(grid: &GridGeometry, thickness: [usize; 6]) -> Result<()> {
    let cells = grid.cells();
    for axis in Axis::ALL {
        let a = axis.index();
        let (lo, hi) = (thickness[2 * a], thickness[2 * a + 1]);
        for (side, t) in [(Side::Low, lo), (Side::High, hi)] {
            if t > 0 && grid.is_periodic(a) {
                return Err(FdtdError::CpmlOnPeriodicAxis {
                    face: Face::new(axis, side),
                });
            }
        }
        if lo + hi > 0 && lo + hi >= cells[a] {
            return Err(FdtdError::CpmlTooThick {
                face: Face::new(axis, if hi > 0 { Side::High } else { Side::Low }),
                thickness: lo + hi,
                extent: cells[a],
            });
        }
    }
    Ok(())
}

impl Cpml {
    /// Build coefficients for faces `[x_lo, x_hi, y_lo, y_hi, z_lo, z_hi]`
    pub fn new(
        grid: &GridGeometry,
        thickness: [usize; 6],
        profile: &CpmlProfile,
        dt: f64,
    ) -> Result<Self> {
        validate_thickness(grid, thickness)?;
        let cells = grid.cells();
        let spacing = grid.spacing();

        let mut faces = Vec::new();
        for face in Face::ALL {
            let t = thickness[face.index()];
            if t == 0 {
                continue;
            }
            let a = face.axis.index();
            let n = cells[a];
            let sigma_max = profile.sigma_max(t, spacing[a]);
            let tf = t as f64;

            let (start, int, half): (usize, Vec<Grading>, Vec<Grading>) = match face.side {
                Side::Low => (
                    0,
                    (0..t)
                        .map(|j| profile.grade((tf - j as f64) / tf, sigma_max, dt))
                        .collect(),
                    (0..t)
                        .map(|j| profile.grade((tf - j as f64 - 0.5) / tf, sigma_max, dt))
                        .collect(),
                ),
                Side::High => (
                    n - t,
                    (0..t)
                        .map(|j| profile.grade(j as f64 / tf, sigma_max, dt))
                        .collect(),
                    (0..t)
                        .map(|j| profile.grade((j as f64 + 0.5) / tf, sigma_max, dt))
                        .collect(),
                ),
            };
            debug!(%face, thickness = t, sigma_max, "cpml face");
            faces.push(CpmlFace {
                face,
                start,
                int,
                half,
            });
        }

        Ok(Self {
            faces,
            inv_spacing: [1.0 / spacing[0], 1.0 / spacing[1], 1.0 / spacing[2]],
        })
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Faces that carry an absorber
    pub fn faces(&self) -> impl Iterator<Item = Face> + '_ {
        self.faces.iter().map(|f| f.face)
    }

    /// Fold the κ grading into the grid's inverse spacing tables
    pub fn apply_kappa(&self, grid: &mut GridGeometry) {
        for f in &self.faces {
            let a = f.axis();
            for j in 0..f.thickness() {
                grid.inv_int[a][f.start + j] = self.inv_spacing[a] / f.int[j].kappa;
                grid.inv_half[a][f.start + j] = self.inv_spacing[a] / f.half[j].kappa;
            }
        }
    }

    /// Zeroed memory sized to the slabs
    pub fn memory(&self, cells: [usize; 3]) -> CpmlMemory {
        let pair = |f: &CpmlFace| {
            [
                Array3::zeros(f.slab_shape(cells)),
                Array3::zeros(f.slab_shape(cells)),
            ]
        };
        CpmlMemory {
            psi_e: self.faces.iter().map(pair).collect(),
            psi_h: self.faces.iter().map(pair).collect(),
        }
    }

    /// Apply the ψ correction to the electric field after its update
    pub fn correct_e(
        &self,
        fields: &mut FieldState,
        grid: &GridGeometry,
        table: &MaterialTable,
        memory: &mut CpmlMemory,
    ) {
        let cells = grid.cells();
        let FieldState { e, h, materials, .. } = fields;

        for (f, psi_pair) in self.faces.iter().zip(memory.psi_e.iter_mut()) {
            let a = f.axis();
            let inv = self.inv_spacing[a];
            // (memory slot, corrected component, sign, differentiated H component)
            let terms = [(0, (a + 2) % 3, 1.0, (a + 1) % 3), (1, (a + 1) % 3, -1.0, (a + 2) % 3)];

            for (slot, c, sign, src) in terms {
                let psi = &mut psi_pair[slot];
                let hs = &h[src];
                let ec = &mut e[c];

                for j in 0..f.thickness() {
                    let g = f.start + j;
                    if f.face.side == Side::Low && g == 0 {
                        continue;
                    }
                    let grading = f.int[j];
                    let mut lo = [0; 3];
                    let mut hi = cells;
                    lo[a] = g;
                    hi[a] = g + 1;

                    for i0 in lo[0]..hi[0] {
                        for i1 in lo[1]..hi[1] {
                            for i2 in lo[2]..hi[2] {
                                let idx = [i0, i1, i2];
                                if grid.is_wall(c, idx) {
                                    continue;
                                }
                                let at = hs.store(idx);
                                let mut back = at;
                                back[a] -= 1;
                                let derivative = (hs.data[at] - hs.data[back]) * inv;

                                let mut local = idx;
                                local[a] = j;
                                let p = &mut psi[local];
                                *p = grading.b * *p + grading.c * derivative;

                                let m = materials.get(idx) as usize;
                                *ec.get_mut(idx) += sign * table.cb[m] * *p;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Apply the ψ correction to the magnetic field after its update
    pub fn correct_h(&self, fields: &mut FieldState, grid: &GridGeometry, dt: f64, memory: &mut CpmlMemory) {
        let cells = grid.cells();
        let FieldState { e, h, .. } = fields;

        for (f, psi_pair) in self.faces.iter().zip(memory.psi_h.iter_mut()) {
            let a = f.axis();
            let inv = self.inv_spacing[a];
            // (memory slot, corrected component, sign, differentiated E component)
            let terms = [(0, (a + 2) % 3, -1.0, (a + 1) % 3), (1, (a + 1) % 3, 1.0, (a + 2) % 3)];

            for (slot, c, sign, src) in terms {
                let psi = &mut psi_pair[slot];
                let es = &e[src];
                let hc = &mut h[c];

                for j in 0..f.thickness() {
                    let g = f.start + j;
                    let grading = f.half[j];
                    let mut lo = [0; 3];
                    let mut hi = cells;
                    lo[a] = g;
                    hi[a] = g + 1;

                    for i0 in lo[0]..hi[0] {
                        for i1 in lo[1]..hi[1] {
                            for i2 in lo[2]..hi[2] {
                                let idx = [i0, i1, i2];
                                let mut ahead = idx;
                                ahead[a] += 1;
                                let derivative = (es.data[ahead] - es.data[idx]) * inv;

                                let mut local = idx;
                                local[a] = j;
                                let p = &mut psi[local];
                                *p = grading.b * *p + grading.c * derivative;

                                *hc.get_mut(idx) += sign * dt * *p;
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::material::{MaterialLibrary, MaterialVolume};
    use approx::assert_relative_eq;
    use rand::Rng;
    use std::sync::Arc;

    fn random_fields(grid: &GridGeometry) -> FieldState {
        let mut rng = rand::thread_rng();
        let cells = grid.cells();
        let mut fields = FieldState::new(grid, Arc::new(MaterialVolume::uniform(cells, 0)));
        for f in fields.e.iter_mut().chain(fields.h.iter_mut()) {
            f.interior_mut().mapv_inplace(|_| rng.gen_range(-1.0..1.0));
        }
        fields.zero_walls();
        fields
    }

    #[test]
    fn test_default_sigma() {
        let profile = CpmlProfile::default();
        assert_relative_eq!(profile.sigma_max(10, 5.0), 0.8 * 4.0 / 5.0);

        let from_r = CpmlProfile {
            reflection: Some(1e-6),
            ..Default::default()
        };
        assert_relative_eq!(
            from_r.sigma_max(10, 5.0),
            -4.0 * 1e-6f64.ln() / 100.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_grading_limits() {
        let profile = CpmlProfile {
            kappa_max: 5.0,
            alpha_max: 0.05,
            ..Default::default()
        };
        let interface = profile.grade(0.0, 0.5, 1.0);
        assert_eq!(interface.c, 0.0);
        assert_eq!(interface.kappa, 1.0);

        let wall = profile.grade(1.0, 0.5, 1.0);
        assert!(wall.b > 0.0 && wall.b < 1.0);
        assert!(wall.c < 0.0);
        assert_relative_eq!(wall.kappa, 5.0);

        // zero conductivity and zero alpha give a zero denominator
        let flat = CpmlProfile::default().grade(1.0, 0.0, 1.0);
        assert_eq!(flat.b, 1.0);
        assert_eq!(flat.c, 0.0);
    }

    #[test]
    fn test_configuration_errors() {
        let periodic = GridGeometry::new([8, 8, 8], [1.0; 3], [true, false, false]).unwrap();
        let err = Cpml::new(&periodic, [2, 0, 0, 0, 0, 0], &CpmlProfile::default(), 0.5);
        assert!(matches!(err, Err(FdtdError::CpmlOnPeriodicAxis { .. })));

        let err = Cpml::new(&periodic, [0, 0, 5, 4, 0, 0], &CpmlProfile::default(), 0.5);
        assert!(matches!(
            err,
            Err(FdtdError::CpmlTooThick { thickness: 9, extent: 8, .. })
        ));

        // slabs meeting in the middle leave no interior
        let err = Cpml::new(&periodic, [0, 0, 0, 0, 4, 4], &CpmlProfile::default(), 0.5);
        assert!(matches!(
            err,
            Err(FdtdError::CpmlTooThick { thickness: 8, extent: 8, .. })
        ));
        assert!(Cpml::new(&periodic, [0, 0, 0, 0, 4, 3], &CpmlProfile::default(), 0.5).is_ok());
    }

    #[test]
    fn test_zero_thickness_is_inert() {
        let mut grid = GridGeometry::new([6, 5, 4], [1.0; 3], [false; 3]).unwrap();
        let dt = 0.5 * grid.max_stable_timestep();
        let table = MaterialTable::bake(&MaterialLibrary::from_indices(&[1.0]), 1.0, dt);
        let cpml = Cpml::new(&grid, [0; 6], &CpmlProfile::default(), dt).unwrap();
        assert!(cpml.is_empty());

        let before_grid = grid.clone();
        cpml.apply_kappa(&mut grid);
        assert_eq!(grid.inv_int, before_grid.inv_int);
        assert_eq!(grid.inv_half, before_grid.inv_half);

        let mut memory = cpml.memory(grid.cells());
        assert!(memory.is_empty());

        let mut fields = random_fields(&grid);
        let reference = fields.clone();
        cpml.correct_e(&mut fields, &grid, &table, &mut memory);
        cpml.correct_h(&mut fields, &grid, dt, &mut memory);
        for c in 0..3 {
            assert_eq!(fields.e[c], reference.e[c]);
            assert_eq!(fields.h[c], reference.h[c]);
        }
    }

    #[test]
    fn test_kappa_folding() {
        let mut grid = GridGeometry::new([1, 1, 20], [1.0, 1.0, 2.0], [true, true, false]).unwrap();
        let profile = CpmlProfile {
            kappa_max: 4.0,
            ..Default::default()
        };
        let cpml = Cpml::new(&grid, [0, 0, 0, 5, 0, 0], &profile, 0.5);
        assert!(cpml.is_err());

        let cpml = Cpml::new(&grid, [0, 0, 0, 0, 5, 5], &profile, 0.5).unwrap();
        cpml.apply_kappa(&mut grid);
        // wall node fully stretched, interior untouched
        assert_relative_eq!(grid.inv_int[2][0], 0.5 / 4.0, epsilon = 1e-12);
        assert_relative_eq!(grid.inv_int[2][10], 0.5, epsilon = 1e-12);
        assert!(grid.inv_half[2][19] < 0.5);
        assert_eq!(cpml.faces().count(), 2);
    }

    #[test]
    fn test_slab_memory_size() {
        let grid = GridGeometry::new([10, 4, 3], [1.0; 3], [false, true, true]).unwrap();
        let cpml = Cpml::new(&grid, [3, 2, 0, 0, 0, 0], &CpmlProfile::default(), 0.5).unwrap();
        let memory = cpml.memory(grid.cells());
        // two faces, two E and two H arrays each
        assert_eq!(memory.len(), 4 * (3 + 2) * 4 * 3);
    }
}
