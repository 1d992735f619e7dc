//! Total-field / scattered-field plane-wave injection
//!
//! A one-sided TF/SF plane at index `k0` along the propagation axis `a`
//! separates the scattered region (`< k0`) from the total-field region
//! (`≥ k0`). The incident field comes from a complex 1-D Yee line along `a`
//! using the same spacing and time step as the 3-D grid. Transverse
//! derivatives reduce to `∂_u → i·K̃` along the Bloch axis `u` and to zero
//! along the remaining axis `v`, with `K̃ = 2·sin(k_u·Δu/2)/Δu`, so the
//! line carries exactly the lattice dispersion of an oblique plane wave.
//! The 3-D incident value at a node is `ψ(a)·e^{i·k_u·x_u}`; the real grid
//! receives its real part and the imaginary grid its imaginary part.

use num_complex::Complex64;
use tracing::info;

use crate::config::IncidenceConfig;
use crate::domain::cpml::{CpmlProfile, Grading};
use crate::domain::fields::FieldState;
use crate::domain::grid::{FieldKind, GridGeometry};
use crate::domain::material::{MaterialTable, MaterialVolume};
use crate::utilities::sources::Waveform;

/// Absorbing cells at each end of the auxiliary line
const LINE_PAD: usize = 40;
/// Free cells between the absorbing pad and the first grid cell
const LINE_GAP: usize = 5;
/// Grading order of the pad absorber
const PAD_ORDER: f64 = 3.0;
/// Smallest propagation cosine the pad strength is scaled for
const MIN_PAD_COSINE: f64 = 0.25;

/// Which twin grid a correction is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Real,
    Imag,
}

impl Part {
    fn take(self, z: Complex64) -> f64 {
        match self {
            Part::Real => z.re,
            Part::Imag => z.im,
        }
    }
}

/// Complex 1-D Yee line closed by stretched-coordinate absorbers at both ends
///
/// Only the axial derivative is stretched, so the pads stay matched for any
/// transverse wavevector.
#[derive(Debug, Clone)]
struct AuxLine {
    axis: usize,
    bloch: usize,
    inv_spacing: f64,
    k_tilde: f64,
    e: [Vec<Complex64>; 3],
    h: [Vec<Complex64>; 3],
    /// Memory of the axial derivative in each component's curl
    psi_e: [Vec<Complex64>; 3],
    psi_h: [Vec<Complex64>; 3],
    int: Vec<Grading>,
    half: Vec<Grading>,
    ca: f64,
    cb: f64,
    dt: f64,
}

impl AuxLine {
    #[allow(clippy::too_many_arguments)]
    fn new(
        len: usize,
        axis: usize,
        bloch: usize,
        spacing: f64,
        k_tilde: f64,
        eps: f64,
        sigma: f64,
        dt: f64,
        cos_ref: f64,
    ) -> Self {
        let n_bg = eps.sqrt();
        let profile = CpmlProfile {
            order: PAD_ORDER,
            ..Default::default()
        };
        // round trip through a pad attenuates the reference wave by about 1e-12
        let sigma_max = (PAD_ORDER + 1.0) * 12.0 * 10f64.ln()
            / (2.0 * n_bg * cos_ref.abs().max(MIN_PAD_COSINE) * LINE_PAD as f64 * spacing);
        let depth = |x: f64| -> f64 {
            let low = (LINE_PAD as f64 - x) / LINE_PAD as f64;
            let high = (x - (len - LINE_PAD) as f64) / LINE_PAD as f64;
            low.max(high)
        };
        let zeros = || -> [Vec<Complex64>; 3] {
            [
                vec![Complex64::default(); len],
                vec![Complex64::default(); len],
                vec![Complex64::default(); len],
            ]
        };
        let loss = sigma * dt / (2.0 * eps);

        Self {
            axis,
            bloch,
            inv_spacing: 1.0 / spacing,
            k_tilde,
            e: zeros(),
            h: zeros(),
            psi_e: zeros(),
            psi_h: zeros(),
            int: (0..len)
                .map(|j| profile.grade(depth(j as f64), sigma_max, dt))
                .collect(),
            half: (0..len)
                .map(|j| profile.grade(depth(j as f64 + 0.5), sigma_max, dt))
                .collect(),
            ca: (1.0 - loss) / (1.0 + loss),
            cb: (dt / eps) / (1.0 + loss),
            dt,
        }
    }

    fn len(&self) -> usize {
        self.int.len()
    }

    /// Derivative of an H component along `x`, evaluated at E node `j`
    fn d_h(&self, x: usize, f: &[Complex64], j: usize) -> Complex64 {
        if x == self.axis {
            let back = if j == 0 { Complex64::default() } else { f[j - 1] };
            (f[j] - back) * self.inv_spacing
        } else if x == self.bloch {
            Complex64::new(0.0, self.k_tilde) * f[j]
        } else {
            Complex64::default()
        }
    }

    /// Derivative of an E component along `x`, evaluated at H node `j`
    fn d_e(&self, x: usize, f: &[Complex64], j: usize) -> Complex64 {
        if x == self.axis {
            let ahead = f.get(j + 1).copied().unwrap_or_default();
            (ahead - f[j]) * self.inv_spacing
        } else if x == self.bloch {
            Complex64::new(0.0, self.k_tilde) * f[j]
        } else {
            Complex64::default()
        }
    }

    /// Field differentiated along the line in the curl of component `c`,
    /// with its sign
    fn axial_term(&self, c: usize) -> (usize, f64) {
        if (c + 1) % 3 == self.axis {
            ((c + 2) % 3, 1.0)
        } else {
            ((c + 1) % 3, -1.0)
        }
    }

    fn update_e(&mut self) {
        let a = self.axis;
        for c in 0..3 {
            let (p, q) = ((c + 1) % 3, (c + 2) % 3);
            // tangential E at the line's first node is a wall
            let first = usize::from(c != a);
            for j in first..self.len() {
                let mut curl = self.d_h(p, &self.h[q], j) - self.d_h(q, &self.h[p], j);
                if c != a {
                    let (f, sign) = self.axial_term(c);
                    let g = self.int[j];
                    let psi = self.psi_e[c][j] * g.b + self.d_h(a, &self.h[f], j) * g.c;
                    self.psi_e[c][j] = psi;
                    curl += psi * sign;
                }
                self.e[c][j] = self.e[c][j] * self.ca + curl * self.cb;
            }
        }
    }

    fn update_h(&mut self) {
        let a = self.axis;
        for c in 0..3 {
            let (p, q) = ((c + 1) % 3, (c + 2) % 3);
            for j in 0..self.len() {
                let mut curl = self.d_e(p, &self.e[q], j) - self.d_e(q, &self.e[p], j);
                if c != a {
                    let (f, sign) = self.axial_term(c);
                    let g = self.half[j];
                    let psi = self.psi_h[c][j] * g.b + self.d_e(a, &self.e[f], j) * g.c;
                    self.psi_h[c][j] = psi;
                    curl += psi * sign;
                }
                self.h[c][j] -= curl * self.dt;
            }
        }
    }
}

/// Plane-wave source injected through a TF/SF plane
#[derive(Debug)]
pub struct PlaneWaveSource {
    axis: usize,
    bloch: usize,
    plane: usize,
    /// Line index of grid index 0 along the propagation axis
    offset: usize,
    feed: usize,
    line: AuxLine,
    waveform: Box<dyn Waveform>,
    weights: (f64, f64),
    k_u: f64,
    n_bg: f64,
    background: u32,
    /// `e^{i k_u x_u}` at integer and half nodes along the Bloch axis
    phase_int: Vec<Complex64>,
    phase_half: Vec<Complex64>,
}

impl PlaneWaveSource {
    pub fn new(
        grid: &GridGeometry,
        table: &MaterialTable,
        materials: &MaterialVolume,
        incidence: &IncidenceConfig,
        waveform: Box<dyn Waveform>,
        dt: f64,
    ) -> Self {
        let a = incidence.axis.index();
        let u = incidence.bloch_axis().index();
        let plane = incidence.plane_index;

        let mut corner = [0; 3];
        corner[a] = plane;
        let background = materials.get(corner);
        let eps = table.eps[background as usize];
        let n_bg = eps.sqrt();

        let k_u = n_bg * table.omega_ref * incidence.angle.sin();
        let du = grid.spacing()[u];
        let k_tilde = 2.0 * (0.5 * k_u * du).sin() / du;

        let offset = LINE_PAD + LINE_GAP;
        let len = grid.cells()[a] + 2 * offset;
        let line = AuxLine::new(
            len,
            a,
            u,
            grid.spacing()[a],
            k_tilde,
            eps,
            table.sigma[background as usize],
            dt,
            incidence.angle.cos(),
        );

        let nu = grid.cells()[u];
        let phase = |o: f64| -> Vec<Complex64> {
            (0..nu)
                .map(|i| Complex64::from_polar(1.0, k_u * grid.position(u, i, o)))
                .collect()
        };

        info!(
            axis = a,
            bloch_axis = u,
            plane,
            k_u,
            n_bg,
            "plane-wave source ready"
        );

        Self {
            axis: a,
            bloch: u,
            plane,
            offset,
            feed: LINE_PAD + 2,
            line,
            waveform,
            weights: incidence.polarization.weights(),
            k_u,
            n_bg,
            background,
            phase_int: phase(0.0),
            phase_half: phase(0.5),
        }
    }

    pub fn axis(&self) -> usize {
        self.axis
    }

    pub fn bloch_axis(&self) -> usize {
        self.bloch
    }

    pub fn plane(&self) -> usize {
        self.plane
    }

    /// Transverse wavevector along the Bloch axis
    pub fn k_u(&self) -> f64 {
        self.k_u
    }

    /// Refractive index of the incidence medium
    pub fn n_bg(&self) -> f64 {
        self.n_bg
    }

    pub fn background(&self) -> u32 {
        self.background
    }

    /// Complex incident E at the injection plane
    pub fn incident_e(&self) -> [Complex64; 3] {
        let j = self.offset + self.plane;
        [self.line.e[0][j], self.line.e[1][j], self.line.e[2][j]]
    }

    fn phase(&self, kind: FieldKind, component: usize, index: usize) -> Complex64 {
        if kind.offset(component, self.bloch) > 0.0 {
            self.phase_half[index]
        } else {
            self.phase_int[index]
        }
    }

    /// Correct tangential E on the plane with the incident H just outside it
    pub fn inject_e(&self, fields: &mut FieldState, grid: &GridGeometry, table: &MaterialTable, part: Part) {
        let a = self.axis;
        let k0 = self.plane;
        let h_index = self.offset + k0 - 1;
        let inv = grid.inv_int[a][k0];
        let cells = grid.cells();
        let FieldState { e, materials, .. } = fields;

        for c in (0..3).filter(|&c| c != a) {
            let (p, q) = ((c + 1) % 3, (c + 2) % 3);
            // (incident H component, sign)
            let (src, sign) = if p == a { (q, -1.0) } else { (p, 1.0) };
            let h_inc = self.line.h[src][h_index];

            let mut hi = cells;
            let mut lo = [0; 3];
            lo[a] = k0;
            hi[a] = k0 + 1;
            for i in lo[0]..hi[0] {
                for j in lo[1]..hi[1] {
                    for k in lo[2]..hi[2] {
                        let idx = [i, j, k];
                        if grid.is_wall(c, idx) {
                            continue;
                        }
                        let value = part.take(h_inc * self.phase(FieldKind::Magnetic, src, idx[self.bloch]));
                        let m = materials.get(idx) as usize;
                        *e[c].get_mut(idx) += sign * table.cb[m] * value * inv;
                    }
                }
            }
        }
    }

    /// Correct tangential H just outside the plane with the incident E on it
    pub fn inject_h(&self, fields: &mut FieldState, grid: &GridGeometry, dt: f64, part: Part) {
        let a = self.axis;
        let k0 = self.plane;
        let e_index = self.offset + k0;
        let inv = grid.inv_half[a][k0 - 1];
        let cells = grid.cells();

        for c in (0..3).filter(|&c| c != a) {
            let (p, q) = ((c + 1) % 3, (c + 2) % 3);
            // (incident E component, sign)
            let (src, sign) = if p == a { (q, 1.0) } else { (p, -1.0) };
            let e_inc = self.line.e[src][e_index];

            let mut hi = cells;
            let mut lo = [0; 3];
            lo[a] = k0 - 1;
            hi[a] = k0;
            for i in lo[0]..hi[0] {
                for j in lo[1]..hi[1] {
                    for k in lo[2]..hi[2] {
                        let idx = [i, j, k];
                        let value = part.take(e_inc * self.phase(FieldKind::Electric, src, idx[self.bloch]));
                        *fields.h[c].get_mut(idx) += sign * dt * value * inv;
                    }
                }
            }
        }
    }

    /// Advance the line's E to time `t` and add the S-polarized feed
    pub fn advance_e(&mut self, t: f64) {
        self.line.update_e();
        let v = self.bloch_third();
        let s = self.weights.0;
        if s != 0.0 {
            self.line.e[v][self.feed] += Complex64::new(s * self.waveform.value(t), 0.0);
        }
    }

    /// Advance the line's H to time `t` and add the P-polarized feed
    pub fn advance_h(&mut self, t: f64) {
        self.line.update_h();
        let v = self.bloch_third();
        let p = self.weights.1;
        if p != 0.0 {
            self.line.h[v][self.feed] += Complex64::new(p * self.n_bg * self.waveform.value(t), 0.0);
        }
    }

    fn bloch_third(&self) -> usize {
        3 - self.axis - self.bloch
    }
}
