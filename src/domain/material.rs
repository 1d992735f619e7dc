//! Material model and per-run update coefficients
//!
//! The engine only sees a material index per Yee cell and a pure function
//! returning the complex permittivity of an index at an angular frequency.
//! Before the first step the permittivity is evaluated once at the reference
//! frequency and folded into `ca`/`cb` coefficients for the electric update.

use ndarray::Array3;
use num_complex::Complex64;
use tracing::warn;

use crate::error::{FdtdError, Result};

/// Source of frequency-dependent permittivity, `e^{-iωt}` convention
/// (lossy media have positive imaginary part).
pub trait MaterialModel: Send + Sync {
    /// Number of distinct material indices
    fn count(&self) -> usize;

    /// Relative permittivity of `index` at angular frequency `omega`
    fn complex_permittivity(&self, index: u32, omega: f64) -> Complex64;

    /// Complex refractive index, principal square root of the permittivity
    fn refractive_index(&self, index: u32, omega: f64) -> Complex64 {
        self.complex_permittivity(index, omega).sqrt()
    }
}

/// Resonance of a Lorentz oscillator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LorentzPole {
    /// Oscillator strength Δε
    pub strength: f64,
    /// Resonance angular frequency
    pub omega0: f64,
    /// Damping rate
    pub gamma: f64,
}

/// Dispersion law of one material
#[derive(Debug, Clone, PartialEq)]
pub enum Dispersion {
    /// Constant complex refractive index `n + iκ`
    Index(Complex64),
    /// Free-electron metal, `ε∞ - ωp² / (ω² + iγω)`
    Drude {
        eps_inf: f64,
        plasma: f64,
        gamma: f64,
    },
    /// `ε∞ + Σ Δε ω0² / (ω0² - ω² - iγω)`
    Lorentz {
        eps_inf: f64,
        poles: Vec<LorentzPole>,
    },
}

impl Dispersion {
    pub fn permittivity(&self, omega: f64) -> Complex64 {
        let i = Complex64::i();
        match self {
            Dispersion::Index(n) => n * n,
            Dispersion::Drude {
                eps_inf,
                plasma,
                gamma,
            } => {
                if omega == 0.0 {
                    return Complex64::new(*eps_inf, 0.0);
                }
                Complex64::new(*eps_inf, 0.0)
                    - plasma * plasma / (omega * omega + i * gamma * omega)
            }
            Dispersion::Lorentz { eps_inf, poles } => poles.iter().fold(
                Complex64::new(*eps_inf, 0.0),
                |eps, p| {
                    eps + p.strength * p.omega0 * p.omega0
                        / (p.omega0 * p.omega0 - omega * omega - i * p.gamma * omega)
                },
            ),
        }
    }
}

/// Indexed list of dispersion laws
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    materials: Vec<Dispersion>,
}

impl MaterialLibrary {
    pub fn new(materials: Vec<Dispersion>) -> Self {
        Self { materials }
    }

    /// Library of lossless dielectrics with the given real indices
    pub fn from_indices(indices: &[f64]) -> Self {
        Self::new(
            indices
                .iter()
                .map(|&n| Dispersion::Index(Complex64::new(n, 0.0)))
                .collect(),
        )
    }

    /// Append a material and return its index
    pub fn push(&mut self, material: Dispersion) -> u32 {
        self.materials.push(material);
        (self.materials.len() - 1) as u32
    }
}

impl MaterialModel for MaterialLibrary {
    fn count(&self) -> usize {
        self.materials.len()
    }

    fn complex_permittivity(&self, index: u32, omega: f64) -> Complex64 {
        self.materials
            .get(index as usize)
            .map(|m| m.permittivity(omega))
            .unwrap_or(Complex64::new(1.0, 0.0))
    }
}

/// Adapter turning a closure into a [`MaterialModel`]
pub struct FnMaterial<F> {
    count: usize,
    eval: F,
}

impl<F> FnMaterial<F>
where
    F: Fn(u32, f64) -> Complex64 + Send + Sync,
{
    pub fn new(count: usize, eval: F) -> Self {
        Self { count, eval }
    }
}

impl<F> MaterialModel for FnMaterial<F>
where
    F: Fn(u32, f64) -> Complex64 + Send + Sync,
{
    fn count(&self) -> usize {
        self.count
    }

    fn complex_permittivity(&self, index: u32, omega: f64) -> Complex64 {
        (self.eval)(index, omega)
    }
}

/// Material index per Yee cell
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialVolume {
    pub data: Array3<u32>,
}

impl MaterialVolume {
    /// Volume filled with a single material
    pub fn uniform(cells: [usize; 3], index: u32) -> Self {
        Self {
            data: Array3::from_elem((cells[0], cells[1], cells[2]), index),
        }
    }

    pub fn from_array(data: Array3<u32>) -> Self {
        Self { data }
    }

    pub fn cells(&self) -> [usize; 3] {
        let s = self.data.shape();
        [s[0], s[1], s[2]]
    }

    #[inline]
    pub fn get(&self, idx: [usize; 3]) -> u32 {
        self.data[idx]
    }

    /// Assign `index` to every cell in the half-open box `[lo, hi)`
    pub fn fill_box(&mut self, lo: [usize; 3], hi: [usize; 3], index: u32) {
        let [nx, ny, nz] = self.cells();
        let hi = [hi[0].min(nx), hi[1].min(ny), hi[2].min(nz)];
        self.data
            .slice_mut(ndarray::s![lo[0]..hi[0], lo[1]..hi[1], lo[2]..hi[2]])
            .fill(index);
    }

    /// Check that the volume matches the grid and every index is defined
    pub fn validate(&self, cells: [usize; 3], count: usize) -> Result<()> {
        if self.cells() != cells {
            return Err(FdtdError::InvalidGrid(format!(
                "material volume is {:?} but the grid is {:?}",
                self.cells(),
                cells
            )));
        }
        if let Some(&index) = self.data.iter().find(|&&m| m as usize >= count) {
            return Err(FdtdError::MaterialIndexOutOfRange { index, count });
        }
        Ok(())
    }
}

/// Update coefficients for one run, baked at a reference frequency
#[derive(Debug, Clone)]
pub struct MaterialTable {
    /// Real relative permittivity after clamping
    pub eps: Vec<f64>,
    /// Effective conductivity
    pub sigma: Vec<f64>,
    pub ca: Vec<f64>,
    pub cb: Vec<f64>,
    pub omega_ref: f64,
}

impl MaterialTable {
    /// Evaluate every material at `omega_ref` and derive the coefficients.
    ///
    /// `Re ε < 1` is clamped to 1 with the loss kept; gain (`Im ε < 0`) is
    /// dropped.
    pub fn bake(model: &dyn MaterialModel, omega_ref: f64, dt: f64) -> Self {
        let count = model.count();
        let mut table = Self {
            eps: Vec::with_capacity(count),
            sigma: Vec::with_capacity(count),
            ca: Vec::with_capacity(count),
            cb: Vec::with_capacity(count),
            omega_ref,
        };

        for index in 0..count as u32 {
            let eps = model.complex_permittivity(index, omega_ref);
            if eps.re < 1.0 || eps.im < 0.0 {
                warn!(
                    index,
                    re = eps.re,
                    im = eps.im,
                    "permittivity clamped for time-domain update"
                );
            }
            let eps_r = eps.re.max(1.0);
            let sigma = omega_ref * eps.im.max(0.0);
            let loss = sigma * dt / (2.0 * eps_r);

            table.eps.push(eps_r);
            table.sigma.push(sigma);
            table.ca.push((1.0 - loss) / (1.0 + loss));
            table.cb.push((dt / eps_r) / (1.0 + loss));
        }
        table
    }

    pub fn count(&self) -> usize {
        self.eps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_index_permittivity() {
        let lib = MaterialLibrary::from_indices(&[1.0, 1.5]);
        let eps = lib.complex_permittivity(1, 0.01);
        assert_relative_eq!(eps.re, 2.25, epsilon = 1e-12);
        assert_relative_eq!(lib.refractive_index(1, 0.01).re, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_drude_is_lossy_metal() {
        let gold = Dispersion::Drude {
            eps_inf: 1.0,
            plasma: 0.05,
            gamma: 0.001,
        };
        let eps = gold.permittivity(0.01);
        assert!(eps.re < 0.0);
        assert!(eps.im > 0.0);
    }

    #[test]
    fn test_lorentz_static_limit() {
        let glass = Dispersion::Lorentz {
            eps_inf: 1.0,
            poles: vec![LorentzPole {
                strength: 1.25,
                omega0: 1.0,
                gamma: 0.0,
            }],
        };
        assert_relative_eq!(glass.permittivity(0.0).re, 2.25, epsilon = 1e-12);
    }

    #[test]
    fn test_bake_lossless() {
        let lib = MaterialLibrary::from_indices(&[1.0, 2.0]);
        let table = MaterialTable::bake(&lib, 0.01, 0.5);
        assert_eq!(table.ca, vec![1.0, 1.0]);
        assert_relative_eq!(table.cb[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(table.cb[1], 0.125, epsilon = 1e-12);
    }

    #[test]
    fn test_bake_clamps_metal() {
        let lib = MaterialLibrary::new(vec![Dispersion::Index(Complex64::new(0.2, 3.0))]);
        let table = MaterialTable::bake(&lib, 0.01, 0.5);
        assert_eq!(table.eps[0], 1.0);
        assert!(table.sigma[0] > 0.0);
        assert!(table.ca[0] < 1.0);
    }

    #[test]
    fn test_volume_validation() {
        let mut volume = MaterialVolume::uniform([2, 2, 2], 0);
        assert!(volume.validate([2, 2, 2], 1).is_ok());
        assert!(volume.validate([2, 2, 3], 1).is_err());

        volume.fill_box([1, 0, 0], [9, 9, 9], 3);
        match volume.validate([2, 2, 2], 2) {
            Err(FdtdError::MaterialIndexOutOfRange { index, count }) => {
                assert_eq!(index, 3);
                assert_eq!(count, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_closure_material() {
        let model = FnMaterial::new(1, |_, omega| Complex64::new(1.0 + omega, 0.0));
        assert_relative_eq!(model.complex_permittivity(0, 1.0).re, 2.0);
    }
}
