//! Frequency-domain sensors fed once per time step
//!
//! Sensors see the engine through [`StepView`], a read-only snapshot of the
//! fields after both half steps. Complex samples are `real + i·imag` when
//! the twin grids are active, otherwise just the real grid.

pub mod completion;
pub mod dft;
pub mod field;
pub mod region;
pub mod spectrum;

use num_complex::Complex64;
use std::path::Path;

use crate::domain::fields::FieldState;
use crate::domain::grid::{FieldKind, GridGeometry};
use crate::domain::material::{MaterialModel, MaterialVolume};
use crate::error::{FdtdError, Result};

pub use completion::{CompletionDetector, CompletionState};
pub use dft::RunningDft;
pub use field::{FieldReport, FieldSensor};
pub use region::SensorRegion;
pub use spectrum::{DiffractionOrder, Spectrum, SpectrumKind, SpectrumSensor};

/// Fields at the end of one step
#[derive(Clone, Copy)]
pub struct StepView<'a> {
    /// Zero-based index of the step just completed
    pub step: usize,
    pub dt: f64,
    /// Time level of the electric field, `(step + 1)·dt`
    pub e_time: f64,
    /// Time level of the magnetic field, `(step + 1.5)·dt`
    pub h_time: f64,
    pub grid: &'a GridGeometry,
    pub real: &'a FieldState,
    pub imag: Option<&'a FieldState>,
}

impl<'a> StepView<'a> {
    /// Complex value of component `c` of `kind` at `idx`
    #[inline]
    pub fn sample(&self, kind: FieldKind, c: usize, idx: [usize; 3]) -> Complex64 {
        let re = self.real.component(kind, c).get(idx);
        let im = self
            .imag
            .map(|f| f.component(kind, c).get(idx))
            .unwrap_or(0.0);
        Complex64::new(re, im)
    }

    /// Sample times for components ordered Ex, Ey, Ez, Hx, Hy, Hz
    pub fn six_times(&self) -> [f64; 6] {
        let (e, h) = (self.e_time, self.h_time);
        [e, e, e, h, h, h]
    }
}

/// Everything a sensor may need to turn its transforms into results
pub struct FinishContext<'a> {
    pub grid: &'a GridGeometry,
    pub model: &'a dyn MaterialModel,
    pub materials: &'a MaterialVolume,
    /// Transform of the incident E at the injection plane, one cell of three
    /// components over the run's spectrum
    pub incident: Option<&'a RunningDft>,
    /// Bloch wavevector and the incidence medium index
    pub k_u: f64,
    pub n_bg: f64,
    pub propagation_axis: usize,
    pub bloch_axis: usize,
    pub steps: usize,
    pub output_prefix: Option<&'a Path>,
}

/// Result of a finished sensor
#[derive(Debug, Clone)]
pub enum SensorReport {
    Fields(FieldReport),
    Spectrum(Spectrum),
    Completion(CompletionState),
}

impl SensorReport {
    pub fn as_spectrum(&self) -> Option<&Spectrum> {
        match self {
            SensorReport::Spectrum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fields(&self) -> Option<&FieldReport> {
        match self {
            SensorReport::Fields(f) => Some(f),
            _ => None,
        }
    }
}

/// Accumulator attached to the engine
pub trait Sensor: Send {
    fn name(&self) -> &str;

    fn region(&self) -> &SensorRegion;

    /// Wavelengths the sensor transforms at
    fn wavelengths(&self) -> &[f64];

    /// Check the sensor against the grid before the run
    fn validate(&self, grid: &GridGeometry) -> Result<()> {
        match self.region().check(grid) {
            Some(reason) => Err(FdtdError::sensor(self.name(), reason)),
            None => Ok(()),
        }
    }

    /// Consume one step's fields
    fn accumulate(&mut self, view: &StepView<'_>);

    /// Produce results and write any configured outputs
    fn finish(&mut self, ctx: &FinishContext<'_>) -> Result<SensorReport>;
}
