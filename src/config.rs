//! Run configuration, loadable from TOML
//!
//! Every section has defaults describing a small normal-incidence run along
//! z, so a file only needs the values it changes.

use serde::Deserialize;
use std::f64::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};

use crate::domain::cpml::{self, CpmlProfile};
use crate::domain::grid::{Axis, GridGeometry};
use crate::error::{FdtdError, Result};
use crate::utilities::sources::PulseConfig;
use crate::utilities::{angular_frequency, wavelength_grid};

/// Complete description of one simulation run
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub grid: GridConfig,
    /// Fraction of the Courant limit used as time step
    pub courant: f64,
    pub max_steps: usize,
    pub boundaries: BoundaryConfig,
    pub spectrum: SpectrumConfig,
    pub incidence: Option<IncidenceConfig>,
    pub completion: Option<CompletionConfig>,
    /// Worker threads per DFT sensor
    pub sensor_threads: usize,
    /// Directory and file stem for sensor outputs
    pub output_prefix: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            courant: 0.99,
            max_steps: 5000,
            boundaries: BoundaryConfig::default(),
            spectrum: SpectrumConfig::default(),
            incidence: Some(IncidenceConfig::default()),
            completion: None,
            sensor_threads: default_threads(),
            output_prefix: None,
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cells: [usize; 3],
    pub spacing: [f64; 3],
    pub periodic: [bool; 3],
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cells: [1, 1, 100],
            spacing: [5.0; 3],
            periodic: [true, true, false],
        }
    }
}

/// CPML thickness per face, ordered `[x_lo, x_hi, y_lo, y_hi, z_lo, z_hi]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub thickness: [usize; 6],
    pub profile: CpmlProfile,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            thickness: [0, 0, 0, 0, 10, 10],
            profile: CpmlProfile::default(),
        }
    }
}

impl BoundaryConfig {
    pub fn low(&self, axis: Axis) -> usize {
        self.thickness[2 * axis.index()]
    }

    pub fn high(&self, axis: Axis) -> usize {
        self.thickness[2 * axis.index() + 1]
    }
}

/// Band of vacuum wavelengths sampled by the sensors
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub min_wavelength: f64,
    pub max_wavelength: f64,
    pub points: usize,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            min_wavelength: 400.0,
            max_wavelength: 700.0,
            points: 31,
        }
    }
}

impl SpectrumConfig {
    pub fn wavelengths(&self) -> Vec<f64> {
        wavelength_grid(self.min_wavelength, self.max_wavelength, self.points)
    }

    /// Centre of the band, used to bake materials and the Bloch wavevector
    pub fn reference_wavelength(&self) -> f64 {
        0.5 * (self.min_wavelength + self.max_wavelength)
    }

    pub fn reference_omega(&self) -> f64 {
        angular_frequency(self.reference_wavelength())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_wavelength > 0.0 && self.min_wavelength.is_finite()) {
            return Err(FdtdError::InvalidSpectrum(format!(
                "minimum wavelength {} must be positive",
                self.min_wavelength
            )));
        }
        if !(self.max_wavelength >= self.min_wavelength && self.max_wavelength.is_finite()) {
            return Err(FdtdError::InvalidSpectrum(format!(
                "maximum wavelength {} is below the minimum {}",
                self.max_wavelength, self.min_wavelength
            )));
        }
        if self.points == 0 {
            return Err(FdtdError::InvalidSpectrum("no spectral points".into()));
        }
        Ok(())
    }
}

/// Polarization of the incident plane wave relative to the plane of incidence
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Polarization {
    /// Electric field normal to the plane of incidence
    #[default]
    S,
    /// Magnetic field normal to the plane of incidence
    P,
    /// Mix of both, angle measured from S in radians
    Angle(f64),
}

impl Polarization {
    /// `(s, p)` amplitude weights
    pub fn weights(self) -> (f64, f64) {
        match self {
            Polarization::S => (1.0, 0.0),
            Polarization::P => (0.0, 1.0),
            Polarization::Angle(psi) => (psi.cos(), psi.sin()),
        }
    }
}

/// One-sided plane-wave injection
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IncidenceConfig {
    /// Propagation axis; the wave travels toward increasing index
    pub axis: Axis,
    /// First index of the total-field region along `axis`
    pub plane_index: usize,
    /// Angle from the axis, in radians, within the Bloch plane
    pub angle: f64,
    /// Transverse axis carrying the Bloch phase; defaults to the next axis
    pub bloch_axis: Option<Axis>,
    pub polarization: Polarization,
    pub pulse: PulseConfig,
    /// Run the real/imaginary twin grids even at normal incidence
    pub dual: bool,
}

impl Default for IncidenceConfig {
    fn default() -> Self {
        Self {
            axis: Axis::Z,
            plane_index: 20,
            angle: 0.0,
            bloch_axis: None,
            polarization: Polarization::S,
            pulse: PulseConfig::default(),
            dual: false,
        }
    }
}

impl IncidenceConfig {
    pub fn bloch_axis(&self) -> Axis {
        self.bloch_axis.unwrap_or_else(|| self.axis.next())
    }

    pub fn uses_twins(&self) -> bool {
        self.dual || self.angle != 0.0
    }
}

/// Early-stop criterion on the spectral energy in a region
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub tolerance: f64,
    /// Steps between evaluations
    pub cadence: usize,
    /// Number of band wavelengths tracked
    pub tracked_points: usize,
    /// Half-open region; defaults to the grid without CPML slabs
    pub lo: Option<[usize; 3]>,
    pub hi: Option<[usize; 3]>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-3,
            cadence: 200,
            tracked_points: 3,
            lo: None,
            hi: None,
        }
    }
}

impl SimulationConfig {
    pub fn geometry(&self) -> Result<GridGeometry> {
        GridGeometry::new(self.grid.cells, self.grid.spacing, self.grid.periodic)
    }

    /// Time step derived from the grid and the Courant fraction
    pub fn timestep(&self) -> Result<f64> {
        Ok(self.courant * self.geometry()?.max_stable_timestep())
    }

    /// Check every section against the others
    pub fn validate(&self) -> Result<()> {
        let grid = self.geometry()?;
        if !(self.courant > 0.0 && self.courant <= 1.0) {
            return Err(FdtdError::Config(format!(
                "courant fraction {} must lie in (0, 1]",
                self.courant
            )));
        }
        if self.max_steps == 0 {
            return Err(FdtdError::Config("max_steps must be positive".into()));
        }
        if self.sensor_threads == 0 {
            return Err(FdtdError::Config("sensor_threads must be positive".into()));
        }
        self.spectrum.validate()?;
        cpml::validate_thickness(&grid, self.boundaries.thickness)?;

        if let Some(inc) = &self.incidence {
            self.validate_incidence(&grid, inc)?;
        }

        if let Some(done) = &self.completion {
            if done.cadence == 0 || done.tracked_points == 0 {
                return Err(FdtdError::Config(
                    "completion cadence and tracked points must be positive".into(),
                ));
            }
            if !(done.tolerance >= 0.0) {
                return Err(FdtdError::Config(format!(
                    "completion tolerance {} must be non-negative",
                    done.tolerance
                )));
            }
        }
        Ok(())
    }

    fn validate_incidence(&self, grid: &GridGeometry, inc: &IncidenceConfig) -> Result<()> {
        let a = inc.axis.index();
        let n = grid.cells()[a];
        let lo = self.boundaries.low(inc.axis);
        let hi = self.boundaries.high(inc.axis);

        if grid.is_periodic(a) {
            return Err(FdtdError::InvalidIncidence(format!(
                "propagation axis {} must not be periodic",
                inc.axis
            )));
        }
        if inc.plane_index <= lo || inc.plane_index + hi >= n {
            return Err(FdtdError::InvalidIncidence(format!(
                "injection plane {} must lie strictly inside the interior ({}..{})",
                inc.plane_index,
                lo,
                n - hi
            )));
        }
        if !(inc.angle.abs() < FRAC_PI_2) {
            return Err(FdtdError::InvalidIncidence(format!(
                "angle {} must be below 90 degrees",
                inc.angle
            )));
        }
        let u = inc.bloch_axis();
        if u == inc.axis {
            return Err(FdtdError::InvalidBlochAxis(
                "Bloch axis must differ from the propagation axis".into(),
            ));
        }
        if inc.uses_twins() && !grid.is_periodic(u.index()) {
            return Err(FdtdError::InvalidBlochAxis(format!(
                "Bloch axis {u} must be periodic"
            )));
        }
        Ok(())
    }
}

/// Parse a configuration from TOML text
pub fn parse_config(text: &str) -> Result<SimulationConfig> {
    toml::from_str(text).map_err(|e| FdtdError::Config(e.to_string()))
}

/// Load a TOML configuration file
pub fn load_config(path: &Path) -> Result<SimulationConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FdtdError::io(path, e))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SimulationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.spectrum.reference_wavelength(), 550.0);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = parse_config(
            r#"
            max_steps = 1200

            [grid]
            cells = [8, 1, 120]

            [spectrum]
            min_wavelength = 450.0
            max_wavelength = 550.0
            points = 5

            [incidence]
            angle = 0.3
            polarization = { angle = 0.5 }

            [incidence.pulse]
            kind = "continuous"
            ramp_periods = 3.0
            "#,
        )
        .unwrap();

        assert_eq!(config.max_steps, 1200);
        assert_eq!(config.grid.cells, [8, 1, 120]);
        assert_eq!(config.grid.spacing, [5.0; 3]);
        let inc = config.incidence.as_ref().unwrap();
        assert_eq!(inc.polarization, Polarization::Angle(0.5));
        assert_eq!(inc.pulse, PulseConfig::Continuous { ramp_periods: 3.0 });
        assert_eq!(inc.bloch_axis(), Axis::X);
        assert!(inc.uses_twins());
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_toml() {
        assert!(matches!(parse_config("max_steps = \"many\""), Err(FdtdError::Config(_))));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = SimulationConfig::default();
        config.boundaries.thickness = [0, 0, 0, 0, 60, 60];
        assert!(matches!(config.validate(), Err(FdtdError::CpmlTooThick { .. })));

        let mut config = SimulationConfig::default();
        config.grid.cells = [1, 1, 20];
        config.boundaries.thickness = [0, 0, 0, 0, 10, 10];
        assert!(matches!(
            config.validate(),
            Err(FdtdError::CpmlTooThick { thickness: 20, extent: 20, .. })
        ));

        let mut config = SimulationConfig::default();
        config.boundaries.thickness = [1, 0, 0, 0, 10, 10];
        assert!(matches!(config.validate(), Err(FdtdError::CpmlOnPeriodicAxis { .. })));

        let mut config = SimulationConfig::default();
        if let Some(inc) = config.incidence.as_mut() {
            inc.plane_index = 5;
        }
        assert!(matches!(config.validate(), Err(FdtdError::InvalidIncidence(_))));

        let mut config = SimulationConfig::default();
        config.grid.periodic = [false, true, false];
        if let Some(inc) = config.incidence.as_mut() {
            inc.angle = 0.2;
        }
        assert!(matches!(config.validate(), Err(FdtdError::InvalidBlochAxis(_))));

        let mut config = SimulationConfig::default();
        config.spectrum.max_wavelength = 100.0;
        assert!(matches!(config.validate(), Err(FdtdError::InvalidSpectrum(_))));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/run.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/run.toml"));
    }
}
