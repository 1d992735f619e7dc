//! Time-stepping engine
//!
//! A [`Simulation`] owns one field state, or two twins for oblique
//! incidence, together with the baked material table, the CPML absorber,
//! the plane-wave source and the attached sensors. Each step runs a fixed
//! sequence:
//!
//! 1. fill H ghosts (periodic copy, then Bloch exchange)
//! 2. update E, inject the incident H, correct E in the CPML
//! 3. fill E ghosts (periodic copy, then Bloch exchange)
//! 4. update H, inject the incident E, correct H in the CPML
//! 5. feed sensors and query the completion detector
//!
//! The twin grids always advance in lock-step.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::domain::bloch::BlochAdapter;
use crate::domain::cpml::{Cpml, CpmlMemory};
use crate::domain::fields::FieldState;
use crate::domain::grid::{Axis, GridGeometry};
use crate::domain::material::{MaterialModel, MaterialTable, MaterialVolume};
use crate::domain::maxwell;
use crate::domain::tfsf::{Part, PlaneWaveSource};
use crate::error::{FdtdError, Result};
use crate::sensors::{
    CompletionDetector, FinishContext, RunningDft, Sensor, SensorRegion, SensorReport, StepView,
};

/// Lifecycle of a [`Simulation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Running,
    Converged,
    StepLimitReached,
}

impl EngineState {
    pub fn is_finished(self) -> bool {
        matches!(self, EngineState::Converged | EngineState::StepLimitReached)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Ready => "ready",
            EngineState::Running => "running",
            EngineState::Converged => "converged",
            EngineState::StepLimitReached => "step limit reached",
        };
        f.write_str(name)
    }
}

/// Outcome of [`Simulation::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub state: EngineState,
    pub steps: usize,
    pub converged_at: Option<usize>,
}

/// One field state and its CPML memory
#[derive(Debug)]
struct Stepper {
    fields: FieldState,
    memory: CpmlMemory,
}

impl Stepper {
    fn new(grid: &GridGeometry, materials: Arc<MaterialVolume>) -> Self {
        Self {
            fields: FieldState::new(grid, materials),
            memory: CpmlMemory::default(),
        }
    }
}

/// Everything built by [`Simulation::finalize`]
struct Baked {
    table: MaterialTable,
    cpml: Cpml,
}

pub struct Simulation {
    config: SimulationConfig,
    model: Arc<dyn MaterialModel>,
    materials: Arc<MaterialVolume>,
    grid: GridGeometry,
    dt: f64,
    state: EngineState,
    step: usize,
    real: Stepper,
    imag: Option<Stepper>,
    baked: Option<Baked>,
    source: Option<PlaneWaveSource>,
    bloch: Option<BlochAdapter>,
    incident: Option<RunningDft>,
    sensors: Vec<Box<dyn Sensor>>,
    completion: Option<CompletionDetector>,
    converged_at: Option<usize>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("cells", &self.grid.cells())
            .field("dt", &self.dt)
            .field("state", &self.state)
            .field("step", &self.step)
            .field("twins", &self.imag.is_some())
            .field("sensors", &self.sensors.len())
            .finish()
    }
}

impl Simulation {
    /// Validate the configuration and allocate the field states
    pub fn new(
        config: SimulationConfig,
        model: Arc<dyn MaterialModel>,
        volume: MaterialVolume,
    ) -> Result<Self> {
        config.validate()?;
        let grid = config.geometry()?;
        volume.validate(grid.cells(), model.count())?;
        let dt = config.timestep()?;
        let materials = Arc::new(volume);

        let twins = config
            .incidence
            .as_ref()
            .map(|inc| inc.uses_twins())
            .unwrap_or(false);
        let real = Stepper::new(&grid, Arc::clone(&materials));
        let imag = twins.then(|| Stepper::new(&grid, Arc::clone(&materials)));

        debug!(cells = ?grid.cells(), dt, twins, "simulation allocated");
        Ok(Self {
            config,
            model,
            materials,
            grid,
            dt,
            state: EngineState::Uninitialized,
            step: 0,
            real,
            imag,
            baked: None,
            source: None,
            bloch: None,
            incident: None,
            sensors: Vec::new(),
            completion: None,
            converged_at: None,
        })
    }

    /// Bake coefficients and build the absorber and the source
    ///
    /// On error nothing is committed and the engine stays uninitialized.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state != EngineState::Uninitialized {
            return Ok(());
        }
        let config = &self.config;
        let omega_ref = config.spectrum.reference_omega();
        let table = MaterialTable::bake(self.model.as_ref(), omega_ref, self.dt);
        let cpml = Cpml::new(
            &self.grid,
            config.boundaries.thickness,
            &config.boundaries.profile,
            self.dt,
        )?;

        let mut grid = self.grid.clone();
        cpml.apply_kappa(&mut grid);

        let wavelengths = config.spectrum.wavelengths();
        let (source, incident, bloch) = match &config.incidence {
            Some(inc) => {
                let waveform = inc.pulse.build(config.spectrum.reference_wavelength());
                let source =
                    PlaneWaveSource::new(&grid, &table, &self.materials, inc, waveform, self.dt);
                let incident = RunningDft::new("incident", &wavelengths, 1, 3, 1)?;
                let bloch = self.imag.as_ref().map(|_| {
                    let u = source.bloch_axis();
                    BlochAdapter::new(u, source.k_u(), grid.period(u))
                });
                (Some(source), Some(incident), bloch)
            }
            None => (None, None, None),
        };

        let completion = match (&self.completion, &config.completion) {
            (None, Some(done)) => {
                let region = self.interior_region(done.lo, done.hi);
                let detector = CompletionDetector::new(
                    region,
                    &wavelengths,
                    done.tracked_points,
                    done.tolerance,
                    done.cadence,
                    config.max_steps,
                    config.sensor_threads,
                )?;
                detector.validate(&grid)?;
                Some(detector)
            }
            _ => None,
        };

        let cells = grid.cells();
        self.real.memory = cpml.memory(cells);
        if let Some(imag) = self.imag.as_mut() {
            imag.memory = cpml.memory(cells);
        }
        self.grid = grid;
        if completion.is_some() {
            self.completion = completion;
        }
        self.source = source;
        self.incident = incident;
        self.bloch = bloch;

        info!(
            cells = ?cells,
            dt = self.dt,
            omega_ref,
            absorbing_faces = cpml.faces().count(),
            cpml_memory = self.real.memory.len(),
            twins = self.imag.is_some(),
            bloch_phase = self.bloch.as_ref().map(|b| b.phase()).unwrap_or(0.0),
            "simulation ready"
        );
        self.baked = Some(Baked { table, cpml });
        self.state = EngineState::Ready;
        Ok(())
    }

    /// Grid without the CPML slabs, narrowed by optional bounds
    fn interior_region(&self, lo: Option<[usize; 3]>, hi: Option<[usize; 3]>) -> SensorRegion {
        let cells = self.grid.cells();
        let b = &self.config.boundaries;
        let mut region = SensorRegion::all(cells);
        for axis in Axis::ALL {
            let a = axis.index();
            region.lo[a] = b.low(axis);
            region.hi[a] = cells[a] - b.high(axis);
        }
        if let Some(lo) = lo {
            region.lo = lo;
        }
        if let Some(hi) = hi {
            region.hi = hi;
        }
        region
    }

    /// Attach a sensor after checking it fits the grid
    pub fn attach_sensor(&mut self, sensor: Box<dyn Sensor>) -> Result<()> {
        sensor.validate(&self.grid)?;
        debug!(sensor = sensor.name(), cells = sensor.region().len(), "sensor attached");
        self.sensors.push(sensor);
        Ok(())
    }

    /// Replace the completion detector
    pub fn set_completion(&mut self, detector: CompletionDetector) -> Result<()> {
        detector.validate(&self.grid)?;
        self.completion = Some(detector);
        Ok(())
    }

    /// Advance both half steps and feed the sensors
    ///
    /// A finished run is left untouched.
    pub fn step(&mut self) -> Result<()> {
        let Some(Baked { table, cpml }) = self.baked.as_ref() else {
            return Err(FdtdError::NotReady {
                state: self.state.to_string(),
            });
        };
        if self.state.is_finished() {
            return Ok(());
        }
        let grid = &self.grid;
        let dt = self.dt;
        let t_e = (self.step as f64 + 1.0) * dt;
        let t_h = (self.step as f64 + 1.5) * dt;
        let real = &mut self.real;
        let mut imag = self.imag.as_mut();

        real.fields.fill_periodic_ghosts_h();
        if let Some(im) = imag.as_deref_mut() {
            im.fields.fill_periodic_ghosts_h();
            if let Some(bloch) = &self.bloch {
                bloch.exchange_h(&mut real.fields, &mut im.fields);
            }
        }

        maxwell::update_e(&mut real.fields, grid, table);
        if let Some(im) = imag.as_deref_mut() {
            maxwell::update_e(&mut im.fields, grid, table);
        }
        if let Some(source) = self.source.as_mut() {
            source.inject_e(&mut real.fields, grid, table, Part::Real);
            if let Some(im) = imag.as_deref_mut() {
                source.inject_e(&mut im.fields, grid, table, Part::Imag);
            }
            source.advance_e(t_e);
            if let Some(incident) = self.incident.as_mut() {
                let e_inc = source.incident_e();
                incident.accumulate(&[t_e; 3], dt, |_, c| e_inc[c]);
            }
        }
        cpml.correct_e(&mut real.fields, grid, table, &mut real.memory);
        if let Some(im) = imag.as_deref_mut() {
            cpml.correct_e(&mut im.fields, grid, table, &mut im.memory);
        }

        real.fields.fill_periodic_ghosts_e();
        if let Some(im) = imag.as_deref_mut() {
            im.fields.fill_periodic_ghosts_e();
            if let Some(bloch) = &self.bloch {
                bloch.exchange_e(&mut real.fields, &mut im.fields);
            }
        }

        maxwell::update_h(&mut real.fields, grid, dt);
        if let Some(im) = imag.as_deref_mut() {
            maxwell::update_h(&mut im.fields, grid, dt);
        }
        if let Some(source) = self.source.as_mut() {
            source.inject_h(&mut real.fields, grid, dt, Part::Real);
            if let Some(im) = imag.as_deref_mut() {
                source.inject_h(&mut im.fields, grid, dt, Part::Imag);
            }
            source.advance_h(t_h);
        }
        cpml.correct_h(&mut real.fields, grid, dt, &mut real.memory);
        if let Some(im) = imag.as_deref_mut() {
            cpml.correct_h(&mut im.fields, grid, dt, &mut im.memory);
        }

        let view = StepView {
            step: self.step,
            dt,
            e_time: t_e,
            h_time: t_h,
            grid,
            real: &self.real.fields,
            imag: self.imag.as_ref().map(|s| &s.fields),
        };
        for sensor in self.sensors.iter_mut() {
            sensor.accumulate(&view);
        }
        if let Some(done) = self.completion.as_mut() {
            done.accumulate(&view);
        }

        self.step += 1;
        self.state = EngineState::Running;
        if self.completion.as_ref().is_some_and(|d| d.is_converged()) {
            self.state = EngineState::Converged;
            self.converged_at.get_or_insert(self.step);
        } else if self.step >= self.config.max_steps {
            self.state = EngineState::StepLimitReached;
        }
        Ok(())
    }

    /// Step until converged or until the step limit
    pub fn run(&mut self) -> Result<RunSummary> {
        if self.state == EngineState::Uninitialized {
            return Err(FdtdError::NotReady {
                state: self.state.to_string(),
            });
        }
        while !self.state.is_finished() {
            self.step()?;
            if let Some(done) = &self.completion {
                if self.step % done.cadence() == 0 {
                    debug!(
                        step = self.step,
                        remaining = done.time_remaining(),
                        "progress"
                    );
                }
            }
        }
        let summary = RunSummary {
            state: self.state,
            steps: self.step,
            converged_at: self.converged_at,
        };
        info!(state = %summary.state, steps = summary.steps, "run finished");
        Ok(summary)
    }

    /// Finish every sensor and write the configured outputs
    pub fn finish(&mut self) -> Result<Vec<SensorReport>> {
        if self.state == EngineState::Uninitialized {
            return Err(FdtdError::NotReady {
                state: self.state.to_string(),
            });
        }
        let prefix = self.config.output_prefix.as_deref();
        if let Some(dir) = prefix.and_then(Path::parent) {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| FdtdError::io(dir, e))?;
            }
        }

        let incidence = self.config.incidence.as_ref();
        let ctx = FinishContext {
            grid: &self.grid,
            model: self.model.as_ref(),
            materials: &self.materials,
            incident: self.incident.as_ref(),
            k_u: self.source.as_ref().map(|s| s.k_u()).unwrap_or(0.0),
            n_bg: self.source.as_ref().map(|s| s.n_bg()).unwrap_or(1.0),
            propagation_axis: incidence.map(|i| i.axis.index()).unwrap_or(2),
            bloch_axis: incidence.map(|i| i.bloch_axis().index()).unwrap_or(0),
            steps: self.step,
            output_prefix: prefix,
        };

        let mut reports = Vec::with_capacity(self.sensors.len() + 1);
        for sensor in self.sensors.iter_mut() {
            reports.push(sensor.finish(&ctx)?);
        }
        if let Some(done) = self.completion.as_mut() {
            reports.push(done.finish(&ctx)?);
        }
        Ok(reports)
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Time of the electric field
    pub fn time(&self) -> f64 {
        self.step as f64 * self.dt
    }

    pub fn steps(&self) -> usize {
        self.step
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridGeometry {
        &self.grid
    }

    pub fn table(&self) -> Option<&MaterialTable> {
        self.baked.as_ref().map(|b| &b.table)
    }

    pub fn source(&self) -> Option<&PlaneWaveSource> {
        self.source.as_ref()
    }

    pub fn incident(&self) -> Option<&RunningDft> {
        self.incident.as_ref()
    }

    pub fn completion(&self) -> Option<&CompletionDetector> {
        self.completion.as_ref()
    }

    pub fn fields(&self) -> &FieldState {
        &self.real.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldState {
        &mut self.real.fields
    }

    pub fn imag_fields(&self) -> Option<&FieldState> {
        self.imag.as_ref().map(|s| &s.fields)
    }

    /// Field energy summed over both twins
    pub fn energy(&self) -> f64 {
        let Some(baked) = &self.baked else {
            return 0.0;
        };
        let real = self.real.fields.energy(&self.grid, &baked.table);
        let imag = self
            .imag
            .as_ref()
            .map(|s| s.fields.energy(&self.grid, &baked.table))
            .unwrap_or(0.0);
        real + imag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundaryConfig, CompletionConfig, GridConfig, IncidenceConfig};
    use crate::domain::material::MaterialLibrary;

    fn vacuum_config() -> SimulationConfig {
        SimulationConfig {
            grid: GridConfig {
                cells: [1, 1, 60],
                spacing: [5.0; 3],
                periodic: [true, true, false],
            },
            boundaries: BoundaryConfig {
                thickness: [0, 0, 0, 0, 10, 10],
                ..Default::default()
            },
            max_steps: 300,
            sensor_threads: 1,
            ..Default::default()
        }
    }

    fn build(config: SimulationConfig) -> Simulation {
        let cells = config.grid.cells;
        Simulation::new(
            config,
            Arc::new(MaterialLibrary::from_indices(&[1.0])),
            MaterialVolume::uniform(cells, 0),
        )
        .unwrap()
    }

    #[test]
    fn test_state_machine() {
        let mut sim = build(vacuum_config());
        assert_eq!(sim.state(), EngineState::Uninitialized);
        assert!(matches!(sim.step(), Err(FdtdError::NotReady { .. })));
        assert!(sim.run().is_err());

        sim.finalize().unwrap();
        assert_eq!(sim.state(), EngineState::Ready);
        sim.step().unwrap();
        assert_eq!(sim.state(), EngineState::Running);

        let summary = sim.run().unwrap();
        assert_eq!(summary.state, EngineState::StepLimitReached);
        assert_eq!(summary.steps, 300);
        assert_eq!(summary.converged_at, None);
        assert!((sim.time() - 300.0 * sim.dt()).abs() < 1e-9);

        // a finished run stays finished
        let energy = sim.energy();
        sim.step().unwrap();
        assert_eq!(sim.state(), EngineState::StepLimitReached);
        assert_eq!(sim.steps(), 300);
        assert_eq!(sim.energy(), energy);
        assert_eq!(sim.run().unwrap().steps, 300);
    }

    #[test]
    fn test_completion_region_is_checked() {
        let mut config = vacuum_config();
        config.completion = Some(CompletionConfig {
            hi: Some([1, 1, 500]),
            ..Default::default()
        });
        let mut sim = build(config);
        let err = sim.finalize().unwrap_err();
        assert!(matches!(err, FdtdError::InvalidSensor { .. }));
        assert_eq!(sim.state(), EngineState::Uninitialized);
        assert!(sim.completion().is_none());
    }

    #[test]
    fn test_normal_incidence_uses_one_grid() {
        let mut sim = build(vacuum_config());
        sim.finalize().unwrap();
        assert!(sim.imag_fields().is_none());
        sim.run().unwrap();
        assert!(sim.energy() > 0.0);
    }

    #[test]
    fn test_oblique_incidence_uses_twins() {
        let mut config = vacuum_config();
        config.grid.cells = [4, 1, 60];
        config.incidence = Some(IncidenceConfig {
            angle: 0.3,
            ..Default::default()
        });
        let mut sim = build(config);
        sim.finalize().unwrap();
        assert!(sim.imag_fields().is_some());
        sim.run().unwrap();
        assert!(sim.imag_fields().unwrap().e[1].max_abs() > 0.0);
    }

    #[test]
    fn test_material_count_is_checked() {
        let config = vacuum_config();
        let cells = config.grid.cells;
        let err = Simulation::new(
            config,
            Arc::new(MaterialLibrary::from_indices(&[1.0])),
            MaterialVolume::uniform(cells, 3),
        )
        .unwrap_err();
        assert!(matches!(err, FdtdError::MaterialIndexOutOfRange { index: 3, .. }));
    }
}
