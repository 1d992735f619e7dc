//! nanofdtd - a time-domain electromagnetic solver for periodic nanostructures
//!
//! The crate integrates Maxwell's curl equations on a staggered Yee grid in
//! normalized units (`c = ε0 = μ0 = 1`). Open boundaries use a convolutional
//! PML, oblique plane waves use a pair of real grids coupled through a Bloch
//! phase, and frequency-domain results come from running-DFT sensors.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod io;
pub mod parallel_utils;
pub mod sensors;
pub mod utilities;

// Re-export commonly used types
pub use config::SimulationConfig;
pub use domain::simulation::{EngineState, RunSummary, Simulation};
pub use engine::array::Complex64;
pub use error::{FdtdError, Result};

pub mod prelude {
    //! Common imports for using the nanofdtd library
    pub use crate::config::{
        load_config, parse_config, BoundaryConfig, CompletionConfig, GridConfig, IncidenceConfig,
        Polarization, SimulationConfig, SpectrumConfig,
    };
    pub use crate::domain::cpml::CpmlProfile;
    pub use crate::domain::grid::{Axis, Face, FieldKind, GridGeometry, Side};
    pub use crate::domain::material::{
        Dispersion, MaterialLibrary, MaterialModel, MaterialVolume,
    };
    pub use crate::domain::simulation::{EngineState, RunSummary, Simulation};
    pub use crate::engine::array::Complex64;
    pub use crate::error::{FdtdError, Result};
    pub use crate::io::{FieldBlock, FieldMap};
    pub use crate::sensors::field::FieldSensorOptions;
    pub use crate::sensors::{
        CompletionDetector, FieldSensor, Sensor, SensorRegion, SensorReport, Spectrum,
        SpectrumKind, SpectrumSensor,
    };
    pub use crate::utilities::sources::PulseConfig;
}
