//! Grid, fields, materials and the time-stepping kernels

pub mod bloch;
pub mod cpml;
pub mod fields;
pub mod grid;
pub mod material;
pub mod maxwell;
pub mod simulation;
pub mod tfsf;

pub use fields::FieldState;
pub use grid::{Axis, Face, FieldKind, GridGeometry, Side};
pub use simulation::{EngineState, RunSummary, Simulation};
