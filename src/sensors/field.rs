//! Field phasor sensor over a volume or a plane

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use num_complex::Complex64;
use tracing::info;

use crate::domain::grid::{Axis, FieldKind};
use crate::error::{FdtdError, Result};
use crate::io::{self, CellPhasors, FieldBlock, FieldMap};
use crate::sensors::{FinishContext, RunningDft, Sensor, SensorRegion, SensorReport, StepView};

/// Optional behaviour of a [`FieldSensor`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldSensorOptions {
    /// Integrate `F·Δ` along this axis before transforming
    pub cumulative: Option<Axis>,
    /// Divide by the incident amplitude instead of reporting `2X/T`
    pub normalize: bool,
    /// Also write `|E|` maps next to plane outputs
    pub magnitude: bool,
    /// Also write material outline maps next to plane outputs
    pub wireframe: bool,
}

/// Phasors produced by a field sensor, one entry per wavelength
#[derive(Debug, Clone, Default)]
pub struct FieldReport {
    pub name: String,
    pub wavelengths: Vec<f64>,
    pub blocks: Vec<FieldBlock>,
    pub maps: Vec<FieldMap>,
    pub files: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct FieldSensor {
    name: String,
    region: SensorRegion,
    output: SensorRegion,
    options: FieldSensorOptions,
    dft: RunningDft,
}

impl FieldSensor {
    pub fn new(name: &str, region: SensorRegion, wavelengths: &[f64], threads: usize) -> Result<Self> {
        Self::with_options(name, region, wavelengths, threads, FieldSensorOptions::default())
    }

    pub fn with_options(
        name: &str,
        region: SensorRegion,
        wavelengths: &[f64],
        threads: usize,
        options: FieldSensorOptions,
    ) -> Result<Self> {
        if wavelengths.is_empty() {
            return Err(FdtdError::sensor(name, "no wavelengths"));
        }
        let output = match options.cumulative {
            Some(axis) => region.collapse(axis),
            None => region,
        };
        Ok(Self {
            name: name.to_string(),
            region,
            output,
            options,
            dft: RunningDft::new(name, wavelengths, output.len(), 6, threads)?,
        })
    }

    /// Region the phasors are reported on
    pub fn output_region(&self) -> &SensorRegion {
        &self.output
    }

    fn cell_phasors(&self, cell: usize, w: usize, scale: Option<f64>) -> CellPhasors {
        let mut out = [Complex64::default(); 6];
        for (c, z) in out.iter_mut().enumerate() {
            *z = match scale {
                Some(s) => self.dft.value(cell, w, c) * s,
                None => self.dft.phasor(cell, w, c),
            };
        }
        out
    }

    fn file_path(prefix: &Path, name: &str, w: usize, ext: &str) -> PathBuf {
        let mut s: OsString = prefix.as_os_str().to_owned();
        s.push(format!("_{name}_{w:03}.{ext}"));
        PathBuf::from(s)
    }
}

impl Sensor for FieldSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn region(&self) -> &SensorRegion {
        &self.region
    }

    fn wavelengths(&self) -> &[f64] {
        self.dft.wavelengths()
    }

    fn accumulate(&mut self, view: &StepView<'_>) {
        let output = self.output;
        let region = self.region;
        let cumulative = self.options.cumulative.map(|a| a.index());
        let spacing = view.grid.spacing();

        self.dft.accumulate(&view.six_times(), view.dt, |cell, comp| {
            let kind = if comp < 3 {
                FieldKind::Electric
            } else {
                FieldKind::Magnetic
            };
            let idx = output.index_of(cell);
            match cumulative {
                None => view.sample(kind, comp % 3, idx),
                Some(a) => {
                    let mut sum = Complex64::default();
                    let mut at = idx;
                    for i in region.lo[a]..region.hi[a] {
                        at[a] = i;
                        sum += view.sample(kind, comp % 3, at);
                    }
                    sum * spacing[a]
                }
            }
        });
    }

    fn finish(&mut self, ctx: &FinishContext<'_>) -> Result<SensorReport> {
        let wavelengths = self.dft.wavelengths().to_vec();
        let incident_scale = |w: usize| -> Result<Option<f64>> {
            if !self.options.normalize {
                return Ok(None);
            }
            let inc = ctx
                .incident
                .ok_or_else(|| FdtdError::sensor(&self.name, "normalization needs a plane-wave source"))?;
            if inc.wavelengths() != wavelengths.as_slice() {
                return Err(FdtdError::sensor(&self.name, "wavelengths differ from the run spectrum"));
            }
            let amp = (0..3).map(|c| inc.value(0, w, c).norm_sqr()).sum::<f64>().sqrt();
            Ok(Some(if amp > 0.0 { 1.0 / amp } else { 0.0 }))
        };

        let materials: Vec<u32> = (0..self.output.len())
            .map(|n| ctx.materials.get(self.output.index_of(n)))
            .collect();
        let spacing = ctx.grid.spacing();
        let ext = self.output.extents();

        let mut report = FieldReport {
            name: self.name.clone(),
            wavelengths: wavelengths.clone(),
            ..Default::default()
        };

        for (w, &wavelength) in wavelengths.iter().enumerate() {
            let scale = incident_scale(w)?;
            let values: Vec<CellPhasors> = (0..self.output.len())
                .map(|n| self.cell_phasors(n, w, scale))
                .collect();

            match self.output.normal {
                Some(axis) => {
                    let a = axis.index();
                    let (p0, p1) = ((a + 1) % 3, (a + 2) % 3);
                    let (p0, p1) = (p0.min(p1), p0.max(p1));
                    let map = FieldMap {
                        wavelength,
                        axis,
                        origin: [self.output.lo[p0] as i32, self.output.lo[p1] as i32],
                        extents: [ext[p0] as i32, ext[p1] as i32],
                        spacing: [spacing[p0], spacing[p1]],
                        values,
                        materials: materials.clone(),
                    };
                    if let Some(prefix) = ctx.output_prefix {
                        let path = Self::file_path(prefix, &self.name, w, "map");
                        io::write_map(&path, &map)?;
                        report.files.push(path);
                        if self.options.magnitude {
                            let path = Self::file_path(prefix, &self.name, w, "mag");
                            io::write_scalar_map(&path, &map.magnitude())?;
                            report.files.push(path);
                        }
                        if self.options.wireframe {
                            let path = Self::file_path(prefix, &self.name, w, "wire");
                            io::write_scalar_map(&path, &map.wireframe().mapv(f64::from))?;
                            report.files.push(path);
                        }
                    }
                    report.maps.push(map);
                }
                None => {
                    let block = FieldBlock {
                        wavelength,
                        origin: self.output.lo.map(|v| v as i32),
                        extents: ext.map(|v| v as i32),
                        spacing,
                        values,
                        materials: materials.clone(),
                    };
                    if let Some(prefix) = ctx.output_prefix {
                        let path = Self::file_path(prefix, &self.name, w, "fld");
                        io::write_block(&path, &block)?;
                        report.files.push(path);
                    }
                    report.blocks.push(block);
                }
            }
        }

        info!(
            sensor = %self.name,
            wavelengths = wavelengths.len(),
            files = report.files.len(),
            "field sensor finished"
        );
        Ok(SensorReport::Fields(report))
    }
}
