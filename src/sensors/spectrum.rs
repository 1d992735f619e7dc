//! Reflection and transmission spectra with diffraction-order decomposition
//!
//! The sensor transforms the three E components on a plane normal to the
//! propagation axis. At the end of the run the Bloch phase `e^{i k_u x_u}` is
//! removed and a 2-D FFT over the plane splits the field into orders
//! `(m, n)` with transverse wavevectors
//!
//! ```text
//! k_um = k_u + 2πm/L_u,    k_vn = 2πn/L_v
//! ```
//!
//! An order carries power `n·cosθ·|E|²`. Efficiencies are normalized by the
//! same quantity for the incident wave recorded at the injection plane.

use ndarray::Array2;
use num_complex::Complex64;
use rustfft::FftPlanner;
use std::f64::consts::PI;
use tracing::{info, warn};

use crate::domain::grid::{Axis, FieldKind};
use crate::error::{FdtdError, Result};
use crate::sensors::{FinishContext, RunningDft, Sensor, SensorRegion, SensorReport, StepView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumKind {
    Reflection,
    Transmission,
}

/// Power fraction carried by one propagating order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffractionOrder {
    pub m: i32,
    pub n: i32,
    pub efficiency: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub name: String,
    pub kind: SpectrumKind,
    /// Wavelengths with a propagating incident wave
    pub wavelengths: Vec<f64>,
    /// Total efficiency, summed over orders
    pub values: Vec<f64>,
    pub orders: Vec<Vec<DiffractionOrder>>,
    /// Wavelengths dropped because the incident wave is evanescent there
    pub omitted: Vec<f64>,
}

impl Spectrum {
    /// Efficiency at the wavelength closest to `wavelength`
    pub fn value_at(&self, wavelength: f64) -> Option<f64> {
        self.wavelengths
            .iter()
            .zip(&self.values)
            .min_by(|a, b| (a.0 - wavelength).abs().total_cmp(&(b.0 - wavelength).abs()))
            .map(|(_, &v)| v)
    }

    /// Zeroth-order efficiency at wavelength index `w`
    pub fn specular(&self, w: usize) -> f64 {
        self.orders[w]
            .iter()
            .find(|o| o.m == 0 && o.n == 0)
            .map(|o| o.efficiency)
            .unwrap_or(0.0)
    }
}

#[derive(Debug)]
pub struct SpectrumSensor {
    name: String,
    kind: SpectrumKind,
    region: SensorRegion,
    dft: RunningDft,
}

impl SpectrumSensor {
    /// Plane normal to `axis` at `index`, spanning the whole cross-section
    pub fn new(
        name: &str,
        axis: Axis,
        index: usize,
        cells: [usize; 3],
        wavelengths: &[f64],
        kind: SpectrumKind,
        threads: usize,
    ) -> Result<Self> {
        if wavelengths.is_empty() {
            return Err(FdtdError::sensor(name, "no wavelengths"));
        }
        let region = SensorRegion::plane(axis, index, cells);
        Ok(Self {
            name: name.to_string(),
            kind,
            region,
            dft: RunningDft::new(name, wavelengths, region.len(), 3, threads)?,
        })
    }

    pub fn kind(&self) -> SpectrumKind {
        self.kind
    }

    /// Demodulated field of component `c` at wavelength `w` on the `(u, v)` plane
    fn plane_field(&self, ctx: &FinishContext<'_>, w: usize, c: usize, u: usize, v: usize) -> Array2<Complex64> {
        let ext = self.region.extents();
        let mut out = Array2::<Complex64>::zeros((ext[u], ext[v]));
        let offset = FieldKind::Electric.offset(c, u);
        for n in 0..self.region.len() {
            let idx = self.region.index_of(n);
            let x_u = ctx.grid.position(u, idx[u], offset);
            let demod = Complex64::from_polar(1.0, -ctx.k_u * x_u);
            out[[idx[u] - self.region.lo[u], idx[v] - self.region.lo[v]]] = self.dft.value(n, w, c) * demod;
        }
        out
    }
}

/// Unnormalized forward 2-D transform in place
fn fft_2d(planner: &mut FftPlanner<f64>, data: &mut Array2<Complex64>) {
    let (nu, nv) = data.dim();

    let fft = planner.plan_fft_forward(nv);
    for mut row in data.rows_mut() {
        let mut line: Vec<Complex64> = row.to_vec();
        fft.process(&mut line);
        row.iter_mut().zip(line).for_each(|(d, s)| *d = s);
    }

    let fft = planner.plan_fft_forward(nu);
    for mut col in data.columns_mut() {
        let mut line: Vec<Complex64> = col.to_vec();
        fft.process(&mut line);
        col.iter_mut().zip(line).for_each(|(d, s)| *d = s);
    }
}

/// Signed order of FFT bin `k` out of `n`
fn order_of(k: usize, n: usize) -> i32 {
    if k <= n / 2 {
        k as i32
    } else {
        k as i32 - n as i32
    }
}

impl Sensor for SpectrumSensor {
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
        let region = self.region;
        let t = view.e_time;
        self.dft.accumulate(&[t, t, t], view.dt, |cell, c| {
            view.sample(FieldKind::Electric, c, region.index_of(cell))
        });
    }

    fn finish(&mut self, ctx: &FinishContext<'_>) -> Result<SensorReport> {
        let incident = ctx
            .incident
            .ok_or_else(|| FdtdError::sensor(&self.name, "spectra need a plane-wave source"))?;
        if incident.wavelengths() != self.dft.wavelengths() {
            return Err(FdtdError::sensor(&self.name, "wavelengths differ from the run spectrum"));
        }
        if self.region.normal.map(|a| a.index()) != Some(ctx.propagation_axis) {
            return Err(FdtdError::sensor(&self.name, "plane is not normal to the propagation axis"));
        }

        let u = ctx.bloch_axis;
        let v = 3 - ctx.propagation_axis - u;
        let ext = self.region.extents();
        let (nu, nv) = (ext[u], ext[v]);
        let (period_u, period_v) = (ctx.grid.period(u), ctx.grid.period(v));
        let norm = 1.0 / (nu * nv) as f64;

        let first = self.region.index_of(0);
        let medium = ctx.materials.get(first);

        let mut planner = FftPlanner::new();
        let mut spectrum = Spectrum {
            name: self.name.clone(),
            kind: self.kind,
            wavelengths: Vec::new(),
            values: Vec::new(),
            orders: Vec::new(),
            omitted: Vec::new(),
        };

        for (w, (&wavelength, &omega)) in self.dft.wavelengths().iter().zip(self.dft.omegas()).enumerate() {
            let k_bg = ctx.n_bg * omega;
            if ctx.k_u.abs() >= k_bg {
                spectrum.omitted.push(wavelength);
                continue;
            }
            let cos_inc = (1.0 - (ctx.k_u / k_bg).powi(2)).sqrt();
            let inc_power: f64 = (0..3).map(|c| incident.value(0, w, c).norm_sqr()).sum();

            let n_med = ctx.model.refractive_index(medium, omega).re.max(1.0);
            let k_med = n_med * omega;

            let mut power = Array2::<f64>::zeros((nu, nv));
            for c in 0..3 {
                let mut field = self.plane_field(ctx, w, c, u, v);
                fft_2d(&mut planner, &mut field);
                power.zip_mut_with(&field, |p, z| *p += (*z * norm).norm_sqr());
            }

            let mut orders = Vec::new();
            for ((i, j), &p) in power.indexed_iter() {
                let (m, n) = (order_of(i, nu), order_of(j, nv));
                let k_um = ctx.k_u + 2.0 * PI * m as f64 / period_u;
                let k_vn = 2.0 * PI * n as f64 / period_v;
                let k_t = k_um.hypot(k_vn);
                if k_t >= k_med {
                    continue;
                }
                let cos_mn = (1.0 - (k_t / k_med).powi(2)).sqrt();
                let efficiency = if inc_power > 0.0 {
                    n_med * cos_mn * p / (ctx.n_bg * cos_inc * inc_power)
                } else {
                    0.0
                };
                orders.push(DiffractionOrder { m, n, efficiency });
            }

            spectrum.wavelengths.push(wavelength);
            spectrum.values.push(orders.iter().map(|o| o.efficiency).sum());
            spectrum.orders.push(orders);
        }

        if !spectrum.omitted.is_empty() {
            warn!(
                sensor = %self.name,
                omitted = spectrum.omitted.len(),
                k_u = ctx.k_u,
                "incident wave is evanescent at some wavelengths"
            );
        }
        info!(
            sensor = %self.name,
            kind = ?self.kind,
            points = spectrum.wavelengths.len(),
            "spectrum finished"
        );
        Ok(SensorReport::Spectrum(spectrum))
    }
}
