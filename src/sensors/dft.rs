//! Running discrete Fourier transform over many cells
//!
//! For every cell, wavelength and component the buffer accumulates
//! `X = Σ F(t)·e^{iωt}·dt`. A signal `A·cos(ωt + φ)` observed over a whole
//! number of periods `T` gives `2X/T = A·e^{−iφ}`.
//!
//! The buffer is cell-major (`cell·(W·C) + w·C + c`) so each worker owns a
//! contiguous run of cells.

use num_complex::Complex64;
use num_traits::Zero;

use crate::error::Result;
use crate::parallel_utils::WorkerGroup;
use crate::utilities::angular_frequency;

#[derive(Debug)]
pub struct RunningDft {
    wavelengths: Vec<f64>,
    omegas: Vec<f64>,
    components: usize,
    cells: usize,
    data: Vec<Complex64>,
    kernel: Vec<Complex64>,
    samples: usize,
    elapsed: f64,
    workers: WorkerGroup,
}

impl RunningDft {
    pub fn new(
        name: &str,
        wavelengths: &[f64],
        cells: usize,
        components: usize,
        threads: usize,
    ) -> Result<Self> {
        let record = wavelengths.len() * components;
        Ok(Self {
            wavelengths: wavelengths.to_vec(),
            omegas: wavelengths.iter().map(|&l| angular_frequency(l)).collect(),
            components,
            cells,
            data: vec![Complex64::zero(); cells * record],
            kernel: vec![Complex64::zero(); record],
            samples: 0,
            elapsed: 0.0,
            workers: WorkerGroup::new(name, threads)?,
        })
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn omegas(&self) -> &[f64] {
        &self.omegas
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Total observation time `Σ dt`
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    fn record(&self) -> usize {
        self.omegas.len() * self.components
    }

    /// Add one sample per cell and component.
    ///
    /// `times[c]` is the time at which component `c` was sampled;
    /// `sample(cell, c)` returns the value.
    pub fn accumulate<F>(&mut self, times: &[f64], dt: f64, sample: F)
    where
        F: Fn(usize, usize) -> Complex64 + Sync,
    {
        let comps = self.components;
        for (w, &omega) in self.omegas.iter().enumerate() {
            for c in 0..comps {
                self.kernel[w * comps + c] = Complex64::from_polar(dt, omega * times[c]);
            }
        }

        let record = self.record();
        let kernel = &self.kernel;
        let waves = self.omegas.len();
        let chunk = self.workers.chunk_len(self.cells, record);
        let cells_per_chunk = chunk / record.max(1);
        let sample = &sample;

        self.workers.for_each_chunk(&mut self.data, chunk, |chunk_index, block| {
            let first = chunk_index * cells_per_chunk;
            for (offset, cell_data) in block.chunks_mut(record).enumerate() {
                let cell = first + offset;
                for c in 0..comps {
                    let value = sample(cell, c);
                    if value.is_zero() {
                        continue;
                    }
                    for w in 0..waves {
                        cell_data[w * comps + c] += value * kernel[w * comps + c];
                    }
                }
            }
        });

        self.samples += 1;
        self.elapsed += dt;
    }

    /// Raw transform `X`
    #[inline]
    pub fn value(&self, cell: usize, w: usize, c: usize) -> Complex64 {
        self.data[cell * self.record() + w * self.components + c]
    }

    /// Steady-state phasor `2X/T`
    pub fn phasor(&self, cell: usize, w: usize, c: usize) -> Complex64 {
        if self.elapsed == 0.0 {
            return Complex64::zero();
        }
        self.value(cell, w, c) * (2.0 / self.elapsed)
    }

    /// `Σ |X|²` over all cells and components at wavelength `w`
    pub fn band_energy(&self, w: usize) -> f64 {
        let record = self.record();
        let comps = self.components;
        self.data
            .chunks(record)
            .map(|cell| cell[w * comps..(w + 1) * comps].iter().map(|z| z.norm_sqr()).sum::<f64>())
            .sum()
    }

    /// `Σ |X|²` over everything
    pub fn total_energy(&self) -> f64 {
        self.workers.norm_squared(&self.data)
    }

    pub fn reset(&mut self) {
        self.data.fill(Complex64::zero());
        self.samples = 0;
        self.elapsed = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_recovers_amplitude_and_phase() {
        let wavelength = 100.0;
        let omega = 2.0 * PI / wavelength;
        let per_period = 40;
        let dt = wavelength / per_period as f64;
        let (amp, phi) = (1.7, 0.6);

        let mut dft = RunningDft::new("dft", &[wavelength], 3, 1, 2).unwrap();
        for n in 0..per_period * 5 {
            let t = n as f64 * dt;
            dft.accumulate(&[t], dt, |cell, _| {
                Complex64::new((cell + 1) as f64 * amp * (omega * t + phi).cos(), 0.0)
            });
        }

        for cell in 0..3 {
            let p = dft.phasor(cell, 0, 0);
            assert_abs_diff_eq!(p.norm(), (cell + 1) as f64 * amp, epsilon = 1e-9);
            assert_abs_diff_eq!(-p.arg(), phi, epsilon = 1e-9);
        }
        assert_eq!(dft.samples(), 200);
    }

    #[test]
    fn test_complex_samples_are_linear() {
        let mut a = RunningDft::new("a", &[50.0, 80.0], 2, 2, 1).unwrap();
        let mut b = RunningDft::new("b", &[50.0, 80.0], 2, 2, 3).unwrap();
        for n in 0..37 {
            let t = n as f64 * 1.3;
            a.accumulate(&[t, t + 0.65], 1.3, |cell, c| Complex64::new((t + cell as f64).sin(), c as f64));
            b.accumulate(&[t, t + 0.65], 1.3, |cell, c| Complex64::new((t + cell as f64).sin(), c as f64));
        }
        for cell in 0..2 {
            for w in 0..2 {
                for c in 0..2 {
                    assert_abs_diff_eq!((a.value(cell, w, c) - b.value(cell, w, c)).norm(), 0.0, epsilon = 1e-12);
                }
            }
        }
        assert!(a.band_energy(0) > 0.0);
        assert_abs_diff_eq!(a.band_energy(0) + a.band_energy(1), a.total_energy(), epsilon = 1e-9);
    }
}
