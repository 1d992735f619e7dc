//! Early termination from the spectral energy in a region
//!
//! Every `cadence` steps the detector compares the transformed energy
//! `Σ|Ẽ|²` at a few tracked wavelengths with the previous evaluation. The
//! run is complete once every relative change is below the tolerance.

use tracing::debug;

use crate::domain::grid::FieldKind;
use crate::error::{FdtdError, Result};
use crate::sensors::{FinishContext, RunningDft, Sensor, SensorRegion, SensorReport, StepView};
use crate::utilities::spread_indices;

/// Progress of the detector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionState {
    /// Energies from the latest evaluation, one per tracked wavelength
    pub last: Vec<f64>,
    /// Steps observed
    pub step: usize,
    pub evaluations: usize,
    /// Relative changes from the latest evaluation
    pub last_change: Vec<f64>,
    pub converged: bool,
    /// Extrapolated step count at which the run completes
    pub estimate_total: usize,
}

#[derive(Debug)]
pub struct CompletionDetector {
    region: SensorRegion,
    tolerance: f64,
    cadence: usize,
    max_steps: usize,
    dft: RunningDft,
    state: CompletionState,
    previous_worst: Option<f64>,
}

/// `|new − old| / max(new, old)`, with no signal counted as a full change
fn relative_change(new: f64, old: f64) -> f64 {
    let scale = new.max(old);
    if scale <= 0.0 {
        return 1.0;
    }
    ((new - old).abs() / scale).min(1.0)
}

impl CompletionDetector {
    /// Track `tracked_points` wavelengths spread over `band`
    pub fn new(
        region: SensorRegion,
        band: &[f64],
        tracked_points: usize,
        tolerance: f64,
        cadence: usize,
        max_steps: usize,
        threads: usize,
    ) -> Result<Self> {
        if cadence == 0 {
            return Err(FdtdError::Config("completion cadence must be positive".into()));
        }
        if !(tolerance >= 0.0) {
            return Err(FdtdError::Config(format!("completion tolerance {tolerance} is invalid")));
        }
        let tracked: Vec<f64> = spread_indices(band.len(), tracked_points.max(1))
            .into_iter()
            .map(|i| band[i])
            .collect();
        if tracked.is_empty() {
            return Err(FdtdError::sensor("completion", "no wavelengths to track"));
        }
        Ok(Self {
            region,
            tolerance,
            cadence,
            max_steps,
            dft: RunningDft::new("completion", &tracked, region.len(), 3, threads)?,
            state: CompletionState {
                estimate_total: max_steps,
                ..Default::default()
            },
            previous_worst: None,
        })
    }

    pub fn state(&self) -> &CompletionState {
        &self.state
    }

    pub fn cadence(&self) -> usize {
        self.cadence
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn is_converged(&self) -> bool {
        self.state.converged
    }

    pub fn estimated_total_steps(&self) -> usize {
        self.state.estimate_total
    }

    /// Steps left until the estimated completion
    pub fn time_remaining(&self) -> usize {
        self.state.estimate_total.saturating_sub(self.state.step)
    }

    fn evaluate(&mut self) {
        let energies: Vec<f64> = (0..self.dft.wavelengths().len())
            .map(|w| self.dft.band_energy(w))
            .collect();
        let silent = energies.iter().all(|&e| e == 0.0);

        let changes: Vec<f64> = if self.state.last.len() == energies.len() {
            energies
                .iter()
                .zip(&self.state.last)
                .map(|(&new, &old)| relative_change(new, old))
                .collect()
        } else {
            vec![1.0; energies.len()]
        };

        let worst = changes.iter().cloned().fold(0.0, f64::max);
        self.state.converged = !silent && changes.iter().all(|&c| c < self.tolerance);
        self.state.estimate_total = if self.state.converged {
            self.state.step
        } else {
            self.extrapolate(worst)
        };
        self.state.evaluations += 1;
        self.state.last = energies;
        self.state.last_change = changes;
        self.previous_worst = (!silent).then_some(worst);

        debug!(
            step = self.state.step,
            worst_change = worst,
            converged = self.state.converged,
            estimate = self.state.estimate_total,
            "completion evaluated"
        );
    }

    /// Step at which the change falls below tolerance if it keeps decaying
    /// geometrically
    fn extrapolate(&self, worst: f64) -> usize {
        let Some(previous) = self.previous_worst else {
            return self.max_steps;
        };
        if self.tolerance <= 0.0 || worst <= 0.0 || worst >= previous {
            return self.max_steps;
        }
        let ratio = worst / previous;
        let evaluations = ((self.tolerance / worst).ln() / ratio.ln()).ceil().max(1.0);
        let total = self.state.step as f64 + evaluations * self.cadence as f64;
        if total.is_finite() {
            (total as usize).min(self.max_steps)
        } else {
            self.max_steps
        }
    }
}

impl Sensor for CompletionDetector {
    fn name(&self) -> &str {
        "completion"
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
        self.state.step = self.state.step.max(view.step + 1);
        if self.state.step % self.cadence == 0 {
            self.evaluate();
        }
    }

    fn finish(&mut self, _ctx: &FinishContext<'_>) -> Result<SensorReport> {
        Ok(SensorReport::Completion(self.state.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn detector(tolerance: f64) -> CompletionDetector {
        CompletionDetector::new(
            SensorRegion::volume([0; 3], [1, 1, 1]),
            &[400.0, 500.0, 600.0],
            2,
            tolerance,
            10,
            1000,
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_relative_change() {
        assert_abs_diff_eq!(relative_change(2.0, 1.0), 0.5);
        assert_abs_diff_eq!(relative_change(1.0, 2.0), 0.5);
        assert_eq!(relative_change(0.0, 0.0), 1.0);
        assert_eq!(relative_change(3.0, 0.0), 1.0);
    }

    #[test]
    fn test_tracked_wavelengths() {
        let d = detector(1e-3);
        assert_eq!(d.wavelengths(), &[400.0, 600.0]);
        assert_eq!(d.estimated_total_steps(), 1000);
        assert_eq!(d.time_remaining(), 1000);
    }

    #[test]
    fn test_silence_never_converges() {
        let mut d = detector(f64::MAX);
        d.state.step = 10;
        d.evaluate();
        assert!(!d.is_converged());
        assert_eq!(d.state().last_change, vec![1.0, 1.0]);
    }

    #[test]
    fn test_extrapolation_is_clamped() {
        let mut d = detector(2e-6);
        d.state.step = 100;
        d.previous_worst = Some(0.1);
        let estimate = d.extrapolate(0.01);
        // tenfold decay per evaluation reaches 2e-6 after 4 more evaluations
        assert_eq!(estimate, 140);
        assert_eq!(d.extrapolate(0.2), 1000);
    }

    #[test]
    fn test_invalid_settings() {
        let region = SensorRegion::volume([0; 3], [1, 1, 1]);
        assert!(CompletionDetector::new(region, &[500.0], 1, 1e-3, 0, 10, 1).is_err());
        assert!(CompletionDetector::new(region, &[500.0], 1, -1.0, 10, 10, 1).is_err());
        assert!(CompletionDetector::new(region, &[], 1, 1e-3, 10, 10, 1).is_err());
    }
}
