//! Time signals driving the plane-wave source
//!
//! Times and wavelengths share one unit (c = 1), so a period equals the
//! wavelength.

use serde::Deserialize;
use std::f64::consts::PI;

/// Real-valued excitation signal
pub trait Waveform: Send + Sync + std::fmt::Debug {
    fn value(&self, t: f64) -> f64;

    /// Time after which the signal can be treated as finished
    fn duration(&self) -> f64;
}

/// Sine carrier under a Gaussian envelope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianPulse {
    pub omega: f64,
    /// 1/e half width of the envelope
    pub tau: f64,
    /// Envelope peak
    pub delay: f64,
}

impl GaussianPulse {
    /// Pulse centred on `wavelength` with an envelope `width_periods` carrier
    /// periods wide
    pub fn new(wavelength: f64, width_periods: f64) -> Self {
        let tau = width_periods * wavelength;
        Self {
            omega: 2.0 * PI / wavelength,
            tau,
            delay: 4.0 * tau,
        }
    }
}

impl Waveform for GaussianPulse {
    fn value(&self, t: f64) -> f64 {
        let s = t - self.delay;
        (-(s / self.tau).powi(2)).exp() * (self.omega * s).sin()
    }

    fn duration(&self) -> f64 {
        2.0 * self.delay
    }
}

/// Sinusoid switched on with a raised-cosine ramp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuousWave {
    pub omega: f64,
    pub ramp: f64,
}

impl ContinuousWave {
    pub fn new(wavelength: f64, ramp_periods: f64) -> Self {
        Self {
            omega: 2.0 * PI / wavelength,
            ramp: ramp_periods * wavelength,
        }
    }
}

impl Waveform for ContinuousWave {
    fn value(&self, t: f64) -> f64 {
        let envelope = if t <= 0.0 {
            0.0
        } else if t < self.ramp {
            0.5 * (1.0 - (PI * t / self.ramp).cos())
        } else {
            1.0
        };
        envelope * (self.omega * t).sin()
    }

    fn duration(&self) -> f64 {
        f64::INFINITY
    }
}

/// Signal selection in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PulseConfig {
    Gaussian { width_periods: f64 },
    Continuous { ramp_periods: f64 },
}

impl Default for PulseConfig {
    fn default() -> Self {
        PulseConfig::Gaussian { width_periods: 2.0 }
    }
}

impl PulseConfig {
    pub fn build(&self, wavelength: f64) -> Box<dyn Waveform> {
        match *self {
            PulseConfig::Gaussian { width_periods } => {
                Box::new(GaussianPulse::new(wavelength, width_periods))
            }
            PulseConfig::Continuous { ramp_periods } => {
                Box::new(ContinuousWave::new(wavelength, ramp_periods))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gaussian_envelope() {
        let pulse = GaussianPulse::new(500.0, 2.0);
        assert_abs_diff_eq!(pulse.value(pulse.delay), 0.0, epsilon = 1e-12);
        assert!(pulse.value(0.0).abs() < 1e-6);
        assert!(pulse.value(pulse.duration()).abs() < 1e-6);
        let peak = pulse.value(pulse.delay + 125.0);
        assert!(peak > 0.9);
    }

    #[test]
    fn test_continuous_ramp() {
        let cw = ContinuousWave::new(100.0, 2.0);
        assert_eq!(cw.value(-1.0), 0.0);
        assert_abs_diff_eq!(cw.value(225.0), (cw.omega * 225.0).sin(), epsilon = 1e-12);
        assert!(cw.value(25.0).abs() < 0.2);
    }
}
