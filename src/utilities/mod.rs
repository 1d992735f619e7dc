//! Spectral helpers shared by sources, sensors and configuration

pub mod sources;

use std::f64::consts::PI;

/// Angular frequency of a vacuum wavelength (c = 1)
pub fn angular_frequency(wavelength: f64) -> f64 {
    2.0 * PI / wavelength
}

/// `points` evenly spaced wavelengths from `min` to `max` inclusive
pub fn wavelength_grid(min: f64, max: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (points - 1) as f64;
            (0..points).map(|i| min + step * i as f64).collect()
        }
    }
}

/// Evenly pick `count` entries of `0..len`, always including both ends
pub fn spread_indices(len: usize, count: usize) -> Vec<usize> {
    if len == 0 || count == 0 {
        return Vec::new();
    }
    if count >= len {
        return (0..len).collect();
    }
    if count == 1 {
        return vec![len / 2];
    }
    let mut picked: Vec<usize> = (0..count)
        .map(|i| ((i * (len - 1)) as f64 / (count - 1) as f64).round() as usize)
        .collect();
    picked.dedup();
    picked
}

/// Power ratio in decibels
pub fn to_db(ratio: f64) -> f64 {
    10.0 * ratio.max(f64::MIN_POSITIVE).log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wavelength_grid() {
        assert_eq!(wavelength_grid(400.0, 600.0, 3), vec![400.0, 500.0, 600.0]);
        assert_eq!(wavelength_grid(500.0, 700.0, 1), vec![500.0]);
        assert!(wavelength_grid(500.0, 700.0, 0).is_empty());
    }

    #[test]
    fn test_spread_indices() {
        assert_eq!(spread_indices(11, 3), vec![0, 5, 10]);
        assert_eq!(spread_indices(4, 8), vec![0, 1, 2, 3]);
        assert_eq!(spread_indices(9, 1), vec![4]);
    }

    #[test]
    fn test_db() {
        assert_relative_eq!(to_db(1e-4), -40.0, epsilon = 1e-12);
        assert_relative_eq!(angular_frequency(2.0 * PI), 1.0);
    }
}
