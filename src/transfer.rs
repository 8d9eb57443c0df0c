//! Closed-form biquad transfer function.
//!
//! This module evaluates `H(z) = A(z^2 - 2cos(theta_z) z + 1) /
//! (z^2 - 2P cos(theta_p) z + P^2)` and derives the physically meaningful
//! read-backs of a coefficient set: pole positions, notch frequency, and
//! the quality factor estimated from the -3 dB bandwidth of the magnitude
//! response. It is diagnostic machinery; the pipeline simulator never
//! consults it.

use crate::coeff::Coefficients;
use crate::error::{Error, Result};
use rustfft::num_complex::Complex;

/// Closed-form transfer function of a biquad section.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transfer {
    a: f64,
    p: f64,
    theta_z: f64,
    theta_p: f64,
    samp_rate: f64,
}

impl Transfer {
    /// Builds the transfer function of a coefficient set.
    ///
    /// The zero angle is recovered from the zero-stage taps through
    /// `B = -2 A cos(theta_z)`. Returns [`Error::InvalidParameter`] if the
    /// taps do not describe a unit-circle zero pair (`A = 0` or
    /// `|B / 2A| > 1`).
    pub fn from_coefficients(coeffs: &Coefficients, samp_rate: f64) -> Result<Transfer> {
        if samp_rate <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "sample rate {samp_rate} must be positive"
            )));
        }
        if coeffs.a() == 0.0 {
            return Err(Error::InvalidParameter(
                "zero-stage gain A is zero; no zero angle to recover".to_string(),
            ));
        }
        let cos_theta_z = -coeffs.b() / (2.0 * coeffs.a());
        if cos_theta_z.abs() > 1.0 {
            return Err(Error::InvalidParameter(format!(
                "taps A = {}, B = {} put the zero off the unit circle",
                coeffs.a(),
                coeffs.b()
            )));
        }
        Ok(Transfer {
            a: coeffs.a(),
            p: coeffs.p(),
            theta_z: cos_theta_z.acos(),
            theta_p: coeffs.theta(),
            samp_rate,
        })
    }

    /// Evaluates `H(z)` at an arbitrary point of the z-plane.
    pub fn eval(&self, z: Complex<f64>) -> Complex<f64> {
        let num = self.a * (z * z - 2.0 * self.theta_z.cos() * z + 1.0);
        let den = z * z - 2.0 * self.p * self.theta_p.cos() * z + self.p * self.p;
        num / den
    }

    /// Evaluates `H(e^{j omega})` at a frequency in Hz.
    pub fn at_frequency(&self, freq: f64) -> Complex<f64> {
        let omega = 2.0 * std::f64::consts::PI * freq / self.samp_rate;
        self.eval(Complex::from_polar(1.0, omega))
    }

    /// Sweeps the magnitude response over `[0, samp_rate / 2)`.
    ///
    /// Returns the frequency grid in Hz and the magnitude in dB at each
    /// point.
    pub fn magnitude_sweep(&self, points: usize) -> (Vec<f64>, Vec<f64>) {
        let frequencies: Vec<f64> = (0..points)
            .map(|k| k as f64 / points as f64 * self.samp_rate / 2.0)
            .collect();
        let magnitude_db = frequencies
            .iter()
            .map(|&f| 20.0 * self.at_frequency(f).norm().log10())
            .collect();
        (frequencies, magnitude_db)
    }

    /// Frequency of the magnitude-response minimum over a sweep of
    /// `points` frequencies.
    pub fn notch_frequency(&self, points: usize) -> f64 {
        let (frequencies, magnitude_db) = self.magnitude_sweep(points);
        let mut min_index = 0;
        for (i, &m) in magnitude_db.iter().enumerate() {
            if m < magnitude_db[min_index] {
                min_index = i;
            }
        }
        frequencies[min_index]
    }

    /// Complex-conjugate pole pair `P e^{+/- j theta_p}`.
    pub fn poles(&self) -> (Complex<f64>, Complex<f64>) {
        let pole = Complex::from_polar(self.p, self.theta_p);
        (pole, pole.conj())
    }

    /// Frequency of the designed zero pair in Hz.
    pub fn zero_frequency(&self) -> f64 {
        self.theta_z / (2.0 * std::f64::consts::PI) * self.samp_rate
    }

    /// Frequency of the pole pair in Hz.
    pub fn pole_frequency(&self) -> f64 {
        self.theta_p / (2.0 * std::f64::consts::PI) * self.samp_rate
    }

    /// Quality factor from the -3 dB bandwidth of the magnitude response.
    ///
    /// Sweeps the response, finds the band where the magnitude sits at
    /// least 3 dB below the passband maximum, and reports
    /// `notch frequency / bandwidth` of that band.
    pub fn quality(&self, points: usize) -> f64 {
        let (frequencies, magnitude_db) = self.magnitude_sweep(points);
        let max_db = magnitude_db.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let cutoff_db = max_db - 3.0;
        let mut f_low = None;
        let mut f_high = None;
        for (i, &m) in magnitude_db.iter().enumerate() {
            if m <= cutoff_db {
                if f_low.is_none() {
                    f_low = Some(frequencies[i]);
                }
                f_high = Some(frequencies[i]);
            }
        }
        match (f_low, f_high) {
            (Some(lo), Some(hi)) if hi > lo => self.zero_frequency() / (hi - lo),
            _ => f64::INFINITY,
        }
    }
}

/// Pole pair and quality factor of a coefficient set.
///
/// Convenience wrapper over [`Transfer`] for diagnostics and testing.
pub fn poles_and_quality(
    coeffs: &Coefficients,
    samp_rate: f64,
) -> Result<(Complex<f64>, Complex<f64>, f64)> {
    let tf = Transfer::from_coefficients(coeffs, samp_rate)?;
    let (p1, p2) = tf.poles();
    Ok((p1, p2, tf.quality(4096)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::design::{design, NotchSpec};

    fn spec() -> NotchSpec {
        NotchSpec {
            samp_rate: 3e9,
            notch_freq: 460e6,
            quality: 5.0,
        }
    }

    #[test]
    fn poles_match_parameters() {
        let coeffs = design(&spec()).unwrap();
        let tf = Transfer::from_coefficients(&coeffs, 3e9).unwrap();
        let (p1, p2) = tf.poles();
        assert!((p1.norm() - coeffs.p()).abs() < 1e-12);
        assert!((p1.arg() - coeffs.theta()).abs() < 1e-12);
        assert_eq!(p2, p1.conj());
    }

    #[test]
    fn notch_depth() {
        let coeffs = design(&spec()).unwrap();
        let tf = Transfer::from_coefficients(&coeffs, 3e9).unwrap();
        // deep attenuation at the notch, near unity far away
        assert!(tf.at_frequency(460e6).norm() < 0.05);
        assert!((tf.at_frequency(100e6).norm() - 1.0).abs() < 0.2);
        assert!((tf.at_frequency(1.3e9).norm() - 1.0).abs() < 0.2);
    }

    #[test]
    fn quality_estimate_tracks_design() {
        let coeffs = design(&spec()).unwrap();
        let tf = Transfer::from_coefficients(&coeffs, 3e9).unwrap();
        let q = tf.quality(8192);
        assert!(q > 3.5 && q < 6.5, "estimated quality {q}");
    }

    #[test]
    fn zero_angle_recovery() {
        // A = 1, B = 0 puts the zero angle at pi/2
        let coeffs = Coefficients::new(1.0, 0.0, 0.0, std::f64::consts::PI).unwrap();
        let tf = Transfer::from_coefficients(&coeffs, 3e9).unwrap();
        assert!((tf.zero_frequency() - 0.75e9).abs() < 1.0);
        // and B too large for the gain is rejected
        let mut bad = coeffs.clone();
        bad.set_zero_fir(0.5, 3.0).unwrap();
        assert!(Transfer::from_coefficients(&bad, 3e9).is_err());
    }
}
