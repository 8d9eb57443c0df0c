//! Notch filter design.
//!
//! This module converts a physical notch specification into a biquad
//! coefficient set. The design is the standard second-order IIR notch: a
//! zero pair on the unit circle at the notch angle, and a pole pair pulled
//! inward so that the -3 dB bandwidth of the notch is the notch frequency
//! divided by the quality factor.

use crate::coeff::Coefficients;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Physical design intent for a notch filter.
///
/// Immutable once created; used only to derive a [`Coefficients`] set.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct NotchSpec {
    /// ADC sample rate in samples per second.
    pub samp_rate: f64,
    /// Center frequency of the notch in Hz.
    pub notch_freq: f64,
    /// Quality factor, `notch_freq / bandwidth(-3 dB)`.
    pub quality: f64,
}

/// Designs a notch filter from a physical specification.
///
/// The numerator of the designed section is `gain * (1 - 2cos(w0) z^-1 +
/// z^-2)` with `w0` the notch angle, which maps onto the hardware zero
/// stage as `A = gain` and `B = -2 A cos(w0)`. The pole pair is the root
/// pair of the designed denominator, expressed in polar form as the pole
/// radius `P` and pole angle `theta`.
///
/// Returns [`Error::InvalidSpec`] if the sample rate or quality factor is
/// not positive, if the notch frequency is not inside `(0, samp_rate / 2)`,
/// or if the resulting coefficients fall outside the representable
/// hardware ranges.
pub fn design(spec: &NotchSpec) -> Result<Coefficients> {
    if spec.samp_rate <= 0.0 {
        return Err(Error::InvalidSpec(format!(
            "sample rate {} must be positive",
            spec.samp_rate
        )));
    }
    if !(spec.notch_freq > 0.0 && spec.notch_freq < spec.samp_rate / 2.0) {
        return Err(Error::InvalidSpec(format!(
            "notch frequency {} outside (0, {})",
            spec.notch_freq,
            spec.samp_rate / 2.0
        )));
    }
    if spec.quality <= 0.0 {
        return Err(Error::InvalidSpec(format!(
            "quality factor {} must be positive",
            spec.quality
        )));
    }

    let w0 = 2.0 * std::f64::consts::PI * spec.notch_freq / spec.samp_rate;
    let bandwidth = w0 / spec.quality;
    let beta = (bandwidth / 2.0).tan();
    let gain = 1.0 / (1.0 + beta);

    let a = gain;
    let b = -2.0 * a * w0.cos();

    // Pole pair of z^2 - 2 gain cos(w0) z + (2 gain - 1). A notch spec
    // narrow enough to keep the poles complex always has 2 gain - 1 > 0.
    let radius_sq = 2.0 * gain - 1.0;
    let real = gain * w0.cos();
    let discriminant = real * real - radius_sq;
    if discriminant >= 0.0 {
        return Err(Error::InvalidSpec(format!(
            "notch at {} Hz with quality {} yields real poles",
            spec.notch_freq, spec.quality
        )));
    }
    let p = radius_sq.sqrt();
    let theta = (-discriminant).sqrt().atan2(real);

    tracing::debug!(a, b, p, theta, "designed notch filter");

    Coefficients::new(a, b, p, theta)
        .map_err(|e| Error::InvalidSpec(format!("design not representable: {e}")))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transfer::Transfer;

    #[test]
    fn notch_460_mhz() {
        let spec = NotchSpec {
            samp_rate: 3e9,
            notch_freq: 460e6,
            quality: 5.0,
        };
        let coeffs = design(&spec).unwrap();
        assert!(coeffs.p() < 1.0);
        assert!(coeffs.a() > 0.0 && coeffs.a() < 1.0);
        // the zero sits exactly on the notch angle
        let theta_z = 2.0 * std::f64::consts::PI * spec.notch_freq / spec.samp_rate;
        assert!((coeffs.b() + 2.0 * coeffs.a() * theta_z.cos()).abs() < 1e-12);

        // resonance read back from the magnitude response within 1%
        let tf = Transfer::from_coefficients(&coeffs, spec.samp_rate).unwrap();
        let notch = tf.notch_frequency(4096);
        assert!((notch - 460e6).abs() / 460e6 < 0.01);
    }

    #[test]
    fn pole_tracks_notch() {
        let spec = NotchSpec {
            samp_rate: 3e9,
            notch_freq: 375e6,
            quality: 5.0,
        };
        let coeffs = design(&spec).unwrap();
        let pole_freq = coeffs.theta() / (2.0 * std::f64::consts::PI) * spec.samp_rate;
        assert!((pole_freq - 375e6).abs() / 375e6 < 0.02);
    }

    #[test]
    fn rejects_impossible_specs() {
        let base = NotchSpec {
            samp_rate: 3e9,
            notch_freq: 460e6,
            quality: 5.0,
        };
        assert!(design(&NotchSpec {
            notch_freq: 1.5e9,
            ..base
        })
        .is_err());
        assert!(design(&NotchSpec {
            notch_freq: 0.0,
            ..base
        })
        .is_err());
        assert!(design(&NotchSpec {
            notch_freq: -10.0,
            ..base
        })
        .is_err());
        assert!(design(&NotchSpec {
            quality: 0.0,
            ..base
        })
        .is_err());
        assert!(design(&NotchSpec {
            samp_rate: 0.0,
            ..base
        })
        .is_err());
    }

    #[test]
    fn spec_round_trips_as_json() {
        let spec = NotchSpec {
            samp_rate: 3e9,
            notch_freq: 460e6,
            quality: 5.0,
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: NotchSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
