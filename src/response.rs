//! Noise-driven transfer function estimation.
//!
//! This module estimates the magnitude response of a coefficient set by
//! driving the pipeline simulator with white noise over many trials and
//! averaging the complex input/output FFT ratio, the same way the DAQ
//! estimates S21 from repeated hardware captures. It is used to validate
//! the simulator and coefficients against the closed-form
//! [`Transfer`](crate::transfer::Transfer) response.

use crate::coeff::Coefficients;
use crate::error::{Error, Result};
use crate::sim::PipelineSim;
use rand::Rng;
use rustfft::{num_complex::Complex, FftPlanner};

// Peak amplitude of the noise drive, sized like a mid-scale ADC capture.
const NOISE_AMPLITUDE: f64 = 100.0;

/// Estimated magnitude response over the first Nyquist zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Frequency grid in Hz, `samp_rate / n` apart.
    pub frequencies: Vec<f64>,
    /// Estimated magnitude in dB at each grid frequency.
    pub magnitude_db: Vec<f64>,
}

/// Estimates the transfer function of a coefficient set.
///
/// Runs `trials` white-noise streams of `clocks` clocks through the
/// pipeline simulator and averages the complex ratio of output to input
/// spectra; more trials average down the per-bin estimation noise. With
/// `quantize` set the estimate includes the fixed-point quantization of
/// the pipeline; without it the estimate converges on the ideal response.
pub fn frequency_response(
    coeffs: &Coefficients,
    samp_rate: f64,
    clocks: usize,
    trials: usize,
    quantize: bool,
) -> Result<Response> {
    frequency_response_with(&mut rand::thread_rng(), coeffs, samp_rate, clocks, trials, quantize)
}

/// [`frequency_response`] with a caller-supplied noise generator.
pub fn frequency_response_with<R: Rng>(
    rng: &mut R,
    coeffs: &Coefficients,
    samp_rate: f64,
    clocks: usize,
    trials: usize,
    quantize: bool,
) -> Result<Response> {
    if clocks == 0 || trials == 0 {
        return Err(Error::InvalidInput(format!(
            "need at least one clock and one trial, got {clocks} and {trials}"
        )));
    }
    if samp_rate <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "sample rate {samp_rate} must be positive"
        )));
    }
    let sim = if quantize {
        PipelineSim::new(coeffs.clone())
    } else {
        PipelineSim::without_quantization(coeffs.clone())
    };
    let n = clocks * coeffs.lanes();
    tracing::debug!(n, trials, quantize, "estimating frequency response");

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let mut mean = vec![Complex::new(0.0, 0.0); n];
    for _ in 0..trials {
        let input: Vec<f64> = (0..n)
            .map(|_| rng.gen_range(-NOISE_AMPLITUDE..NOISE_AMPLITUDE))
            .collect();
        let run = sim.run(&input)?;
        let mut input_fft: Vec<Complex<f64>> =
            input.iter().map(|&v| Complex::new(v, 0.0)).collect();
        let mut output_fft: Vec<Complex<f64>> = run
            .output()
            .iter()
            .map(|&v| Complex::new(v, 0.0))
            .collect();
        fft.process(&mut input_fft);
        fft.process(&mut output_fft);
        for (m, (out, inp)) in mean.iter_mut().zip(output_fft.iter().zip(input_fft.iter())) {
            *m += out / inp;
        }
    }

    let scale = 1.0 / trials as f64;
    let half = n / 2;
    let frequencies = (0..half).map(|k| k as f64 * samp_rate / n as f64).collect();
    let magnitude_db = mean[..half]
        .iter()
        .map(|m| 20.0 * (*m * scale).norm().log10())
        .collect();
    Ok(Response {
        frequencies,
        magnitude_db,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::design::{design, NotchSpec};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn estimate(quantize: bool) -> (NotchSpec, Response) {
        let spec = NotchSpec {
            samp_rate: 3e9,
            notch_freq: 460e6,
            quality: 5.0,
        };
        let coeffs = design(&spec).unwrap();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let response =
            frequency_response_with(&mut rng, &coeffs, spec.samp_rate, 64, 32, quantize).unwrap();
        (spec, response)
    }

    #[test]
    fn notch_is_local_minimum() {
        let (spec, response) = estimate(false);
        let df = response.frequencies[1];
        let notch_bin = (spec.notch_freq / df).round() as usize;
        // compare against bins two -3 dB bandwidths away on each side
        let offset = (2.0 * spec.notch_freq / spec.quality / df).round() as usize;
        let at_notch = response.magnitude_db[notch_bin];
        assert!(
            at_notch < response.magnitude_db[notch_bin - offset] - 10.0,
            "notch {at_notch} dB not below low side"
        );
        assert!(
            at_notch < response.magnitude_db[notch_bin + offset] - 10.0,
            "notch {at_notch} dB not below high side"
        );
    }

    #[test]
    fn passband_is_flat() {
        let (_, response) = estimate(false);
        // well away from the notch the estimate converges on unity gain
        let low = response.magnitude_db[10];
        let high = response.magnitude_db[200];
        assert!(low.abs() < 2.0, "low passband at {low} dB");
        assert!(high.abs() < 2.0, "high passband at {high} dB");
    }

    #[test]
    fn rejects_empty_estimates() {
        let coeffs = design(&NotchSpec {
            samp_rate: 3e9,
            notch_freq: 460e6,
            quality: 5.0,
        })
        .unwrap();
        assert!(frequency_response(&coeffs, 3e9, 0, 4, false).is_err());
        assert!(frequency_response(&coeffs, 3e9, 16, 0, false).is_err());
        assert!(frequency_response(&coeffs, 0.0, 16, 4, false).is_err());
    }
}
