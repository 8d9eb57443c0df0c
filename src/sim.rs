//! Biquad pipeline simulator.
//!
//! This module reproduces, sample for sample, the fixed-point decimated
//! pipeline that the hardware biquad core executes, so that software
//! predictions can be checked against hardware captures. The pipeline runs
//! four stages in order for each clock of [`constants::LANES`] samples:
//!
//! 1. Zero-stage FIR: `u[b][n] = A x[n] + B x[n-1] + A x[n-2]`, reaching
//!    into the previous clock for the first two lanes.
//! 2. Interleaved pole-stage FIR lanes `f` and `g`, cross-linked one clock
//!    back into the outputs `F` and `G`.
//! 3. Decimated IIR matrix recursion producing the first two output lanes
//!    of each clock from the state two clocks back.
//! 4. Incremental single-sample reconstruction of the remaining lanes.
//!
//! Each stage requantizes its results in the fixed-point format the
//! hardware uses there (see [`constants`]); quantization can be disabled
//! wholesale to isolate quantization error from algorithmic error.
//!
//! Clock -1 and the IIR state before clock 2 read as zeros, matching the
//! reset state of the hardware datapath. The first
//! [`constants::WARMUP_CLOCKS`] clocks of output cover the pipeline fill
//! and should be skipped when comparing against hardware.

use crate::coeff::Coefficients;
use crate::error::{Error, Result};

pub mod constants;

/// Biquad pipeline simulator.
///
/// Holds a coefficient set and runs the four-stage pipeline over sample
/// streams. The simulator itself is stateless across runs; every
/// [`PipelineSim::run`] allocates a fresh [`PipelineRun`].
#[derive(Debug, Clone)]
pub struct PipelineSim {
    coeffs: Coefficients,
    quantize: bool,
}

/// Buffers produced by one simulator run.
///
/// Owned exclusively by the caller; nothing is shared with the simulator
/// after [`PipelineSim::run`] returns.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    lanes: usize,
    quantized: bool,
    u: Vec<f64>,
    f: Vec<f64>,
    g: Vec<f64>,
    f_out: Vec<f64>,
    g_out: Vec<f64>,
    y: Vec<f64>,
}

impl PipelineSim {
    /// Creates a simulator that requantizes at every pipeline stage, the
    /// way the hardware does.
    pub fn new(coeffs: Coefficients) -> PipelineSim {
        PipelineSim {
            coeffs,
            quantize: true,
        }
    }

    /// Creates a simulator that computes in full real-valued arithmetic.
    ///
    /// Used to isolate quantization error from algorithmic error when a
    /// hardware comparison disagrees.
    pub fn without_quantization(coeffs: Coefficients) -> PipelineSim {
        PipelineSim {
            coeffs,
            quantize: false,
        }
    }

    /// The coefficient set this simulator runs with.
    pub fn coefficients(&self) -> &Coefficients {
        &self.coeffs
    }

    /// Runs the pipeline over a sample stream.
    ///
    /// The stream length must be a positive multiple of the coefficient
    /// set's lane count; anything else returns [`Error::InvalidInput`].
    /// Arithmetic is total: out-of-range intermediate values wrap exactly
    /// like the hardware registers do.
    pub fn run(&self, samples: &[f64]) -> Result<PipelineRun> {
        let m = self.coeffs.lanes();
        if samples.is_empty() || samples.len() % m != 0 {
            return Err(Error::InvalidInput(format!(
                "stream of {} samples is not a positive multiple of {} lanes",
                samples.len(),
                m
            )));
        }
        let clocks = samples.len() / m;
        tracing::trace!(clocks, quantize = self.quantize, "running biquad pipeline");

        let c = &self.coeffs;
        let quantize = self.quantize;
        let zero_q = |v: f64| {
            if quantize {
                constants::ZERO_STAGE_FORMAT.quantize(v)
            } else {
                v
            }
        };
        let acc_q = |v: f64| {
            if quantize {
                constants::ACCUMULATOR_FORMAT.quantize(v)
            } else {
                v
            }
        };
        let pole_q = |v: f64| {
            if quantize {
                constants::POLE_OUTPUT_FORMAT.quantize(v)
            } else {
                v
            }
        };
        let iir_q = |v: f64| {
            if quantize {
                constants::IIR_STATE_FORMAT.quantize(v)
            } else {
                v
            }
        };

        // Zero-stage FIR. Lanes 0 and 1 reach into the previous clock;
        // before the first clock the datapath reads zeros.
        let x = |i: isize| if i < 0 { 0.0 } else { samples[i as usize] };
        let mut u = vec![0.0; clocks * m];
        for b in 0..clocks {
            for n in 0..m {
                let k = (b * m + n) as isize;
                u[b * m + n] = zero_q(c.a() * x(k) + c.b() * x(k - 1) + c.a() * x(k - 2));
            }
        }

        // Pole-stage FIR lanes. Each lane is a decimated sub-filter over
        // the current clock's leading zero-stage outputs and the previous
        // clock's trailing ones, accumulated step by step in the wide
        // accumulator format.
        let xn = c.xn();
        let mut f = vec![0.0; clocks];
        let mut g = vec![0.0; clocks];
        let mut f_out = vec![0.0; clocks];
        let mut g_out = vec![0.0; clocks];
        for b in 0..clocks {
            let u_prev = |n: usize| if b == 0 { 0.0 } else { u[(b - 1) * m + n] };
            let mut fb = u[b * m];
            fb = acc_q(fb + xn[1] * u_prev(m - 1));
            for i in 2..=m - 2 {
                fb = acc_q(fb + xn[i] * u_prev(m - i));
            }
            let mut gb = acc_q(u[b * m + 1] + xn[1] * u[b * m]);
            for i in 2..=m - 1 {
                gb = acc_q(gb + xn[i] * u_prev(m - i + 1));
            }
            f[b] = fb;
            g[b] = gb;
            let (f_prev, g_prev) = if b == 0 {
                (0.0, 0.0)
            } else {
                (f[b - 1], g[b - 1])
            };
            f_out[b] = pole_q(c.dff() * f_prev + c.dfg() * g_prev + fb);
            g_out[b] = pole_q(c.egg() * g_prev + c.egf() * f_prev + gb);
        }

        // Decimated IIR matrix recursion with a 2-clock feedback delay,
        // then incremental reconstruction of the remaining lanes.
        let mut y = vec![0.0; clocks * m];
        for b in 0..clocks {
            let (y0, y1) = if b < 2 {
                (0.0, 0.0)
            } else {
                (y[(b - 2) * m], y[(b - 2) * m + 1])
            };
            y[b * m] = iir_q(c.c0() * y0 + c.c1() * y1 + f_out[b]);
            y[b * m + 1] = iir_q(c.c2() * y0 + c.c3() * y1 + g_out[b]);
            for i in 2..m {
                y[b * m + i] =
                    iir_q(c.a1() * y[b * m + i - 1] - c.a2() * y[b * m + i - 2] + u[b * m + i]);
            }
        }

        Ok(PipelineRun {
            lanes: m,
            quantized: quantize,
            u,
            f,
            g,
            f_out,
            g_out,
            y,
        })
    }
}

impl PipelineRun {
    /// Number of clocks in the run.
    pub fn clocks(&self) -> usize {
        self.f.len()
    }

    /// Samples per clock.
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Zero-stage FIR output, flattened clocks x lanes.
    pub fn zero_stage(&self) -> &[f64] {
        &self.u
    }

    /// Cross-linked pole-lane outputs `(F, G)`, one value per clock.
    pub fn pole_outputs(&self) -> (&[f64], &[f64]) {
        (&self.f_out, &self.g_out)
    }

    /// The filtered stream, flattened clocks x lanes.
    ///
    /// For a quantizing run the samples are requantized to the final
    /// output format on the way out, exactly as the hardware truncates
    /// them onto the output bus.
    pub fn output(&self) -> Vec<f64> {
        if self.quantized {
            self.y
                .iter()
                .map(|&v| constants::OUTPUT_FORMAT.quantize(v))
                .collect()
        } else {
            self.y.clone()
        }
    }

    /// The filtered stream with the first `skip_clocks` clocks dropped.
    ///
    /// Use [`constants::WARMUP_CLOCKS`] to discard the pipeline-fill
    /// transient before comparing with a hardware capture.
    pub fn filtered(&self, skip_clocks: usize) -> Vec<f64> {
        let skip = (skip_clocks * self.lanes).min(self.y.len());
        self.output().split_off(skip)
    }

    /// Largest absolute deviation from a hardware capture of the same
    /// stream, ignoring the first `skip_clocks` clocks.
    ///
    /// The capture must have the same length as this run's output.
    pub fn max_deviation(&self, capture: &[f64], skip_clocks: usize) -> Result<f64> {
        if capture.len() != self.y.len() {
            return Err(Error::InvalidInput(format!(
                "capture of {} samples does not match run of {}",
                capture.len(),
                self.y.len()
            )));
        }
        let skip = (skip_clocks * self.lanes).min(self.y.len());
        Ok(self
            .output()
            .iter()
            .zip(capture.iter())
            .skip(skip)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max))
    }
}

/// Converts a raw ADC capture to simulator input.
///
/// Discards the 4 guard bits of each 16-bit ADC word with an arithmetic
/// right shift, the same conditioning the DAQ layer applies to its capture
/// buffers.
pub fn from_adc(raw: &[i16]) -> Vec<f64> {
    raw.iter().map(|&s| f64::from(s >> 4)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::design::{design, NotchSpec};

    fn one_clock_impulse() -> Vec<f64> {
        let mut samples = vec![0.0; constants::LANES];
        samples[0] = 100.0;
        samples
    }

    /// Direct-form reference: y[n] = a1 y[n-1] - a2 y[n-2] + u[n] over the
    /// zero-stage output, zero initial state.
    fn direct_form(coeffs: &Coefficients, samples: &[f64]) -> Vec<f64> {
        let x = |i: isize| if i < 0 { 0.0 } else { samples[i as usize] };
        let u: Vec<f64> = (0..samples.len() as isize)
            .map(|k| coeffs.a() * x(k) + coeffs.b() * x(k - 1) + coeffs.a() * x(k - 2))
            .collect();
        let mut y = vec![0.0; samples.len()];
        for n in 0..samples.len() {
            let y1 = if n >= 1 { y[n - 1] } else { 0.0 };
            let y2 = if n >= 2 { y[n - 2] } else { 0.0 };
            y[n] = coeffs.a1() * y1 - coeffs.a2() * y2 + u[n];
        }
        y
    }

    #[test]
    fn unity_pass_through() {
        let coeffs = Coefficients::new(1.0, 0.0, 0.0, std::f64::consts::PI).unwrap();
        let sim = PipelineSim::without_quantization(coeffs);
        let run = sim.run(&one_clock_impulse()).unwrap();
        // A = 1 taps the impulse at lanes 0 and 2
        assert_eq!(run.zero_stage()[0], 100.0);
        assert_eq!(run.zero_stage()[1], 0.0);
        assert_eq!(run.zero_stage()[2], 100.0);
        // no pole contribution with P = 0
        assert_eq!(run.output(), run.zero_stage());
    }

    #[test]
    fn rejects_malformed_streams() {
        let coeffs = Coefficients::new(1.0, 0.0, 0.5, 1.0).unwrap();
        let sim = PipelineSim::new(coeffs);
        assert!(sim.run(&[]).is_err());
        assert!(sim.run(&vec![0.0; 12]).is_err());
        assert!(sim.run(&vec![0.0; 16]).is_ok());
    }

    #[test]
    fn deterministic() {
        let coeffs = design(&NotchSpec {
            samp_rate: 3e9,
            notch_freq: 460e6,
            quality: 5.0,
        })
        .unwrap()
        .quantized(constants::COEFFICIENT_FORMAT);
        let samples: Vec<f64> = (0..64 * constants::LANES)
            .map(|n| 72.0 * (0.3 * n as f64).sin().round())
            .collect();
        let sim = PipelineSim::new(coeffs);
        let first = sim.run(&samples).unwrap();
        let second = sim.run(&samples).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.output(), second.output());
    }

    #[test]
    fn zero_input_stays_zero() {
        for &(p, theta) in &[(0.0, std::f64::consts::PI), (0.9, 1.0), (0.5, 0.2)] {
            let coeffs = Coefficients::new(1.2, -1.6, p, theta).unwrap();
            let sim = PipelineSim::new(coeffs);
            let run = sim.run(&vec![0.0; 32 * constants::LANES]).unwrap();
            assert!(run.output().iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn matches_direct_form_recursion() {
        // the decimated decomposition must agree with the single-rate
        // biquad recursion it was factored from
        let coeffs = Coefficients::new(1.2, -1.60591345526, 0.8, 0.9).unwrap();
        let samples: Vec<f64> = (0..64 * constants::LANES)
            .map(|n| 72.0 * (2.0 * std::f64::consts::PI * 400e6 * n as f64 / 3e9).sin())
            .collect();
        let sim = PipelineSim::without_quantization(coeffs.clone());
        let run = sim.run(&samples).unwrap();
        let reference = direct_form(&coeffs, &samples);
        for (n, (got, want)) in run.output().iter().zip(reference.iter()).enumerate() {
            assert!(
                (got - want).abs() < 1e-6 * want.abs().max(1.0),
                "sample {n}: {got} vs {want}"
            );
        }
    }

    #[test]
    fn quantized_run_sits_on_stage_grids() {
        let coeffs = Coefficients::new(0.8028, -0.9163, 0.7782, 0.9413)
            .unwrap()
            .quantized(constants::COEFFICIENT_FORMAT);
        let samples: Vec<f64> = (0..16 * constants::LANES)
            .map(|n| ((n * 37) % 256) as f64 - 128.0)
            .collect();
        let run = PipelineSim::new(coeffs).run(&samples).unwrap();
        let on_grid = |v: f64, fmt: crate::QFormat| (v / fmt.resolution()).fract() == 0.0;
        assert!(run
            .zero_stage()
            .iter()
            .all(|&v| on_grid(v, constants::ZERO_STAGE_FORMAT)));
        assert!(run
            .output()
            .iter()
            .all(|&v| on_grid(v, constants::OUTPUT_FORMAT)));
    }

    #[test]
    fn warmup_skip() {
        let coeffs = Coefficients::new(1.0, 0.0, 0.5, 1.0).unwrap();
        let run = PipelineSim::new(coeffs)
            .run(&vec![1.0; 8 * constants::LANES])
            .unwrap();
        let full = run.filtered(0);
        let trimmed = run.filtered(constants::WARMUP_CLOCKS);
        assert_eq!(
            trimmed.len(),
            full.len() - constants::WARMUP_CLOCKS * constants::LANES
        );
        assert_eq!(&full[constants::WARMUP_CLOCKS * constants::LANES..], &trimmed[..]);
        // skipping everything is allowed
        assert!(run.filtered(100).is_empty());
    }

    #[test]
    fn deviation_against_capture() {
        let coeffs = Coefficients::new(1.0, 0.0, 0.5, 1.0).unwrap();
        let sim = PipelineSim::new(coeffs);
        let samples = vec![5.0; 8 * constants::LANES];
        let run = sim.run(&samples).unwrap();
        let mut capture = run.output();
        assert_eq!(run.max_deviation(&capture, 0).unwrap(), 0.0);
        capture[3] += 2.0;
        assert_eq!(run.max_deviation(&capture, 0).unwrap(), 2.0);
        // a capture of the wrong shape is rejected
        assert!(run.max_deviation(&capture[1..], 0).is_err());
    }

    #[test]
    fn adc_guard_shift() {
        assert_eq!(from_adc(&[16, -16, 31, -1]), vec![1.0, -1.0, 1.0, -1.0]);
    }
}
