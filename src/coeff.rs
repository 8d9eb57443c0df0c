//! Biquad pipeline coefficients.
//!
//! This module contains the canonical hardware-facing parameterization of
//! the biquad core: the zero-stage FIR taps `A` and `B`, the pole radius
//! `P` and pole angle `theta`, and every coefficient the decimated pipeline
//! derives from them. The hardware computes `lanes` samples per clock, so
//! the single-rate biquad recursion is decomposed into a tap vector `Xn`,
//! cross-link terms between the two interleaved pole lanes, a 2x2 IIR
//! state-transition matrix, and the single-sample recursion coefficients
//! used to reconstruct the remaining output samples of each clock.

use crate::error::{Error, Result};
use crate::fixedpoint::QFormat;
use serde::Serialize;

/// Largest magnitude representable by the 4 integer bits of the
/// coefficient registers.
const COEFF_LIMIT: f64 = 8.0;

/// Complete coefficient set of the hardware biquad core.
///
/// All derived values are pure functions of `{p, theta, lanes}` and are
/// recomputed together whenever the parameters change, so the set is never
/// in a partially stale state. The derived values can also be overridden
/// individually (see [`Coefficients::set_taps`] and friends) to mirror
/// exactly what was pushed to, or read back from, the hardware registers.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Coefficients {
    a: f64,
    b: f64,
    p: f64,
    theta: f64,
    lanes: usize,
    xn: Vec<f64>,
    dff: f64,
    dfg: f64,
    egg: f64,
    egf: f64,
    c0: f64,
    c1: f64,
    c2: f64,
    c3: f64,
    a1: f64,
    a2: f64,
}

impl Coefficients {
    /// Number of lanes (samples per clock) of the reference hardware.
    pub const DEFAULT_LANES: usize = 8;

    /// Creates a coefficient set for the 8-lane reference hardware.
    ///
    /// Returns [`Error::InvalidParameter`] if `p` is outside `[0, 1)`,
    /// `theta` is outside `(0, pi]`, or `|a|` or `|b|` is not representable
    /// in the 4 integer bits of the coefficient registers.
    pub fn new(a: f64, b: f64, p: f64, theta: f64) -> Result<Coefficients> {
        Coefficients::with_lanes(a, b, p, theta, Self::DEFAULT_LANES)
    }

    /// Creates a coefficient set for a pipeline with `lanes` samples per
    /// clock.
    pub fn with_lanes(a: f64, b: f64, p: f64, theta: f64, lanes: usize) -> Result<Coefficients> {
        if lanes < 2 {
            return Err(Error::InvalidParameter(format!(
                "pipeline needs at least 2 lanes, got {lanes}"
            )));
        }
        check_zero_tap(a, "A")?;
        check_zero_tap(b, "B")?;
        check_pole(p, theta)?;
        let mut coeffs = Coefficients {
            a,
            b,
            p,
            theta,
            lanes,
            xn: vec![0.0; lanes],
            dff: 0.0,
            dfg: 0.0,
            egg: 0.0,
            egf: 0.0,
            c0: 0.0,
            c1: 0.0,
            c2: 0.0,
            c3: 0.0,
            a1: 0.0,
            a2: 0.0,
        };
        coeffs.update_derived();
        Ok(coeffs)
    }

    /// Replaces the filter parameters and recomputes every derived
    /// coefficient.
    pub fn set_params(&mut self, a: f64, b: f64, p: f64, theta: f64) -> Result<()> {
        check_zero_tap(a, "A")?;
        check_zero_tap(b, "B")?;
        check_pole(p, theta)?;
        self.a = a;
        self.b = b;
        self.p = p;
        self.theta = theta;
        self.update_derived();
        Ok(())
    }

    fn update_derived(&mut self) {
        let m = self.lanes as i32;
        let p = self.p;
        for n in 0..self.lanes {
            self.xn[n] = p.powi(n as i32) * self.chebyshev(n as i32);
        }
        self.dff = -p.powi(m) * self.chebyshev(m - 2);
        self.egg = p.powi(m) * self.chebyshev(m);
        self.dfg = p.powi(m - 1) * self.chebyshev(m - 1);
        self.egf = -p * p * self.dfg;
        self.c0 = -p.powi(2 * m) * self.chebyshev(2 * m - 2);
        self.c1 = p.powi(2 * m - 1) * self.chebyshev(2 * m - 1);
        self.c2 = -p * p * self.c1;
        self.c3 = p.powi(2 * m) * self.chebyshev(2 * m);
        self.a1 = 2.0 * p * self.theta.cos();
        self.a2 = p * p;
    }

    /// Chebyshev-like recurrence `sin((n+1)*theta) / sin(theta)`, the
    /// Chebyshev polynomial of the second kind evaluated at `cos(theta)`.
    ///
    /// At `theta = pi` the ratio degenerates to `0/0`; the limit
    /// `(n+1) * cos(theta)^n` is used there.
    fn chebyshev(&self, n: i32) -> f64 {
        let s = self.theta.sin();
        if s.abs() < 1e-12 {
            (n + 1) as f64 * self.theta.cos().powi(n)
        } else {
            ((n + 1) as f64 * self.theta).sin() / s
        }
    }

    /// Returns a copy with every coefficient quantized to `fmt`.
    ///
    /// This produces the values the physical pipeline actually computes
    /// with, since the hardware latches the quantized register words. The
    /// parameters `p` and `theta` themselves are left untouched; only the
    /// coefficients derived from them are quantized. Quantization is
    /// idempotent.
    pub fn quantized(&self, fmt: QFormat) -> Coefficients {
        let q = |v: f64| fmt.quantize(v);
        Coefficients {
            a: q(self.a),
            b: q(self.b),
            p: self.p,
            theta: self.theta,
            lanes: self.lanes,
            xn: self.xn.iter().map(|&x| q(x)).collect(),
            dff: q(self.dff),
            dfg: q(self.dfg),
            egg: q(self.egg),
            egf: q(self.egf),
            c0: q(self.c0),
            c1: q(self.c1),
            c2: q(self.c2),
            c3: q(self.c3),
            a1: q(self.a1),
            a2: q(self.a2),
        }
    }

    /// Overrides the zero-stage FIR taps without touching the pole
    /// coefficients.
    pub fn set_zero_fir(&mut self, a: f64, b: f64) -> Result<()> {
        check_zero_tap(a, "A")?;
        check_zero_tap(b, "B")?;
        self.a = a;
        self.b = b;
        Ok(())
    }

    /// Overrides the pole tap vector `Xn[1..lanes]`.
    ///
    /// `taps` must hold `lanes - 1` values; `Xn[0]` is fixed at 1 by the
    /// hardware datapath.
    pub fn set_taps(&mut self, taps: &[f64]) -> Result<()> {
        if taps.len() != self.lanes - 1 {
            return Err(Error::InvalidParameter(format!(
                "expected {} taps, got {}",
                self.lanes - 1,
                taps.len()
            )));
        }
        self.xn[0] = 1.0;
        self.xn[1..].copy_from_slice(taps);
        Ok(())
    }

    /// Overrides the pole-stage cross-link terms.
    pub fn set_cross_links(&mut self, dff: f64, dfg: f64, egg: f64, egf: f64) {
        self.dff = dff;
        self.dfg = dfg;
        self.egg = egg;
        self.egf = egf;
    }

    /// Overrides the IIR state-transition matrix.
    pub fn set_iir_matrix(&mut self, c0: f64, c1: f64, c2: f64, c3: f64) {
        self.c0 = c0;
        self.c1 = c1;
        self.c2 = c2;
        self.c3 = c3;
    }

    /// Overrides the single-sample recursion coefficients.
    pub fn set_incremental(&mut self, a1: f64, a2: f64) {
        self.a1 = a1;
        self.a2 = a2;
    }

    /// Zero-stage tap `A`.
    pub fn a(&self) -> f64 {
        self.a
    }

    /// Zero-stage tap `B`.
    pub fn b(&self) -> f64 {
        self.b
    }

    /// Pole radius.
    pub fn p(&self) -> f64 {
        self.p
    }

    /// Pole angle in radians.
    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Samples per clock of the pipeline this set parameterizes.
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Pole tap vector `Xn`, with `Xn[n] = P^n * sin((n+1)theta)/sin(theta)`.
    pub fn xn(&self) -> &[f64] {
        &self.xn
    }

    /// f-lane self cross-link term.
    pub fn dff(&self) -> f64 {
        self.dff
    }

    /// f-from-g cross-link term.
    pub fn dfg(&self) -> f64 {
        self.dfg
    }

    /// g-lane self cross-link term.
    pub fn egg(&self) -> f64 {
        self.egg
    }

    /// g-from-f cross-link term.
    pub fn egf(&self) -> f64 {
        self.egf
    }

    /// IIR matrix term coupling `y[b-2][0]` into `y[b][0]`.
    pub fn c0(&self) -> f64 {
        self.c0
    }

    /// IIR matrix term coupling `y[b-2][1]` into `y[b][0]`.
    pub fn c1(&self) -> f64 {
        self.c1
    }

    /// IIR matrix term coupling `y[b-2][0]` into `y[b][1]`.
    pub fn c2(&self) -> f64 {
        self.c2
    }

    /// IIR matrix term coupling `y[b-2][1]` into `y[b][1]`.
    pub fn c3(&self) -> f64 {
        self.c3
    }

    /// Direct-form feedback coefficient `2P*cos(theta)`.
    pub fn a1(&self) -> f64 {
        self.a1
    }

    /// Direct-form feedback coefficient `P^2`.
    pub fn a2(&self) -> f64 {
        self.a2
    }
}

fn check_zero_tap(value: f64, name: &str) -> Result<()> {
    if !value.is_finite() || value.abs() >= COEFF_LIMIT {
        return Err(Error::InvalidParameter(format!(
            "{name} = {value} does not fit in 4 integer bits"
        )));
    }
    Ok(())
}

fn check_pole(p: f64, theta: f64) -> Result<()> {
    if !(0.0..1.0).contains(&p) {
        return Err(Error::InvalidParameter(format!(
            "pole radius P = {p} must be in [0, 1)"
        )));
    }
    if !(theta > 0.0 && theta <= std::f64::consts::PI) {
        return Err(Error::InvalidParameter(format!(
            "pole angle theta = {theta} must be in (0, pi]"
        )));
    }
    Ok(())
}
