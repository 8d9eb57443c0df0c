//! Hardware biquad pipeline constants.
//!
//! This module contains constants that define the characteristics of the
//! biquad implementation in the FPGA: the number of interleaved lanes and
//! the fixed-point format at each pipeline stage. The same floor-and-wrap
//! quantization rule applies at every stage.

use crate::fixedpoint::QFormat;

/// Samples processed per hardware clock (interleaved lanes).
pub const LANES: usize = 8;

/// Format of the coefficient registers.
pub const COEFFICIENT_FORMAT: QFormat = QFormat::new(4, 14);

/// Format of the zero-stage FIR output `u`.
pub const ZERO_STAGE_FORMAT: QFormat = QFormat::new(14, 2);

/// Format of the pole-lane multiply-accumulate steps.
///
/// The hardware accumulates the pole-stage partial sums in this wider
/// format before the final requantization of the lane outputs.
pub const ACCUMULATOR_FORMAT: QFormat = QFormat::new(21, 27);

/// Format of the cross-linked pole-lane outputs `F` and `G`.
///
/// An 11-bit integer wrap on the accumulator grid.
pub const POLE_OUTPUT_FORMAT: QFormat = QFormat::new(11, 27);

/// Format of the decimated IIR state `y[b][0..2]` and of the values
/// produced by the incremental reconstruction.
pub const IIR_STATE_FORMAT: QFormat = QFormat::new(14, 10);

/// Format of the final output samples.
pub const OUTPUT_FORMAT: QFormat = QFormat::new(12, 0);

/// Clocks needed to fill the pipeline from its reset state.
///
/// The zero stage reaches one clock back, the pole lanes another, and the
/// decimated IIR recursion two more. Output during the first
/// `WARMUP_CLOCKS` clocks reflects the zeroed reset state rather than the
/// steady-state filter and should be skipped when comparing against
/// hardware captures.
pub const WARMUP_CLOCKS: usize = 4;
