//! rfsoc-biquad implements the digital biquad notch filter core of an RFSoC
//! data-acquisition system. It designs second-order-section notch filter
//! coefficients from a physical specification, derives the full set of
//! coefficients used by the decimated 8-lane hardware pipeline, and emulates
//! that pipeline bit-for-bit in fixed-point arithmetic so that software
//! predictions can be checked against hardware captures. The register value
//! semantics of the hardware biquad core are also defined here, behind a
//! small register-access trait; the actual register I/O (serial link, ADC
//! capture) is owned by the DAQ layer that uses this crate.

#![warn(missing_docs)]

pub mod coeff;
pub mod design;
pub mod error;
pub mod fixedpoint;
pub mod registers;
pub mod response;
pub mod sim;
pub mod transfer;

pub use coeff::Coefficients;
pub use design::{design, NotchSpec};
pub use error::{Error, Result};
pub use fixedpoint::QFormat;
pub use sim::{PipelineRun, PipelineSim};
