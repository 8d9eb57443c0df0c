//! Register value semantics of the hardware biquad core.
//!
//! The biquad IP core latches its coefficients from a small bank of
//! write-only push registers: each write to a group offset shifts a raw
//! Q4.14 word into that group's coefficient chain, and a write to the
//! control register strobes the chain into the datapath. This module
//! defines the offsets, the push order, and the conversion between
//! [`Coefficients`] and raw register words. The actual transport (serial
//! link, memory map) is abstracted behind [`RegisterIo`] and owned by the
//! DAQ layer; this crate never performs I/O itself.

use crate::coeff::Coefficients;
use crate::error::{Error, Result};
use crate::sim::constants::COEFFICIENT_FORMAT;

/// Register offsets of the biquad IP core.
pub mod offset {
    /// Control/strobe register. Writing [`super::CONTROL_UPDATE`] latches
    /// the previously pushed coefficient words.
    pub const CONTROL: u32 = 0x00;
    /// Zero-stage FIR chain: push `B`, then `A`.
    pub const ZERO_FIR: u32 = 0x04;
    /// IIR matrix chain: push `C2`, `C3`, `C1`, `C0`.
    pub const IIR_MATRIX: u32 = 0x08;
    /// Incremental chain: push `a1`, then `a2`.
    pub const INCREMENTAL: u32 = 0x0C;
    /// f-lane pole FIR chain: push `Dff`, then `Xn[lanes-2] .. Xn[1]`.
    pub const POLE_F: u32 = 0x10;
    /// g-lane pole FIR chain: push `Egg`, then `Xn[lanes-1] .. Xn[1]`.
    pub const POLE_G: u32 = 0x14;
    /// f-from-g cross-link register: `Dfg`.
    pub const CROSS_FG: u32 = 0x18;
    /// g-from-f cross-link register: `Egf`.
    pub const CROSS_GF: u32 = 0x1C;
}

/// Value written to [`offset::CONTROL`] to latch pushed coefficients.
pub const CONTROL_UPDATE: u32 = 1;

/// Register read/write capability.
///
/// The DAQ layer implements this over whatever transport reaches the
/// board. Transport failures stay in the implementation's own error
/// domain; they are not part of this crate's validation taxonomy.
pub trait RegisterIo {
    /// Error type of the underlying transport.
    type Error;

    /// Writes a register word.
    fn write(&mut self, addr: u32, value: u32) -> std::result::Result<(), Self::Error>;

    /// Reads a register word.
    fn read(&mut self, addr: u32) -> std::result::Result<u32, Self::Error>;
}

/// Raw register image of a coefficient set.
///
/// Every field is an 18-bit Q4.14 two's-complement word in the low bits
/// of the `u32`, exactly as pushed over [`RegisterIo`]. `xn` holds
/// `Xn[1..lanes]` in natural order; `Xn[0]` is fixed at 1 by the datapath
/// and has no register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientWords {
    /// Zero-stage tap `A`.
    pub a: u32,
    /// Zero-stage tap `B`.
    pub b: u32,
    /// Pole taps `Xn[1..lanes]`.
    pub xn: Vec<u32>,
    /// f-lane self cross-link.
    pub dff: u32,
    /// f-from-g cross-link.
    pub dfg: u32,
    /// g-lane self cross-link.
    pub egg: u32,
    /// g-from-f cross-link.
    pub egf: u32,
    /// IIR matrix term `C0`.
    pub c0: u32,
    /// IIR matrix term `C1`.
    pub c1: u32,
    /// IIR matrix term `C2`.
    pub c2: u32,
    /// IIR matrix term `C3`.
    pub c3: u32,
    /// Incremental coefficient `a1`.
    pub a1: u32,
    /// Incremental coefficient `a2`.
    pub a2: u32,
}

impl CoefficientWords {
    /// Converts a coefficient set to its register image.
    ///
    /// Each value is quantized onto the Q4.14 grid by the conversion, so
    /// the image is what the hardware will actually compute with.
    pub fn from_coefficients(coeffs: &Coefficients) -> CoefficientWords {
        let raw = |v: f64| COEFFICIENT_FORMAT.to_raw(v);
        CoefficientWords {
            a: raw(coeffs.a()),
            b: raw(coeffs.b()),
            xn: coeffs.xn()[1..].iter().map(|&x| raw(x)).collect(),
            dff: raw(coeffs.dff()),
            dfg: raw(coeffs.dfg()),
            egg: raw(coeffs.egg()),
            egf: raw(coeffs.egf()),
            c0: raw(coeffs.c0()),
            c1: raw(coeffs.c1()),
            c2: raw(coeffs.c2()),
            c3: raw(coeffs.c3()),
            a1: raw(coeffs.a1()),
            a2: raw(coeffs.a2()),
        }
    }

    /// Reconstructs a coefficient set from a register image.
    ///
    /// The pole radius is recovered from `a2 = P^2` and the pole angle
    /// from `a1 = 2 P cos(theta)`; every derived group is then overridden
    /// with the decoded words, so a simulator built from the result
    /// computes with exactly the values the hardware was given. Returns
    /// [`Error::InvalidParameter`] if the incremental words do not
    /// describe a stable complex pole pair.
    pub fn to_coefficients(&self) -> Result<Coefficients> {
        let fmt = COEFFICIENT_FORMAT;
        let a1 = fmt.from_raw(self.a1);
        let a2 = fmt.from_raw(self.a2);
        if a2 < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "a2 = {a2} cannot be a squared pole radius"
            )));
        }
        let p = a2.sqrt();
        let theta = if p == 0.0 {
            std::f64::consts::PI
        } else {
            let ratio = a1 / (2.0 * p);
            if ratio.abs() > 1.0 {
                return Err(Error::InvalidParameter(format!(
                    "a1 = {a1}, a2 = {a2} do not describe a complex pole pair"
                )));
            }
            ratio.acos()
        };
        let lanes = self.xn.len() + 1;
        let mut coeffs =
            Coefficients::with_lanes(fmt.from_raw(self.a), fmt.from_raw(self.b), p, theta, lanes)?;
        let taps: Vec<f64> = self.xn.iter().map(|&w| fmt.from_raw(w)).collect();
        coeffs.set_taps(&taps)?;
        coeffs.set_cross_links(
            fmt.from_raw(self.dff),
            fmt.from_raw(self.dfg),
            fmt.from_raw(self.egg),
            fmt.from_raw(self.egf),
        );
        coeffs.set_iir_matrix(
            fmt.from_raw(self.c0),
            fmt.from_raw(self.c1),
            fmt.from_raw(self.c2),
            fmt.from_raw(self.c3),
        );
        coeffs.set_incremental(a1, a2);
        Ok(coeffs)
    }
}

/// Pushes a full coefficient set to the hardware.
///
/// Writes every coefficient group in the core's push order, strobing the
/// control register after each group:
///
/// 1. zero-stage FIR (`B`, `A`)
/// 2. pole FIR lanes (`Dff` + reversed f-lane taps, `Egg` + reversed
///    g-lane taps, `Dfg`, `Egf`)
/// 3. IIR matrix (`C2`, `C3`, `C1`, `C0`)
/// 4. incrementals (`a1`, `a2`)
pub fn write_coefficients<D: RegisterIo>(
    dev: &mut D,
    words: &CoefficientWords,
) -> std::result::Result<(), D::Error> {
    dev.write(offset::ZERO_FIR, words.b)?;
    dev.write(offset::ZERO_FIR, words.a)?;
    dev.write(offset::CONTROL, CONTROL_UPDATE)?;

    dev.write(offset::POLE_F, words.dff)?;
    for &x in words.xn[..words.xn.len() - 1].iter().rev() {
        dev.write(offset::POLE_F, x)?;
    }
    dev.write(offset::POLE_G, words.egg)?;
    for &x in words.xn.iter().rev() {
        dev.write(offset::POLE_G, x)?;
    }
    dev.write(offset::CROSS_FG, words.dfg)?;
    dev.write(offset::CROSS_GF, words.egf)?;
    dev.write(offset::CONTROL, CONTROL_UPDATE)?;

    dev.write(offset::IIR_MATRIX, words.c2)?;
    dev.write(offset::IIR_MATRIX, words.c3)?;
    dev.write(offset::IIR_MATRIX, words.c1)?;
    dev.write(offset::IIR_MATRIX, words.c0)?;
    dev.write(offset::CONTROL, CONTROL_UPDATE)?;

    dev.write(offset::INCREMENTAL, words.a1)?;
    dev.write(offset::INCREMENTAL, words.a2)?;
    dev.write(offset::CONTROL, CONTROL_UPDATE)?;
    Ok(())
}

/// Reads a full coefficient register image back from the hardware.
///
/// Reads mirror the push order of [`write_coefficients`] word for word.
/// `lanes` selects how many pole taps the core holds.
pub fn read_coefficients<D: RegisterIo>(
    dev: &mut D,
    lanes: usize,
) -> std::result::Result<CoefficientWords, D::Error> {
    assert!(lanes >= 2);
    let b = dev.read(offset::ZERO_FIR)?;
    let a = dev.read(offset::ZERO_FIR)?;

    let dff = dev.read(offset::POLE_F)?;
    let mut xn = vec![0; lanes - 1];
    for i in (0..lanes - 2).rev() {
        xn[i] = dev.read(offset::POLE_F)?;
    }
    let egg = dev.read(offset::POLE_G)?;
    for i in (0..lanes - 1).rev() {
        xn[i] = dev.read(offset::POLE_G)?;
    }
    let dfg = dev.read(offset::CROSS_FG)?;
    let egf = dev.read(offset::CROSS_GF)?;

    let c2 = dev.read(offset::IIR_MATRIX)?;
    let c3 = dev.read(offset::IIR_MATRIX)?;
    let c1 = dev.read(offset::IIR_MATRIX)?;
    let c0 = dev.read(offset::IIR_MATRIX)?;

    let a1 = dev.read(offset::INCREMENTAL)?;
    let a2 = dev.read(offset::INCREMENTAL)?;

    Ok(CoefficientWords {
        a,
        b,
        xn,
        dff,
        dfg,
        egg,
        egf,
        c0,
        c1,
        c2,
        c3,
        a1,
        a2,
    })
}
