use serde::{Deserialize, Serialize};

use super::{max_abs, Calibration, OperandDescriptor, RangeMetadata, ScalePair, INT32_RANGE, INT8_RANGE, UINT8_RANGE};
use crate::error::{QaddError, Result};
use crate::tensor::DType;

/// Numeric domain the fused sum writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputDomain {
    Int8,
    Uint8,
    Int32,
    Float32,
}

impl OutputDomain {
    /// 8-bit outputs keep their declared type; anything else accumulates in int32.
    pub fn for_output(declared: DType, float_output: bool) -> Self {
        if float_output { return OutputDomain::Float32; }
        match declared {
            DType::Int8 => OutputDomain::Int8,
            DType::Uint8 => OutputDomain::Uint8,
            _ => OutputDomain::Int32,
        }
    }

    pub fn range(self) -> f32 {
        match self {
            OutputDomain::Int8 => INT8_RANGE,
            OutputDomain::Uint8 => UINT8_RANGE,
            OutputDomain::Int32 => INT32_RANGE,
            OutputDomain::Float32 => 1.0,
        }
    }

    pub fn dtype(self) -> DType {
        match self {
            OutputDomain::Int8 => DType::Int8,
            OutputDomain::Uint8 => DType::Uint8,
            OutputDomain::Int32 => DType::Int32,
            OutputDomain::Float32 => DType::Float32,
        }
    }
}

/// How operand scales relate to the output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleMode {
    /// Output range fixed by calibration; `out_scale` levels per real unit.
    Calibrated { out_scale: f32 },
    /// Output range is the worst-case sum of operand ranges.
    Dynamic { total_absmax: f32, out_range: f32 },
    /// Output in real units.
    Dequantize,
}

impl ScaleMode {
    pub fn operand_scale(&self, op: &OperandDescriptor) -> f32 {
        match *self {
            ScaleMode::Calibrated { out_scale } => out_scale / op.scale(),
            ScaleMode::Dynamic { total_absmax, out_range } => (op.absmax / total_absmax) * (out_range / op.range),
            ScaleMode::Dequantize => 1.0 / op.scale(),
        }
    }

    pub fn is_calibrated(&self) -> bool { matches!(self, ScaleMode::Calibrated { .. }) }
}

/// Everything derived from ranges for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub a: OperandDescriptor,
    pub b: OperandDescriptor,
    pub scales: ScalePair,
    pub mode: ScaleMode,
    pub out_domain: OutputDomain,
    pub out_range: RangeMetadata,
}

pub fn resolve(
    a: &OperandDescriptor,
    b: &OperandDescriptor,
    out_dtype: DType,
    calibration: Option<Calibration>,
    float_output: bool,
) -> Result<Resolution> {
    let out_domain = OutputDomain::for_output(out_dtype, float_output);
    let (out_range, mode) = match calibration {
        Some(c) => {
            if !c.min.is_finite() { return Err(QaddError::NonFiniteRange { name: "min_calib_range", value: c.min }); }
            if !c.max.is_finite() { return Err(QaddError::NonFiniteRange { name: "max_calib_range", value: c.max }); }
            let absmax = max_abs(c.min, c.max);
            if absmax == 0.0 { return Err(QaddError::DegenerateRange("calibrated output range is zero")); }
            let mode = if float_output { ScaleMode::Dequantize } else { ScaleMode::Calibrated { out_scale: out_domain.range() / absmax } };
            (RangeMetadata::new(c.min, c.max), mode)
        }
        None => {
            let total = a.absmax + b.absmax;
            if total == 0.0 { return Err(QaddError::DegenerateRange("both operand ranges are zero")); }
            if !total.is_finite() { return Err(QaddError::NonFiniteRange { name: "A_absmax + B_absmax", value: total }); }
            let mode = if float_output { ScaleMode::Dequantize } else { ScaleMode::Dynamic { total_absmax: total, out_range: out_domain.range() } };
            (RangeMetadata::new(-total, total), mode)
        }
    };
    let scales = ScalePair { a: mode.operand_scale(a), b: mode.operand_scale(b) };
    if !scales.a.is_finite() || !scales.b.is_finite() {
        return Err(QaddError::DegenerateRange("operand scale overflows"));
    }
    Ok(Resolution { a: *a, b: *b, scales, mode, out_domain, out_range })
}
