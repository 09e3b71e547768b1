//! Quantization domains, operand descriptors and scale derivation.
pub mod reconcile;
pub mod scale;

use crate::error::{QaddError, Result};
use crate::tensor::DType;

pub const INT8_RANGE: f32 = 127.5;
pub const UINT8_RANGE: f32 = 255.5;
pub const INT32_RANGE: f32 = 0x7fff_ffff as f32;

#[inline]
pub fn max_abs(a: f32, b: f32) -> f32 { a.abs().max(b.abs()) }

/// Real-valued extent of an 8-bit quantized domain.
pub fn range_constant(dtype: DType) -> Option<f32> {
    match dtype {
        DType::Int8 => Some(INT8_RANGE),
        DType::Uint8 => Some(UINT8_RANGE),
        _ => None,
    }
}

/// Real range `(min, max)` encoded by a quantized tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMetadata {
    pub min: f32,
    pub max: f32,
}

impl RangeMetadata {
    pub fn new(min: f32, max: f32) -> Self { Self { min, max } }

    pub fn absmax(&self) -> f32 { max_abs(self.min, self.max) }
}

/// Fixed output range from offline calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub min: f32,
    pub max: f32,
}

/// Per-call view of one operand: its domain and absolute range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperandDescriptor {
    pub dtype: DType,
    pub absmax: f32,
    /// Range constant of `dtype`.
    pub range: f32,
}

impl OperandDescriptor {
    pub fn new(what: &'static str, dtype: DType, r: RangeMetadata) -> Result<Self> {
        let range = range_constant(dtype).ok_or(QaddError::UnsupportedDType { what, dtype })?;
        if !r.min.is_finite() { return Err(QaddError::NonFiniteRange { name: what, value: r.min }); }
        if !r.max.is_finite() { return Err(QaddError::NonFiniteRange { name: what, value: r.max }); }
        Ok(Self { dtype, absmax: r.absmax(), range })
    }

    pub fn is_signed(&self) -> bool { self.dtype == DType::Int8 }

    /// Quantized levels per real unit. Infinite for a zero range.
    pub fn scale(&self) -> f32 { self.range / self.absmax }

    /// Same real range expressed in another 8-bit domain.
    pub fn in_domain(&self, dtype: DType) -> Option<Self> {
        range_constant(dtype).map(|range| Self { dtype, absmax: self.absmax, range })
    }
}

/// Rescale factors applied to A and B by the fused sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePair {
    pub a: f32,
    pub b: f32,
}

impl ScalePair {
    pub fn as_array(&self) -> [f32; 2] { [self.a, self.b] }

    pub fn swapped(&self) -> Self { Self { a: self.b, b: self.a } }
}
