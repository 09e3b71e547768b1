//! The quantized element-wise add kernel and its graph-facing pieces.
pub mod cache;
pub mod executor;
pub mod fusion;
pub mod param;
pub mod storage;

use serde::{Deserialize, Serialize};

use crate::engine::memory::MemDesc;
use crate::engine::scratch::ScratchScope;
use crate::engine::stream::Stream;
use crate::error::{QaddError, Result};
use crate::quant::reconcile::reconcile;
use crate::quant::scale::{resolve, Resolution};
use crate::quant::{OperandDescriptor, RangeMetadata};
use crate::tensor::{DType, Tensor};
use cache::{ExecutionPlan, PlanKey};
use param::QuantizeElemwiseAddParam;

pub const NUM_INPUTS: usize = 6;
pub const NUM_OUTPUTS: usize = 3;

// Input slots
pub const DATA_A: usize = 0;
pub const DATA_B: usize = 1;
pub const A_MIN: usize = 2;
pub const A_MAX: usize = 3;
pub const B_MIN: usize = 4;
pub const B_MAX: usize = 5;
// Output slots
pub const OUT: usize = 0;
pub const OUT_MIN: usize = 1;
pub const OUT_MAX: usize = 2;

/// How the kernel may write its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpReq {
    Null,
    WriteTo,
    WriteInplace,
    AddTo,
}

pub(crate) fn check_arity(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual { return Err(QaddError::Arity { what, expected, actual }); }
    Ok(())
}

/// `C = A + B` over quantized tensors, with `[C_min, C_max]` written alongside.
///
/// Inputs are `[A, B, A_min, A_max, B_min, B_max]`, outputs `[C, C_min, C_max]`;
/// `req[0]` governs how `C` is written. All checks run before any work is submitted.
pub fn quantized_elemwise_add(param: &QuantizeElemwiseAddParam, inputs: &[Tensor], req: &[OpReq], outputs: &[Tensor]) -> Result<RangeMetadata> {
    check_arity("inputs (A, B, A_min, A_max, B_min, B_max)", NUM_INPUTS, inputs.len())?;
    check_arity("outputs (C, C_min, C_max)", NUM_OUTPUTS, outputs.len())?;
    let req = *req.first().ok_or(QaddError::Arity { what: "write requests", expected: 1, actual: 0 })?;
    param.validate()?;

    let (data_a, data_b, out) = (&inputs[DATA_A], &inputs[DATA_B], &outputs[OUT]);
    if data_a.shape() != data_b.shape() {
        return Err(QaddError::ShapeMismatch { lhs: data_a.shape().to_vec(), rhs: data_b.shape().to_vec() });
    }
    if out.shape() != data_a.shape() {
        return Err(QaddError::ShapeMismatch { lhs: out.shape().to_vec(), rhs: data_a.shape().to_vec() });
    }
    if param.enable_float_output && out.dtype() != DType::Float32 {
        return Err(QaddError::UnsupportedDType { what: "float output", dtype: out.dtype() });
    }

    let in_ranges = [
        inputs[A_MIN].scalar_value("A_min")?,
        inputs[A_MAX].scalar_value("A_max")?,
        inputs[B_MIN].scalar_value("B_min")?,
        inputs[B_MAX].scalar_value("B_max")?,
    ];
    let a = OperandDescriptor::new("A", data_a.dtype(), RangeMetadata::new(in_ranges[0], in_ranges[1]))?;
    let b = OperandDescriptor::new("B", data_b.dtype(), RangeMetadata::new(in_ranges[2], in_ranges[3]))?;
    let res = resolve(&a, &b, out.dtype(), param.calibration(), param.enable_float_output)?;
    let key = PlanKey::new(inputs, out, in_ranges, &res);

    let mut scratch = ScratchScope::enter();
    Stream::with(|stream| {
        let r = run(inputs, outputs, req, &res, key, &mut scratch, stream);
        if r.is_err() { stream.discard(); }
        r
    })
}

fn run(
    inputs: &[Tensor],
    outputs: &[Tensor],
    req: OpReq,
    res: &Resolution,
    key: PlanKey,
    scratch: &mut ScratchScope,
    stream: &mut Stream,
) -> Result<RangeMetadata> {
    let rec = reconcile(inputs[DATA_A].memory().clone(), inputs[DATA_B].memory().clone(), res, scratch, stream)?;
    let dst = MemDesc::new(inputs[DATA_A].shape(), res.out_domain.dtype());
    let srcs = [rec.a.desc().clone(), rec.b.desc().clone()];
    let plan = cache::get_or_build(key, || ExecutionPlan::build(&dst, rec.scales, &srcs))?;
    executor::execute(&plan, &rec.a, &rec.b, outputs, req, res.out_range, scratch, stream)
}
