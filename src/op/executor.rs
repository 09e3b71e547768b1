use std::rc::Rc;

use super::cache::ExecutionPlan;
use super::{OpReq, OUT, OUT_MAX, OUT_MIN};
use crate::engine::memory::Memory;
use crate::engine::primitive::{ArgId, ArgMap, Primitive, ReorderPrimitive, SumDesc, SumPrimitive};
use crate::engine::scratch::ScratchScope;
use crate::engine::stream::Stream;
use crate::engine::Engine;
use crate::error::Result;
use crate::quant::RangeMetadata;
use crate::tensor::Tensor;

/// What must happen to the destination memory after the sum runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutDataOp {
    Noop,
    CopyBack,
    AddBack,
}

/// Pick the memory the sum writes for the given request.
pub fn create_output_mem(out: &Tensor, plan: &ExecutionPlan, req: OpReq, scratch: &mut ScratchScope) -> (OutDataOp, Memory) {
    let dst = plan.dst_desc();
    match req {
        OpReq::Null => (OutDataOp::Noop, scratch.alloc(dst)),
        OpReq::WriteTo | OpReq::WriteInplace if out.desc() == dst => (OutDataOp::Noop, out.memory().clone()),
        OpReq::WriteTo | OpReq::WriteInplace => (OutDataOp::CopyBack, scratch.alloc(dst)),
        OpReq::AddTo => (OutDataOp::AddBack, scratch.alloc(dst)),
    }
}

/// Register whatever moves `mem` into the output tensor.
pub fn commit_output(out: &Tensor, op: OutDataOp, mem: &Memory, stream: &mut Stream) -> Result<()> {
    let (prim, args): (Rc<dyn Primitive>, ArgMap) = match op {
        OutDataOp::Noop => return Ok(()),
        OutDataOp::CopyBack => {
            let prim: Rc<dyn Primitive> = Rc::new(ReorderPrimitive::new(mem.desc(), out.desc(), 1.0)?);
            (prim, [(ArgId::From, mem.clone()), (ArgId::To, out.memory().clone())].into_iter().collect())
        }
        OutDataOp::AddBack => {
            // out += mem, reading out before it is written
            let desc = SumDesc::new(out.desc(), &[1.0, 1.0], &[out.desc().clone(), mem.desc().clone()])?;
            let prim: Rc<dyn Primitive> = Rc::new(SumPrimitive::new(desc, Engine::get()));
            let args = [
                (ArgId::MultipleSrc(0), out.memory().clone()),
                (ArgId::MultipleSrc(1), mem.clone()),
                (ArgId::Dst, out.memory().clone()),
            ];
            (prim, args.into_iter().collect())
        }
    };
    stream.register(prim, args);
    Ok(())
}

/// Run the plan over `a` and `b`, commit into `outputs[OUT]` and write the output range.
#[allow(clippy::too_many_arguments)]
pub fn execute(
    plan: &ExecutionPlan,
    a: &Memory,
    b: &Memory,
    outputs: &[Tensor],
    req: OpReq,
    out_range: RangeMetadata,
    scratch: &mut ScratchScope,
    stream: &mut Stream,
) -> Result<RangeMetadata> {
    let out = &outputs[OUT];
    let (op, dst) = create_output_mem(out, plan, req, scratch);
    let args: ArgMap = [(ArgId::MultipleSrc(0), a.clone()), (ArgId::MultipleSrc(1), b.clone()), (ArgId::Dst, dst.clone())]
        .into_iter()
        .collect();
    stream.register(plan.primitive(), args);
    commit_output(out, op, &dst, stream)?;
    stream.submit()?;

    outputs[OUT_MIN].set_scalar("C_min", out_range.min)?;
    outputs[OUT_MAX].set_scalar("C_max", out_range.max)?;
    Ok(out_range)
}
