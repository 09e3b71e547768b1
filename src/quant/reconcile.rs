use std::rc::Rc;

use log::debug;

use super::scale::Resolution;
use super::{OperandDescriptor, ScalePair};
use crate::engine::memory::Memory;
use crate::engine::primitive::{ArgId, ArgMap, ReorderPrimitive};
use crate::engine::scratch::ScratchScope;
use crate::engine::stream::Stream;
use crate::error::{QaddError, Result};

/// Which operand sits in the signed domain when the two differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    A,
    B,
}

impl Anchor {
    pub fn select(a: &OperandDescriptor, b: &OperandDescriptor) -> Option<Self> {
        if a.dtype == b.dtype { None } else if a.is_signed() { Some(Anchor::A) } else { Some(Anchor::B) }
    }
}

/// Reorder scale for the mover and the scale pair the fused sum must use afterwards.
///
/// The mover keeps its own real range, re-expressed in the anchor's domain. Its sum
/// scale then comes from the same mode function as any same-domain operand.
/// The reorder scale is therefore mode-independent; calibrated and dynamic
/// calls differ only through the mover's sum scale.
pub fn cross_type_scales(anchor: Anchor, res: &Resolution) -> Result<(f32, ScalePair)> {
    let (anchor_desc, mover_desc) = match anchor {
        Anchor::A => (res.a, res.b),
        Anchor::B => (res.b, res.a),
    };
    let moved = mover_desc
        .in_domain(anchor_desc.dtype)
        .ok_or(QaddError::UnsupportedDType { what: "cross-type anchor", dtype: anchor_desc.dtype })?;
    let reorder_scale = anchor_desc.range / mover_desc.range;
    let mover_scale = res.mode.operand_scale(&moved);
    let scales = match anchor {
        Anchor::A => ScalePair { a: res.scales.a, b: mover_scale },
        Anchor::B => ScalePair { a: mover_scale, b: res.scales.b },
    };
    Ok((reorder_scale, scales))
}

/// Operand memories and scales ready for the fused sum.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub a: Memory,
    pub b: Memory,
    pub scales: ScalePair,
    pub anchor: Option<Anchor>,
    pub reorder_scale: Option<f32>,
}

/// Bring both operands into one domain, registering a reorder for the mover when needed.
pub fn reconcile(a: Memory, b: Memory, res: &Resolution, scratch: &mut ScratchScope, stream: &mut Stream) -> Result<Reconciled> {
    let anchor = match Anchor::select(&res.a, &res.b) {
        Some(anchor) => anchor,
        None => return Ok(Reconciled { a, b, scales: res.scales, anchor: None, reorder_scale: None }),
    };
    let (reorder_scale, scales) = cross_type_scales(anchor, res)?;
    let (anchor_mem, mover_mem) = match anchor {
        Anchor::A => (&a, &b),
        Anchor::B => (&b, &a),
    };
    let target = mover_mem.desc().with_dtype(anchor_mem.desc().dtype);
    let rescaled = scratch.alloc(&target);
    let prim = ReorderPrimitive::new(mover_mem.desc(), &target, reorder_scale)?;
    let mut args = ArgMap::new();
    args.insert(ArgId::From, mover_mem.clone());
    args.insert(ArgId::To, rescaled.clone());
    stream.register(Rc::new(prim), args);
    debug!("cross-type add: anchor {:?}, mover {:?} -> {:?} at scale {}", anchor, mover_mem.desc().dtype, target.dtype, reorder_scale);
    let (a, b) = match anchor {
        Anchor::A => (a, rescaled),
        Anchor::B => (rescaled, b),
    };
    Ok(Reconciled { a, b, scales, anchor: Some(anchor), reorder_scale: Some(reorder_scale) })
}
