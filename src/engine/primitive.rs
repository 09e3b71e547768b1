use std::collections::HashMap;

use rayon::prelude::*;

use super::memory::{MemDesc, Memory};
use super::Engine;
use crate::error::{QaddError, Result};

/// Argument slots a primitive binds memory to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgId {
    MultipleSrc(usize),
    From,
    To,
    Dst,
}

pub type ArgMap = HashMap<ArgId, Memory>;

/// A constructed, reusable unit of work. Reads every source before writing the destination.
pub trait Primitive {
    fn kind(&self) -> &'static str;
    fn execute(&self, args: &ArgMap) -> Result<()>;
}

fn bound<'a>(args: &'a ArgMap, id: ArgId, expect: &MemDesc) -> Result<&'a Memory> {
    let m = args.get(&id).ok_or_else(|| QaddError::MissingArgument(format!("{:?}", id)))?;
    if m.desc() != expect {
        return Err(QaddError::InvalidDescriptor(format!("{:?} bound to {:?}, primitive expects {:?}", id, m.desc(), expect)));
    }
    Ok(m)
}

/// Descriptor for `dst = sum_i scales[i] * src[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SumDesc {
    dst: MemDesc,
    srcs: Vec<MemDesc>,
    scales: Vec<f32>,
}

impl SumDesc {
    pub fn new(dst: &MemDesc, scales: &[f32], srcs: &[MemDesc]) -> Result<Self> {
        if srcs.is_empty() { return Err(QaddError::InvalidDescriptor("sum needs at least one source".into())); }
        if scales.len() != srcs.len() {
            return Err(QaddError::InvalidDescriptor(format!("{} scales for {} sources", scales.len(), srcs.len())));
        }
        if let Some(s) = srcs.iter().find(|s| s.dims != dst.dims) {
            return Err(QaddError::InvalidDescriptor(format!("source dims {:?} differ from destination {:?}", s.dims, dst.dims)));
        }
        if scales.iter().any(|s| !s.is_finite()) {
            return Err(QaddError::InvalidDescriptor(format!("non-finite sum scales {:?}", scales)));
        }
        Ok(Self { dst: dst.clone(), srcs: srcs.to_vec(), scales: scales.to_vec() })
    }

    pub fn dst_desc(&self) -> &MemDesc { &self.dst }

    pub fn src_descs(&self) -> &[MemDesc] { &self.srcs }

    pub fn scales(&self) -> &[f32] { &self.scales }
}

pub struct SumPrimitive {
    desc: SumDesc,
    parallel_threshold: usize,
}

impl SumPrimitive {
    pub fn new(desc: SumDesc, engine: &Engine) -> Self {
        Self::with_parallel_threshold(desc, engine.config().parallel_threshold)
    }

    /// Split across the rayon pool once the destination has `threshold` elements.
    pub fn with_parallel_threshold(desc: SumDesc, threshold: usize) -> Self {
        Self { desc, parallel_threshold: threshold }
    }

    pub fn desc(&self) -> &SumDesc { &self.desc }
}

impl Primitive for SumPrimitive {
    fn kind(&self) -> &'static str { "sum" }

    fn execute(&self, args: &ArgMap) -> Result<()> {
        let n = self.desc.dst.num_elements();
        let mut acc = vec![0f32; n];
        for (i, (src, &scale)) in self.desc.srcs.iter().zip(&self.desc.scales).enumerate() {
            let vals = bound(args, ArgId::MultipleSrc(i), src)?.read_f32()?;
            if n >= self.parallel_threshold {
                acc.par_iter_mut().zip(vals.par_iter()).for_each(|(a, v)| *a += scale * v);
            } else {
                for (a, v) in acc.iter_mut().zip(&vals) { *a += scale * v; }
            }
        }
        bound(args, ArgId::Dst, &self.desc.dst)?.store_f32(&acc)
    }
}

/// Type and scale conversion: `to = saturate(round(from * scale))`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderPrimitive {
    src: MemDesc,
    dst: MemDesc,
    scale: f32,
}

impl ReorderPrimitive {
    pub fn new(src: &MemDesc, dst: &MemDesc, scale: f32) -> Result<Self> {
        if src.dims != dst.dims {
            return Err(QaddError::InvalidDescriptor(format!("reorder dims {:?} -> {:?}", src.dims, dst.dims)));
        }
        if !scale.is_finite() { return Err(QaddError::InvalidDescriptor(format!("non-finite reorder scale {}", scale))); }
        Ok(Self { src: src.clone(), dst: dst.clone(), scale })
    }

    pub fn scale(&self) -> f32 { self.scale }
}

impl Primitive for ReorderPrimitive {
    fn kind(&self) -> &'static str { "reorder" }

    fn execute(&self, args: &ArgMap) -> Result<()> {
        let mut vals = bound(args, ArgId::From, &self.src)?.read_f32()?;
        if self.scale != 1.0 { for v in vals.iter_mut() { *v *= self.scale; } }
        bound(args, ArgId::To, &self.dst)?.store_f32(&vals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::Buffer;
    use crate::tensor::DType;

    fn mem(dims: &[usize], data: Buffer) -> Memory { Memory::from_buffer(dims, data).unwrap() }

    #[test]
    fn sum_applies_scales_and_saturates() {
        let a = mem(&[4], Buffer::I8(vec![10, -10, 100, 0]));
        let b = mem(&[4], Buffer::U8(vec![1, 2, 200, 255]));
        let dst = Memory::new(&MemDesc::new(&[4], DType::Int8));
        let desc = SumDesc::new(dst.desc(), &[0.5, 1.0], &[a.desc().clone(), b.desc().clone()]).unwrap();
        let prim = SumPrimitive::new(desc, Engine::get());
        let args: ArgMap = [(ArgId::MultipleSrc(0), a), (ArgId::MultipleSrc(1), b), (ArgId::Dst, dst.clone())].into_iter().collect();
        prim.execute(&args).unwrap();
        assert_eq!(dst.snapshot().unwrap(), Buffer::I8(vec![6, -3, 127, 127]));
    }

    #[test]
    fn parallel_sum_matches_serial() {
        let n = 4099;
        let a = mem(&[n], Buffer::U8((0..n).map(|i| (i * 31 % 256) as u8).collect()));
        let b = mem(&[n], Buffer::I8((0..n).map(|i| (i * 17 % 256) as u8 as i8).collect()));
        let desc = SumDesc::new(&MemDesc::new(&[n], DType::Int32), &[0.37, -1.9], &[a.desc().clone(), b.desc().clone()]).unwrap();
        let run = |threshold| {
            let dst = Memory::new(desc.dst_desc());
            let prim = SumPrimitive::with_parallel_threshold(desc.clone(), threshold);
            let args: ArgMap = [(ArgId::MultipleSrc(0), a.clone()), (ArgId::MultipleSrc(1), b.clone()), (ArgId::Dst, dst.clone())].into_iter().collect();
            prim.execute(&args).unwrap();
            dst.snapshot().unwrap()
        };
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        assert_eq!(pool.install(|| run(1)), run(usize::MAX));
    }

    #[test]
    fn sum_destination_may_alias_source() {
        let a = mem(&[3], Buffer::I32(vec![1, 2, 3]));
        let b = mem(&[3], Buffer::I32(vec![10, 20, 30]));
        let desc = SumDesc::new(a.desc(), &[1.0, 1.0], &[a.desc().clone(), b.desc().clone()]).unwrap();
        let prim = SumPrimitive::new(desc, Engine::get());
        let args: ArgMap = [(ArgId::MultipleSrc(0), a.clone()), (ArgId::MultipleSrc(1), b), (ArgId::Dst, a.clone())].into_iter().collect();
        prim.execute(&args).unwrap();
        assert_eq!(a.snapshot().unwrap(), Buffer::I32(vec![11, 22, 33]));
    }

    #[test]
    fn sum_desc_rejects_mismatched_dims_and_scale_count() {
        let d4 = MemDesc::new(&[4], DType::Int8);
        let d5 = MemDesc::new(&[5], DType::Int8);
        assert!(SumDesc::new(&d4, &[1.0], &[d4.clone(), d4.clone()]).is_err());
        assert!(SumDesc::new(&d4, &[1.0, 1.0], &[d4.clone(), d5]).is_err());
        assert!(SumDesc::new(&d4, &[1.0, f32::INFINITY], &[d4.clone(), d4.clone()]).is_err());
    }

    #[test]
    fn execute_reports_missing_and_mismatched_args() {
        let d = MemDesc::new(&[2], DType::Int8);
        let prim = ReorderPrimitive::new(&d, &d.with_dtype(DType::Int32), 2.0).unwrap();
        let from = Memory::new(&d);
        let args: ArgMap = [(ArgId::From, from.clone())].into_iter().collect();
        assert!(matches!(prim.execute(&args), Err(QaddError::MissingArgument(_))));
        let args: ArgMap = [(ArgId::From, from.clone()), (ArgId::To, from)].into_iter().collect();
        assert!(matches!(prim.execute(&args), Err(QaddError::InvalidDescriptor(_))));
    }

    #[test]
    fn reorder_converts_type_with_scale() {
        let from = mem(&[3], Buffer::U8(vec![0, 100, 255]));
        let to = Memory::new(&MemDesc::new(&[3], DType::Int8));
        let prim = ReorderPrimitive::new(from.desc(), to.desc(), 0.5).unwrap();
        let args: ArgMap = [(ArgId::From, from), (ArgId::To, to.clone())].into_iter().collect();
        prim.execute(&args).unwrap();
        // 127.5 rounds to 128 and saturates
        assert_eq!(to.snapshot().unwrap(), Buffer::I8(vec![0, 50, 127]));
    }
}
