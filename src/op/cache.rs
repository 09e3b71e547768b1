use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::engine::memory::MemDesc;
use crate::engine::primitive::{Primitive, SumDesc, SumPrimitive};
use crate::engine::Engine;
use crate::error::Result;
use crate::quant::scale::{OutputDomain, Resolution};
use crate::quant::ScalePair;
use crate::tensor::{DType, Tensor};

thread_local! {
    static PLANS: RefCell<PlanCache> = RefCell::new(PlanCache::default());
}

/// Structural signature of a call: shapes, dtypes and range scalars, never tensor contents.
///
/// Every input of scale derivation is part of the key, so a hit always carries the
/// scales this call would have computed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanKey {
    inputs: Vec<(Vec<usize>, DType)>,
    output: (Vec<usize>, DType),
    /// Bit patterns of A_min, A_max, B_min, B_max, C_min, C_max.
    ranges: [u32; 6],
    out_domain: OutputDomain,
    calibrated: bool,
}

impl PlanKey {
    pub fn new(inputs: &[Tensor], output: &Tensor, in_ranges: [f32; 4], res: &Resolution) -> Self {
        let [a_min, a_max, b_min, b_max] = in_ranges;
        Self {
            inputs: inputs.iter().map(|t| (t.shape().to_vec(), t.dtype())).collect(),
            output: (output.shape().to_vec(), output.dtype()),
            ranges: [a_min, a_max, b_min, b_max, res.out_range.min, res.out_range.max].map(f32::to_bits),
            out_domain: res.out_domain,
            calibrated: res.mode.is_calibrated(),
        }
    }
}

/// A constructed fused sum with the descriptors and scales it was built from.
pub struct ExecutionPlan {
    scales: ScalePair,
    primitive: Rc<SumPrimitive>,
}

impl ExecutionPlan {
    pub fn build(dst: &MemDesc, scales: ScalePair, srcs: &[MemDesc]) -> Result<Self> {
        let desc = SumDesc::new(dst, &scales.as_array(), srcs)?;
        Ok(Self { scales, primitive: Rc::new(SumPrimitive::new(desc, Engine::get())) })
    }

    pub fn dst_desc(&self) -> &MemDesc { self.primitive.desc().dst_desc() }

    pub fn src_descs(&self) -> &[MemDesc] { self.primitive.desc().src_descs() }

    pub fn scales(&self) -> ScalePair { self.scales }

    pub fn primitive(&self) -> Rc<dyn Primitive> { self.primitive.clone() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub builds: u64,
    pub hits: u64,
}

/// Per-thread plan table. No eviction.
#[derive(Default)]
pub struct PlanCache {
    plans: FxHashMap<PlanKey, Rc<ExecutionPlan>>,
    builds: u64,
    hits: u64,
}

impl PlanCache {
    /// Return the plan for `key`, building it on a miss. A hit is returned as is.
    pub fn get_or_build<F>(&mut self, key: PlanKey, build: F) -> Result<Rc<ExecutionPlan>>
    where
        F: FnOnce() -> Result<ExecutionPlan>,
    {
        if let Some(plan) = self.plans.get(&key) {
            self.hits += 1;
            return Ok(plan.clone());
        }
        let plan = Rc::new(build()?);
        self.builds += 1;
        if Engine::get().config().verbose_cache {
            info!("built sum plan #{} for {:?} with scales {:?}", self.builds, key, plan.scales);
        } else {
            debug!("built sum plan #{} ({} cached) with scales {:?}", self.builds, self.plans.len() + 1, plan.scales);
        }
        self.plans.insert(key, plan.clone());
        Ok(plan)
    }

    pub fn stats(&self) -> CacheStats { CacheStats { entries: self.plans.len(), builds: self.builds, hits: self.hits } }

    pub fn clear(&mut self) {
        self.plans.clear();
        self.builds = 0;
        self.hits = 0;
    }
}

/// Look up or build a plan in this thread's cache.
pub fn get_or_build<F>(key: PlanKey, build: F) -> Result<Rc<ExecutionPlan>>
where
    F: FnOnce() -> Result<ExecutionPlan>,
{
    PLANS.with(|c| c.borrow_mut().get_or_build(key, build))
}

pub fn cache_stats() -> CacheStats { PLANS.with(|c| c.borrow().stats()) }

/// Drop this thread's plans and reset its counters.
pub fn clear_cache() { PLANS.with(|c| c.borrow_mut().clear()) }
