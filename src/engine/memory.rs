use std::sync::{Arc, RwLock};

use crate::error::{QaddError, Result};
use crate::tensor::DType;

/// Dense row-major memory descriptor: dims plus element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemDesc {
    pub dims: Vec<usize>,
    pub dtype: DType,
}

impl MemDesc {
    pub fn new(dims: &[usize], dtype: DType) -> Self { Self { dims: dims.to_vec(), dtype } }

    pub fn num_elements(&self) -> usize { self.dims.iter().product() }

    pub fn with_dtype(&self, dtype: DType) -> Self { Self { dims: self.dims.clone(), dtype } }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I32(Vec<i32>),
    F32(Vec<f32>),
}

impl Buffer {
    pub fn zeros(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::Int8 => Buffer::I8(vec![0; n]),
            DType::Uint8 => Buffer::U8(vec![0; n]),
            DType::Int32 => Buffer::I32(vec![0; n]),
            DType::Float32 => Buffer::F32(vec![0.0; n]),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Buffer::I8(_) => DType::Int8,
            Buffer::U8(_) => DType::Uint8,
            Buffer::I32(_) => DType::Int32,
            Buffer::F32(_) => DType::Float32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buffer::I8(v) => v.len(),
            Buffer::U8(v) => v.len(),
            Buffer::I32(v) => v.len(),
            Buffer::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Widen every element to f32.
    pub fn to_f32(&self) -> Vec<f32> {
        match self {
            Buffer::I8(v) => v.iter().map(|&x| x as f32).collect(),
            Buffer::U8(v) => v.iter().map(|&x| x as f32).collect(),
            Buffer::I32(v) => v.iter().map(|&x| x as f32).collect(),
            Buffer::F32(v) => v.clone(),
        }
    }

    /// Store f32 values, rounding half to even and saturating for integer types.
    pub fn store_f32(&mut self, vals: &[f32]) {
        match self {
            Buffer::I8(v) => for (d, s) in v.iter_mut().zip(vals) { *d = s.round_ties_even() as i8; },
            Buffer::U8(v) => for (d, s) in v.iter_mut().zip(vals) { *d = s.round_ties_even() as u8; },
            Buffer::I32(v) => for (d, s) in v.iter_mut().zip(vals) { *d = s.round_ties_even() as i32; },
            Buffer::F32(v) => {
                let n = v.len();
                v.copy_from_slice(&vals[..n]);
            }
        }
    }
}

/// Shared handle to a typed buffer. Clones alias the same storage.
#[derive(Debug, Clone)]
pub struct Memory {
    desc: MemDesc,
    data: Arc<RwLock<Buffer>>,
}

impl Memory {
    pub fn new(desc: &MemDesc) -> Self {
        let data = Buffer::zeros(desc.dtype, desc.num_elements());
        Self { desc: desc.clone(), data: Arc::new(RwLock::new(data)) }
    }

    pub fn from_buffer(dims: &[usize], data: Buffer) -> Result<Self> {
        let desc = MemDesc::new(dims, data.dtype());
        if desc.num_elements() != data.len() {
            return Err(QaddError::InvalidDescriptor(format!(
                "dims {:?} hold {} elements, buffer has {}", dims, desc.num_elements(), data.len()
            )));
        }
        Ok(Self { desc, data: Arc::new(RwLock::new(data)) })
    }

    /// One-element float32 memory holding `v`.
    pub fn scalar(v: f32) -> Self {
        Self { desc: MemDesc::new(&[1], DType::Float32), data: Arc::new(RwLock::new(Buffer::F32(vec![v]))) }
    }

    pub fn desc(&self) -> &MemDesc { &self.desc }

    pub fn snapshot(&self) -> Result<Buffer> {
        let g = self.data.read().map_err(|_| QaddError::Poisoned)?;
        Ok(g.clone())
    }

    pub fn read_f32(&self) -> Result<Vec<f32>> {
        let g = self.data.read().map_err(|_| QaddError::Poisoned)?;
        Ok(g.to_f32())
    }

    pub fn store_f32(&self, vals: &[f32]) -> Result<()> {
        if vals.len() != self.desc.num_elements() {
            return Err(QaddError::InvalidDescriptor(format!(
                "store of {} values into {} elements", vals.len(), self.desc.num_elements()
            )));
        }
        let mut g = self.data.write().map_err(|_| QaddError::Poisoned)?;
        g.store_f32(vals);
        Ok(())
    }

    /// True when both handles point at the same storage.
    pub fn aliases(&self, other: &Memory) -> bool { Arc::ptr_eq(&self.data, &other.data) }

    pub(crate) fn is_shared(&self) -> bool { Arc::strong_count(&self.data) > 1 }
}
