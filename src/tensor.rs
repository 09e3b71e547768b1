use serde::{Deserialize, Serialize};

use crate::engine::memory::{Buffer, MemDesc, Memory};
use crate::error::{QaddError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int8,
    Uint8,
    Int32,
    Float32,
}

impl DType {
    pub fn size_of(self) -> usize {
        match self {
            DType::Int8 | DType::Uint8 => 1,
            DType::Int32 | DType::Float32 => 4,
        }
    }

    pub fn is_quantized_8bit(self) -> bool { matches!(self, DType::Int8 | DType::Uint8) }
}

/// Storage layout tag negotiated before the kernel runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    Undefined,
    Default,
    RowSparse,
    Csr,
}

/// Caller-owned tensor handle. Clones share the underlying buffer.
#[derive(Debug, Clone)]
pub struct Tensor {
    mem: Memory,
    stype: StorageType,
}

impl Tensor {
    fn from_buffer(shape: &[usize], data: Buffer) -> Result<Self> {
        Ok(Self { mem: Memory::from_buffer(shape, data)?, stype: StorageType::Default })
    }

    pub fn from_i8(shape: &[usize], data: Vec<i8>) -> Result<Self> { Self::from_buffer(shape, Buffer::I8(data)) }

    pub fn from_u8(shape: &[usize], data: Vec<u8>) -> Result<Self> { Self::from_buffer(shape, Buffer::U8(data)) }

    pub fn from_i32(shape: &[usize], data: Vec<i32>) -> Result<Self> { Self::from_buffer(shape, Buffer::I32(data)) }

    pub fn from_f32(shape: &[usize], data: Vec<f32>) -> Result<Self> { Self::from_buffer(shape, Buffer::F32(data)) }

    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        Self { mem: Memory::new(&MemDesc::new(shape, dtype)), stype: StorageType::Default }
    }

    /// One-element float32 tensor, the form range inputs and outputs take.
    pub fn scalar(v: f32) -> Self {
        Self { mem: Memory::scalar(v), stype: StorageType::Default }
    }

    pub fn with_storage(mut self, stype: StorageType) -> Self {
        self.stype = stype;
        self
    }

    pub fn shape(&self) -> &[usize] { &self.mem.desc().dims }

    pub fn dtype(&self) -> DType { self.mem.desc().dtype }

    pub fn stype(&self) -> StorageType { self.stype }

    pub fn desc(&self) -> &MemDesc { self.mem.desc() }

    pub fn memory(&self) -> &Memory { &self.mem }

    pub fn to_buffer(&self) -> Result<Buffer> { self.mem.snapshot() }

    pub fn to_f32_vec(&self) -> Result<Vec<f32>> { self.mem.read_f32() }

    /// Read a range scalar; `name` is reported on failure.
    pub fn scalar_value(&self, name: &'static str) -> Result<f32> {
        if self.dtype() != DType::Float32 || self.mem.desc().num_elements() != 1 {
            return Err(QaddError::InvalidRangeTensor(name));
        }
        match self.mem.snapshot()? {
            Buffer::F32(v) => Ok(v[0]),
            _ => Err(QaddError::InvalidRangeTensor(name)),
        }
    }

    pub fn set_scalar(&self, name: &'static str, v: f32) -> Result<()> {
        if self.dtype() != DType::Float32 || self.mem.desc().num_elements() != 1 {
            return Err(QaddError::InvalidRangeTensor(name));
        }
        self.mem.store_f32(&[v])
    }
}
