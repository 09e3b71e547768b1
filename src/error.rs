use thiserror::Error;

use crate::tensor::{DType, StorageType};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QaddError {
    #[error("{what}: expected {expected}, got {actual}")]
    Arity { what: &'static str, expected: usize, actual: usize },
    #[error("unsupported storage type {stype:?} for {what}")]
    UnsupportedStorage { what: &'static str, stype: StorageType },
    #[error("degenerate quantization range: {0}")]
    DegenerateRange(&'static str),
    #[error("non-finite range scalar {name} = {value}")]
    NonFiniteRange { name: &'static str, value: f32 },
    #[error("unsupported dtype {dtype:?} for {what}")]
    UnsupportedDType { what: &'static str, dtype: DType },
    #[error("shape mismatch: {lhs:?} vs {rhs:?}")]
    ShapeMismatch { lhs: Vec<usize>, rhs: Vec<usize> },
    #[error("range input {0} must be a single float32 element")]
    InvalidRangeTensor(&'static str),
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("missing primitive argument {0}")]
    MissingArgument(String),
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
    #[error("tensor buffer lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, QaddError>;
