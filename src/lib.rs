// Quantized int8/uint8 element-wise add with per-thread cached sum plans
pub mod config;
pub mod engine;
pub mod error;
pub mod op;
pub mod quant;
pub mod tensor;

pub use error::{QaddError, Result};
pub use op::param::QuantizeElemwiseAddParam;
pub use op::{quantized_elemwise_add, OpReq};
pub use quant::RangeMetadata;
pub use tensor::{DType, StorageType, Tensor};
