use super::{check_arity, NUM_INPUTS, NUM_OUTPUTS};
use crate::error::{QaddError, Result};
use crate::tensor::StorageType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Undefined,
    /// Run the dense kernel on tensor handles.
    ComputeEx,
}

/// Storage-type inference for the quantized add: dense in, dense out.
///
/// Undefined slots are resolved to dense. Any sparse slot fails the graph.
pub fn infer_storage_type(in_attrs: &mut [StorageType], out_attrs: &mut [StorageType]) -> Result<DispatchMode> {
    check_arity("inputs (A, B, A_min, A_max, B_min, B_max)", NUM_INPUTS, in_attrs.len())?;
    check_arity("outputs (C, C_min, C_max)", NUM_OUTPUTS, out_attrs.len())?;
    for st in in_attrs.iter_mut() {
        match *st {
            StorageType::Default => {}
            StorageType::Undefined => *st = StorageType::Default,
            stype => return Err(QaddError::UnsupportedStorage { what: "input", stype }),
        }
    }
    for st in out_attrs.iter_mut() {
        match *st {
            StorageType::Default | StorageType::Undefined => *st = StorageType::Default,
            stype => return Err(QaddError::UnsupportedStorage { what: "output", stype }),
        }
    }
    Ok(DispatchMode::ComputeEx)
}
