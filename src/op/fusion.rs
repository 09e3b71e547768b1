use log::debug;
use serde::{Deserialize, Serialize};

use super::param::{Attrs, QuantizeElemwiseAddParam};
use crate::config::env_flag;
use crate::error::Result;

/// Calibration carried by a requantize node following the add.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RequantizeParam {
    pub min_calib_range: Option<f32>,
    pub max_calib_range: Option<f32>,
}

/// Post-quantization pass folding `add -> requantize [-> dequantize]` into the add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostQuantizeFusion {
    pub fuse_requantize: bool,
    pub float_output: bool,
}

impl Default for PostQuantizeFusion {
    fn default() -> Self { Self { fuse_requantize: true, float_output: true } }
}

impl PostQuantizeFusion {
    /// `QADD_FUSE_REQUANTIZE` and `QADD_FUSE_DEQUANTIZE`, both on by default.
    pub fn from_env() -> Self {
        Self { fuse_requantize: env_flag("QADD_FUSE_REQUANTIZE", true), float_output: env_flag("QADD_FUSE_DEQUANTIZE", true) }
    }

    /// Rewrite the add's attributes for the fused node and re-parse them.
    /// Returns `None` when the pattern is not fusable; `attrs` is then untouched.
    pub fn fold(&self, attrs: &mut Attrs, requantize: &RequantizeParam, followed_by_dequantize: bool) -> Result<Option<QuantizeElemwiseAddParam>> {
        if !self.fuse_requantize { return Ok(None); }
        let (min, max) = match (requantize.min_calib_range, requantize.max_calib_range) {
            (Some(min), Some(max)) => (min, max),
            _ => return Ok(None),
        };
        if followed_by_dequantize && self.float_output {
            attrs.insert("enable_float_output".into(), "True".into());
        } else {
            attrs.insert("min_calib_range".into(), format!("{:.6}", min));
            attrs.insert("max_calib_range".into(), format!("{:.6}", max));
        }
        debug!("fused requantize into quantized add: {:?}", attrs);
        QuantizeElemwiseAddParam::from_attrs(attrs).map(Some)
    }
}
