use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::parse_bool;
use crate::error::{QaddError, Result};
use crate::quant::Calibration;

/// String attributes attached to a graph node.
pub type Attrs = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeElemwiseAddParam {
    pub min_calib_range: Option<f32>,
    pub max_calib_range: Option<f32>,
    /// Write the sum dequantized to float32.
    pub enable_float_output: bool,
}

impl QuantizeElemwiseAddParam {
    pub fn calibrated(min: f32, max: f32) -> Self {
        Self { min_calib_range: Some(min), max_calib_range: Some(max), enable_float_output: false }
    }

    /// Parse node attributes. Keys wrapped in double underscores are graph-internal and skipped.
    pub fn from_attrs(attrs: &Attrs) -> Result<Self> {
        let mut p = Self::default();
        for (k, v) in attrs {
            match k.as_str() {
                "min_calib_range" => p.min_calib_range = parse_optional_f32(k, v)?,
                "max_calib_range" => p.max_calib_range = parse_optional_f32(k, v)?,
                "enable_float_output" => {
                    p.enable_float_output = parse_bool(v).ok_or_else(|| QaddError::InvalidParam(format!("{}={:?} is not a bool", k, v)))?;
                }
                _ if k.starts_with("__") && k.ends_with("__") => {}
                _ => return Err(QaddError::InvalidParam(format!("unknown attribute {:?}", k))),
            }
        }
        p.validate()?;
        Ok(p)
    }

    /// Inverse of `from_attrs`; values are written in shortest round-trip form.
    pub fn to_attrs(&self) -> Attrs {
        let mut attrs = Attrs::new();
        let fmt = |v: Option<f32>| v.map_or_else(|| "None".to_string(), |x| x.to_string());
        attrs.insert("min_calib_range".into(), fmt(self.min_calib_range));
        attrs.insert("max_calib_range".into(), fmt(self.max_calib_range));
        attrs.insert("enable_float_output".into(), if self.enable_float_output { "True" } else { "False" }.into());
        attrs
    }

    /// Calibration bounds must come as a finite, ordered pair or not at all.
    pub fn validate(&self) -> Result<()> {
        match (self.min_calib_range, self.max_calib_range) {
            (None, None) => Ok(()),
            (Some(min), Some(max)) => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(QaddError::InvalidParam(format!("calibration range [{}, {}] is not finite", min, max)));
                }
                if min > max {
                    return Err(QaddError::InvalidParam(format!("min_calib_range {} exceeds max_calib_range {}", min, max)));
                }
                Ok(())
            }
            _ => Err(QaddError::InvalidParam("min_calib_range and max_calib_range must be set together".into())),
        }
    }

    pub fn calibration(&self) -> Option<Calibration> {
        match (self.min_calib_range, self.max_calib_range) {
            (Some(min), Some(max)) => Some(Calibration { min, max }),
            _ => None,
        }
    }
}

fn parse_optional_f32(key: &str, v: &str) -> Result<Option<f32>> {
    let v = v.trim();
    if v.is_empty() || v == "None" { return Ok(None); }
    v.parse::<f32>().map(Some).map_err(|e| QaddError::InvalidParam(format!("{}={:?}: {}", key, v, e)))
}
