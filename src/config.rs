use serde::{Deserialize, Serialize};

/// Engine tuning knobs. Read once when the engine is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Element count from which primitives split work across the rayon pool.
    pub parallel_threshold: usize,
    /// Log every plan-cache build at info level instead of debug.
    pub verbose_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self { Self { parallel_threshold: 1 << 16, verbose_cache: false } }
}

impl EngineConfig {
    /// Defaults overridden by `QADD_PARALLEL_THRESHOLD` and `QADD_VERBOSE_CACHE`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            parallel_threshold: env_usize("QADD_PARALLEL_THRESHOLD", d.parallel_threshold),
            verbose_cache: env_flag("QADD_VERBOSE_CACHE", d.verbose_cache),
        }
    }
}

pub(crate) fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

pub(crate) fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => parse_bool(&v).unwrap_or(default),
        Err(_) => default,
    }
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "true" | "True" | "TRUE" => Some(true),
        "0" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_graph_attr_spellings() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let c: EngineConfig = serde_json::from_str(r#"{"verbose_cache": true}"#).unwrap();
        assert!(c.verbose_cache);
        assert_eq!(c.parallel_threshold, EngineConfig::default().parallel_threshold);
    }
}
