//! CPU execution backend: memory, primitives, per-thread stream and scratch arena.
pub mod memory;
pub mod primitive;
pub mod scratch;
pub mod stream;

use std::sync::OnceLock;

use log::info;

use crate::config::EngineConfig;

static ENGINE: OnceLock<Engine> = OnceLock::new();

/// Process-wide execution context. Created once, never torn down.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Return the engine, creating it from the environment on first use.
    pub fn get() -> &'static Engine {
        ENGINE.get_or_init(|| Self::create(EngineConfig::from_env()))
    }

    /// Initialize with an explicit config at process start.
    /// Returns false when the engine already exists; the existing config is kept.
    pub fn init(config: EngineConfig) -> bool {
        let mut created = false;
        ENGINE.get_or_init(|| { created = true; Self::create(config) });
        created
    }

    fn create(config: EngineConfig) -> Self {
        info!("Using CPU engine (parallel threshold: {} elements, rayon threads: {})", config.parallel_threshold, rayon::current_num_threads());
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig { &self.config }
}
