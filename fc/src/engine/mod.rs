//! Coordination engine
//!
//! The [`Engine`] owns the registry, the queue and every active task, and
//! runs the ordered coordination cycle on each [`Engine::tick`].

mod config;
mod core;
mod state;

pub use config::EngineConfig;
pub use core::{CycleReport, Engine};
pub use state::EngineState;
