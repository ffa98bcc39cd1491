//! Error types for the VROOM engine
//!
//! The scene graph itself never fails: invalid reparenting and operations on
//! missing targets are silent no-ops. Errors only come from the layers that
//! talk to collaborators (scene loaders, worker threads, subsystem setup).

use std::fmt;

/// Result type for VROOM engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// VROOM engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// The scene loader could not build a scene from the given identifier
    SceneLoadFailed(String),

    /// An asynchronous load did not complete (loader panicked or failed)
    AsyncLoadFailed(String),

    /// Initialization failed (engine, scene manager, subsystems)
    InitializationFailed(String),

    /// A background worker thread could not be started
    ThreadSpawnFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SceneLoadFailed(msg) => write!(f, "Scene load failed: {}", msg),
            Error::AsyncLoadFailed(msg) => write!(f, "Async scene load failed: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ThreadSpawnFailed(msg) => write!(f, "Thread spawn failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
