/*!
# VROOM Engine

Scene core of the VROOM game engine.

This crate provides the entity/component scene graph and the machinery that
loads, drives and unloads scenes. Behaviors are plugged in as trait objects
(`Component`) and scenes are built by a pluggable `SceneLoader`.

## Architecture

- **Component**: Behavior attached to one entity, driven through lifecycle callbacks
- **Entity**: Node of the scene graph (components + children)
- **Scene**: Owner of its entities, drives their per-frame update
- **SceneManager**: Owner of the loaded scenes (sync/async/additive load, unload)
- **Engine**: Owner of the subsystems and of the frame loop
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod scene;
pub mod components;

// Main vroom namespace module
pub mod vroom {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine instance and configuration
    pub use crate::engine::{Engine, EngineConfig};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // engine_* macros live at the crate root (#[macro_export]), not in this namespace
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
    }

    // Built-in components
    pub mod components {
        pub use crate::components::*;
    }
}

// Re-export math library at crate root
pub use glam;
