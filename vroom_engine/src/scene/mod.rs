//! Scene management module
//!
//! Provides the entity/component scene graph (Scene, Entity, Component) and
//! the SceneManager that loads, unloads and updates scenes.

mod component;
mod entity;
mod scene;
mod scene_manager;

pub use component::{AsAny, Capabilities, Component, ComponentContext, ComponentId};
pub use entity::{Entity, EntityId, EntityMut};
pub use scene::Scene;
pub use scene_manager::{
    EmptySceneLoader, PendingLoad, SceneHandle, SceneLoader, SceneManager, SceneManagerDesc,
};
