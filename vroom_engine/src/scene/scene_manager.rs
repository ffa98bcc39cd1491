//! Central scene manager for the engine.
//!
//! Owns the managed scenes and tracks which one is active. Scenes are built
//! by a pluggable `SceneLoader`, either on the calling thread or on a worker
//! thread (`load_scene_async`). The (scenes, active) pair is guarded by a
//! single mutex; the loader always runs outside of it.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use crate::error::{Error, Result};
use crate::log::{DefaultLogger, Logger};
use crate::{engine_debug, engine_error, engine_info, engine_warn};
use super::scene::Scene;

/// Shared handle to a managed scene
pub type SceneHandle = Arc<Mutex<Scene>>;

// ===== SCENE LOADER =====

/// Builds scenes from identifiers
///
/// The manager never interprets the identifier: it can be a file path, an
/// asset key, a level name, ...
pub trait SceneLoader: Send + Sync {
    /// Build the scene described by `identifier`
    fn create_scene_from_identifier(&self, identifier: &str) -> Result<Scene>;
}

/// Loader returning an empty scene named after the identifier
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySceneLoader;

impl SceneLoader for EmptySceneLoader {
    fn create_scene_from_identifier(&self, identifier: &str) -> Result<Scene> {
        Ok(Scene::named(identifier))
    }
}

// ===== SCENE MANAGER DESC =====

/// Scene manager creation parameters
pub struct SceneManagerDesc {
    /// Scene factory used by every load operation
    pub loader: Arc<dyn SceneLoader>,
    /// Log sink
    pub logger: Arc<dyn Logger>,
    /// Start with one empty active scene
    pub create_default_scene: bool,
}

impl Default for SceneManagerDesc {
    fn default() -> Self {
        Self {
            loader: Arc::new(EmptySceneLoader),
            logger: Arc::new(DefaultLogger::default()),
            create_default_scene: true,
        }
    }
}

// ===== PENDING LOAD =====

/// Handle to a scene load running on a worker thread
///
/// The scene is installed by the worker as soon as the loader returns, even
/// if this handle is dropped.
pub struct PendingLoad {
    identifier: String,
    handle: JoinHandle<Result<SceneHandle>>,
}

impl PendingLoad {
    /// Identifier passed to the loader
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// True once the worker has finished (successfully or not)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the scene is loaded and installed
    pub fn wait(self) -> Result<SceneHandle> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::AsyncLoadFailed(format!(
                "loader panicked while building '{}'",
                self.identifier
            ))),
        }
    }
}

// ===== SCENE MANAGER =====

#[derive(Clone, Copy, Debug, PartialEq)]
enum LoadMode {
    Replace,
    Additive,
}

struct ManagedScene {
    identifier: String,
    scene: SceneHandle,
}

#[derive(Default)]
struct SceneSet {
    scenes: Vec<ManagedScene>,
    active: Option<SceneHandle>,
}

/// Owner of the loaded scenes
///
/// Always handled through an `Arc` so that scenes can refer back to it and
/// worker threads can install their result.
pub struct SceneManager {
    state: Mutex<SceneSet>,
    loader: Arc<dyn SceneLoader>,
    logger: Arc<dyn Logger>,
    self_ref: Weak<SceneManager>,
}

impl SceneManager {
    /// Manager with the empty-scene loader, the default logger and one
    /// default scene
    pub fn new() -> Arc<Self> {
        Self::from_desc(SceneManagerDesc::default())
    }

    pub fn from_desc(desc: SceneManagerDesc) -> Arc<Self> {
        let manager = Arc::new_cyclic(|self_ref| Self {
            state: Mutex::new(SceneSet::default()),
            loader: desc.loader,
            logger: desc.logger,
            self_ref: self_ref.clone(),
        });

        if desc.create_default_scene {
            let scene = manager.adopt(Scene::named("default"));
            let mut state = manager.lock_state();
            state.scenes.push(ManagedScene {
                identifier: "default".to_string(),
                scene: scene.clone(),
            });
            state.active = Some(scene);
        }

        engine_debug!(manager.logger, "vroom::SceneManager", "SceneManager created");
        manager
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    // ===== LOAD =====

    /// Replace every managed scene with the scene built for `identifier`
    ///
    /// On loader failure the managed scenes are left untouched.
    pub fn load_scene(&self, identifier: &str) -> Result<SceneHandle> {
        engine_info!(self.logger, "vroom::SceneManager", "Loading scene '{}'", identifier);
        let scene = self.build(identifier)?;
        Ok(self.install(identifier, scene, LoadMode::Replace))
    }

    /// Replace every managed scene with a ready-made one
    ///
    /// `None` unloads everything and leaves no active scene.
    pub fn load_scene_instance(&self, scene: Option<Scene>) -> Option<SceneHandle> {
        match scene {
            Some(scene) => {
                let identifier = scene.name().to_string();
                engine_info!(self.logger, "vroom::SceneManager", "Loading scene instance '{}'", identifier);
                Some(self.install(&identifier, scene, LoadMode::Replace))
            }
            None => {
                let discarded = {
                    let mut state = self.lock_state();
                    state.active = None;
                    std::mem::take(&mut state.scenes)
                };
                engine_info!(
                    self.logger,
                    "vroom::SceneManager",
                    "Unloaded all scenes ({})",
                    discarded.len()
                );
                None
            }
        }
    }

    /// Like `load_scene`, with the loader running on a worker thread
    pub fn load_scene_async(&self, identifier: &str) -> Result<PendingLoad> {
        self.spawn_load(identifier, LoadMode::Replace)
    }

    /// Append the scene built for `identifier` to the managed scenes
    ///
    /// It becomes active only if no scene is active.
    pub fn load_scene_additive(&self, identifier: &str) -> Result<SceneHandle> {
        engine_info!(self.logger, "vroom::SceneManager", "Loading scene '{}' (additive)", identifier);
        let scene = self.build(identifier)?;
        Ok(self.install(identifier, scene, LoadMode::Additive))
    }

    /// Like `load_scene_additive`, with the loader running on a worker thread
    pub fn load_scene_additive_async(&self, identifier: &str) -> Result<PendingLoad> {
        self.spawn_load(identifier, LoadMode::Additive)
    }

    fn spawn_load(&self, identifier: &str, mode: LoadMode) -> Result<PendingLoad> {
        let manager = match self.self_ref.upgrade() {
            Some(manager) => manager,
            None => {
                let err = Error::InitializationFailed("SceneManager is shutting down".to_string());
                engine_error!(self.logger, "vroom::SceneManager", "{}", err);
                return Err(err);
            }
        };

        engine_info!(
            self.logger,
            "vroom::SceneManager",
            "Loading scene '{}' asynchronously ({:?})",
            identifier,
            mode
        );

        let worker_identifier = identifier.to_string();
        let handle = thread::Builder::new()
            .name(format!("scene-load:{}", identifier))
            .spawn(move || -> Result<SceneHandle> {
                let scene = manager.build(&worker_identifier)?;
                Ok(manager.install(&worker_identifier, scene, mode))
            })
            .map_err(|e| {
                let err = Error::ThreadSpawnFailed(e.to_string());
                engine_error!(self.logger, "vroom::SceneManager", "{}", err);
                err
            })?;

        Ok(PendingLoad {
            identifier: identifier.to_string(),
            handle,
        })
    }

    /// Run the loader (no lock held)
    fn build(&self, identifier: &str) -> Result<Scene> {
        self.loader.create_scene_from_identifier(identifier).map_err(|err| {
            engine_error!(
                self.logger,
                "vroom::SceneManager",
                "Loader failed for '{}': {}",
                identifier,
                err
            );
            err
        })
    }

    /// Link a scene to this manager and wrap it in a handle
    fn adopt(&self, mut scene: Scene) -> SceneHandle {
        scene.set_scene_manager(self.self_ref.clone());
        Arc::new(Mutex::new(scene))
    }

    fn install(&self, identifier: &str, scene: Scene, mode: LoadMode) -> SceneHandle {
        let handle = self.adopt(scene);
        let managed = ManagedScene {
            identifier: identifier.to_string(),
            scene: handle.clone(),
        };

        // Replaced scenes are dropped after the lock is released: their
        // components' on_destroy may reach back into the manager.
        let discarded = {
            let mut state = self.lock_state();
            match mode {
                LoadMode::Replace => {
                    let discarded = std::mem::replace(&mut state.scenes, vec![managed]);
                    state.active = Some(handle.clone());
                    discarded
                }
                LoadMode::Additive => {
                    state.scenes.push(managed);
                    if state.active.is_none() {
                        state.active = Some(handle.clone());
                    }
                    Vec::new()
                }
            }
        };

        engine_debug!(
            self.logger,
            "vroom::SceneManager",
            "Scene '{}' installed, {} scene(s) unloaded",
            identifier,
            discarded.len()
        );
        handle
    }

    // ===== UNLOAD =====

    /// Stop managing `scene`
    ///
    /// If it was active, the most recently added remaining scene becomes
    /// active (or none). Returns false if the scene is not managed.
    pub fn unload_scene(&self, scene: &SceneHandle) -> bool {
        let removed = {
            let mut state = self.lock_state();
            let position = state.scenes.iter().position(|managed| Arc::ptr_eq(&managed.scene, scene));
            let position = match position {
                Some(position) => position,
                None => {
                    drop(state);
                    engine_warn!(self.logger, "vroom::SceneManager", "unload_scene: scene is not managed");
                    return false;
                }
            };
            let removed = state.scenes.remove(position);

            let was_active = state
                .active
                .as_ref()
                .map(|active| Arc::ptr_eq(active, scene))
                .unwrap_or(false);
            if was_active {
                state.active = state.scenes.last().map(|managed| managed.scene.clone());
                match state.scenes.last() {
                    Some(fallback) => engine_info!(
                        self.logger,
                        "vroom::SceneManager",
                        "Active scene '{}' unloaded, falling back to '{}'",
                        removed.identifier,
                        fallback.identifier
                    ),
                    None => engine_warn!(
                        self.logger,
                        "vroom::SceneManager",
                        "Active scene '{}' unloaded, no scene left to activate",
                        removed.identifier
                    ),
                }
            } else {
                engine_info!(self.logger, "vroom::SceneManager", "Scene '{}' unloaded", removed.identifier);
            }
            removed
        };

        drop(removed);
        true
    }

    // ===== FRAME =====

    /// Update every managed scene, in load order
    ///
    /// The scene list stays locked for the whole pass: component callbacks
    /// must not call back into load/unload/query operations of this manager.
    pub fn update(&self, delta_time: f32) {
        let state = self.lock_state();
        for managed in &state.scenes {
            self.lock_scene(&managed.scene).update(delta_time);
        }
    }

    // ===== QUERIES =====

    pub fn active_scene(&self) -> Option<SceneHandle> {
        self.lock_state().active.clone()
    }

    /// Managed scenes in load order
    pub fn scenes(&self) -> Vec<SceneHandle> {
        self.lock_state()
            .scenes
            .iter()
            .map(|managed| managed.scene.clone())
            .collect()
    }

    pub fn scene_count(&self) -> usize {
        self.lock_state().scenes.len()
    }

    /// Whether `scene` is one of the managed scenes
    pub fn is_managed(&self, scene: &SceneHandle) -> bool {
        self.lock_state()
            .scenes
            .iter()
            .any(|managed| Arc::ptr_eq(&managed.scene, scene))
    }

    /// Lock a scene, recovering from poisoning
    pub fn lock_scene<'a>(&self, scene: &'a SceneHandle) -> MutexGuard<'a, Scene> {
        match scene.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                engine_warn!(self.logger, "vroom::SceneManager", "Scene lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SceneSet> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                engine_warn!(self.logger, "vroom::SceneManager", "Scene list lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
#[path = "scene_manager_tests.rs"]
mod tests;
