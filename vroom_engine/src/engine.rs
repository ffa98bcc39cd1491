/// VROOM Engine - owner of the engine subsystems and of the frame loop
///
/// The engine is a plain value (no global state): create one with
/// `Engine::new`, drive it with `update` or `run`, and tear it down with
/// `shutdown` (or by dropping it). Subsystems are stored behind an `RwLock`
/// so they can be replaced while the engine is shared between threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::{Duration, Instant};
use crate::error::{Error, Result};
use crate::log::{DefaultLogger, LogSeverity, Logger};
use crate::scene::{EmptySceneLoader, SceneManager, SceneManagerDesc};
use crate::{engine_error, engine_info, engine_warn};

// ===== CONFIGURATION =====

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound applied to every frame's delta time, in seconds
    pub max_delta_time: f32,
    /// Minimum duration of one `run` iteration (`None` runs unthrottled)
    pub target_frame_time: Option<Duration>,
    /// Give the initial SceneManager one empty active scene
    pub create_default_scene: bool,
    /// Minimum severity printed by the default logger
    pub log_severity: LogSeverity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_delta_time: 0.25,
            target_frame_time: Some(Duration::from_millis(16)),
            create_default_scene: true,
            log_severity: LogSeverity::Info,
        }
    }
}

// ===== ENGINE =====

/// Engine instance
///
/// # Example
///
/// ```no_run
/// use vroom_engine::vroom::{Engine, EngineConfig};
///
/// let engine = Engine::new(EngineConfig::default());
///
/// let scene_manager = engine.scene_manager()?;
/// scene_manager.load_scene("levels/intro")?;
///
/// engine.run(|engine, _delta_time| {
///     // Game logic, input...
///     engine.stop();
/// })?;
///
/// engine.shutdown();
/// # Ok::<(), vroom_engine::vroom::Error>(())
/// ```
pub struct Engine {
    config: EngineConfig,
    logger: Arc<dyn Logger>,
    /// SceneManager subsystem (None once destroyed)
    scene_manager: RwLock<Option<Arc<SceneManager>>>,
    /// Set while `run` is looping
    running: AtomicBool,
}

impl Engine {
    /// Create an engine logging to a `DefaultLogger`
    pub fn new(config: EngineConfig) -> Self {
        let logger = Arc::new(DefaultLogger::with_min_severity(config.log_severity));
        Self::with_logger(config, logger)
    }

    /// Create an engine logging to a custom sink
    pub fn with_logger(config: EngineConfig, logger: Arc<dyn Logger>) -> Self {
        let scene_manager = SceneManager::from_desc(SceneManagerDesc {
            loader: Arc::new(EmptySceneLoader),
            logger: logger.clone(),
            create_default_scene: config.create_default_scene,
        });

        engine_info!(logger, "vroom::Engine", "Engine initialized");

        Self {
            config,
            logger,
            scene_manager: RwLock::new(Some(scene_manager)),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    // ===== LOGGING API =====

    /// Log a message through the engine's logger
    pub fn log(&self, severity: LogSeverity, source: &str, message: String) {
        crate::log::emit(&*self.logger, severity, source, message);
    }

    /// Log a message with file:line information
    pub fn log_detailed(
        &self,
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        crate::log::emit_detailed(&*self.logger, severity, source, message, file, line);
    }

    /// Helper to log errors before returning them (internal use)
    fn log_and_return_error(&self, error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                engine_error!(self.logger, "vroom::Engine", "Initialization failed: {}", msg);
            }
            _ => {
                engine_error!(self.logger, "vroom::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    // ===== SCENE MANAGER API =====

    /// Get the scene manager
    ///
    /// # Errors
    ///
    /// Returns an error if the scene manager has been destroyed
    pub fn scene_manager(&self) -> Result<Arc<SceneManager>> {
        self.read_scene_manager().clone().ok_or_else(|| {
            self.log_and_return_error(Error::InitializationFailed(
                "SceneManager not created. Call Engine::create_scene_manager() first.".to_string(),
            ))
        })
    }

    /// Create a scene manager (after `destroy_scene_manager`)
    ///
    /// # Errors
    ///
    /// Returns an error if a scene manager already exists
    pub fn create_scene_manager(&self, desc: SceneManagerDesc) -> Result<Arc<SceneManager>> {
        let mut lock = self.write_scene_manager();
        if lock.is_some() {
            return Err(self.log_and_return_error(Error::InitializationFailed(
                "SceneManager already exists. Call Engine::destroy_scene_manager() first.".to_string(),
            )));
        }

        let scene_manager = SceneManager::from_desc(desc);
        *lock = Some(scene_manager.clone());
        engine_info!(self.logger, "vroom::Engine", "SceneManager created");
        Ok(scene_manager)
    }

    /// Destroy the scene manager
    ///
    /// Existing `Arc<SceneManager>` handles stay valid until dropped.
    pub fn destroy_scene_manager(&self) {
        let previous = self.write_scene_manager().take();
        if previous.is_some() {
            engine_info!(self.logger, "vroom::Engine", "SceneManager destroyed");
        }
    }

    // ===== FRAME API =====

    /// Advance one frame
    ///
    /// `delta_time` is clamped to `[0, max_delta_time]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scene manager has been destroyed
    pub fn update(&self, delta_time: f32) -> Result<()> {
        let delta_time = self.clamp_delta_time(delta_time);
        let scene_manager = self.scene_manager()?;
        scene_manager.update(delta_time);
        Ok(())
    }

    fn clamp_delta_time(&self, delta_time: f32) -> f32 {
        if delta_time.is_nan() {
            return 0.0;
        }
        delta_time.clamp(0.0, self.config.max_delta_time.max(0.0))
    }

    /// Run the frame loop until `stop` is called
    ///
    /// Each iteration measures the elapsed time, updates the scenes, then
    /// calls `on_frame` with the (clamped) delta time.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop is already running or if an update fails
    pub fn run<F>(&self, mut on_frame: F) -> Result<()>
    where
        F: FnMut(&Engine, f32),
    {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(self.log_and_return_error(Error::InitializationFailed(
                "Engine is already running".to_string(),
            )));
        }
        engine_info!(self.logger, "vroom::Engine", "Frame loop started");

        let mut last_frame = Instant::now();
        while self.running.load(Ordering::Acquire) {
            let frame_start = Instant::now();
            let delta_time = self.clamp_delta_time(frame_start.duration_since(last_frame).as_secs_f32());
            last_frame = frame_start;

            if let Err(err) = self.update(delta_time) {
                self.running.store(false, Ordering::Release);
                return Err(err);
            }
            on_frame(self, delta_time);

            if let Some(target) = self.config.target_frame_time {
                let elapsed = frame_start.elapsed();
                if elapsed < target {
                    thread::sleep(target - elapsed);
                }
            }
        }

        engine_info!(self.logger, "vroom::Engine", "Frame loop stopped");
        Ok(())
    }

    /// Ask `run` to return after the current frame
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the loop and destroy every subsystem
    pub fn shutdown(&self) {
        self.stop();
        self.destroy_scene_manager();
        engine_info!(self.logger, "vroom::Engine", "Engine shut down");
    }

    // ===== LOCKS =====

    fn read_scene_manager(&self) -> RwLockReadGuard<'_, Option<Arc<SceneManager>>> {
        match self.scene_manager.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                engine_warn!(self.logger, "vroom::Engine", "SceneManager lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_scene_manager(&self) -> RwLockWriteGuard<'_, Option<Arc<SceneManager>>> {
        match self.scene_manager.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                engine_warn!(self.logger, "vroom::Engine", "SceneManager lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
