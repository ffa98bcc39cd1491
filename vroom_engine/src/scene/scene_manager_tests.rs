/// Tests for SceneManager
///
/// These tests validate the default scene, synchronous/additive/asynchronous
/// loading, unloading with active-scene fallback, loader failures and the
/// per-frame update of managed scenes.

use crate::error::{Error, Result};
use crate::log::{LogEntry, LogSeverity, Logger};
use crate::scene::{
    Component, ComponentContext, Scene, SceneLoader, SceneManager, SceneManagerDesc,
};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

// ============================================================================
// Helper Functions
// ============================================================================

/// Loader driven by the identifier:
/// - "fail*" returns an error
/// - "panic*" panics
/// - "gated" blocks until the test releases the gate
/// - anything else returns an empty scene with that name
struct ScriptedLoader {
    calls: Mutex<Vec<String>>,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl ScriptedLoader {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    fn gated() -> (Self, mpsc::Sender<()>) {
        let (sender, receiver) = mpsc::channel();
        let loader = Self::new();
        *loader.gate.lock().unwrap() = Some(receiver);
        (loader, sender)
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SceneLoader for ScriptedLoader {
    fn create_scene_from_identifier(&self, identifier: &str) -> Result<Scene> {
        self.calls.lock().unwrap().push(identifier.to_string());

        if identifier == "gated" {
            if let Some(gate) = self.gate.lock().unwrap().as_ref() {
                let _ = gate.recv();
            }
        }
        if identifier.starts_with("fail") {
            return Err(Error::SceneLoadFailed(format!("no scene named '{}'", identifier)));
        }
        if identifier.starts_with("panic") {
            panic!("loader exploded on '{}'", identifier);
        }
        Ok(Scene::named(identifier))
    }
}

struct CaptureLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl CaptureLogger {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn has(&self, severity: LogSeverity, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.severity == severity && e.message.contains(needle))
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

struct Counter {
    updates: Arc<Mutex<u32>>,
}

impl Component for Counter {
    fn update(&mut self, _ctx: &mut ComponentContext<'_>, _delta_time: f32) {
        *self.updates.lock().unwrap() += 1;
    }
}

/// Appends its scene label to a shared list on every update()
struct UpdateOrder {
    label: &'static str,
    order: Arc<Mutex<Vec<&'static str>>>,
}

impl Component for UpdateOrder {
    fn update(&mut self, _ctx: &mut ComponentContext<'_>, _delta_time: f32) {
        self.order.lock().unwrap().push(self.label);
    }
}

/// Counts on_destroy() calls
struct DestroyCounter {
    destroyed: Arc<Mutex<u32>>,
}

impl Component for DestroyCounter {
    fn on_destroy(&mut self, _ctx: &mut ComponentContext<'_>) {
        *self.destroyed.lock().unwrap() += 1;
    }
}

fn attach<C: Component>(scene: &crate::scene::SceneHandle, component: C) {
    let mut guard = scene.lock().unwrap();
    let entity = guard.create_entity();
    guard.add_component(entity, component);
}

/// Records whether the owning manager is reachable from awake()
struct ManagerLink {
    reached: Arc<Mutex<Option<bool>>>,
}

impl Component for ManagerLink {
    fn awake(&mut self, ctx: &mut ComponentContext<'_>) {
        *self.reached.lock().unwrap() = Some(ctx.scene_manager().is_some());
    }
}

fn create_manager(loader: Arc<ScriptedLoader>) -> (Arc<SceneManager>, Arc<CaptureLogger>) {
    let logger = Arc::new(CaptureLogger::new());
    let manager = SceneManager::from_desc(SceneManagerDesc {
        loader,
        logger: logger.clone(),
        create_default_scene: false,
    });
    (manager, logger)
}

fn name_of(scene: &Arc<Mutex<Scene>>) -> String {
    scene.lock().unwrap().name().to_string()
}

fn active_name(manager: &SceneManager) -> Option<String> {
    manager.active_scene().map(|scene| name_of(&scene))
}

// ============================================================================
// Construction Tests
// ============================================================================

#[test]
fn test_new_manager_has_default_scene() {
    let manager = SceneManager::new();

    assert_eq!(manager.scene_count(), 1);
    let active = manager.active_scene().unwrap();
    assert!(Arc::ptr_eq(&active, &manager.scenes()[0]));

    let linked = active.lock().unwrap().scene_manager().unwrap();
    assert!(Arc::ptr_eq(&linked, &manager));
}

#[test]
fn test_manager_without_default_scene() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));

    assert_eq!(manager.scene_count(), 0);
    assert!(manager.active_scene().is_none());
}

// ============================================================================
// Synchronous Load Tests
// ============================================================================

#[test]
fn test_load_scene_replaces_all() {
    let loader = Arc::new(ScriptedLoader::new());
    let (manager, logger) = create_manager(loader.clone());

    let a = manager.load_scene("a").unwrap();
    manager.load_scene_additive("b").unwrap();
    let c = manager.load_scene("c").unwrap();

    assert_eq!(manager.scene_count(), 1);
    assert!(Arc::ptr_eq(&manager.active_scene().unwrap(), &c));
    assert!(!manager.is_managed(&a));
    assert_eq!(loader.calls(), vec!["a", "b", "c"]);
    assert!(logger.has(LogSeverity::Info, "Loading scene 'c'"));
}

#[test]
fn test_loaded_scene_links_back_to_manager() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let scene = manager.load_scene("level").unwrap();

    let reached = Arc::new(Mutex::new(None));
    {
        let mut guard = scene.lock().unwrap();
        let entity = guard.create_entity();
        guard.add_component(entity, ManagerLink { reached: reached.clone() });
    }

    assert_eq!(*reached.lock().unwrap(), Some(true));
}

#[test]
fn test_load_scene_failure_leaves_state() {
    let (manager, logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let a = manager.load_scene("a").unwrap();

    let result = manager.load_scene("fail_missing");

    assert!(matches!(result, Err(Error::SceneLoadFailed(_))));
    assert_eq!(manager.scene_count(), 1);
    assert!(Arc::ptr_eq(&manager.active_scene().unwrap(), &a));
    assert!(logger.has(LogSeverity::Error, "fail_missing"));
}

#[test]
fn test_load_scene_instance() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    manager.load_scene("a").unwrap();

    let mut prepared = Scene::named("prepared");
    prepared.create_entity();
    let handle = manager.load_scene_instance(Some(prepared)).unwrap();

    assert_eq!(manager.scene_count(), 1);
    assert_eq!(active_name(&manager).as_deref(), Some("prepared"));
    assert_eq!(handle.lock().unwrap().entity_count(), 1);
}

#[test]
fn test_load_scene_instance_none_clears() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    manager.load_scene("a").unwrap();
    manager.load_scene_additive("b").unwrap();

    assert!(manager.load_scene_instance(None).is_none());

    assert_eq!(manager.scene_count(), 0);
    assert!(manager.active_scene().is_none());
}

// ============================================================================
// Additive Load / Unload Tests
// ============================================================================

#[test]
fn test_additive_load_then_unload_falls_back() {
    let (manager, logger) = create_manager(Arc::new(ScriptedLoader::new()));

    let a = manager.load_scene("a").unwrap();
    let b = manager.load_scene_additive("b").unwrap();
    assert_eq!(active_name(&manager).as_deref(), Some("a"));
    assert_eq!(manager.scene_count(), 2);

    assert!(manager.unload_scene(&a));
    assert_eq!(active_name(&manager).as_deref(), Some("b"));

    assert!(manager.unload_scene(&b));
    assert!(manager.active_scene().is_none());
    assert_eq!(manager.scene_count(), 0);
    assert!(logger.has(LogSeverity::Warn, "no scene left"));
}

#[test]
fn test_additive_becomes_active_when_none() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));

    let first = manager.load_scene_additive("first").unwrap();
    manager.load_scene_additive("second").unwrap();

    assert!(Arc::ptr_eq(&manager.active_scene().unwrap(), &first));
    assert_eq!(manager.scene_count(), 2);
}

#[test]
fn test_unload_inactive_scene_keeps_active() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let a = manager.load_scene("a").unwrap();
    let b = manager.load_scene_additive("b").unwrap();

    assert!(manager.unload_scene(&b));

    assert!(Arc::ptr_eq(&manager.active_scene().unwrap(), &a));
    assert_eq!(manager.scene_count(), 1);
}

#[test]
fn test_unload_falls_back_to_last_remaining() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let a = manager.load_scene("a").unwrap();
    manager.load_scene_additive("b").unwrap();
    manager.load_scene_additive("c").unwrap();

    manager.unload_scene(&a);

    assert_eq!(active_name(&manager).as_deref(), Some("c"));
}

#[test]
fn test_unload_unmanaged_scene_is_noop() {
    let (manager, logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let a = manager.load_scene("a").unwrap();
    let stranger = Arc::new(Mutex::new(Scene::named("stranger")));

    assert!(!manager.unload_scene(&stranger));
    assert!(manager.unload_scene(&a));
    assert!(!manager.unload_scene(&a));

    assert!(logger.has(LogSeverity::Warn, "not managed"));
}

// ============================================================================
// Asynchronous Load Tests
// ============================================================================

#[test]
fn test_load_scene_async_installs_scene() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    manager.load_scene("old").unwrap();

    let pending = manager.load_scene_async("next").unwrap();
    assert_eq!(pending.identifier(), "next");
    let scene = pending.wait().unwrap();

    assert_eq!(manager.scene_count(), 1);
    assert!(Arc::ptr_eq(&manager.active_scene().unwrap(), &scene));
    assert!(scene.lock().unwrap().scene_manager().is_some());
}

#[test]
fn test_load_scene_additive_async() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let a = manager.load_scene("a").unwrap();

    let b = manager.load_scene_additive_async("b").unwrap().wait().unwrap();

    assert_eq!(manager.scene_count(), 2);
    assert!(Arc::ptr_eq(&manager.active_scene().unwrap(), &a));
    assert!(manager.is_managed(&b));
}

#[test]
fn test_async_loader_runs_off_the_lock() {
    let (loader, gate) = ScriptedLoader::gated();
    let (manager, _logger) = create_manager(Arc::new(loader));
    let a = manager.load_scene("a").unwrap();

    let pending = manager.load_scene_async("gated").unwrap();

    // The loader is blocked: the manager stays fully usable meanwhile
    manager.update(0.016);
    assert!(Arc::ptr_eq(&manager.active_scene().unwrap(), &a));
    manager.load_scene_additive("b").unwrap();
    assert_eq!(manager.scene_count(), 2);
    assert!(!pending.is_finished());

    gate.send(()).unwrap();
    let gated = pending.wait().unwrap();

    assert_eq!(manager.scene_count(), 1);
    assert!(Arc::ptr_eq(&manager.active_scene().unwrap(), &gated));
}

#[test]
fn test_async_loader_failure_surfaces_on_wait() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let a = manager.load_scene("a").unwrap();

    let result = manager.load_scene_async("fail_async").unwrap().wait();

    assert!(matches!(result, Err(Error::SceneLoadFailed(_))));
    assert!(Arc::ptr_eq(&manager.active_scene().unwrap(), &a));
}

#[test]
fn test_async_loader_panic_surfaces_on_wait() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let a = manager.load_scene("a").unwrap();

    let result = manager.load_scene_async("panic_now").unwrap().wait();

    match result {
        Err(Error::AsyncLoadFailed(msg)) => assert!(msg.contains("panic_now")),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    assert!(Arc::ptr_eq(&manager.active_scene().unwrap(), &a));
}

// ============================================================================
// Update Tests
// ============================================================================

#[test]
fn test_update_drives_every_managed_scene() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let a = manager.load_scene("a").unwrap();
    let b = manager.load_scene_additive("b").unwrap();

    let updates = Arc::new(Mutex::new(0));
    for scene in [&a, &b] {
        let mut guard = scene.lock().unwrap();
        let entity = guard.create_entity();
        guard.add_component(entity, Counter { updates: updates.clone() });
    }

    manager.update(0.016);
    manager.update(0.016);

    assert_eq!(*updates.lock().unwrap(), 4);
}

#[test]
fn test_update_follows_managed_order() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let order = Arc::new(Mutex::new(Vec::new()));
    let a = manager.load_scene("a").unwrap();
    let b = manager.load_scene_additive("b").unwrap();
    let c = manager.load_scene_additive("c").unwrap();
    // Attach in reverse so entity creation order cannot explain the result
    attach(&c, UpdateOrder { label: "c", order: order.clone() });
    attach(&b, UpdateOrder { label: "b", order: order.clone() });
    attach(&a, UpdateOrder { label: "a", order: order.clone() });

    manager.update(0.016);
    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);

    order.lock().unwrap().clear();
    manager.unload_scene(&b);
    manager.update(0.016);
    assert_eq!(*order.lock().unwrap(), vec!["a", "c"]);
}

#[test]
fn test_discarded_scenes_destroy_their_components() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let destroyed = Arc::new(Mutex::new(0));

    // Replaced by load_scene
    let a = manager.load_scene("a").unwrap();
    attach(&a, DestroyCounter { destroyed: destroyed.clone() });
    manager.load_scene("b").unwrap();
    assert_eq!(*destroyed.lock().unwrap(), 0);
    drop(a);
    assert_eq!(*destroyed.lock().unwrap(), 1);

    // Cleared by load_scene_instance(None)
    let b = manager.active_scene().unwrap();
    attach(&b, DestroyCounter { destroyed: destroyed.clone() });
    assert!(manager.load_scene_instance(None).is_none());
    drop(b);
    assert_eq!(*destroyed.lock().unwrap(), 2);

    // Removed by unload_scene
    let c = manager.load_scene("c").unwrap();
    attach(&c, DestroyCounter { destroyed: destroyed.clone() });
    assert!(manager.unload_scene(&c));
    drop(c);
    assert_eq!(*destroyed.lock().unwrap(), 3);

    manager.update(0.016);
    assert_eq!(*destroyed.lock().unwrap(), 3);
}

#[test]
fn test_unloaded_scene_is_not_updated() {
    let (manager, _logger) = create_manager(Arc::new(ScriptedLoader::new()));
    let a = manager.load_scene("a").unwrap();

    let updates = Arc::new(Mutex::new(0));
    {
        let mut guard = a.lock().unwrap();
        let entity = guard.create_entity();
        guard.add_component(entity, Counter { updates: updates.clone() });
    }

    manager.unload_scene(&a);
    manager.update(0.016);

    assert_eq!(*updates.lock().unwrap(), 0);
}
