/// Component - a unit of behavior attached to exactly one Entity.
///
/// Components are owned by their entity (stored in insertion order) and are
/// driven by the Scene through the lifecycle callbacks below. Every callback
/// receives a `ComponentContext` giving access to the owning scene, so a
/// behavior can disable itself, spawn entities or reparent things while it
/// runs.

use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use bitflags::bitflags;
use super::entity::EntityId;
use super::scene::Scene;
use super::scene_manager::SceneManager;

// ===== TYPE ERASURE =====

/// Access to `Any` for trait objects
///
/// Implemented for every `'static` type; used by `Scene::get_component` to
/// recover the concrete component type.
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`
    fn as_any(&self) -> &dyn Any;

    /// Borrow as `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ===== COMPONENT TRAIT =====

/// Polymorphic behavior attached to an entity
///
/// All callbacks default to no-ops; implement the subset you need.
///
/// Ordering guarantees (per component):
/// - `awake` fires exactly once, when the component is attached
/// - `on_enable` / `on_disable` strictly alternate, starting with `on_enable`
/// - `start` fires at most once, before the first `update`
/// - `on_destroy` fires exactly once, last
///
/// # Example
///
/// ```no_run
/// use vroom_engine::vroom::scene::{Component, ComponentContext};
///
/// struct Spinner {
///     angle: f32,
/// }
///
/// impl Component for Spinner {
///     fn update(&mut self, _ctx: &mut ComponentContext<'_>, delta_time: f32) {
///         self.angle += 90.0 * delta_time;
///     }
/// }
/// ```
pub trait Component: AsAny + Send {
    /// Called once when the component is attached to its entity
    fn awake(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Called once, on the first frame the component is updated
    fn start(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Called every frame while the component is enabled and its entity active
    fn update(&mut self, _ctx: &mut ComponentContext<'_>, _delta_time: f32) {}

    /// Called when the component becomes effectively enabled
    fn on_enable(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Called when the component stops being effectively enabled
    fn on_disable(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Called once before the component is freed
    fn on_destroy(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Register the capability trait objects this component can be viewed as
    ///
    /// Called once, when the component is attached. See `Capabilities` and
    /// `Scene::component_as`. A component is always found under its own
    /// concrete type; this adds extra views.
    fn capabilities(&self, _capabilities: &mut Capabilities) {}
}

// ===== CAPABILITIES =====

trait CastTo<C: ?Sized>: Send + Sync {
    fn cast<'a>(&self, component: &'a (dyn Component + 'static)) -> Option<&'a C>;
    fn cast_mut<'a>(&self, component: &'a mut (dyn Component + 'static)) -> Option<&'a mut C>;
}

struct Caster<T, C: ?Sized> {
    cast: fn(&T) -> &C,
    cast_mut: fn(&mut T) -> &mut C,
}

impl<T: Component, C: ?Sized + 'static> CastTo<C> for Caster<T, C> {
    fn cast<'a>(&self, component: &'a (dyn Component + 'static)) -> Option<&'a C> {
        component.as_any().downcast_ref::<T>().map(self.cast)
    }

    fn cast_mut<'a>(&self, component: &'a mut (dyn Component + 'static)) -> Option<&'a mut C> {
        component.as_any_mut().downcast_mut::<T>().map(self.cast_mut)
    }
}

type BoxedCaster<C> = Box<dyn CastTo<C> + Send + Sync>;

/// Capability views declared by one component type
///
/// A capability is usually a trait object type (`dyn Damageable`). Each entry
/// maps the capability's `TypeId` to a caster from the concrete component to
/// the capability, so lookups can hand back a usable `&dyn Damageable`.
///
/// ```no_run
/// use vroom_engine::vroom::scene::{Capabilities, Component};
///
/// trait Damageable {
///     fn damage(&mut self, amount: u32);
/// }
///
/// struct Health(u32);
///
/// impl Damageable for Health {
///     fn damage(&mut self, amount: u32) {
///         self.0 = self.0.saturating_sub(amount);
///     }
/// }
///
/// impl Component for Health {
///     fn capabilities(&self, capabilities: &mut Capabilities) {
///         capabilities.provide::<Self, dyn Damageable>(|h| h, |h| h);
///     }
/// }
/// ```
#[derive(Default)]
pub struct Capabilities {
    casters: Vec<(TypeId, Box<dyn Any + Send + Sync>)>,
}

impl Capabilities {
    /// Declare that component type `T` can be viewed as `C`
    ///
    /// Registering the same capability twice keeps the first caster.
    pub fn provide<T: Component, C: ?Sized + 'static>(
        &mut self,
        cast: fn(&T) -> &C,
        cast_mut: fn(&mut T) -> &mut C,
    ) {
        let tag = TypeId::of::<C>();
        if self.provides(tag) {
            return;
        }
        let caster: BoxedCaster<C> = Box::new(Caster { cast, cast_mut });
        self.casters.push((tag, Box::new(caster)));
    }

    /// Whether capability `capability` was declared
    pub fn provides(&self, capability: TypeId) -> bool {
        self.casters.iter().any(|(tag, _)| *tag == capability)
    }

    fn caster<C: ?Sized + 'static>(&self) -> Option<&BoxedCaster<C>> {
        let tag = TypeId::of::<C>();
        self.casters
            .iter()
            .find(|(existing, _)| *existing == tag)
            .and_then(|(_, caster)| caster.downcast_ref::<BoxedCaster<C>>())
    }

    pub(crate) fn cast<'a, C: ?Sized + 'static>(
        &self,
        component: &'a (dyn Component + 'static),
    ) -> Option<&'a C> {
        self.caster::<C>()?.cast(component)
    }

    pub(crate) fn cast_mut<'a, C: ?Sized + 'static>(
        &self,
        component: &'a mut (dyn Component + 'static),
    ) -> Option<&'a mut C> {
        self.caster::<C>()?.cast_mut(component)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").field("count", &self.casters.len()).finish()
    }
}

// ===== COMPONENT ID =====

/// Stable handle to one component of one entity
///
/// Handles never alias: a handle to a destroyed component stays invalid even
/// if the scene later reuses the entity id (after `Scene::clear`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId {
    entity: EntityId,
    index: u32,
    serial: u64,
}

impl ComponentId {
    pub(crate) fn new(entity: EntityId, index: u32, serial: u64) -> Self {
        Self { entity, index, serial }
    }

    /// Entity owning the component
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Position in the entity's component list (insertion order)
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.index)
    }
}

// ===== LIFECYCLE BOOKKEEPING =====

bitflags! {
    /// Lifecycle state of a component slot
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct ComponentFlags: u8 {
        /// Local enabled flag (user controlled)
        const ENABLED = 1 << 0;
        /// awake() has returned
        const AWAKE = 1 << 1;
        /// start() has run
        const STARTED = 1 << 2;
        /// on_enable() delivered and not yet matched by on_disable()
        const LIVE = 1 << 3;
        /// Entity teardown has reached this slot
        const DESTROYED = 1 << 4;
        /// on_destroy() delivered
        const DESTROY_NOTIFIED = 1 << 5;
    }
}

/// Callback selector used by the scene's dispatch loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum LifecycleEvent {
    Enable,
    Disable,
    Start,
    Update(f32),
}

impl LifecycleEvent {
    /// Enable/disable notifications are queued when the component is busy;
    /// start/update are simply skipped.
    pub(crate) fn is_notification(self) -> bool {
        matches!(self, LifecycleEvent::Enable | LifecycleEvent::Disable)
    }

    pub(crate) fn dispatch(self, component: &mut dyn Component, ctx: &mut ComponentContext<'_>) {
        match self {
            LifecycleEvent::Enable => component.on_enable(ctx),
            LifecycleEvent::Disable => component.on_disable(ctx),
            LifecycleEvent::Start => component.start(ctx),
            LifecycleEvent::Update(delta_time) => component.update(ctx, delta_time),
        }
    }
}

/// Storage for one attached component
///
/// `behavior` is `None` while one of the component's own callbacks is running
/// (the box is moved out so the callback can borrow the scene mutably).
/// Notifications raised during that window land in `pending`. `type_id` and
/// `capabilities` stay in place, so lookups still see the slot.
pub(crate) struct ComponentSlot {
    pub(crate) serial: u64,
    /// Concrete type of the component
    pub(crate) type_id: TypeId,
    pub(crate) capabilities: Capabilities,
    pub(crate) flags: ComponentFlags,
    pub(crate) behavior: Option<Box<dyn Component>>,
    pub(crate) pending: VecDeque<LifecycleEvent>,
}

impl ComponentSlot {
    pub(crate) fn new(serial: u64, type_id: TypeId, capabilities: Capabilities) -> Self {
        Self {
            serial,
            type_id,
            capabilities,
            flags: ComponentFlags::ENABLED,
            behavior: None,
            pending: VecDeque::new(),
        }
    }

    /// Slot still holds a component that lookups and dispatch may see
    pub(crate) fn is_alive(&self) -> bool {
        !self.flags.contains(ComponentFlags::DESTROYED)
    }

    /// Alive and either of concrete type `tag` or declaring capability `tag`
    pub(crate) fn matches(&self, tag: TypeId) -> bool {
        self.is_alive() && (self.type_id == tag || self.capabilities.provides(tag))
    }
}

// ===== CALLBACK CONTEXT =====

/// Access handed to every lifecycle callback
///
/// While a callback runs, the component itself is detached from its slot:
/// scene lookups that reach it (`get_component`) return `None` rather than a
/// later component of the same type, and enable/disable notifications aimed
/// at it are delivered right after the callback returns.
pub struct ComponentContext<'a> {
    scene: &'a mut Scene,
    component: ComponentId,
}

impl<'a> ComponentContext<'a> {
    pub(crate) fn new(scene: &'a mut Scene, component: ComponentId) -> Self {
        Self { scene, component }
    }

    /// Handle of the component being called
    pub fn component_id(&self) -> ComponentId {
        self.component
    }

    /// Entity owning the component
    pub fn entity(&self) -> EntityId {
        self.component.entity()
    }

    /// Owning scene
    pub fn scene(&self) -> &Scene {
        &*self.scene
    }

    /// Owning scene, mutably (create/destroy entities, reparent, ...)
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut *self.scene
    }

    /// Local enabled flag of this component
    pub fn is_enabled(&self) -> bool {
        self.scene.is_component_enabled(self.component)
    }

    /// Enable or disable this component (same rules as `Scene::set_component_enabled`)
    pub fn set_enabled(&mut self, enabled: bool) {
        self.scene.set_component_enabled(self.component, enabled);
    }

    /// Effective activity of the owning entity
    pub fn is_entity_active(&self) -> bool {
        self.scene.is_active(self.component.entity())
    }

    /// Scene manager owning the scene, if any (entity → scene → manager)
    ///
    /// Do not call locking manager operations from inside a frame driven by
    /// `SceneManager::update`: the manager lock is held for the whole pass.
    pub fn scene_manager(&self) -> Option<Arc<SceneManager>> {
        self.scene.scene_manager()
    }
}
