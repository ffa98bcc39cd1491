/// Scene - owner of a set of entities and driver of their lifecycle.
///
/// Entities are stored in a SlotMap (O(1) insert/remove, stable keys) and
/// addressed by `EntityId` through an index map. A separate order vector keeps
/// creation order for `root_entities()` and the per-frame update.
///
/// Component callbacks run with the component's box moved out of its slot, so
/// they can receive `&mut Scene` through their `ComponentContext`. Enable and
/// disable notifications that target a component while it is busy are queued
/// on its slot and delivered as soon as its current callback returns.

use std::any::TypeId;
use std::sync::{Arc, Weak};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use super::component::{
    Capabilities, Component, ComponentContext, ComponentFlags, ComponentId, ComponentSlot,
    LifecycleEvent,
};
use super::entity::{Entity, EntityId, EntityMut};
use super::scene_manager::SceneManager;

new_key_type! {
    /// Storage key of an entity inside its scene
    struct EntityKey;
}

/// A set of entities forming one or more trees.
pub struct Scene {
    /// Label used in logs (loader identifier for managed scenes)
    name: String,
    /// Next id handed out by `create_entity`
    next_entity_id: u64,
    /// Never reset, so component handles cannot alias across `clear()`
    next_component_serial: u64,
    entities: SlotMap<EntityKey, Entity>,
    index: FxHashMap<EntityId, EntityKey>,
    /// Creation order
    order: Vec<EntityKey>,
    /// Owning manager (non-owning back-reference)
    scene_manager: Weak<SceneManager>,
}

/// Step of the post-callback loop in `Scene::restore`
enum Next {
    Deliver(LifecycleEvent),
    Destroy,
    Discard,
}

impl Scene {
    /// Create an empty, unnamed scene
    pub fn new() -> Self {
        Self::named("")
    }

    /// Create an empty scene with a label
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_entity_id: 1,
            next_component_serial: 1,
            entities: SlotMap::with_key(),
            index: FxHashMap::default(),
            order: Vec::new(),
            scene_manager: Weak::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Manager this scene is registered with, if it is still alive
    pub fn scene_manager(&self) -> Option<Arc<SceneManager>> {
        self.scene_manager.upgrade()
    }

    pub(crate) fn set_scene_manager(&mut self, scene_manager: Weak<SceneManager>) {
        self.scene_manager = scene_manager;
    }

    // ===== ENTITIES =====

    /// Create a root entity (active, no components)
    pub fn create_entity(&mut self) -> EntityId {
        let id = EntityId::new(self.next_entity_id);
        self.next_entity_id += 1;

        let key = self.entities.insert(Entity::new(id));
        self.index.insert(id, key);
        self.order.push(key);
        id
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).and_then(|key| self.entities.get(*key))
    }

    /// Mutable view of an entity
    pub fn entity_mut(&mut self, id: EntityId) -> Option<EntityMut<'_>> {
        if self.contains(id) {
            Some(EntityMut::new(self, id))
        } else {
            None
        }
    }

    fn entity_raw_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        match self.index.get(&id) {
            Some(key) => self.entities.get_mut(*key),
            None => None,
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// All entities in creation order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.order.iter().filter_map(move |key| self.entities.get(*key))
    }

    /// Parentless entities in creation order
    pub fn root_entities(&self) -> Vec<EntityId> {
        self.entities()
            .filter(|entity| entity.is_root())
            .map(|entity| entity.id())
            .collect()
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.entity(id).and_then(|entity| entity.parent)
    }

    /// Children of `id` in insertion order (empty for unknown ids)
    pub fn children(&self, id: EntityId) -> &[EntityId] {
        match self.entity(id) {
            Some(entity) => &entity.children,
            None => &[],
        }
    }

    // ===== HIERARCHY =====

    /// Move `child` under `parent` (`None` makes it a root)
    ///
    /// Returns false and changes nothing when `parent` already is the parent,
    /// when `parent` is `child` itself or one of its descendants, or when
    /// either entity is unknown or being destroyed.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> bool {
        let old_parent = match self.entity(child) {
            Some(entity) if !entity.is_destroying() => entity.parent,
            _ => return false,
        };
        if old_parent == parent {
            return false;
        }

        if let Some(new_parent) = parent {
            match self.entity(new_parent) {
                Some(entity) if !entity.is_destroying() => {}
                _ => return false,
            }
            let mut cursor = Some(new_parent);
            while let Some(ancestor) = cursor {
                if ancestor == child {
                    return false;
                }
                cursor = self.parent(ancestor);
            }
        }

        let was_active = self.is_active(child);

        if let Some(old) = old_parent.and_then(|old| self.entity_raw_mut(old)) {
            old.children.retain(|id| *id != child);
        }
        if let Some(new) = parent.and_then(|new| self.entity_raw_mut(new)) {
            new.children.push(child);
        }
        if let Some(entity) = self.entity_raw_mut(child) {
            entity.parent = parent;
        }

        if self.is_active(child) != was_active {
            self.propagate_activity(child);
        }
        true
    }

    /// Append `child` to `parent`'s children (same rules as `set_parent`)
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        self.set_parent(child, Some(parent))
    }

    /// Detach `child` from `parent`, making it a root
    ///
    /// No-op unless `parent` is the current parent of `child`.
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.set_parent(child, None)
    }

    // ===== ACTIVATION =====

    /// Effective activity: the local flag of `id` and of all its ancestors
    ///
    /// Unknown ids are inactive.
    pub fn is_active(&self, id: EntityId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.entity(current) {
                Some(entity) if entity.active => cursor = entity.parent,
                _ => return false,
            }
        }
        true
    }

    /// Local active flag of `id`
    pub fn is_active_self(&self, id: EntityId) -> bool {
        self.entity(id).map(|entity| entity.active).unwrap_or(false)
    }

    /// Set the local active flag
    ///
    /// Components of the entity and of its locally active descendants receive
    /// `on_enable` / `on_disable` when their effective state flips. Returns
    /// false when the flag is unchanged or the entity is unknown.
    pub fn set_active(&mut self, id: EntityId, active: bool) -> bool {
        let was_active = self.is_active(id);
        match self.entity_raw_mut(id) {
            Some(entity) if entity.active != active => entity.active = active,
            _ => return false,
        }
        if self.is_active(id) != was_active {
            self.propagate_activity(id);
        }
        true
    }

    fn propagate_activity(&mut self, id: EntityId) {
        let count = match self.entity(id) {
            Some(entity) => entity.components.len(),
            None => return,
        };
        for index in 0..count {
            if let Some(component) = self.component_at(id, index) {
                self.sync_component(component);
            }
        }

        let children = self.children(id).to_vec();
        for child in children {
            if self.parent(child) == Some(id) && self.is_active_self(child) {
                self.propagate_activity(child);
            }
        }
    }

    // ===== COMPONENTS =====

    /// Attach `component` to `entity`
    ///
    /// Fires `awake`, then `on_enable` if the entity is effectively active.
    /// Returns None (and drops the component) when the entity is unknown or
    /// being destroyed.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, component: T) -> Option<ComponentId> {
        let serial = self.next_component_serial;
        let mut capabilities = Capabilities::default();
        component.capabilities(&mut capabilities);
        let index = {
            let target = match self.entity_raw_mut(entity) {
                Some(target) if !target.destroying => target,
                _ => return None,
            };
            target
                .components
                .push(ComponentSlot::new(serial, TypeId::of::<T>(), capabilities));
            target.components.len() - 1
        };
        self.next_component_serial += 1;

        let id = ComponentId::new(entity, index as u32, serial);
        let mut behavior: Box<dyn Component> = Box::new(component);
        {
            let mut ctx = ComponentContext::new(self, id);
            behavior.awake(&mut ctx);
        }

        let enable = match self.slot_mut(id) {
            Some(slot) if slot.is_alive() => {
                slot.flags.insert(ComponentFlags::AWAKE);
                slot.flags.contains(ComponentFlags::ENABLED)
            }
            _ => false,
        };
        if enable && self.is_active(entity) {
            if let Some(slot) = self.slot_mut(id) {
                slot.flags.insert(ComponentFlags::LIVE);
            }
            self.run_callback(id, behavior, LifecycleEvent::Enable);
        } else {
            self.restore(id, behavior);
        }
        Some(id)
    }

    /// First component of concrete type `T` on `entity`, in insertion order
    ///
    /// Returns None if that first component is the one currently running a
    /// callback (its box is detached); later components of the same type are
    /// never returned in its place.
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.first_slot(entity, TypeId::of::<T>())?
            .behavior
            .as_deref()
            .and_then(|behavior| behavior.as_any().downcast_ref::<T>())
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let tag = TypeId::of::<T>();
        self.entity_raw_mut(entity)?
            .components
            .iter_mut()
            .find(|slot| slot.is_alive() && slot.type_id == tag)?
            .behavior
            .as_deref_mut()
            .and_then(|behavior| behavior.as_any_mut().downcast_mut::<T>())
    }

    /// Handle of the first component of type `T` on `entity`
    ///
    /// Found even while that component is running a callback.
    pub fn component_id<T: Component>(&self, entity: EntityId) -> Option<ComponentId> {
        let tag = TypeId::of::<T>();
        let target = self.entity(entity)?;
        target
            .components
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.is_alive() && slot.type_id == tag)
            .map(|(index, slot)| ComponentId::new(entity, index as u32, slot.serial))
    }

    /// First component on `entity` that is a `C` or declares capability `C`
    ///
    /// `C` is usually a trait object type (`dyn Trait`) registered through
    /// `Component::capabilities`. Same busy-component rule as `get_component`.
    pub fn component_with<C: ?Sized + 'static>(&self, entity: EntityId) -> Option<&dyn Component> {
        self.first_match(entity, TypeId::of::<C>())?.behavior.as_deref()
    }

    /// First component on `entity` declaring capability `C`, viewed as `C`
    ///
    /// ```no_run
    /// # use vroom_engine::vroom::scene::Scene;
    /// # trait Damageable { fn health(&self) -> u32; }
    /// # fn read(scene: &Scene, entity: vroom_engine::vroom::scene::EntityId) {
    /// if let Some(target) = scene.component_as::<dyn Damageable>(entity) {
    ///     println!("health: {}", target.health());
    /// }
    /// # }
    /// ```
    pub fn component_as<C: ?Sized + 'static>(&self, entity: EntityId) -> Option<&C> {
        let tag = TypeId::of::<C>();
        let slot = self
            .entity(entity)?
            .components
            .iter()
            .find(|slot| slot.is_alive() && slot.capabilities.provides(tag))?;
        let behavior = slot.behavior.as_deref()?;
        slot.capabilities.cast::<C>(behavior)
    }

    pub fn component_as_mut<C: ?Sized + 'static>(&mut self, entity: EntityId) -> Option<&mut C> {
        let tag = TypeId::of::<C>();
        let slot = self
            .entity_raw_mut(entity)?
            .components
            .iter_mut()
            .find(|slot| slot.is_alive() && slot.capabilities.provides(tag))?;
        let behavior = slot.behavior.as_deref_mut()?;
        slot.capabilities.cast_mut::<C>(behavior)
    }

    /// First alive slot of concrete type `tag`
    fn first_slot(&self, entity: EntityId, tag: TypeId) -> Option<&ComponentSlot> {
        self.entity(entity)?
            .components
            .iter()
            .find(|slot| slot.is_alive() && slot.type_id == tag)
    }

    /// First alive slot of concrete type or capability `tag`
    fn first_match(&self, entity: EntityId, tag: TypeId) -> Option<&ComponentSlot> {
        self.entity(entity)?.components.iter().find(|slot| slot.matches(tag))
    }

    /// Component behind a handle, downcast to `T`
    pub fn component<T: Component>(&self, id: ComponentId) -> Option<&T> {
        self.slot(id)
            .filter(|slot| slot.is_alive())
            .and_then(|slot| slot.behavior.as_deref())
            .and_then(|behavior| behavior.as_any().downcast_ref::<T>())
    }

    pub fn component_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.slot_mut(id)
            .filter(|slot| slot.is_alive())
            .and_then(|slot| slot.behavior.as_deref_mut())
            .and_then(|behavior| behavior.as_any_mut().downcast_mut::<T>())
    }

    pub fn component_count(&self, entity: EntityId) -> usize {
        self.entity(entity).map(|target| target.component_count()).unwrap_or(0)
    }

    /// Local enabled flag of a component (false for stale handles)
    pub fn is_component_enabled(&self, id: ComponentId) -> bool {
        self.slot(id)
            .map(|slot| slot.is_alive() && slot.flags.contains(ComponentFlags::ENABLED))
            .unwrap_or(false)
    }

    /// Whether `start` has been called on a component
    pub fn has_started(&self, id: ComponentId) -> bool {
        self.slot(id)
            .map(|slot| slot.flags.contains(ComponentFlags::STARTED))
            .unwrap_or(false)
    }

    /// Set the local enabled flag of a component
    ///
    /// Fires `on_enable` / `on_disable` only if the owning entity is
    /// effectively active. Returns false when the flag is unchanged or the
    /// handle is stale.
    pub fn set_component_enabled(&mut self, id: ComponentId, enabled: bool) -> bool {
        match self.slot_mut(id) {
            Some(slot) if slot.is_alive() && slot.flags.contains(ComponentFlags::ENABLED) != enabled => {
                slot.flags.set(ComponentFlags::ENABLED, enabled);
            }
            _ => return false,
        }
        self.sync_component(id);
        true
    }

    // ===== DISPATCH =====

    fn component_at(&self, entity: EntityId, index: usize) -> Option<ComponentId> {
        let slot = self.entity(entity)?.components.get(index)?;
        Some(ComponentId::new(entity, index as u32, slot.serial))
    }

    fn slot(&self, id: ComponentId) -> Option<&ComponentSlot> {
        self.entity(id.entity())?
            .components
            .get(id.index())
            .filter(|slot| slot.serial == id.serial())
    }

    fn slot_mut(&mut self, id: ComponentId) -> Option<&mut ComponentSlot> {
        self.entity_raw_mut(id.entity())?
            .components
            .get_mut(id.index())
            .filter(|slot| slot.serial == id.serial())
    }

    /// Bring a component's LIVE state in line with `enabled && entity active`
    ///
    /// Fires at most one notification, so enable/disable always alternate.
    fn sync_component(&mut self, id: ComponentId) {
        let desired = self.is_active(id.entity());
        let event = match self.slot_mut(id) {
            Some(slot) if slot.is_alive() && slot.flags.contains(ComponentFlags::AWAKE) => {
                let desired = desired && slot.flags.contains(ComponentFlags::ENABLED);
                if slot.flags.contains(ComponentFlags::LIVE) == desired {
                    return;
                }
                slot.flags.set(ComponentFlags::LIVE, desired);
                if desired {
                    LifecycleEvent::Enable
                } else {
                    LifecycleEvent::Disable
                }
            }
            _ => return,
        };
        self.invoke(id, event);
    }

    /// Call `event` on a component, or queue it if the component is busy
    fn invoke(&mut self, id: ComponentId, event: LifecycleEvent) {
        let Some(slot) = self.slot_mut(id) else {
            return;
        };
        match slot.behavior.take() {
            Some(behavior) => self.run_callback(id, behavior, event),
            None => {
                if event.is_notification() {
                    slot.pending.push_back(event);
                }
            }
        }
    }

    fn run_callback(&mut self, id: ComponentId, mut behavior: Box<dyn Component>, event: LifecycleEvent) {
        {
            let mut ctx = ComponentContext::new(self, id);
            event.dispatch(behavior.as_mut(), &mut ctx);
        }
        self.restore(id, behavior);
    }

    /// Put a component back in its slot after a callback
    ///
    /// Delivers notifications queued while it was busy, and runs `on_destroy`
    /// if its entity was torn down in the meantime.
    fn restore(&mut self, id: ComponentId, mut behavior: Box<dyn Component>) {
        loop {
            let next = match self.slot_mut(id) {
                None => Next::Destroy,
                Some(slot) if !slot.is_alive() => {
                    if slot.flags.contains(ComponentFlags::DESTROY_NOTIFIED) {
                        Next::Discard
                    } else {
                        slot.flags.insert(ComponentFlags::DESTROY_NOTIFIED);
                        Next::Destroy
                    }
                }
                Some(slot) => match slot.pending.pop_front() {
                    Some(event) => Next::Deliver(event),
                    None => {
                        slot.behavior = Some(behavior);
                        return;
                    }
                },
            };

            match next {
                Next::Deliver(event) => {
                    let mut ctx = ComponentContext::new(self, id);
                    event.dispatch(behavior.as_mut(), &mut ctx);
                }
                Next::Destroy => {
                    let mut ctx = ComponentContext::new(self, id);
                    behavior.on_destroy(&mut ctx);
                    return;
                }
                Next::Discard => return,
            }
        }
    }

    fn dispatch_update(&mut self, id: ComponentId, delta_time: f32) {
        let started = match self.slot(id) {
            Some(slot)
                if slot.is_alive()
                    && slot.behavior.is_some()
                    && slot.flags.contains(ComponentFlags::ENABLED) =>
            {
                slot.flags.contains(ComponentFlags::STARTED)
            }
            _ => return,
        };
        if !self.is_active(id.entity()) {
            return;
        }

        if !started {
            if let Some(slot) = self.slot_mut(id) {
                slot.flags.insert(ComponentFlags::STARTED);
            }
            self.invoke(id, LifecycleEvent::Start);

            // start() may have disabled the component or deactivated its entity
            if !self.is_component_enabled(id) || !self.is_active(id.entity()) {
                return;
            }
        }
        self.invoke(id, LifecycleEvent::Update(delta_time));
    }

    // ===== UPDATE =====

    /// Run one frame: every root entity, then its subtree, in creation order
    ///
    /// Entities created during the pass are first visited on the next frame.
    pub fn update(&mut self, delta_time: f32) {
        let frame_limit = self.next_entity_id;
        for root in self.root_entities() {
            if self.contains(root) && self.parent(root).is_none() {
                self.update_subtree(root, delta_time, frame_limit);
            }
        }
    }

    /// Run one frame for `id` and its subtree
    pub fn update_entity(&mut self, id: EntityId, delta_time: f32) {
        self.update_subtree(id, delta_time, u64::MAX);
    }

    fn update_subtree(&mut self, id: EntityId, delta_time: f32, frame_limit: u64) {
        if id.raw() >= frame_limit || !self.is_active(id) {
            return;
        }

        let count = match self.entity(id) {
            Some(entity) => entity.components.len(),
            None => return,
        };
        for index in 0..count {
            match self.component_at(id, index) {
                Some(component) => self.dispatch_update(component, delta_time),
                None => return,
            }
        }

        let children = self.children(id).to_vec();
        for child in children {
            if self.parent(child) == Some(id) {
                self.update_subtree(child, delta_time, frame_limit);
            }
        }
    }

    // ===== DESTRUCTION =====

    /// Destroy `id` and its subtree
    ///
    /// Post-order: children first, then the entity is detached from its
    /// parent and each of its components receives `on_destroy` in insertion
    /// order. Returns false for unknown ids or entities already being
    /// destroyed.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        let children = match self.entity_raw_mut(id) {
            Some(entity) if !entity.destroying => {
                entity.destroying = true;
                entity.children.clone()
            }
            _ => return false,
        };

        for child in children {
            if !self.destroy_entity(child) {
                // Already tearing down further up the stack; just cut the link
                if let Some(entity) = self.entity_raw_mut(child) {
                    if entity.parent == Some(id) {
                        entity.parent = None;
                    }
                }
            }
        }

        if let Some(parent) = self.parent(id) {
            if let Some(entity) = self.entity_raw_mut(parent) {
                entity.children.retain(|child| *child != id);
            }
        }
        if let Some(entity) = self.entity_raw_mut(id) {
            entity.parent = None;
            entity.children.clear();
        }

        let count = self.entity(id).map(|entity| entity.components.len()).unwrap_or(0);
        for index in 0..count {
            self.destroy_component(id, index);
        }

        if let Some(key) = self.index.remove(&id) {
            self.entities.remove(key);
            self.order.retain(|existing| *existing != key);
        }
        true
    }

    fn destroy_component(&mut self, entity: EntityId, index: usize) {
        let Some(id) = self.component_at(entity, index) else {
            return;
        };
        let behavior = match self.slot_mut(id) {
            Some(slot) if slot.is_alive() => {
                slot.flags.insert(ComponentFlags::DESTROYED);
                slot.flags.remove(ComponentFlags::LIVE);
                slot.pending.clear();
                let behavior = slot.behavior.take();
                if behavior.is_some() {
                    slot.flags.insert(ComponentFlags::DESTROY_NOTIFIED);
                }
                behavior
            }
            _ => return,
        };

        // A busy component is notified by restore() once its callback returns
        if let Some(mut behavior) = behavior {
            let mut ctx = ComponentContext::new(self, id);
            behavior.on_destroy(&mut ctx);
        }
    }

    /// Destroy every entity
    ///
    /// The id counter restarts at 1 once the scene is empty.
    pub fn clear(&mut self) {
        for root in self.root_entities() {
            self.destroy_entity(root);
        }

        // Entities created by on_destroy callbacks
        loop {
            let next = self
                .entities()
                .find(|entity| !entity.is_destroying())
                .map(|entity| entity.id());
            match next {
                Some(id) => {
                    self.destroy_entity(id);
                }
                None => break,
            }
        }

        if self.entities.is_empty() {
            self.next_entity_id = 1;
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("entities", &self.entities.len())
            .field("next_entity_id", &self.next_entity_id)
            .finish()
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
