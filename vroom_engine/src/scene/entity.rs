/// Entity - a node of the scene graph.
///
/// An entity owns an ordered list of components and refers to its parent and
/// children by id. Entities live inside a Scene; all structural mutation goes
/// through the scene (directly, or via the `EntityMut` view).

use std::fmt;
use std::sync::Arc;
use super::component::{Component, ComponentId, ComponentSlot};
use super::scene::Scene;
use super::scene_manager::SceneManager;

// ===== ENTITY ID =====

/// Identity of an entity, unique within one scene
///
/// Ids are assigned in increasing order starting at 1. The value 0 is
/// reserved for "no entity".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Reserved "no entity" id
    pub const INVALID: EntityId = EntityId(0);

    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw integer value
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// False only for `EntityId::INVALID`
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

// ===== ENTITY =====

/// Scene graph node (read-only view, see `Scene::entity`)
pub struct Entity {
    pub(crate) id: EntityId,
    /// Local active flag
    pub(crate) active: bool,
    pub(crate) parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
    /// Insertion order is update order
    pub(crate) components: Vec<ComponentSlot>,
    /// Teardown in progress: no new components, no reparenting
    pub(crate) destroying: bool,
}

impl Entity {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            active: true,
            parent: None,
            children: Vec::new(),
            components: Vec::new(),
            destroying: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Local active flag, ignoring ancestors (see `Scene::is_active`)
    pub fn is_active_self(&self) -> bool {
        self.active
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of attached (not destroyed) components
    pub fn component_count(&self) -> usize {
        self.components.iter().filter(|slot| slot.is_alive()).count()
    }

    /// Handles of the attached components, in update order
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.components
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_alive())
            .map(|(index, slot)| ComponentId::new(self.id, index as u32, slot.serial))
            .collect()
    }

    pub(crate) fn is_destroying(&self) -> bool {
        self.destroying
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("active", &self.active)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("components", &self.component_count())
            .finish()
    }
}

// ===== ENTITY MUT =====

/// Mutable view of one entity, borrowed from its scene
///
/// Every method forwards to the equivalent `Scene` operation.
pub struct EntityMut<'a> {
    scene: &'a mut Scene,
    id: EntityId,
}

impl<'a> EntityMut<'a> {
    pub(crate) fn new(scene: &'a mut Scene, id: EntityId) -> Self {
        Self { scene, id }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn scene(&self) -> &Scene {
        &*self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut *self.scene
    }

    /// Effective activity (local flag and every ancestor)
    pub fn is_active(&self) -> bool {
        self.scene.is_active(self.id)
    }

    pub fn is_active_self(&self) -> bool {
        self.scene.is_active_self(self.id)
    }

    pub fn set_active(&mut self, active: bool) -> bool {
        self.scene.set_active(self.id, active)
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.scene.parent(self.id)
    }

    pub fn children(&self) -> &[EntityId] {
        self.scene.children(self.id)
    }

    pub fn set_parent(&mut self, parent: Option<EntityId>) -> bool {
        self.scene.set_parent(self.id, parent)
    }

    pub fn add_child(&mut self, child: EntityId) -> bool {
        self.scene.add_child(self.id, child)
    }

    pub fn remove_child(&mut self, child: EntityId) -> bool {
        self.scene.remove_child(self.id, child)
    }

    pub fn add_component<T: Component>(&mut self, component: T) -> Option<ComponentId> {
        self.scene.add_component(self.id, component)
    }

    pub fn get_component<T: Component>(&self) -> Option<&T> {
        self.scene.get_component::<T>(self.id)
    }

    pub fn get_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.scene.get_component_mut::<T>(self.id)
    }

    pub fn component_with<C: ?Sized + 'static>(&self) -> Option<&dyn Component> {
        self.scene.component_with::<C>(self.id)
    }

    pub fn component_as<C: ?Sized + 'static>(&self) -> Option<&C> {
        self.scene.component_as::<C>(self.id)
    }

    pub fn component_as_mut<C: ?Sized + 'static>(&mut self) -> Option<&mut C> {
        self.scene.component_as_mut::<C>(self.id)
    }

    pub fn component_count(&self) -> usize {
        self.scene.component_count(self.id)
    }

    /// Run one frame for this entity and its subtree
    pub fn update(&mut self, delta_time: f32) {
        self.scene.update_entity(self.id, delta_time);
    }

    pub fn scene_manager(&self) -> Option<Arc<SceneManager>> {
        self.scene.scene_manager()
    }

    /// Destroy this entity and its subtree
    pub fn destroy(self) -> bool {
        self.scene.destroy_entity(self.id)
    }
}
