/// Transform - position, rotation and scale of an entity.
///
/// Values are relative to the parent entity's Transform. The local matrix is
/// cached and rebuilt lazily after a setter runs. World matrices are composed
/// on demand by walking up the hierarchy through the scene.

use std::cell::Cell;
use glam::{Mat4, Quat, Vec3};
use crate::scene::{Component, ComponentContext, EntityId, Scene};

/// Spatial component
///
/// Rotation is stored as Euler angles in degrees, applied X then Y then Z
/// (`T * Rx * Ry * Rz * S`). Forward is -Z, right is +X, up is +Y.
#[derive(Debug, Clone)]
pub struct Transform {
    position: Vec3,
    /// Degrees
    rotation: Vec3,
    scale: Vec3,
    /// Owning entity (known once attached)
    entity: Option<EntityId>,
    local_matrix: Cell<Mat4>,
    dirty: Cell<bool>,
}

impl Transform {
    pub fn new(position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
            entity: None,
            local_matrix: Cell::new(Mat4::IDENTITY),
            dirty: Cell::new(true),
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Vec3::ZERO, Vec3::ONE)
    }

    // ===== GETTERS / SETTERS =====

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty.set(true);
    }

    /// Euler angles in degrees
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.dirty.set(true);
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty.set(true);
    }

    /// Entity this transform is attached to
    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    // ===== MATRICES =====

    /// Rotation as a quaternion (X, then Y, then Z)
    pub fn rotation_quat(&self) -> Quat {
        Quat::from_rotation_x(self.rotation.x.to_radians())
            * Quat::from_rotation_y(self.rotation.y.to_radians())
            * Quat::from_rotation_z(self.rotation.z.to_radians())
    }

    /// Local space to parent space
    pub fn local_to_parent_matrix(&self) -> Mat4 {
        if self.dirty.get() {
            let matrix = Mat4::from_scale_rotation_translation(
                self.scale,
                self.rotation_quat(),
                self.position,
            );
            self.local_matrix.set(matrix);
            self.dirty.set(false);
        }
        self.local_matrix.get()
    }

    /// Local space to world space
    ///
    /// Composes the parent's Transform, and so on up the hierarchy. The walk
    /// stops at the first ancestor without a Transform.
    pub fn local_to_world_matrix(&self, scene: &Scene) -> Mat4 {
        let local = self.local_to_parent_matrix();
        let parent_transform = self
            .entity
            .and_then(|entity| scene.parent(entity))
            .and_then(|parent| scene.get_component::<Transform>(parent));

        match parent_transform {
            Some(parent) => parent.local_to_world_matrix(scene) * local,
            None => local,
        }
    }

    /// World space to local space
    pub fn world_to_local_matrix(&self, scene: &Scene) -> Mat4 {
        self.local_to_world_matrix(scene).inverse()
    }

    /// World matrix of `entity`'s first Transform, if it has one
    pub fn world_matrix_of(scene: &Scene, entity: EntityId) -> Option<Mat4> {
        scene
            .get_component::<Transform>(entity)
            .map(|transform| transform.local_to_world_matrix(scene))
    }

    // ===== DIRECTIONS =====

    /// Local -Z after rotation
    pub fn forward(&self) -> Vec3 {
        (self.rotation_quat() * Vec3::NEG_Z).normalize()
    }

    /// Local +X after rotation
    pub fn right(&self) -> Vec3 {
        (self.rotation_quat() * Vec3::X).normalize()
    }

    /// Local +Y after rotation
    pub fn up(&self) -> Vec3 {
        (self.rotation_quat() * Vec3::Y).normalize()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO, Vec3::ONE)
    }
}

impl Component for Transform {
    fn awake(&mut self, ctx: &mut ComponentContext<'_>) {
        self.entity = Some(ctx.entity());
    }
}

#[cfg(test)]
#[path = "transform_tests.rs"]
mod tests;
