//! Position/rotation source of a node.
//!
//! A node either owns its pose outright or forwards it to the rigid body of
//! one of its body components. Every write is mirrored into the local
//! transform as well, and when the binding is released the body's final pose
//! is copied back, so local storage is never stale once it becomes the
//! source again.

use glam::Vec2;

use crate::component::ComponentId;
use crate::physics::{BodyHandle, PhysicsWorld};

/// Display-space pose stored on every node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    /// Radians.
    pub rotation: f32,
    pub scale: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransformBinding {
    #[default]
    Local,
    Body {
        component: ComponentId,
        body: BodyHandle,
    },
}

impl TransformBinding {
    pub fn bound_component(&self) -> Option<ComponentId> {
        match self {
            TransformBinding::Local => None,
            TransformBinding::Body { component, .. } => Some(*component),
        }
    }

    pub fn body(&self) -> Option<BodyHandle> {
        match self {
            TransformBinding::Local => None,
            TransformBinding::Body { body, .. } => Some(*body),
        }
    }

    pub fn position(&self, local: &Transform, physics: &PhysicsWorld) -> Vec2 {
        match self {
            TransformBinding::Local => local.position,
            TransformBinding::Body { body, .. } => physics
                .body_position(*body)
                .map(|p| physics.units().to_display(p))
                .unwrap_or(local.position),
        }
    }

    pub fn rotation(&self, local: &Transform, physics: &PhysicsWorld) -> f32 {
        match self {
            TransformBinding::Local => local.rotation,
            TransformBinding::Body { body, .. } => {
                physics.body_rotation(*body).unwrap_or(local.rotation)
            }
        }
    }

    pub fn set_position(&self, local: &mut Transform, physics: &mut PhysicsWorld, value: Vec2) {
        local.position = value;
        if let TransformBinding::Body { body, .. } = self {
            let sim = physics.units().to_sim(value);
            physics.set_body_position(*body, sim);
        }
    }

    pub fn set_rotation(&self, local: &mut Transform, physics: &mut PhysicsWorld, value: f32) {
        local.rotation = value;
        if let TransformBinding::Body { body, .. } = self {
            physics.set_body_rotation(*body, value);
        }
    }

    /// Copy the simulated pose into `local` (no-op when unbound).
    pub fn sync_local(&self, local: &mut Transform, physics: &PhysicsWorld) {
        local.position = self.position(local, physics);
        local.rotation = self.rotation(local, physics);
    }
}
