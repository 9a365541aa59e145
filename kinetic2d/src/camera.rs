//! Scene camera with zoom, rotation and optional smoothed following.

use glam::{Mat4, Vec2};

use crate::physics::UnitScale;

/// 2D camera. `position` is the world point shown at the top-left of the
/// viewport before rotation and zoom are applied around `origin`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec2,
    /// Pivot for rotation and zoom, in screen space.
    pub origin: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    /// 0.0 = snap to the target, values towards 1.0 lag behind it.
    pub smoothing: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec2::new(1280.0, 720.0))
    }
}

impl Camera {
    /// Camera whose origin is the centre of a viewport of `viewport` pixels.
    pub fn new(viewport: Vec2) -> Self {
        Self {
            position: Vec2::ZERO,
            origin: viewport * 0.5,
            rotation: 0.0,
            scale: Vec2::ONE,
            smoothing: 0.0,
        }
    }

    pub fn with_smoothing(mut self, factor: f32) -> Self {
        self.smoothing = factor.clamp(0.0, 1.0);
        self
    }

    /// World → screen transform in display units.
    pub fn view_matrix(&self) -> Mat4 {
        Self::compose(self.position, self.origin, self.rotation, self.scale)
    }

    /// The same transform composed in simulation units, then scaled back
    /// to screen pixels. Used for geometry expressed in meters.
    pub fn sim_view_matrix(&self, units: UnitScale) -> Mat4 {
        let to_pixels = Vec2::splat(units.display_per_sim()).extend(1.0);
        Mat4::from_scale(to_pixels)
            * Self::compose(
                units.to_sim(self.position),
                units.to_sim(self.origin),
                self.rotation,
                self.scale,
            )
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        self.view_matrix()
            .inverse()
            .transform_point3(screen.extend(0.0))
            .truncate()
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        self.view_matrix()
            .transform_point3(world.extend(0.0))
            .truncate()
    }

    /// Move so that `target` sits at the camera origin.
    pub fn center_on(&mut self, target: Vec2) {
        let desired = target - self.origin;
        self.position = if self.smoothing > 0.0 {
            self.position.lerp(desired, 1.0 - self.smoothing)
        } else {
            desired
        };
    }

    pub fn zoom_by(&mut self, factor: f32) {
        self.scale *= factor;
    }

    fn compose(position: Vec2, origin: Vec2, rotation: f32, scale: Vec2) -> Mat4 {
        Mat4::from_translation(origin.extend(0.0))
            * Mat4::from_scale(scale.extend(1.0))
            * Mat4::from_rotation_z(rotation)
            * Mat4::from_translation((-origin).extend(0.0))
            * Mat4::from_translation((-position).extend(0.0))
    }
}
