use kinetic2d::{Behavior, BodyHandle, ComponentId, SceneContext, Vec2};

/// Per-body gravity that replaces the world's for the bodies it holds.
///
/// Each update applies `value * mass` to every held body.
#[derive(Debug, Default)]
pub struct Gravity {
    bodies: Vec<BodyHandle>,
    pub value: Vec2,
}

impl Gravity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body(&mut self, ctx: &mut SceneContext<'_>, body: BodyHandle) {
        if !self.bodies.contains(&body) {
            self.bodies.push(body);
        }
        ctx.physics_mut().set_gravity_enabled(body, false);
    }
}

impl Behavior for Gravity {
    fn on_update(&mut self, ctx: &mut SceneContext<'_>, _me: ComponentId, _dt: f32) {
        for &body in &self.bodies {
            if let Some(mass) = ctx.physics().mass(body) {
                ctx.physics_mut().apply_force(body, self.value * mass);
            }
        }
    }

    fn on_destroy(&mut self, ctx: &mut SceneContext<'_>, _me: ComponentId) {
        for body in std::mem::take(&mut self.bodies) {
            ctx.physics_mut().set_gravity_enabled(body, true);
        }
    }
}
