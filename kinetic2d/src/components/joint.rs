use log::error;

use crate::component::{Behavior, ComponentId};
use crate::context::SceneContext;
use crate::error::SceneError;
use crate::physics::{JointHandle, JointSpec};

/// A joint between the owning node's body and its parent node's body.
#[derive(Debug, Default)]
pub struct JointComponent {
    spec: Option<JointSpec>,
    joint: Option<JointHandle>,
}

impl JointComponent {
    /// A component that holds no joint until one is assigned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to the parent node's body on initialization. Both bodies must
    /// exist and carry at least one fixture, otherwise the component
    /// destroys itself.
    pub fn to_parent(spec: JointSpec) -> Self {
        Self {
            spec: Some(spec),
            joint: None,
        }
    }

    pub fn spec(&self) -> Option<JointSpec> {
        self.spec
    }

    pub fn joint(&self) -> Option<JointHandle> {
        self.joint
    }

    /// Create the joint described by `spec` between the parent's body
    /// (first) and the owning node's body (second).
    pub fn connect(
        &mut self,
        ctx: &mut SceneContext<'_>,
        me: ComponentId,
        spec: JointSpec,
    ) -> Result<JointHandle, SceneError> {
        let node = ctx
            .owner(me)
            .ok_or_else(|| SceneError::DeadNode(format!("{me:?}")))?;
        let body = ctx.body(node).ok_or(SceneError::MissingBody)?;
        let parent_body = ctx
            .parent(node)
            .and_then(|parent| ctx.body(parent))
            .ok_or(SceneError::MissingParentBody)?;

        let physics = ctx.physics();
        if physics.fixtures_on(body) == 0 || physics.fixtures_on(parent_body) == 0 {
            return Err(SceneError::MissingFixture);
        }

        let joint = ctx
            .physics_mut()
            .create_joint(parent_body, body, &spec)
            .ok_or(SceneError::MissingBody)?;
        self.spec = Some(spec);
        self.set_joint(ctx, me, joint);
        Ok(joint)
    }

    /// Adopt `joint`, removing the previously held one from the world.
    pub fn set_joint(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId, joint: JointHandle) {
        if let Some(previous) = self.joint.replace(joint) {
            if previous != joint {
                ctx.physics_mut().remove_joint(previous);
            }
        }
        ctx.physics_mut().set_joint_owner(joint, me);
    }

    /// Drive the joint's rotation motor.
    pub fn set_motor(&self, ctx: &mut SceneContext<'_>, speed: f32, max_torque: f32) {
        if let Some(joint) = self.joint {
            ctx.physics_mut().set_joint_motor(joint, speed, max_torque);
        }
    }

    /// Relative angular speed of the joined bodies.
    pub fn speed(&self, ctx: &SceneContext<'_>) -> Option<f32> {
        ctx.physics().joint_speed(self.joint?)
    }
}

impl Behavior for JointComponent {
    fn on_initialize(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId) {
        let Some(spec) = self.spec else {
            return;
        };
        if let Err(err) = self.connect(ctx, me, spec) {
            error!("joint component {me:?} cannot connect: {err}; destroying it");
            ctx.destroy_component(me);
        }
    }

    fn on_destroy(&mut self, ctx: &mut SceneContext<'_>, _me: ComponentId) {
        if let Some(joint) = self.joint.take() {
            if ctx.physics().contains_joint(joint) {
                ctx.physics_mut().remove_joint(joint);
            }
        }
    }
}
