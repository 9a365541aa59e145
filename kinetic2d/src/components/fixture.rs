use log::{error, warn};

use crate::component::{Behavior, ComponentId};
use crate::context::SceneContext;
use crate::error::SceneError;
use crate::physics::{BodyHandle, FixtureHandle, FixtureMaterial, FixtureShape};

/// A collision fixture on the body of the owning node.
///
/// Requires a [`BodyComponent`](super::BodyComponent) on the same node; without
/// one the component logs an error and destroys itself during
/// initialization.
#[derive(Debug)]
pub struct FixtureComponent {
    shape: FixtureShape,
    material: FixtureMaterial,
    body: Option<BodyHandle>,
    fixture: Option<FixtureHandle>,
}

impl FixtureComponent {
    pub fn new(shape: FixtureShape) -> Self {
        Self {
            shape,
            material: FixtureMaterial::default(),
            body: None,
            fixture: None,
        }
    }

    pub fn with_material(mut self, material: FixtureMaterial) -> Self {
        self.material = material;
        self
    }

    pub fn shape(&self) -> &FixtureShape {
        &self.shape
    }

    pub fn material(&self) -> FixtureMaterial {
        self.material
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    pub fn fixture(&self) -> Option<FixtureHandle> {
        self.fixture
    }

    /// Adopt `fixture`, disposing the previous one.
    ///
    /// The fixture must hang off the owning node's body. A mismatch is
    /// rejected before anything changes.
    pub fn set_fixture(
        &mut self,
        ctx: &mut SceneContext<'_>,
        me: ComponentId,
        fixture: FixtureHandle,
    ) -> Result<(), SceneError> {
        let Some(body) = self.body else {
            error!("fixture component {me:?} has no body to attach {fixture:?} to");
            return Err(SceneError::MissingBody);
        };
        if ctx.physics().fixture_body(fixture) != Some(body) {
            error!("fixture {fixture:?} does not belong to body {body:?} of component {me:?}");
            return Err(SceneError::FixtureBodyMismatch);
        }

        if let Some(previous) = self.fixture.replace(fixture) {
            if previous != fixture {
                ctx.physics_mut().dispose_fixture(previous);
            }
        }
        ctx.physics_mut().set_fixture_owner(fixture, me);
        Ok(())
    }

    /// Replace the collision shape. An invalid shape is rejected with a
    /// warning and the current fixture is kept.
    pub fn set_shape(
        &mut self,
        ctx: &mut SceneContext<'_>,
        me: ComponentId,
        shape: FixtureShape,
    ) -> Result<(), SceneError> {
        if let Err(err) = shape.validate() {
            warn!("rejecting shape for fixture component {me:?}: {err}");
            return Err(err);
        }
        if let Some(body) = self.body {
            self.rebuild(ctx, me, body, &shape)?;
        }
        self.shape = shape;
        Ok(())
    }

    pub fn set_material(&mut self, ctx: &mut SceneContext<'_>, material: FixtureMaterial) {
        self.material = material;
        if let Some(fixture) = self.fixture {
            ctx.physics_mut().set_fixture_material(fixture, material);
        }
    }

    fn rebuild(
        &mut self,
        ctx: &mut SceneContext<'_>,
        me: ComponentId,
        body: BodyHandle,
        shape: &FixtureShape,
    ) -> Result<(), SceneError> {
        let Some(fixture) = ctx.physics_mut().attach_fixture(body, shape, self.material) else {
            warn!("the physics world rejected shape {shape:?} for component {me:?}");
            return Err(SceneError::DegenerateShape);
        };
        self.set_fixture(ctx, me, fixture)
    }
}

impl Default for FixtureComponent {
    fn default() -> Self {
        Self::new(FixtureShape::default())
    }
}

impl Behavior for FixtureComponent {
    fn on_initialize(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId) {
        let body = ctx.owner(me).and_then(|node| ctx.body(node));
        let Some(body) = body else {
            error!(
                "fixture component {me:?} requires a body component on its node; destroying it"
            );
            ctx.destroy_component(me);
            return;
        };
        self.body = Some(body);

        let shape = self.shape.clone();
        let built = shape
            .validate()
            .and_then(|()| self.rebuild(ctx, me, body, &shape));
        if let Err(err) = built {
            error!("fixture component {me:?} could not create its fixture: {err}");
            ctx.destroy_component(me);
        }
    }

    fn on_destroy(&mut self, ctx: &mut SceneContext<'_>, _me: ComponentId) {
        if let Some(fixture) = self.fixture.take() {
            ctx.physics_mut().dispose_fixture(fixture);
        }
    }
}
