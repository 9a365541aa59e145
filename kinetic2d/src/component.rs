//! Components: behavior units owned by exactly one node.
//!
//! A component is a boxed [`Behavior`] stored in the scene graph's component
//! arena. Hooks receive the [`SceneContext`] and their own [`ComponentId`],
//! so a behavior can reach its node, siblings and the physics world without
//! holding references into the graph. While a hook runs, the behavior is
//! taken out of its slot; destroying a component whose hook is running
//! detaches it immediately and runs its teardown once the hook returns.

use std::any::{Any, TypeId};

use slotmap::new_key_type;

use crate::context::SceneContext;
use crate::entity::Lifecycle;
use crate::node::NodeId;
use crate::physics::{ContactPhase, FixtureHandle};
use crate::render::SpriteBatch;

new_key_type! {
    pub struct ComponentId;
}

pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
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

/// Contact reported to every component of the node owning `fixture`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contact {
    pub phase: ContactPhase,
    pub fixture: FixtureHandle,
    pub other_fixture: FixtureHandle,
    pub other_component: Option<ComponentId>,
    pub other_node: Option<NodeId>,
}

/// Behavior hooks of a component. All hooks default to doing nothing.
///
/// Hooks never fail: a component whose preconditions do not hold logs the
/// problem and destroys itself through the context.
pub trait Behavior: AsAny {
    fn on_initialize(&mut self, _ctx: &mut SceneContext<'_>, _me: ComponentId) {}

    fn on_update(&mut self, _ctx: &mut SceneContext<'_>, _me: ComponentId, _dt: f32) {}

    fn on_draw(
        &mut self,
        _ctx: &mut SceneContext<'_>,
        _me: ComponentId,
        _batch: &mut dyn SpriteBatch,
    ) {
    }

    fn on_contact(&mut self, _ctx: &mut SceneContext<'_>, _me: ComponentId, _contact: &Contact) {}

    fn on_destroy(&mut self, _ctx: &mut SceneContext<'_>, _me: ComponentId) {}
}

pub(crate) fn downcast_ref<T: Behavior>(behavior: &dyn Behavior) -> Option<&T> {
    behavior.as_any().downcast_ref::<T>()
}

pub(crate) fn downcast_mut<T: Behavior>(behavior: &mut dyn Behavior) -> Option<&mut T> {
    behavior.as_any_mut().downcast_mut::<T>()
}

pub(crate) struct ComponentSlot {
    pub(crate) owner: NodeId,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) lifecycle: Lifecycle,
    /// `None` while one of the behavior's hooks is running.
    pub(crate) behavior: Option<Box<dyn Behavior>>,
    /// Destroyed while busy; teardown runs when the hook returns.
    pub(crate) teardown_pending: bool,
}

impl ComponentSlot {
    pub(crate) fn new<T: Behavior>(owner: NodeId, behavior: T) -> Self {
        Self {
            owner,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            lifecycle: Lifecycle::Uninitialized,
            behavior: Some(Box::new(behavior)),
            teardown_pending: false,
        }
    }

    pub(crate) fn is<T: Behavior>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}
