use log::{debug, error};

use crate::component::{Behavior, ComponentId};
use crate::context::SceneContext;
use crate::physics::{BodyHandle, BodyKind};

/// Owns the rigid body of its node.
///
/// The body is created at the node's pose when the component initializes,
/// and from then on the node's position and rotation read from and write
/// to it. A node carries at most one body: a second `BodyComponent`
/// reports the problem and destroys itself.
#[derive(Debug)]
pub struct BodyComponent {
    kind: BodyKind,
    handle: Option<BodyHandle>,
}

impl BodyComponent {
    pub fn new(kind: BodyKind) -> Self {
        Self { kind, handle: None }
    }

    pub fn dynamic() -> Self {
        Self::new(BodyKind::Dynamic)
    }

    pub fn kinematic() -> Self {
        Self::new(BodyKind::Kinematic)
    }

    pub fn fixed() -> Self {
        Self::new(BodyKind::Static)
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn handle(&self) -> Option<BodyHandle> {
        self.handle
    }

    pub fn set_kind(&mut self, ctx: &mut SceneContext<'_>, kind: BodyKind) {
        self.kind = kind;
        if let Some(body) = self.handle {
            ctx.physics_mut().set_body_kind(body, kind);
        }
    }
}

impl Default for BodyComponent {
    fn default() -> Self {
        Self::dynamic()
    }
}

impl Behavior for BodyComponent {
    fn on_initialize(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId) {
        let Some(node) = ctx.owner(me) else {
            return;
        };
        if ctx.body(node).is_some() {
            error!(
                "node {node:?} ({:?}) already has a body; destroying the extra body component",
                ctx.name(node)
            );
            ctx.destroy_component(me);
            return;
        }

        let position = ctx.units().to_sim(ctx.position(node));
        let rotation = ctx.rotation(node);
        let body = ctx
            .physics_mut()
            .create_body(self.kind, position, rotation, me);
        self.handle = Some(body);
        ctx.bind_transform(node, me, body);
        debug!("node {node:?} is now driven by body {body:?}");
    }

    fn on_destroy(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId) {
        if let Some(node) = ctx.owner(me) {
            ctx.unbind_transform(node, me);
        }
        if let Some(body) = self.handle.take() {
            if ctx.physics().contains_body(body) {
                ctx.physics_mut().remove_body(body);
            }
        }
    }
}
