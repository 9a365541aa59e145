//! Explicit context handed to every component hook and scene script.
//!
//! A [`SceneContext`] bundles mutable access to the active scene's graph,
//! physics world and camera together with the process-wide
//! [`EngineContext`] (input snapshot, texture cache, node factory). All
//! scene mutation goes through it.

use glam::Vec2;
use log::{debug, error, trace, warn};
use slotmap::Key;

use crate::assets::TextureCache;
use crate::binding::TransformBinding;
use crate::camera::Camera;
use crate::component::{downcast_mut, Behavior, ComponentId, ComponentSlot, Contact};
use crate::engine::EngineContext;
use crate::entity::{Entity, EntitySlot, Lifecycle};
use crate::error::SceneError;
use crate::input::InputState;
use crate::node::{EntityId, Node, NodeId, RootEntry, SceneGraph};
use crate::physics::{BodyHandle, PhysicsWorld, UnitScale};
use crate::render::SpriteBatch;
use crate::scene::Scene;

pub struct SceneContext<'a> {
    pub(crate) graph: &'a mut SceneGraph,
    pub(crate) physics: &'a mut PhysicsWorld,
    pub(crate) camera: &'a mut Camera,
    pub(crate) debug_draw: &'a mut bool,
    pub(crate) engine: &'a mut EngineContext,
}

impl<'a> SceneContext<'a> {
    pub fn graph(&self) -> &SceneGraph {
        self.graph
    }

    pub fn physics(&self) -> &PhysicsWorld {
        self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        self.physics
    }

    pub fn units(&self) -> UnitScale {
        self.physics.units()
    }

    pub fn camera(&self) -> &Camera {
        self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        self.camera
    }

    pub fn engine(&self) -> &EngineContext {
        self.engine
    }

    pub fn engine_mut(&mut self) -> &mut EngineContext {
        self.engine
    }

    pub fn input(&self) -> &InputState {
        self.engine.input()
    }

    pub fn textures(&self) -> &TextureCache {
        self.engine.textures()
    }

    pub fn textures_mut(&mut self) -> &mut TextureCache {
        self.engine.textures_mut()
    }

    pub fn debug_draw(&self) -> bool {
        *self.debug_draw
    }

    pub fn set_debug_draw(&mut self, enabled: bool) {
        *self.debug_draw = enabled;
    }

    /// Replace the active scene at the start of the next frame.
    pub fn change_scene(&mut self, scene: Scene) {
        self.engine.change_scene(scene);
    }

    // ------------------------------
    // Nodes
    // ------------------------------

    /// Create a node under `parent` (or the scene root) and register it with
    /// its owner. A parent that is no longer alive falls back to the root.
    ///
    /// Nodes carry no behavior of their own: initialization is the move to
    /// [`Lifecycle::Initialized`] after registration, and per-node setup runs
    /// in the hooks of the components added next.
    pub fn create_node(&mut self, parent: Option<NodeId>, name: Option<&str>) -> NodeId {
        let parent = match parent {
            Some(p) if self.graph.is_live(p) => Some(p),
            Some(p) => {
                warn!("parent node {p:?} is not alive; creating {name:?} at the scene root");
                None
            }
            None => None,
        };

        let id = self.graph.nodes.insert(Node::new(name, parent));
        match parent.and_then(|p| self.graph.nodes.get_mut(p)) {
            Some(p) => p.children.push(id),
            None => self.graph.roots.push(RootEntry::Node(id)),
        }
        if let Some(node) = self.graph.nodes.get_mut(id) {
            node.lifecycle = Lifecycle::Initialized;
        }
        trace!("created node {id:?} ({name:?}) under {parent:?}");
        id
    }

    /// Destroy `id`: children first, then components (both from a snapshot
    /// taken now), then detach from the owner. Destroying a node that is
    /// already gone or being torn down does nothing.
    ///
    /// If one of the node's components is inside a hook, the node stays in
    /// the arena (destroyed, not live) until that component's teardown runs.
    pub fn destroy_node(&mut self, id: NodeId) {
        let Some(node) = self.graph.nodes.get_mut(id) else {
            return;
        };
        if node.lifecycle.is_destroyed() {
            return;
        }
        node.lifecycle = Lifecycle::Destroyed;
        let children = node.children.snapshot();
        let components = node.components.snapshot();
        debug!("destroying node {id:?} ({:?})", node.name);

        for child in children {
            self.destroy_node(child);
        }
        for component in components {
            self.destroy_component(component);
        }

        if !self.graph.has_pending_teardown(id) {
            self.detach_node(id);
        }
    }

    fn detach_node(&mut self, id: NodeId) {
        let Some(node) = self.graph.nodes.remove(id) else {
            return;
        };
        match node.parent.and_then(|p| self.graph.nodes.get_mut(p)) {
            Some(p) => {
                p.children.remove(&id);
            }
            None => {
                self.graph.roots.remove(&RootEntry::Node(id));
            }
        }
        trace!("detached node {id:?}");
    }

    pub fn is_live(&self, node: NodeId) -> bool {
        self.graph.is_live(node)
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.graph.name(node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.graph.parent(node)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.graph.children(node)
    }

    pub fn find_node(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        self.graph.find(parent, name)
    }

    /// Display-space position, read from the body when one is bound.
    pub fn position(&self, node: NodeId) -> Vec2 {
        self.graph
            .nodes
            .get(node)
            .map(|n| n.binding.position(&n.transform, self.physics))
            .unwrap_or(Vec2::ZERO)
    }

    /// Write the position locally and through to a bound body, waking it.
    pub fn set_position(&mut self, node: NodeId, position: Vec2) {
        if let Some(n) = self.graph.nodes.get_mut(node) {
            n.binding.set_position(&mut n.transform, self.physics, position);
        }
    }

    pub fn rotation(&self, node: NodeId) -> f32 {
        self.graph
            .nodes
            .get(node)
            .map(|n| n.binding.rotation(&n.transform, self.physics))
            .unwrap_or(0.0)
    }

    pub fn set_rotation(&mut self, node: NodeId, rotation: f32) {
        if let Some(n) = self.graph.nodes.get_mut(node) {
            n.binding.set_rotation(&mut n.transform, self.physics, rotation);
        }
    }

    pub fn scale(&self, node: NodeId) -> Vec2 {
        self.graph
            .nodes
            .get(node)
            .map(|n| n.transform.scale)
            .unwrap_or(Vec2::ONE)
    }

    pub fn set_scale(&mut self, node: NodeId, scale: Vec2) {
        if let Some(n) = self.graph.nodes.get_mut(node) {
            n.transform.scale = scale;
        }
    }

    /// Body currently driving the node's pose.
    pub fn body(&self, node: NodeId) -> Option<BodyHandle> {
        self.graph.nodes.get(node).and_then(|n| n.binding.body())
    }

    /// Route the node's pose through `body`, owned by `component`.
    pub(crate) fn bind_transform(&mut self, node: NodeId, component: ComponentId, body: BodyHandle) {
        if let Some(n) = self.graph.nodes.get_mut(node) {
            n.binding = TransformBinding::Body { component, body };
        }
    }

    /// Revert to local storage if `component` holds the binding, keeping the
    /// last simulated pose.
    pub(crate) fn unbind_transform(&mut self, node: NodeId, component: ComponentId) {
        if let Some(n) = self.graph.nodes.get_mut(node) {
            if n.binding.bound_component() == Some(component) {
                n.binding.sync_local(&mut n.transform, self.physics);
                n.binding = TransformBinding::Local;
            }
        }
    }

    // ------------------------------
    // Components
    // ------------------------------

    /// Attach `behavior` to `node` and run its initialization hook.
    ///
    /// The returned id no longer resolves if the component destroyed itself
    /// during initialization. Adding to a dead node is an error and returns
    /// a null id.
    pub fn add_component<T: Behavior>(&mut self, node: NodeId, behavior: T) -> ComponentId {
        if !self.graph.is_live(node) {
            error!(
                "cannot add {} to node {node:?}: the node is not alive",
                std::any::type_name::<T>()
            );
            return ComponentId::null();
        }

        let id = self.graph.components.insert(ComponentSlot::new(node, behavior));
        if let Some(n) = self.graph.nodes.get_mut(node) {
            n.components.push(id);
        }
        trace!("added {} {id:?} to {node:?}", std::any::type_name::<T>());

        self.with_behavior(id, |b, ctx| b.on_initialize(ctx, id));
        if let Some(slot) = self.graph.components.get_mut(id) {
            if slot.lifecycle == Lifecycle::Uninitialized {
                slot.lifecycle = Lifecycle::Initialized;
            }
        }
        id
    }

    /// Detach the component from its node, then run its teardown hook.
    /// A second call is a no-op.
    pub fn destroy_component(&mut self, id: ComponentId) {
        let Some(slot) = self.graph.components.get_mut(id) else {
            return;
        };
        if slot.lifecycle.is_destroyed() {
            return;
        }
        slot.lifecycle = Lifecycle::Destroyed;
        let owner = slot.owner;
        let behavior = slot.behavior.take();
        if behavior.is_none() {
            slot.teardown_pending = true;
        }
        trace!("destroying {} {id:?}", slot.type_name);

        if let Some(node) = self.graph.nodes.get_mut(owner) {
            node.components.remove(&id);
        }

        if let Some(mut behavior) = behavior {
            behavior.on_destroy(self, id);
            self.graph.components.remove(id);
        }
    }

    /// Components cannot move between nodes.
    pub fn reparent_component(&mut self, id: ComponentId, node: NodeId) -> Result<(), SceneError> {
        match self.graph.owner(id) {
            Some(owner) if owner == node => Ok(()),
            _ => {
                error!("component {id:?} cannot be moved to node {node:?}: its owner is fixed");
                Err(SceneError::ComponentOwnerFixed)
            }
        }
    }

    pub fn owner(&self, component: ComponentId) -> Option<NodeId> {
        self.graph.owner(component)
    }

    pub fn get_component<T: Behavior>(&self, node: NodeId) -> Option<ComponentId> {
        self.graph.component_of::<T>(node)
    }

    pub fn get_components<T: Behavior>(&self, node: NodeId) -> Vec<ComponentId> {
        self.graph.components_of::<T>(node)
    }

    pub fn component<T: Behavior>(&self, id: ComponentId) -> Option<&T> {
        self.graph.component::<T>(id)
    }

    /// Run `f` with mutable access to component `id` and the context.
    /// `None` if the id is stale, of another type, or its hook is running.
    pub fn with_component<T, R>(
        &mut self,
        id: ComponentId,
        f: impl FnOnce(&mut T, &mut SceneContext<'a>) -> R,
    ) -> Option<R>
    where
        T: Behavior,
    {
        if !self.graph.components.get(id)?.is::<T>() {
            return None;
        }
        self.with_behavior(id, |b, ctx| downcast_mut::<T>(b).map(|t| f(t, ctx)))
            .flatten()
    }

    /// Take the behavior out of its slot for the duration of `f`.
    pub(crate) fn with_behavior<R>(
        &mut self,
        id: ComponentId,
        f: impl FnOnce(&mut dyn Behavior, &mut SceneContext<'a>) -> R,
    ) -> Option<R> {
        let mut behavior = self.graph.components.get_mut(id)?.behavior.take()?;
        let result = f(behavior.as_mut(), self);
        self.restore_behavior(id, behavior);
        Some(result)
    }

    fn with_live_behavior(
        &mut self,
        id: ComponentId,
        f: impl FnOnce(&mut dyn Behavior, &mut SceneContext<'a>),
    ) {
        let live = self
            .graph
            .components
            .get(id)
            .map(|slot| slot.lifecycle == Lifecycle::Initialized)
            .unwrap_or(false);
        if live {
            self.with_behavior(id, f);
        }
    }

    fn restore_behavior(&mut self, id: ComponentId, mut behavior: Box<dyn Behavior>) {
        let Some(slot) = self.graph.components.get_mut(id) else {
            return;
        };
        if slot.teardown_pending {
            let owner = slot.owner;
            behavior.on_destroy(self, id);
            self.graph.components.remove(id);
            let owner_destroyed = self
                .graph
                .nodes
                .get(owner)
                .is_some_and(|n| n.lifecycle.is_destroyed());
            if owner_destroyed && !self.graph.has_pending_teardown(owner) {
                self.detach_node(owner);
            }
        } else {
            slot.behavior = Some(behavior);
        }
    }

    // ------------------------------
    // Entities
    // ------------------------------

    /// Register a root-level entity and initialize it.
    pub fn add_entity(&mut self, entity: impl Entity + 'static) -> EntityId {
        let mut slot = EntitySlot {
            entity: Box::new(entity),
            lifecycle: Lifecycle::Uninitialized,
        };
        slot.entity.initialize(self.engine.textures_mut());
        slot.lifecycle = Lifecycle::Initialized;
        let id = self.graph.entities.insert(slot);
        self.graph.roots.push(RootEntry::Entity(id));
        id
    }

    pub fn destroy_entity(&mut self, id: EntityId) {
        if let Some(mut slot) = self.graph.entities.remove(id) {
            self.graph.roots.remove(&RootEntry::Entity(id));
            slot.lifecycle = Lifecycle::Destroyed;
            slot.entity.destroy();
        }
    }

    // ------------------------------
    // Physics queries
    // ------------------------------

    /// Body components whose fixtures contain a display-space point.
    pub fn bodies_at(&self, point: Vec2) -> Vec<ComponentId> {
        let sim = self.physics.units().to_sim(point);
        self.physics
            .bodies_at(sim)
            .into_iter()
            .filter_map(|b| self.physics.body_owner(b))
            .collect()
    }

    pub fn body_at(&self, point: Vec2) -> Option<ComponentId> {
        self.bodies_at(point).into_iter().next()
    }

    // ------------------------------
    // Frame passes
    // ------------------------------

    pub(crate) fn update_roots(&mut self, dt: f32) {
        let cursor = self.graph.roots.begin();
        while let Some(entry) = self.graph.roots.advance(cursor) {
            match entry {
                RootEntry::Node(id) => self.update_node(id, dt),
                RootEntry::Entity(id) => {
                    if let Some(slot) = self.graph.entities.get_mut(id) {
                        slot.entity.update(dt);
                    }
                }
            }
        }
        self.graph.roots.end(cursor);
    }

    fn update_node(&mut self, id: NodeId, dt: f32) {
        if !self.graph.is_live(id) {
            return;
        }
        self.visit_components(id, |ctx, c| {
            ctx.with_live_behavior(c, |b, ctx| b.on_update(ctx, c, dt));
        });
        self.visit_children(id, |ctx, child| ctx.update_node(child, dt));
    }

    pub(crate) fn draw_roots(&mut self, batch: &mut dyn SpriteBatch) {
        let cursor = self.graph.roots.begin();
        while let Some(entry) = self.graph.roots.advance(cursor) {
            match entry {
                RootEntry::Node(id) => self.draw_node(id, batch),
                RootEntry::Entity(id) => {
                    if let Some(slot) = self.graph.entities.get_mut(id) {
                        slot.entity.draw(self.engine.textures(), batch);
                    }
                }
            }
        }
        self.graph.roots.end(cursor);
    }

    fn draw_node(&mut self, id: NodeId, batch: &mut dyn SpriteBatch) {
        if !self.graph.is_live(id) {
            return;
        }
        self.visit_components(id, |ctx, c| {
            ctx.with_live_behavior(c, |b, ctx| b.on_draw(ctx, c, batch));
        });
        self.visit_children(id, |ctx, child| ctx.draw_node(child, batch));
    }

    /// Route the step's contact events to the components of the nodes that
    /// own the touching fixtures.
    pub(crate) fn dispatch_contacts(&mut self) {
        for event in self.physics.drain_events() {
            for (own, other) in [
                (event.fixture_a, event.fixture_b),
                (event.fixture_b, event.fixture_a),
            ] {
                let Some(node) = self
                    .physics
                    .fixture_owner(own)
                    .and_then(|c| self.graph.owner(c))
                else {
                    continue;
                };
                let other_component = self.physics.fixture_owner(other);
                let contact = Contact {
                    phase: event.phase,
                    fixture: own,
                    other_fixture: other,
                    other_component,
                    other_node: other_component.and_then(|c| self.graph.owner(c)),
                };
                self.visit_components(node, |ctx, c| {
                    ctx.with_live_behavior(c, |b, ctx| b.on_contact(ctx, c, &contact));
                });
            }
        }
    }

    /// Destroy every root node and entity.
    pub(crate) fn destroy_all(&mut self) {
        for entry in self.graph.roots.snapshot() {
            match entry {
                RootEntry::Node(id) => self.destroy_node(id),
                RootEntry::Entity(id) => self.destroy_entity(id),
            }
        }
        self.graph.roots.clear();
    }

    fn visit_components(&mut self, node: NodeId, mut visit: impl FnMut(&mut Self, ComponentId)) {
        let Some(cursor) = self.graph.nodes.get_mut(node).map(|n| n.components.begin()) else {
            return;
        };
        loop {
            let Some(n) = self.graph.nodes.get_mut(node) else {
                return;
            };
            let Some(component) = n.components.advance(cursor) else {
                n.components.end(cursor);
                return;
            };
            visit(self, component);
        }
    }

    fn visit_children(&mut self, node: NodeId, mut visit: impl FnMut(&mut Self, NodeId)) {
        let Some(cursor) = self.graph.nodes.get_mut(node).map(|n| n.children.begin()) else {
            return;
        };
        loop {
            let Some(n) = self.graph.nodes.get_mut(node) else {
                return;
            };
            let Some(child) = n.children.advance(cursor) else {
                n.children.end(cursor);
                return;
            };
            visit(self, child);
        }
    }
}
