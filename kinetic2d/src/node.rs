//! Scene nodes and the arenas that own them.
//!
//! Nodes, components and free-standing entities live in slot maps keyed by
//! generational ids. Parent/child links and component membership are id
//! lists held in [`SafeList`]s so they can change while being walked. Stale
//! ids simply stop resolving once their target is destroyed.

use slotmap::{new_key_type, SlotMap};

use crate::binding::{Transform, TransformBinding};
use crate::component::{downcast_mut, downcast_ref, Behavior, ComponentId, ComponentSlot};
use crate::entity::{EntitySlot, Lifecycle};
use crate::safe_list::SafeList;

new_key_type! {
    pub struct NodeId;
    pub struct EntityId;
}

/// Something owned directly by the scene root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootEntry {
    Node(NodeId),
    Entity(EntityId),
}

/// Positioned, hierarchical game object.
pub struct Node {
    pub(crate) name: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: SafeList<NodeId>,
    pub(crate) components: SafeList<ComponentId>,
    pub(crate) transform: Transform,
    pub(crate) binding: TransformBinding,
    pub(crate) lifecycle: Lifecycle,
}

impl Node {
    pub(crate) fn new(name: Option<&str>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.map(str::to_string),
            parent,
            children: SafeList::new(),
            components: SafeList::new(),
            transform: Transform::default(),
            binding: TransformBinding::Local,
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Locally stored pose. Mirrors the body pose as of the last write.
    pub fn local_transform(&self) -> &Transform {
        &self.transform
    }

    pub fn binding(&self) -> TransformBinding {
        self.binding
    }

    pub fn children(&self) -> Vec<NodeId> {
        self.children.snapshot()
    }

    pub fn components(&self) -> Vec<ComponentId> {
        self.components.snapshot()
    }
}

#[derive(Default)]
pub struct SceneGraph {
    pub(crate) nodes: SlotMap<NodeId, Node>,
    pub(crate) components: SlotMap<ComponentId, ComponentSlot>,
    pub(crate) entities: SlotMap<EntityId, EntitySlot>,
    pub(crate) roots: SafeList<RootEntry>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Present and not yet torn down.
    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes
            .get(id)
            .map(|n| !n.lifecycle.is_destroyed())
            .unwrap_or(false)
    }

    pub fn contains_component(&self, id: ComponentId) -> bool {
        self.components.contains_key(id)
    }

    pub fn component_lifecycle(&self, id: ComponentId) -> Option<Lifecycle> {
        self.components.get(id).map(|c| c.lifecycle)
    }

    pub fn component_type_name(&self, id: ComponentId) -> Option<&'static str> {
        self.components.get(id).map(|c| c.type_name)
    }

    /// A component of `node` was destroyed while its hook was running and
    /// has not finished tearing down yet.
    pub(crate) fn has_pending_teardown(&self, node: NodeId) -> bool {
        self.components
            .values()
            .any(|c| c.owner == node && c.teardown_pending)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn roots(&self) -> Vec<RootEntry> {
        self.roots.snapshot()
    }

    pub fn root_nodes(&self) -> Vec<NodeId> {
        self.roots
            .iter()
            .filter_map(|entry| match entry {
                RootEntry::Node(id) => Some(*id),
                RootEntry::Entity(_) => None,
            })
            .collect()
    }

    pub fn owner(&self, component: ComponentId) -> Option<NodeId> {
        self.components.get(component).map(|c| c.owner)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node).and_then(|n| n.name())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node)
            .map(|n| n.children.snapshot())
            .unwrap_or_default()
    }

    pub fn components(&self, node: NodeId) -> Vec<ComponentId> {
        self.nodes
            .get(node)
            .map(|n| n.components.snapshot())
            .unwrap_or_default()
    }

    /// Components of type `T` attached to `node`, in attachment order.
    pub fn components_of<T: Behavior>(&self, node: NodeId) -> Vec<ComponentId> {
        let Some(n) = self.nodes.get(node) else {
            return Vec::new();
        };
        n.components
            .iter()
            .copied()
            .filter(|id| self.components.get(*id).map(|c| c.is::<T>()).unwrap_or(false))
            .collect()
    }

    pub fn component_of<T: Behavior>(&self, node: NodeId) -> Option<ComponentId> {
        self.components_of::<T>(node).into_iter().next()
    }

    /// Borrow a component's behavior. `None` for other types and while the
    /// component's own hook is running.
    pub fn component<T: Behavior>(&self, id: ComponentId) -> Option<&T> {
        let behavior = self.components.get(id)?.behavior.as_deref()?;
        downcast_ref::<T>(behavior)
    }

    pub fn component_mut<T: Behavior>(&mut self, id: ComponentId) -> Option<&mut T> {
        let behavior = self.components.get_mut(id)?.behavior.as_deref_mut()?;
        downcast_mut::<T>(behavior)
    }

    /// First child of `parent` (or root node when `None`) named `name`.
    pub fn find(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        let candidates = match parent {
            Some(p) => self.children(p),
            None => self.root_nodes(),
        };
        candidates
            .into_iter()
            .find(|id| self.is_live(*id) && self.name(*id) == Some(name))
    }

    /// Depth-first search of the whole graph for a node named `name`.
    pub fn find_anywhere(&self, name: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.root_nodes().into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            if self.is_live(id) && self.name(id) == Some(name) {
                return Some(id);
            }
            stack.extend(self.children(id).into_iter().rev());
        }
        None
    }
}
