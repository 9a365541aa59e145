//! Turning declarative map objects into nodes.
//!
//! Definitions are registered under the object type name they handle. Any
//! object whose type has no definition (including an empty type) goes
//! through [`DefaultDefinition`].

use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;
use log::{debug, warn};

use crate::components::{BodyComponent, FixtureComponent};
use crate::context::SceneContext;
use crate::map::{MapObject, ShapeKind};
use crate::node::NodeId;
use crate::physics::{BodyKind, FixtureShape, DEFAULT_ELLIPSE_EDGES};

pub trait NodeDefinition {
    /// Build the node for `object`. `None` when nothing was created.
    fn create(&self, ctx: &mut SceneContext<'_>, object: &MapObject) -> Option<NodeId>;
}

/// Type-name keyed registry of [`NodeDefinition`]s.
#[derive(Clone)]
pub struct NodeFactory {
    definitions: HashMap<String, Rc<dyn NodeDefinition>>,
    fallback: Rc<dyn NodeDefinition>,
}

impl NodeFactory {
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
            fallback: Rc::new(DefaultDefinition),
        }
    }

    /// Register `definition` for `type_name`. The first registration wins;
    /// later ones are ignored and reported as `false`.
    pub fn register_definition(
        &mut self,
        type_name: &str,
        definition: impl NodeDefinition + 'static,
    ) -> bool {
        if self.definitions.contains_key(type_name) {
            warn!("node definition '{type_name}' is already registered");
            return false;
        }
        debug!("registered node definition '{type_name}'");
        self.definitions
            .insert(type_name.to_string(), Rc::new(definition));
        true
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.definitions.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definition used for `type_name`.
    pub fn definition(&self, type_name: &str) -> Rc<dyn NodeDefinition> {
        match self.definitions.get(type_name) {
            Some(definition) => Rc::clone(definition),
            None => {
                if !type_name.is_empty() {
                    debug!("no definition for '{type_name}', using the default");
                }
                Rc::clone(&self.fallback)
            }
        }
    }

    /// Create the node for `object` with the factory of the running engine.
    pub fn create(ctx: &mut SceneContext<'_>, object: &MapObject) -> Option<NodeId> {
        let definition = ctx.engine().factory().definition(&object.type_name);
        definition.create(ctx, object)
    }
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Kinematic body at the object's position with a fixture matching its
/// shape. Rectangles and ellipses put the body at their centre; polygon
/// and polyline vertices stay relative to the object position.
pub struct DefaultDefinition;

impl NodeDefinition for DefaultDefinition {
    fn create(&self, ctx: &mut SceneContext<'_>, object: &MapObject) -> Option<NodeId> {
        let units = ctx.units();
        let rotation = object.rotation_radians();
        let half = object.size() * 0.5;

        let (position, shape) = match object.shape_kind() {
            ShapeKind::Rectangle => (
                centre_of(object, half),
                FixtureShape::Rectangle {
                    width: units.to_sim_scalar(object.width),
                    height: units.to_sim_scalar(object.height),
                },
            ),
            ShapeKind::Ellipse => {
                let radii = units.to_sim(half);
                let shape = if object.width == object.height {
                    FixtureShape::Circle { radius: radii.x }
                } else {
                    FixtureShape::Ellipse {
                        x_radius: radii.x,
                        y_radius: radii.y,
                        edges: DEFAULT_ELLIPSE_EDGES,
                    }
                };
                (centre_of(object, half), shape)
            }
            ShapeKind::Polygon | ShapeKind::Polyline => {
                let Some(points) = object.vertices() else {
                    warn!(
                        "object {} ('{}') has malformed vertex data '{}'",
                        object.id, object.name, object.points
                    );
                    return None;
                };
                let points = points.into_iter().map(|p| units.to_sim(p)).collect();
                let shape = if object.shape_kind() == ShapeKind::Polygon {
                    FixtureShape::Polygon(points)
                } else {
                    FixtureShape::Chain(points)
                };
                (object.position(), shape)
            }
        };

        let name = (!object.name.is_empty()).then_some(object.name.as_str());
        let node = ctx.create_node(None, name);
        ctx.set_position(node, position);
        ctx.set_rotation(node, rotation);
        ctx.add_component(node, BodyComponent::new(BodyKind::Kinematic));
        ctx.add_component(node, FixtureComponent::new(shape));
        Some(node)
    }
}

/// Centre of an object whose top-left corner is its position, following
/// the object's rotation about that corner.
fn centre_of(object: &MapObject, half: Vec2) -> Vec2 {
    object.position() + Vec2::from_angle(object.rotation_radians()).rotate(half)
}
