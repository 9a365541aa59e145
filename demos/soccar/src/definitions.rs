use kinetic2d::{MapObject, NodeDefinition, NodeId, SceneContext};

use crate::car::Car;

/// Map objects of type `Car` become a car centred on the object's bounds.
#[derive(Clone, Copy, Debug, Default)]
pub struct CarDefinition;

impl NodeDefinition for CarDefinition {
    fn create(&self, ctx: &mut SceneContext<'_>, object: &MapObject) -> Option<NodeId> {
        let name = (!object.name.is_empty()).then_some(object.name.as_str());
        let node = ctx.create_node(None, name);
        ctx.set_position(node, object.position() + object.size() * 0.5);
        ctx.add_component(node, Car::new());
        Some(node)
    }
}
