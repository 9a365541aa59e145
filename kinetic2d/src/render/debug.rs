use crate::physics::{BodyKind, PhysicsWorld};
use crate::render::{Color, SpriteBatch};

const STATIC_COLOR: Color = Color::rgb(0.5, 0.9, 0.5);
const KINEMATIC_COLOR: Color = Color::rgb(0.5, 0.5, 0.9);
const DYNAMIC_COLOR: Color = Color::rgb(0.9, 0.7, 0.7);
const SLEEPING_COLOR: Color = Color::rgb(0.6, 0.6, 0.6);

/// Outline every fixture of `physics`. Coordinates are in simulation units,
/// so the caller begins the batch with the camera's simulation view.
pub fn draw_physics_outlines(physics: &PhysicsWorld, batch: &mut dyn SpriteBatch) {
    for outline in physics.debug_outlines() {
        let color = match (outline.kind, outline.sleeping) {
            (BodyKind::Static, _) => STATIC_COLOR,
            (_, true) => SLEEPING_COLOR,
            (BodyKind::Kinematic, false) => KINEMATIC_COLOR,
            (BodyKind::Dynamic, false) => DYNAMIC_COLOR,
        };

        for pair in outline.points.windows(2) {
            batch.draw_line(pair[0], pair[1], color);
        }
        if outline.closed && outline.points.len() > 2 {
            if let (Some(first), Some(last)) = (outline.points.first(), outline.points.last()) {
                batch.draw_line(*last, *first, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentId;
    use crate::physics::{FixtureMaterial, FixtureShape, UnitScale};
    use crate::render::DrawList;
    use glam::Vec2;
    use slotmap::SlotMap;

    #[test]
    fn test_rectangle_draws_four_edges_and_chain_is_open() {
        let mut keys = SlotMap::<ComponentId, ()>::with_key();
        let owner = keys.insert(());
        let mut physics = PhysicsWorld::new(Vec2::ZERO, UnitScale::default());
        let body = physics.create_body(BodyKind::Static, Vec2::ZERO, 0.0, owner);
        physics.attach_fixture(body, &FixtureShape::default(), FixtureMaterial::default());
        physics.attach_fixture(
            body,
            &FixtureShape::Chain(vec![Vec2::ZERO, Vec2::X, Vec2::ONE]),
            FixtureMaterial::default(),
        );

        let mut list = DrawList::new();
        draw_physics_outlines(&physics, &mut list);
        assert_eq!(list.line_count(), 4 + 2);
    }
}
