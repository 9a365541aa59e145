use kinetic2d::{
    Behavior, BodyComponent, BodyHandle, ComponentId, Contact, ContactPhase, FixtureComponent,
    FixtureHandle, FixtureMaterial, FixtureShape, JointComponent, JointSpec, SceneContext,
    TextureRenderer, Vec2,
};
use log::error;

const DENSITY: f32 = 0.25;
const FRICTION: f32 = 1000.0;
const SUSPENSION_FREQUENCY: f32 = 15.0;
const SUSPENSION_DAMPING_RATIO: f32 = 2.0;

/// Name of the nodes a wheel can stand on.
pub const GROUND_NAME: &str = "Ground";

/// Mean of the normals of the contacts that currently have a manifold.
fn average_normal(normals: &[Vec2]) -> Option<Vec2> {
    (!normals.is_empty()).then(|| normals.iter().copied().sum::<Vec2>() / normals.len() as f32)
}

/// Floors and walls pull the wheel in; ceilings do not.
fn is_sticky(normal: Vec2) -> bool {
    normal.y <= 0.0 || normal.y <= normal.x.abs()
}

/// A sprung, motorised wheel joined to the parent node's body.
///
/// Tracks the ground fixtures it touches to report whether it is grounded
/// and the averaged ground normal.
#[derive(Debug)]
pub struct Wheel {
    radius: f32,
    /// Joint anchor on the parent body, in meters.
    anchor: Vec2,
    parent_body: Option<BodyHandle>,
    body: Option<BodyHandle>,
    fixture: Option<FixtureHandle>,
    joint: Option<ComponentId>,
    /// Components this wheel added to its node.
    parts: Vec<ComponentId>,
    contacts: Vec<FixtureHandle>,
    ground_normal: Vec2,
    sticky: bool,
}

impl Wheel {
    pub fn new(radius: f32, anchor: Vec2) -> Self {
        Self {
            radius,
            anchor,
            parent_body: None,
            body: None,
            fixture: None,
            joint: None,
            parts: Vec::new(),
            contacts: Vec::new(),
            ground_normal: Vec2::NEG_Y,
            sticky: false,
        }
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    /// The wheel's [`JointComponent`].
    pub fn joint(&self) -> Option<ComponentId> {
        self.joint
    }

    pub fn grounded(&self) -> bool {
        !self.contacts.is_empty()
    }

    /// Averaged ground normal, or the parent's up vector in the air.
    pub fn ground_normal(&self) -> Vec2 {
        self.ground_normal
    }

    /// Whether the surface under the wheel is a floor or a wall it may
    /// be pulled onto, rather than a ceiling.
    pub fn sticky(&self) -> bool {
        self.sticky
    }

    fn build(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId) -> Option<()> {
        let node = ctx.owner(me)?;
        let parent = ctx.parent(node)?;
        self.parent_body = Some(ctx.body(parent)?);

        self.parts.push(ctx.add_component(node, BodyComponent::dynamic()));
        self.body = Some(ctx.body(node)?);

        let fixture = ctx.add_component(
            node,
            FixtureComponent::new(FixtureShape::Circle {
                radius: self.radius,
            })
            .with_material(FixtureMaterial::new(DENSITY).with_friction(FRICTION)),
        );
        self.parts.push(fixture);
        self.fixture = ctx.component::<FixtureComponent>(fixture)?.fixture();

        let joint = ctx.add_component(
            node,
            JointComponent::to_parent(JointSpec::Wheel {
                anchor_a: self.anchor,
                anchor_b: Vec2::ZERO,
                frequency: SUSPENSION_FREQUENCY,
                damping_ratio: SUSPENSION_DAMPING_RATIO,
                max_motor_torque: 0.0,
            }),
        );
        self.parts.push(joint);
        ctx.component::<JointComponent>(joint)?.joint()?;
        self.joint = Some(joint);

        self.parts
            .push(ctx.add_component(node, TextureRenderer::new("Wheel")));
        Some(())
    }

    fn is_ground(ctx: &SceneContext<'_>, contact: &Contact) -> bool {
        contact
            .other_node
            .and_then(|node| ctx.name(node))
            .is_some_and(|name| name == GROUND_NAME)
    }
}

impl Behavior for Wheel {
    fn on_initialize(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId) {
        if self.build(ctx, me).is_none() {
            error!("wheel {me:?} needs a parent node with a body; destroying it");
            for part in self.parts.drain(..).rev() {
                ctx.destroy_component(part);
            }
            self.body = None;
            self.fixture = None;
            self.joint = None;
            ctx.destroy_component(me);
        }
    }

    fn on_update(&mut self, ctx: &mut SceneContext<'_>, _me: ComponentId, _dt: f32) {
        let physics = ctx.physics();
        let normals: Vec<Vec2> = match self.fixture {
            Some(own) => self
                .contacts
                .iter()
                .filter_map(|&other| physics.contact_normal(own, other))
                .collect(),
            None => Vec::new(),
        };

        match average_normal(&normals) {
            Some(normal) => {
                self.ground_normal = normal;
                self.sticky = is_sticky(normal);
            }
            None => {
                let rotation = self
                    .parent_body
                    .and_then(|body| physics.body_rotation(body))
                    .unwrap_or(0.0);
                self.ground_normal = Vec2::from_angle(rotation).rotate(Vec2::NEG_Y);
                self.sticky = false;
            }
        }
    }

    fn on_contact(&mut self, ctx: &mut SceneContext<'_>, _me: ComponentId, contact: &Contact) {
        match contact.phase {
            ContactPhase::Began => {
                if Self::is_ground(ctx, contact) && !self.contacts.contains(&contact.other_fixture) {
                    self.contacts.push(contact.other_fixture);
                }
            }
            ContactPhase::Ended => {
                self.contacts.retain(|f| *f != contact.other_fixture);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kinetic2d::{EngineConfig, EngineContext, Scene, SceneConfig};

    #[test]
    fn test_average_counts_only_reported_normals() {
        let normal = average_normal(&[Vec2::NEG_Y]).unwrap();
        assert_relative_eq!(normal.length(), 1.0);
        let slope = average_normal(&[Vec2::NEG_Y, Vec2::new(-1.0, 0.0)]).unwrap();
        assert_relative_eq!(slope.x, -0.5);
        assert_relative_eq!(slope.y, -0.5);
        assert_eq!(average_normal(&[]), None);
    }

    #[test]
    fn test_ceiling_is_not_sticky() {
        assert!(is_sticky(Vec2::NEG_Y));
        assert!(is_sticky(Vec2::X));
        assert!(!is_sticky(Vec2::Y));
    }

    #[test]
    fn test_failed_build_removes_what_it_added() {
        let mut engine = EngineContext::new(EngineConfig::default());
        let mut scene = Scene::new(SceneConfig::default().with_gravity(Vec2::ZERO));
        scene.initialize(&mut engine).unwrap();
        let mut ctx = scene.context(&mut engine);

        let chassis = ctx.create_node(None, Some("Chassis"));
        ctx.add_component(chassis, BodyComponent::dynamic());
        ctx.add_component(
            chassis,
            FixtureComponent::new(FixtureShape::Circle { radius: 0.5 }),
        );
        let node = ctx.create_node(Some(chassis), Some("Wheel"));
        // A zero radius makes the fixture step fail after the body exists.
        let wheel = ctx.add_component(node, Wheel::new(0.0, Vec2::ZERO));

        assert!(!ctx.graph().contains_component(wheel));
        assert_eq!(ctx.body(node), None);
        assert_eq!(ctx.physics().body_count(), 1);
        assert_eq!(ctx.physics().fixture_count(), 1);
        assert_eq!(ctx.graph().component_count(), 2);
    }
}
