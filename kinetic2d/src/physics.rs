use std::collections::HashMap;

use glam::Vec2;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::component::ComponentId;
use crate::error::SceneError;

// Rapier is private implementation detail: do NOT re-export it.
use rapier2d::prelude::*;

pub const DEFAULT_GRAVITY: Vec2 = Vec2::new(0.0, 9.81);
pub const DEFAULT_DISPLAY_UNITS_PER_METER: f32 = 64.0;
/// Upper bound on polygon vertices and ellipse edges.
pub const MAX_POLYGON_VERTICES: usize = 32;
pub const DEFAULT_ELLIPSE_EDGES: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FixtureHandle(ColliderHandle);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JointHandle(ImpulseJointHandle);

/// Engine-facing rigid body type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    #[default]
    Dynamic,
    Kinematic,
    Static,
}

impl BodyKind {
    fn to_rapier(self) -> RigidBodyType {
        match self {
            BodyKind::Dynamic => RigidBodyType::Dynamic,
            BodyKind::Kinematic => RigidBodyType::KinematicPositionBased,
            BodyKind::Static => RigidBodyType::Fixed,
        }
    }

    fn from_rapier(body_type: RigidBodyType) -> Self {
        match body_type {
            RigidBodyType::Dynamic => BodyKind::Dynamic,
            RigidBodyType::KinematicPositionBased | RigidBodyType::KinematicVelocityBased => {
                BodyKind::Kinematic
            }
            RigidBodyType::Fixed => BodyKind::Static,
        }
    }
}

/// Fixed ratio between display units (pixels) and simulation units (meters).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitScale {
    display_per_sim: f32,
}

impl Default for UnitScale {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_UNITS_PER_METER)
    }
}

impl UnitScale {
    pub fn new(display_per_sim: f32) -> Self {
        Self { display_per_sim }
    }

    pub fn display_per_sim(&self) -> f32 {
        self.display_per_sim
    }

    pub fn to_sim(&self, display: Vec2) -> Vec2 {
        display / self.display_per_sim
    }

    pub fn to_display(&self, sim: Vec2) -> Vec2 {
        sim * self.display_per_sim
    }

    pub fn to_sim_scalar(&self, display: f32) -> f32 {
        display / self.display_per_sim
    }

    pub fn to_display_scalar(&self, sim: f32) -> f32 {
        sim * self.display_per_sim
    }
}

/// Collision shape of a fixture, in simulation units and body-local space.
#[derive(Clone, Debug, PartialEq)]
pub enum FixtureShape {
    Rectangle { width: f32, height: f32 },
    Circle { radius: f32 },
    /// Approximated by a convex polygon with `edges` vertices.
    Ellipse { x_radius: f32, y_radius: f32, edges: usize },
    Polygon(Vec<Vec2>),
    /// Open polyline, collides on its edges only.
    Chain(Vec<Vec2>),
}

impl Default for FixtureShape {
    fn default() -> Self {
        FixtureShape::Rectangle {
            width: 1.0,
            height: 1.0,
        }
    }
}

impl FixtureShape {
    pub fn ellipse(x_radius: f32, y_radius: f32) -> Self {
        FixtureShape::Ellipse {
            x_radius,
            y_radius,
            edges: DEFAULT_ELLIPSE_EDGES,
        }
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        match self {
            FixtureShape::Rectangle { width, height } => {
                if *width == 0.0 || *height == 0.0 {
                    return Err(SceneError::InvalidShape(format!(
                        "rectangle size must be non-zero, got {width}x{height}"
                    )));
                }
            }
            FixtureShape::Circle { radius } => {
                if *radius <= 0.0 {
                    return Err(SceneError::InvalidShape(format!(
                        "circle radius must be positive, got {radius}"
                    )));
                }
            }
            FixtureShape::Ellipse {
                x_radius,
                y_radius,
                edges,
            } => {
                if *x_radius <= 0.0 || *y_radius <= 0.0 {
                    return Err(SceneError::InvalidShape(format!(
                        "ellipse radii must be positive, got {x_radius}x{y_radius}"
                    )));
                }
                if *edges < 3 || *edges > MAX_POLYGON_VERTICES {
                    return Err(SceneError::InvalidShape(format!(
                        "ellipse edge count must be within 3..={MAX_POLYGON_VERTICES}, got {edges}"
                    )));
                }
            }
            FixtureShape::Polygon(points) => {
                if points.len() < 3 || points.len() > MAX_POLYGON_VERTICES {
                    return Err(SceneError::InvalidShape(format!(
                        "polygon needs 3..={MAX_POLYGON_VERTICES} vertices, got {}",
                        points.len()
                    )));
                }
            }
            FixtureShape::Chain(points) => {
                if points.len() < 2 {
                    return Err(SceneError::InvalidShape(format!(
                        "chain needs at least 2 vertices, got {}",
                        points.len()
                    )));
                }
            }
        }
        Ok(())
    }

    fn build(&self) -> Option<ColliderBuilder> {
        let to_points =
            |points: &[Vec2]| points.iter().map(|p| point![p.x, p.y]).collect::<Vec<_>>();

        match self {
            FixtureShape::Rectangle { width, height } => {
                Some(ColliderBuilder::cuboid(width.abs() * 0.5, height.abs() * 0.5))
            }
            FixtureShape::Circle { radius } => Some(ColliderBuilder::ball(*radius)),
            FixtureShape::Ellipse {
                x_radius,
                y_radius,
                edges,
            } => {
                let points = (0..*edges)
                    .map(|i| {
                        let angle = std::f32::consts::TAU * i as f32 / *edges as f32;
                        point![x_radius * angle.cos(), y_radius * angle.sin()]
                    })
                    .collect();
                ColliderBuilder::convex_polyline(points)
            }
            FixtureShape::Polygon(points) => ColliderBuilder::convex_polyline(to_points(points)),
            FixtureShape::Chain(points) => Some(ColliderBuilder::polyline(to_points(points), None)),
        }
    }
}

/// Surface and mass parameters of a fixture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixtureMaterial {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub sensor: bool,
}

impl Default for FixtureMaterial {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.2,
            restitution: 0.0,
            sensor: false,
        }
    }
}

impl FixtureMaterial {
    pub fn new(density: f32) -> Self {
        Self {
            density,
            ..Self::default()
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn as_sensor(mut self) -> Self {
        self.sensor = true;
        self
    }
}

/// Constraint between a parent body (`a`) and a child body (`b`).
///
/// Anchors are body-local and in simulation units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JointSpec {
    Revolute {
        anchor_a: Vec2,
        anchor_b: Vec2,
    },
    /// Suspension along the parent's local Y axis plus a rotation motor.
    Wheel {
        anchor_a: Vec2,
        anchor_b: Vec2,
        frequency: f32,
        damping_ratio: f32,
        max_motor_torque: f32,
    },
}

impl JointSpec {
    fn build(&self) -> GenericJoint {
        match *self {
            JointSpec::Revolute { anchor_a, anchor_b } => RevoluteJointBuilder::new()
                .local_anchor1(point![anchor_a.x, anchor_a.y])
                .local_anchor2(point![anchor_b.x, anchor_b.y])
                .contacts_enabled(false)
                .build()
                .into(),
            JointSpec::Wheel {
                anchor_a,
                anchor_b,
                frequency,
                damping_ratio,
                max_motor_torque,
            } => {
                let omega = std::f32::consts::TAU * frequency;
                GenericJointBuilder::new(JointAxesMask::LIN_X)
                    .local_anchor1(point![anchor_a.x, anchor_a.y])
                    .local_anchor2(point![anchor_b.x, anchor_b.y])
                    .motor_position(JointAxis::LinY, 0.0, omega * omega, 2.0 * damping_ratio * omega)
                    .motor_velocity(JointAxis::AngX, 0.0, 1.0)
                    .motor_max_force(JointAxis::AngX, max_motor_torque)
                    .contacts_enabled(false)
                    .build()
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactPhase {
    Began,
    Ended,
}

/// Engine-facing contact event. Uses fixture handles only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactEvent {
    pub phase: ContactPhase,
    pub fixture_a: FixtureHandle,
    pub fixture_b: FixtureHandle,
}

/// World-space outline of one fixture, in simulation units.
#[derive(Clone, Debug, PartialEq)]
pub struct DebugOutline {
    pub points: Vec<Vec2>,
    pub closed: bool,
    pub kind: BodyKind,
    pub sleeping: bool,
}

pub struct PhysicsWorld {
    // --- rapier internals ---
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,

    // Event channels
    event_recv_collision: crossbeam_channel::Receiver<CollisionEvent>,
    _event_recv_contact_force: crossbeam_channel::Receiver<ContactForceEvent>,
    event_handler: ChannelEventCollector,

    // --- registries (physics primitive -> owning component) ---
    body_owners: HashMap<RigidBodyHandle, ComponentId>,
    fixture_owners: HashMap<ColliderHandle, ComponentId>,
    joint_owners: HashMap<ImpulseJointHandle, ComponentId>,

    gravity: Vec2,
    units: UnitScale,

    pending_events: Vec<ContactEvent>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(DEFAULT_GRAVITY, UnitScale::default())
    }
}

impl PhysicsWorld {
    pub fn new(gravity: Vec2, units: UnitScale) -> Self {
        let (send_col, recv_col) = crossbeam_channel::unbounded();
        let (send_force, recv_force) = crossbeam_channel::unbounded();
        let event_handler = ChannelEventCollector::new(send_col, send_force);

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),

            event_recv_collision: recv_col,
            _event_recv_contact_force: recv_force,
            event_handler,

            body_owners: HashMap::new(),
            fixture_owners: HashMap::new(),
            joint_owners: HashMap::new(),

            gravity,
            units,
            pending_events: Vec::new(),
        }
    }

    /// Drop every body, fixture and joint, keeping gravity and unit scale.
    pub fn clear(&mut self) {
        debug!(
            "clearing physics world ({} bodies, {} fixtures, {} joints)",
            self.rigid_bodies.len(),
            self.colliders.len(),
            self.impulse_joints.len()
        );
        *self = Self::new(self.gravity, self.units);
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn units(&self) -> UnitScale {
        self.units
    }

    pub fn set_units(&mut self, units: UnitScale) {
        self.units = units;
    }

    pub fn body_count(&self) -> usize {
        self.rigid_bodies.len()
    }

    pub fn fixture_count(&self) -> usize {
        self.colliders.len()
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joints.len()
    }

    /// Step simulation by fixed dt (seconds).
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;

        let gravity = vector![self.gravity.x, self.gravity.y];
        let hooks = &();

        self.pipeline.step(
            &gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            hooks,
            &self.event_handler,
        );

        // Forces apply for a single step, like impulses spread over dt.
        for (_, body) in self.rigid_bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }

        self.collect_events();
    }

    /// Drain contact events collected since last step.
    pub fn drain_events(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ------------------------------
    // Bodies
    // ------------------------------

    /// Create a body at a simulation-space pose, owned by `owner`.
    pub fn create_body(
        &mut self,
        kind: BodyKind,
        position: Vec2,
        rotation: f32,
        owner: ComponentId,
    ) -> BodyHandle {
        let mut builder = RigidBodyBuilder::new(kind.to_rapier())
            .translation(vector![position.x, position.y])
            .rotation(rotation);

        // Enable CCD for dynamic bodies to prevent tunneling through thin colliders
        if matches!(kind, BodyKind::Dynamic) {
            builder = builder.ccd_enabled(true);
        }

        let handle = self.rigid_bodies.insert(builder.build());
        self.body_owners.insert(handle, owner);
        trace!("created {kind:?} body {handle:?} for {owner:?}");
        BodyHandle(handle)
    }

    /// Remove a body with its fixtures and joints. Returns whether it existed.
    pub fn remove_body(&mut self, body: BodyHandle) -> bool {
        if self.rigid_bodies.get(body.0).is_none() {
            return false;
        }
        self.rigid_bodies.remove(
            body.0,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        self.body_owners.remove(&body.0);
        self.fixture_owners
            .retain(|handle, _| self.colliders.get(*handle).is_some());
        self.joint_owners
            .retain(|handle, _| self.impulse_joints.get(*handle).is_some());
        trace!("removed body {:?}", body.0);
        true
    }

    pub fn contains_body(&self, body: BodyHandle) -> bool {
        self.rigid_bodies.get(body.0).is_some()
    }

    pub fn body_owner(&self, body: BodyHandle) -> Option<ComponentId> {
        self.body_owners.get(&body.0).copied()
    }

    pub fn body_position(&self, body: BodyHandle) -> Option<Vec2> {
        let t = self.rigid_bodies.get(body.0)?.translation();
        Some(Vec2::new(t.x, t.y))
    }

    pub fn body_rotation(&self, body: BodyHandle) -> Option<f32> {
        Some(self.rigid_bodies.get(body.0)?.rotation().angle())
    }

    /// Teleport a body and wake it so the solver does not leave it dormant.
    pub fn set_body_position(&mut self, body: BodyHandle, position: Vec2) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            let angle = b.rotation().angle();
            b.set_position(Isometry::new(vector![position.x, position.y], angle), true);
        }
    }

    pub fn set_body_rotation(&mut self, body: BodyHandle, rotation: f32) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            let t = *b.translation();
            b.set_position(Isometry::new(t, rotation), true);
        }
    }

    pub fn body_kind(&self, body: BodyHandle) -> Option<BodyKind> {
        Some(BodyKind::from_rapier(self.rigid_bodies.get(body.0)?.body_type()))
    }

    pub fn set_body_kind(&mut self, body: BodyHandle, kind: BodyKind) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.set_body_type(kind.to_rapier(), true);
        }
    }

    pub fn mass(&self, body: BodyHandle) -> Option<f32> {
        Some(self.rigid_bodies.get(body.0)?.mass())
    }

    /// Center of mass in world space.
    pub fn world_center(&self, body: BodyHandle) -> Option<Vec2> {
        let c = self.rigid_bodies.get(body.0)?.center_of_mass();
        Some(Vec2::new(c.x, c.y))
    }

    pub fn linear_velocity(&self, body: BodyHandle) -> Option<Vec2> {
        let v = self.rigid_bodies.get(body.0)?.linvel();
        Some(Vec2::new(v.x, v.y))
    }

    pub fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.set_linvel(vector![velocity.x, velocity.y], true);
        }
    }

    pub fn angular_velocity(&self, body: BodyHandle) -> Option<f32> {
        Some(self.rigid_bodies.get(body.0)?.angvel())
    }

    pub fn set_angular_velocity(&mut self, body: BodyHandle, w: f32) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.set_angvel(w, true);
        }
    }

    /// Force applied during the next step only.
    pub fn apply_force(&mut self, body: BodyHandle, force: Vec2) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.add_force(vector![force.x, force.y], true);
        }
    }

    pub fn apply_force_at_point(&mut self, body: BodyHandle, force: Vec2, point: Vec2) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.add_force_at_point(vector![force.x, force.y], point![point.x, point.y], true);
        }
    }

    pub fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec2) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.apply_impulse(vector![impulse.x, impulse.y], true);
        }
    }

    pub fn apply_angular_impulse(&mut self, body: BodyHandle, impulse: f32) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.apply_torque_impulse(impulse, true);
        }
    }

    pub fn set_angular_damping(&mut self, body: BodyHandle, damping: f32) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.set_angular_damping(damping);
        }
    }

    pub fn set_linear_damping(&mut self, body: BodyHandle, damping: f32) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.set_linear_damping(damping);
        }
    }

    /// Toggle world gravity for one body.
    pub fn set_gravity_enabled(&mut self, body: BodyHandle, enabled: bool) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.set_gravity_scale(if enabled { 1.0 } else { 0.0 }, true);
        }
    }

    pub fn is_sleeping(&self, body: BodyHandle) -> Option<bool> {
        Some(self.rigid_bodies.get(body.0)?.is_sleeping())
    }

    pub fn wake_up(&mut self, body: BodyHandle) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.wake_up(true);
        }
    }

    /// Number of fixtures attached to a body.
    pub fn fixtures_on(&self, body: BodyHandle) -> usize {
        self.rigid_bodies
            .get(body.0)
            .map(|b| b.colliders().len())
            .unwrap_or(0)
    }

    /// Set friction on every fixture of a body.
    pub fn set_body_friction(&mut self, body: BodyHandle, friction: f32) {
        let Some(b) = self.rigid_bodies.get(body.0) else {
            return;
        };
        for handle in b.colliders().to_vec() {
            if let Some(c) = self.colliders.get_mut(handle) {
                c.set_friction(friction);
            }
        }
    }

    // ------------------------------
    // Fixtures
    // ------------------------------

    /// Attach a new fixture to `body`. Returns `None` if the body is gone or
    /// the shape is degenerate (e.g. a collinear polygon).
    pub fn attach_fixture(
        &mut self,
        body: BodyHandle,
        shape: &FixtureShape,
        material: FixtureMaterial,
    ) -> Option<FixtureHandle> {
        self.rigid_bodies.get(body.0)?;
        let collider = shape
            .build()?
            .density(material.density)
            .friction(material.friction)
            .restitution(material.restitution)
            .sensor(material.sensor)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();

        let handle = self
            .colliders
            .insert_with_parent(collider, body.0, &mut self.rigid_bodies);
        Some(FixtureHandle(handle))
    }

    /// Remove a fixture from its body. Returns whether it existed.
    pub fn dispose_fixture(&mut self, fixture: FixtureHandle) -> bool {
        self.fixture_owners.remove(&fixture.0);
        let removed = self
            .colliders
            .remove(
                fixture.0,
                &mut self.island_manager,
                &mut self.rigid_bodies,
                true,
            )
            .is_some();
        if removed {
            trace!("disposed fixture {:?}", fixture.0);
        }
        removed
    }

    pub fn contains_fixture(&self, fixture: FixtureHandle) -> bool {
        self.colliders.get(fixture.0).is_some()
    }

    pub fn fixture_body(&self, fixture: FixtureHandle) -> Option<BodyHandle> {
        self.colliders.get(fixture.0)?.parent().map(BodyHandle)
    }

    pub fn fixture_owner(&self, fixture: FixtureHandle) -> Option<ComponentId> {
        self.fixture_owners.get(&fixture.0).copied()
    }

    pub fn set_fixture_owner(&mut self, fixture: FixtureHandle, owner: ComponentId) {
        if self.contains_fixture(fixture) {
            self.fixture_owners.insert(fixture.0, owner);
        }
    }

    pub fn set_fixture_material(&mut self, fixture: FixtureHandle, material: FixtureMaterial) {
        if let Some(c) = self.colliders.get_mut(fixture.0) {
            c.set_density(material.density);
            c.set_friction(material.friction);
            c.set_restitution(material.restitution);
            c.set_sensor(material.sensor);
        }
    }

    /// Averaged contact normal between two touching fixtures, pointing from
    /// `other` towards `fixture`.
    pub fn contact_normal(&self, fixture: FixtureHandle, other: FixtureHandle) -> Option<Vec2> {
        let pair = self.narrow_phase.contact_pair(fixture.0, other.0)?;
        if !pair.has_any_active_contact {
            return None;
        }
        let sign = if pair.collider1 == fixture.0 { -1.0 } else { 1.0 };
        let mut sum = Vec2::ZERO;
        for manifold in pair.manifolds.iter().filter(|m| !m.points.is_empty()) {
            sum += Vec2::new(manifold.data.normal.x, manifold.data.normal.y) * sign;
        }
        (sum != Vec2::ZERO).then(|| sum.normalize())
    }

    // ------------------------------
    // Joints
    // ------------------------------

    pub fn create_joint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        spec: &JointSpec,
    ) -> Option<JointHandle> {
        if !self.contains_body(body_a) || !self.contains_body(body_b) {
            return None;
        }
        let handle = self
            .impulse_joints
            .insert(body_a.0, body_b.0, spec.build(), true);
        Some(JointHandle(handle))
    }

    /// Remove a joint. Returns whether it existed.
    pub fn remove_joint(&mut self, joint: JointHandle) -> bool {
        self.joint_owners.remove(&joint.0);
        self.impulse_joints.remove(joint.0, true).is_some()
    }

    pub fn contains_joint(&self, joint: JointHandle) -> bool {
        self.impulse_joints.get(joint.0).is_some()
    }

    pub fn joint_owner(&self, joint: JointHandle) -> Option<ComponentId> {
        self.joint_owners.get(&joint.0).copied()
    }

    pub fn set_joint_owner(&mut self, joint: JointHandle, owner: ComponentId) {
        if self.contains_joint(joint) {
            self.joint_owners.insert(joint.0, owner);
        }
    }

    pub fn joint_bodies(&self, joint: JointHandle) -> Option<(BodyHandle, BodyHandle)> {
        let j = self.impulse_joints.get(joint.0)?;
        Some((BodyHandle(j.body1), BodyHandle(j.body2)))
    }

    /// Relative angular speed of the second body with respect to the first.
    pub fn joint_speed(&self, joint: JointHandle) -> Option<f32> {
        let (a, b) = self.joint_bodies(joint)?;
        Some(self.angular_velocity(b)? - self.angular_velocity(a)?)
    }

    /// Set the rotation motor of a joint and wake both joined bodies.
    pub fn set_joint_motor(&mut self, joint: JointHandle, speed: f32, max_torque: f32) {
        let Some(j) = self.impulse_joints.get_mut(joint.0) else {
            return;
        };
        j.data
            .set_motor_velocity(JointAxis::AngX, speed, 1.0)
            .set_motor_max_force(JointAxis::AngX, max_torque);
        let (body1, body2) = (j.body1, j.body2);
        for body in [body1, body2] {
            if let Some(b) = self.rigid_bodies.get_mut(body) {
                b.wake_up(true);
            }
        }
    }

    // ------------------------------
    // Queries
    // ------------------------------

    /// Fixtures containing a simulation-space point.
    pub fn fixtures_at(&self, point: Vec2) -> Vec<FixtureHandle> {
        let pt = point![point.x, point.y];
        self.colliders
            .iter()
            .filter(|(_, c)| c.shape().contains_point(c.position(), &pt))
            .map(|(h, _)| FixtureHandle(h))
            .collect()
    }

    /// Distinct bodies with a fixture containing a simulation-space point.
    pub fn bodies_at(&self, point: Vec2) -> Vec<BodyHandle> {
        let mut bodies = Vec::new();
        for fixture in self.fixtures_at(point) {
            if let Some(body) = self.fixture_body(fixture) {
                if !bodies.contains(&body) {
                    bodies.push(body);
                }
            }
        }
        bodies
    }

    /// Outlines of every fixture for the debug overlay.
    pub fn debug_outlines(&self) -> Vec<DebugOutline> {
        let mut outlines = Vec::with_capacity(self.colliders.len());
        for (_, collider) in self.colliders.iter() {
            let (kind, sleeping) = collider
                .parent()
                .and_then(|h| self.rigid_bodies.get(h))
                .map(|b| (BodyKind::from_rapier(b.body_type()), b.is_sleeping()))
                .unwrap_or((BodyKind::Static, false));

            let iso = collider.position();
            let to_world = |p: Point<Real>| {
                let w = iso * p;
                Vec2::new(w.x, w.y)
            };

            let (points, closed) = match collider.shape().as_typed_shape() {
                TypedShape::Ball(ball) => {
                    let points = (0..DEFAULT_ELLIPSE_EDGES)
                        .map(|i| {
                            let angle =
                                std::f32::consts::TAU * i as f32 / DEFAULT_ELLIPSE_EDGES as f32;
                            to_world(point![ball.radius * angle.cos(), ball.radius * angle.sin()])
                        })
                        .collect();
                    (points, true)
                }
                TypedShape::Cuboid(cuboid) => {
                    let h = cuboid.half_extents;
                    let corners = [
                        point![-h.x, -h.y],
                        point![h.x, -h.y],
                        point![h.x, h.y],
                        point![-h.x, h.y],
                    ];
                    (corners.into_iter().map(to_world).collect(), true)
                }
                TypedShape::ConvexPolygon(polygon) => {
                    (polygon.points().iter().copied().map(to_world).collect(), true)
                }
                TypedShape::Polyline(polyline) => {
                    (polyline.vertices().iter().copied().map(to_world).collect(), false)
                }
                _ => continue,
            };

            outlines.push(DebugOutline {
                points,
                closed,
                kind,
                sleeping,
            });
        }
        outlines
    }

    // ------------------------------
    // Private helpers
    // ------------------------------

    fn collect_events(&mut self) {
        while let Ok(ev) = self.event_recv_collision.try_recv() {
            let (phase, c1, c2) = match ev {
                CollisionEvent::Started(c1, c2, _) => (ContactPhase::Began, c1, c2),
                CollisionEvent::Stopped(c1, c2, _) => (ContactPhase::Ended, c1, c2),
            };
            self.pending_events.push(ContactEvent {
                phase,
                fixture_a: FixtureHandle(c1),
                fixture_b: FixtureHandle(c2),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use slotmap::SlotMap;

    fn owners(n: usize) -> Vec<ComponentId> {
        let mut keys = SlotMap::<ComponentId, ()>::with_key();
        (0..n).map(|_| keys.insert(())).collect()
    }

    fn owner(n: usize) -> ComponentId {
        owners(n + 1)[n]
    }

    fn zero_g() -> PhysicsWorld {
        PhysicsWorld::new(Vec2::ZERO, UnitScale::default())
    }

    #[test]
    fn test_unit_scale_round_trip() {
        let units = UnitScale::new(64.0);
        let p = Vec2::new(320.0, -48.0);
        assert_relative_eq!(units.to_sim(p).x, 5.0);
        assert_relative_eq!(units.to_display(units.to_sim(p)).y, -48.0);
        assert_relative_eq!(units.to_sim_scalar(32.0), 0.5);
    }

    #[test]
    fn test_zero_rectangle_is_invalid() {
        let shape = FixtureShape::Rectangle {
            width: 0.0,
            height: 2.0,
        };
        assert!(matches!(shape.validate(), Err(SceneError::InvalidShape(_))));
    }

    #[test]
    fn test_ellipse_edge_limit() {
        let shape = FixtureShape::Ellipse {
            x_radius: 1.0,
            y_radius: 2.0,
            edges: MAX_POLYGON_VERTICES + 1,
        };
        assert!(shape.validate().is_err());
        assert!(FixtureShape::ellipse(1.0, 2.0).validate().is_ok());
    }

    #[test]
    fn test_body_gets_mass_from_fixture() {
        let mut world = zero_g();
        let body = world.create_body(BodyKind::Dynamic, Vec2::new(1.0, 2.0), 0.0, owner(1));
        let fixture = world.attach_fixture(
            body,
            &FixtureShape::Rectangle {
                width: 2.0,
                height: 2.0,
            },
            FixtureMaterial::new(1.0),
        );
        assert!(fixture.is_some());
        world.step(1.0 / 60.0);
        assert_relative_eq!(world.mass(body).unwrap_or(0.0), 4.0, epsilon = 1e-3);
        let p = world.body_position(body).unwrap_or_default();
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, 2.0);
    }

    #[test]
    fn test_remove_body_cleans_registries() {
        let mut world = zero_g();
        let a = world.create_body(BodyKind::Dynamic, Vec2::ZERO, 0.0, owner(1));
        let b = world.create_body(BodyKind::Dynamic, Vec2::X, 0.0, owner(2));
        let fa = world
            .attach_fixture(a, &FixtureShape::Circle { radius: 0.5 }, FixtureMaterial::default())
            .unwrap();
        world.set_fixture_owner(fa, owner(3));
        let joint = world
            .create_joint(
                a,
                b,
                &JointSpec::Revolute {
                    anchor_a: Vec2::ZERO,
                    anchor_b: Vec2::ZERO,
                },
            )
            .unwrap();
        world.set_joint_owner(joint, owner(4));

        assert!(world.remove_body(a));
        assert!(!world.remove_body(a));
        assert!(!world.contains_fixture(fa));
        assert_eq!(world.fixture_owner(fa), None);
        assert!(!world.contains_joint(joint));
        assert_eq!(world.joint_owner(joint), None);
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.body_owner(b), Some(owner(2)));
    }

    #[test]
    fn test_joint_motor_wakes_sleeping_bodies() {
        let mut world = zero_g();
        let chassis = world.create_body(BodyKind::Dynamic, Vec2::ZERO, 0.0, owner(1));
        let wheel = world.create_body(BodyKind::Dynamic, Vec2::new(0.4, 0.2), 0.0, owner(2));
        world.attach_fixture(
            chassis,
            &FixtureShape::Rectangle {
                width: 1.0,
                height: 0.4,
            },
            FixtureMaterial::new(1.0),
        );
        world.attach_fixture(wheel, &FixtureShape::Circle { radius: 0.15 }, FixtureMaterial::new(1.0));
        let joint = world
            .create_joint(
                chassis,
                wheel,
                &JointSpec::Wheel {
                    anchor_a: Vec2::new(0.4, 0.2),
                    anchor_b: Vec2::ZERO,
                    frequency: 15.0,
                    damping_ratio: 2.0,
                    max_motor_torque: 0.0,
                },
            )
            .unwrap();
        world.step(1.0 / 60.0);
        for body in [chassis, wheel] {
            world.rigid_bodies.get_mut(body.0).unwrap().sleep();
        }
        assert_eq!(world.is_sleeping(wheel), Some(true));

        world.set_joint_motor(joint, 20.0, 5.0);
        assert_eq!(world.is_sleeping(chassis), Some(false));
        assert_eq!(world.is_sleeping(wheel), Some(false));
        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }
        assert!(world.joint_speed(joint).unwrap() > 0.1);
    }

    #[test]
    fn test_dispose_fixture_twice_is_noop() {
        let mut world = zero_g();
        let body = world.create_body(BodyKind::Static, Vec2::ZERO, 0.0, owner(1));
        let fixture = world
            .attach_fixture(body, &FixtureShape::default(), FixtureMaterial::default())
            .unwrap();
        assert_eq!(world.fixture_body(fixture), Some(body));
        assert!(world.dispose_fixture(fixture));
        assert!(!world.dispose_fixture(fixture));
        assert_eq!(world.fixtures_on(body), 0);
    }

    #[test]
    fn test_point_query_hits_fixture() {
        let mut world = zero_g();
        let body = world.create_body(BodyKind::Static, Vec2::new(3.0, 3.0), 0.0, owner(1));
        world.attach_fixture(
            body,
            &FixtureShape::Rectangle {
                width: 2.0,
                height: 2.0,
            },
            FixtureMaterial::default(),
        );
        assert_eq!(world.bodies_at(Vec2::new(3.5, 2.5)), vec![body]);
        assert!(world.bodies_at(Vec2::new(10.0, 10.0)).is_empty());
    }

    #[test]
    fn test_set_position_wakes_and_moves() {
        let mut world = zero_g();
        let body = world.create_body(BodyKind::Dynamic, Vec2::ZERO, 0.0, owner(1));
        world.set_body_position(body, Vec2::new(4.0, -1.0));
        world.set_body_rotation(body, 0.5);
        assert_eq!(world.body_position(body), Some(Vec2::new(4.0, -1.0)));
        assert_relative_eq!(world.body_rotation(body).unwrap_or(0.0), 0.5, epsilon = 1e-6);
        assert_eq!(world.is_sleeping(body), Some(false));
    }

    #[test]
    fn test_clear_keeps_configuration() {
        let mut world = PhysicsWorld::new(Vec2::new(0.0, 3.0), UnitScale::new(32.0));
        world.create_body(BodyKind::Dynamic, Vec2::ZERO, 0.0, owner(1));
        world.clear();
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.gravity(), Vec2::new(0.0, 3.0));
        assert_relative_eq!(world.units().display_per_sim(), 32.0);
    }

    #[test]
    fn test_debug_outline_for_rectangle() {
        let mut world = zero_g();
        let body = world.create_body(BodyKind::Static, Vec2::ZERO, 0.0, owner(1));
        world.attach_fixture(
            body,
            &FixtureShape::Rectangle {
                width: 2.0,
                height: 4.0,
            },
            FixtureMaterial::default(),
        );
        let outlines = world.debug_outlines();
        assert_eq!(outlines.len(), 1);
        assert!(outlines[0].closed);
        assert_eq!(outlines[0].points.len(), 4);
        assert_eq!(outlines[0].kind, BodyKind::Static);
    }
}
