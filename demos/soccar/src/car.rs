//! The player car: a chassis body riding on two motorised wheels.

use std::f32::consts::FRAC_PI_2;

use kinetic2d::{
    ActionId, AxisBinding, Behavior, BodyComponent, BodyHandle, BodyKind, Button, Color,
    ComponentId, FixtureComponent, FixtureMaterial, FixtureShape, GamepadButton, InputMap,
    JointComponent, JointHandle, KeyCode, NodeId, SceneContext, TextureRenderer, Vec2,
};
use log::{debug, error};

use crate::gravity::Gravity;
use crate::indicator::StatusIndicator;
use crate::timekeeper::{TimeKeeper, TimerId};
use crate::wheel::Wheel;

const TOP_SPEED: f32 = 10.0;
const SPEED_LIMIT: f32 = 14.0;

const WHEEL_OFFSET: Vec2 = Vec2::new(0.4, 0.2);
const WHEEL_RADIUS: f32 = 0.15;
const WHEEL_TOP_SPEED: f32 = TOP_SPEED / WHEEL_RADIUS;

const WHEEL_STRONG_FORCE: f32 = 15.0;
const WHEEL_WEAK_FORCE: f32 = 5.0;

const BOOST_FORCE: Vec2 = Vec2::new(6.0, 8.0);

const ACCELERATION_TORQUE: f32 = 0.5;
const ACCELERATION_CURVE_THRESHOLD: f32 = WHEEL_TOP_SPEED * 0.75;
const BRAKING_TORQUE: f32 = 0.5;
const COASTING_TORQUE: f32 = 0.1;

const BODY_WIDTH: f32 = 1.18;
const BODY_HEIGHT: f32 = 0.36;
const BODY_DENSITY: f32 = 1.0;
const BODY_FRICTION: f32 = 0.1;
const BODY_ANGULAR_DAMPING: f32 = 10.0;
const BODY_ANGULAR_IMPULSE: f32 = 0.05;

const THROTTLE_TOLERANCE: f32 = 0.1;

const JUMP_IMPULSE: f32 = 1.5;
/// Wheel magnets stay off this long after a jump so the car can lift off.
const JUMP_RELEASE_SECONDS: f32 = 0.25;
const JUMP_COOLDOWN_SECONDS: f32 = 1.0;

const PAD: usize = 0;

/// What the wheel motors are doing this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveMode {
    Coasting,
    Accelerating,
    Braking,
}

impl DriveMode {
    pub fn indicator_color(self) -> Color {
        match self {
            DriveMode::Coasting => Color::YELLOW,
            DriveMode::Accelerating => Color::GREEN,
            DriveMode::Braking => Color::RED,
        }
    }
}

/// Motor target for both wheels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Drive {
    pub mode: DriveMode,
    pub torque: f32,
    pub speed: f32,
}

/// Motor target for a throttle in `-1..=1` at the current average wheel
/// speed. Torque fades out as the wheels approach the throttle's share of
/// the top speed.
pub fn drive(throttle: f32, wheel_speed: f32, partially_grounded: bool) -> Drive {
    if !partially_grounded || throttle == 0.0 {
        return Drive {
            mode: DriveMode::Coasting,
            torque: COASTING_TORQUE,
            speed: 0.0,
        };
    }
    if throttle * wheel_speed < -THROTTLE_TOLERANCE {
        return Drive {
            mode: DriveMode::Braking,
            torque: BRAKING_TORQUE,
            speed: 0.0,
        };
    }

    let abs_speed = wheel_speed.abs();
    let target = throttle.abs() * WHEEL_TOP_SPEED;
    let torque = if abs_speed > WHEEL_TOP_SPEED {
        0.0
    } else if abs_speed > target - ACCELERATION_CURVE_THRESHOLD {
        (ACCELERATION_TORQUE * (target - abs_speed) / ACCELERATION_CURVE_THRESHOLD).max(0.0)
    } else {
        ACCELERATION_TORQUE
    };
    Drive {
        mode: DriveMode::Accelerating,
        torque,
        speed: throttle * WHEEL_TOP_SPEED,
    }
}

/// Gravity applied to the car's bodies.
///
/// Under power the car is pulled towards its own floor. A grounded car
/// that is coasting also gets a slope term so it does not slide. A car
/// in the air falls with the world's gravity.
pub fn car_gravity(world: Vec2, rotation: f32, mode: DriveMode, grounded: bool) -> Vec2 {
    let relative = Vec2::from_angle(rotation).rotate(world);
    match mode {
        DriveMode::Coasting if grounded => {
            relative + Vec2::from_angle(rotation - FRAC_PI_2).rotate(world) * rotation.sin()
        }
        DriveMode::Coasting => world,
        _ => relative,
    }
}

/// Ground contact summary handed to timer predicates.
#[derive(Clone, Copy, Debug, Default)]
pub struct CarStatus {
    pub grounded: bool,
    pub partially_grounded: bool,
}

#[derive(Clone, Copy, Debug)]
struct WheelParts {
    component: ComponentId,
    body: BodyHandle,
    joint: JointHandle,
}

#[derive(Clone, Copy, Debug)]
struct CarParts {
    body: BodyHandle,
    body_component: ComponentId,
    rear: WheelParts,
    front: WheelParts,
    gravity: ComponentId,
    throttle_indicator: ComponentId,
    limit_indicator: ComponentId,
}

/// Player-controlled car. Reads gamepad 0 and the keyboard.
pub struct Car {
    parts: Option<CarParts>,
    controls: InputMap,
    timers: Option<TimeKeeper<CarStatus>>,
    jump_release: Option<TimerId>,
    jump_cooldown: Option<TimerId>,
}

impl Default for Car {
    fn default() -> Self {
        Self::new()
    }
}

impl Car {
    pub fn boost() -> ActionId {
        ActionId::new("boost")
    }

    pub fn jump() -> ActionId {
        ActionId::new("jump")
    }

    pub fn throttle() -> ActionId {
        ActionId::new("throttle")
    }

    pub fn rotate() -> ActionId {
        ActionId::new("rotate")
    }

    pub fn new() -> Self {
        let mut controls = InputMap::new();
        controls.bind(Self::boost(), Button::Gamepad(PAD, GamepadButton::X));
        controls.bind(Self::boost(), Button::Key(KeyCode::ShiftLeft));
        controls.bind(Self::jump(), Button::Gamepad(PAD, GamepadButton::A));
        controls.bind(Self::jump(), Button::Key(KeyCode::Space));
        controls.set_axis(
            Self::throttle(),
            AxisBinding::new(
                vec![Button::Key(KeyCode::ArrowDown)],
                vec![Button::Key(KeyCode::ArrowUp)],
            ),
        );
        controls.set_axis(
            Self::rotate(),
            AxisBinding::new(
                vec![Button::Key(KeyCode::ArrowLeft)],
                vec![Button::Key(KeyCode::ArrowRight)],
            ),
        );

        Self {
            parts: None,
            controls,
            timers: None,
            jump_release: None,
            jump_cooldown: None,
        }
    }

    fn build(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId) -> Option<CarParts> {
        let node = ctx.owner(me)?;

        let body_component = ctx.add_component(node, BodyComponent::fixed());
        let body = ctx.body(node)?;
        let fixture = ctx.add_component(
            node,
            FixtureComponent::new(FixtureShape::Rectangle {
                width: BODY_WIDTH,
                height: BODY_HEIGHT,
            })
            .with_material(FixtureMaterial::new(BODY_DENSITY).with_friction(BODY_FRICTION)),
        );
        ctx.component::<FixtureComponent>(fixture)?.fixture()?;
        ctx.physics_mut().set_angular_damping(body, BODY_ANGULAR_DAMPING);

        let rear_offset = Vec2::new(-WHEEL_OFFSET.x, WHEEL_OFFSET.y);
        let rear = Self::create_wheel(ctx, node, "RearWheel", rear_offset)?;
        let front = Self::create_wheel(ctx, node, "FrontWheel", WHEEL_OFFSET)?;

        let throttle_indicator =
            ctx.add_component(node, StatusIndicator::new().with_offset(Vec2::new(0.0, -48.0)));
        let limit_indicator = ctx.add_component(
            node,
            StatusIndicator::new()
                .with_offset(Vec2::new(0.0, -56.0))
                .with_size(32.0, 4.0)
                .with_color(Color::RED)
                .hidden(),
        );

        let gravity = ctx.add_component(node, Gravity::new());
        ctx.with_component::<Gravity, _>(gravity, |g, ctx| {
            for b in [body, rear.body, front.body] {
                g.add_body(ctx, b);
            }
        })?;

        ctx.add_component(node, TextureRenderer::new("Car"));

        Some(CarParts {
            body,
            body_component,
            rear,
            front,
            gravity,
            throttle_indicator,
            limit_indicator,
        })
    }

    fn create_wheel(
        ctx: &mut SceneContext<'_>,
        car: NodeId,
        name: &str,
        offset: Vec2,
    ) -> Option<WheelParts> {
        let node = ctx.create_node(Some(car), Some(name));
        let units = ctx.units();
        let rotation = ctx.rotation(car);
        let position = ctx.position(car) + Vec2::from_angle(rotation).rotate(units.to_display(offset));
        ctx.set_position(node, position);
        ctx.set_rotation(node, rotation);

        let component = ctx.add_component(node, Wheel::new(WHEEL_RADIUS, offset));
        let wheel = ctx.component::<Wheel>(component)?;
        let body = wheel.body()?;
        let joint = ctx.component::<JointComponent>(wheel.joint()?)?.joint()?;
        Some(WheelParts {
            component,
            body,
            joint,
        })
    }

    /// Grounded flag and the magnet direction, zero unless the wheel is sticky.
    fn wheel_state(ctx: &SceneContext<'_>, wheel: &WheelParts) -> (bool, Vec2) {
        ctx.component::<Wheel>(wheel.component)
            .map(|w| {
                let pull = if w.sticky() { -w.ground_normal() } else { Vec2::ZERO };
                (w.grounded(), pull)
            })
            .unwrap_or((false, Vec2::ZERO))
    }

    fn read_controls(&self, ctx: &SceneContext<'_>) -> (bool, bool, f32, f32) {
        let input = ctx.input();
        let pad = input.gamepad(PAD);
        let boosting = self.controls.action_down(input, &Self::boost());
        let jump = self.controls.action_pressed(input, &Self::jump());
        let throttle = if boosting {
            1.0
        } else {
            (pad.right_trigger - pad.left_trigger + self.controls.axis(input, &Self::throttle()))
                .clamp(-1.0, 1.0)
        };
        let rotation =
            (pad.left_stick.x + self.controls.axis(input, &Self::rotate())).clamp(-1.0, 1.0);
        (boosting, jump, throttle, rotation)
    }

    fn update_timers(&mut self, status: CarStatus) {
        let Some(timers) = self.timers.as_mut() else {
            return;
        };
        for event in timers.update(&status) {
            debug!("car timer {event:?}");
        }
        if self.jump_release.is_some_and(|id| !timers.is_active(id)) {
            self.jump_release = None;
        }
        if self.jump_cooldown.is_some_and(|id| !timers.is_active(id)) {
            self.jump_cooldown = None;
        }
    }

    fn try_jump(&mut self, ctx: &mut SceneContext<'_>, parts: &CarParts, status: CarStatus) {
        if !status.partially_grounded {
            return;
        }
        let Some(timers) = self.timers.as_mut() else {
            return;
        };
        if let Some(cooldown) = self.jump_cooldown {
            debug!(
                "jump on cooldown for {:.2}s",
                timers.seconds_remaining(cooldown)
            );
            return;
        }
        let rotation = ctx.physics().body_rotation(parts.body).unwrap_or(0.0);
        let up = Vec2::from_angle(rotation).rotate(Vec2::NEG_Y);
        ctx.physics_mut().apply_impulse(parts.body, up * JUMP_IMPULSE);

        self.jump_release = Some(
            timers.start_with_cancel(JUMP_RELEASE_SECONDS, |s: &CarStatus| !s.partially_grounded),
        );
        self.jump_cooldown = Some(timers.start(JUMP_COOLDOWN_SECONDS));
    }

    fn limit_speed(ctx: &mut SceneContext<'_>, parts: &CarParts) -> bool {
        let velocity = ctx.physics().linear_velocity(parts.body).unwrap_or(Vec2::ZERO);
        if velocity.length() <= SPEED_LIMIT {
            return false;
        }
        let excess = velocity - velocity.normalize() * SPEED_LIMIT;
        let physics = ctx.physics_mut();
        for body in [parts.body, parts.rear.body, parts.front.body] {
            if let Some(v) = physics.linear_velocity(body) {
                physics.set_linear_velocity(body, v - excess);
            }
        }
        true
    }

    fn combined_center_of_mass(ctx: &SceneContext<'_>, bodies: &[BodyHandle]) -> Option<Vec2> {
        let physics = ctx.physics();
        let (weighted, total) = bodies.iter().fold((Vec2::ZERO, 0.0), |(sum, total), &b| {
            match (physics.world_center(b), physics.mass(b)) {
                (Some(center), Some(mass)) => (sum + center * mass, total + mass),
                _ => (sum, total),
            }
        });
        (total > 0.0).then(|| weighted / total)
    }
}

impl Behavior for Car {
    fn on_initialize(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId) {
        self.timers = Some(TimeKeeper::new(ctx.engine().fixed_timestep()));
        match self.build(ctx, me) {
            Some(parts) => self.parts = Some(parts),
            None => {
                error!("car {me:?} could not build its body and wheels; destroying it");
                ctx.destroy_component(me);
            }
        }
    }

    fn on_update(&mut self, ctx: &mut SceneContext<'_>, _me: ComponentId, _dt: f32) {
        let Some(parts) = self.parts else {
            return;
        };

        // Static until the first update so the wheels settle onto their joints.
        if ctx.physics().body_kind(parts.body) != Some(BodyKind::Dynamic) {
            ctx.with_component::<BodyComponent, _>(parts.body_component, |b, ctx| {
                b.set_kind(ctx, BodyKind::Dynamic)
            });
        }

        let (boosting, jump_pressed, throttle, rotation) = self.read_controls(ctx);
        let (rear_grounded, rear_pull) = Self::wheel_state(ctx, &parts.rear);
        let (front_grounded, front_pull) = Self::wheel_state(ctx, &parts.front);
        let status = CarStatus {
            grounded: rear_grounded && front_grounded,
            partially_grounded: rear_grounded || front_grounded,
        };

        self.update_timers(status);
        if jump_pressed {
            self.try_jump(ctx, &parts, status);
        }
        let jumping = self.jump_release.is_some();

        let magnet = if status.grounded {
            WHEEL_STRONG_FORCE
        } else {
            WHEEL_WEAK_FORCE
        };
        if status.partially_grounded && !jumping {
            let physics = ctx.physics_mut();
            physics.apply_force(parts.rear.body, rear_pull * magnet);
            physics.apply_force(parts.front.body, front_pull * magnet);
        } else {
            ctx.physics_mut()
                .apply_angular_impulse(parts.body, rotation * BODY_ANGULAR_IMPULSE);
        }

        let limited = Self::limit_speed(ctx, &parts);
        ctx.with_component::<StatusIndicator, _>(parts.limit_indicator, |i, _| i.visible = limited);

        let body_rotation = ctx.physics().body_rotation(parts.body).unwrap_or(0.0);
        if boosting {
            let bodies = [parts.body, parts.rear.body, parts.front.body];
            if let Some(center) = Self::combined_center_of_mass(ctx, &bodies) {
                let force = Vec2::from_angle(body_rotation).rotate(Vec2::X) * BOOST_FORCE;
                ctx.physics_mut().apply_force_at_point(parts.body, force, center);
            }
        }

        let physics = ctx.physics();
        let wheel_speed = (physics.joint_speed(parts.rear.joint).unwrap_or(0.0)
            + physics.joint_speed(parts.front.joint).unwrap_or(0.0))
            * 0.5;
        let drive = drive(throttle, wheel_speed, status.partially_grounded);
        let gravity = car_gravity(physics.gravity(), body_rotation, drive.mode, status.grounded);

        ctx.with_component::<Gravity, _>(parts.gravity, |g, _| g.value = gravity);
        ctx.with_component::<StatusIndicator, _>(parts.throttle_indicator, |i, _| {
            i.color = drive.mode.indicator_color()
        });
        let physics = ctx.physics_mut();
        for joint in [parts.rear.joint, parts.front.joint] {
            physics.set_joint_motor(joint, drive.speed, drive.torque);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_airborne_car_coasts() {
        let d = drive(1.0, 0.0, false);
        assert_eq!(d.mode, DriveMode::Coasting);
        assert_relative_eq!(d.torque, COASTING_TORQUE);
        assert_relative_eq!(d.speed, 0.0);
    }

    #[test]
    fn test_full_throttle_from_rest_uses_full_torque() {
        let d = drive(1.0, 0.0, true);
        assert_eq!(d.mode, DriveMode::Accelerating);
        assert_relative_eq!(d.torque, ACCELERATION_TORQUE);
        assert_relative_eq!(d.speed, WHEEL_TOP_SPEED);
    }

    #[test]
    fn test_torque_fades_near_the_target_speed() {
        let target = WHEEL_TOP_SPEED;
        let d = drive(1.0, target - ACCELERATION_CURVE_THRESHOLD * 0.5, true);
        assert_relative_eq!(d.torque, ACCELERATION_TORQUE * 0.5, epsilon = 1e-4);

        let over = drive(1.0, WHEEL_TOP_SPEED + 1.0, true);
        assert_relative_eq!(over.torque, 0.0);
    }

    #[test]
    fn test_reverse_throttle_while_rolling_forward_brakes() {
        let d = drive(-1.0, 5.0, true);
        assert_eq!(d.mode, DriveMode::Braking);
        assert_relative_eq!(d.torque, BRAKING_TORQUE);
        assert_relative_eq!(d.speed, 0.0);
    }

    #[test]
    fn test_gravity_follows_the_car_under_power() {
        let world = Vec2::new(0.0, 10.0);
        let g = car_gravity(world, FRAC_PI_2, DriveMode::Accelerating, true);
        assert_relative_eq!(g.x, -10.0, epsilon = 1e-4);
        assert_relative_eq!(g.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_free_car_falls_with_world_gravity() {
        let world = Vec2::new(0.0, 10.0);
        assert_eq!(car_gravity(world, 1.0, DriveMode::Coasting, false), world);
    }

    #[test]
    fn test_level_coasting_car_keeps_world_gravity() {
        let world = Vec2::new(0.0, 10.0);
        let g = car_gravity(world, 0.0, DriveMode::Coasting, true);
        assert_relative_eq!(g.x, world.x, epsilon = 1e-5);
        assert_relative_eq!(g.y, world.y, epsilon = 1e-5);
    }

    #[test]
    fn test_default_controls_bind_keyboard_and_pad() {
        let car = Car::new();
        let input = kinetic2d::InputState::new();
        assert!(!car.controls.action_down(&input, &Car::boost()));
        assert_relative_eq!(car.controls.axis(&input, &Car::throttle()), 0.0);
    }
}
