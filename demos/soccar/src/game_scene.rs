//! The arena scene: a car on a ground map, followed by the camera.

use anyhow::{anyhow, Result};
use kinetic2d::{
    Color, GamepadButton, KeyCode, NodeId, Scene, SceneConfig, SceneContext, SceneScript,
};
use log::{info, warn};

use crate::wheel::GROUND_NAME;

const CAR_NAME: &str = "MainCar";
const GROUND_FRICTION: f32 = 1.0;
const STICK_ZOOM_RATE: f32 = 0.025;
const WHEEL_ZOOM_RATE: f32 = 0.1;

/// Build an arena scene for the map at `map_path`.
pub fn build(map_path: &str) -> Scene {
    let config = SceneConfig::new()
        .with_map(map_path)
        .with_clear_color(Color::DARK_SLATE_GRAY)
        .with_debug_draw(true);
    Scene::new(config).with_script(GameScene::new(map_path))
}

pub struct GameScene {
    map_path: String,
    car: Option<NodeId>,
}

impl GameScene {
    pub fn new(map_path: impl Into<String>) -> Self {
        Self {
            map_path: map_path.into(),
            car: None,
        }
    }

    fn restart_requested(ctx: &SceneContext<'_>) -> bool {
        let input = ctx.input();
        input.is_button_pressed(0, GamepadButton::Start) || input.is_key_pressed(KeyCode::KeyR)
    }
}

impl SceneScript for GameScene {
    fn on_initialize(&mut self, ctx: &mut SceneContext<'_>) -> Result<()> {
        ctx.textures_mut().load("Textures/Car", "Car");
        ctx.textures_mut().load("Textures/Wheel", "Wheel");

        let car = ctx
            .find_node(None, CAR_NAME)
            .ok_or_else(|| anyhow!("map '{}' has no object named {CAR_NAME}", self.map_path))?;
        self.car = Some(car);

        let ground = ctx.find_node(None, GROUND_NAME).and_then(|n| ctx.body(n));
        match ground {
            Some(ground) => ctx.physics_mut().set_body_friction(ground, GROUND_FRICTION),
            None => warn!("map '{}' has no {GROUND_NAME} body", self.map_path),
        }
        info!("arena '{}' ready", self.map_path);
        Ok(())
    }

    fn on_update(&mut self, ctx: &mut SceneContext<'_>, _dt: f32) -> Result<()> {
        if Self::restart_requested(ctx) {
            info!("restarting arena '{}'", self.map_path);
            ctx.change_scene(build(&self.map_path));
        }
        if ctx.input().is_key_pressed(KeyCode::F1) {
            let enabled = !ctx.debug_draw();
            ctx.set_debug_draw(enabled);
        }

        if let Some(car) = self.car.filter(|&car| ctx.is_live(car)) {
            let target = ctx.position(car);
            ctx.camera_mut().center_on(target);
        }

        let input = ctx.input();
        let zoom = 1.0
            + input.gamepad(0).right_stick.y * STICK_ZOOM_RATE
            + input.wheel_speed() * WHEEL_ZOOM_RATE;
        if zoom > 0.0 {
            ctx.camera_mut().zoom_by(zoom);
        }
        Ok(())
    }
}
