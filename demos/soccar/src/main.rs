mod car;
mod definitions;
mod game_scene;
mod gravity;
mod indicator;
mod timekeeper;
mod wheel;

use anyhow::Result;
use kinetic2d::Engine;

use crate::definitions::CarDefinition;

const FIRST_ARENA: &str = "test_arena_0.json";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    Engine::new()
        .with_title("Ultimate SocCar")
        .with_size(1280, 720)
        .with_content_root(concat!(env!("CARGO_MANIFEST_DIR"), "/content"))
        .register_definition("Car", CarDefinition)
        .run(game_scene::build(FIRST_ARENA))
}
