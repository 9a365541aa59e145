//! Scenes: a physics world, a scene graph and a camera, stepped together.
//!
//! Each frame the world is stepped once with the fixed timestep, contact
//! events are routed to components, then root nodes and entities update in
//! registration order. Drawing walks the same roots under the camera view,
//! followed by the optional physics overlay.

use std::path::PathBuf;

use anyhow::{Context, Result};
use glam::Vec2;
use log::{debug, info, warn};

use crate::camera::Camera;
use crate::context::SceneContext;
use crate::engine::EngineContext;
use crate::factory::NodeFactory;
use crate::layers::{ImageLayer, TileLayer};
use crate::map::{Layer, Map};
use crate::node::{NodeId, SceneGraph};
use crate::physics::{PhysicsWorld, UnitScale, DEFAULT_DISPLAY_UNITS_PER_METER, DEFAULT_GRAVITY};
use crate::render::{draw_physics_outlines, Color, SpriteBatch};

/// Construction parameters of a [`Scene`].
#[derive(Clone, Debug)]
pub struct SceneConfig {
    /// Map document, relative to the engine's content root.
    pub map_path: Option<PathBuf>,
    pub gravity: Vec2,
    pub display_units_per_meter: f32,
    pub debug_draw: bool,
    pub clear_color: Color,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            map_path: None,
            gravity: DEFAULT_GRAVITY,
            display_units_per_meter: DEFAULT_DISPLAY_UNITS_PER_METER,
            debug_draw: false,
            clear_color: Color::CORNFLOWER_BLUE,
        }
    }
}

impl SceneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.map_path = Some(path.into());
        self
    }

    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_display_units_per_meter(mut self, ratio: f32) -> Self {
        self.display_units_per_meter = ratio;
        self
    }

    pub fn with_debug_draw(mut self, enabled: bool) -> Self {
        self.debug_draw = enabled;
        self
    }

    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneState {
    Constructed,
    Initialized,
    Destroyed,
}

/// Game-specific hooks around the scene's own passes.
///
/// The draw hooks run outside the scene's batch pass, so anything they
/// draw is wrapped in its own `begin`/`end`.
pub trait SceneScript {
    /// After the map has been loaded.
    fn on_initialize(&mut self, _ctx: &mut SceneContext<'_>) -> Result<()> {
        Ok(())
    }

    /// After the physics step and the node update pass.
    fn on_update(&mut self, _ctx: &mut SceneContext<'_>, _dt: f32) -> Result<()> {
        Ok(())
    }

    fn on_pre_draw(&mut self, _ctx: &mut SceneContext<'_>, _batch: &mut dyn SpriteBatch) -> Result<()> {
        Ok(())
    }

    fn on_post_draw(&mut self, _ctx: &mut SceneContext<'_>, _batch: &mut dyn SpriteBatch) -> Result<()> {
        Ok(())
    }

    /// After every node and entity has been destroyed.
    fn on_destroy(&mut self, _ctx: &mut SceneContext<'_>) {}
}

pub struct Scene {
    config: SceneConfig,
    state: SceneState,
    graph: SceneGraph,
    physics: PhysicsWorld,
    camera: Camera,
    debug_draw: bool,
    map: Option<Map>,
    script: Option<Box<dyn SceneScript>>,
}

impl Scene {
    pub fn new(config: SceneConfig) -> Self {
        let units = UnitScale::new(config.display_units_per_meter);
        Self {
            physics: PhysicsWorld::new(config.gravity, units),
            debug_draw: config.debug_draw,
            config,
            state: SceneState::Constructed,
            graph: SceneGraph::new(),
            camera: Camera::default(),
            map: None,
            script: None,
        }
    }

    pub fn with_script(mut self, script: impl SceneScript + 'static) -> Self {
        self.script = Some(Box::new(script));
        self
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn map(&self) -> Option<&Map> {
        self.map.as_ref()
    }

    pub fn debug_draw(&self) -> bool {
        self.debug_draw
    }

    pub fn set_debug_draw(&mut self, enabled: bool) {
        self.debug_draw = enabled;
    }

    /// First node named `name`, searching the whole graph.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.graph.find_anywhere(name)
    }

    /// Mutable access to the scene for code running outside a frame pass.
    pub fn context<'s>(&'s mut self, engine: &'s mut EngineContext) -> SceneContext<'s> {
        self.parts(engine).0
    }

    /// Build the physics world and camera, then load the map (tile and
    /// image layers become entities, objects go through the node factory)
    /// and run the script's initialization.
    pub fn initialize(&mut self, engine: &mut EngineContext) -> Result<()> {
        if self.state != SceneState::Constructed {
            warn!("scene initialized twice; ignoring");
            return Ok(());
        }

        let units = UnitScale::new(self.config.display_units_per_meter);
        self.physics = PhysicsWorld::new(self.config.gravity, units);
        self.camera = Camera::new(engine.viewport());
        self.debug_draw = self.config.debug_draw;
        self.state = SceneState::Initialized;

        if let Some(relative) = self.config.map_path.clone() {
            let path = engine.content_root().join(relative);
            let map = Map::load(&path)
                .with_context(|| format!("failed to load map {}", path.display()))?;
            self.populate(engine, &map);
            self.map = Some(map);
        }

        let (mut ctx, script) = self.parts(engine);
        if let Some(script) = script {
            script.on_initialize(&mut ctx)?;
        }
        info!(
            "scene initialized with {} nodes and {} bodies",
            self.graph.node_count(),
            self.physics.body_count()
        );
        Ok(())
    }

    /// Step physics, deliver contacts, update the roots, then the script.
    pub fn update(&mut self, engine: &mut EngineContext) -> Result<()> {
        if self.state != SceneState::Initialized {
            return Ok(());
        }
        let dt = engine.fixed_timestep().as_secs_f32();
        self.physics.step(dt);

        let (mut ctx, script) = self.parts(engine);
        ctx.dispatch_contacts();
        ctx.update_roots(dt);
        if let Some(script) = script {
            script.on_update(&mut ctx, dt)?;
        }
        Ok(())
    }

    pub fn draw(&mut self, engine: &mut EngineContext, batch: &mut dyn SpriteBatch) -> Result<()> {
        if self.state != SceneState::Initialized {
            return Ok(());
        }
        batch.clear(self.config.clear_color);

        {
            let (mut ctx, mut script) = self.parts(engine);
            if let Some(script) = script.as_mut() {
                script.on_pre_draw(&mut ctx, batch)?;
            }

            batch.begin(ctx.camera().view_matrix());
            ctx.draw_roots(batch);
            batch.end();

            if let Some(script) = script {
                script.on_post_draw(&mut ctx, batch)?;
            }
        }

        if self.debug_draw {
            batch.begin(self.camera.sim_view_matrix(self.physics.units()));
            draw_physics_outlines(&self.physics, batch);
            batch.end();
        }
        Ok(())
    }

    /// Destroy every node and entity, clear the physics world and release
    /// cached textures. Later calls do nothing.
    pub fn destroy(&mut self, engine: &mut EngineContext) {
        if self.state == SceneState::Destroyed {
            return;
        }
        self.state = SceneState::Destroyed;

        {
            let (mut ctx, script) = self.parts(engine);
            ctx.destroy_all();
            if let Some(script) = script {
                script.on_destroy(&mut ctx);
            }
        }
        self.physics.clear();
        self.map = None;
        engine.textures_mut().clear();
        info!("scene destroyed");
    }

    fn populate(&mut self, engine: &mut EngineContext, map: &Map) {
        let tile_size = Vec2::new(map.tile_width as f32, map.tile_height as f32);
        let mut ctx = self.context(engine);

        for layer in &map.layers {
            match layer {
                Layer::TileLayer(data) => {
                    ctx.add_entity(TileLayer::new(data.clone(), map.tilesets.clone(), tile_size));
                }
                Layer::ImageLayer(data) => {
                    ctx.add_entity(ImageLayer::new(data.clone()));
                }
                Layer::ObjectGroup(group) => {
                    debug!("creating {} objects of group '{}'", group.objects.len(), group.name);
                    for object in &group.objects {
                        if NodeFactory::create(&mut ctx, object).is_none() {
                            warn!(
                                "map object {} ('{}', type '{}') produced no node",
                                object.id, object.name, object.type_name
                            );
                        }
                    }
                }
            }
        }
    }

    fn parts<'s>(
        &'s mut self,
        engine: &'s mut EngineContext,
    ) -> (SceneContext<'s>, Option<&'s mut Box<dyn SceneScript>>) {
        let ctx = SceneContext {
            graph: &mut self.graph,
            physics: &mut self.physics,
            camera: &mut self.camera,
            debug_draw: &mut self.debug_draw,
            engine,
        };
        (ctx, self.script.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::render::{DrawCommand, DrawList};

    fn engine() -> EngineContext {
        EngineContext::new(EngineConfig::default())
    }

    #[test]
    fn test_passes_before_initialize_do_nothing() {
        let mut engine = engine();
        let mut scene = Scene::new(SceneConfig::default());
        let mut list = DrawList::new();
        scene.update(&mut engine).unwrap();
        scene.draw(&mut engine, &mut list).unwrap();
        assert!(list.commands().is_empty());
        assert_eq!(scene.state(), SceneState::Constructed);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut engine = engine();
        engine.textures_mut().insert("Car", 4, 4);
        let mut scene = Scene::new(SceneConfig::default());
        scene.initialize(&mut engine).unwrap();
        scene.context(&mut engine).create_node(None, Some("A"));

        scene.destroy(&mut engine);
        scene.destroy(&mut engine);
        assert_eq!(scene.state(), SceneState::Destroyed);
        assert_eq!(scene.graph().node_count(), 0);
        assert!(engine.textures().is_empty());
    }

    #[test]
    fn test_debug_overlay_uses_the_simulation_view() {
        let mut engine = engine();
        let mut scene = Scene::new(SceneConfig::default().with_debug_draw(true));
        scene.initialize(&mut engine).unwrap();

        let mut list = DrawList::new();
        scene.draw(&mut engine, &mut list).unwrap();
        let begins: Vec<_> = list
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Begin(view) => Some(*view),
                _ => None,
            })
            .collect();
        assert_eq!(begins.len(), 2);
        assert_eq!(begins[0], scene.camera().view_matrix());
        assert_eq!(begins[1], scene.camera().sim_view_matrix(scene.physics().units()));
    }

    #[test]
    fn test_missing_map_fails_initialization() {
        let mut engine = engine();
        let mut scene = Scene::new(SceneConfig::default().with_map("no/such/map.json"));
        assert!(scene.initialize(&mut engine).is_err());
    }
}
