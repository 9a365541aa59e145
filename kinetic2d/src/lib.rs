//! Kinetic2D - a small 2D scene-graph engine with rigid-body physics.
//!
//! Scenes own a physics world and a graph of nodes. Nodes carry components;
//! the physics components bind a node's pose to a rigid body so that game
//! code reads and writes positions the same way with or without physics.

pub mod assets;
pub mod binding;
pub mod camera;
pub mod component;
pub mod components;
pub mod context;
pub mod engine;
pub mod entity;
pub mod error;
pub mod factory;
pub mod gamepad;
pub mod input;
pub mod layers;
pub mod map;
pub mod node;
pub mod parsing;
pub mod physics;
pub mod render;
pub mod safe_list;
pub mod scene;

pub use crate::assets::{DrawParams, Texture, TextureCache};
pub use crate::binding::{Transform, TransformBinding};
pub use crate::camera::Camera;
pub use crate::component::{Behavior, ComponentId, Contact};
pub use crate::components::{BodyComponent, FixtureComponent, JointComponent, TextureRenderer};
pub use crate::context::SceneContext;
pub use crate::engine::{App, Engine, EngineConfig, EngineContext};
pub use crate::entity::{Entity, Lifecycle};
pub use crate::error::{MapError, SceneError};
pub use crate::factory::{DefaultDefinition, NodeDefinition, NodeFactory};
pub use crate::input::{
    ActionId, AxisBinding, Button, GamepadButton, GamepadState, InputMap, InputState, MouseKey,
};
pub use crate::map::{Map, MapObject};
pub use crate::node::{EntityId, NodeId, SceneGraph};
pub use crate::physics::{
    BodyHandle, BodyKind, ContactPhase, FixtureHandle, FixtureMaterial, FixtureShape, JointHandle,
    JointSpec, PhysicsWorld, UnitScale,
};
pub use crate::render::{Color, DrawList, Rect, Sprite, SpriteBatch, TextureHandle};
pub use crate::safe_list::SafeList;
pub use crate::scene::{Scene, SceneConfig, SceneScript, SceneState};
pub use glam::{Mat4, Vec2};
pub use winit::keyboard::KeyCode;
