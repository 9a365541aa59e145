//! Lifecycle contract shared by everything that lives in a scene.

use crate::assets::TextureCache;
use crate::render::SpriteBatch;

/// `Uninitialized → Initialized → Destroyed`. The last state is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Initialized,
    Destroyed,
}

impl Lifecycle {
    pub fn is_destroyed(self) -> bool {
        self == Lifecycle::Destroyed
    }
}

/// Root-level scene entity that is not a node, such as a background layer.
///
/// Entities are owned by the scene's root collection, updated and drawn in
/// registration order alongside root nodes, and destroyed exactly once.
pub trait Entity {
    fn initialize(&mut self, _textures: &mut TextureCache) {}

    fn update(&mut self, _dt: f32) {}

    fn draw(&mut self, textures: &TextureCache, batch: &mut dyn SpriteBatch);

    fn destroy(&mut self) {}
}

pub(crate) struct EntitySlot {
    pub(crate) entity: Box<dyn Entity>,
    pub(crate) lifecycle: Lifecycle,
}
