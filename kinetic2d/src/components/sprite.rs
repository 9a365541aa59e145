use glam::Vec2;

use crate::assets::DrawParams;
use crate::component::{Behavior, ComponentId};
use crate::context::SceneContext;
use crate::render::{Color, Rect, SpriteBatch};

/// Draws a cached texture at the owning node's pose.
#[derive(Clone, Debug)]
pub struct TextureRenderer {
    pub texture_id: String,
    pub source: Option<Rect>,
    /// Texture centre when `None`.
    pub origin: Option<Vec2>,
    pub tint: Color,
    pub depth: f32,
    pub visible: bool,
}

impl TextureRenderer {
    pub fn new(texture_id: impl Into<String>) -> Self {
        Self {
            texture_id: texture_id.into(),
            source: None,
            origin: None,
            tint: Color::WHITE,
            depth: 0.0,
            visible: true,
        }
    }

    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }
}

impl Behavior for TextureRenderer {
    fn on_draw(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId, batch: &mut dyn SpriteBatch) {
        if !self.visible {
            return;
        }
        let Some(node) = ctx.owner(me) else {
            return;
        };

        let mut params = DrawParams::at(ctx.position(node))
            .with_rotation(ctx.rotation(node))
            .with_scale(ctx.scale(node))
            .with_tint(self.tint)
            .with_depth(self.depth);
        params.source = self.source;
        params.origin = self.origin;
        ctx.textures().draw(batch, &self.texture_id, params);
    }
}
