use kinetic2d::{Behavior, Color, ComponentId, Rect, SceneContext, SpriteBatch, Vec2};

/// Coloured bar drawn above the owning node.
#[derive(Clone, Debug)]
pub struct StatusIndicator {
    pub width: f32,
    pub height: f32,
    /// From the node position to the bar centre, in pixels.
    pub offset: Vec2,
    pub visible: bool,
    pub color: Color,
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self {
            width: 32.0,
            height: 8.0,
            offset: Vec2::ZERO,
            visible: true,
            color: Color::YELLOW,
        }
    }
}

impl StatusIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn bounds(&self, anchor: Vec2) -> Rect {
        Rect::centered(anchor + self.offset, Vec2::new(self.width, self.height))
    }
}

impl Behavior for StatusIndicator {
    fn on_draw(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId, batch: &mut dyn SpriteBatch) {
        if !self.visible {
            return;
        }
        if let Some(node) = ctx.owner(me) {
            batch.fill_rect(self.bounds(ctx.position(node)), self.color);
        }
    }
}
