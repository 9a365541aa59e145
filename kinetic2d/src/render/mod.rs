//! Rendering collaborator.
//!
//! Scene code never talks to the GPU directly. Everything that draws does so
//! through [`SpriteBatch`]. [`DrawList`] records the calls; the window runner
//! hands each recorded frame to [`GpuRenderer`], and tests inspect it.

mod debug;
mod gpu;
mod sprite;

use glam::{Mat4, Vec2};

pub use debug::draw_physics_outlines;
pub use gpu::GpuRenderer;
pub use sprite::{Color, Rect, Sprite, TextureHandle};

/// Batched 2D drawing under a view transform.
pub trait SpriteBatch {
    fn begin(&mut self, view: Mat4);
    fn draw_sprite(&mut self, sprite: &Sprite);
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn draw_line(&mut self, from: Vec2, to: Vec2, color: Color);
    fn end(&mut self);

    fn clear(&mut self, _color: Color) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Begin(Mat4),
    Sprite(Sprite),
    FillRect(Rect, Color),
    Line { from: Vec2, to: Vec2, color: Color },
    End,
}

/// Recording [`SpriteBatch`].
#[derive(Debug, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn sprites(&self) -> impl Iterator<Item = &Sprite> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Sprite(s) => Some(s),
            _ => None,
        })
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites().count()
    }

    pub fn line_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Line { .. }))
            .count()
    }

    /// Take the recorded frame, leaving the list empty.
    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn reset(&mut self) {
        self.commands.clear();
    }
}

impl SpriteBatch for DrawList {
    fn begin(&mut self, view: Mat4) {
        self.commands.push(DrawCommand::Begin(view));
    }

    fn draw_sprite(&mut self, sprite: &Sprite) {
        self.commands.push(DrawCommand::Sprite(sprite.clone()));
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect(rect, color));
    }

    fn draw_line(&mut self, from: Vec2, to: Vec2, color: Color) {
        self.commands.push(DrawCommand::Line { from, to, color });
    }

    fn end(&mut self) {
        self.commands.push(DrawCommand::End);
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(DrawCommand::Clear(color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_list_records_in_order() {
        let mut list = DrawList::new();
        list.begin(Mat4::IDENTITY);
        list.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::RED);
        list.draw_sprite(&Sprite::new(TextureHandle(1)));
        list.end();

        assert_eq!(list.commands().len(), 4);
        assert_eq!(list.commands()[0], DrawCommand::Begin(Mat4::IDENTITY));
        assert_eq!(list.sprite_count(), 1);
        assert_eq!(list.take().len(), 4);
        assert!(list.commands().is_empty());
    }

    #[test]
    fn test_rect_centered() {
        let rect = Rect::centered(Vec2::new(10.0, 10.0), Vec2::new(4.0, 2.0));
        assert_eq!(rect, Rect::new(8.0, 9.0, 4.0, 2.0));
    }
}
