//! Background layers of a map, drawn as root entities.

use glam::Vec2;
use log::warn;

use crate::assets::{DrawParams, TextureCache};
use crate::entity::Entity;
use crate::map::{tileset_for_gid, ImageLayerData, TileLayerData, Tileset};
use crate::render::{Color, SpriteBatch};

/// Grid of tiles drawn from one or more tileset images.
pub struct TileLayer {
    data: TileLayerData,
    tilesets: Vec<Tileset>,
    tile_size: Vec2,
}

impl TileLayer {
    pub fn new(data: TileLayerData, tilesets: Vec<Tileset>, tile_size: Vec2) -> Self {
        Self {
            data,
            tilesets,
            tile_size,
        }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }
}

impl Entity for TileLayer {
    fn initialize(&mut self, textures: &mut TextureCache) {
        for tileset in &self.tilesets {
            if !textures.load(&tileset.image, tileset.texture_id()) {
                warn!(
                    "tile layer '{}' will skip tiles of tileset '{}'",
                    self.data.name,
                    tileset.texture_id()
                );
            }
        }
    }

    fn draw(&mut self, textures: &TextureCache, batch: &mut dyn SpriteBatch) {
        if !self.data.visible {
            return;
        }
        let tint = Color::rgba(1.0, 1.0, 1.0, self.data.opacity);

        for row in 0..self.data.height {
            for column in 0..self.data.width {
                let gid = self.data.gid(column, row);
                let Some(tileset) = tileset_for_gid(&self.tilesets, gid) else {
                    continue;
                };
                let position = Vec2::new(column as f32, row as f32) * self.tile_size;
                let params = DrawParams::at(position)
                    .with_source(tileset.source_rect(gid))
                    .with_origin(Vec2::ZERO)
                    .with_tint(tint);
                textures.draw(batch, tileset.texture_id(), params);
            }
        }
    }
}

/// A single image placed at a fixed offset.
pub struct ImageLayer {
    data: ImageLayerData,
}

impl ImageLayer {
    pub fn new(data: ImageLayerData) -> Self {
        Self { data }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }
}

impl Entity for ImageLayer {
    fn initialize(&mut self, textures: &mut TextureCache) {
        textures.load(&self.data.image, &self.data.image);
    }

    fn draw(&mut self, textures: &TextureCache, batch: &mut dyn SpriteBatch) {
        let params = DrawParams::at(Vec2::new(self.data.offset_x, self.data.offset_y))
            .with_origin(Vec2::ZERO)
            .with_tint(Color::rgba(1.0, 1.0, 1.0, self.data.opacity));
        textures.draw(batch, &self.data.image, params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawList, Rect};

    fn tileset() -> Tileset {
        Tileset {
            first_gid: 1,
            name: "Ground".into(),
            image: "ground".into(),
            tile_width: 16,
            tile_height: 16,
            columns: 2,
            ..Tileset::default()
        }
    }

    #[test]
    fn test_tile_layer_skips_empty_cells() {
        let data = TileLayerData {
            name: "Floor".into(),
            width: 2,
            height: 2,
            data: vec![1, 0, 0, 4],
            ..TileLayerData::default()
        };
        let mut layer = TileLayer::new(data, vec![tileset()], Vec2::splat(16.0));
        let mut textures = TextureCache::default();
        textures.insert("Ground", 32, 32);

        let mut list = DrawList::new();
        layer.draw(&textures, &mut list);

        let sprites: Vec<_> = list.sprites().collect();
        assert_eq!(sprites.len(), 2);
        assert_eq!(sprites[0].position, Vec2::ZERO);
        assert_eq!(sprites[0].source, Some(Rect::new(0.0, 0.0, 16.0, 16.0)));
        assert_eq!(sprites[1].position, Vec2::new(16.0, 16.0));
        assert_eq!(sprites[1].source, Some(Rect::new(16.0, 16.0, 16.0, 16.0)));
        assert_eq!(sprites[1].origin, Vec2::ZERO);
    }

    #[test]
    fn test_missing_tileset_texture_draws_nothing() {
        let data = TileLayerData {
            width: 1,
            height: 1,
            data: vec![1],
            ..TileLayerData::default()
        };
        let mut layer = TileLayer::new(data, vec![tileset()], Vec2::splat(16.0));
        let mut list = DrawList::new();
        layer.draw(&TextureCache::default(), &mut list);
        assert_eq!(list.sprite_count(), 0);
    }

    #[test]
    fn test_image_layer_draws_at_offset() {
        let mut layer = ImageLayer::new(ImageLayerData {
            image: "sky".into(),
            offset_x: 4.0,
            offset_y: 8.0,
            ..ImageLayerData::default()
        });
        let mut textures = TextureCache::default();
        textures.insert("sky", 100, 50);
        let mut list = DrawList::new();
        layer.draw(&textures, &mut list);

        let sprite = list.sprites().next().unwrap();
        assert_eq!(sprite.position, Vec2::new(4.0, 8.0));
        assert_eq!(sprite.origin, Vec2::ZERO);
    }
}
