//! Declarative map documents.
//!
//! Maps are JSON files in a Tiled-like layout: a grid size, tilesets, and an
//! ordered list of layers. Tile and image layers are drawn as background
//! entities; every object of an object group is handed to the node factory.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::parsing::try_parse_vertices;
use crate::render::Rect;

/// High bits of a tile gid carry flip flags.
pub const GID_MASK: u32 = 0x1FFF_FFFF;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Map {
    pub width: u32,
    pub height: u32,
    #[serde(rename = "tilewidth")]
    pub tile_width: u32,
    #[serde(rename = "tileheight")]
    pub tile_height: u32,
    pub tilesets: Vec<Tileset>,
    pub layers: Vec<Layer>,
}

impl Map {
    pub fn load(path: impl AsRef<Path>) -> Result<Map, MapError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Map, MapError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Tileset owning `gid`: the one with the greatest `first_gid <= gid`.
    pub fn tileset_for_gid(&self, gid: u32) -> Option<&Tileset> {
        tileset_for_gid(&self.tilesets, gid)
    }

    pub fn objects(&self) -> impl Iterator<Item = &MapObject> {
        self.layers
            .iter()
            .filter_map(|layer| match layer {
                Layer::ObjectGroup(group) => Some(group),
                _ => None,
            })
            .flat_map(|group| group.objects.iter())
    }
}

pub fn tileset_for_gid(tilesets: &[Tileset], gid: u32) -> Option<&Tileset> {
    let gid = gid & GID_MASK;
    if gid == 0 {
        return None;
    }
    tilesets
        .iter()
        .filter(|t| t.first_gid <= gid)
        .max_by_key(|t| t.first_gid)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tileset {
    #[serde(rename = "firstgid")]
    pub first_gid: u32,
    pub name: String,
    /// Image path, relative to the content root.
    pub image: String,
    #[serde(rename = "tilewidth")]
    pub tile_width: u32,
    #[serde(rename = "tileheight")]
    pub tile_height: u32,
    pub columns: u32,
    pub margin: u32,
    pub spacing: u32,
    #[serde(rename = "tilecount")]
    pub tile_count: u32,
}

impl Tileset {
    /// Texture id the tileset image is cached under.
    pub fn texture_id(&self) -> &str {
        if self.name.is_empty() {
            &self.image
        } else {
            &self.name
        }
    }

    /// Pixel region of `gid` inside the tileset image.
    pub fn source_rect(&self, gid: u32) -> Rect {
        let index = (gid & GID_MASK).saturating_sub(self.first_gid);
        let columns = self.columns.max(1);
        let (col, row) = (index % columns, index / columns);
        Rect::new(
            (self.margin + (self.spacing + self.tile_width) * col) as f32,
            (self.margin + (self.spacing + self.tile_height) * row) as f32,
            self.tile_width as f32,
            self.tile_height as f32,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Layer {
    TileLayer(TileLayerData),
    ObjectGroup(ObjectGroup),
    ImageLayer(ImageLayerData),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayerData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Row-major gids, `0` for an empty cell.
    pub data: Vec<u32>,
    pub opacity: f32,
    pub visible: bool,
}

impl Default for TileLayerData {
    fn default() -> Self {
        Self {
            name: String::new(),
            width: 0,
            height: 0,
            data: Vec::new(),
            opacity: 1.0,
            visible: true,
        }
    }
}

impl TileLayerData {
    pub fn gid(&self, column: u32, row: u32) -> u32 {
        if column >= self.width || row >= self.height {
            return 0;
        }
        self.data
            .get((row * self.width + column) as usize)
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectGroup {
    pub name: String,
    pub objects: Vec<MapObject>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageLayerData {
    pub name: String,
    pub image: String,
    #[serde(rename = "offsetx")]
    pub offset_x: f32,
    #[serde(rename = "offsety")]
    pub offset_y: f32,
    pub opacity: f32,
}

impl Default for ImageLayerData {
    fn default() -> Self {
        Self {
            name: String::new(),
            image: String::new(),
            offset_x: 0.0,
            offset_y: 0.0,
            opacity: 1.0,
        }
    }
}

/// Geometry of a map object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    Polygon,
    Polyline,
}

impl ShapeKind {
    fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "rectangle" | "rect" => Some(ShapeKind::Rectangle),
            "ellipse" => Some(ShapeKind::Ellipse),
            "polygon" => Some(ShapeKind::Polygon),
            "polyline" | "chain" => Some(ShapeKind::Polyline),
            _ => None,
        }
    }
}

/// One declarative object, in display units with a top-left position.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapObject {
    pub id: u32,
    pub name: String,
    /// Factory key. Empty means the default definition.
    #[serde(rename = "type")]
    pub type_name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Degrees, clockwise.
    pub rotation: f32,
    pub shape: String,
    /// Space separated `"x,y"` vertices relative to the object position.
    pub points: String,
}

impl MapObject {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn rotation_radians(&self) -> f32 {
        self.rotation.to_radians()
    }

    /// Explicit `shape` first, then a geometric type name, then rectangle.
    pub fn shape_kind(&self) -> ShapeKind {
        ShapeKind::parse(&self.shape)
            .or_else(|| ShapeKind::parse(&self.type_name))
            .unwrap_or(ShapeKind::Rectangle)
    }

    pub fn vertices(&self) -> Option<Vec<Vec2>> {
        try_parse_vertices(&self.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "width": 4, "height": 2, "tilewidth": 32, "tileheight": 32,
        "tilesets": [
            { "firstgid": 1, "name": "Ground", "image": "ground", "tilewidth": 32, "tileheight": 32, "columns": 4, "tilecount": 8 },
            { "firstgid": 9, "name": "Props", "image": "props", "tilewidth": 32, "tileheight": 32, "columns": 2, "margin": 1, "spacing": 2 }
        ],
        "layers": [
            { "type": "tilelayer", "name": "Floor", "width": 4, "height": 2, "data": [1, 2, 0, 9, 0, 0, 10, 3] },
            { "type": "imagelayer", "name": "Sky", "image": "sky", "offsetx": 5, "offsety": 6 },
            { "type": "objectgroup", "name": "Objects", "objects": [
                { "id": 1, "name": "Ground", "x": 0, "y": 600, "width": 1280, "height": 40 },
                { "id": 2, "type": "ellipse", "x": 10, "y": 10, "width": 2, "height": 4 },
                { "id": 3, "name": "Ramp", "shape": "polygon", "points": "0,0 64,0 64,-32" }
            ]}
        ]
    }"#;

    #[test]
    fn test_parse_sample_map() {
        let map = Map::from_json(SAMPLE).unwrap();
        assert_eq!(map.tile_width, 32);
        assert_eq!(map.tilesets.len(), 2);
        assert_eq!(map.layers.len(), 3);
        assert_eq!(map.objects().count(), 3);

        match &map.layers[1] {
            Layer::ImageLayer(image) => {
                assert_eq!(image.image, "sky");
                assert_eq!(image.offset_x, 5.0);
                assert_eq!(image.opacity, 1.0);
            }
            other => panic!("unexpected layer {other:?}"),
        }
    }

    #[test]
    fn test_tileset_lookup_uses_greatest_first_gid() {
        let map = Map::from_json(SAMPLE).unwrap();
        assert_eq!(map.tileset_for_gid(0), None);
        assert_eq!(map.tileset_for_gid(8).map(|t| t.name.as_str()), Some("Ground"));
        assert_eq!(map.tileset_for_gid(9).map(|t| t.name.as_str()), Some("Props"));
        // Flip flags do not change the owning tileset.
        assert_eq!(
            map.tileset_for_gid(9 | 0x8000_0000).map(|t| t.name.as_str()),
            Some("Props")
        );
    }

    #[test]
    fn test_source_rect_honours_margin_and_spacing() {
        let map = Map::from_json(SAMPLE).unwrap();
        let props = &map.tilesets[1];
        assert_eq!(props.source_rect(9), Rect::new(1.0, 1.0, 32.0, 32.0));
        assert_eq!(props.source_rect(10), Rect::new(35.0, 1.0, 32.0, 32.0));
        assert_eq!(props.source_rect(11), Rect::new(1.0, 35.0, 32.0, 32.0));
    }

    #[test]
    fn test_shape_kind_inference() {
        let map = Map::from_json(SAMPLE).unwrap();
        let kinds: Vec<_> = map.objects().map(MapObject::shape_kind).collect();
        assert_eq!(kinds, vec![ShapeKind::Rectangle, ShapeKind::Ellipse, ShapeKind::Polygon]);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Map::load("/definitely/not/a/map.json").unwrap_err();
        assert!(matches!(err, MapError::Io { .. }));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(Map::from_json("{ nope"), Err(MapError::Parse(_))));
    }
}
