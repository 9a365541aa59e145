use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::Vec2;
use log::{debug, warn};

use crate::render::{Color, Rect, Sprite, SpriteBatch, TextureHandle};

/// A texture known to the cache. Pixel data stays with the rendering
/// backend; the cache only tracks identity, source path and size.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub handle: TextureHandle,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn center(&self) -> Vec2 {
        self.size() * 0.5
    }
}

/// Per-draw parameters for [`TextureCache::draw`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawParams {
    pub position: Vec2,
    pub source: Option<Rect>,
    pub tint: Color,
    pub rotation: f32,
    /// Texture centre when `None`.
    pub origin: Option<Vec2>,
    pub scale: Vec2,
    pub depth: f32,
}

impl Default for DrawParams {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            source: None,
            tint: Color::WHITE,
            rotation: 0.0,
            origin: None,
            scale: Vec2::ONE,
            depth: 0.0,
        }
    }
}

impl DrawParams {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_source(mut self, source: Rect) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_tint(mut self, tint: Color) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }
}

/// Textures keyed by string id, rooted at a content directory.
pub struct TextureCache {
    root: PathBuf,
    textures: HashMap<String, Texture>,
    next_handle: u32,
}

impl TextureCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            textures: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load `asset` (relative to the content root, `.png` assumed when no
    /// extension is given) under `id`. Failures are logged and reported as
    /// `false`; an id that is already cached is kept as is.
    pub fn load(&mut self, asset: &str, id: &str) -> bool {
        if self.textures.contains_key(id) {
            debug!("texture '{id}' already loaded");
            return true;
        }

        let mut path = self.root.join(asset);
        if path.extension().is_none() {
            path.set_extension("png");
        }

        match image::image_dimensions(&path) {
            Ok((width, height)) => {
                self.insert_texture(id, path, width, height);
                true
            }
            Err(err) => {
                warn!("failed to load texture '{asset}' from {}: {err}", path.display());
                false
            }
        }
    }

    /// Register a texture whose pixels were produced elsewhere.
    pub fn insert(&mut self, id: &str, width: u32, height: u32) -> TextureHandle {
        self.insert_texture(id, PathBuf::new(), width, height)
    }

    pub fn get(&self, id: &str) -> Option<&Texture> {
        self.textures.get(id)
    }

    /// Reverse lookup used by backends that upload pixels lazily.
    pub fn by_handle(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures.values().find(|t| t.handle == handle)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.textures.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Draw texture `id`. Unknown ids are skipped without a draw call.
    pub fn draw(&self, batch: &mut dyn SpriteBatch, id: &str, params: DrawParams) {
        let Some(texture) = self.textures.get(id) else {
            return;
        };

        batch.draw_sprite(&Sprite {
            texture: texture.handle,
            position: params.position,
            source: params.source,
            tint: params.tint,
            rotation: params.rotation,
            origin: params.origin.unwrap_or_else(|| texture.center()),
            scale: params.scale,
            depth: params.depth,
        });
    }

    /// Clear all cached textures (they will be reloaded on next access).
    pub fn clear(&mut self) {
        debug!("releasing {} cached textures", self.textures.len());
        self.textures.clear();
    }

    fn insert_texture(&mut self, id: &str, path: PathBuf, width: u32, height: u32) -> TextureHandle {
        let handle = TextureHandle(self.next_handle);
        self.next_handle += 1;
        self.textures.insert(
            id.to_string(),
            Texture {
                handle,
                path,
                width,
                height,
            },
        );
        handle
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new("content")
    }
}
