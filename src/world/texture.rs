//! Decoded material bitmaps and their mip chains.
//!
//! Polygons refer to textures by [`TextureId`]; the rasterizer resolves the
//! id through a [`TextureBank`] once per polygon.

use std::collections::HashMap;

use crate::renderer::Rgba;

/// Index of a texture inside its [`TextureBank`].
pub type TextureId = u16;

/// Slot of the checkerboard drawn for unknown ids.
pub const NO_TEXTURE: TextureId = 0;

/// One level of a mip chain: `0x00RRGGBB` texels in row-major order plus
/// an optional per-texel opacity (255 = opaque).
#[derive(Clone, Debug, PartialEq)]
pub struct MipLevel {
    pub w: usize,
    pub h: usize,
    pub pixels: Vec<Rgba>,
    pub alpha: Option<Vec<u8>>,
}

impl MipLevel {
    #[inline]
    pub fn texel(&self, x: usize, y: usize) -> Rgba {
        self.pixels[y * self.w + x]
    }

    /// Box-filter down to half size (never below 1×1).
    fn downsample(&self) -> MipLevel {
        let w = (self.w / 2).max(1);
        let h = (self.h / 2).max(1);
        let mut pixels = Vec::with_capacity(w * h);
        let mut alpha = self.alpha.as_ref().map(|_| Vec::with_capacity(w * h));

        for y in 0..h {
            for x in 0..w {
                let (mut r, mut g, mut b, mut a) = (0u32, 0u32, 0u32, 0u32);
                let sx = [(x * 2).min(self.w - 1), (x * 2 + 1).min(self.w - 1)];
                let sy = [(y * 2).min(self.h - 1), (y * 2 + 1).min(self.h - 1)];
                for &yy in &sy {
                    for &xx in &sx {
                        let c = self.texel(xx, yy);
                        r += (c >> 16) & 0xFF;
                        g += (c >> 8) & 0xFF;
                        b += c & 0xFF;
                        if let Some(src) = &self.alpha {
                            a += src[yy * self.w + xx] as u32;
                        }
                    }
                }
                pixels.push(((r / 4) << 16) | ((g / 4) << 8) | (b / 4));
                if let Some(dst) = alpha.as_mut() {
                    dst.push((a / 4) as u8);
                }
            }
        }
        MipLevel { w, h, pixels, alpha }
    }
}

/// A material bitmap with its mip chain.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    levels: Vec<MipLevel>,
    /// Texel value drawn as fully transparent by key-colour polygons.
    pub key_color: Option<Rgba>,
    mean: Rgba,
}

impl Default for Texture {
    /// 8×8 grey checker with a four-level mip chain.
    fn default() -> Self {
        let pixels = (0..64)
            .map(|i| {
                let (x, y) = (i % 8, i / 8);
                if (x + y) % 2 == 0 { 0x00C0_C0C0 } else { 0x0040_4040 }
            })
            .collect();
        let mut tex = Texture::from_level(
            "CHECKER",
            MipLevel {
                w: 8,
                h: 8,
                pixels,
                alpha: None,
            },
        );
        tex.build_mipmaps(4);
        tex
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextureError {
    #[error("a texture named `{0}` is already registered")]
    Duplicate(String),

    #[error("no texture with id {0}")]
    BadId(TextureId),

    /// Texel or alpha buffer length disagrees with `w * h`.
    #[error("texture `{name}`: expected {expected} texels, got {got}")]
    BadSize {
        name: String,
        expected: usize,
        got: usize,
    },
}

impl Texture {
    /// Create a single-level texture from `w*h` texels.
    pub fn new<S: Into<String>>(
        name: S,
        w: usize,
        h: usize,
        pixels: Vec<Rgba>,
    ) -> Result<Self, TextureError> {
        let name = name.into();
        if w == 0 || h == 0 || pixels.len() != w * h {
            return Err(TextureError::BadSize {
                name,
                expected: w * h,
                got: pixels.len(),
            });
        }
        Ok(Self::from_level(
            name,
            MipLevel {
                w,
                h,
                pixels,
                alpha: None,
            },
        ))
    }

    fn from_level<S: Into<String>>(name: S, level: MipLevel) -> Self {
        let mut tex = Self {
            name: name.into(),
            levels: vec![level],
            key_color: None,
            mean: 0,
        };
        tex.mean = tex.compute_mean();
        tex
    }

    /// Attach a per-texel opacity mask to the base level.
    pub fn with_alpha(mut self, alpha: Vec<u8>) -> Result<Self, TextureError> {
        let expected = self.levels[0].w * self.levels[0].h;
        if alpha.len() != expected {
            return Err(TextureError::BadSize {
                name: self.name,
                expected,
                got: alpha.len(),
            });
        }
        self.levels.truncate(1);
        self.levels[0].alpha = Some(alpha);
        Ok(self)
    }

    pub fn with_key_color(mut self, key: Rgba) -> Self {
        self.key_color = Some(key);
        self
    }

    /// Regenerate the mip chain below the base level, `count` levels total.
    pub fn build_mipmaps(&mut self, count: usize) {
        self.levels.truncate(1);
        while self.levels.len() < count.max(1) {
            let last = &self.levels[self.levels.len() - 1];
            if last.w == 1 && last.h == 1 {
                break;
            }
            let next = last.downsample();
            self.levels.push(next);
        }
    }

    /// Level `i`, clamped to the coarsest one available.
    #[inline]
    pub fn level(&self, i: usize) -> &MipLevel {
        &self.levels[i.min(self.levels.len() - 1)]
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.levels[0].w
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.levels[0].h
    }

    /// Average colour of the base level, used when a polygon has no mapping.
    #[inline]
    pub fn mean_color(&self) -> Rgba {
        self.mean
    }

    #[inline]
    pub fn has_alpha(&self) -> bool {
        self.levels[0].alpha.is_some()
    }

    fn compute_mean(&self) -> Rgba {
        let base = &self.levels[0];
        let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
        for &c in &base.pixels {
            r += ((c >> 16) & 0xFF) as u64;
            g += ((c >> 8) & 0xFF) as u64;
            b += (c & 0xFF) as u64;
        }
        let n = base.pixels.len().max(1) as u64;
        (((r / n) << 16) | ((g / n) << 8) | (b / n)) as Rgba
    }
}

/// Name-keyed store of textures. Slot [`NO_TEXTURE`] always holds the
/// fallback drawn for ids that do not resolve.
pub struct TextureBank {
    names: HashMap<String, TextureId>,
    textures: Vec<Texture>,
}

impl TextureBank {
    /// Bank holding only `fallback`, registered as `"MISSING"`.
    pub fn new(fallback: Texture) -> Self {
        Self {
            names: HashMap::from([("MISSING".to_string(), NO_TEXTURE)]),
            textures: vec![fallback],
        }
    }

    pub fn default_with_checker() -> Self {
        Self::new(Texture::default())
    }

    /// Registered textures, fallback included.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// True while only the fallback is present.
    pub fn is_empty(&self) -> bool {
        self.textures.len() <= 1
    }

    pub fn lookup(&self, name: &str) -> Option<TextureId> {
        self.names.get(name).copied()
    }

    pub fn get(&self, id: TextureId) -> Result<&Texture, TextureError> {
        self.textures
            .get(usize::from(id))
            .ok_or(TextureError::BadId(id))
    }

    /// Like [`get`](Self::get) but never fails: bad ids draw the fallback.
    pub fn texture_or_missing(&self, id: TextureId) -> &Texture {
        self.textures
            .get(usize::from(id))
            .unwrap_or(&self.textures[usize::from(NO_TEXTURE)])
    }

    pub fn get_mut(&mut self, id: TextureId) -> Result<&mut Texture, TextureError> {
        self.textures
            .get_mut(usize::from(id))
            .ok_or(TextureError::BadId(id))
    }

    /// Register `tex` under `name` and return its id. Names are unique.
    pub fn insert<S: Into<String>>(&mut self, name: S, tex: Texture) -> Result<TextureId, TextureError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(TextureError::Duplicate(name));
        }
        let id = self.textures.len() as TextureId;
        self.names.insert(name, id);
        self.textures.push(tex);
        Ok(id)
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
