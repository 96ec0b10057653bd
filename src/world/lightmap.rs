//! Per-polygon lightmaps.
//!
//! A lightmap is a coarse RGB grid laid over a polygon's texture region:
//! one lumel covers `1 << LUMEL_SHIFT` base-level texels in each direction.
//! Channel value 255 means "full brightness".

/// log2 of the number of base-level texels per lumel.
pub const LUMEL_SHIFT: u32 = 4;

/// Inclusive-exclusive lumel rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LumelRect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lightmap {
    w: usize,
    h: usize,
    lumels: Vec<[u8; 3]>,
}

impl Lightmap {
    /// Lightmap of `w*h` lumels, every lumel set to `fill`.
    pub fn new(w: usize, h: usize, fill: [u8; 3]) -> Self {
        let w = w.max(1);
        let h = h.max(1);
        Self {
            w,
            h,
            lumels: vec![fill; w * h],
        }
    }

    /// Lightmap sized to cover `tex_w × tex_h` base-level texels.
    pub fn covering(tex_w: usize, tex_h: usize, fill: [u8; 3]) -> Self {
        let lumels = |t: usize| (t + (1 << LUMEL_SHIFT) - 1) >> LUMEL_SHIFT;
        Self::new(lumels(tex_w) + 1, lumels(tex_h) + 1, fill)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.w
    }
    #[inline]
    pub fn height(&self) -> usize {
        self.h
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        self.lumels[y * self.w + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        self.lumels[y * self.w + x] = rgb;
    }

    /// Overwrite a rectangle, clipped to the map. Returns the touched area so
    /// the caller can hand it to the composite cache.
    pub fn fill_rect(&mut self, rect: LumelRect, rgb: [u8; 3]) -> LumelRect {
        let x1 = (rect.x + rect.w).min(self.w);
        let y1 = (rect.y + rect.h).min(self.h);
        let x0 = rect.x.min(x1);
        let y0 = rect.y.min(y1);
        for y in y0..y1 {
            for x in x0..x1 {
                self.set(x, y, rgb);
            }
        }
        LumelRect {
            x: x0,
            y: y0,
            w: x1 - x0,
            h: y1 - y0,
        }
    }

    /// Bilinear light at base-level texel `(tx, ty)` of the covered region.
    pub fn sample(&self, tx: usize, ty: usize) -> (u32, u32, u32) {
        let size = 1usize << LUMEL_SHIFT;
        let lx = (tx >> LUMEL_SHIFT).min(self.w - 1);
        let ly = (ty >> LUMEL_SHIFT).min(self.h - 1);
        let fx = (tx & (size - 1)) as u32;
        let fy = (ty & (size - 1)) as u32;
        let lx1 = (lx + 1).min(self.w - 1);
        let ly1 = (ly + 1).min(self.h - 1);

        let a = self.get(lx, ly);
        let b = self.get(lx1, ly);
        let c = self.get(lx, ly1);
        let d = self.get(lx1, ly1);
        let s = size as u32;
        let ch = |i: usize| -> u32 {
            let top = a[i] as u32 * (s - fx) + b[i] as u32 * fx;
            let bot = c[i] as u32 * (s - fx) + d[i] as u32 * fx;
            (top * (s - fy) + bot * fy) / (s * s)
        };
        (ch(0), ch(1), ch(2))
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
