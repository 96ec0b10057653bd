//! Destination pixel formats and RGB compositing helpers.
//!
//! Colours travel through the pipeline as [`Rgba`] (`0x00RRGGBB`) and are
//! packed into the surface's native format only when written. The two
//! supported formats are modelled as zero-sized [`PixelOps`] strategies so
//! scanline loops can be monomorphised per format.

use crate::renderer::{RasterError, Rgba};

/// Native layout of one frame-buffer pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 16-bit 5:6:5.
    Rgb565,
    /// 32-bit, top byte unused.
    Xrgb8888,
}

impl PixelFormat {
    /// Negotiate a format from a colour depth in bits.
    pub fn from_depth(bits: u32) -> Result<Self, RasterError> {
        match bits {
            16 => Ok(PixelFormat::Rgb565),
            32 => Ok(PixelFormat::Xrgb8888),
            other => Err(RasterError::UnsupportedDepth(other)),
        }
    }

    #[inline(always)]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Xrgb8888 => 4,
        }
    }

    pub const fn depth(self) -> u32 {
        match self {
            PixelFormat::Rgb565 => 16,
            PixelFormat::Xrgb8888 => 32,
        }
    }

    /// Read pixel `i` of a row as `0x00RRGGBB`.
    pub fn load(self, row: &[u8], i: usize) -> Rgba {
        match self {
            PixelFormat::Rgb565 => Px16::unpack(Px16::load_raw(row, i)),
            PixelFormat::Xrgb8888 => Px32::unpack(Px32::load_raw(row, i)),
        }
    }

    /// Write `0x00RRGGBB` into pixel `i` of a row.
    pub fn store(self, row: &mut [u8], i: usize, c: Rgba) {
        match self {
            PixelFormat::Rgb565 => Px16::store_raw(row, i, Px16::pack(c)),
            PixelFormat::Xrgb8888 => Px32::store_raw(row, i, Px32::pack(c)),
        }
    }
}

/// Compile-time pixel format used by the inner loops.
pub trait PixelOps {
    const FORMAT: PixelFormat;
    const BYTES: usize;
    /// Mask clearing the low bit of every channel, for the 50 % shortcut.
    const HALF_MASK: u32;

    fn load_raw(row: &[u8], i: usize) -> u32;
    fn store_raw(row: &mut [u8], i: usize, raw: u32);
    fn pack(c: Rgba) -> u32;
    fn unpack(raw: u32) -> Rgba;

    /// Average two native pixels without unpacking them.
    #[inline(always)]
    fn half_blend(a: u32, b: u32) -> u32 {
        ((a & Self::HALF_MASK) >> 1) + ((b & Self::HALF_MASK) >> 1)
    }
}

/// 16-bit 5:6:5 pixels.
pub struct Px16;

/// 32-bit x:8:8:8 pixels.
pub struct Px32;

impl PixelOps for Px16 {
    const FORMAT: PixelFormat = PixelFormat::Rgb565;
    const BYTES: usize = 2;
    const HALF_MASK: u32 = 0xF7DE;

    #[inline(always)]
    fn load_raw(row: &[u8], i: usize) -> u32 {
        let o = i * 2;
        u16::from_ne_bytes([row[o], row[o + 1]]) as u32
    }

    #[inline(always)]
    fn store_raw(row: &mut [u8], i: usize, raw: u32) {
        let o = i * 2;
        row[o..o + 2].copy_from_slice(&(raw as u16).to_ne_bytes());
    }

    #[inline(always)]
    fn pack(c: Rgba) -> u32 {
        let r = (c >> 19) & 0x1F;
        let g = (c >> 10) & 0x3F;
        let b = (c >> 3) & 0x1F;
        (r << 11) | (g << 5) | b
    }

    #[inline(always)]
    fn unpack(raw: u32) -> Rgba {
        let r = (raw >> 11) & 0x1F;
        let g = (raw >> 5) & 0x3F;
        let b = raw & 0x1F;
        join((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
    }
}

impl PixelOps for Px32 {
    const FORMAT: PixelFormat = PixelFormat::Xrgb8888;
    const BYTES: usize = 4;
    const HALF_MASK: u32 = 0x00FE_FEFE;

    #[inline(always)]
    fn load_raw(row: &[u8], i: usize) -> u32 {
        let o = i * 4;
        u32::from_ne_bytes([row[o], row[o + 1], row[o + 2], row[o + 3]])
    }

    #[inline(always)]
    fn store_raw(row: &mut [u8], i: usize, raw: u32) {
        let o = i * 4;
        row[o..o + 4].copy_from_slice(&raw.to_ne_bytes());
    }

    #[inline(always)]
    fn pack(c: Rgba) -> u32 {
        c & 0x00FF_FFFF
    }

    #[inline(always)]
    fn unpack(raw: u32) -> Rgba {
        raw & 0x00FF_FFFF
    }
}

/*──────────────────────── RGB channel helpers ───────────────────────*/

#[inline(always)]
pub fn split(c: Rgba) -> (u32, u32, u32) {
    ((c >> 16) & 0xFF, (c >> 8) & 0xFF, c & 0xFF)
}

#[inline(always)]
pub fn join(r: u32, g: u32, b: u32) -> Rgba {
    (r.min(255) << 16) | (g.min(255) << 8) | b.min(255)
}

#[inline(always)]
pub fn add_saturate(a: Rgba, b: Rgba) -> Rgba {
    let (ar, ag, ab) = split(a);
    let (br, bg, bb) = split(b);
    join(ar + br, ag + bg, ab + bb)
}

/// `a * b / 256` per channel; `doubled` gives the ×2 variant.
#[inline(always)]
pub fn multiply(a: Rgba, b: Rgba, doubled: bool) -> Rgba {
    let (ar, ag, ab) = split(a);
    let (br, bg, bb) = split(b);
    let s = if doubled { 7 } else { 8 };
    join((ar * br) >> s, (ag * bg) >> s, (ab * bb) >> s)
}

/// Move `dst` towards `src` by `w / 256`. `w == 0` returns `dst` unchanged,
/// `w == 256` returns `src`.
#[inline(always)]
pub fn lerp(dst: Rgba, src: Rgba, w: u32) -> Rgba {
    let (dr, dg, db) = split(dst);
    let (sr, sg, sb) = split(src);
    let mix = |d: u32, s: u32| -> u32 {
        (d as i32 + (((s as i32 - d as i32) * w as i32) >> 8)) as u32
    };
    join(mix(dr, sr), mix(dg, sg), mix(db, sb))
}

/// Scale every channel of `c` by `light / 255` (per channel).
#[inline(always)]
pub fn modulate(c: Rgba, light: (u32, u32, u32)) -> Rgba {
    let (r, g, b) = split(c);
    join(
        (r * light.0 + 127) / 255,
        (g * light.1 + 127) / 255,
        (b * light.2 + 127) / 255,
    )
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_negotiation() {
        assert_eq!(PixelFormat::from_depth(16).unwrap(), PixelFormat::Rgb565);
        assert_eq!(PixelFormat::from_depth(32).unwrap(), PixelFormat::Xrgb8888);
        assert!(matches!(
            PixelFormat::from_depth(24),
            Err(RasterError::UnsupportedDepth(24))
        ));
    }

    #[test]
    fn rgb565_keeps_primaries() {
        for c in [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0x00FF_FFFF, 0] {
            assert_eq!(Px16::unpack(Px16::pack(c)), c, "colour {c:06X}");
        }
    }

    #[test]
    fn half_blend_matches_average() {
        let a = Px32::pack(0x00FF_8000);
        let b = Px32::pack(0x0001_0080);
        assert_eq!(Px32::unpack(Px32::half_blend(a, b)), 0x007F_4040);
    }

    #[test]
    fn lerp_endpoints_are_exact() {
        let d = 0x0012_3456;
        let s = 0x00AB_CDEF;
        assert_eq!(lerp(d, s, 0), d);
        assert_eq!(lerp(d, s, 256), s);
    }

    #[test]
    fn blend_helpers() {
        assert_eq!(add_saturate(0x00F0_1010, 0x0020_2020), 0x00FF_3030);
        assert_eq!(multiply(0x00FF_FFFF, 0x0080_8080, false), 0x007F_7F7F);
        assert_eq!(multiply(0x0080_8080, 0x0080_8080, true), 0x0080_8080);
        assert_eq!(modulate(0x00FF_FFFF, (255, 0, 128)), 0x00FF_0080);
    }
}
