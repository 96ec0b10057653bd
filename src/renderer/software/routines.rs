//! ---------------------------------------------------------------------------
//! Scanline routine table
//!
//! Every combination of pixel format, Z-mode, sampling, blend, shading and
//! alpha masking gets its own monomorphised copy of one generic inner loop,
//! [`scan`]. The copies are collected into a map once per pixel format, so
//! drawing is a single hash lookup per polygon followed by direct calls.
//!
//! Combinations without a routine (bilinear + key colour, or masks on
//! untextured polygons) are simply absent: `lookup` returns `None` and the polygon is not drawn.
//! ---------------------------------------------------------------------------

use std::{collections::HashMap, marker::PhantomData};

use crate::renderer::{
    Rgba,
    software::{
        fixed::{Fixed16, InvDepth},
        pixel::{self, PixelFormat, PixelOps, Px16, Px32},
        zbuffer::ZMode,
    },
};

/*───────────────────────────── table key ─────────────────────────────*/

/// Where the source colour comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sampling {
    /// Constant polygon colour (or interpolated vertex colour).
    Flat,
    /// Nearest texel.
    Nearest,
    /// 2×2 bilinear; trilinear when a detail level is supplied.
    Bilinear,
}

impl Sampling {
    pub const ALL: [Sampling; 3] = [Sampling::Flat, Sampling::Nearest, Sampling::Bilinear];
}

/// How the source colour is combined with the frame buffer.
///
/// The alpha variants name how much of the *destination* shows through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Blend {
    Copy,
    Add,
    Multiply,
    Multiply2,
    AlphaQuarter,
    AlphaHalf,
    AlphaThreeQuarter,
    /// Copy, except texels equal to the key colour.
    KeyTransparent,
}

impl Blend {
    pub const ALL: [Blend; 8] = [
        Blend::Copy,
        Blend::Add,
        Blend::Multiply,
        Blend::Multiply2,
        Blend::AlphaQuarter,
        Blend::AlphaHalf,
        Blend::AlphaThreeQuarter,
        Blend::KeyTransparent,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shading {
    Flat,
    Gouraud,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RoutineKey {
    pub format: PixelFormat,
    pub zmode: ZMode,
    pub sampling: Sampling,
    pub blend: Blend,
    pub shading: Shading,
    pub alpha_mask: bool,
}

/*──────────────────────── interpolation state ────────────────────────*/

/// Read-only view of one texture level as the inner loops see it.
#[derive(Clone, Copy, Debug)]
pub struct TexelSource<'a> {
    pub texels: &'a [Rgba],
    pub alpha: Option<&'a [u8]>,
    pub width: usize,
    pub height: usize,
    /// Repeat outside the bitmap; otherwise clamp to the border.
    pub tiled: bool,
}

impl<'a> TexelSource<'a> {
    #[inline(always)]
    fn wrap(&self, c: i32, size: usize) -> usize {
        if self.tiled {
            c.rem_euclid(size as i32) as usize
        } else {
            c.clamp(0, size as i32 - 1) as usize
        }
    }

    #[inline(always)]
    fn index(&self, u: Fixed16, v: Fixed16) -> usize {
        self.wrap(v.floor(), self.height) * self.width + self.wrap(u.floor(), self.width)
    }

    /// Nearest texel and its opacity.
    #[inline(always)]
    pub fn fetch(&self, u: Fixed16, v: Fixed16) -> (Rgba, u8) {
        let i = self.index(u, v);
        (self.texels[i], self.alpha.map_or(255, |a| a[i]))
    }

    /// Bilinear sample; `u`,`v` address texel corners, so the sample point is
    /// shifted by half a texel.
    pub fn fetch_bilinear(&self, u: Fixed16, v: Fixed16) -> Rgba {
        let u = u - Fixed16::HALF;
        let v = v - Fixed16::HALF;
        let x0 = self.wrap(u.floor(), self.width);
        let x1 = self.wrap(u.floor() + 1, self.width);
        let y0 = self.wrap(v.floor(), self.height);
        let y1 = self.wrap(v.floor() + 1, self.height);
        let fx = u.frac8();
        let fy = v.frac8();

        let row0 = y0 * self.width;
        let row1 = y1 * self.width;
        let top = pixel::lerp(self.texels[row0 + x0], self.texels[row0 + x1], fx);
        let bot = pixel::lerp(self.texels[row1 + x0], self.texels[row1 + x1], fx);
        pixel::lerp(top, bot, fy)
    }
}

/// Per-span interpolation state, advanced one pixel at a time by the routines.
///
/// The scan converter reloads `z`, `u`, `v` and their deltas at the start of
/// every interpolation span; `color` runs on across spans.
#[derive(Clone, Copy, Debug)]
pub struct SpanState<'a> {
    pub z: InvDepth,
    pub dz: i32,
    pub u: Fixed16,
    pub v: Fixed16,
    pub du: Fixed16,
    pub dv: Fixed16,
    /// Gouraud RGB, 16.16 in `0..=255`.
    pub color: [Fixed16; 3],
    pub dcolor: [Fixed16; 3],
    pub flat: Rgba,
    pub key: Rgba,
    pub texture: Option<TexelSource<'a>>,
    /// Next coarser level and its 0..=256 weight for trilinear filtering.
    pub detail: Option<(TexelSource<'a>, u32)>,
}

impl<'a> SpanState<'a> {
    pub fn flat(color: Rgba) -> Self {
        Self {
            z: InvDepth::FAR,
            dz: 0,
            u: Fixed16::ZERO,
            v: Fixed16::ZERO,
            du: Fixed16::ZERO,
            dv: Fixed16::ZERO,
            color: [Fixed16::ZERO; 3],
            dcolor: [Fixed16::ZERO; 3],
            flat: color,
            key: 0,
            texture: None,
            detail: None,
        }
    }

    #[inline(always)]
    fn advance(&mut self) {
        self.z = self.z.step(self.dz);
        self.u += self.du;
        self.v += self.dv;
        for c in 0..3 {
            self.color[c] += self.dcolor[c];
        }
    }

    #[inline(always)]
    fn gouraud(&self) -> Rgba {
        let ch = |f: Fixed16| f.floor().clamp(0, 255) as u32;
        pixel::join(ch(self.color[0]), ch(self.color[1]), ch(self.color[2]))
    }
}

/// The part of a scanline a routine writes: `count` pixels of colour and the
/// matching Z cells.
pub struct SpanDest<'a> {
    pub color: &'a mut [u8],
    pub depth: &'a mut [u32],
}

/// `(count, destination, interpolation state)`.
pub type ScanlineFn = fn(usize, SpanDest<'_>, &mut SpanState<'_>);

/*──────────────────────────── strategies ─────────────────────────────*/

trait DepthOp {
    fn test(cell: u32, z: u32) -> bool;
    fn commit(cell: &mut u32, z: u32);
}

struct ZNone;
struct ZFill;
struct ZTest;
struct ZUse;

impl DepthOp for ZNone {
    #[inline(always)]
    fn test(_: u32, _: u32) -> bool {
        true
    }
    #[inline(always)]
    fn commit(_: &mut u32, _: u32) {}
}

impl DepthOp for ZFill {
    #[inline(always)]
    fn test(_: u32, _: u32) -> bool {
        true
    }
    #[inline(always)]
    fn commit(cell: &mut u32, z: u32) {
        *cell = z;
    }
}

impl DepthOp for ZTest {
    #[inline(always)]
    fn test(cell: u32, z: u32) -> bool {
        z >= cell
    }
    #[inline(always)]
    fn commit(_: &mut u32, _: u32) {}
}

impl DepthOp for ZUse {
    #[inline(always)]
    fn test(cell: u32, z: u32) -> bool {
        z >= cell
    }
    #[inline(always)]
    fn commit(cell: &mut u32, z: u32) {
        *cell = z;
    }
}

/// Produces the source colour and opacity of the current pixel.
///
/// `texel` is the raw value the key colour is compared against; `shade`
/// applies vertex lighting afterwards.
trait Sampler {
    fn texel(st: &SpanState<'_>) -> (Rgba, u8);
    #[inline(always)]
    fn shade(_: &SpanState<'_>, texel: Rgba) -> Rgba {
        texel
    }
}

struct FlatColor;
struct GouraudColor;
struct Nearest;
struct Bilinear;
/// Texture sampler modulated by the interpolated vertex colour.
struct Lit<S>(PhantomData<S>);

impl Sampler for FlatColor {
    #[inline(always)]
    fn texel(st: &SpanState<'_>) -> (Rgba, u8) {
        (st.flat, 255)
    }
}

impl Sampler for GouraudColor {
    #[inline(always)]
    fn texel(st: &SpanState<'_>) -> (Rgba, u8) {
        (st.gouraud(), 255)
    }
}

impl Sampler for Nearest {
    #[inline(always)]
    fn texel(st: &SpanState<'_>) -> (Rgba, u8) {
        match &st.texture {
            Some(t) => t.fetch(st.u, st.v),
            None => (st.flat, 255),
        }
    }
}

impl Sampler for Bilinear {
    #[inline(always)]
    fn texel(st: &SpanState<'_>) -> (Rgba, u8) {
        let Some(t) = &st.texture else {
            return (st.flat, 255);
        };
        let near = t.fetch_bilinear(st.u, st.v);
        match &st.detail {
            Some((coarse, w)) => {
                let far = coarse.fetch_bilinear(st.u.half(), st.v.half());
                (pixel::lerp(near, far, *w), 255)
            }
            None => (near, 255),
        }
    }
}

impl<S: Sampler> Sampler for Lit<S> {
    #[inline(always)]
    fn texel(st: &SpanState<'_>) -> (Rgba, u8) {
        S::texel(st)
    }
    #[inline(always)]
    fn shade(st: &SpanState<'_>, texel: Rgba) -> Rgba {
        let (r, g, b) = pixel::split(st.gouraud());
        pixel::modulate(texel, (r, g, b))
    }
}

/// Combines a source colour with the native destination pixel.
trait BlendOp {
    const READS_DST: bool;
    const KEYED: bool = false;
    fn blend<P: PixelOps>(dst: u32, src: Rgba) -> u32;
}

struct CopyOp;
struct KeyedCopy;
struct AddOp;
struct MulOp<const DOUBLED: bool>;
/// Source weight in 1/256.
struct AlphaOp<const SRC: u32>;
struct HalfShortcut;

impl BlendOp for CopyOp {
    const READS_DST: bool = false;
    #[inline(always)]
    fn blend<P: PixelOps>(_: u32, src: Rgba) -> u32 {
        P::pack(src)
    }
}

impl BlendOp for KeyedCopy {
    const READS_DST: bool = false;
    const KEYED: bool = true;
    #[inline(always)]
    fn blend<P: PixelOps>(_: u32, src: Rgba) -> u32 {
        P::pack(src)
    }
}

impl BlendOp for AddOp {
    const READS_DST: bool = true;
    #[inline(always)]
    fn blend<P: PixelOps>(dst: u32, src: Rgba) -> u32 {
        P::pack(pixel::add_saturate(P::unpack(dst), src))
    }
}

impl<const DOUBLED: bool> BlendOp for MulOp<DOUBLED> {
    const READS_DST: bool = true;
    #[inline(always)]
    fn blend<P: PixelOps>(dst: u32, src: Rgba) -> u32 {
        P::pack(pixel::multiply(P::unpack(dst), src, DOUBLED))
    }
}

impl<const SRC: u32> BlendOp for AlphaOp<SRC> {
    const READS_DST: bool = true;
    #[inline(always)]
    fn blend<P: PixelOps>(dst: u32, src: Rgba) -> u32 {
        P::pack(pixel::lerp(P::unpack(dst), src, SRC))
    }
}

impl BlendOp for HalfShortcut {
    const READS_DST: bool = true;
    #[inline(always)]
    fn blend<P: PixelOps>(dst: u32, src: Rgba) -> u32 {
        P::half_blend(dst, P::pack(src))
    }
}

/// Per-texel opacity handling.
trait Mask {
    const ENABLED: bool;
}
struct NoMask;
struct AlphaMask;
impl Mask for NoMask {
    const ENABLED: bool = false;
}
impl Mask for AlphaMask {
    const ENABLED: bool = true;
}

/*──────────────────────────── inner loop ─────────────────────────────*/

fn scan<P: PixelOps, Z: DepthOp, S: Sampler, B: BlendOp, M: Mask>(
    count: usize,
    dest: SpanDest<'_>,
    st: &mut SpanState<'_>,
) {
    let SpanDest { color, depth } = dest;
    debug_assert!(color.len() >= count * P::BYTES && depth.len() >= count);

    for (i, cell) in depth.iter_mut().enumerate().take(count) {
        let z = st.z.0;
        if Z::test(*cell, z) {
            let (texel, alpha) = S::texel(st);
            let visible = !(B::KEYED && texel == st.key) && !(M::ENABLED && alpha == 0);
            if visible {
                let src = S::shade(st, texel);
                let dst = if B::READS_DST || M::ENABLED {
                    P::load_raw(color, i)
                } else {
                    0
                };
                let mut out = B::blend::<P>(dst, src);
                if M::ENABLED && alpha != 255 {
                    out = P::pack(pixel::lerp(P::unpack(dst), P::unpack(out), alpha as u32));
                }
                P::store_raw(color, i, out);
                Z::commit(cell, z);
            }
        }
        st.advance();
    }
}

/*───────────────────────────── the table ─────────────────────────────*/

pub struct ScanlineRoutineTable {
    format: PixelFormat,
    half_blend_shortcut: bool,
    routines: HashMap<RoutineKey, ScanlineFn>,
}

impl ScanlineRoutineTable {
    /// Instantiate every implemented routine for `format`.
    pub fn build(format: PixelFormat, half_blend_shortcut: bool) -> Self {
        let mut routines = HashMap::new();
        for zmode in ZMode::ALL {
            for sampling in Sampling::ALL {
                for blend in Blend::ALL {
                    for shading in [Shading::Flat, Shading::Gouraud] {
                        for alpha_mask in [false, true] {
                            let key = RoutineKey {
                                format,
                                zmode,
                                sampling,
                                blend,
                                shading,
                                alpha_mask,
                            };
                            if let Some(f) = instantiate(key, half_blend_shortcut) {
                                routines.insert(key, f);
                            }
                        }
                    }
                }
            }
        }
        log::debug!(
            "routine table: {} routines for {:?} (half-blend shortcut: {})",
            routines.len(),
            format,
            half_blend_shortcut
        );
        Self {
            format,
            half_blend_shortcut,
            routines,
        }
    }

    #[inline]
    pub fn lookup(&self, key: &RoutineKey) -> Option<ScanlineFn> {
        self.routines.get(key).copied()
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn half_blend_shortcut(&self) -> bool {
        self.half_blend_shortcut
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}

fn instantiate(key: RoutineKey, shortcut: bool) -> Option<ScanlineFn> {
    match key.format {
        PixelFormat::Rgb565 => with_pixel::<Px16>(key, shortcut),
        PixelFormat::Xrgb8888 => with_pixel::<Px32>(key, shortcut),
    }
}

fn with_pixel<P: PixelOps>(key: RoutineKey, shortcut: bool) -> Option<ScanlineFn> {
    match key.zmode {
        ZMode::None => with_depth::<P, ZNone>(key, shortcut),
        ZMode::Fill => with_depth::<P, ZFill>(key, shortcut),
        ZMode::Test => with_depth::<P, ZTest>(key, shortcut),
        ZMode::Use => with_depth::<P, ZUse>(key, shortcut),
    }
}

fn with_depth<P: PixelOps, Z: DepthOp>(key: RoutineKey, shortcut: bool) -> Option<ScanlineFn> {
    use Sampling as S;
    use Shading as H;

    match (key.sampling, key.shading) {
        // untextured polygons have no texels to mask
        (S::Flat, _) if key.alpha_mask => None,
        (S::Flat, H::Flat) => with_blend::<P, Z, FlatColor, NoMask>(key.blend, shortcut, false),
        (S::Flat, H::Gouraud) => {
            with_blend::<P, Z, GouraudColor, NoMask>(key.blend, shortcut, false)
        }
        (S::Nearest, H::Flat) => with_mask::<P, Z, Nearest>(key, shortcut),
        (S::Nearest, H::Gouraud) => with_mask::<P, Z, Lit<Nearest>>(key, shortcut),
        // masked and keyed texels are never filtered
        (S::Bilinear, _) if key.alpha_mask => None,
        (S::Bilinear, H::Flat) => with_blend::<P, Z, Bilinear, NoMask>(key.blend, shortcut, false),
        (S::Bilinear, H::Gouraud) => {
            with_blend::<P, Z, Lit<Bilinear>, NoMask>(key.blend, shortcut, false)
        }
    }
}

fn with_mask<P: PixelOps, Z: DepthOp, S: Sampler>(
    key: RoutineKey,
    shortcut: bool,
) -> Option<ScanlineFn> {
    if key.alpha_mask {
        with_blend::<P, Z, S, AlphaMask>(key.blend, shortcut, true)
    } else {
        with_blend::<P, Z, S, NoMask>(key.blend, shortcut, true)
    }
}

fn with_blend<P: PixelOps, Z: DepthOp, S: Sampler, M: Mask>(
    blend: Blend,
    shortcut: bool,
    keyed: bool,
) -> Option<ScanlineFn> {
    Some(match blend {
        Blend::Copy => scan::<P, Z, S, CopyOp, M> as ScanlineFn,
        Blend::Add => scan::<P, Z, S, AddOp, M> as ScanlineFn,
        Blend::Multiply => scan::<P, Z, S, MulOp<false>, M> as ScanlineFn,
        Blend::Multiply2 => scan::<P, Z, S, MulOp<true>, M> as ScanlineFn,
        Blend::AlphaQuarter => scan::<P, Z, S, AlphaOp<192>, M> as ScanlineFn,
        Blend::AlphaHalf if shortcut => scan::<P, Z, S, HalfShortcut, M> as ScanlineFn,
        Blend::AlphaHalf => scan::<P, Z, S, AlphaOp<128>, M> as ScanlineFn,
        Blend::AlphaThreeQuarter => scan::<P, Z, S, AlphaOp<64>, M> as ScanlineFn,
        Blend::KeyTransparent if keyed => scan::<P, Z, S, KeyedCopy, M> as ScanlineFn,
        Blend::KeyTransparent => return None,
    })
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
mod tests {
    use super::*;

    fn key(zmode: ZMode, sampling: Sampling, blend: Blend) -> RoutineKey {
        RoutineKey {
            format: PixelFormat::Xrgb8888,
            zmode,
            sampling,
            blend,
            shading: Shading::Flat,
            alpha_mask: false,
        }
    }

    fn run(
        table: &ScanlineRoutineTable,
        k: RoutineKey,
        color: &mut [u8],
        depth: &mut [u32],
        st: &mut SpanState<'_>,
    ) {
        let f = table.lookup(&k).expect("routine must exist");
        let n = depth.len();
        f(n, SpanDest { color, depth }, st);
    }

    fn px(buf: &[u8], i: usize) -> Rgba {
        Px32::unpack(Px32::load_raw(buf, i))
    }

    #[test]
    fn unimplemented_combinations_are_absent() {
        let table = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, true);
        assert!(table.lookup(&key(ZMode::Use, Sampling::Bilinear, Blend::KeyTransparent)).is_none());
        assert!(table.lookup(&key(ZMode::Use, Sampling::Flat, Blend::KeyTransparent)).is_none());
        let mut masked_flat = key(ZMode::Use, Sampling::Flat, Blend::Copy);
        masked_flat.alpha_mask = true;
        assert!(table.lookup(&masked_flat).is_none());
        assert!(table.lookup(&key(ZMode::Fill, Sampling::Nearest, Blend::Add)).is_some());
        assert_eq!(table.format(), PixelFormat::Xrgb8888);
    }

    #[test]
    fn textured_combinations_are_all_present() {
        let table = ScanlineRoutineTable::build(PixelFormat::Rgb565, true);
        for zmode in ZMode::ALL {
            for blend in Blend::ALL {
                for shading in [Shading::Flat, Shading::Gouraud] {
                    for alpha_mask in [false, true] {
                        let mut k = key(zmode, Sampling::Nearest, blend);
                        k.format = PixelFormat::Rgb565;
                        k.shading = shading;
                        k.alpha_mask = alpha_mask;
                        assert!(table.lookup(&k).is_some(), "{k:?}");
                        if blend != Blend::KeyTransparent && !alpha_mask {
                            k.sampling = Sampling::Bilinear;
                            assert!(table.lookup(&k).is_some(), "{k:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn key_test_sees_the_unshaded_texel() {
        let table = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, true);
        let texels = [0x0000_00FF, 0x00FF_FFFF];
        let mut st = SpanState::flat(0);
        st.key = 0x0000_00FF;
        st.texture = Some(TexelSource {
            texels: &texels,
            alpha: None,
            width: 2,
            height: 1,
            tiled: false,
        });
        st.du = Fixed16::ONE;
        st.color = [Fixed16::from_int(128); 3];
        let mut k = key(ZMode::None, Sampling::Nearest, Blend::KeyTransparent);
        k.shading = Shading::Gouraud;
        let mut color = vec![0u8; 8];
        let mut depth = vec![0u32; 2];
        run(&table, k, &mut color, &mut depth, &mut st);
        assert_eq!(px(&color, 0), 0, "key texel skipped after shading");
        assert_eq!(px(&color, 1), 0x0080_8080);
    }

    #[test]
    fn alpha_mask_combines_with_add() {
        let table = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, true);
        let texels = [0x0010_1010; 2];
        let alpha = [0u8, 255];
        let mut st = SpanState::flat(0);
        st.texture = Some(TexelSource {
            texels: &texels,
            alpha: Some(&alpha),
            width: 2,
            height: 1,
            tiled: false,
        });
        st.du = Fixed16::ONE;
        let mut k = key(ZMode::None, Sampling::Nearest, Blend::Add);
        k.alpha_mask = true;
        let mut color = vec![0u8; 8];
        Px32::store_raw(&mut color, 0, 0x0020_2020);
        Px32::store_raw(&mut color, 1, 0x0020_2020);
        let mut depth = vec![0u32; 2];
        run(&table, k, &mut color, &mut depth, &mut st);
        assert_eq!(px(&color, 0), 0x0020_2020);
        assert_eq!(px(&color, 1), 0x0030_3030);
    }

    #[test]
    fn both_formats_have_the_same_routine_set() {
        let a = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, true);
        let b = ScanlineRoutineTable::build(PixelFormat::Rgb565, false);
        assert_eq!(a.len(), b.len());
        assert!(!a.is_empty());
    }

    #[test]
    fn fill_writes_color_and_depth() {
        let table = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, true);
        let mut color = vec![0u8; 4 * 4];
        let mut depth = vec![0u32; 4];
        let mut st = SpanState::flat(0x0011_2233);
        st.z = InvDepth(100);
        st.dz = 10;
        run(&table, key(ZMode::Fill, Sampling::Flat, Blend::Copy), &mut color, &mut depth, &mut st);

        assert_eq!(depth, vec![100, 110, 120, 130]);
        assert!((0..4).all(|i| px(&color, i) == 0x0011_2233));
        assert_eq!(st.z, InvDepth(140), "state advanced by count pixels");
    }

    #[test]
    fn use_mode_only_draws_nearer_pixels() {
        let table = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, true);
        let mut color = vec![0u8; 4 * 3];
        let mut depth = vec![50u32, 500, 50];
        let mut st = SpanState::flat(0x00FF_FFFF);
        st.z = InvDepth(100);
        run(&table, key(ZMode::Use, Sampling::Flat, Blend::Copy), &mut color, &mut depth, &mut st);

        assert_eq!(depth, vec![100, 500, 100]);
        assert_eq!(px(&color, 0), 0x00FF_FFFF);
        assert_eq!(px(&color, 1), 0, "occluded pixel untouched");
    }

    #[test]
    fn test_mode_keeps_depth() {
        let table = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, true);
        let mut color = vec![0u8; 4];
        let mut depth = vec![10u32];
        let mut st = SpanState::flat(0x0000_00FF);
        st.z = InvDepth(20);
        run(&table, key(ZMode::Test, Sampling::Flat, Blend::Copy), &mut color, &mut depth, &mut st);
        assert_eq!(depth, vec![10]);
        assert_eq!(px(&color, 0), 0x0000_00FF);
    }

    #[test]
    fn key_colour_texels_are_skipped() {
        let table = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, true);
        let texels = [0x00FF_00FF, 0x0012_3456];
        let mut st = SpanState::flat(0);
        st.key = 0x00FF_00FF;
        st.texture = Some(TexelSource {
            texels: &texels,
            alpha: None,
            width: 2,
            height: 1,
            tiled: true,
        });
        st.du = Fixed16::ONE;
        let mut color = vec![0u8; 8];
        let mut depth = vec![0u32; 2];
        st.z = InvDepth(7);
        run(
            &table,
            key(ZMode::Fill, Sampling::Nearest, Blend::KeyTransparent),
            &mut color,
            &mut depth,
            &mut st,
        );
        assert_eq!(px(&color, 0), 0);
        assert_eq!(depth[0], 0, "transparent texel writes no depth");
        assert_eq!(px(&color, 1), 0x0012_3456);
    }

    #[test]
    fn clamped_and_tiled_addressing() {
        let texels = [1, 2, 3, 4];
        let mut src = TexelSource {
            texels: &texels,
            alpha: None,
            width: 2,
            height: 2,
            tiled: false,
        };
        assert_eq!(src.fetch(Fixed16::from_int(5), Fixed16::from_int(-3)).0, 2);
        src.tiled = true;
        assert_eq!(src.fetch(Fixed16::from_int(-1), Fixed16::from_int(3)).0, 4);
    }

    #[test]
    fn blends_against_destination() {
        let table = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, false);
        let run_blend = |blend: Blend, dst: Rgba, src: Rgba| -> Rgba {
            let mut color = vec![0u8; 4];
            Px32::store_raw(&mut color, 0, dst);
            let mut depth = vec![0u32];
            let mut st = SpanState::flat(src);
            run(&table, key(ZMode::None, Sampling::Flat, blend), &mut color, &mut depth, &mut st);
            px(&color, 0)
        };
        assert_eq!(run_blend(Blend::Add, 0x0010_1010, 0x0001_0203), 0x0011_1213);
        assert_eq!(run_blend(Blend::AlphaHalf, 0, 0x0080_8080), 0x0040_4040);
        assert_eq!(run_blend(Blend::AlphaQuarter, 0, 0x0080_8080), 0x0060_6060);
        assert_eq!(run_blend(Blend::AlphaThreeQuarter, 0, 0x0080_8080), 0x0020_2020);
        assert_eq!(run_blend(Blend::Multiply, 0x0080_8080, 0x00FF_FFFF), 0x007F_7F7F);
    }

    #[test]
    fn alpha_mask_blends_by_texel_opacity() {
        let table = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, true);
        let texels = [0x00FF_FFFF; 3];
        let alpha = [0u8, 128, 255];
        let mut st = SpanState::flat(0);
        st.texture = Some(TexelSource {
            texels: &texels,
            alpha: Some(&alpha),
            width: 3,
            height: 1,
            tiled: false,
        });
        st.du = Fixed16::ONE;
        let mut k = key(ZMode::None, Sampling::Nearest, Blend::Copy);
        k.alpha_mask = true;
        let mut color = vec![0u8; 12];
        let mut depth = vec![0u32; 3];
        run(&table, k, &mut color, &mut depth, &mut st);
        assert_eq!(px(&color, 0), 0);
        assert_eq!(px(&color, 1), 0x0080_8080);
        assert_eq!(px(&color, 2), 0x00FF_FFFF);
    }

    #[test]
    fn gouraud_interpolates_across_span() {
        let table = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, true);
        let mut st = SpanState::flat(0);
        st.color = [Fixed16::ZERO; 3];
        st.dcolor = [Fixed16::from_int(100), Fixed16::ZERO, Fixed16::ZERO];
        let mut k = key(ZMode::None, Sampling::Flat, Blend::Copy);
        k.shading = Shading::Gouraud;
        let mut color = vec![0u8; 12];
        let mut depth = vec![0u32; 3];
        run(&table, k, &mut color, &mut depth, &mut st);
        assert_eq!(px(&color, 0), 0);
        assert_eq!(px(&color, 1), 0x0064_0000);
        assert_eq!(px(&color, 2), 0x00C8_0000);
    }
}
