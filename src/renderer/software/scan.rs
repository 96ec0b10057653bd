//! ---------------------------------------------------------------------------
//! Polygon scan conversion
//!
//! * `PerspectiveEquations` turn the camera-space plane and texture mapping
//!   into affine screen-space equations for `1/z`, `u/z` and `v/z`.
//! * `PolygonScanConverter::walk` steps two edge cursors down from the top
//!   vertex and emits one [`ScanlineSpan`] per covered row.
//! * `PolygonScanConverter::fill` splits a span into interpolation runs,
//!   divides exactly at run ends and lets a scanline routine draw each run.
//!
//! Sampling follows the pixel-centre rule: row `y` is covered when
//! `y + 0.5` lies in `[y_top, y_bottom)`, pixel `x` when `x + 0.5` lies in
//! `[x_left, x_right)`. Edge x is evaluated from the edge's upper endpoint,
//! so two polygons sharing an edge split its pixels exactly.
//! ---------------------------------------------------------------------------

use glam::{Vec2, Vec3};

use crate::{
    renderer::software::{
        clip::{ClipRect, ScanVertex, ScanVertices, signed_area},
        fixed::{Fixed16, InvDepth},
        routines::{ScanlineFn, SpanDest, SpanState},
    },
    world::{
        camera::Projection,
        polygon::{PlaneEquation, TextureMapping},
    },
};

/// Below this eye-to-plane distance the plane passes (almost) through the
/// eye and the polygon is drawn at its representative depth.
pub const SMALL_D: f32 = 0.01;

/// Vertices closer than this (in pixels, per axis) are merged.
pub const MERGE_EPSILON: f32 = 0.001;

/// Smallest `1/z` used as a divisor.
const MIN_INV_Z: f32 = 1e-6;

/// `value = m·(x − cx) + n·(y − cy) + o`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Affine {
    pub m: f32,
    pub n: f32,
    pub o: f32,
}

impl Affine {
    #[inline(always)]
    pub fn at(&self, d: Vec2) -> f32 {
        self.m * d.x + self.n * d.y + self.o
    }

    #[inline]
    fn scale(self, s: f32) -> Self {
        Affine {
            m: self.m * s,
            n: self.n * s,
            o: self.o * s,
        }
    }

    #[inline]
    fn sub(self, rhs: Affine) -> Self {
        Affine {
            m: self.m - rhs.m,
            n: self.n - rhs.n,
            o: self.o - rhs.o,
        }
    }
}

/// Screen-space equations of one polygon. Texture terms are in texels of
/// whatever bitmap the polygon is currently mapped onto.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveEquations {
    pub center: Vec2,
    pub inv_z: Affine,
    pub u_z: Affine,
    pub v_z: Affine,
}

impl PerspectiveEquations {
    /// Depth equation only; texture terms are zero.
    pub fn new(plane: &PlaneEquation, z_value: f32, projection: &Projection) -> Self {
        let d = plane.d;
        // the equations below are scale free, the distance test is not
        let len = plane.normal.length();
        let inv_z = if len <= f32::EPSILON || (d / len).abs() < SMALL_D {
            Affine {
                m: 0.0,
                n: 0.0,
                o: 1.0 / z_value.max(MIN_INV_Z),
            }
        } else {
            let k = -1.0 / (d * projection.aspect);
            Affine {
                m: plane.normal.x * k,
                n: plane.normal.y * k,
                o: -plane.normal.z / d,
            }
        };
        Self {
            center: projection.center,
            inv_z,
            u_z: Affine::default(),
            v_z: Affine::default(),
        }
    }

    /// Add texture terms for `mapping`, in base-level texels of a
    /// `size.x × size.y` bitmap.
    pub fn with_mapping(mut self, mapping: &TextureMapping, aspect: f32, size: Vec2) -> Self {
        let iz = self.inv_z;
        let row = |i: usize| -> Affine {
            let r = mapping.matrix.row(i);
            let c = r.dot(mapping.origin);
            Affine {
                m: r.x / aspect - c * iz.m,
                n: r.y / aspect - c * iz.n,
                o: r.z - c * iz.o,
            }
        };
        self.u_z = row(0).scale(size.x);
        self.v_z = row(1).scale(size.y);
        self
    }

    /// Move the texel origin to `(u0, v0)`.
    pub fn offset(mut self, u0: f32, v0: f32) -> Self {
        self.u_z = self.u_z.sub(self.inv_z.scale(u0));
        self.v_z = self.v_z.sub(self.inv_z.scale(v0));
        self
    }

    /// Texture terms for mip level `level` (each level halves the texels).
    pub fn at_level(mut self, level: usize) -> Self {
        let s = 1.0 / (1u32 << level) as f32;
        self.u_z = self.u_z.scale(s);
        self.v_z = self.v_z.scale(s);
        self
    }

    #[inline]
    pub fn inv_z_at(&self, p: Vec2) -> f32 {
        self.inv_z.at(p - self.center)
    }

    /// Perspective-correct texel coordinate at screen point `p`.
    #[inline]
    pub fn uv_at(&self, p: Vec2) -> Vec2 {
        let d = p - self.center;
        let iz = self.inv_z.at(d).max(MIN_INV_Z);
        Vec2::new(self.u_z.at(d) / iz, self.v_z.at(d) / iz)
    }

    /// Largest texel step per screen pixel at `p`.
    pub fn footprint(&self, p: Vec2) -> f32 {
        let d = p - self.center;
        let iz = self.inv_z.at(d).max(MIN_INV_Z);
        let u = self.u_z.at(d) / iz;
        let v = self.v_z.at(d) / iz;
        let du_dx = (self.u_z.m - u * self.inv_z.m) / iz;
        let du_dy = (self.u_z.n - u * self.inv_z.n) / iz;
        let dv_dx = (self.v_z.m - v * self.inv_z.m) / iz;
        let dv_dy = (self.v_z.n - v * self.inv_z.n) / iz;
        du_dx.abs().max(du_dy.abs()).max(dv_dx.abs()).max(dv_dy.abs())
    }
}

/// Mip level and the 0..=256 blend weight towards the next coarser level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MipChoice {
    pub level: usize,
    pub fraction: u32,
}

/// Pick the level whose texels best match one screen pixel, judged by the
/// sharpest vertex of the polygon.
pub fn select_mip(
    eq: &PerspectiveEquations,
    vertices: &[ScanVertex],
    level_count: usize,
    bias: f32,
) -> MipChoice {
    let footprint = vertices
        .iter()
        .map(|v| eq.footprint(v.pos))
        .fold(f32::INFINITY, f32::min);
    if !footprint.is_finite() || footprint <= 0.0 || level_count <= 1 {
        return MipChoice::default();
    }
    let lod = footprint.log2() + bias;
    if lod <= 0.0 {
        return MipChoice::default();
    }
    let max = (level_count - 1) as f32;
    if lod >= max {
        return MipChoice {
            level: level_count - 1,
            fraction: 0,
        };
    }
    MipChoice {
        level: lod.floor() as usize,
        fraction: (lod.fract() * 256.0) as u32,
    }
}

/// Drop vertices that coincide with their predecessor (wrapping around).
pub fn merge_vertices(vertices: &mut ScanVertices) {
    let close = |a: Vec2, b: Vec2| (a - b).abs().max_element() < MERGE_EPSILON;
    vertices.dedup_by(|b, a| close(a.pos, b.pos));
    while vertices.len() > 1 && close(vertices[0].pos, vertices[vertices.len() - 1].pos) {
        vertices.pop();
    }
}

/// One covered row, ready for a scanline routine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanlineSpan {
    pub y: i32,
    /// First covered pixel.
    pub x0: i32,
    /// One past the last covered pixel.
    pub x1: i32,
    /// Gouraud colour at the centre of `x0` and its per-pixel step.
    pub color: Vec3,
    pub dcolor: Vec3,
}

impl ScanlineSpan {
    #[inline]
    pub fn len(&self) -> usize {
        (self.x1 - self.x0).max(0) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0
    }

    /// Centre of the first pixel.
    #[inline]
    pub fn start(&self) -> Vec2 {
        Vec2::new(self.x0 as f32 + 0.5, self.y as f32 + 0.5)
    }
}

/// An edge walker. `dir` is +1 or −1 in vertex order.
struct EdgeCursor {
    dir: isize,
    /// Upper (current) and lower (next) vertex index.
    from: usize,
    to: usize,
    steps: usize,
}

impl EdgeCursor {
    fn new(top: usize, dir: isize, n: usize) -> Self {
        Self {
            dir,
            from: top,
            to: (top as isize + dir).rem_euclid(n as isize) as usize,
            steps: 1,
        }
    }

    /// Move to the edge spanning row centre `yc`. `false` once the outline
    /// is exhausted.
    fn seek(&mut self, v: &[ScanVertex], yc: f32) -> bool {
        let n = v.len();
        while v[self.to].pos.y <= yc {
            if self.steps >= n {
                return false;
            }
            self.from = self.to;
            self.to = (self.to as isize + self.dir).rem_euclid(n as isize) as usize;
            self.steps += 1;
        }
        true
    }

    /// Position and colour at row centre `yc`, interpolated from the edge's
    /// upper endpoint regardless of walking direction.
    fn at(&self, v: &[ScanVertex], yc: f32) -> (f32, Vec3) {
        let (a, b) = (v[self.from], v[self.to]);
        let (top, bot) = if a.pos.y <= b.pos.y { (a, b) } else { (b, a) };
        let dy = bot.pos.y - top.pos.y;
        if dy <= 0.0 {
            return (top.pos.x, top.color);
        }
        let t = (yc - top.pos.y) / dy;
        let x = top.pos.x + (yc - top.pos.y) * ((bot.pos.x - top.pos.x) / dy);
        (x, top.color.lerp(bot.color, t))
    }
}

/// Walks polygons and fills spans inside `bounds`.
#[derive(Clone, Copy, Debug)]
pub struct PolygonScanConverter {
    pub bounds: ClipRect,
    /// Interpolation run length chosen for the current polygon.
    pub run: usize,
}

impl PolygonScanConverter {
    pub fn new(bounds: ClipRect, run: usize) -> Self {
        Self {
            bounds,
            run: run.max(1),
        }
    }

    /// Emit every covered row of the convex outline `v`, top to bottom.
    /// Returns the number of non-empty spans.
    pub fn walk<F>(&self, v: &[ScanVertex], mut emit: F) -> usize
    where
        F: FnMut(&ScanlineSpan),
    {
        let n = v.len();
        if n < 3 || self.bounds.is_empty() {
            return 0;
        }
        let area = signed_area(v.iter().map(|p| p.pos));
        if area == 0.0 || !area.is_finite() {
            return 0;
        }

        let (mut top, mut y_min, mut y_max) = (0, v[0].pos.y, v[0].pos.y);
        for (i, p) in v.iter().enumerate().skip(1) {
            if p.pos.y < y_min || (p.pos.y == y_min && p.pos.x < v[top].pos.x) {
                top = i;
                y_min = p.pos.y;
            }
            y_max = y_max.max(p.pos.y);
        }

        // Clockwise on screen: walking forward from the top goes right.
        let (fwd, back) = (EdgeCursor::new(top, 1, n), EdgeCursor::new(top, -1, n));
        let (mut left, mut right) = if area > 0.0 { (back, fwd) } else { (fwd, back) };

        let row0 = ((y_min - 0.5).ceil() as i32).max(self.bounds.y0);
        let row1 = ((y_max - 0.5).ceil() as i32).min(self.bounds.y1);

        let mut emitted = 0;
        for y in row0..row1 {
            let yc = y as f32 + 0.5;
            if !left.seek(v, yc) || !right.seek(v, yc) {
                break;
            }
            let (xl, cl) = left.at(v, yc);
            let (xr, cr) = right.at(v, yc);

            let x0 = ((xl - 0.5).ceil() as i32).max(self.bounds.x0);
            let x1 = ((xr - 0.5).ceil() as i32).min(self.bounds.x1);
            if x0 >= x1 {
                continue;
            }

            let width = xr - xl;
            let dcolor = if width > MERGE_EPSILON {
                (cr - cl) / width
            } else {
                Vec3::ZERO
            };
            let span = ScanlineSpan {
                y,
                x0,
                x1,
                color: cl + dcolor * (x0 as f32 + 0.5 - xl),
                dcolor,
            };
            emit(&span);
            emitted += 1;
        }
        emitted
    }

    /// Draw `span` with `routine` into one row of colour and depth.
    ///
    /// `color_row` and `depth_row` start at screen x = 0. Texture
    /// coordinates are divided exactly every `self.run` pixels and
    /// interpolated linearly in between; `1/z` is reseeded at every run.
    #[allow(clippy::too_many_arguments)]
    pub fn fill(
        &self,
        span: &ScanlineSpan,
        eq: &PerspectiveEquations,
        textured: bool,
        routine: ScanlineFn,
        bytes_per_pixel: usize,
        color_row: &mut [u8],
        depth_row: &mut [u32],
        st: &mut SpanState<'_>,
    ) {
        let count = span.len();
        if count == 0 {
            return;
        }
        for c in 0..3 {
            st.color[c] = Fixed16::from_f32(span.color[c]);
            st.dcolor[c] = Fixed16::from_f32(span.dcolor[c]);
        }
        st.dz = InvDepth::delta(eq.inv_z.m);

        let run = if textured { self.run } else { count };
        let mut x = span.x0 as usize;
        let mut left = count;
        let mut p = span.start();
        while left > 0 {
            let n = run.min(left);
            st.z = InvDepth::from_inv_z(eq.inv_z_at(p).max(0.0));
            if textured {
                let a = eq.uv_at(p);
                let b = eq.uv_at(p + Vec2::new(n as f32, 0.0));
                let d = (b - a) / n as f32;
                st.u = Fixed16::from_f32(a.x);
                st.v = Fixed16::from_f32(a.y);
                st.du = Fixed16::from_f32(d.x);
                st.dv = Fixed16::from_f32(d.y);
            }
            let dest = SpanDest {
                color: &mut color_row[x * bytes_per_pixel..(x + n) * bytes_per_pixel],
                depth: &mut depth_row[x..x + n],
            };
            routine(n, dest, st);
            x += n;
            left -= n;
            p.x += n as f32;
        }
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat3, vec2};

    fn verts(points: &[Vec2]) -> ScanVertices {
        points
            .iter()
            .map(|&pos| ScanVertex {
                pos,
                color: Vec3::ZERO,
            })
            .collect()
    }

    fn covered(conv: &PolygonScanConverter, v: &[ScanVertex]) -> Vec<(i32, i32)> {
        let mut px = Vec::new();
        conv.walk(v, |s| {
            for x in s.x0..s.x1 {
                px.push((x, s.y));
            }
        });
        px
    }

    /// Brute force: every pixel centre inside all edges (half-open).
    fn reference_count(points: &[Vec2], w: i32, h: i32) -> usize {
        let area = signed_area(points.iter().copied());
        let mut count = 0;
        for y in 0..h {
            for x in 0..w {
                let c = vec2(x as f32 + 0.5, y as f32 + 0.5);
                let inside = (0..points.len()).all(|i| {
                    let a = points[i];
                    let b = points[(i + 1) % points.len()];
                    (b - a).perp_dot(c - a) * area.signum() > 0.0
                });
                count += inside as usize;
            }
        }
        count
    }

    #[test]
    fn square_covers_pixel_centres() {
        let conv = PolygonScanConverter::new(ClipRect::full(64, 64), 16);
        let sq = verts(&[vec2(10.0, 10.0), vec2(50.0, 10.0), vec2(50.0, 50.0), vec2(10.0, 50.0)]);
        let px = covered(&conv, &sq);
        assert_eq!(px.len(), 40 * 40);
        assert_eq!(px.first(), Some(&(10, 10)));
        assert_eq!(px.last(), Some(&(49, 49)));
    }

    #[test]
    fn winding_does_not_matter() {
        let conv = PolygonScanConverter::new(ClipRect::full(64, 64), 16);
        let cw = [vec2(3.2, 1.7), vec2(40.1, 12.9), vec2(12.4, 33.3)];
        let ccw = [cw[2], cw[1], cw[0]];
        assert_eq!(covered(&conv, &verts(&cw)), covered(&conv, &verts(&ccw)));
    }

    #[test]
    fn coverage_matches_reference() {
        let conv = PolygonScanConverter::new(ClipRect::full(80, 80), 8);
        let shapes: [&[Vec2]; 4] = [
            &[vec2(3.2, 1.7), vec2(40.1, 12.9), vec2(12.4, 33.3)],
            &[vec2(60.0, 5.5), vec2(75.3, 40.0), vec2(30.0, 70.25), vec2(8.8, 30.1)],
            &[vec2(0.5, 0.5), vec2(79.5, 0.7), vec2(40.0, 79.0)],
            &[vec2(10.0, 10.0), vec2(20.0, 10.0), vec2(20.0, 11.0)],
        ];
        for s in shapes {
            let got = covered(&conv, &verts(s)).len() as i64;
            let want = reference_count(s, 80, 80) as i64;
            let perimeter_rows = 2 * (s.iter().map(|p| p.y).fold(0.0, f32::max) as i64 + 1);
            assert!(
                (got - want).abs() <= perimeter_rows,
                "{got} vs reference {want}"
            );
        }
    }

    #[test]
    fn shared_edge_has_no_gap_or_overlap() {
        let conv = PolygonScanConverter::new(ClipRect::full(64, 64), 16);
        let a = vec2(5.3, 2.1);
        let b = vec2(58.7, 9.4);
        let c = vec2(50.2, 60.6);
        let d = vec2(2.2, 40.9);
        let t1 = covered(&conv, &verts(&[a, b, c]));
        let t2 = covered(&conv, &verts(&[a, c, d]));
        let whole = covered(&conv, &verts(&[a, b, c, d]));

        let mut both = t1.clone();
        both.extend_from_slice(&t2);
        both.sort_unstable();
        let before = both.len();
        both.dedup();
        assert_eq!(before, both.len(), "seam pixel drawn twice");

        let mut whole = whole;
        whole.sort_unstable();
        assert_eq!(both, whole, "seam left a gap");
    }

    #[test]
    fn bounds_clip_rows_and_columns() {
        let conv = PolygonScanConverter::new(ClipRect::new(20, 15, 30, 18), 16);
        let sq = verts(&[vec2(10.0, 10.0), vec2(50.0, 10.0), vec2(50.0, 50.0), vec2(10.0, 50.0)]);
        assert_eq!(covered(&conv, &sq).len(), 10 * 3);
    }

    #[test]
    fn degenerate_outlines_emit_nothing() {
        let conv = PolygonScanConverter::new(ClipRect::full(64, 64), 16);
        let line = verts(&[vec2(1.0, 1.0), vec2(10.0, 10.0), vec2(20.0, 20.0)]);
        assert_eq!(conv.walk(&line, |_| {}), 0);
        let two = verts(&[vec2(1.0, 1.0), vec2(10.0, 10.0)]);
        assert_eq!(conv.walk(&two, |_| {}), 0);
    }

    #[test]
    fn merge_drops_near_duplicates_including_wrap() {
        let mut v = verts(&[
            vec2(0.0, 0.0),
            vec2(0.0005, 0.0),
            vec2(10.0, 0.0),
            vec2(10.0, 10.0),
            vec2(0.0, 0.0002),
        ]);
        merge_vertices(&mut v);
        assert_eq!(v.len(), 3);
    }

    #[test]
    fn gouraud_colour_follows_edges() {
        let conv = PolygonScanConverter::new(ClipRect::full(64, 64), 16);
        let mut v = verts(&[vec2(0.0, 0.0), vec2(40.0, 0.0), vec2(40.0, 40.0), vec2(0.0, 40.0)]);
        v[1].color = Vec3::new(200.0, 0.0, 0.0);
        v[2].color = Vec3::new(200.0, 0.0, 0.0);
        conv.walk(&v, |s| {
            assert!((s.dcolor.x - 5.0).abs() < 1e-3);
            assert!((s.color.x - 2.5).abs() < 1e-3);
        });
    }

    #[test]
    fn plane_depth_and_texture_equations() {
        let proj = Projection::new(Vec2::ZERO, 40.0);
        let plane = PlaneEquation::new(0.0, 0.0, 1.0, -2.0);
        let map = TextureMapping::new(Mat3::IDENTITY, Vec3::new(0.25, 0.25, 0.0));
        let eq = PerspectiveEquations::new(&plane, 2.0, &proj).with_mapping(
            &map,
            40.0,
            Vec2::splat(64.0),
        );

        assert!((eq.inv_z_at(vec2(13.0, 7.0)) - 0.5).abs() < 1e-6);
        // screen (20, 20) at z = 2 is camera (1, 1)
        let uv = eq.uv_at(vec2(20.0, 20.0));
        assert!((uv - Vec2::splat(0.75 * 64.0)).length() < 1e-3);
        let off = eq.offset(16.0, 8.0).uv_at(vec2(20.0, 20.0));
        assert!((off - vec2(48.0 - 16.0, 48.0 - 8.0)).length() < 1e-3);
        let mip1 = eq.at_level(1).uv_at(vec2(20.0, 20.0));
        assert!((mip1 - Vec2::splat(24.0)).length() < 1e-3);
    }

    #[test]
    fn plane_through_eye_uses_representative_depth() {
        let proj = Projection::new(Vec2::ZERO, 40.0);
        let plane = PlaneEquation::new(1.0, 0.0, 0.0, 0.001);
        let eq = PerspectiveEquations::new(&plane, 4.0, &proj);
        assert_eq!(eq.inv_z.m, 0.0);
        assert!((eq.inv_z_at(vec2(100.0, -3.0)) - 0.25).abs() < 1e-6);

        // scaled planes are judged by distance, not by raw D
        let scaled = PlaneEquation::new(0.0, 0.0, 1000.0, -5.0);
        let eq = PerspectiveEquations::new(&scaled, 4.0, &proj);
        assert!((eq.inv_z_at(Vec2::ZERO) - 0.25).abs() < 1e-6);
        let degenerate = PlaneEquation::new(0.0, 0.0, 0.0, -1.0);
        let eq = PerspectiveEquations::new(&degenerate, 2.0, &proj);
        assert!((eq.inv_z_at(Vec2::ZERO) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn small_tilted_plane_keeps_its_slope() {
        // 5 cm patch one unit away, leaning back along x; unnormalised plane
        let proj = Projection::new(vec2(400.0, 300.0), 400.0);
        let a = Vec3::new(0.0, 0.0, 1.0);
        let n = Vec3::new(0.05, 0.0, 0.05).cross(Vec3::new(0.0, 0.05, 0.0));
        let plane = PlaneEquation::new(n.x, n.y, n.z, -n.dot(a));
        assert!(plane.d.abs() < SMALL_D);

        let eq = PerspectiveEquations::new(&plane, 1.025, &proj);
        assert!(eq.inv_z.m < 0.0);
        let left = proj.project(a).unwrap();
        let right = proj.project(Vec3::new(0.05, 0.0, 1.05)).unwrap();
        assert!((eq.inv_z_at(left) - 1.0).abs() < 1e-3);
        assert!((eq.inv_z_at(right) - 1.0 / 1.05).abs() < 1e-3);
    }

    #[test]
    fn mip_choice_grows_with_distance() {
        let proj = Projection::new(Vec2::ZERO, 40.0);
        let map = TextureMapping::new(Mat3::IDENTITY, Vec3::ZERO);
        let v = verts(&[vec2(1.0, 1.0), vec2(5.0, 1.0), vec2(5.0, 5.0)]);
        let pick = |z: f32| {
            let plane = PlaneEquation::new(0.0, 0.0, 1.0, -z);
            let eq = PerspectiveEquations::new(&plane, z, &proj)
                .with_mapping(&map, 40.0, Vec2::splat(64.0));
            select_mip(&eq, &v, 4, 0.0)
        };
        // 64 texels per unit, 40 px per unit at z = 1 → 1.6 texels/px
        assert_eq!(pick(1.0).level, 0);
        assert_eq!(pick(3.0).level, 2);
        assert_eq!(pick(100.0), MipChoice { level: 3, fraction: 0 });
    }

    #[test]
    fn fill_runs_consume_the_whole_span() {
        use crate::renderer::software::{
            pixel::PixelFormat,
            routines::{Blend, RoutineKey, Sampling, ScanlineRoutineTable, Shading},
            zbuffer::ZMode,
        };
        let table = ScanlineRoutineTable::build(PixelFormat::Xrgb8888, true);
        let routine = table
            .lookup(&RoutineKey {
                format: PixelFormat::Xrgb8888,
                zmode: ZMode::Fill,
                sampling: Sampling::Flat,
                blend: Blend::Copy,
                shading: Shading::Flat,
                alpha_mask: false,
            })
            .unwrap();
        let proj = Projection::new(Vec2::ZERO, 40.0);
        let eq = PerspectiveEquations::new(&PlaneEquation::new(0.0, 0.0, 1.0, -1.0), 1.0, &proj);
        let conv = PolygonScanConverter::new(ClipRect::full(100, 1), 8);
        let span = ScanlineSpan {
            y: 0,
            x0: 3,
            x1: 40,
            color: Vec3::ZERO,
            dcolor: Vec3::ZERO,
        };
        let mut color = vec![0u8; 400];
        let mut depth = vec![0u32; 100];
        let mut st = SpanState::flat(0x00AB_CDEF);
        conv.fill(&span, &eq, true, routine, 4, &mut color, &mut depth, &mut st);
        let one = InvDepth::from_inv_z(1.0).0;
        assert!(depth[3..40].iter().all(|&z| z == one));
        assert_eq!(depth[2], 0);
        assert_eq!(depth[40], 0);
    }
}
