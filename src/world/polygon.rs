use bitflags::bitflags;
use glam::{Mat3, Vec2, Vec3};
use smallvec::SmallVec;

use crate::{
    renderer::{Rgba, software::routines::Blend},
    world::{camera::Projection, lightmap::Lightmap, texture::TextureId},
};

/// Caller-chosen identity of a polygon-texture (texture + lightmap pairing).
pub type PolyTextureKey = u32;

/// Inline capacity of polygon vertex lists.
pub const INLINE_VERTS: usize = 8;

pub type VertexList = SmallVec<[Vec2; INLINE_VERTS]>;

bitflags! {
    /// How a polygon is combined with what is already on screen.
    ///
    /// The low byte carries the transparency used by `ALPHA`
    /// (0 = opaque, 255 = invisible).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MixMode: u32 {
        const ALPHA_MASK  = 0x0000_00FF;
        const MULTIPLY    = 0x0000_0100;
        const MULTIPLY2   = 0x0000_0200;
        const ADD         = 0x0000_0400;
        const ALPHA       = 0x0000_0800;
        // Polygon is not drawn at all.
        const TRANSPARENT = 0x0000_1000;
        // Texels equal to the texture's key colour are skipped.
        const KEYCOLOR    = 0x0000_2000;
        // Use per-vertex colours when Gouraud shading is enabled.
        const GOURAUD     = 0x0000_4000;
        // Texture repeats outside 0..1; otherwise coordinates clamp.
        const TILING      = 0x0000_8000;
    }
}

impl MixMode {
    /// Plain overwrite.
    pub const COPY: MixMode = MixMode::empty();

    /// Alpha blend with the given transparency.
    pub fn alpha(transparency: u8) -> Self {
        MixMode::ALPHA | MixMode::from_bits_retain(transparency as u32)
    }

    #[inline]
    pub fn transparency(self) -> u8 {
        (self.bits() & MixMode::ALPHA_MASK.bits()) as u8
    }

    /// Blend style of the scanline routine, `None` if nothing is drawn.
    ///
    /// Transparency is quantised to quarters; near-opaque becomes a plain
    /// copy and near-invisible is dropped.
    pub fn blend(self) -> Option<Blend> {
        if self.contains(MixMode::TRANSPARENT) {
            return None;
        }
        if self.contains(MixMode::ADD) {
            return Some(Blend::Add);
        }
        if self.contains(MixMode::MULTIPLY2) {
            return Some(Blend::Multiply2);
        }
        if self.contains(MixMode::MULTIPLY) {
            return Some(Blend::Multiply);
        }
        if self.contains(MixMode::ALPHA) {
            return match self.transparency() {
                0..32 => Some(Blend::Copy),
                32..96 => Some(Blend::AlphaQuarter),
                96..160 => Some(Blend::AlphaHalf),
                160..224 => Some(Blend::AlphaThreeQuarter),
                _ => None,
            };
        }
        if self.contains(MixMode::KEYCOLOR) {
            return Some(Blend::KeyTransparent);
        }
        Some(Blend::Copy)
    }
}

/// Camera-space plane `normal · P + d = 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneEquation {
    pub normal: Vec3,
    pub d: f32,
}

impl PlaneEquation {
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self {
            normal: Vec3::new(a, b, c),
            d,
        }
    }

    /// Plane through three points (orientation follows the winding).
    ///
    /// The normal is unit length unless the points are collinear, so `d` is
    /// the signed distance of the eye from the plane.
    pub fn from_points(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        let normal = (p1 - p0).cross(p2 - p0).normalize_or_zero();
        Self {
            normal,
            d: -normal.dot(p0),
        }
    }
}

/// Camera space → texture space: `uv = matrix * (P - origin)`.
///
/// Texture space is normalised: 1.0 spans the whole base-level texture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureMapping {
    pub matrix: Mat3,
    pub origin: Vec3,
}

impl TextureMapping {
    pub fn new(matrix: Mat3, origin: Vec3) -> Self {
        Self { matrix, origin }
    }

    /// Texture coordinate of a camera-space point (`z` is unused).
    pub fn apply(&self, p: Vec3) -> Vec3 {
        self.matrix * (p - self.origin)
    }
}

/// A texture paired with a lightmap over a base-level texel region.
///
/// The composited bitmap of this pair covers `width × height` texels starting
/// at `(u_min, v_min)`; the base texture tiles inside it.
#[derive(Clone, Debug)]
pub struct PolyTexture {
    pub key: PolyTextureKey,
    pub texture: TextureId,
    pub lightmap: Lightmap,
    pub u_min: i32,
    pub v_min: i32,
    pub width: usize,
    pub height: usize,
}

impl PolyTexture {
    /// Region of `width × height` texels with a fresh, fully lit lightmap.
    pub fn new(
        key: PolyTextureKey,
        texture: TextureId,
        u_min: i32,
        v_min: i32,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            key,
            texture,
            lightmap: Lightmap::covering(width, height, [255; 3]),
            u_min,
            v_min,
            width: width.max(1),
            height: height.max(1),
        }
    }
}

/// One convex, already clipped polygon in screen space.
#[derive(Clone, Debug)]
pub struct ProjectedPolygon<'a> {
    pub vertices: VertexList,
    /// Per-vertex RGB (0..=255 per channel) for Gouraud shading.
    pub colors: Option<SmallVec<[Vec3; INLINE_VERTS]>>,
    pub plane: PlaneEquation,
    /// Representative depth used when the plane passes through the eye.
    pub z_value: f32,
    pub mapping: Option<TextureMapping>,
    pub texture: Option<TextureId>,
    pub lighting: Option<&'a PolyTexture>,
    pub flat_color: Rgba,
    pub mix: MixMode,
}

impl<'a> ProjectedPolygon<'a> {
    /// Flat white polygon; refine with the builder methods.
    pub fn new(vertices: &[Vec2], plane: PlaneEquation, z_value: f32) -> Self {
        Self {
            vertices: SmallVec::from_slice(vertices),
            colors: None,
            plane,
            z_value,
            mapping: None,
            texture: None,
            lighting: None,
            flat_color: 0x00FF_FFFF,
            mix: MixMode::COPY,
        }
    }

    /// Project camera-space points. Returns `None` if any point is at or
    /// behind the eye or fewer than three points are given.
    pub fn from_camera_space(points: &[Vec3], projection: &Projection) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let mut vertices = VertexList::new();
        for &p in points {
            vertices.push(projection.project(p)?);
        }
        let plane = PlaneEquation::from_points(points[0], points[1], points[2]);
        let z_value = points.iter().map(|p| p.z).sum::<f32>() / points.len() as f32;
        Some(Self::new(&vertices, plane, z_value))
    }

    pub fn flat(mut self, color: Rgba) -> Self {
        self.flat_color = color;
        self.texture = None;
        self
    }

    pub fn textured(mut self, texture: TextureId, mapping: TextureMapping) -> Self {
        self.texture = Some(texture);
        self.mapping = Some(mapping);
        self
    }

    pub fn lit(mut self, poly_texture: &'a PolyTexture, mapping: TextureMapping) -> Self {
        self.texture = Some(poly_texture.texture);
        self.mapping = Some(mapping);
        self.lighting = Some(poly_texture);
        self
    }

    pub fn with_colors(mut self, colors: &[Vec3]) -> Self {
        self.colors = Some(SmallVec::from_slice(colors));
        self.mix |= MixMode::GOURAUD;
        self
    }

    pub fn with_mix(mut self, mix: MixMode) -> Self {
        // keep the Gouraud request made by `with_colors`
        self.mix = mix | (self.mix & MixMode::GOURAUD);
        self
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;

    #[test]
    fn alpha_quantises_to_quarters() {
        assert_eq!(MixMode::alpha(0).blend(), Some(Blend::Copy));
        assert_eq!(MixMode::alpha(64).blend(), Some(Blend::AlphaQuarter));
        assert_eq!(MixMode::alpha(128).blend(), Some(Blend::AlphaHalf));
        assert_eq!(MixMode::alpha(192).blend(), Some(Blend::AlphaThreeQuarter));
        assert_eq!(MixMode::alpha(250).blend(), None);
        assert_eq!(MixMode::alpha(128).transparency(), 128);
    }

    #[test]
    fn mix_precedence() {
        assert_eq!(MixMode::COPY.blend(), Some(Blend::Copy));
        assert_eq!((MixMode::ADD | MixMode::KEYCOLOR).blend(), Some(Blend::Add));
        assert_eq!(MixMode::KEYCOLOR.blend(), Some(Blend::KeyTransparent));
        assert_eq!((MixMode::TRANSPARENT | MixMode::ADD).blend(), None);
        assert_eq!(
            (MixMode::KEYCOLOR | MixMode::TILING).blend(),
            Some(Blend::KeyTransparent)
        );
    }

    #[test]
    fn plane_from_points_contains_them() {
        let a = Vec3::new(0.0, 0.0, 2.0);
        let b = Vec3::new(1.0, 0.0, 3.0);
        let c = Vec3::new(0.0, 1.0, 2.0);
        let pl = PlaneEquation::from_points(a, b, c);
        for p in [a, b, c] {
            assert!((pl.normal.dot(p) + pl.d).abs() < 1e-5);
        }
    }

    #[test]
    fn small_plane_keeps_eye_distance() {
        // 5 cm square one unit away: the raw cross product is tiny
        let a = Vec3::new(0.0, 0.0, 1.0);
        let b = Vec3::new(0.05, 0.0, 1.05);
        let c = Vec3::new(0.0, 0.05, 1.0);
        let pl = PlaneEquation::from_points(a, b, c);
        assert!((pl.normal.length() - 1.0).abs() < 1e-5);
        assert!((pl.d.abs() - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4);
    }

    #[test]
    fn camera_space_projection() {
        let proj = Projection::new(Vec2::ZERO, 40.0);
        let poly = ProjectedPolygon::from_camera_space(
            &[
                Vec3::new(0.25, 0.25, 1.0),
                Vec3::new(1.25, 0.25, 1.0),
                Vec3::new(1.25, 1.25, 1.0),
            ],
            &proj,
        )
        .unwrap();
        assert_eq!(poly.vertices[0], vec2(10.0, 10.0));
        assert_eq!(poly.vertices[2], vec2(50.0, 50.0));
        assert!((poly.z_value - 1.0).abs() < 1e-6);

        assert!(
            ProjectedPolygon::from_camera_space(
                &[Vec3::ZERO, Vec3::X, Vec3::Y],
                &proj
            )
            .is_none()
        );
    }

    #[test]
    fn with_mix_keeps_gouraud_request() {
        let poly = ProjectedPolygon::new(&[Vec2::ZERO; 3], PlaneEquation::new(0.0, 0.0, 1.0, -1.0), 1.0)
            .with_colors(&[Vec3::ONE; 3])
            .with_mix(MixMode::ADD);
        assert!(poly.mix.contains(MixMode::GOURAUD | MixMode::ADD));
    }
}
