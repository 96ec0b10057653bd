use glam::{Vec2, Vec3, vec2};

/// Perspective projection from camera space to screen pixels.
///
/// Camera space: +X right, +Y down, +Z forward (into the screen).
///
/// ```text
/// sx = cx + aspect * X / Z
/// sy = cy + aspect * Y / Z
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    /// Screen position of the optical axis, in pixels.
    pub center: Vec2,
    /// Focal length in pixels.
    pub aspect: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            center: Vec2::ZERO,
            aspect: 1.0,
        }
    }
}

impl Projection {
    pub fn new(center: Vec2, aspect: f32) -> Self {
        Self { center, aspect }
    }

    /// Centred projection for a `w × h` viewport with horizontal FoV `fov`.
    ///
    /// ```text
    /// aspect = w / (2 * tan(fov/2))
    /// ```
    pub fn for_viewport(w: usize, h: usize, fov: f32) -> Self {
        Self {
            center: vec2(w as f32 * 0.5, h as f32 * 0.5),
            aspect: (w as f32) * 0.5 / (fov * 0.5).tan(),
        }
    }

    /// Project a camera-space point. Points at or behind the eye give `None`.
    #[inline]
    pub fn project(&self, p: Vec3) -> Option<Vec2> {
        if p.z <= 0.0 {
            return None;
        }
        let inv_z = 1.0 / p.z;
        Some(self.center + vec2(p.x, p.y) * (self.aspect * inv_z))
    }

    /// Camera-space direction `(X/Z, Y/Z, 1)` through screen point `s`.
    #[inline]
    pub fn unproject_dir(&self, s: Vec2) -> Vec3 {
        let d = (s - self.center) / self.aspect;
        Vec3::new(d.x, d.y, 1.0)
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
