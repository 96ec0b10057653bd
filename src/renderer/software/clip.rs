//! 2-D clip region of the render target.
//!
//! A rectangle only restricts the rows and columns the scan converter visits.
//! A convex clip polygon is applied to the vertex list first, one edge at a
//! time, then its bounding box acts as the rectangle.

use glam::{Vec2, Vec3};
use smallvec::SmallVec;

/// Distance below which a vertex counts as lying on a clip edge.
const ON_EPSILON: f32 = 1e-4;

/// Half-open pixel rectangle `x0..x1 × y0..y1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl ClipRect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    pub fn intersect(&self, other: &ClipRect) -> ClipRect {
        ClipRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }
}

/// A vertex on its way to the scan converter: screen position plus the
/// Gouraud colour, which must follow the position through clipping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanVertex {
    pub pos: Vec2,
    pub color: Vec3,
}

pub type ScanVertices = SmallVec<[ScanVertex; 16]>;

#[derive(Clone, Debug, PartialEq)]
pub enum ClipRegion {
    Rect(ClipRect),
    /// Convex outline, any winding, with its pixel bounds.
    Polygon {
        bounds: ClipRect,
        verts: SmallVec<[Vec2; 8]>,
    },
}

impl ClipRegion {
    /// Convex clip polygon. Returns `None` for fewer than three points.
    pub fn polygon(points: &[Vec2]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let (mut lo, mut hi) = (points[0], points[0]);
        for &p in &points[1..] {
            lo = lo.min(p);
            hi = hi.max(p);
        }
        Some(ClipRegion::Polygon {
            bounds: ClipRect::new(
                lo.x.floor() as i32,
                lo.y.floor() as i32,
                hi.x.ceil() as i32,
                hi.y.ceil() as i32,
            ),
            verts: SmallVec::from_slice(points),
        })
    }

    pub fn bounds(&self) -> ClipRect {
        match self {
            ClipRegion::Rect(r) => *r,
            ClipRegion::Polygon { bounds, .. } => *bounds,
        }
    }

    /// Clip `subject` against the region's outline (rectangles pass through).
    ///
    /// The result may have fewer than three vertices when nothing is left.
    pub fn clip(&self, subject: ScanVertices) -> ScanVertices {
        match self {
            ClipRegion::Rect(_) => subject,
            ClipRegion::Polygon { verts, .. } => clip_convex(subject, verts),
        }
    }
}

/// Twice the signed area; positive for clockwise outlines on a y-down screen.
pub fn signed_area(points: impl Iterator<Item = Vec2> + Clone) -> f32 {
    let next = points.clone().cycle().skip(1);
    points.zip(next).map(|(a, b)| a.perp_dot(b)).sum()
}

fn clip_convex(mut subject: ScanVertices, clip: &[Vec2]) -> ScanVertices {
    // Orient the edge test so "inside" is the interior for either winding.
    let orient = if signed_area(clip.iter().copied()) < 0.0 {
        -1.0
    } else {
        1.0
    };

    for (i, &a) in clip.iter().enumerate() {
        if subject.len() < 3 {
            break;
        }
        let b = clip[(i + 1) % clip.len()];
        let edge = b - a;
        let dist = |p: Vec2| orient * edge.perp_dot(p - a);

        let mut out = ScanVertices::new();
        for (j, &cur) in subject.iter().enumerate() {
            let nxt = subject[(j + 1) % subject.len()];
            let dc = dist(cur.pos);
            let dn = dist(nxt.pos);
            if dc >= -ON_EPSILON {
                out.push(cur);
            }
            if (dc > ON_EPSILON && dn < -ON_EPSILON) || (dc < -ON_EPSILON && dn > ON_EPSILON) {
                let t = dc / (dc - dn);
                out.push(ScanVertex {
                    pos: cur.pos.lerp(nxt.pos, t),
                    color: cur.color.lerp(nxt.color, t),
                });
            }
        }
        subject = out;
    }
    subject
}

/*──────────────────────────────── Tests ───────────────────────────────*/
