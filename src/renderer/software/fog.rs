//! Volumetric fog.
//!
//! A fog volume is a closed convex object drawn as its back faces first,
//! then its front faces. Back faces record, per pixel, the far end of the
//! fogged interval (or the scene surface if that is nearer); front faces
//! record the near end. Closing the volume blends every pixel with a
//! non-empty interval towards the fog colour by `1 - e^(-density·thickness)`.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::renderer::{
    Rgba,
    software::{
        clip::ScanVertex,
        fixed::InvDepth,
        pixel,
        scan::{PerspectiveEquations, PolygonScanConverter},
        surface::Surface,
        zbuffer::ZBuffer,
    },
};

pub type FogId = u32;

/// Entries of the extinction table.
pub const FOG_TABLE_SIZE: usize = 1024;
/// Optical depth covered by the table; beyond it fog is opaque.
pub const FOG_MAX_OPTICAL_DEPTH: f32 = 8.0;

/// `round((1 - e^(-od)) * 256)` for `od` in `[0, FOG_MAX_OPTICAL_DEPTH)`.
static EXTINCTION: Lazy<Vec<u32>> = Lazy::new(|| {
    (0..FOG_TABLE_SIZE)
        .map(|i| {
            let od = i as f32 * FOG_MAX_OPTICAL_DEPTH / FOG_TABLE_SIZE as f32;
            ((1.0 - (-od).exp()) * 256.0).round() as u32
        })
        .collect()
});

/// Blend weight (0..=256) towards the fog colour for optical depth `od`.
pub fn fog_factor(od: f32) -> u32 {
    if od <= 0.0 || od.is_nan() {
        return 0;
    }
    let i = (od * (FOG_TABLE_SIZE as f32 / FOG_MAX_OPTICAL_DEPTH)) as usize;
    EXTINCTION.get(i).copied().unwrap_or(256)
}

/// Which side of the volume a polygon shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FogFacing {
    Back,
    Front,
    /// Back face seen from inside the volume; the near end is the eye.
    View,
}

/// Caller broke the open / add / close protocol.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FogError {
    #[error("fog volume {0} is already open")]
    AlreadyOpen(FogId),

    #[error("fog volume {0} was never opened")]
    NotOpen(FogId),

    #[error("fog volume {0} was already closed this frame")]
    AlreadyClosed(FogId),

    #[error("fog volume {0}: back face added after a front face")]
    OutOfOrder(FogId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    CollectingBack,
    CollectingFront,
}

struct FogVolume {
    density: f32,
    color: Rgba,
    phase: Phase,
    /// Inverse depth of the far end per pixel, 0 = nothing recorded.
    far: Vec<u32>,
    /// Inverse depth of the near end, `u32::MAX` = the eye.
    near: Vec<u32>,
}

/// Open fog volumes of one rendering context.
pub struct FogAccumulator {
    width: usize,
    height: usize,
    open: HashMap<FogId, FogVolume>,
    closed: HashSet<FogId>,
}

impl FogAccumulator {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            open: HashMap::new(),
            closed: HashSet::new(),
        }
    }

    /// Drop all state; called when the render target changes size.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.open.clear();
        self.closed.clear();
    }

    /// Start of a frame: forget closed ids and abandon volumes left open.
    pub fn begin_frame(&mut self) {
        if !self.open.is_empty() {
            log::warn!("{} fog volume(s) left open at frame start", self.open.len());
            self.open.clear();
        }
        self.closed.clear();
    }

    pub fn is_open(&self, id: FogId) -> bool {
        self.open.contains_key(&id)
    }

    pub fn open_volume(&mut self, id: FogId, density: f32, color: Rgba) -> Result<(), FogError> {
        if self.open.contains_key(&id) {
            return Err(report(FogError::AlreadyOpen(id)));
        }
        let cells = self.width * self.height;
        self.closed.remove(&id);
        self.open.insert(
            id,
            FogVolume {
                density: density.max(0.0),
                color,
                phase: Phase::CollectingBack,
                far: vec![0; cells],
                near: vec![0; cells],
            },
        );
        Ok(())
    }

    /// Record one polygon of volume `id`. All back (and view) faces must
    /// come before the first front face.
    pub fn add_polygon(
        &mut self,
        id: FogId,
        facing: FogFacing,
        vertices: &[ScanVertex],
        eq: &PerspectiveEquations,
        conv: &PolygonScanConverter,
        zbuffer: &ZBuffer,
    ) -> Result<(), FogError> {
        let width = self.width;
        let Some(vol) = self.open.get_mut(&id) else {
            let err = if self.closed.contains(&id) {
                FogError::AlreadyClosed(id)
            } else {
                FogError::NotOpen(id)
            };
            return Err(report(err));
        };
        match (vol.phase, facing) {
            (Phase::CollectingFront, FogFacing::Back | FogFacing::View) => {
                return Err(report(FogError::OutOfOrder(id)));
            }
            (_, FogFacing::Front) => vol.phase = Phase::CollectingFront,
            _ => {}
        }

        conv.walk(vertices, |span| {
            let row = span.y as usize * width;
            let mut iz = eq.inv_z_at(span.start());
            for x in span.x0..span.x1 {
                let i = row + x as usize;
                let face = InvDepth::from_inv_z(iz.max(0.0)).0;
                let scene = zbuffer.get(i).0;
                match facing {
                    FogFacing::Back => vol.far[i] = vol.far[i].max(face.max(scene)),
                    FogFacing::View => {
                        vol.far[i] = vol.far[i].max(face.max(scene));
                        vol.near[i] = u32::MAX;
                    }
                    FogFacing::Front => {
                        if face >= scene {
                            vol.near[i] = vol.near[i].max(face);
                        }
                    }
                }
                iz += eq.inv_z.m;
            }
        });
        Ok(())
    }

    /// Blend volume `id` into `surface` and destroy it. Returns the number of
    /// fogged pixels.
    pub fn close_volume(&mut self, id: FogId, surface: &mut Surface) -> Result<usize, FogError> {
        let Some(vol) = self.open.remove(&id) else {
            let err = if self.closed.contains(&id) {
                FogError::AlreadyClosed(id)
            } else {
                FogError::NotOpen(id)
            };
            return Err(report(err));
        };
        self.closed.insert(id);

        let mut fogged = 0;
        let w = self.width.min(surface.width());
        let h = self.height.min(surface.height());
        for y in 0..h {
            for x in 0..w {
                let i = y * self.width + x;
                let (far, near) = (vol.far[i], vol.near[i]);
                if far == 0 || near == 0 || near < far {
                    continue;
                }
                let d_near = if near == u32::MAX {
                    0.0
                } else {
                    InvDepth(near).distance()
                };
                let thickness = InvDepth(far).distance() - d_near;
                let f = fog_factor(vol.density * thickness);
                if f == 0 {
                    continue;
                }
                let c = surface.pixel(x, y);
                surface.put_pixel(x, y, pixel::lerp(c, vol.color, f));
                fogged += 1;
            }
        }
        log::trace!("fog volume {id} closed, {fogged} pixels");
        Ok(fogged)
    }
}

fn report(err: FogError) -> FogError {
    log::error!("{err}");
    err
}

/*──────────────────────────────── Tests ───────────────────────────────*/
