//! ---------------------------------------------------------------------------
//! Software (CPU) polygon rasterizer
//!
//! * Draws into a [`Surface`] in a 16- or 32-bit native format, with a
//!   per-pixel inverse-depth [`ZBuffer`].
//! * Every polygon is merged, clipped, scan converted and handed span by
//!   span to a routine from the [`ScanlineRoutineTable`].
//! * Lightmapped polygons sample a bitmap from the shared
//!   [`TextureCompositeCache`]; fog volumes are accumulated separately and
//!   blended when closed.
//!
//! A render-to-texture child made with [`Software::sub_context`] borrows
//! the routine table and the composite cache of its parent.
//! ---------------------------------------------------------------------------

pub mod clip;
pub mod fixed;
pub mod fog;
pub mod interp;
pub mod pixel;
pub mod routines;
pub mod scan;
pub mod surface;
pub mod texcache;
pub mod zbuffer;

use std::{cell::RefCell, rc::Rc};

use glam::{Vec2, Vec3};
use log::{debug, info, trace, warn};

use crate::{
    config::RasterConfig,
    renderer::{DrawFlags, RasterError, Renderer, ResourceSharingMode, Rgba},
    world::{
        camera::Projection,
        lightmap::LumelRect,
        polygon::{MixMode, PolyTextureKey, ProjectedPolygon},
        texture::TextureBank,
    },
};
use clip::{ClipRect, ClipRegion, ScanVertex, ScanVertices};
use fog::{FogAccumulator, FogError, FogFacing, FogId};
use interp::{InterpolationMode, InterpolationStepSelector, StepThresholds};
use pixel::PixelFormat;
use routines::{
    Blend, RoutineKey, Sampling, ScanlineRoutineTable, Shading, SpanState, TexelSource,
};
use scan::{PerspectiveEquations, PolygonScanConverter, merge_vertices, select_mip};
use surface::Surface;
use texcache::{CacheStats, TexelRect, TextureCompositeCache};
use zbuffer::{ZBuffer, ZMode};

/*───────────────────────────────────────────────────────────────────────*/
/*                              Backend                                 */
/*───────────────────────────────────────────────────────────────────────*/

/// One rendering context: target surface, depth, and drawing state.
pub struct Software {
    surface: Surface,
    zbuffer: ZBuffer,
    routines: Rc<ScanlineRoutineTable>,
    cache: Rc<RefCell<TextureCompositeCache>>,
    sharing: ResourceSharingMode,
    fog: FogAccumulator,

    config: RasterConfig,
    selector: InterpolationStepSelector,
    projection: Projection,
    clip: ClipRegion,
    zmode: ZMode,

    in_frame: bool,
    /* per-frame counter for the debug cap */
    polygons: u32,
}

impl Software {
    /// Standalone context with its own routine table and cache.
    pub fn new(width: usize, height: usize, config: RasterConfig) -> Result<Self, RasterError> {
        let format = PixelFormat::from_depth(config.pixel_depth)?;
        let routines = Rc::new(ScanlineRoutineTable::build(format, config.half_blend));
        let cache = Rc::new(RefCell::new(TextureCompositeCache::new(config.cache_budget)));
        Self::with_resources(width, height, config, routines, cache, ResourceSharingMode::Standalone)
    }

    /// Child context drawing into its own `width × height` surface with the
    /// parent's pixel format, routine table and composite cache.
    pub fn sub_context(&self, width: usize, height: usize) -> Result<Software, RasterError> {
        Self::with_resources(
            width,
            height,
            self.config.clone(),
            Rc::clone(&self.routines),
            Rc::clone(&self.cache),
            ResourceSharingMode::Shared,
        )
    }

    fn with_resources(
        width: usize,
        height: usize,
        config: RasterConfig,
        routines: Rc<ScanlineRoutineTable>,
        cache: Rc<RefCell<TextureCompositeCache>>,
        sharing: ResourceSharingMode,
    ) -> Result<Self, RasterError> {
        let surface = Surface::new(width, height, routines.format())?;
        debug!(
            "software context {}×{} {:?} ({:?})",
            width,
            height,
            routines.format(),
            sharing
        );
        Ok(Self {
            surface,
            zbuffer: ZBuffer::new(width, height),
            selector: InterpolationStepSelector::new(config.interpolation, config.thresholds),
            fog: FogAccumulator::new(width, height),
            projection: Projection::for_viewport(width, height, std::f32::consts::FRAC_PI_2),
            clip: ClipRegion::Rect(ClipRect::full(width, height)),
            zmode: ZMode::default(),
            in_frame: false,
            polygons: 0,
            routines,
            cache,
            sharing,
            config,
        })
    }

    /// Reallocate surface and depth buffer. Not allowed inside a bracket.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<(), RasterError> {
        if self.in_frame {
            return Err(RasterError::InsideFrame("resize"));
        }
        self.surface = Surface::new(width, height, self.surface.format())?;
        self.zbuffer.resize(width, height);
        self.fog.resize(width, height);
        self.clip = ClipRegion::Rect(ClipRect::full(width, height));
        Ok(())
    }

    /*──────────────────────── state accessors ────────────────────────*/

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn zbuffer(&self) -> &ZBuffer {
        &self.zbuffer
    }

    /// Camera distance of the nearest surface drawn at `(x, y)`.
    pub fn depth_at(&self, x: usize, y: usize) -> f32 {
        self.zbuffer.read(x, y)
    }

    pub fn sharing(&self) -> ResourceSharingMode {
        self.sharing
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }

    pub fn zmode(&self) -> ZMode {
        self.zmode
    }

    pub fn set_zmode(&mut self, zmode: ZMode) {
        self.zmode = zmode;
    }

    /// Restrict drawing to `region` (intersected with the surface).
    pub fn set_clip(&mut self, region: ClipRegion) {
        let full = ClipRect::full(self.surface.width(), self.surface.height());
        self.clip = match region {
            ClipRegion::Rect(r) => ClipRegion::Rect(r.intersect(&full)),
            ClipRegion::Polygon { bounds, verts } => ClipRegion::Polygon {
                bounds: bounds.intersect(&full),
                verts,
            },
        };
    }

    pub fn clip(&self) -> &ClipRegion {
        &self.clip
    }

    /*──────────────────────── admin operations ───────────────────────*/

    /// Drop every composited bitmap (shared with sub-contexts).
    pub fn clear_cache(&mut self) -> Result<(), RasterError> {
        if self.in_frame {
            return Err(RasterError::InsideFrame("clear_cache"));
        }
        self.cache.borrow_mut().clear();
        info!("composite cache cleared");
        Ok(())
    }

    pub fn dump_cache_stats(&self) -> CacheStats {
        let s = self.cache.borrow().stats();
        info!(
            "composite cache: {} entries, {}/{} bytes, {} hits, {} misses, {} evictions, {} bypassed, {} cells recomposited",
            s.entries,
            s.resident_bytes,
            s.budget,
            s.hits,
            s.misses,
            s.evictions,
            s.bypassed,
            s.recomposited_cells
        );
        s
    }

    pub fn set_cache_budget(&mut self, bytes: usize) {
        self.config.cache_budget = bytes;
        self.cache.borrow_mut().set_budget(bytes);
    }

    /// Mark all composited bitmaps of `key` stale after a lightmap change.
    pub fn invalidate_lightmap(&mut self, key: PolyTextureKey) {
        self.cache.borrow_mut().invalidate(key);
    }

    /// Mark only the cells touched by lumels `rect` of `key` stale.
    pub fn invalidate_lightmap_region(&mut self, key: PolyTextureKey, rect: LumelRect) {
        self.cache.borrow_mut().invalidate_region(key, rect);
    }

    /// Stop drawing after `max` polygons per frame; `None` lifts the cap.
    pub fn set_max_polygons(&mut self, max: Option<u32>) {
        info!("polygon cap: {:?}", max);
        self.config.max_polygons = max;
    }

    pub fn set_bilinear(&mut self, on: bool) {
        info!("bilinear filtering {}", on_off(on));
        self.config.bilinear = on;
    }

    pub fn set_trilinear(&mut self, on: bool) {
        info!("trilinear filtering {}", on_off(on));
        self.config.trilinear = on;
    }

    pub fn set_gouraud(&mut self, on: bool) {
        info!("Gouraud shading {}", on_off(on));
        self.config.gouraud = on;
    }

    pub fn set_lighting(&mut self, on: bool) {
        info!("lightmaps {}", on_off(on));
        self.config.lighting = on;
    }

    pub fn set_interpolation(&mut self, mode: InterpolationMode, thresholds: StepThresholds) {
        self.config.interpolation = mode;
        self.config.thresholds = thresholds;
        self.selector = InterpolationStepSelector::new(mode, thresholds);
    }

    /// Switch between 16- and 32-bit output. Rebuilds the surface and the
    /// routine table; only a standalone context may do this.
    pub fn set_pixel_depth(&mut self, bits: u32) -> Result<(), RasterError> {
        if self.sharing == ResourceSharingMode::Shared {
            return Err(RasterError::SharedFormat);
        }
        if self.in_frame {
            return Err(RasterError::InsideFrame("set_pixel_depth"));
        }
        let format = PixelFormat::from_depth(bits)?;
        if format != self.routines.format() {
            self.surface = Surface::new(self.surface.width(), self.surface.height(), format)?;
            self.routines = Rc::new(ScanlineRoutineTable::build(format, self.config.half_blend));
        }
        self.config.pixel_depth = bits;
        Ok(())
    }

    /*──────────────────────────── fog ────────────────────────────────*/

    pub fn open_fog(&mut self, id: FogId, density: f32, color: Rgba) -> Result<(), FogError> {
        self.fog.open_volume(id, density, color)
    }

    /// Record one face of fog volume `id` against the current depth buffer.
    pub fn add_fog_polygon(
        &mut self,
        id: FogId,
        polygon: &ProjectedPolygon<'_>,
        facing: FogFacing,
    ) -> Result<(), FogError> {
        let Some(verts) = self.scan_vertices(polygon) else {
            return Ok(());
        };
        let eq = PerspectiveEquations::new(&polygon.plane, polygon.z_value, &self.projection);
        let conv = PolygonScanConverter::new(self.clip.bounds(), 1);
        self.fog
            .add_polygon(id, facing, &verts, &eq, &conv, &self.zbuffer)
    }

    /// Blend fog volume `id` into the surface. Returns the fogged pixel count.
    pub fn close_fog(&mut self, id: FogId) -> Result<usize, FogError> {
        self.fog.close_volume(id, &mut self.surface)
    }
}

/*──────────────────────── Renderer trait impl ────────────────────────*/
impl Renderer for Software {
    fn begin_frame(&mut self, flags: DrawFlags) {
        if self.in_frame {
            warn!("begin_frame inside an open frame");
        }
        self.in_frame = true;
        self.polygons = 0;
        if flags.contains(DrawFlags::CLEAR_Z) {
            self.zbuffer.clear();
        }
        if flags.contains(DrawFlags::CLEAR_SCREEN) {
            self.surface.clear(0);
        }
        self.fog.begin_frame();
    }

    fn draw_polygon(&mut self, polygon: &ProjectedPolygon<'_>, bank: &TextureBank) {
        if !self.in_frame {
            warn!("draw_polygon outside begin_frame/end_frame ignored");
            return;
        }
        if let Some(max) = self.config.max_polygons {
            if self.polygons >= max {
                return;
            }
        }
        self.polygons += 1;
        self.rasterize(polygon, bank);
    }

    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&Surface),
    {
        if !self.in_frame {
            warn!("end_frame without begin_frame");
        }
        self.in_frame = false;
        debug!("frame done: {} polygons", self.polygons);
        submit(&self.surface);
    }
}

/*──────────────────────── draw pipeline ──────────────────────────────*/
impl Software {
    fn rasterize(&mut self, poly: &ProjectedPolygon<'_>, bank: &TextureBank) {
        let Some(mut blend) = poly.mix.blend() else {
            trace!("invisible polygon skipped");
            return;
        };
        let Some(verts) = self.scan_vertices(poly) else {
            return;
        };

        let eq = PerspectiveEquations::new(&poly.plane, poly.z_value, &self.projection);
        let conv = PolygonScanConverter::new(self.clip.bounds(), self.selector.select(eq.inv_z.m));
        let gouraud =
            self.config.gouraud && poly.mix.contains(MixMode::GOURAUD) && poly.colors.is_some();
        let shading = if gouraud {
            Shading::Gouraud
        } else {
            Shading::Flat
        };

        /* untextured: flat colour, or the texture's mean if it has no mapping */
        let (Some(tex_id), Some(mapping)) = (poly.texture, poly.mapping) else {
            let color = poly
                .texture
                .map_or(poly.flat_color, |id| bank.texture_or_missing(id).mean_color());
            if blend == Blend::KeyTransparent {
                blend = Blend::Copy;
            }
            let key = self.routine_key(Sampling::Flat, blend, shading, false);
            let mut st = SpanState::flat(color);
            self.draw_spans(&verts, &eq, false, key, &mut st, &conv);
            return;
        };

        let texture = bank.texture_or_missing(tex_id);
        if blend == Blend::KeyTransparent && texture.key_color.is_none() {
            blend = Blend::Copy;
        }
        let size = Vec2::new(texture.width() as f32, texture.height() as f32);
        let base = eq.with_mapping(&mapping, self.projection.aspect, size);
        let mip = select_mip(&base, &verts, texture.level_count(), self.config.mip_bias);
        let level = mip.level;
        let tiled = poly.mix.contains(MixMode::TILING);
        let sampling = if self.config.bilinear {
            Sampling::Bilinear
        } else {
            Sampling::Nearest
        };

        /* lightmapped polygons draw from the composite cache when it can hold them */
        let lit = poly.lighting.filter(|_| self.config.lighting);
        let cache_rc = Rc::clone(&self.cache);
        let handle = lit.and_then(|pt| {
            let lit_eq = base
                .offset(pt.u_min as f32, pt.v_min as f32)
                .at_level(level);
            let size = ((pt.width >> level).max(1), (pt.height >> level).max(1));
            let region = texel_bounds(&lit_eq, &verts, size, tiled);
            cache_rc.borrow_mut().acquire(pt, bank, level, region)
        });

        {
            let cache = cache_rc.borrow();
            let composite = handle.and_then(|h| cache.bitmap(h));

            let (draw_eq, source, alpha_mask) = match (composite, lit) {
                (Some(view), Some(pt)) => (
                    base.offset(pt.u_min as f32, pt.v_min as f32)
                        .at_level(level),
                    TexelSource {
                        texels: view.texels,
                        alpha: view.alpha,
                        width: view.width,
                        height: view.height,
                        tiled,
                    },
                    view.alpha.is_some(),
                ),
                _ => {
                    let lv = texture.level(level);
                    (
                        base.at_level(level),
                        TexelSource {
                            texels: &lv.pixels,
                            alpha: lv.alpha.as_deref(),
                            width: lv.w,
                            height: lv.h,
                            tiled,
                        },
                        lv.alpha.is_some(),
                    )
                }
            };

            let detail = (sampling == Sampling::Bilinear
                && self.config.trilinear
                && composite.is_none()
                && mip.fraction > 0
                && level + 1 < texture.level_count())
            .then(|| {
                let lv = texture.level(level + 1);
                let coarse = TexelSource {
                    texels: &lv.pixels,
                    alpha: None,
                    width: lv.w,
                    height: lv.h,
                    tiled,
                };
                (coarse, mip.fraction)
            });

            // masked and keyed texels are never filtered
            let sampling = if alpha_mask || blend == Blend::KeyTransparent {
                Sampling::Nearest
            } else {
                sampling
            };
            let key = self.routine_key(sampling, blend, shading, alpha_mask);
            let mut st = SpanState::flat(texture.mean_color());
            st.key = texture.key_color.unwrap_or(0);
            st.texture = Some(source);
            st.detail = detail;
            self.draw_spans(&verts, &draw_eq, true, key, &mut st, &conv);
        }

        if let Some(h) = handle {
            cache_rc.borrow_mut().release(h);
        }
    }

    fn routine_key(
        &self,
        sampling: Sampling,
        blend: Blend,
        shading: Shading,
        alpha_mask: bool,
    ) -> RoutineKey {
        RoutineKey {
            format: self.surface.format(),
            zmode: self.zmode,
            sampling,
            blend,
            shading,
            alpha_mask,
        }
    }

    /// Vertex list after merging near-duplicates and clipping; `None` when
    /// fewer than three vertices remain.
    fn scan_vertices(&self, poly: &ProjectedPolygon<'_>) -> Option<ScanVertices> {
        let mut verts: ScanVertices = poly
            .vertices
            .iter()
            .enumerate()
            .map(|(i, &pos)| ScanVertex {
                pos,
                color: poly
                    .colors
                    .as_ref()
                    .and_then(|c| c.get(i).copied())
                    .unwrap_or(Vec3::splat(255.0)),
            })
            .collect();
        merge_vertices(&mut verts);
        if verts.len() < 3 {
            trace!("degenerate polygon skipped");
            return None;
        }
        let verts = self.clip.clip(verts);
        (verts.len() >= 3).then_some(verts)
    }

    fn draw_spans(
        &mut self,
        verts: &[ScanVertex],
        eq: &PerspectiveEquations,
        textured: bool,
        key: RoutineKey,
        st: &mut SpanState<'_>,
        conv: &PolygonScanConverter,
    ) {
        let Some(routine) = self.routines.lookup(&key) else {
            trace!("no scanline routine for {:?}", key);
            return;
        };
        let bpp = self.surface.format().bytes_per_pixel();
        let surface = &mut self.surface;
        let zbuffer = &mut self.zbuffer;
        conv.walk(verts, |span| {
            let y = span.y as usize;
            conv.fill(
                span,
                eq,
                textured,
                routine,
                bpp,
                surface.row_mut(y),
                zbuffer.row_mut(y),
                st,
            );
        });
    }
}

/// Texel rectangle of a `size` bitmap (at the equations' level) covering
/// the polygon, plus a one-texel border for filtering.
///
/// Tiled coordinates are reduced into the bitmap; a range that wraps round
/// an edge, or spans the whole bitmap, covers the full axis.
fn texel_bounds(
    eq: &PerspectiveEquations,
    verts: &[ScanVertex],
    size: (usize, usize),
    tiled: bool,
) -> TexelRect {
    let (mut lo, mut hi) = (Vec2::splat(f32::MAX), Vec2::splat(f32::MIN));
    for v in verts {
        let uv = eq.uv_at(v.pos);
        lo = lo.min(uv);
        hi = hi.max(uv);
    }
    let axis = |lo: f32, hi: f32, size: usize| -> (usize, usize) {
        let (a, b) = (lo.floor() - 1.0, hi.ceil() + 1.0);
        let extent = size as f32;
        if !tiled {
            let a = a.max(0.0) as usize;
            return (a, (b.max(0.0) as usize).saturating_sub(a));
        }
        if b - a >= extent {
            return (0, size);
        }
        let start = a.rem_euclid(extent);
        if start + (b - a) > extent {
            (0, size)
        } else {
            (start as usize, (b - a) as usize)
        }
    };
    let (x, w) = axis(lo.x, hi.x, size.0);
    let (y, h) = axis(lo.y, hi.y, size.1);
    TexelRect::new(x, y, w, h)
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
