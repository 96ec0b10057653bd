//! Rendering abstraction layer.
//!
//! *Callers never touch a pixel buffer directly.*
//! They project and clip their geometry, wrap every convex piece in a
//! [`ProjectedPolygon`] and hand it to a type implementing [`Renderer`]
//! between `begin_frame` and `end_frame`.
//!
//! * The only back-end is [`software::Software`], a CPU rasterizer with a
//!   Z-buffer, lightmap cache and fog.
//! * A helper blanket-impl [`RendererExt`] adds `draw_frame` so call-sites
//!   stay short.

use bitflags::bitflags;

use crate::{
    renderer::software::surface::Surface,
    world::{polygon::ProjectedPolygon, texture::TextureBank},
};

/// Colour as seen by every public API (0x00RRGGBB).
pub type Rgba = u32;

bitflags! {
    /// What `begin_frame` resets before drawing starts.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DrawFlags: u8 {
        const CLEAR_Z      = 0b01;
        const CLEAR_SCREEN = 0b10;
    }
}

/// Whether a rendering context owns its routine table and composite cache
/// or borrows them from a parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResourceSharingMode {
    #[default]
    Standalone,
    /// Render-to-texture child; the pixel format is fixed by the parent.
    Shared,
}

/// Setup-time failures, returned to the caller.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RasterError {
    #[error("unsupported pixel depth: {0} bits")]
    UnsupportedDepth(u32),

    #[error("cannot create a {width}×{height} drawing surface")]
    InvalidSurface { width: usize, height: usize },

    /// Pixel format changes must go through the owner of shared resources.
    #[error("pixel depth of a shared context is fixed by its parent")]
    SharedFormat,

    /// Frame-bracket operations out of order.
    #[error("{0} is not allowed inside a draw bracket")]
    InsideFrame(&'static str),
}

/// A renderer that draws into an internal surface for the whole frame.
///
/// `end_frame` hands the finished surface to a user-supplied closure.
pub trait Renderer {
    /// Open the draw bracket, clearing what `flags` ask for.
    fn begin_frame(&mut self, flags: DrawFlags);

    /// Rasterise one convex, clipped polygon.
    fn draw_polygon(&mut self, polygon: &ProjectedPolygon<'_>, bank: &TextureBank);

    /// Close the bracket and **loan** the finished surface to `submit`.
    ///
    /// * `submit(&surface)` is run exactly once per frame.
    /// * The demo writes it to a PPM file; an embedder would blit it.
    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&Surface);
}

/// Convenience blanket-impl with a one-liner `draw_frame` adaptor.
pub trait RendererExt: Renderer {
    fn draw_frame<F>(
        &mut self,
        flags: DrawFlags,
        polygons: &[ProjectedPolygon<'_>],
        bank: &TextureBank,
        submit: F,
    ) where
        F: FnOnce(&Surface),
    {
        self.begin_frame(flags);
        for p in polygons {
            self.draw_polygon(p, bank);
        }
        self.end_frame(submit);
    }
}
impl<T: Renderer + ?Sized> RendererExt for T {}

pub mod software;
pub use software::Software;
