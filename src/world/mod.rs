//! Scene-side data handed to the rasterizer: projection, textures,
//! lightmaps and the projected polygons themselves.

pub mod camera;
pub mod lightmap;
pub mod polygon;
pub mod texture;

pub use camera::Projection;

pub use lightmap::{LUMEL_SHIFT, Lightmap, LumelRect};

pub use polygon::{
    MixMode, PlaneEquation, PolyTexture, PolyTextureKey, ProjectedPolygon, TextureMapping,
};

pub use texture::{NO_TEXTURE, Texture, TextureBank, TextureError, TextureId};
