//! Render one frame of a small test scene and write it as a binary PPM.
//!
//! ```bash
//! cargo run --release -- --out frame.ppm --bilinear
//! ```

use std::{
    f32::consts::FRAC_PI_2,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use glam::{Mat3, Vec3};
use log::info;

use polyscan::{
    config::load_config,
    renderer::{
        DrawFlags, Renderer, Software,
        software::{fog::FogFacing, surface::Surface, zbuffer::ZMode},
    },
    world::{
        MixMode, PolyTexture, ProjectedPolygon, Projection, Texture, TextureBank, TextureMapping,
    },
};

#[derive(Parser, Debug)]
#[command(name = "render_demo", version, about = "Software rasterizer test scene")]
struct Args {
    /// Output image (binary PPM)
    #[arg(short, long, default_value = "frame.ppm")]
    out: PathBuf,

    #[arg(long, default_value_t = 320)]
    width: usize,

    #[arg(long, default_value_t = 240)]
    height: usize,

    /// Pixel depth override (16 or 32)
    #[arg(long)]
    depth: Option<u32>,

    /// INI file with a [Software] section
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    bilinear: bool,

    #[arg(long)]
    trilinear: bool,

    /// Stop after this many polygons
    #[arg(long)]
    max_polygons: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

const TEX: usize = 64;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let mut config = load_config(args.config.as_deref());
    if let Some(depth) = args.depth {
        config.pixel_depth = depth;
    }
    config.bilinear |= args.bilinear;
    config.trilinear |= args.trilinear;
    if args.max_polygons.is_some() {
        config.max_polygons = args.max_polygons;
    }

    let mut sw = Software::new(args.width, args.height, config)?;
    let projection = Projection::for_viewport(args.width, args.height, FRAC_PI_2);
    sw.set_projection(projection);

    /* textures ---------------------------------------------------------*/
    let mut bank = TextureBank::default_with_checker();
    let mut checker = Texture::new("FLOOR", TEX, TEX, checker_texels(0x0060_6070, 0x00C0_C0B0))?;
    checker.build_mipmaps(7);
    let floor_tex = bank.insert("FLOOR", checker)?;
    let mut brick = Texture::new("BRICK", TEX, TEX, brick_texels())?;
    brick.build_mipmaps(7);
    let brick_tex = bank.insert("BRICK", brick)?;

    /* back wall: 12×4 units, one texture repeat per 4 units */
    let wall_w = 3 * TEX;
    let wall_h = TEX;
    let mut wall_light = PolyTexture::new(1, brick_tex, 0, 0, wall_w, wall_h);
    let (lw, lh) = (wall_light.lightmap.width(), wall_light.lightmap.height());
    let across = (lw - 1).max(1);
    for y in 0..lh {
        for x in 0..lw {
            let l = (64 + 191 * x / across).min(255) as u8;
            wall_light.lightmap.set(x, y, [l, l, (l / 2).max(48)]);
        }
    }

    /* geometry ---------------------------------------------------------*/
    let floor = project(
        &projection,
        &[
            Vec3::new(-6.0, 1.0, 1.5),
            Vec3::new(6.0, 1.0, 1.5),
            Vec3::new(6.0, 1.0, 20.0),
            Vec3::new(-6.0, 1.0, 20.0),
        ],
    )?
    .textured(
        floor_tex,
        TextureMapping::new(
            Mat3::from_cols(Vec3::new(0.5, 0.0, 0.0), Vec3::ZERO, Vec3::new(0.0, 0.5, 0.0)),
            Vec3::ZERO,
        ),
    )
    .with_mix(MixMode::TILING);

    let wall = project(
        &projection,
        &[
            Vec3::new(-6.0, -3.0, 12.0),
            Vec3::new(6.0, -3.0, 12.0),
            Vec3::new(6.0, 1.0, 12.0),
            Vec3::new(-6.0, 1.0, 12.0),
        ],
    )?
    .lit(
        &wall_light,
        TextureMapping::new(Mat3::from_diagonal(Vec3::new(0.25, 0.25, 0.0)), Vec3::new(-6.0, -3.0, 12.0)),
    )
    .with_mix(MixMode::TILING);

    let triangle = project(
        &projection,
        &[
            Vec3::new(-2.5, 0.8, 6.0),
            Vec3::new(-0.5, -1.5, 6.0),
            Vec3::new(0.5, 0.8, 6.0),
        ],
    )?
    .with_colors(&[
        Vec3::new(255.0, 40.0, 40.0),
        Vec3::new(40.0, 255.0, 40.0),
        Vec3::new(40.0, 40.0, 255.0),
    ]);

    let glass = project(
        &projection,
        &[
            Vec3::new(0.0, -1.0, 4.0),
            Vec3::new(1.5, -1.0, 4.0),
            Vec3::new(1.5, 0.5, 4.0),
            Vec3::new(0.0, 0.5, 4.0),
        ],
    )?
    .flat(0x0020_A0FF)
    .with_mix(MixMode::alpha(128));

    let slab = |z: f32| {
        project(
            &projection,
            &[
                Vec3::new(-6.0, -3.0, z),
                Vec3::new(6.0, -3.0, z),
                Vec3::new(6.0, 1.0, z),
                Vec3::new(-6.0, 1.0, z),
            ],
        )
    };
    let (fog_front, fog_back) = (slab(8.0)?, slab(11.0)?);

    /* frame ------------------------------------------------------------*/
    sw.begin_frame(DrawFlags::all());
    sw.set_zmode(ZMode::Use);
    for poly in [&floor, &wall, &triangle] {
        sw.draw_polygon(poly, &bank);
    }

    sw.open_fog(1, 0.35, 0x0090_90A0)?;
    sw.add_fog_polygon(1, &fog_back, FogFacing::Back)?;
    sw.add_fog_polygon(1, &fog_front, FogFacing::Front)?;
    let fogged = sw.close_fog(1)?;
    info!("fog covered {fogged} pixels");

    sw.set_zmode(ZMode::Test);
    sw.draw_polygon(&glass, &bank);

    let mut written = Ok(());
    sw.end_frame(|surface| written = write_ppm(&args.out, surface));
    written?;

    sw.dump_cache_stats();
    info!("wrote {}", args.out.display());
    Ok(())
}

fn project(projection: &Projection, points: &[Vec3]) -> anyhow::Result<ProjectedPolygon<'static>> {
    ProjectedPolygon::from_camera_space(points, projection).context("polygon crosses the eye plane")
}

fn checker_texels(a: u32, b: u32) -> Vec<u32> {
    (0..TEX * TEX)
        .map(|i| {
            let (x, y) = (i % TEX, i / TEX);
            if ((x / 8) + (y / 8)) % 2 == 0 { a } else { b }
        })
        .collect()
}

fn brick_texels() -> Vec<u32> {
    (0..TEX * TEX)
        .map(|i| {
            let (x, y) = (i % TEX, i / TEX);
            let row = y / 16;
            let shift = if row % 2 == 0 { 0 } else { 16 };
            let mortar = y % 16 == 0 || (x + shift) % 32 == 0;
            if mortar { 0x00B0_B0A8 } else { 0x00A0_4030 + ((x * 7 + y * 3) % 16) as u32 }
        })
        .collect()
}

fn write_ppm(path: &Path, surface: &Surface) -> anyhow::Result<()> {
    let mut data = format!("P6\n{} {}\n255\n", surface.width(), surface.height()).into_bytes();
    for c in surface.to_rgb() {
        data.extend_from_slice(&[(c >> 16) as u8, (c >> 8) as u8, c as u8]);
    }
    std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))
}
