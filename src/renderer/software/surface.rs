use crate::renderer::{
    RasterError, Rgba,
    software::pixel::PixelFormat,
};

/// Colour target in the caller's native pixel format.
///
/// Rows are addressed through a per-scanline offset table, so a surface can
/// describe a padded (pitched) buffer as well as a tightly packed one.
#[derive(Clone, Debug)]
pub struct Surface {
    format: PixelFormat,
    width: usize,
    height: usize,
    pitch: usize,
    data: Vec<u8>,
    rows: Vec<usize>,
}

impl Surface {
    /// Tightly packed surface.
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Result<Self, RasterError> {
        Self::with_pitch(width, height, format, width * format.bytes_per_pixel())
    }

    /// Surface whose rows are `pitch` bytes apart.
    pub fn with_pitch(
        width: usize,
        height: usize,
        format: PixelFormat,
        pitch: usize,
    ) -> Result<Self, RasterError> {
        let row_bytes = width
            .checked_mul(format.bytes_per_pixel())
            .ok_or(RasterError::InvalidSurface { width, height })?;
        if width == 0 || height == 0 || pitch < row_bytes {
            return Err(RasterError::InvalidSurface { width, height });
        }
        let len = pitch
            .checked_mul(height)
            .ok_or(RasterError::InvalidSurface { width, height })?;

        Ok(Self {
            format,
            width,
            height,
            pitch,
            data: vec![0; len],
            rows: (0..height).map(|y| y * pitch).collect(),
        })
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }
    #[inline]
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    /// Visible bytes of scanline `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        let start = self.rows[y];
        &self.data[start..start + self.width * self.format.bytes_per_pixel()]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = self.rows[y];
        let len = self.width * self.format.bytes_per_pixel();
        &mut self.data[start..start + len]
    }

    pub fn clear(&mut self, color: Rgba) {
        let format = self.format;
        for y in 0..self.height {
            let row = self.row_mut(y);
            format.store(row, 0, color);
            let bpp = format.bytes_per_pixel();
            let (first, rest) = row.split_at_mut(bpp);
            for px in rest.chunks_exact_mut(bpp) {
                px.copy_from_slice(first);
            }
        }
    }

    /// Colour at `(x, y)` as `0x00RRGGBB`.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Rgba {
        self.format.load(self.row(y), x)
    }

    #[inline]
    pub fn put_pixel(&mut self, x: usize, y: usize, c: Rgba) {
        let format = self.format;
        format.store(self.row_mut(y), x, c);
    }

    /// Whole image as `0x00RRGGBB`, row-major, no padding.
    pub fn to_rgb(&self) -> Vec<Rgba> {
        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(self.pixel(x, y));
            }
        }
        out
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
