//! Per-pixel inverse-depth store.
//!
//! Cells hold [`InvDepth`] (8.24 fixed `1/z`): a larger value is nearer, and
//! zero is the cleared "infinitely far" state.

use crate::renderer::software::fixed::InvDepth;

/// How a draw call interacts with the Z-buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ZMode {
    /// No test, no write.
    None,
    /// No test, always write depth.
    #[default]
    Fill,
    /// Test, keep the stored depth.
    Test,
    /// Test, write depth on success.
    Use,
}

impl ZMode {
    pub const ALL: [ZMode; 4] = [ZMode::None, ZMode::Fill, ZMode::Test, ZMode::Use];

    #[inline]
    pub fn tests(self) -> bool {
        matches!(self, ZMode::Test | ZMode::Use)
    }

    #[inline]
    pub fn writes(self) -> bool {
        matches!(self, ZMode::Fill | ZMode::Use)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ZBuffer {
    width: usize,
    height: usize,
    cells: Vec<u32>,
}

impl ZBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![InvDepth::FAR.0; width * height],
        }
    }

    /// Reallocate for a new render-target size. Contents are cleared.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells.resize(width * height, InvDepth::FAR.0);
    }

    /// Reset every cell to "infinitely far".
    pub fn clear(&mut self) {
        self.cells.fill(InvDepth::FAR.0);
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
    pub fn get(&self, index: usize) -> InvDepth {
        InvDepth(self.cells[index])
    }

    /// Unconditional write ("fill").
    #[inline]
    pub fn set(&mut self, index: usize, depth: InvDepth) {
        self.cells[index] = depth.0;
    }

    /// Depth comparison without a write ("test").
    #[inline]
    pub fn test(&self, index: usize, depth: InvDepth) -> bool {
        depth.0 >= self.cells[index]
    }

    /// Compare and, on success, store ("use").
    #[inline]
    pub fn test_and_set(&mut self, index: usize, depth: InvDepth) -> bool {
        let cell = &mut self.cells[index];
        if depth.0 >= *cell {
            *cell = depth.0;
            true
        } else {
            false
        }
    }

    /// Linear camera-space distance of the surface stored at `(x, y)`.
    pub fn read(&self, x: usize, y: usize) -> f32 {
        self.get(y * self.width + x).distance()
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[u32] {
        &self.cells[y * self.width..][..self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u32] {
        &mut self.cells[y * self.width..][..self.width]
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
