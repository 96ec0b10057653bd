//! Perspective-correction span length.
//!
//! Inside one interpolation span u and v are stepped linearly and the
//! perspective division is only done at the span ends. A surface whose
//! `1/z` barely changes across the screen can use long spans; a steep one
//! needs short spans to keep the texture from visibly warping.

/// How the span length is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InterpolationMode {
    Step8,
    Step16,
    Step32,
    /// Pick from [`StepThresholds`] by the polygon's depth slope.
    #[default]
    Smart,
}

/// Slope limits of the smart mode.
///
/// The numbers are empirical; they are configuration, not derived constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepThresholds {
    /// Below this |∂(1/z)/∂x| the 32-pixel span is used.
    pub flat: f32,
    /// Below this the 16-pixel span is used, otherwise 8.
    pub gentle: f32,
}

impl Default for StepThresholds {
    fn default() -> Self {
        Self {
            flat: 0.000_001,
            gentle: 0.000_05,
        }
    }
}

pub const SHORTEST_SPAN: usize = 8;
pub const LONGEST_SPAN: usize = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InterpolationStepSelector {
    pub mode: InterpolationMode,
    pub thresholds: StepThresholds,
}

impl InterpolationStepSelector {
    pub fn new(mode: InterpolationMode, thresholds: StepThresholds) -> Self {
        Self { mode, thresholds }
    }

    /// Span length in pixels for a polygon with depth slope `slope`.
    pub fn select(&self, slope: f32) -> usize {
        match self.mode {
            InterpolationMode::Step8 => 8,
            InterpolationMode::Step16 => 16,
            InterpolationMode::Step32 => 32,
            InterpolationMode::Smart => {
                let s = slope.abs();
                if s == 0.0 || s < self.thresholds.flat {
                    LONGEST_SPAN
                } else if s < self.thresholds.gentle {
                    16
                } else {
                    SHORTEST_SPAN
                }
            }
        }
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
