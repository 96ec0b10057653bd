//! Fixed-point value types used by the scanline loops.
//!
//! * [`Fixed16`] – signed 16.16, used for texture coordinates and Gouraud
//!   colour channels.
//! * [`InvDepth`] – unsigned 8.24 inverse depth, the Z-buffer cell format.
//!
//! All arithmetic *wraps* on overflow. Conversions from `f32` saturate
//! (Rust's `as` semantics), NaN becomes zero.

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Signed 16.16 fixed-point number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed16(pub i32);

impl Fixed16 {
    pub const FRAC_BITS: u32 = 16;
    pub const ZERO: Fixed16 = Fixed16(0);
    pub const ONE: Fixed16 = Fixed16(1 << 16);
    pub const HALF: Fixed16 = Fixed16(1 << 15);

    const SCALE: f32 = 65536.0;

    #[inline(always)]
    pub fn from_f32(v: f32) -> Self {
        Fixed16((v * Self::SCALE) as i32)
    }

    #[inline(always)]
    pub fn from_int(i: i32) -> Self {
        Fixed16(i.wrapping_shl(Self::FRAC_BITS))
    }

    #[inline(always)]
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / Self::SCALE
    }

    /// Integer part, rounded towards negative infinity.
    #[inline(always)]
    pub fn floor(self) -> i32 {
        self.0 >> Self::FRAC_BITS
    }

    /// Fractional part in `0..65536`.
    #[inline(always)]
    pub fn frac(self) -> u32 {
        (self.0 as u32) & 0xFFFF
    }

    /// Top eight bits of the fraction – the bilinear weight.
    #[inline(always)]
    pub fn frac8(self) -> u32 {
        self.frac() >> 8
    }

    /// Halve the value (next coarser mip level).
    #[inline(always)]
    pub fn half(self) -> Self {
        Fixed16(self.0 >> 1)
    }
}

impl Add for Fixed16 {
    type Output = Fixed16;
    #[inline(always)]
    fn add(self, rhs: Fixed16) -> Fixed16 {
        Fixed16(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Fixed16 {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Fixed16) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl Sub for Fixed16 {
    type Output = Fixed16;
    #[inline(always)]
    fn sub(self, rhs: Fixed16) -> Fixed16 {
        Fixed16(self.0.wrapping_sub(rhs.0))
    }
}

impl SubAssign for Fixed16 {
    #[inline(always)]
    fn sub_assign(&mut self, rhs: Fixed16) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}

impl Neg for Fixed16 {
    type Output = Fixed16;
    #[inline(always)]
    fn neg(self) -> Fixed16 {
        Fixed16(self.0.wrapping_neg())
    }
}

/// Unsigned 8.24 inverse depth (`1/z`).
///
/// Zero is "infinitely far"; a larger value is a nearer surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InvDepth(pub u32);

impl InvDepth {
    pub const FRAC_BITS: u32 = 24;
    pub const FAR: InvDepth = InvDepth(0);

    const SCALE: f32 = 16_777_216.0;

    /// Convert a floating `1/z`. Negative values clamp to [`InvDepth::FAR`].
    #[inline(always)]
    pub fn from_inv_z(inv_z: f32) -> Self {
        InvDepth((inv_z * Self::SCALE) as u32)
    }

    /// Per-pixel increment matching [`InvDepth::step`].
    #[inline(always)]
    pub fn delta(d_inv_z: f32) -> i32 {
        (d_inv_z * Self::SCALE) as i32
    }

    #[inline(always)]
    pub fn to_inv_z(self) -> f32 {
        self.0 as f32 / Self::SCALE
    }

    /// Linear camera-space distance, `f32::INFINITY` for an empty cell.
    #[inline]
    pub fn distance(self) -> f32 {
        if self.0 == 0 {
            f32::INFINITY
        } else {
            Self::SCALE / self.0 as f32
        }
    }

    #[inline(always)]
    pub fn step(self, delta: i32) -> Self {
        InvDepth(self.0.wrapping_add_signed(delta))
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed16_floor_and_fraction() {
        let v = Fixed16::from_f32(2.75);
        assert_eq!(v.floor(), 2);
        assert_eq!(v.frac(), 0xC000);
        assert_eq!(v.frac8(), 0xC0);

        let n = Fixed16::from_f32(-0.25);
        assert_eq!(n.floor(), -1, "floor must round towards -inf");
    }

    #[test]
    fn fixed16_wraps_instead_of_panicking() {
        let big = Fixed16(i32::MAX);
        let wrapped = big + Fixed16::ONE;
        assert!(wrapped.0 < 0);
    }

    #[test]
    fn inv_depth_orders_near_over_far() {
        let near = InvDepth::from_inv_z(1.0 / 2.0);
        let far = InvDepth::from_inv_z(1.0 / 10.0);
        assert!(near > far);
        assert!((near.distance() - 2.0).abs() < 1e-4);
        assert_eq!(InvDepth::FAR.distance(), f32::INFINITY);
        assert_eq!(InvDepth::from_inv_z(-3.0), InvDepth::FAR);
    }

    #[test]
    fn inv_depth_steps_by_signed_delta() {
        let z = InvDepth::from_inv_z(0.5);
        let d = InvDepth::delta(-0.125);
        assert_eq!(z.step(d), InvDepth::from_inv_z(0.375));
    }
}
