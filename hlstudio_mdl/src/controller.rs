//! Conversion between real controller and blend values and the bytes an entity stores.

use crate::asset::{BlendAxis, BoneController};

pub const MAX_CONTROLLERS: usize = 4;
/// Controller slot of the mouth, stored separately from the regular controllers.
pub const MOUTH_CONTROLLER: usize = 4;
pub const MAX_BLENDERS: usize = 2;

fn quantize(fraction: f32) -> u8 {
    (fraction * 255.0).round().clamp(0.0, 255.0) as u8
}

fn fraction(byte: u8) -> f32 {
    f32::from(byte) / 255.0
}

impl BoneController {
    /// A range with `end < start` wraps through 360 degrees.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.end < self.start
    }

    #[allow(clippy::float_cmp)]
    #[must_use]
    pub fn to_byte(&self, value: f32) -> u8 {
        if self.start == self.end {
            return self.rest;
        }

        if self.is_inverted() {
            let span = self.end + 360.0 - self.start;
            let mut offset = (value - self.start).rem_euclid(360.0);

            if offset > span {
                // outside the arc, snap to the closer end
                offset = if offset - span < 360.0 - offset {
                    span
                } else {
                    0.0
                };
            }

            return quantize(offset / span);
        }

        let mut value = value;
        if self.kind.is_rotation() {
            let mid = (self.start + self.end) / 2.0;
            value = mid - 180.0 + (value - mid + 180.0).rem_euclid(360.0);
        }

        quantize((value - self.start) / (self.end - self.start))
    }

    /// Inverse of [`BoneController::to_byte`]. Inverted ranges map into `[start - 360, end]`.
    #[must_use]
    pub fn to_real(&self, byte: u8) -> f32 {
        if self.is_inverted() {
            let span = self.end + 360.0 - self.start;
            return self.start - 360.0 + fraction(byte) * span;
        }

        self.start + fraction(byte) * (self.end - self.start)
    }
}

impl BlendAxis {
    /// Configured range with inverted intervals swapped.
    #[must_use]
    pub fn range(&self) -> (f32, f32) {
        if self.end < self.start {
            (self.end, self.start)
        } else {
            (self.start, self.end)
        }
    }

    #[allow(clippy::float_cmp)]
    #[must_use]
    pub fn to_byte(&self, value: f32) -> u8 {
        let (low, high) = self.range();

        if low == high {
            return 0;
        }

        quantize((value.clamp(low, high) - low) / (high - low))
    }

    #[must_use]
    pub fn to_real(&self, byte: u8) -> f32 {
        let (low, high) = self.range();
        low + fraction(byte) * (high - low)
    }
}
