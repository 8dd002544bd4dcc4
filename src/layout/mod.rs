// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Layout description: which input is painted into which canvas rectangle.
//!
//! Rectangles are fractions of the canvas, so one layout fits every output
//! resolution. The serialized form is the wire format accepted from the
//! session-management layer, a wholesale replacement on every update.

use serde::{Deserialize, Serialize};

/// Fraction of the canvas extent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    /// 0/1
    pub const ZERO: Self = Self {
        numerator: 0,
        denominator: 1,
    };
    /// 1/1
    pub const ONE: Self = Self {
        numerator: 1,
        denominator: 1,
    };

    #[must_use]
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Project this fraction onto a pixel extent.
    ///
    /// 64-bit intermediate so large canvases cannot overflow; a zero
    /// denominator projects to zero instead of failing the frame path.
    #[must_use]
    pub fn scale(&self, extent: u32) -> u32 {
        if self.denominator == 0 {
            return 0;
        }
        (u64::from(extent) * u64::from(self.numerator) / u64::from(self.denominator)) as u32
    }
}

/// Fractional rectangle, all coordinates in [0, 1].
///
/// Oversized rectangles are not rejected here; composition clamps them to
/// the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: Rational,
    pub top: Rational,
    pub width: Rational,
    pub height: Rational,
}

impl Rect {
    /// The whole canvas.
    pub const FULL: Self = Self {
        left: Rational::ZERO,
        top: Rational::ZERO,
        width: Rational::ONE,
        height: Rational::ONE,
    };
}

/// Shape of a paint region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionShape {
    Rectangle(Rect),
}

/// A paint region on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub shape: RegionShape,
}

impl Region {
    #[must_use]
    pub fn rectangle(rect: Rect) -> Self {
        Self {
            shape: RegionShape::Rectangle(rect),
        }
    }

    #[must_use]
    pub fn rect(&self) -> &Rect {
        match &self.shape {
            RegionShape::Rectangle(rect) => rect,
        }
    }
}

/// Binds an input index to a paint region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    /// Input index in [0, `max_input`).
    pub input: u8,
    pub region: Region,
}

impl LayoutEntry {
    #[must_use]
    pub fn new(input: u8, rect: Rect) -> Self {
        Self {
            input,
            region: Region::rectangle(rect),
        }
    }
}

/// Ordered paint list; later entries overdraw earlier ones.
pub type LayoutSolution = Vec<LayoutEntry>;
