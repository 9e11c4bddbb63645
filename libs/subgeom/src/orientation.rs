//! Instance orientations: rotation plus optional reflection.

use gds21::GdsStrans;
use serde::{Deserialize, Serialize};

/// An orientation applied to a cell instance.
///
/// Reflection about the x-axis is applied first, followed by a
/// counter-clockwise rotation by `angle` degrees.
#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct Orientation {
    /// Reflect vertically (about the x-axis) before rotating.
    pub reflect_vert: bool,
    /// Counter-clockwise rotation in degrees, in the range `[0, 360)`.
    pub angle: f64,
}

impl Orientation {
    pub fn new(reflect_vert: bool, angle: f64) -> Self {
        Self {
            reflect_vert,
            angle: wrap_angle(angle),
        }
    }

    /// Returns `true` if this is the identity orientation.
    pub fn is_default(&self) -> bool {
        !self.reflect_vert && self.angle == 0.
    }

    /// Returns `true` if the rotation is a multiple of 90 degrees.
    pub fn is_rectangular(&self) -> bool {
        self.angle % 90. == 0.
    }
}

/// Named orientations that map axis-aligned rectangles onto axis-aligned rectangles.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Named {
    #[default]
    Default,
    R90,
    R180,
    R270,
    ReflectVert,
    ReflectHoriz,
    /// Reflect vertically, then rotate by 90 degrees.
    FlipYx,
    /// Reflect vertically, then rotate by 270 degrees.
    FlipMinusYx,
}

impl Named {
    /// Returns all eight rectangle-preserving orientations.
    pub fn all_rectangular() -> [Named; 8] {
        [
            Self::Default,
            Self::R90,
            Self::R180,
            Self::R270,
            Self::ReflectVert,
            Self::ReflectHoriz,
            Self::FlipYx,
            Self::FlipMinusYx,
        ]
    }
}

impl From<Named> for Orientation {
    fn from(value: Named) -> Self {
        let (reflect_vert, angle) = match value {
            Named::Default => (false, 0.),
            Named::R90 => (false, 90.),
            Named::R180 => (false, 180.),
            Named::R270 => (false, 270.),
            Named::ReflectVert => (true, 0.),
            Named::ReflectHoriz => (true, 180.),
            Named::FlipYx => (true, 90.),
            Named::FlipMinusYx => (true, 270.),
        };
        Self {
            reflect_vert,
            angle,
        }
    }
}

impl From<&GdsStrans> for Orientation {
    fn from(value: &GdsStrans) -> Self {
        Self::new(value.reflected, value.angle.unwrap_or_default())
    }
}

/// Builds the GDSII transform record for an orientation and magnification.
///
/// Returns [`None`] for the identity transform.
pub fn to_strans(orientation: Orientation, mag: f64) -> Option<GdsStrans> {
    if orientation.is_default() && mag == 1. {
        return None;
    }
    Some(GdsStrans {
        reflected: orientation.reflect_vert,
        angle: (orientation.angle != 0.).then_some(orientation.angle),
        mag: (mag != 1.).then_some(mag),
        ..Default::default()
    })
}

/// Wraps an angle in degrees into the range `[0, 360)`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.);
    // `rem_euclid` can round tiny negative inputs up to exactly 360.
    if wrapped >= 360. {
        0.
    } else {
        wrapped
    }
}
