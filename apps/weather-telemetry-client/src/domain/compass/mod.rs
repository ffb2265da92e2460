//! Compass Direction Resolution
//!
//! Maps a wind-direction reading in degrees to one of the eight 45° compass
//! octants.
//!
//! # Rounding
//!
//! The octant index is `round_half_even(degree / 45) mod 8`. Readings that
//! sit exactly on an octant boundary (22.5°, 67.5°, ...) resolve to the
//! neighbour with the even index, so 22.5° is `N` and 67.5° is `E`. The modulo
//! is Euclidean, which wraps 360° back to `N` and negative readings into
//! `[0, 360)`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Width of a single compass octant in degrees.
pub const OCTANT_DEGREES: f64 = 45.0;

/// One of the eight compass octants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompassDirection {
    /// North.
    N,
    /// North-east.
    NE,
    /// East.
    E,
    /// South-east.
    SE,
    /// South.
    S,
    /// South-west.
    SW,
    /// West.
    W,
    /// North-west.
    NW,
}

impl CompassDirection {
    /// All octants in clockwise order starting at north.
    pub const ALL: [Self; 8] = [
        Self::N,
        Self::NE,
        Self::E,
        Self::SE,
        Self::S,
        Self::SW,
        Self::W,
        Self::NW,
    ];

    /// Resolve a degree reading to its compass octant.
    ///
    /// Returns `None` for NaN or infinite readings.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_degrees(degree: f64) -> Option<Self> {
        if !degree.is_finite() {
            return None;
        }

        let index = (degree / OCTANT_DEGREES).round_ties_even().rem_euclid(8.0);
        // rem_euclid keeps the value in [0, 8); the float-to-int cast saturates.
        Self::ALL.get(index as usize).copied()
    }

    /// Short compass label (`"N"`, `"NE"`, ...).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::N => "N",
            Self::NE => "NE",
            Self::E => "E",
            Self::SE => "SE",
            Self::S => "S",
            Self::SW => "SW",
            Self::W => "W",
            Self::NW => "NW",
        }
    }
}

impl fmt::Display for CompassDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resolve a degree reading to a compass octant.
///
/// Shorthand for [`CompassDirection::from_degrees`].
#[must_use]
pub fn resolve(degree: f64) -> Option<CompassDirection> {
    CompassDirection::from_degrees(degree)
}
