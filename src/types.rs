//! Value types shared by the configuration, engine contract, and overlays.
//!
//! All of these serialize with the camelCase field names the Longdo engine
//! expects, so they can be handed to the JS side unchanged.
//!
//! Equality treats NaN as equal to NaN. Overlay props are compared to decide
//! whether the native object must be rebuilt, and a NaN that never equals
//! itself would rebuild it on every declaration.

use geo_types::Coord;
use serde::{Deserialize, Serialize};

/// Value equality for float-carrying props, with NaN equal to NaN.
pub(crate) trait SameValue {
    fn same(&self, other: &Self) -> bool;
}

impl SameValue for f64 {
    fn same(&self, other: &Self) -> bool {
        self == other || (self.is_nan() && other.is_nan())
    }
}

impl<const N: usize> SameValue for [f64; N] {
    fn same(&self, other: &Self) -> bool {
        self.iter().zip(other).all(|(a, b)| a.same(b))
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Implements `PartialEq` for a struct, comparing the first group of fields
/// through [`SameValue`] and the optional `eq { .. }` group with `==`.
macro_rules! same_value_eq {
    ($name:ident { $($field:ident),+ } $(, eq { $($plain:ident),+ })?) => {
        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                $($crate::types::SameValue::same(&self.$field, &other.$field))&&+
                    $($(&& self.$plain == other.$plain)+)?
            }
        }
    };
}

pub(crate) use same_value_eq;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

same_value_eq!(LonLat { lon, lat });

impl LonLat {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Both components are real numbers (not NaN or infinite).
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

impl From<Coord<f64>> for LonLat {
    fn from(coord: Coord<f64>) -> Self {
        Self::new(coord.x, coord.y)
    }
}

impl From<LonLat> for Coord<f64> {
    fn from(position: LonLat) -> Self {
        Coord {
            x: position.lon,
            y: position.lat,
        }
    }
}

/// Width and height, in pixels for UI elements or degrees for rectangles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

same_value_eq!(Size { width, height });

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Pixel offset of a marker icon relative to its anchor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

same_value_eq!(Offset { x, y });

/// Inclusive zoom levels between which an overlay is drawn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
}

same_value_eq!(ZoomRange { min, max });
