//! Geometry overlays: polylines, polygons, circles, dots, donuts, rectangles.
//!
//! Declared points may contain `None` (separators) and non-finite values.
//! Validation happens in [`Geometry::to_shape`]; a geometry that fails it is
//! simply not drawn.

use super::{place, Bindable, PopupOptions};
use crate::engine::{MapHandle, NativeObject, OverlayShape};
use crate::error::OverlayError;
use crate::types::{same_value_eq, LonLat, SameValue, Size, ZoomRange};
use serde::Serialize;

/// Outline style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

/// Options passed to the engine's geometry constructors.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryOptions {
    /// Shown on hover.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Shown in the popup on click.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Shown at the pivot point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popup: Option<PopupOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_range: Option<ZoomRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_style: Option<LineStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivot: Option<LonLat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clickable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<bool>,
    /// Z order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Rectangle width in degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Rectangle height in degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

same_value_eq!(GeometryOptions {
    line_width, weight, width, height
}, eq {
    title, detail, label, popup, visible_range, line_color, fill_color, line_style, pivot,
    clickable, draggable, pointer
});

impl GeometryOptions {
    /// Splits off the rectangle size (default 1×1), leaving the rest.
    pub fn split_size(&self) -> (Size, GeometryOptions) {
        let size = Size::new(self.width.unwrap_or(1.0), self.height.unwrap_or(1.0));
        let rest = GeometryOptions {
            width: None,
            height: None,
            ..self.clone()
        };
        (size, rest)
    }
}

/// Which shape to draw from the declared points.
#[derive(Debug, Clone, Copy)]
pub enum GeometryKind {
    Polyline,
    Polygon,
    Circle { radius: Option<f64> },
    Dot,
    /// A polygon with one hole, split from a single point list.
    Donut,
    /// Anchored at the first point, sized from the options.
    Rectangle,
}

impl PartialEq for GeometryKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (GeometryKind::Circle { radius: a }, GeometryKind::Circle { radius: b }) => a.same(b),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl GeometryKind {
    pub fn name(&self) -> &'static str {
        match self {
            GeometryKind::Polyline => "polyline",
            GeometryKind::Polygon => "polygon",
            GeometryKind::Circle { .. } => "circle",
            GeometryKind::Dot => "dot",
            GeometryKind::Donut => "donut",
            GeometryKind::Rectangle => "rectangle",
        }
    }
}

/// A declared geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub kind: GeometryKind,
    pub points: Vec<Option<LonLat>>,
    pub options: GeometryOptions,
}

/// All points, if there is at least one and none is missing or non-numeric.
fn valid_points(points: &[Option<LonLat>]) -> Option<Vec<LonLat>> {
    if points.is_empty() {
        return None;
    }
    points
        .iter()
        .map(|point| point.filter(LonLat::is_valid))
        .collect()
}

/// The single point of a one-point shape.
fn single_point(points: &[Option<LonLat>]) -> Option<LonLat> {
    match points {
        [Some(point)] if point.is_valid() => Some(*point),
        _ => None,
    }
}

impl Geometry {
    pub fn new(kind: GeometryKind, points: Vec<Option<LonLat>>) -> Self {
        Self {
            kind,
            points,
            options: GeometryOptions::default(),
        }
    }

    pub fn polyline(points: Vec<Option<LonLat>>) -> Self {
        Self::new(GeometryKind::Polyline, points)
    }

    pub fn polygon(points: Vec<Option<LonLat>>) -> Self {
        Self::new(GeometryKind::Polygon, points)
    }

    pub fn circle(points: Vec<Option<LonLat>>, radius: Option<f64>) -> Self {
        Self::new(GeometryKind::Circle { radius }, points)
    }

    pub fn dot(position: LonLat) -> Self {
        Self::new(GeometryKind::Dot, vec![Some(position)])
    }

    pub fn donut(points: Vec<Option<LonLat>>) -> Self {
        Self::new(GeometryKind::Donut, points)
    }

    pub fn rectangle(position: LonLat, width: f64, height: f64) -> Self {
        let mut geometry = Self::new(GeometryKind::Rectangle, vec![Some(position)]);
        geometry.options.width = Some(width);
        geometry.options.height = Some(height);
        geometry
    }

    pub fn with_options(mut self, options: GeometryOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the points and builds the engine construction request.
    pub fn to_shape(&self) -> Result<OverlayShape, OverlayError> {
        let options = self.options.clone();

        match self.kind {
            GeometryKind::Polyline => {
                let points = valid_points(&self.points)
                    .ok_or(OverlayError::InvalidGeometry("polyline needs numeric points"))?;
                Ok(OverlayShape::Polyline { points, options })
            }
            GeometryKind::Polygon => {
                let points = valid_points(&self.points)
                    .ok_or(OverlayError::InvalidGeometry("polygon needs numeric points"))?;
                Ok(OverlayShape::Polygon {
                    points: points.into_iter().map(Some).collect(),
                    options,
                })
            }
            GeometryKind::Circle { radius } => {
                let center = single_point(&self.points)
                    .ok_or(OverlayError::InvalidGeometry("circle needs exactly one point"))?;
                let radius = radius
                    .filter(|r| r.is_finite() && *r > 0.0)
                    .ok_or(OverlayError::InvalidGeometry("circle needs a positive radius"))?;
                Ok(OverlayShape::Circle {
                    center,
                    radius,
                    options,
                })
            }
            GeometryKind::Dot => {
                let position = single_point(&self.points)
                    .ok_or(OverlayError::InvalidGeometry("dot needs exactly one point"))?;
                Ok(OverlayShape::Dot { position, options })
            }
            GeometryKind::Donut => {
                let ring: Vec<LonLat> = self.points.iter().flatten().copied().collect();
                if ring.is_empty() || !ring.iter().all(LonLat::is_valid) {
                    return Err(OverlayError::InvalidGeometry("donut needs numeric points"));
                }

                let mut points: Vec<Option<LonLat>> = ring.into_iter().map(Some).collect();
                points.insert(points.len() / 2, None);
                Ok(OverlayShape::Polygon { points, options })
            }
            GeometryKind::Rectangle => {
                let points = valid_points(&self.points)
                    .ok_or(OverlayError::InvalidGeometry("rectangle needs numeric points"))?;
                let (size, options) = self.options.split_size();
                Ok(OverlayShape::Rectangle {
                    position: points[0],
                    size,
                    options,
                })
            }
        }
    }
}

impl Bindable for Geometry {
    type Native = NativeObject;

    fn kind(&self) -> &'static str {
        self.kind.name()
    }

    fn attach(&self, map: &MapHandle) -> Result<NativeObject, OverlayError> {
        place(map, &self.to_shape()?)
    }

    fn detach(&self, map: &MapHandle, native: &NativeObject) {
        map.remove_overlay(native);
    }
}
