//! Marker overlay.

use super::{place, Bindable, PopupOptions};
use crate::engine::{MapHandle, NativeObject, OverlayShape};
use crate::error::OverlayError;
use crate::types::{LonLat, Offset, Size, ZoomRange};
use serde::Serialize;

/// Custom marker icon.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerIcon {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<Offset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Raw HTML used instead of the image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Options passed to the engine's marker constructor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerOptions {
    /// Shown on hover.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<MarkerIcon>,
    /// Shown in the popup on click.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_range: Option<ZoomRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popup: Option<PopupOptions>,
}

/// A marker pinned at a position.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: LonLat,
    pub options: MarkerOptions,
}

impl Marker {
    pub fn new(position: LonLat) -> Self {
        Self {
            position,
            options: MarkerOptions::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.options.title = Some(title.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.options.detail = Some(detail.into());
        self
    }

    pub fn with_icon(mut self, icon: MarkerIcon) -> Self {
        self.options.icon = Some(icon);
        self
    }

    pub fn with_visible_range(mut self, min: f64, max: f64) -> Self {
        self.options.visible_range = Some(ZoomRange { min, max });
        self
    }

    pub fn draggable(mut self, draggable: bool) -> Self {
        self.options.draggable = Some(draggable);
        self
    }

    pub fn to_shape(&self) -> OverlayShape {
        OverlayShape::Marker {
            position: self.position,
            options: self.options.clone(),
        }
    }
}

impl Bindable for Marker {
    type Native = NativeObject;

    fn kind(&self) -> &'static str {
        "marker"
    }

    fn attach(&self, map: &MapHandle) -> Result<NativeObject, OverlayError> {
        if !self.position.is_valid() {
            return Err(OverlayError::InvalidGeometry("marker position is not numeric"));
        }
        place(map, &self.to_shape())
    }

    fn detach(&self, map: &MapHandle, native: &NativeObject) {
        map.remove_overlay(native);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_serialize_sparse_camel_case() {
        let marker = Marker::new(LonLat::new(100.0, 13.0))
            .with_title("Home")
            .with_visible_range(5.0, 15.0)
            .draggable(true);

        assert_eq!(
            serde_json::to_value(&marker.options).unwrap(),
            json!({
                "title": "Home",
                "visibleRange": { "min": 5.0, "max": 15.0 },
                "draggable": true
            })
        );
    }

    #[test]
    fn test_icon_is_tracked_by_value() {
        let icon = MarkerIcon {
            url: "https://example.com/pin.png".to_string(),
            offset: Some(Offset { x: 12.0, y: 45.0 }),
            size: None,
            html: None,
        };
        let a = Marker::new(LonLat::new(100.0, 13.0)).with_icon(icon.clone());
        let b = Marker::new(LonLat::new(100.0, 13.0)).with_icon(icon);
        assert_eq!(a, b);

        let moved = MarkerIcon {
            url: "https://example.com/pin.png".to_string(),
            offset: Some(Offset { x: 0.0, y: 0.0 }),
            size: None,
            html: None,
        };
        assert_ne!(a, b.with_icon(moved));
    }
}
