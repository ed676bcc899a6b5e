//! Popup overlay.

use super::{place, Bindable};
use crate::engine::{MapHandle, NativeObject, OverlayShape};
use crate::error::OverlayError;
use crate::types::{LonLat, Size};
use serde::Serialize;

const DEFAULT_TITLE: &str = "Popup";
const DEFAULT_DETAIL: &str = "This is a popup";
const DEFAULT_SIZE: Size = Size::new(200.0, 100.0);

/// Options passed to the engine's popup constructor.
///
/// Also used for the popups attached to markers and geometries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Custom HTML; overrides `detail`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// `None` lets the engine size the popup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closable: Option<bool>,
}

/// A free-standing popup at a position.
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub position: LonLat,
    pub title: Option<String>,
    pub detail: Option<String>,
    pub html: Option<String>,
    pub closable: bool,
    pub size: Size,
}

impl Popup {
    pub fn new(position: LonLat) -> Self {
        Self {
            position,
            title: None,
            detail: None,
            html: None,
            closable: true,
            size: DEFAULT_SIZE,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    pub fn closable(mut self, closable: bool) -> Self {
        self.closable = closable;
        self
    }

    /// Engine options, with the default title and detail filled in.
    pub fn options(&self) -> PopupOptions {
        PopupOptions {
            title: Some(
                self.title
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            ),
            detail: Some(
                self.detail
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DETAIL.to_string()),
            ),
            html: self.html.clone(),
            size: Some(self.size),
            closable: Some(self.closable),
        }
    }

    pub fn to_shape(&self) -> OverlayShape {
        OverlayShape::Popup {
            position: self.position,
            options: self.options(),
        }
    }
}

impl Bindable for Popup {
    type Native = NativeObject;

    fn kind(&self) -> &'static str {
        "popup"
    }

    fn attach(&self, map: &MapHandle) -> Result<NativeObject, OverlayError> {
        if !self.position.is_valid() {
            return Err(OverlayError::InvalidGeometry("popup position is not numeric"));
        }
        place(map, &self.to_shape())
    }

    fn detach(&self, map: &MapHandle, native: &NativeObject) {
        map.remove_overlay(native);
    }
}
