//! Layer overlays.
//!
//! A layer is either one of the engine's predefined layers (looked up by
//! name) or a custom tile/vector source built from [`LayerOptions`].

use super::Bindable;
use crate::engine::{MapHandle, NativeObject, SharedKey};
use crate::error::OverlayError;
use crate::types::same_value_eq;
use serde::Serialize;

/// Source protocol of a custom layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerType {
    Vector,
    Wms,
    Wmts,
    Tms,
    Xyz,
    WmtsRest,
    Custom,
}

impl LayerType {
    /// Key in the engine's `LayerType` table.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerType::Vector => "Vector",
            LayerType::Wms => "WMS",
            LayerType::Wmts => "WMTS",
            LayerType::Tms => "TMS",
            LayerType::Xyz => "XYZ",
            LayerType::WmtsRest => "WMTS_REST",
            LayerType::Custom => "Custom",
        }
    }
}

/// Options passed to the engine's layer constructor.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerOptions {
    /// Set by [`layer_options`]; the engine binding maps it to its own
    /// `LayerType` value.
    #[serde(skip)]
    pub layer_type: Option<LayerType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `[min, max]` zoom, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom_range: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// `[minLon, minLat, maxLon, maxLat]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_matrix_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styles: Option<String>,
}

same_value_eq!(LayerOptions {
    zoom_range, source, opacity, weight, bound
}, eq {
    layer_type, url, attribution, extra_query, id, format, srs, tile_matrix_prefix, styles
});

/// Resolves the options for a custom layer of the given type.
///
/// The id defaults to the layer name. TMS sources are served through the
/// engine's custom type with the tile path appended to `url`.
pub fn layer_options(layer_type: LayerType, name: &str, options: &LayerOptions) -> LayerOptions {
    let mut resolved = options.clone();
    resolved.id = Some(options.id.clone().unwrap_or_else(|| name.to_string()));

    if layer_type == LayerType::Tms {
        let base = options.url.clone().unwrap_or_default();
        resolved.url = Some(format!("{}/{{z}}/{{x}}/{{y}}.png", base));
        resolved.layer_type = Some(LayerType::Custom);
    } else {
        resolved.layer_type = Some(layer_type);
    }

    resolved
}

/// Where a layer comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSource {
    /// One of the engine's built-in layers, e.g. `"TRAFFIC"`.
    Predefined(String),
    Custom {
        name: String,
        layer_type: LayerType,
        options: LayerOptions,
    },
}

/// A declared map layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub source: LayerSource,
    /// Position in the layer stack; `None` puts it on top.
    pub index: Option<usize>,
}

impl Layer {
    pub fn predefined(name: impl Into<String>) -> Self {
        Self {
            source: LayerSource::Predefined(name.into()),
            index: None,
        }
    }

    pub fn custom(layer_type: LayerType, name: impl Into<String>, options: LayerOptions) -> Self {
        Self {
            source: LayerSource::Custom {
                name: name.into(),
                layer_type,
                options,
            },
            index: None,
        }
    }

    pub fn wms(name: impl Into<String>, options: LayerOptions) -> Self {
        Self::custom(LayerType::Wms, name, options)
    }

    pub fn wmts(name: impl Into<String>, options: LayerOptions) -> Self {
        Self::custom(LayerType::Wmts, name, options)
    }

    pub fn tms(name: impl Into<String>, options: LayerOptions) -> Self {
        Self::custom(LayerType::Tms, name, options)
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl Bindable for Layer {
    type Native = NativeObject;

    fn kind(&self) -> &'static str {
        "layer"
    }

    fn attach(&self, map: &MapHandle) -> Result<NativeObject, OverlayError> {
        let layer = match &self.source {
            LayerSource::Predefined(name) => {
                let key = name.to_uppercase();
                let layer = map
                    .predefined_layer(&key)
                    .ok_or_else(|| OverlayError::UnknownLayer(name.clone()))?;
                // Already on the map through another declaration.
                if !map.retain_shared(SharedKey::Layer(key)) {
                    return Ok(layer);
                }
                layer
            }
            LayerSource::Custom {
                name,
                layer_type,
                options,
            } => map.create_layer(name, &layer_options(*layer_type, name, options))?,
        };

        match self.index {
            Some(index) => map.insert_layer(index, &layer),
            None => map.add_layer(&layer),
        }
        Ok(layer)
    }

    fn detach(&self, map: &MapHandle, native: &NativeObject) {
        if let LayerSource::Predefined(name) = &self.source {
            if !map.release_shared(&SharedKey::Layer(name.to_uppercase())) {
                return;
            }
        }
        map.remove_layer(native);
    }
}
