//! Map configuration.
//!
//! Mirrors the props a map component accepts. Everything except `apiKey`
//! has a default, and configs can be read from JSON so pages can ship them
//! alongside their markup.

use crate::error::ConfigError;
use crate::types::LonLat;
use serde::{Deserialize, Serialize};

/// Bangkok, Thailand.
pub const DEFAULT_LOCATION: LonLat = LonLat::new(100.529248, 13.672898);

pub const DEFAULT_ZOOM: f64 = 10.0;

/// A CSS length given either as a pixel count or a raw CSS value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    Px(f64),
    Css(String),
}

impl Dimension {
    /// Renders the dimension as a CSS value.
    pub fn to_css(&self) -> String {
        match self {
            Dimension::Px(px) => format!("{}px", px),
            Dimension::Css(value) => value.clone(),
        }
    }
}

impl From<f64> for Dimension {
    fn from(px: f64) -> Self {
        Dimension::Px(px)
    }
}

impl From<&str> for Dimension {
    fn from(value: &str) -> Self {
        Dimension::Css(value.to_string())
    }
}

/// Base map style, named after the engine's predefined layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BaseMap {
    #[default]
    Normal,
    Gray,
    Dark,
    Political,
    Hybrid,
}

impl BaseMap {
    /// Name of the predefined layer in the engine's `Layers` table.
    pub fn layer_name(&self) -> &'static str {
        match self {
            BaseMap::Normal => "NORMAL",
            BaseMap::Gray => "GRAY",
            BaseMap::Dark => "DARK",
            BaseMap::Political => "POLITICAL",
            BaseMap::Hybrid => "HYBRID",
        }
    }

    /// Looks up a base map by name, case-insensitively.
    pub fn from_name_strict(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Some(BaseMap::Normal),
            "GRAY" | "GREY" => Some(BaseMap::Gray),
            "DARK" => Some(BaseMap::Dark),
            "POLITICAL" => Some(BaseMap::Political),
            "HYBRID" => Some(BaseMap::Hybrid),
            _ => None,
        }
    }

    /// Like [`BaseMap::from_name_strict`], but unrecognized names fall back
    /// to [`BaseMap::Normal`].
    pub fn from_name(name: &str) -> Self {
        Self::from_name_strict(name).unwrap_or_else(|| {
            log::warn!("Unknown base map \"{}\", using NORMAL", name);
            BaseMap::Normal
        })
    }
}

impl From<String> for BaseMap {
    fn from(name: String) -> Self {
        BaseMap::from_name(&name)
    }
}

impl From<BaseMap> for String {
    fn from(base: BaseMap) -> Self {
        base.layer_name().to_string()
    }
}

/// Configuration for a single map mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    /// Longdo Map API key. Required.
    pub api_key: String,
    /// Initial center, applied once the engine is ready.
    #[serde(default = "default_location")]
    pub location: LonLat,
    /// Initial zoom level, applied once the engine is ready.
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default = "default_height")]
    pub height: Dimension,
    #[serde(default = "default_width")]
    pub width: Dimension,
    #[serde(default)]
    pub base_map: BaseMap,
    /// CSS class applied to the container element.
    #[serde(default)]
    pub class_name: String,
}

fn default_location() -> LonLat {
    DEFAULT_LOCATION
}

fn default_zoom() -> f64 {
    DEFAULT_ZOOM
}

fn default_height() -> Dimension {
    Dimension::Px(400.0)
}

fn default_width() -> Dimension {
    Dimension::Css("100%".to_string())
}

impl MapConfig {
    /// Creates a config with defaults for everything but the API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let config = Self {
            api_key: api_key.into(),
            location: default_location(),
            zoom: default_zoom(),
            height: default_height(),
            width: default_width(),
            base_map: BaseMap::default(),
            class_name: String::new(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }

    pub fn with_location(mut self, location: LonLat) -> Self {
        self.location = location;
        self
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_size(mut self, width: impl Into<Dimension>, height: impl Into<Dimension>) -> Self {
        self.width = width.into();
        self.height = height.into();
        self
    }

    pub fn with_base_map(mut self, base_map: BaseMap) -> Self {
        self.base_map = base_map;
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }
}
