//! Error types for script loading, engine access, overlays, and configuration.
//!
//! None of these are fatal to the host page: load and construction failures
//! end a single map mount, overlay failures are confined to one overlay.

use std::fmt;

/// The engine script could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The script element fired `onerror`.
    ScriptFailed(String),
    /// There is no document to inject the script into.
    NoDocument,
    /// The element could not be created or appended.
    InjectFailed(String),
    /// The loader was dropped before the load settled.
    Abandoned,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::ScriptFailed(src) => write!(f, "Failed to load map script: {}", src),
            LoadError::NoDocument => write!(f, "No document available for script injection"),
            LoadError::InjectFailed(msg) => write!(f, "Script injection failed: {}", msg),
            LoadError::Abandoned => write!(f, "Script load abandoned"),
        }
    }
}

impl std::error::Error for LoadError {}

/// A call into the map engine failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine global is not present.
    NotLoaded,
    /// The placeholder element for the map does not exist.
    MissingContainer(String),
    /// The engine threw or returned something unexpected.
    Js(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotLoaded => write!(f, "Map engine is not loaded"),
            EngineError::MissingContainer(id) => write!(f, "Map container not found: {}", id),
            EngineError::Js(msg) => write!(f, "Engine error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// An overlay could not be put on the map.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayError {
    /// No map handle has been supplied yet.
    MissingHandle,
    /// The declared points cannot form the requested shape.
    InvalidGeometry(&'static str),
    /// The named layer is not one the engine knows.
    UnknownLayer(String),
    /// A tag overlay was declared without a name.
    EmptyTag,
    /// The engine rejected the overlay.
    Engine(EngineError),
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayError::MissingHandle => write!(f, "Map handle is not available yet"),
            OverlayError::InvalidGeometry(reason) => write!(f, "Invalid geometry: {}", reason),
            OverlayError::UnknownLayer(name) => write!(f, "Layer \"{}\" does not exist", name),
            OverlayError::EmptyTag => write!(f, "Tag name is required"),
            OverlayError::Engine(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for OverlayError {}

impl From<EngineError> for OverlayError {
    fn from(e: EngineError) -> Self {
        OverlayError::Engine(e)
    }
}

/// The map configuration is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `apiKey` was empty or whitespace.
    MissingApiKey,
    /// The configuration JSON could not be parsed.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingApiKey => write!(f, "apiKey is required"),
            ConfigError::Parse(msg) => write!(f, "Invalid map configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
