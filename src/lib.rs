//! Declarative bindings for the Longdo Map JavaScript engine.
//!
//! The engine is loaded from an external script and driven imperatively.
//! This crate sits between it and a declarative description of a map:
//!
//! - [`script::ScriptLoader`] injects the SDK script at most once per page;
//! - [`bootstrap::MapBootstrapper`] constructs the map, waits for the
//!   engine's ready event and tears everything down on unmount;
//! - [`binder::OverlayBinder`] hands the live [`engine::MapHandle`] to the
//!   declared overlays once, and only once, the map is ready;
//! - [`overlay::OverlayWrapper`] keeps each declared overlay and its native
//!   object in sync, recreating the object whenever the props change.
//!
//! On WASM targets the engine is the real SDK (`engine::longdo`). Native
//! builds use the recording engine in `engine::native` together with
//! `script::native::ManualScriptHost`.

pub mod binder;
pub mod bootstrap;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod overlay;
pub mod script;
pub mod types;

pub use binder::OverlayBinder;
pub use bootstrap::{BootstrapState, MapBootstrapper, ReadyCallback};
pub use config::{BaseMap, Dimension, MapConfig};
pub use engine::{MapHandle, SharedKey, Zoom};
pub use error::{ConfigError, EngineError, LoadError, OverlayError};
pub use overlay::{Geometry, Layer, Marker, Overlay, OverlayWrapper, Popup, Tag};
pub use script::{LoadTicket, ScriptLoadState, ScriptLoader};
pub use types::LonLat;

/// Routes `log` records to the browser console.
///
/// With the `console_error_panic_hook` feature, panics are reported there
/// too. Safe to call more than once.
#[cfg(target_arch = "wasm32")]
pub fn init_web_logging(level: log::Level) {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    if console_log::init_with_level(level).is_err() {
        log::debug!("Logger already initialised");
    }
}
