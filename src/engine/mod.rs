//! Capability contract of the external map engine.
//!
//! The engine is never reimplemented here. Everything this crate needs from
//! it goes through two traits:
//!
//! - [`EngineRuntime`] is the loaded SDK namespace (`window.longdo`): it can
//!   tell whether it is present and construct map instances.
//! - [`MapEngine`] is one constructed map instance: view control, events,
//!   overlays, layers, tags, UI toggles.
//!
//! On WASM targets both are implemented by the Longdo JS binding in
//! [`longdo`]. Native builds get the recording engine in [`native`], which
//! keeps enough state to answer queries and logs every call.

#[cfg(target_arch = "wasm32")]
pub mod longdo;

#[cfg(not(target_arch = "wasm32"))]
pub mod native;

use crate::error::EngineError;
use crate::overlay::{GeometryOptions, LayerOptions, MarkerOptions, PopupOptions};
use crate::types::{LonLat, Size};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lowest zoom level the engine accepts.
pub const MIN_ZOOM: f64 = 1.0;
/// Highest zoom level the engine accepts.
pub const MAX_ZOOM: f64 = 20.0;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque reference to an engine-side object (overlay or layer).
///
/// Each object gets a process-unique id so it can be logged and compared
/// without touching the engine.
#[derive(Debug, Clone)]
pub struct NativeObject {
    id: u64,
    #[cfg(target_arch = "wasm32")]
    value: wasm_bindgen::JsValue,
}

impl NativeObject {
    fn next_id() -> u64 {
        NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn new() -> Self {
        Self { id: Self::next_id() }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn from_js(value: wasm_bindgen::JsValue) -> Self {
        Self {
            id: Self::next_id(),
            value,
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn as_js(&self) -> &wasm_bindgen::JsValue {
        &self.value
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for NativeObject {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for NativeObject {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NativeObject {}

/// Zoom request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zoom {
    /// Jump to an absolute level.
    Level(f64),
    /// One level closer.
    In,
    /// One level further out.
    Out,
}

impl Zoom {
    /// Level reached when applying this request at `current`.
    pub fn resolve(&self, current: f64) -> f64 {
        let level = match self {
            Zoom::Level(level) => *level,
            Zoom::In => current + 1.0,
            Zoom::Out => current - 1.0,
        };
        level.clamp(MIN_ZOOM, MAX_ZOOM)
    }
}

/// Special locations the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationMode {
    /// Where the mouse pointer last was.
    Pointer,
    /// The device's geolocation.
    Geolocation,
}

impl LocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationMode::Pointer => "Pointer",
            LocationMode::Geolocation => "Geolocation",
        }
    }
}

/// Engine events that can be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Ready,
    Resize,
    Zoom,
    ZoomRange,
    Location,
    Click,
    Drag,
    Drop,
    LayerChange,
    OverlayClick,
    OverlayChange,
    OverlayDrop,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Ready => "ready",
            EventName::Resize => "resize",
            EventName::Zoom => "zoom",
            EventName::ZoomRange => "zoomRange",
            EventName::Location => "location",
            EventName::Click => "click",
            EventName::Drag => "drag",
            EventName::Drop => "drop",
            EventName::LayerChange => "layerChange",
            EventName::OverlayClick => "overlayClick",
            EventName::OverlayChange => "overlayChange",
            EventName::OverlayDrop => "overlayDrop",
        }
    }
}

/// Built-in UI controls whose visibility can be toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiControl {
    DPad,
    Zoombar,
    Geolocation,
    Terrain,
    LayerSelector,
    Crosshair,
    Scale,
    ContextMenu,
    FullScreen,
}

impl UiControl {
    /// Property name under the engine's `Ui` object.
    pub fn as_str(&self) -> &'static str {
        match self {
            UiControl::DPad => "DPad",
            UiControl::Zoombar => "Zoombar",
            UiControl::Geolocation => "Geolocation",
            UiControl::Terrain => "Terrain",
            UiControl::LayerSelector => "LayerSelector",
            UiControl::Crosshair => "Crosshair",
            UiControl::Scale => "Scale",
            UiControl::ContextMenu => "ContextMenu",
            UiControl::FullScreen => "FullScreen",
        }
    }
}

/// Handler for a bound engine event. The payload is the event argument
/// converted to JSON (`Null` when the event carries none).
pub type EventCallback = Box<dyn FnMut(&serde_json::Value)>;

/// A request to construct a native overlay object.
///
/// These are already validated; the engine only translates parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayShape {
    Marker {
        position: LonLat,
        options: MarkerOptions,
    },
    Popup {
        position: LonLat,
        options: PopupOptions,
    },
    Polyline {
        points: Vec<LonLat>,
        options: GeometryOptions,
    },
    /// `None` entries separate the outer ring from holes.
    Polygon {
        points: Vec<Option<LonLat>>,
        options: GeometryOptions,
    },
    Circle {
        center: LonLat,
        radius: f64,
        options: GeometryOptions,
    },
    Rectangle {
        position: LonLat,
        size: Size,
        options: GeometryOptions,
    },
    Dot {
        position: LonLat,
        options: GeometryOptions,
    },
}

impl OverlayShape {
    /// Engine constructor name for this shape.
    pub fn constructor(&self) -> &'static str {
        match self {
            OverlayShape::Marker { .. } => "Marker",
            OverlayShape::Popup { .. } => "Popup",
            OverlayShape::Polyline { .. } => "Polyline",
            OverlayShape::Polygon { .. } => "Polygon",
            OverlayShape::Circle { .. } => "Circle",
            OverlayShape::Rectangle { .. } => "Rectangle",
            OverlayShape::Dot { .. } => "Dot",
        }
    }
}

/// Parameters for constructing a map instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MapInit {
    /// DOM id of the container element.
    pub placeholder: String,
    /// Predefined layer names, base layer first.
    pub layers: Vec<String>,
    pub location: LonLat,
    pub zoom: f64,
    /// Whether the engine restores the last viewed location. Always false.
    pub lastview: bool,
}

/// The loaded SDK namespace.
pub trait EngineRuntime {
    /// The SDK global is defined.
    fn is_loaded(&self) -> bool;

    /// Constructs a new map instance.
    fn create_map(&self, init: &MapInit) -> Result<Rc<dyn MapEngine>, EngineError>;
}

/// One live map instance.
///
/// All methods take `&self`; implementations use interior mutability since
/// the map is shared between the bootstrapper and every overlay.
pub trait MapEngine {
    /// Current zoom level.
    fn zoom(&self) -> f64;
    fn set_zoom(&self, zoom: Zoom, animate: bool);

    /// Current center.
    fn location(&self) -> LonLat;
    fn location_at(&self, mode: LocationMode) -> Option<LonLat>;
    fn set_location(&self, location: LonLat, animate: bool);

    /// Binds a handler to an engine event. Handlers cannot be unbound.
    fn bind(&self, event: EventName, callback: EventCallback);

    fn create_overlay(&self, shape: &OverlayShape) -> Result<NativeObject, EngineError>;
    fn add_overlay(&self, overlay: &NativeObject);
    fn remove_overlay(&self, overlay: &NativeObject);
    fn clear_overlays(&self);

    /// Looks up one of the engine's predefined layers by (upper-case) name.
    fn predefined_layer(&self, name: &str) -> Option<NativeObject>;
    fn create_layer(&self, name: &str, options: &LayerOptions)
        -> Result<NativeObject, EngineError>;
    fn add_layer(&self, layer: &NativeObject);
    fn remove_layer(&self, layer: &NativeObject);
    fn insert_layer(&self, index: usize, layer: &NativeObject);
    fn set_base_layer(&self, layer: &NativeObject);
    /// Removes every layer except the base layer.
    fn clear_layers(&self);

    fn add_tag(&self, tag: &str);
    fn remove_tag(&self, tag: &str);

    fn set_ui_visible(&self, control: UiControl, visible: bool);

    fn language(&self) -> String;
    fn set_language(&self, language: &str);
}

/// An engine-side object that several overlays may declare at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SharedKey {
    /// A predefined layer, by upper-case name.
    Layer(String),
    Tag(String),
}

/// Shared, read-only reference to the live map.
///
/// Cloning shares the same engine instance and the same count of declared
/// shared objects.
#[derive(Clone)]
pub struct MapHandle {
    engine: Rc<dyn MapEngine>,
    shared: Rc<RefCell<HashMap<SharedKey, usize>>>,
}

impl MapHandle {
    pub fn new(engine: Rc<dyn MapEngine>) -> Self {
        Self {
            engine,
            shared: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Both handles refer to the same engine instance.
    pub fn same_map(&self, other: &MapHandle) -> bool {
        Rc::ptr_eq(&self.engine, &other.engine)
    }

    /// Counts one more declaration of `key`. True for the first one, which
    /// must put the object on the map.
    pub fn retain_shared(&self, key: SharedKey) -> bool {
        let mut shared = self.shared.borrow_mut();
        let count = shared.entry(key).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Counts one declaration of `key` gone. True for the last one, which
    /// must take the object off the map.
    pub fn release_shared(&self, key: &SharedKey) -> bool {
        let mut shared = self.shared.borrow_mut();
        match shared.get(key).copied() {
            Some(count) if count > 1 => {
                shared.insert(key.clone(), count - 1);
                false
            }
            Some(_) => {
                shared.remove(key);
                true
            }
            None => {
                log::warn!("Releasing {:?}, which was never retained", key);
                false
            }
        }
    }

    /// Number of live declarations of `key`.
    pub fn shared_count(&self, key: &SharedKey) -> usize {
        self.shared.borrow().get(key).copied().unwrap_or(0)
    }
}

impl Deref for MapHandle {
    type Target = dyn MapEngine;

    fn deref(&self) -> &Self::Target {
        self.engine.as_ref()
    }
}

impl fmt::Debug for MapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapHandle").finish_non_exhaustive()
    }
}
