//! In-process engine for native builds.
//!
//! [`RecordingRuntime`] and [`RecordingEngine`] stand in for the JS SDK when
//! there is no browser: they keep the view state and the set of objects on
//! the map, log every call as an [`EngineCall`], and let the caller fire
//! engine events by hand. Data is never rendered.

use super::{
    EngineRuntime, EventCallback, EventName, LocationMode, MapEngine, MapInit, NativeObject,
    OverlayShape, UiControl, Zoom,
};
use crate::config::BaseMap;
use crate::error::EngineError;
use crate::overlay::LayerOptions;
use crate::types::LonLat;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Predefined layers the recording engine knows about, besides base maps.
const EXTRA_LAYERS: &[&str] = &["TRAFFIC", "TERRAIN"];

/// One call made against a [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetZoom(Zoom, bool),
    SetLocation(LonLat, bool),
    Bind(EventName),
    CreateOverlay(u64),
    AddOverlay(u64),
    RemoveOverlay(u64),
    ClearOverlays,
    AddLayer(String),
    RemoveLayer(String),
    InsertLayer(usize, String),
    SetBaseLayer(String),
    ClearLayers,
    AddTag(String),
    RemoveTag(String),
    SetUiVisible(UiControl, bool),
    SetLanguage(String),
}

/// A map instance that records instead of rendering.
pub struct RecordingEngine {
    init: MapInit,
    zoom: Cell<f64>,
    location: Cell<LonLat>,
    pointer: Cell<Option<LonLat>>,
    language: RefCell<String>,
    calls: RefCell<Vec<EngineCall>>,
    handlers: RefCell<Vec<(EventName, EventCallback)>>,
    shapes: RefCell<HashMap<u64, OverlayShape>>,
    overlays: RefCell<Vec<u64>>,
    layer_names: RefCell<HashMap<u64, String>>,
    predefined: RefCell<HashMap<String, NativeObject>>,
    base_layer: RefCell<Option<String>>,
    layers: RefCell<Vec<u64>>,
    tags: RefCell<Vec<String>>,
    ui: RefCell<HashMap<UiControl, bool>>,
}

impl RecordingEngine {
    pub fn new(init: MapInit) -> Self {
        let engine = Self {
            zoom: Cell::new(Zoom::Level(init.zoom).resolve(init.zoom)),
            location: Cell::new(init.location),
            pointer: Cell::new(None),
            language: RefCell::new("th".to_string()),
            calls: RefCell::new(Vec::new()),
            handlers: RefCell::new(Vec::new()),
            shapes: RefCell::new(HashMap::new()),
            overlays: RefCell::new(Vec::new()),
            layer_names: RefCell::new(HashMap::new()),
            predefined: RefCell::new(HashMap::new()),
            base_layer: RefCell::new(None),
            layers: RefCell::new(Vec::new()),
            tags: RefCell::new(Vec::new()),
            ui: RefCell::new(HashMap::new()),
            init,
        };
        *engine.base_layer.borrow_mut() = engine.init.layers.first().cloned();
        engine
    }

    /// Parameters the map was constructed with.
    pub fn init(&self) -> &MapInit {
        &self.init
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.borrow().clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| predicate(call)).count()
    }

    /// Shapes currently on the map, in insertion order.
    pub fn overlays(&self) -> Vec<OverlayShape> {
        let shapes = self.shapes.borrow();
        self.overlays
            .borrow()
            .iter()
            .filter_map(|id| shapes.get(id).cloned())
            .collect()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.borrow().len()
    }

    /// Names of the non-base layers on the map, bottom first.
    pub fn layer_names(&self) -> Vec<String> {
        let names = self.layer_names.borrow();
        self.layers
            .borrow()
            .iter()
            .filter_map(|id| names.get(id).cloned())
            .collect()
    }

    pub fn base_layer(&self) -> Option<String> {
        self.base_layer.borrow().clone()
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags.borrow().clone()
    }

    pub fn ui_visible(&self, control: UiControl) -> Option<bool> {
        self.ui.borrow().get(&control).copied()
    }

    /// Sets what `location_at(LocationMode::Pointer)` reports.
    pub fn set_pointer(&self, pointer: Option<LonLat>) {
        self.pointer.set(pointer);
    }

    /// Invokes every handler bound to `event`.
    pub fn fire(&self, event: EventName, payload: serde_json::Value) {
        // Handlers may bind more handlers; run them with the list taken out.
        let mut handlers = std::mem::take(&mut *self.handlers.borrow_mut());
        for (name, handler) in handlers.iter_mut() {
            if *name == event {
                handler(&payload);
            }
        }

        let mut current = self.handlers.borrow_mut();
        handlers.append(&mut current);
        *current = handlers;
    }

    fn record(&self, call: EngineCall) {
        self.calls.borrow_mut().push(call);
    }

    fn layer_name(&self, layer: &NativeObject) -> String {
        self.layer_names
            .borrow()
            .get(&layer.id())
            .cloned()
            .unwrap_or_else(|| format!("#{}", layer.id()))
    }
}

impl MapEngine for RecordingEngine {
    fn zoom(&self) -> f64 {
        self.zoom.get()
    }

    fn set_zoom(&self, zoom: Zoom, animate: bool) {
        self.record(EngineCall::SetZoom(zoom, animate));
        self.zoom.set(zoom.resolve(self.zoom.get()));
    }

    fn location(&self) -> LonLat {
        self.location.get()
    }

    fn location_at(&self, mode: LocationMode) -> Option<LonLat> {
        match mode {
            LocationMode::Pointer => self.pointer.get(),
            LocationMode::Geolocation => None,
        }
    }

    fn set_location(&self, location: LonLat, animate: bool) {
        self.record(EngineCall::SetLocation(location, animate));
        self.location.set(location);
    }

    fn bind(&self, event: EventName, callback: EventCallback) {
        self.record(EngineCall::Bind(event));
        self.handlers.borrow_mut().push((event, callback));
    }

    fn create_overlay(&self, shape: &OverlayShape) -> Result<NativeObject, EngineError> {
        let object = NativeObject::new();
        self.record(EngineCall::CreateOverlay(object.id()));
        self.shapes.borrow_mut().insert(object.id(), shape.clone());
        Ok(object)
    }

    fn add_overlay(&self, overlay: &NativeObject) {
        self.record(EngineCall::AddOverlay(overlay.id()));
        let mut overlays = self.overlays.borrow_mut();
        if !overlays.contains(&overlay.id()) {
            overlays.push(overlay.id());
        }
    }

    fn remove_overlay(&self, overlay: &NativeObject) {
        self.record(EngineCall::RemoveOverlay(overlay.id()));
        self.overlays.borrow_mut().retain(|id| *id != overlay.id());
    }

    fn clear_overlays(&self) {
        self.record(EngineCall::ClearOverlays);
        self.overlays.borrow_mut().clear();
    }

    fn predefined_layer(&self, name: &str) -> Option<NativeObject> {
        let known = BaseMap::from_name_strict(name).is_some() || EXTRA_LAYERS.contains(&name);
        if !known {
            return None;
        }

        let mut predefined = self.predefined.borrow_mut();
        let layer = predefined
            .entry(name.to_string())
            .or_insert_with(NativeObject::new)
            .clone();
        self.layer_names
            .borrow_mut()
            .insert(layer.id(), name.to_string());
        Some(layer)
    }

    fn create_layer(
        &self,
        name: &str,
        options: &LayerOptions,
    ) -> Result<NativeObject, EngineError> {
        let layer = NativeObject::new();
        let label = options.id.clone().unwrap_or_else(|| name.to_string());
        self.layer_names.borrow_mut().insert(layer.id(), label);
        Ok(layer)
    }

    fn add_layer(&self, layer: &NativeObject) {
        self.record(EngineCall::AddLayer(self.layer_name(layer)));
        let mut layers = self.layers.borrow_mut();
        if !layers.contains(&layer.id()) {
            layers.push(layer.id());
        }
    }

    fn remove_layer(&self, layer: &NativeObject) {
        self.record(EngineCall::RemoveLayer(self.layer_name(layer)));
        self.layers.borrow_mut().retain(|id| *id != layer.id());
    }

    fn insert_layer(&self, index: usize, layer: &NativeObject) {
        self.record(EngineCall::InsertLayer(index, self.layer_name(layer)));
        let mut layers = self.layers.borrow_mut();
        layers.retain(|id| *id != layer.id());
        let index = index.min(layers.len());
        layers.insert(index, layer.id());
    }

    fn set_base_layer(&self, layer: &NativeObject) {
        let name = self.layer_name(layer);
        self.record(EngineCall::SetBaseLayer(name.clone()));
        *self.base_layer.borrow_mut() = Some(name);
    }

    fn clear_layers(&self) {
        self.record(EngineCall::ClearLayers);
        self.layers.borrow_mut().clear();
    }

    fn add_tag(&self, tag: &str) {
        self.record(EngineCall::AddTag(tag.to_string()));
        let mut tags = self.tags.borrow_mut();
        if !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }

    fn remove_tag(&self, tag: &str) {
        self.record(EngineCall::RemoveTag(tag.to_string()));
        self.tags.borrow_mut().retain(|existing| existing != tag);
    }

    fn set_ui_visible(&self, control: UiControl, visible: bool) {
        self.record(EngineCall::SetUiVisible(control, visible));
        self.ui.borrow_mut().insert(control, visible);
    }

    fn language(&self) -> String {
        self.language.borrow().clone()
    }

    fn set_language(&self, language: &str) {
        self.record(EngineCall::SetLanguage(language.to_string()));
        *self.language.borrow_mut() = language.to_string();
    }
}

/// Runtime that hands out [`RecordingEngine`]s.
pub struct RecordingRuntime {
    loaded: Cell<bool>,
    maps: RefCell<Vec<Rc<RecordingEngine>>>,
}

impl Default for RecordingRuntime {
    fn default() -> Self {
        Self {
            loaded: Cell::new(true),
            maps: RefCell::new(Vec::new()),
        }
    }
}

impl RecordingRuntime {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Simulates the SDK global being (un)defined.
    pub fn set_loaded(&self, loaded: bool) {
        self.loaded.set(loaded);
    }

    /// Every map constructed so far.
    pub fn maps(&self) -> Vec<Rc<RecordingEngine>> {
        self.maps.borrow().clone()
    }

    pub fn last_map(&self) -> Option<Rc<RecordingEngine>> {
        self.maps.borrow().last().cloned()
    }
}

impl EngineRuntime for RecordingRuntime {
    fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    fn create_map(&self, init: &MapInit) -> Result<Rc<dyn MapEngine>, EngineError> {
        if !self.loaded.get() {
            return Err(EngineError::NotLoaded);
        }
        if init.placeholder.is_empty() {
            return Err(EngineError::MissingContainer(init.placeholder.clone()));
        }

        let engine = Rc::new(RecordingEngine::new(init.clone()));
        self.maps.borrow_mut().push(engine.clone());
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LOCATION;
    use serde_json::json;

    fn engine() -> RecordingEngine {
        RecordingEngine::new(MapInit {
            placeholder: "map".to_string(),
            layers: vec!["NORMAL".to_string()],
            location: DEFAULT_LOCATION,
            zoom: 10.0,
            lastview: false,
        })
    }

    #[test]
    fn test_zoom_steps() {
        let map = engine();
        map.set_zoom(Zoom::Level(5.0), false);
        map.set_zoom(Zoom::In, true);
        assert_eq!(map.zoom(), 6.0);

        map.set_zoom(Zoom::Level(5.0), false);
        map.set_zoom(Zoom::Out, true);
        assert_eq!(map.zoom(), 4.0);
    }

    #[test]
    fn test_fire_reaches_matching_handlers_only() {
        let map = engine();
        let hits = Rc::new(Cell::new(0));

        let counter = hits.clone();
        map.bind(
            EventName::Click,
            Box::new(move |payload: &serde_json::Value| {
                assert_eq!(payload, &json!({ "lon": 100.0 }));
                counter.set(counter.get() + 1);
            }),
        );

        map.fire(EventName::Ready, serde_json::Value::Null);
        assert_eq!(hits.get(), 0);

        map.fire(EventName::Click, json!({ "lon": 100.0 }));
        map.fire(EventName::Click, json!({ "lon": 100.0 }));
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_layers_and_tags() {
        let map = engine();
        assert!(map.predefined_layer("NOPE").is_none());

        let traffic = map.predefined_layer("TRAFFIC").unwrap();
        let gray = map.predefined_layer("GRAY").unwrap();
        map.add_layer(&traffic);
        map.insert_layer(0, &gray);
        assert_eq!(map.layer_names(), vec!["GRAY", "TRAFFIC"]);

        map.remove_layer(&gray);
        assert_eq!(map.layer_names(), vec!["TRAFFIC"]);

        map.set_base_layer(&gray);
        assert_eq!(map.base_layer().as_deref(), Some("GRAY"));

        map.add_tag("hotel");
        map.add_tag("hotel");
        assert_eq!(map.tags(), vec!["hotel"]);
        map.remove_tag("hotel");
        assert!(map.tags().is_empty());
    }

    #[test]
    fn test_location_at_modes() {
        let map = engine();
        assert_eq!(map.location_at(LocationMode::Pointer), None);

        map.set_pointer(Some(LonLat::new(100.52, 13.74)));
        assert_eq!(
            map.location_at(LocationMode::Pointer),
            Some(LonLat::new(100.52, 13.74))
        );
        assert_eq!(map.location_at(LocationMode::Geolocation), None);
        assert_eq!(map.location(), DEFAULT_LOCATION);
    }

    #[test]
    fn test_ui_visibility_and_language() {
        let map = engine();
        assert_eq!(map.ui_visible(UiControl::Zoombar), None);

        map.set_ui_visible(UiControl::Zoombar, false);
        map.set_ui_visible(UiControl::Scale, true);
        assert_eq!(map.ui_visible(UiControl::Zoombar), Some(false));
        assert_eq!(map.ui_visible(UiControl::Scale), Some(true));

        assert_eq!(map.language(), "th");
        map.set_language("en");
        assert_eq!(map.language(), "en");
        assert_eq!(
            map.calls(),
            vec![
                EngineCall::SetUiVisible(UiControl::Zoombar, false),
                EngineCall::SetUiVisible(UiControl::Scale, true),
                EngineCall::SetLanguage("en".to_string()),
            ]
        );
    }

    #[test]
    fn test_clear_layers_keeps_base() {
        let map = engine();
        let traffic = map.predefined_layer("TRAFFIC").unwrap();
        let terrain = map.predefined_layer("TERRAIN").unwrap();
        map.add_layer(&traffic);
        map.add_layer(&terrain);
        assert_eq!(map.layer_names().len(), 2);

        map.clear_layers();
        assert!(map.layer_names().is_empty());
        assert_eq!(map.base_layer().as_deref(), Some("NORMAL"));
        assert_eq!(map.count_calls(|call| *call == EngineCall::ClearLayers), 1);
    }

    #[test]
    fn test_runtime_requires_loaded_sdk() {
        let runtime = RecordingRuntime::new();
        runtime.set_loaded(false);
        let init = engine().init().clone();
        assert_eq!(
            runtime.create_map(&init).err(),
            Some(EngineError::NotLoaded)
        );

        runtime.set_loaded(true);
        assert!(runtime.create_map(&init).is_ok());
        assert_eq!(runtime.maps().len(), 1);
    }
}
