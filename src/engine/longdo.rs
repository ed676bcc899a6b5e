//! Binding to the Longdo Map v3 JavaScript SDK (`window.longdo`).
//!
//! Everything is reached through `js_sys::Reflect` so no extern block has to
//! track the SDK's surface. Option structs are marshalled with
//! `serde-wasm-bindgen` in JSON-compatible mode (so `None` becomes `null`).

use super::{
    EngineRuntime, EventCallback, EventName, LocationMode, MapEngine, MapInit, NativeObject,
    OverlayShape, UiControl, Zoom,
};
use crate::error::EngineError;
use crate::overlay::{LayerOptions, LayerType};
use crate::types::LonLat;
use js_sys::{Array, Function, Object, Reflect};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

fn js_error(e: JsValue) -> EngineError {
    EngineError::Js(format!("{:?}", e))
}

fn get(target: &JsValue, key: &str) -> Result<JsValue, EngineError> {
    Reflect::get(target, &JsValue::from_str(key)).map_err(js_error)
}

fn set(target: &JsValue, key: &str, value: &JsValue) -> Result<(), EngineError> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(js_error)
}

fn function(target: &JsValue, name: &str) -> Result<Function, EngineError> {
    get(target, name)?
        .dyn_into::<Function>()
        .map_err(|_| EngineError::Js(format!("{} is not a function", name)))
}

/// Calls `target[method](...args)` with `this` bound to `target`.
fn call(target: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue, EngineError> {
    let args: Array = args.iter().collect();
    function(target, method)?
        .apply(target, &args)
        .map_err(js_error)
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, EngineError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| EngineError::Js(e.to_string()))
}

fn to_json(value: &JsValue) -> serde_json::Value {
    js_sys::JSON::stringify(value)
        .ok()
        .and_then(|json| json.as_string())
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or(serde_json::Value::Null)
}

/// The SDK namespace, if the script has defined it.
fn namespace() -> Option<JsValue> {
    let window = web_sys::window()?;
    let longdo = Reflect::get(&window, &JsValue::from_str("longdo")).ok()?;
    if longdo.is_undefined() || longdo.is_null() {
        None
    } else {
        Some(longdo)
    }
}

/// [`EngineRuntime`] backed by `window.longdo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongdoRuntime;

impl EngineRuntime for LongdoRuntime {
    fn is_loaded(&self) -> bool {
        namespace().is_some()
    }

    fn create_map(&self, init: &MapInit) -> Result<Rc<dyn MapEngine>, EngineError> {
        let longdo = namespace().ok_or(EngineError::NotLoaded)?;
        let placeholder = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(&init.placeholder))
            .ok_or_else(|| EngineError::MissingContainer(init.placeholder.clone()))?;

        let predefined = get(&longdo, "Layers")?;
        let layers = Array::new();
        for name in &init.layers {
            let layer = get(&predefined, name)?;
            if layer.is_undefined() {
                log::warn!("Unknown base layer {}, leaving it to the engine default", name);
                continue;
            }
            layers.push(&layer);
        }

        let options = Object::new();
        set(&options, "placeholder", &placeholder)?;
        if layers.length() > 0 {
            set(&options, "layer", &layers)?;
        }
        set(&options, "lastview", &JsValue::from_bool(init.lastview))?;
        set(&options, "location", &to_js(&init.location)?)?;
        set(&options, "zoom", &JsValue::from_f64(init.zoom))?;

        let constructor = function(&longdo, "Map")?;
        let map = Reflect::construct(&constructor, &Array::of1(&options)).map_err(js_error)?;
        log::debug!("Constructed longdo.Map in #{}", init.placeholder);

        Ok(Rc::new(LongdoMap {
            longdo,
            map,
            closures: RefCell::new(Vec::new()),
        }))
    }
}

/// One `longdo.Map` instance.
pub struct LongdoMap {
    longdo: JsValue,
    map: JsValue,
    /// Event handlers stay alive as long as the map; the SDK cannot unbind.
    closures: RefCell<Vec<Closure<dyn FnMut(JsValue)>>>,
}

impl LongdoMap {
    /// The `map.<component>` sub-object, e.g. `Overlays`.
    fn component(&self, name: &str) -> Result<JsValue, EngineError> {
        get(&self.map, name)
    }

    fn call_on(
        &self,
        component: &str,
        method: &str,
        args: &[JsValue],
    ) -> Result<JsValue, EngineError> {
        call(&self.component(component)?, method, args)
    }

    fn construct(&self, name: &str, args: &[JsValue]) -> Result<JsValue, EngineError> {
        let constructor = function(&self.longdo, name)?;
        let args: Array = args.iter().collect();
        Reflect::construct(&constructor, &args).map_err(js_error)
    }

    fn shape_args(&self, shape: &OverlayShape) -> Result<Vec<JsValue>, EngineError> {
        Ok(match shape {
            OverlayShape::Marker { position, options } => vec![to_js(position)?, to_js(options)?],
            OverlayShape::Popup { position, options } => vec![to_js(position)?, to_js(options)?],
            OverlayShape::Polyline { points, options } => vec![to_js(points)?, to_js(options)?],
            OverlayShape::Polygon { points, options } => vec![to_js(points)?, to_js(options)?],
            OverlayShape::Circle {
                center,
                radius,
                options,
            } => vec![to_js(center)?, JsValue::from_f64(*radius), to_js(options)?],
            OverlayShape::Rectangle {
                position,
                size,
                options,
            } => vec![to_js(position)?, to_js(size)?, to_js(options)?],
            OverlayShape::Dot { position, options } => vec![to_js(position)?, to_js(options)?],
        })
    }

    fn layer_type(&self, layer_type: LayerType) -> Result<JsValue, EngineError> {
        get(&get(&self.longdo, "LayerType")?, layer_type.as_str())
    }

    fn read_location(value: JsValue) -> Option<LonLat> {
        serde_wasm_bindgen::from_value(value).ok()
    }
}

/// Logs a failed engine call; the trait's mutators do not return errors.
fn report(what: &str, result: Result<JsValue, EngineError>) {
    if let Err(e) = result {
        log::warn!("{} failed: {}", what, e);
    }
}

impl MapEngine for LongdoMap {
    fn zoom(&self) -> f64 {
        call(&self.map, "zoom", &[])
            .ok()
            .and_then(|zoom| zoom.as_f64())
            .unwrap_or(super::MIN_ZOOM)
    }

    fn set_zoom(&self, zoom: Zoom, animate: bool) {
        let level = match zoom {
            Zoom::Level(level) => JsValue::from_f64(level),
            Zoom::In => JsValue::TRUE,
            Zoom::Out => JsValue::FALSE,
        };
        report("zoom", call(&self.map, "zoom", &[level, JsValue::from_bool(animate)]));
    }

    fn location(&self) -> LonLat {
        call(&self.map, "location", &[])
            .ok()
            .and_then(Self::read_location)
            .unwrap_or(crate::config::DEFAULT_LOCATION)
    }

    fn location_at(&self, mode: LocationMode) -> Option<LonLat> {
        let mode = get(&get(&self.longdo, "LocationMode").ok()?, mode.as_str()).ok()?;
        call(&self.map, "location", &[mode])
            .ok()
            .and_then(Self::read_location)
    }

    fn set_location(&self, location: LonLat, animate: bool) {
        let result = to_js(&location).and_then(|location| {
            call(&self.map, "location", &[location, JsValue::from_bool(animate)])
        });
        report("location", result);
    }

    fn bind(&self, event: EventName, mut callback: EventCallback) {
        let closure = Closure::wrap(Box::new(move |payload: JsValue| {
            callback(&to_json(&payload));
        }) as Box<dyn FnMut(JsValue)>);

        let result = self.call_on(
            "Event",
            "bind",
            &[JsValue::from_str(event.as_str()), closure.as_ref().clone()],
        );
        report("Event.bind", result);
        self.closures.borrow_mut().push(closure);
    }

    fn create_overlay(&self, shape: &OverlayShape) -> Result<NativeObject, EngineError> {
        let args = self.shape_args(shape)?;
        self.construct(shape.constructor(), &args)
            .map(NativeObject::from_js)
    }

    fn add_overlay(&self, overlay: &NativeObject) {
        report(
            "Overlays.add",
            self.call_on("Overlays", "add", &[overlay.as_js().clone()]),
        );
    }

    fn remove_overlay(&self, overlay: &NativeObject) {
        report(
            "Overlays.remove",
            self.call_on("Overlays", "remove", &[overlay.as_js().clone()]),
        );
    }

    fn clear_overlays(&self) {
        report("Overlays.clear", self.call_on("Overlays", "clear", &[]));
    }

    fn predefined_layer(&self, name: &str) -> Option<NativeObject> {
        let layer = get(&get(&self.longdo, "Layers").ok()?, name).ok()?;
        if layer.is_undefined() || layer.is_null() {
            None
        } else {
            Some(NativeObject::from_js(layer))
        }
    }

    fn create_layer(
        &self,
        name: &str,
        options: &LayerOptions,
    ) -> Result<NativeObject, EngineError> {
        let js_options = to_js(options)?;
        if let Some(layer_type) = options.layer_type {
            set(&js_options, "type", &self.layer_type(layer_type)?)?;
        }
        self.construct("Layer", &[JsValue::from_str(name), js_options])
            .map(NativeObject::from_js)
    }

    fn add_layer(&self, layer: &NativeObject) {
        report("Layers.add", self.call_on("Layers", "add", &[layer.as_js().clone()]));
    }

    fn remove_layer(&self, layer: &NativeObject) {
        report(
            "Layers.remove",
            self.call_on("Layers", "remove", &[layer.as_js().clone()]),
        );
    }

    fn insert_layer(&self, index: usize, layer: &NativeObject) {
        report(
            "Layers.insert",
            self.call_on(
                "Layers",
                "insert",
                &[JsValue::from_f64(index as f64), layer.as_js().clone()],
            ),
        );
    }

    fn set_base_layer(&self, layer: &NativeObject) {
        report(
            "Layers.setBase",
            self.call_on("Layers", "setBase", &[layer.as_js().clone()]),
        );
    }

    fn clear_layers(&self) {
        report("Layers.clear", self.call_on("Layers", "clear", &[]));
    }

    fn add_tag(&self, tag: &str) {
        report("Tags.add", self.call_on("Tags", "add", &[JsValue::from_str(tag)]));
    }

    fn remove_tag(&self, tag: &str) {
        report(
            "Tags.remove",
            self.call_on("Tags", "remove", &[JsValue::from_str(tag)]),
        );
    }

    fn set_ui_visible(&self, control: UiControl, visible: bool) {
        let result = self
            .component("Ui")
            .and_then(|ui| get(&ui, control.as_str()))
            .and_then(|control| call(&control, "visible", &[JsValue::from_bool(visible)]));
        report("Ui.visible", result);
    }

    fn language(&self) -> String {
        call(&self.map, "language", &[])
            .ok()
            .and_then(|language| language.as_string())
            .unwrap_or_default()
    }

    fn set_language(&self, language: &str) {
        report(
            "language",
            call(&self.map, "language", &[JsValue::from_str(language)]),
        );
    }
}
