//! Declarative overlays and the wrapper that keeps them on the map.
//!
//! Each overlay kind is a plain props struct implementing [`Bindable`]:
//! it knows how to turn itself into a native engine object and how to take
//! that object off the map again. [`OverlayWrapper`] owns one set of props
//! plus the native object currently standing for them, and keeps the two in
//! step:
//!
//! - with a map handle, the native object exists and matches the props;
//! - a props change (compared by value) removes the old object, then
//!   creates and adds a replacement;
//! - unmounting, or dropping the wrapper, removes the object.
//!
//! [`Overlay`] is the closed union of all kinds, used by the binder to hold
//! an arbitrary list of declared children.

mod geometry;
mod layer;
mod marker;
mod popup;
mod tag;

pub use geometry::{Geometry, GeometryKind, GeometryOptions, LineStyle};
pub use layer::{layer_options, Layer, LayerOptions, LayerSource, LayerType};
pub use marker::{Marker, MarkerIcon, MarkerOptions};
pub use popup::{Popup, PopupOptions};
pub use tag::Tag;

use crate::engine::{MapHandle, NativeObject, OverlayShape};
use crate::error::OverlayError;

/// Props that can be materialized as a native engine object.
pub trait Bindable: PartialEq {
    /// What the engine hands back for this overlay.
    type Native;

    /// Short name used in log messages.
    fn kind(&self) -> &'static str;

    /// Creates the native object and puts it on the map.
    fn attach(&self, map: &MapHandle) -> Result<Self::Native, OverlayError>;

    /// Takes a previously attached native object off the map.
    fn detach(&self, map: &MapHandle, native: &Self::Native);
}

/// Constructs an overlay object and adds it to the map.
fn place(map: &MapHandle, shape: &OverlayShape) -> Result<NativeObject, OverlayError> {
    let object = map.create_overlay(shape)?;
    map.add_overlay(&object);
    Ok(object)
}

/// Keeps one declared overlay and its native object in sync.
pub struct OverlayWrapper<B: Bindable> {
    props: B,
    map: Option<MapHandle>,
    native: Option<B::Native>,
}

impl<B: Bindable> OverlayWrapper<B> {
    /// Declares an overlay. Nothing touches the engine until a map is set.
    pub fn new(props: B) -> Self {
        Self {
            props,
            map: None,
            native: None,
        }
    }

    pub fn props(&self) -> &B {
        &self.props
    }

    pub fn native(&self) -> Option<&B::Native> {
        self.native.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.native.is_some()
    }

    /// Supplies (or withdraws) the map handle.
    ///
    /// Supplying the handle the wrapper already holds does nothing.
    pub fn set_map(&mut self, map: Option<MapHandle>) {
        if let (Some(current), Some(next)) = (&self.map, &map) {
            if current.same_map(next) {
                return;
            }
        }

        self.detach();
        self.map = map;
        self.attach();
    }

    /// Replaces the props, recreating the native object if they differ.
    pub fn update(&mut self, props: B) {
        if props == self.props {
            return;
        }

        self.detach();
        self.props = props;
        self.attach();
    }

    /// Removes and recreates the native object from the current props.
    ///
    /// Fails with [`OverlayError::MissingHandle`] before a map is supplied,
    /// or with whatever stopped the replacement from being created.
    pub fn refresh(&mut self) -> Result<(), OverlayError> {
        if self.map.is_none() {
            log::warn!("Cannot refresh {}: {}", self.props.kind(), OverlayError::MissingHandle);
            return Err(OverlayError::MissingHandle);
        }

        self.detach();
        self.try_attach()
    }

    /// Takes the overlay off the map and forgets the handle.
    pub fn unmount(&mut self) {
        self.detach();
        self.map = None;
    }

    fn attach(&mut self) {
        if self.map.is_some() {
            // Failures are logged by try_attach.
            let _ = self.try_attach();
        }
    }

    fn try_attach(&mut self) -> Result<(), OverlayError> {
        let map = self.map.as_ref().ok_or(OverlayError::MissingHandle)?;

        match self.props.attach(map) {
            Ok(native) => {
                self.native = Some(native);
                Ok(())
            }
            Err(e) => {
                match &e {
                    OverlayError::InvalidGeometry(reason) => {
                        log::debug!("Skipping {}: {}", self.props.kind(), reason)
                    }
                    _ => log::warn!("Failed to add {}: {}", self.props.kind(), e),
                }
                Err(e)
            }
        }
    }

    fn detach(&mut self) {
        if let (Some(map), Some(native)) = (&self.map, self.native.take()) {
            self.props.detach(map, &native);
        }
    }
}

impl<B: Bindable> Drop for OverlayWrapper<B> {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Any declared overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Marker(Marker),
    Popup(Popup),
    Geometry(Geometry),
    Layer(Layer),
    Tag(Tag),
}

/// Native side of an attached [`Overlay`].
#[derive(Debug, Clone, PartialEq)]
pub enum Attached {
    /// An overlay or layer object.
    Object(NativeObject),
    /// A tag, identified by name.
    Tag(String),
}

impl Bindable for Overlay {
    type Native = Attached;

    fn kind(&self) -> &'static str {
        match self {
            Overlay::Marker(marker) => marker.kind(),
            Overlay::Popup(popup) => popup.kind(),
            Overlay::Geometry(geometry) => geometry.kind(),
            Overlay::Layer(layer) => layer.kind(),
            Overlay::Tag(tag) => tag.kind(),
        }
    }

    fn attach(&self, map: &MapHandle) -> Result<Attached, OverlayError> {
        match self {
            Overlay::Marker(marker) => marker.attach(map).map(Attached::Object),
            Overlay::Popup(popup) => popup.attach(map).map(Attached::Object),
            Overlay::Geometry(geometry) => geometry.attach(map).map(Attached::Object),
            Overlay::Layer(layer) => layer.attach(map).map(Attached::Object),
            Overlay::Tag(tag) => tag.attach(map).map(Attached::Tag),
        }
    }

    fn detach(&self, map: &MapHandle, native: &Attached) {
        match (self, native) {
            (Overlay::Marker(marker), Attached::Object(object)) => marker.detach(map, object),
            (Overlay::Popup(popup), Attached::Object(object)) => popup.detach(map, object),
            (Overlay::Geometry(geometry), Attached::Object(object)) => {
                geometry.detach(map, object)
            }
            (Overlay::Layer(layer), Attached::Object(object)) => layer.detach(map, object),
            (Overlay::Tag(tag), Attached::Tag(name)) => tag.detach(map, name),
            (overlay, native) => {
                log::error!("{} cannot detach {:?}", overlay.kind(), native);
            }
        }
    }
}

impl From<Marker> for Overlay {
    fn from(marker: Marker) -> Self {
        Overlay::Marker(marker)
    }
}

impl From<Popup> for Overlay {
    fn from(popup: Popup) -> Self {
        Overlay::Popup(popup)
    }
}

impl From<Geometry> for Overlay {
    fn from(geometry: Geometry) -> Self {
        Overlay::Geometry(geometry)
    }
}

impl From<Layer> for Overlay {
    fn from(layer: Layer) -> Self {
        Overlay::Layer(layer)
    }
}

impl From<Tag> for Overlay {
    fn from(tag: Tag) -> Self {
        Overlay::Tag(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::native::{EngineCall, RecordingEngine};
    use crate::engine::MapInit;
    use crate::types::LonLat;
    use std::rc::Rc;

    fn map() -> (Rc<RecordingEngine>, MapHandle) {
        let engine = Rc::new(RecordingEngine::new(MapInit {
            placeholder: "map".to_string(),
            layers: vec!["NORMAL".to_string()],
            location: LonLat::new(100.0, 13.0),
            zoom: 10.0,
            lastview: false,
        }));
        let handle = MapHandle::new(engine.clone());
        (engine, handle)
    }

    fn removes(engine: &RecordingEngine) -> usize {
        engine.count_calls(|call| matches!(call, EngineCall::RemoveOverlay(_)))
    }

    fn adds(engine: &RecordingEngine) -> usize {
        engine.count_calls(|call| matches!(call, EngineCall::AddOverlay(_)))
    }

    #[test]
    fn test_no_side_effects_without_map() {
        let mut wrapper = OverlayWrapper::new(Marker::new(LonLat::new(100.0, 13.0)));
        wrapper.update(Marker::new(LonLat::new(101.0, 13.0)));
        assert_eq!(wrapper.refresh(), Err(OverlayError::MissingHandle));
        assert!(!wrapper.is_attached());
    }

    #[test]
    fn test_refresh_recreates_object() {
        let (engine, handle) = map();
        let mut wrapper = OverlayWrapper::new(Marker::new(LonLat::new(100.0, 13.0)));
        wrapper.set_map(Some(handle.clone()));
        let before = wrapper.native().unwrap().id();

        assert_eq!(wrapper.refresh(), Ok(()));
        assert_ne!(wrapper.native().unwrap().id(), before);
        assert_eq!(removes(&engine), 1);
        assert_eq!(engine.overlay_count(), 1);

        let mut circle = OverlayWrapper::new(Geometry::circle(vec![], Some(10.0)));
        circle.set_map(Some(handle));
        assert!(matches!(
            circle.refresh(),
            Err(OverlayError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_nan_options_do_not_recreate() {
        let (engine, handle) = map();
        let line = || {
            Geometry::polyline(vec![
                Some(LonLat::new(100.0, 13.0)),
                Some(LonLat::new(101.0, 13.0)),
            ])
            .with_options(GeometryOptions {
                line_width: Some(f64::NAN),
                ..Default::default()
            })
        };
        let mut wrapper = OverlayWrapper::new(line());
        wrapper.set_map(Some(handle.clone()));

        wrapper.update(line());
        wrapper.update(line());
        assert_eq!(removes(&engine), 0);
        assert_eq!(adds(&engine), 1);

        let mut layer = OverlayWrapper::new(Layer::wms(
            "osm",
            LayerOptions {
                opacity: Some(f64::NAN),
                ..Default::default()
            },
        ));
        layer.set_map(Some(handle));
        layer.update(Layer::wms(
            "osm",
            LayerOptions {
                opacity: Some(f64::NAN),
                ..Default::default()
            },
        ));
        assert_eq!(
            engine.count_calls(|call| matches!(call, EngineCall::RemoveLayer(_))),
            0
        );
    }

    #[test]
    fn test_mount_adds_one_object() {
        let (engine, handle) = map();
        let mut wrapper = OverlayWrapper::new(Marker::new(LonLat::new(100.0, 13.0)));

        wrapper.set_map(Some(handle.clone()));
        assert!(wrapper.is_attached());
        assert_eq!(engine.overlay_count(), 1);

        // Re-supplying the same handle does not recreate anything.
        wrapper.set_map(Some(handle));
        assert_eq!(adds(&engine), 1);
    }

    #[test]
    fn test_n_changes_make_n_remove_add_pairs() {
        let (engine, handle) = map();
        let mut wrapper = OverlayWrapper::new(Marker::new(LonLat::new(100.0, 13.0)));
        wrapper.set_map(Some(handle));

        for i in 1..=5 {
            wrapper.update(Marker::new(LonLat::new(100.0 + i as f64, 13.0)));
            assert_eq!(engine.overlay_count(), 1);
        }

        assert_eq!(removes(&engine), 5);
        assert_eq!(adds(&engine), 6);
    }

    #[test]
    fn test_equal_props_do_not_recreate() {
        let (engine, handle) = map();
        let marker = Marker::new(LonLat::new(100.0, 13.0)).with_title("Home");
        let mut wrapper = OverlayWrapper::new(marker.clone());
        wrapper.set_map(Some(handle));

        wrapper.update(marker);
        assert_eq!(removes(&engine), 0);
        assert_eq!(adds(&engine), 1);
    }

    #[test]
    fn test_remove_happens_before_replacement_add() {
        let (engine, handle) = map();
        let mut wrapper = OverlayWrapper::new(Marker::new(LonLat::new(100.0, 13.0)));
        wrapper.set_map(Some(handle));
        let first = wrapper.native().unwrap().id();

        wrapper.update(Marker::new(LonLat::new(101.0, 13.0)));
        let second = wrapper.native().unwrap().id();

        let calls = engine.calls();
        let removed_at = calls
            .iter()
            .position(|call| *call == EngineCall::RemoveOverlay(first))
            .unwrap();
        let added_at = calls
            .iter()
            .position(|call| *call == EngineCall::AddOverlay(second))
            .unwrap();
        assert!(removed_at < added_at);
    }

    #[test]
    fn test_unmount_and_drop_remove_exactly_once() {
        let (engine, handle) = map();
        let mut wrapper = OverlayWrapper::new(Marker::new(LonLat::new(100.0, 13.0)));
        wrapper.set_map(Some(handle.clone()));
        wrapper.unmount();
        wrapper.unmount();
        drop(wrapper);
        assert_eq!(removes(&engine), 1);
        assert_eq!(engine.overlay_count(), 0);

        let mut dropped = OverlayWrapper::new(Marker::new(LonLat::new(100.0, 13.0)));
        dropped.set_map(Some(handle));
        drop(dropped);
        assert_eq!(removes(&engine), 2);
    }

    #[test]
    fn test_invalid_geometry_is_skipped_quietly() {
        let (engine, handle) = map();
        let circle = Geometry::circle(vec![Some(LonLat::new(100.0, 13.0))], None);
        let mut wrapper = OverlayWrapper::new(circle);

        wrapper.set_map(Some(handle));
        assert!(!wrapper.is_attached());
        assert_eq!(engine.overlay_count(), 0);

        wrapper.update(Geometry::circle(vec![Some(LonLat::new(100.0, 13.0))], Some(500.0)));
        assert!(wrapper.is_attached());
        assert_eq!(engine.overlay_count(), 1);
    }

    #[test]
    fn test_kind_change_swaps_native_side() {
        let (engine, handle) = map();
        let mut wrapper: OverlayWrapper<Overlay> =
            OverlayWrapper::new(Tag::new("hotel").into());
        wrapper.set_map(Some(handle));
        assert_eq!(engine.tags(), vec!["hotel"]);

        wrapper.update(Marker::new(LonLat::new(100.0, 13.0)).into());
        assert!(engine.tags().is_empty());
        assert_eq!(engine.overlay_count(), 1);
        assert!(matches!(wrapper.native(), Some(Attached::Object(_))));
    }
}
