//! Fans the live map handle out to the declared overlay children.

use crate::engine::MapHandle;
use crate::overlay::{Overlay, OverlayWrapper};

/// Holds the declared children of one map and the handle they share.
///
/// Children declared before the map is ready are kept but stay off the map;
/// [`OverlayBinder::supply`] is the only way a handle reaches them.
#[derive(Default)]
pub struct OverlayBinder {
    children: Vec<OverlayWrapper<Overlay>>,
    handle: Option<MapHandle>,
}

impl OverlayBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the declared children, reconciling by position.
    ///
    /// A child at an existing position is updated in place (recreated only
    /// if its props changed). New positions are mounted when a handle is
    /// present; dropped positions are unmounted, last first.
    pub fn declare(&mut self, children: Vec<Overlay>) {
        let keep = children.len().min(self.children.len());

        while self.children.len() > keep {
            if let Some(mut removed) = self.children.pop() {
                removed.unmount();
            }
        }

        let mut declared = children.into_iter();
        for (wrapper, props) in self.children.iter_mut().zip(declared.by_ref()) {
            wrapper.update(props);
        }

        for props in declared {
            let mut wrapper = OverlayWrapper::new(props);
            if self.handle.is_some() {
                wrapper.set_map(self.handle.clone());
            }
            self.children.push(wrapper);
        }
    }

    /// Supplies the handle to every child.
    pub fn supply(&mut self, handle: MapHandle) {
        log::debug!("Supplying map handle to {} overlays", self.children.len());
        for child in &mut self.children {
            child.set_map(Some(handle.clone()));
        }
        self.handle = Some(handle);
    }

    /// Unmounts every child in reverse order and forgets the handle.
    ///
    /// The declarations are kept.
    pub fn release(&mut self) {
        for child in self.children.iter_mut().rev() {
            child.unmount();
        }
        self.handle = None;
    }

    pub fn handle(&self) -> Option<&MapHandle> {
        self.handle.as_ref()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &[OverlayWrapper<Overlay>] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::native::{EngineCall, RecordingEngine};
    use crate::engine::MapInit;
    use crate::overlay::{Attached, Layer, Marker, Tag};
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
        (engine.clone(), MapHandle::new(engine))
    }

    fn object_id(child: &OverlayWrapper<Overlay>) -> u64 {
        match child.native() {
            Some(Attached::Object(object)) => object.id(),
            other => panic!("expected an attached object, got {:?}", other),
        }
    }

    fn marker(lon: f64) -> Overlay {
        Marker::new(LonLat::new(lon, 13.0)).into()
    }

    #[test]
    fn test_children_wait_for_handle() {
        let (engine, handle) = map();
        let mut binder = OverlayBinder::new();
        binder.declare(vec![marker(100.0), Tag::new("hotel").into()]);

        assert_eq!(binder.len(), 2);
        assert!(binder.children().iter().all(|child| !child.is_attached()));
        assert!(engine.calls().is_empty());

        binder.supply(handle);
        assert_eq!(engine.overlay_count(), 1);
        assert_eq!(engine.tags(), vec!["hotel"]);
    }

    #[test]
    fn test_resupply_is_idempotent() {
        let (engine, handle) = map();
        let mut binder = OverlayBinder::new();
        binder.declare(vec![marker(100.0)]);

        binder.supply(handle.clone());
        binder.supply(handle);
        assert_eq!(
            engine.count_calls(|call| matches!(call, EngineCall::AddOverlay(_))),
            1
        );
    }

    #[test]
    fn test_declare_reconciles_by_position() {
        let (engine, handle) = map();
        let mut binder = OverlayBinder::new();
        binder.declare(vec![marker(100.0), marker(101.0), marker(102.0)]);
        binder.supply(handle);
        assert_eq!(engine.overlay_count(), 3);

        // Middle changed, tail dropped, first untouched.
        binder.declare(vec![marker(100.0), marker(105.0)]);
        assert_eq!(binder.len(), 2);
        assert_eq!(engine.overlay_count(), 2);
        assert_eq!(
            engine.count_calls(|call| matches!(call, EngineCall::RemoveOverlay(_))),
            2
        );

        // Appended children mount immediately.
        binder.declare(vec![marker(100.0), marker(105.0), marker(106.0)]);
        assert_eq!(engine.overlay_count(), 3);
        assert!(binder.children()[2].is_attached());
    }

    #[test]
    fn test_release_unmounts_in_reverse() {
        let (engine, handle) = map();
        let mut binder = OverlayBinder::new();
        binder.declare(vec![marker(100.0), marker(101.0)]);
        binder.supply(handle);

        let first = object_id(&binder.children()[0]);
        let second = object_id(&binder.children()[1]);

        binder.release();
        let removed: Vec<u64> = engine
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::RemoveOverlay(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![second, first]);
        assert!(binder.handle().is_none());
        assert_eq!(binder.len(), 2);
    }

    #[test]
    fn test_dropping_a_duplicate_keeps_the_shared_object() {
        let (engine, handle) = map();
        let mut binder = OverlayBinder::new();
        binder.declare(vec![
            Layer::predefined("traffic").into(),
            Tag::new("hotel").into(),
            Layer::predefined("TRAFFIC").into(),
            Tag::new("hotel").into(),
        ]);
        binder.supply(handle);
        assert_eq!(engine.layer_names(), vec!["TRAFFIC"]);
        assert_eq!(engine.tags(), vec!["hotel"]);

        binder.declare(vec![
            Layer::predefined("traffic").into(),
            Tag::new("hotel").into(),
        ]);
        assert!(binder.children()[0].is_attached());
        assert_eq!(engine.layer_names(), vec!["TRAFFIC"]);
        assert_eq!(engine.tags(), vec!["hotel"]);

        binder.release();
        assert!(engine.layer_names().is_empty());
        assert!(engine.tags().is_empty());
    }
}
