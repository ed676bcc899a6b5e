//! Lifecycle of one mounted map.
//!
//! ```text
//! Idle ──mount──▶ Loading ──script ok──▶ Initializing ──ready event──▶ Ready
//!                    │                        │
//!                    └──script/engine error───┴──▶ Error
//!
//! any state ──unmount──▶ Destroyed   (Error stays Error)
//! ```
//!
//! The script load and the engine's ready event are the only suspension
//! points. Neither can be cancelled at its source, so both continuations
//! hold a `Weak` reference to the shared state and check the destroyed flag
//! before doing anything.

use crate::binder::OverlayBinder;
use crate::config::MapConfig;
use crate::engine::{EngineRuntime, EventName, MapHandle, MapInit, Zoom};
use crate::error::LoadError;
use crate::overlay::Overlay;
use crate::script::{LoadTicket, ScriptLoader};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Where a mounted map is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Idle,
    Loading,
    Initializing,
    Ready,
    Destroyed,
    Error,
}

impl BootstrapState {
    /// No further transitions happen from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BootstrapState::Destroyed | BootstrapState::Error)
    }
}

/// Called with the live handle once the map is ready.
pub type ReadyCallback = Rc<dyn Fn(&MapHandle)>;

struct Shared {
    config: MapConfig,
    placeholder: String,
    loader: Rc<ScriptLoader>,
    runtime: Rc<dyn EngineRuntime>,
    state: Cell<BootstrapState>,
    destroyed: Cell<bool>,
    /// Our place in the loader's queue while the script is loading.
    pending_load: Cell<Option<LoadTicket>>,
    handle: RefCell<Option<MapHandle>>,
    on_ready: RefCell<Option<ReadyCallback>>,
    binder: RefCell<OverlayBinder>,
}

impl Shared {
    fn transition(&self, next: BootstrapState) {
        log::debug!(
            "Map #{}: {:?} -> {:?}",
            self.placeholder,
            self.state.get(),
            next
        );
        self.state.set(next);
    }

    fn fail(&self, reason: &dyn std::fmt::Display) {
        log::error!("Map #{} failed to start: {}", self.placeholder, reason);
        self.transition(BootstrapState::Error);
    }

    fn on_script_loaded(self: &Rc<Self>, result: Result<(), LoadError>) {
        self.pending_load.set(None);
        if self.destroyed.get() {
            log::debug!("Map #{} unmounted before the script loaded", self.placeholder);
            return;
        }
        if let Err(e) = result {
            return self.fail(&e);
        }
        if !self.runtime.is_loaded() {
            return self.fail(&crate::error::EngineError::NotLoaded);
        }

        let init = MapInit {
            placeholder: self.placeholder.clone(),
            layers: vec![self.config.base_map.layer_name().to_string()],
            location: self.config.location,
            zoom: self.config.zoom,
            lastview: false,
        };
        let handle = match self.runtime.create_map(&init) {
            Ok(engine) => MapHandle::new(engine),
            Err(e) => return self.fail(&e),
        };

        *self.handle.borrow_mut() = Some(handle.clone());
        self.transition(BootstrapState::Initializing);

        let weak: Weak<Self> = Rc::downgrade(self);
        handle.bind(
            EventName::Ready,
            Box::new(move |_: &serde_json::Value| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_engine_ready();
                }
            }),
        );
    }

    fn on_engine_ready(&self) {
        if self.destroyed.get() || self.state.get() != BootstrapState::Initializing {
            log::debug!("Ignoring ready event for map #{}", self.placeholder);
            return;
        }
        let Some(handle) = self.handle.borrow().clone() else {
            return;
        };

        handle.set_location(self.config.location, false);
        handle.set_zoom(Zoom::Level(self.config.zoom), false);
        self.transition(BootstrapState::Ready);

        // Clone out so the callback may replace itself.
        let callback = self.on_ready.borrow().clone();
        if let Some(callback) = callback {
            callback(&handle);
        }

        // The callback may have unmounted us.
        if !self.destroyed.get() {
            self.binder.borrow_mut().supply(handle);
        }
    }
}

/// Coordinates script loading, engine construction, the ready signal and
/// handing the live map to declared overlays.
pub struct MapBootstrapper {
    shared: Rc<Shared>,
}

impl MapBootstrapper {
    /// Prepares a map for the container with DOM id `placeholder`.
    ///
    /// Nothing happens until [`MapBootstrapper::mount`].
    pub fn new(
        config: MapConfig,
        placeholder: impl Into<String>,
        loader: Rc<ScriptLoader>,
        runtime: Rc<dyn EngineRuntime>,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                config,
                placeholder: placeholder.into(),
                loader,
                runtime,
                state: Cell::new(BootstrapState::Idle),
                destroyed: Cell::new(false),
                pending_load: Cell::new(None),
                handle: RefCell::new(None),
                on_ready: RefCell::new(None),
                binder: RefCell::new(OverlayBinder::new()),
            }),
        }
    }

    /// Creates the container under `parent` and prepares a map in it, using
    /// the page-wide script loader and the Longdo SDK.
    #[cfg(target_arch = "wasm32")]
    pub fn in_element(
        config: MapConfig,
        parent: &web_sys::Element,
        id: &str,
    ) -> Result<Self, crate::error::EngineError> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| crate::error::EngineError::MissingContainer(id.to_string()))?;
        crate::container::create_container(&document, parent, id, &config)?;

        Ok(Self::new(
            config,
            id,
            ScriptLoader::global(),
            Rc::new(crate::engine::longdo::LongdoRuntime),
        ))
    }

    /// Starts loading the engine. Only the first call from `Idle` has an
    /// effect.
    pub fn mount(&self) {
        let shared = &self.shared;
        if shared.destroyed.get() || shared.state.get() != BootstrapState::Idle {
            log::debug!(
                "Map #{} already mounted ({:?})",
                shared.placeholder,
                shared.state.get()
            );
            return;
        }

        shared.transition(BootstrapState::Loading);

        let weak = Rc::downgrade(shared);
        let ticket = shared.loader.load_with(
            &shared.config.api_key,
            Box::new(move |result: Result<(), LoadError>| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_script_loaded(result);
                }
            }),
        );
        // None when the callback already ran.
        shared.pending_load.set(ticket);
    }

    /// Tears the map down: overlays come off in reverse declaration order,
    /// then the map is cleared and the handle released.
    ///
    /// Pending continuations become no-ops. Calling this twice is harmless.
    pub fn unmount(&self) {
        let shared = &self.shared;
        if shared.destroyed.replace(true) {
            return;
        }

        if let Some(ticket) = shared.pending_load.take() {
            shared.loader.cancel(ticket);
        }
        shared.binder.borrow_mut().release();

        let handle = shared.handle.borrow_mut().take();
        if let Some(handle) = handle {
            handle.clear_overlays();
        }

        if shared.state.get() != BootstrapState::Error {
            shared.transition(BootstrapState::Destroyed);
        }
    }

    /// Sets the ready callback.
    ///
    /// If the map is already ready and the callback is a different one (by
    /// `Rc` identity), it is invoked right away and the handle is supplied
    /// to the children again.
    pub fn set_on_ready(&self, callback: Option<ReadyCallback>) {
        let shared = &self.shared;
        let changed = match (&*shared.on_ready.borrow(), &callback) {
            (Some(current), Some(next)) => !Rc::ptr_eq(current, next),
            (None, None) => false,
            _ => true,
        };
        *shared.on_ready.borrow_mut() = callback.clone();

        if !changed {
            return;
        }
        let Some(handle) = self.handle() else {
            return;
        };

        if let Some(callback) = callback {
            callback(&handle);
        }
        if !shared.destroyed.get() {
            shared.binder.borrow_mut().supply(handle);
        }
    }

    /// Declares the overlays drawn on this map.
    ///
    /// Before the map is ready they are only recorded.
    pub fn set_children(&self, children: Vec<Overlay>) {
        self.shared.binder.borrow_mut().declare(children);
    }

    pub fn state(&self) -> BootstrapState {
        self.shared.state.get()
    }

    /// The live map, once ready.
    pub fn handle(&self) -> Option<MapHandle> {
        if self.state() != BootstrapState::Ready || self.shared.destroyed.get() {
            return None;
        }
        self.shared.handle.borrow().clone()
    }

    pub fn config(&self) -> &MapConfig {
        &self.shared.config
    }

    /// DOM id of the container.
    pub fn placeholder(&self) -> &str {
        &self.shared.placeholder
    }

    /// Number of declared overlays.
    pub fn child_count(&self) -> usize {
        self.shared.binder.borrow().len()
    }

    /// Number of declared overlays currently drawn on the map.
    pub fn attached_count(&self) -> usize {
        self.shared
            .binder
            .borrow()
            .children()
            .iter()
            .filter(|child| child.is_attached())
            .count()
    }
}

impl Drop for MapBootstrapper {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BaseMap;
    use crate::engine::native::{EngineCall, RecordingEngine, RecordingRuntime};
    use crate::overlay::{Layer, Marker, Tag};
    use crate::script::native::ManualScriptHost;
    use crate::types::LonLat;
    use serde_json::Value;

    struct Fixture {
        host: Rc<ManualScriptHost>,
        loader: Rc<ScriptLoader>,
        runtime: Rc<RecordingRuntime>,
    }

    fn fixture() -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let host = ManualScriptHost::new();
        let loader = ScriptLoader::new(host.clone());
        Fixture {
            host,
            loader,
            runtime: RecordingRuntime::new(),
        }
    }

    fn bootstrapper(fixture: &Fixture, config: MapConfig) -> MapBootstrapper {
        MapBootstrapper::new(
            config,
            "map",
            fixture.loader.clone(),
            fixture.runtime.clone(),
        )
    }

    fn counter() -> (Rc<Cell<usize>>, ReadyCallback) {
        let count = Rc::new(Cell::new(0));
        let inner = count.clone();
        (count, Rc::new(move |_: &MapHandle| inner.set(inner.get() + 1)))
    }

    /// Mounts, loads the script and returns the constructed engine.
    fn start(fixture: &Fixture, map: &MapBootstrapper) -> Rc<RecordingEngine> {
        map.mount();
        fixture.host.complete();
        fixture.runtime.last_map().unwrap()
    }

    fn config() -> MapConfig {
        MapConfig::new("k1").unwrap()
    }

    fn children() -> Vec<Overlay> {
        vec![
            Marker::new(LonLat::new(100.5, 13.7)).into(),
            Tag::new("hotel").into(),
            Layer::predefined("traffic").into(),
        ]
    }

    fn nothing_added(engine: &RecordingEngine) -> bool {
        engine.count_calls(|call| {
            matches!(
                call,
                EngineCall::AddOverlay(_)
                    | EngineCall::AddTag(_)
                    | EngineCall::AddLayer(_)
                    | EngineCall::InsertLayer(..)
            )
        }) == 0
    }

    #[test]
    fn test_unmount_before_load_never_fires_ready() {
        let fixture = fixture();
        let map = bootstrapper(&fixture, config());
        let (count, callback) = counter();
        map.set_on_ready(Some(callback));
        map.set_children(children());

        map.mount();
        assert_eq!(map.state(), BootstrapState::Loading);
        assert_eq!(fixture.host.scripts().len(), 1);

        map.unmount();
        assert_eq!(map.state(), BootstrapState::Destroyed);
        assert_eq!(fixture.loader.waiting(), 0);

        fixture.host.complete();
        assert_eq!(count.get(), 0);
        assert!(fixture.runtime.maps().is_empty());
        assert_eq!(fixture.host.scripts().len(), 1);
        assert_eq!(map.state(), BootstrapState::Destroyed);
        assert_eq!(map.child_count(), 3);
        assert_eq!(map.attached_count(), 0);

        // A later map on the same page still sees nothing from this one.
        let other = bootstrapper(&fixture, config());
        let engine = start(&fixture, &other);
        engine.fire(EventName::Ready, Value::Null);
        assert!(nothing_added(&engine));
        assert_eq!(map.state(), BootstrapState::Destroyed);
    }

    #[test]
    fn test_remounts_inject_script_once() {
        let fixture = fixture();

        let first = bootstrapper(&fixture, config());
        first.mount();
        let second = bootstrapper(&fixture, config());
        second.mount();
        fixture.host.complete();
        drop(first);
        drop(second);

        let third = bootstrapper(&fixture, config());
        third.mount();
        assert_eq!(third.state(), BootstrapState::Initializing);

        assert_eq!(fixture.host.scripts().len(), 1);
        assert_eq!(fixture.loader.injections(), 1);
        assert_eq!(fixture.runtime.maps().len(), 3);
    }

    #[test]
    fn test_engine_constructed_with_config() {
        let fixture = fixture();
        let config = config()
            .with_location(LonLat::new(98.98, 18.79))
            .with_zoom(7.0)
            .with_base_map(BaseMap::Gray);
        let map = bootstrapper(&fixture, config);
        let engine = start(&fixture, &map);

        let init = engine.init();
        assert_eq!(init.placeholder, "map");
        assert_eq!(init.layers, vec!["GRAY"]);
        assert_eq!(init.location, LonLat::new(98.98, 18.79));
        assert_eq!(init.zoom, 7.0);
        assert!(!init.lastview);
        assert_eq!(engine.calls(), vec![EngineCall::Bind(EventName::Ready)]);
        assert!(map.handle().is_none());
    }

    #[test]
    fn test_ready_applies_view_then_calls_back_once() {
        let fixture = fixture();
        let config = config().with_location(LonLat::new(98.98, 18.79)).with_zoom(7.0);
        let map = bootstrapper(&fixture, config);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        map.set_on_ready(Some(Rc::new(move |handle: &MapHandle| {
            log.borrow_mut().push((handle.location(), handle.zoom()));
        })));

        let engine = start(&fixture, &map);
        engine.fire(EventName::Ready, Value::Null);
        engine.fire(EventName::Ready, Value::Null);

        assert_eq!(map.state(), BootstrapState::Ready);
        assert_eq!(*seen.borrow(), vec![(LonLat::new(98.98, 18.79), 7.0)]);

        let calls = engine.calls();
        let location_at = calls
            .iter()
            .position(|call| matches!(call, EngineCall::SetLocation(_, false)))
            .unwrap();
        let zoom_at = calls
            .iter()
            .position(|call| *call == EngineCall::SetZoom(Zoom::Level(7.0), false))
            .unwrap();
        assert!(location_at < zoom_at);
        assert!(map.handle().is_some());
    }

    #[test]
    fn test_ready_after_unmount_is_ignored() {
        let fixture = fixture();
        let map = bootstrapper(&fixture, config());
        let (count, callback) = counter();
        map.set_on_ready(Some(callback));

        map.set_children(children());

        let engine = start(&fixture, &map);
        map.unmount();
        engine.fire(EventName::Ready, Value::Null);

        assert_eq!(count.get(), 0);
        assert_eq!(map.state(), BootstrapState::Destroyed);
        assert!(map.handle().is_none());
        assert!(nothing_added(&engine));
        assert_eq!(engine.overlay_count(), 0);
        assert!(engine.tags().is_empty());
        assert!(engine.layer_names().is_empty());
        assert_eq!(map.attached_count(), 0);

        // Declarations after teardown are recorded but never drawn.
        map.set_children(vec![Marker::new(LonLat::new(100.6, 13.8)).into()]);
        assert!(nothing_added(&engine));
    }

    #[test]
    fn test_remounts_during_load_leave_no_waiters() {
        let fixture = fixture();
        for _ in 0..5 {
            let map = bootstrapper(&fixture, config());
            map.mount();
            assert_eq!(fixture.loader.waiting(), 1);
            map.unmount();
            assert_eq!(fixture.loader.waiting(), 0);
        }
        assert_eq!(fixture.loader.injections(), 1);

        let map = bootstrapper(&fixture, config());
        map.mount();
        drop(map);
        assert_eq!(fixture.loader.waiting(), 0);
        assert_eq!(fixture.host.scripts().len(), 1);
    }

    #[test]
    fn test_load_failure_moves_to_error() {
        let fixture = fixture();
        let map = bootstrapper(&fixture, config());
        let (count, callback) = counter();
        map.set_on_ready(Some(callback));

        map.mount();
        fixture.host.fail();

        assert_eq!(map.state(), BootstrapState::Error);
        assert!(fixture.runtime.maps().is_empty());
        assert_eq!(count.get(), 0);

        map.unmount();
        assert_eq!(map.state(), BootstrapState::Error);
        assert!(map.state().is_terminal());
    }

    #[test]
    fn test_missing_engine_global_moves_to_error() {
        let fixture = fixture();
        fixture.runtime.set_loaded(false);
        let map = bootstrapper(&fixture, config());

        map.mount();
        fixture.host.complete();

        assert_eq!(map.state(), BootstrapState::Error);
        assert!(fixture.runtime.maps().is_empty());
    }

    #[test]
    fn test_children_get_no_handle_before_ready() {
        let fixture = fixture();
        let map = bootstrapper(&fixture, config());
        map.set_children(vec![
            Marker::new(LonLat::new(100.5, 13.7)).into(),
            Marker::new(LonLat::new(100.6, 13.8)).into(),
            Tag::new("hotel").into(),
        ]);

        let engine = start(&fixture, &map);
        assert_eq!(engine.overlay_count(), 0);
        assert!(engine.tags().is_empty());

        engine.fire(EventName::Ready, Value::Null);
        assert_eq!(engine.overlay_count(), 2);
        assert_eq!(engine.tags(), vec!["hotel"]);
        assert_eq!(map.child_count(), 3);
        assert_eq!(map.attached_count(), 3);
    }

    #[test]
    fn test_teardown_removes_each_overlay_once() {
        let fixture = fixture();
        let map = bootstrapper(&fixture, config());
        map.set_children(vec![
            Marker::new(LonLat::new(100.5, 13.7)).into(),
            Marker::new(LonLat::new(100.6, 13.8)).into(),
        ]);
        let engine = start(&fixture, &map);
        engine.fire(EventName::Ready, Value::Null);

        map.unmount();
        drop(map);

        let calls = engine.calls();
        let mut removed: Vec<u64> = calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::RemoveOverlay(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(removed.len(), 2);
        removed.sort_unstable();
        removed.dedup();
        assert_eq!(removed.len(), 2);
        assert_eq!(calls.last(), Some(&EngineCall::ClearOverlays));
        assert_eq!(engine.overlay_count(), 0);
    }

    #[test]
    fn test_children_declared_after_ready_mount_immediately() {
        let fixture = fixture();
        let map = bootstrapper(&fixture, config());
        let engine = start(&fixture, &map);
        engine.fire(EventName::Ready, Value::Null);

        map.set_children(vec![Marker::new(LonLat::new(100.5, 13.7)).into()]);
        assert_eq!(engine.overlay_count(), 1);

        map.set_children(vec![Marker::new(LonLat::new(100.7, 13.7)).into()]);
        assert_eq!(engine.overlay_count(), 1);
        assert_eq!(
            engine.count_calls(|call| matches!(call, EngineCall::RemoveOverlay(_))),
            1
        );
    }

    #[test]
    fn test_new_ready_callback_is_invoked_once() {
        let fixture = fixture();
        let map = bootstrapper(&fixture, config());
        let (first_count, first) = counter();
        map.set_on_ready(Some(first.clone()));
        let engine = start(&fixture, &map);
        engine.fire(EventName::Ready, Value::Null);
        assert_eq!(first_count.get(), 1);

        // Same identity: nothing happens.
        map.set_on_ready(Some(first));
        assert_eq!(first_count.get(), 1);

        let (second_count, second) = counter();
        map.set_on_ready(Some(second));
        assert_eq!(second_count.get(), 1);
        assert_eq!(first_count.get(), 1);
    }

    #[test]
    fn test_zoom_steps_through_handle() {
        let fixture = fixture();
        let map = bootstrapper(&fixture, config());
        let engine = start(&fixture, &map);
        engine.fire(EventName::Ready, Value::Null);
        let handle = map.handle().unwrap();

        handle.set_zoom(Zoom::Level(5.0), false);
        handle.set_zoom(Zoom::In, true);
        assert_eq!(handle.zoom(), 6.0);

        handle.set_zoom(Zoom::Level(5.0), false);
        handle.set_zoom(Zoom::Out, true);
        assert_eq!(handle.zoom(), 4.0);
    }

    #[test]
    fn test_dropped_bootstrapper_ignores_late_load() {
        let fixture = fixture();
        let map = bootstrapper(&fixture, config());
        map.mount();
        drop(map);

        fixture.host.complete();
        assert!(fixture.runtime.maps().is_empty());
    }

    #[test]
    fn test_mount_is_idempotent() {
        let fixture = fixture();
        let map = bootstrapper(&fixture, config());
        map.mount();
        map.mount();
        assert_eq!(fixture.host.scripts().len(), 1);
        fixture.host.complete();
        assert_eq!(fixture.runtime.maps().len(), 1);
    }
}
