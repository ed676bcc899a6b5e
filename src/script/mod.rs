//! One-time loading of the engine's JavaScript SDK.
//!
//! The SDK is a single external script shared by every map on the page.
//! [`ScriptLoader`] tracks its load state process-wide and guarantees the
//! script element is injected at most once per attempt; every caller that
//! asks while a load is in flight is resolved with the same outcome.
//!
//! The DOM is reached only through [`ScriptHost`]. On WASM targets that is
//! [`DomScriptHost`]; native builds get [`native::ManualScriptHost`], whose
//! completion is driven by the caller (useful for tests and headless tools).

#[cfg(target_arch = "wasm32")]
mod dom;

#[cfg(target_arch = "wasm32")]
pub use dom::DomScriptHost;

use crate::error::LoadError;
use futures_channel::oneshot;
use futures_util::FutureExt;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

/// Base endpoint of the Longdo Map v3 SDK; the API key is appended.
pub const SDK_URL: &str = "https://api.longdo.com/map3/?key=";

/// DOM id of the injected SDK script element.
pub const SCRIPT_ELEMENT_ID: &str = "longdo-map-sdk";

/// Builds the SDK script URL for an API key.
pub fn script_url(api_key: &str) -> String {
    format!("{}{}", SDK_URL, urlencoding::encode(api_key))
}

/// Process-wide load state of the SDK script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLoadState {
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

/// Completion callback handed to a [`ScriptHost`] or a loader caller.
pub type LoadCallback = Box<dyn FnOnce(Result<(), LoadError>)>;

/// Identifies a caller queued behind an in-flight load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// Access to the page the SDK script is injected into.
///
/// Note: no `Send` bounds; the page is single-threaded.
pub trait ScriptHost {
    /// The engine global (`window.longdo`) already exists.
    fn engine_present(&self) -> bool;

    /// An element with the given id is already in the document.
    fn script_exists(&self, id: &str) -> bool;

    /// Appends an async script element and calls `done` once it loads or fails.
    ///
    /// Returns an error if the element could not be injected at all, in
    /// which case `done` is never called.
    fn inject(&self, id: &str, src: &str, done: LoadCallback) -> Result<(), LoadError>;

    /// Removes a previously injected element, if present.
    fn remove_script(&self, id: &str);
}

/// Loads the SDK script at most once and fans the outcome out to callers.
pub struct ScriptLoader {
    host: Rc<dyn ScriptHost>,
    state: Cell<ScriptLoadState>,
    waiters: RefCell<Vec<(LoadTicket, LoadCallback)>>,
    next_ticket: Cell<u64>,
    injections: Cell<usize>,
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    static GLOBAL_LOADER: Rc<ScriptLoader> = ScriptLoader::new(Rc::new(DomScriptHost));
}

impl ScriptLoader {
    pub fn new(host: Rc<dyn ScriptHost>) -> Rc<Self> {
        Rc::new(Self {
            host,
            state: Cell::new(ScriptLoadState::NotLoaded),
            waiters: RefCell::new(Vec::new()),
            next_ticket: Cell::new(0),
            injections: Cell::new(0),
        })
    }

    /// The page-wide loader backed by the real DOM.
    #[cfg(target_arch = "wasm32")]
    pub fn global() -> Rc<Self> {
        GLOBAL_LOADER.with(Rc::clone)
    }

    pub fn state(&self) -> ScriptLoadState {
        self.state.get()
    }

    /// Number of script elements this loader has injected.
    pub fn injections(&self) -> usize {
        self.injections.get()
    }

    /// Number of callers waiting on the in-flight load.
    pub fn waiting(&self) -> usize {
        self.waiters.borrow().len()
    }

    /// Loads the SDK, resolving when it is usable.
    ///
    /// Dropping the future before it resolves withdraws it from the queue.
    pub fn load(self: &Rc<Self>, api_key: &str) -> ScriptLoad {
        let (sender, receiver) = oneshot::channel();
        let ticket = self.load_with(
            api_key,
            Box::new(move |result| {
                let _ = sender.send(result);
            }),
        );
        ScriptLoad {
            receiver,
            loader: Rc::downgrade(self),
            ticket,
        }
    }

    /// Loads the SDK and calls `callback` with the outcome.
    ///
    /// The callback runs synchronously when the SDK is already available or
    /// the script could not be injected; otherwise it is queued and the
    /// returned ticket can withdraw it with [`ScriptLoader::cancel`].
    pub fn load_with(self: &Rc<Self>, api_key: &str, callback: LoadCallback) -> Option<LoadTicket> {
        match self.state.get() {
            ScriptLoadState::Loaded => {
                callback(Ok(()));
                return None;
            }
            ScriptLoadState::Loading => {
                log::debug!("Map script load in flight, queueing caller");
                return Some(self.enqueue(callback));
            }
            ScriptLoadState::NotLoaded | ScriptLoadState::Failed => {}
        }

        if self.host.engine_present() {
            self.state.set(ScriptLoadState::Loaded);
            callback(Ok(()));
            return None;
        }

        if self.state.get() == ScriptLoadState::Failed {
            self.host.remove_script(SCRIPT_ELEMENT_ID);
        } else if self.host.script_exists(SCRIPT_ELEMENT_ID) {
            // Injected outside this loader; assume it defines the engine.
            log::debug!("Map script element already present");
            callback(Ok(()));
            return None;
        }

        let src = script_url(api_key);
        log::info!("Loading map script from {}", SDK_URL);

        self.state.set(ScriptLoadState::Loading);
        let ticket = self.enqueue(callback);

        let weak: Weak<Self> = Rc::downgrade(self);
        let done: LoadCallback = Box::new(move |result| {
            if let Some(loader) = weak.upgrade() {
                loader.finish(result);
            }
        });

        match self.host.inject(SCRIPT_ELEMENT_ID, &src, done) {
            Ok(()) => {
                self.injections.set(self.injections.get() + 1);
                Some(ticket)
            }
            Err(e) => {
                self.finish(Err(e));
                None
            }
        }
    }

    /// Withdraws a queued caller; its callback is dropped without running.
    ///
    /// Returns `false` if the ticket already resolved or was cancelled. The
    /// script load itself carries on for the remaining callers.
    pub fn cancel(&self, ticket: LoadTicket) -> bool {
        let removed = {
            let mut waiters = self.waiters.borrow_mut();
            let before = waiters.len();
            waiters.retain(|(queued, _)| *queued != ticket);
            before != waiters.len()
        };
        if removed {
            log::debug!("Map script caller {:?} withdrawn", ticket);
        }
        removed
    }

    fn enqueue(&self, callback: LoadCallback) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket.get());
        self.next_ticket.set(ticket.0 + 1);
        self.waiters.borrow_mut().push((ticket, callback));
        ticket
    }

    fn finish(&self, result: Result<(), LoadError>) {
        match &result {
            Ok(()) => {
                log::info!("Map script loaded");
                self.state.set(ScriptLoadState::Loaded);
            }
            Err(e) => {
                log::error!("{}", e);
                self.state.set(ScriptLoadState::Failed);
            }
        }

        // Take the waiters out first; a callback may call back into the loader.
        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        for (_, waiter) in waiters {
            waiter(result.clone());
        }
    }
}

/// Future form of [`ScriptLoader::load`].
pub struct ScriptLoad {
    receiver: oneshot::Receiver<Result<(), LoadError>>,
    loader: Weak<ScriptLoader>,
    ticket: Option<LoadTicket>,
}

impl Future for ScriptLoad {
    type Output = Result<(), LoadError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_canceled)) => Poll::Ready(Err(LoadError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ScriptLoad {
    fn drop(&mut self) {
        if let (Some(ticket), Some(loader)) = (self.ticket, self.loader.upgrade()) {
            loader.cancel(ticket);
        }
    }
}

// Native host for development/testing
#[cfg(not(target_arch = "wasm32"))]
pub mod native {
    use super::*;

    /// A script host whose loads complete only when told to.
    ///
    /// Records every injected element so callers can assert on them.
    #[derive(Default)]
    pub struct ManualScriptHost {
        engine_present: Cell<bool>,
        scripts: RefCell<Vec<(String, String)>>,
        pending: RefCell<Vec<LoadCallback>>,
    }

    impl ManualScriptHost {
        pub fn new() -> Rc<Self> {
            Rc::new(Self::default())
        }

        /// Pretends the engine global was defined by other means.
        pub fn set_engine_present(&self, present: bool) {
            self.engine_present.set(present);
        }

        /// `(id, src)` of every element currently in the document.
        pub fn scripts(&self) -> Vec<(String, String)> {
            self.scripts.borrow().clone()
        }

        pub fn pending(&self) -> usize {
            self.pending.borrow().len()
        }

        /// Fires `onload` for every pending script.
        pub fn complete(&self) {
            self.engine_present.set(true);
            self.settle(Ok(()));
        }

        /// Fires `onerror` for every pending script.
        pub fn fail(&self) {
            let src = self
                .scripts
                .borrow()
                .last()
                .map(|(_, src)| src.clone())
                .unwrap_or_default();
            self.settle(Err(LoadError::ScriptFailed(src)));
        }

        fn settle(&self, result: Result<(), LoadError>) {
            let pending = std::mem::take(&mut *self.pending.borrow_mut());
            for done in pending {
                done(result.clone());
            }
        }
    }

    impl ScriptHost for ManualScriptHost {
        fn engine_present(&self) -> bool {
            self.engine_present.get()
        }

        fn script_exists(&self, id: &str) -> bool {
            self.scripts.borrow().iter().any(|(existing, _)| existing == id)
        }

        fn inject(&self, id: &str, src: &str, done: LoadCallback) -> Result<(), LoadError> {
            self.scripts
                .borrow_mut()
                .push((id.to_string(), src.to_string()));
            self.pending.borrow_mut().push(done);
            Ok(())
        }

        fn remove_script(&self, id: &str) {
            self.scripts.borrow_mut().retain(|(existing, _)| existing != id);
        }
    }
}
