//! Script host backed by the browser DOM.

use super::{LoadCallback, ScriptHost};
use crate::error::LoadError;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlScriptElement};

/// Injects `<script>` elements into `document.body`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomScriptHost;

fn document() -> Option<Document> {
    web_sys::window()?.document()
}

impl ScriptHost for DomScriptHost {
    fn engine_present(&self) -> bool {
        let Some(window) = web_sys::window() else {
            return false;
        };
        js_sys::Reflect::get(&window, &JsValue::from_str("longdo"))
            .map(|longdo| !longdo.is_undefined() && !longdo.is_null())
            .unwrap_or(false)
    }

    fn script_exists(&self, id: &str) -> bool {
        document()
            .and_then(|doc| doc.get_element_by_id(id))
            .is_some()
    }

    fn inject(&self, id: &str, src: &str, done: LoadCallback) -> Result<(), LoadError> {
        let document = document().ok_or(LoadError::NoDocument)?;
        let body = document.body().ok_or(LoadError::NoDocument)?;

        let script: HtmlScriptElement = document
            .create_element("script")
            .map_err(|e| LoadError::InjectFailed(format!("{:?}", e)))?
            .dyn_into()
            .map_err(|_| LoadError::InjectFailed("Not a script element".to_string()))?;

        script.set_id(id);
        script.set_src(src);
        script.set_async(true);

        // onload and onerror share one completion; whichever fires first takes it.
        let done = Rc::new(RefCell::new(Some(done)));

        let on_load_done = done.clone();
        let onload = Closure::wrap(Box::new(move || {
            if let Some(done) = on_load_done.borrow_mut().take() {
                done(Ok(()));
            }
        }) as Box<dyn FnMut()>);

        let failed_src = src.to_string();
        let onerror = Closure::wrap(Box::new(move || {
            if let Some(done) = done.borrow_mut().take() {
                done(Err(LoadError::ScriptFailed(failed_src.clone())));
            }
        }) as Box<dyn FnMut()>);

        script.set_onload(Some(onload.as_ref().unchecked_ref()));
        script.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onload.forget();
        onerror.forget();

        body.append_child(&script)
            .map_err(|e| LoadError::InjectFailed(format!("{:?}", e)))?;

        log::debug!("Injected script element #{}", id);
        Ok(())
    }

    fn remove_script(&self, id: &str) {
        if let Some(element) = document().and_then(|doc| doc.get_element_by_id(id)) {
            element.remove();
        }
    }
}
