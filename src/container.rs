//! The map's container element.

use crate::config::MapConfig;

/// Inline style for the container: configured size, positioned so the
/// engine's absolutely placed UI stays inside it.
pub fn container_style(config: &MapConfig) -> String {
    format!(
        "height: {}; width: {}; position: relative;",
        config.height.to_css(),
        config.width.to_css()
    )
}

/// Creates the container `<div>` under `parent`.
///
/// The container is rendered even if the map never becomes ready.
#[cfg(target_arch = "wasm32")]
pub fn create_container(
    document: &web_sys::Document,
    parent: &web_sys::Element,
    id: &str,
    config: &MapConfig,
) -> Result<web_sys::Element, crate::error::EngineError> {
    use crate::error::EngineError;

    let js_error = |e: wasm_bindgen::JsValue| EngineError::Js(format!("{:?}", e));

    let container = document.create_element("div").map_err(js_error)?;
    container.set_id(id);
    if !config.class_name.is_empty() {
        container.set_class_name(&config.class_name);
    }
    container
        .set_attribute("style", &container_style(config))
        .map_err(js_error)?;
    parent.append_child(&container).map_err(js_error)?;
    Ok(container)
}
