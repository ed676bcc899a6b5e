//! Tag overlay: a named category of points of interest drawn by the engine.

use super::Bindable;
use crate::engine::{MapHandle, SharedKey};
use crate::error::OverlayError;

/// A declared tag, e.g. `"hotel"` (English or Thai names).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Bindable for Tag {
    type Native = String;

    fn kind(&self) -> &'static str {
        "tag"
    }

    fn attach(&self, map: &MapHandle) -> Result<String, OverlayError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(OverlayError::EmptyTag);
        }
        if map.retain_shared(SharedKey::Tag(name.to_string())) {
            map.add_tag(name);
        }
        Ok(name.to_string())
    }

    fn detach(&self, map: &MapHandle, native: &String) {
        if map.release_shared(&SharedKey::Tag(native.clone())) {
            map.remove_tag(native);
        }
    }
}
