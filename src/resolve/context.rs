//! Customization context for one resolution pass.

use std::collections::{BTreeMap, HashMap};

use crate::document::model::ViewDef;
use crate::resolve::tree::ListKey;

/// One item returned by a list/grid content generator.
#[derive(Debug, Clone)]
pub struct ContentItem {
    /// Caller-supplied identity key. Items without a key fall back to their
    /// positional index, which makes reordering indistinguishable from
    /// editing, so callers that animate lists should always key their items.
    pub key: Option<String>,
    pub view: ViewDef,
}

impl ContentItem {
    pub fn new(view: ViewDef) -> Self {
        Self { key: None, view }
    }

    pub fn keyed(key: impl Into<String>, view: ViewDef) -> Self {
        Self {
            key: Some(key.into()),
            view,
        }
    }

    pub(crate) fn list_key(&self, index: usize) -> ListKey {
        match &self.key {
            Some(k) => ListKey::Key(k.clone()),
            None => ListKey::Index(index),
        }
    }
}

/// Generator of replacement content for one list/grid node: called with
/// ascending item indices until it returns `None`. Must be a pure function of
/// its index for the duration of one pass.
pub type ContentGenerator = Box<dyn Fn(usize) -> Option<ContentItem>>;

/// Everything a host customizes about one resolution pass: parameter
/// bindings, the active variant selection, and list/grid content generators.
///
/// Scoped to one document root and passed explicitly through every
/// resolution and transition-building call; the engine keeps no process-wide
/// interaction state.
#[derive(Default)]
pub struct ResolveContext {
    text_params: BTreeMap<String, String>,
    visible_params: BTreeMap<String, bool>,
    /// Variant property name → selected value.
    variants: BTreeMap<String, String>,
    /// Node id → replacement content generator.
    content: HashMap<String, ContentGenerator>,
}

impl ResolveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, param: impl Into<String>, value: impl Into<String>) -> Self {
        self.text_params.insert(param.into(), value.into());
        self
    }

    pub fn with_visible(mut self, param: impl Into<String>, value: bool) -> Self {
        self.visible_params.insert(param.into(), value);
        self
    }

    pub fn with_variant(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.variants.insert(property.into(), value.into());
        self
    }

    pub fn with_content(
        mut self,
        node_id: impl Into<String>,
        generator: ContentGenerator,
    ) -> Self {
        self.content.insert(node_id.into(), generator);
        self
    }

    pub fn text(&self, param: &str) -> Option<&str> {
        self.text_params.get(param).map(String::as_str)
    }

    pub fn visible(&self, param: &str) -> Option<bool> {
        self.visible_params.get(param).copied()
    }

    pub fn variants(&self) -> &BTreeMap<String, String> {
        &self.variants
    }

    pub fn content_generator(&self, node_id: &str) -> Option<&ContentGenerator> {
        self.content.get(node_id)
    }
}

impl std::fmt::Debug for ResolveContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveContext")
            .field("text_params", &self.text_params)
            .field("visible_params", &self.visible_params)
            .field("variants", &self.variants)
            .field("content_nodes", &self.content.keys().collect::<Vec<_>>())
            .finish()
    }
}
