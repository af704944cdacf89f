//! Document provider seam.

use std::collections::HashMap;

use crate::document::model::{ComponentSetDef, ViewDef};

/// Read access to one design document.
///
/// Implementations must be side-effect-free and return consistent data within
/// one resolution pass; the resolver may look the same node up more than once.
pub trait DocumentProvider {
    /// Stable identifier of the document. Trees resolved from different
    /// documents can never be transitioned into one another.
    fn doc_id(&self) -> &str;

    /// A top-level view by node id.
    fn view(&self, id: &str) -> Option<&ViewDef>;

    /// A component set by id.
    fn component_set(&self, id: &str) -> Option<&ComponentSetDef>;
}

/// Document held directly in memory.
///
/// The fetch/cache subsystem that produces documents is out of scope; hosts
/// and tests construct one of these from parsed boundary defs.
#[derive(Debug, Default)]
pub struct InMemoryDocument {
    doc_id: String,
    views: HashMap<String, ViewDef>,
    components: HashMap<String, ComponentSetDef>,
}

impl InMemoryDocument {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            views: HashMap::new(),
            components: HashMap::new(),
        }
    }

    pub fn with_view(mut self, view: ViewDef) -> Self {
        self.add_view(view);
        self
    }

    pub fn with_component_set(mut self, set: ComponentSetDef) -> Self {
        self.add_component_set(set);
        self
    }

    pub fn add_view(&mut self, view: ViewDef) {
        self.views.insert(view.id.clone(), view);
    }

    pub fn add_component_set(&mut self, set: ComponentSetDef) {
        self.components.insert(set.id.clone(), set);
    }
}

impl DocumentProvider for InMemoryDocument {
    fn doc_id(&self) -> &str {
        &self.doc_id
    }

    fn view(&self, id: &str) -> Option<&ViewDef> {
        self.views.get(id)
    }

    fn component_set(&self, id: &str) -> Option<&ComponentSetDef> {
        self.components.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::model::ViewKindDef;

    #[test]
    fn lookup_by_id() {
        let doc = InMemoryDocument::new("doc-1").with_view(ViewDef {
            id: "#root".into(),
            name: String::new(),
            style: Default::default(),
            bindings: Default::default(),
            kind: ViewKindDef::Frame { children: vec![] },
        });
        assert_eq!(doc.doc_id(), "doc-1");
        assert!(doc.view("#root").is_some());
        assert!(doc.view("#missing").is_none());
    }
}
