//! Resolved-node trees.
//!
//! A [`ResolvedTree`] is the concrete output of one resolution pass: an arena
//! of nodes addressed by [`NodeIdx`], with a side map from [`NodeIdentity`] to
//! arena index. Identity, not index, is what survives across generations:
//! two trees of the same document agree on identities for logically-equal
//! elements, which is what the differ matches on.
//!
//! Trees are immutable once resolved except for the layout geometry and the
//! presented values, which the layout bridge and the animation scheduler fill
//! in place.

use std::collections::HashMap;
use std::fmt;

use smallvec::SmallVec;

use crate::document::model::{
    AlignDef, DirectionDef, EdgesDef, JustifyDef, PositionDef, SizeDef, StyleDef, StylePatchDef,
    TransformDef,
};
use crate::foundation::geometry::{Affine, RectPx, Rgba8};
use crate::foundation::ids::NodeIdx;

/// Key of one hop in a node's instantiation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathKey {
    /// Entered a component definition through this instance node id.
    Instance(String),
    /// Entered a list/grid item with this key.
    Item(ListKey),
    /// Marks the outgoing half of a cross-fade overlap pair. Never produced
    /// by the resolver; only appears in merged transition trees, where it
    /// keeps the retained old node from colliding with its replacement.
    Outgoing,
}

/// Identity key of a repeated (list/grid) item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListKey {
    /// Caller-supplied key; survives reordering.
    Key(String),
    /// Positional fallback when the caller supplies no key.
    Index(usize),
}

/// Stable identity of a resolved node across tree generations.
///
/// Composite of the document node id and the instantiation path (component
/// instances entered, list items materialized). Unique within one tree; equal
/// identities across two trees of the same document denote the same logical
/// element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    pub node_id: String,
    pub path: SmallVec<[PathKey; 2]>,
}

impl NodeIdentity {
    pub fn root(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            path: SmallVec::new(),
        }
    }

    pub fn child(&self, node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            path: self.path.clone(),
        }
    }

    /// Identity one instance-hop deeper (entering `instance_id`'s component).
    pub fn into_instance(&self, instance_id: &str, node_id: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(PathKey::Instance(instance_id.to_owned()));
        Self {
            node_id: node_id.into(),
            path,
        }
    }

    /// Identity of a list item under this node.
    pub fn into_item(&self, key: ListKey, node_id: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(PathKey::Item(key));
        Self {
            node_id: node_id.into(),
            path,
        }
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in &self.path {
            match key {
                PathKey::Instance(id) => write!(f, "{id}/")?,
                PathKey::Item(ListKey::Key(k)) => write!(f, "[{k}]/")?,
                PathKey::Item(ListKey::Index(i)) => write!(f, "[#{i}]/")?,
                PathKey::Outgoing => write!(f, "~out/")?,
            }
        }
        write!(f, "{}", self.node_id)
    }
}

/// Leaf kind of a resolved node. Closed union so the differ can match
/// exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    Frame,
    Text { text: String, size_px: f64 },
    Vector { path_d: String },
    /// Geometry reserved for host-supplied content.
    Embedded { slot: String },
}

impl NodeContent {
    /// Same union arm, ignoring payload. A variant switch that swaps vector A
    /// for vector B is the *same* kind (content cross-fade on the node); a
    /// text leaf becoming a frame is not (overlap pair).
    pub fn same_kind(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Frame, Self::Frame)
                | (Self::Text { .. }, Self::Text { .. })
                | (Self::Vector { .. }, Self::Vector { .. })
                | (Self::Embedded { .. }, Self::Embedded { .. })
        )
    }

    /// Does the node's intrinsic size depend on measured content?
    pub fn needs_measure(&self) -> bool {
        matches!(self, Self::Text { .. } | Self::Embedded { .. })
    }
}

/// Resolved style: layout constraints plus paint attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStyle {
    pub size: SizeDef,
    pub min_size: SizeDef,
    pub max_size: SizeDef,
    pub direction: DirectionDef,
    pub justify_content: JustifyDef,
    pub align_items: AlignDef,
    pub position: PositionDef,
    pub gap_px: f64,
    pub padding_px: EdgesDef,
    pub flex_grow: f64,
    pub flex_shrink: f64,

    pub opacity: f32,
    pub transform: Affine,
    pub fill: Option<Rgba8>,
    pub visible: bool,
}

impl NodeStyle {
    pub fn from_def(def: &StyleDef) -> Self {
        Self {
            size: def.size,
            min_size: def.min_size,
            max_size: def.max_size,
            direction: def.direction,
            justify_content: def.justify_content,
            align_items: def.align_items,
            position: def.position,
            gap_px: def.gap_px,
            padding_px: def.padding_px,
            flex_grow: def.flex_grow,
            flex_shrink: def.flex_shrink,
            opacity: def.opacity,
            transform: affine_from_def(&def.transform),
            fill: def.fill,
            visible: def.visible,
        }
    }

    /// Apply an instance override patch. Set fields win over the base.
    pub fn apply_patch(&mut self, patch: &StylePatchDef) {
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity;
        }
        if let Some(fill) = patch.fill {
            self.fill = Some(fill);
        }
        if let Some(transform) = &patch.transform {
            self.transform = affine_from_def(transform);
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
    }
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self::from_def(&StyleDef::default())
    }
}

fn affine_from_def(def: &TransformDef) -> Affine {
    Affine::translate((def.translate[0], def.translate[1]))
        * Affine::rotate(def.rotation_deg.to_radians())
        * Affine::scale_non_uniform(def.scale[0], def.scale[1])
}

/// Concrete per-frame values the renderer reads.
///
/// At steady state these equal the style/layout values; mid-transition the
/// scheduler writes interpolated values here each tick. The renderer performs
/// no interpolation itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Presented {
    pub rect: RectPx,
    pub opacity: f32,
    pub transform: Affine,
    /// 1.0 = fully current content. During a content cross-fade the prior
    /// content is drawn at `1.0 - content_fade`.
    pub content_fade: f32,
}

impl Default for Presented {
    fn default() -> Self {
        Self {
            rect: RectPx::ZERO,
            opacity: 1.0,
            transform: Affine::IDENTITY,
            content_fade: 1.0,
        }
    }
}

/// A node in the resolved arena.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub identity: NodeIdentity,
    pub name: String,
    pub style: NodeStyle,
    pub content: NodeContent,
    /// Outgoing content during a cross-fade; only set on merged transition
    /// trees.
    pub prior_content: Option<NodeContent>,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    /// Filled in place by the layout bridge; `None` until it runs.
    pub layout: Option<RectPx>,
    pub presented: Presented,
}

impl ResolvedNode {
    pub fn new(identity: NodeIdentity, content: NodeContent, style: NodeStyle) -> Self {
        Self {
            identity,
            name: String::new(),
            style,
            content,
            prior_content: None,
            parent: None,
            children: Vec::new(),
            layout: None,
            presented: Presented::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Arena of resolved nodes for one document root and one resolution pass.
#[derive(Debug, Clone)]
pub struct ResolvedTree {
    doc_id: String,
    nodes: Vec<ResolvedNode>,
    index: HashMap<NodeIdentity, NodeIdx>,
}

impl ResolvedTree {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root node index. Valid for any non-empty tree: the first node
    /// pushed is the root.
    pub fn root(&self) -> NodeIdx {
        NodeIdx(0)
    }

    pub fn node(&self, idx: NodeIdx) -> &ResolvedNode {
        &self.nodes[idx.index()]
    }

    pub fn node_mut(&mut self, idx: NodeIdx) -> &mut ResolvedNode {
        &mut self.nodes[idx.index()]
    }

    pub fn nodes(&self) -> &[ResolvedNode] {
        &self.nodes
    }

    pub fn lookup(&self, identity: &NodeIdentity) -> Option<NodeIdx> {
        self.index.get(identity).copied()
    }

    /// Push a node under `parent` (appended as last child). The resolver
    /// pushes parents before children, so arena order is pre-order and
    /// `parent index < child index` holds throughout.
    pub fn push(&mut self, parent: Option<NodeIdx>, mut node: ResolvedNode) -> NodeIdx {
        let idx = NodeIdx(self.nodes.len() as u32);
        node.parent = parent;
        debug_assert!(
            !self.index.contains_key(&node.identity),
            "duplicate identity {} in one tree",
            node.identity
        );
        self.index.insert(node.identity.clone(), idx);
        self.nodes.push(node);
        if let Some(p) = parent {
            self.nodes[p.index()].children.push(idx);
        }
        idx
    }

    /// Push a node under `parent` at child position `pos` (clamped).
    /// Used by the differ to keep removed nodes at their original slots.
    pub fn push_at(&mut self, parent: NodeIdx, pos: usize, node: ResolvedNode) -> NodeIdx {
        let idx = self.push(Some(parent), node);
        let children = &mut self.nodes[parent.index()].children;
        // `push` appended `idx`; move it to `pos`.
        children.pop();
        let pos = pos.min(children.len());
        children.insert(pos, idx);
        idx
    }

    /// Detach `idx` from its parent's child list. The arena slot remains but
    /// traversal no longer reaches the node. Used when a fully-faded node is
    /// removed from a merged transition tree.
    pub fn detach(&mut self, idx: NodeIdx) {
        if let Some(p) = self.nodes[idx.index()].parent {
            self.nodes[p.index()].children.retain(|&c| c != idx);
        }
    }

    /// Rect of `idx` in root space (layout rects are parent-relative).
    pub fn absolute_rect(&self, idx: NodeIdx) -> RectPx {
        let mut rect = self.node(idx).presented.rect;
        let mut cursor = self.node(idx).parent;
        while let Some(p) = cursor {
            let parent = self.node(p);
            rect.x += parent.presented.rect.x;
            rect.y += parent.presented.rect.y;
            cursor = parent.parent;
        }
        rect
    }

    /// Structural-and-style equality, ignoring layout geometry and presented
    /// values. Used for the idempotence short-circuit: when a freshly
    /// resolved tree equals the committed one by this measure, layout and
    /// transition building are skipped entirely.
    pub fn same_structure_and_style(&self, other: &Self) -> bool {
        if self.doc_id != other.doc_id || self.nodes.len() != other.nodes.len() {
            return false;
        }
        self.nodes.iter().zip(other.nodes.iter()).all(|(a, b)| {
            a.identity == b.identity
                && a.content == b.content
                && a.style == b.style
                && a.children == b.children
                && a.parent == b.parent
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(identity: NodeIdentity) -> ResolvedNode {
        ResolvedNode::new(identity, NodeContent::Frame, NodeStyle::default())
    }

    #[test]
    fn push_maintains_preorder_parent_invariant() {
        let mut tree = ResolvedTree::new("doc");
        let root = tree.push(None, frame(NodeIdentity::root("#root")));
        let a = tree.push(Some(root), frame(NodeIdentity::root("#a")));
        let _a1 = tree.push(Some(a), frame(NodeIdentity::root("#a1")));
        let _b = tree.push(Some(root), frame(NodeIdentity::root("#b")));

        for (i, node) in tree.nodes().iter().enumerate() {
            if let Some(p) = node.parent {
                assert!(p.index() < i);
            }
        }
        assert_eq!(tree.node(root).children.len(), 2);
    }

    #[test]
    fn identity_lookup_across_trees() {
        let mut a = ResolvedTree::new("doc");
        let root = a.push(None, frame(NodeIdentity::root("#root")));
        a.push(Some(root), frame(NodeIdentity::root("#child")));

        let mut b = ResolvedTree::new("doc");
        let root = b.push(None, frame(NodeIdentity::root("#root")));
        b.push(Some(root), frame(NodeIdentity::root("#child")));

        let id = NodeIdentity::root("#child");
        assert_eq!(a.lookup(&id), b.lookup(&id));
    }

    #[test]
    fn item_keys_distinguish_list_items() {
        let list = NodeIdentity::root("#list");
        let row_a = list.into_item(ListKey::Key("a".into()), "#row");
        let row_b = list.into_item(ListKey::Key("b".into()), "#row");
        assert_ne!(row_a, row_b);
        assert_eq!(row_a.to_string(), "[a]/#row");
    }

    #[test]
    fn detach_removes_from_traversal_only() {
        let mut tree = ResolvedTree::new("doc");
        let root = tree.push(None, frame(NodeIdentity::root("#root")));
        let a = tree.push(Some(root), frame(NodeIdentity::root("#a")));
        tree.detach(a);
        assert!(tree.node(root).children.is_empty());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn push_at_keeps_original_slot() {
        let mut tree = ResolvedTree::new("doc");
        let root = tree.push(None, frame(NodeIdentity::root("#root")));
        tree.push(Some(root), frame(NodeIdentity::root("#a")));
        tree.push(Some(root), frame(NodeIdentity::root("#c")));
        let b = tree.push_at(root, 1, frame(NodeIdentity::root("#b")));
        assert_eq!(tree.node(root).children[1], b);
    }

    #[test]
    fn structure_equality_ignores_geometry() {
        let mut a = ResolvedTree::new("doc");
        let root = a.push(None, frame(NodeIdentity::root("#root")));
        a.push(Some(root), frame(NodeIdentity::root("#x")));

        let mut b = a.clone();
        b.node_mut(root).layout = Some(RectPx::new(0.0, 0.0, 100.0, 50.0));
        assert!(a.same_structure_and_style(&b));

        b.node_mut(root).style.opacity = 0.5;
        assert!(!a.same_structure_and_style(&b));
    }
}
