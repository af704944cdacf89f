//! Flattens resolved trees, drives the oracle, writes geometry back.

use std::collections::HashMap;

use xxhash_rust::xxh3::Xxh3;

use crate::foundation::error::{ArborResult, DiagnosticKind, Diagnostics};
use crate::foundation::geometry::{RectPx, Viewport};
use crate::foundation::ids::NodeIdx;
use crate::layout::oracle::{LayoutConstraints, LayoutOracle, LayoutRequest, MeasureHost};
use crate::resolve::tree::{ListKey, NodeContent, NodeIdentity, PathKey, ResolvedTree};

/// Content-level measurement the host plugs in.
///
/// Real text shaping is out of scope for the engine; the bridge snapshots the
/// content of measured nodes and adapts this seam into the oracle's
/// identity-keyed re-entrant callback.
pub trait ContentMeasure {
    fn measure_text(&mut self, text: &str, size_px: f64, available_width: f32) -> (f32, f32);

    fn measure_embedded(&mut self, _slot: &str, _aw: f32, _ah: f32) -> (f32, f32) {
        (0.0, 0.0)
    }
}

/// Character-grid text measurement: ~0.5 em advance per character, wrapped
/// against the available width. Enough for layout to converge in tests and
/// headless hosts; UI hosts supply a shaping-backed implementation.
#[derive(Debug, Default)]
pub struct HeuristicMeasure;

impl ContentMeasure for HeuristicMeasure {
    fn measure_text(&mut self, text: &str, size_px: f64, available_width: f32) -> (f32, f32) {
        let advance = (size_px as f32) * 0.5;
        let line_height = (size_px as f32) * 1.2;
        let full_width = advance * text.chars().count() as f32;
        if available_width.is_finite() && available_width > 0.0 && full_width > available_width {
            let lines = (full_width / available_width).ceil().max(1.0);
            (available_width, lines * line_height)
        } else {
            (full_width, line_height)
        }
    }
}

/// Oracle-facing adapter: measurement functions registered per node identity,
/// resolved against the content snapshot taken while flattening.
struct RegisteredMeasures<'a> {
    sources: HashMap<NodeIdentity, NodeContent>,
    content: &'a mut dyn ContentMeasure,
}

impl MeasureHost for RegisteredMeasures<'_> {
    fn measure(&mut self, identity: &NodeIdentity, aw: f32, ah: f32) -> (f32, f32) {
        match self.sources.get(identity) {
            Some(NodeContent::Text { text, size_px }) => {
                self.content.measure_text(text, *size_px, aw)
            }
            Some(NodeContent::Embedded { slot }) => self.content.measure_embedded(slot, aw, ah),
            _ => (0.0, 0.0),
        }
    }
}

/// Bridges resolved trees to the layout oracle.
///
/// Flattening walks the tree's child lists (not the raw arena) so merged
/// transition trees with detached nodes flatten correctly, and child order
/// (which drives flex placement) is respected.
#[derive(Debug, Default)]
pub struct LayoutBridge;

impl LayoutBridge {
    pub fn new() -> Self {
        Self
    }

    /// Compute geometry for `tree` and seed the presented values from the
    /// style + fresh rects. This is the steady-state entry point.
    #[tracing::instrument(level = "debug", skip_all, fields(nodes = tree.len()))]
    pub fn compute_layout(
        &mut self,
        tree: &mut ResolvedTree,
        viewport: Viewport,
        oracle: &mut dyn LayoutOracle,
        measure: &mut dyn ContentMeasure,
        diags: &mut Diagnostics,
    ) -> ArborResult<()> {
        let order = self.apply_layout(tree, viewport, oracle, measure, diags, None)?;
        for idx in order {
            let node = tree.node_mut(idx);
            node.presented.rect = node.layout.unwrap_or(RectPx::ZERO);
            node.presented.opacity = node.style.opacity;
            node.presented.transform = node.style.transform;
            node.presented.content_fade = 1.0;
        }
        Ok(())
    }

    /// Recompute geometry only, leaving presented values untouched. Used by
    /// the animation scheduler to re-seat in-flight position targets when an
    /// animated size perturbs sibling layout; `size_overrides` pins animated
    /// nodes at their current interpolated sizes.
    pub fn relayout(
        &mut self,
        tree: &mut ResolvedTree,
        viewport: Viewport,
        oracle: &mut dyn LayoutOracle,
        measure: &mut dyn ContentMeasure,
        diags: &mut Diagnostics,
        size_overrides: &[(NodeIdx, f32, f32)],
    ) -> ArborResult<()> {
        self.apply_layout(tree, viewport, oracle, measure, diags, Some(size_overrides))?;
        Ok(())
    }

    fn apply_layout(
        &mut self,
        tree: &mut ResolvedTree,
        viewport: Viewport,
        oracle: &mut dyn LayoutOracle,
        measure: &mut dyn ContentMeasure,
        diags: &mut Diagnostics,
        size_overrides: Option<&[(NodeIdx, f32, f32)]>,
    ) -> ArborResult<Vec<NodeIdx>> {
        if tree.is_empty() {
            return Ok(Vec::new());
        }

        let (request, order, sources) = flatten(tree, viewport, size_overrides);
        let mut measures = RegisteredMeasures {
            sources,
            content: measure,
        };
        let result = oracle.layout(&request, &mut measures)?;

        for (req_idx, rect) in result.rects.iter().enumerate() {
            tree.node_mut(order[req_idx]).layout = Some(*rect);
        }

        // A failed subtree collapses to zero size; the rest of the tree is
        // unaffected.
        for failure in &result.failures {
            let failed = failure.index as usize;
            diags.push(
                Some(request.identities[failed].to_string()),
                DiagnosticKind::OracleFailure,
                failure.message.clone(),
            );
            zero_subtree(tree, order[failed]);
        }

        Ok(order)
    }
}

fn zero_subtree(tree: &mut ResolvedTree, root: NodeIdx) {
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        tree.node_mut(idx).layout = Some(RectPx::ZERO);
        stack.extend(tree.node(idx).children.iter().copied());
    }
}

/// Flatten `tree` into a parent-indexed pre-order request. Returns the
/// request, the arena index behind each request slot, and the content
/// snapshot for measured nodes.
fn flatten(
    tree: &ResolvedTree,
    viewport: Viewport,
    size_overrides: Option<&[(NodeIdx, f32, f32)]>,
) -> (LayoutRequest, Vec<NodeIdx>, HashMap<NodeIdentity, NodeContent>) {
    let mut nodes = Vec::with_capacity(tree.len());
    let mut parent = Vec::with_capacity(tree.len());
    let mut identities = Vec::with_capacity(tree.len());
    let mut order = Vec::with_capacity(tree.len());
    let mut sources = HashMap::new();

    let mut stack: Vec<(NodeIdx, Option<u32>)> = vec![(tree.root(), None)];
    while let Some((idx, parent_req)) = stack.pop() {
        let node = tree.node(idx);
        let req_idx = nodes.len() as u32;

        let mut constraints = LayoutConstraints {
            size: node.style.size,
            min_size: node.style.min_size,
            max_size: node.style.max_size,
            direction: node.style.direction,
            justify_content: node.style.justify_content,
            align_items: node.style.align_items,
            position: node.style.position,
            gap_px: node.style.gap_px,
            padding_px: node.style.padding_px,
            flex_grow: node.style.flex_grow,
            flex_shrink: node.style.flex_shrink,
            hidden: !node.style.visible,
            needs_measure: node.content.needs_measure(),
        };
        if let Some(overrides) = size_overrides
            && let Some((_, w, h)) = overrides.iter().find(|(o, _, _)| *o == idx)
        {
            constraints.size.width = crate::document::model::DimensionDef::Px(f64::from(*w));
            constraints.size.height = crate::document::model::DimensionDef::Px(f64::from(*h));
            constraints.needs_measure = false;
        }
        if constraints.needs_measure {
            sources.insert(node.identity.clone(), node.content.clone());
        }

        nodes.push(constraints);
        parent.push(parent_req);
        identities.push(node.identity.clone());
        order.push(idx);

        // Reverse so the stack pops children in document order.
        for child in node.children.iter().rev() {
            stack.push((*child, Some(req_idx)));
        }
    }

    let style_hashes: Vec<u64> = nodes.iter().map(LayoutConstraints::style_hash).collect();
    let structure_fingerprint = fingerprint(&identities, &parent);

    (
        LayoutRequest {
            nodes,
            parent,
            identities,
            style_hashes,
            structure_fingerprint,
            viewport,
        },
        order,
        sources,
    )
}

fn fingerprint(identities: &[NodeIdentity], parent: &[Option<u32>]) -> u64 {
    let mut h = Xxh3::new();
    for (identity, p) in identities.iter().zip(parent) {
        h.update(identity.node_id.as_bytes());
        h.update(&[0xff]);
        for key in &identity.path {
            match key {
                PathKey::Instance(id) => {
                    h.update(&[1]);
                    h.update(id.as_bytes());
                }
                PathKey::Item(ListKey::Key(k)) => {
                    h.update(&[2]);
                    h.update(k.as_bytes());
                }
                PathKey::Item(ListKey::Index(i)) => {
                    h.update(&[3]);
                    h.update(&(*i as u64).to_le_bytes());
                }
                PathKey::Outgoing => h.update(&[4]),
            }
        }
        h.update(&p.map_or(u32::MAX, |v| v).to_le_bytes());
    }
    h.digest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::model::DimensionDef;
    use crate::layout::oracle::FlexOracle;
    use crate::resolve::tree::{NodeStyle, ResolvedNode};

    fn sized_frame(id: &str, w: f64, h: f64) -> ResolvedNode {
        let mut style = NodeStyle::default();
        style.size.width = DimensionDef::Px(w);
        style.size.height = DimensionDef::Px(h);
        ResolvedNode::new(NodeIdentity::root(id), NodeContent::Frame, style)
    }

    fn tree_with_two_children() -> ResolvedTree {
        let mut tree = ResolvedTree::new("doc");
        let root = tree.push(None, sized_frame("#root", 200.0, 100.0));
        tree.push(Some(root), sized_frame("#a", 50.0, 20.0));
        tree.push(Some(root), sized_frame("#b", 50.0, 20.0));
        tree
    }

    #[test]
    fn flatten_is_preorder() {
        let tree = tree_with_two_children();
        let (req, order, _) = flatten(&tree, Viewport::default(), None);
        assert_eq!(order.len(), 3);
        for (i, p) in req.parent.iter().enumerate() {
            if let Some(p) = p {
                assert!((*p as usize) < i);
            }
        }
    }

    #[test]
    fn geometry_lands_on_nodes_and_seeds_presented() {
        let mut tree = tree_with_two_children();
        let mut bridge = LayoutBridge::new();
        let mut oracle = FlexOracle::new();
        let mut diags = Diagnostics::new();
        bridge
            .compute_layout(
                &mut tree,
                Viewport::default(),
                &mut oracle,
                &mut HeuristicMeasure,
                &mut diags,
            )
            .unwrap();

        let b = tree.lookup(&NodeIdentity::root("#b")).unwrap();
        let rect = tree.node(b).layout.expect("geometry written");
        assert_eq!(rect.x, 50.0);
        assert_eq!(tree.node(b).presented.rect, rect);
        assert!(diags.is_empty());
    }

    #[test]
    fn text_is_measured_through_the_registered_callback() {
        let mut tree = ResolvedTree::new("doc");
        let root = tree.push(None, sized_frame("#root", 200.0, 100.0));
        let mut style = NodeStyle::default();
        style.align_items = crate::document::model::AlignDef::Start;
        tree.node_mut(root).style.align_items = crate::document::model::AlignDef::Start;
        tree.push(
            Some(root),
            ResolvedNode::new(
                NodeIdentity::root("#label"),
                NodeContent::Text {
                    text: "hello".into(),
                    size_px: 10.0,
                },
                style,
            ),
        );

        let mut bridge = LayoutBridge::new();
        let mut oracle = FlexOracle::new();
        let mut diags = Diagnostics::new();
        bridge
            .compute_layout(
                &mut tree,
                Viewport::default(),
                &mut oracle,
                &mut HeuristicMeasure,
                &mut diags,
            )
            .unwrap();

        let label = tree.lookup(&NodeIdentity::root("#label")).unwrap();
        let rect = tree.node(label).layout.unwrap();
        // 5 chars * 0.5 em * 10px.
        assert_eq!(rect.w, 25.0);
        assert_eq!(rect.h, 12.0);
    }

    #[test]
    fn failed_subtree_collapses_to_zero() {
        let mut tree = ResolvedTree::new("doc");
        let root = tree.push(None, sized_frame("#root", 200.0, 100.0));
        let bad = tree.push(Some(root), sized_frame("#bad", f64::NAN, 20.0));
        tree.push(Some(bad), sized_frame("#bad-child", 10.0, 10.0));
        tree.push(Some(root), sized_frame("#ok", 50.0, 20.0));

        let mut bridge = LayoutBridge::new();
        let mut oracle = FlexOracle::new();
        let mut diags = Diagnostics::new();
        bridge
            .compute_layout(
                &mut tree,
                Viewport::default(),
                &mut oracle,
                &mut HeuristicMeasure,
                &mut diags,
            )
            .unwrap();

        assert_eq!(diags.len(), 1);
        let bad_child = tree.lookup(&NodeIdentity::root("#bad-child")).unwrap();
        assert_eq!(tree.node(bad_child).layout, Some(RectPx::ZERO));
        let ok = tree.lookup(&NodeIdentity::root("#ok")).unwrap();
        assert_eq!(tree.node(ok).layout.unwrap().w, 50.0);
    }

    #[test]
    fn relayout_preserves_presented_values() {
        let mut tree = tree_with_two_children();
        let mut bridge = LayoutBridge::new();
        let mut oracle = FlexOracle::new();
        let mut diags = Diagnostics::new();
        bridge
            .compute_layout(
                &mut tree,
                Viewport::default(),
                &mut oracle,
                &mut HeuristicMeasure,
                &mut diags,
            )
            .unwrap();

        let a = tree.lookup(&NodeIdentity::root("#a")).unwrap();
        tree.node_mut(a).presented.opacity = 0.25;

        // Shrink #a mid-animation; #b's target shifts, presented is untouched.
        bridge
            .relayout(
                &mut tree,
                Viewport::default(),
                &mut oracle,
                &mut HeuristicMeasure,
                &mut diags,
                &[(a, 20.0, 20.0)],
            )
            .unwrap();

        assert_eq!(tree.node(a).presented.opacity, 0.25);
        let b = tree.lookup(&NodeIdentity::root("#b")).unwrap();
        assert_eq!(tree.node(b).layout.unwrap().x, 20.0);
    }
}
