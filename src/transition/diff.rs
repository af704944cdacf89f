//! Identity-based tree diffing and merged-tree construction.
//!
//! `build_transition` walks the "to" tree, matching nodes against the "from"
//! tree by [`NodeIdentity`], never by position, so keyed list edits match
//! only the items that actually changed. The output is a merged tree (to-tree
//! structure plus retained outgoing nodes) and one [`AnimationControl`] per
//! animated channel.

use crate::document::model::PositionDef;
use crate::foundation::error::TransitionError;
use crate::foundation::geometry::DecomposedTransform;
use crate::foundation::ids::NodeIdx;
use crate::resolve::tree::{NodeContent, NodeIdentity, PathKey, ResolvedNode, ResolvedTree};
use crate::transition::control::{
    AnimationControl, Channel, ControlValue, InterpKind,
};
use crate::transition::{Transition, TransitionOpts, TransitionPhase};

/// Diff `from` against `to` and build the animated transition between them.
///
/// Both trees must belong to the same document ([`TransitionError::
/// MismatchedRoot`] otherwise) and `to` must already carry layout geometry.
/// The merged tree starts at the "from" appearance: matched nodes present
/// their old values, added nodes sit at opacity 0, removed nodes are retained
/// at their last geometry. Diffing `A` against `A` produces only
/// zero-distance controls, so the transition completes on its first tick.
#[tracing::instrument(level = "debug", skip_all, fields(from = from.len(), to = to.len()))]
pub fn build_transition(
    from: &ResolvedTree,
    to: &ResolvedTree,
    opts: TransitionOpts,
) -> Result<Transition, TransitionError> {
    if from.doc_id() != to.doc_id() {
        return Err(TransitionError::MismatchedRoot {
            from: from.doc_id().to_owned(),
            to: to.doc_id().to_owned(),
        });
    }

    let mut builder = Builder {
        from,
        to,
        opts,
        merged: ResolvedTree::new(to.doc_id()),
        controls: Vec::new(),
    };
    if !to.is_empty() {
        builder.merge_node(to.root(), None, false);
    }

    Ok(Transition {
        merged: builder.merged,
        to: to.clone(),
        controls: builder.controls,
        phase: TransitionPhase::Created,
        opts,
    })
}

struct Builder<'a> {
    from: &'a ResolvedTree,
    to: &'a ResolvedTree,
    opts: TransitionOpts,
    merged: ResolvedTree,
    controls: Vec<AnimationControl>,
}

impl Builder<'_> {
    /// Merge the to-subtree rooted at `to_idx` under `merged_parent`.
    /// `fading_in` is set when an ancestor already animates this subtree in,
    /// so nested additions don't stack fades.
    fn merge_node(&mut self, to_idx: NodeIdx, merged_parent: Option<NodeIdx>, fading_in: bool) {
        let tnode = self.to.node(to_idx);

        match self.from.lookup(&tnode.identity).map(|fi| self.from.node(fi)) {
            Some(fnode) if fnode.content.same_kind(&tnode.content) => {
                self.merge_matched(tnode, fnode, merged_parent, fading_in);
            }
            Some(fnode) => {
                // Content kind changed under one identity: retain both halves
                // overlapping and cross-fade.
                if let Some(parent) = merged_parent {
                    self.splice_outgoing(fnode, parent);
                }
                self.insert_added(tnode, merged_parent, fading_in);
            }
            None => {
                self.insert_added(tnode, merged_parent, fading_in);
            }
        }
    }

    fn merge_matched(
        &mut self,
        tnode: &ResolvedNode,
        fnode: &ResolvedNode,
        merged_parent: Option<NodeIdx>,
        fading_in: bool,
    ) {
        let target_rect = tnode.layout.unwrap_or(tnode.presented.rect);

        let mut node = clone_shell(tnode);
        // Tick 0 renders the old appearance; the controls below carry it to
        // the new one.
        node.presented = fnode.presented;
        let content_changed = fnode.content != tnode.content;
        if content_changed {
            node.prior_content = Some(fnode.content.clone());
            node.presented.content_fade = 0.0;
        }
        let midx = self.merged.push(merged_parent, node);

        self.controls.push(AnimationControl::new(
            midx,
            Channel::Position,
            InterpKind::Lerp,
            ControlValue::Point(fnode.presented.rect.origin()),
            ControlValue::Point(target_rect.origin()),
            self.opts.timing,
        ));
        self.controls.push(AnimationControl::new(
            midx,
            Channel::Size,
            InterpKind::Lerp,
            ControlValue::Point(fnode.presented.rect.size()),
            ControlValue::Point(target_rect.size()),
            self.opts.timing,
        ));
        self.controls.push(AnimationControl::new(
            midx,
            Channel::Opacity,
            InterpKind::Fade,
            ControlValue::Scalar(f64::from(fnode.presented.opacity)),
            ControlValue::Scalar(f64::from(tnode.style.opacity)),
            self.opts.timing,
        ));

        let d_from = DecomposedTransform::from_affine(fnode.presented.transform);
        let d_to = DecomposedTransform::from_affine(tnode.style.transform);
        if (d_from.translation - d_to.translation).hypot() > 1e-9 {
            self.controls.push(AnimationControl::new(
                midx,
                Channel::Translation,
                InterpKind::Lerp,
                ControlValue::Point(d_from.translation),
                ControlValue::Point(d_to.translation),
                self.opts.timing,
            ));
        }
        if (d_from.rotation_rad - d_to.rotation_rad).abs() > 1e-9 {
            self.controls.push(AnimationControl::new(
                midx,
                Channel::Rotation,
                InterpKind::Lerp,
                ControlValue::Scalar(d_from.rotation_rad),
                ControlValue::Scalar(d_to.rotation_rad),
                self.opts.timing,
            ));
        }
        if (d_from.scale - d_to.scale).hypot() > 1e-9 {
            self.controls.push(AnimationControl::new(
                midx,
                Channel::Scale,
                InterpKind::Lerp,
                ControlValue::Point(d_from.scale),
                ControlValue::Point(d_to.scale),
                self.opts.timing,
            ));
        }
        if content_changed {
            // Host-embedded content cannot be drawn twice, so it switches at
            // the halfway point instead of cross-fading.
            let kind = if matches!(tnode.content, NodeContent::Embedded { .. }) {
                InterpKind::SwitchAtThreshold
            } else {
                InterpKind::Fade
            };
            self.controls.push(AnimationControl::new(
                midx,
                Channel::ContentFade,
                kind,
                ControlValue::Scalar(0.0),
                ControlValue::Scalar(1.0),
                self.opts.timing,
            ));
        }

        for &child in &tnode.children {
            self.merge_node(child, Some(midx), fading_in);
        }
        self.splice_removed_children(fnode, midx);
    }

    /// Insert a to-only node at its target values, pre-faded unless an
    /// ancestor already fades the subtree in.
    fn insert_added(
        &mut self,
        tnode: &ResolvedNode,
        merged_parent: Option<NodeIdx>,
        fading_in: bool,
    ) {
        let mut node = clone_shell(tnode);
        node.presented.rect = tnode.layout.unwrap_or(tnode.presented.rect);
        node.presented.transform = tnode.style.transform;
        node.presented.content_fade = 1.0;
        node.presented.opacity = if fading_in { tnode.style.opacity } else { 0.0 };
        let midx = self.merged.push(merged_parent, node);

        if !fading_in {
            self.controls.push(AnimationControl::new(
                midx,
                Channel::Opacity,
                InterpKind::Fade,
                ControlValue::Scalar(0.0),
                ControlValue::Scalar(f64::from(tnode.style.opacity)),
                self.opts.timing,
            ));
        }

        for &child in &tnode.children {
            self.merge_node(child, Some(midx), true);
        }
        // A from-match with a different kind still leaves removed
        // descendants to account for; they were handled by splice_outgoing.
    }

    /// Retain children of `fnode` that vanished from the to-tree entirely,
    /// frozen at their last geometry, fading out, removed on completion.
    fn splice_removed_children(&mut self, fnode: &ResolvedNode, merged_parent: NodeIdx) {
        for (pos, &fchild_idx) in fnode.children.iter().enumerate() {
            let fchild = self.from.node(fchild_idx);
            if self.to.lookup(&fchild.identity).is_some() {
                continue;
            }
            let midx = self.clone_vanished_subtree(fchild_idx, merged_parent, Some(pos));
            self.controls.push(
                AnimationControl::new(
                    midx,
                    Channel::Opacity,
                    InterpKind::Fade,
                    ControlValue::Scalar(f64::from(fchild.presented.opacity)),
                    ControlValue::Scalar(0.0),
                    self.opts.timing,
                )
                .removing(),
            );
        }
    }

    /// Deep-clone a vanished from-subtree into the merged tree, keeping the
    /// last known geometry with no target movement. Descendants that still
    /// exist in the to-tree are skipped; they matched elsewhere.
    fn clone_vanished_subtree(
        &mut self,
        from_idx: NodeIdx,
        merged_parent: NodeIdx,
        pos: Option<usize>,
    ) -> NodeIdx {
        let fnode = self.from.node(from_idx);
        let node = clone_shell(fnode);
        let midx = match pos {
            Some(pos) => self.merged.push_at(merged_parent, pos, node),
            None => self.merged.push(Some(merged_parent), node),
        };
        for &fchild in &fnode.children {
            if self.to.lookup(&self.from.node(fchild).identity).is_none() {
                self.clone_vanished_subtree(fchild, midx, None);
            }
        }
        midx
    }

    /// Deep-clone the outgoing half of a kind-switch overlap pair, with every
    /// identity marked [`PathKey::Outgoing`] so the pair can coexist in one
    /// arena. Frozen at the from appearance, fading out, removed when done.
    /// The root goes absolute so the pair overlaps instead of occupying two
    /// flex slots.
    fn splice_outgoing(&mut self, fnode: &ResolvedNode, merged_parent: NodeIdx) {
        let midx = self.clone_outgoing_subtree(fnode, merged_parent);
        self.merged.node_mut(midx).style.position = PositionDef::Absolute;
        self.controls.push(
            AnimationControl::new(
                midx,
                Channel::Opacity,
                InterpKind::Fade,
                ControlValue::Scalar(f64::from(fnode.presented.opacity)),
                ControlValue::Scalar(0.0),
                self.opts.timing,
            )
            .removing(),
        );
    }

    fn clone_outgoing_subtree(&mut self, fnode: &ResolvedNode, merged_parent: NodeIdx) -> NodeIdx {
        let mut node = clone_shell(fnode);
        node.identity = outgoing_identity(&fnode.identity);
        let midx = self.merged.push(Some(merged_parent), node);
        for &fchild in &fnode.children {
            let fchild = self.from.node(fchild);
            self.clone_outgoing_subtree(fchild, midx);
        }
        midx
    }
}

fn outgoing_identity(identity: &NodeIdentity) -> NodeIdentity {
    let mut path = identity.path.clone();
    path.push(PathKey::Outgoing);
    NodeIdentity {
        node_id: identity.node_id.clone(),
        path,
    }
}

/// Copy a node without its tree wiring; children are rebuilt by the walk.
fn clone_shell(node: &ResolvedNode) -> ResolvedNode {
    let mut shell = node.clone();
    shell.parent = None;
    shell.children = Vec::new();
    shell
}
