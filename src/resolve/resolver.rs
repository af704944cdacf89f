//! Node resolver: raw document view + customization context → concrete tree.

use smallvec::SmallVec;

use crate::document::model::{OverridesDef, ViewDef, ViewKindDef};
use crate::document::provider::DocumentProvider;
use crate::foundation::error::{DiagnosticKind, Diagnostics, ResolutionError};
use crate::foundation::ids::NodeIdx;
use crate::resolve::context::ResolveContext;
use crate::resolve::tree::{
    NodeContent, NodeIdentity, NodeStyle, PathKey, ResolvedNode, ResolvedTree,
};

type Path = SmallVec<[PathKey; 2]>;

#[derive(Debug, Clone)]
pub struct ResolverOpts {
    /// Defensive recursion cap. Documents are acyclic by construction, but a
    /// hostile or corrupted document must degrade to a placeholder rather
    /// than overflow the stack.
    pub max_depth: usize,
}

impl Default for ResolverOpts {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// Output of one resolution pass: the tree plus every recoverable failure
/// encountered along the way.
#[derive(Debug)]
pub struct Resolution {
    pub tree: ResolvedTree,
    pub diagnostics: Diagnostics,
}

/// Resolves document views into [`ResolvedTree`]s.
///
/// Resolution is a pure function of `(document, context)`: resolving the same
/// inputs twice yields structurally identical trees.
#[derive(Debug, Default)]
pub struct Resolver {
    opts: ResolverOpts,
}

impl Resolver {
    pub fn new(opts: ResolverOpts) -> Self {
        Self { opts }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(root = root_view))]
    pub fn resolve(
        &self,
        doc: &dyn DocumentProvider,
        root_view: &str,
        ctx: &ResolveContext,
    ) -> Resolution {
        let mut pass = Pass {
            doc,
            ctx,
            opts: &self.opts,
            tree: ResolvedTree::new(doc.doc_id()),
            diags: Diagnostics::new(),
        };

        let identity = NodeIdentity::root(root_view);
        match doc.view(root_view) {
            Some(view) => {
                pass.resolve_view(view, None, identity, &Path::new(), &mut Vec::new(), 0);
            }
            None => {
                pass.missing_node(identity, None);
            }
        }

        Resolution {
            tree: pass.tree,
            diagnostics: pass.diags,
        }
    }
}

struct Pass<'a> {
    doc: &'a dyn DocumentProvider,
    ctx: &'a ResolveContext,
    opts: &'a ResolverOpts,
    tree: ResolvedTree,
    diags: Diagnostics,
}

impl Pass<'_> {
    /// Resolve one view into the arena under `parent`.
    ///
    /// `identity` is the resolved identity of this node (precomputed by the
    /// caller: a component instance keeps the *instance's* id so the element
    /// stays matchable across variant switches). `child_path` is the
    /// instantiation path this node's children resolve under. `overrides` is
    /// the stack of instance override scopes in force, outermost first; later
    /// scopes win.
    fn resolve_view(
        &mut self,
        view: &ViewDef,
        parent: Option<NodeIdx>,
        identity: NodeIdentity,
        child_path: &Path,
        overrides: &mut Vec<OverridesDef>,
        depth: usize,
    ) -> NodeIdx {
        if depth > self.opts.max_depth {
            self.diags.push(
                Some(identity.to_string()),
                DiagnosticKind::DepthExceeded,
                ResolutionError::DepthExceeded(self.opts.max_depth).to_string(),
            );
            return self.placeholder(identity, parent, &view.name);
        }

        match &view.kind {
            ViewKindDef::Frame { children } => {
                let style = self.resolve_style(view, overrides);
                let node =
                    ResolvedNode::new(identity, NodeContent::Frame, style).with_name(&view.name);
                let idx = self.tree.push(parent, node);
                self.resolve_children(children, idx, child_path, overrides, depth);
                idx
            }
            ViewKindDef::Text { text, size_px } => {
                let style = self.resolve_style(view, overrides);
                let content = NodeContent::Text {
                    text: self.resolve_text(view, text, overrides),
                    size_px: *size_px,
                };
                let node = ResolvedNode::new(identity, content, style).with_name(&view.name);
                self.tree.push(parent, node)
            }
            ViewKindDef::Vector { svg_path_d } => {
                let style = self.resolve_style(view, overrides);
                let content = NodeContent::Vector {
                    path_d: svg_path_d.clone(),
                };
                let node = ResolvedNode::new(identity, content, style).with_name(&view.name);
                self.tree.push(parent, node)
            }
            ViewKindDef::Embedded { slot } => {
                let style = self.resolve_style(view, overrides);
                let content = NodeContent::Embedded {
                    slot: slot.clone().unwrap_or_else(|| view.id.clone()),
                };
                let node = ResolvedNode::new(identity, content, style).with_name(&view.name);
                self.tree.push(parent, node)
            }
            ViewKindDef::Instance {
                component,
                overrides: instance_overrides,
            } => self.resolve_instance(
                view,
                component,
                instance_overrides,
                identity,
                parent,
                child_path,
                overrides,
                depth,
            ),
            ViewKindDef::List { children } => {
                let style = self.resolve_style(view, overrides);
                let node =
                    ResolvedNode::new(identity, NodeContent::Frame, style).with_name(&view.name);
                let idx = self.tree.push(parent, node);

                let ctx = self.ctx;
                match ctx.content_generator(&view.id) {
                    Some(generator) => {
                        // Replacement content: static children are
                        // placeholders and are not recursed into.
                        let mut index = 0usize;
                        while let Some(item) = generator(index) {
                            let mut item_path = child_path.clone();
                            item_path.push(PathKey::Item(item.list_key(index)));
                            let item_identity = NodeIdentity {
                                node_id: item.view.id.clone(),
                                path: item_path.clone(),
                            };
                            self.resolve_view(
                                &item.view,
                                Some(idx),
                                item_identity,
                                &item_path,
                                overrides,
                                depth + 1,
                            );
                            index += 1;
                        }
                    }
                    None => {
                        self.resolve_children(children, idx, child_path, overrides, depth);
                    }
                }
                idx
            }
        }
    }

    fn resolve_children(
        &mut self,
        children: &[ViewDef],
        parent: NodeIdx,
        child_path: &Path,
        overrides: &mut Vec<OverridesDef>,
        depth: usize,
    ) {
        for child in children {
            let identity = NodeIdentity {
                node_id: child.id.clone(),
                path: child_path.clone(),
            };
            self.resolve_view(child, Some(parent), identity, child_path, overrides, depth + 1);
        }
    }

    /// Replace a component instance with its resolved variant definition.
    #[allow(clippy::too_many_arguments)]
    fn resolve_instance(
        &mut self,
        view: &ViewDef,
        component: &str,
        instance_overrides: &OverridesDef,
        identity: NodeIdentity,
        parent: Option<NodeIdx>,
        child_path: &Path,
        overrides: &mut Vec<OverridesDef>,
        depth: usize,
    ) -> NodeIdx {
        let doc = self.doc;
        let ctx = self.ctx;
        let Some(set) = doc.component_set(component) else {
            self.diags.push(
                Some(identity.to_string()),
                DiagnosticKind::MissingNode,
                ResolutionError::MissingNode(component.to_owned()).to_string(),
            );
            return self.placeholder(identity, parent, &view.name);
        };

        let variant = match set.variant_for(ctx.variants()) {
            Some(v) => v,
            None => {
                self.diags.push(
                    Some(identity.to_string()),
                    DiagnosticKind::UnresolvedVariant,
                    ResolutionError::UnresolvedVariant(component.to_owned()).to_string(),
                );
                match set.default_variant() {
                    Some(v) => v,
                    None => {
                        self.diags.push(
                            Some(identity.to_string()),
                            DiagnosticKind::MissingNode,
                            format!("component set \"{component}\" has no variants"),
                        );
                        return self.placeholder(identity, parent, &view.name);
                    }
                }
            }
        };
        let variant_view = variant.view.clone();

        if !instance_overrides.is_empty() {
            overrides.push(instance_overrides.clone());
        }

        // The variant definition resolves at the instance's identity; its
        // children resolve one instance-hop deeper, so two sibling instances
        // of the same component never collide.
        let mut inner_path = child_path.clone();
        inner_path.push(PathKey::Instance(view.id.clone()));
        let idx = self.resolve_view(
            &variant_view,
            parent,
            identity,
            &inner_path,
            overrides,
            depth + 1,
        );

        if !instance_overrides.is_empty() {
            overrides.pop();
        }
        idx
    }

    /// Style of `view`, with visibility binding and override patches applied
    /// (overrides always win).
    fn resolve_style(&self, view: &ViewDef, overrides: &[OverridesDef]) -> NodeStyle {
        let mut style = NodeStyle::from_def(&view.style);
        if let Some(param) = &view.bindings.visible
            && let Some(visible) = self.ctx.visible(param)
        {
            style.visible = visible;
        }
        for scope in overrides {
            if let Some(patch) = scope.style.get(&view.id) {
                style.apply_patch(patch);
            }
        }
        style
    }

    /// Text content after parameter binding and override substitution.
    fn resolve_text(&self, view: &ViewDef, authored: &str, overrides: &[OverridesDef]) -> String {
        let mut text = authored.to_owned();
        if let Some(param) = &view.bindings.text
            && let Some(bound) = self.ctx.text(param)
        {
            text = bound.to_owned();
        }
        for scope in overrides {
            if let Some(replacement) = scope.text.get(&view.id) {
                text = replacement.clone();
            }
        }
        text
    }

    /// Degrade to an empty placeholder frame instead of aborting the pass.
    fn placeholder(
        &mut self,
        identity: NodeIdentity,
        parent: Option<NodeIdx>,
        name: &str,
    ) -> NodeIdx {
        let node =
            ResolvedNode::new(identity, NodeContent::Frame, NodeStyle::default()).with_name(name);
        self.tree.push(parent, node)
    }

    fn missing_node(&mut self, identity: NodeIdentity, parent: Option<NodeIdx>) -> NodeIdx {
        self.diags.push(
            Some(identity.to_string()),
            DiagnosticKind::MissingNode,
            ResolutionError::MissingNode(identity.node_id.clone()).to_string(),
        );
        self.placeholder(identity, parent, "")
    }
}
