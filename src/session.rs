//! Session-oriented entry point: one session per document root.
//!
//! The session owns everything the pipeline needs (document provider,
//! resolver, layout bridge + oracle, the committed steady-state tree, and the
//! single active transition slot) and requires all state-changing calls to
//! arrive on one thread. There is no process-wide registry: concurrent roots
//! are just concurrent sessions.

use crate::document::provider::DocumentProvider;
use crate::foundation::error::{ArborResult, Diagnostic, DiagnosticKind, Diagnostics};
use crate::foundation::geometry::Viewport;
use crate::layout::bridge::{ContentMeasure, HeuristicMeasure, LayoutBridge};
use crate::layout::oracle::{FlexOracle, LayoutOracle};
use crate::resolve::context::ResolveContext;
use crate::resolve::resolver::{Resolution, Resolver, ResolverOpts};
use crate::resolve::tree::ResolvedTree;
use crate::transition::diff::build_transition;
use crate::transition::scheduler::{Scheduler, TickOutcome};
use crate::transition::{Transition, TransitionOpts};

/// Session configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionOpts {
    pub viewport: Viewport,
    /// Animate qualifying state changes. With `false` every update is an
    /// unanimated cut.
    pub animate: bool,
    pub transition: TransitionOpts,
    pub max_depth: usize,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            animate: true,
            transition: TransitionOpts::default(),
            max_depth: ResolverOpts::default().max_depth,
        }
    }
}

/// What an update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The resolved tree was identity-and-style equal to the current one;
    /// layout and transition building were skipped entirely.
    Unchanged,
    /// The new tree was committed without animation.
    Cut,
    /// A transition is now running; drive it with [`Session::tick`].
    Animating,
}

/// Live document root: resolve → layout → transition → tick.
pub struct Session<P: DocumentProvider> {
    provider: P,
    root_view: String,
    opts: SessionOpts,
    resolver: Resolver,
    bridge: LayoutBridge,
    oracle: Box<dyn LayoutOracle>,
    measure: Box<dyn ContentMeasure>,
    scheduler: Scheduler,
    committed: Option<ResolvedTree>,
    transition: Option<Transition>,
    diagnostics: Diagnostics,
}

impl<P: DocumentProvider> Session<P> {
    pub fn new(provider: P, root_view: impl Into<String>, opts: SessionOpts) -> Self {
        Self {
            provider,
            root_view: root_view.into(),
            resolver: Resolver::new(ResolverOpts {
                max_depth: opts.max_depth,
            }),
            opts,
            bridge: LayoutBridge::new(),
            oracle: Box::new(FlexOracle::new()),
            measure: Box::new(HeuristicMeasure),
            scheduler: Scheduler::new(),
            committed: None,
            transition: None,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Replace the shipped taffy oracle (tests, host-native layout).
    pub fn with_oracle(mut self, oracle: Box<dyn LayoutOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Replace the heuristic text measurement with a shaping-backed one.
    pub fn with_measure(mut self, measure: Box<dyn ContentMeasure>) -> Self {
        self.measure = measure;
        self
    }

    /// Resolve against `ctx` and commit or animate the result.
    ///
    /// A state change while a transition is in flight supersedes it: the
    /// superseded transition's current interpolated tree becomes the new
    /// "from", so nothing snaps.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn update(&mut self, ctx: &ResolveContext) -> ArborResult<UpdateOutcome> {
        let Resolution { tree: mut new_tree, mut diagnostics } =
            self.resolver.resolve(&self.provider, &self.root_view, ctx);
        self.diagnostics.append(&mut diagnostics);

        // Idempotence short-circuit: skip the blocking oracle call outright
        // when nothing changed.
        if let Some(current) = self.target_tree()
            && current.same_structure_and_style(&new_tree)
        {
            return Ok(UpdateOutcome::Unchanged);
        }

        self.bridge.compute_layout(
            &mut new_tree,
            self.opts.viewport,
            self.oracle.as_mut(),
            self.measure.as_mut(),
            &mut self.diagnostics,
        )?;

        if !self.opts.animate || self.committed.is_none() {
            self.transition = None;
            self.committed = Some(new_tree);
            return Ok(UpdateOutcome::Cut);
        }

        let mut superseded = self.transition.take();
        if let Some(t) = superseded.as_mut() {
            t.supersede();
        }
        let from = match &superseded {
            Some(t) => t.merged(),
            None => self.committed.as_ref().expect("committed checked above"),
        };

        match build_transition(from, &new_tree, self.opts.transition) {
            Ok(transition) => {
                self.transition = Some(transition);
                Ok(UpdateOutcome::Animating)
            }
            Err(err) => {
                // Fatal only for this transition: fall back to an unanimated
                // cut to the new steady state.
                self.diagnostics.push(
                    None,
                    DiagnosticKind::MismatchedRoot,
                    err.to_string(),
                );
                self.committed = Some(new_tree);
                Ok(UpdateOutcome::Cut)
            }
        }
    }

    /// Advance the active transition by `delta_ms` of frame-clock time.
    pub fn tick(&mut self, delta_ms: f64) -> ArborResult<TickOutcome> {
        let Some(transition) = self.transition.as_mut() else {
            return Ok(TickOutcome {
                needs_render: false,
                completed: false,
            });
        };

        let outcome = self.scheduler.tick(
            transition,
            delta_ms,
            &mut self.bridge,
            self.opts.viewport,
            self.oracle.as_mut(),
            self.measure.as_mut(),
            &mut self.diagnostics,
        )?;

        if outcome.completed {
            let finished = self.transition.take().expect("transition present");
            self.committed = Some(finished.into_steady_state());
        }
        Ok(outcome)
    }

    /// The tree the renderer draws right now: the mid-transition merged tree
    /// while animating, the committed steady state otherwise. Geometry and
    /// per-node opacity/transform are already concrete.
    pub fn tree(&self) -> Option<&ResolvedTree> {
        self.transition
            .as_ref()
            .map(Transition::merged)
            .or(self.committed.as_ref())
    }

    /// Is a transition currently in flight?
    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Batch-drain diagnostics collected since the last call.
    pub fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain()
    }

    /// The tree new updates are compared against for the idempotence
    /// short-circuit: the in-flight target if animating, else the committed
    /// steady state.
    fn target_tree(&self) -> Option<&ResolvedTree> {
        self.transition
            .as_ref()
            .map(|t| &t.to)
            .or(self.committed.as_ref())
    }
}
