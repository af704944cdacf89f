//! Frame-driven advancement of transitions.
//!
//! The scheduler is clocked by the host frame clock (`tick(delta_ms)`); it
//! has no wall-clock dependency beyond the delta. Each tick advances every
//! control, writes interpolated values into the merged tree's presented
//! state, re-seats in-flight position targets against fresh layout when
//! animated sizes perturb siblings, and retires the transition once every
//! control reports done.

use crate::foundation::error::{ArborResult, Diagnostics};
use crate::foundation::geometry::{DecomposedTransform, Vec2, Viewport};
use crate::layout::bridge::{ContentMeasure, LayoutBridge};
use crate::layout::oracle::LayoutOracle;
use crate::resolve::tree::ResolvedTree;
use crate::transition::control::{
    AnimationControl, Channel, CompletionAction, ControlValue,
};
use crate::transition::{Transition, TransitionPhase};

/// How often position/size tweens are re-seated against fresh layout while
/// an animated size is perturbing sibling layout mid-transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReseatPolicy {
    /// Re-run layout on every tick with an active size animation.
    EveryTick,
    /// Re-run layout only when some animated size moved by more than this
    /// many pixels since the last tick.
    OnSizeDelta(f32),
    /// Never re-seat; tweens run against the targets captured at build time.
    Never,
}

impl Default for ReseatPolicy {
    fn default() -> Self {
        Self::OnSizeDelta(0.5)
    }
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// The merged tree's presented values changed; the host should re-render.
    pub needs_render: bool,
    /// The transition finished this tick; the caller commits the to-tree.
    pub completed: bool,
}

/// Drives the single active transition of one document root.
#[derive(Debug, Default)]
pub struct Scheduler;

impl Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Advance `transition` by `delta_ms`.
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        transition: &mut Transition,
        delta_ms: f64,
        bridge: &mut LayoutBridge,
        viewport: Viewport,
        oracle: &mut dyn LayoutOracle,
        measure: &mut dyn ContentMeasure,
        diags: &mut Diagnostics,
    ) -> ArborResult<TickOutcome> {
        match transition.phase {
            TransitionPhase::Created => transition.phase = TransitionPhase::Running,
            TransitionPhase::Running => {}
            TransitionPhase::Completed | TransitionPhase::Superseded => {
                return Ok(TickOutcome {
                    needs_render: false,
                    completed: transition.phase == TransitionPhase::Completed,
                });
            }
        }

        let mut sizes_ticking = false;
        let mut max_size_delta = 0.0f32;
        for control in &mut transition.controls {
            let was_done = control.is_done();
            control.advance(delta_ms);
            if control.channel == Channel::Size {
                if !was_done {
                    sizes_ticking = true;
                }
                let old = transition.merged.node(control.node).presented.rect;
                let new = control.value().point();
                let delta = (new.x as f32 - old.w).abs().max((new.y as f32 - old.h).abs());
                max_size_delta = max_size_delta.max(delta);
            }
            apply_control(&mut transition.merged, control);
        }

        if sizes_ticking && self.should_reseat(transition, max_size_delta) {
            self.reseat(transition, bridge, viewport, oracle, measure, diags)?;
        }

        // Fully-faded nodes leave the merged tree as soon as their fade
        // completes; the arena slot stays so control indices remain valid.
        for control in &transition.controls {
            if control.on_complete == CompletionAction::RemoveNode && control.is_done() {
                transition.merged.detach(control.node);
            }
        }

        if transition.controls.iter().all(AnimationControl::is_done) {
            transition.phase = TransitionPhase::Completed;
            return Ok(TickOutcome {
                needs_render: true,
                completed: true,
            });
        }

        Ok(TickOutcome {
            needs_render: true,
            completed: false,
        })
    }

    fn should_reseat(&self, transition: &Transition, max_size_delta: f32) -> bool {
        match transition.opts.reseat {
            ReseatPolicy::EveryTick => true,
            ReseatPolicy::OnSizeDelta(px) => max_size_delta > px,
            ReseatPolicy::Never => false,
        }
    }

    /// Re-run layout with animated nodes pinned at their current interpolated
    /// sizes, then point position/size tweens at the fresh rects. Retargeting
    /// starts from the current interpolated value, so the presented value
    /// stays continuous.
    fn reseat(
        &mut self,
        transition: &mut Transition,
        bridge: &mut LayoutBridge,
        viewport: Viewport,
        oracle: &mut dyn LayoutOracle,
        measure: &mut dyn ContentMeasure,
        diags: &mut Diagnostics,
    ) -> ArborResult<()> {
        let overrides: Vec<_> = transition
            .controls
            .iter()
            .filter(|c| c.channel == Channel::Size && !c.is_done())
            .map(|c| {
                let s = c.value().point();
                (c.node, s.x as f32, s.y as f32)
            })
            .collect();

        bridge.relayout(
            &mut transition.merged,
            viewport,
            oracle,
            measure,
            diags,
            &overrides,
        )?;

        for control in &mut transition.controls {
            let Some(rect) = transition.merged.node(control.node).layout else {
                continue;
            };
            let fresh = match control.channel {
                Channel::Position => Vec2::new(f64::from(rect.x), f64::from(rect.y)),
                // Sizes pinned by an override echo back; only re-seat sizes
                // of settled controls whose layout-driven extent moved.
                Channel::Size if control.is_done() => {
                    Vec2::new(f64::from(rect.w), f64::from(rect.h))
                }
                _ => continue,
            };
            if (fresh - control.to.point()).hypot() > 0.01 {
                control.retarget(ControlValue::Point(fresh));
            }
        }
        Ok(())
    }
}

fn apply_control(merged: &mut ResolvedTree, control: &AnimationControl) {
    let value = control.value();
    let node = merged.node_mut(control.node);
    match control.channel {
        Channel::Position => {
            let p = value.point();
            node.presented.rect.x = p.x as f32;
            node.presented.rect.y = p.y as f32;
        }
        Channel::Size => {
            let s = value.point();
            node.presented.rect.w = (s.x as f32).max(0.0);
            node.presented.rect.h = (s.y as f32).max(0.0);
        }
        Channel::Opacity => {
            node.presented.opacity = (value.scalar() as f32).clamp(0.0, 1.0);
        }
        Channel::Translation => {
            let mut d = DecomposedTransform::from_affine(node.presented.transform);
            d.translation = value.point();
            node.presented.transform = d.to_affine();
        }
        Channel::Rotation => {
            let mut d = DecomposedTransform::from_affine(node.presented.transform);
            d.rotation_rad = value.scalar();
            node.presented.transform = d.to_affine();
        }
        Channel::Scale => {
            let mut d = DecomposedTransform::from_affine(node.presented.transform);
            d.scale = value.point();
            node.presented.transform = d.to_affine();
        }
        Channel::ContentFade => {
            node.presented.content_fade = (value.scalar() as f32).clamp(0.0, 1.0);
        }
    }
}
