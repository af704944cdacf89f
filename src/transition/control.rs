//! Per-node animation controls and their interpolation math.

use crate::foundation::geometry::{Vec2, lerp_vec2};
use crate::foundation::ids::NodeIdx;

/// Easing curve for duration-based controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => cubic_bezier_ease(t, 0.42, 0.0, 1.0, 1.0),
            Self::EaseOut => cubic_bezier_ease(t, 0.0, 0.0, 0.58, 1.0),
            Self::EaseInOut => cubic_bezier_ease(t, 0.42, 0.0, 0.58, 1.0),
            Self::CubicBezier { x1, y1, x2, y2 } => cubic_bezier_ease(t, x1, y1, x2, y2),
        }
    }
}

fn cubic_bezier_ease(x: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    // CSS cubic-bezier: given x in [0,1], solve u such that bx(u)=x, then return by(u).
    fn sample_curve(a1: f64, a2: f64, t: f64) -> f64 {
        let omt = 1.0 - t;
        3.0 * omt * omt * t * a1 + 3.0 * omt * t * t * a2 + t * t * t
    }
    fn sample_curve_derivative(a1: f64, a2: f64, t: f64) -> f64 {
        let omt = 1.0 - t;
        3.0 * omt * omt * a1 + 6.0 * omt * t * (a2 - a1) + 3.0 * t * t * (1.0 - a2)
    }

    // Newton-Raphson with bisection fallback (fixed iterations, no adaptive loops).
    let mut t = x;
    for _ in 0..8 {
        let x_t = sample_curve(x1, x2, t) - x;
        let d = sample_curve_derivative(x1, x2, t);
        if d.abs() < 1e-7 {
            break;
        }
        t = (t - x_t / d).clamp(0.0, 1.0);
    }

    let mut lo = 0.0;
    let mut hi = 1.0;
    for _ in 0..8 {
        let x_t = sample_curve(x1, x2, t);
        if x_t < x {
            lo = t;
        } else {
            hi = t;
        }
        t = 0.5 * (lo + hi);
    }

    sample_curve(y1, y2, t)
}

/// Spring parameters for physically-timed controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
}

impl Spring {
    /// Critically damped default: settles without overshoot.
    pub fn critically_damped() -> Self {
        // damping = 2 * sqrt(stiffness * mass)
        Self {
            stiffness: 170.0,
            damping: 2.0 * (170.0f64).sqrt(),
            mass: 1.0,
        }
    }

    /// Step response from 0 to 1 with x(0)=0, v(0)=0, at `t` seconds.
    pub fn step(self, t: f64) -> f64 {
        let k = self.stiffness.max(0.0);
        let c = self.damping.max(0.0);
        let m = self.mass.max(1e-9);

        let w0 = (k / m).sqrt();
        if w0 == 0.0 {
            return t;
        }
        let zeta = c / (2.0 * (k * m).sqrt()).max(1e-9);

        if (zeta - 1.0).abs() < 1e-6 {
            // Critically damped.
            let e = (-w0 * t).exp();
            1.0 - e * (1.0 + w0 * t)
        } else if zeta < 1.0 {
            // Underdamped.
            let wd = w0 * (1.0 - zeta * zeta).sqrt();
            let e = (-zeta * w0 * t).exp();
            let c1 = (wd * t).cos();
            let s1 = (wd * t).sin();
            let k = zeta / (1.0 - zeta * zeta).sqrt();
            1.0 - e * (c1 + k * s1)
        } else {
            // Overdamped.
            let z2 = (zeta * zeta - 1.0).sqrt();
            let r1 = -w0 * (zeta - z2);
            let r2 = -w0 * (zeta + z2);
            let c2 = (zeta + z2) / (2.0 * z2);
            let c1 = (zeta - z2) / (2.0 * z2);
            1.0 - (c2 * (r1 * t).exp() - c1 * (r2 * t).exp())
        }
    }
}

/// How a control's clock maps elapsed time to progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timing {
    Duration { ms: f64, easing: Easing },
    Spring(Spring),
}

impl Timing {
    /// Progress in [0, 1] at `elapsed_ms`. Springs asymptote; they count as
    /// settled within [`SPRING_SETTLE_EPSILON`].
    pub fn progress(self, elapsed_ms: f64) -> f64 {
        match self {
            Self::Duration { ms, easing } => {
                if ms <= 0.0 {
                    1.0
                } else {
                    easing.apply((elapsed_ms / ms).clamp(0.0, 1.0))
                }
            }
            Self::Spring(spring) => spring.step(elapsed_ms / 1000.0).clamp(0.0, 1.0),
        }
    }

    pub fn is_done(self, elapsed_ms: f64) -> bool {
        match self {
            Self::Duration { ms, .. } => elapsed_ms >= ms,
            Self::Spring(spring) => {
                1.0 - spring.step(elapsed_ms / 1000.0) < SPRING_SETTLE_EPSILON
            }
        }
    }
}

pub(crate) const SPRING_SETTLE_EPSILON: f64 = 1e-3;

/// Which presented value a control drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Parent-relative origin of the layout rect.
    Position,
    /// Width/height of the layout rect.
    Size,
    Opacity,
    /// Translation channel of the decomposed paint transform (distinct from
    /// the layout-rect position).
    Translation,
    /// Rotation channel of the decomposed transform, radians.
    Rotation,
    /// Scale channels of the decomposed transform.
    Scale,
    /// Cross-fade between `prior_content` and `content` on one node.
    ContentFade,
}

/// Interpolation behavior over the control's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpKind {
    /// Continuous numeric interpolation.
    Lerp,
    /// Discrete: holds `from` until progress crosses 0.5, then `to`.
    SwitchAtThreshold,
    /// Opacity-style fade; numerically a lerp, but completion may remove the
    /// node.
    Fade,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Scalar(f64),
    Point(Vec2),
}

impl ControlValue {
    pub fn scalar(self) -> f64 {
        match self {
            Self::Scalar(v) => v,
            Self::Point(p) => p.x,
        }
    }

    pub fn point(self) -> Vec2 {
        match self {
            Self::Point(p) => p,
            Self::Scalar(v) => Vec2::new(v, v),
        }
    }

    fn lerp(self, to: Self, t: f64) -> Self {
        match (self, to) {
            (Self::Scalar(a), Self::Scalar(b)) => {
                Self::Scalar(crate::foundation::geometry::lerp_f64(a, b, t))
            }
            (a, b) => Self::Point(lerp_vec2(a.point(), b.point(), t)),
        }
    }

    fn approx_eq(self, other: Self) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => (a - b).abs() < 1e-9,
            (a, b) => (a.point() - b.point()).hypot() < 1e-9,
        }
    }
}

/// What happens when a control completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionAction {
    None,
    /// Detach the node from the merged tree (fully-faded cross-fade halves
    /// and vanished nodes).
    RemoveNode,
}

/// One animated channel on one merged-tree node.
///
/// Created by the differ, advanced by the scheduler each tick, destroyed when
/// its transition completes or is superseded.
#[derive(Debug, Clone)]
pub struct AnimationControl {
    pub node: NodeIdx,
    pub channel: Channel,
    pub kind: InterpKind,
    pub from: ControlValue,
    pub to: ControlValue,
    pub timing: Timing,
    pub elapsed_ms: f64,
    pub on_complete: CompletionAction,
}

impl AnimationControl {
    pub fn new(
        node: NodeIdx,
        channel: Channel,
        kind: InterpKind,
        from: ControlValue,
        to: ControlValue,
        timing: Timing,
    ) -> Self {
        Self {
            node,
            channel,
            kind,
            from,
            to,
            timing,
            elapsed_ms: 0.0,
            on_complete: CompletionAction::None,
        }
    }

    pub fn removing(mut self) -> Self {
        self.on_complete = CompletionAction::RemoveNode;
        self
    }

    pub fn advance(&mut self, delta_ms: f64) {
        self.elapsed_ms += delta_ms.max(0.0);
    }

    /// Current interpolated value.
    pub fn value(&self) -> ControlValue {
        let t = self.timing.progress(self.elapsed_ms);
        match self.kind {
            InterpKind::Lerp | InterpKind::Fade => self.from.lerp(self.to, t),
            InterpKind::SwitchAtThreshold => {
                if t < 0.5 {
                    self.from
                } else {
                    self.to
                }
            }
        }
    }

    /// Zero-distance controls are done immediately; the rest follow their
    /// clock.
    pub fn is_done(&self) -> bool {
        self.from.approx_eq(self.to) || self.timing.is_done(self.elapsed_ms)
    }

    /// Point this control at a fresh target without a visible jump: the
    /// current interpolated value becomes the new source and the clock
    /// restarts.
    pub fn retarget(&mut self, to: ControlValue) {
        self.from = self.value();
        self.to = to;
        self.elapsed_ms = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_endpoints_are_stable() {
        for easing in [
            Easing::Linear,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
            Easing::CubicBezier {
                x1: 0.25,
                y1: 0.1,
                x2: 0.25,
                y2: 1.0,
            },
        ] {
            assert!((easing.apply(0.0) - 0.0).abs() < 1e-9);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn easing_monotonic_spot_check() {
        for easing in [Easing::Linear, Easing::EaseIn, Easing::EaseOut, Easing::EaseInOut] {
            let a = easing.apply(0.25);
            let b = easing.apply(0.5);
            let c = easing.apply(0.75);
            assert!(a < b);
            assert!(b < c);
        }
    }

    #[test]
    fn critically_damped_spring_settles_without_overshoot() {
        let spring = Spring::critically_damped();
        let mut last = 0.0;
        for i in 1..=200 {
            let v = spring.step(i as f64 * 0.01);
            assert!(v >= last - 1e-12, "no oscillation expected");
            assert!(v <= 1.0 + 1e-9, "no overshoot expected");
            last = v;
        }
        assert!(1.0 - spring.step(2.0) < SPRING_SETTLE_EPSILON);
    }

    #[test]
    fn linear_duration_control_interpolates() {
        let mut control = AnimationControl::new(
            NodeIdx(0),
            Channel::Position,
            InterpKind::Lerp,
            ControlValue::Point(Vec2::new(0.0, 0.0)),
            ControlValue::Point(Vec2::new(100.0, 0.0)),
            Timing::Duration {
                ms: 100.0,
                easing: Easing::Linear,
            },
        );
        control.advance(50.0);
        let v = control.value().point();
        assert!((v.x - 50.0).abs() < 1e-9);
        assert!(!control.is_done());
        control.advance(50.0);
        assert!(control.is_done());
    }

    #[test]
    fn zero_distance_control_is_done_immediately() {
        let control = AnimationControl::new(
            NodeIdx(0),
            Channel::Opacity,
            InterpKind::Lerp,
            ControlValue::Scalar(1.0),
            ControlValue::Scalar(1.0),
            Timing::Duration {
                ms: 300.0,
                easing: Easing::EaseInOut,
            },
        );
        assert!(control.is_done());
    }

    #[test]
    fn switch_at_threshold_is_discrete() {
        let mut control = AnimationControl::new(
            NodeIdx(0),
            Channel::ContentFade,
            InterpKind::SwitchAtThreshold,
            ControlValue::Scalar(0.0),
            ControlValue::Scalar(1.0),
            Timing::Duration {
                ms: 100.0,
                easing: Easing::Linear,
            },
        );
        control.advance(49.0);
        assert_eq!(control.value(), ControlValue::Scalar(0.0));
        control.advance(2.0);
        assert_eq!(control.value(), ControlValue::Scalar(1.0));
    }

    #[test]
    fn retarget_preserves_current_value() {
        let mut control = AnimationControl::new(
            NodeIdx(0),
            Channel::Position,
            InterpKind::Lerp,
            ControlValue::Point(Vec2::new(0.0, 0.0)),
            ControlValue::Point(Vec2::new(100.0, 0.0)),
            Timing::Duration {
                ms: 100.0,
                easing: Easing::Linear,
            },
        );
        control.advance(30.0);
        let before = control.value();
        control.retarget(ControlValue::Point(Vec2::new(-50.0, 10.0)));
        let after = control.value();
        assert!((before.point().x - after.point().x).abs() < 1e-9);
        assert_eq!(control.elapsed_ms, 0.0);
    }
}
