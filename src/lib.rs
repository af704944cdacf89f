//! Arbor renders externally-authored design documents into a live,
//! animatable UI tree.
//!
//! The pipeline is: resolve a raw document view against the active
//! variant/customization context into a [`resolve::tree::ResolvedTree`],
//! compute its geometry through the layout oracle, and, when a state change
//! qualifies, diff the old and new trees into a [`transition::Transition`]
//! that an external frame clock drives to completion.
//!
//! The public API is session-oriented:
//!
//! - Load a document behind a [`DocumentProvider`]
//! - Create a [`Session`] for one document root
//! - Call [`Session::update`] on state changes and [`Session::tick`] on frame
//!   clock signals; render [`Session::tree`]
//!
//! Everything runs synchronously on the caller's thread; there is no
//! background work and no process-wide state.
#![forbid(unsafe_code)]

pub mod document;
pub mod foundation;
pub mod layout;
pub mod resolve;
pub mod session;
pub mod transition;

pub use crate::foundation::error::{
    ArborError, ArborResult, Diagnostic, DiagnosticKind, Diagnostics, LayoutError,
    ResolutionError, TransitionError,
};
pub use crate::foundation::geometry::{RectPx, Rgba8, Viewport};
pub use crate::foundation::ids::NodeIdx;

pub use crate::document::model::{ComponentSetDef, StyleDef, VariantDef, ViewDef, ViewKindDef};
pub use crate::document::provider::{DocumentProvider, InMemoryDocument};
pub use crate::resolve::context::{ContentItem, ResolveContext};
pub use crate::resolve::resolver::{Resolution, Resolver, ResolverOpts};
pub use crate::resolve::tree::{
    ListKey, NodeContent, NodeIdentity, NodeStyle, Presented, ResolvedNode, ResolvedTree,
};

pub use crate::layout::bridge::{ContentMeasure, HeuristicMeasure, LayoutBridge};
pub use crate::layout::oracle::{FlexOracle, LayoutOracle, LayoutRequest, LayoutResult, MeasureHost};

pub use crate::transition::control::{AnimationControl, Channel, Easing, Spring, Timing};
pub use crate::transition::diff::build_transition;
pub use crate::transition::scheduler::{ReseatPolicy, Scheduler, TickOutcome};
pub use crate::transition::{Transition, TransitionOpts, TransitionPhase};

pub use crate::session::{Session, SessionOpts, UpdateOutcome};
