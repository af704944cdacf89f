//! Layout oracle seam and the taffy-backed implementation.
//!
//! The oracle consumes a flattened, parent-indexed request (never node
//! pointers) and produces one rectangle per entry. [`FlexOracle`] keeps its
//! internal tree across generations: it rebuilds only when the request's
//! structure fingerprint changes and restyles only nodes whose style hash
//! moved.

use taffy::prelude::{AvailableSpace, NodeId, Rect, Size};
use taffy::style::{
    AlignItems, Dimension, Display, FlexDirection, JustifyContent, LengthPercentage,
    LengthPercentageAuto, Position, Style,
};
use xxhash_rust::xxh3::Xxh3;

use crate::document::model::{
    AlignDef, DimensionDef, DirectionDef, EdgesDef, JustifyDef, PositionDef, SizeDef,
};
use crate::foundation::error::{ArborResult, LayoutError};
use crate::foundation::geometry::{RectPx, Viewport};
use crate::resolve::tree::NodeIdentity;

/// Style constraints for one flattened node.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConstraints {
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
    /// Hidden nodes keep their slot but occupy no space.
    pub hidden: bool,
    /// Intrinsic size depends on measured content.
    pub needs_measure: bool,
}

impl LayoutConstraints {
    /// Reject constraints the oracle cannot solve. A rejected node (and its
    /// subtree) collapses to zero size rather than failing the pass.
    pub fn validate(&self) -> Result<(), String> {
        for (axis, d) in [("width", self.size.width), ("height", self.size.height)] {
            match d {
                DimensionDef::Px(v) if !v.is_finite() || v < 0.0 => {
                    return Err(format!("{axis} must be finite and non-negative, got {v}"));
                }
                DimensionDef::Percent(p) if !p.is_finite() => {
                    return Err(format!("{axis} percent must be finite, got {p}"));
                }
                _ => {}
            }
        }
        if !self.gap_px.is_finite() || self.gap_px < 0.0 {
            return Err(format!("gap must be finite and non-negative, got {}", self.gap_px));
        }
        if !self.flex_grow.is_finite() || self.flex_grow < 0.0 {
            return Err(format!(
                "flex_grow must be finite and non-negative, got {}",
                self.flex_grow
            ));
        }
        Ok(())
    }

    pub fn style_hash(&self) -> u64 {
        let mut h = Xxh3::new();
        hash_dimension(&mut h, self.size.width);
        hash_dimension(&mut h, self.size.height);
        hash_dimension(&mut h, self.min_size.width);
        hash_dimension(&mut h, self.min_size.height);
        hash_dimension(&mut h, self.max_size.width);
        hash_dimension(&mut h, self.max_size.height);
        h.update(&[
            self.direction as u8,
            self.justify_content as u8,
            self.align_items as u8,
            self.position as u8,
            u8::from(self.hidden),
            u8::from(self.needs_measure),
        ]);
        h.update(&self.gap_px.to_bits().to_le_bytes());
        for edge in [
            self.padding_px.top,
            self.padding_px.right,
            self.padding_px.bottom,
            self.padding_px.left,
        ] {
            h.update(&edge.to_bits().to_le_bytes());
        }
        h.update(&self.flex_grow.to_bits().to_le_bytes());
        h.update(&self.flex_shrink.to_bits().to_le_bytes());
        h.digest()
    }
}

fn hash_dimension(h: &mut Xxh3, d: DimensionDef) {
    match d {
        DimensionDef::Auto => h.update(&[0u8]),
        DimensionDef::Px(v) => {
            h.update(&[1u8]);
            h.update(&v.to_bits().to_le_bytes());
        }
        DimensionDef::Percent(p) => {
            h.update(&[2u8]);
            h.update(&p.to_bits().to_le_bytes());
        }
    }
}

/// Flattened view of a resolved tree: arrays plus parent indices, in
/// pre-order, so `parent[i] < i` for every non-root entry.
#[derive(Debug, Clone)]
pub struct LayoutRequest {
    pub nodes: Vec<LayoutConstraints>,
    pub parent: Vec<Option<u32>>,
    pub identities: Vec<NodeIdentity>,
    pub style_hashes: Vec<u64>,
    /// Hash of identities + parent links; equal fingerprints mean the
    /// oracle's internal tree can be reused as-is.
    pub structure_fingerprint: u64,
    pub viewport: Viewport,
}

/// One rectangle per request entry, parent-relative, plus per-subtree
/// failures.
#[derive(Debug, Clone, Default)]
pub struct LayoutResult {
    pub rects: Vec<RectPx>,
    pub failures: Vec<LayoutFailure>,
}

#[derive(Debug, Clone)]
pub struct LayoutFailure {
    pub index: u32,
    pub message: String,
}

/// Re-entrant content measurement, keyed by node identity.
///
/// The oracle calls back into this during its own internal pass: a
/// synchronous re-entrant call on the same thread, not a new async operation.
pub trait MeasureHost {
    fn measure(
        &mut self,
        identity: &NodeIdentity,
        available_width: f32,
        available_height: f32,
    ) -> (f32, f32);
}

/// Measure host for trees with no measurable content.
#[derive(Debug, Default)]
pub struct NoMeasure;

impl MeasureHost for NoMeasure {
    fn measure(&mut self, _identity: &NodeIdentity, _aw: f32, _ah: f32) -> (f32, f32) {
        (0.0, 0.0)
    }
}

/// The layout oracle seam: flattened request in, rectangles out.
pub trait LayoutOracle {
    fn layout(
        &mut self,
        request: &LayoutRequest,
        measure: &mut dyn MeasureHost,
    ) -> ArborResult<LayoutResult>;
}

/// Taffy-backed flexbox oracle.
pub struct FlexOracle {
    taffy: taffy::TaffyTree<u32>,
    node_ids: Vec<NodeId>,
    built_fingerprint: u64,
    /// `u64::MAX` sentinel so the first pass after a rebuild restyles
    /// everything.
    style_hashes: Vec<u64>,
}

impl Default for FlexOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl FlexOracle {
    pub fn new() -> Self {
        Self {
            taffy: taffy::TaffyTree::new(),
            node_ids: Vec::new(),
            built_fingerprint: 0,
            style_hashes: Vec::new(),
        }
    }

    fn ensure_tree(&mut self, request: &LayoutRequest) -> Result<(), taffy::TaffyError> {
        if self.built_fingerprint == request.structure_fingerprint
            && self.node_ids.len() == request.nodes.len()
        {
            return Ok(());
        }

        self.taffy = taffy::TaffyTree::new();
        self.node_ids.clear();
        for i in 0..request.nodes.len() {
            let id = self.taffy.new_leaf_with_context(Style::default(), i as u32)?;
            self.node_ids.push(id);
        }
        for (i, parent) in request.parent.iter().enumerate() {
            if let Some(p) = parent {
                self.taffy
                    .add_child(self.node_ids[*p as usize], self.node_ids[i])?;
            }
        }
        self.style_hashes.clear();
        self.style_hashes.resize(request.nodes.len(), u64::MAX);
        self.built_fingerprint = request.structure_fingerprint;
        Ok(())
    }

    fn update_styles(
        &mut self,
        request: &LayoutRequest,
        failures: &mut Vec<LayoutFailure>,
    ) -> Result<(), taffy::TaffyError> {
        for (i, constraints) in request.nodes.iter().enumerate() {
            if self.style_hashes[i] == request.style_hashes[i] {
                continue;
            }
            let style = match constraints.validate() {
                Ok(()) => style_for(constraints),
                Err(message) => {
                    failures.push(LayoutFailure {
                        index: i as u32,
                        message,
                    });
                    // The offending subtree takes no space; siblings lay out
                    // normally.
                    Style {
                        display: Display::None,
                        ..Style::default()
                    }
                }
            };
            self.taffy.set_style(self.node_ids[i], style)?;
            self.style_hashes[i] = request.style_hashes[i];
        }
        Ok(())
    }
}

impl LayoutOracle for FlexOracle {
    #[tracing::instrument(level = "trace", skip_all, fields(nodes = request.nodes.len()))]
    fn layout(
        &mut self,
        request: &LayoutRequest,
        measure: &mut dyn MeasureHost,
    ) -> ArborResult<LayoutResult> {
        if request.nodes.is_empty() {
            return Ok(LayoutResult::default());
        }

        let mut failures = Vec::new();
        self.ensure_tree(request).map_err(oracle_err)?;
        self.update_styles(request, &mut failures)
            .map_err(oracle_err)?;

        let available = Size {
            width: AvailableSpace::Definite(request.viewport.width),
            height: AvailableSpace::Definite(request.viewport.height),
        };

        let root = self.node_ids[0];
        self.taffy
            .compute_layout_with_measure(
                root,
                available,
                |known_dimensions, available_space, _node_id, node_context, _style| {
                    let Some(&mut slot) = node_context else {
                        return known_dimensions.unwrap_or(Size::ZERO);
                    };
                    let constraints = &request.nodes[slot as usize];
                    if !constraints.needs_measure {
                        return known_dimensions.unwrap_or(Size::ZERO);
                    }
                    let aw = match available_space.width {
                        AvailableSpace::Definite(w) => w,
                        AvailableSpace::MinContent => 0.0,
                        AvailableSpace::MaxContent => f32::INFINITY,
                    };
                    let ah = match available_space.height {
                        AvailableSpace::Definite(h) => h,
                        AvailableSpace::MinContent => 0.0,
                        AvailableSpace::MaxContent => f32::INFINITY,
                    };
                    let (mw, mh) = measure.measure(&request.identities[slot as usize], aw, ah);
                    Size {
                        width: known_dimensions.width.unwrap_or(mw),
                        height: known_dimensions.height.unwrap_or(mh),
                    }
                },
            )
            .map_err(oracle_err)?;

        let mut rects = Vec::with_capacity(request.nodes.len());
        for id in &self.node_ids {
            let l = self.taffy.layout(*id).map_err(oracle_err)?;
            rects.push(RectPx {
                x: l.location.x,
                y: l.location.y,
                w: l.size.width,
                h: l.size.height,
            });
        }

        Ok(LayoutResult { rects, failures })
    }
}

fn oracle_err(e: taffy::TaffyError) -> crate::foundation::error::ArborError {
    LayoutError::OracleFailure(e.to_string()).into()
}

fn style_for(c: &LayoutConstraints) -> Style {
    if c.hidden {
        return Style {
            display: Display::None,
            ..Style::default()
        };
    }

    Style {
        display: Display::Flex,
        position: match c.position {
            PositionDef::Relative => Position::Relative,
            PositionDef::Absolute => Position::Absolute,
        },
        flex_direction: match c.direction {
            DirectionDef::Row => FlexDirection::Row,
            DirectionDef::Column => FlexDirection::Column,
        },
        justify_content: Some(match c.justify_content {
            JustifyDef::Start => JustifyContent::Start,
            JustifyDef::End => JustifyContent::End,
            JustifyDef::Center => JustifyContent::Center,
            JustifyDef::SpaceBetween => JustifyContent::SpaceBetween,
            JustifyDef::SpaceAround => JustifyContent::SpaceAround,
            JustifyDef::SpaceEvenly => JustifyContent::SpaceEvenly,
        }),
        align_items: Some(match c.align_items {
            AlignDef::Start => AlignItems::Start,
            AlignDef::End => AlignItems::End,
            AlignDef::Center => AlignItems::Center,
            AlignDef::Stretch => AlignItems::Stretch,
        }),
        gap: Size {
            width: LengthPercentage::length(c.gap_px as f32),
            height: LengthPercentage::length(c.gap_px as f32),
        },
        padding: Rect {
            top: LengthPercentage::length(c.padding_px.top as f32),
            right: LengthPercentage::length(c.padding_px.right as f32),
            bottom: LengthPercentage::length(c.padding_px.bottom as f32),
            left: LengthPercentage::length(c.padding_px.left as f32),
        },
        margin: Rect {
            top: LengthPercentageAuto::length(0.0),
            right: LengthPercentageAuto::length(0.0),
            bottom: LengthPercentageAuto::length(0.0),
            left: LengthPercentageAuto::length(0.0),
        },
        flex_grow: c.flex_grow as f32,
        flex_shrink: c.flex_shrink as f32,
        size: Size {
            width: to_taffy_dimension(c.size.width),
            height: to_taffy_dimension(c.size.height),
        },
        min_size: Size {
            width: to_taffy_dimension(c.min_size.width),
            height: to_taffy_dimension(c.min_size.height),
        },
        max_size: Size {
            width: to_taffy_dimension(c.max_size.width),
            height: to_taffy_dimension(c.max_size.height),
        },
        ..Style::default()
    }
}

fn to_taffy_dimension(d: DimensionDef) -> Dimension {
    match d {
        DimensionDef::Auto => Dimension::auto(),
        DimensionDef::Px(v) => Dimension::length(v as f32),
        // Authored as 0–100, taffy wants 0–1.
        DimensionDef::Percent(p) => Dimension::percent((p / 100.0) as f32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints() -> LayoutConstraints {
        LayoutConstraints {
            size: SizeDef::default(),
            min_size: SizeDef::default(),
            max_size: SizeDef::default(),
            direction: DirectionDef::Row,
            justify_content: JustifyDef::Start,
            align_items: AlignDef::Stretch,
            position: PositionDef::Relative,
            gap_px: 0.0,
            padding_px: EdgesDef::default(),
            flex_grow: 0.0,
            flex_shrink: 1.0,
            hidden: false,
            needs_measure: false,
        }
    }

    fn px(v: f64) -> DimensionDef {
        DimensionDef::Px(v)
    }

    fn request(nodes: Vec<LayoutConstraints>, parent: Vec<Option<u32>>) -> LayoutRequest {
        let style_hashes = nodes.iter().map(LayoutConstraints::style_hash).collect();
        let mut h = Xxh3::new();
        for p in &parent {
            h.update(&p.map_or(u32::MAX, |v| v).to_le_bytes());
        }
        LayoutRequest {
            identities: (0..nodes.len())
                .map(|i| crate::resolve::tree::NodeIdentity::root(format!("#{i}")))
                .collect(),
            nodes,
            parent,
            style_hashes,
            structure_fingerprint: h.digest(),
            viewport: Viewport {
                width: 200.0,
                height: 100.0,
            },
        }
    }

    #[test]
    fn row_places_children_side_by_side() {
        let mut root = constraints();
        root.size.width = px(200.0);
        root.size.height = px(100.0);
        let mut child = constraints();
        child.size.width = px(50.0);
        child.size.height = px(20.0);

        let req = request(
            vec![root, child.clone(), child],
            vec![None, Some(0), Some(0)],
        );
        let mut oracle = FlexOracle::new();
        let result = oracle.layout(&req, &mut NoMeasure).unwrap();

        assert!(result.failures.is_empty());
        assert_eq!(result.rects[1].x, 0.0);
        assert_eq!(result.rects[2].x, 50.0);
    }

    #[test]
    fn invalid_constraints_fail_only_their_node() {
        let mut root = constraints();
        root.size.width = px(200.0);
        root.size.height = px(100.0);
        let mut bad = constraints();
        bad.size.width = px(f64::NAN);
        let mut good = constraints();
        good.size.width = px(40.0);
        good.size.height = px(10.0);

        let req = request(vec![root, bad, good], vec![None, Some(0), Some(0)]);
        let mut oracle = FlexOracle::new();
        let result = oracle.layout(&req, &mut NoMeasure).unwrap();

        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].index, 1);
        // The sibling still laid out.
        assert_eq!(result.rects[2].w, 40.0);
    }

    #[test]
    fn layout_is_idempotent() {
        let mut root = constraints();
        root.size.width = px(120.0);
        root.size.height = px(60.0);
        let mut child = constraints();
        child.flex_grow = 1.0;

        let req = request(vec![root, child], vec![None, Some(0)]);
        let mut oracle = FlexOracle::new();
        let a = oracle.layout(&req, &mut NoMeasure).unwrap();
        let b = oracle.layout(&req, &mut NoMeasure).unwrap();
        assert_eq!(a.rects, b.rects);
    }

    #[test]
    fn measure_slots_drive_intrinsic_size() {
        struct Fixed;
        impl MeasureHost for Fixed {
            fn measure(&mut self, _: &NodeIdentity, _: f32, _: f32) -> (f32, f32) {
                (42.0, 17.0)
            }
        }

        let mut root = constraints();
        root.size.width = px(200.0);
        root.size.height = px(100.0);
        root.align_items = AlignDef::Start;
        let mut leaf = constraints();
        leaf.needs_measure = true;

        let req = request(vec![root, leaf], vec![None, Some(0)]);
        let mut oracle = FlexOracle::new();
        let result = oracle.layout(&req, &mut Fixed).unwrap();
        assert_eq!(result.rects[1].w, 42.0);
        assert_eq!(result.rects[1].h, 17.0);
    }

    #[test]
    fn hidden_nodes_take_no_space() {
        let mut root = constraints();
        root.size.width = px(100.0);
        root.size.height = px(50.0);
        let mut hidden = constraints();
        hidden.size.width = px(30.0);
        hidden.hidden = true;
        let mut shown = constraints();
        shown.size.width = px(30.0);
        shown.size.height = px(10.0);

        let req = request(vec![root, hidden, shown], vec![None, Some(0), Some(0)]);
        let mut oracle = FlexOracle::new();
        let result = oracle.layout(&req, &mut NoMeasure).unwrap();
        assert_eq!(result.rects[2].x, 0.0);
    }
}
