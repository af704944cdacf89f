//! Serde boundary model of a raw design document.
//!
//! These are the shapes a document provider hands the resolver: a tree of
//! styled views with component/variant references, parameter bindings, and
//! list-content markers. How the provider obtained them (network, cache,
//! embedded asset) is outside the crate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::foundation::geometry::Rgba8;

/// One node of a raw document view tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub style: StyleDef,
    #[serde(default)]
    pub bindings: BindingsDef,
    pub kind: ViewKindDef,
}

/// Leaf/container kind of a view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKindDef {
    Frame {
        #[serde(default)]
        children: Vec<ViewDef>,
    },
    Text {
        text: String,
        #[serde(default = "default_text_size")]
        size_px: f64,
    },
    Vector {
        svg_path_d: String,
    },
    /// Host-embedded child content; the host supplies the real subtree (or
    /// renders into the slot itself) and the engine only reserves geometry.
    Embedded {
        #[serde(default)]
        slot: Option<String>,
    },
    /// Reference to a component set; resolved against the active variant
    /// selection, with instance-level overrides applied on top.
    Instance {
        component: String,
        #[serde(default)]
        overrides: OverridesDef,
    },
    /// List/grid content. Static children are placeholders only: when the
    /// customization context carries a content generator for this node id,
    /// the generator's items are spliced in instead.
    List {
        #[serde(default)]
        children: Vec<ViewDef>,
    },
}

fn default_text_size() -> f64 {
    14.0
}

/// Parameter bindings on a view. Bound values come from the customization
/// context at resolve time; unbound views use their authored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingsDef {
    /// Name of a text parameter replacing the authored text.
    #[serde(default)]
    pub text: Option<String>,
    /// Name of a visibility flag controlling this view.
    #[serde(default)]
    pub visible: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleDef {
    #[serde(default)]
    pub size: SizeDef,
    #[serde(default)]
    pub min_size: SizeDef,
    #[serde(default)]
    pub max_size: SizeDef,
    #[serde(default)]
    pub direction: DirectionDef,
    #[serde(default)]
    pub justify_content: JustifyDef,
    #[serde(default)]
    pub align_items: AlignDef,
    #[serde(default)]
    pub position: PositionDef,
    #[serde(default)]
    pub gap_px: f64,
    #[serde(default)]
    pub padding_px: EdgesDef,
    #[serde(default)]
    pub flex_grow: f64,
    #[serde(default = "default_flex_shrink")]
    pub flex_shrink: f64,

    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub transform: TransformDef,
    #[serde(default)]
    pub fill: Option<Rgba8>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_flex_shrink() -> f64 {
    1.0
}

fn default_opacity() -> f32 {
    1.0
}

fn default_visible() -> bool {
    true
}

// Keep in sync with the serde field defaults above: an unstyled view is
// visible, fully opaque, and shrinkable.
impl Default for StyleDef {
    fn default() -> Self {
        Self {
            size: SizeDef::default(),
            min_size: SizeDef::default(),
            max_size: SizeDef::default(),
            direction: DirectionDef::default(),
            justify_content: JustifyDef::default(),
            align_items: AlignDef::default(),
            position: PositionDef::default(),
            gap_px: 0.0,
            padding_px: EdgesDef::default(),
            flex_grow: 0.0,
            flex_shrink: default_flex_shrink(),
            opacity: default_opacity(),
            transform: TransformDef::default(),
            fill: None,
            visible: default_visible(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeDef {
    #[serde(default)]
    pub width: DimensionDef,
    #[serde(default)]
    pub height: DimensionDef,
}

/// Size constraint along one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum DimensionDef {
    #[default]
    Auto,
    Px(f64),
    Percent(f64),
}

impl<'de> Deserialize<'de> for DimensionDef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            Num(f64),
            ObjPx { px: f64 },
            ObjPercent { percent: f64 },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Str(s) => match s.as_str() {
                "auto" => Ok(Self::Auto),
                other => Err(serde::de::Error::custom(format!(
                    "unknown dimension string \"{other}\" (expected \"auto\")"
                ))),
            },
            Repr::Num(v) => Ok(Self::Px(v)),
            Repr::ObjPx { px } => Ok(Self::Px(px)),
            Repr::ObjPercent { percent } => Ok(Self::Percent(percent)),
        }
    }
}

impl Serialize for DimensionDef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            Self::Auto => serializer.serialize_str("auto"),
            Self::Px(px) => {
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry("px", px)?;
                m.end()
            }
            Self::Percent(p) => {
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry("percent", p)?;
                m.end()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EdgesDef {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl EdgesDef {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

impl<'de> Deserialize<'de> for EdgesDef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct EdgesObj {
            #[serde(default)]
            top: f64,
            #[serde(default)]
            right: f64,
            #[serde(default)]
            bottom: f64,
            #[serde(default)]
            left: f64,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            // Shorthand: single number applies to all edges.
            Num(f64),
            Obj(EdgesObj),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Num(v) => Ok(Self::uniform(v)),
            Repr::Obj(o) => Ok(Self {
                top: o.top,
                right: o.right,
                bottom: o.bottom,
                left: o.left,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionDef {
    #[default]
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JustifyDef {
    #[default]
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignDef {
    Start,
    End,
    Center,
    #[default]
    Stretch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionDef {
    #[default]
    Relative,
    Absolute,
}

/// Rotate/scale/translate authored on a view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformDef {
    #[serde(default)]
    pub translate: [f64; 2],
    #[serde(default)]
    pub rotation_deg: f64,
    #[serde(default = "default_scale")]
    pub scale: [f64; 2],
}

fn default_scale() -> [f64; 2] {
    [1.0, 1.0]
}

impl Default for TransformDef {
    fn default() -> Self {
        Self {
            translate: [0.0, 0.0],
            rotation_deg: 0.0,
            scale: [1.0, 1.0],
        }
    }
}

/// Instance-level overrides recorded on a component instance.
///
/// Keys are node ids inside the referenced component definition. Overrides are
/// applied on top of the chosen variant's base values and always win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverridesDef {
    #[serde(default)]
    pub text: BTreeMap<String, String>,
    #[serde(default)]
    pub style: BTreeMap<String, StylePatchDef>,
}

impl OverridesDef {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.style.is_empty()
    }
}

/// Sparse style override: only the set fields replace the variant's values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StylePatchDef {
    #[serde(default)]
    pub size: Option<SizeDef>,
    #[serde(default)]
    pub opacity: Option<f32>,
    #[serde(default)]
    pub fill: Option<Rgba8>,
    #[serde(default)]
    pub transform: Option<TransformDef>,
    #[serde(default)]
    pub visible: Option<bool>,
}

/// A component set: named variant axes and one view definition per variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSetDef {
    pub id: String,
    /// Variant property names this set varies over (e.g. "state", "size").
    pub properties: Vec<String>,
    pub variants: Vec<VariantDef>,
    /// Index into `variants` used when no selection applies.
    #[serde(default)]
    pub default_variant: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantDef {
    /// Property name → value this variant answers to (e.g. state=pressed).
    pub selectors: BTreeMap<String, String>,
    pub view: ViewDef,
}

impl ComponentSetDef {
    /// The variant matching `selection` exactly on every property the
    /// selection names, or `None` when no variant matches.
    pub fn variant_for(&self, selection: &BTreeMap<String, String>) -> Option<&VariantDef> {
        self.variants.iter().find(|v| {
            self.properties.iter().all(|prop| {
                match (selection.get(prop), v.selectors.get(prop)) {
                    (Some(wanted), Some(have)) => wanted == have,
                    // Property not selected: any value matches; the first
                    // variant in authoring order wins, like the default.
                    (None, _) => true,
                    (Some(_), None) => false,
                }
            })
        })
    }

    pub fn default_variant(&self) -> Option<&VariantDef> {
        self.variants.get(self.default_variant)
    }
}
