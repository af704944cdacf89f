use serde::{Deserialize, Serialize};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Pixel-space rectangle produced by the layout oracle.
///
/// Coordinates are relative to the parent node, which is what the oracle
/// reports natively; use [`crate::resolve::tree::ResolvedTree::absolute_rect`]
/// to accumulate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RectPx {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl RectPx {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        w: 0.0,
        h: 0.0,
    };

    pub fn origin(self) -> Vec2 {
        Vec2::new(f64::from(self.x), f64::from(self.y))
    }

    pub fn size(self) -> Vec2 {
        Vec2::new(f64::from(self.w), f64::from(self.h))
    }
}

/// Host viewport the root is laid out against, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Non-premultiplied 8-bit RGBA paint color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Affine transform split into independently animatable channels.
///
/// Skew is folded into the decomposition error and ignored: design documents
/// in practice author rotate/scale/translate, and the differ animates exactly
/// those channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecomposedTransform {
    pub translation: Vec2,
    pub rotation_rad: f64,
    pub scale: Vec2,
}

impl DecomposedTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec2::new(0.0, 0.0),
        rotation_rad: 0.0,
        scale: Vec2::new(1.0, 1.0),
    };

    /// Decompose `[xx, yx, xy, yy, tx, ty]` into translate/rotate/scale.
    pub fn from_affine(affine: Affine) -> Self {
        let [xx, yx, xy, yy, tx, ty] = affine.as_coeffs();
        let scale_x = (xx * xx + yx * yx).sqrt();
        let det = xx * yy - xy * yx;
        let scale_y = if scale_x != 0.0 { det / scale_x } else { 0.0 };
        let rotation_rad = yx.atan2(xx);
        Self {
            translation: Vec2::new(tx, ty),
            rotation_rad,
            scale: Vec2::new(scale_x, scale_y),
        }
    }

    pub fn to_affine(self) -> Affine {
        Affine::translate(self.translation)
            * Affine::rotate(self.rotation_rad)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
    }
}

pub(crate) fn lerp_f64(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

pub(crate) fn lerp_vec2(a: Vec2, b: Vec2, t: f64) -> Vec2 {
    Vec2::new(lerp_f64(a.x, b.x, t), lerp_f64(a.y, b.y, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_roundtrips_rotate_scale_translate() {
        let src = DecomposedTransform {
            translation: Vec2::new(12.0, -3.0),
            rotation_rad: 0.7,
            scale: Vec2::new(2.0, 0.5),
        };
        let back = DecomposedTransform::from_affine(src.to_affine());
        assert!((back.translation - src.translation).hypot() < 1e-9);
        assert!((back.rotation_rad - src.rotation_rad).abs() < 1e-9);
        assert!((back.scale - src.scale).hypot() < 1e-9);
    }

    #[test]
    fn identity_decomposes_to_identity() {
        let d = DecomposedTransform::from_affine(Affine::IDENTITY);
        assert_eq!(d, DecomposedTransform::IDENTITY);
    }

    #[test]
    fn lerp_endpoints() {
        assert_eq!(lerp_f64(1.0, 5.0, 0.0), 1.0);
        assert_eq!(lerp_f64(1.0, 5.0, 1.0), 5.0);
        assert_eq!(lerp_f64(1.0, 5.0, 0.5), 3.0);
    }
}
