//! Overlay transform state and affine math.
//!
//! The overlay is placed with the same pipeline a 2D canvas uses:
//! translate to the anchor, rotate, then scale. `Affine` carries that
//! composition as a 2x3 matrix in canvas `setTransform(a, b, c, d, e, f)`
//! order so every surface backend can consume it directly.

/// 2x3 affine matrix mapping `(x, y)` to
/// `(a * x + c * y + e, b * x + d * y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Affine {
    /// The identity transform.
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Translation by `(tx, ty)`.
    pub fn translation(tx: f32, ty: f32) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// Rotation by `degrees`, clockwise-positive in y-down screen space.
    pub fn rotation_degrees(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Uniform scale about the origin.
    pub fn scaling(scale: f32) -> Self {
        Self {
            a: scale,
            d: scale,
            ..Self::IDENTITY
        }
    }

    /// Compose two transforms: the result applies `rhs` first, then `self`.
    ///
    /// This matches how successive `translate`/`rotate`/`scale` calls
    /// accumulate on a canvas context.
    pub fn multiply(&self, rhs: &Affine) -> Affine {
        Affine {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            e: self.a * rhs.e + self.c * rhs.f + self.e,
            f: self.b * rhs.e + self.d * rhs.f + self.f,
        }
    }

    /// Apply `self`, then `next`.
    pub fn then(&self, next: &Affine) -> Affine {
        next.multiply(self)
    }

    /// Map a point.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse transform, or `None` if the matrix is singular.
    pub fn invert(&self) -> Option<Affine> {
        let det = self.determinant();
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        Some(Affine {
            a: self.d * inv_det,
            b: -self.b * inv_det,
            c: -self.c * inv_det,
            d: self.a * inv_det,
            e: (self.c * self.f - self.d * self.e) * inv_det,
            f: (self.b * self.e - self.a * self.f) * inv_det,
        })
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Wrap an angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Wrap an angle into `(-180, 180]`.
pub fn signed_degrees(degrees: f32) -> f32 {
    let wrapped = normalize_degrees(degrees);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

/// A complete overlay placement: where the anchor is and how the garment
/// is scaled and rotated about it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub scale: f32,
    pub rotation_degrees: f32,
}

impl Placement {
    /// A placement can be committed only if every field is finite and the
    /// scale is positive.
    pub fn is_valid(&self) -> bool {
        self.anchor_x.is_finite()
            && self.anchor_y.is_finite()
            && self.rotation_degrees.is_finite()
            && self.scale.is_finite()
            && self.scale > 0.0
    }
}

/// Overlay transform plus manual-drag bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformState {
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub scale: f32,
    pub rotation_degrees: f32,
    /// Whether a manual drag is in progress
    pub dragging: bool,
    /// Last pointer position in surface pixels (valid while dragging)
    pub last_pointer_x: f32,
    pub last_pointer_y: f32,
}

impl TransformState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current placement, without drag bookkeeping.
    pub fn placement(&self) -> Placement {
        Placement {
            anchor_x: self.anchor_x,
            anchor_y: self.anchor_y,
            scale: self.scale,
            rotation_degrees: self.rotation_degrees,
        }
    }

    /// Commit a placement. Invalid placements are refused and leave the
    /// state untouched.
    pub fn apply(&mut self, placement: Placement) -> bool {
        if !placement.is_valid() {
            log::warn!("Refusing invalid overlay placement {:?}", placement);
            return false;
        }
        self.anchor_x = placement.anchor_x;
        self.anchor_y = placement.anchor_y;
        self.scale = placement.scale;
        self.rotation_degrees = placement.rotation_degrees;
        true
    }

    /// Commit a placement and drop any drag in progress.
    pub fn reset(&mut self, placement: Placement) -> bool {
        self.end_drag();
        self.apply(placement)
    }

    /// Move the anchor by a delta. Non-finite deltas are ignored.
    pub fn translate_by(&mut self, dx: f32, dy: f32) -> bool {
        let (x, y) = (self.anchor_x + dx, self.anchor_y + dy);
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        self.anchor_x = x;
        self.anchor_y = y;
        true
    }

    /// Start a drag at a surface-local position.
    pub fn start_drag(&mut self, pos: (f32, f32)) {
        self.dragging = true;
        self.last_pointer_x = pos.0;
        self.last_pointer_y = pos.1;
    }

    /// Update the drag position and return the delta since the last one.
    pub fn update_drag(&mut self, pos: (f32, f32)) -> Option<(f32, f32)> {
        if !self.dragging {
            return None;
        }
        let delta = (pos.0 - self.last_pointer_x, pos.1 - self.last_pointer_y);
        self.last_pointer_x = pos.0;
        self.last_pointer_y = pos.1;
        Some(delta)
    }

    /// End the drag operation.
    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    /// Local-to-surface matrix for the garment: `T(anchor) * R(rotation) * S(scale)`.
    pub fn overlay_matrix(&self) -> Affine {
        Affine::translation(self.anchor_x, self.anchor_y)
            .multiply(&Affine::rotation_degrees(self.rotation_degrees))
            .multiply(&Affine::scaling(self.scale))
    }
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            anchor_x: 0.0,
            anchor_y: 0.0,
            scale: 1.0,
            rotation_degrees: 0.0,
            dragging: false,
            last_pointer_x: 0.0,
            last_pointer_y: 0.0,
        }
    }
}
