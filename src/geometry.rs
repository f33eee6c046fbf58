//! Frame-space rectangles.
//!
//! - `BoundingBox`: unclamped `{x, y, width, height}` as reported by a detector.
//!   Width/height may be zero or negative and must be clamped before use.
//! - `Edges`: the same rectangle as `left/top/right/bottom` coordinates.
//! - `Region`: a rectangle that is always contained in `[0, 0, width, height]`
//!   of the capture it was clamped against. Fields are private so the
//!   containment holds by construction.

/// Clip `n` into `[lower, upper]`.
pub fn clip<T: PartialOrd>(n: T, lower: T, upper: T) -> T {
    if n < lower {
        lower
    } else if n > upper {
        upper
    } else {
        n
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn edges(&self) -> Edges {
        Edges {
            left: self.x as i64,
            top: self.y as i64,
            right: self.x as i64 + self.width as i64,
            bottom: self.y as i64 + self.height as i64,
        }
    }

    /// Minimal box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let a = self.edges();
        let b = other.edges();
        Edges {
            left: a.left.min(b.left),
            top: a.top.min(b.top),
            right: a.right.max(b.right),
            bottom: a.bottom.max(b.bottom),
        }
        .to_box()
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        let a = self.edges();
        let b = other.edges();
        a.left <= b.left && a.top <= b.top && a.right >= b.right && a.bottom >= b.bottom
    }

    pub fn has_positive_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Rectangle as edge coordinates. `i64` so that edge arithmetic on
/// detector output cannot overflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edges {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Edges {
    pub fn to_box(&self) -> BoundingBox {
        BoundingBox {
            x: saturate(self.left),
            y: saturate(self.top),
            width: saturate(self.right - self.left),
            height: saturate(self.bottom - self.top),
        }
    }
}

fn saturate(v: i64) -> i32 {
    clip(v, i32::MIN as i64, i32::MAX as i64) as i32
}

/// A rectangle clamped to a capture of `bounds` pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl Region {
    /// The whole capture `[0, 0, width, height]`.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    /// Clamp `bbox` to `[0, 0, width, height]`.
    pub fn clamped(bbox: &BoundingBox, width: u32, height: u32) -> Self {
        Self::from_edges(bbox.edges(), width, height)
    }

    /// Clamp each edge independently. A right/bottom edge that ends up before
    /// its left/top edge collapses onto it, giving a zero-sized region.
    pub fn from_edges(edges: Edges, width: u32, height: u32) -> Self {
        let w = width as i64;
        let h = height as i64;
        let left = clip(edges.left, 0, w);
        let top = clip(edges.top, 0, h);
        let right = clip(edges.right, left, w);
        let bottom = clip(edges.bottom, top, h);
        Self {
            left: left as u32,
            top: top as u32,
            right: right as u32,
            bottom: bottom as u32,
        }
    }

    pub fn x(&self) -> u32 {
        self.left
    }

    pub fn y(&self) -> u32 {
        self.top
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn edges(&self) -> Edges {
        Edges {
            left: self.left as i64,
            top: self.top as i64,
            right: self.right as i64,
            bottom: self.bottom as i64,
        }
    }

    pub fn as_box(&self) -> BoundingBox {
        self.edges().to_box()
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// True when the region lies inside `[0, 0, width, height]`.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right <= width && self.bottom <= height
    }
}
