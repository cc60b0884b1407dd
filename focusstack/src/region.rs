//! Rectangular regions in buffer coordinates.
//!
//! A [`Rect`] marks the part of an image buffer that holds genuine content,
//! as opposed to synthetic border padding added for the wavelet transform.
//! A zero-area rectangle means "unset" and is read as the whole buffer by
//! the valid-region accessors in [`crate::task::image`].

/// An axis-aligned rectangle in pixel coordinates.
///
/// Coordinates are relative to the top-left corner of the buffer the
/// rectangle describes. A rectangle with zero width or height is "empty"
/// and stands for an unset valid region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    /// Left edge, in pixels from the buffer's left border.
    pub x: u32,
    /// Top edge, in pixels from the buffer's top border.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Creates a rectangle from its top-left corner and size.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle covering an entire `width` × `height` buffer.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Returns true if the rectangle has zero area.
    ///
    /// An empty rectangle denotes an unset valid region.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Returns true if the rectangle exactly covers a `width` × `height` buffer.
    pub fn covers(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }

    /// Intersects two rectangles.
    ///
    /// Used when two images combine so that the tightest common content
    /// region propagates downstream. Disjoint rectangles intersect to an
    /// empty rectangle anchored at the overlap corner.
    pub fn intersect(&self, other: Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        Rect {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }

    /// Clamps the rectangle so it lies fully inside a `width` × `height` buffer.
    ///
    /// Guards against callers pairing a region with a mismatched buffer.
    /// The result is always a sub-rectangle of the bounds; a rectangle
    /// starting outside the buffer clamps to an empty one at the border.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Rect {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}×{}+{}+{}",
            self.width, self.height, self.x, self.y
        )
    }
}
