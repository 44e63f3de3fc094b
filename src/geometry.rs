use std::{fmt, num::NonZeroU32};

use smithay::utils::{Logical, Point, Rectangle, Size};

/// Output-relative rectangle. Width and height are never negative.
pub type Rect = Rectangle<i32, Logical>;

pub fn rect(x: i32, y: i32, width: i32, height: i32) -> Rect {
    Rectangle::new(
        Point::from((x, y)),
        Size::from((width.max(0), height.max(0))),
    )
}

pub fn is_empty(rect: &Rect) -> bool {
    rect.size.w <= 0 || rect.size.h <= 0
}

/// Shrinks `rect` by `horizontal` on the left and right edges and by
/// `vertical` on the top and bottom edges. Underflow yields a zero-sized box.
pub fn shrink(rect: Rect, horizontal: i32, vertical: i32) -> Rect {
    let width = (rect.size.w - 2 * horizontal).max(0);
    let height = (rect.size.h - 2 * vertical).max(0);
    self::rect(
        rect.loc.x + horizontal.min(rect.size.w / 2),
        rect.loc.y + vertical.min(rect.size.h / 2),
        width,
        height,
    )
}

/// Centers a box of `size` inside `area`, clamped to fit.
pub fn centered(area: Rect, size: Size<i32, Logical>) -> Rect {
    let width = size.w.clamp(0, area.size.w.max(0));
    let height = size.h.clamp(0, area.size.h.max(0));
    rect(
        area.loc.x + (area.size.w - width) / 2,
        area.loc.y + (area.size.h - height) / 2,
        width,
        height,
    )
}

/// Set of workspace tags. Bit `i` is workspace `i`; the empty set cannot be
/// represented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TagSet(NonZeroU32);

impl TagSet {
    pub const FIRST: TagSet = TagSet(NonZeroU32::MIN);

    pub fn new(bits: u32) -> Option<Self> {
        NonZeroU32::new(bits).map(Self)
    }

    /// Falls back to the first tag when `bits` is zero.
    pub fn or_first(bits: u32) -> Self {
        Self::new(bits).unwrap_or(Self::FIRST)
    }

    pub fn bits(self) -> u32 {
        self.0.get()
    }

    pub fn intersects(self, other: TagSet) -> bool {
        self.bits() & other.bits() != 0
    }

    /// Returns the set with `mask` toggled, or `None` if that would clear
    /// every tag.
    pub fn toggled(self, mask: TagSet) -> Option<Self> {
        Self::new(self.bits() ^ mask.bits())
    }
}

impl Default for TagSet {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.bits())
    }
}
