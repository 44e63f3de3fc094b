//! Tiling policies.
//!
//! A layout turns a count of tiled views and an area into one box per view,
//! in stack order. Gaps and borders are applied around the policy by
//! [`arrange`], so policies only subdivide.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::geometry::{self, Rect};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GapConfig {
    pub outer_horizontal: u32,
    pub outer_vertical: u32,
    pub inner_horizontal: u32,
    pub inner_vertical: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutParams {
    pub master_count: u32,
    pub master_factor: f64,
    pub gaps: GapConfig,
    pub border_width: u32,
    /// Drop every gap when at most one view is tiled.
    pub smart_gaps: bool,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            master_count: 1,
            master_factor: 0.6,
            gaps: GapConfig::default(),
            border_width: 0,
            smart_gaps: true,
        }
    }
}

pub trait Layout {
    fn name(&self) -> &'static str;

    /// Subdivides `area` into exactly `count` boxes.
    fn arrange(&self, count: usize, area: Rect, params: &LayoutParams) -> Vec<Rect>;
}

pub type LayoutBox = Box<dyn Layout>;

/// Side of the output the master area sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Top,
    Right,
    Bottom,
    Left,
}

impl Orientation {
    fn splits_width(self) -> bool {
        matches!(self, Orientation::Left | Orientation::Right)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutType {
    Full,
    MasterStack(Orientation),
    Spiral,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown layout `{0}` (expected full, top-master, right-master, bottom-master, left-master or spiral)")]
pub struct ParseLayoutError(pub String);

impl FromStr for LayoutType {
    type Err = ParseLayoutError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "full" | "monocle" => Ok(LayoutType::Full),
            "top-master" => Ok(LayoutType::MasterStack(Orientation::Top)),
            "right-master" => Ok(LayoutType::MasterStack(Orientation::Right)),
            "bottom-master" => Ok(LayoutType::MasterStack(Orientation::Bottom)),
            "left-master" | "tile" | "tiling" => Ok(LayoutType::MasterStack(Orientation::Left)),
            "spiral" => Ok(LayoutType::Spiral),
            _ => Err(ParseLayoutError(raw.to_owned())),
        }
    }
}

impl LayoutType {
    pub fn build(self) -> LayoutBox {
        match self {
            LayoutType::Full => Box::new(Full),
            LayoutType::MasterStack(orientation) => Box::new(MasterStack { orientation }),
            LayoutType::Spiral => Box::new(Spiral),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LayoutType::Full => "full",
            LayoutType::MasterStack(Orientation::Top) => "top-master",
            LayoutType::MasterStack(Orientation::Right) => "right-master",
            LayoutType::MasterStack(Orientation::Bottom) => "bottom-master",
            LayoutType::MasterStack(Orientation::Left) => "left-master",
            LayoutType::Spiral => "spiral",
        }
    }
}

impl Default for LayoutType {
    fn default() -> Self {
        LayoutType::MasterStack(Orientation::Left)
    }
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Computes the boxes for `count` tiled views in `area`.
///
/// With zero or one view the full policy is used whatever `layout` says.
pub fn arrange(layout: LayoutType, count: usize, area: Rect, params: &LayoutParams) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }

    let single = count == 1;
    let gaps = if single && params.smart_gaps {
        GapConfig::default()
    } else {
        params.gaps
    };
    let layout = if single { LayoutType::Full } else { layout };

    let area = geometry::shrink(
        area,
        gaps.outer_horizontal as i32,
        gaps.outer_vertical as i32,
    );
    let border = params.border_width as i32;

    layout
        .build()
        .arrange(count, area, params)
        .into_iter()
        .map(|rect| {
            geometry::shrink(
                rect,
                gaps.inner_horizontal as i32 + border,
                gaps.inner_vertical as i32 + border,
            )
        })
        .collect()
}

struct Full;

impl Layout for Full {
    fn name(&self) -> &'static str {
        "full"
    }

    fn arrange(&self, count: usize, area: Rect, _params: &LayoutParams) -> Vec<Rect> {
        vec![area; count]
    }
}

struct MasterStack {
    orientation: Orientation,
}

impl Layout for MasterStack {
    fn name(&self) -> &'static str {
        LayoutType::MasterStack(self.orientation).name()
    }

    fn arrange(&self, count: usize, area: Rect, params: &LayoutParams) -> Vec<Rect> {
        let master = (params.master_count as usize).min(count);
        let stack = count - master;

        let (along, across) = if self.orientation.splits_width() {
            (area.size.w, area.size.h)
        } else {
            (area.size.h, area.size.w)
        };

        let master_extent = if master == 0 {
            0
        } else if stack == 0 {
            along
        } else {
            // Truncated, never rounded up into the stack.
            ((along as f64 * params.master_factor) as i32).clamp(0, along)
        };
        let stack_extent = along - master_extent;

        let (master_offset, stack_offset) = match self.orientation {
            Orientation::Left | Orientation::Top => (0, master_extent),
            Orientation::Right | Orientation::Bottom => (stack_extent, 0),
        };

        (0..count)
            .map(|index| {
                let (offset, extent, position, members) = if index < master {
                    (master_offset, master_extent, index, master)
                } else {
                    (stack_offset, stack_extent, index - master, stack)
                };
                let (start, length) = split(across, members, position);

                if self.orientation.splits_width() {
                    geometry::rect(area.loc.x + offset, area.loc.y + start, extent, length)
                } else {
                    geometry::rect(area.loc.x + start, area.loc.y + offset, length, extent)
                }
            })
            .collect()
    }
}

/// Start and length of member `index` when `total` is divided among
/// `members`. The first member absorbs the remainder.
fn split(total: i32, members: usize, index: usize) -> (i32, i32) {
    let members = members.max(1) as i32;
    let index = index as i32;
    let base = total / members;
    let remainder = total % members;
    if index == 0 {
        (0, base + remainder)
    } else {
        (remainder + index * base, base)
    }
}

/// Each view takes half of what is left, alternating between width and
/// height and turning clockwise.
struct Spiral;

impl Layout for Spiral {
    fn name(&self) -> &'static str {
        "spiral"
    }

    fn arrange(&self, count: usize, area: Rect, _params: &LayoutParams) -> Vec<Rect> {
        let (mut x, mut y) = (area.loc.x, area.loc.y);
        let (mut w, mut h) = (area.size.w, area.size.h);
        let mut boxes = Vec::with_capacity(count);

        for index in 0..count.saturating_sub(1) {
            if index % 2 == 0 {
                let taken = w / 2;
                let rest = w - taken;
                if index % 4 == 2 {
                    boxes.push(geometry::rect(x + rest, y, taken, h));
                } else {
                    boxes.push(geometry::rect(x, y, taken, h));
                    x += taken;
                }
                w = rest;
            } else {
                let taken = h / 2;
                let rest = h - taken;
                if index % 4 == 3 {
                    boxes.push(geometry::rect(x, y + rest, w, taken));
                } else {
                    boxes.push(geometry::rect(x, y, w, taken));
                    y += taken;
                }
                h = rest;
            }
        }
        boxes.push(geometry::rect(x, y, w, h));
        boxes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect;

    const ORIENTATIONS: [Orientation; 4] = [
        Orientation::Top,
        Orientation::Right,
        Orientation::Bottom,
        Orientation::Left,
    ];

    fn params(master_count: u32, master_factor: f64) -> LayoutParams {
        LayoutParams {
            master_count,
            master_factor,
            ..LayoutParams::default()
        }
    }

    #[test]
    fn left_master_three_views() {
        let boxes = arrange(
            LayoutType::MasterStack(Orientation::Left),
            3,
            rect(0, 0, 1920, 1080),
            &params(1, 0.6),
        );
        assert_eq!(
            boxes,
            vec![
                rect(0, 0, 1152, 1080),
                rect(1152, 0, 768, 540),
                rect(1152, 540, 768, 540),
            ]
        );
    }

    #[test]
    fn single_view_gets_whole_area_for_every_layout() {
        let area = rect(0, 30, 1920, 1050);
        for name in ["full", "top-master", "right-master", "bottom-master", "left-master", "spiral"] {
            let layout: LayoutType = name.parse().expect("known layout");
            assert_eq!(arrange(layout, 1, area, &params(1, 0.6)), vec![area], "{name}");
            assert!(arrange(layout, 0, area, &params(1, 0.6)).is_empty());
        }
    }

    #[test]
    fn region_extents_sum_exactly() {
        let area = rect(10, 20, 1001, 777);
        for orientation in ORIENTATIONS {
            for count in 1..=7usize {
                for master_count in 0..=count as u32 {
                    let boxes = MasterStack { orientation }.arrange(
                        count,
                        area,
                        &params(master_count, 0.55),
                    );
                    assert_eq!(boxes.len(), count);

                    let master = master_count as usize;
                    let (across, along_of): (i32, fn(&Rect) -> i32) =
                        if orientation.splits_width() {
                            (area.size.h, |r: &Rect| r.size.h)
                        } else {
                            (area.size.w, |r: &Rect| r.size.w)
                        };
                    if master > 0 {
                        let sum: i32 = boxes[..master].iter().map(along_of).sum();
                        assert_eq!(sum, across, "{orientation:?} n={count} m={master}");
                    }
                    if master < count {
                        let sum: i32 = boxes[master..].iter().map(along_of).sum();
                        assert_eq!(sum, across, "{orientation:?} n={count} m={master}");
                    }

                    let total: i64 = boxes.iter().map(|r| r.size.w as i64 * r.size.h as i64).sum();
                    assert_eq!(total, area.size.w as i64 * area.size.h as i64);
                }
            }
        }
    }

    #[test]
    fn master_extent_is_truncated() {
        let boxes = MasterStack {
            orientation: Orientation::Left,
        }
        .arrange(2, rect(0, 0, 1001, 500), &params(1, 0.55));
        // 1001 * 0.55 = 550.55
        assert_eq!(boxes, vec![rect(0, 0, 550, 500), rect(550, 0, 451, 500)]);
    }

    #[test]
    fn right_master_places_stack_on_the_left() {
        let boxes = MasterStack {
            orientation: Orientation::Right,
        }
        .arrange(2, rect(0, 0, 1000, 500), &params(1, 0.7));
        assert_eq!(boxes, vec![rect(300, 0, 700, 500), rect(0, 0, 300, 500)]);
    }

    #[test]
    fn zero_master_count_gives_stack_everything() {
        let boxes = MasterStack {
            orientation: Orientation::Top,
        }
        .arrange(2, rect(0, 0, 1000, 500), &params(0, 0.7));
        assert_eq!(boxes, vec![rect(0, 0, 500, 500), rect(500, 0, 500, 500)]);
    }

    #[test]
    fn gaps_and_borders_shrink_each_box() {
        let params = LayoutParams {
            gaps: GapConfig {
                outer_horizontal: 10,
                outer_vertical: 10,
                inner_horizontal: 5,
                inner_vertical: 5,
            },
            border_width: 2,
            ..params(1, 0.5)
        };
        let boxes = arrange(
            LayoutType::MasterStack(Orientation::Left),
            2,
            rect(0, 0, 1020, 520),
            &params,
        );
        assert_eq!(boxes, vec![rect(17, 17, 486, 486), rect(517, 17, 486, 486)]);
    }

    #[test]
    fn padding_larger_than_area_yields_empty_boxes() {
        let params = LayoutParams {
            gaps: GapConfig {
                outer_horizontal: 400,
                outer_vertical: 400,
                ..GapConfig::default()
            },
            smart_gaps: false,
            ..params(1, 0.5)
        };
        let boxes = arrange(LayoutType::Full, 2, rect(0, 0, 600, 600), &params);
        assert!(boxes.iter().all(geometry::is_empty));
    }

    #[test]
    fn spiral_covers_the_area() {
        let area = rect(0, 0, 1000, 800);
        let boxes = Spiral.arrange(4, area, &params(1, 0.5));
        assert_eq!(
            boxes,
            vec![
                rect(0, 0, 500, 800),
                rect(500, 0, 500, 400),
                rect(750, 400, 250, 400),
                rect(500, 400, 250, 400),
            ]
        );
    }

    #[test]
    fn unknown_layout_is_rejected() {
        assert_eq!(
            "grid".parse::<LayoutType>(),
            Err(ParseLayoutError("grid".to_owned()))
        );
    }
}
