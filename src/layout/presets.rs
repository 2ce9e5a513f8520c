//! Layout presets: pure functions from (panes, window size) to a tree.

use crate::registry::PaneId;

use super::{Layout, LayoutNode, Orientation, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPreset {
    EvenHorizontal,
    EvenVertical,
    MainHorizontal,
    MainVertical,
    Tiled,
}

impl LayoutPreset {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "even-horizontal" => Some(Self::EvenHorizontal),
            "even-vertical" => Some(Self::EvenVertical),
            "main-horizontal" => Some(Self::MainHorizontal),
            "main-vertical" => Some(Self::MainVertical),
            "tiled" => Some(Self::Tiled),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::EvenHorizontal => "even-horizontal",
            Self::EvenVertical => "even-vertical",
            Self::MainHorizontal => "main-horizontal",
            Self::MainVertical => "main-vertical",
            Self::Tiled => "tiled",
        }
    }

    /// Build a fresh tree tiling `panes` into a `w`×`h` window.
    pub fn apply(self, panes: &[PaneId], w: u16, h: u16) -> Layout {
        assert!(!panes.is_empty(), "preset needs at least one pane");
        let rect = Rect::new(0, 0, w.max(1), h.max(1));
        if panes.len() == 1 {
            return Layout { root: LayoutNode::Leaf { pane: panes[0], rect } };
        }

        let root = match self {
            Self::EvenHorizontal => row_of(panes, rect, Orientation::Horizontal),
            Self::EvenVertical => row_of(panes, rect, Orientation::Vertical),
            Self::MainVertical => {
                // Large pane on the left, the rest stacked to the right.
                let main_w = (rect.w.saturating_sub(1)) * 2 / 3;
                let rest_w = rect.w.saturating_sub(main_w + 1);
                let main = LayoutNode::Leaf {
                    pane: panes[0],
                    rect: Rect::new(rect.x, rect.y, main_w, rect.h),
                };
                let rest = row_of(
                    &panes[1..],
                    Rect::new(rect.x + main_w + 1, rect.y, rest_w, rect.h),
                    Orientation::Vertical,
                );
                LayoutNode::Split {
                    orient: Orientation::Horizontal,
                    rect,
                    children: vec![main, rest],
                }
            }
            Self::MainHorizontal => {
                // Large pane on top, the rest side by side below.
                let main_h = (rect.h.saturating_sub(1)) * 2 / 3;
                let rest_h = rect.h.saturating_sub(main_h + 1);
                let main = LayoutNode::Leaf {
                    pane: panes[0],
                    rect: Rect::new(rect.x, rect.y, rect.w, main_h),
                };
                let rest = row_of(
                    &panes[1..],
                    Rect::new(rect.x, rect.y + main_h + 1, rect.w, rest_h),
                    Orientation::Horizontal,
                );
                LayoutNode::Split {
                    orient: Orientation::Vertical,
                    rect,
                    children: vec![main, rest],
                }
            }
            Self::Tiled => tiled(panes, rect),
        };
        Layout { root }
    }
}

/// One split with `panes` distributed evenly along `orient`.
fn row_of(panes: &[PaneId], rect: Rect, orient: Orientation) -> LayoutNode {
    if panes.len() == 1 {
        return LayoutNode::Leaf { pane: panes[0], rect };
    }

    let n = panes.len() as u16;
    let total = match orient {
        Orientation::Horizontal => rect.w,
        Orientation::Vertical => rect.h,
    };
    let sizes = even_sizes(total.saturating_sub(n - 1), n);

    let mut children = Vec::with_capacity(panes.len());
    let mut offset = match orient {
        Orientation::Horizontal => rect.x,
        Orientation::Vertical => rect.y,
    };
    for (&pane, &size) in panes.iter().zip(&sizes) {
        let leaf_rect = match orient {
            Orientation::Horizontal => Rect::new(offset, rect.y, size, rect.h),
            Orientation::Vertical => Rect::new(rect.x, offset, rect.w, size),
        };
        children.push(LayoutNode::Leaf { pane, rect: leaf_rect });
        offset += size + 1;
    }
    LayoutNode::Split { orient, rect, children }
}

/// Rows of columns, as square as possible, extra panes in the last rows.
fn tiled(panes: &[PaneId], rect: Rect) -> LayoutNode {
    let n = panes.len();
    let cols = (n as f64).sqrt().ceil() as usize;
    let rows = n.div_ceil(cols);

    let row_heights = even_sizes(rect.h.saturating_sub(rows as u16 - 1), rows as u16);

    let mut children = Vec::with_capacity(rows);
    let mut next = 0;
    let mut y = rect.y;
    for (r, &height) in row_heights.iter().enumerate() {
        let remaining_rows = rows - r;
        let remaining_panes = n - next;
        let in_this_row = remaining_panes.div_ceil(remaining_rows);
        let row_rect = Rect::new(rect.x, y, rect.w, height);
        children.push(row_of(&panes[next..next + in_this_row], row_rect, Orientation::Horizontal));
        next += in_this_row;
        y += height + 1;
    }

    if children.len() == 1 {
        return children.pop().expect("len checked");
    }
    LayoutNode::Split {
        orient: Orientation::Vertical,
        rect,
        children,
    }
}

/// Split `total` cells into `n` near-equal sizes, earlier entries larger.
fn even_sizes(total: u16, n: u16) -> Vec<u16> {
    let n = n.max(1);
    let base = total / n;
    let extra = total % n;
    (0..n).map(|i| base + u16::from(i < extra)).collect()
}
