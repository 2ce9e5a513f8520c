//! Window layout: a tree of splits tiling the window rectangle.
//!
//! Leaves carry panes; splits carry an orientation and ordered children.
//! Child rectangles partition the parent exactly, with a one-cell
//! separator between adjacent siblings. All sizes are content cells —
//! separators are implicit between children and never inside a leaf.

mod presets;


pub use presets::LayoutPreset;

use thiserror::Error;

use crate::registry::PaneId;

/// Smallest leaf a split may produce (content cells).
pub const PANE_MIN_COLS: u16 = 2;
pub const PANE_MIN_ROWS: u16 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("create pane failed: pane too small")]
    TooSmall,
    #[error("no such pane in layout")]
    NoSuchPane,
}

/// A window-local rectangle in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    pub fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u16 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u16 {
        self.y + self.h
    }

    /// Length of the overlap of the two rects on the axis perpendicular
    /// to `dir`.
    fn overlap(&self, other: &Rect, dir: Direction) -> u16 {
        let (a0, a1, b0, b1) = match dir {
            Direction::Left | Direction::Right => (self.y, self.bottom(), other.y, other.bottom()),
            Direction::Up | Direction::Down => (self.x, self.right(), other.x, other.right()),
        };
        a1.min(b1).saturating_sub(a0.max(b0))
    }
}

/// Split orientation. `Horizontal` lays children out left-to-right (a
/// vertical separator line), `Vertical` top-to-bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Movement direction for pane selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Requested size for the new leaf of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitSize {
    /// Percentage of the splittable space for the new leaf.
    Percent(u8),
    /// Absolute content cells for the new leaf.
    Cells(u16),
}

#[derive(Debug, Clone)]
pub enum LayoutNode {
    Leaf {
        pane: PaneId,
        rect: Rect,
    },
    Split {
        orient: Orientation,
        rect: Rect,
        children: Vec<LayoutNode>,
    },
}

impl LayoutNode {
    fn rect(&self) -> Rect {
        match self {
            Self::Leaf { rect, .. } | Self::Split { rect, .. } => *rect,
        }
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<(&'a PaneId, Rect)>) {
        match self {
            Self::Leaf { pane, rect } => out.push((pane, *rect)),
            Self::Split { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

/// The layout tree of one window.
#[derive(Debug, Clone)]
pub struct Layout {
    root: LayoutNode,
}

impl Layout {
    /// A single full-size leaf.
    pub fn single(pane: PaneId, w: u16, h: u16) -> Self {
        Self {
            root: LayoutNode::Leaf {
                pane,
                rect: Rect::new(0, 0, w, h),
            },
        }
    }

    pub fn window_rect(&self) -> Rect {
        self.root.rect()
    }

    /// Panes with their rectangles, in tree order.
    pub fn leaves(&self) -> Vec<(PaneId, Rect)> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out.into_iter().map(|(&p, r)| (p, r)).collect()
    }

    pub fn rect_of(&self, pane: PaneId) -> Option<Rect> {
        self.leaves().into_iter().find(|&(p, _)| p == pane).map(|(_, r)| r)
    }

    pub fn contains(&self, pane: PaneId) -> bool {
        self.rect_of(pane).is_some()
    }

    pub fn pane_count(&self) -> usize {
        self.leaves().len()
    }

    /// Split the leaf holding `target`, inserting `new_pane` before or
    /// after it. Returns the new leaf's rectangle.
    ///
    /// The leaf's content splits into two parts separated by one cell.
    /// With `SplitSize::Percent(p)` the new leaf gets `p` percent of the
    /// splittable space; with `Cells(n)` exactly `n`. Fails with
    /// `TooSmall` when either side would drop under the pane minimum.
    pub fn split(
        &mut self,
        target: PaneId,
        orient: Orientation,
        size: SplitSize,
        after: bool,
        new_pane: PaneId,
    ) -> Result<Rect, LayoutError> {
        let node = find_leaf(&mut self.root, target).ok_or(LayoutError::NoSuchPane)?;
        let rect = node.rect();

        let total = match orient {
            Orientation::Horizontal => rect.w,
            Orientation::Vertical => rect.h,
        };
        let (min, cross_ok) = match orient {
            Orientation::Horizontal => (PANE_MIN_COLS, rect.h >= PANE_MIN_ROWS),
            Orientation::Vertical => (PANE_MIN_ROWS, rect.w >= PANE_MIN_COLS),
        };
        if total < 2 * min + 1 || !cross_ok {
            return Err(LayoutError::TooSmall);
        }

        let splittable = total - 1;
        let new_size = match size {
            SplitSize::Percent(p) => (u32::from(splittable) * u32::from(p.min(100)) / 100) as u16,
            SplitSize::Cells(n) => n,
        };
        let new_size = new_size.clamp(min, splittable.saturating_sub(min));
        let old_size = splittable - new_size;

        let (first_size, second_size) = if after { (old_size, new_size) } else { (new_size, old_size) };

        let (first_rect, second_rect) = match orient {
            Orientation::Horizontal => (
                Rect::new(rect.x, rect.y, first_size, rect.h),
                Rect::new(rect.x + first_size + 1, rect.y, second_size, rect.h),
            ),
            Orientation::Vertical => (
                Rect::new(rect.x, rect.y, rect.w, first_size),
                Rect::new(rect.x, rect.y + first_size + 1, rect.w, second_size),
            ),
        };

        let (first_pane, second_pane) = if after { (target, new_pane) } else { (new_pane, target) };
        let new_rect = if after { second_rect } else { first_rect };

        *node = LayoutNode::Split {
            orient,
            rect,
            children: vec![
                LayoutNode::Leaf { pane: first_pane, rect: first_rect },
                LayoutNode::Leaf { pane: second_pane, rect: second_rect },
            ],
        };

        Ok(new_rect)
    }

    /// Remove the leaf holding `pane`; the freed space (plus separator)
    /// is absorbed by an adjacent sibling. Single-child splits collapse.
    /// Returns `false` when the pane is not in the tree or is the only
    /// leaf.
    pub fn close(&mut self, pane: PaneId) -> bool {
        if !self.contains(pane) {
            return false;
        }
        if matches!(self.root, LayoutNode::Leaf { .. }) {
            return false;
        }
        remove_leaf(&mut self.root, pane);
        collapse(&mut self.root);
        true
    }

    /// Swap the panes of two leaves; rectangles stay put.
    pub fn swap(&mut self, a: PaneId, b: PaneId) -> bool {
        if a == b || !self.contains(a) || !self.contains(b) {
            return false;
        }
        swap_panes(&mut self.root, a, b);
        true
    }

    /// Retile to a new window size, scaling children proportionally.
    pub fn resize(&mut self, w: u16, h: u16) {
        let rect = Rect::new(0, 0, w.max(1), h.max(1));
        resize_node(&mut self.root, rect);
    }

    /// Candidate neighbors of `from` in `dir`, ordered by decreasing
    /// edge overlap. The caller breaks ties by recency.
    pub fn neighbors(&self, from: PaneId, dir: Direction) -> Vec<PaneId> {
        let Some(rect) = self.rect_of(from) else {
            return Vec::new();
        };
        let mut candidates: Vec<(PaneId, u32)> = self
            .leaves()
            .into_iter()
            .filter(|&(p, _)| p != from)
            .filter(|(_, r)| match dir {
                // The candidate's near edge must sit just across our edge
                // (separated by the one-cell gutter).
                Direction::Left => r.right() < rect.x,
                Direction::Right => r.x > rect.right(),
                Direction::Up => r.bottom() < rect.y,
                Direction::Down => r.y > rect.bottom(),
            })
            .map(|(p, r)| {
                // Distance along the movement axis; nearest band first.
                let dist = match dir {
                    Direction::Left => rect.x - r.right(),
                    Direction::Right => r.x - rect.right(),
                    Direction::Up => rect.y - r.bottom(),
                    Direction::Down => r.y - rect.bottom(),
                };
                (p, r, dist)
            })
            .filter(|&(_, r, _)| rect.overlap(&r, dir) > 0)
            .map(|(p, r, dist)| {
                let overlap = u32::from(rect.overlap(&r, dir).min(999));
                (p, u32::from(dist) * 1000 + (1000 - overlap))
            })
            .collect();
        candidates.sort_by_key(|&(_, score)| score);
        candidates.into_iter().map(|(p, _)| p).collect()
    }
}

fn find_leaf<'a>(node: &'a mut LayoutNode, pane: PaneId) -> Option<&'a mut LayoutNode> {
    match node {
        LayoutNode::Leaf { pane: p, .. } => {
            if *p == pane {
                Some(node)
            } else {
                None
            }
        }
        LayoutNode::Split { children, .. } => {
            children.iter_mut().find_map(|child| find_leaf(child, pane))
        }
    }
}

fn swap_panes(node: &mut LayoutNode, a: PaneId, b: PaneId) {
    match node {
        LayoutNode::Leaf { pane, .. } => {
            if *pane == a {
                *pane = b;
            } else if *pane == b {
                *pane = a;
            }
        }
        LayoutNode::Split { children, .. } => {
            for child in children {
                swap_panes(child, a, b);
            }
        }
    }
}

/// Remove the leaf from whichever split holds it, growing an adjacent
/// sibling into the freed space.
fn remove_leaf(node: &mut LayoutNode, pane: PaneId) -> bool {
    let LayoutNode::Split { orient, children, .. } = node else {
        return false;
    };

    let pos = children
        .iter()
        .position(|c| matches!(c, LayoutNode::Leaf { pane: p, .. } if *p == pane));

    if let Some(pos) = pos {
        let removed_rect = children[pos].rect();
        let freed = match orient {
            Orientation::Horizontal => removed_rect.w + 1,
            Orientation::Vertical => removed_rect.h + 1,
        };
        children.remove(pos);

        // Grow the nearest remaining sibling toward the gap.
        let absorb = if pos > 0 { pos - 1 } else { 0 };
        if let Some(sibling) = children.get_mut(absorb) {
            let mut r = sibling.rect();
            match orient {
                Orientation::Horizontal => {
                    if pos == 0 {
                        r.x = removed_rect.x;
                    }
                    r.w += freed;
                }
                Orientation::Vertical => {
                    if pos == 0 {
                        r.y = removed_rect.y;
                    }
                    r.h += freed;
                }
            }
            resize_node(sibling, r);
        }
        return true;
    }

    children.iter_mut().any(|child| remove_leaf(child, pane))
}

/// Replace single-child splits by their child, recursively.
fn collapse(node: &mut LayoutNode) {
    if let LayoutNode::Split { children, rect, .. } = node {
        if children.len() == 1 {
            let mut child = children.pop().expect("len checked");
            resize_node(&mut child, *rect);
            *node = child;
            collapse(node);
            return;
        }
        for child in children {
            collapse(child);
        }
    }
}

/// Recursively retile `node` into `rect`, scaling split children
/// proportionally along the split axis.
fn resize_node(node: &mut LayoutNode, new_rect: Rect) {
    match node {
        LayoutNode::Leaf { rect, .. } => *rect = new_rect,
        LayoutNode::Split { orient, rect, children } => {
            let n = children.len() as u16;
            let seps = n.saturating_sub(1);
            let (old_total, new_total) = match orient {
                Orientation::Horizontal => (rect.w, new_rect.w),
                Orientation::Vertical => (rect.h, new_rect.h),
            };
            let old_content = old_total.saturating_sub(seps).max(1);
            let new_content = new_total.saturating_sub(seps).max(n);

            let min = match orient {
                Orientation::Horizontal => PANE_MIN_COLS,
                Orientation::Vertical => PANE_MIN_ROWS,
            };

            // Proportional sizes with largest-remainder rounding.
            let old_sizes: Vec<u16> = children
                .iter()
                .map(|c| match orient {
                    Orientation::Horizontal => c.rect().w,
                    Orientation::Vertical => c.rect().h,
                })
                .collect();
            let mut sizes = scale_sizes(&old_sizes, old_content, new_content, min);

            // Feasibility: residual clipping from the end when minima do
            // not fit.
            let mut overshoot: i32 = sizes.iter().map(|&s| i32::from(s)).sum::<i32>() - i32::from(new_content);
            for s in sizes.iter_mut().rev() {
                if overshoot <= 0 {
                    break;
                }
                let take = overshoot.min(i32::from(*s) - 1);
                if take > 0 {
                    *s -= take as u16;
                    overshoot -= take;
                }
            }

            *rect = new_rect;
            let mut offset = match orient {
                Orientation::Horizontal => new_rect.x,
                Orientation::Vertical => new_rect.y,
            };
            for (child, size) in children.iter_mut().zip(sizes) {
                let child_rect = match orient {
                    Orientation::Horizontal => Rect::new(offset, new_rect.y, size, new_rect.h),
                    Orientation::Vertical => Rect::new(new_rect.x, offset, new_rect.w, size),
                };
                resize_node(child, child_rect);
                offset += size + 1;
            }
        }
    }
}

/// Scale `old_sizes` (summing to about `old_total`) onto `new_total`.
/// Rounding remainders go to the children with the largest fractional
/// loss; afterwards children under `min` are raised by shrinking the
/// ones with the most slack.
fn scale_sizes(old_sizes: &[u16], old_total: u16, new_total: u16, min: u16) -> Vec<u16> {
    let n = old_sizes.len();
    if n == 0 {
        return Vec::new();
    }
    let old_total = u32::from(old_total.max(1));

    let mut sizes = Vec::with_capacity(n);
    let mut fractions = Vec::with_capacity(n);
    for &s in old_sizes {
        let exact = u32::from(s) * u32::from(new_total);
        sizes.push((exact / old_total) as u16);
        fractions.push(exact % old_total);
    }

    let mut assigned: i64 = sizes.iter().map(|&s| i64::from(s)).sum();
    let target = i64::from(new_total);

    // Flooring loses at most one cell per child; hand the lost cells to
    // the largest fractional remainders first.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| fractions[b].cmp(&fractions[a]));
    let mut next = 0;
    while assigned < target {
        sizes[order[next % n]] += 1;
        assigned += 1;
        next += 1;
    }

    // Raise undersized children, taking cells from those with slack.
    for i in 0..n {
        while sizes[i] < min {
            match (0..n).filter(|&j| sizes[j] > min).max_by_key(|&j| sizes[j]) {
                Some(j) => {
                    sizes[j] -= 1;
                    sizes[i] += 1;
                }
                None => break,
            }
        }
    }
    sizes
}

/// Verify the partition invariant: leaves plus separators tile the
/// window rectangle exactly, pairwise disjoint.
#[cfg(test)]
pub fn check_partition(layout: &Layout) {
    let win = layout.window_rect();
    let leaves = layout.leaves();

    let mut covered = vec![vec![false; win.w as usize]; win.h as usize];
    for (pane, r) in &leaves {
        assert!(r.right() <= win.right() && r.bottom() <= win.bottom(), "{pane} leaf out of bounds: {r:?}");
        for y in r.y..r.bottom() {
            for x in r.x..r.right() {
                assert!(!covered[y as usize][x as usize], "{pane} overlaps at ({x},{y})");
                covered[y as usize][x as usize] = true;
            }
        }
    }

    // Every uncovered cell must be a separator: within one cell of some
    // leaf (separator crossings touch their leaves only diagonally).
    for y in 0..win.h {
        for x in 0..win.w {
            if covered[y as usize][x as usize] {
                continue;
            }
            let adjacent = leaves.iter().any(|(_, r)| {
                x + 1 >= r.x && x <= r.right() && y + 1 >= r.y && y <= r.bottom()
            });
            assert!(adjacent, "cell ({x},{y}) is neither leaf nor separator");
        }
    }
}
