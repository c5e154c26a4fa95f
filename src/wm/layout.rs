//! Layout - pane arrangement within a tab.
//!
//! A tab's panes form a tree of horizontal and vertical splits. The builder
//! tree ([`LayoutGroup`]) holds panes and relative sizes; computing a layout
//! produces a tree of rectangles ([`LayoutNode`]) with a one-cell separator
//! between siblings along each split axis.

use std::sync::Arc;

use crate::core::term::WindowSize;

use super::pane::Pane;

/// Direction of a split. `Horizontal` lays children out side by side,
/// `Vertical` stacks them.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Direction {
    #[default]
    None,
    Horizontal,
    Vertical,
}

/// Which pane edge a resize moves.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ResizeDirection {
    Top,
    Bottom,
    Left,
    Right,
}

impl ResizeDirection {
    fn axis(self) -> Direction {
        match self {
            ResizeDirection::Left | ResizeDirection::Right => Direction::Horizontal,
            ResizeDirection::Top | ResizeDirection::Bottom => Direction::Vertical,
        }
    }

    /// Whether the moved edge is the trailing one (right/bottom).
    fn trailing(self) -> bool {
        matches!(self, ResizeDirection::Right | ResizeDirection::Bottom)
    }
}

/// The builder tree: owns the panes and their relative shares.
#[derive(Default)]
pub struct LayoutGroup {
    direction: Direction,
    children: Vec<LayoutChild>,
}

struct LayoutChild {
    weight: f64,
    kind: ChildKind,
}

enum ChildKind {
    Group(LayoutGroup),
    /// A leaf; `None` marks a slot whose pane has not been attached yet.
    Leaf(Option<Arc<Pane>>),
}

impl LayoutChild {
    fn leaf(pane: Option<Arc<Pane>>) -> Self {
        Self {
            weight: 1.0,
            kind: ChildKind::Leaf(pane),
        }
    }
}

/// A computed rectangle holding a pane.
#[derive(Clone)]
pub struct LayoutEntry {
    pub row: u16,
    pub col: u16,
    pub size: WindowSize,
    pub pane: Arc<Pane>,
}

/// One part of a computed layout node.
pub enum LayoutPart {
    Node(Box<LayoutNode>),
    Entry(LayoutEntry),
    /// A pending slot from a split whose pane is not attached yet.
    EmptySlot {
        row: u16,
        col: u16,
        size: WindowSize,
    },
}

impl LayoutPart {
    /// Position and size, for drawing separators.
    pub fn rect(&self) -> (u16, u16, WindowSize) {
        match self {
            LayoutPart::Node(node) => (node.row, node.col, node.size),
            LayoutPart::Entry(entry) => (entry.row, entry.col, entry.size),
            LayoutPart::EmptySlot { row, col, size } => (*row, *col, *size),
        }
    }
}

/// The computed layout tree.
pub struct LayoutNode {
    pub row: u16,
    pub col: u16,
    pub size: WindowSize,
    pub direction: Direction,
    pub children: Vec<LayoutPart>,
}

impl LayoutGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Insert a slot for a new pane next to `reference` and compute the
    /// resulting layout. Returns the layout tree and the rectangle assigned
    /// to the new slot (which the caller fills via [`fill_slot`], or rolls
    /// back with `remove_pane(None)`).
    ///
    /// [`fill_slot`]: LayoutGroup::fill_slot
    pub fn split(
        &mut self,
        size: WindowSize,
        row: u16,
        col: u16,
        reference: Option<&Pane>,
        direction: Direction,
    ) -> (Option<Box<LayoutNode>>, Option<(u16, u16, WindowSize)>) {
        let inserted = if self.children.is_empty() {
            self.direction = Direction::None;
            self.children.push(LayoutChild::leaf(None));
            true
        } else {
            match reference {
                Some(reference) => self.insert_next_to(reference, direction),
                None => {
                    self.equalize();
                    self.children.push(LayoutChild::leaf(None));
                    true
                }
            }
        };

        let tree = self.layout(size, row, col);
        if !inserted {
            return (tree, None);
        }
        let slot = tree.as_ref().and_then(|node| node.find_empty_slot());
        (tree, slot)
    }

    fn insert_next_to(&mut self, reference: &Pane, direction: Direction) -> bool {
        // Find the child holding the reference pane at this level.
        let index = self.children.iter().position(|child| match &child.kind {
            ChildKind::Leaf(Some(pane)) => pane.id() == reference.id(),
            _ => false,
        });

        if let Some(index) = index {
            if direction == Direction::None {
                // Reuse the slot in place.
                self.children[index].kind = ChildKind::Leaf(None);
                return true;
            }
            if self.direction == direction || self.children.len() == 1 {
                self.direction = direction;
                self.children.insert(index + 1, LayoutChild::leaf(None));
                self.equalize();
                return true;
            }
            // Split axis differs: nest the leaf in a new group.
            let ChildKind::Leaf(pane) = std::mem::replace(
                &mut self.children[index].kind,
                ChildKind::Leaf(None),
            ) else {
                unreachable!()
            };
            let mut group = LayoutGroup {
                direction,
                children: vec![LayoutChild::leaf(pane), LayoutChild::leaf(None)],
            };
            group.equalize();
            self.children[index].kind = ChildKind::Group(group);
            return true;
        }

        for child in &mut self.children {
            if let ChildKind::Group(group) = &mut child.kind {
                if group.insert_next_to(reference, direction) {
                    return true;
                }
            }
        }
        false
    }

    /// Attach a pane to the pending slot created by [`split`].
    ///
    /// [`split`]: LayoutGroup::split
    pub fn fill_slot(&mut self, pane: Arc<Pane>) -> bool {
        for child in &mut self.children {
            match &mut child.kind {
                ChildKind::Leaf(slot @ None) => {
                    *slot = Some(pane);
                    return true;
                }
                ChildKind::Group(group) => {
                    if group.fill_slot(Arc::clone(&pane)) {
                        return true;
                    }
                }
                ChildKind::Leaf(Some(_)) => {}
            }
        }
        false
    }

    /// Detach a pane (or the pending slot, with `None`) and collapse any
    /// single-child and same-direction groups left behind.
    pub fn remove_pane(&mut self, pane: Option<&Pane>) {
        self.remove_child(pane);
        self.normalize();
        if self.children.len() == 1 {
            // A root with a single group child adopts that group.
            if matches!(self.children[0].kind, ChildKind::Group(_)) {
                let ChildKind::Group(group) =
                    std::mem::replace(&mut self.children[0].kind, ChildKind::Leaf(None))
                else {
                    unreachable!()
                };
                *self = group;
            }
        }
    }

    fn remove_child(&mut self, pane: Option<&Pane>) -> bool {
        let before = self.children.len();
        self.children.retain(|child| match (&child.kind, pane) {
            (ChildKind::Leaf(None), None) => false,
            (ChildKind::Leaf(Some(p)), Some(target)) => p.id() != target.id(),
            _ => true,
        });
        if self.children.len() != before {
            self.equalize();
            return true;
        }
        for child in &mut self.children {
            if let ChildKind::Group(group) = &mut child.kind {
                if group.remove_child(pane) {
                    return true;
                }
            }
        }
        false
    }

    /// Collapse single-child groups and splice children of groups that share
    /// their parent's direction, so `H(H(a,b), c)` flattens to `H(a,b,c)`.
    fn normalize(&mut self) {
        enum Step {
            Keep,
            Remove,
            /// Replace the group with its only child.
            Hoist,
            /// Merge the group's children into this level.
            Splice,
        }

        let mut index = 0;
        while index < self.children.len() {
            let step = match &mut self.children[index].kind {
                ChildKind::Group(group) => {
                    group.normalize();
                    if group.children.is_empty() {
                        Step::Remove
                    } else if group.children.len() == 1 {
                        Step::Hoist
                    } else if group.direction == self.direction {
                        Step::Splice
                    } else {
                        Step::Keep
                    }
                }
                ChildKind::Leaf(_) => Step::Keep,
            };

            match step {
                Step::Keep => index += 1,
                Step::Remove => {
                    self.children.remove(index);
                    self.equalize();
                }
                Step::Hoist => {
                    let ChildKind::Group(mut group) =
                        std::mem::replace(&mut self.children[index].kind, ChildKind::Leaf(None))
                    else {
                        unreachable!()
                    };
                    self.children[index].kind = group.children.pop().unwrap().kind;
                }
                Step::Splice => {
                    let ChildKind::Group(group) =
                        std::mem::replace(&mut self.children[index].kind, ChildKind::Leaf(None))
                    else {
                        unreachable!()
                    };
                    self.children.splice(index..=index, group.children);
                    self.equalize();
                }
            }
        }
    }

    fn equalize(&mut self) {
        for child in &mut self.children {
            child.weight = 1.0;
        }
    }

    /// Compute rectangles for the whole tree.
    pub fn layout(&self, size: WindowSize, row: u16, col: u16) -> Option<Box<LayoutNode>> {
        if self.children.is_empty() {
            return None;
        }
        Some(Box::new(self.layout_node(size, row, col)))
    }

    fn layout_node(&self, size: WindowSize, row: u16, col: u16) -> LayoutNode {
        let axis_len = match self.direction {
            Direction::Horizontal => size.cols,
            _ => size.rows,
        };
        let geometry = child_geometry(&self.weights(), axis_len);

        let mut children = Vec::with_capacity(self.children.len());
        for (child, (offset, length)) in self.children.iter().zip(geometry) {
            let (child_row, child_col, child_size) = match self.direction {
                Direction::Horizontal => (
                    row,
                    col + offset,
                    WindowSize {
                        rows: size.rows,
                        cols: length,
                        pixel_width: scale_pixels(size.pixel_width, length, size.cols),
                        pixel_height: size.pixel_height,
                    },
                ),
                _ => (
                    row + offset,
                    col,
                    WindowSize {
                        rows: length,
                        cols: size.cols,
                        pixel_width: size.pixel_width,
                        pixel_height: scale_pixels(size.pixel_height, length, size.rows),
                    },
                ),
            };

            children.push(match &child.kind {
                ChildKind::Group(group) => {
                    LayoutPart::Node(Box::new(group.layout_node(child_size, child_row, child_col)))
                }
                ChildKind::Leaf(Some(pane)) => LayoutPart::Entry(LayoutEntry {
                    row: child_row,
                    col: child_col,
                    size: child_size,
                    pane: Arc::clone(pane),
                }),
                ChildKind::Leaf(None) => LayoutPart::EmptySlot {
                    row: child_row,
                    col: child_col,
                    size: child_size,
                },
            });
        }

        LayoutNode {
            row,
            col,
            size,
            direction: self.direction,
            children,
        }
    }

    fn weights(&self) -> Vec<f64> {
        self.children.iter().map(|child| child.weight).collect()
    }

    /// Grow or shrink `pane` by `delta` cells by moving the edge named by
    /// `direction`, transferring share to or from the adjacent sibling.
    pub fn resize_pane(
        &mut self,
        pane: &Pane,
        direction: ResizeDirection,
        delta: i32,
        size: WindowSize,
    ) -> bool {
        self.resize_in(pane, direction, delta, size)
    }

    fn resize_in(
        &mut self,
        pane: &Pane,
        direction: ResizeDirection,
        delta: i32,
        size: WindowSize,
    ) -> bool {
        let axis_len = match self.direction {
            Direction::Horizontal => size.cols,
            _ => size.rows,
        };

        // Index of the child whose subtree holds the pane.
        let index = self.children.iter().position(|child| match &child.kind {
            ChildKind::Leaf(Some(p)) => p.id() == pane.id(),
            ChildKind::Group(group) => group.contains(pane),
            ChildKind::Leaf(None) => false,
        });
        let Some(index) = index else {
            return false;
        };

        // Prefer the deepest matching group: recurse first.
        if let ChildKind::Group(_) = &self.children[index].kind {
            let geometry = child_geometry(&self.weights(), axis_len);
            let (_, length) = geometry[index];
            let child_size = match self.direction {
                Direction::Horizontal => WindowSize { cols: length, ..size },
                _ => WindowSize { rows: length, ..size },
            };
            let ChildKind::Group(group) = &mut self.children[index].kind else {
                unreachable!()
            };
            if group.resize_in(pane, direction, delta, child_size) {
                return true;
            }
        }

        if self.direction != direction.axis() {
            return false;
        }
        let neighbor = if direction.trailing() {
            if index + 1 >= self.children.len() {
                return false;
            }
            index + 1
        } else {
            if index == 0 {
                return false;
            }
            index - 1
        };

        let n = self.children.len() as i64;
        let available = (i64::from(axis_len) - (n - 1)).max(1) as f64;
        let total: f64 = self.children.iter().map(|c| c.weight).sum();
        let transfer = f64::from(delta) / available * total;

        let minimum = total * 0.05;
        let grown = self.children[index].weight + transfer;
        let shrunk = self.children[neighbor].weight - transfer;
        if grown < minimum || shrunk < minimum {
            return false;
        }
        self.children[index].weight = grown;
        self.children[neighbor].weight = shrunk;
        true
    }

    fn contains(&self, pane: &Pane) -> bool {
        self.children.iter().any(|child| match &child.kind {
            ChildKind::Leaf(Some(p)) => p.id() == pane.id(),
            ChildKind::Group(group) => group.contains(pane),
            ChildKind::Leaf(None) => false,
        })
    }
}

/// `(offset, length)` per child along the axis: the available length (minus
/// one separator cell per gap) divided at weight-proportional boundaries,
/// rounded half-up.
fn child_geometry(weights: &[f64], axis_len: u16) -> Vec<(u16, u16)> {
    let n = weights.len() as i64;
    let available = (i64::from(axis_len) - (n - 1)).max(0) as f64;
    let total: f64 = weights.iter().sum();

    let mut geometry = Vec::with_capacity(weights.len());
    let mut cumulative = 0.0;
    let mut previous = 0i64;
    for (i, weight) in weights.iter().enumerate() {
        cumulative += weight;
        // Half-up rounding, nudged so exact halves survive f64 error.
        let boundary = (cumulative / total * available + 0.5 + 1e-9).floor() as i64;
        let offset = previous + i as i64;
        geometry.push((offset as u16, (boundary - previous).max(0) as u16));
        previous = boundary;
    }
    geometry
}

fn scale_pixels(total_pixels: u32, part: u16, whole: u16) -> u32 {
    if whole == 0 {
        return 0;
    }
    total_pixels * u32::from(part) / u32::from(whole)
}

impl LayoutNode {
    /// The layout entry holding `pane`.
    pub fn find_pane(&self, pane: &Pane) -> Option<&LayoutEntry> {
        for child in &self.children {
            match child {
                LayoutPart::Entry(entry) => {
                    if entry.pane.id() == pane.id() {
                        return Some(entry);
                    }
                }
                LayoutPart::Node(node) => {
                    if let Some(entry) = node.find_pane(pane) {
                        return Some(entry);
                    }
                }
                LayoutPart::EmptySlot { .. } => {}
            }
        }
        None
    }

    fn find_empty_slot(&self) -> Option<(u16, u16, WindowSize)> {
        for child in &self.children {
            match child {
                LayoutPart::EmptySlot { row, col, size } => return Some((*row, *col, *size)),
                LayoutPart::Node(node) => {
                    if let Some(slot) = node.find_empty_slot() {
                        return Some(slot);
                    }
                }
                LayoutPart::Entry(_) => {}
            }
        }
        None
    }

    /// All entries whose rectangle contains the given cell.
    pub fn hit_test(&self, row: u16, col: u16) -> Vec<&LayoutEntry> {
        let mut hits = Vec::new();
        self.visit_entries(&mut |entry| {
            if row >= entry.row
                && row < entry.row + entry.size.rows
                && col >= entry.col
                && col < entry.col + entry.size.cols
            {
                hits.push(entry);
            }
        });
        hits
    }

    /// Entries intersecting the vertical line at `col` spanning
    /// `[row_begin, row_end)`.
    pub fn hit_test_vertical_line(
        &self,
        col: u16,
        row_begin: u16,
        row_end: u16,
    ) -> Vec<&LayoutEntry> {
        let mut hits = Vec::new();
        self.visit_entries(&mut |entry| {
            if col >= entry.col
                && col < entry.col + entry.size.cols
                && entry.row < row_end
                && row_begin < entry.row + entry.size.rows
            {
                hits.push(entry);
            }
        });
        hits
    }

    /// Entries intersecting the horizontal line at `row` spanning
    /// `[col_begin, col_end)`.
    pub fn hit_test_horizontal_line(
        &self,
        row: u16,
        col_begin: u16,
        col_end: u16,
    ) -> Vec<&LayoutEntry> {
        let mut hits = Vec::new();
        self.visit_entries(&mut |entry| {
            if row >= entry.row
                && row < entry.row + entry.size.rows
                && entry.col < col_end
                && col_begin < entry.col + entry.size.cols
            {
                hits.push(entry);
            }
        });
        hits
    }

    /// All entries in the tree, in layout order.
    pub fn entries(&self) -> Vec<&LayoutEntry> {
        let mut entries = Vec::new();
        self.visit_entries(&mut |entry| entries.push(entry));
        entries
    }

    fn visit_entries<'a>(&'a self, visit: &mut impl FnMut(&'a LayoutEntry)) {
        for child in &self.children {
            match child {
                LayoutPart::Entry(entry) => visit(entry),
                LayoutPart::Node(node) => node.visit_entries(visit),
                LayoutPart::EmptySlot { .. } => {}
            }
        }
    }
}
