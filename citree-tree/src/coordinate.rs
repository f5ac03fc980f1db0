//! The implicit binary tree over `[0, max]`.
//!
//! No node is ever stored for the shape of the tree: the root sits at `max / 2`,
//! every node knows its step to its children (`step = coordinate / 2` at the root,
//! halving at every level) and a step of zero marks a leaf. Because `max` is always a
//! power of two, the coordinate a part is assigned to never changes when `max` grows
//! later on: growing only adds ancestors above the old root.

/// Smallest power of two strictly greater than `stop`, or `max` when it already is.
#[inline]
pub fn grow_max(max: u32, stop: u32) -> u32 {
    if stop < max {
        max
    } else {
        (stop + 1).next_power_of_two()
    }
}

///
/// A node of the implicit tree.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeNode {
    pub coordinate: u32,
    step: u32,
}

impl TreeNode {
    pub fn root(max: u32) -> Self {
        let coordinate = max / 2;
        TreeNode {
            coordinate,
            step: coordinate / 2,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.step == 0
    }

    /// Left child. Must not be called on a leaf.
    #[inline]
    pub fn left(&self) -> Self {
        TreeNode {
            coordinate: self.coordinate - self.step,
            step: self.step / 2,
        }
    }

    /// Right child. Must not be called on a leaf.
    #[inline]
    pub fn right(&self) -> Self {
        TreeNode {
            coordinate: self.coordinate + self.step,
            step: self.step / 2,
        }
    }

    /// The child on the way down to `point`; `None` at a leaf or at `point` itself.
    pub fn toward(&self, point: u32) -> Option<Self> {
        if self.is_leaf() || self.coordinate == point {
            None
        } else if point < self.coordinate {
            Some(self.left())
        } else {
            Some(self.right())
        }
    }
}

///
/// Coordinate of the node a part `[start, stop]` belongs to: the first node on the walk
/// from the root that lies inside the part.
///
/// Only the degenerate part `[0, 0]` can run out of steps before reaching such a node
/// (the walk ends on leaf 1); it is clamped into the part and lands on coordinate 0,
/// which range scans and point lookups reach like any other node.
///
/// # Arguments
/// - start: first position of the part
/// - stop: last position of the part (`stop < max`)
/// - max: the tree's current power-of-two bound
///
pub fn assign(start: u32, stop: u32, max: u32) -> u32 {
    let mut node = TreeNode::root(max);
    loop {
        if node.coordinate >= start && node.coordinate <= stop {
            return node.coordinate;
        }
        if node.is_leaf() {
            return node.coordinate.clamp(start, stop);
        }
        node = if stop < node.coordinate {
            node.left()
        } else {
            node.right()
        };
    }
}

///
/// Nodes outside `[left, right]` whose lists an overlap query on `[left, right]` must scan.
///
/// Parts stored at a node below `left` can only overlap the query if they contain
/// `left`, so their node sits on the root-to-`left` path; symmetrically for nodes above
/// `right`. Nodes inside the query are covered by a range scan over the node table.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapPlan {
    /// Nodes below the query: scan stop-descending while `stop >= left`.
    pub below: Vec<u32>,
    /// Nodes above the query: scan start-ascending while `start <= right`.
    pub above: Vec<u32>,
}

impl OverlapPlan {
    fn visit(&mut self, coordinate: u32, left: u32, right: u32) {
        if coordinate < left {
            self.below.push(coordinate);
        } else if coordinate > right {
            self.above.push(coordinate);
        }
    }
}

pub fn plan_overlap(left: u32, right: u32, max: u32) -> OverlapPlan {
    let mut plan = OverlapPlan::default();

    // common path down to the split node
    let mut node = TreeNode::root(max);
    let split = loop {
        if node.coordinate >= left && node.coordinate <= right {
            break Some(node);
        }
        plan.visit(node.coordinate, left, right);
        if node.is_leaf() {
            break None;
        }
        node = if right < node.coordinate {
            node.left()
        } else {
            node.right()
        };
    };

    if let Some(split) = split {
        for point in [left, right] {
            let mut node = split;
            while let Some(next) = node.toward(point) {
                plan.visit(next.coordinate, left, right);
                node = next;
            }
        }
    }

    plan
}
