//! Next/previous problem navigation over a snapshot.
//!
//! "Next" means the successor in the forest order induced by the sibling
//! comparator: first a later problem in the current file, then the first
//! problem of the next file, directory, module, and so on outward.  Branches
//! with a zero problem count (everything under them excluded) are skipped.
//! The walk is linear scans over small sibling lists plus one descent, so no
//! per-snapshot index is ever built or invalidated.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::tree::compare::compare_nodes;
use crate::tree::node::{Node, PrimaryData};

/// A resolved navigation result: the full ancestor chain from the root down
/// to a problem leaf, as `Arc`s into the snapshot the query ran against.
#[derive(Clone, Debug)]
pub struct TreePathToProblemNode {
    nodes: Vec<Arc<Node>>,
}

impl TreePathToProblemNode {
    /// The problem leaf the path ends at.
    pub fn problem_node(&self) -> &Arc<Node> {
        self.nodes.last().expect("paths are built root to problem")
    }

    /// Root-first ancestor chain including the leaf, excluding the root.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.iter().filter(|n| !n.is_root())
    }

    /// The identity keys of the chain, suitable for expanding/selecting the
    /// corresponding presentation nodes.
    pub fn keys(&self) -> Vec<PrimaryData> {
        self.nodes()
            .map(|n| n.primary_data())
            .collect()
    }
}

#[derive(Clone, Copy, Eq, PartialEq)]
enum Direction {
    Forward,
    Backward,
}

/// The problem following `current` in tree order, or `None` at the end.
///
/// `current` is the chain below `root` the user is anchored at, root-first
/// and possibly empty (empty means "before the start", so the answer is the
/// very first problem).  When the anchor is not a problem leaf, the answer
/// is the first problem inside the anchor's own subtree.
pub fn next_problem(root: &Arc<Node>, current: &[Arc<Node>]) -> Option<TreePathToProblemNode> {
    seek(root, current, Direction::Forward)
}

/// The problem preceding `current` in tree order; the mirror image of
/// [`next_problem`] (an empty anchor means "after the end").
pub fn previous_problem(root: &Arc<Node>, current: &[Arc<Node>]) -> Option<TreePathToProblemNode> {
    seek(root, current, Direction::Backward)
}

fn seek(
    root: &Arc<Node>,
    current: &[Arc<Node>],
    direction: Direction,
) -> Option<TreePathToProblemNode> {
    let anchored_at_problem = current.last().map_or(false, |n| n.is_problem());
    if !anchored_at_problem {
        let base = current.last().unwrap_or(root);
        let tail = descend(base, direction)?;
        let mut nodes = Vec::with_capacity(1 + current.len() + tail.len());
        nodes.push(Arc::clone(root));
        nodes.extend(current.iter().cloned());
        nodes.extend(tail);
        return Some(TreePathToProblemNode { nodes });
    }

    // Walk outward from the leaf, looking for the nearest level with a
    // non-empty sibling on the wanted side.
    for level in (0..current.len()).rev() {
        let parent = if level == 0 { root } else { &current[level - 1] };
        let anchor = &current[level];
        if let Some(sibling) = step_sibling(&parent.children.nodes, anchor, direction) {
            let mut nodes = Vec::with_capacity(current.len() + 2);
            nodes.push(Arc::clone(root));
            nodes.extend(current[..level].iter().cloned());
            let tail = descend(&sibling, direction)?;
            nodes.push(sibling);
            nodes.extend(tail);
            return Some(TreePathToProblemNode { nodes });
        }
    }
    None
}

/// The chain strictly below `node` reaching its least (forward) or greatest
/// (backward) problem leaf, skipping zero-count branches.
fn descend(node: &Arc<Node>, direction: Direction) -> Option<Vec<Arc<Node>>> {
    if node.is_problem() {
        return Some(Vec::new());
    }
    let candidates = node.children.nodes().filter(|n| n.problems_count > 0);
    let chosen = match direction {
        Direction::Forward => candidates.min_by(|a, b| compare_nodes(a, b)),
        Direction::Backward => candidates.max_by(|a, b| compare_nodes(a, b)),
    }?;
    let mut out = vec![Arc::clone(chosen)];
    out.extend(descend(chosen, direction)?);
    Some(out)
}

/// The least sibling greater than the anchor (forward) or the greatest one
/// less than it (backward), among siblings that still contain problems.
fn step_sibling(
    siblings: &[Arc<Node>],
    anchor: &Arc<Node>,
    direction: Direction,
) -> Option<Arc<Node>> {
    let mut best: Option<&Arc<Node>> = None;
    for node in siblings {
        if Arc::ptr_eq(node, anchor) || node.problems_count == 0 {
            continue;
        }
        let to_anchor = compare_nodes(node, anchor);
        let on_wanted_side = match direction {
            Direction::Forward => to_anchor == Ordering::Greater,
            Direction::Backward => to_anchor == Ordering::Less,
        };
        if !on_wanted_side {
            continue;
        }
        let better = match best {
            None => true,
            Some(current_best) => match direction {
                Direction::Forward => compare_nodes(node, current_best) == Ordering::Less,
                Direction::Backward => compare_nodes(node, current_best) == Ordering::Greater,
            },
        };
        if better {
            best = Some(node);
        }
    }
    best.cloned()
}
