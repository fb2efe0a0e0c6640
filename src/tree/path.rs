//! Change paths: the compact "what changed" descriptor handed to the UI
//! layer after each processed event.
//!
//! Recomputing the whole visual tree per event would be slow and, worse,
//! would destroy UI node identity (selection, collapsed state).  Instead the
//! recursive traversal fills a [`PathBuilder`] on its way back out: each node
//! whose subtree really changed appends its identity key, and insertion
//! points register full chains for every freshly built node.  The resulting
//! [`TreePath`] names exactly the ancestor chain(s) to re-render.

use serde::{Deserialize, Serialize};

use crate::tree::node::PrimaryData;

/// Accumulator filled during one recursive event-processing pass.
///
/// Keys arrive change-point-first (the traversal unwinds from the deepest
/// change towards the root); [`PathBuilder::build_path`] flips everything
/// into root-first order.
#[derive(Debug, Default)]
pub struct PathBuilder {
    chain: Vec<PrimaryData>,
    inserted: Vec<Vec<PrimaryData>>,
    excluded: Vec<PrimaryData>,
}

impl PathBuilder {
    pub fn new() -> PathBuilder {
        PathBuilder::default()
    }

    /// Append the next key while walking outward from the change point.
    pub fn add_node(&mut self, key: PrimaryData) {
        self.chain.push(key);
    }

    /// Register a complete sub-chain (change-point-first) for a node that
    /// was inserted by this event.  Ancestors extend it on their way out via
    /// [`PathBuilder::add_parent`].
    pub fn add_path(&mut self, chain: Vec<PrimaryData>) {
        self.inserted.push(chain);
    }

    /// Extend every registered inserted chain with an ancestor key.
    pub fn add_parent(&mut self, key: PrimaryData) {
        for chain in &mut self.inserted {
            chain.push(key);
        }
    }

    /// Mark a key as structural-only: it is part of the traversal but must
    /// not appear in the built path (used for the implicit root, which the
    /// UI never renders as a refreshable row).  Structural keys sit at the
    /// root-side end of every chain; each recorded exclusion strips at most
    /// one leading occurrence per built chain, so an equal-valued key deeper
    /// in a chain (nested directories can repeat a relative path) survives.
    pub fn exclude_node(&mut self, key: PrimaryData) {
        self.excluded.push(key);
    }

    /// Whether anything was recorded at all.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty() && self.inserted.is_empty()
    }

    /// Drop the primary chain, keeping inserted chains.  Containers use this
    /// when several existing children changed at once: the chain then stops
    /// at the deepest common ancestor.
    pub(crate) fn reset_chain(&mut self) {
        self.chain.clear();
    }

    /// Fold a per-child builder into this one.  The child's inserted chains
    /// are always kept; its primary chain replaces ours only when the caller
    /// determined this child was the single point of change.
    pub(crate) fn absorb(&mut self, child: PathBuilder, keep_chain: bool) {
        if keep_chain {
            self.chain = child.chain;
        }
        self.inserted.extend(child.inserted);
        self.excluded.extend(child.excluded);
    }

    pub fn build_path(self) -> TreePath {
        let excluded = self.excluded;
        let flip = |chain: Vec<PrimaryData>| -> Vec<PrimaryData> {
            let mut keys: Vec<PrimaryData> = chain.into_iter().rev().collect();
            let mut pending = excluded.clone();
            while let Some(head) = keys.first() {
                match pending.iter().position(|key| key == head) {
                    Some(index) => {
                        pending.swap_remove(index);
                        keys.remove(0);
                    }
                    None => break,
                }
            }
            keys
        };
        TreePath {
            keys: flip(self.chain),
            inserted: self.inserted.into_iter().map(flip).collect(),
        }
    }
}

/// An immutable, root-first chain of identity keys describing where an event
/// landed, plus full chains for every node the event inserted.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TreePath {
    /// Root-first keys from (just below) the root down to the deepest node
    /// common to all changes of the event.  Empty when the change happened
    /// at the root's own children list in more than one branch.
    pub keys: Vec<PrimaryData>,
    /// Root-first chains, one per inserted node, for events that created new
    /// nodes (possibly at several sibling points at once).
    pub inserted: Vec<Vec<PrimaryData>>,
}

impl TreePath {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.inserted.is_empty()
    }

    /// Prefix comparison over the primary key chain: does this path start
    /// with all of `other`'s keys?  The UI layer uses this to decide whether
    /// an already-expanded node is an ancestor of a refreshed path and thus
    /// needs re-expansion.
    pub fn starts_with(&self, other: &TreePath) -> bool {
        other.keys.len() <= self.keys.len()
            && self.keys[..other.keys.len()] == other.keys[..]
    }
}
