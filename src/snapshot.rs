//! Snapshot ownership: the mutable cell holding the current tree.
//!
//! Everything under `tree::` is pure; this is the one place with
//! synchronized state.  Readers grab the current `Arc<Node>` and can use it
//! for as long as they like, concurrently with later publications.  Writers
//! (event folds and rebuilds) are serialized by a dedicated mutex held
//! across the whole read-fold-publish sequence, so no published batch can be
//! overwritten by a concurrent fold against a stale snapshot; readers only
//! ever touch the short state locks.
//!
//! Note on exclusion: with `show_excluded` off, excluded problems are pruned
//! from the snapshot entirely, so relaxing the rules afterwards cannot bring
//! them back by itself; the owner replays the affected problems as a regular
//! problem event after such a change.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::exclude::ExcludeSet;
use crate::options::ViewOptions;
use crate::problem::{ProblemUpdate, TreeEvent};
use crate::tree::node::{Node, NodeKind};
use crate::tree::path::{PathBuilder, TreePath};
use crate::tree::process::{new_root, process_tree_event};

pub struct SnapshotCell {
    /// Serializes read-fold-publish sequences; never taken by readers.
    writer: Mutex<()>,
    options: Mutex<ViewOptions>,
    current: Mutex<Arc<Node>>,
}

impl SnapshotCell {
    pub fn new(options: ViewOptions, excludes: ExcludeSet) -> SnapshotCell {
        let options = options.clamped();
        SnapshotCell {
            writer: Mutex::new(()),
            current: Mutex::new(new_root(&options, excludes)),
            options: Mutex::new(options),
        }
    }

    /// The currently published snapshot.
    pub fn current(&self) -> Arc<Node> {
        self.current.lock().unwrap().clone()
    }

    pub fn options(&self) -> ViewOptions {
        *self.options.lock().unwrap()
    }

    /// Fold an event into the published snapshot and publish the result,
    /// returning the change path for the UI layer.  Concurrent callers are
    /// serialized; each fold sees the previous caller's publication.
    pub fn process_event(&self, event: &TreeEvent) -> TreePath {
        let _writing = self.writer.lock().unwrap();
        let options = self.options();
        let old = self.current();
        let mut pb = PathBuilder::new();
        let next = process_tree_event(&old, event, &options, &mut pb);
        let path = pb.build_path();
        debug!(
            changed = !Arc::ptr_eq(&old, &next),
            problems = next.problems_count,
            "publishing snapshot"
        );
        *self.current.lock().unwrap() = next;
        path
    }

    /// Switch to a new grouping configuration by rebuilding the whole tree
    /// from the problems of the published snapshot.  Grouping changes
    /// restructure every level, so there is no incremental path worth
    /// taking; one replayed batch reuses all the machinery instead.
    pub fn rebuild_with_options(&self, options: ViewOptions) -> Arc<Node> {
        let _writing = self.writer.lock().unwrap();
        let options = options.clamped();
        let old = self.current();
        let excludes = old.excludes().cloned().unwrap_or_default();
        let mut updates = Vec::new();
        collect_problem_updates(&old, &mut updates);
        debug!(problems = updates.len(), "rebuilding with new options");

        let fresh = new_root(&options, excludes);
        let rebuilt = if updates.is_empty() {
            fresh
        } else {
            let mut pb = PathBuilder::new();
            process_tree_event(&fresh, &TreeEvent::Problems(updates), &options, &mut pb)
        };
        *self.options.lock().unwrap() = options;
        *self.current.lock().unwrap() = Arc::clone(&rebuilt);
        rebuilt
    }
}

fn collect_problem_updates(node: &Arc<Node>, out: &mut Vec<ProblemUpdate>) {
    match &node.kind {
        NodeKind::Problem {
            problem,
            properties,
        } => out.push(ProblemUpdate::changed(Arc::clone(problem), *properties)),
        _ => {
            for child in node.children.nodes() {
                collect_problem_updates(child, out);
            }
        }
    }
}
