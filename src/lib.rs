//! A grouping tree engine for static-analysis problem views.
//!
//! A flat stream of problem records gets folded into a multi-dimensional
//! hierarchy (severity, inspection, module, directory, file) that stays
//! correct and cheap to redraw as problems are added, fixed, or excluded.
//! Tree computation is a pure function of `(old snapshot, event)` producing a
//! new immutable snapshot: untouched subtrees keep their `Arc` identity so a
//! UI layer can skip redrawing them, and every processed event yields a
//! [`tree::path::TreePath`] naming exactly the ancestor chain that changed.
//!
//! Parsing analyzer output, rendering widgets, and scheduling rebuilds off
//! the interactive thread are all the caller's business; the crate consumes
//! [`problem::TreeEvent`]s plus a [`options::ViewOptions`] value and hands
//! back snapshots, change paths, and navigation results.

extern crate globset;
extern crate itertools;
extern crate lexical_sort;
extern crate serde;
extern crate serde_json;
extern crate tracing;
extern crate ustr;

pub mod exclude;
pub mod options;
pub mod problem;
pub mod snapshot;
pub mod tree;

pub use crate::exclude::{ExcludeRule, ExcludeSet};
pub use crate::options::{Layer, ViewOptions};
pub use crate::problem::{
    InspectionRef, Problem, ProblemProperties, ProblemUpdate, Severity, TreeEvent,
};
pub use crate::snapshot::SnapshotCell;
pub use crate::tree::navigate::{next_problem, previous_problem, TreePathToProblemNode};
pub use crate::tree::node::{Children, Node, NodeKind, PrimaryData};
pub use crate::tree::path::{PathBuilder, TreePath};
pub use crate::tree::process::{new_root, process_tree_event};
