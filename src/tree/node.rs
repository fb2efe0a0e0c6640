//! The node universe: one closed set of node kinds, their identity keys, and
//! the children containers that tie levels together.
//!
//! Nodes are only ever created as the output of event processing and are
//! never mutated afterwards; a tree snapshot is a tree of `Arc<Node>` where
//! "unchanged subtree" means "same `Arc`", not merely deep-equal.  Every
//! derived value a node carries (problem count, excluded flag, directory
//! key) is computed once at construction, which already happens only on real
//! change.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use ustr::Ustr;

use crate::exclude::ExcludeSet;
use crate::options::Layer;
use crate::problem::{InspectionRef, Problem, ProblemProperties, Severity};

/// The identity key of a node, unique among its current siblings and stable
/// across recomputation for as long as the grouping it represents exists.
/// This is the sole means of matching old vs. new nodes across an update,
/// both inside the engine and for the UI layer resolving its presentation
/// nodes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum PrimaryData {
    Root,
    /// Severity name; the weight is display-level, the name is the identity.
    Severity(Ustr),
    InspectionCategory(Ustr),
    /// Inspection id (not the display name).
    Inspection(Ustr),
    Module(Ustr),
    NoModule,
    /// Directory path relative to the enclosing grouping node (after chain
    /// compaction), `/`-separated, no leading slash.
    Directory(Ustr),
    /// Full project-relative file path.  Also the key in flat (ungrouped)
    /// file lists, where sibling file names may collide but paths cannot.
    File(Ustr),
    /// Problem id.
    Problem(Ustr),
}

/// Kind-specific payload of a node.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// The root also remembers the exclusion set its snapshot was built
    /// under, so problem events can evaluate excluded-ness without any
    /// ambient state.
    Root { excludes: ExcludeSet },
    Severity(Severity),
    InspectionCategory(Ustr),
    Inspection(InspectionRef),
    Module(Ustr),
    /// Catch-all sibling of module nodes for problems without a module;
    /// always sorts after every real module.
    NodesWithoutModule,
    Directory {
        /// Display/identity path relative to the parent node.
        rel_path: Ustr,
        /// Normalized project-relative path of the directory, used to decide
        /// which events can touch this subtree.
        dir_path: Ustr,
    },
    File {
        /// Full project-relative path (the identity key).
        path: Ustr,
        /// Base name, the display/sort key.
        name: Ustr,
    },
    Problem {
        problem: Arc<Problem>,
        properties: ProblemProperties,
    },
}

/// A children container: the layer it groups by plus the sibling nodes.
/// Sibling order is the comparator order (see [`crate::tree::compare`]), but
/// consumers must not rely on it for lookups; `node_by_primary_data` is a
/// linear scan by design since sibling sets are small.
#[derive(Clone, Debug)]
pub struct Children {
    pub layer: Layer,
    pub nodes: Vec<Arc<Node>>,
}

impl Children {
    pub fn new(layer: Layer, nodes: Vec<Arc<Node>>) -> Children {
        Children { layer, nodes }
    }

    pub fn empty(layer: Layer) -> Children {
        Children {
            layer,
            nodes: Vec::new(),
        }
    }

    /// The leaf marker container used by problem nodes.
    pub fn leaf() -> Children {
        Children::empty(Layer::Problems)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A fresh traversal over the current sibling nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.iter()
    }

    /// Point lookup by identity key.  A stale key (the grouping disappeared
    /// in a later snapshot) is answered with `None`, never a panic; callers
    /// must treat that as "this node is gone".
    pub fn node_by_primary_data(&self, key: &PrimaryData) -> Option<&Arc<Node>> {
        self.nodes.iter().find(|n| n.primary_data() == *key)
    }
}

/// One node of the grouping tree.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Children,
    /// Number of non-excluded problem leaves beneath this node (1 or 0 for a
    /// leaf itself).  Zero-count branches are skipped by navigation.
    pub problems_count: u32,
    /// Whether this node, or everything beneath it, is excluded from the
    /// active problem set.
    pub excluded: bool,
}

impl Node {
    pub fn primary_data(&self) -> PrimaryData {
        match &self.kind {
            NodeKind::Root { .. } => PrimaryData::Root,
            NodeKind::Severity(severity) => PrimaryData::Severity(severity.name),
            NodeKind::InspectionCategory(name) => PrimaryData::InspectionCategory(*name),
            NodeKind::Inspection(inspection) => PrimaryData::Inspection(inspection.id),
            NodeKind::Module(name) => PrimaryData::Module(*name),
            NodeKind::NodesWithoutModule => PrimaryData::NoModule,
            NodeKind::Directory { rel_path, .. } => PrimaryData::Directory(*rel_path),
            NodeKind::File { path, .. } => PrimaryData::File(*path),
            NodeKind::Problem { problem, .. } => PrimaryData::Problem(problem.id),
        }
    }

    pub fn is_problem(&self) -> bool {
        matches!(self.kind, NodeKind::Problem { .. })
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root { .. })
    }

    /// A node is valid iff it still has at least one descendant; invalid
    /// nodes are pruned by their parent during event processing, so a
    /// published snapshot only ever contains valid nodes (plus the root,
    /// which may legitimately be empty).
    pub fn is_valid(&self) -> bool {
        match &self.kind {
            NodeKind::Problem { .. } => true,
            NodeKind::Root { .. } => true,
            _ => !self.children.is_empty(),
        }
    }

    /// The exclusion set this snapshot was built under (root nodes only).
    pub fn excludes(&self) -> Option<&ExcludeSet> {
        match &self.kind {
            NodeKind::Root { excludes } => Some(excludes),
            _ => None,
        }
    }

    /// Human-facing label, which for most kinds doubles as the sort key.
    pub fn label(&self) -> String {
        match &self.kind {
            NodeKind::Root { .. } => String::new(),
            NodeKind::Severity(severity) => severity.name.to_string(),
            NodeKind::InspectionCategory(name) => name.to_string(),
            NodeKind::Inspection(inspection) => inspection.name.to_string(),
            NodeKind::Module(name) => name.to_string(),
            NodeKind::NodesWithoutModule => "Problems without module".to_string(),
            NodeKind::Directory { rel_path, .. } => rel_path.to_string(),
            NodeKind::File { name, .. } => name.to_string(),
            NodeKind::Problem { problem, .. } => problem.message.to_string(),
        }
    }

    /// Debug/diagnostic rendering of the subtree.  This is not the UI
    /// contract (the UI keys presentation nodes off `primary_data`); it
    /// exists so tests and humans can see the whole shape at once.
    pub fn to_json(&self) -> Value {
        let kind = match &self.kind {
            NodeKind::Root { .. } => "root",
            NodeKind::Severity(_) => "severity",
            NodeKind::InspectionCategory(_) => "category",
            NodeKind::Inspection(_) => "inspection",
            NodeKind::Module(_) => "module",
            NodeKind::NodesWithoutModule => "no-module",
            NodeKind::Directory { .. } => "directory",
            NodeKind::File { .. } => "file",
            NodeKind::Problem { .. } => "problem",
        };
        let mut value = json!({
            "kind": kind,
            "label": self.label(),
            "count": self.problems_count,
        });
        if self.excluded {
            value["excluded"] = json!(true);
        }
        if let NodeKind::Problem { properties, .. } = &self.kind {
            value["line"] = json!(properties.line);
            value["column"] = json!(properties.column);
            if properties.fixed {
                value["fixed"] = json!(true);
            }
            if properties.missing {
                value["missing"] = json!(true);
            }
        } else {
            value["children"] = Value::Array(
                self.children.nodes().map(|n| n.to_json()).collect(),
            );
        }
        value
    }
}
