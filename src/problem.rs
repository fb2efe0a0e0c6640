//! Problem records and the events that fold them into the tree.
//!
//! These are the boundary types an analyzer integration hands us.  Identity
//! strings (paths, inspection ids, messages) are interned as `Ustr` so that
//! grouping keys are O(1) to copy and compare no matter how many nodes embed
//! them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ustr::Ustr;

use crate::exclude::ExcludeSet;

/// Severity as assigned by the analyzer.  The weight drives display order
/// (heavier first); the name is the identity key for the severity grouping
/// level, so two severities with the same name are the same severity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Severity {
    pub name: Ustr,
    pub weight: i32,
}

impl Severity {
    pub fn new(name: &str, weight: i32) -> Severity {
        Severity {
            name: Ustr::from(name),
            weight,
        }
    }
}

/// Inspection metadata computed by the analyzer side.  The id is the identity
/// key; name and category are display-level and feed the category grouping
/// layer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct InspectionRef {
    pub id: Ustr,
    pub name: Ustr,
    pub category: Ustr,
}

/// A single static-analysis finding; the tree's leaf entity.
///
/// Everything on this record is identity-level: a change to any of these
/// attributes (severity, file, inspection) is expressed by the integration as
/// a removal of the old record plus an update carrying the new one, never by
/// mutating a record in place.  The attributes that legitimately drift over
/// time while the finding stays "the same" live on [`ProblemProperties`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Stable identity of the finding, unique across the whole problem set.
    pub id: Ustr,
    /// Project-relative file path, `/`-separated.
    pub file: Ustr,
    /// `None` lands the problem in the "nodes without module" bucket when
    /// module grouping is enabled.
    pub module: Option<Ustr>,
    pub severity: Severity,
    pub inspection: InspectionRef,
    pub message: Ustr,
}

/// The mutable-over-time half of a problem: where it currently is and what
/// state it is in.  A properties change re-sorts the leaf but keeps its
/// identity key, so the UI can track "the same" node across snapshots.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProblemProperties {
    pub line: u32,
    pub column: u32,
    /// The finding has been fixed in the editor but is kept displayed
    /// (sorted last) until the analyzer re-runs.
    pub fixed: bool,
    /// The anchor for the finding can no longer be located in the file.
    pub missing: bool,
}

/// One entry of a problem batch: the record plus its current properties.
///
/// `properties: None` means the analyzer no longer reports this problem at
/// all; the corresponding leaf becomes invalid and is pruned, cascading up
/// through any ancestor that loses its last child.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProblemUpdate {
    pub problem: Arc<Problem>,
    pub properties: Option<ProblemProperties>,
}

impl ProblemUpdate {
    pub fn changed(problem: Arc<Problem>, properties: ProblemProperties) -> ProblemUpdate {
        ProblemUpdate {
            problem,
            properties: Some(properties),
        }
    }

    pub fn removed(problem: Arc<Problem>) -> ProblemUpdate {
        ProblemUpdate {
            problem,
            properties: None,
        }
    }
}

/// An input batch to fold into the tree.
#[derive(Clone, Debug)]
pub enum TreeEvent {
    /// Problems that are new, changed, or gone (see [`ProblemUpdate`]).
    Problems(Vec<ProblemUpdate>),
    /// The exclusion configuration changed; the underlying problem set did
    /// not.  Subtrees whose excluded-ness does not flip are untouched.
    ExcludeChanged(ExcludeSet),
}
