//! Exclusion configuration: rules that hide problems from the active set
//! without changing the underlying problem stream.
//!
//! Path rules are globs over project-relative paths and are compiled into a
//! single `GlobSet` up front; rule compilation is the only fallible step and
//! it happens at the boundary, before any event carrying the set is built.

use std::collections::HashSet;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use ustr::Ustr;

use crate::problem::Problem;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ExcludeRule {
    /// Glob over the project-relative file path, e.g. `generated/**` or
    /// `**/*.min.js`.
    Path(String),
    /// Exclude every problem reported by the given inspection id.
    Inspection(Ustr),
}

/// A compiled set of exclusion rules.
#[derive(Clone, Debug)]
pub struct ExcludeSet {
    rules: Vec<ExcludeRule>,
    paths: GlobSet,
    inspections: HashSet<Ustr>,
}

impl Default for ExcludeSet {
    fn default() -> ExcludeSet {
        ExcludeSet::empty()
    }
}

impl ExcludeSet {
    pub fn empty() -> ExcludeSet {
        ExcludeSet {
            rules: Vec::new(),
            paths: GlobSet::empty(),
            inspections: HashSet::new(),
        }
    }

    /// Compile a rule list.  A malformed glob is reported here; an already
    /// compiled set can never fail at match time.
    pub fn compile(rules: Vec<ExcludeRule>) -> Result<ExcludeSet, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        let mut inspections = HashSet::new();
        for rule in &rules {
            match rule {
                ExcludeRule::Path(pattern) => {
                    builder.add(Glob::new(pattern)?);
                }
                ExcludeRule::Inspection(id) => {
                    inspections.insert(*id);
                }
            }
        }
        Ok(ExcludeSet {
            rules,
            paths: builder.build()?,
            inspections,
        })
    }

    pub fn rules(&self) -> &[ExcludeRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether the given problem is excluded under this rule set.  Paths are
    /// matched with any leading slash stripped, matching the normalization
    /// the tree applies to directory keys.
    pub fn is_excluded(&self, problem: &Problem) -> bool {
        if self.inspections.contains(&problem.inspection.id) {
            return true;
        }
        let path = problem.file.as_str().trim_start_matches('/');
        self.paths.is_match(path)
    }
}
