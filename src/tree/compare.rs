//! The single total order over every node kind that can co-occur as a
//! sibling under some grouping configuration.
//!
//! The same order drives display sorting and next/previous navigation, so it
//! has to be antisymmetric and transitive across the whole universe even
//! though in practice only same-kind siblings are ever compared.  Cross-kind
//! pairs are ordered by a fixed kind rank, which is also what makes the two
//! special rules fall out structurally: a directory sorts before a file at
//! the same level, and the "nodes without module" bucket sorts after every
//! real module.

use std::cmp::Ordering;

use lexical_sort::natural_lexical_cmp;

use crate::tree::node::{Node, NodeKind};

fn kind_rank(kind: &NodeKind) -> u8 {
    match kind {
        NodeKind::Root { .. } => 0,
        NodeKind::Severity(_) => 1,
        NodeKind::InspectionCategory(_) => 2,
        NodeKind::Inspection(_) => 3,
        NodeKind::Module(_) => 4,
        NodeKind::NodesWithoutModule => 5,
        NodeKind::Directory { .. } => 6,
        NodeKind::File { .. } => 7,
        NodeKind::Problem { .. } => 8,
    }
}

pub fn compare_nodes(a: &Node, b: &Node) -> Ordering {
    if std::ptr::eq(a, b) {
        return Ordering::Equal;
    }
    let rank = kind_rank(&a.kind).cmp(&kind_rank(&b.kind));
    if rank != Ordering::Equal {
        return rank;
    }
    match (&a.kind, &b.kind) {
        (NodeKind::Root { .. }, NodeKind::Root { .. }) => Ordering::Equal,
        (NodeKind::Severity(sa), NodeKind::Severity(sb)) => sb
            .weight
            .cmp(&sa.weight)
            .then_with(|| natural_lexical_cmp(sa.name.as_str(), sb.name.as_str())),
        (NodeKind::InspectionCategory(na), NodeKind::InspectionCategory(nb)) => {
            natural_lexical_cmp(na.as_str(), nb.as_str())
        }
        (NodeKind::Inspection(ia), NodeKind::Inspection(ib)) => {
            natural_lexical_cmp(ia.name.as_str(), ib.name.as_str())
                .then_with(|| natural_lexical_cmp(ia.id.as_str(), ib.id.as_str()))
        }
        (NodeKind::Module(na), NodeKind::Module(nb)) => {
            natural_lexical_cmp(na.as_str(), nb.as_str())
        }
        (NodeKind::NodesWithoutModule, NodeKind::NodesWithoutModule) => Ordering::Equal,
        (
            NodeKind::Directory { rel_path: pa, .. },
            NodeKind::Directory { rel_path: pb, .. },
        ) => natural_lexical_cmp(pa.as_str(), pb.as_str()),
        (NodeKind::File { name: na, path: pa }, NodeKind::File { name: nb, path: pb }) => {
            natural_lexical_cmp(na.as_str(), nb.as_str())
                .then_with(|| natural_lexical_cmp(pa.as_str(), pb.as_str()))
        }
        (
            NodeKind::Problem {
                problem: qa,
                properties: ta,
            },
            NodeKind::Problem {
                problem: qb,
                properties: tb,
            },
        ) => ta
            .missing
            .cmp(&tb.missing)
            .then(ta.fixed.cmp(&tb.fixed))
            .then(ta.line.cmp(&tb.line))
            .then(ta.column.cmp(&tb.column))
            .then_with(|| natural_lexical_cmp(qa.message.as_str(), qb.message.as_str()))
            .then_with(|| natural_lexical_cmp(qa.id.as_str(), qb.id.as_str())),
        // Kind ranks already disambiguated everything else.
        _ => unreachable!("cross-kind comparison is settled by rank"),
    }
}
