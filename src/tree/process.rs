//! Event-driven recomputation: folding a [`TreeEvent`] into an existing
//! snapshot to produce the next one.
//!
//! The shape of the pass is the same at every level: a children container is
//! asked to compute its replacement given the updates relevant to its
//! subtree; it answers `None` when the event definitely does not touch it
//! (the fast path that bounds work by the affected subtree, not the whole
//! tree), otherwise it hands back a new container in which unchanged child
//! nodes keep their `Arc` identity and only the chain of real change is
//! reconstructed.  Identity keys of that chain are recorded into the
//! [`PathBuilder`] on the way back out.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use itertools::Itertools;
use tracing::debug;
use ustr::Ustr;

use crate::exclude::ExcludeSet;
use crate::options::{Layer, ViewOptions};
use crate::problem::{Problem, ProblemProperties, ProblemUpdate, TreeEvent};
use crate::tree::compare::compare_nodes;
use crate::tree::node::{Children, Node, NodeKind, PrimaryData};
use crate::tree::path::PathBuilder;

struct Ctx<'a> {
    options: ViewOptions,
    excludes: &'a ExcludeSet,
}

enum Outcome {
    Unchanged,
    Replaced(Arc<Node>),
    Removed,
}

/// Create an empty tree for the given configuration.  The root remembers the
/// exclusion set so later problem events can evaluate excluded-ness without
/// ambient state.
pub fn new_root(options: &ViewOptions, excludes: ExcludeSet) -> Arc<Node> {
    let options = options.clamped();
    Arc::new(Node {
        kind: NodeKind::Root { excludes },
        children: Children::empty(options.first_layer()),
        problems_count: 0,
        excluded: false,
    })
}

/// Fold one event into the tree, returning the new root (or the same `Arc`
/// when the event changed nothing).  The builder ends up describing exactly
/// the ancestor chain(s) that changed; the root's own key is recorded but
/// excluded from the built path since the UI never renders the root as a
/// refreshable row.
pub fn process_tree_event(
    root: &Arc<Node>,
    event: &TreeEvent,
    options: &ViewOptions,
    pb: &mut PathBuilder,
) -> Arc<Node> {
    let options = options.clamped();
    match event {
        TreeEvent::Problems(updates) => process_problems(root, updates, options, pb),
        TreeEvent::ExcludeChanged(excludes) => process_exclude_change(root, excludes, options, pb),
    }
}

impl Children {
    /// The per-container recomputation contract: `None` means "this
    /// container is definitely unaffected, keep the old instance".
    pub fn compute_new_children(
        &self,
        updates: &[&ProblemUpdate],
        options: &ViewOptions,
        excludes: &ExcludeSet,
        pb: &mut PathBuilder,
    ) -> Option<Children> {
        let ctx = Ctx {
            options: options.clamped(),
            excludes,
        };
        compute_new_children(self, updates, &ctx, pb)
    }
}

fn process_problems(
    root: &Arc<Node>,
    updates: &[ProblemUpdate],
    options: ViewOptions,
    pb: &mut PathBuilder,
) -> Arc<Node> {
    if updates.is_empty() {
        return Arc::clone(root);
    }
    let excludes = root.excludes().cloned().unwrap_or_default();
    let ctx = Ctx {
        options,
        excludes: &excludes,
    };
    let refs = updates.iter().collect_vec();
    debug!(updates = refs.len(), "processing problem batch");
    let mut sub = PathBuilder::new();
    match compute_new_children(&root.children, &refs, &ctx, &mut sub) {
        None => Arc::clone(root),
        Some(children) => {
            pb.absorb(sub, true);
            pb.exclude_node(PrimaryData::Root);
            pb.add_node(PrimaryData::Root);
            pb.add_parent(PrimaryData::Root);
            let problems_count = sum_counts(&children.nodes);
            Arc::new(Node {
                kind: root.kind.clone(),
                children,
                problems_count,
                excluded: false,
            })
        }
    }
}

fn compute_new_children(
    children: &Children,
    updates: &[&ProblemUpdate],
    ctx: &Ctx,
    pb: &mut PathBuilder,
) -> Option<Children> {
    if updates.is_empty() {
        return None;
    }
    if children.layer == Layer::Files && ctx.options.group_by_directory {
        compute_files_children(children, updates, ctx, pb)
    } else {
        compute_keyed_children(children, updates, ctx, pb)
    }
}

/// The identity key a problem maps to at a given grouping layer.  At the
/// `Files` layer this is the flat (directory grouping off) key; the nested
/// variant never goes through here.
fn layer_key(layer: Layer, update: &ProblemUpdate) -> PrimaryData {
    let problem = &update.problem;
    match layer {
        Layer::Severity => PrimaryData::Severity(problem.severity.name),
        Layer::InspectionCategory => PrimaryData::InspectionCategory(problem.inspection.category),
        Layer::Inspection => PrimaryData::Inspection(problem.inspection.id),
        Layer::Module => match problem.module {
            Some(module) => PrimaryData::Module(module),
            None => PrimaryData::NoModule,
        },
        Layer::Files => PrimaryData::File(problem.file),
        Layer::Problems => PrimaryData::Problem(problem.id),
    }
}

/// Generic recomputation for every layer whose children are matched purely
/// by key: partition the updates by child key, reprocess the touched
/// children, build subtrees for keys that have no child yet, keep everything
/// else by `Arc` identity.
fn compute_keyed_children(
    children: &Children,
    updates: &[&ProblemUpdate],
    ctx: &Ctx,
    pb: &mut PathBuilder,
) -> Option<Children> {
    let mut groups: BTreeMap<PrimaryData, Vec<&ProblemUpdate>> = BTreeMap::new();
    for update in updates {
        groups
            .entry(layer_key(children.layer, update))
            .or_default()
            .push(update);
    }

    let mut nodes: Vec<Arc<Node>> = Vec::with_capacity(children.nodes.len());
    let mut changed: Vec<PathBuilder> = Vec::new();
    let mut insert_builders: Vec<PathBuilder> = Vec::new();
    let mut removed = 0usize;

    for old in &children.nodes {
        match groups.remove(&old.primary_data()) {
            None => nodes.push(Arc::clone(old)),
            Some(subset) => {
                let mut sub = PathBuilder::new();
                match process_node(old, &subset, ctx, &mut sub) {
                    Outcome::Unchanged => nodes.push(Arc::clone(old)),
                    Outcome::Replaced(node) => {
                        nodes.push(node);
                        changed.push(sub);
                    }
                    Outcome::Removed => removed += 1,
                }
            }
        }
    }

    for (key, subset) in groups {
        if let Some(node) = build_subtree(children.layer, &key, &subset, ctx) {
            let mut sub = PathBuilder::new();
            sub.add_path(vec![node.primary_data()]);
            nodes.push(node);
            insert_builders.push(sub);
        }
    }

    if changed.is_empty() && insert_builders.is_empty() && removed == 0 {
        return None;
    }

    merge_builders(pb, changed, insert_builders, removed);
    nodes.sort_by(|a, b| compare_nodes(a, b));
    Some(Children::new(children.layer, nodes))
}

/// Fold per-child builders into the container's builder.  The primary chain
/// survives only when exactly one existing child changed and nothing was
/// inserted or removed; otherwise the chain stops at this container's owner
/// (the deepest common ancestor of the changes).  Inserted chains are always
/// kept.
fn merge_builders(
    pb: &mut PathBuilder,
    changed: Vec<PathBuilder>,
    insert_builders: Vec<PathBuilder>,
    removed: usize,
) {
    let keep_chain = changed.len() == 1 && removed == 0 && insert_builders.is_empty();
    for (index, sub) in changed.into_iter().enumerate() {
        pb.absorb(sub, keep_chain && index == 0);
    }
    for sub in insert_builders {
        pb.absorb(sub, false);
    }
    if !keep_chain {
        pb.reset_chain();
    }
}

fn process_node(
    old: &Arc<Node>,
    updates: &[&ProblemUpdate],
    ctx: &Ctx,
    pb: &mut PathBuilder,
) -> Outcome {
    match &old.kind {
        NodeKind::Problem { properties, .. } => {
            let last = match updates.last() {
                Some(last) => last,
                None => return Outcome::Unchanged,
            };
            match last.properties {
                None => Outcome::Removed,
                Some(props) => {
                    let excluded = ctx.excludes.is_excluded(&last.problem);
                    if excluded && !ctx.options.show_excluded {
                        return Outcome::Removed;
                    }
                    if props == *properties && excluded == old.excluded {
                        return Outcome::Unchanged;
                    }
                    let node = make_problem_node(Arc::clone(&last.problem), props, excluded);
                    pb.add_node(node.primary_data());
                    Outcome::Replaced(node)
                }
            }
        }
        _ => {
            let mut sub = PathBuilder::new();
            match compute_new_children(&old.children, updates, ctx, &mut sub) {
                None => Outcome::Unchanged,
                Some(children) if children.is_empty() => Outcome::Removed,
                Some(children) => {
                    pb.absorb(sub, true);
                    let key = old.primary_data();
                    pb.add_node(key);
                    pb.add_parent(key);
                    Outcome::Replaced(rebuild_container(old, children))
                }
            }
        }
    }
}

/// Recomputation of a directory-grouped file partition.  Files are the
/// stable grain here: the touched file nodes are reprocessed (or built, or
/// dropped) first, then the directory skeleton is re-derived over the
/// resulting file set with chain compaction, reusing every directory node
/// whose subtree contains no affected path.
fn compute_files_children(
    children: &Children,
    updates: &[&ProblemUpdate],
    ctx: &Ctx,
    pb: &mut PathBuilder,
) -> Option<Children> {
    let mut by_file: BTreeMap<Ustr, Vec<&ProblemUpdate>> = BTreeMap::new();
    for update in updates {
        by_file.entry(update.problem.file).or_default().push(update);
    }

    let mut files: BTreeMap<Ustr, Arc<Node>> = BTreeMap::new();
    collect_files(&children.nodes, &mut files);

    let mut changed: Vec<(Ustr, PathBuilder)> = Vec::new();
    let mut inserted: Vec<(Ustr, PathBuilder)> = Vec::new();
    let mut removed = 0usize;
    let mut affected: HashSet<Ustr> = HashSet::new();

    for (path, subset) in by_file {
        let normalized = Ustr::from(norm(path.as_str()));
        match files.get(&path).cloned() {
            Some(old_file) => {
                let mut sub = PathBuilder::new();
                match process_node(&old_file, &subset, ctx, &mut sub) {
                    Outcome::Unchanged => {}
                    Outcome::Replaced(node) => {
                        files.insert(path, node);
                        changed.push((path, sub));
                        affected.insert(normalized);
                    }
                    Outcome::Removed => {
                        files.remove(&path);
                        removed += 1;
                        affected.insert(normalized);
                    }
                }
            }
            None => {
                if let Some(node) = build_file_node(&subset, ctx) {
                    let mut sub = PathBuilder::new();
                    sub.add_path(vec![node.primary_data()]);
                    files.insert(path, node);
                    inserted.push((path, sub));
                    affected.insert(normalized);
                }
            }
        }
    }

    if changed.is_empty() && inserted.is_empty() && removed == 0 {
        return None;
    }

    let lone_insert = if changed.is_empty() && removed == 0 && inserted.len() == 1 {
        Some(inserted[0].0)
    } else {
        None
    };

    let file_list = files.into_iter().collect_vec();
    let nodes = partition_directories(0, &file_list, Some((children, &affected)));

    // Splice the directory keys of the rebuilt skeleton into each per-file
    // builder, innermost first, so chains read change-point -> root.
    let mut changed_builders = Vec::with_capacity(changed.len());
    for (path, mut sub) in changed {
        for key in dir_keys_for(&nodes, path).iter().rev() {
            sub.add_node(*key);
            sub.add_parent(*key);
        }
        changed_builders.push(sub);
    }
    let mut insert_builders = Vec::with_capacity(inserted.len());
    for (path, mut sub) in inserted {
        for key in dir_keys_for(&nodes, path).iter().rev() {
            sub.add_parent(*key);
        }
        insert_builders.push(sub);
    }
    merge_builders(pb, changed_builders, insert_builders, removed);

    // A lone insertion still has a unique change point: the deepest existing
    // directory above the new node.  Carry the primary chain down through
    // those surviving ancestors instead of stopping at this container.
    if let Some(path) = lone_insert {
        let keys = dir_keys_for(&nodes, path);
        for key in existing_dir_keys(children, &keys).iter().rev() {
            pb.add_node(*key);
        }
    }

    Some(Children::new(Layer::Files, nodes))
}

/// The leading run of `keys` that already named directory nodes in the old
/// container, outermost first.  A repartition can rename or introduce
/// directories; only keys that survived with the same identity belong on the
/// primary change chain.
fn existing_dir_keys(old: &Children, keys: &[PrimaryData]) -> Vec<PrimaryData> {
    let mut out = Vec::new();
    let mut cursor = old;
    for key in keys {
        match cursor.node_by_primary_data(key) {
            Some(node) if matches!(node.kind, NodeKind::Directory { .. }) => {
                out.push(*key);
                cursor = &node.children;
            }
            _ => break,
        }
    }
    out
}

fn collect_files(nodes: &[Arc<Node>], out: &mut BTreeMap<Ustr, Arc<Node>>) {
    for node in nodes {
        match &node.kind {
            NodeKind::File { path, .. } => {
                out.insert(*path, Arc::clone(node));
            }
            NodeKind::Directory { .. } => collect_files(&node.children.nodes, out),
            _ => {}
        }
    }
}

/// The chain of directory keys (outermost first) containing `path` in the
/// given sibling forest.
fn dir_keys_for(nodes: &[Arc<Node>], path: Ustr) -> Vec<PrimaryData> {
    let normalized = norm(path.as_str());
    let mut keys = Vec::new();
    let mut cursor = nodes;
    loop {
        let mut next = None;
        for node in cursor {
            if let NodeKind::Directory { dir_path, .. } = &node.kind {
                if normalized.starts_with(&format!("{}/", dir_path)) {
                    keys.push(node.primary_data());
                    next = Some(&node.children.nodes);
                    break;
                }
            }
        }
        match next {
            Some(deeper) => cursor = deeper,
            None => break,
        }
    }
    keys
}

/// Derive the directory/file sibling structure over a flat file set.
///
/// `base_depth` is how many leading path components the enclosing chain has
/// already consumed.  Each group of files sharing the next component becomes
/// one directory node whose relative path covers the longest directory chain
/// common to the whole group (chain compaction).  When `reuse` is given, a
/// directory node whose subtree contains no affected path keeps its old
/// `Arc`.
fn partition_directories(
    base_depth: usize,
    files: &[(Ustr, Arc<Node>)],
    reuse: Option<(&Children, &HashSet<Ustr>)>,
) -> Vec<Arc<Node>> {
    let mut nodes: Vec<Arc<Node>> = Vec::new();
    let mut groups: BTreeMap<String, Vec<(Ustr, Arc<Node>)>> = BTreeMap::new();
    for (path, node) in files {
        let comps = components(path.as_str());
        if comps.len() <= base_depth + 1 {
            nodes.push(Arc::clone(node));
        } else {
            groups
                .entry(comps[base_depth].to_string())
                .or_default()
                .push((*path, Arc::clone(node)));
        }
    }

    for group in groups.into_values() {
        let first = components(group[0].0.as_str());
        let mut lcp: Vec<String> = first[base_depth..first.len() - 1]
            .iter()
            .map(|c| c.to_string())
            .collect();
        for (path, _) in group.iter().skip(1) {
            let comps = components(path.as_str());
            let dir = &comps[base_depth..comps.len() - 1];
            let mut common = 0;
            while common < lcp.len() && common < dir.len() && lcp[common] == dir[common] {
                common += 1;
            }
            lcp.truncate(common);
        }
        let rel = lcp.join("/");
        let dir_full = first[..base_depth + lcp.len()].join("/");
        let key = PrimaryData::Directory(Ustr::from(&rel));

        if let Some((old, affected)) = reuse {
            if let Some(old_node) = old.node_by_primary_data(&key) {
                if let NodeKind::Directory { dir_path, .. } = &old_node.kind {
                    let prefix = format!("{}/", dir_path);
                    if affected.iter().all(|p| !p.as_str().starts_with(&prefix)) {
                        nodes.push(Arc::clone(old_node));
                        continue;
                    }
                    let child_nodes = partition_directories(
                        base_depth + lcp.len(),
                        &group,
                        Some((&old_node.children, affected)),
                    );
                    nodes.push(make_directory_node(&rel, &dir_full, child_nodes));
                    continue;
                }
            }
        }
        let child_nodes = partition_directories(base_depth + lcp.len(), &group, None);
        nodes.push(make_directory_node(&rel, &dir_full, child_nodes));
    }

    nodes.sort_by(|a, b| compare_nodes(a, b));
    nodes
}

fn build_subtree(
    layer: Layer,
    key: &PrimaryData,
    updates: &[&ProblemUpdate],
    ctx: &Ctx,
) -> Option<Arc<Node>> {
    match layer {
        Layer::Problems => build_problem_leaf(updates, ctx),
        Layer::Files => build_file_node(updates, ctx),
        Layer::Severity | Layer::InspectionCategory | Layer::Inspection | Layer::Module => {
            let representative = &updates.first()?.problem;
            let children = build_children(ctx.options.layer_below(layer), updates, ctx);
            if children.is_empty() {
                return None;
            }
            let kind = match (layer, key) {
                (Layer::Severity, PrimaryData::Severity(_)) => {
                    NodeKind::Severity(representative.severity)
                }
                (Layer::InspectionCategory, PrimaryData::InspectionCategory(name)) => {
                    NodeKind::InspectionCategory(*name)
                }
                (Layer::Inspection, PrimaryData::Inspection(_)) => {
                    NodeKind::Inspection(representative.inspection)
                }
                (Layer::Module, PrimaryData::Module(name)) => NodeKind::Module(*name),
                (Layer::Module, PrimaryData::NoModule) => NodeKind::NodesWithoutModule,
                _ => unreachable!("layer and key kinds always agree"),
            };
            let problems_count = sum_counts(&children.nodes);
            let excluded = all_excluded(&children.nodes);
            Some(Arc::new(Node {
                kind,
                children,
                problems_count,
                excluded,
            }))
        }
    }
}

fn build_children(layer: Layer, updates: &[&ProblemUpdate], ctx: &Ctx) -> Children {
    if layer == Layer::Files && ctx.options.group_by_directory {
        let mut by_file: BTreeMap<Ustr, Vec<&ProblemUpdate>> = BTreeMap::new();
        for update in updates {
            by_file.entry(update.problem.file).or_default().push(update);
        }
        let mut files = Vec::new();
        for subset in by_file.into_values() {
            if let Some(node) = build_file_node(&subset, ctx) {
                if let NodeKind::File { path, .. } = &node.kind {
                    files.push((*path, node.clone()));
                }
            }
        }
        let nodes = partition_directories(0, &files, None);
        return Children::new(Layer::Files, nodes);
    }

    let mut groups: BTreeMap<PrimaryData, Vec<&ProblemUpdate>> = BTreeMap::new();
    for update in updates {
        groups.entry(layer_key(layer, update)).or_default().push(update);
    }
    let mut nodes = Vec::new();
    for (key, subset) in groups {
        if let Some(node) = build_subtree(layer, &key, &subset, ctx) {
            nodes.push(node);
        }
    }
    nodes.sort_by(|a, b| compare_nodes(a, b));
    Children::new(layer, nodes)
}

fn build_file_node(updates: &[&ProblemUpdate], ctx: &Ctx) -> Option<Arc<Node>> {
    let path = updates.first()?.problem.file;
    let children = build_children(Layer::Problems, updates, ctx);
    if children.is_empty() {
        return None;
    }
    let problems_count = sum_counts(&children.nodes);
    let excluded = all_excluded(&children.nodes);
    Some(Arc::new(Node {
        kind: NodeKind::File {
            path,
            name: Ustr::from(file_name(path.as_str())),
        },
        children,
        problems_count,
        excluded,
    }))
}

fn build_problem_leaf(updates: &[&ProblemUpdate], ctx: &Ctx) -> Option<Arc<Node>> {
    let last = updates.last()?;
    let properties = last.properties?;
    let excluded = ctx.excludes.is_excluded(&last.problem);
    if excluded && !ctx.options.show_excluded {
        return None;
    }
    Some(make_problem_node(
        Arc::clone(&last.problem),
        properties,
        excluded,
    ))
}

fn make_problem_node(
    problem: Arc<Problem>,
    properties: ProblemProperties,
    excluded: bool,
) -> Arc<Node> {
    Arc::new(Node {
        kind: NodeKind::Problem {
            problem,
            properties,
        },
        children: Children::leaf(),
        problems_count: if excluded { 0 } else { 1 },
        excluded,
    })
}

fn make_directory_node(rel: &str, dir_full: &str, child_nodes: Vec<Arc<Node>>) -> Arc<Node> {
    let problems_count = sum_counts(&child_nodes);
    let excluded = all_excluded(&child_nodes);
    Arc::new(Node {
        kind: NodeKind::Directory {
            rel_path: Ustr::from(rel),
            dir_path: Ustr::from(dir_full),
        },
        children: Children::new(Layer::Files, child_nodes),
        problems_count,
        excluded,
    })
}

fn rebuild_container(old: &Node, children: Children) -> Arc<Node> {
    let problems_count = sum_counts(&children.nodes);
    let excluded = all_excluded(&children.nodes);
    Arc::new(Node {
        kind: old.kind.clone(),
        children,
        problems_count,
        excluded,
    })
}

// Exclusion changes reevaluate the excluded flag across the tree and prune
// (or reveal, under show_excluded) the flipped branches.  Directory
// skeletons are not re-compacted here; a later problem event touching the
// area repartitions it.

fn process_exclude_change(
    root: &Arc<Node>,
    excludes: &ExcludeSet,
    options: ViewOptions,
    pb: &mut PathBuilder,
) -> Arc<Node> {
    let ctx = Ctx { options, excludes };
    debug!(rules = excludes.rules().len(), "processing exclusion change");
    let mut sub = PathBuilder::new();
    let children = match apply_excludes_children(&root.children, &ctx, &mut sub) {
        Some(children) => {
            pb.absorb(sub, true);
            pb.exclude_node(PrimaryData::Root);
            pb.add_node(PrimaryData::Root);
            pb.add_parent(PrimaryData::Root);
            children
        }
        // Unchanged structurally, but the new rule set must still be
        // remembered for future problem events.
        None => root.children.clone(),
    };
    let problems_count = sum_counts(&children.nodes);
    Arc::new(Node {
        kind: NodeKind::Root {
            excludes: excludes.clone(),
        },
        children,
        problems_count,
        excluded: false,
    })
}

fn apply_excludes_children(
    children: &Children,
    ctx: &Ctx,
    pb: &mut PathBuilder,
) -> Option<Children> {
    let mut nodes = Vec::with_capacity(children.nodes.len());
    let mut changed: Vec<PathBuilder> = Vec::new();
    let mut removed = 0usize;
    for old in &children.nodes {
        let mut sub = PathBuilder::new();
        match apply_excludes_node(old, ctx, &mut sub) {
            Outcome::Unchanged => nodes.push(Arc::clone(old)),
            Outcome::Replaced(node) => {
                nodes.push(node);
                changed.push(sub);
            }
            Outcome::Removed => removed += 1,
        }
    }
    if changed.is_empty() && removed == 0 {
        return None;
    }
    merge_builders(pb, changed, Vec::new(), removed);
    Some(Children::new(children.layer, nodes))
}

fn apply_excludes_node(old: &Arc<Node>, ctx: &Ctx, pb: &mut PathBuilder) -> Outcome {
    match &old.kind {
        NodeKind::Problem {
            problem,
            properties,
        } => {
            let excluded = ctx.excludes.is_excluded(problem);
            if excluded && !ctx.options.show_excluded {
                return Outcome::Removed;
            }
            if excluded == old.excluded {
                return Outcome::Unchanged;
            }
            let node = make_problem_node(Arc::clone(problem), *properties, excluded);
            pb.add_node(node.primary_data());
            Outcome::Replaced(node)
        }
        _ => {
            let mut sub = PathBuilder::new();
            match apply_excludes_children(&old.children, ctx, &mut sub) {
                None => Outcome::Unchanged,
                Some(children) if children.is_empty() => Outcome::Removed,
                Some(children) => {
                    pb.absorb(sub, true);
                    let key = old.primary_data();
                    pb.add_node(key);
                    pb.add_parent(key);
                    Outcome::Replaced(rebuild_container(old, children))
                }
            }
        }
    }
}

fn norm(path: &str) -> &str {
    path.trim_start_matches('/')
}

fn file_name(path: &str) -> &str {
    norm(path).rsplit('/').next().unwrap_or(path)
}

fn components(path: &str) -> Vec<&str> {
    norm(path).split('/').filter(|c| !c.is_empty()).collect()
}

fn sum_counts(nodes: &[Arc<Node>]) -> u32 {
    nodes.iter().map(|n| n.problems_count).sum()
}

fn all_excluded(nodes: &[Arc<Node>]) -> bool {
    !nodes.is_empty() && nodes.iter().all(|n| n.excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclude::ExcludeRule;
    use crate::problem::{InspectionRef, Severity};

    fn error() -> Severity {
        Severity::new("ERROR", 400)
    }

    fn warning() -> Severity {
        Severity::new("WARNING", 300)
    }

    fn inspection(id: &str, category: &str) -> InspectionRef {
        InspectionRef {
            id: Ustr::from(id),
            name: Ustr::from(id),
            category: Ustr::from(category),
        }
    }

    fn problem(
        id: &str,
        file: &str,
        module: Option<&str>,
        severity: Severity,
        insp: InspectionRef,
        message: &str,
    ) -> Arc<Problem> {
        Arc::new(Problem {
            id: Ustr::from(id),
            file: Ustr::from(file),
            module: module.map(Ustr::from),
            severity,
            inspection: insp,
            message: Ustr::from(message),
        })
    }

    fn at(problem: &Arc<Problem>, line: u32, column: u32) -> ProblemUpdate {
        ProblemUpdate::changed(
            Arc::clone(problem),
            ProblemProperties {
                line,
                column,
                fixed: false,
                missing: false,
            },
        )
    }

    fn full_grouping() -> ViewOptions {
        ViewOptions {
            group_by_module: true,
            ..ViewOptions::default()
        }
    }

    fn apply(
        root: &Arc<Node>,
        options: &ViewOptions,
        updates: Vec<ProblemUpdate>,
    ) -> (Arc<Node>, crate::tree::path::TreePath) {
        let mut pb = PathBuilder::new();
        let next = process_tree_event(root, &TreeEvent::Problems(updates), options, &mut pb);
        (next, pb.build_path())
    }

    /// Walk down a chain of identity keys, panicking with context on a miss.
    fn descend<'a>(node: &'a Arc<Node>, keys: &[PrimaryData]) -> &'a Arc<Node> {
        let mut cursor = node;
        for key in keys {
            cursor = cursor
                .children
                .node_by_primary_data(key)
                .unwrap_or_else(|| panic!("no child {:?} under {:?}", key, cursor.label()));
        }
        cursor
    }

    fn assert_counts_consistent(node: &Arc<Node>) {
        if !node.is_problem() {
            let sum = sum_counts(&node.children.nodes);
            assert_eq!(
                node.problems_count,
                sum,
                "count of {:?} must equal the sum over its children",
                node.label()
            );
            for child in node.children.nodes() {
                assert_counts_consistent(child);
            }
        }
    }

    fn sev_key(severity: Severity) -> PrimaryData {
        PrimaryData::Severity(severity.name)
    }

    fn scenario() -> (Arc<Node>, ViewOptions, Arc<Problem>, Arc<Problem>, Arc<Problem>) {
        let options = full_grouping();
        let insp_a = inspection("InspectionA", "Probable bugs");
        let insp_b = inspection("InspectionB", "Style");
        let p1 = problem("p1", "src/a.kt", Some("moduleM"), error(), insp_a, "first");
        let p2 = problem("p2", "src/b.kt", Some("moduleM"), error(), insp_a, "second");
        let p3 = problem("p3", "src/a.kt", Some("moduleM"), warning(), insp_b, "third");
        let root = new_root(&options, ExcludeSet::empty());
        let (root, _) = apply(
            &root,
            &options,
            vec![at(&p1, 1, 0), at(&p2, 5, 0), at(&p3, 2, 0)],
        );
        (root, options, p1, p2, p3)
    }

    #[test]
    fn full_grouping_builds_the_expected_hierarchy() {
        let (root, _, _, _, _) = scenario();
        assert_eq!(root.problems_count, 3);
        assert_counts_consistent(&root);

        // ERROR sorts before WARNING.
        let labels: Vec<String> = root.children.nodes().map(|n| n.label()).collect();
        assert_eq!(labels, vec!["ERROR", "WARNING"]);

        let error_chain = [
            sev_key(error()),
            PrimaryData::InspectionCategory(Ustr::from("Probable bugs")),
            PrimaryData::Inspection(Ustr::from("InspectionA")),
            PrimaryData::Module(Ustr::from("moduleM")),
            PrimaryData::Directory(Ustr::from("src")),
        ];
        let dir = descend(&root, &error_chain);
        assert_eq!(dir.problems_count, 2);
        let files: Vec<String> = dir.children.nodes().map(|n| n.label()).collect();
        assert_eq!(files, vec!["a.kt", "b.kt"]);

        let leaf = descend(
            &root,
            &[
                sev_key(warning()),
                PrimaryData::InspectionCategory(Ustr::from("Style")),
                PrimaryData::Inspection(Ustr::from("InspectionB")),
                PrimaryData::Module(Ustr::from("moduleM")),
                PrimaryData::Directory(Ustr::from("src")),
                PrimaryData::File(Ustr::from("src/a.kt")),
                PrimaryData::Problem(Ustr::from("p3")),
            ],
        );
        assert!(leaf.is_problem());
        assert_eq!(descend(&root, &[sev_key(error())]).problems_count, 2);
    }

    #[test]
    fn untouched_subtrees_keep_their_arc_identity() {
        let (root, options, _, _, p3) = scenario();
        let error_before = Arc::clone(descend(&root, &[sev_key(error())]));

        // Move p3 to another line; only the WARNING branch may change.
        let (next, path) = apply(&root, &options, vec![at(&p3, 9, 4)]);
        let error_after = descend(&next, &[sev_key(error())]);
        assert!(
            Arc::ptr_eq(&error_before, error_after),
            "ERROR subtree was not touched and must be reference-identical"
        );
        assert!(!Arc::ptr_eq(&root, &next));
        assert_counts_consistent(&next);

        // The reported chain reaches the changed leaf.
        assert_eq!(
            path.keys,
            vec![
                sev_key(warning()),
                PrimaryData::InspectionCategory(Ustr::from("Style")),
                PrimaryData::Inspection(Ustr::from("InspectionB")),
                PrimaryData::Module(Ustr::from("moduleM")),
                PrimaryData::Directory(Ustr::from("src")),
                PrimaryData::File(Ustr::from("src/a.kt")),
                PrimaryData::Problem(Ustr::from("p3")),
            ]
        );
    }

    #[test]
    fn no_op_event_returns_the_same_root() {
        let (root, options, p1, _, _) = scenario();
        // Same properties as originally reported.
        let (next, path) = apply(&root, &options, vec![at(&p1, 1, 0)]);
        assert!(Arc::ptr_eq(&root, &next), "nothing changed, same instance");
        assert!(path.is_empty());
    }

    #[test]
    fn inserting_a_file_reports_the_chain_and_the_new_node() {
        let (root, options, _, _, _) = scenario();
        let p4 = problem(
            "p4",
            "src/c.kt",
            Some("moduleM"),
            error(),
            inspection("InspectionA", "Probable bugs"),
            "fourth",
        );
        let file_a_before = Arc::clone(descend(
            &root,
            &[
                sev_key(error()),
                PrimaryData::InspectionCategory(Ustr::from("Probable bugs")),
                PrimaryData::Inspection(Ustr::from("InspectionA")),
                PrimaryData::Module(Ustr::from("moduleM")),
                PrimaryData::Directory(Ustr::from("src")),
                PrimaryData::File(Ustr::from("src/a.kt")),
            ],
        ));

        let (next, path) = apply(&root, &options, vec![at(&p4, 3, 0)]);
        assert_counts_consistent(&next);
        assert_eq!(next.problems_count, 4);

        // The chain reaches the deepest existing ancestor, the directory the
        // new file landed in.
        let ancestor_chain = vec![
            sev_key(error()),
            PrimaryData::InspectionCategory(Ustr::from("Probable bugs")),
            PrimaryData::Inspection(Ustr::from("InspectionA")),
            PrimaryData::Module(Ustr::from("moduleM")),
            PrimaryData::Directory(Ustr::from("src")),
        ];
        assert_eq!(path.keys, ancestor_chain);
        let mut inserted_chain = ancestor_chain.clone();
        inserted_chain.push(PrimaryData::File(Ustr::from("src/c.kt")));
        assert_eq!(path.inserted, vec![inserted_chain]);

        // Prefix relationship the UI relies on, for every ancestor prefix.
        for cut in 0..=ancestor_chain.len() {
            let ancestor = crate::tree::path::TreePath {
                keys: ancestor_chain[..cut].to_vec(),
                inserted: vec![],
            };
            assert!(path.starts_with(&ancestor));
        }

        // Sibling files inside the repartitioned directory are reused.
        let file_a_after = descend(
            &next,
            &[
                sev_key(error()),
                PrimaryData::InspectionCategory(Ustr::from("Probable bugs")),
                PrimaryData::Inspection(Ustr::from("InspectionA")),
                PrimaryData::Module(Ustr::from("moduleM")),
                PrimaryData::Directory(Ustr::from("src")),
                PrimaryData::File(Ustr::from("src/a.kt")),
            ],
        );
        assert!(Arc::ptr_eq(&file_a_before, file_a_after));
    }

    #[test]
    fn lone_insertion_path_reaches_the_existing_directory() {
        let options = ViewOptions::default();
        let insp = inspection("I", "General");
        let a = problem("q1", "src/a.kt", None, error(), insp, "a");
        let b = problem("q2", "src/b.kt", None, error(), insp, "b");
        let root = new_root(&options, ExcludeSet::empty());
        let (root, _) = apply(&root, &options, vec![at(&a, 1, 0), at(&b, 2, 0)]);

        // New file in the already-present "src" directory: the primary chain
        // must name that directory, not stop at the inspection.
        let c = problem("q3", "src/c.kt", None, error(), insp, "c");
        let (root, path) = apply(&root, &options, vec![at(&c, 3, 0)]);
        assert_eq!(
            path.keys,
            vec![
                sev_key(error()),
                PrimaryData::InspectionCategory(Ustr::from("General")),
                PrimaryData::Inspection(Ustr::from("I")),
                PrimaryData::Directory(Ustr::from("src")),
            ]
        );

        // A file opening a brand-new directory has no surviving directory
        // ancestor; the chain stops above the file partition.
        let d = problem("q4", "lib/d.kt", None, error(), insp, "d");
        let (_, path) = apply(&root, &options, vec![at(&d, 1, 0)]);
        assert_eq!(
            path.keys,
            vec![
                sev_key(error()),
                PrimaryData::InspectionCategory(Ustr::from("General")),
                PrimaryData::Inspection(Ustr::from("I")),
            ]
        );
        assert_eq!(
            path.inserted,
            vec![vec![
                sev_key(error()),
                PrimaryData::InspectionCategory(Ustr::from("General")),
                PrimaryData::Inspection(Ustr::from("I")),
                PrimaryData::Directory(Ustr::from("lib")),
                PrimaryData::File(Ustr::from("lib/d.kt")),
            ]]
        );
    }

    #[test]
    fn removing_the_last_problem_prunes_the_whole_branch() {
        let (root, options, p1, p2, p3) = scenario();

        let (next, _) = apply(&root, &options, vec![ProblemUpdate::removed(Arc::clone(&p2))]);
        assert_counts_consistent(&next);
        let dir = descend(
            &next,
            &[
                sev_key(error()),
                PrimaryData::InspectionCategory(Ustr::from("Probable bugs")),
                PrimaryData::Inspection(Ustr::from("InspectionA")),
                PrimaryData::Module(Ustr::from("moduleM")),
                PrimaryData::Directory(Ustr::from("src")),
            ],
        );
        assert!(dir
            .children
            .node_by_primary_data(&PrimaryData::File(Ustr::from("src/b.kt")))
            .is_none());

        // Removing the remaining ERROR problem cascades up to the severity
        // node; the WARNING branch is untouched.
        let (next, path) = apply(&next, &options, vec![ProblemUpdate::removed(Arc::clone(&p1))]);
        assert!(next
            .children
            .node_by_primary_data(&sev_key(error()))
            .is_none());
        assert!(next
            .children
            .node_by_primary_data(&sev_key(warning()))
            .is_some());
        assert_eq!(next.problems_count, 1);
        // The change landed at the root's children list; with the root key
        // filtered, the chain is empty.
        assert!(path.keys.is_empty());

        // The root itself survives even when it loses its last child.
        let (empty, _) = apply(&next, &options, vec![ProblemUpdate::removed(Arc::clone(&p3))]);
        assert!(empty.is_root());
        assert!(empty.is_valid());
        assert_eq!(empty.problems_count, 0);
        assert!(empty.children.is_empty());
    }

    #[test]
    fn directory_chains_compact_and_fork() {
        let options = ViewOptions::default();
        let insp = inspection("I", "General");
        let deep = problem("d1", "src/main/kotlin/a.kt", None, error(), insp, "deep");
        let root = new_root(&options, ExcludeSet::empty());
        let (root, _) = apply(&root, &options, vec![at(&deep, 1, 0)]);

        // A single deep file compacts into one directory node.
        let chain = [
            sev_key(error()),
            PrimaryData::InspectionCategory(Ustr::from("General")),
            PrimaryData::Inspection(Ustr::from("I")),
            PrimaryData::Directory(Ustr::from("src/main/kotlin")),
        ];
        assert_eq!(descend(&root, &chain).problems_count, 1);

        // A second file forks the chain at "src/main".
        let fork = problem("d2", "src/main/java/b.kt", None, error(), insp, "fork");
        let (root, _) = apply(&root, &options, vec![at(&fork, 2, 0)]);
        let parent = descend(
            &root,
            &[
                sev_key(error()),
                PrimaryData::InspectionCategory(Ustr::from("General")),
                PrimaryData::Inspection(Ustr::from("I")),
                PrimaryData::Directory(Ustr::from("src/main")),
            ],
        );
        let subdirs: Vec<String> = parent.children.nodes().map(|n| n.label()).collect();
        assert_eq!(subdirs, vec!["java", "kotlin"]);
        assert_counts_consistent(&root);
    }

    #[test]
    fn problems_without_module_bucket_sorts_after_modules() {
        let options = full_grouping();
        let insp = inspection("I", "General");
        let in_module = problem("m1", "src/a.kt", Some("zmodule"), error(), insp, "a");
        let free = problem("m2", "src/b.kt", None, error(), insp, "b");
        let root = new_root(&options, ExcludeSet::empty());
        let (root, _) = apply(&root, &options, vec![at(&in_module, 1, 0), at(&free, 1, 0)]);
        let inspection_node = descend(
            &root,
            &[
                sev_key(error()),
                PrimaryData::InspectionCategory(Ustr::from("General")),
                PrimaryData::Inspection(Ustr::from("I")),
            ],
        );
        let labels: Vec<String> = inspection_node.children.nodes().map(|n| n.label()).collect();
        assert_eq!(labels, vec!["zmodule", "Problems without module"]);
    }

    #[test]
    fn exclusion_prunes_or_greys_depending_on_show_excluded() {
        let (root, options, _, _, _) = scenario();
        let rules = vec![ExcludeRule::Path("src/b.kt".to_string())];

        // show_excluded = false: the file disappears and counts drop.
        let mut pb = PathBuilder::new();
        let excludes = ExcludeSet::compile(rules.clone()).expect("valid rules");
        let pruned = process_tree_event(
            &root,
            &TreeEvent::ExcludeChanged(excludes),
            &options,
            &mut pb,
        );
        assert_counts_consistent(&pruned);
        assert_eq!(pruned.problems_count, 2);
        let dir = descend(
            &pruned,
            &[
                sev_key(error()),
                PrimaryData::InspectionCategory(Ustr::from("Probable bugs")),
                PrimaryData::Inspection(Ustr::from("InspectionA")),
                PrimaryData::Module(Ustr::from("moduleM")),
                PrimaryData::Directory(Ustr::from("src")),
            ],
        );
        assert!(dir
            .children
            .node_by_primary_data(&PrimaryData::File(Ustr::from("src/b.kt")))
            .is_none());

        // show_excluded = true: the branch stays visible at count zero, and
        // relaxing the rules restores the count without replaying problems.
        let showing = ViewOptions {
            show_excluded: true,
            ..options
        };
        let mut pb = PathBuilder::new();
        let excludes = ExcludeSet::compile(rules).expect("valid rules");
        let greyed = process_tree_event(
            &root,
            &TreeEvent::ExcludeChanged(excludes),
            &showing,
            &mut pb,
        );
        assert_counts_consistent(&greyed);
        assert_eq!(greyed.problems_count, 2);
        let file_b = descend(
            &greyed,
            &[
                sev_key(error()),
                PrimaryData::InspectionCategory(Ustr::from("Probable bugs")),
                PrimaryData::Inspection(Ustr::from("InspectionA")),
                PrimaryData::Module(Ustr::from("moduleM")),
                PrimaryData::Directory(Ustr::from("src")),
                PrimaryData::File(Ustr::from("src/b.kt")),
            ],
        );
        assert!(file_b.excluded);
        assert_eq!(file_b.problems_count, 0);

        let mut pb = PathBuilder::new();
        let relaxed = process_tree_event(
            &greyed,
            &TreeEvent::ExcludeChanged(ExcludeSet::empty()),
            &showing,
            &mut pb,
        );
        assert_eq!(relaxed.problems_count, 3);
        assert_counts_consistent(&relaxed);
    }

    #[test]
    fn flat_file_grouping_skips_directory_nodes() {
        let options = ViewOptions {
            group_by_directory: false,
            ..ViewOptions::default()
        };
        let insp = inspection("I", "General");
        let p = problem("f1", "src/deep/nested/a.kt", None, error(), insp, "x");
        let root = new_root(&options, ExcludeSet::empty());
        let (root, _) = apply(&root, &options, vec![at(&p, 1, 0)]);
        let inspection_node = descend(
            &root,
            &[
                sev_key(error()),
                PrimaryData::InspectionCategory(Ustr::from("General")),
                PrimaryData::Inspection(Ustr::from("I")),
            ],
        );
        assert_eq!(inspection_node.children.layer, Layer::Files);
        let file = descend(
            inspection_node,
            &[PrimaryData::File(Ustr::from("src/deep/nested/a.kt"))],
        );
        assert_eq!(file.label(), "a.kt");
        assert!(file
            .children
            .node_by_primary_data(&PrimaryData::Problem(Ustr::from("f1")))
            .is_some());
    }
}
