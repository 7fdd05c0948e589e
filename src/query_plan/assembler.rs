//! The plan-tree assembler (spec §4.3): turns the fetch dependency graph
//! built by the splitter into a tree of [`PlanNode`]s, sequencing a group
//! after whichever group(s) produced the representations it depends on and
//! parallelizing independent siblings.

use std::collections::HashSet;

use crate::query_plan::fetch_dependency_graph::{FetchDependencyGraph, GroupId};
use crate::query_plan::operation::OperationKind;
use crate::query_plan::selection_util::collect_variable_usages;
use crate::query_plan::{FetchNode, FlattenNode, ParallelNode, PlanNode, QueryPlan, SequenceNode};

pub(crate) fn assemble(graph: &FetchDependencyGraph, kind: OperationKind) -> QueryPlan {
    let mut visited = HashSet::new();
    let roots: Vec<PlanNode> = graph
        .roots
        .iter()
        .filter_map(|&id| assemble_subtree(graph, id, &mut visited))
        .collect();

    let node = if roots.is_empty() {
        None
    } else if kind == OperationKind::Mutation {
        // Spec §3/§4.2.5/§8 property 6: mutation root fetches are always
        // sequenced in source order, dependencies or not.
        Some(make_sequence(roots))
    } else {
        Some(make_parallel(roots))
    };

    QueryPlan { node }
}

/// Builds the subtree rooted at `group_id`, or `None` if it was already
/// emitted via another dependency edge. Multi-parent dependent groups are a
/// known edge case this simple tree walk doesn't re-converge on (see
/// DESIGN.md); guarding with `visited` at least keeps the plan from
/// duplicating a Fetch outright.
fn assemble_subtree(
    graph: &FetchDependencyGraph,
    group_id: GroupId,
    visited: &mut HashSet<GroupId>,
) -> Option<PlanNode> {
    if !visited.insert(group_id) {
        return None;
    }
    let group = graph.group(group_id);

    let variable_usages = collect_variable_usages(&group.selections);
    let fetch = FetchNode {
        service: group.service.clone(),
        parent_type: group.parent_type.clone(),
        variable_usages,
        requires: group.requires.clone(),
        selections: group.selections.clone(),
        internal_fragments: Vec::new(),
    };
    let base = if group.path.is_empty() {
        PlanNode::Fetch(fetch)
    } else {
        PlanNode::Flatten(FlattenNode {
            path: group.path.clone(),
            node: Box::new(PlanNode::Fetch(fetch)),
        })
    };

    if group.dependents.is_empty() {
        return Some(base);
    }

    let dependents: Vec<PlanNode> = group
        .dependents
        .iter()
        .filter_map(|&id| assemble_subtree(graph, id, visited))
        .collect();
    if dependents.is_empty() {
        return Some(base);
    }

    // A single dependent chain (the common case) should read as one flat
    // `Sequence { A, B, C }` rather than nesting a `Sequence` inside a
    // `Sequence` one level per hop — splice it in directly. A genuine
    // fan-out of independent dependents still gets wrapped in `Parallel`.
    let mut nodes = vec![base];
    match make_parallel(dependents) {
        PlanNode::Sequence(SequenceNode { nodes: inner }) => nodes.extend(inner),
        other => nodes.push(other),
    }
    Some(make_sequence(nodes))
}

/// `Sequence` with a single child collapses to that child (spec §4.3).
fn make_sequence(mut nodes: Vec<PlanNode>) -> PlanNode {
    if nodes.len() == 1 {
        nodes.pop().expect("len checked above")
    } else {
        PlanNode::Sequence(SequenceNode { nodes })
    }
}

/// `Parallel` with a single child collapses to that child (spec §4.3).
fn make_parallel(mut nodes: Vec<PlanNode>) -> PlanNode {
    if nodes.len() == 1 {
        nodes.pop().expect("len checked above")
    } else {
        PlanNode::Parallel(ParallelNode { nodes })
    }
}
