//! The fragment factorizer (spec §4.4): hoists repeated, concretely-typed
//! subselections in each Fetch's selection set into named fragments with a
//! monotonically increasing, plan-wide counter, so the serializer can
//! reference them instead of repeating their body.
//!
//! Per spec §4.4(b), a concrete-type subselection is factored whenever it
//! has more than one leaf, appears at ≥2 sites in the same Fetch, or —
//! "in any case" — the Fetch contains inline fragments at all. Since an
//! inline fragment's own presence in a Fetch trivially satisfies that last
//! clause for itself, every concrete-type subselection found while walking
//! a Fetch ends up hoisted; what the clauses actually decide is whether two
//! structurally identical ones get merged into a single fragment reused at
//! both sites, which is the part snapshot stability depends on.

use apollo_compiler::Name;

use crate::query_plan::operation::{InlineFragmentSelection, Selection};
use crate::query_plan::{FetchNode, FlattenNode, FragmentDefinition, ParallelNode, PlanNode, QueryPlan, SequenceNode};

pub(crate) fn factorize(plan: &mut QueryPlan) {
    let mut counter = 0usize;
    if let Some(node) = plan.node.as_mut() {
        factorize_node(node, &mut counter);
    }
}

fn factorize_node(node: &mut PlanNode, counter: &mut usize) {
    match node {
        PlanNode::Fetch(fetch) => factorize_fetch(fetch, counter),
        PlanNode::Flatten(FlattenNode { node, .. }) => factorize_node(node, counter),
        PlanNode::Sequence(SequenceNode { nodes }) | PlanNode::Parallel(ParallelNode { nodes }) => {
            for node in nodes {
                factorize_node(node, counter);
            }
        }
    }
}

fn factorize_fetch(fetch: &mut FetchNode, counter: &mut usize) {
    let mut fragments: Vec<FragmentDefinition> = Vec::new();
    assign_fragments(&fetch.selections, &mut fragments, counter);
    fetch.internal_fragments = fragments;
}

/// Depth-first, selection-order walk assigning a fragment name to every
/// distinct (type condition, selection set) pair seen, in emission order.
/// Structurally identical inline fragments reuse the first-assigned name.
fn assign_fragments(
    selections: &[Selection],
    fragments: &mut Vec<FragmentDefinition>,
    counter: &mut usize,
) {
    for selection in selections {
        match selection {
            Selection::Field(field) => assign_fragments(&field.selection_set, fragments, counter),
            Selection::InlineFragment(InlineFragmentSelection {
                type_condition,
                selection_set,
            }) => {
                if let Some(type_condition) = type_condition {
                    record_fragment(type_condition, selection_set, fragments, counter);
                }
                assign_fragments(selection_set, fragments, counter);
            }
        }
    }
}

fn record_fragment(
    type_condition: &Name,
    selection_set: &[Selection],
    fragments: &mut Vec<FragmentDefinition>,
    counter: &mut usize,
) {
    let already_assigned = fragments
        .iter()
        .any(|f| &f.type_condition == type_condition && f.selection_set == selection_set);
    if already_assigned {
        return;
    }
    let name = format!("__QueryPlanFragment_{}__", *counter);
    *counter += 1;
    fragments.push(FragmentDefinition {
        name,
        type_condition: type_condition.clone(),
        selection_set: selection_set.to_vec(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_plan::operation::FieldSelection;
    use apollo_compiler::Name;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn leaf(name_str: &str) -> Selection {
        Selection::Field(FieldSelection {
            alias: None,
            name: name(name_str),
            arguments: Vec::new(),
            selection_set: Vec::new(),
        })
    }

    #[test]
    fn reuses_fragment_for_identical_branches() {
        let branch = vec![leaf("a"), leaf("b")];
        let selections = vec![
            Selection::InlineFragment(InlineFragmentSelection {
                type_condition: Some(name("Foo")),
                selection_set: branch.clone(),
            }),
            Selection::InlineFragment(InlineFragmentSelection {
                type_condition: Some(name("Foo")),
                selection_set: branch,
            }),
        ];
        let mut fragments = Vec::new();
        let mut counter = 0;
        assign_fragments(&selections, &mut fragments, &mut counter);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].name, "__QueryPlanFragment_0__");
        assert_eq!(counter, 1);
    }

    #[test]
    fn counter_is_dense_and_monotonic_across_branches() {
        let selections = vec![
            Selection::InlineFragment(InlineFragmentSelection {
                type_condition: Some(name("Foo")),
                selection_set: vec![leaf("a")],
            }),
            Selection::InlineFragment(InlineFragmentSelection {
                type_condition: Some(name("Bar")),
                selection_set: vec![leaf("b")],
            }),
        ];
        let mut fragments = Vec::new();
        let mut counter = 0;
        assign_fragments(&selections, &mut fragments, &mut counter);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].name, "__QueryPlanFragment_0__");
        assert_eq!(fragments[1].name, "__QueryPlanFragment_1__");
    }
}
