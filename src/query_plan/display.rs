//! The plan serializer (spec §4.5): renders a [`QueryPlan`] to the stable,
//! human-readable textual form used for snapshotting and debugging.
//!
//! Grounded in the sibling `apollo-federation` crate's
//! `query_plan::display` module and its shared `display_helpers::State`
//! indentation writer, adapted to this crate's four plan-node variants and
//! its own `Selection`/`FetchNode` types (no `Defer`/`Condition`/
//! `Subscription` support — out of scope per SPEC_FULL.md §4.5).

use std::fmt;

use apollo_compiler::ast;
use apollo_compiler::Node;

use crate::display_helpers::{write_indented_lines, State};
use crate::query_plan::operation::Selection;
use crate::query_plan::{
    FetchNode, FlattenNode, FragmentDefinition, ParallelNode, PlanNode, QueryPlan, SequenceNode,
};

impl QueryPlan {
    fn write_indented(&self, state: &mut State<'_, '_>) -> fmt::Result {
        state.write("QueryPlan {")?;
        if let Some(node) = &self.node {
            state.indent()?;
            node.write_indented(state)?;
            state.dedent()?;
        }
        state.write("}")
    }
}

impl PlanNode {
    fn write_indented(&self, state: &mut State<'_, '_>) -> fmt::Result {
        match self {
            Self::Fetch(node) => node.write_indented(state),
            Self::Flatten(node) => node.write_indented(state),
            Self::Sequence(node) => node.write_indented(state),
            Self::Parallel(node) => node.write_indented(state),
        }
    }
}

impl FetchNode {
    fn write_indented(&self, state: &mut State<'_, '_>) -> fmt::Result {
        state.write(format_args!("Fetch(service: \"{}\") {{", self.service))?;
        state.indent()?;

        if !self.requires.is_empty() {
            state.write(format_args!("{} ", self.parent_type))?;
            write_selection_set(state, &self.requires, &[])?;
            state.write(" =>")?;
            state.new_line()?;
        }
        write_selection_set(state, &self.selections, &self.internal_fragments)?;

        for fragment in &self.internal_fragments {
            state.new_line()?;
            state.new_line()?;
            state.write(format_args!(
                "fragment {} on {} ",
                fragment.name, fragment.type_condition
            ))?;
            write_selection_set(state, &fragment.selection_set, &self.internal_fragments)?;
        }

        state.dedent()?;
        state.write("},")
    }
}

impl FlattenNode {
    fn write_indented(&self, state: &mut State<'_, '_>) -> fmt::Result {
        state.write("Flatten(path: \"")?;
        let mut first = true;
        for element in &self.path {
            if !first {
                state.write(".")?;
            }
            first = false;
            state.write(element)?;
        }
        state.write("\") {")?;
        state.indent()?;
        self.node.write_indented(state)?;
        state.dedent()?;
        state.write("},")
    }
}

impl SequenceNode {
    fn write_indented(&self, state: &mut State<'_, '_>) -> fmt::Result {
        state.write("Sequence {")?;
        write_indented_lines(state, &self.nodes, |state, node| node.write_indented(state))?;
        state.write("},")
    }
}

impl ParallelNode {
    fn write_indented(&self, state: &mut State<'_, '_>) -> fmt::Result {
        state.write("Parallel {")?;
        write_indented_lines(state, &self.nodes, |state, node| node.write_indented(state))?;
        state.write("},")
    }
}

/// Prints a selection set in canonical form (spec §4.5): fields in
/// insertion order, `__typename` first, inline fragments after fields.
/// A fragment already hoisted into `fragments` is referenced by name
/// instead of being inlined again.
fn write_selection_set(
    state: &mut State<'_, '_>,
    selections: &[Selection],
    fragments: &[FragmentDefinition],
) -> fmt::Result {
    state.write("{")?;
    state.indent_no_new_line();

    let is_typename = |s: &&Selection| matches!(s, Selection::Field(f) if f.name == "__typename");
    for selection in selections.iter().filter(is_typename) {
        state.new_line()?;
        write_selection(state, selection, fragments)?;
    }
    for selection in selections
        .iter()
        .filter(|s| matches!(s, Selection::Field(_)) && !is_typename(s))
    {
        state.new_line()?;
        write_selection(state, selection, fragments)?;
    }
    for selection in selections
        .iter()
        .filter(|s| matches!(s, Selection::InlineFragment(_)))
    {
        state.new_line()?;
        write_selection(state, selection, fragments)?;
    }

    state.dedent()?;
    state.write("}")
}

fn write_selection(
    state: &mut State<'_, '_>,
    selection: &Selection,
    fragments: &[FragmentDefinition],
) -> fmt::Result {
    match selection {
        Selection::Field(field) => {
            if let Some(alias) = &field.alias {
                state.write(format_args!("{alias}: "))?;
            }
            state.write(&field.name)?;
            if !field.arguments.is_empty() {
                write_arguments(state, &field.arguments)?;
            }
            if !field.selection_set.is_empty() {
                state.write(" ")?;
                write_selection_set(state, &field.selection_set, fragments)?;
            }
            Ok(())
        }
        Selection::InlineFragment(fragment) => {
            let Some(type_condition) = &fragment.type_condition else {
                return write_selection_set(state, &fragment.selection_set, fragments);
            };
            if let Some(definition) = fragments.iter().find(|f| {
                &f.type_condition == type_condition && f.selection_set == fragment.selection_set
            }) {
                return state.write(format_args!("...{}", definition.name));
            }
            state.write(format_args!("... on {type_condition} "))?;
            write_selection_set(state, &fragment.selection_set, fragments)
        }
    }
}

fn write_arguments(state: &mut State<'_, '_>, arguments: &[Node<ast::Argument>]) -> fmt::Result {
    state.write("(")?;
    let mut first = true;
    for argument in arguments {
        if !first {
            state.write(", ")?;
        }
        first = false;
        state.write(format_args!("{}: {}", argument.name, argument.value))?;
    }
    state.write(")")
}

macro_rules! impl_display {
    ($( $Ty:ty )+) => {
        $(
            impl fmt::Display for $Ty {
                fn fmt(&self, output: &mut fmt::Formatter<'_>) -> fmt::Result {
                    self.write_indented(&mut State::new(output))
                }
            }
        )+
    };
}

impl_display! {
    QueryPlan
    PlanNode
    FetchNode
    FlattenNode
    SequenceNode
    ParallelNode
}
