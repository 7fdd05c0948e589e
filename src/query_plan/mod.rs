//! The query plan: the planner's output, a tree of per-service fetches
//! arranged by sequencing and parallelism (spec §3, tagged plan-node
//! variants).

use apollo_compiler::Name;

use crate::query_plan::fetch_dependency_graph::Path;
use crate::query_plan::operation::Selection;

mod assembler;
mod display;
pub mod fetch_dependency_graph;
mod fragments;
pub mod operation;
pub mod query_planner;
mod selection_util;
mod splitter;

/// The planner's output: possibly `None` for an operation with an empty
/// selection set (spec §6).
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    pub node: Option<PlanNode>,
}

/// One of the four plan-node variants the assembler emits (spec §3).
#[derive(Debug, Clone)]
pub enum PlanNode {
    Fetch(FetchNode),
    Flatten(FlattenNode),
    Sequence(SequenceNode),
    Parallel(ParallelNode),
}

/// A single request to `service`, optionally keyed by entity
/// representations (`requires`), that resolves `selections`.
#[derive(Debug, Clone)]
pub struct FetchNode {
    pub service: Name,
    /// The type the representations in `requires` (if any) re-identify, and
    /// under which `selections` is resolved.
    pub parent_type: Name,
    pub variable_usages: Vec<Name>,
    /// Entity representation fields this fetch needs from whatever ran
    /// before it — empty for a root fetch.
    pub requires: Vec<Selection>,
    pub selections: Vec<Selection>,
    /// Fragments the factorizer hoisted out of `selections` (spec §4.4),
    /// local to this fetch.
    pub internal_fragments: Vec<FragmentDefinition>,
}

/// A named fragment factored out of a fetch's selection set, referenced in
/// the serialized form as `...__QueryPlanFragment_N__`.
#[derive(Debug, Clone)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: Name,
    pub selection_set: Vec<Selection>,
}

/// Wraps a child fetch whose output attaches at a nested, possibly
/// array-valued, response path.
#[derive(Debug, Clone)]
pub struct FlattenNode {
    pub path: Path,
    pub node: Box<PlanNode>,
}

/// Children execute left to right, each waiting for its predecessor.
#[derive(Debug, Clone)]
pub struct SequenceNode {
    pub nodes: Vec<PlanNode>,
}

/// Children execute concurrently.
#[derive(Debug, Clone)]
pub struct ParallelNode {
    pub nodes: Vec<PlanNode>,
}
