//! The selection-set splitter (spec §4.2) — the hard part of the planner.
//!
//! A recursive function over `(parent type, selection set, current group)`
//! that classifies every field into either the group currently being built
//! or a dependent group for another service, introducing entity fetches and
//! `@requires`/`@provides` hops at exactly the boundaries the composed
//! schema's federation metadata calls for.

use apollo_compiler::{ast, Name};
use indexmap::IndexSet;

use crate::error::{FederationError, SingleFederationError};
use crate::query_plan::fetch_dependency_graph::{FetchDependencyGraph, GroupId, Path, PathElement};
use crate::query_plan::operation::{FieldSelection, Selection};
use crate::query_plan::selection_util::{
    flatten_fields_for_concrete_type, is_builtin_meta_field, merge_all, merge_into,
    scalar_selection, selections_for_member, typename_selection,
};
use crate::query_plan::operation::OperationContext;
use crate::schema::{is_list_type, ComposedSchema};

/// Splits a whole operation into a [`FetchDependencyGraph`]: one root group
/// per distinct service among the root selection's fields, each split
/// recursively per spec §4.2.
pub(crate) fn split_operation(
    schema: &ComposedSchema,
    operation: &OperationContext,
) -> Result<FetchDependencyGraph, FederationError> {
    let mut graph = FetchDependencyGraph::new();
    let mut fields = Vec::new();
    flatten_fields_for_concrete_type(
        schema,
        &operation.selection_set,
        &operation.root_type,
        &mut fields,
    );

    for field in &fields {
        let owner = schema
            .metadata()
            .field_metadata(&operation.root_type, &field.name)
            .and_then(|m| m.owner())
            .cloned()
            .ok_or_else(|| SingleFederationError::SchemaValidation {
                message: format!(
                    "no subgraph resolves root field \"{}.{}\"",
                    operation.root_type, field.name
                ),
            })?;
        let root_group = graph.root_group(owner, operation.root_type.clone());
        let mut local = Vec::new();
        classify_field(
            schema,
            &mut graph,
            root_group,
            &operation.root_type,
            &Path::new(),
            field,
            &IndexSet::new(),
            &mut local,
        )?;
        let group = graph.group_mut(root_group);
        merge_all(&mut group.selections, local);
    }

    graph.check_acyclic()?;
    Ok(graph)
}

/// Splits `selections` (already resolved against `parent_type`) across
/// services, starting in `group_id`, attaching any entity hops at `path`.
/// Returns the selections that stay in `group_id` itself; everything routed
/// to a dependent group is written directly into that group via `graph`.
pub(crate) fn classify_selection_set(
    schema: &ComposedSchema,
    graph: &mut FetchDependencyGraph,
    group_id: GroupId,
    parent_type: &Name,
    path: &Path,
    selections: &[Selection],
    provided_override: &IndexSet<Name>,
) -> Result<Vec<Selection>, FederationError> {
    if selections.is_empty() {
        return Ok(Vec::new());
    }

    if schema.is_abstract_type(parent_type) {
        let mut out = Vec::new();
        for member in schema.possible_types(parent_type) {
            let member_selections = selections_for_member(selections, &member);
            if member_selections.is_empty() {
                continue;
            }
            let branch = classify_selection_set(
                schema,
                graph,
                group_id,
                &member,
                path,
                &member_selections,
                provided_override,
            )?;
            if !branch.is_empty() {
                merge_into(
                    &mut out,
                    Selection::InlineFragment(crate::query_plan::operation::InlineFragmentSelection {
                        type_condition: Some(member),
                        selection_set: branch,
                    }),
                );
            }
        }
        if !out.is_empty() {
            // A selection under an abstract type always needs its own
            // `__typename` sibling so the router can tell which inline
            // fragment actually applies to each returned object.
            merge_into(&mut out, typename_selection());
        }
        return Ok(out);
    }

    let mut fields = Vec::new();
    flatten_fields_for_concrete_type(schema, selections, parent_type, &mut fields);

    let mut out = Vec::new();
    for field in &fields {
        classify_field(
            schema,
            graph,
            group_id,
            parent_type,
            path,
            field,
            provided_override,
            &mut out,
        )?;
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn classify_field(
    schema: &ComposedSchema,
    graph: &mut FetchDependencyGraph,
    group_id: GroupId,
    parent_type: &Name,
    path: &Path,
    field: &FieldSelection,
    provided_override: &IndexSet<Name>,
    out: &mut Vec<Selection>,
) -> Result<(), FederationError> {
    // Rule 1: built-in meta fields are answerable by any service and never
    // need a sub-selection split.
    if is_builtin_meta_field(&field.name) {
        merge_into(out, Selection::Field(field.clone()));
        return Ok(());
    }

    let field_metadata = schema
        .metadata()
        .field_metadata(parent_type, &field.name)
        .ok_or_else(|| {
            SingleFederationError::SchemaValidation {
                message: format!(
                    "no owner is declared for field \"{parent_type}.{}\"",
                    field.name
                ),
            }
        })?;
    let owner = field_metadata.owner().cloned().ok_or_else(|| {
        FederationError::from(SingleFederationError::SchemaValidation {
            message: format!(
                "field \"{parent_type}.{}\" has no subgraph able to resolve it",
                field.name
            ),
        })
    })?;
    let ownership = field_metadata
        .ownership(&owner)
        .expect("the field's owner always has an ownership entry for it");
    let requires_fields = ownership.requires.clone();
    let provides_fields = ownership.provides.clone();

    let current_service = graph.group(group_id).service.clone();
    let forced_local = provided_override.contains(&field.name);

    // Rule 4: whatever this field `@requires`, make sure it's selected
    // somewhere — on the current group if its owner can supply it inline,
    // or (recursively) via its own hop otherwise. Remember which group(s)
    // ended up hosting remotely-resolved requirements: if any did, this
    // field itself cannot be answered until they've run, even when its own
    // owner matches the current service.
    let mut required_by: IndexSet<GroupId> = IndexSet::new();
    if !requires_fields.is_empty() {
        for name in &requires_fields {
            let required_owner = schema
                .metadata()
                .field_metadata(parent_type, name)
                .and_then(|m| m.owner())
                .cloned();
            // Classify the required field exactly as if it had been selected
            // directly at this level: if its own owner can supply it here,
            // it lands in `out` alongside whatever else this level selects;
            // otherwise it's routed to its own dependent group (and any
            // `__typename`/key representation that hop needs is merged into
            // `out` by that recursive call, not dropped here).
            let synthetic = FieldSelection {
                alias: None,
                name: name.clone(),
                arguments: Vec::new(),
                selection_set: Vec::new(),
            };
            classify_field(
                schema,
                graph,
                group_id,
                parent_type,
                path,
                &synthetic,
                provided_override,
                out,
            )?;
            if let Some(required_owner) = &required_owner {
                if required_owner != &current_service {
                    if let Some(id) = graph.find_group(required_owner, parent_type, path) {
                        required_by.insert(id);
                    }
                }
            }
        }
    }

    let owner_matches = forced_local || owner == current_service;
    let hop_needed = !owner_matches || !required_by.is_empty();

    if !hop_needed {
        let nested = classify_nested(
            schema,
            graph,
            group_id,
            field,
            parent_type,
            path,
            &owner,
            &provides_fields,
        )?;
        merge_into(
            out,
            Selection::Field(FieldSelection {
                alias: field.alias.clone(),
                name: field.name.clone(),
                arguments: field.arguments.clone(),
                selection_set: nested,
            }),
        );
        return Ok(());
    }

    if !schema.metadata().is_entity(parent_type) {
        return Err(SingleFederationError::SchemaValidation {
            message: format!(
                "type \"{parent_type}\" has no key and cannot be split across services \
                 to resolve field \"{}\"",
                field.name
            ),
        }
        .into());
    }

    let dep_group = if owner != current_service {
        // Rule 3: owner mismatch. The current group supplies the key.
        let key = schema
            .metadata()
            .select_key(parent_type, &owner, &current_service)
            .ok_or_else(|| SingleFederationError::UnsatisfiableKey {
                type_name: parent_type.to_string(),
                service_name: current_service.to_string(),
            })?;
        // The representation this hop sends is a sibling of whatever else is
        // selected on `parent_type` at this nesting level, not a sibling of
        // the root field that got us here — so it belongs in `out`.
        merge_into(out, typename_selection());
        for field_name in &key {
            merge_into(out, scalar_selection(field_name));
        }
        let dep_group = graph.dependent_group(group_id, owner.clone(), parent_type.clone(), path.clone());
        for extra_parent in &required_by {
            graph.dependent_group(*extra_parent, owner.clone(), parent_type.clone(), path.clone());
        }
        {
            let dependent = graph.group_mut(dep_group);
            merge_into(&mut dependent.requires, typename_selection());
            for field_name in &key {
                merge_into(&mut dependent.requires, scalar_selection(field_name));
            }
            for field_name in &requires_fields {
                merge_into(&mut dependent.requires, scalar_selection(field_name));
            }
        }
        dep_group
    } else {
        // Same-service hop forced purely by an unmet `@requires` (rule 4):
        // the owner can resolve this field, but only once the fields it
        // requires have come back from wherever they were actually fetched.
        let mut dep_group = None;
        for parent in &required_by {
            dep_group = Some(graph.dependent_group(
                *parent,
                owner.clone(),
                parent_type.clone(),
                path.clone(),
            ));
        }
        let dep_group = dep_group.ok_or_else(|| {
            FederationError::internal(format!(
                "field \"{parent_type}.{}\" requires fields that were not routed to any group",
                field.name
            ))
        })?;
        let supplier_service = required_by
            .iter()
            .next()
            .map(|id| graph.group(*id).service.clone())
            .expect("required_by is non-empty");
        let key = schema
            .metadata()
            .select_key(parent_type, &owner, &supplier_service)
            .ok_or_else(|| SingleFederationError::UnsatisfiableKey {
                type_name: parent_type.to_string(),
                service_name: owner.to_string(),
            })?;
        {
            let dependent = graph.group_mut(dep_group);
            merge_into(&mut dependent.requires, typename_selection());
            for field_name in &key {
                merge_into(&mut dependent.requires, scalar_selection(field_name));
            }
            for field_name in &requires_fields {
                merge_into(&mut dependent.requires, scalar_selection(field_name));
            }
        }
        dep_group
    };

    let nested = classify_nested(
        schema,
        graph,
        dep_group,
        field,
        parent_type,
        path,
        &owner,
        &provides_fields,
    )?;
    let dependent = graph.group_mut(dep_group);
    merge_into(
        &mut dependent.selections,
        Selection::Field(FieldSelection {
            alias: field.alias.clone(),
            name: field.name.clone(),
            arguments: field.arguments.clone(),
            selection_set: nested,
        }),
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn classify_nested(
    schema: &ComposedSchema,
    graph: &mut FetchDependencyGraph,
    group_id: GroupId,
    field: &FieldSelection,
    parent_type: &Name,
    path: &Path,
    owner: &Name,
    provides_fields: &[Name],
) -> Result<Vec<Selection>, FederationError> {
    if field.selection_set.is_empty() {
        return Ok(Vec::new());
    }
    let declared_type = schema.field_type(parent_type, &field.name).ok_or_else(|| {
        FederationError::from(SingleFederationError::SchemaValidation {
            message: format!("field \"{parent_type}.{}\" has no declared type", field.name),
        })
    })?;
    let return_type = declared_type.inner_named_type().clone();
    let nested_path = extend_path(path, field, &declared_type);
    let provided: IndexSet<Name> = provides_fields.iter().cloned().collect();
    let _ = owner; // kept for symmetry/debuggability at call sites
    classify_selection_set(
        schema,
        graph,
        group_id,
        &return_type,
        &nested_path,
        &field.selection_set,
        &provided,
    )
}

fn extend_path(base: &Path, field: &FieldSelection, declared_type: &ast::Type) -> Path {
    let mut path = base.clone();
    path.push(PathElement::Field(field.response_key().clone()));
    if is_list_type(declared_type) {
        path.push(PathElement::ListItem);
    }
    path
}
