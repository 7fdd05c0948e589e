//! Small free functions shared by the splitter and assembler: merging
//! selections by response key / type condition, building the synthetic
//! `__typename`/key-field selections the splitter inserts, and collecting
//! variable usages for a finished Fetch's selection set (spec §4.3,
//! "Variable usages ... collected and re-emitted on its `Fetch` node").

use apollo_compiler::{ast, Name};
use indexmap::IndexSet;

use crate::query_plan::operation::{FieldSelection, InlineFragmentSelection, Selection};

pub(crate) const TYPENAME: &str = "__typename";

pub(crate) fn is_builtin_meta_field(name: &Name) -> bool {
    matches!(name.as_str(), "__typename" | "__schema" | "__type")
}

pub(crate) fn typename_name() -> Name {
    Name::new(TYPENAME).expect("\"__typename\" is a valid GraphQL name")
}

/// A childless scalar selection for `name`, used to represent `__typename`
/// and key/`@requires` fields in a group's `selections` or `requires`.
pub(crate) fn scalar_selection(name: &Name) -> Selection {
    Selection::Field(FieldSelection {
        alias: None,
        name: name.clone(),
        arguments: Vec::new(),
        selection_set: Vec::new(),
    })
}

pub(crate) fn typename_selection() -> Selection {
    scalar_selection(&typename_name())
}

/// Merges `addition` into `target`, combining with an existing field (by
/// response key) or inline fragment (by type condition) rather than
/// duplicating it — the splitter's merge rule applied at selection-tree
/// granularity (spec §4.2.3).
pub(crate) fn merge_into(target: &mut Vec<Selection>, addition: Selection) {
    match addition {
        Selection::Field(field) => {
            let existing = target.iter_mut().find_map(|s| match s {
                Selection::Field(existing) if existing.response_key() == field.response_key() => {
                    Some(existing)
                }
                _ => None,
            });
            match existing {
                Some(existing) => {
                    for child in field.selection_set {
                        merge_into(&mut existing.selection_set, child);
                    }
                }
                None => target.push(Selection::Field(field)),
            }
        }
        Selection::InlineFragment(fragment) => {
            let existing = target.iter_mut().find_map(|s| match s {
                Selection::InlineFragment(existing)
                    if existing.type_condition == fragment.type_condition =>
                {
                    Some(existing)
                }
                _ => None,
            });
            match existing {
                Some(existing) => {
                    for child in fragment.selection_set {
                        merge_into(&mut existing.selection_set, child);
                    }
                }
                None => target.push(Selection::InlineFragment(fragment)),
            }
        }
    }
}

pub(crate) fn merge_all(target: &mut Vec<Selection>, additions: Vec<Selection>) {
    for addition in additions {
        merge_into(target, addition);
    }
}

/// Flattens `selections` (which may contain inline fragments inherited from
/// an interface selection, or a bare `None` type condition from a spread
/// that targeted this exact type) into a plain field list applicable to the
/// concrete `parent_type`.
pub(crate) fn flatten_fields_for_concrete_type(
    schema: &crate::schema::ComposedSchema,
    selections: &[Selection],
    parent_type: &Name,
    out: &mut Vec<FieldSelection>,
) {
    for selection in selections {
        match selection {
            Selection::Field(field) => out.push(field.clone()),
            Selection::InlineFragment(fragment) => {
                let applies = match &fragment.type_condition {
                    None => true,
                    Some(condition) => {
                        condition == parent_type
                            || schema.implements_interface(parent_type, condition)
                    }
                };
                if applies {
                    flatten_fields_for_concrete_type(
                        schema,
                        &fragment.selection_set,
                        parent_type,
                        out,
                    );
                }
            }
        }
    }
}

/// The portion of `selections` that applies to abstract-type member
/// `member_type`: every bare field (interface/union selections only ever
/// select fields the interface itself declares, so these apply to every
/// member) plus the contents of any inline fragment conditioned on exactly
/// this member.
pub(crate) fn selections_for_member(selections: &[Selection], member_type: &Name) -> Vec<Selection> {
    let mut out = Vec::new();
    for selection in selections {
        match selection {
            Selection::Field(_) => out.push(selection.clone()),
            Selection::InlineFragment(InlineFragmentSelection {
                type_condition,
                selection_set,
            }) => match type_condition {
                None => out.extend(selection_set.clone()),
                Some(condition) if condition == member_type => out.extend(selection_set.clone()),
                Some(_) => {}
            },
        }
    }
    out
}

/// Collects every variable referenced by `selections`, in first-use,
/// depth-first order — simpler and less error-prone than tracking variable
/// usage incrementally while splitting (spec §9 Design Notes).
pub(crate) fn collect_variable_usages(selections: &[Selection]) -> Vec<Name> {
    let mut seen = IndexSet::new();
    collect_variable_usages_into(selections, &mut seen);
    seen.into_iter().collect()
}

fn collect_variable_usages_into(selections: &[Selection], seen: &mut IndexSet<Name>) {
    for selection in selections {
        match selection {
            Selection::Field(field) => {
                for argument in &field.arguments {
                    collect_variables_in_value(&argument.value, seen);
                }
                collect_variable_usages_into(&field.selection_set, seen);
            }
            Selection::InlineFragment(fragment) => {
                collect_variable_usages_into(&fragment.selection_set, seen);
            }
        }
    }
}

fn collect_variables_in_value(value: &ast::Value, seen: &mut IndexSet<Name>) {
    match value {
        ast::Value::Variable(name) => {
            seen.insert(name.clone());
        }
        ast::Value::List(values) => {
            for value in values {
                collect_variables_in_value(value, seen);
            }
        }
        ast::Value::Object(fields) => {
            for (_, value) in fields {
                collect_variables_in_value(value, seen);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_compiler::Node;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn field(n: &str, selection_set: Vec<Selection>) -> Selection {
        Selection::Field(FieldSelection {
            alias: None,
            name: name(n),
            arguments: Vec::new(),
            selection_set,
        })
    }

    #[test]
    fn merge_into_combines_fields_sharing_a_response_key() {
        let mut target = vec![field("me", vec![field("name", vec![])])];
        merge_into(&mut target, field("me", vec![field("birthDate", vec![])]));
        assert_eq!(target.len(), 1);
        assert_eq!(target[0].selection_set().len(), 2);
    }

    #[test]
    fn merge_into_does_not_duplicate_an_already_merged_typename() {
        let mut target = vec![typename_selection()];
        merge_into(&mut target, typename_selection());
        assert_eq!(target.len(), 1);
    }

    #[test]
    fn flatten_fields_applies_matching_inline_fragments_only() {
        let schema = crate::schema::ComposedSchema::parse(include_str!(
            "../../tests/fixtures/test_supergraph.graphql"
        ))
        .expect("valid supergraph");
        let selections = vec![
            field("__typename", vec![]),
            Selection::InlineFragment(crate::query_plan::operation::InlineFragmentSelection {
                type_condition: Some(name("Book")),
                selection_set: vec![field("isbn", vec![])],
            }),
            Selection::InlineFragment(crate::query_plan::operation::InlineFragmentSelection {
                type_condition: Some(name("Furniture")),
                selection_set: vec![field("name", vec![])],
            }),
        ];
        let mut out = Vec::new();
        flatten_fields_for_concrete_type(&schema, &selections, &name("Book"), &mut out);
        let names: Vec<_> = out.iter().map(|f| f.name.to_string()).collect();
        assert_eq!(names, vec!["__typename", "isbn"]);
    }

    #[test]
    fn collect_variable_usages_is_deduplicated_and_ordered_by_first_use() {
        let arg = |var: &str| {
            Node::new(ast::Argument {
                name: name("x"),
                value: Node::new(ast::Value::Variable(name(var))),
            })
        };
        let selections = vec![
            Selection::Field(FieldSelection {
                alias: None,
                name: name("a"),
                arguments: vec![arg("foo"), arg("bar")],
                selection_set: vec![],
            }),
            Selection::Field(FieldSelection {
                alias: None,
                name: name("b"),
                arguments: vec![arg("foo")],
                selection_set: vec![],
            }),
        ];
        let usages = collect_variable_usages(&selections);
        assert_eq!(usages, vec![name("foo"), name("bar")]);
    }
}
