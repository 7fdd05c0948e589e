//! Builds the normalized [`OperationContext`] consumed by the splitter: picks
//! the operation to plan, inlines every fragment spread, and merges
//! duplicate selections that share a response key.
//!
//! Adapted from the normalization approach used elsewhere in the federation
//! codebase (`merge_selections`/`flatten_selections` over a response-key
//! keyed selection map), generalized here to also resolve the operation by
//! name and retain alias information needed for response-path bookkeeping.

use apollo_compiler::validation::Valid;
use apollo_compiler::{ast, executable, Name, Node};
use indexmap::IndexMap;

use crate::error::{FederationError, SingleFederationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl From<ast::OperationType> for OperationKind {
    fn from(ty: ast::OperationType) -> Self {
        match ty {
            ast::OperationType::Query => Self::Query,
            ast::OperationType::Mutation => Self::Mutation,
            ast::OperationType::Subscription => Self::Subscription,
        }
    }
}

impl From<OperationKind> for ast::OperationType {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Query => Self::Query,
            OperationKind::Mutation => Self::Mutation,
            OperationKind::Subscription => Self::Subscription,
        }
    }
}

/// A selection within a normalized selection set: either a field (with its
/// own sub-selection) or an inline fragment. Named-fragment spreads never
/// appear here — they're inlined during normalization (spec §4.1).
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(FieldSelection),
    InlineFragment(InlineFragmentSelection),
}

impl Selection {
    pub fn selection_set(&self) -> &[Selection] {
        match self {
            Selection::Field(field) => &field.selection_set,
            Selection::InlineFragment(fragment) => &fragment.selection_set,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSelection {
    pub alias: Option<Name>,
    pub name: Name,
    pub arguments: Vec<Node<ast::Argument>>,
    pub selection_set: Vec<Selection>,
}

impl FieldSelection {
    /// The key this field's result is keyed by in the response: its alias if
    /// present, otherwise its name.
    pub fn response_key(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragmentSelection {
    pub type_condition: Option<Name>,
    pub selection_set: Vec<Selection>,
}

/// The resolved operation, with all fragment spreads inlined and duplicate
/// selections merged.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub kind: OperationKind,
    pub root_type: Name,
    pub variable_definitions: Vec<Node<ast::VariableDefinition>>,
    pub selection_set: Vec<Selection>,
}

/// Resolves `operation_name` (or the sole operation, if unambiguous) within
/// `document` and normalizes its selection set against `root_type`.
pub fn build_operation_context(
    root_type: Name,
    document: &Valid<executable::ExecutableDocument>,
    operation_name: Option<&str>,
) -> Result<OperationContext, FederationError> {
    let operation = resolve_operation(document, operation_name)?;
    let selection_set = normalize_selections(&operation.selection_set.selections, document);
    Ok(OperationContext {
        kind: operation.operation_type.into(),
        root_type,
        variable_definitions: operation.variables.clone(),
        selection_set,
    })
}

fn resolve_operation<'doc>(
    document: &'doc Valid<executable::ExecutableDocument>,
    operation_name: Option<&str>,
) -> Result<&'doc Node<executable::Operation>, FederationError> {
    if let Some(name) = operation_name {
        return document
            .operations
            .iter()
            .find(|(op_name, _)| op_name.as_ref().map(|n| n.as_str()) == Some(name))
            .map(|(_, op)| op)
            .ok_or_else(|| {
                SingleFederationError::NoMatchingOperation {
                    name: name.to_string(),
                }
                .into()
            });
    }
    let mut operations = document.operations.iter();
    match (operations.next(), operations.next()) {
        (Some((_, op)), None) => Ok(op),
        (Some(_), Some(_)) => Err(SingleFederationError::AmbiguousOperation.into()),
        (None, _) => Err(SingleFederationError::NoMatchingOperation {
            name: String::new(),
        }
        .into()),
    }
}

/// Inlines fragment spreads and merges selections that share a response key
/// (for fields) or a type condition (for inline fragments), recursively.
fn normalize_selections(
    selections: &[executable::Selection],
    document: &executable::ExecutableDocument,
) -> Vec<Selection> {
    let mut fields: IndexMap<Name, FieldSelection> = IndexMap::new();
    let mut fragments: IndexMap<Option<Name>, InlineFragmentSelection> = IndexMap::new();
    let mut fragment_order: Vec<Option<Name>> = Vec::new();
    let mut field_order: Vec<Name> = Vec::new();

    collect_selections(
        selections,
        document,
        &mut fields,
        &mut field_order,
        &mut fragments,
        &mut fragment_order,
    );

    let mut out = Vec::with_capacity(field_order.len() + fragment_order.len());
    for key in field_order {
        if let Some(field) = fields.shift_remove(&key) {
            out.push(Selection::Field(field));
        }
    }
    for key in fragment_order {
        if let Some(fragment) = fragments.shift_remove(&key) {
            out.push(Selection::InlineFragment(fragment));
        }
    }
    out
}

fn collect_selections(
    selections: &[executable::Selection],
    document: &executable::ExecutableDocument,
    fields: &mut IndexMap<Name, FieldSelection>,
    field_order: &mut Vec<Name>,
    fragments: &mut IndexMap<Option<Name>, InlineFragmentSelection>,
    fragment_order: &mut Vec<Option<Name>>,
) {
    for selection in selections {
        match selection {
            executable::Selection::Field(field) => {
                let response_key = field.alias.clone().unwrap_or_else(|| field.name.clone());
                let nested = normalize_selections(&field.selection_set.selections, document);
                match fields.get_mut(&response_key) {
                    Some(existing) => existing.selection_set.extend(nested),
                    None => {
                        field_order.push(response_key.clone());
                        fields.insert(
                            response_key,
                            FieldSelection {
                                alias: field.alias.clone(),
                                name: field.name.clone(),
                                arguments: field.arguments.clone(),
                                selection_set: nested,
                            },
                        );
                    }
                }
            }
            executable::Selection::InlineFragment(inline) => {
                let type_condition = inline.type_condition.clone();
                let nested = normalize_selections(&inline.selection_set.selections, document);
                match fragments.get_mut(&type_condition) {
                    Some(existing) => existing.selection_set.extend(nested),
                    None => {
                        fragment_order.push(type_condition.clone());
                        fragments.insert(
                            type_condition.clone(),
                            InlineFragmentSelection {
                                type_condition,
                                selection_set: nested,
                            },
                        );
                    }
                }
            }
            executable::Selection::FragmentSpread(spread) => {
                let Some(fragment) = document.fragments.get(&spread.fragment_name) else {
                    continue;
                };
                let type_condition = Some(fragment.selection_set.ty.clone());
                let nested = normalize_selections(&fragment.selection_set.selections, document);
                match fragments.get_mut(&type_condition) {
                    Some(existing) => existing.selection_set.extend(nested),
                    None => {
                        fragment_order.push(type_condition.clone());
                        fragments.insert(
                            type_condition.clone(),
                            InlineFragmentSelection {
                                type_condition,
                                selection_set: nested,
                            },
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_compiler::Schema;

    fn parse(schema_text: &str, op_text: &str) -> (Valid<Schema>, Valid<executable::ExecutableDocument>) {
        let schema = Schema::parse_and_validate(schema_text, "schema.graphql").unwrap();
        let doc =
            executable::ExecutableDocument::parse_and_validate(&schema, op_text, "op.graphql")
                .unwrap();
        (schema, doc)
    }

    const SCHEMA: &str = r#"
        type Query { me: User }
        type User { id: ID! name: String birthDate: String }
    "#;

    #[test]
    fn inlines_fragment_spreads() {
        let (_schema, doc) = parse(
            SCHEMA,
            r#"
            query { me { ...F } }
            fragment F on User { name birthDate }
            "#,
        );
        let ctx =
            build_operation_context(Name::new("Query").unwrap(), &doc, None).expect("resolves");
        assert_eq!(ctx.selection_set.len(), 1);
        let Selection::Field(me) = &ctx.selection_set[0] else {
            panic!("expected field");
        };
        assert_eq!(me.name.as_str(), "me");
        assert_eq!(me.selection_set.len(), 2);
    }

    #[test]
    fn merges_duplicate_fields() {
        let (_schema, doc) = parse(
            SCHEMA,
            r#"
            query { me { name } me { birthDate } }
            "#,
        );
        let ctx =
            build_operation_context(Name::new("Query").unwrap(), &doc, None).expect("resolves");
        assert_eq!(ctx.selection_set.len(), 1);
        let Selection::Field(me) = &ctx.selection_set[0] else {
            panic!("expected field");
        };
        assert_eq!(me.selection_set.len(), 2);
    }

    #[test]
    fn ambiguous_operation_without_name() {
        let (_schema, doc) = parse(
            SCHEMA,
            r#"
            query A { me { name } }
            query B { me { birthDate } }
            "#,
        );
        let err = build_operation_context(Name::new("Query").unwrap(), &doc, None).unwrap_err();
        assert!(matches!(
            err,
            FederationError::Single(SingleFederationError::AmbiguousOperation)
        ));
    }
}
