use apollo_compiler::executable::ExecutableDocument;
use apollo_compiler::Name;
use apollo_federation::query_plan::operation::{build_operation_context, OperationKind, Selection};
use apollo_federation::ComposedSchema;

use super::TEST_SUPERGRAPH;

fn root_type(schema: &ComposedSchema) -> Name {
    schema
        .root_operation(apollo_compiler::ast::OperationType::Query)
        .cloned()
        .expect("supergraph declares a query root")
}

#[test]
fn resolves_sole_operation_without_a_name() {
    super::init_logging();
    let schema = ComposedSchema::parse(TEST_SUPERGRAPH).expect("valid supergraph");
    let document =
        ExecutableDocument::parse_and_validate(schema.schema(), "{ me { name } }", "op.graphql")
            .expect("valid operation");

    let ctx = build_operation_context(root_type(&schema), &document, None).expect("resolves");
    assert_eq!(ctx.kind, OperationKind::Query);
    assert_eq!(ctx.selection_set.len(), 1);
}

#[test]
fn inlines_fragment_spreads_and_keeps_type_condition() {
    super::init_logging();
    let schema = ComposedSchema::parse(TEST_SUPERGRAPH).expect("valid supergraph");
    let document = ExecutableDocument::parse_and_validate(
        schema.schema(),
        r#"
        query {
            topProducts { ...ProductFields }
        }
        fragment ProductFields on Product {
            name
            ... on Book { isbn }
        }
        "#,
        "op.graphql",
    )
    .expect("valid operation");

    let ctx = build_operation_context(root_type(&schema), &document, None).expect("resolves");
    let Selection::Field(top_products) = &ctx.selection_set[0] else {
        panic!("expected a field selection");
    };
    assert_eq!(top_products.name.as_str(), "topProducts");
    // The named fragment spread is gone; its contents were inlined directly,
    // including the nested inline fragment it carried.
    assert!(top_products
        .selection_set
        .iter()
        .any(|s| matches!(s, Selection::Field(f) if f.name == "name")));
    let book = Name::new("Book").unwrap();
    assert!(top_products
        .selection_set
        .iter()
        .any(|s| matches!(s, Selection::InlineFragment(f) if f.type_condition.as_ref() == Some(&book))));
}

#[test]
fn ambiguous_operation_without_name_is_an_error() {
    super::init_logging();
    let schema = ComposedSchema::parse(TEST_SUPERGRAPH).expect("valid supergraph");
    let document = ExecutableDocument::parse_and_validate(
        schema.schema(),
        "query A { me { name } } query B { topProducts { name } }",
        "op.graphql",
    )
    .expect("valid operation");

    let err = build_operation_context(root_type(&schema), &document, None).unwrap_err();
    assert!(err.to_string().contains("multiple operations"));
}

#[test]
fn named_operation_resolves_among_several() {
    super::init_logging();
    let schema = ComposedSchema::parse(TEST_SUPERGRAPH).expect("valid supergraph");
    let document = ExecutableDocument::parse_and_validate(
        schema.schema(),
        "query A { me { name } } query B { topProducts { name } }",
        "op.graphql",
    )
    .expect("valid operation");

    let ctx =
        build_operation_context(root_type(&schema), &document, Some("B")).expect("resolves");
    let Selection::Field(field) = &ctx.selection_set[0] else {
        panic!("expected a field selection");
    };
    assert_eq!(field.name.as_str(), "topProducts");
}
