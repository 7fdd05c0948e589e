//! End-to-end scenarios S1-S6 (spec §8) run against `TEST_SUPERGRAPH`,
//! asserting on structural properties of the stable serialized form (§4.5)
//! rather than byte-for-byte snapshots, since each assertion here needs to
//! hold regardless of incidental formatting choices.

use apollo_compiler::executable::ExecutableDocument;
use apollo_federation::{ComposedSchema, QueryPlanner, QueryPlannerConfig};

use super::TEST_SUPERGRAPH;

fn plan(operation: &str) -> String {
    super::init_logging();
    let schema = ComposedSchema::parse(TEST_SUPERGRAPH).expect("valid supergraph");
    let document = ExecutableDocument::parse_and_validate(schema.schema(), operation, "op.graphql")
        .expect("valid operation");
    let planner = QueryPlanner::new(schema, QueryPlannerConfig::default());
    let query_plan = planner
        .build_query_plan(&document, None)
        .expect("plans successfully");
    query_plan.node.expect("non-empty plan").to_string()
}

/// S1: a selection entirely owned by one service stays a single `Fetch`.
#[test]
fn s1_single_service_query() {
    let rendered = plan("{ me { name } }");
    assert!(rendered.starts_with("Fetch(service: \"accounts\")"));
    assert!(rendered.contains("name"));
    assert!(!rendered.contains("Sequence"));
    assert!(!rendered.contains("Flatten"));
}

/// S2: an interface field split across `product` and `books`, with one
/// member (`Furniture`) resolvable locally and the other (`Book`) requiring
/// two hops — an entity fetch to `books` for `title`/`year`, then back to
/// `product` (since `Book.name` needs those fields via `@requires`).
#[test]
fn s2_interface_split_across_services() {
    let rendered = plan("{ me { name } topProducts { name } }");
    assert!(rendered.starts_with("Parallel {"));
    assert!(rendered.contains("Fetch(service: \"accounts\")"));
    assert!(rendered.contains("Fetch(service: \"product\")"));
    assert!(rendered.contains("Fetch(service: \"books\")"));
    assert!(rendered.contains("... on Book"));
    assert!(rendered.contains("... on Furniture"));
    assert!(rendered.matches("Flatten(path: \"topProducts.@\")").count() >= 2);
}

/// S3: two entity-extension fields on the same dependent type collapse into
/// one hop, not two (merge rule, spec §4.2.3 / property 4).
#[test]
fn s3_sibling_extension_fields_merge_into_one_hop() {
    let rendered = plan("{ me { reviews { body } numberOfReviews } }");
    assert!(rendered.starts_with("Sequence {"));
    assert_eq!(rendered.matches("Fetch(service: \"reviews\")").count(), 1);
    assert!(rendered.contains("reviews"));
    assert!(rendered.contains("numberOfReviews"));
}

/// S4: a field nested under an array-valued field requires a `Flatten` at
/// the accumulated path, including the nested field's own response key.
#[test]
fn s4_nested_array_field_flattens_at_full_path() {
    let rendered = plan("{ topReviews { author { name } } }");
    assert!(rendered.starts_with("Sequence {"));
    assert!(rendered.contains("Flatten(path: \"topReviews.@.author\")"));
    assert!(rendered.contains("Fetch(service: \"reviews\")"));
    assert!(rendered.contains("Fetch(service: \"accounts\")"));
}

/// S5: `@requires` on a field forces the supplying field into the prior
/// fetch even though it isn't itself selected by the operation.
#[test]
fn s5_requires_pulls_sibling_field_into_prior_fetch() {
    let rendered = plan("{ topCars { retailPrice } }");
    assert!(rendered.starts_with("Sequence {"));
    let product_fetch_start = rendered
        .find("Fetch(service: \"product\")")
        .expect("product fetch present");
    let reviews_fetch_start = rendered
        .find("Fetch(service: \"reviews\")")
        .expect("reviews fetch present");
    assert!(product_fetch_start < reviews_fetch_start);
    let product_fetch = &rendered[product_fetch_start..reviews_fetch_start];
    assert!(product_fetch.contains("price"));
    assert!(product_fetch.contains("__typename"));
    let reviews_fetch = &rendered[reviews_fetch_start..];
    assert!(reviews_fetch.contains("retailPrice"));
    assert!(reviews_fetch.contains("price"));
}

/// S6: mutation root fields are always sequenced in source order, even when
/// they target independent services with no data dependency between them —
/// unlike query roots, which would run such siblings under `Parallel`.
#[test]
fn s6_mutation_roots_always_sequence() {
    let rendered = plan(
        r#"mutation {
            a: updatePrice(carId: "1", price: 10) { id }
            b: addReview(bookIsbn: "1", body: "hi") { body }
        }"#,
    );
    assert!(rendered.starts_with("Sequence {"));
    assert!(rendered.contains("Fetch(service: \"product\")"));
    assert!(rendered.contains("Fetch(service: \"reviews\")"));
}

/// A single-service query never pays the mutation-ordering cost.
#[test]
fn single_service_query_has_no_sequence() {
    let rendered = plan("{ me { name } }");
    assert!(!rendered.contains("Sequence"));
}
