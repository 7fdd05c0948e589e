mod operation_tests;
mod planner_tests;

pub(crate) const TEST_SUPERGRAPH: &str = include_str!("../fixtures/test_supergraph.graphql");

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
