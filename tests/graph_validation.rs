// tests/graph_validation.rs

use jobdag::dag::DagGraph;
use jobdag::engine::{ExecutionOptions, Orchestrator};
use jobdag::errors::ValidationError;
use jobdag::exec::HandlerRegistry;
use jobdag_test_utils::builders::{chain, job};
use jobdag_test_utils::handlers::{SCRIPTED, ScriptedHandler};
use jobdag_test_utils::init_tracing;

#[test]
fn accepts_diamond_and_orders_roots_first() {
    let jobs = vec![
        job("d", "t").after("b").after("c").build(),
        job("b", "t").after("a").build(),
        job("c", "t").after("a").build(),
        job("a", "t").build(),
    ];

    let graph = DagGraph::build(&jobs).expect("diamond is a DAG");
    let order: Vec<&str> = graph.topological_order().collect();
    assert_eq!(order.len(), 4);

    let pos = |id: &str| order.iter().position(|x| *x == id).unwrap();
    assert_eq!(order[0], "a");
    assert!(pos("b") < pos("d"));
    assert!(pos("c") < pos("d"));

    let mut downstream = graph.descendants_of("a");
    downstream.sort_unstable();
    assert_eq!(downstream, vec!["b", "c", "d"]);
    assert!(graph.descendants_of("d").is_empty());
}

#[test]
fn rejects_self_dependency_as_cycle() {
    let jobs = vec![job("a", "t").after("a").build()];

    let err = DagGraph::build(&jobs).unwrap_err();
    assert_eq!(err, ValidationError::CycleDetected { jobs: vec!["a".into()] });
}

#[test]
fn rejects_mutual_dependency_and_names_only_cycle_members() {
    // c hangs off the cycle but is not part of it.
    let jobs = vec![
        job("a", "t").after("b").build(),
        job("b", "t").after("a").build(),
        job("c", "t").after("b").build(),
        job("root", "t").build(),
    ];

    match DagGraph::build(&jobs) {
        Err(ValidationError::CycleDetected { jobs }) => {
            assert_eq!(jobs, vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }
}

#[test]
fn rejects_unknown_dependency() {
    let jobs = vec![job("a", "t").build(), job("b", "t").after("ghost").build()];

    assert_eq!(
        DagGraph::build(&jobs).unwrap_err(),
        ValidationError::UnknownDependency {
            job: "b".into(),
            dependency: "ghost".into(),
        }
    );
}

#[test]
fn rejects_duplicate_ids_and_empty_lists() {
    let dup = vec![job("a", "t").build(), job("a", "t").build()];
    assert_eq!(
        DagGraph::build(&dup).unwrap_err(),
        ValidationError::DuplicateId("a".into())
    );

    assert_eq!(DagGraph::build(&[]).unwrap_err(), ValidationError::NoJobs);
}

#[test]
fn repeated_dependency_counts_once() {
    let jobs = vec![job("a", "t").build(), job("b", "t").after("a").after("a").build()];

    let graph = DagGraph::build(&jobs).unwrap();
    let b = graph.index_of("b").unwrap();
    assert_eq!(graph.dependencies_of(b), &[0]);
}

#[tokio::test]
async fn submit_rejects_invalid_graph_without_running_anything() {
    init_tracing();

    let handler = ScriptedHandler::new();
    let registry = HandlerRegistry::new().with(SCRIPTED, handler.clone()).unwrap();
    let orchestrator = Orchestrator::new(registry);

    let mut jobs = chain(&["a", "b", "c"], SCRIPTED);
    jobs[0].depends_on.push("c".into());

    let err = orchestrator
        .submit("cyclic", jobs, ExecutionOptions::default())
        .unwrap_err();
    assert!(matches!(err, ValidationError::CycleDetected { .. }));

    let err = orchestrator
        .submit("zero", chain(&["a"], SCRIPTED), ExecutionOptions::with_parallelism(0))
        .unwrap_err();
    assert_eq!(err, ValidationError::InvalidParallelism(0));

    tokio::task::yield_now().await;
    assert!(handler.calls.is_empty());
    assert!(orchestrator.list_executions().is_empty());
}
