//! Integration tests for the teardown sequence with RecordingRunner.

use kindobs_core::fakes::RecordingRunner;
use kindobs_core::{run_teardown, KindobsError, TeardownPolicy, TeardownStep};

const EXPECTED: [&str; 4] = [
    "helm uninstall -n vector vector-agent",
    "helm uninstall -n vector vector-aggregator",
    "kubectl delete namespace vector",
    "kind delete cluster",
];

/// Test: clean teardown issues exactly four commands in fixed order
#[tokio::test]
async fn test_teardown_order() {
    let runner = RecordingRunner::new();
    let report = run_teardown(&runner, "vector", TeardownPolicy::BestEffort)
        .await
        .unwrap();

    assert!(report.success());
    assert_eq!(runner.command_lines(), EXPECTED);
    assert_eq!(
        report.outcomes.iter().map(|o| o.step).collect::<Vec<_>>(),
        TeardownStep::ORDER.to_vec()
    );
}

/// Test: best effort keeps going and reports the first failure
#[tokio::test]
async fn test_best_effort_continues_after_failure() {
    let runner = RecordingRunner::new()
        .failing("helm uninstall -n vector vector-agent", 1)
        .failing("kubectl delete namespace", 5);

    let report = run_teardown(&runner, "vector", TeardownPolicy::BestEffort)
        .await
        .unwrap();

    assert_eq!(runner.command_lines(), EXPECTED);
    assert_eq!(report.failed_count(), 2);
    assert_eq!(report.first_failure(), Some(1));
    assert!(report.outcomes[3].passed(), "cluster deletion still ran");

    let err = report.into_result().unwrap_err();
    assert!(matches!(err, KindobsError::Teardown { failed: 2, .. }));
    assert_eq!(err.exit_code(), 1);
}

/// Test: fail fast stops at the first failing step
#[tokio::test]
async fn test_fail_fast_stops() {
    let runner = RecordingRunner::new().failing("helm uninstall -n vector vector-aggregator", 6);

    let err = run_teardown(&runner, "vector", TeardownPolicy::FailFast)
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 6);
    assert_eq!(runner.command_lines(), &EXPECTED[..2]);
}
