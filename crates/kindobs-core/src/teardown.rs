//! Clean shutdown of the Vector releases and the kind cluster.
//!
//! Releases are uninstalled before the cluster is deleted so Vector gets to
//! flush buffered logs and metrics to the backend while the network is still
//! there. The order of the four steps is fixed.

use crate::constants::{AGENT_RELEASE, AGGREGATOR_RELEASE};
use crate::error::KindobsError;
use crate::exec::{CommandRunner, Invocation};
use crate::Result;
use std::fmt;
use tracing::{info, warn};

/// What to do when a teardown step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TeardownPolicy {
    /// Run every step; report the first failure at the end.
    #[default]
    BestEffort,
    /// Stop at the first failing step.
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeardownStep {
    UninstallAgent,
    UninstallAggregator,
    DeleteNamespace,
    DeleteCluster,
}

impl TeardownStep {
    pub const ORDER: [TeardownStep; 4] = [
        TeardownStep::UninstallAgent,
        TeardownStep::UninstallAggregator,
        TeardownStep::DeleteNamespace,
        TeardownStep::DeleteCluster,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TeardownStep::UninstallAgent => "uninstall_agent",
            TeardownStep::UninstallAggregator => "uninstall_aggregator",
            TeardownStep::DeleteNamespace => "delete_namespace",
            TeardownStep::DeleteCluster => "delete_cluster",
        }
    }

    pub fn invocation(&self, namespace: &str) -> Invocation {
        match self {
            TeardownStep::UninstallAgent => {
                Invocation::new("helm", ["uninstall", "-n", namespace, AGENT_RELEASE])
            }
            TeardownStep::UninstallAggregator => {
                Invocation::new("helm", ["uninstall", "-n", namespace, AGGREGATOR_RELEASE])
            }
            TeardownStep::DeleteNamespace => {
                Invocation::new("kubectl", ["delete", "namespace", namespace])
            }
            TeardownStep::DeleteCluster => Invocation::new("kind", ["delete", "cluster"]),
        }
    }
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one teardown step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: TeardownStep,
    /// `None` on success, otherwise the exit code reported for the failure.
    pub failure: Option<i32>,
}

impl StepOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Outcome of every teardown step that was attempted.
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    pub outcomes: Vec<StepOutcome>,
}

impl TeardownReport {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed()).count()
    }

    /// Exit code of the first failing step, if any.
    pub fn first_failure(&self) -> Option<i32> {
        self.outcomes.iter().find_map(|o| o.failure)
    }

    pub fn success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Turn a report with failures into an error.
    pub fn into_result(self) -> Result<TeardownReport> {
        match self.first_failure() {
            Some(exit_code) => Err(KindobsError::Teardown {
                failed: self.failed_count(),
                exit_code,
            }),
            None => Ok(self),
        }
    }
}

/// Uninstall both releases, delete the namespace, delete the cluster.
///
/// Under [`TeardownPolicy::FailFast`] the first failure is returned as is.
/// Under [`TeardownPolicy::BestEffort`] all steps run and the returned report
/// records which failed; use [`TeardownReport::into_result`] to fail on it.
pub async fn run_teardown(
    runner: &dyn CommandRunner,
    namespace: &str,
    policy: TeardownPolicy,
) -> Result<TeardownReport> {
    let mut report = TeardownReport::default();

    for step in TeardownStep::ORDER {
        info!(step = %step, "running teardown step");
        let failure = match runner.run(&step.invocation(namespace)).await {
            Ok(()) => None,
            Err(e) if policy == TeardownPolicy::FailFast => return Err(e.into()),
            Err(e) => {
                warn!(step = %step, error = %e, "teardown step failed, continuing");
                Some(e.exit_code())
            }
        };
        report.outcomes.push(StepOutcome { step, failure });
    }

    info!(failed = report.failed_count(), "teardown complete");
    Ok(report)
}
