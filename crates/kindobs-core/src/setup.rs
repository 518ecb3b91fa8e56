//! Cluster bring-up: kind cluster, Vector releases, RBAC and the live patch.
//!
//! Steps run strictly in order and the first failure aborts the sequence.

use crate::cluster;
use crate::config::{CiContext, RunConfig};
use crate::constants::{
    AGENT_RELEASE, AGGREGATOR_RELEASE, HELM_REPO_NAME, HELM_REPO_URL, ROLLOUT_TIMEOUT,
    VECTOR_CHART,
};
use crate::exec::{CommandRunner, Invocation};
use crate::rbac;
use crate::values;
use crate::Result;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, Level};

/// A step of the bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStep {
    CreateCluster,
    AddRepo,
    UpdateRepo,
    InstallAgent,
    InstallAggregator,
    ApplyRbac,
    PatchAggregator,
    WaitAgent,
    WaitAggregator,
}

impl SetupStep {
    pub fn name(&self) -> &'static str {
        match self {
            SetupStep::CreateCluster => "create_cluster",
            SetupStep::AddRepo => "add_repo",
            SetupStep::UpdateRepo => "update_repo",
            SetupStep::InstallAgent => "install_agent",
            SetupStep::InstallAggregator => "install_aggregator",
            SetupStep::ApplyRbac => "apply_rbac",
            SetupStep::PatchAggregator => "patch_aggregator",
            SetupStep::WaitAgent => "wait_agent",
            SetupStep::WaitAggregator => "wait_aggregator",
        }
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a completed bring-up.
#[derive(Debug, Clone)]
pub struct SetupSummary {
    /// Steps in the order they ran.
    pub steps: Vec<SetupStep>,
    pub duration_ms: u64,
}

/// Documents piped into helm and kubectl during bring-up.
#[derive(Debug, Clone)]
pub struct RenderedDocuments {
    pub agent_values: String,
    pub aggregator_values: String,
    pub rbac_manifest: String,
}

impl RenderedDocuments {
    pub fn render(config: &RunConfig, ctx: &CiContext) -> Result<Self> {
        Ok(RenderedDocuments {
            agent_values: values::to_yaml(&values::agent_values(config, ctx)?)?,
            aggregator_values: values::to_yaml(&values::aggregator_values(config, ctx))?,
            rbac_manifest: rbac::metrics_reader_manifest(&config.namespace)?,
        })
    }
}

/// `kind create cluster [--config <path>]`
pub fn create_cluster(config: &RunConfig) -> Invocation {
    let mut args = vec!["create".to_string(), "cluster".to_string()];
    if let Some(path) = &config.kind_config {
        args.push("--config".to_string());
        args.push(path.to_string_lossy().to_string());
    }
    Invocation::new("kind", args)
}

pub fn add_repo() -> Invocation {
    Invocation::new("helm", ["repo", "add", HELM_REPO_NAME, HELM_REPO_URL])
}

pub fn update_repo() -> Invocation {
    Invocation::new("helm", ["repo", "update", HELM_REPO_NAME])
}

/// Install the agent release, creating the namespace on the way.
pub fn install_agent(namespace: &str, values_yaml: &str) -> Invocation {
    Invocation::new(
        "helm",
        [
            "install",
            "--create-namespace",
            "-n",
            namespace,
            "-f",
            "-",
            AGENT_RELEASE,
            VECTOR_CHART,
        ],
    )
    .with_stdin(values_yaml)
}

pub fn install_aggregator(namespace: &str, values_yaml: &str) -> Invocation {
    Invocation::new(
        "helm",
        [
            "install",
            "-n",
            namespace,
            "-f",
            "-",
            AGGREGATOR_RELEASE,
            VECTOR_CHART,
        ],
    )
    .with_stdin(values_yaml)
}

pub fn apply_manifest(manifest: &str) -> Invocation {
    Invocation::new("kubectl", ["apply", "-f", "-"]).with_stdin(manifest)
}

/// Upgrade the aggregator in place, swapping the placeholders for live values.
pub fn patch_aggregator(namespace: &str, token: &str, endpoints: &str) -> Invocation {
    Invocation::new(
        "helm",
        [
            "upgrade".to_string(),
            "--reuse-values".to_string(),
            "-n".to_string(),
            namespace.to_string(),
            AGGREGATOR_RELEASE.to_string(),
            VECTOR_CHART.to_string(),
            "--set".to_string(),
            format!("customConfig.sources.cadvisor.auth.token={token}"),
            "--set".to_string(),
            format!("customConfig.sources.cadvisor.endpoints={endpoints}"),
        ],
    )
    .redact(token)
}

/// `kubectl rollout status` for `resource` (e.g. `daemonset/vector-agent`).
pub fn rollout_status(namespace: &str, resource: &str) -> Invocation {
    Invocation::new(
        "kubectl",
        [
            "rollout".to_string(),
            "status".to_string(),
            format!("--timeout={ROLLOUT_TIMEOUT}"),
            "-n".to_string(),
            namespace.to_string(),
            resource.to_string(),
        ],
    )
}

async fn step(
    runner: &dyn CommandRunner,
    done: &mut Vec<SetupStep>,
    which: SetupStep,
    invocation: Invocation,
) -> Result<()> {
    info!(step = %which, "running setup step");
    runner.run(&invocation).await?;
    done.push(which);
    Ok(())
}

/// Bring the cluster and both Vector releases up.
pub async fn run_setup(
    runner: &dyn CommandRunner,
    config: &RunConfig,
    ctx: &CiContext,
) -> Result<SetupSummary> {
    let start = Instant::now();

    let docs = RenderedDocuments::render(config, ctx)?;
    if tracing::enabled!(Level::DEBUG) {
        let shown = RenderedDocuments::render(&config.redacted(), ctx)?;
        debug!(values = %shown.agent_values, "agent values");
        debug!(values = %shown.aggregator_values, "aggregator values");
    }

    let ns = config.namespace.as_str();
    let mut done = Vec::new();

    step(runner, &mut done, SetupStep::CreateCluster, create_cluster(config)).await?;
    step(runner, &mut done, SetupStep::AddRepo, add_repo()).await?;
    step(runner, &mut done, SetupStep::UpdateRepo, update_repo()).await?;
    step(
        runner,
        &mut done,
        SetupStep::InstallAgent,
        install_agent(ns, &docs.agent_values),
    )
    .await?;
    // The aggregator scrapes kubelets directly; its token and endpoints can
    // only be known once the service account and nodes exist.
    step(
        runner,
        &mut done,
        SetupStep::InstallAggregator,
        install_aggregator(ns, &docs.aggregator_values),
    )
    .await?;
    step(
        runner,
        &mut done,
        SetupStep::ApplyRbac,
        apply_manifest(&docs.rbac_manifest),
    )
    .await?;

    let token = cluster::aggregator_token(runner, ns).await?;
    let endpoints = cluster::cadvisor_endpoints(runner).await?;
    step(
        runner,
        &mut done,
        SetupStep::PatchAggregator,
        patch_aggregator(ns, &token, &endpoints),
    )
    .await?;

    if config.wait_until_ready {
        step(
            runner,
            &mut done,
            SetupStep::WaitAgent,
            rollout_status(ns, &format!("daemonset/{AGENT_RELEASE}")),
        )
        .await?;
        step(
            runner,
            &mut done,
            SetupStep::WaitAggregator,
            rollout_status(ns, &format!("deployment/{AGGREGATOR_RELEASE}")),
        )
        .await?;
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(steps = done.len(), duration_ms, "setup complete");

    Ok(SetupSummary {
        steps: done,
        duration_ms,
    })
}
