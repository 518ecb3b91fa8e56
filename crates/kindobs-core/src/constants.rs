//! Names shared between setup and teardown.

/// Helm repository alias for the Vector charts.
pub const HELM_REPO_NAME: &str = "vector";

/// Helm repository URL for the Vector charts.
pub const HELM_REPO_URL: &str = "https://helm.vector.dev";

/// Chart installed for both releases.
pub const VECTOR_CHART: &str = "vector/vector";

/// Per-node log shipping release (a DaemonSet).
pub const AGENT_RELEASE: &str = "vector-agent";

/// Cluster-level metrics scraping release (a Deployment).
/// Its service account carries the same name.
pub const AGGREGATOR_RELEASE: &str = "vector-aggregator";

/// ClusterRole and ClusterRoleBinding granting kubelet metrics access.
pub const METRICS_READER: &str = "metrics-reader";

/// Lifetime of the aggregator's scrape token.
pub const TOKEN_DURATION: &str = "24h";

/// Per-release rollout wait.
pub const ROLLOUT_TIMEOUT: &str = "5m";

/// Stand-in for secrets in echoed commands and logged documents.
pub const REDACTED: &str = "***";
