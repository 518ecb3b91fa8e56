//! Read-only cluster queries feeding the aggregator patch.

use crate::constants::{AGGREGATOR_RELEASE, TOKEN_DURATION};
use crate::error::KindobsError;
use crate::exec::{CommandRunner, Invocation};
use crate::Result;
use tracing::debug;

/// In-cluster API server address as Vector environment references.
///
/// The braces are backslash-escaped for Helm's `--set` parser, which stores
/// them as `${...}`; Vector resolves the variables when it loads its config.
pub const IN_CLUSTER_API: &str =
    "https://$\\{KUBERNETES_SERVICE_HOST\\}:$\\{KUBERNETES_SERVICE_PORT_HTTPS\\}";

/// kubelet cAdvisor URL for `node`, proxied through the API server.
pub fn cadvisor_endpoint(node: &str) -> String {
    format!("{IN_CLUSTER_API}/api/v1/nodes/{node}/proxy/metrics/cadvisor")
}

/// Helm `--set` list literal with one cAdvisor endpoint per node.
pub fn cadvisor_endpoint_set<S: AsRef<str>>(nodes: &[S]) -> String {
    let endpoints: Vec<String> = nodes
        .iter()
        .map(|node| cadvisor_endpoint(node.as_ref()))
        .collect();
    format!("{{{}}}", endpoints.join(","))
}

/// Names of every node in the cluster.
pub async fn list_nodes(runner: &dyn CommandRunner) -> Result<Vec<String>> {
    let out = runner
        .capture(&Invocation::new(
            "kubectl",
            ["get", "nodes", "-o", "jsonpath={.items[*].metadata.name}"],
        ))
        .await?;

    let nodes: Vec<String> = out.split_whitespace().map(str::to_string).collect();
    if nodes.is_empty() {
        return Err(KindobsError::NoNodes);
    }
    debug!(count = nodes.len(), "listed nodes");
    Ok(nodes)
}

/// Endpoint set for every node currently in the cluster.
pub async fn cadvisor_endpoints(runner: &dyn CommandRunner) -> Result<String> {
    let nodes = list_nodes(runner).await?;
    Ok(cadvisor_endpoint_set(&nodes))
}

/// Short-lived token for the aggregator's service account.
pub async fn aggregator_token(runner: &dyn CommandRunner, namespace: &str) -> Result<String> {
    let token = runner
        .capture(&Invocation::new(
            "kubectl",
            [
                "create".to_string(),
                "token".to_string(),
                "-n".to_string(),
                namespace.to_string(),
                format!("--duration={TOKEN_DURATION}"),
                AGGREGATOR_RELEASE.to_string(),
            ],
        ))
        .await?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingRunner;

    #[test]
    fn test_endpoint_set_for_two_nodes() {
        let set = cadvisor_endpoint_set(&["node-a", "node-b"]);
        assert_eq!(
            set,
            "{https://$\\{KUBERNETES_SERVICE_HOST\\}:$\\{KUBERNETES_SERVICE_PORT_HTTPS\\}/api/v1/nodes/node-a/proxy/metrics/cadvisor,\
             https://$\\{KUBERNETES_SERVICE_HOST\\}:$\\{KUBERNETES_SERVICE_PORT_HTTPS\\}/api/v1/nodes/node-b/proxy/metrics/cadvisor}"
        );
    }

    #[test]
    fn test_endpoint_keeps_unresolved_references() {
        let url = cadvisor_endpoint("kind-control-plane");
        assert!(url.starts_with("https://$\\{KUBERNETES_SERVICE_HOST\\}:"));
        assert!(url.contains("KUBERNETES_SERVICE_PORT_HTTPS"));
        assert!(url.ends_with("/nodes/kind-control-plane/proxy/metrics/cadvisor"));
    }

    #[tokio::test]
    async fn test_list_nodes_splits_jsonpath_output() {
        let runner = RecordingRunner::new().with_output("kubectl get nodes", "node-a node-b\n");
        let nodes = list_nodes(&runner).await.unwrap();
        assert_eq!(nodes, vec!["node-a", "node-b"]);
        assert_eq!(
            runner.command_lines(),
            vec!["kubectl get nodes -o jsonpath={.items[*].metadata.name}"]
        );
    }

    #[tokio::test]
    async fn test_no_nodes_is_an_error() {
        let runner = RecordingRunner::new().with_output("kubectl get nodes", "");
        let err = list_nodes(&runner).await.unwrap_err();
        assert!(matches!(err, KindobsError::NoNodes));
    }

    #[tokio::test]
    async fn test_token_request() {
        let runner = RecordingRunner::new().with_output("kubectl create token", "eyJtoken\n");
        let token = aggregator_token(&runner, "observability").await.unwrap();
        assert_eq!(token, "eyJtoken");
        assert_eq!(
            runner.command_lines(),
            vec!["kubectl create token -n observability --duration=24h vector-aggregator"]
        );
    }
}
