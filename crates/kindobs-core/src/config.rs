//! Run configuration and CI context.
//!
//! Both are read once at start and never mutated afterwards. The CI context is
//! passed explicitly into the document builders instead of being read from the
//! environment deep inside them.

use crate::constants::REDACTED;
use crate::error::ConfigError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_SERVER_URL: &str = "https://github.com";
const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Repository coordinates (`GITHUB_REPOSITORY` split on `/`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Parse `owner/repo`. Anything without a slash yields empty parts.
    pub fn parse(full_name: &str) -> Self {
        match full_name.split_once('/') {
            Some((owner, repo)) => RepoRef {
                owner: owner.to_string(),
                repo: repo.to_string(),
            },
            None => RepoRef::default(),
        }
    }
}

/// Workflow run metadata supplied by the CI runner.
///
/// Serialises to the same JSON field names the Actions toolkit uses for its
/// context object, which is what ends up attached to every shipped log line.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CiContext {
    pub payload: serde_json::Value,
    pub event_name: String,
    pub sha: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub workflow: String,
    pub action: String,
    pub actor: String,
    pub job: String,
    pub run_attempt: u64,
    pub run_number: u64,
    pub run_id: u64,
    pub api_url: String,
    pub server_url: String,
    pub graphql_url: String,
    #[serde(skip)]
    pub repo: RepoRef,
}

impl CiContext {
    /// Build the context from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build the context from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| var(name).unwrap_or_default();
        let number = |name: &'static str| -> Result<u64, ConfigError> {
            match var(name).filter(|v| !v.trim().is_empty()) {
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber { name, value }),
                None => Ok(0),
            }
        };
        let url = |name: &str, default: &str| {
            var(name)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let payload = match var("GITHUB_EVENT_PATH").filter(|p| !p.is_empty()) {
            Some(path) => load_event_payload(Path::new(&path))?,
            None => empty_payload(),
        };

        Ok(CiContext {
            payload,
            event_name: text("GITHUB_EVENT_NAME"),
            sha: text("GITHUB_SHA"),
            git_ref: text("GITHUB_REF"),
            workflow: text("GITHUB_WORKFLOW"),
            action: text("GITHUB_ACTION"),
            actor: text("GITHUB_ACTOR"),
            job: text("GITHUB_JOB"),
            run_attempt: number("GITHUB_RUN_ATTEMPT")?,
            run_number: number("GITHUB_RUN_NUMBER")?,
            run_id: number("GITHUB_RUN_ID")?,
            api_url: url("GITHUB_API_URL", DEFAULT_API_URL),
            server_url: url("GITHUB_SERVER_URL", DEFAULT_SERVER_URL),
            graphql_url: url("GITHUB_GRAPHQL_URL", DEFAULT_GRAPHQL_URL),
            repo: RepoRef::parse(&text("GITHUB_REPOSITORY")),
        })
    }
}

fn empty_payload() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Read the webhook payload that triggered the run.
///
/// A path that does not exist is tolerated (local runs) and yields `{}`.
fn load_event_payload(path: &Path) -> Result<serde_json::Value, ConfigError> {
    if !path.exists() {
        warn!(path = %path.display(), "event payload file does not exist");
        return Ok(empty_payload());
    }
    let err = |reason: String| ConfigError::EventPayload {
        path: path.display().to_string(),
        reason,
    };
    let raw = std::fs::read(path).map_err(|e| err(e.to_string()))?;
    serde_json::from_slice(&raw).map_err(|e| err(e.to_string()))
}

/// Raw setup inputs as they arrive from the command line / action inputs.
#[derive(Debug, Clone, Default)]
pub struct SetupInputs {
    pub kind_config: Option<PathBuf>,
    pub openobserve_endpoint: String,
    pub openobserve_username: String,
    pub openobserve_password: String,
    pub openobserve_stream: Option<String>,
    pub namespace: String,
    pub wait_until_ready: bool,
    pub fix_event_name: bool,
}

/// Validated, immutable configuration for one setup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Optional kind cluster configuration file.
    pub kind_config: Option<PathBuf>,
    /// Backend base URL, always ending in exactly one `/`.
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Ingestion stream; the repository name unless overridden.
    pub stream: String,
    pub namespace: String,
    pub wait_until_ready: bool,
    /// Emit the event-name tag with the historical trailing `}`.
    pub legacy_event_name_brace: bool,
}

impl RunConfig {
    /// Validate raw inputs and fill defaults from the CI context.
    pub fn from_inputs(inputs: SetupInputs, ctx: &CiContext) -> Result<Self, ConfigError> {
        let endpoint = required("openobserve_endpoint", &inputs.openobserve_endpoint)?;
        let username = required("openobserve_username", &inputs.openobserve_username)?;
        let password = required("openobserve_password", &inputs.openobserve_password)?;
        let namespace = required("namespace", &inputs.namespace)?;

        let stream = inputs
            .openobserve_stream
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| ctx.repo.repo.clone());
        if stream.is_empty() {
            return Err(ConfigError::MissingInput("openobserve_stream"));
        }

        Ok(RunConfig {
            kind_config: inputs
                .kind_config
                .filter(|p| !p.as_os_str().is_empty()),
            endpoint: normalize_endpoint(&endpoint),
            username,
            password,
            stream,
            namespace,
            wait_until_ready: inputs.wait_until_ready,
            legacy_event_name_brace: !inputs.fix_event_name,
        })
    }

    /// Copy with the backend password masked, for anything that gets logged.
    pub fn redacted(&self) -> Self {
        RunConfig {
            password: REDACTED.to_string(),
            ..self.clone()
        }
    }
}

/// Require a non-blank input, returning it trimmed.
pub fn required(name: &'static str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ConfigError::MissingInput(name))
    } else {
        Ok(value.to_string())
    }
}

/// Ensure the endpoint ends with exactly one trailing slash.
pub fn normalize_endpoint(raw: &str) -> String {
    if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn inputs() -> SetupInputs {
        SetupInputs {
            openobserve_endpoint: "https://o2.example.com/api/org".to_string(),
            openobserve_username: "ci@example.com".to_string(),
            openobserve_password: "hunter2".to_string(),
            namespace: "observability".to_string(),
            ..SetupInputs::default()
        }
    }

    fn context() -> CiContext {
        CiContext::from_vars(lookup(&[("GITHUB_REPOSITORY", "octo/widgets")])).unwrap()
    }

    #[test]
    fn test_normalize_endpoint_appends_one_slash() {
        assert_eq!(normalize_endpoint("https://h/api"), "https://h/api/");
    }

    #[test]
    fn test_normalize_endpoint_idempotent() {
        let once = normalize_endpoint("https://h/api");
        assert_eq!(normalize_endpoint(&once), once);
        assert_eq!(normalize_endpoint("https://h/api/"), "https://h/api/");
    }

    #[test]
    fn test_context_from_vars() {
        let ctx = CiContext::from_vars(lookup(&[
            ("GITHUB_REPOSITORY", "octo/widgets"),
            ("GITHUB_EVENT_NAME", "push"),
            ("GITHUB_RUN_ID", "123456"),
            ("GITHUB_RUN_NUMBER", "42"),
            ("GITHUB_JOB", "e2e"),
            ("GITHUB_REF", "refs/heads/main"),
        ]))
        .unwrap();

        assert_eq!(ctx.repo.owner, "octo");
        assert_eq!(ctx.repo.repo, "widgets");
        assert_eq!(ctx.run_id, 123456);
        assert_eq!(ctx.run_number, 42);
        assert_eq!(ctx.run_attempt, 0);
        assert_eq!(ctx.api_url, DEFAULT_API_URL);
        assert_eq!(ctx.payload, serde_json::json!({}));
    }

    #[test]
    fn test_context_rejects_bad_run_id() {
        let err = CiContext::from_vars(lookup(&[("GITHUB_RUN_ID", "abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name: "GITHUB_RUN_ID", .. }));
    }

    #[test]
    fn test_context_json_field_names() {
        let json = serde_json::to_value(context()).unwrap();
        assert!(json.get("eventName").is_some());
        assert!(json.get("ref").is_some());
        assert!(json.get("runId").is_some());
        assert!(json.get("repo").is_none());
    }

    #[test]
    fn test_event_payload_loaded_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"after":"abc123","forced":false}"#).unwrap();

        let path_str = path.to_string_lossy().to_string();
        let ctx = CiContext::from_vars(lookup(&[("GITHUB_EVENT_PATH", path_str.as_str())]))
            .unwrap();
        assert_eq!(ctx.payload["after"], "abc123");
    }

    #[test]
    fn test_missing_event_payload_file_is_empty() {
        let ctx = CiContext::from_vars(lookup(&[("GITHUB_EVENT_PATH", "/nonexistent/event.json")]))
            .unwrap();
        assert_eq!(ctx.payload, serde_json::json!({}));
    }

    #[test]
    fn test_malformed_event_payload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, "not json").unwrap();

        let path_str = path.to_string_lossy().to_string();
        let err = CiContext::from_vars(lookup(&[("GITHUB_EVENT_PATH", path_str.as_str())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EventPayload { .. }));
    }

    #[test]
    fn test_stream_defaults_to_repo_name() {
        let config = RunConfig::from_inputs(inputs(), &context()).unwrap();
        assert_eq!(config.stream, "widgets");
        assert_eq!(config.endpoint, "https://o2.example.com/api/org/");
        assert!(config.legacy_event_name_brace);
        assert!(!config.wait_until_ready);
    }

    #[test]
    fn test_explicit_stream_wins() {
        let mut raw = inputs();
        raw.openobserve_stream = Some("k8s_logs".to_string());
        let config = RunConfig::from_inputs(raw, &context()).unwrap();
        assert_eq!(config.stream, "k8s_logs");
    }

    #[test]
    fn test_blank_stream_falls_back_to_repo() {
        let mut raw = inputs();
        raw.openobserve_stream = Some("   ".to_string());
        let config = RunConfig::from_inputs(raw, &context()).unwrap();
        assert_eq!(config.stream, "widgets");
    }

    #[test]
    fn test_required_inputs_must_be_non_empty() {
        let mut raw = inputs();
        raw.namespace = "  ".to_string();
        let err = RunConfig::from_inputs(raw, &context()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingInput("namespace")));

        let mut raw = inputs();
        raw.openobserve_password = String::new();
        let err = RunConfig::from_inputs(raw, &context()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingInput("openobserve_password")));
    }

    #[test]
    fn test_empty_kind_config_is_none() {
        let mut raw = inputs();
        raw.kind_config = Some(PathBuf::new());
        raw.fix_event_name = true;
        let config = RunConfig::from_inputs(raw, &context()).unwrap();
        assert!(config.kind_config.is_none());
        assert!(!config.legacy_event_name_brace);
    }

    #[test]
    fn test_redacted_masks_password_only() {
        let config = RunConfig::from_inputs(inputs(), &context()).unwrap();
        let shown = config.redacted();
        assert_eq!(shown.password, "***");
        assert_eq!(shown.username, config.username);
        assert_eq!(shown.endpoint, config.endpoint);
        assert_eq!(config.password, "hunter2");
    }
}
