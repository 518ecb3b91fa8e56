//! Vector chart values for the agent and aggregator releases.
//!
//! The documents are built as typed trees and only turned into YAML at the
//! boundary, so user-supplied strings can never change the document shape.

use crate::config::{CiContext, RunConfig};
use crate::Result;
use serde::Serialize;
use std::collections::BTreeMap;

const DATA_DIR: &str = "/vector-data-dir";

/// Bearer token the aggregator ships with until the live one is patched in.
pub const PLACEHOLDER_TOKEN: &str = "PLACEHOLDER";

/// Scrape endpoint the aggregator ships with until the live list is patched in.
pub const PLACEHOLDER_ENDPOINT: &str = "https://placeholder/metrics/cadvisor";

/// Top-level values for the `vector/vector` chart.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartValues {
    pub role: String,
    pub service: Toggle,
    #[serde(rename = "customConfig")]
    pub custom_config: VectorConfig,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Toggle {
    pub enabled: bool,
}

impl Toggle {
    pub const OFF: Toggle = Toggle { enabled: false };
}

/// Vector pipeline configuration (`customConfig`).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VectorConfig {
    pub data_dir: String,
    pub api: Toggle,
    pub sources: BTreeMap<String, Source>,
    pub transforms: BTreeMap<String, Transform>,
    pub sinks: BTreeMap<String, Sink>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    KubernetesLogs,
    PrometheusScrape {
        auth: Auth,
        endpoints: Vec<String>,
        tls: Tls,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    Remap { inputs: Vec<String>, source: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Sink {
    Http {
        inputs: Vec<String>,
        uri: String,
        method: String,
        auth: Auth,
        compression: String,
        encoding: Encoding,
        healthcheck: Toggle,
    },
    PrometheusRemoteWrite {
        inputs: Vec<String>,
        endpoint: String,
        auth: Auth,
        healthcheck: Toggle,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Auth {
    Basic { user: String, password: String },
    Bearer { token: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Encoding {
    pub codec: String,
    pub timestamp_format: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Tls {
    pub verify_certificate: bool,
}

fn basic_auth(config: &RunConfig) -> Auth {
    Auth::Basic {
        user: config.username.clone(),
        password: config.password.clone(),
    }
}

fn single<T>(name: &str, value: T) -> BTreeMap<String, T> {
    BTreeMap::from([(name.to_string(), value)])
}

/// Values for the log-shipping agent.
///
/// Every container log line is tagged with the full CI context and posted
/// to `<endpoint><stream>/_json`.
pub fn agent_values(config: &RunConfig, ctx: &CiContext) -> Result<ChartValues> {
    let context_json = serde_json::to_string(ctx)?;

    Ok(ChartValues {
        role: "Agent".to_string(),
        service: Toggle::OFF,
        custom_config: VectorConfig {
            data_dir: DATA_DIR.to_string(),
            api: Toggle::OFF,
            sources: single("kubernetes_logs", Source::KubernetesLogs),
            transforms: single(
                "kubernetes_logs_with_ghactions_metadata",
                Transform::Remap {
                    inputs: vec!["kubernetes_logs".to_string()],
                    source: format!(".github = {context_json}\n"),
                },
            ),
            sinks: single(
                "openobserve-logs",
                Sink::Http {
                    inputs: vec!["kubernetes_logs_with_ghactions_metadata".to_string()],
                    uri: format!("{}{}/_json", config.endpoint, config.stream),
                    method: "post".to_string(),
                    auth: basic_auth(config),
                    compression: "gzip".to_string(),
                    encoding: Encoding {
                        codec: "json".to_string(),
                        timestamp_format: "rfc3339".to_string(),
                    },
                    healthcheck: Toggle::OFF,
                },
            ),
        },
    })
}

/// Values for the metrics aggregator.
///
/// Scrapes kubelet cAdvisor endpoints and remote-writes them to the backend.
/// The scrape token and endpoints are placeholders until patched.
pub fn aggregator_values(config: &RunConfig, ctx: &CiContext) -> ChartValues {
    ChartValues {
        role: "Stateless-Aggregator".to_string(),
        service: Toggle::OFF,
        custom_config: VectorConfig {
            data_dir: DATA_DIR.to_string(),
            api: Toggle::OFF,
            sources: single(
                "cadvisor",
                Source::PrometheusScrape {
                    auth: Auth::Bearer {
                        token: PLACEHOLDER_TOKEN.to_string(),
                    },
                    endpoints: vec![PLACEHOLDER_ENDPOINT.to_string()],
                    tls: Tls {
                        verify_certificate: false,
                    },
                },
            ),
            transforms: single(
                "cadvisor_with_ghactions_metadata",
                Transform::Remap {
                    inputs: vec!["cadvisor".to_string()],
                    source: metric_tags_program(ctx, config.legacy_event_name_brace),
                },
            ),
            sinks: single(
                "openobserve-metrics",
                Sink::PrometheusRemoteWrite {
                    inputs: vec!["cadvisor_with_ghactions_metadata".to_string()],
                    endpoint: format!("{}prometheus/api/v1/write", config.endpoint),
                    auth: basic_auth(config),
                    healthcheck: Toggle::OFF,
                },
            ),
        },
    }
}

/// VRL program tagging every metric with the workflow run it came from.
fn metric_tags_program(ctx: &CiContext, legacy_event_name_brace: bool) -> String {
    let event_name = if legacy_event_name_brace {
        format!("{}}}", ctx.event_name)
    } else {
        ctx.event_name.clone()
    };

    let tags = [
        ("github_job", vrl_string(&ctx.job)),
        ("github_owner", vrl_string(&ctx.repo.owner)),
        ("github_repo", vrl_string(&ctx.repo.repo)),
        ("github_event_name", vrl_string(&event_name)),
        ("github_run_id", ctx.run_id.to_string()),
        ("github_run_number", ctx.run_number.to_string()),
        ("github_workflow", vrl_string(&ctx.workflow)),
        ("github_sha", vrl_string(&ctx.sha)),
        ("github_ref", vrl_string(&ctx.git_ref)),
    ];

    tags.iter()
        .map(|(tag, value)| format!(".tags.{tag} = {value}\n"))
        .collect()
}

/// Quote `value` as a VRL string literal.
fn vrl_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Serialise chart values as a YAML document.
pub fn to_yaml(values: &ChartValues) -> Result<String> {
    Ok(serde_yaml::to_string(values)?)
}
