//! kindobs - ephemeral kind cluster with telemetry shipped to OpenObserve
//!
//! ## Commands
//!
//! - `setup`: create the cluster and install the Vector agent and aggregator
//! - `teardown`: uninstall both releases, then delete the namespace and cluster
//!
//! Every input can also come from the `INPUT_*` variable the Actions runner
//! sets for the matching action input.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use kindobs_core::{
    init_tracing, run_setup, run_teardown, CiContext, ExecError, KindobsError, RunConfig,
    SetupInputs, SystemRunner, TeardownPolicy,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

#[derive(Parser)]
#[command(name = "kindobs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ephemeral kind cluster with logs and metrics shipped to OpenObserve", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the cluster and install the Vector agent and aggregator
    Setup(SetupArgs),

    /// Uninstall the releases and delete the namespace and cluster
    Teardown(TeardownArgs),
}

#[derive(Args)]
struct SetupArgs {
    /// kind cluster configuration file
    #[arg(long, env = "INPUT_KIND_CONFIG")]
    kind_config: Option<PathBuf>,

    /// OpenObserve base URL (e.g. https://api.openobserve.ai/api/<org>)
    #[arg(long, env = "INPUT_OPENOBSERVE_ENDPOINT", default_value = "")]
    openobserve_endpoint: String,

    /// OpenObserve ingestion user
    #[arg(long, env = "INPUT_OPENOBSERVE_USERNAME", default_value = "")]
    openobserve_username: String,

    /// OpenObserve ingestion password
    #[arg(
        long,
        env = "INPUT_OPENOBSERVE_PASSWORD",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    openobserve_password: String,

    /// Log stream name (default: repository name)
    #[arg(long, env = "INPUT_OPENOBSERVE_STREAM")]
    openobserve_stream: Option<String>,

    /// Namespace for both releases
    #[arg(long, env = "INPUT_NAMESPACE", default_value = "")]
    namespace: String,

    /// Block until both releases have rolled out
    #[arg(
        long,
        env = "INPUT_WAIT_UNTIL_READY",
        action = ArgAction::Set,
        value_parser = parse_flag,
        default_value = "false",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    wait_until_ready: bool,

    /// Tag metrics with the plain event name instead of the legacy `name}` form
    #[arg(
        long,
        env = "INPUT_FIX_EVENT_NAME",
        action = ArgAction::Set,
        value_parser = parse_flag,
        default_value = "false",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    fix_event_name: bool,
}

impl SetupArgs {
    fn into_inputs(self) -> SetupInputs {
        SetupInputs {
            kind_config: self.kind_config,
            openobserve_endpoint: self.openobserve_endpoint,
            openobserve_username: self.openobserve_username,
            openobserve_password: self.openobserve_password,
            openobserve_stream: self.openobserve_stream,
            namespace: self.namespace,
            wait_until_ready: self.wait_until_ready,
            fix_event_name: self.fix_event_name,
        }
    }
}

#[derive(Args)]
struct TeardownArgs {
    /// Namespace the releases were installed into
    #[arg(long, env = "INPUT_NAMESPACE", default_value = "")]
    namespace: String,

    /// Stop at the first failing step instead of cleaning up as much as possible
    #[arg(
        long,
        env = "INPUT_TEARDOWN_FAIL_FAST",
        action = ArgAction::Set,
        value_parser = parse_flag,
        default_value = "false",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    fail_fast: bool,
}

/// Parse an action-style boolean input. Blank means false.
fn parse_flag(raw: &str) -> std::result::Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "no" | "n" | "off" | "0" => Ok(false),
        "true" | "yes" | "y" | "on" | "1" => Ok(true),
        other => Err(format!("expected a boolean, got {other:?}")),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Setup(args) => cmd_setup(args).await,
        Commands::Teardown(args) => cmd_teardown(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

/// Bring the cluster up
async fn cmd_setup(args: SetupArgs) -> Result<()> {
    let ctx = CiContext::from_env().context("Failed to read CI context")?;
    let config =
        RunConfig::from_inputs(args.into_inputs(), &ctx).context("Invalid setup inputs")?;

    info!(
        namespace = %config.namespace,
        stream = %config.stream,
        endpoint = %config.endpoint,
        wait = config.wait_until_ready,
        "Starting cluster setup"
    );

    let summary = run_setup(&SystemRunner::new(), &config, &ctx)
        .await
        .context("Cluster setup failed")?;

    info!(
        steps = summary.steps.len(),
        duration_ms = summary.duration_ms,
        "Cluster ready"
    );
    Ok(())
}

/// Tear the cluster down
async fn cmd_teardown(args: TeardownArgs) -> Result<()> {
    let namespace = kindobs_core::config::required("namespace", &args.namespace)
        .context("Invalid teardown inputs")?;
    let policy = if args.fail_fast {
        TeardownPolicy::FailFast
    } else {
        TeardownPolicy::BestEffort
    };

    info!(namespace = %namespace, ?policy, "Starting teardown");

    let report = run_teardown(&SystemRunner::new(), &namespace, policy)
        .await
        .context("Teardown failed")?;

    for outcome in &report.outcomes {
        match outcome.failure {
            None => info!(step = %outcome.step, "ok"),
            Some(code) => error!(step = %outcome.step, exit_code = code, "failed"),
        }
    }

    report.into_result().context("Teardown incomplete")?;
    Ok(())
}

/// Exit code for the process: the failing subprocess's code where there is one.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    let code = err
        .chain()
        .find_map(|e| {
            e.downcast_ref::<KindobsError>()
                .map(KindobsError::exit_code)
                .or_else(|| e.downcast_ref::<ExecError>().map(ExecError::exit_code))
        })
        .unwrap_or(1);

    u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
}
