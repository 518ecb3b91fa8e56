//! kindobs-core: throwaway kind clusters that ship their telemetry
//!
//! Brings up a kind cluster inside a CI job, installs a Vector agent (container
//! logs) and a Vector aggregator (kubelet cAdvisor metrics) with Helm, and
//! points both at an OpenObserve backend. Teardown removes everything again,
//! releases first so buffered data reaches the backend.
//!
//! ## Key Components
//!
//! - `CommandRunner`: capability for invoking `kind`, `helm` and `kubectl`
//! - `RunConfig` / `CiContext`: validated inputs and workflow metadata
//! - `values` / `rbac`: typed documents serialised to YAML
//! - `run_setup` / `run_teardown`: the two linear sequences

pub mod cluster;
pub mod config;
pub mod constants;
mod error;
pub mod exec;
pub mod fakes;
pub mod rbac;
pub mod setup;
pub mod teardown;
pub mod telemetry;
pub mod values;

pub use config::{normalize_endpoint, CiContext, RepoRef, RunConfig, SetupInputs};
pub use error::{ConfigError, ExecError, KindobsError};
pub use exec::{CommandRunner, Invocation, SystemRunner};
pub use setup::{run_setup, SetupStep, SetupSummary};
pub use teardown::{run_teardown, StepOutcome, TeardownPolicy, TeardownReport, TeardownStep};
pub use telemetry::init_tracing;

/// Result type for kindobs operations
pub type Result<T> = std::result::Result<T, KindobsError>;
