//! In-memory fakes for the command runner (testing only)
//!
//! `RecordingRunner` records every invocation instead of spawning it, answers
//! captures from a scripted table and fails invocations on request.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::exec::{CommandRunner, Invocation};

/// Command runner that records invocations.
///
/// Outputs and failures are keyed by command-line prefix: the first entry
/// whose prefix matches `program arg1 arg2 ...` applies.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    outputs: Mutex<Vec<(String, String)>>,
    failures: Mutex<Vec<(String, i32)>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer captures whose command line starts with `prefix` with `stdout`.
    pub fn with_output(self, prefix: &str, stdout: &str) -> Self {
        self.outputs
            .lock()
            .unwrap()
            .push((prefix.to_string(), stdout.to_string()));
        self
    }

    /// Fail invocations whose command line starts with `prefix` with `code`.
    pub fn failing(self, prefix: &str, code: i32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .push((prefix.to_string(), code));
        self
    }

    /// Every invocation seen so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Unmasked command lines of every invocation, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::command_line).collect()
    }

    fn record(&self, invocation: &Invocation) -> Result<(), ExecError> {
        self.calls.lock().unwrap().push(invocation.clone());

        let line = invocation.command_line();
        let failures = self.failures.lock().unwrap();
        match failures.iter().find(|(prefix, _)| line.starts_with(prefix.as_str())) {
            Some((_, code)) => Err(ExecError::NonZeroExit {
                program: invocation.program.clone(),
                code: *code,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<(), ExecError> {
        self.record(invocation)
    }

    async fn capture(&self, invocation: &Invocation) -> Result<String, ExecError> {
        self.record(invocation)?;

        let line = invocation.command_line();
        let outputs = self.outputs.lock().unwrap();
        Ok(outputs
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, stdout)| stdout.trim().to_string())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_in_order() {
        let runner = RecordingRunner::new();
        runner.run(&Invocation::new("kind", ["create", "cluster"])).await.unwrap();
        runner.run(&Invocation::new("helm", ["repo", "update"])).await.unwrap();

        assert_eq!(
            runner.command_lines(),
            vec!["kind create cluster", "helm repo update"]
        );
    }

    #[tokio::test]
    async fn test_scripted_output_and_failure() {
        let runner = RecordingRunner::new()
            .with_output("kubectl get nodes", " node-a \n")
            .failing("helm install", 2);

        let out = runner
            .capture(&Invocation::new("kubectl", ["get", "nodes"]))
            .await
            .unwrap();
        assert_eq!(out, "node-a");

        let err = runner
            .run(&Invocation::new("helm", ["install", "x"]))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(runner.calls().len(), 2);
    }
}
