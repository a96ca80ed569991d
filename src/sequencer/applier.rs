use crate::models::KubectlConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// What the control tool reported for one manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ApplyOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(1),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Human-readable failure text: stderr, then stdout, then the exit code
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exited with code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Applies a single manifest to the cluster.
///
/// A returned `Err` means the tool could not be invoked at all; a tool that
/// ran and failed is an `Ok` output with `success == false`.
#[async_trait]
pub trait Applier: Send + Sync {
    async fn apply(&self, file: &Path) -> Result<ApplyOutput>;

    /// Name used in log lines
    fn name(&self) -> &str;
}

/// Runs `kubectl apply -f <file>` (or the configured equivalent)
#[derive(Debug, Clone)]
pub struct KubectlApplier {
    command: String,
    apply_args: Vec<String>,
    context: Option<String>,
    namespace: Option<String>,
}

impl KubectlApplier {
    pub fn new(config: &KubectlConfig) -> Self {
        Self {
            command: config.command.clone(),
            apply_args: config.apply_args.clone(),
            context: config.context.clone(),
            namespace: config.namespace.clone(),
        }
    }

    /// Full argument list for one manifest.
    ///
    /// Global flags go first so they cannot be swallowed by `-f`.
    pub fn build_args(&self, file: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(self.apply_args.len() + 5);
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        if let Some(namespace) = &self.namespace {
            args.push("--namespace".to_string());
            args.push(namespace.clone());
        }
        args.extend(self.apply_args.iter().cloned());
        args.push(file.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl Applier for KubectlApplier {
    async fn apply(&self, file: &Path) -> Result<ApplyOutput> {
        let args = self.build_args(file);
        tracing::debug!(command = %self.command, ?args, "Invoking control tool");

        // kill_on_drop lets a timed-out apply take the child down with it
        let output = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| {
                format!(
                    "Command '{}' not found. Please ensure it is installed and in your PATH.",
                    self.command
                )
            })?;

        Ok(ApplyOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn name(&self) -> &str {
        &self.command
    }
}
