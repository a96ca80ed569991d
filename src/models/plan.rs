use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A command polled after a phase until it exits successfully
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessCheck {
    /// Program followed by its arguments
    pub command: Vec<String>,

    /// Give up after this long
    #[serde(default = "default_readiness_timeout")]
    pub timeout_secs: u64,

    /// First backoff between polls, doubled after each failed poll
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

/// Floor for the poll backoff; a zero backoff would poll in a tight loop
pub const MIN_BACKOFF_MS: u64 = 100;

fn default_readiness_timeout() -> u64 {
    120
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    10_000
}

impl ReadinessCheck {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            timeout_secs: default_readiness_timeout(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Never below [`MIN_BACKOFF_MS`]
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms.max(MIN_BACKOFF_MS))
    }

    pub fn max_backoff(&self) -> Duration {
        self.initial_backoff()
            .max(Duration::from_millis(self.max_backoff_ms))
    }

    /// Display form of the command line
    pub fn display(&self) -> String {
        self.command.join(" ")
    }
}

/// Where a phase came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Listed in the configuration
    Explicit,
    /// Every manifest no explicit phase claimed
    Remainder,
}

/// An ordered group of manifests followed by a stabilization step.
///
/// Phases are immutable once built; the plan builder is the only producer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase {
    name: String,
    kind: PhaseKind,
    files: Vec<PathBuf>,
    post_delay_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    readiness: Option<ReadinessCheck>,
}

impl Phase {
    pub fn explicit(
        name: impl Into<String>,
        files: Vec<PathBuf>,
        post_delay_secs: u64,
        readiness: Option<ReadinessCheck>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PhaseKind::Explicit,
            files,
            post_delay_secs,
            readiness,
        }
    }

    /// Remainder phases never wait afterwards
    pub fn remainder(name: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: PhaseKind::Remainder,
            files,
            post_delay_secs: 0,
            readiness: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn post_delay_secs(&self) -> u64 {
        self.post_delay_secs
    }

    pub fn post_delay(&self) -> Duration {
        Duration::from_secs(self.post_delay_secs)
    }

    pub fn readiness(&self) -> Option<&ReadinessCheck> {
        self.readiness.as_ref()
    }
}

/// The full ordered deployment plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    directory: PathBuf,
    phases: Vec<Phase>,
}

impl Plan {
    pub fn new(directory: impl Into<PathBuf>, phases: Vec<Phase>) -> Self {
        Self {
            directory: directory.into(),
            phases,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// All files in execution order
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.phases
            .iter()
            .flat_map(|phase| phase.files.iter().map(PathBuf::as_path))
    }

    pub fn file_count(&self) -> usize {
        self.phases.iter().map(|phase| phase.files.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remainder_phase_has_no_wait() {
        let phase = Phase::remainder("Other Services", vec![PathBuf::from("a.yaml")]);
        assert_eq!(phase.kind(), PhaseKind::Remainder);
        assert_eq!(phase.post_delay(), Duration::ZERO);
        assert!(phase.readiness().is_none());
    }

    #[test]
    fn test_plan_files_are_flattened_in_order() {
        let plan = Plan::new(
            "K8S",
            vec![
                Phase::explicit("db", vec!["db.yaml".into(), "db-svc.yaml".into()], 10, None),
                Phase::remainder("rest", vec!["api.yaml".into()]),
            ],
        );

        let files: Vec<_> = plan.files().map(|p| p.to_string_lossy().into_owned()).collect();
        assert_eq!(files, vec!["db.yaml", "db-svc.yaml", "api.yaml"]);
        assert_eq!(plan.file_count(), 3);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_readiness_backoff_bounds() {
        let mut check = ReadinessCheck::new(["kubectl", "rollout", "status", "deploy/api"]);
        assert_eq!(check.display(), "kubectl rollout status deploy/api");
        assert_eq!(check.initial_backoff(), Duration::from_millis(500));

        // A cap below the initial backoff is raised to it
        check.max_backoff_ms = 100;
        assert_eq!(check.max_backoff(), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_backoff_is_raised_to_floor() {
        let mut check = ReadinessCheck::new(["true"]);
        check.initial_backoff_ms = 0;
        check.max_backoff_ms = 0;
        assert_eq!(check.initial_backoff(), Duration::from_millis(MIN_BACKOFF_MS));
        assert_eq!(check.max_backoff(), Duration::from_millis(MIN_BACKOFF_MS));
    }
}
