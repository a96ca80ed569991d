use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of a single manifest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    /// Control tool reported success
    Applied,
    /// Control tool reported failure
    Failed,
    /// File could not be read before invocation
    Unreadable,
    /// Per-file timeout elapsed
    TimedOut,
    /// Not attempted because an earlier phase failed to stabilize
    Skipped,
    /// Not attempted because the run was cancelled
    Cancelled,
}

impl ApplyStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ApplyStatus::Applied => "applied",
            ApplyStatus::Failed => "failed",
            ApplyStatus::Unreadable => "unreadable",
            ApplyStatus::TimedOut => "timed out",
            ApplyStatus::Skipped => "skipped",
            ApplyStatus::Cancelled => "cancelled",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ApplyStatus::Applied => "✅",
            ApplyStatus::Failed | ApplyStatus::Unreadable => "❌",
            ApplyStatus::TimedOut => "⌛",
            ApplyStatus::Skipped => "⏭️",
            ApplyStatus::Cancelled => "🛑",
        }
    }
}

/// Result of applying one manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplyResult {
    pub file: PathBuf,
    pub success: bool,
    pub status: ApplyStatus,
    /// Diagnostic text on anything but success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_output: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl ApplyResult {
    fn new(
        file: impl Into<PathBuf>,
        status: ApplyStatus,
        error_output: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            file: file.into(),
            success: status == ApplyStatus::Applied,
            status,
            error_output,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn applied(file: impl Into<PathBuf>, duration: Duration) -> Self {
        Self::new(file, ApplyStatus::Applied, None, duration)
    }

    pub fn failed(file: impl Into<PathBuf>, error_output: impl Into<String>, duration: Duration) -> Self {
        Self::new(file, ApplyStatus::Failed, Some(error_output.into()), duration)
    }

    pub fn unreadable(file: impl Into<PathBuf>, error_output: impl Into<String>) -> Self {
        Self::new(file, ApplyStatus::Unreadable, Some(error_output.into()), Duration::ZERO)
    }

    pub fn timed_out(file: impl Into<PathBuf>, error_output: impl Into<String>, duration: Duration) -> Self {
        Self::new(file, ApplyStatus::TimedOut, Some(error_output.into()), duration)
    }

    pub fn skipped(file: impl Into<PathBuf>) -> Self {
        Self::new(file, ApplyStatus::Skipped, None, Duration::ZERO)
    }

    pub fn cancelled(file: impl Into<PathBuf>) -> Self {
        Self::new(file, ApplyStatus::Cancelled, None, Duration::ZERO)
    }
}

/// How a phase ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    StabilizationTimedOut,
    Cancelled,
    Skipped,
}

/// Per-phase summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseReport {
    pub name: String,
    pub status: PhaseStatus,
    pub results: Vec<ApplyResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stabilization_error: Option<String>,
}

impl PhaseReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Structured outcome of a whole run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phases: Vec<PhaseReport>,
}

impl RunReport {
    /// Every result in plan order
    pub fn results(&self) -> impl Iterator<Item = &ApplyResult> {
        self.phases.iter().flat_map(|phase| phase.results.iter())
    }

    pub fn into_results(self) -> Vec<ApplyResult> {
        self.phases
            .into_iter()
            .flat_map(|phase| phase.results)
            .collect()
    }

    pub fn total(&self) -> usize {
        self.phases.iter().map(|phase| phase.results.len()).sum()
    }

    pub fn succeeded(&self) -> usize {
        self.phases.iter().map(PhaseReport::succeeded).sum()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn cancelled(&self) -> bool {
        self.phases
            .iter()
            .any(|phase| phase.status == PhaseStatus::Cancelled)
    }

    /// True if a phase stopped the run before the plan was exhausted
    pub fn aborted(&self) -> bool {
        self.phases
            .iter()
            .any(|phase| phase.status != PhaseStatus::Completed)
    }

    pub fn all_succeeded(&self) -> bool {
        !self.aborted() && self.failed() == 0
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Process exit code for this run.
    ///
    /// `best_effort` tolerates per-file failures but never an aborted run.
    pub fn exit_code(&self, best_effort: bool) -> i32 {
        if self.cancelled() {
            130
        } else if self.aborted() {
            1
        } else if self.failed() > 0 && !best_effort {
            1
        } else {
            0
        }
    }
}
