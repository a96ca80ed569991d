use super::applier::{Applier, KubectlApplier};
use super::events::{EventSink, NullSink, SequenceEvent};
use super::stabilize::{Clock, Prober, Stabilizer};
use crate::models::{
    ApplyResult, Phase, PhaseReport, PhaseStatus, Plan, RunReport, SequencerConfig,
    SequencerError, SequencerResult,
};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Applies a plan one file at a time, one phase at a time.
///
/// A failed file never stops the run. Only a stabilization timeout or
/// cancellation ends it early, and even then every planned file gets a
/// result.
pub struct Sequencer {
    applier: Arc<dyn Applier>,
    stabilizer: Stabilizer,
    sink: Arc<dyn EventSink>,
    apply_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Sequencer {
    pub fn new(applier: Arc<dyn Applier>) -> Self {
        Self {
            applier,
            stabilizer: Stabilizer::default(),
            sink: Arc::new(NullSink),
            apply_timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sequencer driving the configured control tool
    pub fn from_config(config: &SequencerConfig) -> Self {
        Self::new(Arc::new(KubectlApplier::new(&config.kubectl)))
            .with_apply_timeout(config.kubectl.apply_timeout())
    }

    pub fn with_stabilizer(mut self, clock: Arc<dyn Clock>, prober: Arc<dyn Prober>) -> Self {
        self.stabilizer = Stabilizer::new(clock, prober);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_apply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.apply_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run before the next file or during a wait
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Apply a single manifest.
    ///
    /// A failure reported by the control tool is an `Ok` result with
    /// `success == false`. Errors are reserved for a file that cannot be
    /// read beforehand (`Io`) and an elapsed apply timeout (`ApplyTimeout`).
    pub async fn apply_file(&self, path: &Path) -> SequencerResult<ApplyResult> {
        ensure_readable(path)?;

        let started = Instant::now();
        let attempt = self.applier.apply(path);
        let output = match self.apply_timeout {
            Some(timeout) => tokio::time::timeout(timeout, attempt).await.map_err(|_| {
                SequencerError::ApplyTimeout {
                    file: path.to_path_buf(),
                    timeout,
                }
            })?,
            None => attempt.await,
        };
        let elapsed = started.elapsed();

        Ok(match output {
            Ok(output) if output.success => ApplyResult::applied(path, elapsed),
            Ok(output) => ApplyResult::failed(path, output.diagnostic(), elapsed),
            Err(e) => ApplyResult::failed(path, format!("{:#}", e), elapsed),
        })
    }

    /// Run every phase in order and report the outcome of every file
    pub async fn run_plan(&self, plan: &Plan) -> RunReport {
        let started_at = Utc::now();
        let total = plan.phases().len();
        let mut phases = Vec::with_capacity(total);
        // Once set, every remaining phase ends with this status unexecuted
        let mut halted: Option<PhaseStatus> = None;

        tracing::info!(
            directory = %plan.directory().display(),
            phases = total,
            files = plan.file_count(),
            "Starting deployment"
        );

        for (index, phase) in plan.phases().iter().enumerate() {
            let report = match halted {
                Some(status) => unexecuted(phase, status),
                None => self.run_phase(index + 1, total, phase).await,
            };

            match report.status {
                PhaseStatus::Cancelled => halted = Some(PhaseStatus::Cancelled),
                PhaseStatus::StabilizationTimedOut => halted = Some(PhaseStatus::Skipped),
                PhaseStatus::Completed | PhaseStatus::Skipped => {}
            }

            phases.push(report);
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            phases,
        };

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Deployment sequence finished"
        );
        self.sink.on_event(&SequenceEvent::RunFinished {
            total: report.total(),
            succeeded: report.succeeded(),
            failed: report.failed(),
        });

        report
    }

    async fn run_phase(&self, index: usize, total: usize, phase: &Phase) -> PhaseReport {
        tracing::info!(phase = %phase.name(), index, total, "Applying phase");
        self.sink.on_event(&SequenceEvent::PhaseStarted {
            index,
            total,
            name: phase.name().to_string(),
            files: phase.files().len(),
        });

        let mut status = PhaseStatus::Completed;
        let mut results = Vec::with_capacity(phase.files().len());

        for file in phase.files() {
            if status == PhaseStatus::Cancelled || self.cancel.is_cancelled() {
                status = PhaseStatus::Cancelled;
                results.push(ApplyResult::cancelled(file));
                continue;
            }

            self.sink.on_event(&SequenceEvent::FileStarted { file: file.clone() });
            let result = self.apply_recorded(file).await;
            self.sink.on_event(&SequenceEvent::FileFinished {
                result: result.clone(),
            });
            results.push(result);
        }

        let mut stabilization_error = None;
        if status == PhaseStatus::Completed {
            match self
                .stabilizer
                .stabilize(phase, &self.cancel, self.sink.as_ref())
                .await
            {
                Ok(()) => {}
                Err(SequencerError::Cancelled) => status = PhaseStatus::Cancelled,
                Err(e) => {
                    status = PhaseStatus::StabilizationTimedOut;
                    stabilization_error = Some(e.to_string());
                }
            }
        }

        if status == PhaseStatus::Cancelled {
            tracing::warn!(phase = %phase.name(), "Deployment cancelled");
        }

        let report = PhaseReport {
            name: phase.name().to_string(),
            status,
            results,
            stabilization_error,
        };
        self.sink.on_event(&SequenceEvent::PhaseFinished {
            name: report.name.clone(),
            status: report.status,
            succeeded: report.succeeded(),
            failed: report.failed(),
        });
        report
    }

    /// `apply_file`, with its errors folded into the result
    async fn apply_recorded(&self, file: &Path) -> ApplyResult {
        let result = match self.apply_file(file).await {
            Ok(result) => result,
            Err(e @ SequencerError::Io { .. }) => ApplyResult::unreadable(file, e.to_string()),
            Err(SequencerError::ApplyTimeout { file, timeout }) => {
                let message = format!("timed out after {}s", timeout.as_secs());
                ApplyResult::timed_out(file, message, timeout)
            }
            Err(e) => ApplyResult::failed(file, e.to_string(), Duration::ZERO),
        };

        match &result.error_output {
            None => tracing::info!(
                applier = self.applier.name(),
                file = %file.display(),
                "Applied"
            ),
            Some(error) => tracing::warn!(
                applier = self.applier.name(),
                file = %file.display(),
                status = result.status.name(),
                error = %error,
                "Apply did not succeed"
            ),
        }

        result
    }
}

fn ensure_readable(path: &Path) -> SequencerResult<()> {
    let io_error = |source| SequencerError::Io {
        path: path.to_path_buf(),
        source,
    };

    let metadata = std::fs::metadata(path).map_err(io_error)?;
    if !metadata.is_file() {
        return Err(io_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    std::fs::File::open(path).map_err(io_error)?;
    Ok(())
}

fn unexecuted(phase: &Phase, status: PhaseStatus) -> PhaseReport {
    let results = phase
        .files()
        .iter()
        .map(|file| match status {
            PhaseStatus::Cancelled => ApplyResult::cancelled(file),
            _ => ApplyResult::skipped(file),
        })
        .collect();

    PhaseReport {
        name: phase.name().to_string(),
        status,
        results,
        stabilization_error: None,
    }
}
