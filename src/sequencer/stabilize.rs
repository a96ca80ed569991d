//! Post-phase stabilization: a readiness probe with backoff, or a fixed pause

use super::events::{EventSink, SequenceEvent, WaitKind};
use crate::models::{Phase, ReadinessCheck, SequencerError, SequencerResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Lower bound on how long a single readiness command may run
const MIN_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Source of time for waits
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);

    fn now(&self) -> Instant;
}

/// Wall-clock time via tokio
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Evaluates a readiness check once
#[async_trait]
pub trait Prober: Send + Sync {
    /// `Ok(true)` when ready, `Ok(false)` when not yet ready,
    /// `Err` when the check could not run at all
    async fn probe(&self, check: &ReadinessCheck) -> Result<bool>;
}

/// Runs the check's command; exit status 0 means ready
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandProber;

#[async_trait]
impl Prober for CommandProber {
    async fn probe(&self, check: &ReadinessCheck) -> Result<bool> {
        let (program, args) = check
            .command
            .split_first()
            .context("Readiness check has an empty command")?;

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("Failed to run readiness check '{}'", check.display()))?;

        Ok(status.success())
    }
}

/// Runs the stabilization step that follows each phase
#[derive(Clone)]
pub struct Stabilizer {
    clock: Arc<dyn Clock>,
    prober: Arc<dyn Prober>,
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(Arc::new(TokioClock), Arc::new(CommandProber))
    }
}

impl Stabilizer {
    pub fn new(clock: Arc<dyn Clock>, prober: Arc<dyn Prober>) -> Self {
        Self { clock, prober }
    }

    /// Wait until `phase` is considered stable.
    ///
    /// With a readiness check the fixed delay is not applied.
    pub async fn stabilize(
        &self,
        phase: &Phase,
        cancel: &CancellationToken,
        sink: &dyn EventSink,
    ) -> SequencerResult<()> {
        if cancel.is_cancelled() {
            return Err(SequencerError::Cancelled);
        }

        if let Some(check) = phase.readiness() {
            sink.on_event(&SequenceEvent::WaitStarted {
                phase: phase.name().to_string(),
                kind: WaitKind::Readiness {
                    command: check.display(),
                    timeout: check.timeout(),
                },
            });
            let outcome = self.poll_until_ready(phase.name(), check, cancel, sink).await;
            sink.on_event(&SequenceEvent::WaitFinished {
                phase: phase.name().to_string(),
            });
            return outcome;
        }

        let delay = phase.post_delay();
        if delay.is_zero() {
            return Ok(());
        }

        tracing::info!(phase = %phase.name(), seconds = delay.as_secs(), "Waiting for stabilization");
        sink.on_event(&SequenceEvent::WaitStarted {
            phase: phase.name().to_string(),
            kind: WaitKind::Fixed(delay),
        });
        let outcome = self.pause(delay, cancel).await;
        sink.on_event(&SequenceEvent::WaitFinished {
            phase: phase.name().to_string(),
        });
        outcome
    }

    async fn poll_until_ready(
        &self,
        phase: &str,
        check: &ReadinessCheck,
        cancel: &CancellationToken,
        sink: &dyn EventSink,
    ) -> SequencerResult<()> {
        let started = self.clock.now();
        let timeout = check.timeout();
        let max_backoff = check.max_backoff();
        let mut backoff = check.initial_backoff();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(SequencerError::Cancelled);
            }

            attempt += 1;
            let remaining = timeout.saturating_sub(self.elapsed_since(started));
            let probe = self.prober.probe(check);
            let ready = match tokio::time::timeout(remaining.max(MIN_PROBE_TIMEOUT), probe).await {
                Ok(Ok(ready)) => ready,
                Ok(Err(e)) => {
                    tracing::warn!(phase, attempt, error = %e, "Readiness check could not run");
                    false
                }
                Err(_) => {
                    tracing::warn!(phase, attempt, "Readiness check hung and was abandoned");
                    false
                }
            };

            sink.on_event(&SequenceEvent::ReadinessPolled {
                phase: phase.to_string(),
                attempt,
                ready,
            });

            if ready {
                tracing::info!(phase, attempt, "Phase is ready");
                return Ok(());
            }

            let elapsed = self.elapsed_since(started);
            if elapsed >= timeout {
                tracing::warn!(phase, attempts = attempt, "Phase did not become ready in time");
                return Err(SequencerError::StabilizationTimeout {
                    phase: phase.to_string(),
                    timeout,
                });
            }

            tracing::debug!(phase, attempt, backoff_ms = backoff.as_millis() as u64, "Not ready yet");
            self.pause(backoff.min(timeout - elapsed), cancel).await?;
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    }

    /// Sleep that ends early with `Cancelled`
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> SequencerResult<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SequencerError::Cancelled),
            _ = self.clock.sleep(duration) => Ok(()),
        }
    }

    fn elapsed_since(&self, started: Instant) -> Duration {
        self.clock.now().saturating_duration_since(started)
    }
}
