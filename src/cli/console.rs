//! Console presentation of sequencer events and reports

use crate::models::{ApplyResult, ApplyStatus, PhaseStatus, Plan, RunReport};
use crate::sequencer::{EventSink, SequenceEvent, WaitKind};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Prints progress as it happens, with a spinner during waits
#[derive(Default)]
pub struct ConsoleSink {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn start_spinner(&self, message: String) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some(previous) = spinner.replace(pb) {
                previous.finish_and_clear();
            }
        }
    }

    fn update_spinner(&self, message: String) {
        if let Ok(spinner) = self.spinner.lock() {
            if let Some(pb) = spinner.as_ref() {
                pb.set_message(message);
            }
        }
    }

    fn stop_spinner(&self) {
        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some(pb) = spinner.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl EventSink for ConsoleSink {
    fn on_event(&self, event: &SequenceEvent) {
        match event {
            SequenceEvent::PhaseStarted {
                index, total, name, ..
            } => {
                println!();
                println!("{}", phase_banner(*index, *total, name).cyan().bold());
            }
            SequenceEvent::FileStarted { file } => {
                println!("🚀 Applying {}...", file.display());
            }
            SequenceEvent::FileFinished { result } => {
                println!("{}", result_line(result));
            }
            SequenceEvent::WaitStarted { kind, .. } => {
                self.start_spinner(wait_message(kind));
            }
            SequenceEvent::ReadinessPolled {
                attempt, ready: false, ..
            } => {
                self.update_spinner(format!("⏳ Not ready yet (check #{})", attempt));
            }
            SequenceEvent::ReadinessPolled { .. } => {}
            SequenceEvent::WaitFinished { .. } => {
                self.stop_spinner();
            }
            SequenceEvent::PhaseFinished {
                name,
                status: PhaseStatus::StabilizationTimedOut,
                ..
            } => {
                println!(
                    "{}",
                    format!("⚠️  '{}' never became ready; skipping the remaining phases", name).yellow()
                );
            }
            SequenceEvent::PhaseFinished {
                status: PhaseStatus::Cancelled,
                ..
            } => {
                println!("{}", "🛑 Cancelled".yellow());
            }
            SequenceEvent::PhaseFinished { .. } => {}
            SequenceEvent::RunFinished { .. } => {
                self.stop_spinner();
            }
        }
    }
}

pub fn phase_banner(index: usize, total: usize, name: &str) -> String {
    format!("=== Step {}/{}: Applying {} ===", index, total, name)
}

fn wait_message(kind: &WaitKind) -> String {
    match kind {
        WaitKind::Fixed(delay) => {
            format!("⏳ Waiting {} seconds for stabilization...", delay.as_secs())
        }
        WaitKind::Readiness { command, timeout } => {
            format!("⏳ Waiting up to {}s for `{}`...", timeout.as_secs(), command)
        }
    }
}

/// One line (plus indented diagnostics) per file outcome
pub fn result_line(result: &ApplyResult) -> String {
    let file = result.file.display();
    let headline = match result.status {
        ApplyStatus::Applied => format!("{} Applied: {}", result.status.emoji(), file)
            .green()
            .to_string(),
        ApplyStatus::Skipped | ApplyStatus::Cancelled => {
            format!("{} {}: {}", result.status.emoji(), capitalize(result.status.name()), file)
                .bright_black()
                .to_string()
        }
        _ => format!("{} Error applying {} ({})", result.status.emoji(), file, result.status.name())
            .red()
            .to_string(),
    };

    match &result.error_output {
        Some(error) => {
            let indented: Vec<String> = error.lines().map(|line| format!("   {}", line)).collect();
            format!("{}\n{}", headline, indented.join("\n"))
        }
        None => headline,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Final per-phase counts and the completion line
pub fn print_summary(report: &RunReport) {
    println!();
    println!("{}", "📋 Summary".cyan().bold());
    for phase in &report.phases {
        let status = match phase.status {
            PhaseStatus::Completed if phase.failed() == 0 => "ok".green(),
            PhaseStatus::Completed => "partial".yellow(),
            PhaseStatus::StabilizationTimedOut => "not ready".red(),
            PhaseStatus::Cancelled => "cancelled".yellow(),
            PhaseStatus::Skipped => "skipped".bright_black(),
        };
        println!(
            "   {:<24} {:>3} ok  {:>3} failed  [{}]",
            phase.name,
            phase.succeeded(),
            phase.failed(),
            status
        );
        if let Some(error) = &phase.stabilization_error {
            println!("      {}", error.red());
        }
    }

    println!();
    let seconds = report.duration().num_milliseconds() as f64 / 1000.0;
    if report.cancelled() {
        println!("{}", "🛑 Deployment sequence cancelled.".yellow().bold());
    } else if report.all_succeeded() {
        println!(
            "{}",
            format!("✅ Deployment sequence completed: {} applied in {:.1}s", report.succeeded(), seconds)
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "⚠️  Deployment sequence completed with {} of {} manifests not applied ({:.1}s)",
                report.failed(),
                report.total(),
                seconds
            )
            .yellow()
            .bold()
        );
    }
}

/// Human-readable plan listing
pub fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!(
            "{}",
            format!("No manifests found in {}", plan.directory().display()).yellow()
        );
        return;
    }

    println!(
        "{}",
        format!(
            "📋 Plan for {} ({} phases, {} files)",
            plan.directory().display(),
            plan.phases().len(),
            plan.file_count()
        )
        .cyan()
        .bold()
    );

    let total = plan.phases().len();
    for (index, phase) in plan.phases().iter().enumerate() {
        println!();
        println!("{}", phase_banner(index + 1, total, phase.name()).bold());
        for file in phase.files() {
            let marker = if file.is_file() { "•".normal() } else { "✗ missing".red() };
            println!("   {} {}", marker, file.display());
        }
        match phase.readiness() {
            Some(check) => println!(
                "   ⏳ until `{}` succeeds (max {}s)",
                check.display(),
                check.timeout_secs
            ),
            None if phase.post_delay_secs() > 0 => {
                println!("   ⏳ wait {}s", phase.post_delay_secs())
            }
            None => {}
        }
    }
}
