// kubeseq - Ordered manifest deployment sequencer
// Applies manifests phase by phase through the cluster control tool, waiting for each phase to settle

pub mod cli;
pub mod models;
pub mod sequencer;

pub use anyhow::{Context, Result};
pub use colored::Colorize;

// Re-export commonly used types
pub use models::{ApplyResult, Phase, Plan, RunReport, SequencerConfig, SequencerError};
pub use sequencer::{build_plan, Sequencer};
