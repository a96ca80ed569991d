pub mod config;
pub mod error;
pub mod plan;
pub mod report;

pub use config::{KubectlConfig, PhaseConfig, SequencerConfig, CONFIG_FILE};
pub use error::{SequencerError, SequencerResult};
pub use plan::{Phase, PhaseKind, Plan, ReadinessCheck};
pub use report::{ApplyResult, ApplyStatus, PhaseReport, PhaseStatus, RunReport};
