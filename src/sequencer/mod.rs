pub mod applier;
pub mod events;
pub mod plan;
pub mod runner;
pub mod stabilize;

pub use applier::{Applier, ApplyOutput, KubectlApplier};
pub use events::{EventSink, NullSink, RecordingSink, SequenceEvent, WaitKind};
pub use plan::{build_plan, build_plan_with, scan_manifests};
pub use runner::Sequencer;
pub use stabilize::{Clock, CommandProber, Prober, Stabilizer, TokioClock};
