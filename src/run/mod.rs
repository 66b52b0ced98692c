pub mod checkpoint;
pub mod config;
pub mod context;
pub mod orchestrator;
pub mod run_log;

pub use checkpoint::{save_checkpoint, Checkpoint, ResumePoint, BEST_CHECKPOINT_FILE, CHECKPOINT_FILE};
pub use config::RunConfig;
pub use context::{RunContext, RUN_CONFIG_FILE};
pub use orchestrator::{run, run_with_data, RunSummary};
pub use run_log::{format_row, RunLog, RUN_LOG_HEADER};
