pub mod adamw;
pub mod optimizer;
pub mod scheduler;
pub mod sgd;

pub use adamw::AdamW;
pub use optimizer::{Optimizer, OptimizerKind};
pub use scheduler::{get_lr, ScheduleKind, Scheduler, SchedulerState};
pub use sgd::Sgd;
