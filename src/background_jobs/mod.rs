//! Background job scheduling and execution system.
//!
//! Jobs run on the blocking pool, triggered by their weekly schedule or
//! manually through `SchedulerHandle`.

mod context;
mod handle;
mod job;
pub mod jobs;
mod schedule;
mod scheduler;

pub use context::JobContext;
pub use handle::{JobInfo, JobRunInfo, JobRunStatus, JobScheduleInfo, SchedulerHandle};
pub use job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior};
pub use schedule::WeeklySchedule;
pub use scheduler::{create_scheduler, JobScheduler};
