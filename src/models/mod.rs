pub mod config;
pub mod job;
pub mod run;

pub use config::BoardConfig;
pub use job::{JobFilter, JobRecord, JobRecordUpdate, JobStats, NewJobRecord};
pub use run::{RunState, ScrapeConfig, ScrapeRequest, ScrapeRun, ScrapeStatus};
