pub mod controller;
pub mod dedup;
pub mod source;
pub mod status;

pub use controller::{ControllerSettings, RunHandle, ScrapeController};
pub use source::{ActuaryListSource, JobSource, PageRequest, SourceError, SourcePage};
pub use status::StatusPublisher;
