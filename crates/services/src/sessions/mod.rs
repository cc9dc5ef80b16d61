mod runner;
mod sink;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::RunnerError;
pub use runner::ExamRunner;
pub use sink::{ChannelSink, PersistingSink, ResultSink};
pub use view::{SessionView, format_clock, is_time_warning, progress_percent};
pub use workflow::ExamSessionService;
