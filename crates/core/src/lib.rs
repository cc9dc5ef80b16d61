#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod model;
pub mod scoring;
pub mod session;
pub mod time;

pub use catalog::{CatalogError, ExamCatalog, ExamSummary};
pub use error::Error;
pub use session::{SessionError, SessionEvent, SessionPhase, SessionSnapshot, SessionState, Step};
pub use time::Clock;
