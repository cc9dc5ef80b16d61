#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod history_service;
pub mod identity_service;
pub mod sessions;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, HistoryError, IdentityError, RunnerError, SinkError};
pub use history_service::{ExamResultId, ResultHistoryService, ResultListItem};
pub use identity_service::IdentityService;
pub use sessions::{
    ChannelSink, ExamRunner, ExamSessionService, PersistingSink, ResultSink, SessionView,
};
