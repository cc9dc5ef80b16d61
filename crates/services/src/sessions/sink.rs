use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use exam_core::model::{ExamResult, Identity};
use storage::repository::ExamResultRepository;

use crate::error::SinkError;

/// Receives the result of a completed session. Called exactly once per
/// session, from the runner task, after the session has turned terminal.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// # Errors
    ///
    /// Returns `SinkError` if the result could not be delivered. The session
    /// stays complete either way.
    async fn accept(&self, result: &ExamResult) -> Result<(), SinkError>;
}

/// Stores results for the signed-in user. Anonymous attempts are scored and
/// shown but not persisted.
#[derive(Clone)]
pub struct PersistingSink {
    results: Arc<dyn ExamResultRepository>,
    identity: Identity,
}

impl PersistingSink {
    #[must_use]
    pub fn new(results: Arc<dyn ExamResultRepository>, identity: Identity) -> Self {
        Self { results, identity }
    }
}

#[async_trait]
impl ResultSink for PersistingSink {
    async fn accept(&self, result: &ExamResult) -> Result<(), SinkError> {
        let Some(user) = self.identity.user() else {
            debug!(exam_id = %result.exam_id(), "anonymous attempt; result not stored");
            return Ok(());
        };
        let id = self.results.append_result(Some(user.id), result).await?;
        info!(result_id = id, user_id = %user.id, "exam result stored");
        Ok(())
    }
}

/// Forwards results to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ExamResult>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExamResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn accept(&self, result: &ExamResult) -> Result<(), SinkError> {
        self.tx.send(result.clone()).map_err(|_| SinkError::Closed)
    }
}
