use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use exam_core::model::{ExamDefinition, ExamId, ExamResult, QuestionId, SessionSettings};
use exam_core::{Clock, SessionError, SessionEvent, SessionSnapshot, SessionState, Step};

use super::sink::ResultSink;
use crate::error::RunnerError;

const COMMAND_BUFFER: usize = 16;

type Reply = oneshot::Sender<Result<Step, SessionError>>;

struct Command {
    event: SessionEvent,
    reply: Reply,
}

//
// ─── RUNNER HANDLE ─────────────────────────────────────────────────────────────
//

/// Handle to one running exam attempt.
///
/// A spawned task owns the `SessionState`, the countdown interval and the
/// command receiver. Ticks and commands are applied one at a time from a single
/// select loop, so the session needs no locking. Dropping the handle (or
/// calling [`abandon`](Self::abandon)) closes the command channel; the task
/// then exits without emitting a result.
pub struct ExamRunner {
    exam_id: ExamId,
    commands: Option<mpsc::Sender<Command>>,
    progress: watch::Receiver<SessionSnapshot>,
    task: Option<JoinHandle<Option<ExamResult>>>,
}

impl ExamRunner {
    /// Start the attempt and spawn its driver task. Must be called from within
    /// a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session cannot be started.
    pub fn start(
        exam: Arc<ExamDefinition>,
        settings: SessionSettings,
        clock: Clock,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, SessionError> {
        let exam_id = exam.id();
        let mut state = SessionState::new(exam);
        state.start(clock.now())?;

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (progress_tx, progress_rx) = watch::channel(state.snapshot());

        info!(
            exam_id = %exam_id,
            questions = state.question_count(),
            remaining_secs = state.remaining_secs(),
            "exam session started"
        );

        let driver = Driver {
            state,
            settings,
            clock,
            sink,
            progress: progress_tx,
        };
        let task = tokio::spawn(driver.run(commands_rx));

        Ok(Self {
            exam_id,
            commands: Some(commands_tx),
            progress: progress_rx,
            task: Some(task),
        })
    }

    #[must_use]
    pub fn exam_id(&self) -> ExamId {
        self.exam_id
    }

    /// Apply one event inside the driver task.
    ///
    /// Once the session has completed (or the task is gone) every event is a
    /// silent no-op and resolves to `Step::Ignored`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for precondition violations such as an unknown
    /// question or an option out of range.
    pub async fn send(&self, event: SessionEvent) -> Result<Step, SessionError> {
        let Some(commands) = self.commands.as_ref() else {
            return Ok(Step::Ignored);
        };
        let (reply, response) = oneshot::channel();
        if commands.send(Command { event, reply }).await.is_err() {
            return Ok(Step::Ignored);
        }
        response.await.unwrap_or(Ok(Step::Ignored))
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn select_answer(
        &self,
        question_id: QuestionId,
        option: usize,
    ) -> Result<Step, SessionError> {
        self.send(SessionEvent::SelectAnswer {
            question_id,
            option,
        })
        .await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn select_current(&self, option: usize) -> Result<Step, SessionError> {
        self.send(SessionEvent::SelectCurrent { option }).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn next(&self) -> Result<Step, SessionError> {
        self.send(SessionEvent::Next).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn previous(&self) -> Result<Step, SessionError> {
        self.send(SessionEvent::Previous).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn finish(&self) -> Result<Step, SessionError> {
        self.send(SessionEvent::Finish).await
    }

    /// Receiver for progress snapshots. Updated after every applied event.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<SessionSnapshot> {
        self.progress.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.progress.borrow().clone()
    }

    /// Wait for the driver task to finish and return the result it produced.
    /// Returns `Ok(None)` if the task already finished and was awaited.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::TaskFailed` if the driver task panicked.
    pub async fn wait(&mut self) -> Result<Option<ExamResult>, RunnerError> {
        let Some(task) = self.task.take() else {
            return Ok(None);
        };
        task.await
            .map_err(|err| RunnerError::TaskFailed(err.to_string()))
    }

    /// Close the session without producing a result.
    ///
    /// If the session had already completed, its result was delivered to the
    /// sink and is returned here.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::TaskFailed` if the driver task panicked.
    pub async fn abandon(mut self) -> Result<Option<ExamResult>, RunnerError> {
        self.commands = None;
        self.wait().await
    }
}

impl std::fmt::Debug for ExamRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExamRunner")
            .field("exam_id", &self.exam_id)
            .field("running", &self.task.as_ref().is_some_and(|t| !t.is_finished()))
            .finish_non_exhaustive()
    }
}

//
// ─── DRIVER TASK ───────────────────────────────────────────────────────────────
//

struct Driver {
    state: SessionState,
    settings: SessionSettings,
    clock: Clock,
    sink: Arc<dyn ResultSink>,
    progress: watch::Sender<SessionSnapshot>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Option<ExamResult> {
        let period = self.settings.tick_period();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(Command { event, reply }) = command else {
                        info!(
                            exam_id = %self.state.exam().id(),
                            remaining_secs = self.state.remaining_secs(),
                            "exam session abandoned"
                        );
                        return None;
                    };
                    let outcome = self.state.apply(event, self.clock.now());
                    self.publish();
                    let step = outcome.clone().unwrap_or_else(|err| {
                        debug!(?event, error = %err, "session command rejected");
                        Step::Ignored
                    });
                    // The caller may have stopped waiting; the event still applied.
                    let _ = reply.send(outcome);
                    step
                }

                _ = ticker.tick() => {
                    self.clock.advance_secs(1);
                    let outcome = self.state.tick(self.clock.now());
                    self.publish();
                    outcome.unwrap_or_else(|err| {
                        warn!(error = %err, "tick rejected");
                        Step::Ignored
                    })
                }
            };

            if let Step::Completed(result) = step {
                self.complete(&result).await;
                return Some(result);
            }
        }
    }

    fn publish(&self) {
        self.progress.send_replace(self.state.snapshot());
    }

    async fn complete(&self, result: &ExamResult) {
        info!(
            exam_id = %result.exam_id(),
            reason = %result.reason(),
            score = result.score(),
            correct = result.correct_answers(),
            total = result.total_questions(),
            elapsed_secs = result.elapsed_secs(),
            "exam session completed"
        );
        if let Err(err) = self.sink.accept(result).await {
            warn!(exam_id = %result.exam_id(), error = %err, "result sink failed");
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
