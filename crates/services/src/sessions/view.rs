use exam_core::model::{ExamDefinition, SessionSettings};
use exam_core::{SessionPhase, SessionSnapshot};

/// `MM:SS` countdown label. Minutes are not wrapped into hours, so a 90-minute
/// exam starts at `90:00`.
#[must_use]
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// True once the remaining time drops below the warning threshold.
#[must_use]
pub fn is_time_warning(remaining_secs: u32, threshold_secs: u32) -> bool {
    remaining_secs < threshold_secs
}

/// Progress as a whole percentage, rounded to the nearest integer.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn progress_percent(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Everything the question screen renders, derived from a snapshot.
///
/// Holds display-ready values only; the session itself stays in the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub title: String,
    pub question_label: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub selected_option: Option<usize>,
    pub clock: String,
    pub time_warning: bool,
    pub progress_percent: u8,
    pub can_go_back: bool,
    pub next_label: &'static str,
    pub is_complete: bool,
}

impl SessionView {
    #[must_use]
    pub fn from_snapshot(
        exam: &ExamDefinition,
        snapshot: &SessionSnapshot,
        settings: &SessionSettings,
    ) -> Self {
        let question = exam.question(snapshot.current_index);
        let is_last = snapshot.current_index + 1 >= snapshot.total_questions;
        Self {
            title: exam.title().to_owned(),
            question_label: format!(
                "Question {} of {}",
                snapshot.current_index + 1,
                snapshot.total_questions
            ),
            prompt: question.map(|q| q.text().to_owned()).unwrap_or_default(),
            options: question.map(|q| q.options().to_vec()).unwrap_or_default(),
            selected_option: snapshot.selected_option,
            clock: format_clock(snapshot.remaining_secs),
            time_warning: is_time_warning(
                snapshot.remaining_secs,
                settings.warning_threshold_secs(),
            ),
            progress_percent: progress_percent(snapshot.progress_fraction),
            can_go_back: snapshot.current_index > 0,
            next_label: if is_last { "Finish" } else { "Next" },
            is_complete: snapshot.phase == SessionPhase::Complete,
        }
    }
}
