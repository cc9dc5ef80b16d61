//! Line-oriented front end for the exam runner.

use exam_core::model::{
    CompletionReason, ExamDefinition, ExamId, ExamResult, Identity, QuestionReview,
    SessionSettings,
};
use exam_core::{ExamSummary, SessionPhase, Step};
use services::sessions::{format_clock, is_time_warning};
use services::{AppServices, ExamRunner, ResultListItem, SessionView};
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const INPUT_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Select(usize),
    Next,
    Previous,
    Finish,
    Quit,
    Redraw,
    Unknown,
}

fn parse_input(line: &str) -> Input {
    match line.trim().to_lowercase().as_str() {
        "" | "?" => Input::Redraw,
        "n" | "next" => Input::Next,
        "p" | "prev" | "previous" => Input::Previous,
        "f" | "finish" => Input::Finish,
        "q" | "quit" => Input::Quit,
        other => match other.parse::<usize>() {
            Ok(choice) if choice > 0 => Input::Select(choice - 1),
            _ => Input::Unknown,
        },
    }
}

pub fn print_summaries(exams: &[ExamSummary]) {
    if exams.is_empty() {
        println!("No exams found.");
        return;
    }
    for exam in exams {
        println!(
            "{:>3}  {}  ({} questions, {} min)",
            exam.id.value(),
            exam.title,
            exam.total_questions,
            exam.time_limit_minutes
        );
    }
}

pub fn print_history(items: &[ResultListItem]) {
    if items.is_empty() {
        println!("No saved attempts yet.");
        return;
    }
    for item in items {
        let title = if item.title.is_empty() {
            format!("exam {}", item.exam_id)
        } else {
            item.title.clone()
        };
        println!(
            "{}  {:>3}%  {}/{}  {}  {}  {}",
            item.completed_at.format("%Y-%m-%d %H:%M"),
            item.score,
            item.correct,
            item.total,
            format_clock(item.elapsed_secs),
            item.reason,
            title
        );
    }
}

fn render(exam: &ExamDefinition, runner: &ExamRunner, settings: &SessionSettings) {
    let view = SessionView::from_snapshot(exam, &runner.snapshot(), settings);
    println!();
    println!(
        "{}  {}  [{}%]  {}{}",
        view.title,
        view.question_label,
        view.progress_percent,
        view.clock,
        if view.time_warning { "  (time is running out)" } else { "" }
    );
    println!("{}", view.prompt);
    for (index, option) in view.options.iter().enumerate() {
        let marker = if view.selected_option == Some(index) { '*' } else { ' ' };
        println!(" {marker} {}. {option}", index + 1);
    }
    println!(
        "{}",
        key_hints(view.options.len(), view.can_go_back, view.next_label)
    );
}

fn key_hints(options: usize, can_go_back: bool, next_label: &str) -> String {
    let back = if can_go_back { "  [p] previous" } else { "" };
    // On the last question `n` already finishes.
    let finish = if next_label == "Next" { "  [f] finish" } else { "" };
    format!(
        "[1-{options}] answer{back}  [n] {}{finish}  [q] quit",
        next_label.to_lowercase()
    )
}

/// Forward stdin lines from a plain thread.
///
/// The blocking read stays off the runtime so shutdown never waits for the
/// next line once an attempt has timed out.
pub fn spawn_stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(INPUT_BUFFER);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

fn print_result(result: &ExamResult, review: &[QuestionReview]) {
    println!();
    println!(
        "Score: {}% ({}/{} correct) in {}, {}",
        result.score(),
        result.correct_answers(),
        result.total_questions(),
        format_clock(result.elapsed_secs()),
        result.reason()
    );
    for line in review {
        let mark = if line.is_correct { "ok " } else { "   " };
        let answered = line.selected_text.as_deref().unwrap_or("(no answer)");
        println!("{mark} {:>2}. {}", line.index + 1, line.prompt);
        println!("       your answer: {answered}");
        if !line.is_correct {
            println!("       correct:     {}", line.correct_text);
        }
    }
}

/// Drive one attempt from `input` until it completes or the user quits.
///
/// Returns the result, or `None` when the attempt was abandoned.
pub async fn take_exam(
    services: &AppServices,
    identity: &Identity,
    exam_id: ExamId,
    input: &mut mpsc::Receiver<String>,
) -> Result<Option<ExamResult>, Box<dyn std::error::Error>> {
    let sessions = services.sessions();
    let exam = sessions.exam(exam_id)?;
    let settings = sessions.settings();
    let mut runner = sessions.start_exam(exam_id, identity)?;
    let mut progress = runner.progress();
    let mut warned = false;

    render(&exam, &runner, &settings);

    let result = loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else {
                    debug!(exam_id = %exam_id, "input closed");
                    break runner.abandon().await?;
                };
                let outcome = match parse_input(&line) {
                    Input::Select(option) => runner.select_current(option).await,
                    Input::Next => runner.next().await,
                    Input::Previous => runner.previous().await,
                    Input::Finish => runner.finish().await,
                    Input::Quit => break runner.abandon().await?,
                    Input::Redraw => Ok(Step::Continue),
                    Input::Unknown => {
                        println!("Type an option number, n, p, f or q.");
                        continue;
                    }
                };
                match outcome {
                    Ok(Step::Completed(result)) => {
                        runner.wait().await?;
                        break Some(result);
                    }
                    Ok(Step::Continue) => render(&exam, &runner, &settings),
                    Ok(Step::Ignored) => {}
                    Err(err) => println!("{err}"),
                }
            }
            changed = progress.changed() => {
                if changed.is_err() {
                    break runner.wait().await?;
                }
                let snapshot = progress.borrow_and_update().clone();
                if snapshot.phase == SessionPhase::Complete {
                    break runner.wait().await?;
                }
                let warning =
                    is_time_warning(snapshot.remaining_secs, settings.warning_threshold_secs());
                if warning && !warned {
                    warned = true;
                    println!("{} left.", format_clock(snapshot.remaining_secs));
                }
            }
        }
    };

    match &result {
        Some(result) => {
            if result.reason() == CompletionReason::TimedOut {
                println!("Time is up.");
            }
            let review = sessions.review(result)?;
            print_result(result, &review);
        }
        None => println!("Attempt abandoned. Nothing was saved."),
    }
    Ok(result)
}
