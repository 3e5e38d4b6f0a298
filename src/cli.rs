use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::core::config::Settings;
use crate::core::{shutdown, telemetry, time};
use crate::schemas::{AttemptStatus, UserAnswer};
use crate::services::HttpExerciseApi;
use crate::tasks::PollConfig;
use crate::view::{render_attempt, render_result, ExerciseViewController, Phase, ViewError};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    lesson_id: String,
    final_submission: bool,
}

fn parse_args<I>(args: I) -> Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut lesson_id = env::var("EXERCISE_LESSON_ID").ok();
    let mut final_submission = false;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--lesson" => {
                lesson_id = Some(args.next().ok_or_else(|| anyhow!("--lesson missing value"))?);
            }
            "--final" => final_submission = true,
            _ => return Err(anyhow!("Unknown argument: {arg}")),
        }
    }

    let lesson_id = lesson_id
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("usage: lesson-exercises --lesson <id> [--final]"))?;

    Ok(Args { lesson_id, final_submission })
}

/// Terminal session for one lesson exercise. Ctrl+C or SIGTERM disposes the session.
pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = parse_args(env::args().skip(1))?;
    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let api = Arc::new(HttpExerciseApi::from_settings(&settings)?);
    let mut controller = ExerciseViewController::from_api(api, PollConfig::from(settings.poll()))
        .on_complete(|score| println!("Lesson complete with {score} points."));

    tracing::info!(
        lesson_id = %args.lesson_id,
        final_submission = args.final_submission,
        environment = settings.runtime().environment.as_str(),
        "starting exercise session"
    );

    let result = tokio::select! {
        result = drive(&mut controller, &args) => result,
        source = shutdown::shutdown_signal(&args.lesson_id) => {
            println!("Interrupted by {source}, exercise session closed.");
            Ok(())
        }
    };

    controller.dispose();
    result
}

struct Terminal {
    lines: Lines<BufReader<Stdin>>,
}

impl Terminal {
    fn new() -> Self {
        Self { lines: BufReader::new(tokio::io::stdin()).lines() }
    }

    async fn line(&mut self) -> Result<Option<String>> {
        self.lines.next_line().await.context("Failed to read from stdin")
    }

    /// Lines up to a lone `.`; `None` on end of input with nothing collected.
    async fn block(&mut self) -> Result<Option<String>> {
        let mut collected = Vec::new();
        while let Some(line) = self.line().await? {
            if line.trim() == "." {
                return Ok(Some(collected.join("\n")));
            }
            collected.push(line);
        }
        Ok((!collected.is_empty()).then(|| collected.join("\n")))
    }
}

fn is_command(input: &str, command: &str) -> bool {
    input.trim().eq_ignore_ascii_case(command)
}

fn print_notices(controller: &mut ExerciseViewController) {
    for notice in controller.drain_notices() {
        println!("{notice}");
        if notice.offers_retry() {
            println!("Press Enter to retry or type \"quit\".");
        }
    }
}

fn print_header(controller: &ExerciseViewController) {
    let Some(exercise) = controller.exercise() else {
        return;
    };
    println!("Exercise ({} pts)", exercise.max_points);
    println!("{}", exercise.instructions);
    if let Some(generated_at) = exercise.generated_at {
        println!("Generated {}", time::format_offset(generated_at));
    }
    println!();
}

async fn load_with_retry(
    controller: &mut ExerciseViewController,
    terminal: &mut Terminal,
    lesson_id: &str,
) -> Result<bool> {
    let mut outcome = controller.load(lesson_id).await;
    loop {
        match outcome {
            Ok(()) => return Ok(true),
            Err(ViewError::Failed(_)) => {
                print_notices(controller);
                match terminal.line().await? {
                    Some(line) if !is_command(&line, "quit") => {}
                    _ => return Ok(false),
                }
                outcome = controller.retry_load().await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn drive(controller: &mut ExerciseViewController, args: &Args) -> Result<()> {
    let mut terminal = Terminal::new();
    if !load_with_retry(controller, &mut terminal, &args.lesson_id).await? {
        return Ok(());
    }
    print_header(controller);

    loop {
        print_notices(controller);

        match controller.phase().clone() {
            Phase::Ready => {
                if !answer_round(controller, &mut terminal, args.final_submission).await? {
                    return Ok(());
                }
            }
            Phase::Reviewed(result) => {
                if result.is_approved() {
                    return Ok(());
                }
                if !offer_retry(controller, &mut terminal).await? {
                    return Ok(());
                }
            }
            Phase::AwaitingGrade { .. } => {
                println!("{}", AttemptStatus::Pending.badge());
                if controller.next_grading_update().await.is_none() {
                    return Err(anyhow!("grading stopped without a result"));
                }
            }
            Phase::Graded(attempt) => {
                println!("{}", render_attempt(&attempt));
                if attempt.status == AttemptStatus::Correct {
                    return Ok(());
                }
                if !offer_retry(controller, &mut terminal).await? {
                    return Ok(());
                }
            }
            Phase::StillEvaluating { .. } => {
                println!("Press Enter to check again or type \"quit\".");
                match terminal.line().await? {
                    Some(line) if !is_command(&line, "quit") => controller.resume_polling()?,
                    _ => return Ok(()),
                }
            }
            Phase::Unsupported { .. } | Phase::LoadFailed { .. } | Phase::Disposed => return Ok(()),
            phase @ (Phase::Idle | Phase::Loading | Phase::Validating | Phase::Submitting) => {
                return Err(anyhow!("exercise session stuck in {}", phase.name()));
            }
        }
    }
}

async fn offer_retry(controller: &mut ExerciseViewController, terminal: &mut Terminal) -> Result<bool> {
    println!("Type \"retry\" to try again or \"quit\".");
    match terminal.line().await? {
        Some(line) if is_command(&line, "retry") => {
            controller.try_again()?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Reads input for the current widget and submits when the answer is ready. Returns
/// `false` when the learner quits or input ends.
async fn answer_round(
    controller: &mut ExerciseViewController,
    terminal: &mut Terminal,
    final_submission: bool,
) -> Result<bool> {
    let Some(widget) = controller.widget() else {
        return Ok(false);
    };
    println!("{}", widget.render(controller.answer()));
    println!("{} (\"submit\" to send, \"quit\" to leave)", widget.prompt());

    let multiline = widget.is_multiline();
    let input = if multiline { terminal.block().await? } else { terminal.line().await? };
    let Some(input) = input else {
        return Ok(false);
    };
    if is_command(&input, "quit") {
        return Ok(false);
    }

    let send_now = if !multiline && is_command(&input, "submit") {
        true
    } else {
        let edit = match widget.parse_input(&input) {
            Ok(edit) => edit,
            Err(err) => {
                println!("{err}");
                return Ok(true);
            }
        };
        if let Err(err) = controller.apply_edit(edit) {
            println!("{err}");
            return Ok(true);
        }
        multiline
            || matches!(controller.answer(), Some(UserAnswer::TrueFalse(_) | UserAnswer::MultipleChoice(_)))
    };

    if !send_now {
        return Ok(true);
    }

    if final_submission {
        match controller.submit_final().await {
            Ok(attempt) => println!("Submitted attempt {}.", attempt.id),
            Err(ViewError::Incomplete(_) | ViewError::Failed(_)) => {}
            Err(err) => return Err(err.into()),
        }
    } else {
        match controller.submit().await {
            Ok(result) => print!("{}", render_result(&result)),
            Err(ViewError::Incomplete(_) | ViewError::Failed(_)) => {}
            Err(err) => return Err(err.into()),
        }
    }

    Ok(true)
}
