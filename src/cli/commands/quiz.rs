//! Implementation of the `assessor quiz` command.
//!
//! Runs a learner through one or more assessment sessions on the terminal,
//! either against a running server or directly against the engine.

use anyhow::{Context, Result};
use clap::Args;
use console::{style, Term};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::adapters::http::ANONYMOUS_USER;
use crate::cli::engine::Engine;
use crate::cli::output::{create_spinner, output, CommandOutput};
use crate::client::{
    AssessmentTransport, ControllerError, HttpTransport, InProcessTransport, PrefetchController,
    ProceedOutcome, SessionSummary,
};
use crate::domain::models::{AssessmentItem, Config, NextRequest, SubjectCourse};

/// Attempts per protocol call before giving up on a retryable failure.
const MAX_ATTEMPTS: u32 = 3;

type Controller = PrefetchController<dyn AssessmentTransport>;

#[derive(Args, Debug)]
pub struct QuizArgs {
    /// Base URL of a running `assessor serve`; runs in-process when omitted
    #[arg(long)]
    pub server: Option<String>,

    /// Learner id
    #[arg(short, long, default_value = ANONYMOUS_USER)]
    pub user: String,

    /// Subject to assess (defaults to the learner's profile)
    #[arg(long, requires = "course")]
    pub subject: Option<String>,

    /// Course to assess
    #[arg(long, requires = "subject")]
    pub course: Option<String>,

    /// Further subject/course pairs to assess afterwards, as "Subject:Course"
    #[arg(long = "then", value_parser = parse_subject_course)]
    pub then: Vec<SubjectCourse>,

    /// Request timeout in server mode, in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

fn parse_subject_course(s: &str) -> Result<SubjectCourse, String> {
    let (subject, course) = s
        .split_once(':')
        .ok_or_else(|| format!("expected Subject:Course, got '{s}'"))?;
    let target = SubjectCourse::new(subject.trim(), course.trim());
    target.validate().map_err(|e| e.to_string())?;
    Ok(target)
}

#[derive(Debug, serde::Serialize)]
pub struct SessionOutput {
    pub subject: String,
    pub course: String,
    pub final_difficulty: String,
    pub correct_total: u32,
    pub question_total: u32,
    pub accuracy: f64,
}

impl From<&SessionSummary> for SessionOutput {
    fn from(summary: &SessionSummary) -> Self {
        Self {
            subject: summary.state.subject.clone(),
            course: summary.state.course.clone(),
            final_difficulty: summary.state.difficulty.as_str().to_string(),
            correct_total: summary.correct_total,
            question_total: summary.question_total,
            accuracy: summary.accuracy,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct QuizOutput {
    pub user_id: String,
    pub sessions: Vec<SessionOutput>,
}

impl CommandOutput for QuizOutput {
    fn to_human(&self) -> String {
        if self.sessions.is_empty() {
            return "No assessment completed.".to_string();
        }
        let mut lines = vec![format!("\nResults for {}:", style(&self.user_id).bold())];
        for s in &self.sessions {
            lines.push(format!(
                "  {} / {}: reached {}, {}/{} correct ({:.0}%)",
                s.subject,
                s.course,
                style(&s.final_difficulty).cyan(),
                s.correct_total,
                s.question_total,
                s.accuracy * 100.0
            ));
        }
        lines.join("\n")
    }
}

/// What the learner typed at a question prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Choice(usize),
    Quit,
    Invalid,
}

fn parse_input(line: &str, choices: usize) -> Input {
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
        return Input::Quit;
    }
    match line.parse::<usize>() {
        Ok(n) if (1..=choices).contains(&n) => Input::Choice(n - 1),
        _ => Input::Invalid,
    }
}

enum Step {
    Start(NextRequest),
    Proceed,
    Reload,
}

pub async fn execute(args: QuizArgs, config: Config, json_mode: bool) -> Result<()> {
    let transport: Arc<dyn AssessmentTransport> = match &args.server {
        Some(url) => Arc::new(HttpTransport::new(
            url.clone(),
            args.user.clone(),
            Duration::from_secs(args.timeout),
        )?),
        None => {
            let engine = Engine::build(&config).await?;
            Arc::new(InProcessTransport::new(
                engine.coordinator,
                engine.finalizer,
                args.user.clone(),
            ))
        }
    };

    // Keep stdout clean for the JSON result.
    let term = if json_mode { Term::stderr() } else { Term::stdout() };
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut controller: Controller = PrefetchController::new(transport);

    let mut request = match (args.subject, args.course) {
        (Some(subject), Some(course)) => {
            NextRequest::bootstrap(SubjectCourse::new(subject, course), args.then)
        }
        _ => NextRequest {
            remaining: args.then,
            ..Default::default()
        },
    };

    let mut sessions = Vec::new();
    loop {
        run_step(&mut controller, &term, Step::Start(request)).await?;
        let (summary, quit) = run_session(&mut controller, &term, &mut input).await?;
        controller.flush().await;
        sessions.push(SessionOutput::from(&summary));

        match controller.next_flow_request() {
            Some(next) if !quit => request = next,
            _ => break,
        }
    }

    output(
        &QuizOutput {
            user_id: args.user,
            sessions,
        },
        json_mode,
    );
    Ok(())
}

/// Play one session to its end. The flag is set when the learner quit early.
async fn run_session(
    controller: &mut Controller,
    term: &Term,
    input: &mut Lines<BufReader<Stdin>>,
) -> Result<(SessionSummary, bool)> {
    if let Some(state) = controller.current_state() {
        term.write_line(&format!(
            "\n{} {} / {}",
            style("Assessment:").bold(),
            state.subject,
            state.course
        ))?;
    }

    let mut reloads = 0;
    loop {
        if let Some(summary) = controller.summary() {
            return Ok((summary.clone(), false));
        }
        let Some(item) = controller.current_item().cloned() else {
            reloads += 1;
            if reloads > MAX_ATTEMPTS {
                anyhow::bail!("No question could be generated after {MAX_ATTEMPTS} reloads");
            }
            term.write_line(&format!("{} question unavailable, reloading", style("!").yellow()))?;
            run_step(controller, term, Step::Reload).await?;
            continue;
        };
        reloads = 0;

        render_item(controller, term, &item)?;
        let answer = loop {
            term.write_str("Your answer (number, or q to quit): ")?;
            let Some(line) = input.next_line().await.context("Failed to read answer")? else {
                // End of input ends the session like quitting does.
                return Ok((controller.finish()?, true));
            };
            match parse_input(&line, item.choices.len()) {
                Input::Choice(answer) => break answer,
                Input::Quit => return Ok((controller.finish()?, true)),
                Input::Invalid => {
                    term.write_line(&format!("Enter a number from 1 to {}.", item.choices.len()))?;
                }
            }
        };

        controller.select_answer(answer)?;
        if item.is_correct(answer) {
            term.write_line(&style("Correct!").green().to_string())?;
        } else {
            term.write_line(&format!(
                "{} The answer was {}.",
                style("Not quite.").red(),
                item.correct_index + 1
            ))?;
        }
        if !item.explanation.is_empty() {
            term.write_line(&style(&item.explanation).dim().to_string())?;
        }

        if let Some(ProceedOutcome::Finished(summary)) =
            run_step(controller, term, Step::Proceed).await?
        {
            return Ok((summary, false));
        }
    }
}

fn render_item(controller: &Controller, term: &Term, item: &AssessmentItem) -> Result<()> {
    if let Some(state) = controller.current_state() {
        term.write_line(&format!(
            "\n{} {}/{}  {}",
            style("Question").bold(),
            state.step,
            state.max_steps,
            style(format!("[{}]", state.difficulty)).dim()
        ))?;
    }
    term.write_line(&item.prompt)?;
    for (i, choice) in item.choices.iter().enumerate() {
        term.write_line(&format!("  {} {choice}", style(format!("{})", i + 1)).cyan()))?;
    }
    Ok(())
}

/// Run one protocol call, retrying failures that may clear on their own.
async fn run_step(
    controller: &mut Controller,
    term: &Term,
    step: Step,
) -> Result<Option<ProceedOutcome>> {
    let mut attempt = 1;
    loop {
        let spinner = create_spinner(match &step {
            Step::Start(_) => "Preparing assessment...",
            Step::Proceed => "Loading next question...",
            Step::Reload => "Reloading question...",
        });
        let result = match &step {
            Step::Start(request) => controller.start(request.clone()).await.map(|()| None),
            Step::Proceed => controller.proceed().await.map(Some),
            Step::Reload => controller.reload().await.map(|()| None),
        };
        spinner.finish_and_clear();
        match result {
            Ok(outcome) => return Ok(outcome),
            Err(ControllerError::Transport(e)) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                term.write_line(&format!(
                    "{} {e}; retrying ({attempt}/{MAX_ATTEMPTS})",
                    style("!").yellow()
                ))?;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input(" 2 ", 4), Input::Choice(1));
        assert_eq!(parse_input("Q", 4), Input::Quit);
        assert_eq!(parse_input("0", 4), Input::Invalid);
        assert_eq!(parse_input("5", 4), Input::Invalid);
        assert_eq!(parse_input("two", 4), Input::Invalid);
    }

    #[test]
    fn test_parse_subject_course() {
        let target = parse_subject_course("Science: Biology").unwrap();
        assert_eq!(target, SubjectCourse::new("Science", "Biology"));
        assert!(parse_subject_course("Science").is_err());
        assert!(parse_subject_course(":Biology").is_err());
    }
}
