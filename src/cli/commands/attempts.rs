//! Attempt history CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::adapters::http::ANONYMOUS_USER;
use crate::adapters::sqlite::{initialize_database, SqliteAttemptRepository};
use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{AssessmentAttempt, Config};
use crate::domain::ports::AttemptRepository;

#[derive(Args, Debug)]
pub struct AttemptsArgs {
    #[command(subcommand)]
    pub command: AttemptsCommands,
}

#[derive(Subcommand, Debug)]
pub enum AttemptsCommands {
    /// List a learner's most recent attempts
    List {
        /// Learner id
        #[arg(short, long, default_value = ANONYMOUS_USER)]
        user: String,
        /// Maximum number of attempts to display
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Show one attempt by its idempotency key
    Show {
        /// Attempt key (as printed by `attempts list --json`)
        key: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct AttemptOutput {
    pub id: String,
    pub attempt_key: String,
    pub user_id: String,
    pub subject: String,
    pub course: String,
    pub final_difficulty: String,
    pub steps_taken: u32,
    pub mistakes: u32,
    pub correct_total: u32,
    pub question_total: u32,
    pub accuracy: f64,
    pub created_at: String,
}

impl From<&AssessmentAttempt> for AttemptOutput {
    fn from(a: &AssessmentAttempt) -> Self {
        Self {
            id: a.id.to_string(),
            attempt_key: a.attempt_key.clone(),
            user_id: a.user_id.clone(),
            subject: a.subject.clone(),
            course: a.course.clone(),
            final_difficulty: a.final_difficulty.as_str().to_string(),
            steps_taken: a.steps_taken,
            mistakes: a.mistakes,
            correct_total: a.correct_total,
            question_total: a.question_total,
            accuracy: a.accuracy,
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct AttemptListOutput {
    pub attempts: Vec<AttemptOutput>,
    pub total: usize,
}

impl CommandOutput for AttemptListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["when", "subject", "course", "reached", "score", "accuracy"]);
        for a in &self.attempts {
            table.add_row(vec![
                a.created_at.get(..16).unwrap_or(a.created_at.as_str()).replace('T', " "),
                truncate(&a.subject, 20),
                truncate(&a.course, 24),
                a.final_difficulty.clone(),
                format!("{}/{}", a.correct_total, a.question_total),
                format!("{:.0}%", a.accuracy * 100.0),
            ]);
        }
        render_list("attempt", &table, self.total)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct AttemptDetailOutput {
    pub attempt: AttemptOutput,
}

impl CommandOutput for AttemptDetailOutput {
    fn to_human(&self) -> String {
        let a = &self.attempt;
        [
            format!("Attempt:    {}", a.id),
            format!("Key:        {}", a.attempt_key),
            format!("Learner:    {}", a.user_id),
            format!("Assessment: {} / {}", a.subject, a.course),
            format!("Reached:    {}", a.final_difficulty),
            format!("Steps:      {} ({} mistake(s))", a.steps_taken, a.mistakes),
            format!(
                "Score:      {}/{} ({:.0}%)",
                a.correct_total,
                a.question_total,
                a.accuracy * 100.0
            ),
            format!("Recorded:   {}", a.created_at),
        ]
        .join("\n")
    }
}

pub async fn execute(args: AttemptsArgs, config: Config, json_mode: bool) -> Result<()> {
    let pool = initialize_database(&config.database)
        .await
        .context("Failed to initialize database")?;
    let repo = SqliteAttemptRepository::new(pool);

    match args.command {
        AttemptsCommands::List { user, limit } => {
            let attempts = repo.list_for_user(&user, limit).await?;
            let result = AttemptListOutput {
                total: attempts.len(),
                attempts: attempts.iter().map(AttemptOutput::from).collect(),
            };
            output(&result, json_mode);
        }
        AttemptsCommands::Show { key } => {
            let attempt = repo
                .get_by_key(&key)
                .await?
                .with_context(|| format!("No attempt with key {key}"))?;
            output(
                &AttemptDetailOutput {
                    attempt: AttemptOutput::from(&attempt),
                },
                json_mode,
            );
        }
    }

    Ok(())
}
