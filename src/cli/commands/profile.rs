//! Learner profile CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::adapters::sqlite::{initialize_database, SqliteProfileRepository};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, SubjectCourse};
use crate::domain::ports::{LearnerProfile, ProfileStore};

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommands,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Create or replace a learner's profile
    Set {
        /// Learner id
        #[arg(short, long)]
        user: String,
        /// Default subject for new assessments
        #[arg(long)]
        subject: String,
        /// Default course for new assessments
        #[arg(long)]
        course: String,
        /// Interests (comma-separated)
        #[arg(long, value_delimiter = ',')]
        interests: Vec<String>,
    },
    /// Show a learner's profile
    Show {
        /// Learner id
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct ProfileOutput {
    pub user_id: String,
    pub subject: String,
    pub course: String,
    pub interests: Vec<String>,
    pub updated_at: String,
}

impl From<&LearnerProfile> for ProfileOutput {
    fn from(p: &LearnerProfile) -> Self {
        Self {
            user_id: p.user_id.clone(),
            subject: p.subject.clone(),
            course: p.course.clone(),
            interests: p.interests.clone(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}

impl CommandOutput for ProfileOutput {
    fn to_human(&self) -> String {
        let interests = if self.interests.is_empty() {
            "-".to_string()
        } else {
            self.interests.join(", ")
        };
        [
            format!("Learner:   {}", self.user_id),
            format!("Default:   {} / {}", self.subject, self.course),
            format!("Interests: {interests}"),
            format!("Updated:   {}", self.updated_at),
        ]
        .join("\n")
    }
}

pub async fn execute(args: ProfileArgs, config: Config, json_mode: bool) -> Result<()> {
    let pool = initialize_database(&config.database)
        .await
        .context("Failed to initialize database")?;
    let repo = SqliteProfileRepository::new(pool);

    match args.command {
        ProfileCommands::Set {
            user,
            subject,
            course,
            interests,
        } => {
            let target = SubjectCourse::new(subject.trim(), course.trim());
            target.validate()?;

            let mut profile = LearnerProfile::new(user, target);
            profile.interests = interests
                .into_iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect();
            repo.upsert(&profile).await?;
            output(&ProfileOutput::from(&profile), json_mode);
        }
        ProfileCommands::Show { user } => {
            let profile = repo
                .get(&user)
                .await?
                .with_context(|| format!("No profile for learner {user}"))?;
            output(&ProfileOutput::from(&profile), json_mode);
        }
    }

    Ok(())
}
