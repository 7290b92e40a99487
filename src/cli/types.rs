//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::attempts::AttemptsArgs;
use super::commands::profile::ProfileArgs;
use super::commands::quiz::QuizArgs;
use super::commands::serve::ServeArgs;

#[derive(Parser, Debug)]
#[command(name = "assessor")]
#[command(about = "Adaptive diagnostic assessments with speculative prefetching", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .assessor/config.yaml and local.yaml)
    #[arg(short, long, global = true, env = "ASSESSOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Keep info-level logs during interactive commands
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the assessment HTTP server
    Serve(ServeArgs),

    /// Take an assessment in the terminal
    Quiz(QuizArgs),

    /// Inspect recorded assessment attempts
    Attempts(AttemptsArgs),

    /// Manage learner profiles
    Profile(ProfileArgs),
}

impl Commands {
    /// Commands that talk to a human on the terminal while they run.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Quiz(_))
    }
}
