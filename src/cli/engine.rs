//! Wiring of the engine's services from configuration.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::adapters::generators::build_generator;
use crate::adapters::http::AppState;
use crate::adapters::sqlite::{initialize_database, SqliteAttemptRepository, SqliteProfileRepository};
use crate::adapters::HttpPathBuilder;
use crate::domain::models::Config;
use crate::domain::ports::{NullPathBuilder, PathBuilder};
use crate::services::{
    CoordinatorSettings, ItemAdapter, SafetyFilter, SessionFinalizer, SpeculationCoordinator,
};

/// The assembled services behind both the server and the in-process client.
pub struct Engine {
    pub pool: SqlitePool,
    pub coordinator: Arc<SpeculationCoordinator>,
    pub finalizer: Arc<SessionFinalizer>,
    pub profiles: Arc<SqliteProfileRepository>,
    pub attempts: Arc<SqliteAttemptRepository>,
}

impl Engine {
    /// Open (and migrate) the configured database, then wire the services.
    pub async fn build(config: &Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .with_context(|| format!("Failed to initialize database at {}", config.database.path))?;
        Self::with_pool(config, pool)
    }

    /// Wire the services on top of an already migrated pool.
    pub fn with_pool(config: &Config, pool: SqlitePool) -> Result<Self> {
        let generator = build_generator(&config.generator, &config.rate_limit)
            .context("Failed to build item generator")?;
        let filter = SafetyFilter::new(&config.generator.deny_patterns)?;
        let items = Arc::new(ItemAdapter::new(generator, filter));

        let profiles = Arc::new(SqliteProfileRepository::new(pool.clone()));
        let attempts = Arc::new(SqliteAttemptRepository::new(pool.clone()));

        let coordinator = Arc::new(SpeculationCoordinator::new(
            items,
            profiles.clone(),
            CoordinatorSettings::from(&config.assessment),
        ));

        let paths: Arc<dyn PathBuilder> = match &config.path_builder.url {
            Some(url) => Arc::new(HttpPathBuilder::new(
                url.clone(),
                &config.path_builder,
                config.retry.clone(),
            )?),
            None => {
                tracing::info!("no path builder configured; learning paths are skipped");
                Arc::new(NullPathBuilder::new())
            }
        };
        let finalizer = Arc::new(
            SessionFinalizer::new(attempts.clone(), paths)
                .with_neutral_accuracy(config.assessment.neutral_accuracy),
        );

        Ok(Self {
            pool,
            coordinator,
            finalizer,
            profiles,
            attempts,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            coordinator: Arc::clone(&self.coordinator),
            finalizer: Arc::clone(&self.finalizer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    #[tokio::test]
    async fn test_default_config_wires_bank_engine() {
        let pool = create_migrated_test_pool().await.unwrap();
        let engine = Engine::with_pool(&Config::default(), pool).unwrap();
        assert_eq!(engine.coordinator.settings().max_steps, 6);
    }
}
