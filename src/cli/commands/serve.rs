//! Implementation of the `assessor serve` command.

use anyhow::Result;
use clap::Args;

use crate::adapters::http::AssessmentHttpServer;
use crate::cli::engine::Engine;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Debug, serde::Serialize)]
pub struct ServeOutput {
    pub address: String,
    pub generator: String,
    pub database: String,
}

impl CommandOutput for ServeOutput {
    fn to_human(&self) -> String {
        format!(
            "Assessment server listening on http://{}\n  generator: {}\n  database:  {}\nPress Ctrl+C to stop.",
            self.address, self.generator, self.database
        )
    }
}

pub async fn execute(args: ServeArgs, config: Config, json_mode: bool) -> Result<()> {
    let mut server_config = config.server.clone();
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }

    let engine = Engine::build(&config).await?;

    output(
        &ServeOutput {
            address: format!("{}:{}", server_config.host, server_config.port),
            generator: config.generator.kind.as_str().to_string(),
            database: config.database.path.clone(),
        },
        json_mode,
    );

    AssessmentHttpServer::new(engine.app_state(), server_config)
        .serve_with_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {e}"))?;

    engine.pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    tracing::info!("shutdown signal received");
}
