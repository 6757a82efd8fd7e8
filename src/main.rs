use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tripplan::cli::{Cli, Command};
use tripplan::housekeeping::{spawn_artifact_cleanup, spawn_plan_purge};
use tripplan::{
    AppState, FjallPlanStore, InMemoryPlanStore, PlanQuery, PlanRequest, PlanStore,
    TripPlanConfig, logging, web,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TripPlanConfig::load_from_path(cli.config.clone())
        .context("Failed to load configuration")?;
    logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Command::Serve { port } => cmd_serve(config, port).await,
        Command::Plan {
            city,
            origin,
            destination,
            ticket_keyword,
            thread_id,
        } => {
            let ticket_keyword = ticket_keyword.unwrap_or_else(|| destination.clone());
            let query = PlanQuery::new(city, origin, destination, ticket_keyword);
            cmd_plan(config, query, thread_id).await
        }
    }
}

async fn cmd_serve(config: TripPlanConfig, port: Option<u16>) -> Result<()> {
    if let Err(e) = config.validate_api_keys() {
        warn!("{e}; plan requests will fail until it is configured");
    }

    let output_dir = PathBuf::from(&config.server.output_dir);
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let store: Arc<dyn PlanStore> = Arc::new(
        FjallPlanStore::open(&config.storage.path)
            .with_context(|| format!("Failed to open plan store at {}", config.storage.path))?,
    );
    let state = AppState::from_config(&config, store.clone())?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        signal.cancel();
    });

    let cleanup = spawn_artifact_cleanup(
        output_dir,
        config.server.cleanup_interval(),
        config.server.artifact_max_age(),
        shutdown.clone(),
    );
    let purge = spawn_plan_purge(store, config.storage.purge_interval(), shutdown.clone());

    let result = web::run(state, port.unwrap_or(config.server.port), shutdown.clone()).await;
    shutdown.cancel();
    let _ = tokio::join!(cleanup, purge);
    result
}

async fn cmd_plan(config: TripPlanConfig, query: PlanQuery, thread_id: Option<String>) -> Result<()> {
    config.validate_api_keys()?;

    let state = AppState::from_config(&config, Arc::new(InMemoryPlanStore::new()))?;
    let request = PlanRequest {
        thread_id: thread_id.unwrap_or_else(|| format!("cli-{}", Utc::now().timestamp_millis())),
        user_id: 1,
        query,
    };

    let cancel = CancellationToken::new();
    let generated = state
        .lifecycle
        .generate(&request, &cancel)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("{}", generated.summary);
    println!("HTML:     {}", generated.artifacts.html_path);
    println!("Markdown: {}", generated.artifacts.markdown_path);
    println!("H5 URL:   {}", generated.artifacts.h5_url);
    Ok(())
}
