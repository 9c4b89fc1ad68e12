//! Drill Runner
//!
//! A remote worker that executes build/test pipelines for a coordinator.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: Durable task inbox and the status reporter
//! - Scheduler: Task intake, dispatcher and the fixed-size worker pool
//! - Services: Pipeline executor, process supervisor, log streaming
//! - Jobs: Handlers for source sync, unit tests and code checks
//!
//! Tasks land in the on-disk inbox (fed by intake), are handed one at a time
//! to idle workers, and every step's progress is posted back as it happens.

mod collaborators;
mod config;
mod context;
mod error;
mod jobs;
mod repository;
mod scheduler;
mod service;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::collaborators::{CommandLinter, GitCli};
use crate::config::Config;
use crate::context::WorkerContext;
use crate::jobs::JobRunner;
use crate::repository::{HttpReporter, Inbox, RetryPolicy};
use crate::scheduler::{Dispatcher, TaskIntake, pool};
use drill_client::CoordinatorClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drill_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Drill Runner");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: coordinator_url={}, workers={}, repo_dir={}, queue_dir={}",
        config.coordinator_url,
        config.parallel_workers,
        config.repo_storage_dir.display(),
        config.queue_dir.display()
    );

    // Open the durable inbox before anything else can run
    let inbox = Arc::new(
        Inbox::open(&config.queue_dir).context("Failed to initialize task inbox")?,
    );

    // Initialize coordinator client
    let client = CoordinatorClient::new(
        config.coordinator_url.clone(),
        &config.token,
        config.request_timeout,
    )
    .context("Failed to create coordinator client")?;

    info!("Coordinator client initialized");

    // Build the shared worker context
    let reporter = Arc::new(HttpReporter::new(
        client.clone(),
        RetryPolicy::with_attempts(config.report_attempts),
    ));
    let jobs = JobRunner::standard(
        Arc::new(GitCli::new()),
        Arc::new(CommandLinter::new(config.lint_command.clone())),
    );
    let ctx = WorkerContext::new(config.clone(), reporter, jobs);

    // Worker pool and the single hand-off slot feeding it
    let (handoff, tasks) = mpsc::channel(1);
    let workers = pool::spawn(Arc::clone(&ctx), tasks);

    match config.intake_interval {
        Some(interval) => {
            let intake = TaskIntake::new(client, Arc::clone(&inbox), interval);
            tokio::spawn(intake.run());
        }
        None => warn!("Task intake disabled; only tasks already in the inbox will run"),
    }

    let dispatcher = tokio::spawn(Dispatcher::new(inbox, handoff, &config).run());

    info!("Runner initialized successfully");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received, stopping");
        }
        result = dispatcher => {
            if let Err(e) = result {
                error!("Dispatcher stopped unexpectedly: {}", e);
            }
        }
    }

    for worker in workers {
        worker.abort();
    }

    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    match Config::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(e) => {
            info!("Failed to load config from environment ({}), using defaults", e);
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}
