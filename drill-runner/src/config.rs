//! Worker configuration
//!
//! Defines all configurable parameters for the worker: coordinator
//! connection, pool size, storage locations, and the timeouts and buffer
//! sizes used while running jobs.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration
///
/// All timeouts and intervals are configurable so tests and slow
/// deployments can tune them without code changes.
#[derive(Debug, Clone)]
pub struct Config {
    /// Coordinator base URL (e.g., "http://localhost:8080")
    pub coordinator_url: String,

    /// Auth token sent with every coordinator request
    pub token: String,

    /// Number of tasks executed concurrently
    pub parallel_workers: usize,

    /// Root under which checkouts live as `<root>/<app>/<branch>`
    pub repo_storage_dir: PathBuf,

    /// Directory holding the durable task inbox
    pub queue_dir: PathBuf,

    /// Upper bound for a single coordinator request
    pub request_timeout: Duration,

    /// Hard wall-clock limit for a unit-test run
    pub unit_test_timeout: Duration,

    /// Shell command executed by unit-test jobs inside the checkout
    pub unit_test_command: String,

    /// Shell command executed by code-check jobs inside the checkout
    pub lint_command: String,

    /// Bytes of process output collected before a log chunk is streamed
    pub log_batch_size: usize,

    /// Sleep after finding the inbox empty
    pub empty_queue_backoff: Duration,

    /// Sleep after an inbox storage error
    pub queue_error_backoff: Duration,

    /// How often to ask the coordinator for new tasks (`None` disables intake)
    pub intake_interval: Option<Duration>,

    /// Attempts per status event (1 = fire-and-forget)
    pub report_attempts: u32,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(coordinator_url: String, token: String) -> Self {
        Self {
            coordinator_url,
            token,
            parallel_workers: 2,
            repo_storage_dir: PathBuf::from("/var/lib/drill/repos"),
            queue_dir: PathBuf::from("/var/lib/drill/queue"),
            request_timeout: Duration::from_secs(20),
            unit_test_timeout: Duration::from_secs(300), // 5 minutes
            unit_test_command: "go test -v -json ./...".to_string(),
            lint_command: "go vet ./...".to_string(),
            log_batch_size: 128,
            empty_queue_backoff: Duration::from_secs(1),
            queue_error_backoff: Duration::from_secs(10),
            intake_interval: Some(Duration::from_secs(5)),
            report_attempts: 1,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DRILL_COORDINATOR_URL (required)
    /// - DRILL_TOKEN (required)
    /// - DRILL_PARALLEL_WORKERS (optional, default: 2)
    /// - DRILL_REPO_DIR (optional, default: /var/lib/drill/repos)
    /// - DRILL_QUEUE_DIR (optional, default: /var/lib/drill/queue)
    /// - DRILL_REQUEST_TIMEOUT (optional, seconds, default: 20)
    /// - DRILL_UNIT_TEST_TIMEOUT (optional, seconds, default: 300)
    /// - DRILL_UNIT_TEST_COMMAND (optional, default: go test -v -json ./...)
    /// - DRILL_LINT_COMMAND (optional, default: go vet ./...)
    /// - DRILL_LOG_BATCH_SIZE (optional, bytes, default: 128)
    /// - DRILL_INTAKE_INTERVAL (optional, seconds, default: 5, 0 disables)
    /// - DRILL_REPORT_ATTEMPTS (optional, default: 1)
    pub fn from_env() -> anyhow::Result<Self> {
        let coordinator_url = std::env::var("DRILL_COORDINATOR_URL")
            .map_err(|_| anyhow::anyhow!("DRILL_COORDINATOR_URL environment variable not set"))?;

        let token = std::env::var("DRILL_TOKEN")
            .map_err(|_| anyhow::anyhow!("DRILL_TOKEN environment variable not set"))?;

        let mut config = Self::new(coordinator_url, token);

        if let Some(workers) = env_parse::<usize>("DRILL_PARALLEL_WORKERS") {
            config.parallel_workers = workers;
        }
        if let Ok(dir) = std::env::var("DRILL_REPO_DIR") {
            config.repo_storage_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DRILL_QUEUE_DIR") {
            config.queue_dir = PathBuf::from(dir);
        }
        if let Some(secs) = env_parse::<u64>("DRILL_REQUEST_TIMEOUT") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("DRILL_UNIT_TEST_TIMEOUT") {
            config.unit_test_timeout = Duration::from_secs(secs);
        }
        if let Ok(command) = std::env::var("DRILL_UNIT_TEST_COMMAND") {
            config.unit_test_command = command;
        }
        if let Ok(command) = std::env::var("DRILL_LINT_COMMAND") {
            config.lint_command = command;
        }
        if let Some(size) = env_parse::<usize>("DRILL_LOG_BATCH_SIZE") {
            config.log_batch_size = size;
        }
        if let Some(secs) = env_parse::<u64>("DRILL_INTAKE_INTERVAL") {
            config.intake_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(attempts) = env_parse::<u32>("DRILL_REPORT_ATTEMPTS") {
            config.report_attempts = attempts;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.coordinator_url.is_empty() {
            anyhow::bail!("coordinator_url cannot be empty");
        }

        if !self.coordinator_url.starts_with("http://")
            && !self.coordinator_url.starts_with("https://")
        {
            anyhow::bail!("coordinator_url must start with http:// or https://");
        }

        if self.token.is_empty() {
            anyhow::bail!("token cannot be empty");
        }

        if self.parallel_workers == 0 {
            anyhow::bail!("parallel_workers must be greater than 0");
        }

        if self.log_batch_size == 0 {
            anyhow::bail!("log_batch_size must be greater than 0");
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.unit_test_timeout.is_zero() {
            anyhow::bail!("unit_test_timeout must be greater than 0");
        }

        if self.unit_test_command.trim().is_empty() {
            anyhow::bail!("unit_test_command cannot be empty");
        }

        if self.report_attempts == 0 {
            anyhow::bail!("report_attempts must be at least 1");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8080".to_string(), "drill".to_string())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}
