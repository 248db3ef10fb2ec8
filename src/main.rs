mod cache;
mod commands;
mod config;
mod db;
mod http;
mod scheduler;
mod tasks;
#[cfg(test)]
mod testing;
mod weatherapi;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::{CacheBackend, CachePolicy, CacheTransport};
use config::{Config, LoggingConfig};
use db::{Database, WeatherStore};
use http::ReqwestTransport;
use tasks::TaskRunner;
use weatherapi::{RetryPolicy, WeatherApiClient};

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "WEATHERSCHED_LOG";

#[derive(Parser, Debug)]
#[command(name = "weathersched")]
#[command(about = "Fetches WeatherAPI data on a schedule and stores it in SQLite")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./weathersched.yaml, then the XDG config dir)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Location to query, overriding api.default_location
  #[arg(short, long)]
  location: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run every task on its interval until interrupted
  Run,
  /// Run one task and print its outcome as JSON
  Once {
    /// Task name or alias
    task: String,
  },
  /// List tasks and their intervals
  Tasks {
    /// Only show tasks matching this text
    filter: Option<String>,
  },
}

type LiveTransport = CacheTransport<ReqwestTransport, CacheBackend>;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override location if specified on command line
  if let Some(location) = args.location {
    config.api.default_location = Some(location);
  }

  let _guard = init_tracing(&config.logging)?;

  match &config.source {
    Some(path) => info!(path = %path.display(), "Loaded configuration"),
    None => debug!("No configuration file found, using defaults"),
  }

  match args.command {
    Command::Tasks { filter } => {
      print_tasks(&config, filter.as_deref().unwrap_or(""));
    }
    Command::Once { task } => {
      let task = commands::resolve(&task)?;
      let runner = build_runner(&config)?;

      let outcome = runner.run_once(task).await;
      println!("{}", serde_json::to_string_pretty(&outcome)?);

      if outcome.is_fatal() {
        return Err(eyre!("Task {} failed", task));
      }
    }
    Command::Run => {
      let runner = Arc::new(build_runner(&config)?);
      let jobs = scheduler::jobs(&config.schedule);
      if jobs.is_empty() {
        return Err(eyre!("Every task interval is zero, nothing to schedule"));
      }

      info!(location = ?config.api.default_location, "Starting scheduler");
      scheduler::run(runner, jobs, shutdown_signal()).await;
    }
  }

  Ok(())
}

/// Log to stderr, and to a daily-rotated file when a log directory is configured.
///
/// The returned guard flushes the file writer on drop and must outlive logging.
fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
  let stderr = fmt::layer().with_writer(std::io::stderr);

  match &config.directory {
    Some(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "weathersched.log"));

      tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

      Ok(None)
    }
  }
}

/// Wire transport, cache, client and store together from configuration.
fn build_runner(config: &Config) -> Result<TaskRunner<LiveTransport>> {
  let api_key = Config::get_api_key()?;

  let network = ReqwestTransport::new(config.api.timeout())?;
  let backend = CacheBackend::open(&config.cache)?;
  info!(backend = backend.kind(), "HTTP cache ready");
  let transport = CacheTransport::new(network, backend, CachePolicy::from_config(&config.cache));

  let client = WeatherApiClient::new(
    transport,
    api_key,
    &config.api.base_url,
    RetryPolicy::from(&config.retry),
  )?;

  let db_path = config.database.path()?;
  info!(path = %db_path.display(), "Opening weather database");
  let store = WeatherStore::new(Database::open(&db_path)?);

  Ok(TaskRunner::new(client, store, config.api.clone()))
}

fn print_tasks(config: &Config, filter: &str) {
  let jobs = scheduler::jobs(&config.schedule);

  for cmd in commands::get_suggestions(filter) {
    let every = jobs
      .iter()
      .find(|job| job.task == cmd.task)
      .map(|job| format!("every {}s", job.every.as_secs()))
      .unwrap_or_else(|| "disabled".to_string());

    println!(
      "{:<26} {:<20} {:<14} {}",
      cmd.name(),
      cmd.aliases.join(", "),
      every,
      cmd.description
    );
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(error = %e, "Failed to listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
}
