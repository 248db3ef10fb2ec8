//! Fixed-interval scheduler for the long-running `run` mode.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::ScheduleConfig;
use crate::http::Transport;
use crate::tasks::{TaskName, TaskOutcome, TaskRunner};

/// Longest interval a job may have; larger configured values are clamped.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A task and how often to run it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
  pub task: TaskName,
  pub every: Duration,
}

/// Jobs for every task with a non-zero interval.
pub fn jobs(config: &ScheduleConfig) -> Vec<Job> {
  let candidates = [
    (TaskName::RequestCurrentWeather, config.current_weather_mins.saturating_mul(60)),
    (TaskName::CurrentWeatherCount, config.current_weather_count_mins.saturating_mul(60)),
    (TaskName::RequestWeatherForecast, config.weather_forecast_hours.saturating_mul(3600)),
    (TaskName::WeatherForecastCount, config.forecast_count_mins.saturating_mul(60)),
  ];

  candidates
    .into_iter()
    .filter_map(|(task, secs)| {
      if secs == 0 {
        warn!(task = %task, "Interval is zero, task disabled");
        None
      } else {
        let every = Duration::from_secs(secs);
        if every > MAX_INTERVAL {
          warn!(task = %task, every_secs = secs, "Interval too long, clamping");
        }
        Some(Job {
          task,
          every: every.min(MAX_INTERVAL),
        })
      }
    })
    .collect()
}

/// Run every job on its interval until `shutdown` completes.
///
/// Each job runs on its own tokio task and awaits its outcome before the next
/// tick, so a task never overlaps with itself. Failed ticks are logged and the
/// loop continues.
pub async fn run<T, F>(runner: Arc<TaskRunner<T>>, jobs: Vec<Job>, shutdown: F)
where
  T: Transport + 'static,
  F: Future<Output = ()>,
{
  let handles: Vec<_> = jobs
    .into_iter()
    .map(|job| {
      info!(task = %job.task, every_secs = job.every.as_secs(), "Scheduling task");
      tokio::spawn(run_job(Arc::clone(&runner), job))
    })
    .collect();

  shutdown.await;
  info!("Shutting down scheduler");

  for handle in &handles {
    handle.abort();
  }
  join_all(handles).await;
}

async fn run_job<T: Transport>(runner: Arc<TaskRunner<T>>, job: Job) {
  let mut ticker = tokio::time::interval(job.every);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    ticker.tick().await;
    debug!(task = %job.task, "Running scheduled task");

    match runner.run_once(job.task).await {
      TaskOutcome::Success { .. } => debug!(task = %job.task, "Task succeeded"),
      TaskOutcome::SoftFailure { reason } => {
        warn!(task = %job.task, reason = %reason, "Task produced no result")
      }
      TaskOutcome::FatalFailure { error } => {
        error!(task = %job.task, error = %error, "Task failed, waiting for next tick")
      }
    }
  }
}
