/// Task catalogue and name resolution for the command line
use color_eyre::{eyre::eyre, Result};

use crate::tasks::TaskName;

#[derive(Debug, Clone)]
pub struct TaskCommand {
  pub task: TaskName,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

impl TaskCommand {
  pub fn name(&self) -> &'static str {
    self.task.as_str()
  }
}

/// All runnable tasks
pub const TASKS: &[TaskCommand] = &[
  TaskCommand {
    task: TaskName::RequestCurrentWeather,
    aliases: &["current", "c"],
    description: "Fetch and store current weather for the configured location",
  },
  TaskCommand {
    task: TaskName::RequestWeatherForecast,
    aliases: &["forecast", "f"],
    description: "Fetch and store a forecast snapshot for the configured location",
  },
  TaskCommand {
    task: TaskName::CurrentWeatherCount,
    aliases: &["current-count", "cc"],
    description: "Count stored current weather observations",
  },
  TaskCommand {
    task: TaskName::WeatherForecastCount,
    aliases: &["forecast-count", "fc"],
    description: "Count stored forecast snapshots",
  },
];

/// Candidates with their match priority, best (lowest) first.
fn ranked(input: &str) -> Vec<(&'static TaskCommand, u32)> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return TASKS.iter().map(|cmd| (cmd, 6)).collect();
  }

  let mut matches: Vec<(&TaskCommand, u32)> = Vec::new();

  for cmd in TASKS {
    let name = cmd.name();

    // Exact match on name
    if name == input_lower {
      matches.push((cmd, 0));
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);
  matches
}

/// Get suggestions for a given input, best first
pub fn get_suggestions(input: &str) -> Vec<&'static TaskCommand> {
  ranked(input).into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve user input to a task. Fails when nothing matches or the best match is tied.
pub fn resolve(input: &str) -> Result<TaskName> {
  let matches = ranked(input);

  match matches.as_slice() {
    [] => Err(eyre!(
      "Unknown task '{}'. Run `weathersched tasks` to list tasks.",
      input
    )),
    // A single best match wins
    [(cmd, best), rest @ ..] if rest.first().map_or(true, |(_, next)| next > best) => {
      Ok(cmd.task)
    }
    candidates => {
      let names: Vec<&str> = candidates.iter().map(|(cmd, _)| cmd.name()).collect();
      Err(eyre!(
        "Ambiguous task '{}', did you mean one of: {}",
        input,
        names.join(", ")
      ))
    }
  }
}
