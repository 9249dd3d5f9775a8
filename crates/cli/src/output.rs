//! CLI output formatting utilities.
//!
//! Colored status lines, human-readable sizes and durations, and JSON output
//! for `-o json`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{AnsiColors, OwoColorize, Stream};

use flowgen_lib::orchestrator::StepState;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub const ARROW: &str = "→";

/// Size with a binary unit, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KB", "MB", "GB"];
  if bytes < 1024 {
    return format!("{bytes} B");
  }
  let mut value = bytes as f64 / 1024.0;
  let mut unit = 0;
  while value >= 1024.0 && unit + 1 < UNITS.len() {
    value /= 1024.0;
    unit += 1;
  }
  format!("{value:.1} {}", UNITS[unit])
}

/// Elapsed wall time: `50ms`, `1.50s` or `1m 5s`.
pub fn format_duration(duration: Duration) -> String {
  match duration.as_millis() {
    ms if ms < 1_000 => format!("{ms}ms"),
    ms if ms < 60_000 => format!("{}.{:02}s", ms / 1_000, (ms % 1_000) / 10),
    ms => format!("{}m {}s", ms / 60_000, (ms / 1_000) % 60),
  }
}

/// RFC 3339 timestamp for Unix seconds.
pub fn format_timestamp(secs: u64) -> String {
  humantime::format_rfc3339_seconds(UNIX_EPOCH + Duration::from_secs(secs)).to_string()
}

/// Coarse age such as `3h` or `2days`, relative to now.
pub fn format_age(secs: u64) -> String {
  let created = UNIX_EPOCH + Duration::from_secs(secs);
  let age = SystemTime::now().duration_since(created).unwrap_or_default();
  // whole minutes past an hour, whole hours past a day
  let rounded = match age.as_secs() {
    s if s >= 86_400 => Duration::from_secs(s - s % 3_600),
    s if s >= 3_600 => Duration::from_secs(s - s % 60),
    s => Duration::from_secs(s),
  };
  humantime::format_duration(rounded).to_string()
}

#[derive(Debug, Clone, Copy)]
enum Tone {
  Success,
  Info,
  Warning,
  Error,
}

impl Tone {
  fn symbol(self) -> &'static str {
    match self {
      Tone::Success => "✓",
      Tone::Info => "•",
      Tone::Warning => "⚠",
      Tone::Error => "✗",
    }
  }

  fn color(self) -> AnsiColors {
    match self {
      Tone::Success => AnsiColors::Green,
      Tone::Info => AnsiColors::Blue,
      Tone::Warning => AnsiColors::Yellow,
      Tone::Error => AnsiColors::Red,
    }
  }
}

/// Success and info lines go to stdout; warnings and errors go to stderr with
/// the message colored too.
fn announce(tone: Tone, message: &str) {
  let color = tone.color();
  match tone {
    Tone::Success | Tone::Info => println!(
      "{} {message}",
      tone.symbol().if_supports_color(Stream::Stdout, |s| s.color(color))
    ),
    Tone::Warning | Tone::Error => eprintln!(
      "{} {}",
      tone.symbol().if_supports_color(Stream::Stderr, |s| s.color(color)),
      message.if_supports_color(Stream::Stderr, |s| s.color(color))
    ),
  }
}

pub fn print_success(message: &str) {
  announce(Tone::Success, message);
}

pub fn print_info(message: &str) {
  announce(Tone::Info, message);
}

pub fn print_warning(message: &str) {
  announce(Tone::Warning, message);
}

pub fn print_error(message: &str) {
  announce(Tone::Error, message);
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// Step freshness, colored by state.
pub fn format_state(state: StepState) -> String {
  let text = state.to_string();
  let color = match state {
    StepState::UpToDate => AnsiColors::Green,
    StepState::Stale => AnsiColors::Yellow,
    StepState::NotBuilt => return text.if_supports_color(Stream::Stdout, |s| s.dimmed()).to_string(),
  };
  text.if_supports_color(Stream::Stdout, |s| s.color(color)).to_string()
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
