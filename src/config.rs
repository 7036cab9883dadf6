//! Application-level configuration loading, including round budget, collaborator
//! timeouts, and the scripted fallback lines used when generation is unavailable.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DATE_NIGHT_BACK_CONFIG_PATH";

/// Total rounds in a game unless configured otherwise.
pub const DEFAULT_MAX_ROUNDS: u32 = 6;

/// In-character lines used whenever the generation collaborator fails or times out.
const DEFAULT_FALLBACK_LINES: &[&str] = &[
    "Wow... I genuinely don't know what to say to that.",
    "Okay, interesting! Tell me more over dessert.",
    "That's... a choice. I respect it.",
    "You really know how to keep a date on its toes.",
];

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Total round budget for a game (wrap-up round included).
    pub max_rounds: u32,
    /// Cap on a single generation collaborator call.
    pub generation_timeout: Duration,
    /// Cap on waiting for the narration queue to drain between phases.
    pub narration_wait_cap: Duration,
    /// Fixed duration of the wheel spin animation window.
    pub spin_duration: Duration,
    /// How long the host waits for every participant to submit an answer.
    pub answer_timeout: Duration,
    /// How long the wheel stays open for weight votes before the draw.
    pub voting_window: Duration,
    /// Delay before a late-arriving client is redirected off the ended screen.
    pub ending_settle_delay: Duration,
    fallback_lines: Vec<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        max_rounds = config.max_rounds,
                        "loaded configuration from file"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Deterministic fallback line for the given round, cycling through the set.
    pub fn fallback_line(&self, round: u32) -> &str {
        let index = round as usize % self.fallback_lines.len();
        &self.fallback_lines[index]
    }

    /// The full set of scripted fallback lines.
    pub fn fallback_lines(&self) -> &[String] {
        &self.fallback_lines
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            generation_timeout: Duration::from_secs(10),
            narration_wait_cap: Duration::from_secs(12),
            spin_duration: Duration::from_secs(9),
            answer_timeout: Duration::from_secs(45),
            voting_window: Duration::from_secs(8),
            ending_settle_delay: Duration::from_millis(1500),
            fallback_lines: DEFAULT_FALLBACK_LINES
                .iter()
                .map(|line| (*line).to_owned())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    max_rounds: Option<u32>,
    generation_timeout_secs: Option<u64>,
    narration_wait_cap_secs: Option<u64>,
    spin_duration_secs: Option<u64>,
    answer_timeout_secs: Option<u64>,
    voting_window_secs: Option<u64>,
    ending_settle_delay_ms: Option<u64>,
    fallback_lines: Option<Vec<String>>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let fallback_lines = match raw.fallback_lines {
            Some(lines) if !lines.is_empty() => lines,
            _ => defaults.fallback_lines.clone(),
        };
        Self {
            // A game needs at least one question round plus the wrap-up.
            max_rounds: raw.max_rounds.unwrap_or(defaults.max_rounds).max(2),
            generation_timeout: raw
                .generation_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.generation_timeout),
            narration_wait_cap: raw
                .narration_wait_cap_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.narration_wait_cap),
            spin_duration: raw
                .spin_duration_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.spin_duration),
            answer_timeout: raw
                .answer_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.answer_timeout),
            voting_window: raw
                .voting_window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.voting_window),
            ending_settle_delay: raw
                .ending_settle_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.ending_settle_delay),
            fallback_lines,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
