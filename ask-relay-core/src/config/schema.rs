//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for ask-relay
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Session store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Question relay configuration
    #[serde(default)]
    pub questions: QuestionsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
    /// Days to keep rotated log files
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_retention_days() -> u64 {
    7
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
            retention_days: default_retention_days(),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Buffered commit notifications per subscriber before it lags
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,
}

fn default_notify_capacity() -> usize {
    256
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            notify_capacity: default_notify_capacity(),
        }
    }
}

/// AskUserQuestion limits and labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsConfig {
    /// Maximum questions in one tool call
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
    /// Maximum options per question
    #[serde(default = "default_max_options")]
    pub max_options: usize,
    /// Label used for a free-text answer with no text
    #[serde(default = "default_other_label")]
    pub other_label: String,
}

fn default_max_questions() -> usize {
    4
}

fn default_max_options() -> usize {
    4
}

fn default_other_label() -> String {
    "Other".to_string()
}

impl Default for QuestionsConfig {
    fn default() -> Self {
        Self {
            max_questions: default_max_questions(),
            max_options: default_max_options(),
            other_label: default_other_label(),
        }
    }
}
