//! Configuration validation rules.

use super::schema::Config;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.store.notify_capacity == 0 {
        errors.push("store.notify_capacity must be > 0".to_string());
    }

    if config.questions.max_questions == 0 {
        errors.push("questions.max_questions must be > 0".to_string());
    }
    if config.questions.max_options < 2 {
        errors.push("questions.max_options must be >= 2".to_string());
    }
    if config.questions.other_label.trim().is_empty() {
        errors.push("questions.other_label must not be empty".to_string());
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(format!(
            "logging.level must be one of {}",
            LOG_LEVELS.join(", ")
        ));
    }
    if !matches!(config.logging.format.to_ascii_lowercase().as_str(), "text" | "json") {
        errors.push("logging.format must be text or json".to_string());
    }
    if config.logging.dir.trim().is_empty() {
        errors.push("logging.dir must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_errors_are_aggregated() {
        let mut config = Config::default();
        config.store.notify_capacity = 0;
        config.questions.max_options = 1;
        config.logging.format = "yaml".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("store.notify_capacity"));
        assert!(err.contains("questions.max_options"));
        assert!(err.contains("logging.format"));
    }
}
