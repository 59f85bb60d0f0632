use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "retry.max_attempts must be at least 1".to_string(),
        });
    }
    if config.retry.multiplier < 1.0 {
        return Err(ConfigError::Validation {
            message: format!(
                "retry.multiplier must be >= 1.0, got {}",
                config.retry.multiplier
            ),
        });
    }
    if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
        return Err(ConfigError::Validation {
            message: format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                config.retry.initial_backoff_ms, config.retry.max_backoff_ms
            ),
        });
    }

    if config.digest.per_section_chars > config.digest.max_chars {
        return Err(ConfigError::Validation {
            message: "digest.per_section_chars cannot exceed digest.max_chars".to_string(),
        });
    }

    if config.storage.bootstrap_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "storage.bootstrap_attempts must be at least 1".to_string(),
        });
    }

    let access = &config.access;
    if !access.plans.contains_key(&access.default_plan) {
        return Err(ConfigError::UnknownPlan {
            plan: access.default_plan.clone(),
            referenced_by: "access.default_plan".to_string(),
        });
    }
    for (actor, plan) in &access.actors {
        if !access.plans.contains_key(plan) {
            return Err(ConfigError::UnknownPlan {
                plan: plan.clone(),
                referenced_by: format!("access.actors.{}", actor),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use crate::model::Severity;

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.access.default_plan, "free");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database_path": "/var/lib/longform/longform.db",
            "asset_directory": "/var/lib/longform/assets",
            "provider": {
                "base_url": "http://localhost:8080/v1",
                "text_model": "local-writer",
                "api_key_env": "LOCAL_KEY",
                "request_timeout_secs": 30
            },
            "retry": { "max_attempts": 5, "initial_backoff_ms": 100, "max_backoff_ms": 2000 },
            "consistency": { "rewrite_threshold": "minor", "max_automatic_rewrites": 2 },
            "pipeline": { "run_media_step": true },
            "media": { "pacing_ms": 0, "diagram_size": { "width": 800, "height": 600 } },
            "access": {
                "plans": { "team": { "daily_jobs": 10, "char_limit": 40000 } },
                "actors": { "alice": "team" },
                "default_plan": "team"
            },
            "logging": { "format": "json", "filter": "longform=debug" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.provider.base_url, "http://localhost:8080/v1");
        assert_eq!(config.provider.image_model, "gpt-image-1");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.consistency.rewrite_threshold, Severity::Minor);
        assert_eq!(config.consistency.max_automatic_rewrites, 2);
        assert!(config.pipeline.run_media_step);
        assert_eq!(config.media.diagram_size.width, 800);
        assert_eq!(config.access.actors["alice"], "team");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unsupported_version() {
        let err = load_config_from_str(r#"{ "version": "2.0" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_unknown_key_rejected_by_schema() {
        let err = load_config_from_str(r#"{ "version": "1.0", "workers": 4 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_bad_severity_rejected_by_schema() {
        let err = load_config_from_str(
            r#"{ "version": "1.0", "consistency": { "rewrite_threshold": "severe" } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_backoff_ordering() {
        let err = load_config_from_str(
            r#"{ "version": "1.0", "retry": { "initial_backoff_ms": 5000, "max_backoff_ms": 100 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_unknown_actor_plan() {
        let err = load_config_from_str(
            r#"{ "version": "1.0", "access": { "actors": { "bob": "enterprise" } } }"#,
        )
        .unwrap_err();
        match err {
            ConfigError::UnknownPlan {
                plan,
                referenced_by,
            } => {
                assert_eq!(plan, "enterprise");
                assert_eq!(referenced_by, "access.actors.bob");
            }
            other => panic!("expected UnknownPlan, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_default_plan() {
        let err = load_config_from_str(
            r#"{ "version": "1.0", "access": { "plans": { "team": { "daily_jobs": 1, "char_limit": 10 } } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlan { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let err = load_config_from_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/longform.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
