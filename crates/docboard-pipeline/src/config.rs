//! Pipeline configuration from the environment.

use std::path::PathBuf;

use docboard_ingest::keywords::DEFAULT_KEYWORD_LIMIT;
use docboard_llm::{ConfigError, DEFAULT_TOKEN_BUDGET};

/// 16 MiB, the largest accepted upload by default.
pub const DEFAULT_MAX_FILE_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_STORE_DIR: &str = "dashboards";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_file_bytes: usize,
    pub prompt_token_budget: usize,
    pub store_dir: PathBuf,
    pub keyword_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            prompt_token_budget: DEFAULT_TOKEN_BUDGET,
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            keyword_limit: DEFAULT_KEYWORD_LIMIT,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let positive = |name: &str, default: usize| -> Result<usize, ConfigError> {
            match var(name) {
                None => Ok(default),
                Some(raw) => match raw.parse::<usize>() {
                    Ok(value) if value > 0 => Ok(value),
                    _ => Err(ConfigError::Invalid(format!(
                        "{name} must be a positive integer, got `{raw}`"
                    ))),
                },
            }
        };

        let defaults = Self::default();
        Ok(Self {
            max_file_bytes: positive("DOCBOARD_MAX_FILE_BYTES", defaults.max_file_bytes)?,
            prompt_token_budget: positive("DOCBOARD_PROMPT_TOKEN_BUDGET", defaults.prompt_token_budget)?,
            store_dir: var("DOCBOARD_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            keyword_limit: positive("DOCBOARD_KEYWORD_LIMIT", defaults.keyword_limit)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.max_file_bytes, 16_777_216);
        assert_eq!(config.store_dir, PathBuf::from("dashboards"));
    }

    #[test]
    fn test_overrides_and_validation() {
        let config = PipelineConfig::from_lookup(|name| match name {
            "DOCBOARD_MAX_FILE_BYTES" => Some("1024".to_string()),
            "DOCBOARD_STORE_DIR" => Some("/tmp/boards".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.max_file_bytes, 1024);
        assert_eq!(config.store_dir, PathBuf::from("/tmp/boards"));

        let bad = PipelineConfig::from_lookup(|name| {
            (name == "DOCBOARD_PROMPT_TOKEN_BUDGET").then(|| "lots".to_string())
        });
        assert!(matches!(bad, Err(ConfigError::Invalid(_))));
    }
}
