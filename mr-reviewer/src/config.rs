//! Review-filter configuration, loaded from environment variables.
//!
//! Mirrors `codegraph-prep::config::model::GraphConfig::load_from_env_or_default`:
//! read an optional env var, fall back to a documented default, validate once
//! at startup. Tolerant of missing/unparsable values — they silently keep the
//! default rather than failing the whole process.

use std::env;

use crate::errors::{ConfigError, MrResult};

/// The review filter + feature toggles, one field per env var.
#[derive(Debug, Clone)]
pub struct ReviewFilterConfig {
    pub max_files: usize,
    pub max_file_size_bytes: u64,
    pub max_total_tokens: usize,
    pub allowed_extensions: Vec<String>,
    pub excluded_path_globs: Vec<String>,
    pub enable_description_generation: bool,
    pub verbose: bool,
    pub max_concurrency: usize,
}

impl Default for ReviewFilterConfig {
    fn default() -> Self {
        Self {
            max_files: 200,
            max_file_size_bytes: 2 * 1024 * 1024,
            max_total_tokens: 120_000,
            allowed_extensions: default_allowed_extensions(),
            excluded_path_globs: vec![
                ".git/**".into(),
                "node_modules/**".into(),
                "build/**".into(),
                "target/**".into(),
                "dist/**".into(),
            ],
            enable_description_generation: false,
            verbose: false,
            max_concurrency: 8,
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    [
        "go", "js", "jsx", "ts", "tsx", "py", "java", "c", "h", "cc", "cpp", "hpp", "cs", "php",
        "rb", "rs", "swift", "kt", "kts", "scala", "ex", "exs", "lua", "elm", "ml", "mli",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl ReviewFilterConfig {
    /// Loads config from env vars, falling back to defaults. Unparsable
    /// values are ignored with a `tracing::warn!`, never a hard failure.
    ///
    /// Supported ENV vars (all optional):
    /// - `REVIEW_MAX_FILES`                       (usize)
    /// - `REVIEW_MAX_FILE_SIZE_BYTES`              (u64)
    /// - `REVIEW_MAX_TOTAL_TOKENS`                 (usize)
    /// - `REVIEW_ALLOWED_EXTENSIONS`                (comma-separated)
    /// - `REVIEW_EXCLUDED_PATH_GLOBS`               (comma-separated)
    /// - `REVIEW_ENABLE_DESCRIPTION_GENERATION`     (bool: true/false/1/0)
    /// - `REVIEW_VERBOSE`                           (bool)
    /// - `REVIEW_MAX_CONCURRENCY`                   (usize)
    pub fn load_from_env_or_default() -> MrResult<Self> {
        let mut cfg = Self::default();

        if let Some(v) = env_usize("REVIEW_MAX_FILES") {
            cfg.max_files = v;
        }
        if let Some(v) = env_u64("REVIEW_MAX_FILE_SIZE_BYTES") {
            cfg.max_file_size_bytes = v;
        }
        if let Some(v) = env_usize("REVIEW_MAX_TOTAL_TOKENS") {
            cfg.max_total_tokens = v;
        }
        if let Some(v) = env_list("REVIEW_ALLOWED_EXTENSIONS") {
            cfg.allowed_extensions = v;
        }
        if let Some(v) = env_list("REVIEW_EXCLUDED_PATH_GLOBS") {
            cfg.excluded_path_globs = v;
        }
        if let Some(v) = env_bool("REVIEW_ENABLE_DESCRIPTION_GENERATION") {
            cfg.enable_description_generation = v;
        }
        if let Some(v) = env_bool("REVIEW_VERBOSE") {
            cfg.verbose = v;
        }
        if let Some(v) = env_usize("REVIEW_MAX_CONCURRENCY") {
            cfg.max_concurrency = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> MrResult<()> {
        if self.max_files == 0 {
            return Err(ConfigError::InvalidFilter("max_files must be > 0".into()).into());
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidFilter("max_concurrency must be > 0".into()).into());
        }
        Ok(())
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|s| {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    })
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = env::var(key).ok()?;
    Some(
        raw.split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_valid() {
        let cfg = ReviewFilterConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.allowed_extensions.contains(&"rs".to_string()));
        assert!(cfg.excluded_path_globs.iter().any(|g| g == "target/**"));
    }
}
