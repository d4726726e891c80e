use std::num::ParseFloatError;

use grove_hash::EnvMode;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "invalid percentage value for concurrency. The percentage should be relative to CPU \
         cores, above 0% and at most 100%: {0}"
    )]
    InvalidConcurrencyPercentage(f64),
    #[error(
        "invalid value for concurrency. This should be a positive integer greater than or equal \
         to 1: {0}"
    )]
    ConcurrencyOutOfBounds(String),
    #[error(transparent)]
    ParseFloat(#[from] ParseFloatError),
    #[error("invalid hashing config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run-wide settings that feed into every task hash
pub trait RunOptsHashInfo {
    fn framework_inference(&self) -> bool;
    fn single_package(&self) -> bool;
    fn pass_through_args(&self) -> &[String];
    fn env_mode(&self) -> EnvMode;
    /// Global env patterns. Entries prefixed with `!` also exclude variables
    /// from framework inference.
    fn global_env_patterns(&self) -> &[String];
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HashingConfig {
    /// Either a worker count (`"4"`) or a share of the available CPUs (`"50%"`)
    pub concurrency: Option<String>,
    pub framework_inference: bool,
    pub single_package: bool,
    pub env_mode: EnvMode,
    pub pass_through_args: Vec<String>,
    pub global_env_patterns: Vec<String>,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            framework_inference: true,
            single_package: false,
            env_mode: EnvMode::default(),
            pass_through_args: Vec::new(),
            global_env_patterns: Vec::new(),
        }
    }
}

impl HashingConfig {
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Number of workers used to hash package inputs
    pub fn worker_count(&self) -> Result<usize, ConfigError> {
        self.concurrency
            .as_deref()
            .map_or(Ok(DEFAULT_CONCURRENCY), parse_concurrency)
    }
}

impl RunOptsHashInfo for HashingConfig {
    fn framework_inference(&self) -> bool {
        self.framework_inference
    }

    fn single_package(&self) -> bool {
        self.single_package
    }

    fn pass_through_args(&self) -> &[String] {
        &self.pass_through_args
    }

    fn env_mode(&self) -> EnvMode {
        self.env_mode
    }

    fn global_env_patterns(&self) -> &[String] {
        &self.global_env_patterns
    }
}

fn parse_concurrency(concurrency_raw: &str) -> Result<usize, ConfigError> {
    if let Some(percent) = concurrency_raw.strip_suffix('%') {
        let percent = percent.parse::<f64>()?;
        return if percent > 0.0 && percent <= 100.0 {
            Ok((num_cpus::get() as f64 * percent / 100.0).max(1.0) as usize)
        } else {
            Err(ConfigError::InvalidConcurrencyPercentage(percent))
        };
    }
    match concurrency_raw.parse::<usize>() {
        Ok(concurrency) if concurrency >= 1 => Ok(concurrency),
        Ok(_) | Err(_) => Err(ConfigError::ConcurrencyOutOfBounds(
            concurrency_raw.to_string(),
        )),
    }
}
