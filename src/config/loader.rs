//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::SluiceConfig;
use super::secret::secret_string;
use crate::domain::errors::SluiceError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into SluiceConfig
/// 4. Applies environment variable overrides (SLUICE_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns `SluiceError::Configuration` if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use sluice::config::loader::load_config;
///
/// let config = load_config("sluice.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<SluiceConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SluiceError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        SluiceError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text, with the same steps as [`load_config`]
pub fn parse_config(contents: &str) -> Result<SluiceConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: SluiceConfig = toml::from_str(&contents)
        .map_err(|e| SluiceError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        SluiceError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| SluiceError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(SluiceError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_override<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.parse().map_err(|_| {
        SluiceError::Configuration(format!("Environment override {key}='{val}' is not valid"))
    })
}

/// Applies environment variable overrides using SLUICE_* prefix
///
/// Environment variables follow the pattern: SLUICE_<SECTION>_<KEY>
/// For example: SLUICE_PIPELINE_BATCH_SIZE, SLUICE_STORAGE_ROOT
fn apply_env_overrides(config: &mut SluiceConfig) -> Result<()> {
    let var = |key: &str| std::env::var(key).ok();

    // Application overrides
    if let Some(val) = var("SLUICE_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = var("SLUICE_APPLICATION_DRY_RUN") {
        config.application.dry_run = parse_override("SLUICE_APPLICATION_DRY_RUN", &val)?;
    }

    // Pipeline overrides
    if let Some(val) = var("SLUICE_PIPELINE_SOURCE_CHANNEL") {
        config.pipeline.source_channel = val;
    }
    if let Some(val) = var("SLUICE_PIPELINE_DESTINATION_RELATION") {
        config.pipeline.destination_relation = val;
    }
    if let Some(val) = var("SLUICE_PIPELINE_NOTIFICATION_CHANNEL") {
        config.pipeline.notification_channel = val;
    }
    if let Some(val) = var("SLUICE_PIPELINE_ERROR_LOG") {
        config.pipeline.error_log = PathBuf::from(val);
    }
    if let Some(val) = var("SLUICE_PIPELINE_BATCH_SIZE") {
        config.pipeline.batch_size = parse_override("SLUICE_PIPELINE_BATCH_SIZE", &val)?;
    }
    if let Some(val) = var("SLUICE_PIPELINE_MAX_CONCURRENT_FILES") {
        config.pipeline.max_concurrent_files =
            parse_override("SLUICE_PIPELINE_MAX_CONCURRENT_FILES", &val)?;
    }
    if let Some(val) = var("SLUICE_PIPELINE_SHUTDOWN_TIMEOUT_SECS") {
        config.pipeline.shutdown_timeout_secs =
            parse_override("SLUICE_PIPELINE_SHUTDOWN_TIMEOUT_SECS", &val)?;
    }
    if let Some(val) = var("SLUICE_PIPELINE_POLL_INTERVAL_MS") {
        config.pipeline.poll_interval_ms =
            parse_override("SLUICE_PIPELINE_POLL_INTERVAL_MS", &val)?;
    }
    if let Some(val) = var("SLUICE_PIPELINE_LEASE_SECONDS") {
        config.pipeline.lease_seconds = parse_override("SLUICE_PIPELINE_LEASE_SECONDS", &val)?;
    }
    if let Some(val) = var("SLUICE_PIPELINE_RETRY_INITIAL_SECS") {
        config.pipeline.retry_initial_secs =
            parse_override("SLUICE_PIPELINE_RETRY_INITIAL_SECS", &val)?;
    }
    if let Some(val) = var("SLUICE_PIPELINE_RETRY_MAX_SECS") {
        config.pipeline.retry_max_secs = parse_override("SLUICE_PIPELINE_RETRY_MAX_SECS", &val)?;
    }

    // Storage overrides
    if let Some(val) = var("SLUICE_STORAGE_ROOT") {
        config.storage.root = Some(PathBuf::from(val));
    }
    if let Some(val) = var("SLUICE_STORAGE_BASE_URL") {
        config.storage.base_url = Some(val);
    }

    // PostgreSQL overrides
    if let Some(val) = var("SLUICE_POSTGRESQL_CONNECTION_STRING") {
        config.postgresql.connection_string = secret_string(val);
    }
    if let Some(val) = var("SLUICE_POSTGRESQL_MAX_CONNECTIONS") {
        config.postgresql.max_connections =
            parse_override("SLUICE_POSTGRESQL_MAX_CONNECTIONS", &val)?;
    }
    if let Some(val) = var("SLUICE_POSTGRESQL_SSL_MODE") {
        config.postgresql.ssl_mode = val;
    }

    // Logging overrides
    if let Some(val) = var("SLUICE_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_override("SLUICE_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("SLUICE_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
