use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = or_default("BEANSTORE_ENV", "development")
        .parse::<Environment>()
        .map_err(|reason| invalid("BEANSTORE_ENV", reason))?;

    let bind_addr = parse_addr("BEANSTORE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("BEANSTORE_LOG_LEVEL", "info");
    let seed_path = PathBuf::from(or_default("BEANSTORE_SEED_PATH", "./data/coffeebeans.json"));

    let db_max_connections = parse_u32("BEANSTORE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("BEANSTORE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("BEANSTORE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scheduler_enabled = parse_bool("BEANSTORE_SCHEDULER_ENABLED", "true")?;
    let selection_seed = match lookup("BEANSTORE_SELECTION_SEED") {
        Ok(raw) => Some(
            raw.parse::<u64>()
                .map_err(|e| invalid("BEANSTORE_SELECTION_SEED", e.to_string()))?,
        ),
        Err(_) => None,
    };

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        seed_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scheduler_enabled,
        selection_seed,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
