use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Deployment environment named by `BEANSTORE_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }

    /// Development relaxes startup checks such as requiring API keys.
    #[must_use]
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "expected development, test, or production; got '{other}'"
            )),
        }
    }
}

/// Settings for the server and CLI binaries.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// JSON file read by bulk import.
    pub seed_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scheduler_enabled: bool,
    /// Fixed RNG seed for the featured-bean scheduler. `None` seeds from the OS.
    pub selection_seed: Option<u64>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("seed_path", &self.seed_path)
            .field(
                "pool",
                &format_args!(
                    "{}..={} connections, {}s acquire timeout",
                    self.db_min_connections, self.db_max_connections, self.db_acquire_timeout_secs
                ),
            )
            .field("scheduler_enabled", &self.scheduler_enabled)
            .field("selection_seed", &self.selection_seed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_short_and_mixed_case_names() {
        assert_eq!("Production".parse(), Ok(Environment::Production));
        assert_eq!("dev".parse(), Ok(Environment::Development));
        assert_eq!(" test ".parse(), Ok(Environment::Test));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn environment_display_round_trips() {
        for env in [Environment::Development, Environment::Test, Environment::Production] {
            assert_eq!(env.to_string().parse(), Ok(env));
        }
    }
}
