use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Role the AI imitates when a room does not name one
pub const DEFAULT_AI_ROLE: &str = "Undergraduate student";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },

    #[error("Failed to read question bank {path}: {source}")]
    QuestionBankIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse question bank: {0}")]
    QuestionBankParse(#[from] serde_json::Error),

    #[error("Question bank is invalid: {0}")]
    QuestionBankInvalid(String),
}

/// Server-level settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Lifetime of a room (and of its players' seats) after creation
    pub room_ttl: Duration,
    pub default_ai_role: String,
    /// JSON question bank; the embedded bank is used when unset
    pub questions_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            room_ttl: Duration::from_secs(60 * 60),
            default_ai_role: DEFAULT_AI_ROLE.to_string(),
            questions_path: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = match non_empty_var("BIND_ADDR") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidVar {
                name: "BIND_ADDR",
                value,
            })?,
            None => defaults.bind_addr,
        };

        let room_ttl = match non_empty_var("ROOM_TTL_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidVar {
                        name: "ROOM_TTL_SECS",
                        value,
                    })
                }
            },
            None => defaults.room_ttl,
        };

        Ok(Self {
            bind_addr,
            room_ttl,
            default_ai_role: non_empty_var("AI_ROLE").unwrap_or(defaults.default_ai_role),
            questions_path: non_empty_var("QUESTIONS_PATH").map(PathBuf::from),
        })
    }

    pub fn room_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.room_ttl).unwrap_or(chrono::Duration::hours(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 4] = ["BIND_ADDR", "ROOM_TTL_SECS", "AI_ROLE", "QUESTIONS_PATH"];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        clear_env();
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.room_ttl, Duration::from_secs(3600));
        assert_eq!(config.default_ai_role, DEFAULT_AI_ROLE);
        assert!(config.questions_path.is_none());
    }

    #[test]
    #[serial]
    fn test_reads_overrides() {
        clear_env();
        std::env::set_var("BIND_ADDR", "127.0.0.1:8080");
        std::env::set_var("ROOM_TTL_SECS", "120");
        std::env::set_var("AI_ROLE", "  Retired sailor ");
        std::env::set_var("QUESTIONS_PATH", "/tmp/questions.json");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.room_ttl, Duration::from_secs(120));
        assert_eq!(config.default_ai_role, "Retired sailor");
        assert_eq!(
            config.questions_path,
            Some(PathBuf::from("/tmp/questions.json"))
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_rejects_invalid_values() {
        clear_env();
        std::env::set_var("ROOM_TTL_SECS", "0");
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::InvalidVar {
                name: "ROOM_TTL_SECS",
                ..
            })
        ));

        clear_env();
        std::env::set_var("BIND_ADDR", "not-an-address");
        assert!(ServerConfig::from_env().is_err());
        clear_env();
    }
}
