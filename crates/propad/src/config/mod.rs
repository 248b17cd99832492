use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::marketplace::money::{Money, MoneyError};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub policy: PolicyConfig,
    pub rewards: RewardConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = PolicyConfig::default();
        let block_list = match env::var("POLICY_BLOCKLIST") {
            Ok(raw) => parse_phrase_list("POLICY_BLOCKLIST", &raw)?,
            Err(_) => defaults.block_list,
        };
        let flag_list = match env::var("POLICY_FLAGLIST") {
            Ok(raw) => parse_phrase_list("POLICY_FLAGLIST", &raw)?,
            Err(_) => defaults.flag_list,
        };

        let default_pool_amount = match env::var("REWARD_POOL_AMOUNT") {
            Ok(raw) => parse_pool_amount(&raw)?,
            Err(_) => RewardConfig::default().default_pool_amount,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            policy: PolicyConfig {
                block_list,
                flag_list,
            },
            rewards: RewardConfig {
                default_pool_amount,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Statically configured listing phrases, merged with admin-managed rules at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    pub block_list: Vec<String>,
    pub flag_list: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let owned = |phrases: &[&str]| phrases.iter().map(|p| p.to_string()).collect();
        Self {
            block_list: owned(&[
                "viewing fee",
                "registration fee",
                "10% commission",
                "ten percent commission",
                "agent commission",
                "lease signing fee",
            ]),
            flag_list: owned(&["negotiable fee", "processing fee", "finder's fee"]),
        }
    }
}

/// Seed for the reward pool when none exists yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardConfig {
    pub default_pool_amount: Money,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            default_pool_amount: Money::from_cents(50_000),
        }
    }
}

/// Accepts a JSON array of strings or a comma-separated list. JSON entries keep their
/// whitespace; comma-separated entries are trimmed. Blank entries are dropped.
fn parse_phrase_list(var: &'static str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let trimmed = raw.trim();
    let phrases: Vec<String> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|source| ConfigError::InvalidPhraseList {
            var,
            source,
        })?
    } else {
        trimmed
            .split(',')
            .map(|phrase| phrase.trim().to_string())
            .collect()
    };

    Ok(phrases
        .into_iter()
        .filter(|phrase| !phrase.trim().is_empty())
        .collect())
}

fn parse_pool_amount(raw: &str) -> Result<Money, ConfigError> {
    let amount: Money = raw
        .parse()
        .map_err(|source| ConfigError::InvalidRewardAmount { source })?;
    if amount.is_negative() {
        return Err(ConfigError::NegativeRewardAmount(amount));
    }
    Ok(amount)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidPhraseList {
        var: &'static str,
        source: serde_json::Error,
    },
    InvalidRewardAmount {
        source: MoneyError,
    },
    NegativeRewardAmount(Money),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPhraseList { var, .. } => {
                write!(f, "{var} must be a JSON string array or comma-separated list")
            }
            ConfigError::InvalidRewardAmount { .. } => {
                write!(f, "REWARD_POOL_AMOUNT must be a decimal with at most two places")
            }
            ConfigError::NegativeRewardAmount(amount) => {
                write!(f, "REWARD_POOL_AMOUNT must not be negative (got {amount})")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::NegativeRewardAmount(_) => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPhraseList { source, .. } => Some(source),
            ConfigError::InvalidRewardAmount { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "POLICY_BLOCKLIST",
            "POLICY_FLAGLIST",
            "REWARD_POOL_AMOUNT",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.policy, PolicyConfig::default());
        assert!(config
            .policy
            .block_list
            .contains(&"viewing fee".to_string()));
        assert_eq!(
            config.rewards.default_pool_amount,
            Money::from_cents(50_000)
        );
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn phrase_lists_accept_csv_and_json() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("POLICY_BLOCKLIST", " deposit upfront , ,cash only");
        env::set_var("POLICY_FLAGLIST", r#"["admin fee", "  ", " rent "]"#);
        env::set_var("REWARD_POOL_AMOUNT", "1250.50");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.policy.block_list,
            vec!["deposit upfront".to_string(), "cash only".to_string()]
        );
        assert_eq!(
            config.policy.flag_list,
            vec!["admin fee".to_string(), " rent ".to_string()]
        );
        assert_eq!(
            config.rewards.default_pool_amount,
            Money::from_cents(125_050)
        );
        reset_env();
    }

    #[test]
    fn rejects_malformed_reward_amounts() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("REWARD_POOL_AMOUNT", "five hundred");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidRewardAmount { .. })
        ));

        env::set_var("REWARD_POOL_AMOUNT", "-10");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::NegativeRewardAmount(_))
        ));
        reset_env();
    }

    #[test]
    fn rejects_malformed_json_phrase_lists() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("POLICY_FLAGLIST", "[\"unterminated");
        match AppConfig::load() {
            Err(ConfigError::InvalidPhraseList { var, .. }) => assert_eq!(var, "POLICY_FLAGLIST"),
            other => panic!("expected phrase list error, got {other:?}"),
        }
        reset_env();
    }
}
