//! Process configuration
//! Mission: Collect every tunable from flags and the environment in one place

use crate::auth::{route_map::RouteMap, tokens::TokenLifetimes};
use anyhow::{bail, Result};
use chrono::Duration;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

const DEV_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";
const MIN_SECRET_LEN: usize = 32;
const DEFAULT_ADMIN_PASSWORD: &str = "changeme123";

#[derive(Parser, Debug, Clone)]
#[command(name = "tablelink")]
#[command(about = "Token issuance and RBAC gate for the TableLink RPC backend")]
pub struct Config {
    /// Shared HMAC signing secret
    #[arg(long, env = "API_SECRET", hide_env_values = true)]
    pub api_secret: Option<String>,

    #[arg(long, env = "TOKEN_ISSUER", default_value = "tablelink_user")]
    pub token_issuer: String,

    #[arg(long, env = "ACCESS_TOKEN_TTL_SECS", default_value_t = 14_400)]
    pub access_token_ttl_secs: i64,

    #[arg(long, env = "REFRESH_TOKEN_TTL_SECS", default_value_t = 2_592_000)]
    pub refresh_token_ttl_secs: i64,

    #[arg(
        long,
        env = "SESSION_CACHE_ENABLED",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub session_cache_enabled: bool,

    /// Clamped to the access token lifetime
    #[arg(long, env = "SESSION_CACHE_TTL_SECS", default_value_t = 14_400)]
    pub session_cache_ttl_secs: i64,

    #[arg(long, env = "AUTH_DB_PATH", default_value = "tablelink_auth.db")]
    pub auth_db_path: String,

    /// TOML route table; the built-in user routes are used when unset
    #[arg(long, env = "ROUTE_MAP_PATH")]
    pub route_map_path: Option<PathBuf>,

    /// Deadline for authorization store reads and cache calls
    #[arg(long, env = "GATE_TIMEOUT_MS", default_value_t = 2_000)]
    pub gate_timeout_ms: u64,

    #[arg(long, env = "PORT", default_value_t = 50051)]
    pub port: u16,

    #[arg(long, env = "ADMIN_EMAIL", default_value = "admin@localhost")]
    pub admin_email: String,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

impl Config {
    pub fn signing_secret(&self) -> Vec<u8> {
        match self.api_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => {
                if secret.len() < MIN_SECRET_LEN {
                    warn!(
                        "⚠️  API_SECRET is shorter than {} bytes; use a longer secret in production",
                        MIN_SECRET_LEN
                    );
                }
                secret.as_bytes().to_vec()
            }
            None => {
                warn!("⚠️  API_SECRET not set, using development secret");
                DEV_SECRET.as_bytes().to_vec()
            }
        }
    }

    pub fn token_lifetimes(&self) -> Result<TokenLifetimes> {
        if self.access_token_ttl_secs <= 0 || self.refresh_token_ttl_secs <= 0 {
            bail!("Token lifetimes must be positive");
        }
        if self.refresh_token_ttl_secs <= self.access_token_ttl_secs {
            bail!("Refresh token lifetime must exceed the access token lifetime");
        }
        Ok(TokenLifetimes {
            access: Duration::seconds(self.access_token_ttl_secs),
            refresh: Duration::seconds(self.refresh_token_ttl_secs),
        })
    }

    pub fn session_cache_ttl(&self) -> Duration {
        Duration::seconds(self.session_cache_ttl_secs.max(0))
    }

    pub fn gate_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.gate_timeout_ms)
    }

    pub fn route_map(&self) -> Result<RouteMap> {
        match &self.route_map_path {
            Some(path) => RouteMap::load(path),
            None => {
                info!("🗺️  Using built-in user route table");
                Ok(RouteMap::reference())
            }
        }
    }

    pub fn admin_password(&self) -> String {
        match self.admin_password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => password.to_string(),
            None => {
                warn!("⚠️  ADMIN_PASSWORD not set, seeding admin with the default password");
                DEFAULT_ADMIN_PASSWORD.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["tablelink"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_lifetimes_from_flags() {
        let config = parse(&[
            "--access-token-ttl-secs",
            "14400",
            "--refresh-token-ttl-secs",
            "2592000",
        ]);
        let lifetimes = config.token_lifetimes().unwrap();
        assert_eq!(lifetimes, TokenLifetimes::default());
    }

    #[test]
    fn test_invalid_lifetimes_rejected() {
        let config = parse(&[
            "--access-token-ttl-secs",
            "3600",
            "--refresh-token-ttl-secs",
            "60",
        ]);
        assert!(config.token_lifetimes().is_err());

        let config = parse(&["--access-token-ttl-secs", "0"]);
        assert!(config.token_lifetimes().is_err());
    }

    #[test]
    fn test_secret_fallback_and_override() {
        let config = parse(&["--api-secret", "a-very-long-secret-for-signing-tokens-1234"]);
        assert_eq!(
            config.signing_secret(),
            b"a-very-long-secret-for-signing-tokens-1234".to_vec()
        );

        let config = parse(&["--api-secret", ""]);
        assert_eq!(config.signing_secret(), DEV_SECRET.as_bytes().to_vec());
    }

    #[test]
    fn test_session_cache_can_be_disabled() {
        let config = parse(&["--session-cache-enabled", "false", "--gate-timeout-ms", "250"]);
        assert!(!config.session_cache_enabled);
        assert_eq!(config.gate_timeout(), std::time::Duration::from_millis(250));
    }
}
