//! Configuration management for The Bench service
//! Supports environment variables and default values for server, auth, cart and account parameters

use serde::{Deserialize, Serialize};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::{info, warn};

/// Configuration for the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cart: CartConfig,
    pub account: AccountConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Origin allowed by CORS; `*` allows any
    pub allowed_origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Bearer token verification parameters (HS256 shared secret)
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"***")
            .field("jwt_audience", &self.jwt_audience)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartConfig {
    /// Minutes of inactivity before a cart is dropped (default: 60)
    pub idle_minutes: u64,
    /// Upper bound on carts held in memory (default: 10_000)
    pub max_carts: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Balance granted to a newly created profile (default: 1000.0)
    pub starting_balance: f64,
    /// Enable the test-mode "add credits" endpoint (default: true)
    pub enable_test_credits: bool,
    /// Credits granted per test-mode request (default: 10.0)
    pub test_credit_amount: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3001,
            allowed_origin: "*".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://bench_user:supersecretpassword@db:5432/benchdb".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-only-jwt-secret-change-me".to_string(),
            jwt_audience: "authenticated".to_string(),
        }
    }
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            idle_minutes: 60,
            max_carts: 10_000,
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            starting_balance: 1000.0,
            enable_test_credits: true,
            test_credit_amount: 10.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            cart: CartConfig::default(),
            account: AccountConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, current: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid {}: {}, keeping current value", name, raw);
            current
        }),
        Err(_) => current,
    }
}

impl Config {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Self {
        let mut config = Config::default();

        config.server.host = env_parse("HOST", config.server.host);
        config.server.port = env_parse("PORT", config.server.port);
        if let Ok(origin) = env::var("CORS_ALLOWED_ORIGIN") {
            config.server.allowed_origin = origin;
        }

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = url;
        }
        config.database.max_connections =
            env_parse("DATABASE_MAX_CONNECTIONS", config.database.max_connections);

        if let Ok(secret) = env::var("JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Ok(audience) = env::var("JWT_AUDIENCE") {
            config.auth.jwt_audience = audience;
        }

        config.cart.idle_minutes = env_parse("CART_IDLE_MINUTES", config.cart.idle_minutes);
        config.cart.max_carts = env_parse("CART_MAX_CARTS", config.cart.max_carts);

        config.account.starting_balance =
            env_parse("ACCOUNT_STARTING_BALANCE", config.account.starting_balance);
        config.account.enable_test_credits =
            env_parse("ACCOUNT_ENABLE_TEST_CREDITS", config.account.enable_test_credits);
        config.account.test_credit_amount =
            env_parse("ACCOUNT_TEST_CREDIT_AMOUNT", config.account.test_credit_amount);

        // Validate configuration
        config.validate();

        config
    }

    /// Validate configuration values, replacing bad ones with defaults
    fn validate(&mut self) {
        if self.database.max_connections == 0 {
            warn!("Invalid database max_connections: 0, using default");
            self.database.max_connections = DatabaseConfig::default().max_connections;
        }

        if self.cart.idle_minutes == 0 {
            warn!("Invalid cart idle_minutes: 0, using default");
            self.cart.idle_minutes = CartConfig::default().idle_minutes;
        }

        let balance = self.account.starting_balance;
        if !balance.is_finite() || balance < 0.0 {
            warn!("Invalid starting_balance: {}, using default", balance);
            self.account.starting_balance = AccountConfig::default().starting_balance;
        }

        let credit = self.account.test_credit_amount;
        if !credit.is_finite() || credit <= 0.0 {
            warn!("Invalid test_credit_amount: {}, using default", credit);
            self.account.test_credit_amount = AccountConfig::default().test_credit_amount;
        }

        if self.auth.jwt_secret == AuthConfig::default().jwt_secret {
            warn!("JWT_SECRET not set, using the development secret");
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    /// Log current configuration for debugging
    pub fn print_config(&self) {
        info!("🔧 The Bench Configuration:");
        info!("   Listen Address: {}", self.bind_addr());
        info!("   CORS Origin: {}", self.server.allowed_origin);
        info!("   DB Max Connections: {}", self.database.max_connections);
        info!("   JWT Audience: {}", self.auth.jwt_audience);
        info!("   Cart Idle Minutes: {}", self.cart.idle_minutes);
        info!("   Starting Balance: {}", self.account.starting_balance);
        info!("   Test Credits Enabled: {}", self.account.enable_test_credits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_repairs_bad_values() {
        let mut config = Config::default();
        config.database.max_connections = 0;
        config.cart.idle_minutes = 0;
        config.account.starting_balance = -5.0;
        config.account.test_credit_amount = f64::NAN;
        config.validate();

        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.cart.idle_minutes, 60);
        assert_eq!(config.account.starting_balance, 1000.0);
        assert_eq!(config.account.test_credit_amount, 10.0);
    }

    #[test]
    fn default_binds_all_interfaces() {
        let config = Config::default();
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:3001");
    }

    #[test]
    fn debug_output_hides_secret() {
        let rendered = format!("{:?}", AuthConfig::default());
        assert!(!rendered.contains("dev-only"));
    }
}
