use std::{fmt, str::FromStr};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Argon2id cost and worker bounds. Fixed at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct HasherConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub max_concurrency: usize,
}

#[derive(Clone, Deserialize)]
pub struct PaymentConfig {
    pub secret_key: String,
    pub api_base: String,
    pub currency: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("secret_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub hasher: HasherConfig,
    pub payment: PaymentConfig,
    pub password_min_length: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unparsable numbers fall
    /// back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS").unwrap_or(10),
        };

        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let hasher = HasherConfig {
            memory_kib: parse_var(&lookup, "HASH_MEMORY_KIB").unwrap_or(19 * 1024),
            iterations: parse_var(&lookup, "HASH_ITERATIONS").unwrap_or(2),
            parallelism: parse_var(&lookup, "HASH_PARALLELISM").unwrap_or(1),
            max_concurrency: parse_var(&lookup, "HASHER_MAX_CONCURRENCY")
                .unwrap_or(default_workers)
                .max(1),
        };

        let payment = PaymentConfig {
            secret_key: lookup("STRIPE_SECRET_KEY").context("STRIPE_SECRET_KEY must be set")?,
            api_base: lookup("PAYMENT_API_BASE")
                .unwrap_or_else(|| "https://api.stripe.com".into()),
            currency: lookup("PAYMENT_CURRENCY").unwrap_or_else(|| "usd".into()),
            timeout_secs: parse_var(&lookup, "PAYMENT_TIMEOUT_SECS").unwrap_or(15),
        };

        let port = parse_var(&lookup, "APP_PORT").or_else(|| parse_var(&lookup, "PORT"));

        Ok(Self {
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: port.unwrap_or(3000),
            database,
            hasher,
            payment,
            password_min_length: parse_var::<usize>(&lookup, "PASSWORD_MIN_LENGTH")
                .unwrap_or(1)
                .max(1),
        })
    }
}

fn parse_var<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
