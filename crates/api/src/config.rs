//! Process configuration, read from the environment (`.env` honoured).

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use identyflow_billing::PlanCatalog;
use identyflow_observability::LogFormat;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Unset means the in-memory datastore.
    pub database_url: Option<String>,
    pub database_connect_timeout: Duration,
    pub jwt_secret: String,
    pub jwt_ttl: chrono::Duration,
    /// Unset means every webhook is refused.
    pub webhook_secret: Option<String>,
    /// Lazily provision a starter subscription for non-god principals.
    pub subscription_auto_provision: bool,
    pub plan_catalog: PlanCatalog,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Defaults suitable for tests and local runs: in-memory store, no
    /// webhook secret, built-in catalog.
    pub fn local(jwt_secret: impl Into<String>) -> Self {
        Self {
            port: 10000,
            database_url: None,
            database_connect_timeout: Duration::from_secs(10),
            jwt_secret: jwt_secret.into(),
            jwt_ttl: chrono::Duration::hours(24),
            webhook_secret: None,
            subscription_auto_provision: true,
            plan_catalog: PlanCatalog::builtin(),
            log_format: LogFormat::Json,
        }
    }

    pub fn uses_dev_jwt_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = non_empty("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        let plan_catalog = match non_empty("PLAN_CATALOG_PATH") {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading plan catalog {path}"))?;
                PlanCatalog::from_json(&raw).with_context(|| format!("parsing plan catalog {path}"))?
            }
            None => PlanCatalog::builtin(),
        };

        Ok(Self {
            port: parse_or("PORT", 10000)?,
            database_url: non_empty("DATABASE_URL"),
            database_connect_timeout: Duration::from_secs(parse_or(
                "DATABASE_CONNECT_TIMEOUT_SECS",
                10u64,
            )?),
            jwt_secret,
            jwt_ttl: chrono::Duration::hours(parse_or("JWT_TTL_HOURS", 24i64)?),
            webhook_secret: non_empty("WEBHOOK_SECRET"),
            subscription_auto_provision: parse_bool_or("SUBSCRIPTION_AUTO_PROVISION", true)?,
            plan_catalog,
            log_format: match non_empty("LOG_FORMAT") {
                Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
                None => LogFormat::Json,
            },
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} is invalid: {raw}")),
        None => Ok(default),
    }
}

fn parse_bool_or(key: &str, default: bool) -> Result<bool> {
    match non_empty(key) {
        None => Ok(default),
        Some(raw) => parse_flag(&raw).with_context(|| format!("{key} is invalid: {raw}")),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
