use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use dotenvy::dotenv;

use crate::services::reports::Workbooks;

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub database_url: String,
    pub api_prefix: String,

    /// Every location taking part in payroll approval
    pub locations: Vec<String>,

    // Rate limiting
    pub rate_per_min: u32,

    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    /// Upper bound for sheet and email calls
    pub external_timeout: Duration,

    pub sheets_dir: PathBuf,
    pub workbooks: Workbooks,
    pub retention_days: u32,
    pub roster_cache_ttl: Duration,

    /// `None` when SMTP_HOST is unset; approvals then fail at the email step.
    pub smtp: Option<SmtpConfig>,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| get(key).with_context(|| format!("{} must be set", key));
        let text_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let locations: Vec<String> = required("LOCATIONS")?
            .split(',')
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if locations.is_empty() {
            bail!("LOCATIONS must name at least one location");
        }

        let retention_days: u32 = parse_or(&get, "RETENTION_DAYS", 180)?;
        if retention_days == 0 {
            bail!("RETENTION_DAYS must be at least 1");
        }

        let smtp = match get("SMTP_HOST") {
            Some(host) => {
                let username = required("SMTP_USERNAME")?;
                Some(SmtpConfig {
                    host,
                    port: parse_or(&get, "SMTP_PORT", 465)?,
                    password: required("SMTP_PASSWORD")?,
                    from: get("EMAIL_FROM").unwrap_or_else(|| username.clone()),
                    username,
                })
            }
            None => None,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            api_prefix: text_or("API_PREFIX", "/api"),
            locations,

            rate_per_min: parse_or(&get, "RATE_PER_MIN", 1000)?,

            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout: Duration::from_secs(parse_or(&get, "DB_ACQUIRE_TIMEOUT_SECS", 5)?),
            external_timeout: Duration::from_secs(parse_or(&get, "EXTERNAL_TIMEOUT_SECS", 30)?),

            sheets_dir: PathBuf::from(text_or("SHEETS_DIR", "sheets")),
            workbooks: Workbooks {
                log: text_or("LOG_WORKBOOK", "House of Wisdom Log"),
                summary: text_or("SUMMARY_WORKBOOK", "HOW-15-Day-Summary"),
                attendance: text_or("ATTENDANCE_WORKBOOK", "HOW-Daily-Attendance"),
                monthly: text_or("MONTHLY_ATTENDANCE_WORKBOOK", "HOW-Monthly-Attendance-Summary"),
            },
            retention_days,
            roster_cache_ttl: Duration::from_secs(parse_or(&get, "ROSTER_CACHE_TTL_SECS", 60)?),

            smtp,

            log_dir: text_or("LOG_DIR", "logs"),
            log_level: parse_or(&get, "LOG_LEVEL", tracing::Level::DEBUG)?,
        })
    }
}
