use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::models::{InternType, Thresholds};

/// Where each intern type's records come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub ai: String,
    pub lead: String,
}

impl Endpoints {
    /// Both intern types read from one location.
    pub fn shared(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            ai: url.clone(),
            lead: url,
        }
    }

    pub fn url_for(&self, intern_type: InternType) -> &str {
        match intern_type {
            InternType::Ai => &self.ai,
            InternType::TechLead => &self.lead,
        }
    }
}

/// Endpoints and token for the registrations API.
#[derive(Clone)]
pub struct ApiSettings {
    pub token: String,
    pub endpoints: Endpoints,
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("token", &"<redacted>")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub thresholds: Thresholds,
    pub http_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let thresholds = Thresholds {
            ai: parse_or(&lookup, "AI_COHORT_THRESHOLD", defaults.thresholds.ai)?,
            techlead: parse_or(&lookup, "TECHLEAD_COHORT_THRESHOLD", defaults.thresholds.techlead)?,
        };
        let timeout_secs = parse_or(&lookup, "HTTP_TIMEOUT_SECS", defaults.http_timeout.as_secs())?;
        if timeout_secs == 0 {
            return Err(anyhow!("HTTP_TIMEOUT_SECS must be at least 1 second"));
        }

        Ok(Self {
            thresholds,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl ApiSettings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            token: required(&lookup, "API_TOKEN")?,
            endpoints: Endpoints {
                ai: required(&lookup, "API_URL")?,
                lead: required(&lookup, "LEAD_URL")?,
            },
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("{key} must be set for the registrations API"))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
