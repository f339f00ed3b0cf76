use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};

use crate::punishment::PunishmentPolicy;

/// Gameplay knobs shared by the service and its handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    pub turn_budget: Duration,
    pub punishment: PunishmentPolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            turn_budget: Duration::from_secs(5),
            punishment: PunishmentPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub game: GameConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = GameConfig::default();

        Ok(Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 8000)))?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            game: GameConfig {
                turn_budget: Duration::from_secs(parse_or(
                    &lookup,
                    "TURN_BUDGET_SECS",
                    defaults.turn_budget.as_secs(),
                )?),
                punishment: PunishmentPolicy {
                    threshold: parse_or(
                        &lookup,
                        "PUNISHMENT_THRESHOLD",
                        defaults.punishment.threshold,
                    )?,
                    duration: Duration::from_secs(parse_or(
                        &lookup,
                        "PUNISHMENT_SECS",
                        defaults.punishment.duration.as_secs(),
                    )?),
                },
            },
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
