use anyhow::Result;
use chrono::FixedOffset;
use std::collections::HashMap;
use std::env;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// GUILDS | GUILD_MESSAGES
pub const DEFAULT_INTENTS: u64 = 513;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub api_base: String,
    pub intents: u64,
    pub database_url: String,
    pub utc_offset_hours: i32,
    pub github: Option<GithubConfig>,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: String,
    /// `owner/repository`
    pub repo: String,
    /// GitHub author name -> Discord user id
    pub user_mapping: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: u32::MAX,
            backoff_base_ms: 1_000,
            backoff_max_ms: 60_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let discord_token = lookup("DISCORD_BOT_TOKEN")
            .or_else(|| lookup("DISCORD_TOKEN"))
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DISCORD_BOT_TOKEN environment variable is required"))?;

        let api_base = lookup("DISCORD_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let intents = parse_or(&lookup, "DISCORD_INTENTS", DEFAULT_INTENTS)?;

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:checkins.db".to_string());

        let utc_offset_hours = parse_or(&lookup, "TIMEZONE_OFFSET_HOURS", 8)?;
        if !(-23..=23).contains(&utc_offset_hours) {
            anyhow::bail!("TIMEZONE_OFFSET_HOURS must be between -23 and 23");
        }

        let github = match (lookup("GITHUB_TOKEN"), lookup("GITHUB_REPO")) {
            (Some(token), Some(repo)) => Some(GithubConfig {
                token,
                repo,
                user_mapping: parse_user_mapping(
                    &lookup("DISCORD_USER_MAPPING").unwrap_or_default(),
                ),
            }),
            _ => None,
        };

        let defaults = ReconnectConfig::default();
        let reconnect = ReconnectConfig {
            max_attempts: parse_or(&lookup, "RECONNECT_MAX_ATTEMPTS", defaults.max_attempts)?,
            backoff_base_ms: parse_or(&lookup, "RECONNECT_BACKOFF_BASE_MS", defaults.backoff_base_ms)?,
            backoff_max_ms: parse_or(&lookup, "RECONNECT_BACKOFF_MAX_MS", defaults.backoff_max_ms)?,
        };

        Ok(Config {
            discord_token,
            api_base,
            intents,
            database_url,
            utc_offset_hours,
            github,
            reconnect,
        })
    }

    pub fn utc_offset(&self) -> FixedOffset {
        crate::utils::time::offset_from_hours(self.utc_offset_hours)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

/// Parses `name=discord_id` pairs separated by commas.
pub fn parse_user_mapping(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, id) = pair.split_once('=')?;
            let (name, id) = (name.trim(), id.trim());
            if name.is_empty() || id.is_empty() {
                return None;
            }
            Some((name.to_string(), id.to_string()))
        })
        .collect()
}
