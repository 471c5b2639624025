use std::env;
use std::path::PathBuf;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::db::models::OpenHours;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub telegram: TelegramConfig,
    pub feed: FeedConfig,
    pub store: StoreConfig,
    pub venue: VenueConfig,
    pub refresh: RefreshConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Booking feed endpoint, queried with `start` and `end` dates.
    pub url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    /// Number of interchangeable courts.
    pub courts: u32,
    pub open_hour: u32,
    /// Exclusive; 24 means the venue closes at midnight.
    pub close_hour: u32,
    /// Venue offset from UTC in minutes; the host's local zone when unset.
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    pub interval_seconds: u64,
    /// Whole days covered by each calendar after today.
    pub window_days: u32,
}

impl VenueConfig {
    pub fn open_hours(&self) -> OpenHours {
        OpenHours::new(self.open_hour, self.close_hour)
    }

    pub fn utc_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
    }
}

/// Parse `+HH:MM` / `-HH:MM` into minutes east of UTC.
fn parse_utc_offset(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let feed_url = env::var("FEED_URL").unwrap_or(defaults.feed.url);
        url::Url::parse(&feed_url).map_err(|_| ConfigError::InvalidValue("FEED_URL".to_string()))?;

        let utc_offset_minutes = match env::var("VENUE_UTC_OFFSET") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                parse_utc_offset(&raw)
                    .ok_or_else(|| ConfigError::InvalidValue("VENUE_UTC_OFFSET".to_string()))?,
            ),
            _ => None,
        };

        let config = Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port: parse_var("PORT", defaults.server.port)?,
            },
            telegram: TelegramConfig {
                bot_token: env::var("TELEGRAM_BOT_TOKEN")
                    .ok()
                    .filter(|t| !t.trim().is_empty()),
            },
            feed: FeedConfig {
                url: feed_url,
                timeout_seconds: parse_var("FEED_TIMEOUT_SECONDS", defaults.feed.timeout_seconds)?,
            },
            store: StoreConfig {
                path: env::var("STORE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.store.path),
            },
            venue: VenueConfig {
                courts: parse_var("COURTS_COUNT", defaults.venue.courts)?,
                open_hour: parse_var("OPEN_HOUR", defaults.venue.open_hour)?,
                close_hour: parse_var("CLOSE_HOUR", defaults.venue.close_hour)?,
                utc_offset_minutes,
            },
            refresh: RefreshConfig {
                interval_seconds: parse_var(
                    "REFRESH_INTERVAL_SECONDS",
                    defaults.refresh.interval_seconds,
                )?,
                window_days: parse_var("WINDOW_DAYS", defaults.refresh.window_days)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.venue.courts == 0 {
            return Err(ConfigError::InvalidValue("COURTS_COUNT".to_string()));
        }
        if self.venue.open_hour >= self.venue.close_hour {
            return Err(ConfigError::InvalidValue("OPEN_HOUR".to_string()));
        }
        if self.venue.close_hour > 24 {
            return Err(ConfigError::InvalidValue("CLOSE_HOUR".to_string()));
        }
        if self.refresh.interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "REFRESH_INTERVAL_SECONDS".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            telegram: TelegramConfig { bot_token: None },
            feed: FeedConfig {
                url: "https://platform.aklbadminton.com/api/booking/feed".to_string(),
                timeout_seconds: 30,
            },
            store: StoreConfig {
                path: PathBuf::from("data/subscriptions.json"),
            },
            venue: VenueConfig {
                courts: 12,
                open_hour: 6,
                close_hour: 24,
                utc_offset_minutes: None,
            },
            refresh: RefreshConfig {
                interval_seconds: 60,
                window_days: 7,
            },
        }
    }
}
