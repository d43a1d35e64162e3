use anyhow::{bail, Context, Result};

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/reverse";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub business_utc_offset_hours: i64,
    pub home_default_radius_km: f64,
    pub home_block_max_items: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let home_default_radius_km = env_or("HOME_DEFAULT_RADIUS_KM", "10")
            .parse::<f64>()
            .context("HOME_DEFAULT_RADIUS_KM must be a number")?;
        if !home_default_radius_km.is_finite() || home_default_radius_km <= 0.0 {
            bail!("HOME_DEFAULT_RADIUS_KM must be positive");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            geocoder_url: env_or("GEOCODER_URL", DEFAULT_GEOCODER_URL),
            geocoder_user_agent: env_or(
                "GEOCODER_USER_AGENT",
                concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
            ),
            business_utc_offset_hours: env_or("BUSINESS_UTC_OFFSET_HOURS", "3")
                .parse::<i64>()
                .context("BUSINESS_UTC_OFFSET_HOURS must be an integer")?,
            home_default_radius_km,
            home_block_max_items: env_or("HOME_BLOCK_MAX_ITEMS", "30")
                .parse::<usize>()
                .context("HOME_BLOCK_MAX_ITEMS must be a positive integer")?,
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
