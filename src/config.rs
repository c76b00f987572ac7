use std::{env, io};

use secrecy::SecretString;
use tracing::debug;

const DEFAULT_PLACES_API_BASE: &str = "https://places.googleapis.com";
const DEFAULT_RATE_LIMIT_QPS: u32 = 10;

#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    pub places_api_key: Option<SecretString>,
    pub places_api_base: String,
    pub places_rate_limit_qps: u32,
}

impl DiscoveryConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            places_api_key: env::var("GOOGLE_PLACES_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            places_api_base: env::var("PLACES_API_BASE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PLACES_API_BASE.to_string()),
            places_rate_limit_qps: parse_u32("PLACES_RATE_LIMIT_QPS", DEFAULT_RATE_LIMIT_QPS),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            places_api_key: None,
            places_api_base: DEFAULT_PLACES_API_BASE.to_string(),
            places_rate_limit_qps: DEFAULT_RATE_LIMIT_QPS,
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}
