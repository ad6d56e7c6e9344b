//! Configuration resolution for psq-ingest
//!
//! Provides multi-tier configuration resolution with
//! command line → environment → TOML → built-in default priority.

use psq_common::config::LimsSection;
use psq_common::{Error, Result};
use tracing::{debug, warn};

pub const ENV_BASE_URL: &str = "QBENCH_BASE_URL";
pub const ENV_CLIENT_ID: &str = "QBENCH_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "QBENCH_CLIENT_SECRET";
pub const ENV_JWT_LEEWAY_S: &str = "QBENCH_JWT_LEEWAY_S";
pub const ENV_JWT_TTL_S: &str = "QBENCH_JWT_TTL_S";
pub const ENV_PAGE_SIZE: &str = "QBENCH_PAGE_SIZE";
pub const ENV_REFERENCE_MASS: &str = "PSQ_REFERENCE_MASS";

pub const DEFAULT_JWT_LEEWAY_S: i64 = 20;
pub const DEFAULT_JWT_TTL_S: i64 = 3580;
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_REFERENCE_MASS: f64 = 500.0;

/// Values supplied on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct LimsOverrides {
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub page_size: Option<usize>,
}

/// Fully resolved LIMS connection settings
#[derive(Clone)]
pub struct LimsSettings {
    /// API root without trailing slash
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Seconds subtracted from "now" for the assertion's issued-at claim
    pub jwt_leeway_s: i64,
    /// Requested assertion lifetime (capped when signing)
    pub jwt_ttl_s: i64,
    /// Head-truncation cap on sample ids per batch; `None` keeps all
    pub page_size: Option<usize>,
    /// Nominal sample mass for the weight tie-break
    pub reference_mass: f64,
}

impl std::fmt::Debug for LimsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimsSettings")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("jwt_leeway_s", &self.jwt_leeway_s)
            .field("jwt_ttl_s", &self.jwt_ttl_s)
            .field("page_size", &self.page_size)
            .field("reference_mass", &self.reference_mass)
            .finish()
    }
}

impl LimsSettings {
    /// Resolve settings from overrides, environment and TOML
    ///
    /// Fails with a single `Config` error listing every missing required
    /// value, so the operator can fix them all at once.
    pub fn resolve(overrides: &LimsOverrides, toml: &LimsSection) -> Result<Self> {
        let base_url = pick_string("base URL", overrides.base_url.as_ref(), ENV_BASE_URL, toml.base_url.as_ref());
        let client_id = pick_string("client id", overrides.client_id.as_ref(), ENV_CLIENT_ID, toml.client_id.as_ref());
        let client_secret = pick_string(
            "client secret",
            overrides.client_secret.as_ref(),
            ENV_CLIENT_SECRET,
            toml.client_secret.as_ref(),
        );

        let mut missing = Vec::new();
        if base_url.is_none() {
            missing.push(ENV_BASE_URL);
        }
        if client_id.is_none() {
            missing.push(ENV_CLIENT_ID);
        }
        if client_secret.is_none() {
            missing.push(ENV_CLIENT_SECRET);
        }
        let (Some(base_url), Some(client_id), Some(client_secret)) = (base_url, client_id, client_secret) else {
            return Err(Error::Config(format!(
                "Missing LIMS settings: {}. Set them in the environment or in the [lims] table of the config file",
                missing.join(", ")
            )));
        };

        let jwt_leeway_s = env_parsed::<i64>(ENV_JWT_LEEWAY_S)?
            .or(toml.jwt_leeway_s)
            .unwrap_or(DEFAULT_JWT_LEEWAY_S);
        let jwt_ttl_s = env_parsed::<i64>(ENV_JWT_TTL_S)?
            .or(toml.jwt_ttl_s)
            .unwrap_or(DEFAULT_JWT_TTL_S);
        if jwt_ttl_s <= 0 {
            return Err(Error::Config(format!("{} must be positive, got {}", ENV_JWT_TTL_S, jwt_ttl_s)));
        }

        let page_size = match overrides.page_size {
            Some(size) => size,
            None => env_parsed::<usize>(ENV_PAGE_SIZE)?
                .or(toml.page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE),
        };

        let reference_mass = env_parsed::<f64>(ENV_REFERENCE_MASS)?
            .or(toml.reference_mass)
            .unwrap_or(DEFAULT_REFERENCE_MASS);
        if !reference_mass.is_finite() {
            return Err(Error::Config(format!("{} must be a finite number", ENV_REFERENCE_MASS)));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
            jwt_leeway_s,
            jwt_ttl_s,
            page_size: (page_size > 0).then_some(page_size),
            reference_mass,
        })
    }
}

/// Validate setting value (non-empty, non-whitespace)
fn is_valid(value: &str) -> bool {
    !value.trim().is_empty()
}

fn pick_string(
    label: &str,
    cli: Option<&String>,
    env_name: &str,
    toml: Option<&String>,
) -> Option<String> {
    let env_value = std::env::var(env_name).ok().filter(|v| is_valid(v));
    let cli = cli.filter(|v| is_valid(v));
    let toml = toml.filter(|v| is_valid(v));

    let sources = [cli.is_some(), env_value.is_some(), toml.is_some()]
        .iter()
        .filter(|present| **present)
        .count();
    if sources > 1 {
        warn!("LIMS {} found in multiple sources, using highest priority", label);
    }

    if let Some(v) = cli {
        debug!("LIMS {} taken from command line", label);
        return Some(v.trim().to_string());
    }
    if let Some(v) = env_value {
        debug!("LIMS {} taken from environment ({})", label, env_name);
        return Some(v.trim().to_string());
    }
    toml.map(|v| {
        debug!("LIMS {} taken from config file", label);
        v.trim().to_string()
    })
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if is_valid(&raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", name, raw))),
        _ => Ok(None),
    }
}
