use std::{
    env,
    fmt,
    fmt::{Debug, Formatter},
    io::Write,
    net::IpAddr,
    str::FromStr,
};

use chrono::Duration;
use jwt_compact::alg::Hs256Key;
use log::*;
use rand::RngCore;
use sok_common::parse_boolean_flag;
use tempfile::NamedTempFile;

use crate::errors::ServerError;

pub const DEFAULT_SOK_HOST: &str = "127.0.0.1";
pub const DEFAULT_SOK_PORT: u16 = 8360;
pub const DEFAULT_TOKEN_VALIDITY_HOURS: i64 = 24;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Trust the `X-Forwarded-For` header when determining the remote peer address.
    pub use_x_forwarded_for: bool,
    /// Trust the `Forwarded` header when determining the remote peer address.
    pub use_forwarded: bool,
    /// If set, payment notifications are only accepted from these IP addresses.
    pub payment_whitelist: Option<Vec<IpAddr>>,
    /// How long issued access tokens remain valid.
    pub access_token_validity: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SOK_HOST.into(),
            port: DEFAULT_SOK_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            payment_whitelist: None,
            access_token_validity: Duration::hours(DEFAULT_TOKEN_VALIDITY_HOURS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.into(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SOK_HOST").ok().unwrap_or_else(|| DEFAULT_SOK_HOST.into());
        let port = env::var("SOK_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for SOK_PORT. {e} Using the default, {DEFAULT_SOK_PORT}, instead.");
                    DEFAULT_SOK_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SOK_PORT);
        let database_url = env::var("SOK_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SOK_DATABASE_URL is not set. Using an empty database URL. The server will not be very useful.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!("🪛️ Could not load the token signing key from the environment. {e}");
            AuthConfig::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("SOK_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("SOK_USE_FORWARDED").ok(), false);
        let payment_whitelist = configure_payment_whitelist();
        let access_token_validity = configure_token_validity();
        Self {
            host,
            port,
            database_url,
            auth,
            use_x_forwarded_for,
            use_forwarded,
            payment_whitelist,
            access_token_validity,
        }
    }
}

/// Reads `SOK_PAYMENT_IP_WHITELIST` from the environment. A comma-separated list of IP addresses restricts the
/// payment webhook to those peers. The values "none", "false" or "0" disable the whitelist explicitly, as does
/// leaving the variable unset.
fn configure_payment_whitelist() -> Option<Vec<IpAddr>> {
    let whitelist = env::var("SOK_PAYMENT_IP_WHITELIST").ok().and_then(|s| {
        if ["none", "false", "0"].contains(&s.to_lowercase().as_str()) {
            return None;
        }
        let ips = s
            .split(',')
            .filter_map(|ip| {
                IpAddr::from_str(ip.trim())
                    .map_err(|e| warn!("🪛️ Ignoring invalid IP address in SOK_PAYMENT_IP_WHITELIST ({ip}). {e}"))
                    .ok()
            })
            .collect::<Vec<IpAddr>>();
        Some(ips)
    });
    match &whitelist {
        Some(ips) if ips.is_empty() => {
            warn!(
                "🚨️ SOK_PAYMENT_IP_WHITELIST was set, but no valid IP addresses were found. ALL payment \
                 notifications will be rejected."
            );
        },
        Some(ips) => {
            let ips = ips.iter().map(|ip| ip.to_string()).collect::<Vec<String>>().join(", ");
            info!("🪛️ Payment notifications are only accepted from these hosts: {ips}");
        },
        None => {
            info!("🪛️ No payment webhook whitelist is configured. Payment notifications are accepted from any host.");
        },
    }
    whitelist
}

fn configure_token_validity() -> Duration {
    env::var("SOK_ACCESS_TOKEN_VALIDITY")
        .map(|s| {
            s.parse::<i64>().map(Duration::hours).unwrap_or_else(|e| {
                error!(
                    "🪛️ {s} is not a valid number of hours for SOK_ACCESS_TOKEN_VALIDITY. {e} Using the default, \
                     {DEFAULT_TOKEN_VALIDITY_HOURS} hours, instead."
                );
                Duration::hours(DEFAULT_TOKEN_VALIDITY_HOURS)
            })
        })
        .ok()
        .unwrap_or_else(|| Duration::hours(DEFAULT_TOKEN_VALIDITY_HOURS))
}

/// Holds the symmetric key used to sign and verify access tokens.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_signing_key: Hs256Key,
}

impl Debug for AuthConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig").field("jwt_signing_key", &"***").finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!("🚨️🚨️🚨️ SOK_JWT_SIGNING_KEY is not set. A random key is being generated for this session. 🚨️🚨️🚨️");
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        let key_b64 = base64::encode(key);
        match NamedTempFile::new().ok().and_then(|f| f.keep().ok()) {
            Some((mut file, path)) => {
                let keys = serde_json::json!({ "jwt_signing_key": key_b64 });
                let _ = writeln!(file, "{keys}");
                warn!(
                    "🚨️🚨️🚨️ The session key has been written to {}. Save it somewhere safe and set \
                     SOK_JWT_SIGNING_KEY so that access tokens survive a server restart. 🚨️🚨️🚨️",
                    path.display()
                );
            },
            None => {
                warn!("🚨️🚨️🚨️ The session key could not be saved. Access tokens will not survive a restart. 🚨️🚨️🚨️");
            },
        }
        Self { jwt_signing_key: Hs256Key::new(key) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let key = env::var("SOK_JWT_SIGNING_KEY")
            .map_err(|_| ServerError::ConfigurationError("SOK_JWT_SIGNING_KEY is not set.".to_string()))?;
        Self::try_from(key.as_str())
    }
}

impl TryFrom<&str> for AuthConfig {
    type Error = ServerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let key = base64::decode(value.trim())
            .map_err(|e| ServerError::ConfigurationError(format!("The JWT signing key is not valid base64. {e}")))?;
        if key.len() < 32 {
            return Err(ServerError::ConfigurationError(format!(
                "The JWT signing key must be at least 32 bytes long, but {} bytes were provided.",
                key.len()
            )));
        }
        Ok(Self { jwt_signing_key: Hs256Key::new(key) })
    }
}
