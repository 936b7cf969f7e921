use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Shared with the identity provider that issues session tokens.
    pub jwt_secret: String,
    /// Base URL handed out for webhook registration.
    pub public_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("LEADBOARD_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("LEADBOARD_JWT_SECRET is unset or still a placeholder");
        }

        let host = lookup("LEADBOARD_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("LEADBOARD_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("LEADBOARD_PORT is not a valid port")?;
        let db_path: PathBuf = lookup("LEADBOARD_DB_PATH")
            .unwrap_or_else(|| "leadboard.db".into())
            .into();
        let public_url = lookup("LEADBOARD_PUBLIC_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            public_url,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}
