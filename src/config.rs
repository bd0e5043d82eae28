//! Runtime settings loaded from the environment
//!
//! `.env` is loaded by the binary before this runs; everything here reads
//! plain environment variables. Base URLs are overridable so tests can point
//! the clients at local mock servers.

use anyhow::{anyhow, Context};

use crate::advisor::{DEFAULT_GEMINI_BASE, DEFAULT_GEMINI_MODEL};
use crate::client::{DEFAULT_API_BASE, DEFAULT_LOGIN_URL};

#[derive(Debug, Clone)]
pub struct Settings {
    pub manager_id: u64,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Browser-cookie fallback for when programmatic login is rejected.
    pub cookie: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub api_base_url: String,
    pub login_url: String,
    pub gemini_base_url: String,
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let manager_id = env_opt("FPL_MANAGER_ID")
            .ok_or_else(|| anyhow!("FPL_MANAGER_ID not set; set it in .env or the environment"))?
            .parse::<u64>()
            .context("FPL_MANAGER_ID must be an integer")?;

        Ok(Settings {
            manager_id,
            email: env_opt("FPL_EMAIL"),
            password: env_opt("FPL_PASSWORD"),
            cookie: env_opt("FPL_COOKIE"),
            gemini_api_key: env_opt("GOOGLE_AI_API_KEY"),
            gemini_model: env_opt("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
            api_base_url: env_opt("FPL_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
            login_url: env_opt("FPL_LOGIN_URL").unwrap_or_else(|| DEFAULT_LOGIN_URL.into()),
            gemini_base_url: env_opt("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE.into()),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.email.is_some() && self.password.is_some()
    }
}
