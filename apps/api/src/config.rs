use anyhow::{Context, Result};

use crate::interview::image_policy::ImagePolicy;
use crate::llm_client::DEFAULT_BASE_URL;

/// Application configuration loaded from environment variables.
/// Startup fails if the OpenAI credential is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub port: u16,
    pub rust_log: String,
    pub image_policy: ImagePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            image_policy: image_policy_from(
                std::env::var("IMAGE_ROLE_KEYWORDS").ok(),
                std::env::var("IMAGE_CONTEXT_KEYWORDS").ok(),
            ),
        })
    }
}

/// Default keyword tables extended with comma-separated extras.
fn image_policy_from(
    role_keywords: Option<String>,
    context_keywords: Option<String>,
) -> ImagePolicy {
    let policy = split_keywords(role_keywords)
        .into_iter()
        .fold(ImagePolicy::default(), ImagePolicy::with_role_keyword);
    split_keywords(context_keywords)
        .into_iter()
        .fold(policy, ImagePolicy::with_context_keyword)
}

fn split_keywords(raw: Option<String>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

fn require_env(key: &str) -> Result<String> {
    let value = std::env::var(key)
        .with_context(|| format!("Required environment variable '{key}' is not set"))?;
    if value.trim().is_empty() {
        anyhow::bail!("Required environment variable '{key}' is empty");
    }
    Ok(value)
}
