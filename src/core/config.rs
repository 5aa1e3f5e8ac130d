use std::env;

use crate::core::errors::RagError;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_SAFETY_URL: &str = "https://detectors.haizelabs.com/input-safety";

const DEFAULT_ALLOWED_ROLES: &str = "ceo,manager,intern";

/// Store addressing, in order of granularity:
/// database => collection == index => embedding field.
#[derive(Debug, Clone)]
pub struct SearchTarget {
    pub database: String,
    pub collection: String,
    pub index: String,
    pub embedding_field: String,
}

/// Process configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mongo_uri: String,
    pub api_key: String,
    pub api_base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub safety_url: String,
    /// Absent key disables the safety gate entirely.
    pub safety_key: Option<String>,
    pub allowed_roles: Vec<String>,
    pub target: SearchTarget,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, RagError> {
        let mongo_uri = require("MONGODB_URI")?;
        let api_key = require("OPENAI_API_KEY")?;

        Ok(AppConfig {
            mongo_uri,
            api_key,
            api_base_url: var_or("OPENAI_BASE_URL", DEFAULT_API_BASE_URL),
            embedding_model: var_or("ROLEGATE_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            chat_model: var_or("ROLEGATE_CHAT_MODEL", DEFAULT_CHAT_MODEL),
            safety_url: var_or("SAFETY_API_URL", DEFAULT_SAFETY_URL),
            safety_key: env::var("SAFETY_API_KEY").ok(),
            allowed_roles: split_roles(&var_or("ROLEGATE_ALLOWED_ROLES", DEFAULT_ALLOWED_ROLES)),
            target: SearchTarget {
                database: var_or("ROLEGATE_DB", "sample_mflix"),
                collection: var_or("ROLEGATE_COLLECTION", "vector-test"),
                index: var_or("ROLEGATE_INDEX", "vector_index"),
                embedding_field: var_or("ROLEGATE_EMBEDDING_FIELD", "embedding"),
            },
        })
    }
}

fn require(key: &str) -> Result<String, RagError> {
    env::var(key).map_err(|_| RagError::Config(format!("missing required environment variable {key}")))
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn split_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
