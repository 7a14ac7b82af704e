//! Process configuration read from the environment (and `.env` via dotenv).

use crate::error::{QueryError, Result};
use chrono::{Datelike, Local};
use std::env;
use std::str::FromStr;

pub const DEFAULT_PREVIEW_CHARS: usize = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Gemini,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com/v1",
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::Gemini => "gemini-2.0-flash",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            other => Err(QueryError::Config(format!("Unknown LLM_PROVIDER: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub llm: LlmConfig,
    pub listen_addr: String,
    /// Year assumed for dates that name none.
    pub default_year: i32,
    /// Upper bound on the row preview embedded in the answer prompt.
    pub answer_preview_chars: usize,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get("LLM_PROVIDER") {
            Some(p) => p.parse()?,
            None => LlmProvider::OpenAi,
        };

        let api_key = get("LLM_API_KEY")
            .or_else(|| match provider {
                LlmProvider::OpenAi => get("OPENAI_API_KEY"),
                LlmProvider::Gemini => get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")),
            })
            .ok_or_else(|| QueryError::Config("Please set LLM_API_KEY".to_string()))?;

        let llm = LlmConfig {
            provider,
            api_key,
            model: get("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            base_url: get("LLM_BASE_URL").unwrap_or_else(|| provider.default_base_url().to_string()),
            timeout_secs: parse_opt(&get, "LLM_TIMEOUT_SECS")?,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            db_max_connections: parse_opt(&get, "DB_MAX_CONNECTIONS")?.unwrap_or(5),
            llm,
            listen_addr: get("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            default_year: parse_opt(&get, "DEFAULT_YEAR")?.unwrap_or_else(|| Local::now().year()),
            answer_preview_chars: parse_opt(&get, "ANSWER_PREVIEW_CHARS")?.unwrap_or(DEFAULT_PREVIEW_CHARS),
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| QueryError::Config("Please set DATABASE_URL".to_string()))
    }
}

fn parse_opt<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| QueryError::Config(format!("Invalid {}: {}", key, e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(cfg.llm.provider, LlmProvider::OpenAi);
        assert_eq!(cfg.llm.api_key, "sk-test");
        assert_eq!(cfg.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.listen_addr, "0.0.0.0:8000");
        assert_eq!(cfg.db_max_connections, 5);
        assert_eq!(cfg.answer_preview_chars, DEFAULT_PREVIEW_CHARS);
        assert!(cfg.database_url.is_none());
        assert!(cfg.require_database_url().is_err());
    }

    #[test]
    fn test_gemini_key_fallback() {
        let cfg = config(&[("LLM_PROVIDER", "gemini"), ("GOOGLE_API_KEY", "g-key")]).unwrap();
        assert_eq!(cfg.llm.provider, LlmProvider::Gemini);
        assert_eq!(cfg.llm.api_key, "g-key");
        assert_eq!(cfg.llm.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = config(&[]).unwrap_err();
        assert_eq!(err.category(), "config_error");
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = config(&[("LLM_API_KEY", "k"), ("DEFAULT_YEAR", "soon")]).unwrap_err();
        assert!(err.to_string().contains("DEFAULT_YEAR"));
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("LLM_API_KEY", "k"),
            ("DEFAULT_YEAR", "2025"),
            ("ANSWER_PREVIEW_CHARS", "500"),
            ("LLM_TIMEOUT_SECS", "30"),
            ("DATABASE_URL", "postgres://localhost/energy"),
        ])
        .unwrap();
        assert_eq!(cfg.default_year, 2025);
        assert_eq!(cfg.answer_preview_chars, 500);
        assert_eq!(cfg.llm.timeout_secs, Some(30));
        assert_eq!(cfg.require_database_url().unwrap(), "postgres://localhost/energy");
    }
}
