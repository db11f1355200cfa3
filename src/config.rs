use crate::judge::JudgeSettings;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Where recommendation reads get their verdicts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationSource {
    /// Serve the verdict cache as-is.
    Cached,
    /// Run a full evaluation pass before every read.
    Live,
}

impl FromStr for RecommendationSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cached" | "mongodb" | "db" => Ok(RecommendationSource::Cached),
            "live" | "llm" => Ok(RecommendationSource::Live),
            other => anyhow::bail!(
                "RECOMMENDATIONS_SOURCE must be 'cached' or 'live', got '{}'",
                other
            ),
        }
    }
}

impl fmt::Display for RecommendationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationSource::Cached => f.write_str("cached"),
            RecommendationSource::Live => f.write_str("live"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_concurrency: usize,
    pub llm_max_retries: u32,
    pub recommendations_source: RecommendationSource,
    pub tenders_path: String,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: var_or("PORT", "3000")
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            llm_api_key: std::env::var("LLM_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .map_err(|_| {
                    anyhow::anyhow!("LLM_API_KEY or OPENAI_API_KEY environment variable required")
                })
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("LLM_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            llm_base_url: {
                let raw = var_or("LLM_BASE_URL", "https://api.openai.com/v1");
                let parsed = url::Url::parse(&raw)
                    .map_err(|e| anyhow::anyhow!("LLM_BASE_URL is not a valid URL: {}", e))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    anyhow::bail!("LLM_BASE_URL must start with http:// or https://");
                }
                raw
            },
            llm_model: var_or("LLM_MODEL", "gpt-4o"),
            llm_temperature: var_or("LLM_TEMPERATURE", "0.2")
                .parse::<f32>()
                .map_err(|_| anyhow::anyhow!("LLM_TEMPERATURE must be a number"))
                .and_then(|t| {
                    if !(0.0..=2.0).contains(&t) {
                        anyhow::bail!("LLM_TEMPERATURE must be between 0.0 and 2.0");
                    }
                    Ok(t)
                })?,
            llm_concurrency: var_or("LLM_CONCURRENCY", "5")
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("LLM_CONCURRENCY must be a positive integer"))
                .and_then(|n| {
                    if n == 0 {
                        anyhow::bail!("LLM_CONCURRENCY must be at least 1");
                    }
                    Ok(n)
                })?,
            llm_max_retries: var_or("LLM_MAX_RETRIES", "2")
                .parse()
                .map_err(|_| anyhow::anyhow!("LLM_MAX_RETRIES must be a non-negative integer"))?,
            recommendations_source: var_or("RECOMMENDATIONS_SOURCE", "cached").parse()?,
            tenders_path: var_or("TENDERS_PATH", "resources/tenders.json"),
        };

        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            url_preview(&config.database_url)
        );
        tracing::debug!("LLM Base URL: {}", config.llm_base_url);
        tracing::debug!(
            "LLM model: {} (temperature {}, concurrency {}, retries {})",
            config.llm_model,
            config.llm_temperature,
            config.llm_concurrency,
            config.llm_max_retries
        );
        tracing::info!("Recommendations source: {}", config.recommendations_source);
        tracing::debug!("Tenders path: {}", config.tenders_path);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn judge_settings(&self) -> JudgeSettings {
        JudgeSettings {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            temperature: self.llm_temperature,
            max_retries: self.llm_max_retries,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// First 20 characters of a connection string, for logs.
fn url_preview(url: &str) -> String {
    url.chars().take(20).collect()
}
