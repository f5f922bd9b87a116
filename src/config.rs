use std::{env, fs, time::Duration};

use secrecy::SecretString;

use crate::{
    constants::prompts::{ITEM_GENERATOR_PROMPT, TOPIC_SUMMARY_PROMPT},
    errors::{AppError, AppResult},
};

const DEFAULT_API_KEY: &str = "openai_api_key";

const DEFAULT_CATEGORIES: [&str; 8] = [
    "geography",
    "science",
    "history",
    "space",
    "nature",
    "sports",
    "technology",
    "economics",
];

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_conn_string: String,
    pub mongo_db_name: String,
    pub items_collection: String,
    pub web_server_host: String,
    pub web_server_port: u16,
    pub openai_api_key: SecretString,
    pub openai_api_base: String,
    pub openai_request_timeout: Duration,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dimensions: u32,
    pub generation: GenerationConfig,
}

/// Tunables for a single generation run, all overridable from the environment.
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    pub run_budget: Duration,
    pub pause_between_items: Duration,
    pub summary_temperature: f32,
    pub summary_max_tokens: u32,
    pub item_temperature: f32,
    pub item_max_tokens: u32,
    pub lexical_similarity_threshold: f64,
    pub embedding_similarity_threshold: f64,
    pub similarity_match_limit: usize,
    pub daily_limit_threshold: Duration,
    pub default_rate_limit_wait: Duration,
    pub daily_rate_limit_wait: Duration,
    pub source_url_timeout: Duration,
    pub categories: Vec<String>,
    pub summary_prompt: String,
    pub item_prompt: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    Duration::from_millis(env_parse(key, default.as_millis() as u64))
}

/// Reads a prompt template from the file named by `key`, falling back to the built-in text.
fn prompt_from_env(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(path) => match fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                log::warn!("Prompt file {} is empty, using built-in prompt", path);
                default.to_string()
            }
            Err(e) => {
                log::warn!("Failed to read prompt file {}: {}, using built-in prompt", path, e);
                default.to_string()
            }
        },
        Err(_) => default.to_string(),
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            run_budget: Duration::from_secs(55),
            pause_between_items: Duration::from_secs(1),
            summary_temperature: 1.0,
            summary_max_tokens: 60,
            item_temperature: 0.9,
            item_max_tokens: 1024,
            lexical_similarity_threshold: 0.35,
            embedding_similarity_threshold: 0.85,
            similarity_match_limit: 5,
            daily_limit_threshold: Duration::from_secs(5 * 60),
            default_rate_limit_wait: Duration::from_secs(60),
            daily_rate_limit_wait: Duration::from_secs(24 * 60 * 60),
            source_url_timeout: Duration::from_secs(5),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            summary_prompt: TOPIC_SUMMARY_PROMPT.to_string(),
            item_prompt: ITEM_GENERATOR_PROMPT.to_string(),
        }
    }
}

impl GenerationConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let categories = env::var("GENERATION_CATEGORIES")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|c| c.trim().to_lowercase())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|c| !c.is_empty())
            .unwrap_or(defaults.categories);

        Self {
            run_budget: env_millis("GENERATION_RUN_BUDGET_MS", defaults.run_budget),
            pause_between_items: env_millis("GENERATION_PAUSE_MS", defaults.pause_between_items),
            summary_temperature: env_parse("SUMMARY_TEMPERATURE", defaults.summary_temperature),
            summary_max_tokens: env_parse("SUMMARY_MAX_TOKENS", defaults.summary_max_tokens),
            item_temperature: env_parse("ITEM_TEMPERATURE", defaults.item_temperature),
            item_max_tokens: env_parse("ITEM_MAX_TOKENS", defaults.item_max_tokens),
            lexical_similarity_threshold: env_parse(
                "LEXICAL_SIMILARITY_THRESHOLD",
                defaults.lexical_similarity_threshold,
            ),
            embedding_similarity_threshold: env_parse(
                "EMBEDDING_SIMILARITY_THRESHOLD",
                defaults.embedding_similarity_threshold,
            ),
            similarity_match_limit: env_parse(
                "SIMILARITY_MATCH_LIMIT",
                defaults.similarity_match_limit,
            ),
            daily_limit_threshold: env_millis(
                "DAILY_LIMIT_THRESHOLD_MS",
                defaults.daily_limit_threshold,
            ),
            default_rate_limit_wait: env_millis(
                "DEFAULT_RATE_LIMIT_WAIT_MS",
                defaults.default_rate_limit_wait,
            ),
            daily_rate_limit_wait: env_millis(
                "DAILY_RATE_LIMIT_WAIT_MS",
                defaults.daily_rate_limit_wait,
            ),
            source_url_timeout: env_millis("SOURCE_URL_TIMEOUT_MS", defaults.source_url_timeout),
            categories,
            summary_prompt: prompt_from_env("TOPIC_SUMMARY_PROMPT_FILE", TOPIC_SUMMARY_PROMPT),
            item_prompt: prompt_from_env("ITEM_GENERATOR_PROMPT_FILE", ITEM_GENERATOR_PROMPT),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("LEXICAL_SIMILARITY_THRESHOLD", self.lexical_similarity_threshold),
            ("EMBEDDING_SIMILARITY_THRESHOLD", self.embedding_similarity_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(AppError::ValidationError(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.run_budget.is_zero() {
            return Err(AppError::ValidationError(
                "GENERATION_RUN_BUDGET_MS must be greater than zero".to_string(),
            ));
        }

        if self.categories.is_empty() {
            return Err(AppError::ValidationError(
                "GENERATION_CATEGORIES must name at least one category".to_string(),
            ));
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            categories: vec!["geography".to_string(), "science".to_string()],
            ..Self::default()
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            mongo_conn_string: env_or("MONGO_CONN_STRING", "mongodb://localhost:27017"),
            mongo_db_name: env_or("MONGO_DB_NAME", "numeracy-local"),
            items_collection: env_or("ITEMS_COLLECTION", "items"),
            web_server_host: env_or("WEB_SERVER_HOST", "localhost"),
            web_server_port: env_parse("WEB_SERVER_PORT", 8080),
            openai_api_key: SecretString::from(env_or("OPENAI_API_KEY", DEFAULT_API_KEY)),
            openai_api_base: env_or("OPENAI_API_BASE", "https://api.openai.com/v1"),
            openai_request_timeout: env_millis(
                "OPENAI_REQUEST_TIMEOUT_MS",
                Duration::from_secs(30),
            ),
            chat_model: env_or("CHAT_MODEL", "gpt-4o-mini"),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dimensions: env_parse("EMBEDDING_DIMENSIONS", 768),
            generation: GenerationConfig::from_env(),
        }
    }

    /// Validate that production-critical configuration is set
    pub fn validate_for_production(&self) -> AppResult<()> {
        use secrecy::ExposeSecret;

        if self.openai_api_key.expose_secret() == DEFAULT_API_KEY {
            return Err(AppError::ValidationError(
                "OPENAI_API_KEY is using default value! Set OPENAI_API_KEY environment variable."
                    .to_string(),
            ));
        }

        if self.embedding_dimensions == 0 {
            return Err(AppError::ValidationError(
                "EMBEDDING_DIMENSIONS must be greater than zero".to_string(),
            ));
        }

        self.generation.validate()
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            mongo_conn_string: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "numeracy-test".to_string(),
            items_collection: "items".to_string(),
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 8080,
            openai_api_key: SecretString::from("test_api_key".to_string()),
            openai_api_base: "http://localhost:11434/v1".to_string(),
            openai_request_timeout: Duration::from_secs(5),
            chat_model: "test-chat-model".to_string(),
            embedding_model: "test-embedding-model".to_string(),
            embedding_dimensions: 768,
            generation: GenerationConfig::test_config(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env_with_defaults() {
        let config = Config::from_env();

        // Should use env vars if set, or fall back to defaults
        assert!(!config.mongo_conn_string.is_empty());
        assert!(!config.mongo_db_name.is_empty());
        assert!(!config.generation.categories.is_empty());
        assert!(!config.generation.item_prompt.is_empty());
    }

    #[test]
    fn test_test_config() {
        let config = Config::test_config();

        assert_eq!(config.mongo_db_name, "numeracy-test");
        assert_eq!(config.items_collection, "items");
        assert_eq!(config.generation.run_budget, Duration::from_secs(55));
        assert_eq!(config.generation.embedding_similarity_threshold, 0.85);
    }

    #[test]
    fn test_config_passes_production_validation() {
        assert!(Config::test_config().validate_for_production().is_ok());
    }

    #[test]
    fn test_default_api_key_rejected() {
        let mut config = Config::test_config();
        config.openai_api_key = SecretString::from(DEFAULT_API_KEY.to_string());

        assert!(matches!(
            config.validate_for_production(),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let mut generation = GenerationConfig::test_config();
        generation.embedding_similarity_threshold = 1.5;
        assert!(generation.validate().is_err());

        generation.embedding_similarity_threshold = 0.85;
        generation.lexical_similarity_threshold = 0.0;
        assert!(generation.validate().is_err());
    }

    #[test]
    fn test_empty_categories_rejected() {
        let mut generation = GenerationConfig::test_config();
        generation.categories.clear();
        assert!(generation.validate().is_err());
    }
}
