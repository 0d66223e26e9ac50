use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 上游评估服务地址
    pub api: ApiConfig,
    /// 写入批改结果的模型版本
    pub model_version: ModelVersionConfig,
    /// 单步重试策略
    pub retry: RetryConfig,
    /// 输出事件通道容量
    pub event_buffer: usize,
    /// HTTP 请求超时（秒）
    pub http_timeout_secs: u64,
    /// 日志级别
    pub log_level: String,
}

/// 上游评估服务地址
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub essay_info: String,
    pub word_sentence: String,
    pub grammar_info: String,
    pub fluency: String,
    pub overall: String,
    pub expression: String,
    pub suggestion: String,
    pub paragraph: String,
    pub score: String,
    pub polishing: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ModelVersionConfig {
    pub name: String,
    pub version: String,
}

/// 重试配置
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

impl ApiConfig {
    /// 以同一个服务根地址派生所有上游接口
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let endpoint = |name: &str| format!("{}/{}", base, name);
        Self {
            essay_info: endpoint("essay_info"),
            word_sentence: endpoint("word_sentence"),
            grammar_info: endpoint("grammar_info"),
            fluency: endpoint("fluency"),
            overall: endpoint("overall"),
            expression: endpoint("expression"),
            suggestion: endpoint("suggestion"),
            paragraph: endpoint("paragraph"),
            score: endpoint("score"),
            polishing: endpoint("polishing"),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_API_BASE_URL)
    }
}

impl Default for ModelVersionConfig {
    fn default() -> Self {
        Self {
            name: "essay-evaluator".to_string(),
            version: "v2".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            model_version: ModelVersionConfig::default(),
            retry: RetryConfig::default(),
            event_buffer: 50,
            http_timeout_secs: 300,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// 优先读取 `CONFIG_PATH` 指向的 TOML 文件，否则使用环境变量
    pub fn load() -> AppResult<Self> {
        match std::env::var("CONFIG_PATH") {
            Ok(path) if !path.is_empty() => Self::from_toml_file(path),
            _ => Self::from_env(),
        }
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: display.clone(),
            source,
        })?;
        Self::from_toml_str(&raw, &display)
    }

    pub fn from_toml_str(raw: &str, path: &str) -> AppResult<Self> {
        let config = toml::from_str(raw).map_err(|source| ConfigError::TomlParseFailed {
            path: path.to_string(),
            source,
        })?;
        Ok(config)
    }

    pub fn from_env() -> AppResult<Self> {
        let default = Self::default();

        let mut api = match std::env::var("ESSAY_API_BASE_URL") {
            Ok(base) => ApiConfig::with_base_url(&base),
            Err(_) => default.api,
        };
        override_endpoint(&mut api.essay_info, "ESSAY_API_ESSAY_INFO");
        override_endpoint(&mut api.word_sentence, "ESSAY_API_WORD_SENTENCE");
        override_endpoint(&mut api.grammar_info, "ESSAY_API_GRAMMAR_INFO");
        override_endpoint(&mut api.fluency, "ESSAY_API_FLUENCY");
        override_endpoint(&mut api.overall, "ESSAY_API_OVERALL");
        override_endpoint(&mut api.expression, "ESSAY_API_EXPRESSION");
        override_endpoint(&mut api.suggestion, "ESSAY_API_SUGGESTION");
        override_endpoint(&mut api.paragraph, "ESSAY_API_PARAGRAPH");
        override_endpoint(&mut api.score, "ESSAY_API_SCORE");
        override_endpoint(&mut api.polishing, "ESSAY_API_POLISHING");

        Ok(Self {
            api,
            model_version: ModelVersionConfig {
                name: std::env::var("MODEL_NAME").unwrap_or(default.model_version.name),
                version: std::env::var("MODEL_VERSION").unwrap_or(default.model_version.version),
            },
            retry: RetryConfig {
                max_retries: parse_env("MAX_RETRIES", "u32")?.unwrap_or(default.retry.max_retries),
                ..default.retry
            },
            event_buffer: parse_env("EVENT_BUFFER", "usize")?.unwrap_or(default.event_buffer),
            http_timeout_secs: parse_env("HTTP_TIMEOUT_SECS", "u64")?
                .unwrap_or(default.http_timeout_secs),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(default.log_level),
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn override_endpoint(slot: &mut String, var_name: &str) {
    if let Ok(value) = std::env::var(var_name) {
        *slot = value;
    }
}

fn parse_env<T: std::str::FromStr>(var_name: &str, expected_type: &str) -> AppResult<Option<T>> {
    match std::env::var(var_name) {
        Ok(value) => value.parse().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_retry_policy() {
        let config = Config::default();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_delay(), Duration::from_millis(100));
        assert_eq!(config.retry.max_delay(), Duration::from_secs(2));
        assert_eq!(config.event_buffer, 50);
    }

    #[test]
    fn test_base_url_derives_every_endpoint() {
        let api = ApiConfig::with_base_url("http://essay.local/");
        assert_eq!(api.essay_info, "http://essay.local/essay_info");
        assert_eq!(api.polishing, "http://essay.local/polishing");
        assert_eq!(api.grammar_info, "http://essay.local/grammar_info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let raw = r#"
            event_buffer = 8

            [api]
            score = "http://score.local/v1/score"

            [retry]
            max_retries = 1
        "#;
        let config = Config::from_toml_str(raw, "inline.toml").unwrap();
        assert_eq!(config.event_buffer, 8);
        assert_eq!(config.api.score, "http://score.local/v1/score");
        assert_eq!(config.api.essay_info, ApiConfig::default().essay_info);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.initial_delay_ms, 100);
    }

    #[test]
    fn test_bad_toml_reports_path() {
        let err = Config::from_toml_str("event_buffer = \"many\"", "bad.toml").unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
