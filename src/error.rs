use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 上游 API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 批改流程错误
    #[error("批改错误: {0}")]
    Evaluation(#[from] EvaluationError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 上游 API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 上游返回非 200 状态码
    #[error("API返回错误响应 ({endpoint}): status={status}, body={body}")]
    BadStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 流式接口返回了服务器错误帧
    #[error("服务器错误: {payload}")]
    StreamServerError { payload: String },
    /// 读取流式响应失败
    #[error("读取流式响应失败: {source}")]
    StreamReadFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 批改流程错误
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// 重试耗尽
    #[error("{step} 失败，已尝试 {attempts} 次: {last_error}")]
    RetriesExhausted {
        step: String,
        attempts: u32,
        #[source]
        last_error: Box<AppError>,
    },
    /// 调用方取消
    #[error("批改已取消 ({step})")]
    Cancelled { step: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|url| url.to_string())
            .unwrap_or_default();
        AppError::Api(ApiError::RequestFailed {
            endpoint,
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建非 200 响应错误
    pub fn bad_status(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        AppError::Api(ApiError::BadStatus {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        })
    }

    /// 创建取消错误
    pub fn cancelled(step: impl Into<String>) -> Self {
        AppError::Evaluation(EvaluationError::Cancelled { step: step.into() })
    }

    /// 是否为取消错误
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Evaluation(EvaluationError::Cancelled { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_message_names_step_and_attempts() {
        let err = AppError::Evaluation(EvaluationError::RetriesExhausted {
            step: "grammar".to_string(),
            attempts: 4,
            last_error: Box::new(AppError::Other("连接被拒绝".to_string())),
        });

        let msg = err.to_string();
        assert!(msg.contains("grammar"));
        assert!(msg.contains("4"));
        assert!(msg.contains("连接被拒绝"));
    }

    #[test]
    fn test_cancelled_is_detected() {
        assert!(AppError::cancelled("score").is_cancelled());
        assert!(!AppError::Other("x".to_string()).is_cancelled());
    }
}
