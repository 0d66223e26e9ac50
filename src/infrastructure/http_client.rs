//! HTTP 客户端 - 基础设施层
//!
//! 持有唯一的 reqwest 连接池，只暴露"发 JSON"和"读事件流"两种能力

use std::time::Duration;

use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infrastructure::sse::{self, FrameStream};
use crate::utils::logging::truncate_text;

/// 错误响应体最多保留的字符数
const ERROR_BODY_LIMIT: usize = 1024;

/// HTTP 客户端
///
/// 职责：
/// - 持有 reqwest::Client（内部为 Arc，可廉价 clone）
/// - 不认识任何评估步骤
/// - 非 200 一律视为错误
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// 创建新的 HTTP 客户端
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::api_request_failed("client builder", e))?;
        Ok(Self { client })
    }

    /// POST JSON 并把响应体解析为 `T`
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;

        let response = ensure_ok(url, response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;
        let parsed = serde_json::from_slice(&bytes)?;
        Ok(parsed)
    }

    /// POST JSON 并以 SSE 方式读取响应
    ///
    /// # 返回
    /// 返回内容帧流；`end` 帧之后流自然结束
    pub async fn post_event_stream<B>(&self, url: &str, body: &B) -> AppResult<FrameStream>
    where
        B: Serialize + ?Sized,
    {
        debug!("POST (stream) {}", url);

        let response = self
            .client
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;

        let response = ensure_ok(url, response).await?;

        Ok(sse::content_frames(response.bytes_stream()))
    }
}

async fn ensure_ok(url: &str, response: Response) -> AppResult<Response> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(text) => truncate_text(&text, ERROR_BODY_LIMIT),
        Err(e) => format!("failed to read response body: {}", e),
    };
    Err(AppError::bad_status(url, status.as_u16(), body))
}
