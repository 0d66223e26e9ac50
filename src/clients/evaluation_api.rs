//! 评估上游客户端
//!
//! 每个上游接口一个方法；协调器只依赖 `EvaluationApi` trait，
//! 测试中可以换成内存实现

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::config::ApiConfig;
use crate::error::AppResult;
use crate::infrastructure::{FrameStream, HttpClient};
use crate::models::request::{EssayContext, ScoreOptions};
use crate::models::upstream::{
    EssayInfoResponse, ExpressionResponse, FluencyResponse, GrammarResponse, OverallResponse,
    ParagraphResponse, ScoreResponse, SuggestionResponse, WordSentenceResponse,
};

/// 评估上游能力
///
/// 分段接口失败对整次批改是致命的，其余接口失败只影响自己的分区
#[async_trait]
pub trait EvaluationApi: Send + Sync {
    /// 分段分句 + 基础统计
    async fn essay_info(&self, title: &str, content: &str) -> AppResult<EssayInfoResponse>;

    async fn word_sentence(&self, ctx: &EssayContext) -> AppResult<WordSentenceResponse>;

    async fn grammar(&self, ctx: &EssayContext) -> AppResult<GrammarResponse>;

    async fn fluency(&self, ctx: &EssayContext) -> AppResult<FluencyResponse>;

    async fn overall(&self, ctx: &EssayContext) -> AppResult<OverallResponse>;

    async fn expression(&self, ctx: &EssayContext) -> AppResult<ExpressionResponse>;

    async fn suggestion(&self, ctx: &EssayContext) -> AppResult<SuggestionResponse>;

    async fn paragraph(&self, ctx: &EssayContext) -> AppResult<ParagraphResponse>;

    async fn score(&self, ctx: &EssayContext, options: &ScoreOptions) -> AppResult<ScoreResponse>;

    /// 润色流：每项是一个段落的原始 JSON 内容帧
    async fn polishing_stream(&self, ctx: &EssayContext) -> AppResult<FrameStream>;
}

/// 评分接口请求体
///
/// 评分服务要求 `type` 固定为 `essay`，并附带空的 `image`
#[derive(Debug, Serialize)]
struct ScorePayload<'a> {
    title: &'a str,
    essay: &'a str,
    grade: Option<i64>,
    #[serde(rename = "type")]
    kind: &'static str,
    image: &'static str,
    #[serde(flatten)]
    options: &'a ScoreOptions,
}

/// 基于 HTTP 的评估上游实现
#[derive(Clone)]
pub struct HttpEvaluationApi {
    http: HttpClient,
    endpoints: ApiConfig,
}

impl HttpEvaluationApi {
    pub fn new(http: HttpClient, endpoints: ApiConfig) -> Self {
        Self { http, endpoints }
    }
}

#[async_trait]
impl EvaluationApi for HttpEvaluationApi {
    async fn essay_info(&self, title: &str, content: &str) -> AppResult<EssayInfoResponse> {
        let body = json!({ "title": title, "essay": content });
        self.http.post_json(&self.endpoints.essay_info, &body).await
    }

    async fn word_sentence(&self, ctx: &EssayContext) -> AppResult<WordSentenceResponse> {
        self.http.post_json(&self.endpoints.word_sentence, ctx).await
    }

    async fn grammar(&self, ctx: &EssayContext) -> AppResult<GrammarResponse> {
        self.http.post_json(&self.endpoints.grammar_info, ctx).await
    }

    async fn fluency(&self, ctx: &EssayContext) -> AppResult<FluencyResponse> {
        self.http.post_json(&self.endpoints.fluency, ctx).await
    }

    async fn overall(&self, ctx: &EssayContext) -> AppResult<OverallResponse> {
        self.http.post_json(&self.endpoints.overall, ctx).await
    }

    async fn expression(&self, ctx: &EssayContext) -> AppResult<ExpressionResponse> {
        self.http.post_json(&self.endpoints.expression, ctx).await
    }

    async fn suggestion(&self, ctx: &EssayContext) -> AppResult<SuggestionResponse> {
        self.http.post_json(&self.endpoints.suggestion, ctx).await
    }

    async fn paragraph(&self, ctx: &EssayContext) -> AppResult<ParagraphResponse> {
        self.http.post_json(&self.endpoints.paragraph, ctx).await
    }

    async fn score(&self, ctx: &EssayContext, options: &ScoreOptions) -> AppResult<ScoreResponse> {
        let body = ScorePayload {
            title: &ctx.title,
            essay: &ctx.essay,
            grade: ctx.grade,
            kind: "essay",
            image: "",
            options,
        };
        self.http.post_json(&self.endpoints.score, &body).await
    }

    async fn polishing_stream(&self, ctx: &EssayContext) -> AppResult<FrameStream> {
        self.http.post_event_stream(&self.endpoints.polishing, ctx).await
    }
}
