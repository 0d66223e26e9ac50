use serde::{Deserialize, Serialize};

/// 作文批改请求
///
/// 接收后不再修改；`content` 在进入协调器前会被清理一次
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essay_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<i64>,
    /// 题干/写作要求
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// 评分标准
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development_score: Option<i64>,
}

impl EvaluationRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// 是否指定了任一分项满分
    pub fn has_sub_score_weights(&self) -> bool {
        self.content_score.is_some()
            || self.expression_score.is_some()
            || self.structure_score.is_some()
            || self.development_score.is_some()
    }
}

/// 发给评估上游的作文上下文
///
/// `grade` / `type` 取自请求本身，未提供时序列化为 null
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EssayContext {
    pub title: String,
    pub essay: String,
    pub grade: Option<i64>,
    #[serde(rename = "type")]
    pub essay_type: Option<String>,
}

impl EssayContext {
    pub fn from_request(req: &EvaluationRequest) -> Self {
        Self {
            title: req.title.clone(),
            essay: req.content.clone(),
            grade: req.grade,
            essay_type: req.essay_type.clone(),
        }
    }
}

/// 评分接口的附加字段，与 `EssayContext` 平铺后发送
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rubric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<ScoreRatio>,
}

/// 自定义分项满分
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreRatio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub development: Option<i64>,
}

impl ScoreOptions {
    pub fn from_request(req: &EvaluationRequest) -> Self {
        let ratio = req.has_sub_score_weights().then(|| ScoreRatio {
            content: req.content_score,
            expression: req.expression_score,
            structure: req.structure_score,
            development: req.development_score,
        });
        Self {
            prompt: req.prompt.clone(),
            rubric: req.standard.clone(),
            ratio,
        }
    }
}
