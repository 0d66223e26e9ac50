//! 输出给调用方的流式事件

use phf::phf_map;
use serde::Serialize;

use crate::models::response::{
    EssayInfo, EvaluationResult, ExpressionEvaluation, FluencyEvaluation, OverallEvaluation,
    ParagraphEvaluation, PolishingEvaluation, ScoreEvaluation, SegmentedText,
    SuggestionEvaluation, WordSentenceEvaluation,
};

/// 批改流程中的步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Init,
    EssayInfo,
    WordSentence,
    Grammar,
    Fluency,
    Overall,
    Expression,
    Suggestion,
    Paragraph,
    Score,
    Polishing,
    Finish,
    Panic,
}

static STEP_MESSAGES: phf::Map<&'static str, &'static str> = phf_map! {
    "init" => "开始作文批改",
    "essay_info" => "作文信息分析完成",
    "word_sentence" => "词句评估完成",
    "grammar" => "语法检查完成",
    "fluency" => "流畅度评估完成",
    "overall" => "总体评价完成",
    "expression" => "表达评估完成",
    "suggestion" => "建议生成完成",
    "paragraph" => "段落评估完成",
    "score" => "评分完成",
    "polishing" => "作文润色完成",
    "finish" => "作文批改完成",
};

impl Step {
    /// 并发分发的 9 个步骤
    pub const FAN_OUT: [Step; 9] = [
        Step::WordSentence,
        Step::Grammar,
        Step::Fluency,
        Step::Overall,
        Step::Expression,
        Step::Suggestion,
        Step::Paragraph,
        Step::Score,
        Step::Polishing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Init => "init",
            Step::EssayInfo => "essay_info",
            Step::WordSentence => "word_sentence",
            Step::Grammar => "grammar",
            Step::Fluency => "fluency",
            Step::Overall => "overall",
            Step::Expression => "expression",
            Step::Suggestion => "suggestion",
            Step::Paragraph => "paragraph",
            Step::Score => "score",
            Step::Polishing => "polishing",
            Step::Finish => "finish",
            Step::Panic => "panic",
        }
    }

    /// 步骤完成时的提示消息
    pub fn message(self) -> String {
        match STEP_MESSAGES.get(self.as_str()) {
            Some(msg) => (*msg).to_string(),
            None => format!("{}完成", self.as_str()),
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Init,
    Progress,
    Complete,
    Error,
}

/// 流式批改事件
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub step: Step,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,
    pub timestamp: i64,
}

/// 事件负载，形状取决于 `step`
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventData {
    Init(InitData),
    Slice(AiEvaluationSlice),
    Complete(Box<EvaluationResult>),
    Error(ErrorData),
}

/// 分段完成后下发的基础信息
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitData {
    pub title: String,
    pub text: SegmentedText,
    pub essay_info: EssayInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorData {
    pub error: String,
    pub step: Step,
}

/// 单个步骤完成后只携带它写入的分区
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiEvaluationSlice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_evaluation: Option<OverallEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fluency_evaluation: Option<FluencyEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_sentence_evaluation: Option<WordSentenceEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_evaluation: Option<ExpressionEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion_evaluation: Option<SuggestionEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_evaluations: Option<Vec<ParagraphEvaluation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_evaluation: Option<ScoreEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polishing_evaluation: Option<Vec<PolishingEvaluation>>,
}

impl StreamEvent {
    fn new(kind: EventType, step: Step, progress: u8, message: String, data: Option<EventData>) -> Self {
        Self {
            kind,
            step,
            progress,
            message,
            data,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn init() -> Self {
        Self::new(EventType::Init, Step::Init, 0, Step::Init.message(), None)
    }

    pub fn progress(step: Step, progress: u8, data: EventData) -> Self {
        Self::new(EventType::Progress, step, progress, step.message(), Some(data))
    }

    pub fn complete(result: EvaluationResult) -> Self {
        Self::new(
            EventType::Complete,
            Step::Finish,
            100,
            Step::Finish.message(),
            Some(EventData::Complete(Box::new(result))),
        )
    }

    pub fn error(step: Step, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            EventType::Error,
            step,
            0,
            message.into(),
            Some(EventData::Error(ErrorData {
                error: error.into(),
                step,
            })),
        )
    }

    /// `complete` 和 `error` 决定请求生命周期
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventType::Complete | EventType::Error)
    }

    /// 渲染为 SSE 帧：`event: message\ndata: <json>\n\n`
    pub fn to_sse_frame(&self) -> serde_json::Result<String> {
        let data = serde_json::to_string(self)?;
        Ok(format!("event: message\ndata: {}\n\n", data))
    }
}
