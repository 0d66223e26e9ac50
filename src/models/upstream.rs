//! 上游评估服务的原始响应结构
//!
//! 所有字段都带 `#[serde(default)]`，上游缺字段时按零值处理

use serde::{Deserialize, Serialize};

/// 作文基本信息（分段分句）响应
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EssayInfoResponse {
    #[serde(rename = "grade_int")]
    pub grade: i64,
    pub essay_type: String,
    pub counting: EssayCounting,
    pub sents: Vec<Vec<String>>,
    #[serde(rename = "score_int")]
    pub all_score: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EssayCounting {
    pub adj_adv_num: i64,
    pub char_num: i64,
    pub dieci_num: i64,
    pub fluency: i64,
    pub grammar_mistake_num: i64,
    pub highlight_sents_num: i64,
    pub idiom_num: i64,
    pub noun_type_num: i64,
    pub para_num: i64,
    pub sent_num: i64,
    pub unique_word_num: i64,
    pub verb_type_num: i64,
    pub word_num: i64,
    pub written_mistake_num: i64,
}

/// 好词好句响应
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WordSentenceResponse {
    pub data: WordSentenceData,
    pub score: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WordSentenceData {
    pub results: WordSentenceResults,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WordSentenceResults {
    pub good_sents: Vec<GoodSentence>,
    pub good_words: Vec<GoodWord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoodSentence {
    pub paragraph_id: i64,
    pub sent_id: i64,
    pub label: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoodWord {
    pub paragraph_id: i64,
    pub sent_id: i64,
    pub start: i64,
    pub end: i64,
}

/// 语法检查响应
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GrammarResponse {
    pub grammar: GrammarReport,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GrammarReport {
    pub typo: Vec<Typo>,
}

/// 错别字/病句，位置为清理后全文的字符偏移
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Typo {
    pub start_pos: i64,
    pub end_pos: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub ori: String,
    pub revised: String,
}

/// 带评语和分数的评价（总体、流畅度、表达）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoredComment {
    pub comment: String,
    pub score: i64,
}

pub type OverallResponse = ScoredComment;
pub type FluencyResponse = ScoredComment;
pub type ExpressionResponse = ScoredComment;

/// 建议响应
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SuggestionResponse {
    pub comment: String,
}

/// 段落点评响应，按段落顺序排列
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParagraphResponse {
    pub comments: Vec<String>,
}

/// 评分响应
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoreResponse {
    pub result: ScoreResult,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoreResult {
    pub comment: String,
    pub comments: ScoreComments,
    pub scores: RawScores,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreComments {
    pub appearance: String,
    pub content: String,
    pub expression: String,
    pub structure: String,
    pub development: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawScores {
    pub all: i64,
    pub appearance: i64,
    pub content: i64,
    pub expression: i64,
    pub structure: i64,
    pub development: i64,
}

/// 润色流中的一个内容帧，对应一个段落
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolishingChunk {
    pub para_idx: i64,
    pub content: Vec<PolishingSentence>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolishingSentence {
    pub original_sentence: String,
    pub edits: Vec<RawPolishingEdit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPolishingEdit {
    pub op: String,
    pub position_after: String,
    pub text: String,
    pub reason: String,
    pub original: String,
    pub replacement: String,
}
