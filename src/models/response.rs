use serde::Serialize;

use crate::models::upstream::ScoreComments;

/// 分段分句后的作文：段落 × 句子
pub type SegmentedText = Vec<Vec<String>>;

/// 逐句评估网格，形状与 `SegmentedText` 完全一致
pub type SentenceGrid = Vec<Vec<SentenceEvaluation>>;

/// 批改结果
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub title: String,
    pub text: SegmentedText,
    pub essay_info: EssayInfo,
    pub ai_evaluation: AiEvaluation,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EssayInfo {
    pub essay_type: String,
    pub grade: i64,
    pub counting: Counting,
    pub all_score: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counting {
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

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: String,
}

/// AI 评估部分，每个上游步骤各自写入一个分区
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiEvaluation {
    pub model_version: ModelVersion,
    pub overall_evaluation: OverallEvaluation,
    pub fluency_evaluation: FluencyEvaluation,
    pub word_sentence_evaluation: WordSentenceEvaluation,
    pub expression_evaluation: ExpressionEvaluation,
    pub suggestion_evaluation: SuggestionEvaluation,
    pub paragraph_evaluations: Vec<ParagraphEvaluation>,
    pub score_evaluation: ScoreEvaluation,
    pub polishing_evaluation: Vec<PolishingEvaluation>,
}

/// 两级分类标签，例如 `作文亮点/好词`、`还需努力/错别字`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Category {
    pub level1: String,
    pub level2: String,
}

pub const LEVEL_HIGHLIGHT: &str = "作文亮点";
pub const LEVEL_NEEDS_WORK: &str = "还需努力";
pub const LEVEL_GOOD_SENTENCE: &str = "好句";
pub const LEVEL_GOOD_WORD: &str = "好词";

impl Category {
    pub fn new(level1: impl Into<String>, level2: impl Into<String>) -> Self {
        Self {
            level1: level1.into(),
            level2: level2.into(),
        }
    }

    pub fn good_sentence() -> Self {
        Self::new(LEVEL_HIGHLIGHT, LEVEL_GOOD_SENTENCE)
    }

    pub fn good_word() -> Self {
        Self::new(LEVEL_HIGHLIGHT, LEVEL_GOOD_WORD)
    }

    pub fn needs_work(subtype: impl Into<String>) -> Self {
        Self::new(LEVEL_NEEDS_WORK, subtype)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordSentenceEvaluation {
    pub sentence_evaluations: SentenceGrid,
    pub word_sentence_score: i64,
}

/// 网格中的一个句子槽位
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceEvaluation {
    pub is_good_sentence: bool,
    pub label: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub word_evaluations: Vec<WordEvaluation>,
}

/// 词级标注，`span` 为句内字符区间
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordEvaluation {
    pub span: [i64; 2],
    #[serde(rename = "type")]
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ori: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallEvaluation {
    pub description: String,
    pub topic_relevance_score: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FluencyEvaluation {
    pub fluency_description: String,
    pub fluency_score: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionEvaluation {
    pub express_description: String,
    pub expression_score: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionEvaluation {
    pub suggestion_description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphEvaluation {
    pub paragraph_index: usize,
    pub comment: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEvaluation {
    pub comment: String,
    pub comments: ScoreComments,
    pub scores: Scores,
}

/// 原始分数与 `得分/满分` 展示字符串
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub all: i64,
    pub appearance: i64,
    pub content: i64,
    pub expression: i64,
    pub structure: i64,
    pub development: i64,
    pub all_with_total: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content_with_total: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub expression_with_total: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub structure_with_total: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub development_with_total: String,
}

/// 一个段落的润色修改
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolishingEvaluation {
    pub paragraph_index: usize,
    pub edits: Vec<PolishingEdit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolishingEdit {
    pub op: String,
    pub sentence_index: usize,
    /// 句内 1 起始的字符区间（闭区间）
    pub span: [usize; 2],
    pub original: String,
    pub revised: String,
    pub reason: String,
}

impl EvaluationResult {
    /// 网格形状：每段的句子数
    pub fn grid_shape(&self) -> Vec<usize> {
        self.ai_evaluation
            .word_sentence_evaluation
            .sentence_evaluations
            .iter()
            .map(Vec::len)
            .collect()
    }

    /// 指定槽位（越界返回 None）
    pub fn slot(&self, paragraph: usize, sentence: usize) -> Option<&SentenceEvaluation> {
        self.ai_evaluation
            .word_sentence_evaluation
            .sentence_evaluations
            .get(paragraph)
            .and_then(|row| row.get(sentence))
    }
}
