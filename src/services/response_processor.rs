//! 上游响应合并 - 业务能力层
//!
//! 把每个上游的类型化响应写入共享的 `EvaluationResult`。
//!
//! 约束：
//! - 分段合并和网格初始化必须先于其他合并
//! - 逐句网格的形状在初始化后固定，越界数据直接丢弃
//! - 单条标注/修改失败只丢弃它自己，不影响同批其他数据

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::event::{AiEvaluationSlice, Step};
use crate::models::request::EvaluationRequest;
use crate::models::response::{
    AiEvaluation, Category, Counting, EssayInfo, EvaluationResult, ModelVersion,
    ParagraphEvaluation, PolishingEdit, PolishingEvaluation, ScoreEvaluation, SentenceEvaluation,
    WordEvaluation,
};
use crate::models::upstream::{
    EssayCounting, EssayInfoResponse, ExpressionResponse, FluencyResponse, GrammarResponse,
    OverallResponse, ParagraphResponse, PolishingChunk, RawPolishingEdit, ScoreResponse,
    SuggestionResponse, WordSentenceResponse,
};
use crate::services::position_calculator::locate;

/// 未设置总分时的默认满分
const DEFAULT_TOTAL_SCORE: i64 = 100;

/// 一个上游步骤的成功负载
///
/// 润色内容在流式读取时已经逐段合并，完成信号不再携带数据
#[derive(Debug, Clone)]
pub enum StepPayload {
    WordSentence(WordSentenceResponse),
    Grammar(GrammarResponse),
    Fluency(FluencyResponse),
    Overall(OverallResponse),
    Expression(ExpressionResponse),
    Suggestion(SuggestionResponse),
    Paragraph(ParagraphResponse),
    Score(ScoreResponse),
    Polishing,
}

impl StepPayload {
    pub fn step(&self) -> Step {
        match self {
            StepPayload::WordSentence(_) => Step::WordSentence,
            StepPayload::Grammar(_) => Step::Grammar,
            StepPayload::Fluency(_) => Step::Fluency,
            StepPayload::Overall(_) => Step::Overall,
            StepPayload::Expression(_) => Step::Expression,
            StepPayload::Suggestion(_) => Step::Suggestion,
            StepPayload::Paragraph(_) => Step::Paragraph,
            StepPayload::Score(_) => Step::Score,
            StepPayload::Polishing => Step::Polishing,
        }
    }
}

/// 被丢弃的单条数据及原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeDrop {
    #[error("段落 {paragraph} 句子 {sentence} 不在网格内")]
    OutOfGrid { paragraph: i64, sentence: i64 },
    #[error("偏移 {offset} 无法定位到句子")]
    UnresolvedOffset { offset: i64 },
    #[error("段落索引 {0} 越界")]
    BadParagraph(i64),
    #[error("段落 {paragraph} 中找不到原句: {sentence}")]
    SentenceNotFound { paragraph: usize, sentence: String },
    #[error("未知操作类型: {0}")]
    UnknownOp(String),
    #[error("句子 {sentence} 中找不到原文: {original}")]
    SpanNotFound { original: String, sentence: String },
    #[error("无效的区间 [{start}, {end}]")]
    InvalidSpan { start: i64, end: i64 },
}

/// 一次合并的结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub applied: usize,
    pub dropped: Vec<MergeDrop>,
}

impl MergeReport {
    fn collect<T>(results: impl IntoIterator<Item = Result<T, MergeDrop>>) -> (Vec<T>, Self) {
        let mut kept = Vec::new();
        let mut report = Self::default();
        for result in results {
            match result {
                Ok(item) => {
                    kept.push(item);
                    report.applied += 1;
                }
                Err(drop) => report.dropped.push(drop),
            }
        }
        (kept, report)
    }

    fn absorb(&mut self, other: MergeReport) {
        self.applied += other.applied;
        self.dropped.extend(other.dropped);
    }

    fn log(&self, step: Step) {
        for drop in &self.dropped {
            warn!("[{}] 丢弃一条数据: {}", step, drop);
        }
        debug!(
            "[{}] 合并 {} 条，丢弃 {} 条",
            step,
            self.applied,
            self.dropped.len()
        );
    }
}

// ========== 分段与初始化 ==========

impl From<EssayCounting> for Counting {
    fn from(c: EssayCounting) -> Self {
        Self {
            adj_adv_num: c.adj_adv_num,
            char_num: c.char_num,
            dieci_num: c.dieci_num,
            fluency: c.fluency,
            grammar_mistake_num: c.grammar_mistake_num,
            highlight_sents_num: c.highlight_sents_num,
            idiom_num: c.idiom_num,
            noun_type_num: c.noun_type_num,
            para_num: c.para_num,
            sent_num: c.sent_num,
            unique_word_num: c.unique_word_num,
            verb_type_num: c.verb_type_num,
            word_num: c.word_num,
            written_mistake_num: c.written_mistake_num,
        }
    }
}

/// 写入标题、分段文本和作文信息；请求中的年级/文体/总分优先
pub fn merge_essay_info(
    result: &mut EvaluationResult,
    req: &EvaluationRequest,
    info: EssayInfoResponse,
) {
    result.title = req.title.clone();
    result.text = info.sents;
    result.essay_info = EssayInfo {
        essay_type: req.essay_type.clone().unwrap_or(info.essay_type),
        grade: req.grade.unwrap_or(info.grade),
        counting: info.counting.into(),
        all_score: req.total_score.unwrap_or(info.all_score),
    };
}

/// 按分段文本的形状分配逐句网格，并重置 AI 评估部分
pub fn init_grid(result: &mut EvaluationResult, model_version: ModelVersion) {
    let grid = result
        .text
        .iter()
        .map(|paragraph| vec![SentenceEvaluation::default(); paragraph.len()])
        .collect();

    result.ai_evaluation = AiEvaluation {
        model_version,
        ..Default::default()
    };
    result.ai_evaluation.word_sentence_evaluation.sentence_evaluations = grid;
}

// ========== 逐句网格合并 ==========

fn grid_slot(
    result: &mut EvaluationResult,
    paragraph: i64,
    sentence: i64,
) -> Result<&mut SentenceEvaluation, MergeDrop> {
    let out_of_grid = MergeDrop::OutOfGrid {
        paragraph,
        sentence,
    };
    let (Ok(p), Ok(s)) = (usize::try_from(paragraph), usize::try_from(sentence)) else {
        return Err(out_of_grid);
    };
    result
        .ai_evaluation
        .word_sentence_evaluation
        .sentence_evaluations
        .get_mut(p)
        .and_then(|row| row.get_mut(s))
        .ok_or(out_of_grid)
}

/// 好句标记到槽位，好词追加到槽位的词级标注
pub fn merge_word_sentence(
    result: &mut EvaluationResult,
    response: WordSentenceResponse,
) -> MergeReport {
    let results = response.data.results;

    let sentences = results.good_sents.into_iter().map(|sent| -> Result<(), MergeDrop> {
        let slot = grid_slot(result, sent.paragraph_id, sent.sent_id)?;
        slot.is_good_sentence = true;
        slot.label = sent.label;
        slot.category = Some(Category::good_sentence());
        Ok(())
    });
    let (_, mut report) = MergeReport::collect(sentences.collect::<Vec<_>>());

    let words = results.good_words.into_iter().map(|word| -> Result<(), MergeDrop> {
        let slot = grid_slot(result, word.paragraph_id, word.sent_id)?;
        slot.word_evaluations.push(WordEvaluation {
            span: [word.start, word.end],
            category: Category::good_word(),
            ori: None,
            revised: None,
        });
        Ok(())
    });
    let (_, words_report) = MergeReport::collect(words.collect::<Vec<_>>());
    report.absorb(words_report);

    result.ai_evaluation.word_sentence_evaluation.word_sentence_score = response.score;
    report
}

/// 按全局偏移定位错别字/病句，追加 `还需努力/<类型>` 标注
pub fn merge_grammar(result: &mut EvaluationResult, response: GrammarResponse) -> MergeReport {
    let typos = response.grammar.typo.into_iter().map(|typo| -> Result<(), MergeDrop> {
        let invalid_span = || MergeDrop::InvalidSpan {
            start: typo.start_pos,
            end: typo.end_pos,
        };
        let length = typo
            .end_pos
            .checked_sub(typo.start_pos)
            .filter(|length| *length >= 0)
            .ok_or_else(invalid_span)?;

        let position = locate(&result.text, typo.start_pos).ok_or(MergeDrop::UnresolvedOffset {
            offset: typo.start_pos,
        })?;

        let start = i64::try_from(position.relative_index).map_err(|_| invalid_span())?;
        let end = start.checked_add(length).ok_or_else(invalid_span)?;
        let slot = grid_slot(
            result,
            position.paragraph_index as i64,
            position.sentence_index as i64,
        )?;
        slot.word_evaluations.push(WordEvaluation {
            span: [start, end],
            category: Category::needs_work(typo.kind),
            ori: Some(typo.ori),
            revised: Some(typo.revised),
        });
        Ok(())
    });

    let (_, report) = MergeReport::collect(typos.collect::<Vec<_>>());
    report
}

// ========== 分区合并 ==========

pub fn merge_overall(result: &mut EvaluationResult, response: OverallResponse) {
    let section = &mut result.ai_evaluation.overall_evaluation;
    section.description = response.comment;
    section.topic_relevance_score = response.score;
}

pub fn merge_fluency(result: &mut EvaluationResult, response: FluencyResponse) {
    let section = &mut result.ai_evaluation.fluency_evaluation;
    section.fluency_description = response.comment;
    section.fluency_score = response.score;
}

pub fn merge_expression(result: &mut EvaluationResult, response: ExpressionResponse) {
    let section = &mut result.ai_evaluation.expression_evaluation;
    section.express_description = response.comment;
    section.expression_score = response.score;
}

pub fn merge_suggestion(result: &mut EvaluationResult, response: SuggestionResponse) {
    result
        .ai_evaluation
        .suggestion_evaluation
        .suggestion_description = response.comment;
}

/// 点评按顺序对应段落 0..N-1
pub fn merge_paragraph(result: &mut EvaluationResult, response: ParagraphResponse) {
    result.ai_evaluation.paragraph_evaluations = response
        .comments
        .into_iter()
        .enumerate()
        .map(|(paragraph_index, comment)| ParagraphEvaluation {
            paragraph_index,
            comment,
        })
        .collect();
}

/// 复制原始分数和评语，生成 `得分/满分` 展示字符串
///
/// 总分满分取作文信息中的总分（未设置或非正时为 100）；
/// 分项只在请求给出正的分项满分时生成，分母原样使用请求值
pub fn merge_score(result: &mut EvaluationResult, req: &EvaluationRequest, response: ScoreResponse) {
    if result.essay_info.all_score <= 0 {
        result.essay_info.all_score = DEFAULT_TOTAL_SCORE;
    }
    let total = result.essay_info.all_score;

    let raw = response.result.scores;
    let section: &mut ScoreEvaluation = &mut result.ai_evaluation.score_evaluation;
    section.comment = response.result.comment;
    section.comments = response.result.comments;

    let scores = &mut section.scores;
    scores.all = raw.all;
    scores.appearance = raw.appearance;
    scores.content = raw.content;
    scores.expression = raw.expression;
    scores.structure = raw.structure;
    scores.development = raw.development;

    scores.all_with_total = with_total(raw.all, total);
    if let Some(ratio) = weighted(raw.content, req.content_score) {
        scores.content_with_total = ratio;
    }
    if let Some(ratio) = weighted(raw.expression, req.expression_score) {
        scores.expression_with_total = ratio;
    }
    if let Some(ratio) = weighted(raw.structure, req.structure_score) {
        scores.structure_with_total = ratio;
    }
    if let Some(ratio) = weighted(raw.development, req.development_score) {
        scores.development_with_total = ratio;
    }
}

fn with_total(achieved: i64, total: i64) -> String {
    format!("{}/{}", achieved, total)
}

fn weighted(achieved: i64, weight: Option<i64>) -> Option<String> {
    weight
        .filter(|w| *w > 0)
        .map(|w| with_total(achieved, w))
}

// ========== 润色合并 ==========

/// 合并一个段落的润色结果
///
/// 段落索引有效时追加一条 `PolishingEvaluation`（即使其中修改全部被丢弃）
pub fn merge_polishing(result: &mut EvaluationResult, chunk: PolishingChunk) -> MergeReport {
    let paragraph_index = match usize::try_from(chunk.para_idx) {
        Ok(index) if index < result.text.len() => index,
        _ => {
            let dropped = chunk
                .content
                .iter()
                .flat_map(|sentence| sentence.edits.iter())
                .map(|_| MergeDrop::BadParagraph(chunk.para_idx))
                .collect();
            return MergeReport {
                applied: 0,
                dropped,
            };
        }
    };

    let sentences = &result.text[paragraph_index];
    let edits = chunk.content.iter().flat_map(|sentence| {
        sentence
            .edits
            .iter()
            .map(move |edit| resolve_edit(sentences, paragraph_index, &sentence.original_sentence, edit))
    });
    let (edits, report) = MergeReport::collect(edits.collect::<Vec<_>>());

    result
        .ai_evaluation
        .polishing_evaluation
        .push(PolishingEvaluation {
            paragraph_index,
            edits,
        });
    report
}

fn resolve_edit(
    sentences: &[String],
    paragraph_index: usize,
    original_sentence: &str,
    edit: &RawPolishingEdit,
) -> Result<PolishingEdit, MergeDrop> {
    let sentence_index = sentences
        .iter()
        .position(|sentence| !original_sentence.is_empty() && sentence.contains(original_sentence))
        .ok_or_else(|| MergeDrop::SentenceNotFound {
            paragraph: paragraph_index,
            sentence: original_sentence.to_string(),
        })?;

    let (original, revised) = match edit.op.as_str() {
        "insert" => (edit.position_after.clone(), edit.text.clone()),
        "replace" | "delete" => (edit.original.clone(), edit.replacement.clone()),
        other => return Err(MergeDrop::UnknownOp(other.to_string())),
    };

    let sentence = &sentences[sentence_index];
    // 空原文会匹配句首，视为找不到
    let byte_start = Some(original.as_str())
        .filter(|original| !original.is_empty())
        .and_then(|original| sentence.find(original))
        .ok_or_else(|| MergeDrop::SpanNotFound {
            original: original.clone(),
            sentence: sentence.clone(),
        })?;
    let begin = sentence[..byte_start].chars().count();

    Ok(PolishingEdit {
        op: edit.op.clone(),
        sentence_index,
        span: [begin + 1, begin + original.chars().count()],
        original,
        revised,
        reason: edit.reason.clone(),
    })
}

// ========== 统一入口 ==========

/// 按负载类型分发合并，返回该步骤写入的分区
pub fn apply(
    result: &mut EvaluationResult,
    req: &EvaluationRequest,
    payload: StepPayload,
) -> AiEvaluationSlice {
    let step = payload.step();

    match payload {
        StepPayload::WordSentence(response) => {
            merge_word_sentence(result, response).log(step);
            AiEvaluationSlice {
                word_sentence_evaluation: Some(
                    result.ai_evaluation.word_sentence_evaluation.clone(),
                ),
                ..Default::default()
            }
        }
        StepPayload::Grammar(response) => {
            merge_grammar(result, response).log(step);
            AiEvaluationSlice {
                word_sentence_evaluation: Some(
                    result.ai_evaluation.word_sentence_evaluation.clone(),
                ),
                ..Default::default()
            }
        }
        StepPayload::Fluency(response) => {
            merge_fluency(result, response);
            AiEvaluationSlice {
                fluency_evaluation: Some(result.ai_evaluation.fluency_evaluation.clone()),
                ..Default::default()
            }
        }
        StepPayload::Overall(response) => {
            merge_overall(result, response);
            AiEvaluationSlice {
                overall_evaluation: Some(result.ai_evaluation.overall_evaluation.clone()),
                ..Default::default()
            }
        }
        StepPayload::Expression(response) => {
            merge_expression(result, response);
            AiEvaluationSlice {
                expression_evaluation: Some(result.ai_evaluation.expression_evaluation.clone()),
                ..Default::default()
            }
        }
        StepPayload::Suggestion(response) => {
            merge_suggestion(result, response);
            AiEvaluationSlice {
                suggestion_evaluation: Some(result.ai_evaluation.suggestion_evaluation.clone()),
                ..Default::default()
            }
        }
        StepPayload::Paragraph(response) => {
            merge_paragraph(result, response);
            AiEvaluationSlice {
                paragraph_evaluations: Some(result.ai_evaluation.paragraph_evaluations.clone()),
                ..Default::default()
            }
        }
        StepPayload::Score(response) => {
            merge_score(result, req, response);
            AiEvaluationSlice {
                score_evaluation: Some(result.ai_evaluation.score_evaluation.clone()),
                ..Default::default()
            }
        }
        StepPayload::Polishing => AiEvaluationSlice {
            polishing_evaluation: Some(result.ai_evaluation.polishing_evaluation.clone()),
            ..Default::default()
        },
    }
}

/// 合并润色流中的一个段落并记录丢弃的数据
pub fn apply_polishing_chunk(result: &mut EvaluationResult, chunk: PolishingChunk) {
    let para_idx = chunk.para_idx;
    let report = merge_polishing(result, chunk);
    report.log(Step::Polishing);
    debug!("[{}] 段落 {} 合并完成", Step::Polishing, para_idx);
}
