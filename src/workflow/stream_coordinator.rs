//! 流式批改协调器 - 流程层
//!
//! 核心职责：定义"一篇作文"的完整批改流程
//!
//! 流程顺序：
//! 1. 清理内容 → 发送 init
//! 2. 同步调用分段接口（失败即终止，发送 error）
//! 3. 合并作文信息、初始化逐句网格 → 发送 15% 进度
//! 4. 并发分发 9 个任务：8 个普通接口（各自重试）+ 1 个润色流
//! 5. 按到达顺序合并结果，每个成功步骤发送一条进度
//! 6. 全部完成后发送 complete（被取消时不发送）
//!
//! 结果文档只由聚合循环修改，工作任务只通过通道交出不可变的负载

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clients::EvaluationApi;
use crate::config::RetryConfig;
use crate::error::{AppError, AppResult};
use crate::models::event::{EventData, InitData, Step, StreamEvent};
use crate::models::request::{EssayContext, EvaluationRequest, ScoreOptions};
use crate::models::response::{EvaluationResult, ModelVersion};
use crate::models::upstream::PolishingChunk;
use crate::services::response_processor::{self, StepPayload};
use crate::services::{ContentCleaner, RetryExecutor};
use crate::utils::logging::{self, truncate_text};

/// 分段完成时的进度
const ESSAY_INFO_PROGRESS: u8 = 15;
/// 9 个任务全部完成时累计增加的进度
const FAN_IN_PROGRESS_RANGE: f64 = 75.0;
/// 汇聚通道容量（含润色分段）
const COMPLETION_BUFFER: usize = 32;

const ESSAY_INFO_FAILED: &str = "获取作文信息失败";

/// 单个上游任务的完成结果，由聚合循环恰好消费一次
#[derive(Debug)]
pub struct UpstreamCallResult {
    pub step: Step,
    pub outcome: AppResult<StepPayload>,
}

/// 工作任务发给聚合循环的消息
#[derive(Debug)]
enum Completion {
    /// 润色流中已解析的一个段落
    PolishingChunk(PolishingChunk),
    /// 一个任务结束（成功或失败）
    Done(UpstreamCallResult),
}

/// 一次批改的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanInStats {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

/// 流式批改协调器
///
/// - 不持有结果文档，每次批改在 `coordinate` 内创建并独占
/// - 只依赖 `EvaluationApi`，不关心传输方式
pub struct StreamCoordinator {
    api: Arc<dyn EvaluationApi>,
    cleaner: ContentCleaner,
    retry: RetryExecutor,
}

impl StreamCoordinator {
    pub fn new(api: Arc<dyn EvaluationApi>, cleaner: ContentCleaner, retry: RetryConfig) -> Self {
        Self {
            api,
            cleaner,
            retry: RetryExecutor::new(retry),
        }
    }

    /// 执行一次完整批改，事件写入 `events`
    ///
    /// # 返回
    /// - `Ok(stats)`: 扇出完成（被取消时同样返回，但不会发送 complete）
    /// - `Err(e)`: 分段失败或在扇出前被取消，此时已发送 error 事件
    ///
    /// 函数返回时丢弃 `events`，调用方据此判断流结束
    pub async fn coordinate(
        &self,
        mut req: EvaluationRequest,
        model_version: ModelVersion,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> AppResult<FanInStats> {
        req.content = self.cleaner.clean(&req.content);
        logging::log_evaluation_start(&req.title, &req.content);
        emit_progress(&events, StreamEvent::init());

        let mut result = match self.segment(&req, model_version, &cancel).await {
            Ok(result) => result,
            Err(e) => {
                log_segmentation_failed(&e);
                emit_terminal(
                    &events,
                    StreamEvent::error(Step::EssayInfo, ESSAY_INFO_FAILED, e.to_string()),
                )
                .await;
                return Err(e);
            }
        };

        emit_progress(
            &events,
            StreamEvent::progress(
                Step::EssayInfo,
                ESSAY_INFO_PROGRESS,
                EventData::Init(InitData {
                    title: result.title.clone(),
                    text: result.text.clone(),
                    essay_info: result.essay_info.clone(),
                }),
            ),
        );

        if cancel.is_cancelled() {
            let e = AppError::cancelled(Step::EssayInfo.as_str());
            warn!("[{}] ⚠️ 扇出前已取消", Step::EssayInfo);
            emit_terminal(
                &events,
                StreamEvent::error(Step::EssayInfo, ESSAY_INFO_FAILED, e.to_string()),
            )
            .await;
            return Err(e);
        }

        let (tx, mut rx) = mpsc::channel(COMPLETION_BUFFER);
        self.dispatch(&req, tx, &cancel);

        let mut stats = FanInStats {
            total: Step::FAN_OUT.len(),
            ..Default::default()
        };
        let mut completed = 0usize;

        while let Some(message) = rx.recv().await {
            match message {
                Completion::PolishingChunk(chunk) => {
                    response_processor::apply_polishing_chunk(&mut result, chunk);
                }
                Completion::Done(UpstreamCallResult { step, outcome }) => {
                    completed += 1;
                    let progress = fan_in_progress(completed);

                    match outcome {
                        Ok(payload) => {
                            stats.succeeded += 1;
                            let slice = response_processor::apply(&mut result, &req, payload);
                            emit_progress(
                                &events,
                                StreamEvent::progress(step, progress, EventData::Slice(slice)),
                            );
                            info!(
                                "[{}] 📈 进度 {}% ({}/{} 完成)",
                                step, progress, completed, stats.total
                            );
                        }
                        Err(e) => {
                            stats.failed += 1;
                            error!("[{}] ❌ 执行失败: {}", step, e);
                        }
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            warn!("⚠️ 批改已取消，不发送完成事件 ({}/{} 已完成)", completed, stats.total);
            return Ok(stats);
        }

        if stats.failed > 0 {
            warn!("⚠️ 共有 {} 个评估步骤失败", stats.failed);
        }
        info!("✅ 所有评估结果处理完成");

        emit_terminal(&events, StreamEvent::complete(result)).await;
        Ok(stats)
    }

    /// 分段并初始化结果文档
    async fn segment(
        &self,
        req: &EvaluationRequest,
        model_version: ModelVersion,
        cancel: &CancellationToken,
    ) -> AppResult<EvaluationResult> {
        let info = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::cancelled(Step::EssayInfo.as_str())),
            info = self.api.essay_info(&req.title, &req.content) => info?,
        };

        let mut result = EvaluationResult::default();
        response_processor::merge_essay_info(&mut result, req, info);
        response_processor::init_grid(&mut result, model_version);

        debug!(
            "[{}] 分段完成: {} 段, 每段句数 {:?}",
            Step::EssayInfo,
            result.text.len(),
            result.grid_shape()
        );
        Ok(result)
    }

    /// 分发 9 个并发任务；所有任务结束后 `tx` 的全部副本被丢弃，聚合循环随之退出
    fn dispatch(
        &self,
        req: &EvaluationRequest,
        tx: mpsc::Sender<Completion>,
        cancel: &CancellationToken,
    ) {
        let ctx = Arc::new(EssayContext::from_request(req));
        let options = Arc::new(ScoreOptions::from_request(req));

        for step in Step::FAN_OUT {
            let api = self.api.clone();
            let ctx = ctx.clone();
            let tx = tx.clone();
            let cancel = cancel.clone();

            if step == Step::Polishing {
                tokio::spawn(async move {
                    let started = Instant::now();
                    let outcome = stream_polishing(api.as_ref(), &ctx, &tx, &cancel).await;
                    log_polishing_finished(started.elapsed(), &outcome);
                    let outcome = outcome.map(|_| StepPayload::Polishing);
                    let _ = tx.send(Completion::Done(UpstreamCallResult { step, outcome })).await;
                });
                continue;
            }

            let options = options.clone();
            let retry = self.retry;
            tokio::spawn(async move {
                let started = Instant::now();
                let outcome = retry
                    .execute(step.as_str(), &cancel, || {
                        call_step(api.as_ref(), step, &ctx, &options)
                    })
                    .await;
                log_call_finished(step, started.elapsed(), &outcome);
                let _ = tx.send(Completion::Done(UpstreamCallResult { step, outcome })).await;
            });
        }

        info!("🚀 已分发 {} 个评估任务", Step::FAN_OUT.len());
    }
}

/// 调用一个普通上游步骤
async fn call_step(
    api: &dyn EvaluationApi,
    step: Step,
    ctx: &EssayContext,
    options: &ScoreOptions,
) -> AppResult<StepPayload> {
    match step {
        Step::WordSentence => api.word_sentence(ctx).await.map(StepPayload::WordSentence),
        Step::Grammar => api.grammar(ctx).await.map(StepPayload::Grammar),
        Step::Fluency => api.fluency(ctx).await.map(StepPayload::Fluency),
        Step::Overall => api.overall(ctx).await.map(StepPayload::Overall),
        Step::Expression => api.expression(ctx).await.map(StepPayload::Expression),
        Step::Suggestion => api.suggestion(ctx).await.map(StepPayload::Suggestion),
        Step::Paragraph => api.paragraph(ctx).await.map(StepPayload::Paragraph),
        Step::Score => api.score(ctx, options).await.map(StepPayload::Score),
        Step::Init | Step::EssayInfo | Step::Polishing | Step::Finish | Step::Panic => Err(
            AppError::Other(format!("{} 不是独立的评估接口", step)),
        ),
    }
}

/// 读取润色流，每解析出一个段落就交给聚合循环
///
/// 解析失败的帧跳过；流错误或取消时返回 Err
async fn stream_polishing(
    api: &dyn EvaluationApi,
    ctx: &EssayContext,
    tx: &mpsc::Sender<Completion>,
    cancel: &CancellationToken,
) -> AppResult<usize> {
    let step = Step::Polishing;

    let mut frames = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AppError::cancelled(step.as_str())),
        frames = api.polishing_stream(ctx) => frames?,
    };

    let mut processed = 0usize;
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("[{}] ⚠️ 润色处理被取消", step);
                return Err(AppError::cancelled(step.as_str()));
            }
            frame = frames.next() => frame,
        };

        let raw = match frame {
            None => break,
            Some(Ok(raw)) => raw,
            Some(Err(e)) => return Err(e),
        };

        let chunk: PolishingChunk = match serde_json::from_str(&raw) {
            Ok(chunk) => chunk,
            Err(e) => {
                error!(
                    "[{}] 解析润色内容失败: {}, content: {}",
                    step,
                    e,
                    truncate_text(&raw, 200)
                );
                continue;
            }
        };

        let para_idx = chunk.para_idx;
        if tx.send(Completion::PolishingChunk(chunk)).await.is_err() {
            break;
        }
        processed += 1;
        debug!("[{}] 段落 {} 已提交合并", step, para_idx);
    }

    Ok(processed)
}

/// `15 + round(completed / 9 * 75)`
fn fan_in_progress(completed: usize) -> u8 {
    let total = Step::FAN_OUT.len() as f64;
    let ramp = (completed as f64 / total * FAN_IN_PROGRESS_RANGE).round();
    ESSAY_INFO_PROGRESS + ramp as u8
}

/// 进度事件不阻塞聚合循环：通道满时丢弃
fn emit_progress(events: &mpsc::Sender<StreamEvent>, event: StreamEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            warn!("[{}] ⚠️ 事件通道已满，跳过进度消息", event.step);
        }
        Err(TrySendError::Closed(event)) => {
            debug!("[{}] 调用方已断开，丢弃进度消息", event.step);
        }
    }
}

/// 终止事件（error / complete）必须送达，必要时等待
async fn emit_terminal(events: &mpsc::Sender<StreamEvent>, event: StreamEvent) {
    let step = event.step;
    if events.send(event).await.is_err() {
        warn!("[{}] ⚠️ 调用方已断开，终止事件未送达", step);
    }
}

// ========== 日志辅助函数 ==========

fn log_segmentation_failed(err: &AppError) {
    error!("[{}] ❌ {}: {}", Step::EssayInfo, ESSAY_INFO_FAILED, err);
}

fn log_call_finished(step: Step, elapsed: Duration, outcome: &AppResult<StepPayload>) {
    match outcome {
        Ok(_) => info!("[{}] ✓ API调用成功 耗时: {:?}", step, elapsed),
        Err(e) => error!("[{}] ❌ API调用失败 耗时: {:?}, 错误: {}", step, elapsed, e),
    }
}

fn log_polishing_finished(elapsed: Duration, outcome: &AppResult<usize>) {
    match outcome {
        Ok(0) => warn!("[{}] ⚠️ 未处理任何润色内容", Step::Polishing),
        Ok(n) => info!(
            "[{}] ✓ 润色流式处理完成 {} 段 耗时: {:?}",
            Step::Polishing,
            n,
            elapsed
        ),
        Err(e) => error!("[{}] ❌ 润色流式处理错误: {}", Step::Polishing, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::infrastructure::FrameStream;
    use crate::models::event::EventType;
    use crate::models::response::{Category, LEVEL_NEEDS_WORK};
    use crate::models::upstream::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// 内存中的上游：可以指定失败或挂起的步骤
    #[derive(Default)]
    struct FakeApi {
        fail_segmentation: bool,
        failing: HashSet<Step>,
        hanging: HashSet<Step>,
        polishing_frames: Vec<String>,
        /// 内容帧之后追加的服务器错误帧
        polishing_server_error: Option<String>,
        grammar_calls: AtomicU32,
    }

    impl FakeApi {
        async fn gate(&self, step: Step) -> AppResult<()> {
            if self.hanging.contains(&step) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.failing.contains(&step) {
                return Err(AppError::Other(format!("{} 上游超时", step)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl EvaluationApi for FakeApi {
        async fn essay_info(&self, _title: &str, content: &str) -> AppResult<EssayInfoResponse> {
            if self.fail_segmentation {
                return Err(AppError::bad_status("essay_info", 503, "unavailable"));
            }
            assert!(!content.contains('★'), "content must be cleaned first");
            Ok(EssayInfoResponse {
                grade: 4,
                essay_type: "记叙文".to_string(),
                sents: vec![vec!["我爱北京。".to_string(), "天安门很美。".to_string()]],
                ..Default::default()
            })
        }

        async fn word_sentence(&self, _ctx: &EssayContext) -> AppResult<WordSentenceResponse> {
            self.gate(Step::WordSentence).await?;
            Ok(WordSentenceResponse {
                data: WordSentenceData {
                    results: WordSentenceResults {
                        good_sents: vec![GoodSentence {
                            paragraph_id: 0,
                            sent_id: 1,
                            label: "景物描写".to_string(),
                        }],
                        good_words: vec![GoodWord {
                            paragraph_id: 0,
                            sent_id: 0,
                            start: 2,
                            end: 4,
                        }],
                    },
                },
                score: 10,
            })
        }

        async fn grammar(&self, _ctx: &EssayContext) -> AppResult<GrammarResponse> {
            self.grammar_calls.fetch_add(1, Ordering::SeqCst);
            self.gate(Step::Grammar).await?;
            Ok(GrammarResponse {
                grammar: GrammarReport {
                    typo: vec![Typo {
                        start_pos: 4,
                        end_pos: 5,
                        kind: "标点".to_string(),
                        ori: "。".to_string(),
                        revised: "！".to_string(),
                    }],
                },
            })
        }

        async fn fluency(&self, _ctx: &EssayContext) -> AppResult<FluencyResponse> {
            self.gate(Step::Fluency).await?;
            Ok(ScoredComment {
                comment: "语句通顺".to_string(),
                score: 8,
            })
        }

        async fn overall(&self, _ctx: &EssayContext) -> AppResult<OverallResponse> {
            self.gate(Step::Overall).await?;
            Ok(ScoredComment {
                comment: "切题".to_string(),
                score: 9,
            })
        }

        async fn expression(&self, _ctx: &EssayContext) -> AppResult<ExpressionResponse> {
            self.gate(Step::Expression).await?;
            Ok(ScoredComment {
                comment: "生动".to_string(),
                score: 7,
            })
        }

        async fn suggestion(&self, _ctx: &EssayContext) -> AppResult<SuggestionResponse> {
            self.gate(Step::Suggestion).await?;
            Ok(SuggestionResponse {
                comment: "多写细节".to_string(),
            })
        }

        async fn paragraph(&self, _ctx: &EssayContext) -> AppResult<ParagraphResponse> {
            self.gate(Step::Paragraph).await?;
            Ok(ParagraphResponse {
                comments: vec!["开门见山".to_string()],
            })
        }

        async fn score(&self, _ctx: &EssayContext, _options: &ScoreOptions) -> AppResult<ScoreResponse> {
            self.gate(Step::Score).await?;
            Ok(ScoreResponse {
                result: ScoreResult {
                    scores: RawScores {
                        all: 81,
                        content: 27,
                        ..Default::default()
                    },
                    ..Default::default()
                },
            })
        }

        async fn polishing_stream(&self, _ctx: &EssayContext) -> AppResult<FrameStream> {
            self.gate(Step::Polishing).await?;
            let mut frames: Vec<AppResult<String>> =
                self.polishing_frames.iter().cloned().map(Ok).collect();
            if let Some(payload) = &self.polishing_server_error {
                frames.push(Err(ApiError::StreamServerError {
                    payload: payload.clone(),
                }
                .into()));
            }
            Ok(futures::stream::iter(frames).boxed())
        }
    }

    fn polishing_frame() -> String {
        serde_json::json!({
            "type": "content",
            "para_idx": 0,
            "content": [{
                "original_sentence": "天安门很美。",
                "edits": [{"op": "replace", "original": "很美", "replacement": "雄伟壮丽", "reason": "用词更丰富"}]
            }]
        })
        .to_string()
    }

    fn coordinator(api: FakeApi) -> StreamCoordinator {
        StreamCoordinator::new(
            Arc::new(api),
            ContentCleaner::new().unwrap(),
            RetryConfig {
                max_retries: 3,
                initial_delay_ms: 1,
                max_delay_ms: 4,
            },
        )
    }

    fn request() -> EvaluationRequest {
        EvaluationRequest::new("我爱北京", "★我爱北京。天安门很美。")
    }

    async fn run(
        coordinator: StreamCoordinator,
        buffer: usize,
    ) -> (AppResult<FanInStats>, Vec<StreamEvent>) {
        let (tx, mut rx) = mpsc::channel(buffer);
        let handle = tokio::spawn(async move {
            coordinator
                .coordinate(request(), ModelVersion::default(), tx, CancellationToken::new())
                .await
        });

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (handle.await.unwrap(), events)
    }

    fn fan_out_progress(events: &[StreamEvent]) -> Vec<&StreamEvent> {
        events
            .iter()
            .filter(|e| e.kind == EventType::Progress && e.step != Step::EssayInfo)
            .collect()
    }

    fn complete_result(events: &[StreamEvent]) -> &EvaluationResult {
        match events.last().and_then(|e| e.data.as_ref()) {
            Some(EventData::Complete(result)) => result,
            other => panic!("last event is not complete: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let _ = tracing_subscriber::fmt::try_init();
        let api = FakeApi {
            polishing_frames: vec![
                polishing_frame(),
                "{\"type\":\"content\",\"para_idx\":".to_string(),
            ],
            ..Default::default()
        };

        let (stats, events) = run(coordinator(api), 64).await;
        let stats = stats.unwrap();
        assert_eq!(stats, FanInStats { succeeded: 9, failed: 0, total: 9 });

        assert_eq!(events.len(), 12);
        assert_eq!(events[0].kind, EventType::Init);
        assert_eq!(events[1].step, Step::EssayInfo);
        assert_eq!(events[1].progress, 15);
        assert_eq!(events[11].kind, EventType::Complete);
        assert_eq!(events[11].progress, 100);

        let progress: Vec<u8> = fan_out_progress(&events).iter().map(|e| e.progress).collect();
        let expected: Vec<u8> = (1..=9).map(fan_in_progress).collect();
        assert_eq!(progress, expected);
        assert_eq!(progress.last(), Some(&90));

        let steps: HashSet<Step> = fan_out_progress(&events).iter().map(|e| e.step).collect();
        assert_eq!(steps, Step::FAN_OUT.into_iter().collect::<HashSet<_>>());

        let result = complete_result(&events);
        assert_eq!(result.grid_shape(), vec![2]);
        assert_eq!(result.essay_info.essay_type, "记叙文");
        assert_eq!(result.ai_evaluation.score_evaluation.scores.all_with_total, "81/100");
        assert_eq!(result.ai_evaluation.polishing_evaluation.len(), 1);
        assert_eq!(
            result.ai_evaluation.polishing_evaluation[0].edits[0].span,
            [4, 5]
        );
        let first = result.slot(0, 0).unwrap();
        assert_eq!(first.word_evaluations.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_grammar_is_absent_but_others_survive() {
        let api = FakeApi {
            failing: [Step::Grammar].into_iter().collect(),
            ..Default::default()
        };
        let api = Arc::new(api);
        let coordinator = StreamCoordinator::new(
            api.clone(),
            ContentCleaner::new().unwrap(),
            RetryConfig {
                max_retries: 3,
                initial_delay_ms: 1,
                max_delay_ms: 4,
            },
        );

        let (stats, events) = run(coordinator, 64).await;
        assert_eq!(stats.unwrap().failed, 1);
        assert_eq!(api.grammar_calls.load(Ordering::SeqCst), 4);

        let progress = fan_out_progress(&events);
        assert_eq!(progress.len(), 8);
        assert!(progress.iter().all(|e| e.step != Step::Grammar));
        assert_eq!(
            events.iter().filter(|e| e.kind == EventType::Complete).count(),
            1
        );
        assert!(events.iter().all(|e| e.kind != EventType::Error));

        let result = complete_result(&events);
        let annotations: Vec<_> = result
            .ai_evaluation
            .word_sentence_evaluation
            .sentence_evaluations
            .iter()
            .flatten()
            .flat_map(|slot| slot.word_evaluations.iter())
            .collect();
        assert!(annotations.iter().all(|w| w.category.level1 != LEVEL_NEEDS_WORK));
        assert!(annotations.iter().any(|w| w.category == Category::good_word()));
        assert!(result.slot(0, 1).unwrap().is_good_sentence);
    }

    #[tokio::test]
    async fn test_polishing_error_keeps_already_merged_paragraphs() {
        let api = FakeApi {
            polishing_frames: vec![polishing_frame()],
            polishing_server_error: Some("{\"type\":\"error\",\"message\":\"模型过载\"}".to_string()),
            ..Default::default()
        };

        let (stats, events) = run(coordinator(api), 64).await;
        assert_eq!(stats.unwrap(), FanInStats { succeeded: 8, failed: 1, total: 9 });

        let progress = fan_out_progress(&events);
        assert_eq!(progress.len(), 8);
        assert!(progress.iter().all(|e| e.step != Step::Polishing));
        assert!(events.iter().all(|e| e.kind != EventType::Error));

        // 出错前已合并的段落保留在最终结果中
        let result = complete_result(&events);
        let polishing = &result.ai_evaluation.polishing_evaluation;
        assert_eq!(polishing.len(), 1);
        assert_eq!(polishing[0].edits[0].revised, "雄伟壮丽");
    }

    #[tokio::test]
    async fn test_segmentation_failure_emits_single_error() {
        let api = FakeApi {
            fail_segmentation: true,
            ..Default::default()
        };

        let (stats, events) = run(coordinator(api), 64).await;
        assert!(stats.is_err());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventType::Init);

        let error = &events[1];
        assert_eq!(error.kind, EventType::Error);
        assert_eq!(error.step, Step::EssayInfo);
        assert_eq!(error.message, ESSAY_INFO_FAILED);
        match &error.data {
            Some(EventData::Error(data)) => assert!(data.error.contains("503")),
            other => panic!("unexpected data: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_full_channel_drops_progress_but_keeps_terminal_event() {
        let (tx, mut rx) = mpsc::channel(1);
        let coordinator = coordinator(FakeApi::default());
        let handle = tokio::spawn(async move {
            coordinator
                .coordinate(request(), ModelVersion::default(), tx, CancellationToken::new())
                .await
        });

        // 不读取，让进度事件全部因通道已满被丢弃
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        handle.await.unwrap().unwrap();

        let kinds: Vec<EventType> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventType::Init, EventType::Complete]);
    }

    #[tokio::test]
    async fn test_cancellation_during_fan_out_skips_complete() {
        let api = FakeApi {
            hanging: [Step::Score, Step::Polishing].into_iter().collect(),
            ..Default::default()
        };
        let coordinator = coordinator(api);
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(64);

        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            coordinator
                .coordinate(request(), ModelVersion::default(), tx, token)
                .await
        });

        let mut events = Vec::new();
        while fan_out_progress(&events).len() < 7 {
            match rx.recv().await {
                Some(event) => events.push(event),
                None => panic!("stream closed early"),
            }
        }
        cancel.cancel();

        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        let stats = handle.await.unwrap().unwrap();

        assert_eq!(stats.succeeded, 7);
        assert_eq!(stats.failed, 2);
        assert!(events.iter().all(|e| !e.is_terminal()));
    }

    #[tokio::test]
    async fn test_cancelled_before_segmentation() {
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = coordinator(FakeApi::default())
            .coordinate(request(), ModelVersion::default(), tx, cancel)
            .await;
        assert!(result.unwrap_err().is_cancelled());

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind);
        }
        assert_eq!(kinds, vec![EventType::Init, EventType::Error]);
    }

    #[test]
    fn test_fan_in_progress_ramp() {
        assert_eq!(fan_in_progress(1), 23);
        assert_eq!(fan_in_progress(2), 32);
        assert_eq!(fan_in_progress(9), 90);
    }
}
