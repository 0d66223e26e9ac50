//! 批改服务入口 - 编排层
//!
//! 对外只暴露"提交一篇作文、拿到事件流"，负责：
//! - 按配置组装上游客户端和协调器
//! - 为每次批改创建事件通道并在后台运行协调器
//! - 调用方断开时取消批改；协调器 panic 时补发 error 事件

use std::any::Any;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::clients::{EvaluationApi, HttpEvaluationApi};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::HttpClient;
use crate::models::event::{Step, StreamEvent};
use crate::models::request::EvaluationRequest;
use crate::models::response::ModelVersion;
use crate::services::ContentCleaner;
use crate::utils::logging;
use crate::workflow::StreamCoordinator;

const INTERNAL_ERROR: &str = "服务内部错误";

/// 批改服务
#[derive(Clone)]
pub struct EvaluateService {
    coordinator: Arc<StreamCoordinator>,
    model_version: ModelVersion,
    event_buffer: usize,
}

impl EvaluateService {
    /// 使用给定的上游实现创建服务
    pub fn new(config: &Config, api: Arc<dyn EvaluationApi>) -> AppResult<Self> {
        let coordinator = StreamCoordinator::new(api, ContentCleaner::new()?, config.retry);
        Ok(Self {
            coordinator: Arc::new(coordinator),
            model_version: ModelVersion {
                name: config.model_version.name.clone(),
                version: config.model_version.version.clone(),
            },
            event_buffer: config.event_buffer.max(1),
        })
    }

    /// 按配置连接 HTTP 上游
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let http = HttpClient::new(config.http_timeout())?;
        let api = HttpEvaluationApi::new(http, config.api.clone());
        Self::new(config, Arc::new(api))
    }

    /// 开始一次批改，返回事件接收端
    ///
    /// 接收端收到 `complete` 或 `error` 后流即结束；丢弃接收端会取消批改
    pub fn evaluate_stream(&self, req: EvaluationRequest) -> mpsc::Receiver<StreamEvent> {
        self.evaluate_stream_with_cancel(req, CancellationToken::new())
    }

    /// 同 `evaluate_stream`，但由调用方持有取消信号
    pub fn evaluate_stream_with_cancel(
        &self,
        req: EvaluationRequest,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(self.event_buffer);

        let coordinator = self.coordinator.clone();
        let model_version = self.model_version.clone();
        let guard_tx = tx.clone();
        let task_cancel = cancel.clone();

        let mut handle = tokio::spawn(async move {
            coordinator
                .coordinate(req, model_version, tx, task_cancel)
                .await
        });

        tokio::spawn(async move {
            let joined = tokio::select! {
                joined = &mut handle => joined,
                _ = guard_tx.closed() => {
                    warn!("⚠️ 调用方已断开，取消批改");
                    cancel.cancel();
                    handle.await
                }
            };

            match joined {
                Ok(Ok(stats)) => {
                    logging::print_final_stats(stats.succeeded, stats.failed, stats.total)
                }
                Ok(Err(e)) => error!("❌ 批改中止: {}", e),
                Err(e) => report_task_failure(&guard_tx, e),
            }
        });

        rx
    }
}

/// 协调器 panic 时尽力补发一条 error 事件（不阻塞）
fn report_task_failure(events: &mpsc::Sender<StreamEvent>, err: JoinError) {
    let detail = if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        err.to_string()
    };
    error!("[{}] ❌ 批改任务异常退出: {}", Step::Panic, detail);

    let event = StreamEvent::error(Step::Panic, INTERNAL_ERROR, detail);
    if events.try_send(event).is_err() {
        warn!("[{}] ⚠️ error 事件未能送达", Step::Panic);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for EvaluateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluateService")
            .field("model_version", &self.model_version)
            .field("event_buffer", &self.event_buffer)
            .finish()
    }
}
