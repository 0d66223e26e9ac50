//! 命令行应用 - 编排层
//!
//! 读取一份批改请求 JSON，把事件流以 SSE 帧写到标准输出。
//! Ctrl-C 会取消正在进行的批改。

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::event::{EventType, StreamEvent};
use crate::models::request::EvaluationRequest;
use crate::orchestrator::EvaluateService;
use crate::utils::logging;

/// 应用主结构
pub struct App {
    service: EvaluateService,
}

/// 一次运行收到的事件统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub progress_events: usize,
    pub completed: bool,
    pub failed: bool,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        logging::log_startup(&config);
        let service = EvaluateService::from_config(&config).context("初始化批改服务失败")?;
        Ok(Self { service })
    }

    pub fn with_service(service: EvaluateService) -> Self {
        Self { service }
    }

    /// 运行应用主逻辑
    pub async fn run(&self, request_path: impl AsRef<Path>) -> Result<RunSummary> {
        let request = load_request(request_path.as_ref()).await?;

        let cancel = CancellationToken::new();
        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⚠️ 收到中断信号，取消批改");
                on_ctrl_c.cancel();
            }
        });

        let mut stdout = tokio::io::stdout();
        self.stream_to(request, cancel, &mut stdout).await
    }

    /// 把事件逐条写入 `out`，遇到终止事件后停止
    pub async fn stream_to<W>(
        &self,
        request: EvaluationRequest,
        cancel: CancellationToken,
        out: &mut W,
    ) -> Result<RunSummary>
    where
        W: AsyncWrite + Unpin,
    {
        let mut events = self.service.evaluate_stream_with_cancel(request, cancel);
        let mut summary = RunSummary::default();

        while let Some(event) = events.recv().await {
            write_frame(out, &event).await?;

            match event.kind {
                EventType::Progress => summary.progress_events += 1,
                EventType::Complete => summary.completed = true,
                EventType::Error => summary.failed = true,
                EventType::Init => {}
            }
            if event.is_terminal() {
                break;
            }
        }

        log_run_finished(&summary);
        Ok(summary)
    }
}

async fn load_request(path: &Path) -> Result<EvaluationRequest> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("读取请求文件失败: {}", path.display()))?;
    let request: EvaluationRequest = serde_json::from_str(&raw)
        .with_context(|| format!("解析请求文件失败: {}", path.display()))?;
    Ok(request)
}

async fn write_frame<W>(out: &mut W, event: &StreamEvent) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = event.to_sse_frame().context("序列化事件失败")?;
    out.write_all(frame.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

// ========== 日志辅助函数 ==========

fn log_run_finished(summary: &RunSummary) {
    if summary.completed {
        info!("🎉 批改完成，共收到 {} 条进度", summary.progress_events);
    } else if summary.failed {
        warn!("❌ 批改失败");
    } else {
        warn!("⚠️ 事件流在完成前关闭（已取消）");
    }
}
