//! # Essay Stream
//!
//! 作文流式批改：并发调用多个评估上游，边完成边合并，以事件流推送进度
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有 HTTP 连接池，只暴露能力
//! - `HttpClient` - POST JSON / 读取 SSE 事件流
//! - `clients/` - 每个评估上游一个方法的 `EvaluationApi`
//!
//! ### ② 业务能力层（Services）
//! - `ContentCleaner` - 作文内容清理
//! - `position_calculator` - 全文偏移 → 段落/句子/句内偏移
//! - `RetryExecutor` - 指数退避重试，可取消
//! - `response_processor` - 各上游响应合并进结果文档
//!
//! ### ③ 流程层（Workflow）
//! - `StreamCoordinator` - 分段 → 9 路并发 → 实时汇聚 → 完成
//!
//! ### ④ 编排层（Orchestration）
//! - `EvaluateService` - 单次批改的生命周期
//! - `App` - 命令行入口
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{EvaluationApi, HttpEvaluationApi};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::HttpClient;
pub use models::{EvaluationRequest, EvaluationResult, StreamEvent};
pub use orchestrator::{App, EvaluateService};
pub use workflow::{FanInStats, StreamCoordinator};
