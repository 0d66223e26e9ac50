//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责组装资源、启动批改并把事件交给调用方。
//!
//! ## 模块划分
//!
//! ### `evaluate_service` - 批改服务入口
//! - 按配置创建 HTTP 上游和协调器
//! - 每次批改创建事件通道，后台运行协调器
//! - 调用方断开时取消，协调器 panic 时补发 error 事件
//!
//! ### `app` - 命令行应用
//! - 读取请求文件
//! - 把事件以 SSE 帧写到标准输出
//! - Ctrl-C 取消
//!
//! ## 层次关系
//!
//! ```text
//! app (命令行)
//!     ↓
//! evaluate_service (单次批改的生命周期)
//!     ↓
//! workflow::StreamCoordinator (一篇作文的批改流程)
//!     ↓
//! services (能力层：清理 / 定位 / 重试 / 合并)
//!     ↓
//! clients + infrastructure (上游接口与 HTTP)
//! ```

pub mod app;
pub mod evaluate_service;

pub use app::{App, RunSummary};
pub use evaluate_service::EvaluateService;
