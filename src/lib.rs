//! # Job Hunt Assistant
//!
//! 搜索 LinkedIn 职位，并用 LLM 按候选人画像为每个职位打分
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 外部接口层（Clients）
//! - `clients/` - 封装第三方 HTTP 接口，只暴露能力
//! - `BrightDataClient` - 触发抓取、查询快照、取消快照（`SnapshotApi`）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `DiscoveryService` - 轮询状态机 + 记录标准化
//! - `LlmService` - 发送一次对话请求（`CompletionBackend`）
//! - `ScoringService` - 构建评分提示词、校验评分结果
//! - `aggregate` - 去重排序
//! - `ReportWriter` - 写 CSV
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一批职位"的完整评分流程
//! - `BatchCtx` - 批次上下文
//! - `BatchFlow` - 切分批次、并发控制、单批重试
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/pipeline` - 一次完整运行：加载 → 发现 → 评分 → 汇总 → 导出
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{JobPosting, RankedReport, ScoredJob, SearchCriteria};
pub use orchestrator::{App, RunSummary};
