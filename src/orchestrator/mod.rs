//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一次完整运行的流程调度，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! pipeline::App (一次运行：加载 → 发现 → 评分 → 汇总 → 导出)
//!     ↓
//! workflow::BatchFlow (切分批次、单批重试)
//!     ↓
//! services (能力层：discovery / scoring / llm / aggregation / report)
//!     ↓
//! clients (外部接口：BrightDataClient)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源所有者**：只有编排层持有抓取客户端和评分服务
//! 2. **向下依赖**：编排层 → workflow → services → clients
//! 3. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod pipeline;

pub use pipeline::{App, RunSummary};
