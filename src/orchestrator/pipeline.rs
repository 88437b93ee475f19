//! 职位评分流水线 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次完整运行的调度。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、创建抓取客户端和评分服务
//! 2. **加载搜索条件**：任何配置错误都在网络请求之前返回
//! 3. **职位发现**：触发 → 轮询 → 标准化
//! 4. **批次评分**：委托 `BatchFlow`，失败批次被隔离
//! 5. **汇总导出**：去重排序后写 CSV，打印最佳匹配和统计
//!
//! 配置、发现、导出阶段的错误会中止运行；评分错误只影响对应批次。

use std::path::PathBuf;

use tracing::{info, warn};

use crate::clients::{BrightDataClient, SnapshotApi};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{load_search_criteria, RankedReport};
use crate::services::{
    aggregate, scores_json_schema, CompletionBackend, DiscoveryService, LlmService, PollPolicy,
    ReportWriter, ScoringService, SCORES_SCHEMA_NAME,
};
use crate::utils::logging::{log_startup, log_top_matches, print_final_stats};
use crate::workflow::{BatchFlow, RetryPolicy};

/// 打印的最佳匹配数量
const TOP_MATCHES: usize = 3;

/// 一次运行的结果摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// 提交评分的职位数量
    pub requested: usize,
    /// 进入报告的职位数量
    pub scored: usize,
    /// 被放弃的批次编号
    pub failed_batches: Vec<usize>,
    pub output: PathBuf,
    pub report: RankedReport,
}

impl RunSummary {
    /// 是否有批次被放弃
    pub fn is_degraded(&self) -> bool {
        !self.failed_batches.is_empty()
    }
}

/// 应用主结构
pub struct App<A, B> {
    config: Config,
    discovery: DiscoveryService<A>,
    flow: BatchFlow<B>,
    writer: ReportWriter,
}

impl App<BrightDataClient, LlmService> {
    /// 初始化应用（使用真实的抓取客户端和评分服务）
    pub fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;
        log_startup(&config);

        let api = BrightDataClient::new(&config)?;
        let mut backend = LlmService::new(&config);
        if config.structured_output {
            backend = backend.with_json_schema(SCORES_SCHEMA_NAME, scores_json_schema());
        }
        Ok(Self::with_backends(config, api, backend))
    }
}

impl<A: SnapshotApi, B: CompletionBackend> App<A, B> {
    /// 使用指定的抓取接口和评分接口组装应用
    pub fn with_backends(config: Config, api: A, backend: B) -> Self {
        let discovery = DiscoveryService::new(
            api,
            PollPolicy::from_config(&config),
            config.description_max_chars,
        );
        let flow = BatchFlow::new(
            backend,
            ScoringService::new(config.comment_max_chars),
            RetryPolicy::from_config(&config),
            config.max_concurrent_batches,
        );
        let writer = ReportWriter::new(config.output_csv.clone());

        Self {
            config,
            discovery,
            flow,
            writer,
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<RunSummary> {
        // 加载搜索条件
        info!("\n📁 正在加载搜索条件...");
        let criteria = load_search_criteria(&self.config.config_file).await?;

        // 职位发现
        info!("\n🔍 正在搜索职位...");
        let jobs = self
            .discovery
            .discover(&criteria, self.config.jobs_number)
            .await?;

        let requested = jobs.len();
        if jobs.is_empty() {
            warn!("⚠️ 没有找到符合条件的职位");
        } else {
            info!("✓ 找到 {} 个职位，开始 AI 评分", requested);
        }

        // 批次评分
        let profile = criteria.profile();
        let mut run = self
            .flow
            .score_all(&jobs, &profile, self.config.batch_size)
            .await;

        // 全部批次都失败时没有可用的报告
        if run.total_batches > 0 && run.batches.is_empty() {
            if let Some(last) = run.failed.pop() {
                return Err(last.error.into());
            }
        }

        // 汇总导出
        let failed_batches = run.failed_batch_nums();
        let report = aggregate(run.batches);
        self.writer.write(&report)?;

        log_top_matches(&report, TOP_MATCHES);
        let output = self.writer.path().display().to_string();
        print_final_stats(requested, report.len(), &failed_batches, &output);

        Ok(RunSummary {
            requested,
            scored: report.len(),
            failed_batches,
            output: self.writer.path().to_path_buf(),
            report,
        })
    }
}
