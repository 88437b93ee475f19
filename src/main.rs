use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use job_hunt_assistant::utils::logging;
use job_hunt_assistant::{App, AppError, Config, RunSummary};

/// 命令行参数（未给出的项沿用参数文件、环境变量或默认值）
#[derive(Debug, Parser)]
#[command(
    name = "job-hunt-assistant",
    version,
    about = "搜索 LinkedIn 职位并用 AI 按匹配度评分"
)]
struct Cli {
    /// 搜索条件 JSON 文件（默认 config.json）
    #[arg(long, alias = "config_file")]
    config_file: Option<PathBuf>,

    /// 最多抓取的职位数量（默认 20）
    #[arg(long, alias = "jobs_number")]
    jobs_number: Option<usize>,

    /// 每批评分的职位数量（默认 5）
    #[arg(long, alias = "batch_size")]
    batch_size: Option<usize>,

    /// 输出 CSV 文件（默认 jobs_scored.csv）
    #[arg(long, alias = "output_csv")]
    output_csv: Option<PathBuf>,

    /// 同时评分的批次数量（默认 1）
    #[arg(long)]
    concurrency: Option<usize>,

    /// 评分模型（默认 gpt-5-mini，也可用 OPENAI_MODEL）
    #[arg(long)]
    model: Option<String>,

    /// TOML 运行参数文件
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    /// 命令行参数优先级最高
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.config_file {
            config.config_file = v;
        }
        if let Some(v) = self.jobs_number {
            config.jobs_number = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.output_csv {
            config.output_csv = v;
        }
        if let Some(v) = self.concurrency {
            config.max_concurrent_batches = v;
        }
        if let Some(v) = self.model {
            config.llm_model_name = v;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 先加载 .env，再初始化日志（RUST_LOG 可能写在 .env 里）
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    tokio::select! {
        result = run(cli) => match result {
            Ok(summary) => {
                if summary.is_degraded() {
                    warn!(
                        "⚠️ 部分批次评分失败，报告只包含 {}/{} 个职位",
                        summary.scored, summary.requested
                    );
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                match e.downcast_ref::<AppError>() {
                    Some(app_error) => error!(stage = app_error.stage(), "❌ 运行失败: {}", app_error),
                    None => error!("❌ 运行失败: {:#}", e),
                }
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("⚠️ 收到中断信号，运行已取消");
            ExitCode::from(130)
        }
    }
}

async fn run(cli: Cli) -> Result<RunSummary> {
    // 加载配置
    let mut config = Config::load(cli.settings.as_deref()).map_err(AppError::from)?;
    cli.apply(&mut config);

    // 初始化并运行应用
    let app = App::initialize(config)?;
    let summary = app.run().await?;

    info!("✅ 运行完成");
    Ok(summary)
}
