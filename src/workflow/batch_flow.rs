//! 批次评分流程 - 流程层
//!
//! 核心职责：定义"一批职位"的完整评分流程
//!
//! 流程顺序：
//! 1. 构建提示词 → 调用评分接口 → 校验结果
//! 2. 服务错误或结构错误：指数退避后重试，最多 `max_attempts` 次
//! 3. 重试耗尽：记录失败批次，不影响其他批次

use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{error, warn};

use crate::config::Config;
use crate::error::ScoringError;
use crate::models::{JobPosting, ProfileContext, ScoredJob};
use crate::services::{CompletionBackend, ScoringService};
use crate::utils::logging::{log_batch_complete, log_batch_start};
use crate::workflow::batch_ctx::BatchCtx;

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.retry_base_delay,
            max_delay: config.retry_max_delay,
        }
    }

    /// 第 `attempt` 次失败后的等待时间：base × 2^(attempt-1)，不超过 max_delay
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}

/// 单个批次的处理结果
#[derive(Debug)]
pub enum BatchOutcome {
    Scored(Vec<ScoredJob>),
    /// 重试耗尽，附带最后一次的错误
    Failed(ScoringError),
}

/// 被放弃的批次
#[derive(Debug)]
pub struct FailedBatch {
    pub batch_num: usize,
    pub job_count: usize,
    pub error: ScoringError,
}

/// 全部批次的评分结果
#[derive(Debug, Default)]
pub struct ScoringRun {
    /// 成功批次的结果，按批次编号排列
    pub batches: Vec<Vec<ScoredJob>>,
    pub failed: Vec<FailedBatch>,
    pub total_batches: usize,
}

impl ScoringRun {
    pub fn failed_batch_nums(&self) -> Vec<usize> {
        self.failed.iter().map(|f| f.batch_num).collect()
    }
}

/// 批次评分流程
///
/// - 编排单批的重试
/// - 切分批次并限制同时评分的批次数量
/// - 不关心职位从哪来、结果写到哪
pub struct BatchFlow<B> {
    backend: B,
    scoring: ScoringService,
    retry: RetryPolicy,
    max_concurrent: usize,
}

impl<B: CompletionBackend> BatchFlow<B> {
    pub fn new(
        backend: B,
        scoring: ScoringService,
        retry: RetryPolicy,
        max_concurrent: usize,
    ) -> Self {
        Self {
            backend,
            scoring,
            retry,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// 处理单个批次（含重试）
    pub async fn run(
        &self,
        batch: &[JobPosting],
        profile: &ProfileContext,
        ctx: &BatchCtx,
    ) -> BatchOutcome {
        let mut attempt = 1;
        loop {
            match self.scoring.score_batch(&self.backend, batch, profile).await {
                Ok(scored) => {
                    log_batch_complete(ctx.batch_num, scored.len(), batch.len());
                    return BatchOutcome::Scored(scored);
                }
                Err(e) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        "{} 评分失败 (尝试 {}/{}): {}，{:?} 后重试...",
                        ctx, attempt, self.retry.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("{} ❌ 评分彻底失败，已尝试 {} 次: {}", ctx, attempt, e);
                    return BatchOutcome::Failed(e);
                }
            }
        }
    }

    /// 切分批次并评分
    ///
    /// 批次之间互不影响：某批失败只会让它的职位缺席报告。
    pub async fn score_all(
        &self,
        jobs: &[JobPosting],
        profile: &ProfileContext,
        batch_size: usize,
    ) -> ScoringRun {
        let batch_size = batch_size.max(1);
        let total_batches = jobs.len().div_ceil(batch_size);

        let mut outcomes: Vec<(BatchCtx, BatchOutcome)> =
            stream::iter(jobs.chunks(batch_size).enumerate())
                .map(|(idx, chunk)| async move {
                    let ctx = BatchCtx::new(idx + 1, total_batches, chunk.len());
                    log_batch_start(ctx.batch_num, ctx.total_batches, ctx.job_count);
                    let outcome = self.run(chunk, profile, &ctx).await;
                    (ctx, outcome)
                })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;

        outcomes.sort_by_key(|(ctx, _)| ctx.batch_num);

        let mut run = ScoringRun {
            total_batches,
            ..Default::default()
        };
        for (ctx, outcome) in outcomes {
            match outcome {
                BatchOutcome::Scored(scored) => run.batches.push(scored),
                BatchOutcome::Failed(error) => run.failed.push(FailedBatch {
                    batch_num: ctx.batch_num,
                    job_count: ctx.job_count,
                    error,
                }),
            }
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 按脚本依次返回回复
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, ScoringError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String, ScoringError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CompletionBackend for ScriptedBackend {
        async fn complete(
            &self,
            _user: &str,
            _system: Option<&str>,
        ) -> Result<String, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ScoringError::service("脚本已用完")))
        }
    }

    /// 给提示词里出现的每个职位打 60 分
    ///
    /// 包含 `unreachable_id` 的批次总是调用失败，包含 `malformed_id` 的批次总是返回非 JSON，
    /// 包含 `slow_id` 的批次回复前先等待一段时间。
    struct EchoBackend {
        unreachable_id: Option<String>,
        malformed_id: Option<String>,
        slow_id: Option<String>,
        calls: AtomicUsize,
        /// 每次成功回复的批次首个职位 id（按完成先后）
        completed: Mutex<Vec<String>>,
    }

    impl EchoBackend {
        fn new(unreachable_id: Option<&str>) -> Self {
            Self {
                unreachable_id: unreachable_id.map(str::to_string),
                malformed_id: None,
                slow_id: None,
                calls: AtomicUsize::new(0),
                completed: Mutex::new(Vec::new()),
            }
        }

        fn malformed_on(mut self, id: &str) -> Self {
            self.malformed_id = Some(id.to_string());
            self
        }

        fn slow_on(mut self, id: &str) -> Self {
            self.slow_id = Some(id.to_string());
            self
        }
    }

    impl CompletionBackend for EchoBackend {
        async fn complete(
            &self,
            user: &str,
            _system: Option<&str>,
        ) -> Result<String, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ids: Vec<&str> = user
                .split("\"job_posting_id\": \"")
                .skip(1)
                .filter_map(|s| s.split('"').next())
                .collect();

            let hit = |target: &Option<String>| {
                target
                    .as_deref()
                    .is_some_and(|t| ids.iter().any(|id| *id == t))
            };

            if hit(&self.unreachable_id) {
                return Err(ScoringError::service("connection refused"));
            }
            if hit(&self.malformed_id) {
                return Ok("Sorry, I cannot score these jobs.".to_string());
            }
            if hit(&self.slow_id) {
                tokio::time::sleep(Duration::from_millis(150)).await;
            }

            if let Some(first) = ids.first() {
                self.completed.lock().unwrap().push(first.to_string());
            }
            let scores: Vec<_> = ids
                .iter()
                .map(|id| serde_json::json!({"job_posting_id": id, "score": 60, "comment": "ok"}))
                .collect();
            Ok(serde_json::json!({ "scores": scores }).to_string())
        }
    }

    fn jobs(n: usize) -> Vec<JobPosting> {
        (0..n)
            .map(|i| JobPosting {
                id: format!("job-{i}"),
                url: None,
                title: format!("Engineer {i}"),
                company: None,
                location: None,
                posted_date: None,
                description: None,
                discovery_index: i,
            })
            .collect()
    }

    fn profile() -> ProfileContext {
        ProfileContext {
            profile_summary: "Rust engineer".to_string(),
            desired_job_summary: "Backend role".to_string(),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn flow<B: CompletionBackend>(backend: B, max_concurrent: usize) -> BatchFlow<B> {
        BatchFlow::new(backend, ScoringService::new(400), fast_retry(), max_concurrent)
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(10), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_retry_then_succeed() {
        let backend = ScriptedBackend::new(vec![
            Err(ScoringError::service("503 Service Unavailable")),
            Ok("not json at all".to_string()),
            Ok(r#"{"scores": [{"job_posting_id": "job-0", "score": 88, "comment": "fit"}]}"#.to_string()),
        ]);
        let flow = flow(backend, 1);
        let batch = jobs(1);

        let outcome = flow.run(&batch, &profile(), &BatchCtx::new(1, 1, 1)).await;

        match outcome {
            BatchOutcome::Scored(scored) => {
                assert_eq!(scored.len(), 1);
                assert_eq!(scored[0].score, 88);
            }
            BatchOutcome::Failed(e) => panic!("应当成功: {e}"),
        }
        assert_eq!(flow.backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let backend = ScriptedBackend::new(vec![
            Err(ScoringError::service("timeout")),
            Err(ScoringError::service("timeout")),
            Err(ScoringError::service("timeout")),
            Ok("never used".to_string()),
        ]);
        let flow = flow(backend, 1);
        let batch = jobs(2);

        let outcome = flow.run(&batch, &profile(), &BatchCtx::new(1, 1, 2)).await;

        assert!(matches!(outcome, BatchOutcome::Failed(ScoringError::Service(_))));
        assert_eq!(flow.backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_score_all_groups_jobs() {
        let flow = flow(EchoBackend::new(None), 2);
        let jobs = jobs(12);

        let run = flow.score_all(&jobs, &profile(), 5).await;

        assert_eq!(run.total_batches, 3);
        assert_eq!(run.batches.len(), 3);
        assert_eq!(
            run.batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![5, 5, 2]
        );
        assert!(run.failed.is_empty());
        assert_eq!(run.batches[2][0].id(), "job-10");
    }

    #[tokio::test]
    async fn test_unreachable_batch_is_isolated() {
        let flow = flow(EchoBackend::new(Some("job-6")), 3);
        let jobs = jobs(15);

        let run = flow.score_all(&jobs, &profile(), 5).await;

        assert_eq!(run.failed_batch_nums(), vec![2]);
        assert_eq!(run.failed[0].job_count, 5);
        assert_eq!(run.batches.len(), 2);

        let ids: Vec<&str> = run.batches.iter().flatten().map(ScoredJob::id).collect();
        assert!(ids.contains(&"job-0"));
        assert!(ids.contains(&"job-14"));
        assert!(!ids.iter().any(|id| ["job-5", "job-6", "job-9"].contains(id)));

        // 2 个成功批次各 1 次，失败批次 3 次
        assert_eq!(flow.backend.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_score_all_keeps_batch_order_when_later_batch_finishes_first() {
        let flow = flow(EchoBackend::new(None).slow_on("job-0"), 3);
        let jobs = jobs(9);

        let run = flow.score_all(&jobs, &profile(), 3).await;

        // 批次 1 最后完成
        let completed = flow.backend.completed.lock().unwrap().clone();
        assert_eq!(completed.len(), 3);
        assert_eq!(completed.last().map(String::as_str), Some("job-0"));

        assert!(run.failed.is_empty());
        let firsts: Vec<&str> = run.batches.iter().map(|b| b[0].id()).collect();
        assert_eq!(firsts, vec!["job-0", "job-3", "job-6"]);
        assert_eq!(run.batches[0][0].id(), "job-0");
    }

    #[tokio::test]
    async fn test_malformed_batch_is_dropped_after_retries() {
        let flow = flow(EchoBackend::new(None).malformed_on("job-4"), 2);
        let jobs = jobs(9);

        let run = flow.score_all(&jobs, &profile(), 3).await;

        assert_eq!(run.total_batches, 3);
        assert_eq!(run.failed.len(), 1);
        assert_eq!(run.failed[0].batch_num, 2);
        assert!(matches!(run.failed[0].error, ScoringError::Validation(_)));

        let ids: Vec<&str> = run.batches.iter().flatten().map(ScoredJob::id).collect();
        assert_eq!(ids, vec!["job-0", "job-1", "job-2", "job-6", "job-7", "job-8"]);

        // 失败批次用满 3 次，其余批次各 1 次
        assert_eq!(flow.backend.calls.load(Ordering::SeqCst), 3 + 1 + 1);
    }

    #[tokio::test]
    async fn test_score_all_empty_input() {
        let flow = flow(EchoBackend::new(None), 1);

        let run = flow.score_all(&[], &profile(), 5).await;

        assert_eq!(run.total_batches, 0);
        assert!(run.batches.is_empty());
        assert_eq!(flow.backend.calls.load(Ordering::SeqCst), 0);
    }
}
