//! 职位发现服务 - 业务能力层
//!
//! 触发抓取任务 → 轮询快照 → 标准化记录。
//!
//! 轮询是一个显式状态机：
//!
//! ```text
//! Submitted ──▶ Polling ──┬──▶ Ready
//!                  ▲      ├──▶ Failed
//!                  └──────┴──▶ TimedOut
//! ```
//!
//! 等待间隔按倍数退避并设上限，整体受截止时间约束。
//! snapshot_id 只存在于状态机内部，超时或出错时尽力取消远端任务后丢弃，
//! 不会被其他地方再次轮询。

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::clients::{SnapshotApi, SnapshotStatus};
use crate::config::Config;
use crate::error::DiscoveryError;
use crate::models::{JobPosting, RawJobRecord, SearchCriteria};
use crate::utils::truncate_text;

/// 轮询策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub backoff_factor: f64,
    pub deadline: Duration,
}

impl PollPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_interval: config.poll_interval,
            max_interval: config.poll_max_interval,
            backoff_factor: 1.5,
            deadline: config.poll_deadline,
        }
    }

    /// 下一次等待间隔
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.backoff_factor).min(self.max_interval)
    }
}

/// 轮询状态
#[derive(Debug)]
pub enum PollState {
    Submitted {
        snapshot_id: String,
    },
    Polling {
        snapshot_id: String,
        attempt: u32,
        interval: Duration,
    },
    Ready(Vec<RawJobRecord>),
    Failed {
        snapshot_id: String,
        reason: String,
    },
    TimedOut {
        snapshot_id: String,
    },
}

/// 职位发现服务
pub struct DiscoveryService<A> {
    api: A,
    policy: PollPolicy,
    description_max_chars: usize,
}

impl<A: SnapshotApi> DiscoveryService<A> {
    pub fn new(api: A, policy: PollPolicy, description_max_chars: usize) -> Self {
        Self {
            api,
            policy,
            description_max_chars,
        }
    }

    /// 发现职位
    ///
    /// # 参数
    /// - `criteria`: 搜索条件
    /// - `limit`: 最多返回的职位数量
    ///
    /// # 返回
    /// 最多 `limit` 个职位，标题均不含排除词。要么完整成功，要么返回错误。
    pub async fn discover(
        &self,
        criteria: &SearchCriteria,
        limit: usize,
    ) -> Result<Vec<JobPosting>, DiscoveryError> {
        let snapshot_id = self.api.trigger(criteria, limit).await?;
        info!("✓ 职位搜索已触发，Snapshot ID: {}", snapshot_id);

        let records = self.poll_until_ready(snapshot_id).await?;
        info!("✓ 快照已就绪，共 {} 条原始记录", records.len());

        normalize_records(records, limit, criteria, self.description_max_chars)
    }

    /// 驱动状态机直到终态
    async fn poll_until_ready(&self, snapshot_id: String) -> Result<Vec<RawJobRecord>, DiscoveryError> {
        let started = Instant::now();
        let deadline = started + self.policy.deadline;
        let mut state = PollState::Submitted { snapshot_id };

        loop {
            state = match state {
                PollState::Submitted { snapshot_id } => {
                    info!("🔄 开始轮询快照: {}", snapshot_id);
                    PollState::Polling {
                        snapshot_id,
                        attempt: 1,
                        interval: self.policy.initial_interval,
                    }
                }

                PollState::Polling {
                    snapshot_id,
                    attempt,
                    interval,
                } => {
                    let status = match self.api.snapshot(&snapshot_id).await {
                        Ok(status) => status,
                        Err(e) => {
                            self.cancel_quietly(&snapshot_id).await;
                            return Err(e);
                        }
                    };

                    match status {
                        SnapshotStatus::Ready(records) => PollState::Ready(records),
                        SnapshotStatus::Failed(reason) => PollState::Failed {
                            snapshot_id,
                            reason,
                        },
                        SnapshotStatus::Pending => {
                            let now = Instant::now();
                            if now >= deadline {
                                PollState::TimedOut { snapshot_id }
                            } else {
                                let wait = interval.min(deadline - now);
                                info!(
                                    "⏳ 快照尚未就绪（第 {} 次查询），{:.1} 秒后重试...",
                                    attempt,
                                    wait.as_secs_f64()
                                );
                                sleep(wait).await;
                                PollState::Polling {
                                    snapshot_id,
                                    attempt: attempt + 1,
                                    interval: self.policy.next_interval(interval),
                                }
                            }
                        }
                    }
                }

                PollState::Ready(records) => return Ok(records),

                PollState::Failed {
                    snapshot_id,
                    reason,
                } => {
                    return Err(DiscoveryError::ProviderFailed {
                        snapshot_id,
                        reason,
                    });
                }

                PollState::TimedOut { snapshot_id } => {
                    warn!("⚠️ 快照 {} 超过截止时间仍未就绪，取消任务", snapshot_id);
                    self.cancel_quietly(&snapshot_id).await;
                    return Err(DiscoveryError::Timeout {
                        snapshot_id,
                        elapsed_secs: started.elapsed().as_secs(),
                    });
                }
            };
        }
    }

    /// 尽力取消远端任务，失败只记日志
    async fn cancel_quietly(&self, snapshot_id: &str) {
        match self.api.cancel(snapshot_id).await {
            Ok(()) => debug!("已取消快照 {}", snapshot_id),
            Err(e) => warn!("取消快照 {} 失败: {}", snapshot_id, e),
        }
    }
}

/// 标准化原始记录
///
/// 先截取前 `limit` 条，再跳过错误行、过滤排除词，最后映射为 `JobPosting`。
/// 任何一条记录缺少标题或标识都视为整体失败。
pub fn normalize_records(
    records: Vec<RawJobRecord>,
    limit: usize,
    criteria: &SearchCriteria,
    description_max_chars: usize,
) -> Result<Vec<JobPosting>, DiscoveryError> {
    let mut postings = Vec::new();
    let mut excluded = 0usize;

    for (index, record) in records.into_iter().take(limit).enumerate() {
        if let Some(error) = record.error_message() {
            warn!("跳过第 {} 条错误记录: {}", index, error);
            continue;
        }

        let title = record
            .text("job_title")
            .ok_or(DiscoveryError::MissingField {
                index,
                field: "job_title",
            })?;

        if criteria.is_excluded(&title) {
            debug!("排除职位: {}", title);
            excluded += 1;
            continue;
        }

        let url = record.text("url");
        let id = record
            .text("job_posting_id")
            .or_else(|| url.clone())
            .ok_or(DiscoveryError::MissingField {
                index,
                field: "job_posting_id",
            })?;

        postings.push(JobPosting {
            id,
            url,
            title,
            company: record.text("company_name"),
            location: record.text("job_location"),
            posted_date: record.text("job_posted_date"),
            description: record
                .text("job_summary")
                .map(|d| truncate_text(&d, description_max_chars)),
            discovery_index: index,
        });
    }

    if excluded > 0 {
        info!("🚫 按排除词过滤掉 {} 个职位", excluded);
    }

    Ok(postings)
}
