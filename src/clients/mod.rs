pub mod brightdata_client;

pub use brightdata_client::BrightDataClient;

use crate::error::DiscoveryError;
use crate::models::{RawJobRecord, SearchCriteria};

/// 一次快照查询的结果
#[derive(Debug, Clone)]
pub enum SnapshotStatus {
    /// 仍在生成
    Pending,
    /// 已完成，附带全部原始记录
    Ready(Vec<RawJobRecord>),
    /// 服务端报告失败
    Failed(String),
}

/// 异步抓取任务接口
///
/// 轮询状态机只依赖这个接口，测试时可以替换成脚本化的实现。
#[allow(async_fn_in_trait)]
pub trait SnapshotApi {
    /// 提交抓取任务，返回 snapshot_id
    async fn trigger(&self, criteria: &SearchCriteria, limit: usize)
        -> Result<String, DiscoveryError>;

    /// 查询快照状态
    async fn snapshot(&self, snapshot_id: &str) -> Result<SnapshotStatus, DiscoveryError>;

    /// 取消快照
    async fn cancel(&self, snapshot_id: &str) -> Result<(), DiscoveryError>;
}
