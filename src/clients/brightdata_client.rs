//! Bright Data 数据集 API 客户端
//!
//! 封装触发抓取任务、查询快照、取消快照三个调用。
//! 数据集 ID 和发现模式固定为 "LinkedIn 职位 - 按关键词发现"，不对用户开放。

use crate::clients::{SnapshotApi, SnapshotStatus};
use crate::config::Config;
use crate::error::DiscoveryError;
use crate::models::{RawJobRecord, SearchCriteria};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// "Linkedin job listings information - discover by keyword"
const DATASET_ID: &str = "gd_lpfll7v5hcqtkxl6l";

/// 快照仍在生成中的状态值
const PENDING_STATUSES: [&str; 4] = ["running", "building", "collecting", "starting"];

/// 触发请求的单条输入
#[derive(Debug, Clone, Serialize)]
pub struct DiscoverInput<'a> {
    pub location: &'a str,
    pub keyword: &'a str,
    pub country: &'a str,
    pub time_range: &'a str,
    pub job_type: &'a str,
    pub experience_level: &'a str,
    pub remote: &'a str,
    pub company: &'a str,
    pub selective_search: bool,
    pub jobs_to_not_include: &'a [String],
    pub location_radius: &'a str,
    #[serde(flatten)]
    pub extra: &'a Map<String, Value>,
}

impl<'a> From<&'a SearchCriteria> for DiscoverInput<'a> {
    fn from(criteria: &'a SearchCriteria) -> Self {
        let or_empty = |v: &'a Option<String>| v.as_deref().unwrap_or("");
        Self {
            location: &criteria.location,
            keyword: or_empty(&criteria.keyword),
            country: or_empty(&criteria.country),
            time_range: or_empty(&criteria.time_range),
            job_type: or_empty(&criteria.job_type),
            experience_level: or_empty(&criteria.experience_level),
            remote: or_empty(&criteria.remote),
            company: or_empty(&criteria.company),
            selective_search: criteria.selective_search,
            jobs_to_not_include: &criteria.jobs_to_not_include,
            location_radius: or_empty(&criteria.location_radius),
            extra: &criteria.extra,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    snapshot_id: Option<String>,
}

/// Bright Data 客户端
pub struct BrightDataClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl BrightDataClient {
    /// 创建新的客户端
    ///
    /// 请求超时取自 `config.request_timeout`；HTTP 客户端创建失败时返回错误，
    /// 不会退回到没有超时的默认客户端。
    pub fn new(config: &Config) -> Result<Self, DiscoveryError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| DiscoveryError::ClientBuild { source })?;

        Ok(Self {
            http,
            base_url: config.brightdata_base_url.trim_end_matches('/').to_string(),
            token: config.brightdata_api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, DiscoveryError> {
        request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| DiscoveryError::Request {
                endpoint: endpoint.to_string(),
                source,
            })
    }

    async fn read_body(endpoint: &str, resp: reqwest::Response) -> Result<String, DiscoveryError> {
        resp.text().await.map_err(|source| DiscoveryError::Request {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

impl SnapshotApi for BrightDataClient {
    async fn trigger(
        &self,
        criteria: &SearchCriteria,
        limit: usize,
    ) -> Result<String, DiscoveryError> {
        let endpoint = self.endpoint("/datasets/v3/trigger");
        let limit = limit.to_string();
        let query = [
            ("dataset_id", DATASET_ID),
            ("include_errors", "true"),
            ("type", "discover_new"),
            ("discover_by", "keyword"),
            ("limit_per_input", limit.as_str()),
        ];
        let payload = [DiscoverInput::from(criteria)];

        debug!("触发抓取任务: {}", endpoint);
        let resp = self
            .send(
                &endpoint,
                self.http.post(&endpoint).query(&query).json(&payload),
            )
            .await?;

        let status = resp.status();
        let body = Self::read_body(&endpoint, resp).await?;
        if !status.is_success() {
            return Err(DiscoveryError::BadStatus {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TriggerResponse =
            serde_json::from_str(&body).map_err(|e| DiscoveryError::MalformedResponse {
                reason: format!("触发响应不是合法 JSON: {}", e),
            })?;

        parsed
            .snapshot_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(DiscoveryError::MissingSnapshotId)
    }

    async fn snapshot(&self, snapshot_id: &str) -> Result<SnapshotStatus, DiscoveryError> {
        let endpoint = self.endpoint(&format!("/datasets/v3/snapshot/{}", snapshot_id));
        let resp = self
            .send(
                &endpoint,
                self.http.get(&endpoint).query(&[("format", "json")]),
            )
            .await?;

        let status = resp.status().as_u16();
        let body = Self::read_body(&endpoint, resp).await?;
        match status {
            202 => Ok(SnapshotStatus::Pending),
            200 => parse_snapshot_body(&body),
            _ => Err(DiscoveryError::BadStatus {
                endpoint,
                status,
                body,
            }),
        }
    }

    async fn cancel(&self, snapshot_id: &str) -> Result<(), DiscoveryError> {
        let endpoint = self.endpoint(&format!("/datasets/v3/snapshot/{}/cancel", snapshot_id));
        let resp = self.send(&endpoint, self.http.post(&endpoint)).await?;

        let status = resp.status();
        if !status.is_success() {
            let body = Self::read_body(&endpoint, resp).await.unwrap_or_default();
            return Err(DiscoveryError::BadStatus {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// 解析 HTTP 200 的快照内容
///
/// 正常情况是职位数组；对象形式表示状态信息（仍在生成或已失败）。
fn parse_snapshot_body(body: &str) -> Result<SnapshotStatus, DiscoveryError> {
    let value: Value = serde_json::from_str(body).map_err(|e| DiscoveryError::MalformedResponse {
        reason: format!("快照内容不是合法 JSON: {}", e),
    })?;

    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(map) => Ok(RawJobRecord(map)),
                other => Err(DiscoveryError::MalformedResponse {
                    reason: format!("第 {} 条记录不是对象: {}", index, other),
                }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(SnapshotStatus::Ready),
        Value::Object(map) => {
            let status = map.get("status").and_then(Value::as_str).unwrap_or("");
            if status == "failed" || map.contains_key("error") {
                let reason = map
                    .get("error")
                    .or_else(|| map.get("message"))
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .unwrap_or_else(|| "未知原因".to_string());
                Ok(SnapshotStatus::Failed(reason))
            } else if PENDING_STATUSES.contains(&status) {
                Ok(SnapshotStatus::Pending)
            } else {
                Err(DiscoveryError::MalformedResponse {
                    reason: format!("无法识别的快照状态: {}", Value::Object(map)),
                })
            }
        }
        other => Err(DiscoveryError::MalformedResponse {
            reason: format!("快照内容既不是数组也不是对象: {}", other),
        }),
    }
}
