use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 抓取服务返回的原始职位记录
///
/// 除了标准化时读取的几个字段外不做任何解释。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawJobRecord(pub Map<String, Value>);

impl RawJobRecord {
    /// 读取字符串字段，数字会转成字符串，空白视为缺失
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `include_errors=true` 时服务会混入错误行
    pub fn error_message(&self) -> Option<String> {
        self.0.get("error").map(|e| match e {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// 标准化后的职位
///
/// 由职位发现阶段从 `RawJobRecord` 生成，之后不再修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    /// 稳定标识（服务端 job_posting_id，缺失时用 URL）
    pub id: String,
    pub url: Option<String>,
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub posted_date: Option<String>,
    /// 职位描述（可能已截断）
    pub description: Option<String>,
    /// 在发现结果中的位置，排序时用于稳定的次级顺序
    pub discovery_index: usize,
}

/// 带 AI 评分的职位
///
/// 不变式：`score` 在 0..=100 之间。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredJob {
    pub job: JobPosting,
    pub score: u8,
    pub comment: String,
}

impl ScoredJob {
    pub fn id(&self) -> &str {
        &self.job.id
    }
}

/// 最终排名报告：按分数降序，同分按发现顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedReport {
    pub jobs: Vec<ScoredJob>,
}

impl RankedReport {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredJob> {
        self.jobs.iter()
    }

    /// 前 n 个最佳匹配
    pub fn top(&self, n: usize) -> &[ScoredJob] {
        &self.jobs[..n.min(self.jobs.len())]
    }
}
