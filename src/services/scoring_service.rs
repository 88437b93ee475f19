//! 评分服务 - 业务能力层
//!
//! 只负责"给一个批次打分"：构建提示词、调用一次评分接口、校验返回文档。
//! 不关心重试和批次编排。
//!
//! 返回文档视为不可信输入，必须先通过结构校验才会读取任何字段：
//! - 文档结构不合法：整个批次失败（`ScoringError::Validation`），不做逐条挽救
//! - 缺少某个职位的条目：该职位被丢弃，不记 0 分
//! - 未知 id 的条目：忽略
//! - 同一 id 出现多次：取第一条
//! - 分数超出 [0, 100]：截断到边界

use std::collections::{HashMap, HashSet};

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ScoringError;
use crate::models::{JobPosting, ProfileContext, ScoredJob};
use crate::services::llm_service::CompletionBackend;
use crate::utils::truncate_text;

/// 结构化输出使用的 schema 名称
pub const SCORES_SCHEMA_NAME: &str = "job_scores";

const SYSTEM_MESSAGE: &str = "You are a helpful job scoring assistant. \
    You always answer with a single JSON object and nothing else.";

/// 发送给 LLM 的职位格式
#[derive(Debug, Serialize)]
struct JobForLlm<'a> {
    job_posting_id: &'a str,
    job_title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    company_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_summary: Option<&'a str>,
}

impl<'a> From<&'a JobPosting> for JobForLlm<'a> {
    fn from(job: &'a JobPosting) -> Self {
        Self {
            job_posting_id: &job.id,
            job_title: &job.title,
            company_name: job.company.as_deref(),
            job_location: job.location.as_deref(),
            job_summary: job.description.as_deref(),
        }
    }
}

/// id 可能被模型写成数字
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntryId {
    Text(String),
    Number(i64),
}

impl EntryId {
    fn into_string(self) -> String {
        match self {
            EntryId::Text(s) => s.trim().to_string(),
            EntryId::Number(n) => n.to_string(),
        }
    }
}

/// 单条评分
#[derive(Debug, Deserialize)]
struct ScoreEntry {
    job_posting_id: EntryId,
    #[serde(deserialize_with = "deserialize_score")]
    score: i64,
    comment: String,
}

/// 分数接受整数、整数值的浮点数（`85.0`）和数字字符串（`"85"`）
///
/// 超出 i64 的整数饱和到 i64 边界，之后统一由 `clamp_score` 截断。
/// 带小数部分或非数字的值视为结构错误。
fn deserialize_score<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    };
    parsed.ok_or_else(|| de::Error::custom(format!("score 不是整数: {}", value)))
}

/// 整数值的浮点数转为 i64（`as` 转换在越界时饱和）
fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

/// 评分文档：`{"scores": [...]}` 或直接是数组
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScoresDocument {
    Wrapped { scores: Vec<ScoreEntry> },
    Bare(Vec<ScoreEntry>),
}

impl ScoresDocument {
    fn into_entries(self) -> Vec<ScoreEntry> {
        match self {
            ScoresDocument::Wrapped { scores } => scores,
            ScoresDocument::Bare(scores) => scores,
        }
    }
}

/// 评分文档的 JSON Schema，用于请求结构化输出
pub fn scores_json_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "scores": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "job_posting_id": { "type": "string" },
                        "score": {
                            "type": "integer",
                            "description": "Match score from 0 to 100"
                        },
                        "comment": { "type": "string" }
                    },
                    "required": ["job_posting_id", "score", "comment"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["scores"],
        "additionalProperties": false
    })
}

/// 把任意整数截断到 0..=100
pub fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

/// 评分服务
#[derive(Debug, Clone)]
pub struct ScoringService {
    comment_max_chars: usize,
}

impl ScoringService {
    pub fn new(comment_max_chars: usize) -> Self {
        Self { comment_max_chars }
    }

    /// 对一个批次评分（单次调用，不重试）
    pub async fn score_batch<B: CompletionBackend>(
        &self,
        backend: &B,
        batch: &[JobPosting],
        profile: &ProfileContext,
    ) -> Result<Vec<ScoredJob>, ScoringError> {
        let (user_message, system_message) = self.build_messages(batch, profile)?;
        let response = backend
            .complete(&user_message, Some(&system_message))
            .await?;
        self.parse_scores(&response, batch)
    }

    /// 构建评分消息
    ///
    /// 返回 (user_message, system_message)
    pub fn build_messages(
        &self,
        batch: &[JobPosting],
        profile: &ProfileContext,
    ) -> Result<(String, String), ScoringError> {
        let jobs: Vec<JobForLlm<'_>> = batch.iter().map(JobForLlm::from).collect();
        let jobs_json = serde_json::to_string_pretty(&jobs)
            .map_err(|e| ScoringError::service(format!("序列化职位失败: {}", e)))?;

        let user_message = format!(
            r#"You are an expert recruiter. Given the following candidate profile:
{profile}

Desired job description:
{desired}

Score each job posting accurately from 0 to 100 on how well it matches the profile and desired job.
For each job, add a short comment (max 50 words) explaining the score and match quality.
Return a JSON object of the form {{"scores": [{{"job_posting_id": "<id>", "score": <integer 0-100>, "comment": "<text>"}}]}}
with exactly one entry per job below, using the job_posting_id values unchanged.

Jobs:
{jobs}
"#,
            profile = profile.profile_summary,
            desired = profile.desired_job_summary,
            jobs = jobs_json,
        );

        Ok((user_message, SYSTEM_MESSAGE.to_string()))
    }

    /// 校验并解析评分文档
    ///
    /// 输出顺序与批次内的职位顺序一致。
    pub fn parse_scores(
        &self,
        response: &str,
        batch: &[JobPosting],
    ) -> Result<Vec<ScoredJob>, ScoringError> {
        let document: ScoresDocument = serde_json::from_str(strip_code_fence(response))
            .map_err(|e| {
                ScoringError::validation(format!(
                    "返回内容不符合评分结构: {} (响应: {})",
                    e,
                    truncate_text(response, 200)
                ))
            })?;

        let known: HashSet<&str> = batch.iter().map(|job| job.id.as_str()).collect();
        let mut by_id: HashMap<String, (i64, String)> = HashMap::new();
        let mut unknown = 0usize;

        for entry in document.into_entries() {
            let id = entry.job_posting_id.into_string();
            if !known.contains(id.as_str()) {
                unknown += 1;
                continue;
            }
            if by_id.contains_key(&id) {
                debug!("忽略重复的评分条目: {}", id);
                continue;
            }
            by_id.insert(id, (entry.score, entry.comment));
        }

        if unknown > 0 {
            warn!("忽略 {} 条未知 id 的评分条目", unknown);
        }

        let mut scored = Vec::with_capacity(by_id.len());
        for job in batch {
            let Some((score, comment)) = by_id.remove(&job.id) else {
                warn!("评分结果缺少职位 {}（{}），已丢弃", job.id, job.title);
                continue;
            };

            if !(0..=100).contains(&score) {
                debug!("职位 {} 的分数 {} 超出范围，已截断", job.id, score);
            }

            scored.push(ScoredJob {
                job: job.clone(),
                score: clamp_score(score),
                comment: truncate_text(comment.trim(), self.comment_max_chars),
            });
        }

        Ok(scored)
    }
}

/// 去掉 ```json ... ``` 包裹
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, index: usize) -> JobPosting {
        JobPosting {
            id: id.to_string(),
            url: Some(format!("https://www.linkedin.com/jobs/view/{id}")),
            title: format!("Engineer {id}"),
            company: Some("Acme".to_string()),
            location: Some("Remote".to_string()),
            posted_date: None,
            description: Some("Build things.".to_string()),
            discovery_index: index,
        }
    }

    fn batch_of(n: usize) -> Vec<JobPosting> {
        (0..n).map(|i| job(&format!("job-{i}"), i)).collect()
    }

    fn profile() -> ProfileContext {
        ProfileContext {
            profile_summary: "Rust backend engineer".to_string(),
            desired_job_summary: "Staff engineer, distributed systems".to_string(),
        }
    }

    fn service() -> ScoringService {
        ScoringService::new(400)
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(150), 100);
        assert_eq!(clamp_score(-5), 0);
        assert_eq!(clamp_score(73), 73);
    }

    #[test]
    fn test_build_messages_embeds_profile_and_ids() {
        let (user, system) = service().build_messages(&batch_of(2), &profile()).unwrap();

        assert!(user.contains("Rust backend engineer"));
        assert!(user.contains("Staff engineer, distributed systems"));
        assert!(user.contains(r#""job_posting_id": "job-0""#));
        assert!(user.contains(r#""job_posting_id": "job-1""#));
        assert!(system.contains("JSON"));
    }

    #[test]
    fn test_missing_entry_drops_job() {
        let batch = batch_of(5);
        let response = json!({
            "scores": [
                {"job_posting_id": "job-0", "score": 90, "comment": "great"},
                {"job_posting_id": "job-1", "score": 70, "comment": "good"},
                {"job_posting_id": "job-3", "score": 40, "comment": "weak"},
                {"job_posting_id": "job-4", "score": 10, "comment": "poor"}
            ]
        })
        .to_string();

        let scored = service().parse_scores(&response, &batch).unwrap();

        assert_eq!(scored.len(), 4);
        assert!(scored.iter().all(|s| s.id() != "job-2"));
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let batch = batch_of(2);
        let response = r#"{"scores": [
            {"job_posting_id": "job-0", "score": 150, "comment": "too high"},
            {"job_posting_id": "job-1", "score": -5, "comment": "too low"}
        ]}"#;

        let scored = service().parse_scores(response, &batch).unwrap();

        assert_eq!(scored[0].score, 100);
        assert_eq!(scored[1].score, 0);
    }

    #[test]
    fn test_unknown_and_duplicate_entries() {
        let batch = batch_of(1);
        let response = r#"{"scores": [
            {"job_posting_id": "job-0", "score": 60, "comment": "first"},
            {"job_posting_id": "job-0", "score": 95, "comment": "second"},
            {"job_posting_id": "job-99", "score": 80, "comment": "unknown"}
        ]}"#;

        let scored = service().parse_scores(response, &batch).unwrap();

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].score, 60);
        assert_eq!(scored[0].comment, "first");
    }

    #[test]
    fn test_malformed_document_fails_whole_batch() {
        let batch = batch_of(2);

        for response in [
            "I think job-0 is a great fit!",
            r#"{"results": []}"#,
            r#"{"scores": [{"job_posting_id": "job-0", "score": "high", "comment": "x"}]}"#,
            r#"{"scores": [{"job_posting_id": "job-0", "score": 80.5, "comment": "x"}]}"#,
            r#"{"scores": [{"job_posting_id": "job-0", "score": 80}]}"#,
        ] {
            let err = service().parse_scores(response, &batch).unwrap_err();
            assert!(
                matches!(err, ScoringError::Validation(_)),
                "响应应校验失败: {response}"
            );
        }
    }

    #[test]
    fn test_huge_and_lenient_scores_are_clamped() {
        let batch = batch_of(5);
        let response = r#"{"scores": [
            {"job_posting_id": "job-0", "score": 100000000000000000000, "comment": "huge"},
            {"job_posting_id": "job-1", "score": -100000000000000000000, "comment": "tiny"},
            {"job_posting_id": "job-2", "score": 85.0, "comment": "float"},
            {"job_posting_id": "job-3", "score": "85", "comment": "text"},
            {"job_posting_id": "job-4", "score": 18446744073709551615, "comment": "u64"}
        ]}"#;

        let scored = service().parse_scores(response, &batch).unwrap();

        let scores: Vec<u8> = scored.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![100, 0, 85, 85, 100]);
    }

    #[test]
    fn test_non_integer_scores_are_rejected() {
        let batch = batch_of(1);
        for score in [r#""eighty""#, "85.5", r#""85.5""#, "null", "true"] {
            let response = format!(
                r#"{{"scores": [{{"job_posting_id": "job-0", "score": {score}, "comment": "x"}}]}}"#
            );
            let err = service().parse_scores(&response, &batch).unwrap_err();
            assert!(matches!(err, ScoringError::Validation(_)), "score {score} 应校验失败");
        }
    }

    #[test]
    fn test_schema_matches_parser() {
        let schema = scores_json_schema();
        let entry = &schema["properties"]["scores"]["items"];

        assert_eq!(schema["required"], json!(["scores"]));
        assert_eq!(entry["required"], json!(["job_posting_id", "score", "comment"]));
        assert_eq!(entry["properties"]["score"]["type"], "integer");
        assert_eq!(entry["additionalProperties"], false);
    }

    #[test]
    fn test_accepts_bare_array_and_code_fence() {
        let batch = batch_of(1);
        let response = "```json\n[{\"job_posting_id\": \"job-0\", \"score\": 55, \"comment\": \"ok\"}]\n```";

        let scored = service().parse_scores(response, &batch).unwrap();
        assert_eq!(scored[0].score, 55);
    }

    #[test]
    fn test_numeric_ids_are_matched() {
        let batch = vec![job("4012345678", 0)];
        let response = r#"{"scores": [{"job_posting_id": 4012345678, "score": 77, "comment": "ok"}]}"#;

        let scored = service().parse_scores(response, &batch).unwrap();
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].score, 77);
    }

    #[test]
    fn test_comment_is_bounded() {
        let batch = batch_of(1);
        let long_comment = "x".repeat(1000);
        let response = json!({"scores": [{"job_posting_id": "job-0", "score": 50, "comment": long_comment}]})
            .to_string();

        let scored = ScoringService::new(20).parse_scores(&response, &batch).unwrap();
        assert_eq!(scored[0].comment.chars().count(), 23);
    }

    #[test]
    fn test_output_follows_batch_order() {
        let batch = batch_of(3);
        let response = r#"[
            {"job_posting_id": "job-2", "score": 10, "comment": "c"},
            {"job_posting_id": "job-0", "score": 30, "comment": "a"},
            {"job_posting_id": "job-1", "score": 20, "comment": "b"}
        ]"#;

        let scored = service().parse_scores(response, &batch).unwrap();
        let ids: Vec<_> = scored.iter().map(ScoredJob::id).collect();
        assert_eq!(ids, vec!["job-0", "job-1", "job-2"]);
    }
}
