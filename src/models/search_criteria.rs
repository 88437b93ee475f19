use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// 搜索条件
///
/// 对应用户的 JSON 配置文件。加载并校验后不再修改，整个运行期间只读。
/// 未识别的键保存在 `extra` 中，原样透传给抓取服务。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchCriteria {
    pub location: String,
    pub keyword: Option<String>,
    pub country: Option<String>,
    pub time_range: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub remote: Option<String>,
    pub company: Option<String>,
    pub selective_search: bool,
    pub jobs_to_not_include: Vec<String>,
    pub location_radius: Option<String>,
    /// 候选人简介（评分用）
    pub profile_summary: String,
    /// 期望职位描述（评分用）
    pub desired_job_summary: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 配置文件的原始形态，校验前不可信
#[derive(Debug, Deserialize)]
struct RawCriteria {
    location: Option<String>,
    keyword: Option<String>,
    country: Option<String>,
    time_range: Option<String>,
    job_type: Option<String>,
    experience_level: Option<String>,
    remote: Option<String>,
    company: Option<String>,
    selective_search: Option<bool>,
    jobs_to_not_include: Option<Vec<String>>,
    location_radius: Option<String>,
    profile_summary: Option<String>,
    desired_job_summary: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// 评分时附带的候选人上下文
///
/// 每个批次持有一份独立的拷贝。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileContext {
    pub profile_summary: String,
    pub desired_job_summary: String,
}

impl SearchCriteria {
    /// 校验必填字段
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("location", &self.location),
            ("profile_summary", &self.profile_summary),
            ("desired_job_summary", &self.desired_job_summary),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::BlankField { field });
            }
        }
        Ok(())
    }

    /// 职位标题是否命中排除词（不区分大小写的子串匹配）
    ///
    /// 空白排除词会被忽略，否则它会排除所有职位。
    pub fn is_excluded(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.jobs_to_not_include
            .iter()
            .map(|term| term.trim())
            .filter(|term| !term.is_empty())
            .any(|term| title.contains(&term.to_lowercase()))
    }

    pub fn profile(&self) -> ProfileContext {
        ProfileContext {
            profile_summary: self.profile_summary.clone(),
            desired_job_summary: self.desired_job_summary.clone(),
        }
    }
}

impl RawCriteria {
    fn into_unchecked(self) -> SearchCriteria {
        SearchCriteria {
            location: self.location.unwrap_or_default(),
            keyword: self.keyword,
            country: self.country,
            time_range: self.time_range,
            job_type: self.job_type,
            experience_level: self.experience_level,
            remote: self.remote,
            company: self.company,
            selective_search: self.selective_search.unwrap_or(false),
            jobs_to_not_include: self.jobs_to_not_include.unwrap_or_default(),
            location_radius: self.location_radius,
            profile_summary: self.profile_summary.unwrap_or_default(),
            desired_job_summary: self.desired_job_summary.unwrap_or_default(),
            extra: self.extra,
        }
    }

    /// 先区分"缺失"和"为空"，再交给 `SearchCriteria::validate`
    fn check_presence(&self) -> Result<(), ConfigError> {
        if self.location.is_none() {
            return Err(ConfigError::MissingField { field: "location" });
        }
        if self.profile_summary.is_none() {
            return Err(ConfigError::MissingField {
                field: "profile_summary",
            });
        }
        if self.desired_job_summary.is_none() {
            return Err(ConfigError::MissingField {
                field: "desired_job_summary",
            });
        }
        Ok(())
    }
}

/// 解析并校验配置文档，`path` 只用于错误信息
pub fn parse_criteria(content: &str, path: &Path) -> Result<SearchCriteria, ConfigError> {
    let raw: RawCriteria =
        serde_json::from_str(content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })?;
    raw.check_presence()?;

    let criteria = raw.into_unchecked();
    criteria.validate()?;
    Ok(criteria)
}
