//! 运行参数
//!
//! 加载顺序：默认值 → TOML 参数文件（可选）→ 环境变量 → 命令行参数。
//! 两个密钥只从环境变量读取，且不会出现在 `Debug` 输出中。

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 抓取服务密钥的环境变量名
pub const BRIGHT_DATA_API_KEY_VAR: &str = "BRIGHT_DATA_API_KEY";
/// 评分服务密钥的环境变量名
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// 程序配置
#[derive(Clone)]
pub struct Config {
    /// 搜索条件 JSON 文件
    pub config_file: PathBuf,
    /// 输出 CSV 文件
    pub output_csv: PathBuf,
    /// 最多抓取的职位数量
    pub jobs_number: usize,
    /// 每批评分的职位数量
    pub batch_size: usize,
    /// 同时评分的批次数量
    pub max_concurrent_batches: usize,
    // --- 抓取服务 ---
    pub brightdata_api_key: String,
    pub brightdata_base_url: String,
    pub poll_interval: Duration,
    pub poll_max_interval: Duration,
    pub poll_deadline: Duration,
    pub request_timeout: Duration,
    // --- 评分服务 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 是否要求模型按 JSON Schema 输出（不支持的兼容服务需关闭）
    pub structured_output: bool,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    // --- 文本长度限制 ---
    pub description_max_chars: usize,
    pub comment_max_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("config.json"),
            output_csv: PathBuf::from("jobs_scored.csv"),
            jobs_number: 20,
            batch_size: 5,
            max_concurrent_batches: 1,
            brightdata_api_key: String::new(),
            brightdata_base_url: "https://api.brightdata.com".to_string(),
            poll_interval: Duration::from_secs(10),
            poll_max_interval: Duration::from_secs(30),
            poll_deadline: Duration::from_secs(15 * 60),
            request_timeout: Duration::from_secs(60),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-5-mini".to_string(),
            structured_output: true,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(8),
            description_max_chars: 2000,
            comment_max_chars: 400,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("config_file", &self.config_file)
            .field("output_csv", &self.output_csv)
            .field("jobs_number", &self.jobs_number)
            .field("batch_size", &self.batch_size)
            .field("max_concurrent_batches", &self.max_concurrent_batches)
            .field("brightdata_api_key", &"<redacted>")
            .field("brightdata_base_url", &self.brightdata_base_url)
            .field("poll_interval", &self.poll_interval)
            .field("poll_max_interval", &self.poll_max_interval)
            .field("poll_deadline", &self.poll_deadline)
            .field("llm_api_key", &"<redacted>")
            .field("llm_api_base_url", &self.llm_api_base_url)
            .field("llm_model_name", &self.llm_model_name)
            .field("structured_output", &self.structured_output)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// TOML 参数文件内容，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub jobs_number: Option<usize>,
    pub batch_size: Option<usize>,
    pub max_concurrent_batches: Option<usize>,
    pub brightdata_base_url: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub poll_max_interval_secs: Option<u64>,
    pub poll_deadline_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub llm_api_base_url: Option<String>,
    pub llm_model_name: Option<String>,
    pub structured_output: Option<bool>,
    pub max_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
    pub description_max_chars: Option<usize>,
    pub comment_max_chars: Option<usize>,
}

impl Settings {
    /// 从 TOML 文件读取
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::ReadFailed {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::SettingsParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Config {
    /// 加载完整配置（不含命令行参数）
    pub fn load(settings_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = settings_file {
            config.apply_settings(Settings::from_file(path)?);
        }
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// 合并 TOML 参数文件
    pub fn apply_settings(&mut self, settings: Settings) {
        if let Some(v) = settings.jobs_number {
            self.jobs_number = v;
        }
        if let Some(v) = settings.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = settings.max_concurrent_batches {
            self.max_concurrent_batches = v;
        }
        if let Some(v) = settings.brightdata_base_url {
            self.brightdata_base_url = v;
        }
        if let Some(v) = settings.poll_interval_secs {
            self.poll_interval = Duration::from_secs(v);
        }
        if let Some(v) = settings.poll_max_interval_secs {
            self.poll_max_interval = Duration::from_secs(v);
        }
        if let Some(v) = settings.poll_deadline_secs {
            self.poll_deadline = Duration::from_secs(v);
        }
        if let Some(v) = settings.request_timeout_secs {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = settings.llm_api_base_url {
            self.llm_api_base_url = v;
        }
        if let Some(v) = settings.llm_model_name {
            self.llm_model_name = v;
        }
        if let Some(v) = settings.structured_output {
            self.structured_output = v;
        }
        if let Some(v) = settings.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = settings.retry_base_delay_ms {
            self.retry_base_delay = Duration::from_millis(v);
        }
        if let Some(v) = settings.retry_max_delay_ms {
            self.retry_max_delay = Duration::from_millis(v);
        }
        if let Some(v) = settings.description_max_chars {
            self.description_max_chars = v;
        }
        if let Some(v) = settings.comment_max_chars {
            self.comment_max_chars = v;
        }
    }

    /// 合并环境变量
    ///
    /// `lookup` 通常是 `std::env::var`，测试里可以换成固定表。
    /// 两个密钥缺一不可，缺失时一次性列出所有缺少的变量名。
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        match non_empty(OPENAI_API_KEY_VAR) {
            Some(key) => self.llm_api_key = key,
            None => missing.push(OPENAI_API_KEY_VAR.to_string()),
        }
        match non_empty(BRIGHT_DATA_API_KEY_VAR) {
            Some(key) => self.brightdata_api_key = key,
            None => missing.push(BRIGHT_DATA_API_KEY_VAR.to_string()),
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnvVars { vars: missing });
        }

        if let Some(v) = non_empty("BRIGHT_DATA_BASE_URL") {
            self.brightdata_base_url = v;
        }
        if let Some(v) = non_empty("OPENAI_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Some(v) = non_empty("OPENAI_MODEL") {
            self.llm_model_name = v;
        }
        if let Some(v) = non_empty("MAX_CONCURRENT_BATCHES") {
            self.max_concurrent_batches =
                v.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        name: "MAX_CONCURRENT_BATCHES".to_string(),
                        reason: format!("'{}' 不是正整数", v),
                    })?;
        }

        Ok(())
    }

    /// 校验数值参数
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("jobs_number", self.jobs_number),
            ("batch_size", self.batch_size),
            ("max_concurrent_batches", self.max_concurrent_batches),
            ("max_attempts", self.max_attempts as usize),
            ("description_max_chars", self.description_max_chars),
            ("comment_max_chars", self.comment_max_chars),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    reason: "必须大于 0".to_string(),
                });
            }
        }

        if self.poll_max_interval < self.poll_interval {
            return Err(ConfigError::InvalidValue {
                name: "poll_max_interval".to_string(),
                reason: "不能小于 poll_interval".to_string(),
            });
        }

        Ok(())
    }
}
