//! 错误类型
//!
//! 每个流水线阶段一个错误枚举，`AppError` 统一包装并标注失败阶段。
//!
//! | 阶段 | 错误 | 处理策略 |
//! |------|------|----------|
//! | 配置 | `ConfigError` | 致命，不发起任何网络请求 |
//! | 职位发现 | `DiscoveryError` | 致命，不生成部分报告 |
//! | 评分 | `ScoringError` | 按批次重试，耗尽后丢弃该批次；所有批次都失败时致命 |
//! | 导出 | `ExportError` | 致命 |

use std::path::PathBuf;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("[配置阶段] {0}")]
    Config(#[from] ConfigError),

    #[error("[职位发现阶段] {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("[评分阶段] {0}")]
    Scoring(#[from] ScoringError),

    #[error("[导出阶段] {0}")]
    Export(#[from] ExportError),
}

impl AppError {
    /// 失败阶段的简短名称（用于日志字段）
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Discovery(_) => "discovery",
            AppError::Scoring(_) => "scoring",
            AppError::Export(_) => "export",
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件不存在
    #[error("配置文件不存在: {}", .path.display())]
    FileNotFound { path: PathBuf },

    /// 读取配置文件失败
    #[error("读取配置文件失败 ({}): {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON 反序列化失败
    #[error("配置文件解析失败 ({}): {source}", .path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// TOML 运行参数文件解析失败
    #[error("运行参数文件解析失败 ({}): {source}", .path.display())]
    SettingsParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// 必填字段缺失
    #[error("缺少必填字段: {field}")]
    MissingField { field: &'static str },

    /// 必填字段为空白
    #[error("必填字段不能为空: {field}")]
    BlankField { field: &'static str },

    /// 环境变量缺失
    #[error("缺少环境变量: {}（请在 .env 或环境中设置）", .vars.join(", "))]
    MissingEnvVars { vars: Vec<String> },

    /// 参数取值非法
    #[error("参数 {name} 取值非法: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// 职位发现错误
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// 创建 HTTP 客户端失败（TLS 后端初始化等）
    #[error("创建 HTTP 客户端失败: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },

    /// 网络请求失败（服务不可达、超时等）
    #[error("请求失败 ({endpoint}): {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// 服务返回非预期状态码
    #[error("服务返回错误状态 ({endpoint}): {status} - {body}")]
    BadStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// 触发任务后没有拿到 snapshot_id
    #[error("触发抓取任务后未返回 snapshot_id")]
    MissingSnapshotId,

    /// 抓取服务报告任务失败
    #[error("抓取任务失败 (snapshot: {snapshot_id}): {reason}")]
    ProviderFailed { snapshot_id: String, reason: String },

    /// 轮询超过截止时间
    #[error("抓取任务超时 (snapshot: {snapshot_id})，已等待 {elapsed_secs} 秒")]
    Timeout {
        snapshot_id: String,
        elapsed_secs: u64,
    },

    /// 返回内容结构不符合预期
    #[error("抓取结果格式错误: {reason}")]
    MalformedResponse { reason: String },

    /// 职位记录缺少必填字段
    #[error("第 {index} 条职位记录缺少字段: {field}")]
    MissingField { index: usize, field: &'static str },
}

/// 评分错误（以批次为单位）
#[derive(Debug, Error)]
pub enum ScoringError {
    /// 调用评分服务失败（网络、鉴权等）
    #[error("评分服务调用失败: {0}")]
    Service(String),

    /// 评分服务返回的文档不符合约定结构
    #[error("评分结果校验失败: {0}")]
    Validation(String),
}

impl ScoringError {
    pub fn service(message: impl Into<String>) -> Self {
        ScoringError::Service(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ScoringError::Validation(message.into())
    }
}

/// 报告导出错误
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("写入报告失败 ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV 写入失败 ({}): {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
