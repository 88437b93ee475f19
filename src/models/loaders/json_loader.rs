use crate::error::ConfigError;
use crate::models::search_criteria::{parse_criteria, SearchCriteria};
use std::path::Path;
use tokio::fs;

/// 从 JSON 文件加载搜索条件并校验
///
/// 任何错误都在发起网络请求之前返回。
pub async fn load_search_criteria(path: &Path) -> Result<SearchCriteria, ConfigError> {
    let content = fs::read_to_string(path).await.map_err(|source| {
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

    let criteria = parse_criteria(&content, path)?;

    tracing::info!(
        "✓ 已加载搜索条件: 关键词 {:?} | 地点 {} | 排除词 {} 个",
        criteria.keyword.as_deref().unwrap_or(""),
        criteria.location,
        criteria.jobs_to_not_include.len()
    );

    Ok(criteria)
}
