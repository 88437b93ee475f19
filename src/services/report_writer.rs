//! 报告写入服务 - 业务能力层
//!
//! 只负责"把排名报告写成 CSV"，不关心流程

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::ExportError;
use crate::models::RankedReport;

/// CSV 表头，空报告也会写出
pub const CSV_HEADER: [&str; 8] = [
    "job_posting_id",
    "url",
    "title",
    "company",
    "location",
    "posted_date",
    "score",
    "comment",
];

/// 报告写入服务
///
/// 每次运行覆盖写入同一个文件。
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写入报告，返回写入的数据行数
    pub fn write(&self, report: &RankedReport) -> Result<usize, ExportError> {
        debug!("写入 CSV: {}", self.path.display());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let csv_err = |source: csv::Error| ExportError::Csv {
            path: self.path.clone(),
            source,
        };

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)
            .map_err(csv_err)?;

        writer.write_record(CSV_HEADER).map_err(csv_err)?;

        for scored in report.iter() {
            let job = &scored.job;
            let score = scored.score.to_string();
            writer
                .write_record([
                    job.id.as_str(),
                    job.url.as_deref().unwrap_or(""),
                    job.title.as_str(),
                    job.company.as_deref().unwrap_or(""),
                    job.location.as_deref().unwrap_or(""),
                    job.posted_date.as_deref().unwrap_or(""),
                    score.as_str(),
                    scored.comment.as_str(),
                ])
                .map_err(csv_err)?;
        }

        writer.flush().map_err(|source| ExportError::Io {
            path: self.path.clone(),
            source,
        })?;

        info!("💾 已写入 {} 条结果到 {}", report.len(), self.path.display());
        Ok(report.len())
    }
}
