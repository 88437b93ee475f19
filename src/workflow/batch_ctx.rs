//! 批次上下文
//!
//! 封装"我正在给第几批评分"这一信息

use std::fmt::Display;

/// 批次处理上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCtx {
    /// 批次编号（从 1 开始）
    pub batch_num: usize,

    /// 批次总数
    pub total_batches: usize,

    /// 本批职位数量
    pub job_count: usize,
}

impl BatchCtx {
    pub fn new(batch_num: usize, total_batches: usize, job_count: usize) -> Self {
        Self {
            batch_num,
            total_batches,
            job_count,
        }
    }
}

impl Display for BatchCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[批次 {}/{} 职位数#{}]",
            self.batch_num, self.total_batches, self.job_count
        )
    }
}
