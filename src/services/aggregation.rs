//! 结果汇总 - 业务能力层
//!
//! 把各批次的评分结果合并成一份排名报告：按 id 去重、按分数排序。

use std::collections::HashMap;

use tracing::debug;

use crate::models::{RankedReport, ScoredJob};

/// 合并所有批次的评分结果
///
/// - 同一 id 出现多次时保留分数更高的一条；同分保留发现顺序更靠前的，再相同则保留先出现的
/// - 按分数降序排列，同分按发现顺序升序
///
/// 对输出再次调用结果不变。
pub fn aggregate<I>(batches: I) -> RankedReport
where
    I: IntoIterator<Item = Vec<ScoredJob>>,
{
    let mut jobs: Vec<ScoredJob> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for scored in batches.into_iter().flatten() {
        match position.get(scored.id()) {
            Some(&idx) => {
                let kept = &jobs[idx];
                let replaces = scored.score > kept.score
                    || (scored.score == kept.score
                        && scored.job.discovery_index < kept.job.discovery_index);
                if replaces {
                    debug!(
                        "职位 {} 重复出现，保留 {} 分的结果（原 {} 分）",
                        scored.id(),
                        scored.score,
                        kept.score
                    );
                    jobs[idx] = scored;
                }
            }
            None => {
                position.insert(scored.id().to_string(), jobs.len());
                jobs.push(scored);
            }
        }
    }

    // 稳定排序
    jobs.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.job.discovery_index.cmp(&b.job.discovery_index))
    });

    RankedReport { jobs }
}
