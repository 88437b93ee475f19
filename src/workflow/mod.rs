pub mod batch_ctx;
pub mod batch_flow;

pub use batch_ctx::BatchCtx;
pub use batch_flow::{BatchFlow, BatchOutcome, FailedBatch, RetryPolicy, ScoringRun};
