pub mod aggregation;
pub mod discovery_service;
pub mod llm_service;
pub mod report_writer;
pub mod scoring_service;

pub use aggregation::aggregate;
pub use discovery_service::{normalize_records, DiscoveryService, PollPolicy};
pub use llm_service::{CompletionBackend, LlmService};
pub use report_writer::ReportWriter;
pub use scoring_service::{clamp_score, scores_json_schema, ScoringService, SCORES_SCHEMA_NAME};
