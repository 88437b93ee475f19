pub mod job;
pub mod loaders;
pub mod search_criteria;

pub use job::{JobPosting, RankedReport, RawJobRecord, ScoredJob};
pub use loaders::load_search_criteria;
pub use search_criteria::{ProfileContext, SearchCriteria};
