pub mod feature_status;
pub mod id;
pub mod job;
pub mod queue;

pub use feature_status::FeatureStatusIndex;
pub use id::{JobId, JobIdGenerator};
pub use job::{CommandLine, JobDescriptor, JobIndex, JobRecord, JobStatus};
pub use queue::JobQueue;
