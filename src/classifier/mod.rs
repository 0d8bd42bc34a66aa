pub mod registry;
pub mod result;
pub mod settings;

pub use registry::{ClassifierRegistry, ClassifierRequest, ClassifierRun, ResultGroups};
pub use result::{ClassifierResult, ScoreSummary};
pub use settings::ClassifierSettings;
