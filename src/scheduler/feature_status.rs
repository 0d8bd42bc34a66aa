use std::collections::BTreeMap;

use serde::Serialize;

use crate::scheduler::job::{CommandLine, JobIndex, JobStatus};

/// Which feature categories are waiting, running, done or failed.
///
/// Built from a [`JobIndex`]: every feature-extraction descriptor lists its
/// categories after the category flag. Descriptors are applied oldest job
/// first, so each category reports the status of the most recent job that
/// requested it.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct FeatureStatusIndex {
    categories: BTreeMap<String, JobStatus>,
}

impl FeatureStatusIndex {
    /// `feature_program` may be a bare name or a path; jobs are matched on
    /// the program's base name either way.
    pub fn from_index(index: &JobIndex, feature_program: &str, category_flag: &str) -> Self {
        let program = CommandLine::new(feature_program);
        let app = program.app_name();
        let mut categories = BTreeMap::new();
        for record in index.iter() {
            if record.command.app_name() != app {
                continue;
            }
            for category in record.command.values_after(category_flag) {
                categories.insert(category.to_string(), record.status);
            }
        }
        Self { categories }
    }

    pub fn status(&self, category: &str) -> Option<JobStatus> {
        self.categories.get(category).copied()
    }

    pub fn categories_with(&self, status: JobStatus) -> Vec<&str> {
        self.categories
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(c, _)| c.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, JobStatus)> {
        self.categories.iter().map(|(c, s)| (c.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
