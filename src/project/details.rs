use std::path::Path;

use serde::Serialize;

use crate::error::{Result, SpiceError};

/// Contents of `project_details.txt`.
///
/// On disk the record is two tab-separated lines:
///
/// ```text
/// project_id\t<id>
/// project_init\t<YYYYMMDD_HHMMSS_mmm>
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ProjectDetails {
    pub project_id: String,
    pub project_init: String,
}

impl ProjectDetails {
    pub fn new(project_id: impl Into<String>, project_init: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            project_init: project_init.into(),
        }
    }

    pub fn to_record(&self) -> String {
        format!(
            "project_id\t{}\nproject_init\t{}\n",
            self.project_id, self.project_init
        )
    }

    /// Parse the first two lines of a details record. `path` is only used for
    /// error reporting.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut lines = content.lines();
        let project_id = field(path, lines.next(), "project_id")?;
        let project_init = field(path, lines.next(), "project_init")?;
        Ok(Self {
            project_id,
            project_init,
        })
    }
}

fn field(path: &Path, line: Option<&str>, key: &str) -> Result<String> {
    let line = line.ok_or_else(|| SpiceError::corrupt(path, format!("missing {key} line")))?;
    let mut tokens = line.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(k), Some(value)) if k == key => Ok(value.to_string()),
        _ => Err(SpiceError::corrupt(
            path,
            format!("expected '{key}<TAB><value>', got '{line}'"),
        )),
    }
}
