use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, SpiceError};
use crate::scheduler::id::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Running,
    Done,
    Error,
}

/// Order in which the status directories are scanned. A job caught in two
/// directories during a move resolves to the one scanned last.
pub const STATUS_SCAN_ORDER: [JobStatus; 4] = [
    JobStatus::Waiting,
    JobStatus::Running,
    JobStatus::Error,
    JobStatus::Done,
];

impl JobStatus {
    pub fn dir_name(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = SpiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "waiting" => Ok(JobStatus::Waiting),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "error" => Ok(JobStatus::Error),
            other => Err(SpiceError::InputValidation(format!(
                "Unknown job status: {other}"
            ))),
        }
    }
}

/// First line of a job descriptor: program followed by whitespace-separated
/// arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Flag followed by a single value.
    pub fn opt(self, flag: &str, value: impl std::fmt::Display) -> Self {
        self.arg(flag).arg(value.to_string())
    }

    /// Returns `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let program = tokens.next()?.to_string();
        Some(Self {
            program,
            args: tokens.map(str::to_string).collect(),
        })
    }

    /// Base name of the program without directory or extension, e.g.
    /// `/opt/spica/featext.py` -> `featext`.
    pub fn app_name(&self) -> &str {
        Path::new(&self.program)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.program)
    }

    /// Non-flag tokens following the first occurrence of `flag`.
    pub fn values_after(&self, flag: &str) -> Vec<&str> {
        match self.args.iter().position(|a| a == flag) {
            Some(pos) => self.args[pos + 1..]
                .iter()
                .take_while(|a| !a.starts_with('-'))
                .map(String::as_str)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn to_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// The three-line job file consumed by the external worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescriptor {
    pub command: CommandLine,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
}

impl JobDescriptor {
    pub fn new(
        command: CommandLine,
        stdout_path: impl Into<PathBuf>,
        stderr_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            command,
            stdout_path: stdout_path.into(),
            stderr_path: stderr_path.into(),
        }
    }

    pub fn to_file_content(&self) -> String {
        format!(
            "{}\n{}\n{}\n",
            self.command.to_line(),
            self.stdout_path.display(),
            self.stderr_path.display()
        )
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut lines = content.lines();
        let command = lines
            .next()
            .and_then(CommandLine::parse)
            .ok_or_else(|| SpiceError::corrupt(path, "missing command line"))?;
        let stdout_path = lines
            .next()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| SpiceError::corrupt(path, "missing stdout path"))?;
        let stderr_path = lines
            .next()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| SpiceError::corrupt(path, "missing stderr path"))?;
        Ok(Self::new(command, stdout_path.trim(), stderr_path.trim()))
    }
}

/// One descriptor found during a scan, with its status made explicit.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub path: PathBuf,
    pub status: JobStatus,
    pub command: CommandLine,
}

/// Snapshot of every parseable descriptor in a project, keyed by job id.
#[derive(Debug, Default, Clone)]
pub struct JobIndex {
    records: BTreeMap<JobId, JobRecord>,
}

impl JobIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; a record for the same id is replaced.
    pub fn insert(&mut self, record: JobRecord) {
        if let Some(prev) = self.records.insert(record.id.clone(), record) {
            tracing::debug!(job_id = %prev.id, status = %prev.status, "Job seen in two status directories");
        }
    }

    pub fn get(&self, id: &JobId) -> Option<&JobRecord> {
        self.records.get(id)
    }

    /// Records in ascending id order (oldest first).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &JobRecord> {
        self.records.values()
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &JobRecord> {
        self.records.values().rev()
    }

    pub fn for_app<'a>(&'a self, app: &'a str) -> impl Iterator<Item = &'a JobRecord> + 'a {
        self.newest_first()
            .filter(move |r| r.command.app_name() == app)
    }

    pub fn with_status(&self, status: JobStatus) -> impl Iterator<Item = &JobRecord> {
        self.newest_first().filter(move |r| r.status == status)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
