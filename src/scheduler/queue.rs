use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::{Result, SpiceError};
use crate::project::ProjectPaths;
use crate::scheduler::feature_status::FeatureStatusIndex;
use crate::scheduler::id::{JobId, JobIdGenerator};
use crate::scheduler::job::{
    CommandLine, JobDescriptor, JobIndex, JobRecord, JobStatus, STATUS_SCAN_ORDER,
};
use crate::storage;

/// Directory-backed job queue of one project.
///
/// Enqueueing drops a descriptor into `jobs/waiting`; the external worker
/// moves it through `running` into `done` or `error`. This type never moves
/// descriptors, it only observes where they are.
#[derive(Debug, Clone)]
pub struct JobQueue {
    paths: ProjectPaths,
    ids: Arc<JobIdGenerator>,
    pipeline: Arc<PipelineConfig>,
}

impl JobQueue {
    pub fn new(paths: ProjectPaths, ids: Arc<JobIdGenerator>, pipeline: Arc<PipelineConfig>) -> Self {
        Self {
            paths,
            ids,
            pipeline,
        }
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn new_job_id(&self) -> JobId {
        self.ids.next_id()
    }

    /// Write a descriptor for a fresh job id into the waiting directory.
    pub async fn enqueue(
        &self,
        command: CommandLine,
        stdout_path: impl Into<PathBuf>,
        stderr_path: impl Into<PathBuf>,
    ) -> Result<JobId> {
        let id = self.new_job_id();
        let descriptor = JobDescriptor::new(command, stdout_path, stderr_path);
        self.enqueue_as(&id, &descriptor).await?;
        Ok(id)
    }

    /// Write a descriptor under an id the caller already allocated.
    ///
    /// The file is staged in `jobs/` and linked into `jobs/waiting`, so the
    /// worker sees either nothing or the complete descriptor, and a
    /// descriptor another process wrote under the same id is never replaced.
    pub async fn enqueue_as(&self, id: &JobId, descriptor: &JobDescriptor) -> Result<PathBuf> {
        if let Some(status) = self.job_status(id).await? {
            return Err(SpiceError::AlreadyExists(format!(
                "job {} ({})",
                id, status
            )));
        }

        let target = self.paths.waiting_dir.join(id.as_str());
        storage::write_atomic_new(&target, &self.paths.jobs_dir, &descriptor.to_file_content())
            .await
            .map_err(|e| match e {
                SpiceError::AlreadyExists(_) => {
                    SpiceError::AlreadyExists(format!("job {} ({})", id, JobStatus::Waiting))
                }
                other => other,
            })?;

        tracing::info!(
            job_id = %id,
            project_id = %self.paths.project_id,
            program = %descriptor.command.program,
            "Job enqueued"
        );
        Ok(target)
    }

    /// Queue a feature-extraction run for the given categories.
    pub async fn enqueue_feature_extraction(&self, categories: &[String]) -> Result<JobId> {
        if categories.is_empty() {
            return Err(SpiceError::InputValidation(
                "No feature categories selected".to_string(),
            ));
        }
        if let Some(bad) = categories
            .iter()
            .find(|c| c.is_empty() || c.starts_with('-') || c.contains(char::is_whitespace))
        {
            return Err(SpiceError::InputValidation(format!(
                "Invalid feature category: '{bad}'"
            )));
        }

        let command = CommandLine::new(&self.pipeline.feature_program)
            .opt("-r", self.paths.feature_dir.display())
            .arg(&self.pipeline.feature_flag)
            .args(categories.iter().cloned());

        self.enqueue(
            command,
            self.paths.feature_log_file.clone(),
            self.paths.feature_error_file.clone(),
        )
        .await
    }

    /// Read every descriptor in the four status directories.
    ///
    /// Best effort: a missing status directory, a file that disappears while
    /// the worker moves it, or an unparseable descriptor is skipped.
    pub async fn scan(&self) -> JobIndex {
        let mut index = JobIndex::new();

        for status in STATUS_SCAN_ORDER {
            let dir = self.paths.status_dir(status);
            let entries = match storage::list_entries(dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Skipping status directory");
                    continue;
                }
            };

            for (path, is_dir) in entries {
                if is_dir {
                    continue;
                }
                let content = match storage::read_optional(&path).await {
                    Ok(Some(content)) => content,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable job file");
                        continue;
                    }
                };
                let Some(command) = content.lines().next().and_then(CommandLine::parse) else {
                    tracing::debug!(path = %path.display(), "Skipping job file without command");
                    continue;
                };
                index.insert(JobRecord {
                    id: JobId::new(storage::file_name(&path)),
                    path,
                    status,
                    command,
                });
            }
        }

        tracing::debug!(
            project_id = %self.paths.project_id,
            jobs = index.len(),
            "Scanned job directories"
        );
        index
    }

    /// Jobs run by `app`, newest first.
    pub async fn list_jobs(&self, app: &str) -> Vec<JobRecord> {
        self.scan().await.for_app(app).cloned().collect()
    }

    /// Current status of one job, `None` if no status directory holds it.
    pub async fn job_status(&self, id: &JobId) -> Result<Option<JobStatus>> {
        let mut found = None;
        for status in STATUS_SCAN_ORDER {
            let path = self.paths.status_dir(status).join(id.as_str());
            if tokio::fs::try_exists(&path)
                .await
                .map_err(|e| SpiceError::io(&path, e))?
            {
                found = Some(status);
            }
        }
        Ok(found)
    }

    /// Full descriptor and status of one job.
    ///
    /// Directories are visited in the order the worker moves descriptors, so
    /// a job moving during the lookup is still found; the last hit wins.
    pub async fn get_job(&self, id: &JobId) -> Result<(JobStatus, JobDescriptor)> {
        let mut found = None;
        for status in STATUS_SCAN_ORDER {
            let path = self.paths.status_dir(status).join(id.as_str());
            if let Some(content) = storage::read_optional(&path).await? {
                found = Some((status, path, content));
            }
        }
        let (status, path, content) =
            found.ok_or_else(|| SpiceError::NotFound(format!("job {id}")))?;
        Ok((status, JobDescriptor::parse(&path, &content)?))
    }

    pub async fn feature_category_status(&self) -> FeatureStatusIndex {
        let index = self.scan().await;
        FeatureStatusIndex::from_index(
            &index,
            &self.pipeline.feature_program,
            &self.pipeline.feature_flag,
        )
    }
}
