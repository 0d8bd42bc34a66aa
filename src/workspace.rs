use std::path::Path;
use std::sync::Arc;

use crate::classifier::ClassifierRegistry;
use crate::config::{PipelineConfig, WorkspaceConfig};
use crate::error::{Result, SpiceError};
use crate::project::{ProjectDetails, ProjectNamespace, ProjectPaths};
use crate::scheduler::{FeatureStatusIndex, JobIdGenerator, JobQueue};
use crate::validation::check_identifier;

/// Entry point that wires the components for one storage root.
///
/// Every per-project operation goes through a [`ProjectHandle`] obtained
/// from [`Workspace::project`] or [`Workspace::open`]; there is no implicit
/// "current project".
pub struct Workspace {
    pub config: WorkspaceConfig,
    namespace: ProjectNamespace,
    pipeline: Arc<PipelineConfig>,
    ids: Arc<JobIdGenerator>,
}

impl Workspace {
    /// The storage root is made absolute here because descriptor files carry
    /// absolute output paths for the worker.
    pub fn new(mut config: WorkspaceConfig) -> Result<Self> {
        config.root_dir = std::path::absolute(&config.root_dir)
            .map_err(|e| SpiceError::io(&config.root_dir, e))?;

        tracing::debug!(root = %config.root_dir.display(), "Workspace opened");

        Ok(Self {
            namespace: ProjectNamespace::new(config.root_dir.clone()),
            pipeline: Arc::new(config.pipeline.clone()),
            ids: Arc::new(JobIdGenerator::new()),
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.config.root_dir
    }

    pub fn namespace(&self) -> &ProjectNamespace {
        &self.namespace
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Handle for a project without checking that it exists.
    pub fn project(&self, user_id: &str, project_id: &str) -> Result<ProjectHandle> {
        check_identifier("user id", user_id)?;
        check_identifier("project id", project_id)?;
        Ok(self.handle(self.namespace.resolve(user_id, project_id)))
    }

    /// Handle for an existing project; `NotFound` otherwise.
    pub async fn open(&self, user_id: &str, project_id: &str) -> Result<ProjectHandle> {
        let handle = self.project(user_id, project_id)?;
        if !self.namespace.exists(user_id, project_id).await? {
            return Err(SpiceError::NotFound(format!("project {project_id}")));
        }
        Ok(handle)
    }

    pub async fn create_project(&self, user_id: &str, project_id: &str) -> Result<ProjectHandle> {
        let paths = self.namespace.create(user_id, project_id).await?;
        Ok(self.handle(paths))
    }

    pub async fn create_project_unique(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<ProjectHandle> {
        let paths = self.namespace.create_unique(user_id, project_id).await?;
        Ok(self.handle(paths))
    }

    pub async fn delete_project(&self, user_id: &str, project_id: &str) -> Result<()> {
        self.namespace.delete(user_id, project_id).await
    }

    pub async fn list_projects(&self, user_id: &str) -> Result<Vec<ProjectDetails>> {
        self.namespace.list(user_id).await
    }

    fn handle(&self, paths: ProjectPaths) -> ProjectHandle {
        let jobs = JobQueue::new(paths.clone(), self.ids.clone(), self.pipeline.clone());
        let classifiers = ClassifierRegistry::new(jobs.clone(), self.pipeline.clone());
        ProjectHandle {
            paths,
            jobs,
            classifiers,
        }
    }
}

/// Resolved project with its job queue and classifier registry.
#[derive(Debug, Clone)]
pub struct ProjectHandle {
    paths: ProjectPaths,
    jobs: JobQueue,
    classifiers: ClassifierRegistry,
}

impl ProjectHandle {
    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn id(&self) -> &str {
        &self.paths.project_id
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    pub fn classifiers(&self) -> &ClassifierRegistry {
        &self.classifiers
    }

    pub async fn feature_status(&self) -> FeatureStatusIndex {
        self.jobs.feature_category_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn root_is_made_absolute() {
        let ws = Workspace::new(WorkspaceConfig::new("relative/root")).unwrap();
        assert!(ws.root().is_absolute());
        assert!(ws.root().ends_with("relative/root"));
    }

    #[test]
    fn project_rejects_bad_ids() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(WorkspaceConfig::new(dir.path())).unwrap();
        assert!(ws.project("u", "a/b").is_err());
        assert!(ws.project("", "p").is_err());
        assert_eq!(ws.project("u", "p").unwrap().id(), "p");
    }

    #[tokio::test]
    async fn open_requires_existing_project() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(WorkspaceConfig::new(dir.path())).unwrap();
        assert!(ws.open("u", "p").await.unwrap_err().is_not_found());

        ws.create_project("u", "p").await.unwrap();
        assert_eq!(ws.open("u", "p").await.unwrap().id(), "p");
    }
}
