use std::path::{Path, PathBuf};

use crate::error::{Result, SpiceError};
use crate::project::details::ProjectDetails;
use crate::project::paths::ProjectPaths;
use crate::scheduler::id::timestamp_now;
use crate::storage;
use crate::validation::check_identifier;

/// Upper bound on `<stem>_<n>` candidates tried by [`ProjectNamespace::create_unique`].
const MAX_UNIQUE_ATTEMPTS: usize = 10_000;

/// Creates, lists and removes project directories below one storage root.
///
/// The directory tree is the only record of a project: a project exists iff
/// `<root>/<user>/<project>` exists.
#[derive(Debug, Clone)]
pub struct ProjectNamespace {
    root: PathBuf,
}

impl ProjectNamespace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, user_id: &str, project_id: &str) -> ProjectPaths {
        ProjectPaths::resolve(&self.root, user_id, project_id)
    }

    pub fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join(user_id)
    }

    /// Create the full project skeleton and details record.
    ///
    /// An existing project directory is always a conflict, even if its tree
    /// is incomplete; nothing is touched in that case. If creation fails
    /// midway, the directory this call created is removed again.
    pub async fn create(&self, user_id: &str, project_id: &str) -> Result<ProjectPaths> {
        check_identifier("user id", user_id)?;
        check_identifier("project id", project_id)?;
        let paths = self.resolve(user_id, project_id);

        tokio::fs::create_dir_all(&paths.user_dir)
            .await
            .map_err(|e| SpiceError::io(&paths.user_dir, e))?;

        match tokio::fs::create_dir(&paths.project_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(SpiceError::AlreadyExists(format!(
                    "A project with id '{project_id}' already exists"
                )));
            }
            Err(e) => return Err(SpiceError::io(&paths.project_dir, e)),
        }

        if let Err(e) = Self::populate(&paths).await {
            tracing::warn!(
                project_id,
                error = %e,
                "Project creation failed, removing partial tree"
            );
            let _ = tokio::fs::remove_dir_all(&paths.project_dir).await;
            return Err(e);
        }

        tracing::info!(user_id, project_id, "Project created");
        Ok(paths)
    }

    async fn populate(paths: &ProjectPaths) -> Result<()> {
        // skeleton()[0] is the project dir itself
        for dir in paths.skeleton().into_iter().skip(1) {
            tokio::fs::create_dir(dir)
                .await
                .map_err(|e| SpiceError::io(dir, e))?;
        }
        let details = ProjectDetails::new(&paths.project_id, timestamp_now());
        storage::write_atomic(&paths.details_file, &paths.project_dir, &details.to_record()).await
    }

    /// Create a project, appending `_0`, `_1`, ... to the id stem (the part
    /// before the first `_`) until a free id is found. The id actually used
    /// is in the returned paths.
    pub async fn create_unique(&self, user_id: &str, project_id: &str) -> Result<ProjectPaths> {
        match self.create(user_id, project_id).await {
            Err(SpiceError::AlreadyExists(_)) => {}
            other => return other,
        }

        let stem = project_id.split('_').next().unwrap_or(project_id);
        for index in 0..MAX_UNIQUE_ATTEMPTS {
            let candidate = format!("{stem}_{index}");
            match self.create(user_id, &candidate).await {
                Err(SpiceError::AlreadyExists(_)) => continue,
                other => return other,
            }
        }
        Err(SpiceError::AlreadyExists(format!(
            "No free project id derived from '{project_id}'"
        )))
    }

    /// Remove a project recursively. Removing a missing project is a no-op.
    pub async fn delete(&self, user_id: &str, project_id: &str) -> Result<()> {
        check_identifier("user id", user_id)?;
        check_identifier("project id", project_id)?;
        let paths = self.resolve(user_id, project_id);

        match tokio::fs::remove_dir_all(&paths.project_dir).await {
            Ok(()) => {
                tracing::info!(user_id, project_id, "Project deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SpiceError::io(&paths.project_dir, e)),
        }
    }

    pub async fn exists(&self, user_id: &str, project_id: &str) -> Result<bool> {
        let dir = self.resolve(user_id, project_id).project_dir;
        tokio::fs::try_exists(&dir)
            .await
            .map_err(|e| SpiceError::io(&dir, e))
    }

    pub async fn details(&self, user_id: &str, project_id: &str) -> Result<ProjectDetails> {
        let paths = self.resolve(user_id, project_id);
        let content = tokio::fs::read_to_string(&paths.details_file)
            .await
            .map_err(|e| SpiceError::io(&paths.details_file, e))?;
        ProjectDetails::parse(&paths.details_file, &content)
    }

    /// All projects of a user, newest first (ties broken by id).
    ///
    /// Fails as a whole with `CorruptRecord` if any project directory has an
    /// unreadable details record. Projects deleted while the listing runs
    /// are left out.
    pub async fn list(&self, user_id: &str) -> Result<Vec<ProjectDetails>> {
        check_identifier("user id", user_id)?;
        let user_dir = self.user_dir(user_id);

        let dirs = match storage::list_dirs(&user_dir).await {
            Ok(dirs) => dirs,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut projects = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let details_file = dir.join(crate::project::paths::DETAILS_FILE);
            match storage::read_optional(&details_file).await? {
                Some(content) => projects.push(ProjectDetails::parse(&details_file, &content)?),
                None => {
                    if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
                        continue;
                    }
                    return Err(SpiceError::corrupt(
                        &details_file,
                        "project directory without details record",
                    ));
                }
            }
        }

        projects.sort_by(|a, b| {
            (&b.project_init, &b.project_id).cmp(&(&a.project_init, &a.project_id))
        });
        tracing::debug!(user_id, projects = projects.len(), "Listed projects");
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn create_builds_skeleton_and_details() {
        let dir = TempDir::new().unwrap();
        let ns = ProjectNamespace::new(dir.path());

        let paths = ns.create("alice", "kinases").await.unwrap();

        for d in paths.skeleton() {
            assert!(d.is_dir(), "{} missing", d.display());
        }
        let details = ns.details("alice", "kinases").await.unwrap();
        assert_eq!(details.project_id, "kinases");
        assert_eq!(details.project_init.len(), "20230101_000000_000".len());
    }

    #[tokio::test]
    async fn create_rejects_bad_ids() {
        let dir = TempDir::new().unwrap();
        let ns = ProjectNamespace::new(dir.path());
        assert!(matches!(
            ns.create("alice", "../escape").await,
            Err(SpiceError::InputValidation(_))
        ));
        assert!(!dir.path().join("alice").exists());
    }

    #[tokio::test]
    async fn delete_missing_is_noop() {
        let dir = TempDir::new().unwrap();
        let ns = ProjectNamespace::new(dir.path());
        ns.delete("alice", "nothing").await.unwrap();
    }

    #[tokio::test]
    async fn list_without_user_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let ns = ProjectNamespace::new(dir.path());
        assert!(ns.list("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn details_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let ns = ProjectNamespace::new(dir.path());
        assert!(ns.details("alice", "nope").await.unwrap_err().is_not_found());
    }
}
