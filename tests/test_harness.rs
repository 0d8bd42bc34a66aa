//! Test harness for workspace integration tests.
//!
//! Provides a throwaway storage root and helpers that play the part of the
//! external worker: moving descriptors between status directories and
//! writing classifier output files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use spice_lite::config::WorkspaceConfig;
use spice_lite::project::ProjectPaths;
use spice_lite::scheduler::{JobId, JobStatus};
use spice_lite::{ProjectHandle, Workspace};

pub const USER: &str = "alice";

/// Workspace rooted in a temporary directory that is removed on drop
pub struct TestWorkspace {
    pub dir: TempDir,
    pub ws: Workspace,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let ws = Workspace::new(WorkspaceConfig::new(dir.path())).expect("Failed to open workspace");
        Self { dir, ws }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create a project for the default test user
    pub async fn project(&self, project_id: &str) -> ProjectHandle {
        self.ws
            .create_project(USER, project_id)
            .await
            .expect("Failed to create project")
    }
}

/// Move a job descriptor the way the worker does, by renaming it.
pub fn move_job(paths: &ProjectPaths, id: &JobId, from: JobStatus, to: JobStatus) {
    std::fs::rename(
        paths.status_dir(from).join(id.as_str()),
        paths.status_dir(to).join(id.as_str()),
    )
    .expect("Failed to move job descriptor");
}

/// Place a descriptor with a chosen id directly in a status directory.
pub fn place_job(paths: &ProjectPaths, status: JobStatus, id: &str, command: &str) -> JobId {
    std::fs::write(
        paths.status_dir(status).join(id),
        format!("{}\n/tmp/out\n/tmp/err\n", command),
    )
    .expect("Failed to write job descriptor");
    JobId::new(id)
}

/// Settings record as written by the classification worker.
pub fn settings_record(classifier: &str, target_names: &[&str]) -> String {
    let names: Vec<String> = target_names.iter().map(|n| format!("\"{}\"", n)).collect();
    format!(
        "classifier,n_fold_cv,target_names\n\"{}\"\n5\n[{}]\n",
        classifier,
        names.join(", ")
    )
}

/// Write the nested result directory of a classifier run.
pub fn write_classifier_output(
    paths: &ProjectPaths,
    classifier_id: &str,
    settings: &str,
    result: &str,
) -> PathBuf {
    let dir = paths
        .classifier_dir(classifier_id)
        .join("labeling")
        .join("run");
    std::fs::create_dir_all(&dir).expect("Failed to create result dir");
    std::fs::write(dir.join("settings.txt"), settings).expect("Failed to write settings");
    std::fs::write(dir.join("result.txt"), result).expect("Failed to write result");
    dir
}
