use std::path::{Path, PathBuf};

use crate::scheduler::JobStatus;

pub const DETAILS_FILE: &str = "project_details.txt";

/// Every fixed location inside one project directory.
///
/// Resolving is a pure function of the storage root and the two ids; nothing
/// here touches the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub user_id: String,
    pub project_id: String,
    pub user_dir: PathBuf,
    pub project_dir: PathBuf,
    pub details_file: PathBuf,

    // Input data files
    pub object_ids_file: PathBuf,
    pub labels_file: PathBuf,
    pub protein_seqs_file: PathBuf,
    pub orf_seqs_file: PathBuf,
    pub sec_struct_file: PathBuf,
    pub solv_access_file: PathBuf,

    // Feature extraction
    pub feature_dir: PathBuf,
    pub feature_matrix_dir: PathBuf,
    pub feature_matrix_file: PathBuf,
    pub feature_ids_file: PathBuf,
    pub histogram_dir: PathBuf,
    pub feature_log_file: PathBuf,
    pub feature_error_file: PathBuf,

    pub classification_dir: PathBuf,

    pub jobs_dir: PathBuf,
    pub waiting_dir: PathBuf,
    pub running_dir: PathBuf,
    pub done_dir: PathBuf,
    pub error_dir: PathBuf,
}

impl ProjectPaths {
    pub fn resolve(root: &Path, user_id: &str, project_id: &str) -> Self {
        let user_dir = root.join(user_id);
        let project_dir = user_dir.join(project_id);
        let feature_dir = project_dir.join("feature_extraction");
        let feature_matrix_dir = feature_dir.join("feature_matrix_protein");
        let jobs_dir = project_dir.join("jobs");

        Self {
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            details_file: project_dir.join(DETAILS_FILE),
            object_ids_file: project_dir.join("ids.txt"),
            labels_file: project_dir.join("labels.txt"),
            protein_seqs_file: project_dir.join("proteins.fsa"),
            orf_seqs_file: project_dir.join("orfs.fsa"),
            sec_struct_file: project_dir.join("sec_struct.fsa"),
            solv_access_file: project_dir.join("solv_access.fsa"),
            feature_matrix_file: feature_matrix_dir.join("feat.mat"),
            feature_ids_file: feature_dir.join("feat_ids.txt"),
            histogram_dir: feature_dir.join("histograms"),
            feature_log_file: feature_dir.join("log.txt"),
            feature_error_file: feature_dir.join("error.txt"),
            classification_dir: project_dir.join("classification"),
            waiting_dir: jobs_dir.join("waiting"),
            running_dir: jobs_dir.join("running"),
            done_dir: jobs_dir.join("done"),
            error_dir: jobs_dir.join("error"),
            feature_matrix_dir,
            feature_dir,
            jobs_dir,
            project_dir,
            user_dir,
        }
    }

    pub fn status_dir(&self, status: JobStatus) -> &Path {
        match status {
            JobStatus::Waiting => &self.waiting_dir,
            JobStatus::Running => &self.running_dir,
            JobStatus::Done => &self.done_dir,
            JobStatus::Error => &self.error_dir,
        }
    }

    /// Output directory of one classifier run.
    pub fn classifier_dir(&self, classifier_id: &str) -> PathBuf {
        self.classification_dir.join(classifier_id)
    }

    /// Directories that make up a fresh project skeleton, parents first.
    pub fn skeleton(&self) -> Vec<&Path> {
        vec![
            &self.project_dir,
            &self.jobs_dir,
            &self.waiting_dir,
            &self.running_dir,
            &self.done_dir,
            &self.error_dir,
            &self.classification_dir,
            &self.feature_dir,
        ]
    }
}
