use std::path::PathBuf;

/// Names and fixed arguments shared with the external worker programs.
///
/// These values end up verbatim in job descriptor files, so they must match
/// what the worker installation expects.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Program name of the feature-extraction tool
    pub feature_program: String,
    /// Flag that introduces the feature-category list on the featext command line
    pub feature_flag: String,
    /// Program name of the classification tool
    pub classifier_program: String,
    /// Timeout passed to the classifier, in seconds
    pub classifier_timeout_secs: u64,
    /// Evaluation score used for two-class runs when none is given
    pub default_eval_score: String,
    /// Evaluation score forced for runs with more than two classes
    pub multiclass_eval_score: String,
    /// Feature-selection mode written when the caller specifies none
    pub no_feature_selection: String,
    /// Maximum accepted upload size in bytes (50MB)
    pub max_upload_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feature_program: "featext".to_string(),
            feature_flag: "--protein_features".to_string(),
            classifier_program: "classification".to_string(),
            classifier_timeout_secs: 20,
            default_eval_score: "roc_auc".to_string(),
            multiclass_eval_score: "f1".to_string(),
            no_feature_selection: "none".to_string(),
            max_upload_bytes: 52_430_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Root directory holding one subdirectory per user
    pub root_dir: PathBuf,
    pub pipeline: PipelineConfig,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("spice_data"),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl WorkspaceConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_classifier_timeout(mut self, secs: u64) -> Self {
        self.pipeline.classifier_timeout_secs = secs;
        self
    }

    pub fn with_feature_program(mut self, program: impl Into<String>) -> Self {
        self.pipeline.feature_program = program.into();
        self
    }

    pub fn with_classifier_program(mut self, program: impl Into<String>) -> Self {
        self.pipeline.classifier_program = program.into();
        self
    }
}
