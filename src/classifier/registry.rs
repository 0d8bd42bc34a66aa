use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::classifier::result::ClassifierResult;
use crate::classifier::settings::ClassifierSettings;
use crate::config::PipelineConfig;
use crate::error::{Result, SpiceError};
use crate::project::ProjectPaths;
use crate::scheduler::{CommandLine, JobDescriptor, JobId, JobQueue};
use crate::storage;

pub const PROGRESS_FILE: &str = "progress.txt";
pub const ERROR_FILE: &str = "error.txt";
pub const RESULT_FILE: &str = "result.txt";
pub const SETTINGS_FILE: &str = "settings.txt";
pub const ROC_FILE: &str = "roc.png";
pub const PREDICTIONS_FILE: &str = "predictions.txt";

/// Parameters of one classifier training run.
#[derive(Debug, Clone)]
pub struct ClassifierRequest {
    pub classifier: String,
    pub n_fold_cv: u32,
    pub labeling_name: String,
    pub class_ids: Vec<String>,
    pub feature_ids: Vec<String>,
    pub eval_score: Option<String>,
    pub feature_selection: Option<String>,
}

impl ClassifierRequest {
    pub fn new(classifier: impl Into<String>, n_fold_cv: u32, labeling_name: impl Into<String>) -> Self {
        Self {
            classifier: classifier.into(),
            n_fold_cv,
            labeling_name: labeling_name.into(),
            class_ids: Vec::new(),
            feature_ids: Vec::new(),
            eval_score: None,
            feature_selection: None,
        }
    }

    pub fn with_classes<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_features<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_eval_score(mut self, score: impl Into<String>) -> Self {
        self.eval_score = Some(score.into());
        self
    }

    pub fn with_feature_selection(mut self, mode: impl Into<String>) -> Self {
        self.feature_selection = Some(mode.into());
        self
    }

    fn validate(&self) -> Result<()> {
        let single_tokens = [
            ("classifier", self.classifier.as_str()),
            ("labeling name", self.labeling_name.as_str()),
        ];
        let optional_tokens = [
            ("eval score", self.eval_score.as_deref()),
            ("feature selection", self.feature_selection.as_deref()),
        ];
        let present = optional_tokens
            .into_iter()
            .filter_map(|(what, value)| value.map(|v| (what, v)));
        for (what, value) in single_tokens.into_iter().chain(present) {
            if !is_token(value) {
                return Err(SpiceError::InputValidation(format!("Invalid {what}: '{value}'")));
            }
        }
        if self.n_fold_cv < 2 {
            return Err(SpiceError::InputValidation(
                "Cross-validation needs at least 2 folds".to_string(),
            ));
        }
        if self.class_ids.is_empty() {
            return Err(SpiceError::InputValidation("No classes selected".to_string()));
        }
        if self.feature_ids.is_empty() {
            return Err(SpiceError::InputValidation("No features selected".to_string()));
        }
        if let Some(bad) = self
            .class_ids
            .iter()
            .chain(&self.feature_ids)
            .find(|id| !is_token(id))
        {
            return Err(SpiceError::InputValidation(format!("Invalid id: '{bad}'")));
        }
        Ok(())
    }
}

/// Values end up as single tokens on the worker command line.
fn is_token(value: &str) -> bool {
    !value.is_empty() && !value.starts_with('-') && !value.contains(char::is_whitespace)
}

/// Settings and scores of one finished classifier run.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierRun {
    pub settings: ClassifierSettings,
    pub result: ClassifierResult,
}

/// Finished runs grouped by their sorted target class names, then by
/// classifier id.
pub type ResultGroups = BTreeMap<Vec<String>, BTreeMap<String, ClassifierRun>>;

/// Classifier output directories of one project.
///
/// Each run owns `classification/<id>/`, where the worker writes
/// `progress.txt` and `error.txt` and creates exactly one nested directory
/// pair holding `result.txt`, `settings.txt`, `roc.png` and
/// `predictions.txt`.
#[derive(Debug, Clone)]
pub struct ClassifierRegistry {
    paths: ProjectPaths,
    queue: JobQueue,
    pipeline: Arc<PipelineConfig>,
}

impl ClassifierRegistry {
    pub fn new(queue: JobQueue, pipeline: Arc<PipelineConfig>) -> Self {
        Self {
            paths: queue.paths().clone(),
            queue,
            pipeline,
        }
    }

    /// Create the output directory for a new run and enqueue its job.
    /// The classifier id is the job id.
    pub async fn start_run(&self, request: &ClassifierRequest) -> Result<JobId> {
        request.validate()?;

        let id = self.queue.new_job_id();
        let out_dir = self.paths.classifier_dir(id.as_str());
        match tokio::fs::create_dir(&out_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(SpiceError::AlreadyExists(format!("classifier {id}")));
            }
            Err(e) => return Err(SpiceError::io(&out_dir, e)),
        }

        let descriptor = JobDescriptor::new(
            self.command_for(request, &out_dir),
            out_dir.join(PROGRESS_FILE),
            out_dir.join(ERROR_FILE),
        );
        if let Err(e) = self.queue.enqueue_as(&id, &descriptor).await {
            let _ = tokio::fs::remove_dir(&out_dir).await;
            return Err(e);
        }

        tracing::info!(
            classifier_id = %id,
            classifier = %request.classifier,
            classes = request.class_ids.len(),
            features = request.feature_ids.len(),
            "Classifier run queued"
        );
        Ok(id)
    }

    fn command_for(&self, request: &ClassifierRequest, out_dir: &Path) -> CommandLine {
        let eval_score = if request.class_ids.len() > 2 {
            self.pipeline.multiclass_eval_score.clone()
        } else {
            request
                .eval_score
                .clone()
                .unwrap_or_else(|| self.pipeline.default_eval_score.clone())
        };
        let feature_selection = request
            .feature_selection
            .clone()
            .unwrap_or_else(|| self.pipeline.no_feature_selection.clone());

        CommandLine::new(&self.pipeline.classifier_program)
            .opt("-f", self.paths.feature_matrix_dir.display())
            .opt("-l", &request.labeling_name)
            .opt("-c", &request.classifier)
            .opt("-n", request.n_fold_cv)
            .opt("-s", feature_selection)
            .opt("-e", eval_score)
            .arg("--classes")
            .args(request.class_ids.iter().cloned())
            .arg("--features")
            .args(request.feature_ids.iter().cloned())
            .arg("--standardize")
            .opt("--timeout", self.pipeline.classifier_timeout_secs)
            .opt("-o", out_dir.display())
    }

    /// Ids of all runs, i.e. the child directories of `classification/`.
    pub async fn ids(&self) -> Result<BTreeSet<String>> {
        Ok(storage::list_dirs(&self.paths.classification_dir)
            .await?
            .iter()
            .map(|p| storage::file_name(p))
            .collect())
    }

    /// The nested result directory of a run, `None` until the worker has
    /// created it.
    pub async fn result_dir(&self, id: &str) -> Result<Option<PathBuf>> {
        let base = self.paths.classifier_dir(id);
        let children = match storage::list_dirs(&base).await {
            Ok(children) => children,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut found = Vec::new();
        for child in children {
            match storage::list_dirs(&child).await {
                Ok(nested) => found.extend(nested),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            n => Err(SpiceError::corrupt(
                base,
                format!("expected one result directory, found {n}"),
            )),
        }
    }

    async fn require_result_dir(&self, id: &str) -> Result<PathBuf> {
        self.result_dir(id)
            .await?
            .ok_or_else(|| SpiceError::NotFound(format!("results of classifier {id}")))
    }

    pub async fn progress(&self, id: &str) -> Result<String> {
        self.read_run_file(id, PROGRESS_FILE).await
    }

    pub async fn error(&self, id: &str) -> Result<String> {
        self.read_run_file(id, ERROR_FILE).await
    }

    async fn read_run_file(&self, id: &str, name: &str) -> Result<String> {
        let path = self.paths.classifier_dir(id).join(name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SpiceError::io(&path, e))
    }

    /// A run is finished once its result file exists and is non-empty.
    pub async fn is_finished(&self, id: &str) -> Result<bool> {
        let Some(dir) = self.result_dir(id).await? else {
            return Ok(false);
        };
        match tokio::fs::metadata(dir.join(RESULT_FILE)).await {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SpiceError::io(dir.join(RESULT_FILE), e)),
        }
    }

    pub async fn settings(&self, id: &str) -> Result<ClassifierSettings> {
        let path = self.require_result_dir(id).await?.join(SETTINGS_FILE);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SpiceError::io(&path, e))?;
        ClassifierSettings::parse(&path, &content)
    }

    pub async fn result(&self, id: &str) -> Result<ClassifierResult> {
        let path = self.require_result_dir(id).await?.join(RESULT_FILE);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SpiceError::io(&path, e))?;
        ClassifierResult::parse(&path, &content)
    }

    pub async fn roc_path(&self, id: &str) -> Result<Option<PathBuf>> {
        self.artifact(id, ROC_FILE).await
    }

    pub async fn predictions_path(&self, id: &str) -> Result<Option<PathBuf>> {
        self.artifact(id, PREDICTIONS_FILE).await
    }

    async fn artifact(&self, id: &str, name: &str) -> Result<Option<PathBuf>> {
        let Some(dir) = self.result_dir(id).await? else {
            return Ok(None);
        };
        let path = dir.join(name);
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| SpiceError::io(&path, e))?;
        Ok(exists.then_some(path))
    }

    /// All finished runs grouped by target class names. A finished run with
    /// unreadable settings or results fails the whole call.
    pub async fn all_results(&self) -> Result<ResultGroups> {
        let mut groups = ResultGroups::new();
        for id in self.ids().await? {
            if !self.is_finished(&id).await? {
                continue;
            }
            let result = self.result(&id).await?;
            let settings = self.settings(&id).await?;
            let key = settings.target_names().ok_or_else(|| {
                SpiceError::corrupt(
                    self.paths.classifier_dir(&id),
                    "settings have no target_names list",
                )
            })?;
            groups
                .entry(key)
                .or_default()
                .insert(id, ClassifierRun { settings, result });
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validation() {
        let ok = ClassifierRequest::new("lda", 5, "loc")
            .with_classes(["a", "b"])
            .with_features(["f1"]);
        assert!(ok.validate().is_ok());
        assert!(ok
            .clone()
            .with_eval_score("f1")
            .with_feature_selection("rfe")
            .validate()
            .is_ok());

        let cases = [
            ok.clone().with_classes(Vec::<String>::new()),
            ok.clone().with_features(Vec::<String>::new()),
            ClassifierRequest { n_fold_cv: 1, ..ok.clone() },
            ClassifierRequest { classifier: "".into(), ..ok.clone() },
            ok.clone().with_classes(["a b"]),
            ok.clone().with_features(["--evil"]),
            ok.clone().with_eval_score("a\nb"),
            ok.clone().with_eval_score(""),
            ok.clone().with_feature_selection("none --timeout 0"),
        ];
        for case in cases {
            assert!(
                matches!(case.validate(), Err(SpiceError::InputValidation(_))),
                "{case:?}"
            );
        }
    }
}
