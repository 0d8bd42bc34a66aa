use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{Result, SpiceError};

/// Mean and sample standard deviation of one metric's fold scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub mean: f64,
    pub std_dev: f64,
}

impl ScoreSummary {
    /// `None` for an empty sequence. A single score has a deviation of 0.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let std_dev = if scores.len() < 2 {
            0.0
        } else {
            let ss: f64 = scores.iter().map(|s| (s - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        };
        Some(Self { mean, std_dev })
    }
}

/// Decoded `result.txt`: per-metric cross-validation scores and summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassifierResult {
    pub cv_scores: BTreeMap<String, Vec<f64>>,
    pub averages: BTreeMap<String, ScoreSummary>,
}

impl ClassifierResult {
    /// Line 1 lists metric names; each following line is that metric's fold
    /// scores as a JSON array of numbers.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut lines = content.lines();
        let metrics: Vec<&str> = lines
            .next()
            .map(|l| l.trim().split(',').map(str::trim).collect())
            .unwrap_or_default();
        if metrics.is_empty() || metrics.iter().any(|m| m.is_empty()) {
            return Err(SpiceError::corrupt(path, "missing metric names"));
        }

        let mut result = Self::default();
        for metric in metrics {
            let line = lines
                .next()
                .ok_or_else(|| SpiceError::corrupt(path, format!("missing scores for '{metric}'")))?;
            let scores: Vec<f64> = serde_json::from_str(line.trim()).map_err(|e| {
                SpiceError::corrupt(path, format!("bad scores for '{metric}': {e}"))
            })?;
            let summary = ScoreSummary::from_scores(&scores)
                .ok_or_else(|| SpiceError::corrupt(path, format!("no scores for '{metric}'")))?;
            result.averages.insert(metric.to_string(), summary);
            result.cv_scores.insert(metric.to_string(), scores);
        }
        Ok(result)
    }

    pub fn scores(&self, metric: &str) -> Option<&[f64]> {
        self.cv_scores.get(metric).map(Vec::as_slice)
    }

    pub fn summary(&self, metric: &str) -> Option<ScoreSummary> {
        self.averages.get(metric).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn parses_single_metric() {
        let result =
            ClassifierResult::parse(Path::new("r"), "roc_auc\n[0.8, 0.9, 0.7]\n").unwrap();
        assert_eq!(result.scores("roc_auc"), Some(&[0.8, 0.9, 0.7][..]));
        let summary = result.summary("roc_auc").unwrap();
        assert!(approx(summary.mean, 0.8));
        assert!(approx(summary.std_dev, 0.1));
    }

    #[test]
    fn parses_multiple_metrics_in_order() {
        let result = ClassifierResult::parse(
            Path::new("r"),
            "roc_auc,f1\n[0.5, 0.7]\n[0.25]\n",
        )
        .unwrap();
        assert!(approx(result.summary("roc_auc").unwrap().mean, 0.6));
        assert_eq!(result.summary("f1").unwrap().std_dev, 0.0);
    }

    #[test]
    fn bad_scores_are_corrupt() {
        for content in [
            "roc_auc\n",
            "roc_auc\nnot a list\n",
            "roc_auc\n[]\n",
            "roc_auc\n(0.1, 0.2)\n",
            "",
        ] {
            let err = ClassifierResult::parse(Path::new("r"), content).unwrap_err();
            assert!(matches!(err, SpiceError::CorruptRecord { .. }), "{content:?}");
        }
    }

    #[test]
    fn summary_of_empty_is_none() {
        assert!(ScoreSummary::from_scores(&[]).is_none());
    }
}
