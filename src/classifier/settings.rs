use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SpiceError};

pub const TARGET_NAMES_KEY: &str = "target_names";

/// Decoded `settings.txt` of a classifier run.
///
/// Line 1 is a comma-separated key list; each following line holds the value
/// of the next key as JSON. Lines that are not valid JSON are kept as plain
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClassifierSettings {
    values: BTreeMap<String, Value>,
}

impl ClassifierSettings {
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut lines = content.lines();
        let keys: Vec<&str> = lines
            .next()
            .map(|l| l.trim().split(',').map(str::trim).collect())
            .unwrap_or_default();
        if keys.iter().all(|k| k.is_empty()) {
            return Err(SpiceError::corrupt(path, "empty settings key list"));
        }

        let mut values = BTreeMap::new();
        for key in keys {
            let line = lines
                .next()
                .ok_or_else(|| SpiceError::corrupt(path, format!("missing value for '{key}'")))?
                .trim();
            values.insert(key.to_string(), decode_value(line));
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Sorted class names the classifier was trained on; `None` if absent or
    /// not a list.
    pub fn target_names(&self) -> Option<Vec<String>> {
        let items = self.values.get(TARGET_NAMES_KEY)?.as_array()?;
        let mut names: Vec<String> = items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        names.sort();
        Some(names)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn decode_value(line: &str) -> Value {
    serde_json::from_str(line).unwrap_or_else(|_| Value::String(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_typed_values() {
        let content = "classifier,n_fold_cv,standardize,target_names,features\n\
                       \"lda\"\n\
                       5\n\
                       true\n\
                       [\"membrane\", \"cytoplasm\"]\n\
                       [\"aac_A\", \"aac_C\"]\n";
        let settings = ClassifierSettings::parse(Path::new("s"), content).unwrap();
        assert_eq!(settings.get_str("classifier"), Some("lda"));
        assert_eq!(settings.get("n_fold_cv"), Some(&json!(5)));
        assert_eq!(settings.get("standardize"), Some(&json!(true)));
        assert_eq!(
            settings.target_names(),
            Some(vec!["cytoplasm".to_string(), "membrane".to_string()])
        );
        assert_eq!(settings.len(), 5);
    }

    #[test]
    fn undecodable_value_kept_as_string() {
        let content = "classifier,feature_selection\nlda\n('a', 'b')\n";
        let settings = ClassifierSettings::parse(Path::new("s"), content).unwrap();
        assert_eq!(settings.get_str("classifier"), Some("lda"));
        assert_eq!(settings.get_str("feature_selection"), Some("('a', 'b')"));
        assert!(settings.target_names().is_none());
    }

    #[test]
    fn missing_value_line_is_corrupt() {
        let err = ClassifierSettings::parse(Path::new("s"), "a,b\n1\n").unwrap_err();
        assert!(matches!(err, SpiceError::CorruptRecord { .. }));
    }

    #[test]
    fn empty_file_is_corrupt() {
        let err = ClassifierSettings::parse(Path::new("s"), "").unwrap_err();
        assert!(matches!(err, SpiceError::CorruptRecord { .. }));
    }

    #[test]
    fn numeric_target_names_are_stringified() {
        let settings =
            ClassifierSettings::parse(Path::new("s"), "target_names\n[1, 0]\n").unwrap();
        assert_eq!(
            settings.target_names(),
            Some(vec!["0".to_string(), "1".to_string()])
        );
    }
}
