// ABOUTME: Script data structure and YAML/JSON parsing
// ABOUTME: A script pairs source text with task templates and an ordered step list

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use super::error::{Result, ScriptError, ValidationError};
use super::step::Step;
use super::task::TaskTemplate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Script {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Program text shown in the editor; ranges index into it
    #[serde(default)]
    pub source: String,
    pub tasks: IndexMap<String, TaskTemplate>,
    pub steps: Vec<Step>,
}

impl Script {
    /// Parse a script from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .await
            .map_err(ScriptError::IoError)?;
        Self::from_yaml(&content)
    }

    /// Parse a script from a YAML (or JSON, which is a YAML subset) string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let script: Script = serde_yaml::from_str(content).map_err(ScriptError::YamlError)?;
        script.validate_structure()?;
        Ok(script)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn task(&self, key: &str) -> Option<&TaskTemplate> {
        self.tasks.get(key)
    }

    pub fn source_lines(&self) -> Vec<&str> {
        self.source.lines().collect()
    }

    /// Structural checks that make a script unrunnable
    fn validate_structure(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ScriptError::MissingField("name".to_string()));
        }

        if self.steps.is_empty() {
            return Err(ScriptError::ValidationError(ValidationError::EmptyScript));
        }

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(key) = step.task_key() {
                if !self.tasks.contains_key(key) {
                    return Err(ScriptError::ValidationError(
                        ValidationError::UnknownTask {
                            step: index,
                            task: key.to_string(),
                        },
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StageId;
    use tempfile::tempdir;

    const SMALL_SCRIPT: &str = r#"
name: small
source: |
  console.log('hi')
tasks:
  log_hi:
    name: "console.log('hi')"
    kind: function
    range: { start_line: 1, start_col: 1, end_line: 1, end_col: 18 }
steps:
  - step: set_stack
    task: log_hi
  - step: emit_output
    text: hi
  - step: fade_remove
    task: log_hi
"#;

    #[test]
    fn test_parse_small_script() {
        let script = Script::from_yaml(SMALL_SCRIPT).unwrap();

        assert_eq!(script.name, "small");
        assert_eq!(script.tasks.len(), 1);
        assert_eq!(script.steps.len(), 3);
        assert_eq!(script.source_lines(), vec!["console.log('hi')"]);
    }

    #[test]
    fn test_unknown_task_rejected() {
        let yaml = r#"
name: broken
tasks: {}
steps:
  - step: fade_remove
    task: ghost
"#;
        let err = Script::from_yaml(yaml).unwrap_err();
        assert!(matches!(
            err,
            ScriptError::ValidationError(ValidationError::UnknownTask { step: 0, .. })
        ));
    }

    #[test]
    fn test_empty_script_rejected() {
        let yaml = "name: empty\ntasks: {}\nsteps: []\n";
        let err = Script::from_yaml(yaml).unwrap_err();
        assert!(matches!(
            err,
            ScriptError::ValidationError(ValidationError::EmptyScript)
        ));
    }

    #[test]
    fn test_missing_name_rejected() {
        let yaml = "name: '  '\ntasks: {}\nsteps:\n  - step: clear_highlight\n";
        let err = Script::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ScriptError::MissingField(field) if field == "name"));
    }

    #[test]
    fn test_json_export_reparses() {
        let script = Script::from_yaml(SMALL_SCRIPT).unwrap();
        let json = script.to_json().unwrap();
        let reparsed = Script::from_yaml(&json).unwrap();
        assert_eq!(reparsed, script);
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("moves.yaml");
        let yaml = r#"
name: moves
tasks:
  cb:
    name: callback
    kind: deferred-callback
steps:
  - step: move_to
    task: cb
    from: stack
    to: pending-io
"#;
        tokio::fs::write(&path, yaml).await.unwrap();

        let script = Script::from_file(&path).await.unwrap();
        assert_eq!(
            script.steps[0],
            Step::move_to("cb", StageId::Stack, StageId::PendingIo)
        );
    }

    #[tokio::test]
    async fn test_from_missing_file() {
        let err = Script::from_file("/definitely/not/here.yaml")
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::IoError(_)));
    }
}
