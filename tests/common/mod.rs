// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides script builders, temp environments, and a recorded controller rig

#![allow(dead_code)]

use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;

use loopscope::engine::{EngineConfig, LayoutRegistry, RunController};
use loopscope::script::{example, Script, SourceRange, Step, TaskKind, TaskTemplate};
use loopscope::surface::{Recorder, Surfaces};

pub struct TestScriptBuilder {
    name: String,
    description: Option<String>,
    source: Vec<String>,
    tasks: IndexMap<String, TaskTemplate>,
    steps: Vec<Step>,
}

impl TestScriptBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: Some(format!("Test script: {}", name)),
            source: Vec::new(),
            tasks: IndexMap::new(),
            steps: Vec::new(),
        }
    }

    /// Add a source line and a function task spanning it
    pub fn add_line_task(mut self, key: &str, line: &str) -> Self {
        self.source.push(line.to_string());
        let number = self.source.len() as u32;
        let range = SourceRange::line(number, 1, line.len() as u32 + 1);
        self.tasks.insert(
            key.to_string(),
            TaskTemplate::new(line, TaskKind::Function, Some(range)),
        );
        self
    }

    pub fn add_task(mut self, key: &str, kind: TaskKind) -> Self {
        self.tasks
            .insert(key.to_string(), TaskTemplate::new(key, kind, None));
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Stack, print, and fade a single synchronous call
    pub fn add_log(self, key: &str, text: &str) -> Self {
        self.add_line_task(key, &format!("console.log('{}')", text))
            .step(Step::set_stack(key))
            .step(Step::wait(100))
            .step(Step::emit(text))
            .step(Step::fade_remove(key))
    }

    pub fn build(self) -> Script {
        let mut source = self.source.join("\n");
        if !source.is_empty() {
            source.push('\n');
        }
        Script {
            name: self.name,
            description: self.description,
            source,
            tasks: self.tasks,
            steps: self.steps,
        }
    }

    pub async fn write_to_file(self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let yaml_content = self.build().to_yaml()?;
        fs::write(path, yaml_content).await?;
        Ok(())
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    pub async fn create_script_file(&self, name: &str, builder: TestScriptBuilder) -> PathBuf {
        let path = self.path(&format!("{}.yaml", name));
        builder
            .write_to_file(&path)
            .await
            .expect("Failed to write script file");
        path
    }

    pub async fn create_raw_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content)
            .await
            .expect("Failed to write file");
        path
    }

    /// Config with instant animations so CLI runs finish quickly
    pub async fn create_fast_config(&self) -> PathBuf {
        let content = r#"
speed: 2.0
timing:
  active_poll_ms: 10
  paused_poll_ms: 10
animation:
  transit_ms: 0
  dispatcher_dwell_ms: 0
  settle_ms: 0
  fade_ms: 0
logging:
  level: warn
  format: compact
"#;
        self.create_raw_file("loopscope.yaml", content).await
    }
}

/// A controller wired to a recorder
pub struct TestRig {
    pub controller: RunController,
    pub recorder: Arc<Recorder>,
}

pub struct TestRigBuilder {
    script: Script,
    config: EngineConfig,
    layout: Option<Arc<LayoutRegistry>>,
}

impl TestRig {
    pub fn builder() -> TestRigBuilder {
        TestRigBuilder {
            script: example(),
            config: EngineConfig::default(),
            layout: None,
        }
    }

    pub fn example() -> Self {
        Self::builder().build()
    }
}

impl TestRigBuilder {
    pub fn with_script(mut self, script: Script) -> Self {
        self.script = script;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.config = self.config.with_speed(speed);
        self
    }

    pub fn with_layout(mut self, layout: Arc<LayoutRegistry>) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn build(self) -> TestRig {
        let recorder = Arc::new(Recorder::new());
        let surfaces = Surfaces::uniform(Arc::clone(&recorder));
        let controller = match self.layout {
            Some(layout) => RunController::with_layout(self.script, self.config, surfaces, layout),
            None => RunController::new(self.script, self.config, surfaces),
        };
        TestRig {
            controller,
            recorder,
        }
    }
}
