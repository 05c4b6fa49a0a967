//! Test doubles for the process seam.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::BuildError;
use crate::task::{GenerationTask, ProcessOutcome, ProcessRunner};

/// Records every task and fakes what the real tools would write.
///
/// A task carrying `BUILD_DIR` behaves like doxygen and writes `html/` pages
/// into that directory. Any other task records whether the reference
/// completion marker existed at the moment it was spawned.
pub struct FakeRunner {
    pub events: Mutex<Vec<String>>,
    pub tasks: Mutex<Vec<GenerationTask>>,
    exit_codes: HashMap<String, i32>,
    marker: Option<PathBuf>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            exit_codes: HashMap::new(),
            marker: None,
        }
    }

    pub fn exit_with(mut self, command: &str, code: i32) -> Self {
        self.exit_codes.insert(command.to_string(), code);
        self
    }

    pub fn watch_marker(mut self, marker: PathBuf) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn spawned(&self) -> Vec<String> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.command.clone())
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, task: &GenerationTask) -> Result<ProcessOutcome, BuildError> {
        self.tasks.lock().unwrap().push(task.clone());
        self.record(format!("spawn:{}", task.command));

        if let Some(out) = task.env.get("BUILD_DIR") {
            let html = PathBuf::from(out).join("html");
            fs::create_dir_all(&html)?;
            fs::write(html.join("a.html"), "<p>a</p>")?;
            fs::write(html.join("b.html"), "<p>b</p>")?;
            fs::write(html.join("graph.svg"), "<text>T&lt;</text>")?;
        } else if let Some(marker) = &self.marker {
            self.record(format!("marker:{}", marker.exists()));
        }

        tokio::task::yield_now().await;
        self.record(format!("exit:{}", task.command));

        let code = self.exit_codes.get(&task.command).copied().unwrap_or(0);
        Ok(ProcessOutcome::from_code(code))
    }
}
