//! External process invocation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::BuildError;

/// One external-process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTask {
    /// Program to run
    pub command: String,

    /// Arguments, in order
    pub args: Vec<String>,

    /// Working directory for the child
    pub working_dir: PathBuf,

    /// Variables layered on top of the inherited environment
    pub env: BTreeMap<String, String>,
}

impl GenerationTask {
    /// Create a task with no arguments or environment overrides.
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for GenerationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How an external step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code, `None` if the process was terminated by a signal
    pub code: Option<i32>,
}

impl ProcessOutcome {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessOutcome {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Runs generation tasks to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the task and resolve once it has exited and its output is drained.
    async fn run(&self, task: &GenerationTask) -> Result<ProcessOutcome, BuildError>;
}

/// Spawns real child processes, copying their output to our own stdout/stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, task: &GenerationTask) -> Result<ProcessOutcome, BuildError> {
        tracing::debug!("Spawning {} in {}", task, task.working_dir.display());

        let mut child = Command::new(&task.command)
            .args(&task.args)
            .current_dir(&task.working_dir)
            .envs(&task.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BuildError::Spawn {
                command: task.command.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let forward_stdout = async {
            if let Some(mut out) = stdout {
                let mut sink = tokio::io::stdout();
                tokio::io::copy(&mut out, &mut sink).await?;
                sink.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let forward_stderr = async {
            if let Some(mut err) = stderr {
                let mut sink = tokio::io::stderr();
                tokio::io::copy(&mut err, &mut sink).await?;
                sink.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let (out, err, status) = tokio::join!(forward_stdout, forward_stderr, child.wait());
        out?;
        err?;
        let outcome = ProcessOutcome::from(status?);

        tracing::debug!("{} finished with {}", task.command, outcome);
        Ok(outcome)
    }
}
