//! Bridge to the external reasoning engine.
//!
//! The orchestrator only sees [`ReasoningEngine`]. [`CommandEngine`] is the
//! production implementation: it runs a configured command inside the vault,
//! feeds the rendered instruction on stdin and kills the child when it
//! outlives its timeout.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use steward_core::paths::{last_prompt_path, manifest_path, steward_dir};
use steward_core::store::atomic_write;
use steward_renderer::PromptTask;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const OUTPUT_TAIL_BYTES: usize = 4096;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    /// A freshly claimed batch from `Needs_Action`.
    Batch,
    /// One human-approved action.
    Approved,
}

impl InvocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationMode::Batch => "batch",
            InvocationMode::Approved => "approved",
        }
    }
}

/// Machine-readable companion of the prompt, written to `.steward/manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub vault: String,
    pub mode: InvocationMode,
    pub tasks: Vec<PromptTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_key: Option<String>,
}

impl Manifest {
    pub fn batch(vault: &Path, tasks: Vec<PromptTask>) -> Self {
        Self {
            vault: vault.display().to_string(),
            mode: InvocationMode::Batch,
            tasks,
            execution_key: None,
        }
    }

    pub fn approved(vault: &Path, task: PromptTask, execution_key: String) -> Self {
        Self {
            vault: vault.display().to_string(),
            mode: InvocationMode::Approved,
            tasks: vec![task],
            execution_key: Some(execution_key),
        }
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub prompt: String,
    pub manifest: Manifest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub stdout: String,
}

impl EngineOutput {
    /// Bytes the engine wrote to stdout.
    pub fn len(&self) -> usize {
        self.stdout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty()
    }

    /// Trimmed end of stdout, capped for logging.
    pub fn tail(&self) -> String {
        tail(&self.stdout)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine command `{command}` not found")]
    NotFound { command: String },

    #[error("engine timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("engine exited with {status}: {output}")]
    Failed { status: String, output: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write engine scratch file: {0}")]
    Scratch(#[from] steward_core::StoreError),

    #[error("failed to encode manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Anything that can act on a prompt. Invocation is synchronous.
pub trait ReasoningEngine {
    fn invoke(&self, request: &EngineRequest) -> Result<EngineOutput, EngineError>;
}

// ---------------------------------------------------------------------------
// CommandEngine
// ---------------------------------------------------------------------------

/// Spawns `command args...` with the vault as working directory.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    vault: PathBuf,
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandEngine {
    pub fn new(
        vault: impl Into<PathBuf>,
        command: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            vault: vault.into(),
            command: command.into(),
            args,
            timeout,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Write the manifest and prompt where the engine (and a human) can find them.
    fn write_scratch(&self, request: &EngineRequest) -> Result<PathBuf, EngineError> {
        let dir = steward_dir(&self.vault);
        std::fs::create_dir_all(&dir).map_err(|e| EngineError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let manifest = manifest_path(&self.vault);
        atomic_write(&manifest, &serde_json::to_vec_pretty(&request.manifest)?)?;
        atomic_write(&last_prompt_path(&self.vault), request.prompt.as_bytes())?;
        Ok(manifest)
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<Option<ExitStatus>, EngineError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let polled = child.try_wait().map_err(|e| EngineError::Io {
                path: PathBuf::from(&self.command),
                source: e,
            })?;
            if let Some(status) = polled {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn tail(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= OUTPUT_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - OUTPUT_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

impl ReasoningEngine for CommandEngine {
    fn invoke(&self, request: &EngineRequest) -> Result<EngineOutput, EngineError> {
        let manifest = self.write_scratch(request)?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .current_dir(&self.vault)
            .env("STEWARD_MANIFEST", &manifest)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EngineError::NotFound {
                    command: self.command.clone(),
                },
                _ => EngineError::Io {
                    path: PathBuf::from(&self.command),
                    source: e,
                },
            })?;
        info!(
            command = %self.command,
            mode = request.manifest.mode.as_str(),
            tasks = request.manifest.tasks.len(),
            "engine started"
        );

        // Written from a thread; the child may never read stdin.
        let writer = child.stdin.take().map(|mut stdin| {
            let prompt = request.prompt.clone();
            thread::spawn(move || {
                let _ = stdin.write_all(prompt.as_bytes());
            })
        });
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let status = match self.wait_with_timeout(&mut child)? {
            Some(status) => status,
            None => {
                warn!(
                    command = %self.command,
                    timeout_secs = self.timeout.as_secs(),
                    "engine timed out, killing"
                );
                let _ = child.kill();
                let _ = child.wait();
                return Err(EngineError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if let Some(handle) = writer {
            let _ = handle.join();
        }
        let stdout = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
        let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();
        debug!(stdout_bytes = stdout.len(), stderr_bytes = stderr.len(), "engine finished");

        if status.success() {
            Ok(EngineOutput { stdout })
        } else {
            let output = if stderr.trim().is_empty() { &stdout } else { &stderr };
            Err(EngineError::Failed {
                status: describe(status),
                output: tail(output),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request() -> EngineRequest {
        EngineRequest {
            prompt: "do the thing".into(),
            manifest: Manifest::batch(Path::new("/vault"), vec![]),
        }
    }

    fn engine(vault: &Path, command: &str, args: &[&str], timeout: Duration) -> CommandEngine {
        std::fs::create_dir_all(vault.join(".steward")).unwrap();
        CommandEngine::new(vault, command, args.iter().map(|s| s.to_string()).collect(), timeout)
    }

    #[test]
    fn prompt_arrives_on_stdin_and_scratch_files_are_written() {
        let tmp = TempDir::new().unwrap();
        let e = engine(tmp.path(), "cat", &[], Duration::from_secs(10));
        let out = e.invoke(&request()).unwrap();
        assert_eq!(out.stdout, "do the thing");
        assert!(last_prompt_path(tmp.path()).is_file());
        let manifest = std::fs::read_to_string(manifest_path(tmp.path())).unwrap();
        assert!(manifest.contains("\"mode\": \"batch\""));
    }

    #[test]
    fn manifest_path_is_exported() {
        let tmp = TempDir::new().unwrap();
        let e = engine(
            tmp.path(),
            "sh",
            &["-c", "printf %s \"$STEWARD_MANIFEST\""],
            Duration::from_secs(10),
        );
        let out = e.invoke(&request()).unwrap();
        assert!(out.stdout.ends_with("manifest.json"));
    }

    #[test]
    fn missing_command_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let e = engine(tmp.path(), "steward-no-such-engine", &[], Duration::from_secs(5));
        assert!(matches!(e.invoke(&request()), Err(EngineError::NotFound { .. })));
    }

    #[test]
    fn non_zero_exit_is_failure_with_output() {
        let tmp = TempDir::new().unwrap();
        let e = engine(
            tmp.path(),
            "sh",
            &["-c", "echo boom >&2; exit 3"],
            Duration::from_secs(10),
        );
        match e.invoke(&request()) {
            Err(EngineError::Failed { status, output }) => {
                assert_eq!(status, "status 3");
                assert_eq!(output, "boom");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn slow_engine_is_killed() {
        let tmp = TempDir::new().unwrap();
        let e = engine(tmp.path(), "sleep", &["5"], Duration::from_millis(300));
        assert!(matches!(e.invoke(&request()), Err(EngineError::Timeout { .. })));
    }
}
