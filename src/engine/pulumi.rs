use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{DeployError, Result};
use super::events::{parse_event_line, EngineEvent};
use super::{
    Engine, OperationMode, Outputs, PluginRequirement, Program, RunningOperation, StackRef,
    StackSummary, StatusUpdate,
};

const PROJECT_FILE: &str = "Pulumi.yaml";
const EVENT_LOG_POLL: Duration = Duration::from_millis(100);

/// Engine implementation backed by the `pulumi` CLI.
///
/// Every stack gets its own project directory under `workspace_root`
/// (`<root>/<project>/<name>/Pulumi.yaml`) so concurrent deployments never
/// share a program file. Listing uses a resource-less project directory.
pub struct PulumiCli {
    pub binary: PathBuf,
    pub workspace_root: PathBuf,
}

impl PulumiCli {
    pub fn new(binary: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            workspace_root: workspace_root.into(),
        }
    }

    pub fn stack_dir(&self, stack: &StackRef) -> PathBuf {
        self.workspace_root.join(&stack.project).join(&stack.name)
    }

    fn listing_dir(&self, project: &str) -> PathBuf {
        self.workspace_root.join(project).join("_workspace")
    }

    /// Arguments addressing `stack`, shared by all stack-scoped commands.
    ///
    /// Produces: `["--stack", "org/project/name", "--cwd", dir, "--non-interactive", "--color", "never"]`
    pub fn stack_args(&self, stack: &StackRef) -> Vec<String> {
        let mut args = vec![
            "--stack".to_string(),
            stack.to_string(),
            "--cwd".to_string(),
            self.stack_dir(stack).display().to_string(),
        ];
        args.extend(global_args());
        args
    }

    /// Make sure `dir` holds a project file, writing an empty program if not.
    fn ensure_project(&self, dir: &Path, project: &str) -> Result<()> {
        if dir.join(PROJECT_FILE).exists() {
            return Ok(());
        }
        write_program_file(dir, &Program::empty(project)?)
    }

    fn run(&self, args: &[String]) -> Result<Output> {
        tracing::debug!("pulumi {}", args.join(" "));
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(spawn_error)
    }

    fn run_checked(&self, args: &[String]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(DeployError::Operation(failure_message(&output)));
        }
        Ok(output)
    }
}

impl Engine for PulumiCli {
    fn select_or_create(&self, stack: &StackRef) -> Result<()> {
        let dir = self.stack_dir(stack);
        fs::create_dir_all(&dir)?;
        self.ensure_project(&dir, &stack.project)?;

        let mut args = vec!["stack".to_string(), "select".to_string(), "--create".to_string()];
        args.extend(self.stack_args(stack));
        self.run_checked(&args)?;
        Ok(())
    }

    fn set_config(&self, stack: &StackRef, key: &str, value: &str) -> Result<()> {
        let mut args = vec![
            "config".to_string(),
            "set".to_string(),
            key.to_string(),
            value.to_string(),
        ];
        args.extend(self.stack_args(stack));

        let output = self.run(&args)?;
        if !output.status.success() {
            return Err(DeployError::Configuration {
                key: key.to_string(),
                message: failure_message(&output),
            });
        }
        Ok(())
    }

    fn install_plugin(&self, plugin: &PluginRequirement) -> Result<()> {
        let mut args = vec![
            "plugin".to_string(),
            "install".to_string(),
            "resource".to_string(),
            plugin.provider.clone(),
            plugin.version.clone(),
        ];
        args.extend(global_args());

        let output = self.run(&args)?;
        if !output.status.success() {
            return Err(DeployError::PluginInstall {
                provider: plugin.provider.clone(),
                version: plugin.version.clone(),
                cause: failure_message(&output),
            });
        }
        Ok(())
    }

    fn set_program(&self, stack: &StackRef, program: &Program) -> Result<()> {
        write_program_file(&self.stack_dir(stack), program)
    }

    fn start(&self, stack: &StackRef, mode: OperationMode) -> Result<RunningOperation> {
        let dir = self.stack_dir(stack);
        fs::create_dir_all(&dir)?;
        self.ensure_project(&dir, &stack.project)?;

        let event_log = dir.join(format!(".events-{}.jsonl", Uuid::new_v4()));
        let mut args = vec![mode.command().to_string()];
        args.extend(self.stack_args(stack));
        args.push("--event-log".to_string());
        args.push(event_log.display().to_string());
        if mode != OperationMode::Preview {
            args.extend(["--yes".to_string(), "--skip-preview".to_string()]);
        }
        tracing::debug!("pulumi {}", args.join(" "));

        let mut child = tokio::process::Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let (event_tx, events) = mpsc::unbounded_channel();
        let (status_tx, status) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let exited = CancellationToken::new();

        tokio::spawn(tail_event_log(event_log, event_tx, exited.clone()));
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_status(stdout, status_tx));
        }

        let result = tokio::spawn(supervise(
            child,
            mode,
            self.binary.clone(),
            stack.clone(),
            dir,
            cancel.clone(),
            exited,
        ));

        Ok(RunningOperation {
            events,
            status,
            result,
            cancel,
        })
    }

    fn list_stacks(&self, org: &str, project: &str) -> Result<Vec<StackSummary>> {
        let dir = self.listing_dir(project);
        fs::create_dir_all(&dir)?;
        self.ensure_project(&dir, project)?;

        let mut args = vec![
            "stack".to_string(),
            "ls".to_string(),
            "--json".to_string(),
            "--organization".to_string(),
            org.to_string(),
            "--project".to_string(),
            project.to_string(),
            "--cwd".to_string(),
            dir.display().to_string(),
        ];
        args.extend(global_args());

        let output = self.run_checked(&args)?;
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn outputs(&self, stack: &StackRef) -> Result<Outputs> {
        let dir = self.stack_dir(stack);
        fs::create_dir_all(&dir)?;
        self.ensure_project(&dir, &stack.project)?;

        let output = self.run_checked(&output_args(stack, &dir))?;
        parse_outputs(&output.stdout)
    }

    fn remove_stack(&self, stack: &StackRef) -> Result<()> {
        let mut args = vec!["stack".to_string(), "rm".to_string(), "--yes".to_string()];
        args.extend(self.stack_args(stack));
        self.run_checked(&args)?;

        let dir = self.stack_dir(stack);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Wait for the engine process, interrupting it if `cancel` fires, and turn
/// its exit into the operation result.
async fn supervise(
    mut child: tokio::process::Child,
    mode: OperationMode,
    binary: PathBuf,
    stack: StackRef,
    dir: PathBuf,
    cancel: CancellationToken,
    exited: CancellationToken,
) -> Result<Outputs> {
    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut collected = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut collected).await;
        }
        collected
    });

    let status = tokio::select! {
        status = child.wait() => status,
        _ = cancel.cancelled() => {
            interrupt(&mut child);
            child.wait().await
        }
    };
    exited.cancel();
    let status = status?;
    let stderr = stderr_task.await.unwrap_or_default();

    if !status.success() {
        let message = if stderr.trim().is_empty() {
            format!("pulumi {} exited with {}", mode.command(), status)
        } else {
            stderr.trim().to_string()
        };
        return Err(DeployError::Operation(message));
    }

    match mode {
        OperationMode::Apply => fetch_outputs(&binary, &stack, &dir).await,
        OperationMode::Preview | OperationMode::Destroy => Ok(Outputs::new()),
    }
}

fn global_args() -> Vec<String> {
    vec![
        "--non-interactive".to_string(),
        "--color".to_string(),
        "never".to_string(),
    ]
}

fn output_args(stack: &StackRef, dir: &Path) -> Vec<String> {
    let mut args = vec![
        "stack".to_string(),
        "output".to_string(),
        "--json".to_string(),
        "--show-secrets".to_string(),
        "--stack".to_string(),
        stack.to_string(),
        "--cwd".to_string(),
        dir.display().to_string(),
    ];
    args.extend(global_args());
    args
}

async fn fetch_outputs(binary: &Path, stack: &StackRef, dir: &Path) -> Result<Outputs> {
    let output = tokio::process::Command::new(binary)
        .args(output_args(stack, dir))
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(spawn_error)?;
    if !output.status.success() {
        return Err(DeployError::Operation(failure_message(&output)));
    }
    parse_outputs(&output.stdout)
}

fn parse_outputs(stdout: &[u8]) -> Result<Outputs> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(Outputs::new());
    }
    Ok(serde_json::from_slice(stdout)?)
}

/// Write `Pulumi.yaml` atomically via temp file + rename.
fn write_program_file(dir: &Path, program: &Program) -> Result<()> {
    fs::create_dir_all(dir)?;
    let path = dir.join(PROJECT_FILE);
    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, program.as_yaml())?;
    fs::rename(&tmp_path, &path)?;
    Ok(())
}

fn spawn_error(err: io::Error) -> DeployError {
    if err.kind() == io::ErrorKind::NotFound {
        DeployError::EngineNotInstalled
    } else {
        DeployError::Io(err)
    }
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    format!("pulumi exited with {}", output.status)
}

/// Ask the engine process to stop gracefully. Best effort.
fn interrupt(child: &mut tokio::process::Child) {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            if let Some(pid) = child.id() {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;
                if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
                    tracing::debug!("failed to interrupt pulumi ({}): {}", pid, e);
                }
            }
        } else {
            if let Err(e) = child.start_kill() {
                tracing::debug!("failed to stop pulumi: {}", e);
            }
        }
    }
}

/// Forward engine stdout line by line as status messages.
async fn forward_status(
    stdout: tokio::process::ChildStdout,
    tx: mpsc::UnboundedSender<StatusUpdate>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if tx.send(StatusUpdate::Message(line)).is_err() {
                    return;
                }
            }
            Ok(None) => {
                let _ = tx.send(StatusUpdate::Complete);
                return;
            }
            Err(e) => {
                let _ = tx.send(StatusUpdate::Error(format!(
                    "failed to read engine output: {}",
                    e
                )));
                return;
            }
        }
    }
}

/// Follow the engine's event log until the engine has exited and every
/// complete line has been forwarded. Removes the log afterwards.
async fn tail_event_log(
    path: PathBuf,
    tx: mpsc::UnboundedSender<EngineEvent>,
    exited: CancellationToken,
) {
    let file = loop {
        let engine_done = exited.is_cancelled();
        match tokio::fs::File::open(&path).await {
            Ok(file) => break file,
            Err(_) if engine_done => return,
            Err(_) => wait_for_more(&exited).await,
        }
    };

    let mut reader = BufReader::new(file);
    let mut line = String::new();
    loop {
        let engine_done = exited.is_cancelled();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                if engine_done {
                    break;
                }
                wait_for_more(&exited).await;
            }
            Ok(_) if line.ends_with('\n') => {
                if let Some(parsed) = parse_event_line(&line) {
                    match parsed {
                        Ok(event) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("skipping malformed engine event: {}", e),
                    }
                }
                line.clear();
            }
            // Partial line: keep it buffered until the rest is written.
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("failed to read engine event log: {}", e);
                break;
            }
        }
    }

    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::debug!("failed to remove event log {}: {}", path.display(), e);
    }
}

async fn wait_for_more(exited: &CancellationToken) {
    tokio::select! {
        _ = tokio::time::sleep(EVENT_LOG_POLL) => {}
        _ = exited.cancelled() => {}
    }
}
