//! External process execution

use std::fmt;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::errors::DeployError;

/// A command line to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `kubectl port-forward service/<service> <local>:<remote> -n <namespace>`
    pub fn port_forward(
        kubectl: &str,
        namespace: &str,
        service: &str,
        local_port: u16,
        remote_port: u16,
    ) -> Self {
        Self::new(kubectl)
            .arg("port-forward")
            .arg(format!("service/{}", service))
            .arg(format!("{}:{}", local_port, remote_port))
            .arg("-n")
            .arg(namespace)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// One line of process output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Terminates the process it was taken from. Dropping it has the same effect.
#[derive(Debug)]
pub struct KillSwitch(oneshot::Sender<()>);

impl KillSwitch {
    pub fn kill(self) {
        let _ = self.0.send(());
    }
}

/// Handle to a running process: its output lines, exit code and kill switch
pub struct ProcessHandle {
    command_line: String,
    output: mpsc::UnboundedReceiver<OutputLine>,
    exit: oneshot::Receiver<Option<i32>>,
    kill: Option<KillSwitch>,
}

impl ProcessHandle {
    /// Assemble a handle from its channels
    pub fn new(
        command_line: String,
        output: mpsc::UnboundedReceiver<OutputLine>,
        exit: oneshot::Receiver<Option<i32>>,
        kill: oneshot::Sender<()>,
    ) -> Self {
        Self {
            command_line,
            output,
            exit,
            kill: Some(KillSwitch(kill)),
        }
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Take ownership of the kill switch. Only the first call returns it.
    pub fn kill_switch(&mut self) -> Option<KillSwitch> {
        self.kill.take()
    }

    /// Next line from stdout or stderr; `None` once both streams are closed
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.output.recv().await
    }

    /// Wait for the exit code. `None` when the process was killed or its
    /// status could not be read.
    pub async fn wait(self) -> Option<i32> {
        self.exit.await.ok().flatten()
    }
}

/// Executes external processes
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &CommandSpec) -> Result<ProcessHandle, DeployError>;
}

/// Runs processes with `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for TokioCommandRunner {
    fn run(&self, command: &CommandSpec) -> Result<ProcessHandle, DeployError> {
        let command_line = command.to_string();
        debug!("Spawning: {}", command_line);

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeployError::ProcessError(format!("Failed to run '{}': {}", command_line, e)))?;

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, line_tx.clone(), OutputLine::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, line_tx.clone(), OutputLine::Stderr));
        }
        drop(line_tx);

        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            // A dropped kill switch resolves `kill_rx` as well
            let status = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };
            let code = match status {
                Some(Ok(status)) => status.code(),
                Some(Err(_)) => None,
                None => {
                    let _ = child.kill().await;
                    None
                }
            };
            let _ = exit_tx.send(code);
        });

        Ok(ProcessHandle::new(command_line, line_rx, exit_rx, kill_tx))
    }
}

async fn forward_lines<R>(
    reader: R,
    tx: mpsc::UnboundedSender<OutputLine>,
    wrap: fn(String) -> OutputLine,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(wrap(line)).is_err() {
            break;
        }
    }
}
