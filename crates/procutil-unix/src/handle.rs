use async_trait::async_trait;
use procutil_core::stdio::read_stream_to_string;
use procutil_core::{CommandLine, ProcessError, ProcessHandle, ProcessId, ProcessResult, ProcessStatus};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tracing::{debug, warn};

/// Unix-specific handle to a live child process
///
/// Streams are piped. Reading one of stdout/stderr to the end while the
/// child fills the other pipe can deadlock; take both and drain them
/// concurrently when both carry output.
///
/// A handle dropped before the child exits leaves the child running; tokio
/// reaps it in the background once it terminates.
pub struct UnixProcessHandle {
    child: Child,
    command: CommandLine,
    pid: Option<ProcessId>,
    status: Option<ProcessStatus>,
}

impl UnixProcessHandle {
    pub fn new(child: Child, command: CommandLine) -> Self {
        let pid = child.id().map(ProcessId::from);
        Self {
            child,
            command,
            pid,
            status: None,
        }
    }

    pub fn process_stdin(&mut self) -> Option<&mut ChildStdin> {
        self.child.stdin.as_mut()
    }

    pub fn process_stdout(&mut self) -> Option<&mut ChildStdout> {
        self.child.stdout.as_mut()
    }

    pub fn process_stderr(&mut self) -> Option<&mut ChildStderr> {
        self.child.stderr.as_mut()
    }

    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Close stdin so the child sees end-of-input
    pub fn close_stdin(&mut self) {
        if self.child.stdin.take().is_some() {
            debug!("Closed stdin of process {:?}", self.pid);
        }
    }

    /// Drain stdout to end-of-stream; empty if stdout was already taken
    pub async fn read_stdout_to_string(&mut self) -> ProcessResult<String> {
        match self.child.stdout.as_mut() {
            Some(out) => Ok(read_stream_to_string(out).await?),
            None => Ok(String::new()),
        }
    }

    /// Drain stderr to end-of-stream; empty if stderr was already taken
    pub async fn read_stderr_to_string(&mut self) -> ProcessResult<String> {
        match self.child.stderr.as_mut() {
            Some(err) => Ok(read_stream_to_string(err).await?),
            None => Ok(String::new()),
        }
    }

    fn record(&mut self, status: std::process::ExitStatus) -> ProcessStatus {
        let status = ProcessStatus::from_exit_status(status);
        debug!("Process {:?} ({}) finished: {:?}", self.pid, self.command, status);
        self.status = Some(status);
        status
    }
}

#[async_trait]
impl ProcessHandle for UnixProcessHandle {
    fn pid(&self) -> Option<ProcessId> {
        self.pid
    }

    fn command(&self) -> &CommandLine {
        &self.command
    }

    async fn is_running(&mut self) -> bool {
        match self.try_wait().await {
            Ok(status) => status.is_none(),
            Err(e) => {
                warn!("Unable to query process {:?}: {}", self.pid, e);
                false
            }
        }
    }

    async fn try_wait(&mut self) -> ProcessResult<Option<ProcessStatus>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }
        match self.child.try_wait().map_err(ProcessError::Wait)? {
            Some(status) => Ok(Some(self.record(status))),
            None => Ok(None),
        }
    }

    async fn wait(&mut self) -> ProcessResult<ProcessStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self.child.wait().await.map_err(ProcessError::Wait)?;
        Ok(self.record(status))
    }

    async fn kill(&mut self) -> ProcessResult<()> {
        if self.status.is_some() {
            return Ok(());
        }
        self.child.kill().await?;
        self.wait().await.map(|_| ())
    }

    fn exit_code(&self) -> ProcessResult<i32> {
        self.status
            .and_then(|status| status.exit_code())
            .ok_or(ProcessError::StillRunning(self.pid.unwrap_or(ProcessId(0))))
    }
}
