use crate::command::CommandLine;
use crate::config::ProcessUtilConfig;
use crate::error::{ProcessError, ProcessResult};
use crate::table;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Unique identifier for a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u32);

impl ProcessId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ProcessId {
    fn from(value: u32) -> Self {
        ProcessId(value)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Process is currently running
    Running,
    /// Process exited normally with the given exit code
    Exited(i32),
    /// Process was terminated by the given signal
    Signaled(i32),
    /// Process status is unknown
    Unknown,
}

impl ProcessStatus {
    /// Map an exit status, folding signals into the shell's `128 + n` form
    pub fn from_exit_status(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ProcessStatus::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ProcessStatus::Signaled(signal);
            }
        }

        ProcessStatus::Unknown
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessStatus::Exited(code) => Some(*code),
            ProcessStatus::Signaled(signal) => Some(128 + signal),
            ProcessStatus::Running | ProcessStatus::Unknown => None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, ProcessStatus::Exited(_) | ProcessStatus::Signaled(_))
    }
}

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationResult {
    /// The signal was delivered
    Success,
    /// SIGTERM was ignored for the whole grace period and SIGKILL followed
    Escalated,
    /// Process was not found (already exited)
    ProcessNotFound,
}

/// One entry of the process table
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub parent: Option<ProcessId>,
    pub name: String,
    pub cmd: Vec<String>,
}

impl ProcessInfo {
    /// Full command line, argv joined by spaces, falling back to the name
    /// for kernel threads that expose no argv
    pub fn command_line(&self) -> String {
        if self.cmd.is_empty() {
            self.name.clone()
        } else {
            self.cmd.join(" ")
        }
    }
}

/// A finished process with everything it wrote to stdout and stderr
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessStats {
    pid: Option<ProcessId>,
    command: CommandLine,
    status: ProcessStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl ProcessStats {
    pub fn new(
        pid: Option<ProcessId>,
        command: CommandLine,
        status: ProcessStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    ) -> Self {
        Self {
            pid,
            command,
            status,
            stdout,
            stderr,
        }
    }

    pub fn pid(&self) -> Option<ProcessId> {
        self.pid
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    /// Exit code, `-1` when the platform reported no usable status
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code().unwrap_or(-1)
    }

    pub fn success(&self) -> bool {
        self.status == ProcessStatus::Exited(0)
    }

    /// Captured stdout; `&[u8]` implements `Read` for incremental consumption
    pub fn process_stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn process_stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Trait representing a handle to a live child process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID (None once the process has been reaped)
    fn pid(&self) -> Option<ProcessId>;

    /// Get the command that started this process
    fn command(&self) -> &CommandLine;

    /// Check if the process is still running (non-blocking, reaps on exit)
    async fn is_running(&mut self) -> bool;

    /// Try to get exit status without blocking
    async fn try_wait(&mut self) -> ProcessResult<Option<ProcessStatus>>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> ProcessResult<ProcessStatus>;

    /// Kill the process and reap it
    async fn kill(&mut self) -> ProcessResult<()>;

    /// Exit code, available once termination has been observed
    fn exit_code(&self) -> ProcessResult<i32>;
}

/// Launching commands, with or without waiting for them
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// The type of process handle this launcher produces
    type Handle: ProcessHandle;

    /// Launch `command` and return an exit code.
    ///
    /// - foreground, waiting: the command's own exit code
    /// - foreground, not waiting: `0` once spawned
    /// - background: the launcher shell's exit code (when waiting) or `0`
    async fn run(
        &self,
        command: &CommandLine,
        wait_for_completion: bool,
        run_in_background: bool,
    ) -> ProcessResult<i32>;

    /// Launch an argument vector without shell interpretation
    async fn run_argv(&self, argv: &[String], wait_for_completion: bool) -> ProcessResult<i32> {
        self.run(&CommandLine::Argv(argv.to_vec()), wait_for_completion, false)
            .await
    }

    /// Launch in the foreground and wait for the exit code
    async fn start(&self, command: &CommandLine) -> ProcessResult<i32> {
        self.run(command, true, false).await
    }

    /// Launch, wait, and keep stdout, stderr and the exit code
    async fn run_with_handle(&self, command: &CommandLine) -> ProcessResult<ProcessStats>;

    /// Launch with piped stdin, stdout and stderr and return immediately
    async fn spawn(&self, command: &CommandLine) -> ProcessResult<Self::Handle>;

    /// Wait for a process to exit with optional timeout
    async fn wait_for_exit(
        &self,
        handle: &mut Self::Handle,
        timeout: Option<Duration>,
    ) -> ProcessResult<ProcessStatus> {
        match timeout {
            Some(duration) => tokio::time::timeout(duration, handle.wait())
                .await
                .map_err(|_| ProcessError::Timeout)?,
            None => handle.wait().await,
        }
    }
}

/// Process table queries
#[async_trait]
pub trait ProcessLookup: Send + Sync {
    /// Snapshot of live processes, excluding threads, zombies and the caller
    async fn list_processes(&self) -> ProcessResult<Vec<ProcessInfo>>;

    /// Whether `pid` is still a live entry of the process table
    async fn is_running(&self, pid: ProcessId) -> bool;

    /// Pid of the supervising service
    async fn find_supervisor_process_id(&self) -> ProcessResult<ProcessId>;

    /// `find_process_id`, retried while the process is not yet visible
    async fn wait_for_process_id(&self, command: &str) -> ProcessResult<ProcessId>;

    async fn process_info(&self, pid: ProcessId) -> ProcessResult<ProcessInfo> {
        self.list_processes()
            .await?
            .into_iter()
            .find(|p| p.pid == pid)
            .ok_or_else(|| ProcessError::NotFound(pid.to_string()))
    }

    /// First process whose command line equals `command`, else the lowest
    /// pid whose command line contains it
    async fn find_process_id(&self, command: &str) -> ProcessResult<ProcessId> {
        let processes = self.list_processes().await?;
        table::select_by_command(&processes, command)
            .ok_or_else(|| ProcessError::NotFound(command.to_string()))
    }

    /// First process whose command line contains `command` and every arg
    async fn find_process_id_with_args(
        &self,
        command: &str,
        args: &[String],
    ) -> ProcessResult<ProcessId> {
        let processes = self.list_processes().await?;
        table::select_by_command_and_args(&processes, command, args).ok_or_else(|| {
            ProcessError::NotFound(format!("{command} {}", args.join(" ")).trim().to_string())
        })
    }

    /// Every pid whose command line contains `pattern`, ascending
    async fn find_process_ids(&self, pattern: &str) -> ProcessResult<Vec<ProcessId>> {
        let processes = self.list_processes().await?;
        Ok(table::matching_pids(&processes, pattern))
    }

    /// Poll `is_running` until the process is gone.
    ///
    /// Returns false if it is still running after `max_polls` probes.
    async fn wait_until_exited(
        &self,
        pid: ProcessId,
        poll_interval: Duration,
        max_polls: u32,
    ) -> bool {
        for _ in 0..max_polls {
            if !self.is_running(pid).await {
                return true;
            }
            tokio::time::sleep(poll_interval).await;
        }
        !self.is_running(pid).await
    }
}

/// Signal delivery. Unknown or exited pids are never an error.
#[async_trait]
pub trait ProcessTermination: ProcessLookup {
    /// SIGTERM
    async fn terminate(&self, pid: ProcessId) -> ProcessResult<TerminationResult>;

    /// SIGKILL
    async fn kill(&self, pid: ProcessId) -> ProcessResult<TerminationResult>;

    /// SIGTERM, then SIGKILL if the process outlives `grace_period`
    async fn terminate_then_kill(
        &self,
        pid: ProcessId,
        grace_period: Duration,
    ) -> ProcessResult<TerminationResult>;

    /// SIGKILL every process matching `pattern`; returns the pids signalled.
    ///
    /// Every match is signalled even when some fail; the first failure is
    /// returned afterwards.
    async fn kill_all(&self, pattern: &str) -> ProcessResult<Vec<ProcessId>> {
        let mut killed = Vec::new();
        let mut first_error = None;
        for pid in self.find_process_ids(pattern).await? {
            match self.kill(pid).await {
                Ok(TerminationResult::Success) => killed.push(pid),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Failed to kill process {}: {}", pid, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(killed),
        }
    }

    /// All descendants of `pid`, deepest first
    async fn find_child_processes(&self, pid: ProcessId) -> ProcessResult<Vec<ProcessId>> {
        let processes = self.list_processes().await?;
        Ok(table::descendants(&processes, pid))
    }

    /// Terminate descendants bottom-up, then the root
    async fn terminate_process_tree(
        &self,
        root: ProcessId,
        grace_period: Duration,
    ) -> ProcessResult<TerminationResult> {
        for child in self.find_child_processes(root).await? {
            match self.terminate_then_kill(child, grace_period).await {
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to terminate child process {}: {}", child, e),
            }
        }
        self.terminate_then_kill(root, grace_period).await
    }
}

/// Launching, lookup and termination bound to one configuration
pub trait ProcessManager: ProcessLauncher + ProcessTermination {
    fn new(config: &ProcessUtilConfig) -> Self
    where
        Self: Sized;

    fn config(&self) -> &ProcessUtilConfig;
}

/// Factory trait for creating platform-specific process managers
pub trait ProcessManagerFactory {
    /// The type of process manager this factory creates
    type Manager: ProcessManager;

    fn create_process_manager(config: &ProcessUtilConfig) -> Self::Manager;

    /// Get the platform name for logging and debugging
    fn platform_name() -> &'static str;
}
