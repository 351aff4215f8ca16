use crate::factory::{PlatformProcessHandle, PlatformProcessManager, PlatformProcessManagerFactory};
use procutil_core::{
    CommandLine, ProcessId, ProcessInfo, ProcessLauncher, ProcessLookup, ProcessManager,
    ProcessManagerFactory, ProcessResult, ProcessStats, ProcessStatus, ProcessTermination,
    ProcessUtilConfig, TerminationResult,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Launches, inspects and terminates external processes
///
/// A plain value built from a configuration; clones share the same
/// platform manager.
#[derive(Clone)]
pub struct ProcessUtil {
    manager: Arc<PlatformProcessManager>,
}

impl Default for ProcessUtil {
    fn default() -> Self {
        Self::with_manager(&ProcessUtilConfig::default())
    }
}

impl ProcessUtil {
    pub fn new(config: &ProcessUtilConfig) -> ProcessResult<Self> {
        // struct literals skip the builder's checks
        config.validate()?;
        Ok(Self::with_manager(config))
    }

    fn with_manager(config: &ProcessUtilConfig) -> Self {
        let manager = PlatformProcessManagerFactory::create_process_manager(config);
        debug!(
            "Created process utility for platform {}",
            PlatformProcessManagerFactory::platform_name()
        );
        Self {
            manager: Arc::new(manager),
        }
    }

    pub fn config(&self) -> &ProcessUtilConfig {
        self.manager.config()
    }

    pub fn platform_name() -> &'static str {
        PlatformProcessManagerFactory::platform_name()
    }

    /// Launch a command; see [`ProcessLauncher::run`] for the exit code rules
    pub async fn run(
        &self,
        command: impl Into<CommandLine>,
        wait_for_completion: bool,
        run_in_background: bool,
    ) -> ProcessResult<i32> {
        self.manager
            .run(&command.into(), wait_for_completion, run_in_background)
            .await
    }

    /// Launch an argument vector without shell interpretation
    pub async fn run_argv<S: ToString, I: IntoIterator<Item = S>>(
        &self,
        argv: I,
        wait_for_completion: bool,
    ) -> ProcessResult<i32> {
        let argv: Vec<String> = argv.into_iter().map(|s| s.to_string()).collect();
        self.manager.run_argv(&argv, wait_for_completion).await
    }

    /// Launch in the foreground and wait for the exit code
    pub async fn start(&self, command: impl Into<CommandLine>) -> ProcessResult<i32> {
        self.manager.start(&command.into()).await
    }

    /// Launch a shell job in the background
    pub async fn start_background(
        &self,
        command: impl Into<CommandLine>,
        wait_for_completion: bool,
    ) -> ProcessResult<i32> {
        self.run(command, wait_for_completion, true).await
    }

    /// Launch, wait, and keep stdout, stderr and the exit code
    pub async fn run_with_handle(&self, command: impl Into<CommandLine>) -> ProcessResult<ProcessStats> {
        self.manager.run_with_handle(&command.into()).await
    }

    /// Launch with piped streams and return the live handle
    pub async fn spawn(&self, command: impl Into<CommandLine>) -> ProcessResult<PlatformProcessHandle> {
        self.manager.spawn(&command.into()).await
    }

    pub async fn wait_for_exit(
        &self,
        handle: &mut PlatformProcessHandle,
        timeout: Option<Duration>,
    ) -> ProcessResult<ProcessStatus> {
        self.manager.wait_for_exit(handle, timeout).await
    }

    pub async fn find_process_id(&self, command: &str) -> ProcessResult<ProcessId> {
        self.manager.find_process_id(command).await
    }

    pub async fn find_process_id_with_args<S: AsRef<str>>(
        &self,
        command: &str,
        args: &[S],
    ) -> ProcessResult<ProcessId> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        self.manager.find_process_id_with_args(command, &args).await
    }

    pub async fn find_process_ids(&self, pattern: &str) -> ProcessResult<Vec<ProcessId>> {
        self.manager.find_process_ids(pattern).await
    }

    /// `find_process_id` retried per the configured lookup retry policy
    pub async fn wait_for_process_id(&self, command: &str) -> ProcessResult<ProcessId> {
        self.manager.wait_for_process_id(command).await
    }

    pub async fn find_supervisor_process_id(&self) -> ProcessResult<ProcessId> {
        self.manager.find_supervisor_process_id().await
    }

    pub async fn list_processes(&self) -> ProcessResult<Vec<ProcessInfo>> {
        self.manager.list_processes().await
    }

    pub async fn process_info(&self, pid: ProcessId) -> ProcessResult<ProcessInfo> {
        self.manager.process_info(pid).await
    }

    pub async fn is_running(&self, pid: ProcessId) -> bool {
        self.manager.is_running(pid).await
    }

    /// Poll at the configured interval until `pid` is gone or `max_polls`
    /// probes have seen it alive
    pub async fn wait_until_exited(&self, pid: ProcessId, max_polls: u32) -> bool {
        let interval = self.config().poll_interval();
        self.manager.wait_until_exited(pid, interval, max_polls).await
    }

    pub async fn terminate(&self, pid: ProcessId) -> ProcessResult<TerminationResult> {
        self.manager.terminate(pid).await
    }

    pub async fn kill(&self, pid: ProcessId) -> ProcessResult<TerminationResult> {
        self.manager.kill(pid).await
    }

    pub async fn kill_all(&self, pattern: &str) -> ProcessResult<Vec<ProcessId>> {
        self.manager.kill_all(pattern).await
    }

    pub async fn terminate_then_kill(
        &self,
        pid: ProcessId,
        grace_period: Duration,
    ) -> ProcessResult<TerminationResult> {
        self.manager.terminate_then_kill(pid, grace_period).await
    }

    /// `terminate_then_kill` with the configured grace period
    pub async fn stop_and_kill(&self, pid: ProcessId) -> ProcessResult<TerminationResult> {
        let grace = self.config().grace_period();
        self.manager.terminate_then_kill(pid, grace).await
    }

    pub async fn find_child_processes(&self, pid: ProcessId) -> ProcessResult<Vec<ProcessId>> {
        self.manager.find_child_processes(pid).await
    }

    /// Terminate `root` and every descendant with the configured grace period
    pub async fn terminate_process_tree(&self, root: ProcessId) -> ProcessResult<TerminationResult> {
        let grace = self.config().grace_period();
        self.manager.terminate_process_tree(root, grace).await
    }
}
