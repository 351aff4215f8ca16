use crate::handle::UnixProcessHandle;
use async_trait::async_trait;
use procutil_core::stdio::drain_optional;
use procutil_core::{
    CommandLine, ProcessError, ProcessId, ProcessLauncher, ProcessManager, ProcessResult,
    ProcessStats, ProcessStatus, ProcessUtilConfig,
};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};
use sysinfo::System;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Unix-specific process manager
///
/// Stateless apart from its configuration and a cached `sysinfo` table used
/// for lookups. Every launched child is reaped, whether or not the caller
/// waits for it.
pub struct UnixProcessManager {
    config: ProcessUtilConfig,
    system: Mutex<System>,
}

impl Default for UnixProcessManager {
    fn default() -> Self {
        <Self as ProcessManager>::new(&ProcessUtilConfig::default())
    }
}

impl UnixProcessManager {
    pub(crate) fn system(&self) -> MutexGuard<'_, System> {
        self.system.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build the OS command: shell strings go through `<shell> <flag>`,
    /// argument vectors are executed directly
    fn build_command(&self, command: &CommandLine) -> ProcessResult<Command> {
        if command.is_empty() {
            return Err(ProcessError::launch(
                command.display_line(),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            ));
        }

        let mut cmd = match command {
            CommandLine::Shell(line) => {
                let mut cmd = Command::new(&self.config.shell);
                cmd.arg(&self.config.shell_flag).arg(line);
                cmd
            }
            CommandLine::Argv(argv) => {
                let (program, args) = argv.split_first().ok_or_else(|| {
                    ProcessError::launch(
                        command.display_line(),
                        std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"),
                    )
                })?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        };

        if let Some(dir) = &self.config.working_directory {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.config.env);

        Ok(cmd)
    }

    fn spawn_child(&self, command: &CommandLine, mut cmd: Command) -> ProcessResult<Child> {
        let child = cmd
            .spawn()
            .map_err(|e| ProcessError::launch(command.display_line(), e))?;

        if let Some(pid) = child.id() {
            info!("Spawned Unix process: {} (PID: {})", command, pid);
        }

        Ok(child)
    }

    /// Hand a child nobody waits for to a background task so it never
    /// lingers as a zombie
    fn reap_in_background(mut child: Child, command: CommandLine) {
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("Reaped background process {}: {}", command, status),
                Err(e) => warn!("Failed to reap background process {}: {}", command, e),
            }
        });
    }
}

#[async_trait]
impl ProcessLauncher for UnixProcessManager {
    type Handle = UnixProcessHandle;

    async fn run(
        &self,
        command: &CommandLine,
        wait_for_completion: bool,
        run_in_background: bool,
    ) -> ProcessResult<i32> {
        let command = if run_in_background {
            if !command.is_shell() {
                warn!(
                    "Background flag ignored for argument vector {}; it is launched without waiting",
                    command
                );
            }
            command.backgrounded()
        } else {
            command.clone()
        };

        // An argument vector cannot be detached by a shell, so in the
        // background it is only left unwaited.
        let wait = wait_for_completion && (!run_in_background || command.is_shell());

        let mut cmd = self.build_command(&command)?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = self.spawn_child(&command, cmd)?;

        if !wait {
            Self::reap_in_background(child, command);
            return Ok(0);
        }

        let status = child.wait().await.map_err(ProcessError::Wait)?;
        let status = ProcessStatus::from_exit_status(status);
        debug!("Process {} finished: {:?}", command, status);

        Ok(status.exit_code().unwrap_or(-1))
    }

    async fn run_with_handle(&self, command: &CommandLine) -> ProcessResult<ProcessStats> {
        let mut cmd = self.build_command(command)?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = self.spawn_child(command, cmd)?;
        let pid = child.id().map(ProcessId::from);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both pipes are drained while waiting so neither can fill up and
        // stall the child.
        let (out, err, status) = tokio::try_join!(
            async { drain_optional(stdout).await.map_err(ProcessError::Io) },
            async { drain_optional(stderr).await.map_err(ProcessError::Io) },
            async { child.wait().await.map_err(ProcessError::Wait) },
        )?;

        let status = ProcessStatus::from_exit_status(status);
        debug!(
            "Process {} finished: {:?} ({} bytes stdout, {} bytes stderr)",
            command,
            status,
            out.len(),
            err.len()
        );

        Ok(ProcessStats::new(pid, command.clone(), status, out, err))
    }

    async fn spawn(&self, command: &CommandLine) -> ProcessResult<Self::Handle> {
        let mut cmd = self.build_command(command)?;
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = self.spawn_child(command, cmd)?;
        Ok(UnixProcessHandle::new(child, command.clone()))
    }
}

impl ProcessManager for UnixProcessManager {
    fn new(config: &ProcessUtilConfig) -> Self {
        info!("Initializing Unix process manager (shell: {})", config.shell);
        Self {
            config: config.clone(),
            system: Mutex::new(System::new()),
        }
    }

    fn config(&self) -> &ProcessUtilConfig {
        &self.config
    }
}
