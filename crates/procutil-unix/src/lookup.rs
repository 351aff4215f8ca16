use crate::UnixProcessManager;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use nix::errno::Errno;
use nix::sys::signal;
use nix::unistd::Pid as NixPid;
use procutil_core::table::parse_ps_output;
use procutil_core::{ProcessError, ProcessId, ProcessInfo, ProcessLookup, ProcessManager, ProcessResult};
use std::process::Stdio;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, UpdateKind};
use tracing::{debug, info, warn};

/// Convert to a signal target. Pid 0 and values beyond `i32::MAX` would
/// address a process group rather than a single process.
pub(crate) fn to_nix_pid(pid: ProcessId) -> Option<NixPid> {
    match i32::try_from(pid.0) {
        Ok(raw) if raw > 0 => Some(NixPid::from_raw(raw)),
        _ => None,
    }
}

impl UnixProcessManager {
    /// Structured enumeration through `sysinfo`
    fn snapshot(&self) -> Vec<ProcessInfo> {
        let own_pid = std::process::id();
        let mut system = self.system();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );

        system
            .processes()
            .iter()
            .filter(|(pid, process)| {
                pid.as_u32() != own_pid
                    && process.thread_kind().is_none()
                    && process.status() != sysinfo::ProcessStatus::Zombie
            })
            .map(|(pid, process)| ProcessInfo {
                pid: ProcessId(pid.as_u32()),
                parent: process.parent().map(|ppid| ProcessId(ppid.as_u32())),
                name: process.name().to_string_lossy().into_owned(),
                cmd: process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect(),
            })
            .collect()
    }

    /// Text fallback for systems where structured enumeration sees nothing.
    ///
    /// Only the caller and the `ps` process itself are left out; children
    /// of the caller stay visible.
    pub(crate) async fn ps_snapshot(&self) -> ProcessResult<Vec<ProcessInfo>> {
        const PS_ARGS: [&str; 2] = ["-eo", "pid=,ppid=,args="];

        let child = tokio::process::Command::new("ps")
            .args(PS_ARGS)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ProcessError::launch(format!("ps {}", PS_ARGS.join(" ")), e))?;
        let ps_pid = child.id().map(ProcessId::from);
        let output = child.wait_with_output().await.map_err(ProcessError::Wait)?;

        let own_pid = ProcessId(std::process::id());
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ps_output(&text)
            .into_iter()
            .filter(|p| p.pid != own_pid && Some(p.pid) != ps_pid)
            .collect())
    }

    fn is_zombie(&self, pid: ProcessId) -> bool {
        let sys_pid = sysinfo::Pid::from_u32(pid.0);
        let mut system = self.system();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        system
            .process(sys_pid)
            .is_some_and(|process| process.status() == sysinfo::ProcessStatus::Zombie)
    }

    fn retry_strategy(&self) -> ExponentialBuilder {
        let retry = &self.config().lookup_retry;
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(retry.min_delay())
            .with_max_delay(retry.max_delay())
            .with_max_times(retry.retries());

        if !retry.use_exponential_backoff {
            builder = builder.with_factor(1.0);
        }
        if retry.jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

#[async_trait]
impl ProcessLookup for UnixProcessManager {
    async fn list_processes(&self) -> ProcessResult<Vec<ProcessInfo>> {
        let processes = self.snapshot();
        if !processes.is_empty() {
            return Ok(processes);
        }

        warn!("Process table enumeration returned nothing, falling back to ps");
        self.ps_snapshot().await
    }

    async fn is_running(&self, pid: ProcessId) -> bool {
        let Some(nix_pid) = to_nix_pid(pid) else {
            return false;
        };

        // Send signal 0 to check if process exists
        match signal::kill(nix_pid, None) {
            Ok(()) | Err(Errno::EPERM) => !self.is_zombie(pid),
            Err(_) => {
                debug!("Unix process {} is no longer running", pid);
                false
            }
        }
    }

    async fn find_supervisor_process_id(&self) -> ProcessResult<ProcessId> {
        if let Some(path) = &self.config().supervisor_pid_file {
            match tokio::fs::read_to_string(path).await {
                Ok(contents) => match contents.trim().parse::<u32>() {
                    Ok(raw) if self.is_running(ProcessId(raw)).await => {
                        return Ok(ProcessId(raw));
                    }
                    Ok(raw) => info!("Pid file {} names exited process {}", path.display(), raw),
                    Err(e) => warn!("Malformed pid file {}: {}", path.display(), e),
                },
                Err(e) => debug!("Unable to read pid file {}: {}", path.display(), e),
            }
        }

        match &self.config().supervisor_command {
            Some(command) => self.find_process_id(command).await,
            None => Err(ProcessError::NotFound("supervisor".to_string())),
        }
    }

    async fn wait_for_process_id(&self, command: &str) -> ProcessResult<ProcessId> {
        (|| async { self.find_process_id(command).await })
            .retry(self.retry_strategy())
            .when(|e: &ProcessError| e.is_retryable())
            .notify(|e, delay| debug!("Lookup of `{}` failed ({}), retrying in {:?}", command, e, delay))
            .await
    }
}
