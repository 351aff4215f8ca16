use crate::UnixProcessManager;
use crate::lookup::to_nix_pid;
use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use procutil_core::{
    ProcessError, ProcessId, ProcessLookup, ProcessManager, ProcessResult, ProcessTermination,
    TerminationResult,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

impl UnixProcessManager {
    /// Deliver `sig` to a single process. Exited and unknown pids are a
    /// no-op, never an error.
    async fn send_signal(&self, pid: ProcessId, sig: Signal) -> ProcessResult<TerminationResult> {
        let Some(nix_pid) = to_nix_pid(pid) else {
            return Ok(TerminationResult::ProcessNotFound);
        };

        if !self.is_running(pid).await {
            info!("Process {} not found (already terminated)", pid);
            return Ok(TerminationResult::ProcessNotFound);
        }

        match signal::kill(nix_pid, sig) {
            Ok(()) => {
                info!("Sent {} to process {}", sig, pid);
                Ok(TerminationResult::Success)
            }
            Err(errno) => signal_failure(pid, sig, errno),
        }
    }
}

/// Map a failed `kill(2)`: ESRCH means the process is already gone,
/// everything else is surfaced.
pub(crate) fn signal_failure(
    pid: ProcessId,
    sig: Signal,
    errno: Errno,
) -> ProcessResult<TerminationResult> {
    match errno {
        Errno::ESRCH => {
            info!("Process {} not found (already terminated)", pid);
            Ok(TerminationResult::ProcessNotFound)
        }
        Errno::EPERM => {
            warn!("Permission denied to send {} to process {}", sig, pid);
            Err(ProcessError::PermissionDenied(pid))
        }
        e => {
            warn!("Failed to send {} to process {}: {}", sig, pid, e);
            Err(ProcessError::Signal {
                pid,
                reason: format!("{sig} failed: {e}"),
            })
        }
    }
}

#[async_trait]
impl ProcessTermination for UnixProcessManager {
    async fn terminate(&self, pid: ProcessId) -> ProcessResult<TerminationResult> {
        self.send_signal(pid, Signal::SIGTERM).await
    }

    async fn kill(&self, pid: ProcessId) -> ProcessResult<TerminationResult> {
        self.send_signal(pid, Signal::SIGKILL).await
    }

    async fn terminate_then_kill(
        &self,
        pid: ProcessId,
        grace_period: Duration,
    ) -> ProcessResult<TerminationResult> {
        if self.terminate(pid).await? == TerminationResult::ProcessNotFound {
            return Ok(TerminationResult::ProcessNotFound);
        }

        let poll_interval = self.config().poll_interval();
        // A grace period too large to represent means no deadline at all
        let deadline = Instant::now().checked_add(grace_period);
        loop {
            if !self.is_running(pid).await {
                return Ok(TerminationResult::Success);
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    poll_interval.min(deadline - now)
                }
                None => poll_interval,
            };
            tokio::time::sleep(pause).await;
        }

        warn!(
            "Process {} still running {:?} after SIGTERM, sending SIGKILL",
            pid, grace_period
        );
        match self.kill(pid).await? {
            TerminationResult::ProcessNotFound => Ok(TerminationResult::Success),
            _ => Ok(TerminationResult::Escalated),
        }
    }
}
