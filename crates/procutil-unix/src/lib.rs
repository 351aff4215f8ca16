//! Unix process management: tokio child processes, `nix` signals and a
//! `sysinfo` process table.

#[cfg(unix)]
mod handle;
#[cfg(unix)]
mod lookup;
#[cfg(unix)]
mod termination;
#[cfg(unix)]
mod unix_process_manager;

#[cfg(unix)]
pub use handle::UnixProcessHandle;
#[cfg(unix)]
pub use unix_process_manager::UnixProcessManager;

#[cfg(unix)]
pub struct UnixProcessManagerFactory;

#[cfg(unix)]
impl procutil_core::ProcessManagerFactory for UnixProcessManagerFactory {
    type Manager = UnixProcessManager;

    fn create_process_manager(config: &procutil_core::ProcessUtilConfig) -> Self::Manager {
        <UnixProcessManager as procutil_core::ProcessManager>::new(config)
    }

    fn platform_name() -> &'static str {
        "Unix"
    }
}
