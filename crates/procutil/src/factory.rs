use procutil_core::{ProcessManagerFactory, ProcessUtilConfig};

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformProcessManagerFactory;

impl ProcessManagerFactory for PlatformProcessManagerFactory {
    #[cfg(unix)]
    type Manager = procutil_unix::UnixProcessManager;

    fn create_process_manager(config: &ProcessUtilConfig) -> Self::Manager {
        procutil_unix::UnixProcessManagerFactory::create_process_manager(config)
    }

    fn platform_name() -> &'static str {
        procutil_unix::UnixProcessManagerFactory::platform_name()
    }
}

/// Process manager for the current platform
pub type PlatformProcessManager = <PlatformProcessManagerFactory as ProcessManagerFactory>::Manager;

/// Live process handle for the current platform
pub type PlatformProcessHandle =
    <PlatformProcessManager as procutil_core::ProcessLauncher>::Handle;
