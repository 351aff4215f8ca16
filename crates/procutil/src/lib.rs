//! procutil - launch, inspect and terminate external processes
//!
//! ```rust,no_run
//! use procutil::{ProcessUtil, ProcessUtilConfig};
//!
//! async fn example() -> procutil::ProcessResult<()> {
//!     let util = ProcessUtil::new(&ProcessUtilConfig::default())?;
//!     let stats = util.run_with_handle("echo hello").await?;
//!     assert_eq!(stats.stdout_string(), "hello\n");
//!
//!     util.run("sleep 5", false, false).await?;
//!     let pid = util.wait_for_process_id("sleep 5").await?;
//!     util.stop_and_kill(pid).await?;
//!     Ok(())
//! }
//! ```

#[cfg(not(unix))]
compile_error!("procutil supports Unix-like platforms only");

mod factory;
mod process_util;

pub use factory::{PlatformProcessHandle, PlatformProcessManager, PlatformProcessManagerFactory};
pub use process_util::ProcessUtil;

// Re-export core functionality
pub use procutil_core::*;
