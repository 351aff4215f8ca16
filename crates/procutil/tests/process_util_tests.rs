use anyhow::{Context, Result, bail, ensure};
use procutil::{
    CommandLine, ProcessError, ProcessHandle, ProcessId, ProcessStatus, ProcessUtil,
    ProcessUtilConfig, RetryConfig, TerminationResult,
};
use std::path::PathBuf;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_file(true)
        .with_thread_ids(false)
        .with_target(false)
        .with_line_number(true)
        .with_test_writer()
        .try_init();
}

fn util() -> ProcessUtil {
    init_tracing();
    let config = ProcessUtilConfig::builder()
        .lookup_retry(RetryConfig::aggressive())
        .grace_period_ms(1_000u64)
        .build()
        .expect("valid config");
    ProcessUtil::new(&config).expect("valid config")
}

/// A shell script and the output file it writes, both unique to one test
struct Script {
    path: PathBuf,
    output: PathBuf,
}

impl Script {
    fn new(name: &str) -> Self {
        let tag = format!("procutil_{}_{}", name, std::process::id());
        let dir = std::env::temp_dir();
        Self {
            path: dir.join(format!("{tag}.sh")),
            output: dir.join(format!("{tag}.txt")),
        }
    }

    fn write(&self, lines: &[String]) -> Result<()> {
        let _ = std::fs::remove_file(&self.output);
        std::fs::write(&self.path, lines.join("\n") + "\n")
            .with_context(|| format!("writing {}", self.path.display()))
    }

    fn path(&self) -> String {
        self.path.display().to_string()
    }

    fn command(&self) -> String {
        format!("/bin/sh {}", self.path())
    }

    fn echo_to_output(&self, value: i32) -> String {
        format!("echo {value} > {}", self.output.display())
    }

    /// Poll until the output file holds `expected`
    async fn wait_for_output(&self, expected: &str) -> Result<()> {
        let mut last = String::new();
        for _ in 0..50 {
            if let Ok(contents) = std::fs::read_to_string(&self.output) {
                if contents == expected {
                    return Ok(());
                }
                last = contents;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        bail!("expected {expected:?} in {}, found {last:?}", self.output.display())
    }
}

impl Drop for Script {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = std::fs::remove_file(&self.output);
    }
}

#[tokio::test]
async fn test_run_wait_foreground() -> Result<()> {
    let util = util();
    let script = Script::new("wait_foreground");

    for value in [0, 1, 2] {
        script.write(&[format!("exit {value}")])?;
        let code = util.run(script.command(), true, false).await?;
        assert_eq!(code, value);
    }
    Ok(())
}

#[tokio::test]
async fn test_start_defaults_to_wait() -> Result<()> {
    let util = util();
    let script = Script::new("start");

    for value in [0, 1, 2] {
        script.write(&[format!("exit {value}")])?;
        assert_eq!(util.start(script.command()).await?, value);
    }
    Ok(())
}

#[tokio::test]
async fn test_run_no_wait_foreground() -> Result<()> {
    let util = util();
    let script = Script::new("no_wait_foreground");

    for value in [0, 1, 2] {
        script.write(&["sleep 1".to_string(), script.echo_to_output(value)])?;

        let code = util.run(script.command(), false, false).await?;
        assert_eq!(code, 0);

        let pid = util.wait_for_process_id(&script.command()).await?;
        assert!(pid.as_u32() > 0);
        assert!(util.wait_until_exited(pid, 30).await, "process {pid} did not finish");

        script.wait_for_output(&format!("{value}\n")).await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_run_wait_background() -> Result<()> {
    let util = util();
    let script = Script::new("wait_background");

    for value in [0, 1, 2] {
        script.write(&[script.echo_to_output(value), format!("exit {}", value + 3)])?;

        // the launcher's own code, not the job's
        let code = util.run(script.command(), true, true).await?;
        assert_eq!(code, 0);

        script.wait_for_output(&format!("{value}\n")).await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_run_no_wait_background() -> Result<()> {
    let util = util();
    let script = Script::new("no_wait_background");

    for value in [0, 1, 2] {
        script.write(&["sleep 1".to_string(), script.echo_to_output(value)])?;

        let code = util.start_background(format!("{} &", script.command()), false).await?;
        assert_eq!(code, 0);

        let pid = util.wait_for_process_id(&script.command()).await?;
        assert!(pid.as_u32() > 0);
        assert!(util.wait_until_exited(pid, 30).await, "process {pid} did not finish");

        script.wait_for_output(&format!("{value}\n")).await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_run_argv_wait() -> Result<()> {
    let util = util();
    let script = Script::new("argv_wait");

    let path = script.path();

    for value in [0, 1, 2] {
        script.write(&[format!("exit {value}")])?;
        let code = util.run_argv(["/bin/sh", path.as_str()], true).await?;
        assert_eq!(code, value);
    }
    Ok(())
}

#[tokio::test]
async fn test_run_argv_no_wait() -> Result<()> {
    let util = util();
    let script = Script::new("argv_no_wait");

    for value in [0, 1, 2] {
        script.write(&["sleep 1".to_string(), script.echo_to_output(value)])?;

        let argv = ["/bin/sh".to_string(), script.path()];
        assert_eq!(util.run_argv(&argv, false).await?, 0);

        let pid = util.wait_for_process_id(&argv.join(" ")).await?;
        assert!(pid.as_u32() > 0);
        assert!(util.wait_until_exited(pid, 30).await, "process {pid} did not finish");

        script.wait_for_output(&format!("{value}\n")).await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_run_with_handle_string() -> Result<()> {
    let util = util();
    let script = Script::new("with_handle_string");

    for value in [1, 0, 1, 2] {
        script.write(&[
            "echo stdout".to_string(),
            "echo stderr 1>&2".to_string(),
            format!("exit {value}"),
        ])?;

        let stats = util.run_with_handle(script.command()).await?;
        assert_eq!(stats.exit_code(), value);
        assert_eq!(stats.stdout_string(), "stdout\n");
        assert_eq!(stats.stderr_string(), "stderr\n");
    }
    Ok(())
}

#[tokio::test]
async fn test_run_with_handle_argv() -> Result<()> {
    let util = util();
    let script = Script::new("with_handle_argv");

    for value in [1, 0, 1, 2] {
        script.write(&[
            "echo stdout".to_string(),
            "echo stderr 1>&2".to_string(),
            format!("exit {value}"),
        ])?;

        let stats = util
            .run_with_handle(CommandLine::argv(["/bin/sh".to_string(), script.path()]))
            .await?;
        assert_eq!(stats.exit_code(), value);
        assert_eq!(stats.process_stdout(), b"stdout\n");
        assert_eq!(stats.process_stderr(), b"stderr\n");
    }
    Ok(())
}

#[tokio::test]
async fn test_find_process_id_and_kill() -> Result<()> {
    let util = util();

    assert_eq!(util.run("sleep 7", false, false).await?, 0);

    let pid = util.wait_for_process_id("sleep 7").await?;
    assert!(pid.as_u32() > 0);
    assert!(util.is_running(pid).await);

    assert_eq!(util.kill(pid).await?, TerminationResult::Success);
    assert!(util.wait_until_exited(pid, 30).await);
    Ok(())
}

#[tokio::test]
async fn test_find_process_id_with_args() -> Result<()> {
    let util = util();
    let command_name = "echo";
    let command_args = ["aaa", "bbb", "ccc", "&&", "sleep", "6"];
    let command = format!("{command_name} {}", command_args.join(" "));

    assert_eq!(util.run(command, false, false).await?, 0);

    let pid = util
        .find_process_id_with_args(command_name, &command_args)
        .await?;
    assert!(pid.as_u32() > 0);

    util.kill(pid).await?;
    assert!(util.wait_until_exited(pid, 30).await);
    Ok(())
}

#[tokio::test]
async fn test_find_process_id_not_found() {
    let util = util();
    let err = util
        .find_process_id("procutil-no-such-process-41b7")
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::NotFound(_)));
    assert!(err.is_retryable());

    let err = util
        .find_process_id_with_args("procutil-no-such-process-41b7", &["x"])
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::NotFound(_)));
}

#[tokio::test]
async fn test_termination_is_idempotent() -> Result<()> {
    let util = util();
    let stats = util.run_with_handle("exit 0").await?;
    let pid = stats.pid().context("finished process has a pid")?;

    assert!(!util.is_running(pid).await);
    assert_eq!(util.kill(pid).await?, TerminationResult::ProcessNotFound);
    assert_eq!(util.terminate(pid).await?, TerminationResult::ProcessNotFound);
    assert_eq!(util.stop_and_kill(pid).await?, TerminationResult::ProcessNotFound);
    assert_eq!(
        util.kill(ProcessId(0)).await?,
        TerminationResult::ProcessNotFound
    );
    Ok(())
}

#[tokio::test]
async fn test_kill_all() -> Result<()> {
    let util = util();
    util.run_argv(["sleep", "9"], false).await?;
    util.run_argv(["sleep", "9"], false).await?;

    let mut pids = Vec::new();
    for _ in 0..50 {
        pids = util.find_process_ids("sleep 9").await?;
        if pids.len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    ensure!(pids.len() == 2, "expected two sleepers, found {pids:?}");

    let killed = util.kill_all("sleep 9").await?;
    assert_eq!(killed, pids);
    for pid in killed {
        assert!(util.wait_until_exited(pid, 30).await);
    }
    assert!(util.kill_all("sleep 9").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_spawn_drains_both_streams() -> Result<()> {
    let util = util();
    let mut handle = util
        .spawn("read line; echo \"out:$line\"; echo \"err:$line\" 1>&2; exit 4")
        .await?;

    {
        use tokio::io::AsyncWriteExt;
        let stdin = handle.process_stdin().context("stdin is piped")?;
        stdin.write_all(b"ping\n").await?;
    }
    handle.close_stdin();

    let mut stdout = handle.take_stdout().context("stdout is piped")?;
    let mut stderr = handle.take_stderr().context("stderr is piped")?;
    let (out, err) = tokio::try_join!(
        procutil::stdio::read_stream_to_string(&mut stdout),
        procutil::stdio::read_stream_to_string(&mut stderr),
    )?;

    assert_eq!(out, "out:ping\n");
    assert_eq!(err, "err:ping\n");
    assert_eq!(handle.wait().await?, ProcessStatus::Exited(4));
    assert_eq!(handle.exit_code()?, 4);
    Ok(())
}

#[tokio::test]
async fn test_process_info_for_spawned_process() -> Result<()> {
    let util = util();
    let mut handle = util.spawn(CommandLine::argv(["sleep", "8"])).await?;
    let pid = handle.pid().context("spawned process has a pid")?;

    let info = util.process_info(pid).await?;
    assert_eq!(info.command_line(), "sleep 8");
    assert_eq!(info.parent, Some(ProcessId(std::process::id())));

    assert_eq!(
        util.terminate_process_tree(pid).await?,
        TerminationResult::Success
    );
    assert_eq!(handle.wait().await?, ProcessStatus::Signaled(15));
    Ok(())
}

#[tokio::test]
async fn test_wait_for_exit_with_timeout() -> Result<()> {
    let util = util();
    let mut handle = util.spawn("sleep 5").await?;

    let err = util
        .wait_for_exit(&mut handle, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::Timeout));

    handle.kill().await?;
    assert!(!handle.is_running().await);
    Ok(())
}

#[tokio::test]
async fn test_shared_component() {
    let util = util();
    let clone = util.clone();
    assert_eq!(clone.config(), util.config());
    assert_eq!(util.config().grace_period(), Duration::from_secs(1));
    assert_eq!(ProcessUtil::platform_name(), "Unix");
    assert_eq!(ProcessUtil::default().config().shell, "/bin/sh");
}

#[test]
fn test_new_rejects_invalid_config() {
    let config = ProcessUtilConfig {
        poll_interval_ms: 0,
        ..Default::default()
    };
    let result = ProcessUtil::new(&config);
    assert!(matches!(result, Err(ProcessError::Config(_))));
}
