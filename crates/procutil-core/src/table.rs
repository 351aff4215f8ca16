//! Matching against process table snapshots.
//!
//! Command lines are compared as the table reports them: argv joined by
//! single spaces. A pattern matches when it is a substring of that line.

use crate::process::{ProcessId, ProcessInfo};

fn candidates<'a>(processes: &'a [ProcessInfo], pattern: &str) -> Vec<&'a ProcessInfo> {
    if pattern.trim().is_empty() {
        return Vec::new();
    }
    let mut matches: Vec<&ProcessInfo> = processes
        .iter()
        .filter(|p| p.command_line().contains(pattern))
        .collect();
    matches.sort_by_key(|p| p.pid);
    matches
}

/// Exact command-line match first, otherwise the lowest matching pid
pub fn select_by_command(processes: &[ProcessInfo], command: &str) -> Option<ProcessId> {
    let matches = candidates(processes, command);
    matches
        .iter()
        .find(|p| p.command_line() == command)
        .or_else(|| matches.first())
        .map(|p| p.pid)
}

pub fn select_by_command_and_args(
    processes: &[ProcessInfo],
    command: &str,
    args: &[String],
) -> Option<ProcessId> {
    candidates(processes, command)
        .into_iter()
        .find(|p| {
            let line = p.command_line();
            args.iter().all(|arg| line.contains(arg.as_str()))
        })
        .map(|p| p.pid)
}

pub fn matching_pids(processes: &[ProcessInfo], pattern: &str) -> Vec<ProcessId> {
    candidates(processes, pattern)
        .into_iter()
        .map(|p| p.pid)
        .collect()
}

/// Descendants of `root`, each child listed after its own descendants
pub fn descendants(processes: &[ProcessInfo], root: ProcessId) -> Vec<ProcessId> {
    let mut result = Vec::new();
    collect_descendants(processes, root, &mut result);
    result
}

fn collect_descendants(processes: &[ProcessInfo], parent: ProcessId, result: &mut Vec<ProcessId>) {
    for process in processes.iter().filter(|p| p.parent == Some(parent)) {
        // guard against pid reuse forming a cycle
        if process.pid == parent || result.contains(&process.pid) {
            continue;
        }
        collect_descendants(processes, process.pid, result);
        result.push(process.pid);
    }
}

/// Parse `ps -eo pid=,ppid=,args=` output.
///
/// Lines that do not start with two numeric columns are skipped.
pub fn parse_ps_output(output: &str) -> Vec<ProcessInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let pid = tokens.next()?.parse::<u32>().ok()?;
            let ppid = tokens.next()?.parse::<u32>().ok()?;
            let cmd: Vec<String> = tokens.map(str::to_string).collect();
            let name = cmd
                .first()
                .map(|program| program.rsplit('/').next().unwrap_or(program).to_string())
                .unwrap_or_default();
            Some(ProcessInfo {
                pid: ProcessId(pid),
                parent: (ppid != 0).then_some(ProcessId(ppid)),
                name,
                cmd,
            })
        })
        .collect()
}
