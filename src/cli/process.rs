use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Pid, Signal, System};
use tracing::info;

const DAEMON_ARGS: [&str; 2] = ["remind", "serve"];

/// Checks whether a command line belongs to a reminder daemon, `chartme ... remind serve`.
pub fn is_daemon_command(cmd: &[OsString]) -> bool {
    cmd.windows(DAEMON_ARGS.len())
        .any(|window| window.iter().zip(DAEMON_ARGS).all(|(arg, expected)| arg == expected))
}

fn current_exe() -> Result<PathBuf> {
    env::current_exe().map_err(|e| anyhow!("Can't operate without an executable {e}"))
}

/// Lists reminder daemons started from `exe`, ignoring the current process and its children.
fn find_daemons(system: &System, exe: &Path) -> Result<Vec<Pid>> {
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't get current pid {e}"))?;
    Ok(system
        .processes()
        .iter()
        .filter(|(pid, _)| **pid != current_id)
        .filter(|(_, process)| !matches!(process.parent(), Some(p) if p == current_id))
        .filter(|(_, process)| process.exe().filter(|v| v.exists()).is_some_and(|v| v == exe))
        .filter(|(_, process)| is_daemon_command(process.cmd()))
        .map(|(pid, _)| *pid)
        .collect())
}

pub fn running_daemons() -> Result<usize> {
    let system = System::new_all();
    Ok(find_daemons(&system, &current_exe()?)?.len())
}

/// Stops every running reminder daemon. Returns how many were stopped.
pub fn stop_reminder_daemons() -> Result<usize> {
    let system = System::new_all();
    let daemons = find_daemons(&system, &current_exe()?)?;
    for pid in &daemons {
        let Some(process) = system.process(*pid) else {
            continue;
        };
        info!("Stopping reminder daemon {pid}");
        // This will forcefully terminate the process on Windows.
        if process.kill_with(Signal::Term).is_none() {
            process.kill();
        }
        process.wait();
    }
    Ok(daemons.len())
}

/// Replaces running reminder daemons with a fresh detached `remind serve` process working on
/// `dir`.
pub fn restart_reminder_daemon(dir: &Path) -> Result<()> {
    stop_reminder_daemons()?;

    let mut command = std::process::Command::new(current_exe()?);
    command.arg("--dir").arg(dir).args(DAEMON_ARGS);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    #[allow(clippy::zombie_processes)]
    let child = command.spawn()?;
    info!("Spawned reminder daemon {}", child.id());
    Ok(())
}
