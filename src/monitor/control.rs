use std::fmt;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::time::{Instant, sleep};

/// How long `request_terminate` waits for the process to go away.
pub const TERMINATE_WAIT: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminateOutcome {
    Terminated,
    /// SIGTERM was delivered but the process outlived the wait.
    TimedOut,
    NotFound,
    PermissionDenied,
    Failed(String),
}

impl fmt::Display for TerminateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminateOutcome::Terminated => write!(f, "terminated"),
            TerminateOutcome::TimedOut => {
                write!(f, "still alive after SIGTERM, use force kill")
            }
            TerminateOutcome::NotFound => write!(f, "no such process"),
            TerminateOutcome::PermissionDenied => write!(f, "permission denied"),
            TerminateOutcome::Failed(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillOutcome {
    Killed,
    NotFound,
    PermissionDenied,
    Failed(String),
}

impl fmt::Display for KillOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillOutcome::Killed => write!(f, "killed"),
            KillOutcome::NotFound => write!(f, "no such process"),
            KillOutcome::PermissionDenied => write!(f, "permission denied"),
            KillOutcome::Failed(reason) => write!(f, "{reason}"),
        }
    }
}

/// Graceful stop: SIGTERM, then poll with the null signal until the pid
/// stops answering or the wait expires. Safe to call on a pid that is
/// already gone.
pub async fn request_terminate(pid: u32) -> TerminateOutcome {
    let target = Pid::from_raw(pid as i32);
    match signal::kill(target, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return TerminateOutcome::NotFound,
        Err(Errno::EPERM) => return TerminateOutcome::PermissionDenied,
        Err(err) => return TerminateOutcome::Failed(format!("SIGTERM failed: {err}")),
    }
    let deadline = Instant::now() + TERMINATE_WAIT;
    while Instant::now() < deadline {
        sleep(POLL_INTERVAL).await;
        // Null signal probes for existence without delivering anything.
        if signal::kill(target, None) == Err(Errno::ESRCH) {
            return TerminateOutcome::Terminated;
        }
    }
    TerminateOutcome::TimedOut
}

/// Unconditional SIGKILL. Does not wait for the process to disappear beyond
/// the signal being accepted.
pub fn force_kill(pid: u32) -> KillOutcome {
    match signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => KillOutcome::Killed,
        Err(Errno::ESRCH) => KillOutcome::NotFound,
        Err(Errno::EPERM) => KillOutcome::PermissionDenied,
        Err(err) => KillOutcome::Failed(format!("SIGKILL failed: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Child, Command};

    // Below the default pid_max, but never handed out on a live system
    // during a short test run.
    const FREE_PID: u32 = 4_194_303;

    fn spawn_sleeper() -> Child {
        Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawning sleep")
    }

    #[tokio::test]
    async fn terminate_missing_pid_reports_not_found() {
        assert_eq!(request_terminate(FREE_PID).await, TerminateOutcome::NotFound);
    }

    #[test]
    fn kill_missing_pid_reports_not_found() {
        assert_eq!(force_kill(FREE_PID), KillOutcome::NotFound);
    }

    #[tokio::test]
    async fn terminate_stops_a_cooperative_process() {
        let mut child = spawn_sleeper();
        let pid = child.id();
        // Reap concurrently: an unreaped zombie still answers the null
        // signal and would read as "still alive".
        let reaper = std::thread::spawn(move || child.wait());
        let outcome = request_terminate(pid).await;
        assert_eq!(outcome, TerminateOutcome::Terminated);
        reaper.join().unwrap().expect("reaping child");
    }

    #[test]
    fn force_kill_sends_sigkill() {
        let mut child = spawn_sleeper();
        assert_eq!(force_kill(child.id()), KillOutcome::Killed);
        child.wait().expect("reaping child");
    }
}
