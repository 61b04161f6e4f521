use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use super::types::{CancelToken, ProcessCommand, ProcessOutput};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output readers may lag behind a killed child before their
/// remaining output is abandoned.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

enum Exit {
    Finished(ExitStatus),
    TimedOut,
    Cancelled,
}

/// Run a process to completion and capture both output streams.
///
/// Both pipes are drained on their own threads so a chatty child can never
/// block on a full pipe while we poll for exit. On unix the child leads its
/// own process group; when the timeout elapses or `cancel` fires, the whole
/// group is killed and the output reports `timed_out` or `cancelled`.
pub fn run(cmd: &ProcessCommand, cancel: &CancelToken) -> std::io::Result<ProcessOutput> {
    tracing::debug!(command = %cmd, cwd = %cmd.cwd.display(), "spawning process");

    let mut command = Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .current_dir(&cmd.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command.spawn()?;

    let stdout_rx = drain(child.stdout.take());
    let stderr_rx = drain(child.stderr.take());

    let exit = wait(&mut child, cmd.timeout, cancel)?;

    // A killed child may leave orphans holding the pipes open.
    let grace = match exit {
        Exit::Finished(_) => None,
        Exit::TimedOut | Exit::Cancelled => Some(DRAIN_GRACE),
    };
    let stdout = collect(stdout_rx, grace);
    let stderr = collect(stderr_rx, grace);

    let mut output = ProcessOutput {
        stdout,
        stderr,
        ..ProcessOutput::default()
    };
    match exit {
        Exit::Finished(status) => {
            output.exit_code = status.code();
            output.success = status.success();
            tracing::debug!(command = %cmd, exit_code = ?output.exit_code, "process finished");
        }
        Exit::TimedOut => {
            output.timed_out = true;
            tracing::warn!(command = %cmd, "process timed out and was killed");
        }
        Exit::Cancelled => {
            output.cancelled = true;
            tracing::warn!(command = %cmd, "process cancelled and was killed");
        }
    }
    Ok(output)
}

fn wait(
    child: &mut Child,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> std::io::Result<Exit> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Exit::Finished(status));
        }

        if cancel.is_cancelled() {
            kill_group(child);
            return Ok(Exit::Cancelled);
        }

        if timeout.is_some_and(|t| start.elapsed() > t) {
            kill_group(child);
            return Ok(Exit::TimedOut);
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: kill() has no memory-safety preconditions. A negative pid
            // addresses the process group the child leads.
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

fn collect(rx: Option<Receiver<String>>, grace: Option<Duration>) -> String {
    let Some(rx) = rx else {
        return String::new();
    };
    match grace {
        Some(grace) => rx.recv_timeout(grace).unwrap_or_default(),
        None => rx.recv().unwrap_or_default(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str, timeout: Option<Duration>) -> ProcessCommand {
        ProcessCommand {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            cwd: PathBuf::from("."),
            timeout,
        }
    }

    fn run_sh(cmd: &ProcessCommand) -> std::io::Result<ProcessOutput> {
        run(cmd, &CancelToken::new())
    }

    #[test]
    fn captures_both_streams() {
        let out = run_sh(&sh("echo out; echo err >&2", None)).unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert!(!out.timed_out);
    }

    #[test]
    fn reports_non_zero_exit() {
        let out = run_sh(&sh("exit 3", Some(Duration::from_secs(10)))).unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
    }

    #[test]
    fn kills_process_after_timeout() {
        let out = run_sh(&sh("sleep 5", Some(Duration::from_millis(100)))).unwrap();
        assert!(!out.success);
        assert!(out.timed_out);
        assert_eq!(out.exit_code, None);
    }

    #[test]
    fn timeout_also_kills_forked_children() {
        let start = Instant::now();
        let out = run_sh(&sh("sleep 4; true", Some(Duration::from_millis(200)))).unwrap();
        assert!(out.timed_out);
        assert!(
            start.elapsed() < Duration::from_secs(3),
            "took {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn cancel_kills_the_running_process() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });

        let start = Instant::now();
        let out = run(&sh("sleep 5; echo late", None), &cancel).unwrap();
        assert!(out.cancelled);
        assert!(!out.success);
        assert!(!out.timed_out);
        assert!(!out.stdout.contains("late"));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn runs_in_the_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = sh("pwd", None);
        cmd.cwd = dir.path().to_path_buf();
        let out = run(&cmd, &CancelToken::new()).unwrap();
        let reported = PathBuf::from(out.stdout.trim_end());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn missing_program_is_an_io_error() {
        let cmd = ProcessCommand {
            program: "definitely-not-a-real-binary-xyz".into(),
            args: Vec::new(),
            cwd: PathBuf::from("."),
            timeout: None,
        };
        let err = run(&cmd, &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
