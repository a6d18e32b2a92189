use crate::error::{Error, Result};
use std::{
    ffi::OsStr,
    io::Read as _,
    process::{Child, Command, Stdio},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

/// Runs `prog` and returns its stdout, killing it after `timeout`
pub fn make_call<S: AsRef<OsStr>>(
    name: &str,
    prog: &str,
    args: &[S],
    timeout: Duration,
) -> Result<String> {
    let mut child = Command::new(prog)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| Error::Spawn {
            name: name.to_owned(),
            source,
        })?;
    let deadline = Instant::now() + timeout;

    let Some(mut stdout) = child.stdout.take() else {
        kill(&mut child);
        return Err(Error::Output {
            name: name.to_owned(),
            source: std::io::Error::other("no stdout pipe"),
        });
    };

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = tx.send(stdout.read_to_end(&mut buf).map(|_| buf));
    });

    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(Ok(output)) => {
            log_call_output(&output);
            if !wait_until(&mut child, deadline) {
                kill(&mut child);
                return Err(Error::Timeout {
                    name: name.to_owned(),
                    timeout,
                });
            }
            Ok(String::from_utf8_lossy(&output).into_owned())
        }
        Ok(Err(source)) => {
            kill(&mut child);
            Err(Error::Output {
                name: name.to_owned(),
                source,
            })
        }
        Err(_) => {
            kill(&mut child);
            Err(Error::Timeout {
                name: name.to_owned(),
                timeout,
            })
        }
    }
}

/// Starts `prog` without waiting for it; a watcher thread reaps it and
/// kills it once `timeout` has passed
pub fn spawn_detached<S: AsRef<OsStr>>(
    name: &str,
    prog: &str,
    args: &[S],
    timeout: Duration,
) -> Result<()> {
    let mut child = Command::new(prog)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| Error::Spawn {
            name: name.to_owned(),
            source,
        })?;

    let name = name.to_owned();
    let deadline = Instant::now() + timeout;
    thread::spawn(move || loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() >= deadline => {
                log::warn!("command {} still running after {:?}, killing it", name, timeout);
                kill(&mut child);
                return;
            }
            Ok(None) => thread::sleep(Duration::from_millis(100)),
            Err(err) => {
                log::debug!("waiting for {} failed: {}", name, err);
                return;
            }
        }
    });
    Ok(())
}

/// Reaps `child` if it exits before `deadline`
fn wait_until(child: &mut Child, deadline: Instant) -> bool {
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) if Instant::now() >= deadline => return false,
            Ok(None) => thread::sleep(Duration::from_millis(10)),
            Err(err) => {
                log::debug!("waiting for child failed: {}", err);
                return false;
            }
        }
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn log_call_output(output: &[u8]) {
    log::trace!("\"\"\"{}\"\"\"", String::from_utf8_lossy(output));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let out = make_call("echo", "sh", &["-c", "echo hello"], Duration::from_secs(5)).unwrap();
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn missing_program() {
        let res = make_call::<&str>("nope", "/nonexistent/prog", &[], Duration::from_secs(1));
        assert!(matches!(res, Err(Error::Spawn { .. })));
    }

    #[test]
    fn kills_after_timeout() {
        let start = Instant::now();
        let res = make_call("sleep", "sleep", &["10"], Duration::from_millis(200));
        assert!(matches!(res, Err(Error::Timeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn kills_child_that_closes_stdout_early() {
        let start = Instant::now();
        let res = make_call(
            "sh",
            "sh",
            &["-c", "echo partial; exec >&-; sleep 10"],
            Duration::from_millis(300),
        );
        assert!(matches!(res, Err(Error::Timeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn detached_returns_immediately() {
        let start = Instant::now();
        spawn_detached("sleep", "sleep", &["2"], Duration::from_millis(300)).unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
