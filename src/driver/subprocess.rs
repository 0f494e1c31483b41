//! Subprocess command port.
//!
//! Owns one long-running line-mode emulator child (s3270 or compatible):
//! spawns it with the target host as the final argument, pumps stdout
//! through a reader thread into a channel, and drains stderr into a rolling
//! tail used to enrich transport errors.
//!
//! # Timeout discipline
//!
//! Response reads block on the reader thread; [`SubprocessPort::execute`]
//! waits on the channel with a hard timeout. A timeout is terminal: the
//! child is killed and stdin closed, so subsequent commands fail fast
//! instead of hanging behind a wedged emulator.

// Rust guideline compliant 2026-01

use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::constants::{COMMAND_READ_TIMEOUT, STDERR_TAIL_LIMIT};
use crate::driver::port::{CommandPort, Response};
use crate::errors::DriverError;

/// Command transport backed by a child process.
pub struct SubprocessPort {
    exec_path: PathBuf,
    args: Vec<String>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    lines: Option<Receiver<String>>,
    stderr_tail: Arc<Mutex<String>>,
}

impl std::fmt::Debug for SubprocessPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessPort")
            .field("exec_path", &self.exec_path)
            .field("args", &self.args)
            .field("running", &self.child.is_some())
            .finish()
    }
}

impl SubprocessPort {
    /// A port for the given emulator binary and argument vector. The last
    /// argument is expected to be the target host; the caller builds it.
    #[must_use]
    pub fn new(exec_path: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            exec_path: exec_path.into(),
            args,
            child: None,
            stdin: None,
            lines: None,
            stderr_tail: Arc::new(Mutex::new(String::new())),
        }
    }

    /// Kill the child and drop both pipe ends. Called on timeout and EOF so
    /// the next command fails with a clean transport error.
    fn fail(&mut self) {
        self.stdin = None;
        self.lines = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                log::warn!("[driver] failed to kill emulator child: {e}");
            }
            let _ = child.wait();
        }
    }

    /// Transport error carrying the recent stderr tail.
    fn transport_error(&self, message: &str) -> DriverError {
        let tail = self.stderr_tail();
        if tail.is_empty() {
            DriverError::Transport(message.to_string())
        } else {
            DriverError::Transport(format!("{message} (stderr: {tail})"))
        }
    }
}

/// Append to the rolling stderr tail, keeping only the newest bytes.
fn push_stderr(tail: &Mutex<String>, chunk: &str) {
    let mut tail = tail.lock().expect("stderr tail lock poisoned");
    tail.push_str(chunk);
    if tail.len() > STDERR_TAIL_LIMIT {
        let mut cut = tail.len() - STDERR_TAIL_LIMIT;
        while !tail.is_char_boundary(cut) {
            cut += 1;
        }
        tail.drain(..cut);
    }
}

impl CommandPort for SubprocessPort {
    fn start(&mut self) -> Result<(), DriverError> {
        // Respawning replaces any previous child.
        self.fail();
        self.stderr_tail
            .lock()
            .expect("stderr tail lock poisoned")
            .clear();

        log::info!(
            "[driver] spawning emulator {} {}",
            self.exec_path.display(),
            self.args.join(" ")
        );
        let mut child = Command::new(&self.exec_path)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DriverError::Transport(format!(
                    "failed to spawn {}: {e}",
                    self.exec_path.display()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriverError::Transport("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::Transport("child stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DriverError::Transport("child stderr unavailable".to_string()))?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            log::debug!("[driver] stdout reader thread exiting");
        });

        // Stderr must be drained even when nobody is looking at it, or the
        // child blocks on a full pipe.
        let tail = Arc::clone(&self.stderr_tail);
        thread::spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut buf = [0u8; 1024];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => push_stderr(&tail, &String::from_utf8_lossy(&buf[..n])),
                }
            }
            log::debug!("[driver] stderr reader thread exiting");
        });

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.lines = Some(rx);
        Ok(())
    }

    fn execute(&mut self, command: &str) -> Result<Response, DriverError> {
        if self.stdin.is_none() {
            return Err(self.transport_error("stdin closed"));
        }
        let written = {
            let stdin = self.stdin.as_mut().expect("stdin checked above");
            writeln!(stdin, "{command}").and_then(|()| stdin.flush())
        };
        if let Err(e) = written {
            let err = self.transport_error(&format!("broken pipe writing command: {e}"));
            self.fail();
            return Err(err);
        }

        let Some(rx) = self.lines.take() else {
            return Err(self.transport_error("emulator not started"));
        };

        let mut lines = Vec::new();
        loop {
            match rx.recv_timeout(COMMAND_READ_TIMEOUT) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == "ok" {
                        self.lines = Some(rx);
                        return Ok(Response::new(lines));
                    }
                    // Some emulators terminate a failed command with a bare
                    // `error` line instead of `ok`; keep it as a response
                    // line so the error predicate sees it.
                    if trimmed.eq_ignore_ascii_case("error") {
                        lines.push(line);
                        self.lines = Some(rx);
                        return Ok(Response::new(lines));
                    }
                    lines.push(line);
                }
                Err(RecvTimeoutError::Timeout) => {
                    let err = self.transport_error(&format!(
                        "response timed out after {}s",
                        COMMAND_READ_TIMEOUT.as_secs()
                    ));
                    self.fail();
                    return Err(err);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let err = self.transport_error("emulator terminated before ok");
                    self.fail();
                    return Err(err);
                }
            }
        }
    }

    fn close(&mut self) {
        self.fail();
    }

    fn is_alive(&mut self) -> bool {
        if self.stdin.is_none() {
            return false;
        }
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn stderr_tail(&self) -> String {
        self.stderr_tail
            .lock()
            .expect("stderr tail lock poisoned")
            .trim()
            .to_string()
    }
}

impl Drop for SubprocessPort {
    fn drop(&mut self) {
        self.fail();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_before_start_fails_cleanly() {
        let mut port = SubprocessPort::new("/nonexistent/s3270", vec![]);
        let err = port.execute("readbuffer ascii").expect_err("no child");
        assert!(matches!(err, DriverError::Transport(_)));
        assert!(!port.is_alive());
    }

    #[test]
    fn test_spawn_failure_is_transport_error() {
        let mut port = SubprocessPort::new("/nonexistent/s3270", vec!["host".to_string()]);
        let err = port.start().expect_err("spawn must fail");
        assert!(matches!(err, DriverError::Transport(_)));
    }

    #[test]
    fn test_stderr_tail_is_bounded() {
        let tail = Mutex::new(String::new());
        push_stderr(&tail, &"x".repeat(STDERR_TAIL_LIMIT));
        push_stderr(&tail, &"y".repeat(100));
        let tail = tail.lock().expect("lock");
        assert_eq!(tail.len(), STDERR_TAIL_LIMIT);
        assert!(tail.ends_with(&"y".repeat(100)));
    }

    // Exercise the full line dialogue against a real child without needing
    // an emulator: `cat` echoes each command line back, which never emits
    // `ok`, so the port must EOF-fail cleanly when stdin closes.
    #[test]
    fn test_eof_before_ok_is_transport_error() {
        let mut port = SubprocessPort::new("/bin/sh", vec!["-c".to_string(), "exit 0".to_string()]);
        if port.start().is_err() {
            // No /bin/sh in this environment; nothing further to assert.
            return;
        }
        let err = port.execute("readbuffer ascii").expect_err("child exited");
        assert!(matches!(err, DriverError::Transport(_)));
        assert!(!port.is_alive());
    }

    #[test]
    fn test_ok_terminated_dialogue() {
        // A tiny shell stand-in that answers every line with a status + ok.
        let script = r#"while read -r _line; do echo "U F U C(h) I 4 24 80 0 0 0x0 0.000"; echo "ok"; done"#;
        let mut port = SubprocessPort::new("/bin/sh", vec!["-c".to_string(), script.to_string()]);
        if port.start().is_err() {
            return;
        }
        let resp = port.execute("").expect("dialogue");
        assert_eq!(resp.lines.len(), 1);
        assert!(resp.status().expect("status").starts_with("U F"));
        assert!(port.is_alive());
        port.close();
        assert!(!port.is_alive());
    }
}
