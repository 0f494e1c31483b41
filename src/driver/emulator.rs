//! The emulator driver: the command dialogue over a [`CommandPort`].
//!
//! This is where the 3270 conversation rules live: readiness polling after
//! spawn, keyboard-lock synchronization around AID keys, the `Key(…)`
//! fallback for raw key names the emulator rejects, disconnect detection
//! with a one-shot reconnect, and the per-character typing protocol used to
//! submit fields.
//!
//! The port mutex is held for each full round trip — including the
//! `Wait(Unlock, …)` that follows a locking AID key — so concurrent callers
//! serialize cleanly behind one another.

// Rust guideline compliant 2026-01

use std::sync::Mutex;
use std::thread;

use crate::constants::{
    DEFAULT_MODEL_COLS, DEFAULT_MODEL_ROWS, LOCKED_BUFFER_RETRIES, LOCKED_BUFFER_RETRY_INTERVAL,
    READY_POLL_ATTEMPTS, READY_POLL_INTERVAL, UNLOCK_WAIT_SECS,
};
use crate::driver::port::{CommandPort, Response};
use crate::driver::{key_command, movecursor_command, validate_key, TerminalDriver};
use crate::errors::DriverError;
use crate::keys::{is_aid_key, key_to_key_spec};
use crate::screen::decode::decode_response;
use crate::screen::status::{keyboard_unlocked, line_is_error, StatusLine};
use crate::screen::Screen;

/// Driver for a line-mode 3270 emulator reachable through a [`CommandPort`].
pub struct EmulatorDriver {
    port: Mutex<Box<dyn CommandPort>>,
    screen: Mutex<Screen>,
    target: String,
}

impl std::fmt::Debug for EmulatorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmulatorDriver")
            .field("target", &self.target)
            .finish()
    }
}

/// Validate a response and pull out its status line.
///
/// Empty responses synthesize a "no status received" transport error
/// enriched with the stderr tail; error lines map to protocol errors unless
/// they name a lost connection; a status line whose connection field is "N"
/// maps to a disconnect.
fn check_response(resp: &Response, stderr_tail: &str) -> Result<String, DriverError> {
    if resp.lines.is_empty() {
        let mut msg = "no status received".to_string();
        if !stderr_tail.is_empty() {
            msg.push_str(&format!(" (stderr: {stderr_tail})"));
        }
        return Err(DriverError::Transport(msg));
    }

    if let Some(line) = resp.lines.iter().find(|l| line_is_error(l)) {
        let line = line.trim().to_string();
        if line.to_lowercase().contains("not connected") {
            return Err(DriverError::Disconnected(line));
        }
        return Err(DriverError::Protocol(line));
    }

    let status = resp.status().unwrap_or_default().to_string();
    if let Some(parsed) = StatusLine::parse(&status) {
        if parsed.is_disconnected() {
            return Err(DriverError::Disconnected(status));
        }
    }
    Ok(status)
}

/// Poll an already-spawned emulator until it reports unlocked + formatted.
fn wait_ready(port: &mut dyn CommandPort) -> Result<(), DriverError> {
    for _ in 0..READY_POLL_ATTEMPTS {
        let resp = port.execute("")?;
        if let Some(status) = resp.status() {
            if status.starts_with("U F") {
                return Ok(());
            }
        }
        thread::sleep(READY_POLL_INTERVAL);
    }
    let tail = port.stderr_tail();
    let mut msg = "emulator did not become ready (want \"U F\" status)".to_string();
    if !tail.is_empty() {
        msg.push_str(&format!(" (stderr: {tail})"));
    }
    Err(DriverError::Transport(msg))
}

/// Re-establish a dropped conversation: a live child is asked to redial the
/// host with `Connect(…)`, a dead one is respawned; either way readiness is
/// re-polled before the caller's operation is replayed.
fn reconnect_port(port: &mut dyn CommandPort, target: &str) -> Result<(), DriverError> {
    if port.is_alive() {
        log::info!("[driver] redialing {target}");
        let resp = port.execute(&format!("Connect({target})"))?;
        if resp.has_error() {
            return Err(DriverError::Disconnected(format!(
                "Connect({target}) failed: {}",
                resp.status().unwrap_or_default()
            )));
        }
    } else {
        log::info!("[driver] respawning emulator for {target}");
        port.start()?;
    }
    wait_ready(port)
}

impl EmulatorDriver {
    /// A driver over the given port, targeting `target` (host or
    /// host:port as the emulator expects it).
    #[must_use]
    pub fn new(port: Box<dyn CommandPort>, target: impl Into<String>) -> Self {
        Self {
            port: Mutex::new(port),
            screen: Mutex::new(Screen::blank(DEFAULT_MODEL_ROWS, DEFAULT_MODEL_COLS)),
            target: target.into(),
        }
    }

    /// The host this driver dials.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Run `op` under the port mutex; on a connection-level failure,
    /// reconnect once and replay it.
    fn with_reconnect<T>(
        &self,
        op: impl Fn(&mut dyn CommandPort) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        let mut port = self.port.lock().expect("port lock poisoned");
        match op(port.as_mut()) {
            Err(e) if e.is_connection_error() => {
                log::warn!("[driver] {e}; reconnecting to {}", self.target);
                reconnect_port(port.as_mut(), &self.target)?;
                op(port.as_mut())
            }
            other => other,
        }
    }

    /// One `readbuffer ascii` cycle, retrying while the keyboard is locked.
    fn read_buffer(port: &mut dyn CommandPort) -> Result<Screen, DriverError> {
        for _ in 0..LOCKED_BUFFER_RETRIES {
            let resp = port.execute("readbuffer ascii")?;
            if resp
                .first_data_line()
                .is_some_and(|l| l.starts_with("data: Keyboard locked"))
            {
                thread::sleep(LOCKED_BUFFER_RETRY_INTERVAL);
                continue;
            }
            check_response(&resp, &port.stderr_tail())?;
            return decode_response(&resp.lines);
        }
        Err(DriverError::Protocol(format!(
            "keyboard remained locked across {LOCKED_BUFFER_RETRIES} buffer reads"
        )))
    }

    /// Press one key: raw name first, `Key(<spec>)` on rejection, then the
    /// unlock wait when an AID key left the keyboard locked.
    fn press_key(port: &mut dyn CommandPort, key: &str) -> Result<(), DriverError> {
        let resp = port.execute(key)?;
        let status = match check_response(&resp, &port.stderr_tail()) {
            Ok(status) => status,
            Err(DriverError::Protocol(first_err)) => {
                // Some key names only work through the Key(…) form.
                let spec = key_to_key_spec(key);
                log::debug!("[driver] raw key {key:?} rejected ({first_err}); trying Key({spec})");
                let resp = port.execute(&format!("Key({spec})"))?;
                check_response(&resp, &port.stderr_tail())?
            }
            Err(e) => return Err(e),
        };

        if is_aid_key(key) && !keyboard_unlocked(&status) {
            let resp = port.execute(&format!("Wait(Unlock,{UNLOCK_WAIT_SECS})"))?;
            let status = check_response(&resp, &port.stderr_tail())?;
            if !keyboard_unlocked(&status) {
                return Err(DriverError::KeyboardLockTimeout(UNLOCK_WAIT_SECS));
            }
        }
        Ok(())
    }

    /// Execute one command and validate its response.
    fn command(port: &mut dyn CommandPort, command: &str) -> Result<(), DriverError> {
        let resp = port.execute(command)?;
        check_response(&resp, &port.stderr_tail())?;
        Ok(())
    }

    /// Type a string at the cursor using the per-character protocol.
    ///
    /// Slow, but sidesteps every escaping concern the emulator's string
    /// commands have.
    fn type_chars(port: &mut dyn CommandPort, text: &str) -> Result<(), DriverError> {
        for ch in text.chars() {
            if ch == '\n' {
                Self::command(port, "newline")?;
            } else {
                Self::command(port, &key_command(ch))?;
            }
        }
        Ok(())
    }
}

impl TerminalDriver for EmulatorDriver {
    fn start(&self) -> Result<(), DriverError> {
        let mut port = self.port.lock().expect("port lock poisoned");
        port.start()?;
        wait_ready(port.as_mut())
    }

    fn stop(&self) {
        let mut port = self.port.lock().expect("port lock poisoned");
        if port.is_alive() {
            let _ = port.execute("quit");
        }
        port.close();
        log::info!("[driver] stopped emulator for {}", self.target);
    }

    fn is_connected(&self) -> bool {
        self.port.lock().expect("port lock poisoned").is_alive()
    }

    fn update_screen(&self) -> Result<Screen, DriverError> {
        let screen = self.with_reconnect(Self::read_buffer)?;
        *self.screen.lock().expect("screen lock poisoned") = screen.clone();
        Ok(screen)
    }

    fn screen(&self) -> Screen {
        self.screen.lock().expect("screen lock poisoned").clone()
    }

    fn send_key(&self, key: &str) -> Result<(), DriverError> {
        validate_key(key)?;
        let mut port = self.port.lock().expect("port lock poisoned");
        match Self::press_key(port.as_mut(), key) {
            Err(e) if e.is_connection_error() => {
                // The key went to a dead session; reconnecting is enough,
                // replaying a keypress against a fresh screen is not wanted.
                log::warn!("[driver] {e}; reconnecting to {}", self.target);
                reconnect_port(port.as_mut(), &self.target)
            }
            other => other,
        }
    }

    fn move_cursor(&self, row: usize, col: usize) -> Result<(), DriverError> {
        let mut port = self.port.lock().expect("port lock poisoned");
        Self::command(port.as_mut(), &movecursor_command(row, col))
    }

    fn write_string_at(&self, row: usize, col: usize, text: &str) -> Result<(), DriverError> {
        let mut port = self.port.lock().expect("port lock poisoned");
        Self::command(port.as_mut(), &movecursor_command(row, col))?;
        Self::type_chars(port.as_mut(), text)
    }

    fn submit_screen(&self) -> Result<(), DriverError> {
        let mut port = self.port.lock().expect("port lock poisoned");
        let mut screen = self.screen.lock().expect("screen lock poisoned");

        for i in 0..screen.fields().len() {
            let (skip, row, col, text) = {
                let field = &screen.fields()[i];
                let value = field.value(&screen);
                // The extracted value carries the blank attribute cell in
                // front of the typable region; it is not typed back.
                let typed = if field.start_x == 0 && field.start_y == 0 {
                    value.to_string()
                } else {
                    value.chars().skip(1).collect()
                };
                (
                    field.is_protected() || !field.changed,
                    field.start_y,
                    field.start_x,
                    typed,
                )
            };
            if skip {
                continue;
            }

            Self::command(port.as_mut(), &movecursor_command(row, col))?;
            Self::command(port.as_mut(), "eraseeof")?;
            Self::type_chars(port.as_mut(), &text)?;
            screen.fields[i].changed = false;
        }
        Ok(())
    }

    fn submit_unformatted(&self, text: &str) -> Result<(), DriverError> {
        let current = self.screen.lock().expect("screen lock poisoned").clone();
        let mut port = self.port.lock().expect("port lock poisoned");

        for (y, line) in text.split('\n').enumerate() {
            for (x, ch) in line.chars().enumerate() {
                if current.char_at(x, y) == ch {
                    continue;
                }
                Self::command(port.as_mut(), &movecursor_command(y, x))?;
                Self::command(port.as_mut(), &key_command(ch))?;
            }
        }
        Ok(())
    }
}
