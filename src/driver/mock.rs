//! Mock driver for tests.
//!
//! Implements the full [`TerminalDriver`] contract against an in-memory
//! screen loaded from a captured dump file (or a blank 24×80 screen when no
//! file is given). Every command the driver would issue on the wire is
//! recorded for assertions, and writes update the in-memory buffer so tests
//! can observe their effect.

// Rust guideline compliant 2026-01

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::constants::{DEFAULT_MODEL_COLS, DEFAULT_MODEL_ROWS};
use crate::driver::{key_command, movecursor_command, validate_key, TerminalDriver};
use crate::errors::DriverError;
use crate::screen::decode::decode_dump;
use crate::screen::Screen;

/// Deterministic in-memory driver mirroring the subprocess driver's
/// contract.
pub struct MockDriver {
    dump_path: Option<PathBuf>,
    screen: Mutex<Screen>,
    connected: AtomicBool,
    commands: Mutex<Vec<String>>,
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver")
            .field("dump_path", &self.dump_path)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish()
    }
}

impl MockDriver {
    /// A mock with a blank 24×80 screen.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            dump_path: None,
            screen: Mutex::new(Screen::blank(DEFAULT_MODEL_ROWS, DEFAULT_MODEL_COLS)),
            connected: AtomicBool::new(false),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// A mock backed by a captured dump file (live wire format: `data:`
    /// lines, a status line, a terminal `ok`).
    pub fn from_dump(path: impl Into<PathBuf>) -> Result<Self, DriverError> {
        let path = path.into();
        let screen = load_dump(&path)?;
        Ok(Self {
            dump_path: Some(path),
            screen: Mutex::new(screen),
            connected: AtomicBool::new(false),
            commands: Mutex::new(Vec::new()),
        })
    }

    /// A mock seeded directly with a screen value.
    #[must_use]
    pub fn with_screen(screen: Screen) -> Self {
        Self {
            dump_path: None,
            screen: Mutex::new(screen),
            connected: AtomicBool::new(false),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Commands recorded so far, in dispatch order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("command log poisoned").clone()
    }

    /// Forget recorded commands.
    pub fn clear_commands(&self) {
        self.commands.lock().expect("command log poisoned").clear();
    }

    fn record(&self, command: String) {
        self.commands.lock().expect("command log poisoned").push(command);
    }

    fn ensure_connected(&self) -> Result<(), DriverError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DriverError::Disconnected("mock driver not connected".to_string()))
        }
    }
}

fn load_dump(path: &Path) -> Result<Screen, DriverError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| DriverError::Transport(format!("reading dump {}: {e}", path.display())))?;
    decode_dump(&contents)
}

impl TerminalDriver for MockDriver {
    fn start(&self) -> Result<(), DriverError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn update_screen(&self) -> Result<Screen, DriverError> {
        self.ensure_connected()?;
        if let Some(path) = &self.dump_path {
            let fresh = load_dump(path)?;
            let mut screen = self.screen.lock().expect("screen lock poisoned");
            *screen = fresh.clone();
            return Ok(fresh);
        }
        Ok(self.screen.lock().expect("screen lock poisoned").clone())
    }

    fn screen(&self) -> Screen {
        self.screen.lock().expect("screen lock poisoned").clone()
    }

    fn send_key(&self, key: &str) -> Result<(), DriverError> {
        validate_key(key)?;
        self.ensure_connected()?;
        self.record(key.to_string());
        Ok(())
    }

    fn move_cursor(&self, row: usize, col: usize) -> Result<(), DriverError> {
        self.ensure_connected()?;
        self.record(movecursor_command(row, col));
        let mut screen = self.screen.lock().expect("screen lock poisoned");
        screen.cursor_x = col;
        screen.cursor_y = row;
        Ok(())
    }

    fn write_string_at(&self, row: usize, col: usize, text: &str) -> Result<(), DriverError> {
        self.ensure_connected()?;
        self.record(movecursor_command(row, col));
        let mut screen = self.screen.lock().expect("screen lock poisoned");
        let width = screen.width().max(1);
        let mut pos = row * width + col;
        for ch in text.chars() {
            self.record(key_command(ch));
            screen.set_char(pos % width, pos / width, ch);
            pos += 1;
        }
        Ok(())
    }

    fn submit_screen(&self) -> Result<(), DriverError> {
        self.ensure_connected()?;
        let mut screen = self.screen.lock().expect("screen lock poisoned");
        for i in 0..screen.fields().len() {
            let (skip, row, col, text) = {
                let field = &screen.fields()[i];
                let value = field.value(&screen);
                let typed: String = if field.start_x == 0 && field.start_y == 0 {
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
            self.record(movecursor_command(row, col));
            self.record("eraseeof".to_string());
            let width = screen.width().max(1);
            let mut pos = row * width + col;
            for ch in text.chars() {
                if ch == '\n' {
                    self.record("newline".to_string());
                } else {
                    self.record(key_command(ch));
                    screen.set_char(pos % width, pos / width, ch);
                }
                pos += 1;
            }
            screen.fields[i].changed = false;
        }
        Ok(())
    }

    fn submit_unformatted(&self, text: &str) -> Result<(), DriverError> {
        self.ensure_connected()?;
        let mut screen = self.screen.lock().expect("screen lock poisoned");
        for (y, line) in text.split('\n').enumerate() {
            for (x, ch) in line.chars().enumerate() {
                if screen.char_at(x, y) == ch {
                    continue;
                }
                self.record(movecursor_command(y, x));
                self.record(key_command(ch));
                screen.set_char(x, y, ch);
            }
        }
        Ok(())
    }
}
