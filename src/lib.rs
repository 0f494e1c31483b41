//! Greenscreen: web gateway core for IBM 3270 terminals.
//!
//! Bridges the 3270 block-mode data stream to modern form semantics by
//! driving a line-mode emulator subprocess, and explores mainframe
//! applications automatically, recording replayable workflows.

// Library modules
pub mod chaos;
pub mod config;
pub mod constants;
pub mod driver;
pub mod errors;
pub mod keys;
pub mod screen;
pub mod session;
pub mod workflow;

// Re-export commonly used types
pub use chaos::{ChaosConfig, ChaosEngine, ChaosHint, ChaosSnapshot, ChaosStats};
pub use config::Config;
pub use driver::{EmulatorDriver, MockDriver, SubprocessPort, TerminalDriver};
pub use errors::DriverError;
pub use keys::{aid_key_to_step_type, is_aid_key, key_to_key_spec, normalize_key};
pub use screen::{DisplayMode, Field, Screen};
pub use session::{Session, SessionPrefs, SessionRegistry};
pub use workflow::{run_workflow, StepType, Workflow, WorkflowStep};
