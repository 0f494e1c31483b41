//! Workflow schema, export, and replay.
//!
//! A workflow is an ordered list of user-visible steps (fill a field, press
//! an AID key) that can be replayed against a host to reproduce a navigation
//! sequence. The chaos engine exports its recorded steps in this format, and
//! the replay runner executes a workflow file against any driver.
//!
//! # Wire Format
//!
//! Workflows serialize as human-readable JSON with PascalCase keys and
//! two-space indentation:
//!
//! ```json
//! {
//!   "Host": "mainframe.example.com",
//!   "Port": 23,
//!   "Steps": [
//!     { "Type": "FillString", "Coordinates": { "Row": 5, "Column": 18 }, "Text": "CICS" },
//!     { "Type": "PressEnter" }
//!   ]
//! }
//! ```
//!
//! Coordinates are 1-based, matching what operators see on a 3270 status row.

// Rust guideline compliant 2026-01

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::driver::TerminalDriver;
use crate::errors::DriverError;

/// The kind of action a workflow step performs.
///
/// Serialized as the exact wire strings `Connect`, `Disconnect`,
/// `FillString`, `PressEnter`, `PressTab`, `PressClear`, `PressPF1` …
/// `PressPF24`, and `PressPA1` … `PressPA3`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepType {
    /// Establish the host connection.
    Connect,
    /// Tear down the host connection.
    Disconnect,
    /// Type text at the step's coordinates.
    FillString,
    /// Press Enter.
    PressEnter,
    /// Press Tab.
    PressTab,
    /// Press Clear.
    PressClear,
    /// Press a program function key (1–24).
    PressPf(u8),
    /// Press a program attention key (1–3).
    PressPa(u8),
}

impl StepType {
    /// Emulator key name for key-press steps, `None` for the rest.
    #[must_use]
    pub fn key_name(self) -> Option<String> {
        match self {
            StepType::PressEnter => Some("Enter".to_string()),
            StepType::PressTab => Some("Tab".to_string()),
            StepType::PressClear => Some("Clear".to_string()),
            StepType::PressPf(n) => Some(format!("PF({n})")),
            StepType::PressPa(n) => Some(format!("PA({n})")),
            StepType::Connect | StepType::Disconnect | StepType::FillString => None,
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepType::Connect => f.write_str("Connect"),
            StepType::Disconnect => f.write_str("Disconnect"),
            StepType::FillString => f.write_str("FillString"),
            StepType::PressEnter => f.write_str("PressEnter"),
            StepType::PressTab => f.write_str("PressTab"),
            StepType::PressClear => f.write_str("PressClear"),
            StepType::PressPf(n) => write!(f, "PressPF{n}"),
            StepType::PressPa(n) => write!(f, "PressPA{n}"),
        }
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Connect" => return Ok(StepType::Connect),
            "Disconnect" => return Ok(StepType::Disconnect),
            "FillString" => return Ok(StepType::FillString),
            "PressEnter" => return Ok(StepType::PressEnter),
            "PressTab" => return Ok(StepType::PressTab),
            "PressClear" => return Ok(StepType::PressClear),
            _ => {}
        }
        if let Some(num) = s.strip_prefix("PressPF") {
            if let Ok(n) = num.parse::<u8>() {
                if (1..=24).contains(&n) {
                    return Ok(StepType::PressPf(n));
                }
            }
        }
        if let Some(num) = s.strip_prefix("PressPA") {
            if let Ok(n) = num.parse::<u8>() {
                if (1..=3).contains(&n) {
                    return Ok(StepType::PressPa(n));
                }
            }
        }
        Err(format!("unknown step type: {s}"))
    }
}

impl Serialize for StepType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StepType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive delay range in seconds; replay sleeps a uniform sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DelayRange {
    /// Lower bound in seconds.
    pub min: f64,
    /// Upper bound in seconds.
    pub max: f64,
}

impl DelayRange {
    /// Sample a duration uniformly from the range (clamped to be sane).
    fn sample(self) -> Duration {
        let lo = self.min.max(0.0);
        let hi = self.max.max(lo);
        let secs = if hi > lo {
            rand::rng().random_range(lo..=hi)
        } else {
            lo
        };
        Duration::from_secs_f64(secs)
    }
}

/// 1-based screen position a step acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Coordinates {
    /// Row, 1-based.
    pub row: usize,
    /// Column, 1-based.
    pub column: usize,
    /// Field length, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

/// One replayable step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkflowStep {
    /// What the step does.
    #[serde(rename = "Type")]
    pub step_type: StepType,
    /// Where it acts, for `FillString`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Text typed, for `FillString`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Per-step delay override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_delay: Option<DelayRange>,
}

impl WorkflowStep {
    /// A bare key-press step.
    #[must_use]
    pub fn press(step_type: StepType) -> Self {
        Self {
            step_type,
            coordinates: None,
            text: None,
            step_delay: None,
        }
    }

    /// A `FillString` step at 1-based (row, column).
    #[must_use]
    pub fn fill(row: usize, column: usize, text: impl Into<String>) -> Self {
        Self {
            step_type: StepType::FillString,
            coordinates: Some(Coordinates {
                row,
                column,
                length: None,
            }),
            text: Some(text.into()),
            step_delay: None,
        }
    }
}

/// A complete replayable workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Workflow {
    /// Target host name.
    pub host: String,
    /// Target port.
    pub port: u16,
    /// Delay applied between all steps unless a step overrides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every_step_delay: Option<DelayRange>,
    /// Where a load runner should write its report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_path: Option<String>,
    /// Sessions started per ramp-up batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramp_up_batch_size: Option<usize>,
    /// Seconds between ramp-up batches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramp_up_delay: Option<f64>,
    /// Pause after the final step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_of_task_delay: Option<DelayRange>,
    /// The steps, in execution order.
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    /// A workflow with just a target and steps.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, steps: Vec<WorkflowStep>) -> Self {
        Self {
            host: host.into(),
            port,
            every_step_delay: None,
            output_file_path: None,
            ramp_up_batch_size: None,
            ramp_up_delay: None,
            end_of_task_delay: None,
            steps,
        }
    }

    /// Render as pretty JSON (two-space indentation, trailing newline).
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self).context("serializing workflow")?;
        out.push('\n');
        Ok(out)
    }

    /// Write the workflow to `path` as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .with_context(|| format!("writing workflow to {}", path.display()))
    }

    /// Load a workflow from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading workflow from {}", path.display()))?;
        serde_json::from_str(&raw).context("parsing workflow JSON")
    }
}

/// Execute a workflow against a driver, step by step.
///
/// `Connect`/`Disconnect` map to driver start/stop, `FillString` types at
/// the step's coordinates (converted to 0-based), and key-press steps go
/// through `send_key`. Per-step delays override the workflow-wide delay.
pub fn run_workflow(workflow: &Workflow, driver: &dyn TerminalDriver) -> Result<(), DriverError> {
    for (index, step) in workflow.steps.iter().enumerate() {
        log::debug!("[workflow] step {} {}", index + 1, step.step_type);
        match step.step_type {
            StepType::Connect => driver.start()?,
            StepType::Disconnect => driver.stop(),
            StepType::FillString => {
                let coords = step.coordinates.ok_or_else(|| {
                    DriverError::Validation(format!("FillString step {} has no coordinates", index + 1))
                })?;
                if coords.row == 0 || coords.column == 0 {
                    return Err(DriverError::Validation(format!(
                        "FillString step {} coordinates are 1-based",
                        index + 1
                    )));
                }
                let text = step.text.as_deref().ok_or_else(|| {
                    DriverError::Validation(format!("FillString step {} has no text", index + 1))
                })?;
                driver.write_string_at(coords.row - 1, coords.column - 1, text)?;
            }
            _ => {
                let key = step
                    .step_type
                    .key_name()
                    .ok_or_else(|| DriverError::Validation(format!("step {} is not replayable", index + 1)))?;
                driver.send_key(&key)?;
            }
        }

        if let Some(delay) = step.step_delay.or(workflow.every_step_delay) {
            std::thread::sleep(delay.sample());
        }
    }
    if let Some(delay) = workflow.end_of_task_delay {
        std::thread::sleep(delay.sample());
    }
    Ok(())
}
