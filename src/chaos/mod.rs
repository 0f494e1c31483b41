//! Chaos exploration engine.
//!
//! A background worker that repeatedly observes the screen, types
//! synthesized values into every unprotected field, presses a weighted-
//! random AID key, and fingerprints the result. Every fingerprint change
//! becomes a recorded transition; the accumulated step list exports as a
//! replayable workflow.
//!
//! # Concurrency
//!
//! One worker thread per engine. All accumulated state lives behind a
//! single mutex the worker takes briefly at each mutation point; a stop
//! channel is polled at the top of each iteration and inside the step-delay
//! sleep, so `stop()` interrupts promptly without poisoning anything.
//!
//! # Failure policy
//!
//! The engine never retries: any driver error ends the run with the error
//! recorded in `last_error` (the driver already performed its own one-shot
//! reconnect underneath). A terminated run keeps everything it learned and
//! can be snapshotted or exported afterwards.

// Rust guideline compliant 2026-01

pub mod attempts;
pub mod mindmap;
pub mod snapshot;
pub mod values;

pub use attempts::{Attempt, AttemptRing, FieldWrite, ATTEMPT_RING_CAPACITY};
pub use mindmap::{MindMap, MindMapEdge, MindMapNode};
pub use snapshot::ChaosSnapshot;
pub use values::{ChaosHint, HintPools};

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::driver::TerminalDriver;
use crate::errors::DriverError;
use crate::keys::aid_key_to_step_type;
use crate::workflow::{StepType, Workflow, WorkflowStep};

/// One observed screen change and the steps that caused it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Fingerprint before.
    pub from_hash: String,
    /// Fingerprint after.
    pub to_hash: String,
    /// The fills and key press of the iteration that moved the screen.
    pub steps: Vec<WorkflowStep>,
}

/// Engine configuration. Zero means "unlimited" for the budgets and
/// "derive from the wall clock" for the seed.
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    /// Stop after this many iterations (0 = unlimited).
    pub max_steps: u64,
    /// Stop after this much wall time (zero = unlimited).
    pub time_budget: Duration,
    /// PRNG seed for value generation and key choice (0 = wall clock).
    pub seed: u64,
    /// Pause between iterations.
    pub step_delay: Duration,
    /// Longest value ever typed into a field.
    pub max_field_length: usize,
    /// AID key → positive sampling weight.
    pub aid_key_weights: BTreeMap<String, u32>,
    /// Where to write the exported workflow when the run ends.
    pub output_file: Option<PathBuf>,
    /// Drop attempts that neither transitioned nor errored.
    pub exclude_no_progress_events: bool,
    /// Operator hints feeding value generation.
    pub hints: Vec<ChaosHint>,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            time_budget: Duration::from_secs(300),
            seed: 0,
            step_delay: Duration::from_millis(500),
            max_field_length: 40,
            aid_key_weights: default_aid_key_weights(),
            output_file: None,
            exclude_no_progress_events: true,
            hints: Vec::new(),
        }
    }
}

/// The stock key mix: mostly Enter, a sprinkle of the common function keys.
#[must_use]
pub fn default_aid_key_weights() -> BTreeMap<String, u32> {
    [
        ("Enter", 70u32),
        ("PF(1)", 5),
        ("PF(2)", 5),
        ("PF(3)", 5),
        ("PF(4)", 5),
        ("PF(12)", 5),
        ("Clear", 5),
    ]
    .into_iter()
    .map(|(k, w)| (k.to_string(), w))
    .collect()
}

/// Weighted choice over the key map, iterated in sorted-key order so a
/// fixed seed reproduces the same key sequence everywhere.
fn pick_aid_key(rng: &mut StdRng, weights: &BTreeMap<String, u32>) -> String {
    let total: u64 = weights.values().map(|w| u64::from(*w)).sum();
    if total == 0 {
        return "Enter".to_string();
    }
    let mut threshold = rng.random_range(0..total);
    for (key, weight) in weights {
        let weight = u64::from(*weight);
        if threshold < weight {
            return key.clone();
        }
        threshold -= weight;
    }
    "Enter".to_string()
}

/// Everything a run accumulates, guarded by the engine mutex.
#[derive(Default)]
struct EngineState {
    active: bool,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    steps_run: u64,
    transitions: Vec<Transition>,
    steps: Vec<WorkflowStep>,
    screen_hashes: BTreeSet<String>,
    unique_inputs: BTreeSet<String>,
    aid_counts: BTreeMap<String, u64>,
    attempts: AttemptRing,
    mind_map: MindMap,
    loaded_run_id: Option<Uuid>,
    last_error: Option<String>,
}

/// Worker-thread handle and stop channel.
#[derive(Default)]
struct Control {
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

/// Progress counters for status displays.
#[derive(Clone, Debug, PartialEq)]
pub struct ChaosStats {
    /// Whether the worker is running.
    pub active: bool,
    /// Iterations completed.
    pub steps_run: u64,
    /// Distinct screens seen.
    pub screens_seen: usize,
    /// Transitions recorded.
    pub transitions: usize,
    /// Distinct values typed.
    pub unique_inputs: usize,
    /// Attempts currently retained in the ring.
    pub attempts_retained: usize,
    /// Error that ended the run, when one did.
    pub last_error: Option<String>,
}

/// Everything the worker thread needs, shared behind one `Arc`.
struct EngineInner {
    driver: Arc<dyn TerminalDriver>,
    config: ChaosConfig,
    pools: HintPools,
    host: String,
    port: u16,
    state: Mutex<EngineState>,
}

/// The exploration engine. `start` spawns the worker, `stop` interrupts
/// it, `snapshot`/`export` read out results.
pub struct ChaosEngine {
    inner: Arc<EngineInner>,
    control: Mutex<Control>,
}

impl std::fmt::Debug for ChaosEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosEngine")
            .field("host", &self.inner.host)
            .field("port", &self.inner.port)
            .field("active", &self.is_active())
            .finish()
    }
}

impl ChaosEngine {
    /// An engine over `driver` targeting `host:port` (recorded into the
    /// exported workflow).
    #[must_use]
    pub fn new(
        driver: Arc<dyn TerminalDriver>,
        host: impl Into<String>,
        port: u16,
        config: ChaosConfig,
    ) -> Self {
        let pools = HintPools::from_hints(&config.hints);
        Self {
            inner: Arc::new(EngineInner {
                driver,
                config,
                pools,
                host: host.into(),
                port,
                state: Mutex::new(EngineState::default()),
            }),
            control: Mutex::new(Control::default()),
        }
    }

    /// Begin a fresh exploration run.
    pub fn start(&self) -> Result<(), DriverError> {
        let mut control = self.control.lock().expect("control lock poisoned");
        {
            let mut st = self.inner.state.lock().expect("state lock poisoned");
            if st.active {
                return Err(DriverError::ChaosPrecondition(
                    "exploration already running".to_string(),
                ));
            }
            if !self.inner.driver.is_connected() {
                return Err(DriverError::ChaosPrecondition(
                    "driver is not connected".to_string(),
                ));
            }
            *st = EngineState {
                active: true,
                started_at: Some(Utc::now()),
                ..EngineState::default()
            };
        }
        self.spawn_worker(&mut control);
        Ok(())
    }

    /// Continue exploring from a saved run.
    ///
    /// Seeds counters, steps, transitions, and the mind-map from the
    /// snapshot; attempts are re-filtered under the current
    /// `exclude_no_progress_events` setting.
    pub fn resume(&self, saved: &ChaosSnapshot) -> Result<(), DriverError> {
        let mut control = self.control.lock().expect("control lock poisoned");
        {
            let mut st = self.inner.state.lock().expect("state lock poisoned");
            if st.active {
                return Err(DriverError::ChaosPrecondition(
                    "exploration already running".to_string(),
                ));
            }
            if !self.inner.driver.is_connected() {
                return Err(DriverError::ChaosPrecondition(
                    "driver is not connected".to_string(),
                ));
            }

            let mut fresh = EngineState {
                active: true,
                started_at: saved.started_at.or_else(|| Some(Utc::now())),
                steps_run: saved.steps_run,
                transitions: saved.transitions.clone(),
                steps: saved.steps.clone(),
                screen_hashes: saved.screen_hashes.clone(),
                unique_inputs: saved.unique_inputs.clone(),
                aid_counts: saved.aid_counts.clone(),
                mind_map: saved.mind_map.clone(),
                loaded_run_id: Some(saved.run_id),
                ..EngineState::default()
            };
            for attempt in &saved.attempts {
                if !self.inner.config.exclude_no_progress_events
                    || attempt.transitioned
                    || attempt.error.is_some()
                {
                    fresh.attempts.push(attempt.clone());
                }
            }
            *st = fresh;
        }
        log::info!(
            "[chaos] resuming run {} at step {}",
            saved.run_id,
            saved.steps_run
        );
        self.spawn_worker(&mut control);
        Ok(())
    }

    fn spawn_worker(&self, control: &mut Control) {
        // A previous worker can only be a finished one here (active was
        // false); reap it before replacing the handle.
        if let Some(handle) = control.worker.take() {
            let _ = handle.join();
        }
        let (tx, rx) = mpsc::channel();
        control.stop_tx = Some(tx);
        let inner = Arc::clone(&self.inner);
        control.worker = Some(thread::spawn(move || inner.run_loop(&rx)));
    }

    /// Interrupt the worker and wait for it to exit.
    pub fn stop(&self) {
        let (tx, worker) = {
            let mut control = self.control.lock().expect("control lock poisoned");
            (control.stop_tx.take(), control.worker.take())
        };
        if let Some(tx) = tx {
            let _ = tx.send(());
        }
        if let Some(handle) = worker {
            let _ = handle.join();
        }
    }

    /// Block until the worker exits on its own (budget, error, or stop).
    pub fn wait(&self) {
        let worker = self
            .control
            .lock()
            .expect("control lock poisoned")
            .worker
            .take();
        if let Some(handle) = worker {
            let _ = handle.join();
        }
    }

    /// Whether the worker is currently running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().expect("state lock poisoned").active
    }

    /// The error that ended the run, when one did.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .expect("state lock poisoned")
            .last_error
            .clone()
    }

    /// The run this engine was resumed from, when it was.
    #[must_use]
    pub fn loaded_run_id(&self) -> Option<Uuid> {
        self.inner
            .state
            .lock()
            .expect("state lock poisoned")
            .loaded_run_id
    }

    /// Progress counters.
    #[must_use]
    pub fn stats(&self) -> ChaosStats {
        let st = self.inner.state.lock().expect("state lock poisoned");
        ChaosStats {
            active: st.active,
            steps_run: st.steps_run,
            screens_seen: st.screen_hashes.len(),
            transitions: st.transitions.len(),
            unique_inputs: st.unique_inputs.len(),
            attempts_retained: st.attempts.len(),
            last_error: st.last_error.clone(),
        }
    }

    /// Retained recent attempts, oldest first.
    #[must_use]
    pub fn attempts(&self) -> Vec<Attempt> {
        self.inner
            .state
            .lock()
            .expect("state lock poisoned")
            .attempts
            .to_vec()
    }

    /// Deep copy of everything the run has learned.
    #[must_use]
    pub fn snapshot(&self, run_id: Uuid) -> ChaosSnapshot {
        let st = self.inner.state.lock().expect("state lock poisoned");
        ChaosSnapshot {
            run_id,
            host: self.inner.host.clone(),
            port: self.inner.port,
            started_at: st.started_at,
            stopped_at: st.stopped_at,
            steps_run: st.steps_run,
            screen_hashes: st.screen_hashes.clone(),
            unique_inputs: st.unique_inputs.clone(),
            aid_counts: st.aid_counts.clone(),
            transitions: st.transitions.clone(),
            steps: st.steps.clone(),
            attempts: st.attempts.to_vec(),
            mind_map: st.mind_map.clone(),
            last_error: st.last_error.clone(),
        }
    }

    /// The recorded steps as a replayable workflow.
    #[must_use]
    pub fn export(&self) -> Workflow {
        self.inner.export()
    }
}

impl EngineInner {
    fn export(&self) -> Workflow {
        let steps = self.state.lock().expect("state lock poisoned").steps.clone();
        Workflow::new(self.host.clone(), self.port, steps)
    }

    fn run_loop(&self, stop_rx: &Receiver<()>) {
        let seed = if self.config.seed == 0 {
            Utc::now().timestamp_nanos_opt().unwrap_or(0) as u64
        } else {
            self.config.seed
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let deadline = (self.config.time_budget > Duration::ZERO)
            .then(|| Instant::now() + self.config.time_budget);
        log::info!(
            "[chaos] exploration started against {}:{} (seed {seed})",
            self.host,
            self.port
        );

        loop {
            match stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            let steps_run = self.state.lock().expect("state lock poisoned").steps_run;
            if self.config.max_steps > 0 && steps_run >= self.config.max_steps {
                log::info!("[chaos] step budget reached ({steps_run})");
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                log::info!("[chaos] time budget reached after {steps_run} steps");
                break;
            }

            if !self.iterate(&mut rng) {
                break;
            }

            match stop_rx.recv_timeout(self.config.step_delay) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        self.finalize();
    }

    /// One exploration iteration. Returns whether the loop should go on.
    fn iterate(&self, rng: &mut StdRng) -> bool {
        let screen = match self.driver.update_screen() {
            Ok(screen) => screen,
            Err(e) => {
                self.fail(format!("screen update failed: {e}"));
                return false;
            }
        };
        let from_hash = screen.hash();
        let seq = self.state.lock().expect("state lock poisoned").steps_run + 1;
        let mut attempt = Attempt::begin(seq, from_hash.clone());
        let mut iteration_steps: Vec<WorkflowStep> = Vec::new();

        let mut first_input = true;
        for field in screen.fields().iter().filter(|f| !f.is_protected()) {
            let value = values::generate_value(
                rng,
                field,
                screen.width(),
                self.config.max_field_length,
                &self.pools,
                first_input,
            );
            first_input = false;
            if value.is_empty() {
                continue;
            }

            let row = field.start_y + 1;
            let col = field.start_x + 1;
            let result = self
                .driver
                .write_string_at(field.start_y, field.start_x, &value);
            let success = result.is_ok();
            attempt.writes.push(FieldWrite {
                row,
                col,
                length: value.chars().count(),
                value: value.clone(),
                success,
                error: result.err().map(|e| e.to_string()),
            });
            if success {
                iteration_steps.push(WorkflowStep::fill(row, col, value));
            }
        }

        let aid = pick_aid_key(rng, &self.config.aid_key_weights);
        attempt.aid_key = aid.clone();
        if let Err(e) = self.driver.send_key(&aid) {
            attempt.error = Some(e.to_string());
            let mut st = self.state.lock().expect("state lock poisoned");
            st.attempts.push(attempt);
            st.mind_map.observe(&from_hash, &screen.text());
            st.last_error = Some(format!("send {aid} failed: {e}"));
            log::error!("[chaos] send {aid} failed: {e}");
            return false;
        }

        let after = match self.driver.update_screen() {
            Ok(screen) => screen,
            Err(e) => {
                attempt.error = Some(e.to_string());
                let mut st = self.state.lock().expect("state lock poisoned");
                st.attempts.push(attempt);
                st.mind_map.observe(&from_hash, &screen.text());
                st.last_error = Some(format!("screen re-read failed: {e}"));
                log::error!("[chaos] screen re-read failed: {e}");
                return false;
            }
        };
        let to_hash = after.hash();
        attempt.to_hash = to_hash.clone();
        attempt.transitioned = !to_hash.is_empty() && to_hash != from_hash;

        iteration_steps.push(WorkflowStep::press(
            aid_key_to_step_type(&aid).unwrap_or(StepType::PressEnter),
        ));

        let mut st = self.state.lock().expect("state lock poisoned");
        st.steps_run += 1;
        st.screen_hashes.insert(from_hash.clone());
        st.screen_hashes.insert(to_hash.clone());
        *st.aid_counts.entry(aid.clone()).or_insert(0) += 1;
        for step in &iteration_steps {
            if step.step_type == StepType::FillString {
                if let Some(text) = &step.text {
                    st.unique_inputs.insert(text.clone());
                }
            }
        }
        if attempt.transitioned {
            st.transitions.push(Transition {
                from_hash: from_hash.clone(),
                to_hash: to_hash.clone(),
                steps: iteration_steps.clone(),
            });
        }
        st.steps.extend(iteration_steps);
        if !self.config.exclude_no_progress_events
            || attempt.transitioned
            || attempt.error.is_some()
        {
            st.attempts.push(attempt.clone());
        }
        st.mind_map.observe(&from_hash, &screen.text());
        st.mind_map.observe(&to_hash, &after.text());
        if attempt.transitioned {
            st.mind_map.record_transition(&from_hash, &to_hash, &aid);
        }
        true
    }

    fn fail(&self, message: String) {
        log::error!("[chaos] {message}");
        self.state.lock().expect("state lock poisoned").last_error = Some(message);
    }

    fn finalize(&self) {
        {
            let mut st = self.state.lock().expect("state lock poisoned");
            st.active = false;
            st.stopped_at = Some(Utc::now());
            log::info!(
                "[chaos] exploration finished: {} steps, {} screens, {} transitions",
                st.steps_run,
                st.screen_hashes.len(),
                st.transitions.len()
            );
        }
        if let Some(path) = &self.config.output_file {
            // Best-effort export; a failed write must not take the run's
            // in-memory results with it.
            if let Err(e) = self.export().save(path) {
                log::debug!("[chaos] workflow export to {} failed: {e}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;
    use crate::screen::decode::decode;

    /// Mock whose screen has one protected label and one 5-character input
    /// field.
    fn single_field_driver() -> Arc<MockDriver> {
        let screen = decode(
            &["SF(c0=60) 41 SF(c0=00) 42 43 44 45 46"],
            Some("U F U C(127.0.0.1) I 4 24 80 0 0 0x0 0.000"),
        )
        .expect("decode");
        assert_eq!(screen.fields().len(), 2);
        assert!(!screen.fields()[1].is_protected());
        assert_eq!(screen.fields()[1].capacity(screen.width()), 5);
        Arc::new(MockDriver::with_screen(screen))
    }

    fn quick_config(max_steps: u64) -> ChaosConfig {
        ChaosConfig {
            max_steps,
            time_budget: Duration::ZERO,
            seed: 1,
            step_delay: Duration::ZERO,
            aid_key_weights: [("Enter".to_string(), 1u32)].into_iter().collect(),
            ..ChaosConfig::default()
        }
    }

    #[test]
    fn test_default_config_values() {
        let config = ChaosConfig::default();
        assert_eq!(config.max_steps, 100);
        assert_eq!(config.time_budget, Duration::from_secs(300));
        assert_eq!(config.step_delay, Duration::from_millis(500));
        assert_eq!(config.max_field_length, 40);
        assert!(config.exclude_no_progress_events);
        assert_eq!(config.aid_key_weights.get("Enter"), Some(&70));
        assert_eq!(config.aid_key_weights.len(), 7);
    }

    #[test]
    fn test_pick_aid_key_is_deterministic_for_a_seed() {
        let weights = default_aid_key_weights();
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            assert_eq!(pick_aid_key(&mut a, &weights), pick_aid_key(&mut b, &weights));
        }
    }

    #[test]
    fn test_pick_aid_key_zero_total_falls_back_to_enter() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_aid_key(&mut rng, &BTreeMap::new()), "Enter");
        let zeroed: BTreeMap<String, u32> = [("PF(3)".to_string(), 0u32)].into_iter().collect();
        assert_eq!(pick_aid_key(&mut rng, &zeroed), "Enter");
    }

    #[test]
    fn test_pick_aid_key_single_entry_always_wins() {
        let weights: BTreeMap<String, u32> = [("Clear".to_string(), 3u32)].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..16 {
            assert_eq!(pick_aid_key(&mut rng, &weights), "Clear");
        }
    }

    #[test]
    fn test_run_stops_at_max_steps() {
        let driver = single_field_driver();
        driver.start().expect("start");
        let engine = Arc::new(ChaosEngine::new(
            Arc::clone(&driver) as Arc<dyn TerminalDriver>,
            "127.0.0.1",
            23,
            quick_config(3),
        ));

        engine.start().expect("start engine");
        engine.wait();

        let stats = engine.stats();
        assert!(!stats.active);
        assert_eq!(stats.steps_run, 3);
        assert!(stats.last_error.is_none());

        let workflow = engine.export();
        let fills = workflow
            .steps
            .iter()
            .filter(|s| s.step_type == StepType::FillString)
            .count();
        let enters = workflow
            .steps
            .iter()
            .filter(|s| s.step_type == StepType::PressEnter)
            .count();
        assert_eq!(fills, 3);
        assert_eq!(enters, 3);
        assert!(engine.attempts().len() <= 3);

        // Fill steps equal the successful writes recorded in attempts, and
        // the transitioned flag matches the hash comparison.
        let successful_writes: usize = engine
            .attempts()
            .iter()
            .map(|a| a.writes.iter().filter(|w| w.success).count())
            .sum();
        assert_eq!(successful_writes, fills);
        for attempt in engine.attempts() {
            assert_eq!(
                attempt.transitioned,
                !attempt.to_hash.is_empty() && attempt.to_hash != attempt.from_hash
            );
        }
    }

    #[test]
    fn test_fill_steps_use_one_based_coordinates() {
        let driver = single_field_driver();
        driver.start().expect("start");
        let engine = Arc::new(ChaosEngine::new(
            Arc::clone(&driver) as Arc<dyn TerminalDriver>,
            "h",
            23,
            quick_config(1),
        ));
        engine.start().expect("start engine");
        engine.wait();

        let workflow = engine.export();
        let fill = workflow
            .steps
            .iter()
            .find(|s| s.step_type == StepType::FillString)
            .expect("fill step");
        let coords = fill.coordinates.expect("coords");
        // The input field starts at 0-based (3, 0).
        assert_eq!(coords.row, 1);
        assert_eq!(coords.column, 4);
        assert_eq!(fill.text.as_ref().expect("text").chars().count(), 5);
    }

    #[test]
    fn test_start_requires_connected_driver() {
        let driver = single_field_driver();
        let engine = ChaosEngine::new(
            Arc::clone(&driver) as Arc<dyn TerminalDriver>,
            "h",
            23,
            quick_config(1),
        );
        let err = engine.start().expect_err("not connected");
        assert!(matches!(err, DriverError::ChaosPrecondition(_)));
    }

    #[test]
    fn test_start_rejects_concurrent_runs() {
        let driver = single_field_driver();
        driver.start().expect("start");
        let mut config = quick_config(100_000);
        config.step_delay = Duration::from_millis(20);
        let engine = ChaosEngine::new(
            Arc::clone(&driver) as Arc<dyn TerminalDriver>,
            "h",
            23,
            config,
        );

        engine.start().expect("first start");
        let err = engine.start().expect_err("second start");
        assert!(matches!(err, DriverError::ChaosPrecondition(_)));
        engine.stop();
        assert!(!engine.is_active());
    }

    #[test]
    fn test_driver_failure_ends_run_with_last_error() {
        let driver = single_field_driver();
        driver.start().expect("start");
        let mut config = quick_config(0); // unlimited steps
        config.step_delay = Duration::from_millis(1);
        let engine = ChaosEngine::new(
            Arc::clone(&driver) as Arc<dyn TerminalDriver>,
            "h",
            23,
            config,
        );

        engine.start().expect("start engine");
        std::thread::sleep(Duration::from_millis(20));
        driver.stop();
        engine.wait();

        assert!(!engine.is_active());
        assert!(engine.last_error().is_some());
    }

    #[test]
    fn test_snapshot_and_resume_preserve_progress() {
        let driver = single_field_driver();
        driver.start().expect("start");
        let engine = ChaosEngine::new(
            Arc::clone(&driver) as Arc<dyn TerminalDriver>,
            "h",
            23,
            quick_config(3),
        );
        engine.start().expect("start engine");
        engine.wait();

        let run_id = Uuid::new_v4();
        let saved = engine.snapshot(run_id);
        assert_eq!(saved.steps_run, 3);
        assert_eq!(saved.steps.len(), engine.export().steps.len());
        assert!(saved.stopped_at.is_some());

        // Resuming with the budget already consumed terminates immediately
        // but keeps the imported progress.
        engine.resume(&saved).expect("resume");
        engine.wait();
        assert_eq!(engine.stats().steps_run, 3);
        assert_eq!(engine.loaded_run_id(), Some(run_id));
        assert!(engine.last_error().is_none());
        assert_eq!(engine.export().steps.len(), saved.steps.len());
    }

    #[test]
    fn test_resume_rejects_disconnected_driver() {
        let driver = single_field_driver();
        driver.start().expect("start");
        let engine = ChaosEngine::new(
            Arc::clone(&driver) as Arc<dyn TerminalDriver>,
            "h",
            23,
            quick_config(1),
        );
        engine.start().expect("start engine");
        engine.wait();
        let saved = engine.snapshot(Uuid::new_v4());

        driver.stop();
        let err = engine.resume(&saved).expect_err("not connected");
        assert!(matches!(err, DriverError::ChaosPrecondition(_)));
    }

    #[test]
    fn test_output_file_written_on_termination() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("run.json");
        let driver = single_field_driver();
        driver.start().expect("start");
        let mut config = quick_config(2);
        config.output_file = Some(out.clone());
        let engine = ChaosEngine::new(
            Arc::clone(&driver) as Arc<dyn TerminalDriver>,
            "host.example",
            992,
            config,
        );
        engine.start().expect("start engine");
        engine.wait();

        let raw = std::fs::read_to_string(&out).expect("export written");
        let workflow: Workflow = serde_json::from_str(&raw).expect("valid workflow");
        assert_eq!(workflow.host, "host.example");
        assert_eq!(workflow.port, 992);
        assert_eq!(workflow.steps.len(), 4);
    }
}
