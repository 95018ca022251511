//! Progress tracking for long-running fetch runs.
//!
//! Computes percentages, rates and remaining-time estimates and formats the
//! periodic progress lines the executor logs while draining outcomes.

use std::time::{Duration, Instant};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30);
const MIN_RUN_DURATION: Duration = Duration::from_secs(10);

/// Lightweight builder that controls update cadence.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    update_interval: Duration,
    min_percentage_step: f64,
}

impl ProgressTracker {
    /// Create a tracker with custom interval and percentage step.
    pub fn new(update_interval: Duration, min_percentage_step: f64) -> Self {
        Self {
            update_interval,
            min_percentage_step,
        }
    }

    /// Build a [`ProgressState`] configured with the tracker defaults.
    pub fn create_state(&self, total: u64) -> ProgressState {
        let mut state = ProgressState::new(total);
        state.update_interval = self.update_interval;
        state.min_percentage_step = self.min_percentage_step;
        state
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL, 10.0)
    }
}

/// Progress state for one run.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Identifiers resolved so far (success or failure).
    pub resolved: u64,
    /// Identifiers resolved with a stored order.
    pub succeeded: u64,
    /// Identifiers submitted.
    pub total: u64,
    /// Timestamp when the run started.
    pub start_time: Instant,
    /// Last time progress was reported.
    pub last_update: Instant,
    /// Minimum interval between progress updates.
    pub update_interval: Duration,
    /// Current resolution rate (identifiers per second).
    pub current_rate: f64,
    /// Last reported completion percentage (0-100).
    pub last_reported_percentage: f64,
    /// Minimum percentage delta required to emit a new update.
    pub min_percentage_step: f64,
}

impl ProgressState {
    /// Create a new state with default intervals.
    pub fn new(total: u64) -> Self {
        let now = Instant::now();
        Self {
            resolved: 0,
            succeeded: 0,
            total,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            current_rate: 0.0,
            last_reported_percentage: 0.0,
            min_percentage_step: 10.0,
        }
    }

    /// Count one resolved identifier.
    pub fn update(&mut self, success: bool) {
        self.resolved = self.resolved.saturating_add(1);
        if success {
            self.succeeded = self.succeeded.saturating_add(1);
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.current_rate = self.resolved as f64 / elapsed;
        }
    }

    /// Whether a progress update should be emitted based on time or percentage.
    pub fn should_emit_update(&self) -> bool {
        if self.resolved == 0 {
            return false;
        }

        if self.percentage() - self.last_reported_percentage >= self.min_percentage_step {
            return true;
        }

        self.start_time.elapsed() >= MIN_RUN_DURATION
            && self.last_update.elapsed() >= self.update_interval
    }

    /// Call after emitting a progress log to reset timers and cached percentage.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        self.last_reported_percentage = self.percentage();
    }

    /// Completion percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.resolved as f64 / self.total as f64) * 100.0
    }

    /// Estimate remaining time from the current rate.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        if self.current_rate <= 0.0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.resolved);
        if remaining == 0 {
            return None;
        }
        Duration::try_from_secs_f64(remaining as f64 / self.current_rate).ok()
    }

    /// Human-readable progress string for logging.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] Resolved {}/{} orders ({} fetched) - {:.1}% complete",
            self.resolved,
            self.total,
            self.succeeded,
            self.percentage()
        )];

        if self.current_rate > 0.0 {
            parts.push(format!("at {:.1} orders/sec", self.current_rate));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
