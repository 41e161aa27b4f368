//! Progress aggregation and phase reporting for install runs.
//!
//! [`InstallProgress`] holds atomic counters shared by every download worker.
//! [`ProgressReporter`] owns one per run, snapshots it for the caller's
//! callbacks and enforces that phases only move forward.
//!
//! Callbacks run on the worker that triggered them. A panicking callback is
//! caught and logged; the run continues.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::planner::InstallPlan;

/// Stage of the install state machine.
///
/// Phases are strictly ordered and never revisited within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum InstallPhase {
    /// Resolving paths and planning.
    Preparing = 1,
    /// Fetching packs. Skipped when every pack is already present.
    Downloading = 2,
    /// Reserved. Verification happens per pack inside `Downloading` and this
    /// phase is never emitted.
    Verifying = 3,
    /// Extracting the archive into the install directory.
    Installing = 4,
    /// The run finished successfully.
    Completed = 5,
}

impl InstallPhase {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            InstallPhase::Preparing => "Preparing",
            InstallPhase::Downloading => "Downloading",
            InstallPhase::Verifying => "Verifying",
            InstallPhase::Installing => "Installing",
            InstallPhase::Completed => "Completed",
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Preparing),
            2 => Some(Self::Downloading),
            3 => Some(Self::Verifying),
            4 => Some(Self::Installing),
            5 => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only copy of the progress counters handed to callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Byte total of the current phase (download total, then extraction total).
    pub total_bytes_to_download: u64,
    /// Bytes done in the current phase.
    pub downloaded_bytes: u64,
    pub total_packs_to_download: usize,
    pub downloaded_pack_count: usize,
    pub total_steps: usize,
    pub completed_step_count: usize,
}

/// Shared progress counters for one install run.
///
/// All mutation goes through atomic operations so concurrent workers can
/// update it without further locking.
#[derive(Debug, Default)]
pub struct InstallProgress {
    total_bytes_to_download: AtomicU64,
    downloaded_bytes: AtomicU64,
    total_packs_to_download: AtomicUsize,
    downloaded_pack_count: AtomicUsize,
    total_steps: AtomicUsize,
    completed_step_count: AtomicUsize,
}

impl InstallProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialise the counters from a plan.
    ///
    /// Bytes of packs already on disk count as downloaded from the start.
    pub fn from_plan(plan: &InstallPlan) -> Self {
        let progress = Self::new();
        progress
            .total_bytes_to_download
            .store(plan.total_bytes_to_download, Ordering::SeqCst);
        progress
            .downloaded_bytes
            .store(plan.already_satisfied_bytes, Ordering::SeqCst);
        progress
            .total_packs_to_download
            .store(plan.packs_to_download.len(), Ordering::SeqCst);
        progress.total_steps.store(plan.total_steps, Ordering::SeqCst);
        progress
    }

    /// Add freshly written bytes.
    pub fn add_downloaded(&self, delta: u64) {
        self.downloaded_bytes.fetch_add(delta, Ordering::SeqCst);
    }

    /// Record a published pack. Also completes one step.
    pub fn pack_completed(&self) {
        self.downloaded_pack_count.fetch_add(1, Ordering::SeqCst);
        self.step_completed();
    }

    /// Record a completed step.
    pub fn step_completed(&self) {
        self.completed_step_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Overwrite the byte counters with extraction progress.
    pub fn set_extraction(&self, extracted: u64, total: u64) {
        self.total_bytes_to_download.store(total, Ordering::SeqCst);
        self.downloaded_bytes.store(extracted, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total_bytes_to_download: self.total_bytes_to_download.load(Ordering::SeqCst),
            downloaded_bytes: self.downloaded_bytes.load(Ordering::SeqCst),
            total_packs_to_download: self.total_packs_to_download.load(Ordering::SeqCst),
            downloaded_pack_count: self.downloaded_pack_count.load(Ordering::SeqCst),
            total_steps: self.total_steps.load(Ordering::SeqCst),
            completed_step_count: self.completed_step_count.load(Ordering::SeqCst),
        }
    }
}

/// Callback receiving progress snapshots.
pub type ProgressCallback = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// Callback receiving phase transitions.
pub type PhaseCallback = Arc<dyn Fn(InstallPhase) + Send + Sync>;

/// Caller-supplied observers of an install run.
///
/// Both callbacks are optional. Progress fires per written chunk, per
/// published pack and per extraction update; phase fires once per transition.
#[derive(Clone, Default)]
pub struct InstallCallbacks {
    on_progress: Option<ProgressCallback>,
    on_phase: Option<PhaseCallback>,
}

impl InstallCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the progress callback.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressSnapshot) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Set the phase callback.
    pub fn on_phase<F>(mut self, callback: F) -> Self
    where
        F: Fn(InstallPhase) + Send + Sync + 'static,
    {
        self.on_phase = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for InstallCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_phase", &self.on_phase.is_some())
            .finish()
    }
}

/// Per-run owner of the progress counters and phase state.
#[derive(Debug)]
pub struct ProgressReporter {
    progress: InstallProgress,
    callbacks: InstallCallbacks,
    phase: AtomicU8,
}

impl ProgressReporter {
    pub fn new(progress: InstallProgress, callbacks: InstallCallbacks) -> Self {
        Self {
            progress,
            callbacks,
            phase: AtomicU8::new(0),
        }
    }

    pub fn progress(&self) -> &InstallProgress {
        &self.progress
    }

    /// Phase most recently entered, if any.
    pub fn current_phase(&self) -> Option<InstallPhase> {
        InstallPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Snapshot the counters and hand them to the progress callback.
    pub fn report(&self) {
        let Some(callback) = &self.callbacks.on_progress else {
            return;
        };
        let snapshot = self.progress.snapshot();
        if catch_unwind(AssertUnwindSafe(|| callback(&snapshot))).is_err() {
            warn!("Progress callback panicked, ignoring");
        }
    }

    /// Move to `phase` and notify the phase callback.
    ///
    /// Returns `false` and does nothing if `phase` is not after the current one.
    pub fn enter_phase(&self, phase: InstallPhase) -> bool {
        let next = phase as u8;
        let advanced = self
            .phase
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (next > current).then_some(next)
            })
            .is_ok();

        if !advanced {
            warn!(
                phase = phase.name(),
                current = ?self.current_phase(),
                "Dropping out-of-order phase transition"
            );
            return false;
        }

        debug!(phase = phase.name(), "Entering phase");
        if let Some(callback) = &self.callbacks.on_phase {
            if catch_unwind(AssertUnwindSafe(|| callback(phase))).is_err() {
                warn!(phase = phase.name(), "Phase callback panicked, ignoring");
            }
        }
        true
    }
}
