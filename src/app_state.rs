// =============================================================================
// Central Application State — Ember Warmth Engine
// =============================================================================
//
// The single source of truth for the engine process. All subsystems reach
// their stores through an `Arc<AppState>` handle.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking and the scan guard.
//   - parking_lot::RwLock inside each store for mutable collections.
// =============================================================================

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::alerts::AlertStore;
use crate::contacts::ContactStore;
use crate::push::PushClient;
use crate::runtime_config::EngineConfig;
use crate::scanner::ScanReport;
use crate::settings::SettingsStore;
use crate::tokens::TokenStore;

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, incremented on every
    /// meaningful mutation. Surfaced on the health endpoint so operators can
    /// see the engine is live and changing.
    pub state_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub config: EngineConfig,

    // ── Stores ──────────────────────────────────────────────────────────
    pub contacts: ContactStore,
    pub settings: SettingsStore,
    pub alerts: AlertStore,
    pub tokens: TokenStore,

    // ── Outbound ────────────────────────────────────────────────────────
    pub push: PushClient,

    // ── Scanner bookkeeping ─────────────────────────────────────────────
    /// True while a scan run is in flight. The scanner tolerates accidental
    /// double-invocation (cooldown contract), so this guard only saves
    /// redundant work and keeps the run report stream sane.
    scan_in_flight: AtomicBool,
    recent_scans: RwLock<Vec<ScanReport>>,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct a new `AppState` from the given configuration. The returned
    /// value is typically wrapped in `Arc` immediately.
    pub fn new(config: EngineConfig) -> Self {
        let push = PushClient::new(config.push_gateway_url.clone());

        Self {
            state_version: AtomicU64::new(1),
            config,
            contacts: ContactStore::new(),
            settings: SettingsStore::new(),
            alerts: AlertStore::new(),
            tokens: TokenStore::new(),
            push,
            scan_in_flight: AtomicBool::new(false),
            recent_scans: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    /// Atomically increment the state version after a meaningful mutation.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Read the current state version without modifying it.
    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Scan Guard ──────────────────────────────────────────────────────

    /// Try to claim the scan slot. Returns `false` when a run is already in
    /// flight; the caller should report busy instead of scanning.
    pub fn begin_scan(&self) -> bool {
        self.scan_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the scan slot after a run completes (success or failure).
    pub fn end_scan(&self) {
        self.scan_in_flight.store(false, Ordering::SeqCst);
    }

    // ── Scan Report Ring ────────────────────────────────────────────────

    /// Retain the run report, evicting the oldest past the configured cap.
    pub fn push_scan_report(&self, report: ScanReport) {
        let mut reports = self.recent_scans.write();
        reports.push(report);
        while reports.len() > self.config.max_recent_scans {
            reports.remove(0);
        }
        drop(reports);
        self.increment_version();
    }

    /// Most recent scan reports, newest first.
    pub fn recent_scan_reports(&self) -> Vec<ScanReport> {
        self.recent_scans.read().iter().rev().cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_guard_is_exclusive() {
        let state = AppState::new(EngineConfig::default());
        assert!(state.begin_scan());
        assert!(!state.begin_scan(), "second claim must fail while in flight");
        state.end_scan();
        assert!(state.begin_scan(), "slot reusable after release");
    }

    #[test]
    fn scan_report_ring_is_capped() {
        let config = EngineConfig {
            max_recent_scans: 3,
            ..EngineConfig::default()
        };
        let state = AppState::new(config);
        for _ in 0..5 {
            state.push_scan_report(ScanReport::default());
        }
        assert_eq!(state.recent_scan_reports().len(), 3);
    }

    #[test]
    fn version_counter_increments() {
        let state = AppState::new(EngineConfig::default());
        let v0 = state.current_state_version();
        state.increment_version();
        assert_eq!(state.current_state_version(), v0 + 1);
    }
}
