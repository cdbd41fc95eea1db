use serde::{Deserialize, Serialize};

/// Fixed-at-build-time timing knobs for the reconciliation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Quiet window after the last hub write before the unit is touched.
    pub debounce_ms: u64,
    /// Delay between a device write and its read-back verification.
    pub verify_delay_ms: u64,
    /// Cadence for re-reading the full settings block.
    pub settings_poll_interval_ms: u64,
    /// Cadence for re-reading the room temperature.
    pub temperature_poll_interval_ms: u64,
    /// Minimum cadence at which the controller drives `tick`.
    pub tick_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1_000,
            verify_delay_ms: 1_000,
            settings_poll_interval_ms: 30_000,
            temperature_poll_interval_ms: 5_000,
            tick_interval_ms: 1_000,
        }
    }
}

impl BridgeConfig {
    /// Clamp every interval into a range the loop can actually service.
    pub fn sanitize(&mut self) {
        self.tick_interval_ms = self.tick_interval_ms.clamp(100, 10_000);
        self.debounce_ms = self.debounce_ms.clamp(self.tick_interval_ms, 30_000);
        self.verify_delay_ms = self.verify_delay_ms.clamp(self.tick_interval_ms, 30_000);
        self.settings_poll_interval_ms = self
            .settings_poll_interval_ms
            .clamp(self.tick_interval_ms, 600_000);
        self.temperature_poll_interval_ms = self
            .temperature_poll_interval_ms
            .clamp(self.tick_interval_ms, 600_000);
    }
}
