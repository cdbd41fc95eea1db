use tracing::{debug, info, warn};

use crate::{
    config::BridgeConfig,
    link::HeatPumpLink,
    mapping,
    types::{HeatPumpSettings, HubWriteSnapshot, MirrorUpdate},
};

/// The latest fully-assembled intent to push to the unit. Overwritten
/// wholesale on every hub write; the most recent snapshot wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DesiredConfiguration {
    pub settings: HeatPumpSettings,
}

impl DesiredConfiguration {
    fn from_snapshot(snapshot: &HubWriteSnapshot) -> Self {
        let state = snapshot.target_heating_cooling_state;
        Self {
            settings: HeatPumpSettings {
                power: mapping::device_power_from_hub(state),
                mode: mapping::device_mode_from_hub(state),
                temperature: mapping::device_temperature_from_hub(snapshot.target_temperature),
                fan: mapping::device_speed_from_hub_fan_level(snapshot.fan_level),
                vane: mapping::device_vane_from_hub(snapshot.swing_mode, snapshot.target_tilt_angle),
            },
        }
    }
}

/// Where the write/verify machinery currently stands. Exactly one of
/// these holds at any tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    /// Debounce window open; the unit has not been touched yet.
    PendingWrite,
    /// A combined settings write is being issued this tick.
    Writing,
    /// Waiting for the read-back that confirms the unit adopted the write.
    Verifying,
}

/// Reconciles hub intent with the physical unit: debounces writes,
/// verifies they stuck, and polls for out-of-band changes.
///
/// `on_hub_write` runs on the accessory server's servicing context and
/// `tick` on the reconcile loop; the owner serializes the two behind a
/// single lock so no tick observes a half-updated snapshot.
pub struct ReconcileEngine {
    config: BridgeConfig,
    state: ReconcileState,
    desired: Option<DesiredConfiguration>,
    debounce_deadline_ms: u64,
    verify_deadline_ms: u64,
    next_settings_poll_ms: u64,
    next_temperature_poll_ms: u64,
}

impl ReconcileEngine {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            state: ReconcileState::Idle,
            desired: None,
            debounce_deadline_ms: 0,
            verify_deadline_ms: 0,
            next_settings_poll_ms: 0,
            next_temperature_poll_ms: 0,
        }
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    pub fn desired(&self) -> Option<&DesiredConfiguration> {
        self.desired.as_ref()
    }

    /// Intent Collector entry point. Snapshots the hub's new values into
    /// a fresh desired configuration, arms the debounce window, and
    /// accepts unconditionally; the actual device write is deferred to a
    /// later tick. A pending verify is superseded: the rewritten intent
    /// gets its own write/verify cycle instead.
    pub fn on_hub_write(&mut self, snapshot: &HubWriteSnapshot, now_ms: u64) -> bool {
        let desired = DesiredConfiguration::from_snapshot(snapshot);
        info!(
            service = ?snapshot.service,
            settings = ?desired.settings,
            "hub write accepted, debouncing"
        );
        self.desired = Some(desired);
        self.debounce_deadline_ms = now_ms + self.config.debounce_ms;
        self.state = ReconcileState::PendingWrite;
        true
    }

    /// One cooperative reconciliation pass. Each stage is a guarded
    /// no-op unless its own timer has elapsed and its preconditions
    /// hold; the returned updates are the characteristic values the
    /// caller must publish to the hub.
    pub fn tick(&mut self, now_ms: u64, link: &mut dyn HeatPumpLink) -> Vec<MirrorUpdate> {
        let mut updates = Vec::new();
        self.poll_temperature(now_ms, link, &mut updates);
        self.check_write(now_ms, link);
        self.check_verify(now_ms, link);
        self.poll_settings(now_ms, link, &mut updates);
        updates
    }

    /// Unconditional on state. The deadline is re-armed before the read
    /// so a slow sync cannot cause back-to-back re-polls.
    fn poll_temperature(
        &mut self,
        now_ms: u64,
        link: &mut dyn HeatPumpLink,
        updates: &mut Vec<MirrorUpdate>,
    ) {
        if now_ms < self.next_temperature_poll_ms {
            return;
        }
        self.next_temperature_poll_ms = now_ms + self.config.temperature_poll_interval_ms;

        if let Err(err) = link.sync() {
            warn!("temperature poll sync failed: {err}");
            return;
        }
        let reading = link.room_temperature();
        if reading > 0.0 {
            updates.push(MirrorUpdate::CurrentTemperature(reading));
        } else {
            debug!("room temperature sensor not ready, sample discarded");
        }
    }

    fn check_write(&mut self, now_ms: u64, link: &mut dyn HeatPumpLink) {
        if self.state != ReconcileState::PendingWrite || now_ms < self.debounce_deadline_ms {
            return;
        }
        let Some(desired) = self.desired else {
            self.state = ReconcileState::Idle;
            return;
        };

        self.state = ReconcileState::Writing;

        // Overlay the intent on the unit's current block so a partial
        // future settings shape is never sent half-initialized.
        let mut settings = link.settings();
        settings.power = desired.settings.power;
        settings.mode = desired.settings.mode;
        settings.temperature = desired.settings.temperature;
        settings.fan = desired.settings.fan;
        settings.vane = desired.settings.vane;

        info!(?settings, "writing settings to heat pump");
        link.set_settings(settings);
        match link.update() {
            Ok(()) => {
                // Keep the settings poll clear of the in-flight write.
                self.next_settings_poll_ms = now_ms + self.config.settings_poll_interval_ms;
                self.verify_deadline_ms = now_ms + self.config.verify_delay_ms;
                self.state = ReconcileState::Verifying;
            }
            Err(err) => {
                warn!("settings write failed, re-arming: {err}");
                self.debounce_deadline_ms = now_ms + self.config.debounce_ms;
                self.state = ReconcileState::PendingWrite;
            }
        }
    }

    fn check_verify(&mut self, now_ms: u64, link: &mut dyn HeatPumpLink) {
        if self.state != ReconcileState::Verifying || now_ms < self.verify_deadline_ms {
            return;
        }
        let Some(desired) = self.desired else {
            self.state = ReconcileState::Idle;
            return;
        };

        if let Err(err) = link.sync() {
            warn!("verify sync failed, re-arming write: {err}");
            self.debounce_deadline_ms = now_ms + self.config.debounce_ms;
            self.state = ReconcileState::PendingWrite;
            return;
        }

        let actual = link.settings();
        match mismatched_field(&desired.settings, &actual) {
            None => {
                info!("heat pump adopted the requested settings");
                self.state = ReconcileState::Idle;
                self.next_settings_poll_ms = now_ms + self.config.settings_poll_interval_ms;
                self.next_temperature_poll_ms = now_ms + self.config.temperature_poll_interval_ms;
            }
            Some(field) => {
                // No retry cap: a unit that refuses a setting is retried
                // until a newer hub write supersedes the intent.
                warn!(field, ?actual, "read-back mismatch, retrying write");
                self.debounce_deadline_ms = now_ms + self.config.debounce_ms;
                self.state = ReconcileState::PendingWrite;
            }
        }
    }

    /// Guarded on `Idle` so a poll can never visibly revert a value the
    /// user just set while its write/verify cycle is still in flight.
    fn poll_settings(
        &mut self,
        now_ms: u64,
        link: &mut dyn HeatPumpLink,
        updates: &mut Vec<MirrorUpdate>,
    ) {
        if self.state != ReconcileState::Idle || now_ms < self.next_settings_poll_ms {
            return;
        }
        self.next_settings_poll_ms = now_ms + self.config.settings_poll_interval_ms;

        if let Err(err) = link.sync() {
            warn!("settings poll sync failed: {err}");
            return;
        }
        let settings = link.settings();
        debug!(?settings, "settings poll");

        updates.push(MirrorUpdate::TargetTemperature(
            mapping::hub_target_temperature_from_device(settings.temperature),
        ));
        updates.push(MirrorUpdate::CurrentMode(mapping::hub_power_mode_from_device(
            settings.power,
            settings.mode,
        )));
        updates.push(MirrorUpdate::TargetMode(mapping::hub_target_mode_from_device(
            settings.power,
            settings.mode,
        )));
        updates.push(MirrorUpdate::FanLevel(mapping::hub_fan_level_from_device_speed(
            settings.fan,
        )));
        updates.push(MirrorUpdate::SlatState(mapping::hub_slat_state_from_device_vane(
            settings.vane,
        )));
        updates.push(MirrorUpdate::SwingMode(mapping::hub_swing_flag_from_device_vane(
            settings.vane,
        )));
    }
}

/// Field-by-field comparison of a desired block against a read-back,
/// temperature compared at the unit's half-degree granularity.
fn mismatched_field(desired: &HeatPumpSettings, actual: &HeatPumpSettings) -> Option<&'static str> {
    if desired.power != actual.power {
        return Some("power");
    }
    if desired.mode != actual.mode {
        return Some("mode");
    }
    if (desired.temperature - actual.temperature).abs() >= 0.25 {
        return Some("temperature");
    }
    if desired.fan != actual.fan {
        return Some("fan");
    }
    if desired.vane != actual.vane {
        return Some("vane");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkError;
    use crate::types::{FanSpeed, HubPowerMode, HubTargetState, Mode, Power, ServiceId, Vane};
    use pretty_assertions::assert_eq;

    /// In-memory unit that adopts staged settings on `update`, with
    /// knobs to refuse a field or fail calls.
    struct FakeLink {
        settings: HeatPumpSettings,
        staged: Option<HeatPumpSettings>,
        room_temperature: f64,
        stick_fan_once: bool,
        fail_update_once: bool,
        write_count: usize,
    }

    impl FakeLink {
        fn new() -> Self {
            Self {
                settings: HeatPumpSettings::default(),
                staged: None,
                room_temperature: 21.5,
                stick_fan_once: false,
                fail_update_once: false,
                write_count: 0,
            }
        }
    }

    impl HeatPumpLink for FakeLink {
        fn connect(&mut self) -> Result<(), LinkError> {
            Ok(())
        }

        fn enable_external_update(&mut self) {}

        fn sync(&mut self) -> Result<(), LinkError> {
            Ok(())
        }

        fn settings(&self) -> HeatPumpSettings {
            self.settings
        }

        fn set_settings(&mut self, settings: HeatPumpSettings) {
            self.staged = Some(settings);
        }

        fn update(&mut self) -> Result<(), LinkError> {
            if self.fail_update_once {
                self.fail_update_once = false;
                return Err(LinkError::NoAck);
            }
            self.write_count += 1;
            if let Some(mut staged) = self.staged.take() {
                if self.stick_fan_once {
                    self.stick_fan_once = false;
                    staged.fan = self.settings.fan;
                }
                self.settings = staged;
            }
            Ok(())
        }

        fn room_temperature(&self) -> f64 {
            self.room_temperature
        }
    }

    /// Polls pushed far out so write/verify tests see no poll traffic.
    fn quiet_config() -> BridgeConfig {
        BridgeConfig {
            debounce_ms: 1_000,
            verify_delay_ms: 1_000,
            settings_poll_interval_ms: 600_000,
            temperature_poll_interval_ms: 600_000,
            tick_interval_ms: 1_000,
        }
    }

    fn snapshot() -> HubWriteSnapshot {
        HubWriteSnapshot {
            service: ServiceId::Thermostat,
            target_heating_cooling_state: 1,
            target_temperature: 22.5,
            fan_level: 3,
            swing_mode: 0,
            target_tilt_angle: 20,
        }
    }

    fn engine_past_initial_polls() -> ReconcileEngine {
        let mut engine = ReconcileEngine::new(quiet_config());
        // Burn the polls armed at time zero.
        let mut link = FakeLink::new();
        let _ = engine.tick(0, &mut link);
        engine
    }

    #[test]
    fn write_is_accepted_and_deferred() {
        let mut engine = engine_past_initial_polls();
        let mut link = FakeLink::new();

        assert!(engine.on_hub_write(&snapshot(), 100));
        assert_eq!(engine.state(), ReconcileState::PendingWrite);

        // Inside the debounce window nothing reaches the unit.
        let _ = engine.tick(600, &mut link);
        assert_eq!(link.write_count, 0);
    }

    #[test]
    fn echoing_device_converges_in_one_cycle() {
        let mut engine = engine_past_initial_polls();
        let mut link = FakeLink::new();
        engine.on_hub_write(&snapshot(), 0);

        let _ = engine.tick(1_000, &mut link);
        assert_eq!(engine.state(), ReconcileState::Verifying);
        assert_eq!(link.write_count, 1);
        assert_eq!(link.settings.power, Power::On);
        assert_eq!(link.settings.mode, Mode::Heat);
        assert_eq!(link.settings.temperature, 22.5);
        assert_eq!(link.settings.fan, FanSpeed::Two);
        assert_eq!(link.settings.vane, Vane::Step2);

        let _ = engine.tick(2_000, &mut link);
        assert_eq!(engine.state(), ReconcileState::Idle);
        assert_eq!(link.write_count, 1);
    }

    #[test]
    fn single_field_mismatch_triggers_a_second_write() {
        let mut engine = engine_past_initial_polls();
        let mut link = FakeLink::new();
        link.stick_fan_once = true;
        engine.on_hub_write(&snapshot(), 0);

        let _ = engine.tick(1_000, &mut link);
        let _ = engine.tick(2_000, &mut link);
        assert_eq!(engine.state(), ReconcileState::PendingWrite);
        assert_eq!(link.write_count, 1);

        let _ = engine.tick(3_000, &mut link);
        assert_eq!(engine.state(), ReconcileState::Verifying);
        assert_eq!(link.write_count, 2);

        let _ = engine.tick(4_000, &mut link);
        assert_eq!(engine.state(), ReconcileState::Idle);
        assert_eq!(link.settings.fan, FanSpeed::Two);
    }

    #[test]
    fn rapid_writes_coalesce_into_one_device_write() {
        let mut engine = engine_past_initial_polls();
        let mut link = FakeLink::new();

        engine.on_hub_write(&snapshot(), 0);
        let mut second = snapshot();
        second.target_temperature = 19.0;
        second.fan_level = 5;
        engine.on_hub_write(&second, 500);

        // First write's deadline has passed, but the second re-armed it.
        let _ = engine.tick(1_000, &mut link);
        assert_eq!(link.write_count, 0);

        let _ = engine.tick(1_500, &mut link);
        assert_eq!(link.write_count, 1);
        assert_eq!(link.settings.temperature, 19.0);
        assert_eq!(link.settings.fan, FanSpeed::Four);
    }

    #[test]
    fn failed_device_write_rearms_the_debounce() {
        let mut engine = engine_past_initial_polls();
        let mut link = FakeLink::new();
        link.fail_update_once = true;
        engine.on_hub_write(&snapshot(), 0);

        let _ = engine.tick(1_000, &mut link);
        assert_eq!(engine.state(), ReconcileState::PendingWrite);
        assert_eq!(link.write_count, 0);

        let _ = engine.tick(2_000, &mut link);
        assert_eq!(engine.state(), ReconcileState::Verifying);
        assert_eq!(link.write_count, 1);
    }

    #[test]
    fn settings_poll_never_runs_while_a_write_is_in_flight() {
        let mut config = quiet_config();
        config.settings_poll_interval_ms = 1_000;
        let mut engine = ReconcileEngine::new(config);
        let mut link = FakeLink::new();
        link.room_temperature = 0.0;
        let _ = engine.tick(0, &mut link);

        engine.on_hub_write(&snapshot(), 100);

        // PendingWrite at t=1100, Verifying at t=2000 after the write.
        let updates = engine.tick(1_050, &mut link);
        assert_eq!(updates, vec![]);
        let updates = engine.tick(2_000, &mut link);
        assert_eq!(updates, vec![]);
        assert_eq!(engine.state(), ReconcileState::Verifying);

        // Back to Idle, the next elapsed poll republishes everything.
        let _ = engine.tick(3_000, &mut link);
        assert_eq!(engine.state(), ReconcileState::Idle);
        let updates = engine.tick(4_100, &mut link);
        assert!(updates.contains(&MirrorUpdate::TargetTemperature(22.5)));
        assert!(updates.contains(&MirrorUpdate::CurrentMode(HubPowerMode::Heat)));
        assert!(updates.contains(&MirrorUpdate::TargetMode(HubTargetState::Heat)));
        assert!(updates.contains(&MirrorUpdate::FanLevel(3)));
        assert!(updates.contains(&MirrorUpdate::SwingMode(0)));
    }

    #[test]
    fn not_ready_room_temperature_is_discarded() {
        let mut config = quiet_config();
        config.temperature_poll_interval_ms = 5_000;
        let mut engine = ReconcileEngine::new(config);
        let mut link = FakeLink::new();
        link.room_temperature = 0.0;

        let updates = engine.tick(0, &mut link);
        assert!(!updates
            .iter()
            .any(|u| matches!(u, MirrorUpdate::CurrentTemperature(_))));

        link.room_temperature = 21.5;
        let updates = engine.tick(5_000, &mut link);
        assert!(updates.contains(&MirrorUpdate::CurrentTemperature(21.5)));
    }

    #[test]
    fn temperature_poll_deadline_is_armed_at_poll_start() {
        let mut config = quiet_config();
        config.temperature_poll_interval_ms = 5_000;
        let mut engine = ReconcileEngine::new(config);
        let mut link = FakeLink::new();

        let updates = engine.tick(0, &mut link);
        assert!(updates.contains(&MirrorUpdate::CurrentTemperature(21.5)));

        let updates = engine.tick(4_999, &mut link);
        assert!(!updates
            .iter()
            .any(|u| matches!(u, MirrorUpdate::CurrentTemperature(_))));

        let updates = engine.tick(5_000, &mut link);
        assert!(updates.contains(&MirrorUpdate::CurrentTemperature(21.5)));
    }

    #[test]
    fn verified_write_pushes_both_poll_deadlines_forward() {
        let mut config = quiet_config();
        config.settings_poll_interval_ms = 2_000;
        config.temperature_poll_interval_ms = 2_000;
        let mut engine = ReconcileEngine::new(config);
        let mut link = FakeLink::new();
        let _ = engine.tick(0, &mut link);

        engine.on_hub_write(&snapshot(), 100);
        let _ = engine.tick(1_100, &mut link);
        let _ = engine.tick(2_100, &mut link);
        assert_eq!(engine.state(), ReconcileState::Idle);

        // Deadlines were re-armed from the verify at t=2100.
        let updates = engine.tick(3_000, &mut link);
        assert_eq!(updates, vec![]);
        let updates = engine.tick(4_100, &mut link);
        assert!(updates.contains(&MirrorUpdate::CurrentTemperature(21.5)));
        assert!(updates.contains(&MirrorUpdate::FanLevel(3)));
    }

    #[test]
    fn write_while_verifying_supersedes_the_pending_verify() {
        let mut engine = engine_past_initial_polls();
        let mut link = FakeLink::new();

        engine.on_hub_write(&snapshot(), 0);
        let _ = engine.tick(1_000, &mut link);
        assert_eq!(engine.state(), ReconcileState::Verifying);

        let mut second = snapshot();
        second.target_heating_cooling_state = 2;
        engine.on_hub_write(&second, 1_200);
        assert_eq!(engine.state(), ReconcileState::PendingWrite);

        let _ = engine.tick(2_200, &mut link);
        assert_eq!(link.write_count, 2);
        assert_eq!(link.settings.mode, Mode::Cool);
        let _ = engine.tick(3_200, &mut link);
        assert_eq!(engine.state(), ReconcileState::Idle);
    }

    #[test]
    fn settings_poll_mirrors_an_auto_unit_as_target_auto() {
        let mut config = quiet_config();
        config.settings_poll_interval_ms = 1_000;
        let mut engine = ReconcileEngine::new(config);
        let mut link = FakeLink::new();
        link.settings.power = Power::On;
        link.settings.mode = Mode::Auto;

        let updates = engine.tick(0, &mut link);
        // Current state has no AUTO representation, the target side does;
        // the "auto" selection must not read back as "off".
        assert!(updates.contains(&MirrorUpdate::CurrentMode(HubPowerMode::Off)));
        assert!(updates.contains(&MirrorUpdate::TargetMode(HubTargetState::Auto)));
    }

    #[test]
    fn non_finite_target_temperature_never_reaches_the_unit() {
        let mut engine = engine_past_initial_polls();
        let mut link = FakeLink::new();

        let mut bad = snapshot();
        bad.target_temperature = f64::NAN;
        engine.on_hub_write(&bad, 0);

        let _ = engine.tick(1_000, &mut link);
        let _ = engine.tick(2_000, &mut link);
        assert_eq!(engine.state(), ReconcileState::Idle);
        assert!(link.settings.temperature.is_finite());
        assert_eq!(link.settings.temperature, 22.0);
    }

    #[test]
    fn auto_target_powers_on_in_auto_mode() {
        let mut engine = engine_past_initial_polls();
        let mut link = FakeLink::new();

        let mut auto = snapshot();
        auto.target_heating_cooling_state = 3;
        engine.on_hub_write(&auto, 0);
        let _ = engine.tick(1_000, &mut link);
        let _ = engine.tick(2_000, &mut link);

        assert_eq!(engine.state(), ReconcileState::Idle);
        assert_eq!(link.settings.power, Power::On);
        assert_eq!(link.settings.mode, Mode::Auto);
    }
}
