use heatpump_common::{FanSpeed, HeatPumpLink, HeatPumpSettings, LinkError, Mode, Power, Vane};

/// In-memory heat pump standing in for the serial transport on host
/// builds. Adopts staged settings on `update` and drifts the room
/// temperature toward the target while powered on.
pub struct SimulatedHeatPump {
    connected: bool,
    settings: HeatPumpSettings,
    staged: Option<HeatPumpSettings>,
    room_temperature: f64,
    sync_count: u64,
}

impl SimulatedHeatPump {
    pub fn new() -> Self {
        Self {
            connected: false,
            settings: HeatPumpSettings {
                power: Power::Off,
                mode: Mode::Auto,
                temperature: 22.0,
                fan: FanSpeed::Auto,
                vane: Vane::Auto,
            },
            staged: None,
            // 0.0 until the first sync completes, like a cold sensor.
            room_temperature: 0.0,
            sync_count: 0,
        }
    }
}

impl Default for SimulatedHeatPump {
    fn default() -> Self {
        Self::new()
    }
}

impl HeatPumpLink for SimulatedHeatPump {
    fn connect(&mut self) -> Result<(), LinkError> {
        self.connected = true;
        Ok(())
    }

    fn enable_external_update(&mut self) {}

    fn sync(&mut self) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        self.sync_count += 1;
        if self.sync_count == 1 {
            // Sensor warm-up: the first refresh still reports 0.0.
            return Ok(());
        }
        if self.room_temperature == 0.0 {
            self.room_temperature = 21.0;
        }
        let ambient_target = match self.settings.power {
            Power::On => self.settings.temperature,
            Power::Off => 20.0,
        };
        let delta = ambient_target - self.room_temperature;
        self.room_temperature += delta.clamp(-0.1, 0.1);
        Ok(())
    }

    fn settings(&self) -> HeatPumpSettings {
        self.settings
    }

    fn set_settings(&mut self, settings: HeatPumpSettings) {
        self.staged = Some(settings);
    }

    fn update(&mut self) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        if let Some(staged) = self.staged.take() {
            self.settings = staged;
        }
        Ok(())
    }

    fn room_temperature(&self) -> f64 {
        self.room_temperature
    }
}
