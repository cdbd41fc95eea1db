use serde::{Deserialize, Serialize};

/// Power setting as the heat-pump serial protocol spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Power {
    Off,
    On,
}

impl Power {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }

    /// Total: anything the unit reports that is not "ON" is treated as off.
    pub fn from_device_str(s: &str) -> Self {
        if s == "ON" {
            Self::On
        } else {
            Self::Off
        }
    }
}

/// Operating mode as the heat-pump serial protocol spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Heat,
    Cool,
    Auto,
    Dry,
    Fan,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
            Self::Auto => "AUTO",
            Self::Dry => "DRY",
            Self::Fan => "FAN",
        }
    }

    /// Total: unknown mode strings fall back to AUTO.
    pub fn from_device_str(s: &str) -> Self {
        match s {
            "HEAT" => Self::Heat,
            "COOL" => Self::Cool,
            "DRY" => Self::Dry,
            "FAN" => Self::Fan,
            _ => Self::Auto,
        }
    }
}

/// Fan speed setting. The unit accepts QUIET, AUTO, or a numeric step 1-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FanSpeed {
    Quiet,
    Auto,
    One,
    Two,
    Three,
    Four,
}

impl FanSpeed {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quiet => "QUIET",
            Self::Auto => "AUTO",
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
        }
    }

    /// Total: unknown speed strings fall back to AUTO.
    pub fn from_device_str(s: &str) -> Self {
        match s {
            "QUIET" => Self::Quiet,
            "1" => Self::One,
            "2" => Self::Two,
            "3" => Self::Three,
            "4" => Self::Four,
            _ => Self::Auto,
        }
    }
}

/// Vertical vane setting. The unit accepts AUTO, a numeric step 1-5, or SWING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vane {
    Auto,
    Step1,
    Step2,
    Step3,
    Step4,
    Step5,
    Swing,
}

impl Vane {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Step1 => "1",
            Self::Step2 => "2",
            Self::Step3 => "3",
            Self::Step4 => "4",
            Self::Step5 => "5",
            Self::Swing => "SWING",
        }
    }

    /// Total: unknown vane strings fall back to AUTO.
    pub fn from_device_str(s: &str) -> Self {
        match s {
            "1" => Self::Step1,
            "2" => Self::Step2,
            "3" => Self::Step3,
            "4" => Self::Step4,
            "5" => Self::Step5,
            "SWING" => Self::Swing,
            _ => Self::Auto,
        }
    }
}

/// Full settings block as cached by the heat-pump link after a sync.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatPumpSettings {
    pub power: Power,
    pub mode: Mode,
    /// Target temperature in degrees Celsius, 16-31 in 0.5 steps.
    pub temperature: f64,
    pub fan: FanSpeed,
    pub vane: Vane,
}

impl Default for HeatPumpSettings {
    fn default() -> Self {
        Self {
            power: Power::Off,
            mode: Mode::Auto,
            temperature: 22.0,
            fan: FanSpeed::Auto,
            vane: Vane::Auto,
        }
    }
}

/// Heating/cooling state value of the hub's thermostat service.
/// AUTO is not representable here; a unit running AUTO surfaces as Off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubPowerMode {
    Off,
    Heat,
    Cool,
}

impl HubPowerMode {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Heat => 1,
            Self::Cool => 2,
        }
    }
}

/// Target heating/cooling state value of the hub's thermostat service.
/// Unlike the current state, AUTO is representable here (value 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubTargetState {
    Off,
    Heat,
    Cool,
    Auto,
}

impl HubTargetState {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Heat => 1,
            Self::Cool => 2,
            Self::Auto => 3,
        }
    }
}

/// Slat state value of the hub's slat service (0 fixed, 2 swinging).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlatState {
    Fixed,
    Swinging,
}

impl SlatState {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Fixed => 0,
            Self::Swinging => 2,
        }
    }
}

/// The accessory service whose characteristic write triggered a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceId {
    Thermostat,
    Fan,
    Slat,
}

/// Snapshot of every uncommitted "new value" the hub is asking for,
/// assembled by the accessory layer regardless of which service fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HubWriteSnapshot {
    pub service: ServiceId,
    /// 0 off, 1 heat, 2 cool, 3 auto.
    pub target_heating_cooling_state: u8,
    /// Degrees Celsius.
    pub target_temperature: f64,
    /// Discrete fan level 0-5.
    pub fan_level: u8,
    /// 0 swing disabled, 1 swing enabled.
    pub swing_mode: u8,
    /// Degrees, -90 to 90.
    pub target_tilt_angle: i32,
}

/// A single characteristic value to publish back to the hub.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MirrorUpdate {
    CurrentTemperature(f64),
    TargetTemperature(f64),
    CurrentMode(HubPowerMode),
    TargetMode(HubTargetState),
    FanLevel(u8),
    SlatState(SlatState),
    SwingMode(u8),
}
