//! Bidirectional translation between hub characteristic values and the
//! heat pump's setting domain. Every function here is total: out-of-range
//! or unknown input resolves to a safe default instead of failing.

use crate::types::{FanSpeed, HubPowerMode, HubTargetState, Mode, Power, SlatState, Vane};

/// Lowest target temperature the unit's command set accepts, in Celsius.
pub const MIN_DEVICE_TARGET_C: f64 = 16.0;
/// Highest target temperature the unit's command set accepts, in Celsius.
pub const MAX_DEVICE_TARGET_C: f64 = 31.0;
/// Floor of the hub's target-temperature characteristic range.
pub const MIN_HUB_TARGET_C: f64 = 10.0;
/// Fallback target when the hub hands over a non-finite temperature.
pub const DEFAULT_DEVICE_TARGET_C: f64 = 22.0;

/// Heating/cooling state shown on the hub for a given unit state.
/// AUTO (and DRY/FAN) have no distinct hub representation and surface
/// as Off; the hub's own target value is the only place AUTO survives.
pub fn hub_power_mode_from_device(power: Power, mode: Mode) -> HubPowerMode {
    if power == Power::Off {
        return HubPowerMode::Off;
    }
    match mode {
        Mode::Heat => HubPowerMode::Heat,
        Mode::Cool => HubPowerMode::Cool,
        _ => HubPowerMode::Off,
    }
}

/// Target heating/cooling state shown on the hub for a given unit
/// state. The target side, unlike the current side, keeps AUTO distinct
/// so a poll never reverts an "auto" selection to "off"; DRY/FAN still
/// surface as Off.
pub fn hub_target_mode_from_device(power: Power, mode: Mode) -> HubTargetState {
    if power == Power::Off {
        return HubTargetState::Off;
    }
    match mode {
        Mode::Heat => HubTargetState::Heat,
        Mode::Cool => HubTargetState::Cool,
        Mode::Auto => HubTargetState::Auto,
        _ => HubTargetState::Off,
    }
}

/// Only hub state 0 turns the unit off; every other state powers it on.
pub fn device_power_from_hub(state: u8) -> Power {
    if state == 0 {
        Power::Off
    } else {
        Power::On
    }
}

pub fn device_mode_from_hub(state: u8) -> Mode {
    match state {
        1 => Mode::Heat,
        2 => Mode::Cool,
        _ => Mode::Auto,
    }
}

/// Ordered bijection {QUIET, AUTO, 1, 2, 3, 4} <-> {0..5}.
pub fn hub_fan_level_from_device_speed(speed: FanSpeed) -> u8 {
    match speed {
        FanSpeed::Quiet => 0,
        FanSpeed::Auto => 1,
        FanSpeed::One => 2,
        FanSpeed::Two => 3,
        FanSpeed::Three => 4,
        FanSpeed::Four => 5,
    }
}

/// Inverse of [`hub_fan_level_from_device_speed`]; levels above 5 clamp
/// to QUIET.
pub fn device_speed_from_hub_fan_level(level: u8) -> FanSpeed {
    match level {
        1 => FanSpeed::Auto,
        2 => FanSpeed::One,
        3 => FanSpeed::Two,
        4 => FanSpeed::Three,
        5 => FanSpeed::Four,
        _ => FanSpeed::Quiet,
    }
}

pub fn hub_slat_state_from_device_vane(vane: Vane) -> SlatState {
    if vane == Vane::Swing {
        SlatState::Swinging
    } else {
        SlatState::Fixed
    }
}

pub fn hub_swing_flag_from_device_vane(vane: Vane) -> u8 {
    if vane == Vane::Swing {
        1
    } else {
        0
    }
}

/// Swing enabled forces SWING; otherwise the tilt angle is bucketed into
/// the unit's five fixed vane steps, with negative angles meaning AUTO.
pub fn device_vane_from_hub(swing_flag: u8, tilt_angle: i32) -> Vane {
    if swing_flag == 1 {
        return Vane::Swing;
    }
    match tilt_angle {
        i32::MIN..=-1 => Vane::Auto,
        0..=14 => Vane::Step1,
        15..=29 => Vane::Step2,
        30..=44 => Vane::Step3,
        45..=59 => Vane::Step4,
        60..=90 => Vane::Step5,
        _ => Vane::Auto,
    }
}

/// Clamp a hub target temperature into the unit's accepted range and
/// round to its 0.5 degree command granularity. NaN and infinities
/// resolve to [`DEFAULT_DEVICE_TARGET_C`]; `clamp` alone would let NaN
/// through to the serial command.
pub fn device_temperature_from_hub(celsius: f64) -> f64 {
    if !celsius.is_finite() {
        return DEFAULT_DEVICE_TARGET_C;
    }
    let clamped = celsius.clamp(MIN_DEVICE_TARGET_C, MAX_DEVICE_TARGET_C);
    (clamped * 2.0).round() / 2.0
}

/// The hub's target-temperature characteristic bottoms out at 10 degrees.
pub fn hub_target_temperature_from_device(celsius: f64) -> f64 {
    celsius.max(MIN_HUB_TARGET_C)
}
