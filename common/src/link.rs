use thiserror::Error;

use crate::types::HeatPumpSettings;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("heat pump link is not connected")]
    NotConnected,
    #[error("heat pump did not acknowledge the command")]
    NoAck,
    #[error("serial transport error: {0}")]
    Transport(String),
}

/// Narrow surface of the heat-pump serial collaborator. Reads and writes
/// are bounded calls; the transport owns its own timeouts and the cached
/// settings/temperature refreshed by `sync`.
pub trait HeatPumpLink {
    fn connect(&mut self) -> Result<(), LinkError>;

    /// Ask the unit to report changes made from a physical remote.
    fn enable_external_update(&mut self);

    /// Bounded blocking refresh of the cached settings and temperature.
    fn sync(&mut self) -> Result<(), LinkError>;

    /// Last settings block received from the unit.
    fn settings(&self) -> HeatPumpSettings;

    /// Stage a settings block; nothing is sent until `update`.
    fn set_settings(&mut self, settings: HeatPumpSettings);

    /// Commit staged settings to the unit.
    fn update(&mut self) -> Result<(), LinkError>;

    /// Last room temperature received from the unit; 0.0 means the
    /// sensor has not reported yet.
    fn room_temperature(&self) -> f64;
}
