pub mod config;
pub mod link;
pub mod mapping;
pub mod reconcile;
pub mod types;

pub use config::BridgeConfig;
pub use link::{HeatPumpLink, LinkError};
pub use reconcile::{DesiredConfiguration, ReconcileEngine, ReconcileState};
pub use types::{
    FanSpeed, HeatPumpSettings, HubPowerMode, HubTargetState, HubWriteSnapshot, MirrorUpdate,
    Mode, Power, ServiceId, SlatState, Vane,
};
