use std::{
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::Mutex,
};
use tracing::{info, warn};

use heatpump_common::{
    BridgeConfig, HeatPumpLink, HubWriteSnapshot, MirrorUpdate, ReconcileEngine, ServiceId,
};

use crate::sim::SimulatedHeatPump;

/// One line typed on stdin, standing in for a characteristic write from
/// the hub in host builds.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    /// 0 off, 1 heat, 2 cool, 3 auto.
    Mode(u8),
    Target(f64),
    Fan(u8),
    Swing(bool),
    Tilt(i32),
}

/// The hub-side "new value" fields. A command mutates one of them, then
/// the full set is snapshotted, mirroring how the accessory server hands
/// over every uncommitted value on any service write.
#[derive(Debug, Clone, Copy)]
struct HubCharacteristics {
    target_heating_cooling_state: u8,
    target_temperature: f64,
    fan_level: u8,
    swing_mode: u8,
    target_tilt_angle: i32,
}

impl Default for HubCharacteristics {
    fn default() -> Self {
        Self {
            target_heating_cooling_state: 0,
            target_temperature: 21.0,
            fan_level: 1,
            swing_mode: 0,
            // Negative tilt selects the unit's AUTO vane position.
            target_tilt_angle: -1,
        }
    }
}

impl HubCharacteristics {
    fn apply(&mut self, command: Command) -> ServiceId {
        match command {
            Command::Mode(state) => {
                self.target_heating_cooling_state = state;
                ServiceId::Thermostat
            }
            Command::Target(celsius) => {
                self.target_temperature = celsius;
                ServiceId::Thermostat
            }
            Command::Fan(level) => {
                self.fan_level = level;
                ServiceId::Fan
            }
            Command::Swing(enabled) => {
                self.swing_mode = u8::from(enabled);
                ServiceId::Slat
            }
            Command::Tilt(angle) => {
                self.target_tilt_angle = angle;
                ServiceId::Slat
            }
        }
    }

    fn snapshot(&self, service: ServiceId) -> HubWriteSnapshot {
        HubWriteSnapshot {
            service,
            target_heating_cooling_state: self.target_heating_cooling_state,
            target_temperature: self.target_temperature,
            fan_level: self.fan_level,
            swing_mode: self.swing_mode,
            target_tilt_angle: self.target_tilt_angle,
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = BridgeConfig::default();
    config.sanitize();

    let mut link = SimulatedHeatPump::new();
    match link.connect() {
        Ok(()) => link.enable_external_update(),
        // Not fatal: the bridge keeps serving stale values and the link
        // recovers on its own.
        Err(err) => warn!("heat pump link unavailable: {err}"),
    }

    let engine = Arc::new(Mutex::new(ReconcileEngine::new(config.clone())));
    spawn_reconcile_loop(engine.clone(), link, config.tick_interval_ms);

    info!("bridge running; commands: mode off|heat|cool|auto, target <c>, fan <0-5>, swing on|off, tilt <deg>");

    let mut characteristics = HubCharacteristics::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    return Ok(());
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match parse_command(trimmed) {
                    Ok(command) => {
                        let service = characteristics.apply(command);
                        let snapshot = characteristics.snapshot(service);
                        let mut engine = engine.lock().await;
                        engine.on_hub_write(&snapshot, monotonic_ms());
                    }
                    Err(message) => warn!("{message}"),
                }
            }
        }
    }
}

fn spawn_reconcile_loop(
    engine: Arc<Mutex<ReconcileEngine>>,
    mut link: SimulatedHeatPump,
    tick_interval_ms: u64,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(tick_interval_ms));
        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();
            let updates = {
                let mut engine = engine.lock().await;
                engine.tick(now_ms, &mut link)
            };
            for update in updates {
                publish_mirror(update);
            }
        }
    });
}

/// Host stand-in for committing a characteristic value to the hub.
fn publish_mirror(update: MirrorUpdate) {
    match update {
        MirrorUpdate::CurrentTemperature(c) => info!("current-temperature = {c:.1}"),
        MirrorUpdate::TargetTemperature(c) => info!("target-temperature = {c:.1}"),
        MirrorUpdate::CurrentMode(mode) => info!("current-heating-cooling = {}", mode.as_u8()),
        MirrorUpdate::TargetMode(mode) => info!("target-heating-cooling = {}", mode.as_u8()),
        MirrorUpdate::FanLevel(level) => info!("fan-level = {level}"),
        MirrorUpdate::SlatState(slat) => info!("slat-state = {}", slat.as_u8()),
        MirrorUpdate::SwingMode(flag) => info!("swing-mode = {flag}"),
    }
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let keyword = parts.next().unwrap_or_default();
    let arg = parts.next();
    if parts.next().is_some() {
        return Err(format!("too many arguments: {line}"));
    }

    match (keyword, arg) {
        ("mode", Some("off")) => Ok(Command::Mode(0)),
        ("mode", Some("heat")) => Ok(Command::Mode(1)),
        ("mode", Some("cool")) => Ok(Command::Mode(2)),
        ("mode", Some("auto")) => Ok(Command::Mode(3)),
        ("mode", _) => Err("usage: mode off|heat|cool|auto".to_string()),
        ("target", Some(value)) => match value.parse::<f64>() {
            // "NaN" and "inf" parse successfully; keep them out.
            Ok(celsius) if celsius.is_finite() => Ok(Command::Target(celsius)),
            _ => Err(format!("invalid temperature: {value}")),
        },
        ("fan", Some(value)) => match value.parse::<u8>() {
            Ok(level) if level <= 5 => Ok(Command::Fan(level)),
            _ => Err(format!("invalid fan level (0-5): {value}")),
        },
        ("swing", Some("on")) => Ok(Command::Swing(true)),
        ("swing", Some("off")) => Ok(Command::Swing(false)),
        ("swing", _) => Err("usage: swing on|off".to_string()),
        ("tilt", Some(value)) => match value.parse::<i32>() {
            Ok(angle) if (-90..=90).contains(&angle) => Ok(Command::Tilt(angle)),
            _ => Err(format!("invalid tilt angle (-90..90): {value}")),
        },
        _ => Err(format!("unrecognized command: {line}")),
    }
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
