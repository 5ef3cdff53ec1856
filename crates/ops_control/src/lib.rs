//! Station-side device control: power adjustment, charging start/stop, mode
//! switching, load balancing, tariff-period limits and the fault intake gate
//! that feeds the diagnosis/handling pipeline.
//!
//! Every operation issues its command through the [`DeviceLink`] trait before
//! touching state, so a refused command leaves the port untouched.

use ops_core::telemetry::TelemetrySample;
use ops_core::{
    diagnose, emit, handle_fault, ChargingMode, Event, EventEnvelope, FusedDiagnosisReport,
    OpsContent, OpsError, OpsState, PortId, PortState, PortStatus, PowerAdjustment, Severity,
    StationId, TariffPeriod, TaskId,
};
use serde::{Deserialize, Serialize};

/// Power deviation (kW) above which load balancing touches a port.
const BALANCE_DEAD_BAND_KW: f32 = 5.0;

/// Command sent to the physical charge point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceCommand {
    AdjustPower { kw: f32 },
    StartCharging,
    StopCharging,
    SwitchMode { mode: ChargingMode },
    Shutdown,
}

impl DeviceCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceCommand::AdjustPower { .. } => "adjust_power",
            DeviceCommand::StartCharging => "start_charging",
            DeviceCommand::StopCharging => "stop_charging",
            DeviceCommand::SwitchMode { .. } => "switch_mode",
            DeviceCommand::Shutdown => "shutdown",
        }
    }
}

/// Hardware acknowledgement. Carries nothing today; the trait returns it so
/// a richer link can extend it without changing every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// Seam to the charge-point hardware. The production implementation talks a
/// vendor protocol; tests inject [`SimulatedLink`].
pub trait DeviceLink {
    fn send(
        &mut self,
        station: &StationId,
        port: &PortId,
        command: DeviceCommand,
    ) -> Result<Ack, OpsError>;
}

/// In-memory link: records every command and fails the kinds it is told to.
#[derive(Debug, Default)]
pub struct SimulatedLink {
    pub sent: Vec<(StationId, PortId, DeviceCommand)>,
    pub fail_kinds: Vec<&'static str>,
}

impl DeviceLink for SimulatedLink {
    fn send(
        &mut self,
        station: &StationId,
        port: &PortId,
        command: DeviceCommand,
    ) -> Result<Ack, OpsError> {
        if self.fail_kinds.contains(&command.kind()) {
            return Err(OpsError::Communication {
                station: station.clone(),
                port: port.clone(),
                command: command.kind().to_string(),
            });
        }
        self.sent.push((station.clone(), port.clone(), command));
        Ok(Ack)
    }
}

/// Outcome of [`StationController::intake_fault`]: the report is always
/// produced; a task exists only when the report carried faults severe enough
/// to act on.
#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub report: FusedDiagnosisReport,
    pub task: Option<TaskId>,
}

pub struct StationController<L: DeviceLink> {
    link: L,
}

impl<L: DeviceLink> StationController<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Set a port's charge power. Range-checked against the port's current
    /// min/max; the previous value is kept in `last_adjustment`.
    pub fn adjust_power(
        &mut self,
        state: &mut OpsState,
        station: &StationId,
        port: &PortId,
        kw: f32,
        reason: &str,
    ) -> Result<Vec<EventEnvelope>, OpsError> {
        let tick = state.meta.tick;
        let port_state = lookup_port(state, station, port)?;
        if kw < port_state.min_power_kw || kw > port_state.max_power_kw {
            return Err(OpsError::PowerOutOfRange {
                station: station.clone(),
                port: port.clone(),
                requested_kw: kw,
                min_kw: port_state.min_power_kw,
                max_kw: port_state.max_power_kw,
            });
        }

        self.link
            .send(station, port, DeviceCommand::AdjustPower { kw })?;

        let port_state = lookup_port(state, station, port)?;
        let from_kw = port_state.current_power_kw;
        port_state.current_power_kw = kw;
        port_state.last_adjustment = Some(PowerAdjustment {
            tick,
            from_kw,
            to_kw: kw,
            reason: reason.to_string(),
        });

        Ok(vec![emit(
            &mut state.counters,
            tick,
            Event::PowerAdjusted {
                station: station.clone(),
                port: port.clone(),
                from_kw,
                to_kw: kw,
                reason: reason.to_string(),
            },
        )])
    }

    /// Start or stop charging. Starting requires a `Ready` port, stopping a
    /// `Charging` one.
    pub fn toggle_charging(
        &mut self,
        state: &mut OpsState,
        station: &StationId,
        port: &PortId,
        start: bool,
    ) -> Result<Vec<EventEnvelope>, OpsError> {
        let tick = state.meta.tick;
        let port_state = lookup_port(state, station, port)?;
        let (expected, action, command) = if start {
            (PortStatus::Ready, "start charging", DeviceCommand::StartCharging)
        } else {
            (PortStatus::Charging, "stop charging", DeviceCommand::StopCharging)
        };
        if port_state.status != expected {
            return Err(OpsError::InvalidPortStatus {
                station: station.clone(),
                port: port.clone(),
                action: action.to_string(),
            });
        }

        self.link.send(station, port, command)?;

        let port_state = lookup_port(state, station, port)?;
        port_state.status = if start {
            PortStatus::Charging
        } else {
            PortStatus::Ready
        };

        Ok(vec![emit(
            &mut state.counters,
            tick,
            Event::ChargingStateChanged {
                station: station.clone(),
                port: port.clone(),
                charging: start,
            },
        )])
    }

    /// Switch the charge mode and rescale the port's power ceiling from its
    /// hardware maximum: fast 1.0, normal 0.8, eco 0.6.
    pub fn switch_mode(
        &mut self,
        state: &mut OpsState,
        station: &StationId,
        port: &PortId,
        mode: ChargingMode,
    ) -> Result<Vec<EventEnvelope>, OpsError> {
        let tick = state.meta.tick;
        lookup_port(state, station, port)?;

        self.link
            .send(station, port, DeviceCommand::SwitchMode { mode })?;

        let port_state = lookup_port(state, station, port)?;
        port_state.charging_mode = mode;
        port_state.max_power_kw = port_state.hardware_max_power_kw * mode_factor(mode);
        let max_power_kw = port_state.max_power_kw;

        Ok(vec![emit(
            &mut state.counters,
            tick,
            Event::ChargingModeChanged {
                station: station.clone(),
                port: port.clone(),
                mode,
                max_power_kw,
            },
        )])
    }

    /// Pull every charging port toward the station's average power. Ports
    /// within the dead band are left alone.
    pub fn balance_load(
        &mut self,
        state: &mut OpsState,
        station: &StationId,
    ) -> Result<Vec<EventEnvelope>, OpsError> {
        let station_state = state
            .stations
            .get(station)
            .ok_or_else(|| OpsError::UnknownStation(station.clone()))?;

        let charging: Vec<(PortId, f32)> = station_state
            .ports
            .values()
            .filter(|p| p.status == PortStatus::Charging)
            .map(|p| (p.id.clone(), p.current_power_kw))
            .collect();
        if charging.is_empty() {
            return Ok(Vec::new());
        }

        let total_kw: f32 = charging.iter().map(|(_, kw)| kw).sum();
        let average_kw = total_kw / charging.len() as f32;

        let mut ports: Vec<&PortId> = charging.iter().map(|(id, _)| id).collect();
        ports.sort();
        let mut events = Vec::new();
        let mut ports_adjusted = 0;
        for port in ports {
            let current = lookup_port(state, station, port)?.current_power_kw;
            if (current - average_kw).abs() > BALANCE_DEAD_BAND_KW {
                events.extend(self.adjust_power(
                    state,
                    station,
                    port,
                    average_kw,
                    "load balancing",
                )?);
                ports_adjusted += 1;
            }
        }

        let tick = state.meta.tick;
        events.push(emit(
            &mut state.counters,
            tick,
            Event::LoadBalanced {
                station: station.clone(),
                total_kw,
                average_kw,
                ports_adjusted,
            },
        ));
        Ok(events)
    }

    /// Apply tariff-period limits: peak caps the station at 80% of nameplate
    /// and every port at 70% of its hardware maximum; valley restores both.
    /// Ports running above their new ceiling are adjusted down first.
    pub fn apply_period_limits(
        &mut self,
        state: &mut OpsState,
        station: &StationId,
        period: TariffPeriod,
    ) -> Result<Vec<EventEnvelope>, OpsError> {
        let (total_factor, port_factor) = match period {
            TariffPeriod::Peak => (0.8, 0.7),
            TariffPeriod::Valley => (1.0, 1.0),
        };

        let station_state = state
            .stations
            .get(station)
            .ok_or_else(|| OpsError::UnknownStation(station.clone()))?;
        let mut ports: Vec<PortId> = station_state.ports.keys().cloned().collect();
        ports.sort();

        let mut events = Vec::new();
        for port in &ports {
            let port_state = lookup_port(state, station, port)?;
            let new_max = port_state.hardware_max_power_kw * port_factor;
            if port_state.current_power_kw > new_max {
                events.extend(self.adjust_power(
                    state,
                    station,
                    port,
                    new_max,
                    "tariff period limit",
                )?);
            }
            lookup_port(state, station, port)?.max_power_kw = new_max;
        }

        let tick = state.meta.tick;
        let station_state = state
            .stations
            .get_mut(station)
            .ok_or_else(|| OpsError::UnknownStation(station.clone()))?;
        station_state.current_period = Some(period);
        station_state.max_total_power_kw =
            station_state.hardware_max_total_power_kw * total_factor;
        let max_total_kw = station_state.max_total_power_kw;

        events.push(emit(
            &mut state.counters,
            tick,
            Event::PeriodLimitsApplied {
                station: station.clone(),
                period,
                max_total_kw,
            },
        ));
        Ok(events)
    }

    /// The pipeline gate: diagnose one port's telemetry and act on the
    /// result. A clean report ends here. A critical report stops charging
    /// and shuts the port down; a warning halves its power (clamped to the
    /// port minimum). Critical and warning reports then get a handling task.
    pub fn intake_fault(
        &mut self,
        state: &mut OpsState,
        content: &OpsContent,
        station: &StationId,
        port: &PortId,
        telemetry: &TelemetrySample,
    ) -> Result<(IntakeOutcome, Vec<EventEnvelope>), OpsError> {
        let (report, mut events) = diagnose(state, content, station, port, telemetry)?;
        if report.faults.is_empty() {
            return Ok((IntakeOutcome { report, task: None }, events));
        }

        match report.overall_severity {
            Severity::Critical => {
                if lookup_port(state, station, port)?.status == PortStatus::Charging {
                    events.extend(self.toggle_charging(state, station, port, false)?);
                }
                self.link.send(station, port, DeviceCommand::Shutdown)?;
                lookup_port(state, station, port)?.status = PortStatus::Fault;
            }
            Severity::Warning => {
                let port_state = lookup_port(state, station, port)?;
                let target = (port_state.current_power_kw * 0.5).max(port_state.min_power_kw);
                events.extend(self.adjust_power(
                    state,
                    station,
                    port,
                    target,
                    "preventive power reduction",
                )?);
            }
            Severity::Notice | Severity::Normal => {}
        }

        let task = match report.overall_severity {
            Severity::Critical | Severity::Warning => {
                let (task_id, handling_events) =
                    handle_fault(state, content, station, port, &report)?;
                events.extend(handling_events);
                Some(task_id)
            }
            Severity::Notice | Severity::Normal => None,
        };

        Ok((IntakeOutcome { report, task }, events))
    }
}

fn mode_factor(mode: ChargingMode) -> f32 {
    match mode {
        ChargingMode::Fast => 1.0,
        ChargingMode::Normal => 0.8,
        ChargingMode::Eco => 0.6,
    }
}

fn lookup_port<'a>(
    state: &'a mut OpsState,
    station: &StationId,
    port: &PortId,
) -> Result<&'a mut PortState, OpsError> {
    let station_state = state
        .stations
        .get_mut(station)
        .ok_or_else(|| OpsError::UnknownStation(station.clone()))?;
    station_state
        .ports
        .get_mut(port)
        .ok_or_else(|| OpsError::UnknownPort {
            station: station.clone(),
            port: port.clone(),
        })
}
