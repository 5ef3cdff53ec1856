//! Type definitions for `ops_core`.
//!
//! All public types, structs, enums, and ID newtypes used by the pipeline.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::rules::FaultRule;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(StationId);
string_id!(PortId);
string_id!(RuleId);
string_id!(ReportId);
string_id!(TaskId);
string_id!(MaintainerId);
string_id!(PartId);
string_id!(EventId);

/// Composite key identifying one charge port. Histories and handling queues
/// are partitioned by this key. Serialized as the string `"station-port"`;
/// JSON map keys must be strings, so the struct form would break every
/// keyed map in `OpsState`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PortKey {
    pub station: StationId,
    pub port: PortId,
}

impl PortKey {
    pub fn new(station: &StationId, port: &PortId) -> Self {
        Self {
            station: station.clone(),
            port: port.clone(),
        }
    }
}

impl std::fmt::Display for PortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.station, self.port)
    }
}

impl From<PortKey> for String {
    fn from(key: PortKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for PortKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (station, port) = value
            .split_once('-')
            .ok_or_else(|| format!("malformed port key '{value}', expected 'station-port'"))?;
        if station.is_empty() || port.is_empty() {
            return Err(format!("malformed port key '{value}', expected 'station-port'"));
        }
        Ok(Self {
            station: StationId(station.to_string()),
            port: PortId(port.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

/// Fault urgency. Derived `Ord` gives `Critical > Warning > Notice > Normal`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Severity {
    Normal,
    Notice,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FaultCategory {
    Power,
    Communication,
    Temperature,
    Charging,
}

impl FaultCategory {
    pub const ALL: [FaultCategory; 4] = [
        FaultCategory::Power,
        FaultCategory::Communication,
        FaultCategory::Temperature,
        FaultCategory::Charging,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkillLevel {
    Basic,
    Intermediate,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Created,
    Ready,
    InProgress,
    Completed,
    /// Terminal state entered when a plan step fails. The original pipeline
    /// left such tasks stuck in `InProgress` forever; an explicit terminal
    /// state keeps the maintainer pool and queues consistent.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Positive,
    Negative,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Preparation,
    Check,
    Repair,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortStatus {
    Ready,
    Charging,
    Fault,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargingMode {
    Fast,
    Normal,
    Eco,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TariffPeriod {
    Peak,
    Valley,
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsState {
    pub meta: MetaState,
    pub stations: HashMap<StationId, StationState>,
    /// Roster order is meaningful: assignment ties break toward the earlier
    /// entry, so the roster is a `Vec` rather than a map.
    pub maintainers: Vec<Maintainer>,
    pub parts: HashMap<PartId, SparePart>,
    /// Bounded per-port diagnosis history (cap in `Constants`), oldest first.
    pub diagnosis_history: HashMap<PortKey, VecDeque<FusedDiagnosisReport>>,
    /// Active handling queues, sorted descending by priority.
    pub queues: HashMap<PortKey, Vec<HandlingTask>>,
    pub task_history: HashMap<PortKey, Vec<HandlingTask>>,
    pub counters: Counters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub tick: u64,
    pub seed: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_report_id: u64,
    pub next_task_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationState {
    pub id: StationId,
    pub name: String,
    pub ports: HashMap<PortId, PortState>,
    /// Station-wide power ceiling, adjusted by tariff-period limits.
    pub max_total_power_kw: f32,
    /// Nameplate ceiling; period limits rescale `max_total_power_kw` from
    /// this.
    pub hardware_max_total_power_kw: f32,
    pub current_period: Option<TariffPeriod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortState {
    pub id: PortId,
    pub status: PortStatus,
    pub charging_mode: ChargingMode,
    pub current_power_kw: f32,
    pub min_power_kw: f32,
    /// Effective ceiling under the current mode and tariff period.
    pub max_power_kw: f32,
    /// Hardware ceiling; mode switches rescale `max_power_kw` from this.
    pub hardware_max_power_kw: f32,
    pub last_adjustment: Option<PowerAdjustment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerAdjustment {
    pub tick: u64,
    pub from_kw: f32,
    pub to_kw: f32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maintainer {
    pub id: MaintainerId,
    pub name: String,
    pub level: SkillLevel,
    pub skills: Vec<FaultCategory>,
    pub available: bool,
    pub current_task: Option<TaskId>,
    pub contact: ContactInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparePart {
    pub id: PartId,
    pub name: String,
    pub category: FaultCategory,
    pub stock: u32,
    /// A restock notification fires when stock drops to or below this.
    pub threshold: u32,
}

// ---------------------------------------------------------------------------
// Diagnosis types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub name: String,
    pub category: FaultCategory,
    pub severity: Severity,
    pub confidence: f32,
}

/// One diagnosis method's raw output, produced independently and never
/// mutated after production.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodResult {
    pub faults: Vec<Fault>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedDiagnosisReport {
    pub id: ReportId,
    pub station: StationId,
    pub port: PortId,
    pub tick: u64,
    pub faults: Vec<Fault>,
    pub overall_severity: Severity,
    /// Arithmetic mean of retained fault confidences; 0.0 for a clean report.
    pub confidence: f32,
    /// Trust in the fused result as a whole, distinct from per-fault
    /// confidence. Rises with method agreement and sample size.
    pub reliability: f32,
    pub summary: String,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub fault: String,
    pub checks: Vec<String>,
    pub repairs: Vec<String>,
    pub preventive: Vec<String>,
}

// ---------------------------------------------------------------------------
// Handling types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlingTask {
    pub id: TaskId,
    pub station: StationId,
    pub port: PortId,
    /// Owned read-only copy of the report that originated this task.
    pub report: FusedDiagnosisReport,
    /// Computed once at creation; never recalculated afterwards.
    pub priority: i32,
    pub status: TaskStatus,
    pub maintainer: Option<MaintainerId>,
    pub required_parts: Vec<RequiredPart>,
    pub plan: HandlingPlan,
    /// 0–100, updated after each completed step.
    pub progress: f32,
    pub log: Vec<TaskLogEntry>,
    pub created_tick: u64,
    pub started_tick: Option<u64>,
    pub completed_tick: Option<u64>,
    /// Index of the next plan step to execute.
    pub next_step: usize,
    /// Tick at which the currently executing step finishes.
    pub step_eta_tick: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredPart {
    pub part_id: PartId,
    pub name: String,
    pub quantity: u32,
    /// Stock level observed at resolution time. Nothing is reserved.
    pub stock: u32,
    pub available: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlingPlan {
    pub steps: Vec<PlanStep>,
    pub safety_precautions: Vec<String>,
    pub required_tools: Vec<String>,
    pub estimated_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub sequence: u32,
    pub kind: StepKind,
    pub description: String,
    pub estimated_minutes: u64,
    pub tools: Vec<String>,
    /// Parts consumed by this step; checked against stock at execution time.
    pub parts: Vec<PartId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogEntry {
    pub tick: u64,
    pub kind: LogKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    Progress,
    Error,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Addressee of a notification-style event. Delivery is the concern of an
/// external sink; the engine only records who should hear about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    Maintainer(MaintainerId),
    StationAdmin(StationId),
    MaintenanceSupervisor,
    InventoryManager,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    DiagnosisCompleted {
        report_id: ReportId,
        station: StationId,
        port: PortId,
        severity: Severity,
        confidence: f32,
        fault_count: usize,
    },
    TaskCreated {
        recipient: Recipient,
        task_id: TaskId,
        station: StationId,
        port: PortId,
        severity: Severity,
    },
    TaskAssigned {
        recipient: Recipient,
        task_id: TaskId,
        station: StationId,
        port: PortId,
        priority: i32,
    },
    TaskStarted {
        task_id: TaskId,
        station: StationId,
        port: PortId,
    },
    StepCompleted {
        task_id: TaskId,
        sequence: u32,
        progress: f32,
    },
    TaskCompleted {
        recipient: Recipient,
        task_id: TaskId,
        station: StationId,
        port: PortId,
        maintainer: Option<MaintainerId>,
    },
    TaskFailed {
        task_id: TaskId,
        sequence: u32,
        reason: String,
    },
    LowStock {
        recipient: Recipient,
        part_id: PartId,
        name: String,
        stock: u32,
        threshold: u32,
    },
    PowerAdjusted {
        station: StationId,
        port: PortId,
        from_kw: f32,
        to_kw: f32,
        reason: String,
    },
    ChargingStateChanged {
        station: StationId,
        port: PortId,
        charging: bool,
    },
    ChargingModeChanged {
        station: StationId,
        port: PortId,
        mode: ChargingMode,
        max_power_kw: f32,
    },
    LoadBalanced {
        station: StationId,
        total_kw: f32,
        average_kw: f32,
        ports_adjusted: usize,
    },
    PeriodLimitsApplied {
        station: StationId,
        period: TariffPeriod,
        max_total_kw: f32,
    },
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

/// Immutable pipeline content: rule registry, pattern library, static
/// category tables, tuning constants. Defined at process start; engines only
/// read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsContent {
    pub rules: HashMap<FaultCategory, Vec<FaultRule>>,
    pub patterns: Vec<FaultPattern>,
    pub part_rules: Vec<PartRule>,
    pub actions: HashMap<FaultCategory, CategoryActions>,
    pub tool_rules: Vec<ToolRule>,
    pub repair_steps: HashMap<FaultCategory, RepairStepDef>,
    pub safety: SafetyTable,
    pub constants: Constants,
}

/// A known fault's feature-space signature for the pattern method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultPattern {
    pub name: String,
    pub category: FaultCategory,
    pub severity: Severity,
    pub signature: Vec<f32>,
}

/// Maps fault-name keywords to a spare part requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartRule {
    pub category: FaultCategory,
    pub keywords: Vec<String>,
    pub part_id: PartId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryActions {
    pub checks: Vec<String>,
    pub repairs: Vec<String>,
    pub preventive: Vec<String>,
}

/// Maps action-text keywords to the tools a check step needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRule {
    pub keyword: String,
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairStepDef {
    pub description: String,
    pub estimated_minutes: u64,
    pub tools: Vec<String>,
    pub parts: Vec<PartId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyTable {
    pub universal: Vec<String>,
    pub by_category: HashMap<FaultCategory, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    pub rated_voltage: f32,
    pub rated_current: f32,
    /// Fusion weights, in method order rule / statistical / pattern.
    pub method_weights: [f32; 3],
    pub pattern_similarity_threshold: f32,
    /// z-score above which a history sample counts as anomalous.
    pub anomaly_z_threshold: f32,
    /// Slope magnitude below which a trend is classified `Stable`.
    pub trend_dead_band: f32,
    /// History length at which the reliability sample term saturates.
    pub reliability_sample_window: usize,
    pub diagnosis_history_cap: usize,
    /// Queue processor cadence in ticks.
    pub process_interval_ticks: u64,
    pub default_tool: String,
    pub prep_step_minutes: u64,
    pub check_step_minutes: u64,
    pub test_step_minutes: u64,
}
