//! Shared test fixtures for ops_core and downstream crates.
//!
//! `base_content()` provides a compressed `OpsContent` suitable for
//! integration-level tests (one or two rules per category, a small pattern
//! library, full part and action tables). `base_state()` provides one station
//! with two ports, a three-person roster, and a stocked parts inventory.

use crate::rules::{FaultRule, FieldCondition, Predicate, RatedQuantity};
use crate::telemetry::{FieldValue, TelemetrySample};
use crate::{
    CategoryActions, Constants, ContactInfo, Counters, FaultCategory, FaultPattern, MaintainerId,
    MetaState, Maintainer, OpsContent, OpsState, PartId, PartRule, PortId, PortState, PortStatus,
    RepairStepDef, RuleId, SafetyTable, Severity, SkillLevel, SparePart, StationId, StationState,
    ToolRule, ChargingMode,
};
use std::collections::HashMap;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Compressed content: enough rules and patterns to exercise every diagnosis
/// method, full part/action/tool/safety tables for the handling pipeline.
pub fn base_content() -> OpsContent {
    let mut rules = HashMap::new();
    rules.insert(
        FaultCategory::Power,
        vec![
            FaultRule {
                id: RuleId("P001".to_string()),
                name: "output overvoltage".to_string(),
                severity: Severity::Critical,
                category: FaultCategory::Power,
                conditions: vec![
                    FieldCondition {
                        field: "output_voltage".to_string(),
                        predicate: Predicate::AboveRated {
                            rated: RatedQuantity::Voltage,
                            factor: 1.1,
                        },
                    },
                    FieldCondition {
                        field: "duration".to_string(),
                        predicate: Predicate::AtLeast { threshold: 5.0 },
                    },
                ],
                suggested_actions: strings(&[
                    "measure output voltage at the connector",
                    "inspect the voltage regulator module",
                ]),
            },
            FaultRule {
                id: RuleId("P002".to_string()),
                name: "output undervoltage".to_string(),
                severity: Severity::Warning,
                category: FaultCategory::Power,
                conditions: vec![FieldCondition {
                    field: "output_voltage".to_string(),
                    predicate: Predicate::BelowRated {
                        rated: RatedQuantity::Voltage,
                        factor: 0.9,
                    },
                }],
                suggested_actions: strings(&["measure output voltage at the connector"]),
            },
        ],
    );
    rules.insert(
        FaultCategory::Communication,
        vec![FaultRule {
            id: RuleId("C001".to_string()),
            name: "communication link down".to_string(),
            severity: Severity::Warning,
            category: FaultCategory::Communication,
            conditions: vec![FieldCondition {
                field: "connection_status".to_string(),
                predicate: Predicate::Equals {
                    text: "disconnected".to_string(),
                },
            }],
            suggested_actions: strings(&["check the communication cabling"]),
        }],
    );
    rules.insert(
        FaultCategory::Temperature,
        vec![FaultRule {
            id: RuleId("T001".to_string()),
            name: "connector overtemperature".to_string(),
            severity: Severity::Critical,
            category: FaultCategory::Temperature,
            conditions: vec![FieldCondition {
                field: "interface_temp".to_string(),
                predicate: Predicate::Above { threshold: 85.0 },
            }],
            suggested_actions: strings(&["measure connector temperature"]),
        }],
    );
    rules.insert(
        FaultCategory::Charging,
        vec![FaultRule {
            id: RuleId("CH001".to_string()),
            name: "charging handshake failure".to_string(),
            severity: Severity::Warning,
            category: FaultCategory::Charging,
            conditions: vec![FieldCondition {
                field: "handshake_status".to_string(),
                predicate: Predicate::Equals {
                    text: "failed".to_string(),
                },
            }],
            suggested_actions: strings(&["check the charge protocol version"]),
        }],
    );

    let mut actions = HashMap::new();
    actions.insert(
        FaultCategory::Power,
        CategoryActions {
            checks: strings(&[
                "measure output voltage at the connector",
                "inspect the voltage regulator module",
            ]),
            repairs: strings(&["replace the power supply unit"]),
            preventive: strings(&["schedule quarterly electrical inspection"]),
        },
    );
    actions.insert(
        FaultCategory::Communication,
        CategoryActions {
            checks: strings(&["check the communication cabling"]),
            repairs: strings(&["replace the communication module"]),
            preventive: strings(&["monitor packet loss weekly"]),
        },
    );
    actions.insert(
        FaultCategory::Temperature,
        CategoryActions {
            checks: strings(&["measure connector temperature"]),
            repairs: strings(&["replace the cooling fan"]),
            preventive: strings(&["clean radiator fins monthly"]),
        },
    );
    actions.insert(
        FaultCategory::Charging,
        CategoryActions {
            checks: strings(&["check the charge protocol version"]),
            repairs: strings(&["replace the charge controller board"]),
            preventive: strings(&["keep charge firmware current"]),
        },
    );

    let mut repair_steps = HashMap::new();
    repair_steps.insert(
        FaultCategory::Power,
        RepairStepDef {
            description: "replace the power supply unit".to_string(),
            estimated_minutes: 45,
            tools: strings(&["insulated toolkit"]),
            parts: vec![PartId("PSU001".to_string())],
        },
    );
    repair_steps.insert(
        FaultCategory::Communication,
        RepairStepDef {
            description: "replace the communication module".to_string(),
            estimated_minutes: 30,
            tools: strings(&["network tester"]),
            parts: vec![PartId("COM001".to_string())],
        },
    );
    repair_steps.insert(
        FaultCategory::Temperature,
        RepairStepDef {
            description: "replace the cooling fan".to_string(),
            estimated_minutes: 30,
            tools: strings(&["basic toolkit"]),
            parts: vec![PartId("FAN001".to_string())],
        },
    );
    repair_steps.insert(
        FaultCategory::Charging,
        RepairStepDef {
            description: "replace the charge controller board".to_string(),
            estimated_minutes: 40,
            tools: strings(&["basic toolkit"]),
            parts: vec![PartId("CTL001".to_string())],
        },
    );

    let mut safety_by_category = HashMap::new();
    safety_by_category.insert(
        FaultCategory::Power,
        strings(&["verify zero voltage before touching conductors"]),
    );
    safety_by_category.insert(
        FaultCategory::Temperature,
        strings(&["allow components to cool before handling"]),
    );

    OpsContent {
        rules,
        patterns: vec![
            FaultPattern {
                name: "output overvoltage".to_string(),
                category: FaultCategory::Power,
                severity: Severity::Critical,
                signature: vec![1.15, 0.9, 0.4, 0.0, 0.0, 0.0],
            },
            FaultPattern {
                name: "connector overtemperature".to_string(),
                category: FaultCategory::Temperature,
                severity: Severity::Critical,
                signature: vec![1.0, 0.9, 0.95, 0.0, 0.0, 0.0],
            },
        ],
        part_rules: vec![
            PartRule {
                category: FaultCategory::Power,
                keywords: strings(&["overvoltage", "undervoltage"]),
                part_id: PartId("PSU001".to_string()),
                quantity: 1,
            },
            PartRule {
                category: FaultCategory::Communication,
                keywords: strings(&["link down"]),
                part_id: PartId("COM001".to_string()),
                quantity: 1,
            },
            PartRule {
                category: FaultCategory::Temperature,
                keywords: strings(&["overtemperature"]),
                part_id: PartId("FAN001".to_string()),
                quantity: 1,
            },
            PartRule {
                category: FaultCategory::Charging,
                keywords: strings(&["handshake"]),
                part_id: PartId("CTL001".to_string()),
                quantity: 1,
            },
        ],
        tool_rules: vec![
            ToolRule {
                keyword: "voltage".to_string(),
                tools: strings(&["multimeter"]),
            },
            ToolRule {
                keyword: "temperature".to_string(),
                tools: strings(&["infrared thermometer"]),
            },
            ToolRule {
                keyword: "communication".to_string(),
                tools: strings(&["network tester"]),
            },
        ],
        actions,
        repair_steps,
        safety: SafetyTable {
            universal: strings(&[
                "cut power to the port before servicing",
                "wear insulated gloves",
            ]),
            by_category: safety_by_category,
        },
        constants: Constants {
            rated_voltage: 220.0,
            rated_current: 32.0,
            method_weights: [0.4, 0.3, 0.3],
            pattern_similarity_threshold: 0.8,
            anomaly_z_threshold: 3.0,
            trend_dead_band: 0.5,
            reliability_sample_window: 10,
            diagnosis_history_cap: 100,
            process_interval_ticks: 5,
            default_tool: "basic toolkit".to_string(),
            prep_step_minutes: 10,
            check_step_minutes: 15,
            test_step_minutes: 20,
        },
    }
}

/// One station `CS001` with ports `P01`/`P02`, a three-person roster ordered
/// expert first, and a stocked parts inventory.
pub fn base_state() -> OpsState {
    let station_id = StationId("CS001".to_string());
    let mut ports = HashMap::new();
    for pid in ["P01", "P02"] {
        ports.insert(
            PortId(pid.to_string()),
            PortState {
                id: PortId(pid.to_string()),
                status: PortStatus::Ready,
                charging_mode: ChargingMode::Normal,
                current_power_kw: 30.0,
                min_power_kw: 5.0,
                max_power_kw: 60.0,
                hardware_max_power_kw: 60.0,
                last_adjustment: None,
            },
        );
    }

    let mut stations = HashMap::new();
    stations.insert(
        station_id.clone(),
        StationState {
            id: station_id,
            name: "Riverside Depot".to_string(),
            ports,
            max_total_power_kw: 120.0,
            hardware_max_total_power_kw: 120.0,
            current_period: None,
        },
    );

    let maintainers = vec![
        Maintainer {
            id: MaintainerId("M001".to_string()),
            name: "Dana Ortiz".to_string(),
            level: SkillLevel::Expert,
            skills: vec![
                FaultCategory::Power,
                FaultCategory::Communication,
                FaultCategory::Temperature,
            ],
            available: true,
            current_task: None,
            contact: ContactInfo {
                phone: "555-0101".to_string(),
                email: "dana@example.com".to_string(),
            },
        },
        Maintainer {
            id: MaintainerId("M002".to_string()),
            name: "Lee Chambers".to_string(),
            level: SkillLevel::Intermediate,
            skills: vec![FaultCategory::Power, FaultCategory::Temperature],
            available: true,
            current_task: None,
            contact: ContactInfo {
                phone: "555-0102".to_string(),
                email: "lee@example.com".to_string(),
            },
        },
        Maintainer {
            id: MaintainerId("M003".to_string()),
            name: "Sam Whitaker".to_string(),
            level: SkillLevel::Basic,
            skills: vec![FaultCategory::Temperature],
            available: true,
            current_task: None,
            contact: ContactInfo {
                phone: "555-0103".to_string(),
                email: "sam@example.com".to_string(),
            },
        },
    ];

    let mut parts = HashMap::new();
    for (id, name, category, stock, threshold) in [
        ("PSU001", "power supply unit", FaultCategory::Power, 5, 2),
        ("COM001", "communication module", FaultCategory::Communication, 4, 2),
        ("FAN001", "cooling fan", FaultCategory::Temperature, 8, 3),
        ("SEN001", "temperature sensor", FaultCategory::Temperature, 10, 4),
        ("CTL001", "charge controller board", FaultCategory::Charging, 4, 2),
    ] {
        parts.insert(
            PartId(id.to_string()),
            SparePart {
                id: PartId(id.to_string()),
                name: name.to_string(),
                category,
                stock,
                threshold,
            },
        );
    }

    OpsState {
        meta: MetaState { tick: 0, seed: 42 },
        stations,
        maintainers,
        parts,
        diagnosis_history: HashMap::new(),
        queues: HashMap::new(),
        task_history: HashMap::new(),
        counters: Counters::default(),
    }
}

fn sample(fields: &[(&str, FieldValue)], v: f32, i: f32, t: f32) -> TelemetrySample {
    TelemetrySample {
        fields: fields
            .iter()
            .map(|(k, val)| ((*k).to_string(), val.clone()))
            .collect(),
        voltage_history: vec![v; 8],
        current_history: vec![i; 8],
        temperature_history: vec![t; 8],
    }
}

/// Healthy telemetry: on-rated voltage and current, cool connector, live
/// link. Produces an empty report under `base_content()`.
pub fn nominal_telemetry() -> TelemetrySample {
    sample(
        &[
            ("output_voltage", FieldValue::Number(220.0)),
            ("output_current", FieldValue::Number(28.8)),
            ("duration", FieldValue::Number(0.0)),
            ("interface_temp", FieldValue::Number(40.0)),
            ("radiator_temp", FieldValue::Number(38.0)),
            ("connection_status", FieldValue::Text("connected".to_string())),
            ("handshake_status", FieldValue::Text("ok".to_string())),
        ],
        220.0,
        28.8,
        40.0,
    )
}

/// Sustained output overvoltage at 1.15x rated: fires rule `P001` and matches
/// the overvoltage pattern signature exactly.
pub fn overvoltage_telemetry() -> TelemetrySample {
    sample(
        &[
            ("output_voltage", FieldValue::Number(253.0)),
            ("output_current", FieldValue::Number(28.8)),
            ("duration", FieldValue::Number(6.0)),
            ("interface_temp", FieldValue::Number(40.0)),
            ("radiator_temp", FieldValue::Number(38.0)),
            ("connection_status", FieldValue::Text("connected".to_string())),
            ("handshake_status", FieldValue::Text("ok".to_string())),
        ],
        253.0,
        28.8,
        40.0,
    )
}

/// Dead communication link with otherwise nominal electrics. Fires `C001`
/// only, a single warning-severity fault.
pub fn link_down_telemetry() -> TelemetrySample {
    sample(
        &[
            ("output_voltage", FieldValue::Number(220.0)),
            ("output_current", FieldValue::Number(28.8)),
            ("duration", FieldValue::Number(0.0)),
            ("interface_temp", FieldValue::Number(40.0)),
            ("radiator_temp", FieldValue::Number(38.0)),
            ("connection_status", FieldValue::Text("disconnected".to_string())),
            ("handshake_status", FieldValue::Text("ok".to_string())),
        ],
        220.0,
        28.8,
        40.0,
    )
}
