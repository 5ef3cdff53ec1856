//! Production content and world bootstrap shared between ops_cli and
//! ops_daemon: the rule registry, pattern library, spare-part catalog,
//! station layout and maintainer roster, plus content cross-reference
//! validation and the seeded telemetry scenario generator.

pub mod scenario;

use anyhow::{Context, Result};
use ops_core::rules::{FaultRule, FieldCondition, Predicate, RatedQuantity};
use ops_core::{
    CategoryActions, Constants, ContactInfo, Counters, FaultCategory, FaultPattern, MaintainerId,
    Maintainer, MetaState, OpsContent, OpsState, PartId, PartRule, PortId, PortState, PortStatus,
    RepairStepDef, RuleId, SafetyTable, Severity, SkillLevel, SparePart, StationId, StationState,
    ToolRule, ChargingMode, FEATURE_DIM,
};
use rand::Rng;
use std::collections::HashMap;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn rule(
    id: &str,
    name: &str,
    severity: Severity,
    category: FaultCategory,
    conditions: Vec<FieldCondition>,
    actions: &[&str],
) -> FaultRule {
    FaultRule {
        id: RuleId(id.to_string()),
        name: name.to_string(),
        severity,
        category,
        conditions,
        suggested_actions: strings(actions),
    }
}

fn cond(field: &str, predicate: Predicate) -> FieldCondition {
    FieldCondition {
        field: field.to_string(),
        predicate,
    }
}

/// The production registry: rules P001-P003, C001-C002, T001-T002,
/// CH001-CH002, the pattern library, part catalog tables and tuning
/// constants.
pub fn default_content() -> OpsContent {
    let mut rules = HashMap::new();
    rules.insert(
        FaultCategory::Power,
        vec![
            rule(
                "P001",
                "output overvoltage",
                Severity::Critical,
                FaultCategory::Power,
                vec![
                    cond(
                        "output_voltage",
                        Predicate::AboveRated {
                            rated: RatedQuantity::Voltage,
                            factor: 1.1,
                        },
                    ),
                    cond("duration", Predicate::Above { threshold: 5.0 }),
                ],
                &[
                    "disconnect the output immediately",
                    "inspect the voltage regulator",
                    "inspect the output filter circuit",
                ],
            ),
            rule(
                "P002",
                "output undervoltage",
                Severity::Warning,
                FaultCategory::Power,
                vec![
                    cond(
                        "output_voltage",
                        Predicate::BelowRated {
                            rated: RatedQuantity::Voltage,
                            factor: 0.9,
                        },
                    ),
                    cond("duration", Predicate::Above { threshold: 5.0 }),
                ],
                &[
                    "check the input supply",
                    "check the voltage regulation loop",
                    "check the load state",
                ],
            ),
            rule(
                "P003",
                "output overcurrent",
                Severity::Critical,
                FaultCategory::Power,
                vec![
                    cond(
                        "output_current",
                        Predicate::AboveRated {
                            rated: RatedQuantity::Current,
                            factor: 1.2,
                        },
                    ),
                    cond("duration", Predicate::Above { threshold: 3.0 }),
                ],
                &[
                    "disconnect the output immediately",
                    "check the load for a short circuit",
                    "check the current sampling circuit",
                ],
            ),
        ],
    );
    rules.insert(
        FaultCategory::Communication,
        vec![
            rule(
                "C001",
                "communication link down",
                Severity::Warning,
                FaultCategory::Communication,
                vec![
                    cond(
                        "connection_status",
                        Predicate::Equals {
                            text: "disconnected".to_string(),
                        },
                    ),
                    cond("duration", Predicate::Above { threshold: 30.0 }),
                ],
                &[
                    "check the network connection",
                    "reset the communication module",
                    "check the protocol configuration",
                ],
            ),
            rule(
                "C002",
                "data link degraded",
                Severity::Notice,
                FaultCategory::Communication,
                vec![
                    cond("packet_loss", Predicate::Above { threshold: 0.1 }),
                    cond("error_rate", Predicate::Above { threshold: 0.05 }),
                ],
                &[
                    "verify data checksums",
                    "analyse the communication log",
                    "update communication parameters",
                ],
            ),
        ],
    );
    rules.insert(
        FaultCategory::Temperature,
        vec![
            rule(
                "T001",
                "connector overtemperature",
                Severity::Critical,
                FaultCategory::Temperature,
                vec![
                    cond("interface_temp", Predicate::Above { threshold: 85.0 }),
                    cond("duration", Predicate::Above { threshold: 10.0 }),
                ],
                &[
                    "stop charging immediately",
                    "force cooling on",
                    "check the cooling system",
                ],
            ),
            rule(
                "T002",
                "radiator overtemperature",
                Severity::Warning,
                FaultCategory::Temperature,
                vec![
                    cond("radiator_temp", Predicate::Above { threshold: 70.0 }),
                    cond(
                        "fan_status",
                        Predicate::NotEquals {
                            text: "normal".to_string(),
                        },
                    ),
                ],
                &[
                    "reduce the charge power",
                    "check the fan operation",
                    "clean the radiator",
                ],
            ),
        ],
    );
    rules.insert(
        FaultCategory::Charging,
        vec![
            rule(
                "CH001",
                "charging handshake failure",
                Severity::Warning,
                FaultCategory::Charging,
                vec![
                    cond(
                        "handshake_status",
                        Predicate::Equals {
                            text: "failed".to_string(),
                        },
                    ),
                    cond("retry_count", Predicate::AtLeast { threshold: 3.0 }),
                ],
                &[
                    "check the charge protocol",
                    "check vehicle compatibility",
                    "reset the charge controller",
                ],
            ),
            rule(
                "CH002",
                "charging session interrupted",
                Severity::Warning,
                FaultCategory::Charging,
                vec![
                    cond(
                        "charging_status",
                        Predicate::Equals {
                            text: "interrupted".to_string(),
                        },
                    ),
                    cond(
                        "output_voltage",
                        Predicate::BelowRated {
                            rated: RatedQuantity::Voltage,
                            factor: 0.5,
                        },
                    ),
                ],
                &[
                    "check the vehicle connection",
                    "analyse the interruption cause",
                    "try restarting the charge session",
                ],
            ),
        ],
    );

    let patterns = vec![
        FaultPattern {
            name: "output overvoltage".to_string(),
            category: FaultCategory::Power,
            severity: Severity::Critical,
            signature: vec![1.15, 0.9, 0.4, 0.0, 0.0, 0.0],
        },
        FaultPattern {
            name: "output undervoltage".to_string(),
            category: FaultCategory::Power,
            severity: Severity::Warning,
            signature: vec![0.85, 0.9, 0.4, 0.0, 0.0, 0.0],
        },
        FaultPattern {
            name: "output overcurrent".to_string(),
            category: FaultCategory::Power,
            severity: Severity::Critical,
            signature: vec![1.0, 1.25, 0.45, 0.0, 0.0, 0.0],
        },
        FaultPattern {
            name: "connector overtemperature".to_string(),
            category: FaultCategory::Temperature,
            severity: Severity::Critical,
            signature: vec![1.0, 0.9, 0.95, 0.0, 0.0, 0.01],
        },
        FaultPattern {
            name: "sustained temperature rise".to_string(),
            category: FaultCategory::Temperature,
            severity: Severity::Notice,
            signature: vec![1.0, 0.9, 0.7, 0.0, 0.0, 0.015],
        },
    ];

    let part_rules = vec![
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
    ];

    let mut actions = HashMap::new();
    actions.insert(
        FaultCategory::Power,
        CategoryActions {
            checks: strings(&["measure the output voltage", "measure the output current"]),
            repairs: strings(&[
                "replace the switch-mode power module",
                "replace the main control board",
            ]),
            preventive: strings(&["schedule a quarterly electrical inspection"]),
        },
    );
    actions.insert(
        FaultCategory::Communication,
        CategoryActions {
            checks: strings(&["test the communication link", "inspect cabling and connectors"]),
            repairs: strings(&[
                "update the communication module firmware",
                "replace the communication module",
            ]),
            preventive: strings(&["monitor packet loss weekly"]),
        },
    );
    actions.insert(
        FaultCategory::Temperature,
        CategoryActions {
            checks: strings(&["check the temperature sensors", "check the fan operation"]),
            repairs: strings(&["clean the cooling system", "replace the cooling fan"]),
            preventive: strings(&["clean radiator fins monthly"]),
        },
    );
    actions.insert(
        FaultCategory::Charging,
        CategoryActions {
            checks: strings(&["check the charge protocol version", "check the vehicle connection"]),
            repairs: strings(&["reset the charge controller"]),
            preventive: strings(&["keep the charge firmware current"]),
        },
    );

    let tool_rules = vec![
        ToolRule {
            keyword: "voltage".to_string(),
            tools: strings(&["multimeter"]),
        },
        ToolRule {
            keyword: "current".to_string(),
            tools: strings(&["clamp meter"]),
        },
        ToolRule {
            keyword: "communication".to_string(),
            tools: strings(&["network analyser"]),
        },
        ToolRule {
            keyword: "network".to_string(),
            tools: strings(&["network analyser"]),
        },
        ToolRule {
            keyword: "temperature".to_string(),
            tools: strings(&["infrared thermometer"]),
        },
        ToolRule {
            keyword: "cooling".to_string(),
            tools: strings(&["cleaning kit", "thermal paste"]),
        },
    ];

    let mut repair_steps = HashMap::new();
    repair_steps.insert(
        FaultCategory::Power,
        RepairStepDef {
            description: "replace the power supply module".to_string(),
            estimated_minutes: 30,
            tools: strings(&["screwdriver set", "multimeter"]),
            parts: vec![PartId("PSU001".to_string())],
        },
    );
    repair_steps.insert(
        FaultCategory::Communication,
        RepairStepDef {
            description: "update the communication module firmware".to_string(),
            estimated_minutes: 20,
            tools: strings(&["flash programmer", "laptop"]),
            parts: Vec::new(),
        },
    );
    repair_steps.insert(
        FaultCategory::Temperature,
        RepairStepDef {
            description: "clean the cooling system".to_string(),
            estimated_minutes: 25,
            tools: strings(&["cleaning kit", "thermal paste"]),
            parts: vec![PartId("FAN001".to_string())],
        },
    );

    let mut safety_by_category = HashMap::new();
    safety_by_category.insert(
        FaultCategory::Power,
        strings(&["use insulated tools and test equipment"]),
    );
    safety_by_category.insert(
        FaultCategory::Temperature,
        strings(&["allow the unit to cool before working on it"]),
    );

    let content = OpsContent {
        rules,
        patterns,
        part_rules,
        actions,
        tool_rules,
        repair_steps,
        safety: SafetyTable {
            universal: strings(&[
                "disconnect the supply before servicing",
                "wear protective equipment",
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
            prep_step_minutes: 5,
            check_step_minutes: 10,
            test_step_minutes: 15,
        },
    };
    validate_content(&content);
    content
}

/// The spare-part catalog: id, name, category, stock, restock threshold.
fn part_catalog() -> Vec<(&'static str, &'static str, FaultCategory, u32, u32)> {
    vec![
        ("PSU001", "switch-mode power module", FaultCategory::Power, 5, 2),
        ("PCB001", "main control board", FaultCategory::Power, 3, 1),
        ("CAP001", "filter capacitor", FaultCategory::Power, 20, 5),
        ("COM001", "communication module", FaultCategory::Communication, 4, 2),
        ("ANT001", "antenna assembly", FaultCategory::Communication, 6, 2),
        ("CAB001", "communication cable", FaultCategory::Communication, 10, 3),
        ("FAN001", "cooling fan", FaultCategory::Temperature, 8, 3),
        ("SEN001", "temperature sensor", FaultCategory::Temperature, 10, 4),
        ("HSK001", "heat sink assembly", FaultCategory::Temperature, 4, 2),
    ]
}

/// Stations CS001-CS005 with their port complements, the three-person
/// maintainer roster and a stocked parts inventory.
pub fn initial_state(seed: u64) -> OpsState {
    let layout: [(&str, &str, f32, usize); 5] = [
        ("CS001", "Chengdu Hi-Tech Station A", 120.0, 12),
        ("CS002", "Chengdu Tianfu Station B", 90.0, 10),
        ("CS003", "Chengdu Wuhou Station C", 150.0, 15),
        ("CS004", "Mianyang Fucheng Station A", 100.0, 8),
        ("CS005", "Deyang Jingyang Station B", 80.0, 6),
    ];

    let mut stations = HashMap::new();
    for (id, name, total_kw, port_count) in layout {
        let mut ports = HashMap::new();
        for n in 1..=port_count {
            let port_id = PortId(format!("P{n:02}"));
            ports.insert(
                port_id.clone(),
                PortState {
                    id: port_id,
                    status: PortStatus::Ready,
                    charging_mode: ChargingMode::Fast,
                    current_power_kw: 0.0,
                    min_power_kw: 5.0,
                    max_power_kw: 60.0,
                    hardware_max_power_kw: 60.0,
                    last_adjustment: None,
                },
            );
        }
        stations.insert(
            StationId(id.to_string()),
            StationState {
                id: StationId(id.to_string()),
                name: name.to_string(),
                ports,
                max_total_power_kw: total_kw,
                hardware_max_total_power_kw: total_kw,
                current_period: None,
            },
        );
    }

    let maintainers = vec![
        Maintainer {
            id: MaintainerId("M001".to_string()),
            name: "Zhang Wei".to_string(),
            level: SkillLevel::Expert,
            skills: vec![
                FaultCategory::Power,
                FaultCategory::Communication,
                FaultCategory::Temperature,
            ],
            available: true,
            current_task: None,
            contact: ContactInfo {
                phone: "13800138000".to_string(),
                email: "zhang@example.com".to_string(),
            },
        },
        Maintainer {
            id: MaintainerId("M002".to_string()),
            name: "Li Qiang".to_string(),
            level: SkillLevel::Intermediate,
            skills: vec![FaultCategory::Power, FaultCategory::Temperature],
            available: true,
            current_task: None,
            contact: ContactInfo {
                phone: "13800138001".to_string(),
                email: "li@example.com".to_string(),
            },
        },
        Maintainer {
            id: MaintainerId("M003".to_string()),
            name: "Wang Fang".to_string(),
            level: SkillLevel::Basic,
            skills: vec![FaultCategory::Temperature],
            available: true,
            current_task: None,
            contact: ContactInfo {
                phone: "13800138002".to_string(),
                email: "wang@example.com".to_string(),
            },
        },
    ];

    let parts = part_catalog()
        .into_iter()
        .map(|(id, name, category, stock, threshold)| {
            (
                PartId(id.to_string()),
                SparePart {
                    id: PartId(id.to_string()),
                    name: name.to_string(),
                    category,
                    stock,
                    threshold,
                },
            )
        })
        .collect();

    OpsState {
        meta: MetaState { tick: 0, seed },
        stations,
        maintainers,
        parts,
        diagnosis_history: HashMap::new(),
        queues: HashMap::new(),
        task_history: HashMap::new(),
        counters: Counters::default(),
    }
}

/// Fields rule predicates may reference. Anything else in a rule condition
/// is an authoring error.
const KNOWN_FIELDS: [&str; 12] = [
    "output_voltage",
    "output_current",
    "duration",
    "connection_status",
    "packet_loss",
    "error_rate",
    "interface_temp",
    "radiator_temp",
    "fan_status",
    "handshake_status",
    "retry_count",
    "charging_status",
];

/// Validates content-internal cross-references, panicking on any authoring
/// error.
///
/// Catches mistakes like a pattern signature of the wrong dimension or a
/// rule condition referencing a field telemetry never carries. Part
/// references depend on the operator's inventory, so they are checked
/// separately by `validate_part_references` once the state is known.
pub fn validate_content(content: &OpsContent) {
    for (category, rules) in &content.rules {
        for rule in rules {
            assert!(
                rule.category == *category,
                "rule '{}' is filed under {category:?} but declares {:?}",
                rule.id.0,
                rule.category,
            );
            for condition in &rule.conditions {
                assert!(
                    KNOWN_FIELDS.contains(&condition.field.as_str()),
                    "rule '{}' references unknown telemetry field '{}'",
                    rule.id.0,
                    condition.field,
                );
            }
        }
    }

    for pattern in &content.patterns {
        assert!(
            pattern.signature.len() == FEATURE_DIM,
            "pattern '{}' signature has {} dimensions, expected {FEATURE_DIM}",
            pattern.name,
            pattern.signature.len(),
        );
    }

    for category in FaultCategory::ALL {
        if content.rules.get(&category).is_some_and(|r| !r.is_empty()) {
            assert!(
                content.actions.contains_key(&category),
                "category {category:?} has rules but no action table",
            );
        }
    }
}

/// Part references point at the operator's inventory, not a fixed catalog;
/// a content override may name any part the running state stocks. Panics
/// when a part rule or repair step names a part the inventory lacks.
pub fn validate_part_references(content: &OpsContent, parts: &HashMap<PartId, SparePart>) {
    for part_rule in &content.part_rules {
        assert!(
            parts.contains_key(&part_rule.part_id),
            "part rule for {:?} names '{}' which is not in the inventory",
            part_rule.category,
            part_rule.part_id.0,
        );
    }

    for (category, repair) in &content.repair_steps {
        for part in &repair.parts {
            assert!(
                parts.contains_key(part),
                "repair step for {category:?} names '{}' which is not in the inventory",
                part.0,
            );
        }
    }
}

/// Load a content override from a JSON file. Runs the same cross-reference
/// validation as `default_content`, so an invalid override panics rather
/// than limping along with dangling references. Part references are checked
/// against the inventory afterwards, via `validate_part_references`.
pub fn load_content(path: &str) -> Result<OpsContent> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading content file {path}"))?;
    let content: OpsContent =
        serde_json::from_str(&text).with_context(|| format!("parsing content file {path}"))?;
    validate_content(&content);
    Ok(content)
}

/// Human-readable run identifier: UTC timestamp, seed, and a deterministic
/// uuid derived from the seeded rng.
pub fn run_id(seed: u64, rng: &mut impl Rng) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let bytes: [u8; 16] = rng.gen();
    let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
    format!("{timestamp}_seed{seed}_{uuid}")
}
