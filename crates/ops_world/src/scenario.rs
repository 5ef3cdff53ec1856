//! Seeded telemetry scenario generator.
//!
//! Produces mostly-nominal samples per port with occasional injected fault
//! episodes so that daemon and cli runs exercise diagnosis, handling and
//! device control end to end. Same seed, same episode schedule.

use std::collections::{HashMap, VecDeque};

use ops_core::telemetry::{FieldValue, TelemetrySample};
use ops_core::PortKey;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const HISTORY_LEN: usize = 10;
const EPISODE_CHANCE: f64 = 0.03;
const NOMINAL_VOLTAGE: f32 = 220.0;
const NOMINAL_CURRENT: f32 = 28.8;
const NOMINAL_TEMP: f32 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EpisodeKind {
    Overvoltage,
    Overtemperature,
    PacketLoss,
}

#[derive(Debug, Clone, Copy)]
struct Episode {
    kind: EpisodeKind,
    elapsed: u32,
    length: u32,
}

#[derive(Debug, Default)]
struct PortTrace {
    voltage: VecDeque<f32>,
    current: VecDeque<f32>,
    temperature: VecDeque<f32>,
    episode: Option<Episode>,
}

impl PortTrace {
    fn push(&mut self, v: f32, i: f32, t: f32) {
        for (series, value) in [
            (&mut self.voltage, v),
            (&mut self.current, i),
            (&mut self.temperature, t),
        ] {
            series.push_back(value);
            if series.len() > HISTORY_LEN {
                series.pop_front();
            }
        }
    }
}

/// Deterministic per-port telemetry source. Draw order matters: calling
/// `next_sample` for ports in a different order yields a different run.
#[derive(Debug)]
pub struct TelemetryFeed {
    rng: ChaCha8Rng,
    traces: HashMap<PortKey, PortTrace>,
}

impl TelemetryFeed {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            traces: HashMap::new(),
        }
    }

    /// Produce the next sample for one port, advancing its trace and any
    /// active fault episode.
    pub fn next_sample(&mut self, key: &PortKey) -> TelemetrySample {
        let trace = self.traces.entry(key.clone()).or_default();

        match &mut trace.episode {
            Some(episode) if episode.elapsed < episode.length => episode.elapsed += 1,
            slot => {
                *slot = None;
                if self.rng.gen_bool(EPISODE_CHANCE) {
                    let kind = match self.rng.gen_range(0..3u8) {
                        0 => EpisodeKind::Overvoltage,
                        1 => EpisodeKind::Overtemperature,
                        _ => EpisodeKind::PacketLoss,
                    };
                    *slot = Some(Episode {
                        kind,
                        elapsed: 0,
                        length: self.rng.gen_range(3..8),
                    });
                }
            }
        }

        let jitter_v: f32 = self.rng.gen_range(-2.0..2.0);
        let jitter_i: f32 = self.rng.gen_range(-0.5..0.5);
        let jitter_t: f32 = self.rng.gen_range(-1.0..1.0);

        let mut voltage = NOMINAL_VOLTAGE + jitter_v;
        let current = NOMINAL_CURRENT + jitter_i;
        let mut temperature = NOMINAL_TEMP + jitter_t;
        let mut packet_loss = 0.0;
        let mut error_rate = 0.0;
        let mut duration = 0.0;

        if let Some(episode) = trace.episode {
            #[allow(clippy::cast_precision_loss)]
            let elapsed_s = episode.elapsed as f32;
            match episode.kind {
                EpisodeKind::Overvoltage => {
                    voltage = NOMINAL_VOLTAGE * 1.15 + jitter_v;
                    duration = 6.0 + elapsed_s;
                }
                EpisodeKind::Overtemperature => {
                    temperature = 90.0 + jitter_t;
                    duration = 11.0 + elapsed_s;
                }
                EpisodeKind::PacketLoss => {
                    packet_loss = 0.15;
                    error_rate = 0.08;
                }
            }
        }

        trace.push(voltage, current, temperature);

        let fields: HashMap<String, FieldValue> = [
            ("output_voltage".to_string(), FieldValue::Number(voltage)),
            ("output_current".to_string(), FieldValue::Number(current)),
            ("interface_temp".to_string(), FieldValue::Number(temperature)),
            (
                "radiator_temp".to_string(),
                FieldValue::Number(temperature - 2.0),
            ),
            ("duration".to_string(), FieldValue::Number(duration)),
            ("packet_loss".to_string(), FieldValue::Number(packet_loss)),
            ("error_rate".to_string(), FieldValue::Number(error_rate)),
            (
                "connection_status".to_string(),
                FieldValue::Text("connected".to_string()),
            ),
            (
                "fan_status".to_string(),
                FieldValue::Text("normal".to_string()),
            ),
            (
                "handshake_status".to_string(),
                FieldValue::Text("ok".to_string()),
            ),
        ]
        .into_iter()
        .collect();

        TelemetrySample {
            fields,
            voltage_history: trace.voltage.iter().copied().collect(),
            current_history: trace.current.iter().copied().collect(),
            temperature_history: trace.temperature.iter().copied().collect(),
        }
    }
}
