use crate::state::{EventTx, SharedOps};
use ops_core::{OpsError, StationId, TariffPeriod};
use std::time::Duration;

/// Ports sampled per tick. The poll cursor wraps around the fleet, so every
/// port is revisited on a fixed cadence.
const POLLS_PER_TICK: usize = 4;
/// Load balancing cadence in ticks.
const BALANCE_EVERY: u64 = 60;
/// One tick is one minute of station time; tariff periods switch at 08:00
/// and 22:00.
const PEAK_START_MIN: u64 = 480;
const VALLEY_START_MIN: u64 = 1320;

pub async fn run_tick_loop(
    shared: SharedOps,
    event_tx: EventTx,
    ticks_per_sec: f64,
    max_ticks: Option<u64>,
) {
    let mut interval = if ticks_per_sec > 0.0 {
        let mut iv = tokio::time::interval(Duration::from_secs_f64(1.0 / ticks_per_sec));
        iv.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);
        Some(iv)
    } else {
        None
    };

    loop {
        let (events, done) = {
            let mut guard = shared.lock();
            let sim = &mut *guard;
            let mut events = Vec::new();
            let tick = sim.state.meta.tick;

            for _ in 0..POLLS_PER_TICK.min(sim.poll_order.len()) {
                let cursor = sim.next_poll % sim.poll_order.len();
                sim.next_poll = cursor + 1;
                let key = sim.poll_order[cursor].clone();
                let sample = sim.feed.next_sample(&key);
                match sim.controller.intake_fault(
                    &mut sim.state,
                    &sim.content,
                    &key.station,
                    &key.port,
                    &sample,
                ) {
                    Ok((_, intake_events)) => events.extend(intake_events),
                    Err(OpsError::NoAvailableMaintainer) => {
                        tracing::warn!(port = %key, "fault diagnosed but roster is saturated");
                    }
                    Err(err) => {
                        tracing::warn!(port = %key, error = %err, "fault intake failed");
                    }
                }
            }

            let minute_of_day = tick % 1440;
            let period = match minute_of_day {
                PEAK_START_MIN => Some(TariffPeriod::Peak),
                VALLEY_START_MIN => Some(TariffPeriod::Valley),
                _ => None,
            };
            if let Some(period) = period {
                let mut stations: Vec<StationId> = sim.state.stations.keys().cloned().collect();
                stations.sort();
                for station in &stations {
                    match sim
                        .controller
                        .apply_period_limits(&mut sim.state, station, period)
                    {
                        Ok(limit_events) => events.extend(limit_events),
                        Err(err) => {
                            tracing::warn!(%station, error = %err, "period limits failed");
                        }
                    }
                }
            }

            if tick.is_multiple_of(BALANCE_EVERY) {
                let mut stations: Vec<StationId> = sim.state.stations.keys().cloned().collect();
                stations.sort();
                for station in &stations {
                    match sim.controller.balance_load(&mut sim.state, station) {
                        Ok(balance_events) => events.extend(balance_events),
                        Err(err) => {
                            tracing::warn!(%station, error = %err, "load balancing failed");
                        }
                    }
                }
            }

            events.extend(ops_core::tick(&mut sim.state, &sim.content));

            let done = max_ticks.is_some_and(|max| sim.state.meta.tick >= max);
            (events, done)
        };

        let _ = event_tx.send(events);

        if done {
            break;
        }

        if let Some(ref mut iv) = interval {
            iv.tick().await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::OpsDaemonState;
    use ops_core::test_fixtures::{base_content, base_state};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn loop_advances_to_max_ticks_and_broadcasts() {
        let shared = Arc::new(Mutex::new(OpsDaemonState::new(
            base_content(),
            base_state(),
            7,
        )));
        let (event_tx, mut rx) = tokio::sync::broadcast::channel(4096);

        run_tick_loop(shared.clone(), event_tx, 0.0, Some(50)).await;

        assert_eq!(shared.lock().state.meta.tick, 50);
        // Every port was diagnosed at least once along the way.
        let guard = shared.lock();
        for key in &guard.poll_order {
            assert!(guard.state.diagnosis_history.contains_key(key));
        }
        drop(guard);

        let mut batches = 0;
        while rx.try_recv().is_ok() {
            batches += 1;
        }
        assert_eq!(batches, 50);
    }

    #[tokio::test]
    async fn period_limits_switch_at_the_peak_boundary() {
        let shared = Arc::new(Mutex::new(OpsDaemonState::new(
            base_content(),
            base_state(),
            7,
        )));
        let (event_tx, _rx) = tokio::sync::broadcast::channel(65536);

        run_tick_loop(shared.clone(), event_tx, 0.0, Some(PEAK_START_MIN + 1)).await;

        let guard = shared.lock();
        let station = &guard.state.stations[&ops_core::StationId("CS001".to_string())];
        assert_eq!(station.current_period, Some(TariffPeriod::Peak));
        assert!((station.max_total_power_kw - 96.0).abs() < f32::EPSILON);
    }
}
