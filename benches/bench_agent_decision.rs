use criterion::{black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration};
use std::time::Duration;

use rts_v2x::agent::{DecisionSource, VehicleAgent};
use rts_v2x::event_log::EventLog;
use rts_v2x::geometry::Direction;
use rts_v2x::vehicle::{Intent, Priority, Vehicle, VehicleSpec, VehicleState};

fn crossing_vehicles(size: usize) -> Vec<Vehicle> {
    let directions = [Direction::N, Direction::S, Direction::E, Direction::V];
    (0..size)
        .map(|i| {
            let direction = directions[i % directions.len()];
            let spec = VehicleSpec {
                id: format!("V{i}"),
                direction,
                intent: Intent::Straight,
                priority: Priority::Normal,
                speed_multiplier: 1.0,
                v2x_enabled: true,
                no_stop: false,
                queue_index: 0,
                spawn_offset_px: 0.0,
            };
            let mut v = Vehicle::from_spec(&spec);
            v.state = VehicleState::Moving;
            v
        })
        .collect()
}

fn bench_agent_decision(c: &mut Criterion) {
    let mut group = c.benchmark_group("agent_decide");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &size in [4, 16, 64].iter() {
        group.bench_function(format!("approach_neighbors_{size}"), |b| {
            let vehicles = crossing_vehicles(size);
            let mut agents: Vec<VehicleAgent> = vehicles
                .iter()
                .map(|v| VehicleAgent::new(v.id.clone(), DecisionSource::Deterministic))
                .collect();
            let mut log = EventLog::new();
            b.iter(|| {
                for (i, agent) in agents.iter_mut().enumerate() {
                    black_box(agent.decide(1, true, &vehicles, i, &mut log));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_agent_decision);
criterion_main!(benches);
