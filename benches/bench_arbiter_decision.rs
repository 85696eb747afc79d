use criterion::{black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration};
use std::time::Duration;

use rts_v2x::arbiter::Arbiter;
use rts_v2x::event_log::EventLog;
use rts_v2x::geometry::Direction;
use rts_v2x::signal::SignalController;
use rts_v2x::vehicle::{Intent, Priority, Vehicle, VehicleSpec, VehicleState};

fn four_way_waiting(per_approach: usize) -> Vec<Vehicle> {
    let directions = [Direction::N, Direction::S, Direction::E, Direction::V];
    let mut vehicles = Vec::new();
    for &direction in &directions {
        for i in 0..per_approach {
            let spec = VehicleSpec {
                id: format!("{direction}{i}"),
                direction,
                intent: Intent::Straight,
                priority: Priority::Normal,
                speed_multiplier: 1.0,
                v2x_enabled: true,
                no_stop: false,
                queue_index: i as u32,
                spawn_offset_px: 0.0,
            };
            let mut v = Vehicle::from_spec(&spec);
            v.state = VehicleState::Waiting;
            vehicles.push(v);
        }
    }
    vehicles
}

fn bench_arbiter_decision(c: &mut Criterion) {
    let mut group = c.benchmark_group("arbiter_tick");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &per_approach in [1, 4, 16].iter() {
        group.bench_function(format!("per_approach_{per_approach}"), |b| {
            let signal = SignalController::new();
            let infra = {
                let mut signal = signal;
                signal.tick(&[])
            };
            b.iter(|| {
                let mut vehicles = four_way_waiting(per_approach);
                let mut arbiter = Arbiter::new();
                let mut log = EventLog::new();
                arbiter.tick(&mut vehicles, &infra, true, &mut log);
                black_box(&vehicles);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_arbiter_decision);
criterion_main!(benches);
