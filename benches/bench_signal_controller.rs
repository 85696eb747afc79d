use criterion::{black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration};
use std::time::Duration;

use rts_v2x::geometry::Direction;
use rts_v2x::signal::SignalController;
use rts_v2x::vehicle::{Intent, Priority, Vehicle, VehicleSpec};

fn approaching_vehicles(size: usize) -> Vec<Vehicle> {
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
                queue_index: (i / directions.len()) as u32,
                spawn_offset_px: 0.0,
            };
            Vehicle::from_spec(&spec)
        })
        .collect()
}

fn bench_signal_controller(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_controller_tick");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &size in [4, 20, 80].iter() {
        group.bench_function(format!("vehicles_{size}"), |b| {
            let vehicles = approaching_vehicles(size);
            let mut controller = SignalController::new();
            b.iter(|| {
                black_box(controller.tick(&vehicles));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_signal_controller);
criterion_main!(benches);
