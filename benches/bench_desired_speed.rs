use criterion::{black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration};
use std::time::Duration;

use rts_v2x::geometry::Direction;
use rts_v2x::kinematics::desired_speed_factor;
use rts_v2x::vehicle::{Intent, Priority, Vehicle, VehicleSpec};

fn queued_approach(size: usize) -> Vec<Vehicle> {
    (0..size)
        .map(|i| {
            let spec = VehicleSpec {
                id: format!("V{i}"),
                direction: Direction::N,
                intent: Intent::Straight,
                priority: Priority::Normal,
                speed_multiplier: 1.0,
                v2x_enabled: true,
                no_stop: false,
                queue_index: i as u32,
                spawn_offset_px: 0.0,
            };
            Vehicle::from_spec(&spec)
        })
        .collect()
}

fn bench_desired_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("desired_speed_factor");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &size in [4, 16, 64].iter() {
        group.bench_function(format!("queue_{size}"), |b| {
            let vehicles = queued_approach(size);
            b.iter(|| {
                for v in &vehicles {
                    black_box(desired_speed_factor(v, &vehicles, None));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_desired_speed);
criterion_main!(benches);
