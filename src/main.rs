//! Thin driver binary: parses configuration, initializes logging, builds an
//! `Engine`, and drives its tick loop at the nominal 30 Hz rate. No domain
//! logic lives here — see `src/lib.rs` and its modules.

use std::time::Duration;

use rts_v2x::config::Config;
use rts_v2x::engine::Engine;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = Config::from_env();
    let tick_interval = Duration::from_secs_f64(config.tick_interval_secs());
    let mut engine = Engine::new(config);
    engine.start();

    log::info!("simulation starting, tick interval {:?}", tick_interval);

    let mut ticker = tokio::time::interval(tick_interval);
    let mut report = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                engine.tick();
            }
            _ = report.tick() => {
                let snapshot = engine.snapshot();
                log::info!(
                    "tick {} | scenario {} | {} vehicles | light {:?} | risk {}",
                    snapshot.tick,
                    snapshot.scenario,
                    snapshot.vehicles.len(),
                    snapshot.semaphore.light,
                    snapshot.risk.risk,
                );
            }
        }
    }
}
