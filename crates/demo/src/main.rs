mod board;
mod config;

use glass_engine::{run_app, standard_stage, LoopConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    info!("=== Glass Startup ===");

    let demo = match config::load_from_env() {
        Ok(demo) => demo,
        Err(err) => {
            error!(error = %err, "config_load_failed");
            std::process::exit(1);
        }
    };

    let loop_config = demo.loop_config.clone();
    let mut round = 0;
    let factory = move |loop_config: &LoopConfig| {
        let scene = board::build_board(&demo, round)?;
        round += 1;
        standard_stage(scene, loop_config)
    };

    if let Err(err) = run_app(loop_config, factory) {
        error!(error = %err, "startup_failed");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
