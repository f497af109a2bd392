//! Robot entry point
//!
//! Wires the control loop to the bench rig; a hardware build swaps in real
//! device drivers behind the same peripheral traits.

use robot::config::RobotConfig;
use robot::cycle::ControlLoop;
use robot::peripheral::bench::BenchRig;
use robot::stop;
use tracing::{info, Level};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();
    info!("Starting robot");

    stop::install_ctrlc()?;

    let config = RobotConfig::default();
    let rig = BenchRig::new();
    let mut control = ControlLoop::new(config.clone(), rig.robot(&config));

    control.run()?;
    info!("Robot stopped");

    Ok(())
}
