//! Process-wide stop flag

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

static STOP_THE_WORLD: AtomicBool = AtomicBool::new(false);

/// Flags the loop to exit at the next cycle boundary
pub fn stop_world() {
    STOP_THE_WORLD.store(true, Ordering::Relaxed);
}

pub fn world_stopped() -> bool {
    STOP_THE_WORLD.load(Ordering::Relaxed)
}

/// Routes ctrl-c into the stop flag
pub fn install_ctrlc() -> Result<()> {
    ctrlc::set_handler(stop_world).context("Set ctrl-c")
}
