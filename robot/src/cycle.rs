//! The fixed-rate control loop

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use common::error::LogErrorExt;
use tracing::{info, warn};

use crate::config::RobotConfig;
use crate::delay::DelayScheduler;
use crate::input::ButtonTracker;
use crate::machine::{Collect, Mode, State};
use crate::pid::Pids;
use crate::robot::Robot;
use crate::{stop, telemetry};

/// Loop period; sensors and actuators settle well within this
const PERIOD: Duration = Duration::from_millis(20);
/// How often a diagnostic snapshot is emitted
const TELEMETRY_PERIOD_US: u64 = 50_000;

/// Monotonic cycle time in microseconds
///
/// `tick` runs once per cycle; the delta is clamped to at least one
/// microsecond so differential terms never divide by zero, and the first
/// cycle of a run is primed with exactly that minimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleClock {
    now_us: u64,
    prev_us: u64,
}

impl CycleClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, dt_us: u64) {
        self.prev_us = self.now_us;
        self.now_us += dt_us.max(1);
    }

    pub fn dt_us(&self) -> u64 {
        self.now_us - self.prev_us
    }

    pub fn now_us(&self) -> u64 {
        self.now_us
    }
}

/// Everything the loop owns: devices, controllers, and machine bookkeeping
///
/// One mutator: all control state is written from `step` on a single thread,
/// observers only ever receive value snapshots.
pub struct ControlLoop {
    pub config: RobotConfig,
    pub robot: Robot,
    pub pids: Pids,
    pub delays: DelayScheduler,
    pub buttons: ButtonTracker,
    pub clock: CycleClock,

    pub mode: Mode,
    pub state: State,
    /// State to change to at the next cycle boundary
    pub(crate) staged: Option<State>,
    /// State to resume once the current transient state completes
    pub return_state: Option<State>,
    /// Mode to resume once the current transient mode completes
    pub return_mode: Option<Mode>,
    pub collect: Collect,
}

impl ControlLoop {
    pub fn new(config: RobotConfig, robot: Robot) -> Self {
        let pids = Pids::new(&config);
        ControlLoop {
            config,
            robot,
            pids,
            delays: DelayScheduler::new(),
            buttons: ButtonTracker::new(),
            clock: CycleClock::new(),
            mode: Mode::Default,
            state: State::Default,
            staged: None,
            return_state: None,
            return_mode: None,
            collect: Collect::new(),
        }
    }

    /// Runs one control cycle with the given time delta
    ///
    /// Fixed order: clear actuator activity, read inputs, update vision and
    /// the bound controllers, fire due delays, dispatch the state machine,
    /// run the gripper, then stop anything no cycle logic drove.
    pub fn step(&mut self, dt_us: u64) -> Result<()> {
        self.clock.tick(dt_us);
        let dt_us = self.clock.dt_us();

        self.robot.drivetrain.active = false;
        self.robot.arm.active = false;

        self.buttons.update(self.robot.gamepad.buttons());
        self.robot.camera.update(dt_us);
        let frame = self.robot.sense();
        self.pids.update_bound(&frame, dt_us)?;

        self.delays.check_all(self.clock.now_us(), &mut self.staged);

        self.state_machine(&frame)?;

        self.robot.arm.update(dt_us);
        if !self.robot.drivetrain.active {
            self.robot.drivetrain.stop_all();
        }
        if !self.robot.arm.active {
            self.robot.arm.stop();
        }

        Ok(())
    }

    /// Runs cycles at the fixed period until the process is stopped
    pub fn run(&mut self) -> Result<()> {
        let (tx, rx) = crossbeam::channel::bounded(30);

        thread::scope(|scope| {
            telemetry::spawn(scope, rx);
            info!("Control loop running");

            let started = Instant::now();
            let mut deadline = started + PERIOD;
            let mut last_us = 0u64;
            // prime the first cycle
            let mut dt_us = 1u64;
            let mut last_snapshot_us = 0u64;

            while !stop::world_stopped() {
                self.step(dt_us)?;

                if self.clock.now_us() - last_snapshot_us >= TELEMETRY_PERIOD_US {
                    tx.try_send(self.snapshot())
                        .log_warn("Telemetry channel full");
                    last_snapshot_us = self.clock.now_us();
                }

                let remaining = deadline.saturating_duration_since(Instant::now());
                if !remaining.is_zero() {
                    thread::sleep(remaining);
                } else {
                    warn!("Behind schedule");
                }
                deadline += PERIOD;

                let now_us = started.elapsed().as_micros() as u64;
                dt_us = now_us.saturating_sub(last_us).max(1);
                last_us = now_us;
            }

            drop(tx);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_clamps_to_a_minimum_delta() {
        let mut clock = CycleClock::new();
        clock.tick(0);
        assert_eq!(clock.dt_us(), 1);
        clock.tick(20_000);
        assert_eq!(clock.dt_us(), 20_000);
        assert_eq!(clock.now_us(), 20_001);
    }
}
