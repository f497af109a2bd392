//! Non-authoritative diagnostic observer
//!
//! The loop copies its observable state into value snapshots and hands them
//! over a bounded channel; a scoped thread logs them at its own pace. The
//! observer never touches live control state, so the loop cannot be blocked
//! or corrupted by slow log output. A full channel just drops a snapshot.

use std::thread::Scope;

use common::types::{Degrees, GripperStatus, Millimeters};
use crossbeam::channel::Receiver;
use tracing::{info, span, Level};

use crate::arm::GripperCommand;
use crate::cycle::ControlLoop;
use crate::machine::{Mode, State};
use crate::vision::LocatedObject;

/// Point-in-time copy of the diagnostic surface
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub mode: Mode,
    pub state: State,
    pub return_state: Option<State>,
    pub return_mode: Option<Mode>,
    pub heading: Degrees,
    pub wall: Millimeters,
    pub side: Millimeters,
    pub gripper_status: GripperStatus,
    pub gripper_command: Option<GripperCommand>,
    pub tray_count: u8,
    pub box_count: usize,
    pub current_wall: usize,
    pub average: Option<LocatedObject>,
    pub dt_us: u64,
}

impl ControlLoop {
    /// Copies the observable state for the telemetry channel
    pub fn snapshot(&self) -> Snapshot {
        let frame = self.robot.sense();
        Snapshot {
            mode: self.mode,
            state: self.state,
            return_state: self.return_state,
            return_mode: self.return_mode,
            heading: frame.heading,
            wall: frame.wall_mm,
            side: frame.side_mm,
            gripper_status: self.robot.arm.status,
            gripper_command: self.robot.arm.command(),
            tray_count: self.collect.tray_count,
            box_count: self.collect.box_count,
            current_wall: self.collect.current_wall,
            average: self.robot.camera.average,
            dt_us: self.clock.dt_us(),
        }
    }
}

/// Spawns the observer thread on the loop's scope
pub fn spawn<'scope, 'env>(scope: &'scope Scope<'scope, 'env>, rx: Receiver<Snapshot>) {
    scope.spawn(move || {
        let _span = span!(Level::INFO, "Telemetry observer").entered();

        for snapshot in rx {
            info!(
                "{}, {} | heading {} | wall {} side {} | gripper {} ({:?}) | tray {} boxes {} on wall {} | {}us",
                snapshot.mode,
                snapshot.state,
                snapshot.heading,
                snapshot.wall,
                snapshot.side,
                snapshot.gripper_status,
                snapshot.gripper_command,
                snapshot.tray_count,
                snapshot.box_count,
                snapshot.current_wall,
                snapshot.dt_us,
            );

            if let Some(average) = snapshot.average {
                info!(
                    "Tracking {} {:?} fruit: {} away, {} up, {} right",
                    average.color, average.size, average.dist, average.height, average.angle_to,
                );
            } else {
                info!("No object detected");
            }

            if let Some(resume) = snapshot.return_state {
                info!("Will resume {resume}");
            }
            if let Some(resume) = snapshot.return_mode {
                info!("Will resume mode {resume}");
            }
        }
    });
}
