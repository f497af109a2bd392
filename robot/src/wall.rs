//! Perimeter wall following
//!
//! Shared by the forward and reversed directions; the two swap which sonar
//! faces the wall and which translation axis carries the distance
//! correction.

use anyhow::Result;

use crate::cycle::ControlLoop;
use crate::machine::{Mode, State};
use crate::robot::SensorFrame;

// walls where the basket structure widens the corner gap
const WIDE_GAP_WALL_FORWARD: usize = 3;
const WIDE_GAP_WALL_REVERSE: usize = 1;

impl ControlLoop {
    /// Drives along the current wall; returns whether the robot is holding
    /// the wall offset
    ///
    /// Corners stage a 90 degree turn with the same direction's following
    /// state as the return state and advance the wall index. Tilt past the
    /// limit overrides everything and drops back to the default mode.
    pub(crate) fn wall_following(&mut self, reversed: bool, frame: &SensorFrame) -> Result<bool> {
        let dt_us = self.clock.dt_us();
        let config = self.config.wall;

        let (wall_mm, side_mm) = if reversed {
            (frame.side_mm.0, frame.wall_mm.0)
        } else {
            (frame.wall_mm.0, frame.side_mm.0)
        };

        self.pids.wall.set_setpoint(config.offset_mm);

        if reversed {
            if wall_mm < config.lost_mm {
                let correction = self.pids.wall.update(Some(wall_mm), frame, dt_us)?;
                self.robot.drivetrain.drive(
                    -config.speed,
                    -correction,
                    self.pids.turn.output(),
                    true,
                    frame.heading,
                );
            } else {
                // wall lost at a corner gap: glide on at half speed
                self.robot.drivetrain.drive(
                    -config.speed / 2.0,
                    0.0,
                    self.pids.turn.output(),
                    true,
                    frame.heading,
                );
            }
        } else if wall_mm < config.lost_mm {
            let correction = self.pids.wall.update(Some(wall_mm), frame, dt_us)?;
            self.robot.drivetrain.drive(
                correction,
                config.speed,
                self.pids.turn.output(),
                true,
                frame.heading,
            );
        } else {
            self.robot.drivetrain.drive(
                0.0,
                config.speed / 2.0,
                self.pids.turn.output(),
                true,
                frame.heading,
            );
        }

        let near_wall = self
            .pids
            .wall
            .at_setpoint(config.tolerance_mm, Some(wall_mm), frame)?;

        let wide_gap = (self.collect.current_wall == WIDE_GAP_WALL_FORWARD && !reversed)
            || (self.collect.current_wall == WIDE_GAP_WALL_REVERSE && reversed);
        let corner_limit = if wide_gap {
            config.corner_wide_mm
        } else {
            config.corner_mm
        };

        if near_wall && side_mm < corner_limit {
            self.staged = Some(State::Turning);
            let setpoint = self.pids.turn.setpoint;
            if reversed {
                self.pids.turn.set_setpoint(setpoint + 90.0);
                self.return_state = Some(State::WallFollowingReverse);
                self.collect.current_wall = (self.collect.current_wall + 3) % 4;
            } else {
                self.pids.turn.set_setpoint(setpoint - 90.0);
                self.collect.current_wall = (self.collect.current_wall + 1) % 4;
                self.return_state = Some(State::WallFollowing);
            }
        }

        // climbing an unseen obstacle shows up as tilt before anything else
        if frame.roll.0.abs() > config.tilt_limit_deg
            || frame.pitch.0.abs() > config.tilt_limit_deg
        {
            self.mode = Mode::Default;
        }

        Ok(near_wall)
    }
}
