//! Hierarchical mode/state machine
//!
//! One mode is active at a time; stateful modes dispatch to exactly one
//! state body per cycle. Bodies request transitions by staging a next state,
//! which is applied once at the following cycle boundary, so every body runs
//! against a stable current state. Transient states (turning, chiefly) are
//! entered with a pre-set return state and resume it on completion.

use std::fmt::{Display, Formatter};

use anyhow::{bail, Result};
use common::types::{Degrees, FruitColor, GripperStatus};

use crate::cycle::ControlLoop;
use crate::input::{Axis, Buttons};
use crate::robot::SensorFrame;

/// Top-level operator-selected behavior
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
    Default,
    Teleop,
    FruitFollowing,
    Collection,
    /// Reserved for the gyro calibration routine, which runs before the loop
    Calibrate,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::Default => "DEFAULT",
            Mode::Teleop => "TELEOP",
            Mode::FruitFollowing => "Fruit Following",
            Mode::Collection => "Collecting Fruit",
            Mode::Calibrate => "Calibrating Gyro",
        };
        f.pad(name)
    }
}

/// Sub-behavior within a mode
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    Default,
    WallFollowing,
    WallFollowingReverse,
    Turning,
    FruitFollowing,
    DropFruit,
    Closing,
    WallReturn,
    BasketFollowing,
    Unload,
    CollectionInit,
    BackAway,
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            State::Default => "DEFAULT",
            State::WallFollowing => "Following Wall Right",
            State::WallFollowingReverse => "Following Wall Left",
            State::Turning => "Turning",
            State::FruitFollowing => "Fruit Grabbing",
            State::DropFruit => "Placing fruit in tray",
            State::Closing => "Closing Gripper",
            State::WallReturn => "Returning To Wall",
            State::BasketFollowing => "Following Baskets",
            State::Unload => "Unloading",
            State::CollectionInit => "Initializing Collection Mode",
            State::BackAway => "Backing Away",
        };
        f.pad(name)
    }
}

/// Collection-mode bookkeeping, reset when a run starts and after unloading
#[derive(Debug, Clone)]
pub struct Collect {
    /// Wall currently being followed, 0 is the basket wall, counterclockwise
    pub current_wall: usize,
    /// Color restriction on further grabs; unset until the first fruit
    pub color: Option<FruitColor>,
    /// Color of the fruit currently being approached
    pub temp_color: Option<FruitColor>,
    /// Fruit held in the tray
    pub tray_count: u8,
    /// Basket slots passed on the delivery run
    pub box_count: usize,
    /// Whether the robot is currently crossing a basket slot
    pub in_space: bool,
    /// Whether the robot is navigating back to drop off fruit
    pub returning_to_baskets: bool,
    /// Tray half-cycles completed during the unload
    pub unload_count: u32,
    /// Time spent reversing away from a grab site
    pub backing_us: u64,
    /// Whether wall following may divert to chase detections
    pub fruit_searching: bool,
}

impl Collect {
    pub fn new() -> Self {
        Collect {
            current_wall: 1,
            color: None,
            temp_color: None,
            tray_count: 0,
            box_count: 0,
            in_space: false,
            returning_to_baskets: false,
            unload_count: 0,
            backing_us: 0,
            fruit_searching: false,
        }
    }
}

impl Default for Collect {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlLoop {
    /// Runs the state machine for this cycle
    pub(crate) fn state_machine(&mut self, frame: &SensorFrame) -> Result<()> {
        // exit button -- do NOT remove, for safety
        if self.buttons.pressed(Buttons::B) {
            self.staged = Some(State::Default);
            self.mode = Mode::Default;
        }

        // apply the staged transition exactly once per cycle
        if let Some(next) = self.staged.take() {
            if next != self.state {
                self.state = next;
            }
        }

        match self.mode {
            Mode::Default => self.mode_default(frame),
            Mode::Teleop => self.mode_teleop(frame),
            Mode::FruitFollowing => self.mode_fruit_following(frame),
            Mode::Collection => self.mode_collection(frame),
            // nothing to run; calibration happens before the loop starts
            Mode::Calibrate => Ok(()),
        }
    }

    fn mode_default(&mut self, frame: &SensorFrame) -> Result<()> {
        self.staged = Some(State::Default);

        if self.buttons.pressed(Buttons::A) {
            self.mode = Mode::Teleop;
            self.pids.turn.set_setpoint(frame.heading.0);
        }

        if self.buttons.pressed(Buttons::X) {
            self.mode = Mode::Collection;
        }

        if self.buttons.pressed(Buttons::Y) {
            self.mode = Mode::FruitFollowing;
            self.staged = Some(State::FruitFollowing);
        }

        if self.buttons.pressing(Buttons::LEFT) {
            self.robot.arm.go_default();
        }

        Ok(())
    }

    fn mode_teleop(&mut self, frame: &SensorFrame) -> Result<()> {
        let dt_s = self.clock.dt_us() as f64 / 1_000_000.0;
        let turn_rate = self.config.teleop.turn_rate;
        self.pids
            .turn
            .offset_setpoint(self.robot.gamepad.axis(Axis::RightX) * turn_rate * dt_s);

        self.robot.drivetrain.drive(
            self.robot.gamepad.axis(Axis::LeftY),
            self.robot.gamepad.axis(Axis::LeftX),
            self.pids.turn.output(),
            self.buttons.pressing(Buttons::RIGHT),
            frame.heading,
        );

        let lift_speed = self.config.lift.teleop_speed_pct;
        if self.buttons.pressing(Buttons::L1) {
            self.robot.arm.lift(lift_speed);
        }
        if self.buttons.pressing(Buttons::L2) {
            self.robot.arm.lift(-lift_speed);
        }
        if self.buttons.pressed(Buttons::R1) {
            self.robot.arm.open();
        }
        if self.buttons.pressed(Buttons::R2) {
            self.robot.arm.close();
        }
        if self.buttons.pressed(Buttons::UP) {
            self.robot.tray.up();
        }
        if self.buttons.pressed(Buttons::DOWN) {
            self.robot.tray.down();
        }

        if self.buttons.pressed(Buttons::A) {
            self.mode = Mode::Default;
            self.staged = Some(State::Default);
        }

        if self.buttons.pressing(Buttons::LEFT) && self.robot.arm.go_default() {
            self.robot.gamepad.rumble("--");
        }

        Ok(())
    }

    /// Standalone grab loop: chase the raw detection, grab, drop, repeat
    fn mode_fruit_following(&mut self, frame: &SensorFrame) -> Result<()> {
        let dt_us = self.clock.dt_us();
        match self.state {
            State::FruitFollowing => {
                if let Some(tracked) = self.robot.camera.largest {
                    let forward = self.pids.fruit_dist.update(
                        Some(tracked.blob.height as f64),
                        frame,
                        dt_us,
                    )?;
                    let rotation = self.pids.fruit_turn.update(
                        Some(tracked.blob.center_x as f64),
                        frame,
                        dt_us,
                    )?;
                    self.robot
                        .drivetrain
                        .drive(forward, 0.0, rotation, true, frame.heading);

                    let lift = self.pids.arm_fruit.update(
                        Some(tracked.blob.center_y as f64),
                        frame,
                        dt_us,
                    )?;
                    self.robot.arm.lift(lift);
                    self.robot.arm.open();

                    if tracked.blob.width > self.config.collect.grab_width_px {
                        self.robot.arm.close();
                        self.staged = Some(State::Closing);
                    }
                } else {
                    self.robot.drivetrain.stop_all();
                }
            }
            State::Closing => {
                if self.robot.arm.status == GripperStatus::Closed {
                    self.staged = Some(State::DropFruit);
                }
            }
            State::DropFruit => {
                if self.robot.arm.zero() {
                    self.robot.arm.open();
                    self.staged = Some(State::FruitFollowing);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn mode_collection(&mut self, frame: &SensorFrame) -> Result<()> {
        let dt_us = self.clock.dt_us();
        match self.state {
            State::CollectionInit => self.collection_init(),

            State::Default if self.robot.arm.zeroed => {
                if self.robot.arm.go_default() {
                    self.robot.arm.open();
                    self.staged = Some(State::CollectionInit);
                }
            }

            State::WallFollowing => {
                self.wall_following(false, frame)?;

                // divert to a nearby detection, unless the color filter says
                // it belongs to a later trip
                if self.collect.fruit_searching {
                    if let Some(average) = self.robot.camera.average {
                        let close_enough =
                            average.dist.0 < self.config.collect.fruit_max_dist_cm;
                        let color_ok = self.collect.color.is_none()
                            || self.collect.color == Some(average.color);
                        if close_enough && color_ok {
                            self.robot.arm.open();
                            self.staged = Some(State::FruitFollowing);
                            self.pids.arm_fruit.reset();
                            self.pids.fruit_dist.reset();
                            self.pids.fruit_turn.reset();
                        }
                    }
                }
            }

            State::WallFollowingReverse => {
                self.wall_following(true, frame)?;
            }

            State::WallReturn => {
                let return_speed = self.config.wall.return_speed;
                self.robot.drivetrain.drive(
                    -return_speed,
                    0.0,
                    self.pids.turn.output(),
                    true,
                    frame.heading,
                );

                if frame.wall_mm.0 < self.pids.wall.setpoint + self.config.wall.tolerance_mm {
                    if self.collect.tray_count >= self.config.collect.tray_capacity {
                        self.collect.returning_to_baskets = true;
                        if self.collect.current_wall == 1 {
                            self.return_state = Some(State::WallFollowingReverse);
                            self.staged = Some(State::Turning);
                            let setpoint = self.pids.turn.setpoint;
                            self.pids.turn.set_setpoint(setpoint + 90.0);
                        } else {
                            self.staged = Some(State::WallFollowing);
                        }
                    } else {
                        self.staged = Some(State::WallFollowing);
                    }
                }
            }

            State::Turning => {
                self.robot.drivetrain.drive(
                    0.0,
                    0.0,
                    self.pids.turn.output(),
                    true,
                    frame.heading,
                );
                let tolerance = self.config.pids.at_setpoint_tol;
                if self.pids.turn.at_setpoint(tolerance, None, frame)? {
                    // a finished turn onto the basket wall chains straight
                    // into a second turn toward the baskets
                    let delivery_corner = (self.collect.current_wall == 0
                        && self.return_state == Some(State::WallFollowingReverse))
                        || (self.collect.current_wall == 1
                            && self.return_state == Some(State::WallFollowing));
                    if delivery_corner && self.collect.returning_to_baskets {
                        self.pids
                            .turn
                            .set_setpoint(self.config.collect.wall_headings[2]);
                        self.collect.box_count = 0;
                        self.collect.in_space = false;
                        self.return_state = Some(State::BasketFollowing);
                    } else if let Some(resume) = self.return_state.take() {
                        self.staged = Some(resume);
                    } else {
                        self.staged = Some(State::WallFollowing);
                    }
                }
            }

            State::FruitFollowing => {
                let average = self.robot.camera.average;
                let largest = self.robot.camera.largest;
                if let (Some(average), Some(tracked)) = (average, largest) {
                    if let Some(filter) = self.collect.color {
                        if average.color != filter {
                            self.staged = Some(State::Turning);
                        }
                    }

                    let forward = self.pids.fruit_dist.update(
                        Some(tracked.blob.height as f64),
                        frame,
                        dt_us,
                    )?;
                    let rotation = self.pids.fruit_turn.update(
                        Some(tracked.blob.center_x as f64),
                        frame,
                        dt_us,
                    )?;
                    self.robot
                        .drivetrain
                        .drive(forward, 0.0, rotation, true, frame.heading);

                    if tracked.blob.height < self.config.collect.lift_track_max_px {
                        let lift = self.pids.arm_fruit.update(
                            Some(tracked.blob.center_y as f64),
                            frame,
                            dt_us,
                        )?;
                        self.robot.arm.lift(lift);
                    }
                    self.robot.arm.open();

                    if tracked.blob.width > self.config.collect.grab_width_px {
                        self.robot.arm.close();
                        self.staged = Some(State::Closing);
                    }
                    self.collect.temp_color = Some(average.color);
                } else {
                    self.robot.drivetrain.stop_all();
                }

                if self.robot.camera.average.is_none() {
                    self.staged = Some(State::BackAway);
                }
            }

            State::Closing => {
                if self.robot.arm.command_idle() {
                    self.staged = Some(State::DropFruit);
                }
            }

            State::DropFruit => {
                let back_speed = self.config.collect.back_speed;
                self.robot
                    .drivetrain
                    .drive(-back_speed, 0.0, 0.0, true, frame.heading);
                if self.robot.arm.go_default() {
                    self.collect.color = self.collect.temp_color;
                    self.staged = Some(State::BackAway);
                    self.collect.backing_us = 0;
                    self.collect.tray_count += 1;
                }
            }

            State::BackAway => {
                let back_speed = self.config.collect.back_speed;
                self.robot
                    .drivetrain
                    .drive(-back_speed, 0.0, 0.0, true, frame.heading);
                self.collect.backing_us += dt_us;
                if self.collect.backing_us > self.config.collect.back_away_us {
                    self.robot.arm.open();
                    self.return_state = Some(State::WallReturn);
                    self.staged = Some(State::Turning);
                    self.pids
                        .turn
                        .set_setpoint(self.config.collect.wall_headings[self.collect.current_wall]);
                    self.collect.backing_us = 0;
                }
            }

            State::BasketFollowing => self.basket_following(frame)?,

            State::Unload => {
                if self.robot.tray.is_done() {
                    self.collect.unload_count += 1;
                    if self.robot.tray.raised {
                        self.robot.tray.down();
                    } else {
                        self.robot.tray.up();
                    }
                }
                if self.collect.unload_count >= self.config.collect.unload_half_cycles {
                    self.robot.tray.down();
                    self.collect.unload_count = 0;
                    self.pids
                        .turn
                        .set_setpoint(self.config.collect.wall_headings[0]);
                    self.collect.tray_count = 0;
                    self.collect.color = None;
                    self.return_state = Some(State::WallFollowing);
                    self.staged = Some(State::Turning);
                    self.collect.returning_to_baskets = false;
                }
            }

            _ => {}
        }
        Ok(())
    }

    fn collection_init(&mut self) {
        // a fresh run starts from neutral bookkeeping
        self.collect.tray_count = 0;
        self.collect.fruit_searching = true;
        self.collect.color = None;
        self.collect.temp_color = None;
        self.collect.box_count = 0;
        self.collect.in_space = false;
        self.collect.returning_to_baskets = false;
        self.collect.unload_count = 0;
        self.collect.backing_us = 0;
        self.return_state = None;
        self.return_mode = None;
        self.pids.wall.reset();

        let picks = [
            (Buttons::DOWN, 0),
            (Buttons::RIGHT, 1),
            (Buttons::UP, 2),
            (Buttons::LEFT, 3),
        ];
        let mut picked = false;
        for (button, wall) in picks {
            if self.buttons.pressed(button) {
                self.collect.current_wall = wall;
                picked = true;
            }
        }
        if picked {
            let heading = self.config.collect.wall_headings[self.collect.current_wall];
            self.robot.imu.set_heading(Degrees(heading));
            self.pids.turn.set_setpoint(heading);
            self.staged = Some(State::WallReturn);
        }
    }

    /// Follows the guide line past basket slots and unloads at the one
    /// matching the held color's place in the delivery order
    fn basket_following(&mut self, frame: &SensorFrame) -> Result<()> {
        let config = &self.config.collect;
        let line_left = frame.line_left;
        let line_right = frame.line_right;

        if self.collect.in_space {
            self.robot.drivetrain.drive(
                0.0,
                config.basket_cross_speed,
                0.0,
                true,
                frame.heading,
            );
            if line_left <= config.line_on_pct && line_right <= config.line_on_pct {
                self.collect.in_space = false;
            }
        } else if line_right > config.line_on_pct && line_left <= config.line_edge_pct {
            // right sensor ran off the line while the left holds: a slot edge
            self.collect.in_space = true;
            self.collect.box_count += 1;
        } else if line_left <= config.line_on_pct && line_right <= config.line_on_pct {
            self.robot.drivetrain.drive(
                self.pids.line_dist.output(),
                config.basket_speed,
                self.pids.line_turn.output(),
                true,
                frame.heading,
            );
        } else {
            self.robot
                .drivetrain
                .drive(config.basket_seek_speed, 0.0, 0.0, true, frame.heading);
        }

        let slot = match self
            .collect
            .color
            .and_then(|color| config.box_order.iter().position(|c| *c == color))
        {
            Some(slot) => slot,
            None => bail!(
                "collection color {:?} is not in the delivery order",
                self.collect.color
            ),
        };

        if slot == self.collect.box_count {
            self.robot.gamepad.rumble("--");
            if slot == 0 {
                let tolerance = self.config.pids.at_setpoint_tol;
                if self.pids.line_dist.at_setpoint(tolerance, None, frame)? {
                    self.staged = Some(State::Unload);
                }
            } else {
                self.delays.schedule(
                    self.config.collect.basket_settle_us,
                    State::Unload,
                    self.clock.now_us(),
                );
            }
        }

        Ok(())
    }
}
