//! Lift, gripper, and fruit tray actuators
//!
//! The gripper is command driven: callers request open or close and poll the
//! status, which only ever changes in response to observed motor feedback
//! (position thresholds and stall detection), never directly from the
//! command itself.

use common::types::{Degrees, GripperStatus, Percent, Rpm};

use crate::config::{GripperConfig, LiftConfig, TrayConfig};
use crate::peripheral::Motor;

/// Pending gripper request
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GripperCommand {
    Open,
    Close,
}

pub struct Arm {
    lift: Box<dyn Motor>,
    gripper: Box<dyn Motor>,
    gripper_config: GripperConfig,
    lift_config: LiftConfig,

    pub status: GripperStatus,
    command: Option<GripperCommand>,
    /// Power-on close against the hard stop to establish the jaw reference
    finding_zero: bool,
    command_timer_us: u64,
    prev_jaw_rpm: f64,
    prev_lift_rpm: f64,

    /// Whether the lift has established its lower reference position
    pub zeroed: bool,
    pub active: bool,
    pub driving: bool,
}

impl Arm {
    pub fn new(
        lift: Box<dyn Motor>,
        gripper: Box<dyn Motor>,
        gripper_config: GripperConfig,
        lift_config: LiftConfig,
    ) -> Self {
        Arm {
            lift,
            gripper,
            gripper_config,
            lift_config,
            status: GripperStatus::Undefined,
            command: None,
            finding_zero: true,
            command_timer_us: 0,
            prev_jaw_rpm: 0.0,
            prev_lift_rpm: 0.0,
            zeroed: false,
            active: false,
            driving: false,
        }
    }

    /// Raw lift velocity in percent
    pub fn lift(&mut self, velocity: f64) {
        self.active = true;
        self.driving = true;
        self.lift.spin(Percent::new(velocity));
    }

    pub fn stop(&mut self) {
        self.lift.stop();
        self.driving = false;
    }

    /// Homes the lift against the lower hard stop
    ///
    /// Call every cycle until it returns true; the stop is detected when the
    /// velocity crosses up through the stall threshold between cycles.
    pub fn zero(&mut self) -> bool {
        let velocity = self.lift.velocity().0;
        let stalled =
            velocity > -self.lift_config.zero_stall_rpm && self.prev_lift_rpm < -self.lift_config.zero_stall_rpm;
        if !stalled {
            self.lift(self.lift_config.zero_speed_pct);
            self.prev_lift_rpm = velocity;
            false
        } else {
            self.prev_lift_rpm = 0.0;
            self.lift.set_position(Degrees(0.0));
            self.zeroed = true;
            true
        }
    }

    /// Sends the lift toward the rest position; true once the motion is done
    pub fn go_default(&mut self) -> bool {
        self.active = true;
        self.lift.spin_to(
            Degrees(self.lift_config.rest_position_deg),
            Percent::new(self.lift_config.rest_speed_pct),
        );
        self.lift.is_done()
    }

    pub fn open(&mut self) {
        self.finding_zero = false;
        self.command = Some(GripperCommand::Open);
        self.command_timer_us = 0;
        self.status = GripperStatus::Moving;
    }

    pub fn close(&mut self) {
        self.finding_zero = false;
        self.command = Some(GripperCommand::Close);
        self.command_timer_us = 0;
        self.status = GripperStatus::Moving;
    }

    /// Whether no gripper command is pending
    pub fn command_idle(&self) -> bool {
        self.command.is_none()
    }

    pub fn command(&self) -> Option<GripperCommand> {
        self.command
    }

    /// Runs the gripper state machine; once per cycle, after state logic
    pub fn update(&mut self, dt_us: u64) {
        if !self.zeroed {
            self.zero();
        }

        let config = self.gripper_config;

        if self.finding_zero {
            self.gripper.spin_rpm(Rpm(config.find_zero_rpm));
            if self.gripper.torque().0 > config.find_zero_torque_nm {
                self.gripper.set_position(Degrees(config.zero_offset_deg));
                self.finding_zero = false;
                self.gripper.stop();
            }
            return;
        }

        if self.command.is_some() {
            self.command_timer_us += dt_us;
        }

        match self.command {
            Some(GripperCommand::Open) => {
                let velocity = self.gripper.velocity().0;
                let stalled = velocity < config.stop_rpm && self.prev_jaw_rpm > config.stop_rpm;
                if self.gripper.position().0 < config.open_position_deg && !stalled {
                    self.gripper.spin_rpm(Rpm(config.open_rpm));
                    self.prev_jaw_rpm = velocity;
                } else {
                    self.command = None;
                    self.prev_jaw_rpm = 0.0;
                    self.status = GripperStatus::Open;
                    self.gripper.stop();
                }
            }
            Some(GripperCommand::Close) => {
                let velocity = self.gripper.velocity().0;
                let stalled = velocity > -config.stop_rpm && self.prev_jaw_rpm < -config.stop_rpm;
                if self.gripper.position().0 > config.closed_position_deg && !stalled {
                    self.gripper.spin_rpm(Rpm(-config.close_rpm));
                    self.prev_jaw_rpm = velocity;
                } else {
                    self.command = None;
                    self.prev_jaw_rpm = 0.0;
                    self.status = GripperStatus::Closed;
                    self.gripper.stop();
                }
            }
            None => self.gripper.stop(),
        }

        // a command that neither finished nor stalled cleanly is a jam;
        // spinning against it unbounded would cook the motor
        if let Some(timeout) = config.stall_timeout_us {
            if self.command.is_some() && self.command_timer_us > timeout {
                self.command = None;
                self.gripper.stop();
                self.status = GripperStatus::Undefined;
            }
        }
    }
}

/// Position-commanded fruit tray
pub struct Tray {
    motor: Box<dyn Motor>,
    config: TrayConfig,
    pub raised: bool,
}

impl Tray {
    pub fn new(motor: Box<dyn Motor>, config: TrayConfig) -> Self {
        Tray {
            motor,
            config,
            raised: false,
        }
    }

    /// Moves the fruit tray to the up position
    pub fn up(&mut self) {
        self.motor.spin_to(
            Degrees(self.config.up_position_deg),
            Percent::new(self.config.speed_pct),
        );
        self.raised = true;
    }

    /// Moves the fruit tray to the down position
    pub fn down(&mut self) {
        self.motor.spin_to(
            Degrees(self.config.down_position_deg),
            Percent::new(self.config.speed_pct),
        );
        self.raised = false;
    }

    pub fn is_done(&self) -> bool {
        self.motor.is_done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::bench::BenchMotor;
    use common::types::NewtonMeters;

    const DT: u64 = 20_000;

    fn arm() -> (Arm, BenchMotor, BenchMotor) {
        let lift = BenchMotor::new();
        let gripper = BenchMotor::new();
        let arm = Arm::new(
            Box::new(lift.clone()),
            Box::new(gripper.clone()),
            GripperConfig::default(),
            LiftConfig::default(),
        );
        (arm, lift, gripper)
    }

    /// Runs the homing sequence so tests start from a zeroed lift
    fn zero_lift(arm: &mut Arm, lift: &BenchMotor) {
        lift.feed_velocity(Rpm(-30.0));
        arm.zero();
        arm.zero();
        lift.feed_velocity(Rpm(0.0));
        assert!(arm.zero());
        assert!(arm.zeroed);
    }

    #[test]
    fn power_on_close_finds_the_jaw_reference() {
        let (mut arm, lift, gripper) = arm();
        zero_lift(&mut arm, &lift);

        arm.update(DT);
        // spinning slowly toward the hard stop, no contact yet
        assert!(gripper.last_command().is_some());
        assert_eq!(arm.status, GripperStatus::Undefined);

        gripper.feed_torque(NewtonMeters(0.4));
        arm.update(DT);
        assert_eq!(gripper.position(), Degrees(2.0));
        assert!(gripper.is_stopped());
        assert_eq!(arm.status, GripperStatus::Undefined);
        assert!(arm.command_idle());
    }

    #[test]
    fn open_completes_past_the_position_threshold() {
        let (mut arm, lift, gripper) = arm();
        zero_lift(&mut arm, &lift);
        gripper.feed_position(Degrees(5.0));

        arm.open();
        assert_eq!(arm.status, GripperStatus::Moving);
        arm.update(DT);
        assert_eq!(arm.status, GripperStatus::Open);
        assert!(arm.command_idle());
        assert!(gripper.is_stopped());
    }

    #[test]
    fn open_completes_on_stall_detection() {
        let (mut arm, lift, gripper) = arm();
        zero_lift(&mut arm, &lift);
        gripper.feed_position(Degrees(-60.0));

        arm.open();
        gripper.feed_velocity(Rpm(30.0));
        arm.update(DT);
        assert_eq!(arm.status, GripperStatus::Moving);

        // velocity collapses through the stop threshold between cycles
        gripper.feed_velocity(Rpm(0.2));
        arm.update(DT);
        assert_eq!(arm.status, GripperStatus::Open);
    }

    #[test]
    fn close_runs_to_the_reverse_threshold() {
        let (mut arm, lift, gripper) = arm();
        zero_lift(&mut arm, &lift);
        gripper.feed_position(Degrees(-50.0));

        arm.close();
        gripper.feed_velocity(Rpm(-80.0));
        arm.update(DT);
        assert_eq!(arm.status, GripperStatus::Moving);
        assert_eq!(gripper.last_command(), Some(-100.0));

        gripper.feed_position(Degrees(-141.0));
        arm.update(DT);
        assert_eq!(arm.status, GripperStatus::Closed);
        assert!(gripper.is_stopped());
    }

    #[test]
    fn stalled_close_times_out_to_undefined() {
        let (mut arm, lift, gripper) = arm();
        zero_lift(&mut arm, &lift);
        gripper.feed_position(Degrees(-50.0));

        arm.close();
        gripper.feed_velocity(Rpm(-80.0));
        // jammed partway: position and velocity never change again
        let mut elapsed = 0;
        while elapsed <= 1_500_000 {
            arm.update(DT);
            elapsed += DT;
        }
        arm.update(DT);
        assert_eq!(arm.status, GripperStatus::Undefined);
        assert!(arm.command_idle());
        assert!(gripper.is_stopped());
    }

    #[test]
    fn zeroing_latches_the_lower_reference() {
        let (mut arm, lift, _gripper) = arm();
        assert!(!arm.zero());
        assert_eq!(lift.last_command(), Some(-25.0));

        lift.feed_velocity(Rpm(-30.0));
        assert!(!arm.zero());
        lift.feed_velocity(Rpm(-0.5));
        assert!(arm.zero());
        assert!(arm.zeroed);
        assert_eq!(lift.position(), Degrees(0.0));
    }

    #[test]
    fn go_default_polls_motion_completion() {
        let (mut arm, lift, _gripper) = arm();
        lift.feed_position(Degrees(90.0));
        assert!(!arm.go_default());
        lift.finish_motion();
        assert!(arm.go_default());
        assert_eq!(lift.position(), Degrees(216.0));
    }

    #[test]
    fn tray_cycles_between_positions() {
        let motor = BenchMotor::new();
        let mut tray = Tray::new(Box::new(motor.clone()), TrayConfig::default());
        assert!(tray.is_done());

        tray.up();
        assert!(tray.raised);
        assert!(!tray.is_done());
        motor.finish_motion();
        assert!(tray.is_done());
        assert_eq!(motor.position(), Degrees(-80.0));

        tray.down();
        assert!(!tray.raised);
        motor.finish_motion();
        assert_eq!(motor.position(), Degrees(0.0));
    }
}
