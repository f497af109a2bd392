//! Four-wheel holonomic drive mixing

use std::f64::consts::{FRAC_PI_4, TAU};

use common::types::{Degrees, Percent};

use crate::peripheral::Motor;

/// The 45 degree X-drive base
///
/// Commands are percentages. The drivetrain stops itself at the end of any
/// cycle in which [`Drivetrain::drive`] was not called; the loop reads the
/// `active` flag for that, `driving` reports whether wheels are turning.
pub struct Drivetrain {
    front_left: Box<dyn Motor>,
    front_right: Box<dyn Motor>,
    back_left: Box<dyn Motor>,
    back_right: Box<dyn Motor>,
    pub active: bool,
    pub driving: bool,
}

impl Drivetrain {
    pub fn new(
        front_left: Box<dyn Motor>,
        front_right: Box<dyn Motor>,
        back_left: Box<dyn Motor>,
        back_right: Box<dyn Motor>,
    ) -> Self {
        Drivetrain {
            front_left,
            front_right,
            back_left,
            back_right,
            active: false,
            driving: false,
        }
    }

    /// Stops all drivetrain motors
    pub fn stop_all(&mut self) {
        self.front_left.stop();
        self.front_right.stop();
        self.back_left.stop();
        self.back_right.stop();
        self.driving = false;
    }

    /// Mixes a velocity command onto the four wheels
    ///
    /// `x_vel` is forward; all three are percent with translational
    /// magnitude at most 100. Field-relative commands are
    /// rotated into the robot frame using `heading`. Wheel commands that
    /// would exceed 100 are scaled down together so the mixing ratios hold.
    pub fn drive(
        &mut self,
        x_vel: f64,
        y_vel: f64,
        rot_vel: f64,
        robot_relative: bool,
        heading: Degrees,
    ) {
        self.active = true;

        // field relative angle of the commanded vector
        let drive_heading = y_vel.atan2(x_vel).rem_euclid(TAU);

        // angle to drive in relative to the robot's own heading
        let drive_angle = if robot_relative {
            -drive_heading
        } else {
            (heading.0.to_radians() - drive_heading).rem_euclid(TAU)
        };

        let drive_vel = x_vel.hypot(y_vel);

        let front_left = (drive_angle + FRAC_PI_4).cos() * drive_vel + rot_vel;
        let front_right = (drive_angle + FRAC_PI_4).sin() * drive_vel - rot_vel;
        let back_left = (drive_angle + FRAC_PI_4).sin() * drive_vel + rot_vel;
        let back_right = (drive_angle + FRAC_PI_4).cos() * drive_vel - rot_vel;

        // never drive any wheel past 100%; scale the set together
        let max = front_left
            .abs()
            .max(front_right.abs())
            .max(back_left.abs())
            .max(back_right.abs());
        let scale = if max > 100.0 { 100.0 / max } else { 1.0 };

        if drive_vel > 1.0 || rot_vel.abs() > 1.0 {
            self.front_left.spin(Percent::new(front_left * scale));
            self.front_right.spin(Percent::new(front_right * scale));
            self.back_left.spin(Percent::new(back_left * scale));
            self.back_right.spin(Percent::new(back_right * scale));
            self.driving = true;
        } else {
            self.stop_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::bench::BenchMotor;

    struct Wheels {
        front_left: BenchMotor,
        front_right: BenchMotor,
        back_left: BenchMotor,
        back_right: BenchMotor,
    }

    impl Wheels {
        fn commands(&self) -> Option<[f64; 4]> {
            Some([
                self.front_left.last_command()?,
                self.front_right.last_command()?,
                self.back_left.last_command()?,
                self.back_right.last_command()?,
            ])
        }

        fn all_stopped(&self) -> bool {
            self.front_left.is_stopped()
                && self.front_right.is_stopped()
                && self.back_left.is_stopped()
                && self.back_right.is_stopped()
        }
    }

    fn drivetrain() -> (Drivetrain, Wheels) {
        let wheels = Wheels {
            front_left: BenchMotor::new(),
            front_right: BenchMotor::new(),
            back_left: BenchMotor::new(),
            back_right: BenchMotor::new(),
        };
        let drivetrain = Drivetrain::new(
            Box::new(wheels.front_left.clone()),
            Box::new(wheels.front_right.clone()),
            Box::new(wheels.back_left.clone()),
            Box::new(wheels.back_right.clone()),
        );
        (drivetrain, wheels)
    }

    #[test]
    fn overdriven_command_scales_to_exactly_one_hundred() {
        let (mut drivetrain, wheels) = drivetrain();
        drivetrain.drive(100.0, 0.0, 50.0, true, Degrees(0.0));

        let commands = wheels.commands().unwrap();
        let max = commands.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!((max - 100.0).abs() < 1e-9);

        // ratios of the unscaled mixing must be preserved
        let raw_fl = (std::f64::consts::FRAC_PI_4).cos() * 100.0 + 50.0;
        let raw_fr = (std::f64::consts::FRAC_PI_4).sin() * 100.0 - 50.0;
        assert!((commands[1] / commands[0] - raw_fr / raw_fl).abs() < 1e-9);
    }

    #[test]
    fn in_range_command_is_not_scaled() {
        let (mut drivetrain, wheels) = drivetrain();
        drivetrain.drive(50.0, 0.0, 10.0, true, Degrees(0.0));

        let commands = wheels.commands().unwrap();
        let expected_fl = (std::f64::consts::FRAC_PI_4).cos() * 50.0 + 10.0;
        assert!((commands[0] - expected_fl).abs() < 1e-9);
    }

    #[test]
    fn dead_band_stops_instead_of_creeping() {
        let (mut drivetrain, wheels) = drivetrain();
        drivetrain.drive(0.5, 0.5, 0.5, true, Degrees(0.0));
        assert!(wheels.all_stopped());
        assert!(!drivetrain.driving);
        assert!(drivetrain.active);
    }

    #[test]
    fn dead_band_boundary_is_exclusive() {
        let (mut drivetrain, wheels) = drivetrain();

        // magnitude exactly 1.0 is still inside the dead band
        drivetrain.drive(1.0, 0.0, 0.0, true, Degrees(0.0));
        assert!(wheels.all_stopped());

        drivetrain.drive(1.01, 0.0, 0.0, true, Degrees(0.0));
        assert!(!wheels.all_stopped());

        drivetrain.stop_all();
        drivetrain.drive(0.0, 0.0, 1.0, true, Degrees(0.0));
        assert!(wheels.all_stopped());

        drivetrain.drive(0.0, 0.0, 1.01, true, Degrees(0.0));
        assert!(!wheels.all_stopped());
    }

    #[test]
    fn field_relative_rotates_by_the_gyro_heading() {
        let (mut drivetrain, wheels) = drivetrain();
        // robot yawed 90 degrees: a field-forward command becomes a strafe
        drivetrain.drive(100.0, 0.0, 0.0, false, Degrees(90.0));

        let commands = wheels.commands().unwrap();
        let magnitude = (std::f64::consts::FRAC_PI_4).cos() * 100.0;
        assert!((commands[0] + magnitude).abs() < 1e-6);
        assert!((commands[1] - magnitude).abs() < 1e-6);
        assert!((commands[2] - magnitude).abs() < 1e-6);
        assert!((commands[3] + magnitude).abs() < 1e-6);
    }

    #[test]
    fn stop_all_clears_driving() {
        let (mut drivetrain, wheels) = drivetrain();
        drivetrain.drive(50.0, 0.0, 0.0, true, Degrees(0.0));
        assert!(drivetrain.driving);
        drivetrain.stop_all();
        assert!(!drivetrain.driving);
        assert!(wheels.all_stopped());
    }
}
