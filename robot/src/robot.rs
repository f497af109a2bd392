//! The assembled robot: every device and actuator subsystem in one place

use common::types::{Degrees, Millimeters};

use crate::arm::{Arm, Tray};
use crate::config::RobotConfig;
use crate::drivetrain::Drivetrain;
use crate::peripheral::{Gamepad, Imu, LineSensor, Motor, RangeSensor, VisionSensor};
use crate::vision::Camera;

/// The full device set handed over by whatever driver layer is in use
pub struct Devices {
    pub front_left: Box<dyn Motor>,
    pub front_right: Box<dyn Motor>,
    pub back_left: Box<dyn Motor>,
    pub back_right: Box<dyn Motor>,
    /// The lift motor pair, grouped by the driver
    pub lift: Box<dyn Motor>,
    pub gripper: Box<dyn Motor>,
    pub tray: Box<dyn Motor>,
    pub imu: Box<dyn Imu>,
    /// Rear facing; reads the wall being followed in the normal direction
    pub wall_sonar: Box<dyn RangeSensor>,
    /// Right facing; reads the upcoming wall at corners
    pub side_sonar: Box<dyn RangeSensor>,
    pub line_left: Box<dyn LineSensor>,
    pub line_right: Box<dyn LineSensor>,
    pub camera: Box<dyn VisionSensor>,
    pub gamepad: Box<dyn Gamepad>,
}

/// Point-in-time copy of every pull-based sensor, read once per cycle so
/// all control logic in the cycle observes the same values
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorFrame {
    pub heading: Degrees,
    pub roll: Degrees,
    pub pitch: Degrees,
    /// Rear sonar distance
    pub wall_mm: Millimeters,
    /// Right sonar distance
    pub side_mm: Millimeters,
    /// Left line sensor reflectance in percent
    pub line_left: f64,
    /// Right line sensor reflectance in percent
    pub line_right: f64,
}

/// Container for all robot hardware and actuator subsystems
pub struct Robot {
    pub drivetrain: Drivetrain,
    pub arm: Arm,
    pub tray: Tray,
    pub camera: Camera,
    pub imu: Box<dyn Imu>,
    pub wall_sonar: Box<dyn RangeSensor>,
    pub side_sonar: Box<dyn RangeSensor>,
    pub line_left: Box<dyn LineSensor>,
    pub line_right: Box<dyn LineSensor>,
    pub gamepad: Box<dyn Gamepad>,
}

impl Robot {
    pub fn new(devices: Devices, config: &RobotConfig) -> Self {
        Robot {
            drivetrain: Drivetrain::new(
                devices.front_left,
                devices.front_right,
                devices.back_left,
                devices.back_right,
            ),
            arm: Arm::new(devices.lift, devices.gripper, config.gripper, config.lift),
            tray: Tray::new(devices.tray, config.tray),
            camera: Camera::new(devices.camera, config.vision),
            imu: devices.imu,
            wall_sonar: devices.wall_sonar,
            side_sonar: devices.side_sonar,
            line_left: devices.line_left,
            line_right: devices.line_right,
            gamepad: devices.gamepad,
        }
    }

    /// Reads every pull-based sensor into one frame
    pub fn sense(&self) -> SensorFrame {
        SensorFrame {
            heading: self.imu.heading(),
            roll: self.imu.roll(),
            pitch: self.imu.pitch(),
            wall_mm: self.wall_sonar.distance(),
            side_mm: self.side_sonar.distance(),
            line_left: self.line_left.reflectance(),
            line_right: self.line_right.reflectance(),
        }
    }
}
