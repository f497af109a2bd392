//! Hardware capabilities the control core consumes
//!
//! Real drivers live outside this crate; everything here is the abstract
//! surface the loop needs each cycle. The `bench` module provides
//! shared-state stand-ins used by the binary and the tests.

pub mod bench;

use common::types::{Degrees, FruitColor, Millimeters, NewtonMeters, Percent, Rpm};

use crate::input::{Axis, Buttons};

/// One smart motor (or a hardware-grouped pair presented as one)
pub trait Motor {
    /// Velocity command as a percentage of full speed
    fn spin(&mut self, velocity: Percent);
    /// Velocity command in motor RPM
    fn spin_rpm(&mut self, velocity: Rpm);
    /// Position command; completion is polled through [`Motor::is_done`]
    fn spin_to(&mut self, target: Degrees, speed: Percent);
    fn is_done(&self) -> bool;
    fn stop(&mut self);

    fn position(&self) -> Degrees;
    fn velocity(&self) -> Rpm;
    fn torque(&self) -> NewtonMeters;
    /// Re-references the encoder, e.g. after homing against a hard stop
    fn set_position(&mut self, position: Degrees);
}

/// Heading reference plus the tilt angles used for the safety abort
pub trait Imu {
    fn heading(&self) -> Degrees;
    fn roll(&self) -> Degrees;
    fn pitch(&self) -> Degrees;
    /// Re-references the heading, e.g. when the operator declares a wall
    fn set_heading(&mut self, heading: Degrees);
}

pub trait RangeSensor {
    fn distance(&self) -> Millimeters;
}

/// Floor reflectance sensor, reading in percent
pub trait LineSensor {
    fn reflectance(&self) -> f64;
}

/// A single color-blob detection in pixel coordinates
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Blob {
    pub center_x: i32,
    pub center_y: i32,
    pub width: u32,
    pub height: u32,
}

impl Blob {
    pub fn area(&self) -> u32 {
        self.width * self.height
    }
}

/// Color-signature blob camera
pub trait VisionSensor {
    /// All blobs matching the signature in the current frame
    fn snapshot(&mut self, color: FruitColor) -> Vec<Blob>;
}

/// Debounced operator input device
pub trait Gamepad {
    fn buttons(&self) -> Buttons;
    /// Stick deflection in percent, -100..=100
    fn axis(&self, axis: Axis) -> f64;
    /// Haptic feedback, pattern in dots and dashes
    fn rumble(&mut self, pattern: &str);
}
