//! Shared-state bench devices
//!
//! Every device is a cloneable handle around `Arc<Mutex<_>>` state: the
//! control core owns one clone through the trait object, the bench (or a
//! test) keeps another to feed readings and observe commands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use common::types::{Degrees, FruitColor, Millimeters, NewtonMeters, Percent, Rpm};

use crate::config::RobotConfig;
use crate::input::{Axis, Buttons};
use crate::peripheral::{Blob, Gamepad, Imu, LineSensor, Motor, RangeSensor, VisionSensor};
use crate::robot::{Devices, Robot};

#[derive(Debug, Default)]
struct MotorState {
    /// Last velocity command, `None` while stopped
    command: Option<f64>,
    target: Option<f64>,
    position: f64,
    velocity: f64,
    torque: f64,
}

#[derive(Debug, Clone, Default)]
pub struct BenchMotor(Arc<Mutex<MotorState>>);

impl BenchMotor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last velocity command, `None` while stopped
    pub fn last_command(&self) -> Option<f64> {
        self.0.lock().expect("Lock").command
    }

    pub fn is_stopped(&self) -> bool {
        self.0.lock().expect("Lock").command.is_none()
    }

    pub fn target(&self) -> Option<f64> {
        self.0.lock().expect("Lock").target
    }

    pub fn feed_velocity(&self, velocity: Rpm) {
        self.0.lock().expect("Lock").velocity = velocity.0;
    }

    pub fn feed_position(&self, position: Degrees) {
        self.0.lock().expect("Lock").position = position.0;
    }

    pub fn feed_torque(&self, torque: NewtonMeters) {
        self.0.lock().expect("Lock").torque = torque.0;
    }

    /// Completes a pending position command, snapping to the target
    pub fn finish_motion(&self) {
        let mut state = self.0.lock().expect("Lock");
        if let Some(target) = state.target {
            state.position = target;
        }
    }
}

impl Motor for BenchMotor {
    fn spin(&mut self, velocity: Percent) {
        self.0.lock().expect("Lock").command = Some(velocity.get());
    }

    fn spin_rpm(&mut self, velocity: Rpm) {
        self.0.lock().expect("Lock").command = Some(velocity.0);
    }

    fn spin_to(&mut self, target: Degrees, _speed: Percent) {
        self.0.lock().expect("Lock").target = Some(target.0);
    }

    fn is_done(&self) -> bool {
        let state = self.0.lock().expect("Lock");
        match state.target {
            Some(target) => (state.position - target).abs() < 1e-6,
            None => true,
        }
    }

    fn stop(&mut self) {
        self.0.lock().expect("Lock").command = None;
    }

    fn position(&self) -> Degrees {
        Degrees(self.0.lock().expect("Lock").position)
    }

    fn velocity(&self) -> Rpm {
        Rpm(self.0.lock().expect("Lock").velocity)
    }

    fn torque(&self) -> NewtonMeters {
        NewtonMeters(self.0.lock().expect("Lock").torque)
    }

    fn set_position(&mut self, position: Degrees) {
        self.0.lock().expect("Lock").position = position.0;
    }
}

#[derive(Debug, Default)]
struct ImuState {
    heading: f64,
    roll: f64,
    pitch: f64,
}

#[derive(Debug, Clone, Default)]
pub struct BenchImu(Arc<Mutex<ImuState>>);

impl BenchImu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_heading(&self, heading: Degrees) {
        self.0.lock().expect("Lock").heading = heading.0;
    }

    pub fn feed_attitude(&self, roll: Degrees, pitch: Degrees) {
        let mut state = self.0.lock().expect("Lock");
        state.roll = roll.0;
        state.pitch = pitch.0;
    }
}

impl Imu for BenchImu {
    fn heading(&self) -> Degrees {
        Degrees(self.0.lock().expect("Lock").heading)
    }

    fn roll(&self) -> Degrees {
        Degrees(self.0.lock().expect("Lock").roll)
    }

    fn pitch(&self) -> Degrees {
        Degrees(self.0.lock().expect("Lock").pitch)
    }

    fn set_heading(&mut self, heading: Degrees) {
        self.0.lock().expect("Lock").heading = heading.0;
    }
}

#[derive(Debug, Clone)]
pub struct BenchSonar(Arc<Mutex<f64>>);

impl Default for BenchSonar {
    fn default() -> Self {
        // mid-arena, nothing in range
        BenchSonar(Arc::new(Mutex::new(1000.0)))
    }
}

impl BenchSonar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_distance(&self, distance: Millimeters) {
        *self.0.lock().expect("Lock") = distance.0;
    }
}

impl RangeSensor for BenchSonar {
    fn distance(&self) -> Millimeters {
        Millimeters(*self.0.lock().expect("Lock"))
    }
}

#[derive(Debug, Clone)]
pub struct BenchLine(Arc<Mutex<f64>>);

impl Default for BenchLine {
    fn default() -> Self {
        // plain floor
        BenchLine(Arc::new(Mutex::new(100.0)))
    }
}

impl BenchLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_reflectance(&self, percent: f64) {
        *self.0.lock().expect("Lock") = percent;
    }
}

impl LineSensor for BenchLine {
    fn reflectance(&self) -> f64 {
        *self.0.lock().expect("Lock")
    }
}

#[derive(Debug, Clone, Default)]
pub struct BenchCamera(Arc<Mutex<HashMap<FruitColor, Vec<Blob>>>>);

impl BenchCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_blobs(&self, color: FruitColor, blobs: Vec<Blob>) {
        self.0.lock().expect("Lock").insert(color, blobs);
    }

    pub fn clear(&self) {
        self.0.lock().expect("Lock").clear();
    }
}

impl VisionSensor for BenchCamera {
    fn snapshot(&mut self, color: FruitColor) -> Vec<Blob> {
        self.0
            .lock()
            .expect("Lock")
            .get(&color)
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct GamepadState {
    buttons: Buttons,
    axes: [f64; 4],
    rumbles: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BenchGamepad(Arc<Mutex<GamepadState>>);

impl BenchGamepad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the currently held buttons; hold until overwritten
    pub fn hold(&self, buttons: Buttons) {
        self.0.lock().expect("Lock").buttons = buttons;
    }

    pub fn release_all(&self) {
        self.0.lock().expect("Lock").buttons = Buttons::empty();
    }

    pub fn deflect(&self, axis: Axis, percent: f64) {
        self.0.lock().expect("Lock").axes[axis as usize] = percent;
    }

    pub fn take_rumbles(&self) -> Vec<String> {
        std::mem::take(&mut self.0.lock().expect("Lock").rumbles)
    }
}

impl Gamepad for BenchGamepad {
    fn buttons(&self) -> Buttons {
        self.0.lock().expect("Lock").buttons
    }

    fn axis(&self, axis: Axis) -> f64 {
        self.0.lock().expect("Lock").axes[axis as usize]
    }

    fn rumble(&mut self, pattern: &str) {
        self.0.lock().expect("Lock").rumbles.push(pattern.into());
    }
}

/// The full device set with bench handles kept for feeding and inspection
#[derive(Debug, Clone, Default)]
pub struct BenchRig {
    pub front_left: BenchMotor,
    pub front_right: BenchMotor,
    pub back_left: BenchMotor,
    pub back_right: BenchMotor,
    pub lift: BenchMotor,
    pub gripper: BenchMotor,
    pub tray: BenchMotor,
    pub imu: BenchImu,
    pub wall_sonar: BenchSonar,
    pub side_sonar: BenchSonar,
    pub line_left: BenchLine,
    pub line_right: BenchLine,
    pub camera: BenchCamera,
    pub gamepad: BenchGamepad,
}

impl BenchRig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a robot wired to this rig's devices
    pub fn robot(&self, config: &RobotConfig) -> Robot {
        Robot::new(
            Devices {
                front_left: Box::new(self.front_left.clone()),
                front_right: Box::new(self.front_right.clone()),
                back_left: Box::new(self.back_left.clone()),
                back_right: Box::new(self.back_right.clone()),
                lift: Box::new(self.lift.clone()),
                gripper: Box::new(self.gripper.clone()),
                tray: Box::new(self.tray.clone()),
                imu: Box::new(self.imu.clone()),
                wall_sonar: Box::new(self.wall_sonar.clone()),
                side_sonar: Box::new(self.side_sonar.clone()),
                line_left: Box::new(self.line_left.clone()),
                line_right: Box::new(self.line_right.clone()),
                camera: Box::new(self.camera.clone()),
                gamepad: Box::new(self.gamepad.clone()),
            },
            config,
        )
    }
}
