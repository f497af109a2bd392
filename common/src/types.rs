//! Definitions of important types used throughout the project

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::{Add, Neg, Sub};

/// Motor velocity as a percentage of full speed, clamped to -100..=100
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialOrd, PartialEq)]
pub struct Percent(f64);

impl Percent {
    pub const MAX_VAL: Percent = Percent(100.0);
    pub const MIN_VAL: Percent = Percent(-100.0);
    pub const ZERO: Percent = Percent(0.0);

    /// Creates a new `Percent`. Input should be between -100.0 and 100.0
    pub fn new(value: f64) -> Self {
        if !value.is_finite() {
            return Self::ZERO;
        }
        Self(value).clamp(Self::MIN_VAL, Self::MAX_VAL)
    }

    /// Clamps a percentage to be between `min` and `max`
    #[must_use]
    pub fn clamp(self, min: Percent, max: Percent) -> Percent {
        if self.0 > max.0 {
            max
        } else if self.0 < min.0 {
            min
        } else {
            self
        }
    }

    /// Get the percentage as a float between -100.0 and 100.0
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl Add<Percent> for Percent {
    type Output = Percent;

    fn add(self, rhs: Percent) -> Self::Output {
        Percent::new(self.0 + rhs.0)
    }
}

impl Sub<Percent> for Percent {
    type Output = Percent;

    fn sub(self, rhs: Percent) -> Self::Output {
        Percent::new(self.0 - rhs.0)
    }
}

impl Neg for Percent {
    type Output = Percent;

    fn neg(self) -> Self::Output {
        Percent(-self.0)
    }
}

impl Display for Percent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("{:.2}%", self.0))
    }
}

#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialOrd, PartialEq)]
pub struct Degrees(pub f64);

impl Display for Degrees {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("{:.2}deg", self.0))
    }
}

#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialOrd, PartialEq)]
pub struct Millimeters(pub f64);

impl Display for Millimeters {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("{:.1}mm", self.0))
    }
}

#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialOrd, PartialEq)]
pub struct Centimeters(pub f64);

impl Display for Centimeters {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("{:.1}cm", self.0))
    }
}

#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialOrd, PartialEq)]
pub struct Rpm(pub f64);

impl Display for Rpm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("{:.1}rpm", self.0))
    }
}

#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialOrd, PartialEq)]
pub struct NewtonMeters(pub f64);

impl Display for NewtonMeters {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("{:.2}Nm", self.0))
    }
}

/// Color signature a fruit was detected with, in camera signature order
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FruitColor {
    Green,
    Orange,
    Yellow,
    Pink,
}

impl FruitColor {
    /// All signatures, in the order the camera scans them
    pub const ALL: [FruitColor; 4] = [
        FruitColor::Green,
        FruitColor::Orange,
        FruitColor::Yellow,
        FruitColor::Pink,
    ];
}

impl Display for FruitColor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FruitColor::Green => "Green",
            FruitColor::Orange => "Orange",
            FruitColor::Yellow => "Yellow",
            FruitColor::Pink => "Pink",
        };
        f.pad(name)
    }
}

/// Physical size class of a detected fruit, judged from blob aspect ratio
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum FruitSize {
    Narrow,
    Wide,
}

/// Last observed state of the gripper jaws
///
/// Only ever derived from motor feedback, never set directly by a command.
/// `Undefined` covers power-on and stall-timeout conditions; callers must not
/// assume either open or closed when they see it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum GripperStatus {
    Open,
    Closed,
    Moving,
    Undefined,
}

impl Display for GripperStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GripperStatus::Open => "open",
            GripperStatus::Closed => "closed",
            GripperStatus::Moving => "moving",
            GripperStatus::Undefined => "undefined",
        };
        f.pad(name)
    }
}
