//! Control core for an autonomous fruit-harvest competition robot
//!
//! A fixed-rate loop fuses the gyro, two sonars, two line sensors, and a
//! color-blob camera into a hierarchical mode/state machine driving a
//! holonomic drivetrain, a lift arm, a gripper, and a fruit tray. The robot
//! patrols the arena perimeter, grabs fruit it sees, and sorts them into
//! baskets by color.
#![warn(meta_variable_misuse)]

pub mod arm;
pub mod config;
pub mod cycle;
pub mod delay;
pub mod drivetrain;
pub mod input;
pub mod machine;
pub mod peripheral;
pub mod pid;
pub mod robot;
pub mod stop;
pub mod telemetry;
pub mod vision;
mod wall;
