//! Tunable gains, setpoints, and thresholds
//!
//! Every number the behavior depends on lives here so it can be retuned
//! without touching control logic. Defaults are the values the robot
//! currently competes with.

use common::types::FruitColor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Symmetric output clamp, `None` for unclamped
    pub max_out: Option<f64>,
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64, max_out: f64) -> Self {
        PidGains {
            kp,
            ki,
            kd,
            max_out: Some(max_out),
        }
    }
}

/// Gains and setpoints for every controller in the loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidTable {
    pub turn: PidGains,
    pub fruit_turn: PidGains,
    pub fruit_dist: PidGains,
    pub arm_fruit: PidGains,
    pub wall: PidGains,
    pub line_turn: PidGains,
    pub line_dist: PidGains,

    /// Pixel column the fruit-turn controller centers on
    pub fruit_center_col_px: f64,
    /// Blob pixel height the fruit-distance controller drives toward
    pub fruit_height_px: f64,
    /// Pixel row the arm-lift controller tracks the fruit to
    pub fruit_row_px: f64,
    /// Left minus right reflectance held by the line-turn controller
    pub line_diff_pct: f64,
    /// Minimum reflectance held by the line-distance controller
    pub line_min_pct: f64,
    /// Default `at_setpoint` tolerance
    pub at_setpoint_tol: f64,
}

impl Default for PidTable {
    fn default() -> Self {
        PidTable {
            turn: PidGains::new(5.0, 0.0, 0.0, 100.0),
            fruit_turn: PidGains::new(2.0, 0.0, 1.0, 100.0),
            fruit_dist: PidGains::new(4.0, 0.0, 1.0, 100.0),
            arm_fruit: PidGains::new(2.0, 0.0, 1.0, 50.0),
            wall: PidGains::new(1.0, 0.0, 1.0, 150.0),
            line_turn: PidGains::new(1.0, 0.0, 0.0, 100.0),
            line_dist: PidGains::new(1.0, 0.0, 0.0, 100.0),

            fruit_center_col_px: 160.0,
            fruit_height_px: 300.0,
            fruit_row_px: 150.0,
            line_diff_pct: 0.0,
            line_min_pct: 68.0,
            at_setpoint_tol: 5.0,
        }
    }
}

/// Wall-following geometry and safety limits
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallConfig {
    /// Lateral offset held against the wall sensor
    pub offset_mm: f64,
    /// `at_setpoint` tolerance for the corner check
    pub tolerance_mm: f64,
    /// Beyond this the wall is considered lost and correction is suspended
    pub lost_mm: f64,
    /// Side sensor reading that declares a corner
    pub corner_mm: f64,
    /// Corner threshold on walls where the basket structure widens the gap
    pub corner_wide_mm: f64,
    /// Cruise speed along the wall
    pub speed: f64,
    /// Reverse speed used when returning to the wall
    pub return_speed: f64,
    /// Roll or pitch beyond this aborts to the default mode
    pub tilt_limit_deg: f64,
}

impl Default for WallConfig {
    fn default() -> Self {
        WallConfig {
            offset_mm: 150.0,
            tolerance_mm: 25.0,
            lost_mm: 2000.0,
            corner_mm: 200.0,
            corner_wide_mm: 400.0,
            speed: 100.0,
            return_speed: 50.0,
            tilt_limit_deg: 8.0,
        }
    }
}

/// Camera mounting geometry and detection filtering
///
/// The conversion constants encode the physical rig (lens field of view,
/// mount height and angle); they must match the hardware, not taste.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Blobs smaller than this many square pixels are noise
    pub min_area_px: u32,
    /// Length of the rolling detection window
    pub window_len: usize,
    /// Continuous non-detection time after which the average is dropped
    pub loss_timeout_us: u64,
    /// Width/height ratio above which a blob is the wide fruit
    pub wide_ratio: f64,
    pub wide_radius_cm: f64,
    pub narrow_radius_cm: f64,
    /// Radians subtended per pixel
    pub rad_per_px: f64,
    /// Correction added to the half-angular width
    pub half_angle_offset_rad: f64,
    /// Pixel row corresponding to the camera horizon
    pub horizon_row_px: f64,
    /// Pixel column of the optical center
    pub center_col_px: f64,
    /// Degrees of horizontal angle per pixel column
    pub deg_per_px: f64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        VisionConfig {
            min_area_px: 50,
            window_len: 50,
            loss_timeout_us: 1_000_000,
            wide_ratio: 0.9,
            wide_radius_cm: 4.45,
            narrow_radius_cm: 2.86,
            rad_per_px: 0.00337,
            half_angle_offset_rad: 0.01,
            horizon_row_px: 137.0,
            center_col_px: 158.0,
            deg_per_px: 0.19,
        }
    }
}

/// Gripper motion thresholds and the stall fallback
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GripperConfig {
    /// Speed of the power-on close against the hard stop
    pub find_zero_rpm: f64,
    /// Torque that marks contact with the hard stop
    pub find_zero_torque_nm: f64,
    /// Position recorded once the hard stop is found
    pub zero_offset_deg: f64,
    pub open_rpm: f64,
    pub close_rpm: f64,
    /// Position past which an open is complete
    pub open_position_deg: f64,
    /// Position past which a close is complete
    pub closed_position_deg: f64,
    /// Velocity magnitude under which the jaws count as mechanically stopped
    pub stop_rpm: f64,
    /// Pending command older than this degrades the status to undefined;
    /// `None` disables the fallback
    pub stall_timeout_us: Option<u64>,
}

impl Default for GripperConfig {
    fn default() -> Self {
        GripperConfig {
            find_zero_rpm: 40.0,
            find_zero_torque_nm: 0.3,
            zero_offset_deg: 2.0,
            open_rpm: 50.0,
            close_rpm: 100.0,
            open_position_deg: 0.0,
            closed_position_deg: -140.0,
            stop_rpm: 1.0,
            stall_timeout_us: Some(1_500_000),
        }
    }
}

/// Lift homing and rest-position motion
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftConfig {
    /// Downward speed while homing against the lower limit
    pub zero_speed_pct: f64,
    /// Velocity magnitude under which the lift counts as stalled while homing
    pub zero_stall_rpm: f64,
    /// Carry position the lift parks at between grabs
    pub rest_position_deg: f64,
    pub rest_speed_pct: f64,
    /// Manual lift speed in teleop
    pub teleop_speed_pct: f64,
}

impl Default for LiftConfig {
    fn default() -> Self {
        LiftConfig {
            zero_speed_pct: -25.0,
            zero_stall_rpm: 1.0,
            // 0.6 turns above the lower limit
            rest_position_deg: 216.0,
            rest_speed_pct: 50.0,
            teleop_speed_pct: 20.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrayConfig {
    pub up_position_deg: f64,
    pub down_position_deg: f64,
    pub speed_pct: f64,
}

impl Default for TrayConfig {
    fn default() -> Self {
        TrayConfig {
            up_position_deg: -80.0,
            down_position_deg: 0.0,
            speed_pct: 100.0,
        }
    }
}

/// Collection-mode choreography: approach limits, delivery order, timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Gyro heading assigned to each arena wall, indexed by wall number
    pub wall_headings: [f64; 4],
    /// Basket order left to right facing the basket wall
    pub box_order: Vec<FruitColor>,
    /// Averaged detections further than this are ignored while wall following
    pub fruit_max_dist_cm: f64,
    /// Blob width that means the fruit is within the jaws
    pub grab_width_px: u32,
    /// Blob height above which the lift stops tracking the fruit
    pub lift_track_max_px: u32,
    /// Fruit carried before a delivery run starts
    pub tray_capacity: u8,
    /// Tray half-cycles performed during an unload
    pub unload_half_cycles: u32,
    /// Reverse time leaving a grab site
    pub back_away_us: u64,
    /// Settle delay before unloading at any basket past the first
    pub basket_settle_us: u64,
    /// Reverse speed while dropping fruit and backing away
    pub back_speed: f64,
    /// Forward speed while tracking the basket line
    pub basket_speed: f64,
    /// Speed while crossing a basket slot
    pub basket_cross_speed: f64,
    /// Creep speed while reacquiring the line
    pub basket_seek_speed: f64,
    /// Reflectance at or under which a line sensor is on the line
    pub line_on_pct: f64,
    /// Tighter threshold on the left sensor that marks a slot edge
    pub line_edge_pct: f64,
}

impl Default for CollectConfig {
    fn default() -> Self {
        CollectConfig {
            wall_headings: [90.0, 0.0, 270.0, 180.0],
            box_order: vec![FruitColor::Green, FruitColor::Orange, FruitColor::Yellow],
            fruit_max_dist_cm: 50.0,
            grab_width_px: 300,
            lift_track_max_px: 200,
            tray_capacity: 2,
            unload_half_cycles: 6,
            back_away_us: 1_000_000,
            basket_settle_us: 1_000_000,
            back_speed: 25.0,
            basket_speed: 50.0,
            basket_cross_speed: 40.0,
            basket_seek_speed: 20.0,
            line_on_pct: 70.0,
            line_edge_pct: 68.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeleopConfig {
    /// Degrees of turn setpoint per second at full stick deflection percent
    pub turn_rate: f64,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        TeleopConfig { turn_rate: 0.25 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    pub pids: PidTable,
    pub wall: WallConfig,
    pub vision: VisionConfig,
    pub gripper: GripperConfig,
    pub lift: LiftConfig,
    pub tray: TrayConfig,
    pub collect: CollectConfig,
    pub teleop: TeleopConfig,
}
