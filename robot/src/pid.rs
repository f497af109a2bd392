//! PID controllers and the per-cycle update registry

use std::f64::consts::TAU;

use anyhow::{bail, Result};

use crate::config::{PidGains, RobotConfig};
use crate::robot::SensorFrame;

/// Wraparound domain for continuous controllers
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AngleUnit {
    Degrees,
    Revolutions,
    Radians,
}

impl AngleUnit {
    fn range(self) -> f64 {
        match self {
            AngleUnit::Degrees => 360.0,
            AngleUnit::Revolutions => 1.0,
            AngleUnit::Radians => TAU,
        }
    }
}

/// Pull-based input for controllers fed from the cycle's sensor frame
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Source {
    /// Gyro heading in degrees
    Heading,
    /// Left minus right line reflectance
    LineDifference,
    /// Lesser of the two line reflectances
    LineMinimum,
}

impl Source {
    fn read(self, frame: &SensorFrame) -> f64 {
        match self {
            Source::Heading => frame.heading.0,
            Source::LineDifference => frame.line_left - frame.line_right,
            Source::LineMinimum => frame.line_left.min(frame.line_right),
        }
    }
}

/// Standard PID controller
///
/// `update` must run once per cycle with the shared cycle delta; the
/// derivative divides by the raw microsecond delta and the gains are tuned
/// to that, so the caller guarantees a non-zero delta every cycle.
#[derive(Debug, Clone)]
pub struct Pid {
    gains: PidGains,
    pub setpoint: f64,
    integrator: f64,
    prev_error: f64,
    output: f64,
    continuous: Option<AngleUnit>,
    invert: bool,
    source: Option<Source>,
    auto: bool,
}

impl Pid {
    pub fn new(gains: PidGains) -> Self {
        Pid {
            gains,
            setpoint: 0.0,
            integrator: 0.0,
            prev_error: 0.0,
            output: 0.0,
            continuous: None,
            invert: false,
            source: None,
            auto: false,
        }
    }

    /// Computes error on a wraparound domain, always the short way around
    pub fn continuous(mut self, unit: AngleUnit) -> Self {
        self.continuous = Some(unit);
        self
    }

    /// Negates the error after computation
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Pulls input from the sensor frame and joins the auto-update set
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self.auto = true;
        self
    }

    /// Removes this controller from the batch update; its input must then be
    /// pushed by the caller every update
    pub fn unbind(&mut self) {
        self.auto = false;
    }

    pub fn bind(&mut self) {
        self.auto = true;
    }

    pub fn is_auto(&self) -> bool {
        self.auto
    }

    /// Clears the accumulated state. Does not reset the setpoint.
    pub fn reset(&mut self) {
        self.integrator = 0.0;
        self.prev_error = 0.0;
        self.output = 0.0;
    }

    fn resolve(&self, input: Option<f64>, frame: &SensorFrame) -> Result<f64> {
        match input.or_else(|| self.source.map(|source| source.read(frame))) {
            Some(value) => Ok(value),
            None => bail!("PID updated with no input value and no bound source"),
        }
    }

    fn error(&self, input: f64) -> f64 {
        let error = match self.continuous {
            None => self.setpoint - input,
            Some(unit) => {
                let range = unit.range();
                let half = range / 2.0;
                ((self.setpoint - input) + half).rem_euclid(range) - half
            }
        };
        if self.invert {
            -error
        } else {
            error
        }
    }

    /// Recomputes the output; fails if no input is given and none is bound
    pub fn update(
        &mut self,
        input: Option<f64>,
        frame: &SensorFrame,
        dt_us: u64,
    ) -> Result<f64> {
        let input = self.resolve(input, frame)?;
        let error = self.error(input);

        self.integrator += error * dt_us as f64 / 1_000_000.0;

        self.output = (self.gains.kp * error)
            + (self.gains.ki * self.integrator)
            + (self.gains.kd * (error - self.prev_error) / dt_us as f64);
        self.prev_error = error;

        if let Some(max_out) = self.gains.max_out {
            self.output = self.output.clamp(-max_out, max_out);
        }

        Ok(self.output)
    }

    /// Stores a new setpoint, shifted into the canonical wraparound range
    /// for continuous controllers
    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = match self.continuous {
            None => setpoint,
            Some(unit) => {
                let range = unit.range();
                (setpoint + 1.5 * range).rem_euclid(range) - range / 2.0
            }
        };
    }

    /// Raw additive setpoint adjustment, for rate-style operator control
    pub fn offset_setpoint(&mut self, delta: f64) {
        self.setpoint += delta;
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    /// Whether the re-derived error is within `tolerance`
    pub fn at_setpoint(
        &self,
        tolerance: f64,
        input: Option<f64>,
        frame: &SensorFrame,
    ) -> Result<bool> {
        let input = self.resolve(input, frame)?;
        Ok(self.error(input).abs() < tolerance)
    }
}

/// Every controller in the loop, updated in declaration order
///
/// Controllers constructed with a [`Source`] are bound for batch update;
/// the fruit and wall controllers are fed from state-machine logic instead.
#[derive(Debug, Clone)]
pub struct Pids {
    pub turn: Pid,
    pub fruit_turn: Pid,
    pub fruit_dist: Pid,
    pub arm_fruit: Pid,
    pub wall: Pid,
    pub line_turn: Pid,
    pub line_dist: Pid,
}

impl Pids {
    pub fn new(config: &RobotConfig) -> Self {
        let table = &config.pids;

        let turn = Pid::new(table.turn)
            .continuous(AngleUnit::Degrees)
            .with_source(Source::Heading);

        let mut fruit_turn = Pid::new(table.fruit_turn).inverted();
        fruit_turn.set_setpoint(table.fruit_center_col_px);

        let mut fruit_dist = Pid::new(table.fruit_dist);
        fruit_dist.set_setpoint(table.fruit_height_px);

        let mut arm_fruit = Pid::new(table.arm_fruit);
        arm_fruit.set_setpoint(table.fruit_row_px);

        let mut wall = Pid::new(table.wall);
        wall.set_setpoint(config.wall.offset_mm);

        let mut line_turn = Pid::new(table.line_turn).with_source(Source::LineDifference);
        line_turn.set_setpoint(table.line_diff_pct);

        let mut line_dist = Pid::new(table.line_dist)
            .inverted()
            .with_source(Source::LineMinimum);
        line_dist.set_setpoint(table.line_min_pct);

        Pids {
            turn,
            fruit_turn,
            fruit_dist,
            arm_fruit,
            wall,
            line_turn,
            line_dist,
        }
    }

    /// Updates every bound controller against the cycle's sensor frame
    pub fn update_bound(&mut self, frame: &SensorFrame, dt_us: u64) -> Result<()> {
        let all = [
            &mut self.turn,
            &mut self.fruit_turn,
            &mut self.fruit_dist,
            &mut self.arm_fruit,
            &mut self.wall,
            &mut self.line_turn,
            &mut self.line_dist,
        ];
        for pid in all {
            if pid.is_auto() {
                pid.update(None, frame, dt_us)?;
            }
        }
        Ok(())
    }
}
